//! JSON-over-HTTP clients for the external sandbox service.
//!
//! The sandbox exposes three endpoint families:
//! - `POST /file/read | /file/write | /file/stat | /file/list`
//! - `POST /shell/exec {command, timeout}` → `{stdout, stderr, exit_code}`
//! - `POST /jupyter/execute {code, timeout}` → `{output, error?}`
//!
//! Transport failures are translated to the stable user-facing messages the
//! LLM observes; backend-specific detail stays in the `Other` variant.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── SandboxError ────────────────────────────────────────────────────────────

/// Stable classification of sandbox transport failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Sandbox unreachable")]
    Unreachable,

    #[error("Sandbox operation timed out")]
    Timeout,

    #[error("File not found in sandbox")]
    NotFound,

    #[error("Sandbox error: {0}")]
    Other(String),
}

impl SandboxError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SandboxError::Timeout
        } else if e.is_connect() {
            SandboxError::Unreachable
        } else {
            SandboxError::Other(e.to_string())
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => SandboxError::NotFound,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SandboxError::Timeout,
            _ => SandboxError::Other(format!("HTTP {status}: {body}")),
        }
    }

    /// True for failures worth a connectivity re-probe by the manager.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SandboxError::Unreachable | SandboxError::Timeout)
    }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PathRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    path: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    bytes_written: u64,
}

/// Metadata for a sandbox file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    #[serde(default)]
    pub modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    entries: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ShellRequest<'a> {
    command: &'a str,
    /// Timeout in seconds.
    timeout: u64,
}

/// Result of a sandboxed shell execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellExecResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Serialize)]
struct JupyterRequest<'a> {
    code: &'a str,
    /// Timeout in seconds.
    timeout: u64,
}

/// Result of a sandboxed code execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterExecResult {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
}

// ─── SandboxHttpClient ───────────────────────────────────────────────────────

/// Shared HTTP plumbing for the three endpoint families.
#[derive(Clone)]
#[derive(Debug)]
pub struct SandboxHttpClient {
    http: Client,
    base_url: String,
    op_timeout: Duration,
}

impl SandboxHttpClient {
    /// Build a client.  Pure: no connection is established here.
    pub fn new(base_url: impl Into<String>, op_timeout: Duration) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(op_timeout)
            .build()
            .map_err(|e| format!("failed to create sandbox HTTP client: {e}"))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            http,
            base_url,
            op_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    async fn post<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Resp, SandboxError> {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(SandboxError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SandboxError::from_status(status, body));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| SandboxError::Other(format!("malformed response: {e}")))
    }

    // ── File endpoints ───────────────────────────────────────────────────────

    pub async fn file_read(&self, path: &str) -> Result<String, SandboxError> {
        let resp: ReadResponse = self
            .post("/file/read", &PathRequest { path }, self.op_timeout)
            .await?;
        Ok(resp.content)
    }

    pub async fn file_write(&self, path: &str, content: &str) -> Result<u64, SandboxError> {
        let resp: WriteResponse = self
            .post("/file/write", &WriteRequest { path, content }, self.op_timeout)
            .await?;
        Ok(resp.bytes_written)
    }

    pub async fn file_stat(&self, path: &str) -> Result<FileStat, SandboxError> {
        self.post("/file/stat", &PathRequest { path }, self.op_timeout)
            .await
    }

    pub async fn file_list(&self, path: &str) -> Result<Vec<String>, SandboxError> {
        let resp: ListResponse = self
            .post("/file/list", &PathRequest { path }, self.op_timeout)
            .await?;
        Ok(resp.entries)
    }

    // ── Shell endpoint ───────────────────────────────────────────────────────

    /// Execute a shell command; `timeout` overrides the default per-op
    /// timeout when given.
    pub async fn shell_exec(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ShellExecResult, SandboxError> {
        let timeout = timeout.unwrap_or(self.op_timeout);
        // Give the HTTP layer headroom over the remote execution budget.
        let http_timeout = timeout + Duration::from_secs(5);
        self.post(
            "/shell/exec",
            &ShellRequest {
                command,
                timeout: timeout.as_secs(),
            },
            http_timeout,
        )
        .await
    }

    // ── Jupyter endpoint ─────────────────────────────────────────────────────

    pub async fn jupyter_execute(
        &self,
        code: &str,
        timeout: Option<Duration>,
    ) -> Result<JupyterExecResult, SandboxError> {
        let timeout = timeout.unwrap_or(self.op_timeout);
        let http_timeout = timeout + Duration::from_secs(5);
        self.post(
            "/jupyter/execute",
            &JupyterRequest {
                code,
                timeout: timeout.as_secs(),
            },
            http_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(SandboxError::Unreachable.to_string(), "Sandbox unreachable");
        assert_eq!(
            SandboxError::Timeout.to_string(),
            "Sandbox operation timed out"
        );
        assert_eq!(
            SandboxError::NotFound.to_string(),
            "File not found in sandbox"
        );
        assert_eq!(
            SandboxError::Other("boom".into()).to_string(),
            "Sandbox error: boom"
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            SandboxError::from_status(StatusCode::NOT_FOUND, String::new()),
            SandboxError::NotFound
        );
        assert_eq!(
            SandboxError::from_status(StatusCode::GATEWAY_TIMEOUT, String::new()),
            SandboxError::Timeout
        );
        assert!(matches!(
            SandboxError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "oops".into()),
            SandboxError::Other(_)
        ));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client =
            SandboxHttpClient::new("http://sbx:8194///", Duration::from_secs(30)).unwrap();
        assert_eq!(client.base_url(), "http://sbx:8194");
    }

    #[test]
    fn connectivity_classification() {
        assert!(SandboxError::Unreachable.is_connectivity());
        assert!(SandboxError::Timeout.is_connectivity());
        assert!(!SandboxError::NotFound.is_connectivity());
        assert!(!SandboxError::Other("x".into()).is_connectivity());
    }
}
