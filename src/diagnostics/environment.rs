//! Environment-snapshot capture and the deterministic summary injected
//! into every task's system prompt.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::WorkflowEvent;
use crate::sandbox::SandboxManager;

/// Host environment variables considered non-secret.
pub const HOST_ENV_ALLOWLIST: &[&str] = &[
    "HOSTNAME",
    "USER",
    "HOME",
    "LANG",
    "SHELL",
    "PWD",
    "TERM",
    "SANDBOX_BASE_URL",
    "ALEX_SANDBOX_BASE_URL",
    "ALEX_EXECUTION_MODE",
];

/// Host + sandbox environment maps, captured once at startup and cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub host: BTreeMap<String, String>,
    pub sandbox: BTreeMap<String, String>,
    pub captured_at: DateTime<Utc>,
}

impl EnvironmentSnapshot {
    /// Capture the allowlisted host environment and, when a manager is
    /// wired, the sandbox environment (best-effort).
    pub async fn capture(sandbox: Option<&SandboxManager>) -> Self {
        let host = capture_host_env(std::env::vars());
        let sandbox_env = match sandbox {
            Some(manager) => match manager.environment().await {
                Ok(env) => env,
                Err(e) => {
                    log::warn!("sandbox environment capture failed: {e}");
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };
        Self {
            host,
            sandbox: sandbox_env,
            captured_at: Utc::now(),
        }
    }

    /// The "Environment context" system-prompt segment.
    pub fn summary(&self) -> String {
        environment_summary(&self.host, &self.sandbox)
    }

    pub fn to_event(&self) -> WorkflowEvent {
        WorkflowEvent::EnvironmentSnapshot {
            host: self.host.clone(),
            sandbox: self.sandbox.clone(),
            captured_at: self.captured_at,
        }
    }
}

/// Filter an environment iterator down to the allowlist.
pub fn capture_host_env(
    vars: impl Iterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
    vars.filter(|(key, _)| HOST_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect()
}

/// Compose the deterministic environment summary: sorted keys, quoted
/// values, each key labelled host-only / sandbox-only / shared.  Output is
/// bytewise identical regardless of input map iteration order.
pub fn environment_summary(
    host: &BTreeMap<String, String>,
    sandbox: &BTreeMap<String, String>,
) -> String {
    let mut keys: Vec<&String> = host.keys().chain(sandbox.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut out = String::from("Environment context:\n");
    for key in keys {
        match (host.get(key), sandbox.get(key)) {
            (Some(h), Some(s)) if h == s => {
                out.push_str(&format!("- {key}=\"{h}\" [shared]\n"));
            }
            (Some(h), Some(s)) => {
                out.push_str(&format!("- {key}: host=\"{h}\" sandbox=\"{s}\"\n"));
            }
            (Some(h), None) => {
                out.push_str(&format!("- {key}=\"{h}\" [host]\n"));
            }
            (None, Some(s)) => {
                out.push_str(&format!("- {key}=\"{s}\" [sandbox]\n"));
            }
            (None, None) => unreachable!("key came from one of the maps"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn allowlist_filters_secrets() {
        let vars = vec![
            ("USER".to_string(), "alice".to_string()),
            ("OPENAI_API_KEY".to_string(), "sk-secret".to_string()),
            ("HOSTNAME".to_string(), "dev01".to_string()),
        ];
        let host = capture_host_env(vars.into_iter());
        assert_eq!(host.len(), 2);
        assert!(!host.contains_key("OPENAI_API_KEY"));
    }

    #[test]
    fn summary_sorted_and_labelled() {
        let host = map(&[("USER", "alice"), ("HOSTNAME", "dev01"), ("LANG", "C")]);
        let sandbox = map(&[("SANDBOX_BASE_URL", "http://sbx"), ("LANG", "C")]);
        let summary = environment_summary(&host, &sandbox);

        assert!(summary.starts_with("Environment context:\n"));
        assert!(summary.contains("- USER=\"alice\" [host]\n"));
        assert!(summary.contains("- SANDBOX_BASE_URL=\"http://sbx\" [sandbox]\n"));
        assert!(summary.contains("- LANG=\"C\" [shared]\n"));

        // Keys appear sorted lexicographically.
        let hostname = summary.find("HOSTNAME").unwrap();
        let lang = summary.find("LANG").unwrap();
        let sandbox_url = summary.find("SANDBOX_BASE_URL").unwrap();
        let user = summary.find("USER").unwrap();
        assert!(hostname < lang && lang < sandbox_url && sandbox_url < user);
    }

    #[test]
    fn summary_is_input_order_insensitive() {
        let host_a = map(&[("B", "2"), ("A", "1")]);
        let host_b = map(&[("A", "1"), ("B", "2")]);
        let empty = BTreeMap::new();
        assert_eq!(
            environment_summary(&host_a, &empty),
            environment_summary(&host_b, &empty)
        );
    }

    #[test]
    fn conflicting_values_show_both_sides() {
        let host = map(&[("PATH_STYLE", "host-side")]);
        let sandbox = map(&[("PATH_STYLE", "sbx-side")]);
        let summary = environment_summary(&host, &sandbox);
        assert!(summary.contains("host=\"host-side\""));
        assert!(summary.contains("sandbox=\"sbx-side\""));
    }

    #[tokio::test]
    async fn capture_without_sandbox_has_empty_sandbox_map() {
        let snapshot = EnvironmentSnapshot::capture(None).await;
        assert!(snapshot.sandbox.is_empty());
    }
}
