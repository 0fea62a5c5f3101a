//! Session persistence: the store trait plus filesystem and in-memory
//! implementations.
//!
//! Saves are serialized per session id so two concurrent tasks on the same
//! session cannot interleave their appends; cross-session saves run
//! concurrently.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use crate::errors::{AgentError, AgentResult};

use super::types::{Session, SessionSummary};

// ─── SessionStore ────────────────────────────────────────────────────────────

/// Load/save/list conversational sessions.
///
/// Implementations must replace the stored document atomically on save and
/// never drop history: after a save, a later load returns a message list of
/// which every previously loaded list is a prefix.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> AgentResult<Session>;

    async fn save(&self, session: &Session) -> AgentResult<()>;

    async fn list(&self) -> AgentResult<Vec<SessionSummary>>;

    async fn delete(&self, id: &str) -> AgentResult<()>;

    async fn exists(&self, id: &str) -> bool {
        self.load(id).await.is_ok()
    }
}

impl std::fmt::Debug for dyn SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionStore")
    }
}

// ─── Per-id save locks ───────────────────────────────────────────────────────

#[derive(Default)]
struct SaveLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SaveLocks {
    fn for_id(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = match self.locks.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

// ─── FsSessionStore ──────────────────────────────────────────────────────────

/// One opaque JSON document per session under the session directory
/// (default `~/.alex/sessions/<id>.json`).  Writes go to `<id>.json.tmp`
/// and are renamed into place.
pub struct FsSessionStore {
    dir: PathBuf,
    locks: SaveLocks,
}

impl FsSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: SaveLocks::default(),
        }
    }

    /// Default directory: `~/.alex/sessions`.
    pub fn default_dir() -> Result<PathBuf, String> {
        dirs::home_dir()
            .map(|h| h.join(".alex").join("sessions"))
            .ok_or_else(|| "could not determine home directory".to_string())
    }

    fn path_for(&self, id: &str) -> AgentResult<PathBuf> {
        // Session ids are opaque but must stay a single path component.
        if id.is_empty() || id.contains('/') || id.contains("..") {
            return Err(AgentError::Validation(format!("invalid session id '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn load(&self, id: &str) -> AgentResult<Session> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentError::SessionNotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, session: &Session) -> AgentResult<()> {
        let path = self.path_for(&session.id)?;
        let lock = self.locks.for_id(&session.id);
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn list(&self) -> AgentResult<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summaries),
            Err(e) => return Err(e.into()),
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_summary(&path).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => log::warn!("skipping unreadable session file {path:?}: {e}"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> AgentResult<()> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AgentError::SessionNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn read_summary(path: &Path) -> AgentResult<SessionSummary> {
    let bytes = tokio::fs::read(path).await?;
    let session: Session = serde_json::from_slice(&bytes)?;
    Ok(SessionSummary::from(&session))
}

// ─── InMemorySessionStore ────────────────────────────────────────────────────

/// Map-backed store for tests and ephemeral embedding.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: std::sync::RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> AgentResult<Session> {
        self.sessions
            .read()
            .map_err(|e| AgentError::Internal(e.to_string()))?
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))
    }

    async fn save(&self, session: &Session) -> AgentResult<()> {
        self.sessions
            .write()
            .map_err(|e| AgentError::Internal(e.to_string()))?
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> AgentResult<Vec<SessionSummary>> {
        let map = self
            .sessions
            .read()
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        let mut summaries: Vec<SessionSummary> = map.values().map(SessionSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> AgentResult<()> {
        let removed = self
            .sessions
            .write()
            .map_err(|e| AgentError::Internal(e.to_string()))?
            .remove(id);
        match removed {
            Some(_) => Ok(()),
            None => Err(AgentError::SessionNotFound(id.to_string())),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::Message;
    use tempfile::TempDir;

    #[tokio::test]
    async fn fs_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let mut session = Session::new("abc");
        session.append_messages(vec![Message::user("hello")]);
        store.save(&session).await.unwrap();

        let loaded = store.load("abc").await.unwrap();
        assert_eq!(loaded.id, "abc");
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].content, "hello");
    }

    #[tokio::test]
    async fn fs_store_load_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());
        let err = store.load("ghost").await.unwrap_err();
        assert!(matches!(err, AgentError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn fs_store_rejects_path_traversal_ids() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());
        let err = store.load("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[tokio::test]
    async fn fs_store_list_sorted_by_recency() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let older = Session::new("older");
        store.save(&older).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut newer = Session::new("newer");
        newer.append_messages(vec![Message::user("x")]);
        store.save(&newer).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "newer");
    }

    #[tokio::test]
    async fn fs_store_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());
        store.save(&Session::new("gone")).await.unwrap();
        store.delete("gone").await.unwrap();
        assert!(!store.exists("gone").await);
        assert!(store.delete("gone").await.is_err());
    }

    #[tokio::test]
    async fn saves_never_drop_history() {
        let dir = TempDir::new().unwrap();
        let store = FsSessionStore::new(dir.path());

        let mut session = Session::new("mono");
        session.append_messages(vec![Message::user("one")]);
        store.save(&session).await.unwrap();
        let first = store.load("mono").await.unwrap();

        session.append_messages(vec![Message::assistant("two")]);
        store.save(&session).await.unwrap();
        let second = store.load("mono").await.unwrap();

        // The earlier load is a prefix of the later one.
        assert!(second.messages.len() >= first.messages.len());
        for (a, b) in first.messages.iter().zip(second.messages.iter()) {
            assert_eq!(a.content, b.content);
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = InMemorySessionStore::new();
        store.save(&Session::new("m1")).await.unwrap();
        assert!(store.exists("m1").await);
        assert_eq!(store.list().await.unwrap().len(), 1);
        store.delete("m1").await.unwrap();
        assert!(!store.exists("m1").await);
    }
}
