//! JSON-file registry of running agent sessions.
//!
//! # File Format
//!
//! ```json
//! {
//!   "architect": { "type": "architect", "agent": "claude", ... },
//!   "1a2b3c4d":  { "type": "ticket", "ticket_id": "1a2b3c4d-...", ... }
//! }
//! ```
//!
//! Every operation re-reads the whole file, mutates it and rewrites it atomically
//! while holding one registry-wide lock. A missing or empty file is an empty
//! registry; unparseable JSON is an error, so a bad file is never silently replaced.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs_err as fs;
use tracing::debug;

use super::types::{
    AgentStatus, Session, SessionScope, StoredSession, ARCHITECT_SESSION_KEY, META_SESSION_KEY,
};
use crate::error::{CortexError, Result};
use crate::storage::{ProjectPaths, StorageConfig};
use crate::store::{short_id, write_atomic};

/// Optional fields supplied when a ticket session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worktree {
    pub path: Option<String>,
    pub branch: Option<String>,
}

pub struct SessionRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SessionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionRegistry {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Registry at `{project}/.cortex/sessions.json`.
    pub fn for_project(project: &Path) -> Self {
        Self::new(ProjectPaths::new(project).sessions_file())
    }

    /// The daemon-wide registry holding the meta session.
    pub fn meta(storage: &StorageConfig) -> Self {
        Self::new(storage.meta_sessions_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts a ticket session keyed by the ticket's short ID, replacing any existing one.
    pub fn create(
        &self,
        ticket_id: &str,
        agent: &str,
        window: &str,
        worktree: Worktree,
    ) -> Result<(String, Session)> {
        if ticket_id.trim().is_empty() {
            return Err(CortexError::validation("ticket_id", "cannot be empty"));
        }
        let mut session = Session::start(
            SessionScope::Ticket {
                ticket_id: ticket_id.to_string(),
            },
            agent,
            window,
        );
        session.worktree_path = worktree.path;
        session.feature_branch = worktree.branch;
        self.insert(short_id(ticket_id), session)
    }

    /// Starts the project's architect session, replacing any existing one.
    pub fn create_architect(&self, agent: &str, window: &str) -> Result<(String, Session)> {
        self.insert(
            ARCHITECT_SESSION_KEY,
            Session::start(SessionScope::Architect, agent, window),
        )
    }

    /// Starts the meta session, replacing any existing one.
    pub fn create_meta(&self, agent: &str, window: &str) -> Result<(String, Session)> {
        self.insert(
            META_SESSION_KEY,
            Session::start(SessionScope::Meta, agent, window),
        )
    }

    pub fn get(&self, key: &str) -> Result<Session> {
        self.with_sessions(|sessions| {
            sessions
                .get(key)
                .cloned()
                .ok_or_else(|| CortexError::not_found("session", key))
        })
    }

    pub fn get_by_ticket_id(&self, ticket_id: &str) -> Result<Session> {
        self.get(short_id(ticket_id))
    }

    /// Sets status and replaces the tool/work annotations (`None` clears them).
    pub fn update_status(
        &self,
        key: &str,
        status: AgentStatus,
        tool: Option<String>,
        work: Option<String>,
    ) -> Result<Session> {
        self.mutate(|sessions| {
            let session = sessions
                .get_mut(key)
                .ok_or_else(|| CortexError::not_found("session", key))?;
            session.status = status;
            session.tool = tool;
            session.work = work;
            Ok(session.clone())
        })
    }

    /// Removes the session and returns it stamped with its end time.
    pub fn end(&self, key: &str) -> Result<Session> {
        let mut ended = self.mutate(|sessions| {
            sessions
                .remove(key)
                .ok_or_else(|| CortexError::not_found("session", key))
        })?;
        ended.ended_at = Some(chrono::Utc::now());
        debug!(key, "Session ended");
        Ok(ended)
    }

    /// Snapshot of every session, keyed by registry key.
    pub fn list(&self) -> Result<BTreeMap<String, Session>> {
        self.with_sessions(|sessions| Ok(sessions.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // File access
    // ─────────────────────────────────────────────────────────────────────────────

    fn insert(&self, key: &str, session: Session) -> Result<(String, Session)> {
        self.mutate(|sessions| {
            if sessions.insert(key.to_string(), session.clone()).is_some() {
                debug!(key, "Replacing existing session");
            }
            Ok((key.to_string(), session))
        })
    }

    fn with_sessions<T>(&self, f: impl FnOnce(&BTreeMap<String, Session>) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let sessions = self.load()?;
        f(&sessions)
    }

    /// Load, mutate and save under the registry lock. Nothing is written if `f` fails.
    fn mutate<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Session>) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sessions = self.load()?;
        let value = f(&mut sessions)?;
        self.save(&sessions)?;
        Ok(value)
    }

    fn load(&self) -> Result<BTreeMap<String, Session>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(CortexError::io(
                    format!("reading {}", self.path.display()),
                    e,
                ))
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let stored: Option<BTreeMap<String, StoredSession>> = serde_json::from_str(&content)
            .map_err(|source| CortexError::Json {
                context: format!("parsing {}", self.path.display()),
                source,
            })?;

        Ok(stored
            .unwrap_or_default()
            .into_iter()
            .map(|(key, record)| {
                let session = record.into_session(&key);
                (key, session)
            })
            .collect())
    }

    fn save(&self, sessions: &BTreeMap<String, Session>) -> Result<()> {
        let stored: BTreeMap<&str, StoredSession> = sessions
            .iter()
            .map(|(key, session)| (key.as_str(), StoredSession::from(session)))
            .collect();
        let content = serde_json::to_string_pretty(&stored).map_err(|source| CortexError::Json {
            context: "serializing sessions".to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CortexError::io(format!("creating {}", parent.display()), e))?;
        }
        write_atomic(&self.path, content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    const TICKET: &str = "1a2b3c4d-5e6f-7a8b-9c0d-112233445566";

    fn registry(temp: &TempDir) -> SessionRegistry {
        SessionRegistry::new(temp.path().join(".cortex/sessions.json"))
    }

    #[test]
    fn create_sets_starting_status_and_short_key() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let (key, session) = registry
            .create(TICKET, "claude", "cortex:1", Worktree::default())
            .unwrap();

        assert_eq!(key, "1a2b3c4d");
        assert_eq!(session.status, AgentStatus::Starting);
        assert_eq!(session.scope.ticket_id(), Some(TICKET));
        assert!(session.is_active());
        assert_eq!(registry.get(&key).unwrap(), session);
        assert_eq!(registry.get_by_ticket_id(TICKET).unwrap(), session);
    }

    #[test]
    fn create_with_worktree_fields() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let (key, _) = registry
            .create(
                TICKET,
                "claude",
                "w",
                Worktree {
                    path: Some("/tmp/wt".to_string()),
                    branch: Some("ticket/1a2b".to_string()),
                },
            )
            .unwrap();

        let loaded = registry.get(&key).unwrap();
        assert_eq!(loaded.worktree_path.as_deref(), Some("/tmp/wt"));
        assert_eq!(loaded.feature_branch.as_deref(), Some("ticket/1a2b"));
    }

    #[test]
    fn unknown_keys_are_not_found() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        assert!(registry.get("nope").unwrap_err().is_not_found());
        assert!(registry
            .update_status("nope", AgentStatus::Idle, None, None)
            .unwrap_err()
            .is_not_found());
        assert!(registry.end("nope").unwrap_err().is_not_found());
        assert!(!registry.path().exists());
    }

    #[test]
    fn update_status_replaces_annotations() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let (key, _) = registry.create_architect("claude", "w").unwrap();

        registry
            .update_status(
                &key,
                AgentStatus::InProgress,
                Some("Edit".to_string()),
                Some("refactoring".to_string()),
            )
            .unwrap();
        let idle = registry
            .update_status(&key, AgentStatus::Idle, None, None)
            .unwrap();

        assert_eq!(idle.status, AgentStatus::Idle);
        assert!(idle.tool.is_none());
        assert_eq!(registry.get(&key).unwrap(), idle);
    }

    #[test]
    fn end_removes_session() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let (key, _) = registry
            .create(TICKET, "claude", "w", Worktree::default())
            .unwrap();

        let ended = registry.end(&key).unwrap();

        assert!(ended.ended_at.is_some());
        assert!(registry.get(&key).unwrap_err().is_not_found());
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn singletons_use_reserved_keys() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let (first, _) = registry.create_architect("claude", "w1").unwrap();
        let (second, _) = registry.create_architect("claude", "w2").unwrap();
        let (meta, _) = registry.create_meta("claude", "m").unwrap();

        assert_eq!(first, ARCHITECT_SESSION_KEY);
        assert_eq!(second, ARCHITECT_SESSION_KEY);
        assert_eq!(meta, META_SESSION_KEY);

        let all = registry.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[ARCHITECT_SESSION_KEY].window, "w2");
        assert_eq!(all[META_SESSION_KEY].scope, SessionScope::Meta);
    }

    #[test]
    fn missing_and_empty_files_are_empty_registries() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        assert!(registry.list().unwrap().is_empty());

        fs::create_dir_all(temp.path().join(".cortex")).unwrap();
        fs::write(registry.path(), "").unwrap();
        assert!(registry.list().unwrap().is_empty());

        fs::write(registry.path(), "null").unwrap();
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error_and_left_alone() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        fs::create_dir_all(temp.path().join(".cortex")).unwrap();
        fs::write(registry.path(), "{not json").unwrap();

        assert!(matches!(registry.list(), Err(CortexError::Json { .. })));
        assert!(registry.create_architect("claude", "w").is_err());
        assert_eq!(fs::read_to_string(registry.path()).unwrap(), "{not json");
    }

    #[test]
    fn legacy_records_are_migrated_on_load() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        fs::create_dir_all(temp.path().join(".cortex")).unwrap();
        fs::write(
            registry.path(),
            r#"{
  "architect": {"ticket_id": "stale-ticket", "agent": "claude", "tmux_window": "a",
                "started_at": "2025-01-01T00:00:00Z", "status": "idle"},
  "1a2b3c4d": {"ticket_id": "1a2b3c4d-5e6f", "agent": "claude", "tmux_window": "t",
               "started_at": "2025-01-01T00:00:00Z", "status": "in_progress"}
}"#,
        )
        .unwrap();

        let architect = registry.get(ARCHITECT_SESSION_KEY).unwrap();
        assert_eq!(architect.scope, SessionScope::Architect);

        let ticket = registry.get("1a2b3c4d").unwrap();
        assert_eq!(ticket.scope.ticket_id(), Some("1a2b3c4d-5e6f"));

        // Any write persists the typed form.
        registry
            .update_status("1a2b3c4d", AgentStatus::Idle, None, None)
            .unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(registry.path()).unwrap()).unwrap();
        assert_eq!(raw["architect"]["type"], "architect");
        assert!(raw["architect"].get("ticket_id").is_none());
        assert_eq!(raw["1a2b3c4d"]["type"], "ticket");
    }

    #[test]
    fn concurrent_status_updates_keep_file_valid() {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(registry(&temp));
        let (key, _) = registry
            .create(TICKET, "claude", "w", Worktree::default())
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                std::thread::spawn(move || {
                    registry
                        .update_status(&key, AgentStatus::InProgress, Some(format!("tool-{i}")), None)
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let last = registry
            .update_status(&key, AgentStatus::Idle, Some("final".to_string()), None)
            .unwrap();
        let content = fs::read_to_string(registry.path()).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&content).is_ok());
        assert_eq!(registry.get(&key).unwrap(), last);
        assert_eq!(last.tool.as_deref(), Some("final"));
    }
}
