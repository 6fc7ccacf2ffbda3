//! Session records and their on-disk JSON shape.
//!
//! Older registry files stored ticket sessions without a `type` field. Those records
//! are upgraded when read (see [`StoredSession::into_session`]); everything written
//! back is typed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registry key of the per-project architect session.
pub const ARCHITECT_SESSION_KEY: &str = "architect";

/// Registry key of the daemon-wide meta session.
pub const META_SESSION_KEY: &str = "meta";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Starting,
    InProgress,
    Idle,
    WaitingPermission,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Architect,
    Ticket,
    Meta,
}

/// What a session is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionScope {
    Architect,
    Meta,
    Ticket { ticket_id: String },
}

impl SessionScope {
    pub fn session_type(&self) -> SessionType {
        match self {
            SessionScope::Architect => SessionType::Architect,
            SessionScope::Meta => SessionType::Meta,
            SessionScope::Ticket { .. } => SessionType::Ticket,
        }
    }

    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            SessionScope::Ticket { ticket_id } => Some(ticket_id),
            _ => None,
        }
    }
}

/// One running agent attachment. Deleted, not archived, when the agent ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub scope: SessionScope,
    pub agent: String,
    /// Terminal multiplexer window hosting the agent.
    pub window: String,
    pub worktree_path: Option<String>,
    pub feature_branch: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: AgentStatus,
    pub tool: Option<String>,
    pub work: Option<String>,
}

impl Session {
    pub(crate) fn start(scope: SessionScope, agent: &str, window: &str) -> Self {
        Session {
            scope,
            agent: agent.to_string(),
            window: window.to_string(),
            worktree_path: None,
            feature_branch: None,
            started_at: Utc::now(),
            ended_at: None,
            status: AgentStatus::Starting,
            tool: None,
            work: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// JSON record as stored in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ticket_id: String,
    #[serde(default)]
    pub agent: String,
    #[serde(rename = "tmux_window", default)]
    pub window: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_branch: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
}

impl StoredSession {
    /// Resolves the record's scope, inferring it for untyped legacy records: the
    /// architect key becomes an architect session without a ticket, anything else a
    /// ticket session.
    pub fn into_session(self, key: &str) -> Session {
        let scope = match (self.session_type, key) {
            (Some(SessionType::Architect), _) => SessionScope::Architect,
            (Some(SessionType::Meta), _) => SessionScope::Meta,
            (None, ARCHITECT_SESSION_KEY) => SessionScope::Architect,
            (Some(SessionType::Ticket), _) | (None, _) => SessionScope::Ticket {
                ticket_id: self.ticket_id,
            },
        };

        Session {
            scope,
            agent: self.agent,
            window: self.window,
            worktree_path: self.worktree_path,
            feature_branch: self.feature_branch,
            started_at: self.started_at,
            ended_at: self.ended_at,
            status: self.status,
            tool: self.tool,
            work: self.work,
        }
    }
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        StoredSession {
            session_type: Some(session.scope.session_type()),
            ticket_id: session.scope.ticket_id().unwrap_or_default().to_string(),
            agent: session.agent.clone(),
            window: session.window.clone(),
            worktree_path: session.worktree_path.clone(),
            feature_branch: session.feature_branch.clone(),
            started_at: session.started_at,
            ended_at: session.ended_at,
            status: session.status,
            tool: session.tool.clone(),
            work: session.work.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(ticket_id: &str) -> StoredSession {
        serde_json::from_str(&format!(
            r#"{{"ticket_id":"{ticket_id}","agent":"claude","tmux_window":"w1",
                "started_at":"2025-01-01T00:00:00Z","status":"idle"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn legacy_architect_record_loses_ticket() {
        let session = legacy("0123abcd-0000").into_session(ARCHITECT_SESSION_KEY);
        assert_eq!(session.scope, SessionScope::Architect);
        assert_eq!(session.scope.ticket_id(), None);
        assert_eq!(session.status, AgentStatus::Idle);
    }

    #[test]
    fn legacy_other_record_becomes_ticket_session() {
        let session = legacy("0123abcd-0000").into_session("0123abcd");
        assert_eq!(
            session.scope,
            SessionScope::Ticket {
                ticket_id: "0123abcd-0000".to_string()
            }
        );
        assert_eq!(session.window, "w1");
    }

    #[test]
    fn typed_record_keeps_its_type() {
        let mut stored = legacy("");
        stored.session_type = Some(SessionType::Meta);
        assert_eq!(stored.into_session("anything").scope, SessionScope::Meta);
    }

    #[test]
    fn stored_form_is_always_typed() {
        let session = Session::start(SessionScope::Architect, "claude", "w");
        let stored = StoredSession::from(&session);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["type"], "architect");
        assert!(json.get("ticket_id").is_none());
        assert_eq!(json["tmux_window"], "w");
        assert_eq!(json["status"], "starting");
        assert_eq!(stored.into_session(ARCHITECT_SESSION_KEY), session);
    }
}
