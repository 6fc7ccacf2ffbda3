//! Ephemeral records of running agent sessions.
//!
//! Sessions are never entities: they live in one JSON document per registry and are
//! deleted outright when the agent ends.

mod registry;
mod types;

pub use registry::{SessionRegistry, Worktree};
pub use types::{
    AgentStatus, Session, SessionScope, SessionType, ARCHITECT_SESSION_KEY, META_SESSION_KEY,
};
