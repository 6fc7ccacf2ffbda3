//! # cortex-core
//!
//! Core library for Cortex, a local, file-backed ticket and documentation tracker
//! that runs coding agents against tickets.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Clients can wrap with async if needed.
//! - **Files are the database**: Tickets and docs are markdown with YAML frontmatter,
//!   readable and editable by hand. There is no index; every lookup scans the tree.
//! - **Atomic writes**: Every file is replaced through a temp file and rename, so a
//!   crash never leaves a half-written document behind.
//! - **Thread-safe stores**: Mutations on the same entity are serialized by a per-ID
//!   lock; the session registry serializes everything behind one lock. Nothing
//!   coordinates across processes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cortex_core::{DocStore, NewTicket, TicketStatus, TicketStore};
//!
//! let tickets = TicketStore::for_project(project);
//! let ticket = tickets.create(NewTicket::new("Fix login bug", "Users see a 500"))?;
//! tickets.move_to(ticket.id(), TicketStatus::Progress)?;
//!
//! let docs = DocStore::for_project(project);
//! let doc = docs.create("API Design", "specs", "# v2", vec![], vec![])?;
//! ```

pub mod config;
pub mod daemon;
pub mod docs;
pub mod error;
pub mod events;
pub mod logging;
pub mod sessions;
pub mod storage;
pub mod store;
pub mod tickets;

// Re-export commonly used items at crate root
pub use config::DaemonConfig;
pub use daemon::{CancelToken, DaemonStatus, PidInfo, StopOutcome, Supervisor};
pub use docs::{Doc, DocStore};
pub use error::{CortexError, Result};
pub use events::{Event, EventBus, EventKind, EventSink};
pub use sessions::*;
pub use storage::{ProjectPaths, StorageConfig};
pub use store::{Comment, CommentAction, CommentType, EntityMeta, EntityUpdate, Layout};
pub use tickets::*;
