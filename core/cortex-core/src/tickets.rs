//! Tickets: directory-layout entities grouped by workflow status.
//!
//! ```text
//! .cortex/tickets/
//!   backlog/fix-login-bug-1a2b3c4d/index.md
//!   progress/add-oauth-5e6f7a8b/
//!     index.md
//!     comment-9c0d1e2f.md
//! ```
//!
//! Moving a ticket stamps lifecycle dates: `progress` the first time it enters
//! progress, `reviewed` and `done` every time it enters review or done.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CortexError, Result};
use crate::events::EventSink;
use crate::storage::ProjectPaths;
use crate::store::{
    Comment, CommentAction, CommentType, Entity, EntityMeta, EntityStore, Layout, ListFilter,
    NewEntity, Record,
};

/// Type assigned to tickets created without one.
pub const DEFAULT_TICKET_TYPE: &str = "work";

const SLUG_FALLBACK: &str = "ticket";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Backlog,
    Progress,
    Review,
    Done,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Backlog,
        TicketStatus::Progress,
        TicketStatus::Review,
        TicketStatus::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Backlog => "backlog",
            TicketStatus::Progress => "progress",
            TicketStatus::Review => "review",
            TicketStatus::Done => "done",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = CortexError;

    fn from_str(s: &str) -> Result<Self> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CortexError::validation("status", format!("unknown status: {s}")))
    }
}

fn default_ticket_type() -> String {
    DEFAULT_TICKET_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMeta {
    #[serde(flatten)]
    pub common: EntityMeta,
    #[serde(rename = "type", default = "default_ticket_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<DateTime<Utc>>,
}

impl Record for TicketMeta {
    fn from_meta(meta: EntityMeta) -> Self {
        TicketMeta {
            common: meta,
            kind: default_ticket_type(),
            due_date: None,
            progress: None,
            reviewed: None,
            done: None,
        }
    }

    fn meta(&self) -> &EntityMeta {
        &self.common
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.common
    }

    fn on_move(&mut self, to: &str, now: DateTime<Utc>) {
        match to.parse::<TicketStatus>() {
            Ok(TicketStatus::Progress) => {
                self.progress.get_or_insert(now);
            }
            Ok(TicketStatus::Review) => self.reviewed = Some(now),
            Ok(TicketStatus::Done) => self.done = Some(now),
            Ok(TicketStatus::Backlog) | Err(_) => {}
        }
    }
}

pub type Ticket = Entity<TicketMeta>;

impl Entity<TicketMeta> {
    /// Status derived from the directory the ticket sits in.
    pub fn status(&self) -> Option<TicketStatus> {
        self.classifier.parse().ok()
    }

    pub fn ticket_type(&self) -> &str {
        &self.meta.kind
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.meta.due_date
    }

    /// Past its due date and not yet done.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.meta.due_date {
            Some(due) => due < now && self.status() != Some(TicketStatus::Done),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTicket {
    pub title: String,
    pub body: String,
    pub status: TicketStatus,
    pub tags: Vec<String>,
    pub references: Vec<String>,
    /// Falls back to [`DEFAULT_TICKET_TYPE`].
    pub ticket_type: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTicket {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        NewTicket {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }
}

/// Partial update. `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub references: Option<Vec<String>>,
    pub ticket_type: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub tag: Option<String>,
    pub query: Option<String>,
}

pub struct TicketStore {
    inner: EntityStore<TicketMeta>,
}

impl TicketStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        TicketStore {
            inner: EntityStore::new(root, Layout::Directory, "ticket", SLUG_FALLBACK),
        }
    }

    /// Store rooted at `{project}/.cortex/tickets`, tagging events with the project.
    pub fn for_project(project: &Path) -> Self {
        let paths = ProjectPaths::new(project);
        TicketStore {
            inner: EntityStore::new(paths.tickets_dir(), Layout::Directory, "ticket", SLUG_FALLBACK)
                .with_project(project),
        }
    }

    pub fn with_events(self, sink: Arc<dyn EventSink>) -> Self {
        TicketStore {
            inner: self.inner.with_events(sink),
        }
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }

    pub fn create(&self, new: NewTicket) -> Result<Ticket> {
        let ticket_type = match new.ticket_type {
            Some(t) => validate_type(t)?,
            None => default_ticket_type(),
        };
        let due_date = new.due_date;
        let entity = NewEntity {
            title: new.title,
            classifier: new.status.as_str().to_string(),
            body: new.body,
            tags: new.tags,
            references: new.references,
        };
        self.inner.create_with(entity, |meta| {
            meta.kind = ticket_type;
            meta.due_date = due_date;
        })
    }

    pub fn get(&self, id: &str) -> Result<Ticket> {
        self.inner.get(id)
    }

    pub fn update(&self, id: &str, update: TicketUpdate) -> Result<Ticket> {
        let ticket_type = update.ticket_type.map(validate_type).transpose()?;
        self.inner.update_with(id, move |ticket| {
            if let Some(title) = update.title {
                ticket.meta.common.title = title;
            }
            if let Some(body) = update.body {
                ticket.body = body;
            }
            if let Some(tags) = update.tags {
                ticket.meta.common.tags = tags;
            }
            if let Some(references) = update.references {
                ticket.meta.common.references = references;
            }
            if let Some(kind) = ticket_type {
                ticket.meta.kind = kind;
            }
            if let Some(due_date) = update.due_date {
                ticket.meta.due_date = due_date;
            }
            Ok(())
        })
    }

    pub fn set_due_date(&self, id: &str, due: DateTime<Utc>) -> Result<Ticket> {
        self.update(
            id,
            TicketUpdate {
                due_date: Some(Some(due)),
                ..Default::default()
            },
        )
    }

    pub fn clear_due_date(&self, id: &str) -> Result<Ticket> {
        self.update(
            id,
            TicketUpdate {
                due_date: Some(None),
                ..Default::default()
            },
        )
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id)
    }

    pub fn move_to(&self, id: &str, status: TicketStatus) -> Result<Ticket> {
        self.inner.move_to(id, status.as_str())
    }

    pub fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        self.inner.list(&ListFilter {
            classifier: filter.status.map(|s| s.as_str().to_string()),
            tag: filter.tag.clone(),
            query: filter.query.clone(),
        })
    }

    /// Every ticket grouped by status. All four statuses are present, possibly empty.
    pub fn list_all(&self) -> Result<BTreeMap<TicketStatus, Vec<Ticket>>> {
        let mut grouped: BTreeMap<TicketStatus, Vec<Ticket>> =
            TicketStatus::ALL.into_iter().map(|s| (s, Vec::new())).collect();

        for ticket in self.inner.list(&ListFilter::default())? {
            match ticket.status() {
                Some(status) => grouped.entry(status).or_default().push(ticket),
                None => warn!(
                    id = %ticket.id(),
                    dir = %ticket.classifier,
                    "Ticket in unknown status directory"
                ),
            }
        }
        Ok(grouped)
    }

    pub fn add_comment(
        &self,
        id: &str,
        author: &str,
        kind: CommentType,
        content: &str,
        action: Option<CommentAction>,
    ) -> Result<Comment> {
        self.inner.add_comment(id, author, kind, content, action)
    }

    /// Adds a review-request comment carrying a `git_diff` action for `repo_path`.
    pub fn request_review(
        &self,
        id: &str,
        author: &str,
        repo_path: &str,
        summary: &str,
    ) -> Result<Comment> {
        self.add_comment(
            id,
            author,
            CommentType::ReviewRequested,
            summary,
            Some(CommentAction::git_diff(repo_path, None)),
        )
    }

    pub fn list_comments(&self, id: &str) -> Result<Vec<Comment>> {
        self.inner.list_comments(id)
    }

    /// Directory holding the ticket's `index.md` and comments.
    pub fn path_of(&self, id: &str) -> Result<PathBuf> {
        self.inner.path_of(id)
    }
}

fn validate_type(ticket_type: String) -> Result<String> {
    if ticket_type.trim().is_empty() {
        return Err(CortexError::validation("type", "cannot be empty"));
    }
    Ok(ticket_type)
}
