//! File-backed storage primitives shared by tickets and docs.
//!
//! Everything here writes human-editable text: YAML frontmatter on top of a
//! markdown body, replaced atomically on every save.

pub mod atomic;
pub mod comment;
pub mod entity;
pub mod frontmatter;
pub mod locks;
pub mod slug;

pub use atomic::write_atomic;
pub use comment::{Comment, CommentAction, CommentMeta, CommentType, GitDiffArgs};
pub use entity::{
    Entity, EntityMeta, EntityStore, EntityUpdate, Layout, ListFilter, NewEntity, Record,
};
pub use frontmatter::FrontmatterError;
pub use slug::{dir_name, generate_slug, short_id};
