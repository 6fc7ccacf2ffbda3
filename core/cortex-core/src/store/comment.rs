//! Append-only comment files inside a directory-layout entity.
//!
//! Each comment is its own `comment-<short id>.md` frontmatter file next to the
//! entity's `index.md`, so moving the entity directory carries its thread along.

use std::path::Path;

use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::atomic::{is_ignored_name, write_atomic};
use super::frontmatter;
use super::slug::short_id;
use crate::error::{CortexError, Result};

const COMMENT_PREFIX: &str = "comment-";
const COMMENT_SUFFIX: &str = ".md";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    ReviewRequested,
    Done,
    Blocker,
    #[default]
    #[serde(alias = "general")]
    Comment,
}

/// Structured follow-up attached to a comment. The store never inspects `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitDiffArgs {
    pub repo_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl CommentAction {
    pub const GIT_DIFF: &'static str = "git_diff";

    /// Review action pointing at a repository and, optionally, a single commit.
    pub fn git_diff(repo_path: impl Into<String>, commit: Option<String>) -> Self {
        let args = GitDiffArgs {
            repo_path: repo_path.into(),
            commit,
        };
        CommentAction {
            kind: Self::GIT_DIFF.to_string(),
            args: serde_json::to_value(args).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Decodes `args` as [`GitDiffArgs`] when this is a `git_diff` action.
    pub fn git_diff_args(&self) -> Option<GitDiffArgs> {
        if self.kind != Self::GIT_DIFF {
            return None;
        }
        serde_json::from_value(self.args.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentMeta {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "type", default)]
    pub kind: CommentType,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<CommentAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub meta: CommentMeta,
    pub content: String,
}

/// Writes a new comment into `entity_dir`.
pub fn create_comment(
    entity_dir: &Path,
    author: &str,
    kind: CommentType,
    content: &str,
    action: Option<CommentAction>,
) -> Result<Comment> {
    if content.trim().is_empty() {
        return Err(CortexError::validation("content", "cannot be empty"));
    }

    let meta = CommentMeta {
        id: Uuid::new_v4().to_string(),
        author: author.to_string(),
        kind,
        created: Utc::now(),
        action,
    };

    let text = frontmatter::serialize(&meta, content).map_err(|source| {
        CortexError::Frontmatter {
            context: format!("serializing comment {}", meta.id),
            source,
        }
    })?;

    let path = entity_dir.join(format!(
        "{COMMENT_PREFIX}{}{COMMENT_SUFFIX}",
        short_id(&meta.id)
    ));
    write_atomic(&path, text.as_bytes())?;

    Ok(Comment {
        meta,
        content: content.to_string(),
    })
}

/// Every comment in `entity_dir`, oldest first. Ties on `created` order by id.
pub fn list_comments(entity_dir: &Path) -> Result<Vec<Comment>> {
    let entries = match fs::read_dir(entity_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CortexError::io(
                format!("reading comments in {}", entity_dir.display()),
                e,
            ))
        }
    };

    let mut comments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            CortexError::io(format!("reading comments in {}", entity_dir.display()), e)
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_ignored_name(&name)
            || !name.starts_with(COMMENT_PREFIX)
            || !name.ends_with(COMMENT_SUFFIX)
        {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let text = fs::read_to_string(&path)
            .map_err(|e| CortexError::io(format!("reading {}", path.display()), e))?;
        let (meta, content) = frontmatter::parse::<CommentMeta>(&text).map_err(|source| {
            CortexError::Frontmatter {
                context: path.display().to_string(),
                source,
            }
        })?;
        comments.push(Comment { meta, content });
    }

    comments.sort_by(|a, b| {
        a.meta
            .created
            .cmp(&b.meta.created)
            .then_with(|| a.meta.id.cmp(&b.meta.id))
    });
    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn write_raw(dir: &Path, name: &str, id: &str, created: DateTime<Utc>, body: &str) {
        let meta = CommentMeta {
            id: id.to_string(),
            author: "tester".to_string(),
            kind: CommentType::Comment,
            created,
            action: None,
        };
        let text = frontmatter::serialize(&meta, body).unwrap();
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn create_writes_comment_file() {
        let temp = TempDir::new().unwrap();

        let comment = create_comment(
            temp.path(),
            "architect",
            CommentType::Blocker,
            "Waiting on API keys",
            None,
        )
        .unwrap();

        let expected = temp
            .path()
            .join(format!("comment-{}.md", short_id(&comment.meta.id)));
        assert!(expected.exists());

        let listed = list_comments(temp.path()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], comment);
    }

    #[test]
    fn empty_content_is_rejected() {
        let temp = TempDir::new().unwrap();
        let err = create_comment(temp.path(), "a", CommentType::Comment, "", None).unwrap_err();
        assert!(err.is_validation());
        assert!(list_comments(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn action_survives_round_trip() {
        let temp = TempDir::new().unwrap();
        let action = CommentAction::git_diff("/repo", Some("abc123".to_string()));

        create_comment(
            temp.path(),
            "agent",
            CommentType::ReviewRequested,
            "Please review",
            Some(action.clone()),
        )
        .unwrap();

        let listed = list_comments(temp.path()).unwrap();
        let stored = listed[0].meta.action.as_ref().unwrap();
        assert_eq!(stored, &action);
        assert_eq!(
            stored.git_diff_args(),
            Some(GitDiffArgs {
                repo_path: "/repo".to_string(),
                commit: Some("abc123".to_string()),
            })
        );
    }

    #[test]
    fn list_sorts_by_created_then_id() {
        let temp = TempDir::new().unwrap();
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        write_raw(temp.path(), "comment-cccccccc.md", "cccccccc-1", late, "third");
        write_raw(temp.path(), "comment-bbbbbbbb.md", "bbbbbbbb-1", early, "second");
        write_raw(temp.path(), "comment-aaaaaaaa.md", "aaaaaaaa-1", early, "first");

        let bodies: Vec<_> = list_comments(temp.path())
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[test]
    fn list_ignores_other_files_and_missing_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.md"), "---\nid: x\n---\n").unwrap();
        fs::write(temp.path().join(".tmp-123"), "partial").unwrap();

        assert!(list_comments(temp.path()).unwrap().is_empty());
        assert!(list_comments(&temp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn general_alias_parses_as_comment() {
        let text = "---\nid: x\nauthor: a\ntype: general\ncreated: 2025-01-01T00:00:00Z\n---\nhi";
        let (meta, _): (CommentMeta, String) = frontmatter::parse(text).unwrap();
        assert_eq!(meta.kind, CommentType::Comment);
    }
}
