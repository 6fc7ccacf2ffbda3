//! Generic file-backed CRUD for frontmatter entities.
//!
//! Entities live under `root/<classifier>/`, where the classifier is a ticket status or
//! a doc category. The classifier is derived from the directory an entity sits in and
//! is never written into the file itself.
//!
//! # Layouts
//!
//! - [`Layout::Flat`]: `root/<classifier>/<slug>-<short id>.md`
//! - [`Layout::Directory`]: `root/<classifier>/<slug>-<short id>/index.md`, plus
//!   `comment-*.md` files beside it
//!
//! # Concurrency
//!
//! Mutations take a per-ID lock, so two writers on one entity are serialized while
//! writers on different entities proceed in parallel. Reads take no lock, and a `list`
//! racing a `move_to` may see the entity in either place or, briefly, in neither.
//! There is no cross-process locking; one daemon process owns a project at a time.
//!
//! # Renames
//!
//! Title changes and moves never leave zero copies behind. Directory entities are
//! renamed in one step after the new `index.md` is written; flat entities write the new
//! file first and then remove the old one.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::atomic::{is_ignored_name, write_atomic};
use super::comment::{self, Comment, CommentAction, CommentType};
use super::frontmatter;
use super::locks::KeyedLocks;
use super::slug::{self, short_id};
use crate::error::{CortexError, Result};
use crate::events::{Event, EventKind, EventSink, NoopSink};

/// File holding a directory entity's own frontmatter.
pub const INDEX_FILE: &str = "index.md";

const ENTITY_EXT: &str = "md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Flat,
    Directory,
}

/// Fields every stored entity carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Metadata shape stored in an entity's frontmatter.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn from_meta(meta: EntityMeta) -> Self;
    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Hook run when the entity changes classifier, before it is persisted.
    fn on_move(&mut self, _to: &str, _now: DateTime<Utc>) {}
}

impl Record for EntityMeta {
    fn from_meta(meta: EntityMeta) -> Self {
        meta
    }

    fn meta(&self) -> &EntityMeta {
        self
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        self
    }
}

/// A loaded entity together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<M> {
    pub meta: M,
    pub classifier: String,
    pub body: String,
    /// The entity's file (flat) or directory (directory layout).
    pub path: PathBuf,
}

impl<M: Record> Entity<M> {
    pub fn id(&self) -> &str {
        &self.meta.meta().id
    }

    pub fn title(&self) -> &str {
        &self.meta.meta().title
    }

    pub fn tags(&self) -> &[String] {
        &self.meta.meta().tags
    }

    pub fn references(&self) -> &[String] {
        &self.meta.meta().references
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.meta.meta().created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.meta.meta().updated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntity {
    pub title: String,
    pub classifier: String,
    pub body: String,
    pub tags: Vec<String>,
    pub references: Vec<String>,
}

/// Partial update. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub references: Option<Vec<String>>,
}

impl EntityUpdate {
    fn apply<M: Record>(self, entity: &mut Entity<M>) {
        let meta = entity.meta.meta_mut();
        if let Some(title) = self.title {
            meta.title = title;
        }
        if let Some(tags) = self.tags {
            meta.tags = tags;
        }
        if let Some(references) = self.references {
            meta.references = references;
        }
        if let Some(body) = self.body {
            entity.body = body;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub classifier: Option<String>,
    /// Exact, case-insensitive tag match.
    pub tag: Option<String>,
    /// Case-insensitive substring of title or body.
    pub query: Option<String>,
}

impl ListFilter {
    pub fn classifier(classifier: impl Into<String>) -> Self {
        ListFilter {
            classifier: Some(classifier.into()),
            ..Default::default()
        }
    }

    fn matches<M: Record>(&self, entity: &Entity<M>) -> bool {
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            let tag = tag.to_lowercase();
            if !entity.tags().iter().any(|t| t.to_lowercase() == tag) {
                return false;
            }
        }
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            if !entity.title().to_lowercase().contains(&query)
                && !entity.body.to_lowercase().contains(&query)
            {
                return false;
            }
        }
        true
    }
}

/// One on-disk entry found while scanning classifier directories.
#[derive(Debug, Clone)]
struct Slot {
    classifier: String,
    path: PathBuf,
}

pub struct EntityStore<M> {
    root: PathBuf,
    layout: Layout,
    kind: &'static str,
    fallback: &'static str,
    locks: KeyedLocks,
    sink: Arc<dyn EventSink>,
    project: Option<PathBuf>,
    _record: PhantomData<fn() -> M>,
}

impl<M: Record> EntityStore<M> {
    /// `kind` labels errors and events ("ticket", "doc"); `fallback` names entities
    /// whose title has no sluggable characters.
    pub fn new(
        root: impl Into<PathBuf>,
        layout: Layout,
        kind: &'static str,
        fallback: &'static str,
    ) -> Self {
        EntityStore {
            root: root.into(),
            layout,
            kind,
            fallback,
            locks: KeyedLocks::new(),
            sink: Arc::new(NoopSink),
            project: None,
            _record: PhantomData,
        }
    }

    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Project path stamped onto emitted events.
    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn create(&self, new: NewEntity) -> Result<Entity<M>> {
        self.create_with(new, |_| {})
    }

    /// Creates an entity, letting `customize` fill kind-specific metadata first.
    pub fn create_with(&self, new: NewEntity, customize: impl FnOnce(&mut M)) -> Result<Entity<M>> {
        validate_title(&new.title)?;
        validate_classifier(&new.classifier)?;

        let now = Utc::now();
        let mut meta = M::from_meta(EntityMeta {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            tags: new.tags,
            references: new.references,
            created: now,
            updated: now,
        });
        customize(&mut meta);

        let id = meta.meta().id.clone();
        let path = self.entry_path(&new.classifier, meta.meta());
        let entity = Entity {
            meta,
            classifier: new.classifier,
            body: new.body,
            path,
        };

        self.locks.with(&id, || self.persist(&entity))?;
        self.locks.register(&id);

        debug!(kind = self.kind, id = %id, classifier = %entity.classifier, "Entity created");
        self.emit(EventKind::Created, &id);
        Ok(entity)
    }

    /// Loads an entity by full or short ID.
    pub fn get(&self, id: &str) -> Result<Entity<M>> {
        let slot = self.locate(id)?;
        self.load(&slot)
    }

    pub fn update(&self, id: &str, update: EntityUpdate) -> Result<Entity<M>> {
        self.update_with(id, |entity| {
            update.apply(entity);
            Ok(())
        })
    }

    /// Applies `change` under the entity's lock, bumps `updated` and persists.
    ///
    /// A changed title renames the entity on disk.
    pub fn update_with(
        &self,
        id: &str,
        change: impl FnOnce(&mut Entity<M>) -> Result<()>,
    ) -> Result<Entity<M>> {
        let slot = self.locate(id)?;
        let full_id = self.load(&slot)?.id().to_string();

        let entity = self.locks.with(&full_id, || {
            // Re-resolve under the lock in case a concurrent move or rename won.
            let slot = self.locate(&full_id)?;
            let mut entity = self.load(&slot)?;
            change(&mut entity)?;
            validate_title(entity.title())?;

            touch(&mut entity.meta);
            self.relocate(&mut entity, &slot.classifier)?;
            Ok::<_, CortexError>(entity)
        })?;

        self.emit(EventKind::Updated, &full_id);
        Ok(entity)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let slot = self.locate(id)?;
        let full_id = self.load(&slot)?.id().to_string();

        self.locks.with(&full_id, || {
            let slot = self.locate(&full_id)?;
            self.remove_slot(&slot.path)
        })?;
        self.locks.evict(&full_id);

        debug!(kind = self.kind, id = %full_id, "Entity deleted");
        self.emit(EventKind::Deleted, &full_id);
        Ok(())
    }

    /// Moves an entity to another classifier. Moving to the current one is a no-op.
    pub fn move_to(&self, id: &str, classifier: &str) -> Result<Entity<M>> {
        validate_classifier(classifier)?;
        let slot = self.locate(id)?;
        let full_id = self.load(&slot)?.id().to_string();

        let moved = self.locks.with(&full_id, || {
            let slot = self.locate(&full_id)?;
            let mut entity = self.load(&slot)?;
            if entity.classifier == classifier {
                return Ok::<_, CortexError>(None);
            }

            let now = touch(&mut entity.meta);
            entity.meta.on_move(classifier, now);
            entity.classifier = classifier.to_string();
            self.relocate(&mut entity, &slot.classifier)?;
            Ok(Some(entity))
        })?;

        match moved {
            Some(entity) => {
                debug!(kind = self.kind, id = %full_id, to = classifier, "Entity moved");
                self.emit(EventKind::Updated, &full_id);
                Ok(entity)
            }
            None => self.get(&full_id),
        }
    }

    /// Lists entities, oldest first. A missing root yields an empty list.
    ///
    /// Files that fail to parse are skipped with a warning so one hand-edited file
    /// cannot hide the rest.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Entity<M>>> {
        let classifier = filter.classifier.as_deref().filter(|c| !c.is_empty());
        if let Some(c) = classifier {
            validate_classifier(c)?;
        }
        let mut entities = Vec::new();

        for slot in self.scan(classifier)? {
            match self.load(&slot) {
                Ok(entity) if filter.matches(&entity) => entities.push(entity),
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, path = %slot.path.display(), "Skipping unreadable entity")
                }
            }
        }

        entities.sort_by(|a, b| {
            a.created()
                .cmp(&b.created())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(entities)
    }

    pub fn add_comment(
        &self,
        id: &str,
        author: &str,
        kind: CommentType,
        content: &str,
        action: Option<CommentAction>,
    ) -> Result<Comment> {
        self.require_directory_layout()?;
        let slot = self.locate(id)?;
        let full_id = self.load(&slot)?.id().to_string();

        let comment = self.locks.with(&full_id, || {
            let slot = self.locate(&full_id)?;
            comment::create_comment(&slot.path, author, kind, content, action)
        })?;

        self.emit(EventKind::CommentAdded, &full_id);
        Ok(comment)
    }

    pub fn list_comments(&self, id: &str) -> Result<Vec<Comment>> {
        self.require_directory_layout()?;
        let slot = self.locate(id)?;
        comment::list_comments(&slot.path)
    }

    /// Path of the entity's file (flat) or directory (directory layout).
    pub fn path_of(&self, id: &str) -> Result<PathBuf> {
        Ok(self.locate(id)?.path)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Paths and scanning
    // ─────────────────────────────────────────────────────────────────────────────

    fn entry_path(&self, classifier: &str, meta: &EntityMeta) -> PathBuf {
        let stem = slug::dir_name(&meta.title, &meta.id, self.fallback);
        let dir = self.root.join(classifier);
        match self.layout {
            Layout::Flat => dir.join(format!("{stem}.{ENTITY_EXT}")),
            Layout::Directory => dir.join(stem),
        }
    }

    fn document_path(&self, entry: &Path) -> PathBuf {
        match self.layout {
            Layout::Flat => entry.to_path_buf(),
            Layout::Directory => entry.join(INDEX_FILE),
        }
    }

    /// Name stem that carries the short ID, or `None` if the entry is not an entity.
    fn stem<'a>(&self, name: &'a str, is_dir: bool) -> Option<&'a str> {
        if is_ignored_name(name) {
            return None;
        }
        match self.layout {
            Layout::Flat if !is_dir => name
                .strip_suffix(ENTITY_EXT)
                .and_then(|s| s.strip_suffix('.')),
            Layout::Directory if is_dir => Some(name),
            _ => None,
        }
    }

    /// Entity entries under one classifier, or all of them, in name order.
    fn scan(&self, classifier: Option<&str>) -> Result<Vec<Slot>> {
        let (base, depth) = match classifier {
            Some(c) => (self.root.join(c), 1),
            None => (self.root.clone(), 2),
        };
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let walker = WalkDir::new(&base)
            .min_depth(depth)
            .max_depth(depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored_name(&e.file_name().to_string_lossy()));

        let mut slots = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let context = format!("scanning {}", base.display());
                match e.into_io_error() {
                    Some(io) => CortexError::io(context, io),
                    None => CortexError::io(
                        context,
                        std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"),
                    ),
                }
            })?;

            let name = entry.file_name().to_string_lossy();
            if self.stem(&name, entry.file_type().is_dir()).is_none() {
                continue;
            }

            let classifier = match classifier {
                Some(c) => c.to_string(),
                None => match entry.path().parent().and_then(Path::file_name) {
                    Some(parent) => parent.to_string_lossy().to_string(),
                    None => continue,
                },
            };
            slots.push(Slot {
                classifier,
                path: entry.into_path(),
            });
        }
        Ok(slots)
    }

    /// Finds an entity by full or short ID across every classifier.
    ///
    /// When two entries share a short ID, a full ID is checked against each file's
    /// stored id; a bare short ID takes the first entry in name order.
    fn locate(&self, id: &str) -> Result<Slot> {
        let id = id.trim();
        if id.is_empty() {
            return Err(CortexError::not_found(self.kind, id));
        }
        let short_suffix = format!("-{}", short_id(id));
        let full_suffix = format!("-{id}");

        let mut candidates: Vec<Slot> = self
            .scan(None)?
            .into_iter()
            .filter(|slot| {
                let name = slot.path.file_name().map(|n| n.to_string_lossy().to_string());
                let is_dir = self.layout == Layout::Directory;
                name.as_deref()
                    .and_then(|n| self.stem(n, is_dir))
                    .map(|stem| stem.ends_with(&short_suffix) || stem.ends_with(&full_suffix))
                    .unwrap_or(false)
            })
            .collect();

        match candidates.len() {
            0 => Err(CortexError::not_found(self.kind, id)),
            1 => Ok(candidates.remove(0)),
            n => {
                if id.len() > slug::SHORT_ID_LEN {
                    for slot in &candidates {
                        if matches!(self.load(slot), Ok(e) if e.id() == id) {
                            return Ok(slot.clone());
                        }
                    }
                }
                warn!(
                    kind = self.kind,
                    id = %id,
                    matches = n,
                    chosen = %candidates[0].path.display(),
                    "Short ID matches several entities; using the first"
                );
                Ok(candidates.remove(0))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reading and writing
    // ─────────────────────────────────────────────────────────────────────────────

    fn load(&self, slot: &Slot) -> Result<Entity<M>> {
        let doc = self.document_path(&slot.path);
        let text = fs::read_to_string(&doc)
            .map_err(|e| CortexError::io(format!("reading {}", doc.display()), e))?;
        let (meta, body) =
            frontmatter::parse::<M>(&text).map_err(|source| CortexError::Frontmatter {
                context: doc.display().to_string(),
                source,
            })?;
        Ok(Entity {
            meta,
            classifier: slot.classifier.clone(),
            body,
            path: slot.path.clone(),
        })
    }

    /// Writes the entity's document at `entity.path`, creating directories as needed.
    fn persist(&self, entity: &Entity<M>) -> Result<()> {
        let dir = match self.layout {
            Layout::Flat => entity.path.parent().map(Path::to_path_buf),
            Layout::Directory => Some(entity.path.clone()),
        };
        if let Some(dir) = dir {
            fs::create_dir_all(&dir)
                .map_err(|e| CortexError::io(format!("creating {}", dir.display()), e))?;
        }

        let text = frontmatter::serialize(&entity.meta, &entity.body).map_err(|source| {
            CortexError::Frontmatter {
                context: format!("serializing {} {}", self.kind, entity.id()),
                source,
            }
        })?;
        write_atomic(&self.document_path(&entity.path), text.as_bytes())
    }

    /// Persists `entity` at the path its title and classifier call for, moving it from
    /// its current `entity.path` when the two differ.
    fn relocate(&self, entity: &mut Entity<M>, from_classifier: &str) -> Result<()> {
        let old_path = entity.path.clone();
        let new_path = self.entry_path(&entity.classifier, entity.meta.meta());
        if new_path == old_path {
            return self.persist(entity);
        }

        match self.layout {
            Layout::Directory => {
                self.persist(entity)?;
                if let Some(parent) = new_path.parent() {
                    fs::create_dir_all(parent).map_err(|e| {
                        CortexError::io(format!("creating {}", parent.display()), e)
                    })?;
                }
                fs::rename(&old_path, &new_path).map_err(|e| {
                    CortexError::io(
                        format!(
                            "moving {} from {} to {}",
                            entity.id(),
                            from_classifier,
                            new_path.display()
                        ),
                        e,
                    )
                })?;
                entity.path = new_path;
            }
            Layout::Flat => {
                entity.path = new_path;
                self.persist(entity)?;
                self.remove_slot(&old_path)?;
            }
        }
        Ok(())
    }

    fn remove_slot(&self, path: &Path) -> Result<()> {
        let result = match self.layout {
            Layout::Flat => fs::remove_file(path),
            Layout::Directory => fs::remove_dir_all(path),
        };
        result.map_err(|e| CortexError::io(format!("removing {}", path.display()), e))
    }

    fn require_directory_layout(&self) -> Result<()> {
        match self.layout {
            Layout::Directory => Ok(()),
            Layout::Flat => Err(CortexError::validation(
                "comments",
                format!("{} entities do not support comments", self.kind),
            )),
        }
    }

    fn emit(&self, kind: EventKind, id: &str) {
        self.sink.emit(Event {
            kind,
            entity: self.kind.to_string(),
            id: id.to_string(),
            project: self.project.clone(),
        });
    }
}

/// Bumps `updated` to now, never earlier than `created`. Returns the new stamp.
fn touch<M: Record>(meta: &mut M) -> DateTime<Utc> {
    let meta = meta.meta_mut();
    let now = Utc::now().max(meta.created);
    meta.updated = now;
    now
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(CortexError::validation("title", "cannot be empty"));
    }
    Ok(())
}

/// Classifiers become directory names, so they must be a single visible path segment.
fn validate_classifier(classifier: &str) -> Result<()> {
    if classifier.trim().is_empty() {
        return Err(CortexError::validation("classifier", "cannot be empty"));
    }
    if classifier.contains(['/', '\\']) || classifier.starts_with('.') {
        return Err(CortexError::validation(
            "classifier",
            format!("invalid directory name: {classifier}"),
        ));
    }
    Ok(())
}
