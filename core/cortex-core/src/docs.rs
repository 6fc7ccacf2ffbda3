//! Docs: one markdown file per document, filed under a free-form category.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs_err as fs;

use crate::error::{CortexError, Result};
use crate::events::EventSink;
use crate::storage::ProjectPaths;
use crate::store::atomic::is_ignored_name;
use crate::store::{Entity, EntityMeta, EntityStore, EntityUpdate, Layout, ListFilter, NewEntity};

const SLUG_FALLBACK: &str = "doc";

pub type Doc = Entity<EntityMeta>;

pub struct DocStore {
    inner: EntityStore<EntityMeta>,
}

impl DocStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DocStore {
            inner: EntityStore::new(root, Layout::Flat, "doc", SLUG_FALLBACK),
        }
    }

    /// Store rooted at `{project}/.cortex/docs`, tagging events with the project.
    pub fn for_project(project: &Path) -> Self {
        let paths = ProjectPaths::new(project);
        DocStore {
            inner: EntityStore::new(paths.docs_dir(), Layout::Flat, "doc", SLUG_FALLBACK)
                .with_project(project),
        }
    }

    pub fn with_events(self, sink: Arc<dyn EventSink>) -> Self {
        DocStore {
            inner: self.inner.with_events(sink),
        }
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }

    pub fn create(
        &self,
        title: &str,
        category: &str,
        body: &str,
        tags: Vec<String>,
        references: Vec<String>,
    ) -> Result<Doc> {
        self.inner.create(NewEntity {
            title: title.to_string(),
            classifier: category.to_string(),
            body: body.to_string(),
            tags,
            references,
        })
    }

    pub fn get(&self, id: &str) -> Result<Doc> {
        self.inner.get(id)
    }

    pub fn update(&self, id: &str, update: EntityUpdate) -> Result<Doc> {
        self.inner.update(id, update)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id)
    }

    pub fn move_to(&self, id: &str, category: &str) -> Result<Doc> {
        self.inner.move_to(id, category)
    }

    /// Empty strings mean "no filter" for each of `category`, `tag` and `query`.
    pub fn list(&self, category: &str, tag: &str, query: &str) -> Result<Vec<Doc>> {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        self.inner.list(&ListFilter {
            classifier: non_empty(category),
            tag: non_empty(tag),
            query: non_empty(query),
        })
    }

    /// Category directories that currently exist, sorted.
    pub fn categories(&self) -> Result<Vec<String>> {
        let root = self.inner.root();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CortexError::io(format!("reading {}", root.display()), e)),
        };

        let mut categories = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| CortexError::io(format!("reading {}", root.display()), e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && !is_ignored_name(&name) {
                categories.push(name);
            }
        }
        categories.sort();
        Ok(categories)
    }

    /// Path of the doc's markdown file.
    pub fn path_of(&self, id: &str) -> Result<PathBuf> {
        self.inner.path_of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn docs_are_flat_files_per_category() {
        let temp = TempDir::new().unwrap();
        let store = DocStore::new(temp.path().join("docs"));

        let doc = store
            .create("Auth Flow", "architecture", "Tokens...", vec![], vec![])
            .unwrap();

        assert!(doc.path.is_file());
        assert_eq!(doc.path.parent().unwrap(), temp.path().join("docs/architecture"));
        assert_eq!(store.path_of(doc.id()).unwrap(), doc.path);
    }

    #[test]
    fn untitled_slug_falls_back_to_doc() {
        let temp = TempDir::new().unwrap();
        let store = DocStore::new(temp.path().join("docs"));

        let doc = store.create("???", "misc", "", vec![], vec![]).unwrap();

        let name = doc.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("doc-"), "{name}");
    }

    #[test]
    fn empty_filters_list_everything() {
        let temp = TempDir::new().unwrap();
        let store = DocStore::new(temp.path().join("docs"));
        store.create("One", "a", "", vec![], vec![]).unwrap();
        store.create("Two", "b", "", vec!["x".into()], vec![]).unwrap();

        assert_eq!(store.list("", "", "").unwrap().len(), 2);
        assert_eq!(store.list("b", "", "").unwrap().len(), 1);
        assert_eq!(store.list("", "X", "").unwrap().len(), 1);
        assert_eq!(store.list("", "", "one").unwrap().len(), 1);
        assert_eq!(store.categories().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn categories_on_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = DocStore::new(temp.path().join("nothing"));
        assert!(store.categories().unwrap().is_empty());
    }
}
