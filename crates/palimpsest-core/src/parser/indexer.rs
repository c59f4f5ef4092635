//! Wires file discovery and per-language extraction into the Memory Manager
//! (spec.md §4.6): one `Component` memory per class/struct/interface found,
//! one `Function` memory per function/method, each carrying the extracted
//! `file_path`/`start_line`/`end_line`/`language`/`containing_class`/`imports`
//! payload fields. Re-indexing a file whose content hash has not changed is a
//! no-op unless `force` is set, mirroring the teacher's content-hash-gated
//! upsert in `vestige-core`'s ingestion path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;

use crate::memory::{content_hash, Memory, MemoryManager, MemoryManagerError, MemoryType};
use crate::storage::{Filter, VectorStoreAdapter, VectorStoreError};

use super::ignore_walk::discover_files;
use super::language::LanguageParser;
use super::languages;
use super::model::{ParseError, ParsedFile};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to read '{path}': {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Vector(#[from] VectorStoreError),
    #[error(transparent)]
    Manager(#[from] MemoryManagerError),
    #[error("indexing task panicked: {0}")]
    Join(String),
    #[error("'{path}' resolves outside the project root '{root}'")]
    PathTraversal { path: String, root: String },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Outcome of an [`Indexer::index_path`] run (spec.md §4.6).
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_skipped_unchanged: usize,
    pub files_unsupported: usize,
    pub memories_created: usize,
    pub errors: Vec<String>,
}

/// Scans source files, extracts code entities, and persists them as memories
/// through a [`MemoryManager`]. Holds its own [`VectorStoreAdapter`] handle
/// (rather than reaching into the manager's) to run the content-hash lookup
/// that decides whether a file needs re-indexing at all, the same layering
/// [`crate::query::QueryEngine`] and [`crate::sync::SyncManager`] use.
pub struct Indexer {
    manager: Arc<MemoryManager>,
    vectors: Arc<dyn VectorStoreAdapter>,
    project_id: String,
    parsers: Vec<Box<dyn LanguageParser>>,
    root: PathBuf,
}

impl Indexer {
    pub fn new(manager: Arc<MemoryManager>, vectors: Arc<dyn VectorStoreAdapter>, project_id: impl Into<String>) -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { manager, vectors, project_id: project_id.into(), parsers: languages::all(), root }
    }

    /// spec.md §7: "ingestion paths outside the project root: rejected
    /// before I/O." Defaults to the process's current directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn parser_for(&self, path: &Path) -> Option<&dyn LanguageParser> {
        let ext = path.extension()?.to_str()?;
        self.parsers.iter().find(|p| p.extensions().contains(&ext)).map(|p| p.as_ref())
    }

    /// Rejects any path that, once `..`/`.` segments are resolved, falls
    /// outside `self.root` — without touching the filesystem, so a rejected
    /// path never reaches a vector or graph write.
    fn check_within_root(&self, path: &Path) -> Result<PathBuf> {
        let joined = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };

        let mut resolved = PathBuf::new();
        for component in joined.components() {
            match component {
                std::path::Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(IndexError::PathTraversal {
                            path: path.display().to_string(),
                            root: self.root.display().to_string(),
                        });
                    }
                }
                std::path::Component::CurDir => {}
                other => resolved.push(other),
            }
        }

        if !resolved.starts_with(&self.root) {
            return Err(IndexError::PathTraversal {
                path: path.display().to_string(),
                root: self.root.display().to_string(),
            });
        }
        Ok(resolved)
    }

    /// spec.md §4.6: `path` may be a single file or a directory, recursed
    /// with the ignore filter; `force` bypasses the unchanged-hash skip.
    pub async fn index_path(&self, path: &Path, force: bool) -> Result<IndexSummary> {
        let resolved = self.check_within_root(path)?;
        let files = if resolved.is_dir() { discover_files(&resolved) } else { vec![resolved] };

        let mut summary = IndexSummary::default();
        for file in files {
            summary.files_scanned += 1;
            match self.index_file(&file, force).await {
                Ok(Outcome::Indexed(created)) => {
                    summary.files_indexed += 1;
                    summary.memories_created += created;
                }
                Ok(Outcome::SkippedUnchanged) => summary.files_skipped_unchanged += 1,
                Ok(Outcome::Unsupported) => summary.files_unsupported += 1,
                Err(err) => summary.errors.push(format!("{}: {err}", file.display())),
            }
        }
        Ok(summary)
    }

    async fn index_file(&self, path: &Path, force: bool) -> Result<Outcome> {
        let Some(parser) = self.parser_for(path) else {
            return Ok(Outcome::Unsupported);
        };

        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| IndexError::Read { path: path.display().to_string(), source })?;
        let hash = content_hash(&source);
        let file_path = path.to_string_lossy().to_string();

        if !force && self.is_unchanged(&file_path, &hash).await? {
            return Ok(Outcome::SkippedUnchanged);
        }

        let language = parser.language().to_string();
        let path_owned = path.to_path_buf();
        let source_for_parse = source.clone();
        let parsed: ParsedFile = task::spawn_blocking(move || {
            languages::all()
                .into_iter()
                .find(|p| p.language() == language)
                .expect("language selected by parser_for always has a matching languages::all() entry")
                .parse(&source_for_parse, &path_owned)
        })
        .await
        .map_err(|e| IndexError::Join(e.to_string()))??;

        let mut created = 0usize;
        for class in &parsed.classes {
            let mut memory = Memory::new(self.project_id.clone(), MemoryType::Component, class.content.clone());
            memory.payload.file_path = Some(file_path.clone());
            memory.payload.start_line = Some(class.start_line);
            memory.payload.end_line = Some(class.end_line);
            memory.payload.language = Some(parsed.language.clone());
            self.manager.add(memory, false).await?;
            created += 1;
        }

        for function in &parsed.functions {
            let mut memory = Memory::new(self.project_id.clone(), MemoryType::Function, function.content.clone());
            memory.payload.file_path = Some(file_path.clone());
            memory.payload.start_line = Some(function.start_line);
            memory.payload.end_line = Some(function.end_line);
            memory.payload.language = Some(parsed.language.clone());
            memory.payload.containing_class = function.containing_class.clone();
            memory.payload.imports = parsed.imports.clone();
            self.manager.add(memory, false).await?;
            created += 1;
        }

        Ok(Outcome::Indexed(created))
    }

    /// True when a `Function`/`Component` memory already exists for this
    /// file path carrying this exact content hash — nothing in it changed
    /// since the last index run.
    async fn is_unchanged(&self, file_path: &str, hash: &str) -> Result<bool> {
        for memory_type in [MemoryType::Function, MemoryType::Component] {
            let collection = self.vectors.get_collection_name(&self.project_id, memory_type);
            let filter = Filter::scoped(&self.project_id).eq("file_path", file_path.to_string());
            let page = self.vectors.scroll(&collection, &filter, 1, None).await?;
            if let Some(point) = page.points.first() {
                if point.payload.get("content_hash").and_then(|v| v.as_str()) == Some(hash) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

enum Outcome {
    Indexed(usize),
    SkippedUnchanged,
    Unsupported,
}
