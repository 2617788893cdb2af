use crate::db::VectorStore;
use crate::db::models::{ChunkPoint, ChunkRole};
use crate::db::StoreError;
use crate::embedder::{EmbedTask, Embedder, EmbedderError};
use crate::indexer::graph::build_file_chunks;
use crate::indexer::layout::{SourceLayout, classify_role};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] ignore::Error),

    #[error(transparent)]
    Embed(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub projects: usize,
    pub files_indexed: usize,
    /// Files skipped because they are not valid UTF-8.
    pub files_skipped: usize,
    pub chunks_written: usize,
    pub chunks_by_role: HashMap<ChunkRole, usize>,
}

impl IndexStats {
    fn merge(&mut self, other: IndexStats) {
        self.projects += other.projects;
        self.files_indexed += other.files_indexed;
        self.files_skipped += other.files_skipped;
        self.chunks_written += other.chunks_written;
        for (role, n) in other.chunks_by_role {
            *self.chunks_by_role.entry(role).or_default() += n;
        }
    }
}

/// Write path of the graph: walks service projects, builds role-tagged
/// chunks and upserts them one at a time.
///
/// Embedding and store failures abort the run; so does any read error other
/// than invalid UTF-8.
pub struct Indexer<'a, E: Embedder + ?Sized, S: VectorStore + ?Sized> {
    pub embedder: &'a E,
    pub store: &'a S,
    pub layout: SourceLayout,
}

impl<'a, E: Embedder + ?Sized, S: VectorStore + ?Sized> Indexer<'a, E, S> {
    pub fn new(embedder: &'a E, store: &'a S, layout: SourceLayout) -> Self {
        Self {
            embedder,
            store,
            layout,
        }
    }

    /// Indexes every top-level service project under `root`.
    pub fn index_root<P: AsRef<Path>>(&self, root: P) -> Result<IndexStats, IndexError> {
        let root = absolute(root.as_ref())?;
        self.store.ensure_collection()?;

        let projects = self
            .layout
            .project_roots(&root)
            .map_err(|source| IndexError::Io {
                path: root.clone(),
                source,
            })?;
        info!("Found {} service projects under {}", projects.len(), root.display());

        let mut stats = IndexStats::default();
        for project in projects {
            stats.merge(self.walk_project(&project, &root)?);
        }

        info!(
            "Indexed {} files ({} skipped) into {} chunks",
            stats.files_indexed, stats.files_skipped, stats.chunks_written
        );
        Ok(stats)
    }

    /// Indexes a single project directory.
    pub fn index_project<P: AsRef<Path>>(&self, dir: P) -> Result<IndexStats, IndexError> {
        let dir = absolute(dir.as_ref())?;
        self.store.ensure_collection()?;
        let base = dir.parent().unwrap_or(&dir).to_path_buf();
        self.walk_project(&dir, &base)
    }

    fn walk_project(&self, project: &Path, base: &Path) -> Result<IndexStats, IndexError> {
        let files = self.layout.source_files(project)?;
        info!("Indexing {} ({} source files)", project.display(), files.len());

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut stats = IndexStats {
            projects: 1,
            ..Default::default()
        };

        for path in files {
            pb.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            match self.index_file(&path, base)? {
                Some(written) => {
                    stats.files_indexed += 1;
                    stats.chunks_written += written.total;
                    *stats.chunks_by_role.entry(written.role).or_default() += written.total;
                }
                None => stats.files_skipped += 1,
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(stats)
    }

    /// Indexes one file. The role is classified from the path relative to
    /// `base`, so directories above the indexed tree never affect it.
    ///
    /// Returns `None` when the file is skipped as undecodable.
    pub fn index_file(&self, path: &Path, base: &Path) -> Result<Option<FileChunks>, IndexError> {
        let bytes = std::fs::read(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = match String::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                warn!("Skipping {}: not valid UTF-8", path.display());
                return Ok(None);
            }
        };

        let relative = path.strip_prefix(base).unwrap_or(path);
        let role = classify_role(relative);
        let service_name = self.layout.service_name(path);
        let path_str = path.to_string_lossy().replace('\\', "/");

        let payloads = build_file_chunks(&path_str, &service_name, role, &text);
        debug!(
            "{}: role={} service={} chunks={}",
            path_str,
            role,
            service_name,
            payloads.len()
        );

        let total = payloads.len();
        for payload in payloads {
            let vector = self.embedder.embed(&payload.content, EmbedTask::Document)?;
            let point = ChunkPoint {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload,
            };
            self.store.upsert(&point)?;
        }

        Ok(Some(FileChunks { role, total }))
    }
}

/// Outcome of indexing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChunks {
    pub role: ChunkRole,
    pub total: usize,
}

fn absolute(path: &Path) -> Result<PathBuf, IndexError> {
    std::path::absolute(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })
}
