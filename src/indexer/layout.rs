//! Directory conventions: project discovery, file selection, role
//! classification and service-name resolution.
use crate::config::LayoutConfig;
use crate::db::models::ChunkRole;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Service name used when no ancestor directory carries a service suffix.
pub const GENERAL_SERVICE: &str = "general";

/// Role directories in precedence order.
const ROLE_DIRS: [(&str, ChunkRole); 4] = [
    ("data-access", ChunkRole::DbFunction),
    ("use-cases", ChunkRole::UseCase),
    ("routes", ChunkRole::Route),
    ("controllers", ChunkRole::Controller),
];

fn segments(path: &Path) -> impl DoubleEndedIterator<Item = &str> {
    path.components().filter_map(|c| match c {
        Component::Normal(s) => s.to_str(),
        _ => None,
    })
}

/// Role implied by the directories a file sits in.
///
/// Exactly one role applies; `data-access` wins over `use-cases`, which
/// wins over `routes`, then `controllers`, then plain code.
pub fn classify_role(path: &Path) -> ChunkRole {
    let dirs: Vec<&str> = segments(path).collect();
    ROLE_DIRS
        .iter()
        .find(|(dir, _)| dirs.contains(dir))
        .map(|(_, role)| *role)
        .unwrap_or(ChunkRole::Code)
}

#[derive(Debug, Clone)]
pub struct SourceLayout {
    exclude_dirs: HashSet<String>,
    extensions: HashSet<String>,
    service_suffixes: Vec<String>,
}

impl From<&LayoutConfig> for SourceLayout {
    fn from(cfg: &LayoutConfig) -> Self {
        Self {
            exclude_dirs: cfg.exclude_dirs.iter().cloned().collect(),
            extensions: cfg.source_extensions.iter().cloned().collect(),
            service_suffixes: cfg.service_suffixes.clone(),
        }
    }
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl SourceLayout {
    pub fn is_service_dir(&self, name: &str) -> bool {
        self.service_suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }

    /// Nearest ancestor segment (deepest first) ending in a service suffix.
    pub fn service_name(&self, path: &Path) -> String {
        segments(path)
            .rev()
            .find(|seg| self.is_service_dir(seg))
            .unwrap_or(GENERAL_SERVICE)
            .to_string()
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(ext))
    }

    /// Top-level directories of `root` that are service projects, sorted by name.
    pub fn project_roots(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut projects = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            // Follows symlinks
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| self.is_service_dir(n)) {
                projects.push(entry.path());
            }
        }
        projects.sort();
        Ok(projects)
    }

    /// Source files under `dir`, skipping excluded directories entirely.
    ///
    /// Ignore files are not consulted; only the exclusion list prunes.
    pub fn source_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ignore::Error> {
        let excluded = self.exclude_dirs.clone();
        let walker = WalkBuilder::new(dir)
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|n| excluded.contains(n)))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_some_and(|t| t.is_file()) && self.is_source_file(path) {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }
}
