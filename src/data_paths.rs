//! Data file location.
//!
//! The dashboard may be launched from the repository root, from the backend
//! directory, or with an explicit data directory, so each data file is looked
//! up in a short ordered list of candidates and the first that exists wins.

use std::path::{Component, Path, PathBuf};

/// Relative path of the ingestion counts log under the data directory.
pub const INGEST_COUNTS_FILE: &str = "metrics/ingest_counts.jsonl";
/// Relative path of the outlet catalog under the data directory.
pub const OUTLETS_FILE: &str = "outlets.json";

#[derive(Debug, Clone)]
pub struct DataPaths {
    data_dir: PathBuf,
}

impl DataPaths {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: absolutize(&data_dir.into()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Candidate locations for `relative`, in lookup order.
    pub fn candidates(&self, relative: &str) -> Vec<PathBuf> {
        vec![
            self.data_dir.join(relative),
            absolutize(&Path::new("data").join(relative)),
            absolutize(&Path::new("..").join("data").join(relative)),
        ]
    }

    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        first_existing(&self.candidates(relative))
    }
}

/// First candidate that exists on disk; later candidates are not consulted.
pub fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    std::env::current_dir()
        .map(|cwd| normalize(&cwd.join(path)))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Drop `.` and resolve `..` lexically, without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
