//! Application resources and their persisted validity markers.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Suffix appended to a resource file name to form its validity marker.
const MARKER_SUFFIX: &str = ".valid";

/// Reason a declared resource path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidPath {
    Empty,
    Absolute,
    ParentTraversal,
}

impl fmt::Display for InvalidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidPath::Empty => write!(f, "path is empty"),
            InvalidPath::Absolute => write!(f, "path is absolute"),
            InvalidPath::ParentTraversal => write!(f, "path contains '..'"),
        }
    }
}

/// A single code or auxiliary resource: its relative path, resolved remote
/// URL, local file, and the on-disk marker recording "already confirmed to
/// match the manifest".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    path: String,
    remote: String,
    local: PathBuf,
    marker: PathBuf,
}

impl Resource {
    /// Create a resource for `path` relative to a remote base (which must
    /// end with `/`) and a local install directory. Paths that would escape
    /// the install directory are rejected.
    pub fn new(path: &str, remote_base: &str, local_dir: &Path) -> Result<Resource, InvalidPath> {
        if path.is_empty() {
            return Err(InvalidPath::Empty);
        }
        let rel = Path::new(path);
        if rel.is_absolute() {
            return Err(InvalidPath::Absolute);
        }
        if rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(InvalidPath::ParentTraversal);
        }
        let local = local_dir.join(rel);
        let marker = marker_path(&local);
        Ok(Resource {
            path: path.to_string(),
            remote: format!("{}{}", remote_base, path),
            local,
            marker,
        })
    }

    /// Relative path as declared in the descriptor.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fully resolved remote URL.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Local file the resource lives at.
    pub fn local(&self) -> &Path {
        &self.local
    }

    /// Whether a validity marker is persisted for this resource.
    pub fn is_marked_valid(&self) -> bool {
        self.marker.exists()
    }

    /// Persist the validity marker. Must succeed before the resource may be
    /// reported valid; a crash afterwards only costs a re-validation.
    pub fn mark_valid(&self) -> io::Result<()> {
        fs::write(&self.marker, b"")
    }

    /// Remove the validity marker, forcing re-validation on the next scan.
    pub fn clear_marker(&self) {
        if self.marker.exists() {
            if let Err(e) = fs::remove_file(&self.marker) {
                warn!(
                    "Failed to clear validity marker {}: {}",
                    self.marker.display(),
                    e
                );
            }
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

fn marker_path(local: &Path) -> PathBuf {
    let mut name = local
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(MARKER_SUFFIX);
    local.with_file_name(name)
}
