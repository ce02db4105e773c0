//! Filesystem roots offered to servers through `roots/list`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::handlers::RootsProvider;

/// A directory the client shares with a server, identified by a `file://` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    uri: String,
    name: String,
}

impl Root {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
        }
    }

    /// Build a root from a filesystem path.
    ///
    /// Existing paths are canonicalized (symlinks resolved); other paths are
    /// made absolute against the working directory. The display name is the
    /// final path component, or `"Root"` when there is none. Directories get
    /// a trailing `/`; the URI is percent-encoded.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let resolved = match std::fs::canonicalize(path) {
            Ok(p) => p,
            Err(_) => std::path::absolute(path)?,
        };
        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Root".to_string());
        let url = if resolved.is_dir() {
            Url::from_directory_path(&resolved)
        } else {
            Url::from_file_path(&resolved)
        }
        .map_err(|()| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot express {} as a file URI", resolved.display()),
            )
        })?;
        Ok(Self {
            uri: url.into(),
            name,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The local path for a `file://` root, percent-decoded.
    pub fn to_path(&self) -> Option<PathBuf> {
        let url = Url::parse(&self.uri).ok()?;
        if url.scheme() != "file" {
            return None;
        }
        url.to_file_path().ok()
    }
}

/// Answers `roots/list` from a fixed set.
#[derive(Debug, Clone, Default)]
pub struct StaticRoots {
    roots: Vec<Root>,
}

impl StaticRoots {
    pub fn new(roots: Vec<Root>) -> Self {
        Self { roots }
    }
}

impl RootsProvider for StaticRoots {
    fn list_roots(&self) -> Vec<Root> {
        self.roots.clone()
    }
}
