//! Filesystem sink: one pretty-printed JSON file per document under a root dir.

use std::path::{Path, PathBuf};

use super::{Sink, SinkError};

/// Writes `<root>/<name>` atomically (temp file then rename).
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
    move |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Sink for FsSink {
    fn write_json(&self, name: &str, document: &serde_json::Value) -> Result<(), SinkError> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let json = serde_json::to_vec_pretty(document).map_err(|source| SinkError::Json {
            name: name.to_string(),
            source,
        })?;
        let tmp = temp_path(&path);
        std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(())
    }

    fn read_json(&self, name: &str) -> Result<Option<serde_json::Value>, SinkError> {
        let path = self.path_for(name);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path)(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SinkError::Json {
                name: name.to_string(),
                source,
            })
    }
}
