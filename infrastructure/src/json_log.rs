use crate::atomic_file::write_atomic;
use domain::{ChatResult, Turn};
use std::io;
use std::path::{Path, PathBuf};

/// Mirrors a conversation into a pretty-printed JSON array of
/// `{"role": ..., "text": ...}` entries, rewritten after every turn.
#[derive(Debug, Clone)]
pub struct JsonLog {
    path: PathBuf,
}

impl JsonLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, turns: &[Turn]) -> ChatResult<()> {
        let json = serde_json::to_vec_pretty(turns).map_err(io::Error::from)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }
}
