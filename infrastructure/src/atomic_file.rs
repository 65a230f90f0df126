//! Whole-file replacement via a sibling temp file and rename.
//!
//! Readers either see the previous contents or the new contents, never a
//! partially written file.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = ".tmp-";

fn staged(path: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Replace `path` with `contents`, creating it if needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    staged(path, contents)?.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create `path` with `contents`, failing with `AlreadyExists` if it is taken.
pub fn create_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    staged(path, contents)?
        .persist_noclobber(path)
        .map_err(|e| e.error)?;
    Ok(())
}
