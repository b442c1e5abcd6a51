//! Snapshot persistence for the vector store
//!
//! Snapshots are single JSON documents replaced atomically: data is written
//! to a temporary file beside the target, fsynced, then renamed over it.

mod autosave;
mod persistence;
mod snapshot;

pub(crate) use autosave::AutoSaver;
pub use persistence::{ImportReport, LoadOutcome, SaveOutcome};
pub(crate) use persistence::SnapshotFile;
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};

use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialize `value` to `path`, replacing any existing file atomically.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer(&mut writer, value).map_err(io::Error::other)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
