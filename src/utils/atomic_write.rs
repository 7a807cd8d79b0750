//! Atomic File Output
//!
//! Writes go to a temp file created next to the destination, are flushed and
//! synced, then renamed over the destination in one step. If anything fails the
//! temp file is dropped (and deleted) and the previous output stays as it was.

use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write `path` atomically using the supplied writer callback
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    write_atomic_inner(path, write).map_err(|e| PipelineError::write_failure(path, e))
}

fn write_atomic_inner<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // Same directory as the destination so the final rename never crosses filesystems
    let mut tmp = tempfile::Builder::new()
        .prefix(".map-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| e.error)?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Serialize `value` as JSON and write it atomically
///
/// Compact output keeps reruns byte-identical; `pretty` is for files people edit by hand.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    write_atomic(path, |w| {
        let result = if pretty {
            serde_json::to_writer_pretty(&mut *w, value)
        } else {
            serde_json::to_writer(&mut *w, value)
        };
        result.map_err(io::Error::from)?;
        w.write_all(b"\n")
    })
}
