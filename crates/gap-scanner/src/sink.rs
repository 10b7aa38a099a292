use gap_core::{ScanError, Selection};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write selections as one JSON array, replacing `path` atomically.
///
/// The document is written to a temp file next to the destination and
/// renamed over it, so readers see either the old file or the complete
/// new one.
pub fn write_selections(path: &Path, selections: &[Selection]) -> Result<(), ScanError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir)
        .map_err(|e| ScanError::Sink(format!("cannot create temp file in {}: {}", dir.display(), e)))?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, selections)
            .map_err(|e| ScanError::Sink(format!("encoding selections: {}", e)))?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| ScanError::Sink(e.to_string()))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| ScanError::Sink(e.to_string()))?;

    tmp.persist(path)
        .map_err(|e| ScanError::Sink(format!("cannot replace {}: {}", path.display(), e.error)))?;

    Ok(())
}
