use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

/// Serialize `value` as pretty JSON into a synced temp file in `path`'s
/// directory. Persisting the returned file over `path` is an atomic rename;
/// dropping it instead deletes it and leaves `path` alone.
///
/// An existing file's permissions are copied to the temp file, so the
/// rename does not narrow them to the temp file's 0600.
pub(crate) fn stage_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}
