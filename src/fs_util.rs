use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;

use crate::error::SelectorError;

/// Writes `content` next to `path` first and renames it into place.
pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<(), SelectorError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("wfs-file")
        .tempfile_in(&parent)
        .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Creates `base/download_<YYYYmmdd_HHMMSS>` and returns it.
pub fn create_timestamped_dir(base: &Path) -> Result<Utf8PathBuf, SelectorError> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let dir = base.join(format!("download_{stamp}"));
    fs::create_dir_all(&dir).map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    Utf8PathBuf::from_path_buf(dir)
        .map_err(|_| SelectorError::Filesystem("non-utf8 download directory".to_string()))
}

/// A display name is usable as a flat file or archive entry name.
pub fn is_safe_entry_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
