//! Atomic file writes (temp file + rename)

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to a file name while it is being written
pub const TEMP_SUFFIX: &str = ".tmp";

/// Returns the temp path used while writing `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("file"));
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Writes `contents` to a temp file next to `path`, then renames it into place
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp = temp_path(path);
    fs::write(&temp, contents)?;
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_no_temp_file_left() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("children.ndx");

        write_atomic(&path, b"groceries\n").unwrap();
        write_atomic(&path, b"hardware\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hardware\n");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn temp_path_keeps_extension() {
        let path = Path::new("/tmp/x/task.cfg");
        assert_eq!(temp_path(path), Path::new("/tmp/x/task.cfg.tmp"));
    }
}
