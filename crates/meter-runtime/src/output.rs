use std::path::{Path, PathBuf};

use meter_core::error::Result;

/// Write a generated file into `dir`, creating the directory when needed.
/// Returns the full path written.
pub fn save_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "file written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_file_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("downloads").join("dvlir");
        let path = save_file(&dir, "out.csv", b"a,b\n").unwrap();
        assert_eq!(path, dir.join("out.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n");
    }

    #[test]
    fn test_save_file_overwrites() {
        let tmp = TempDir::new().unwrap();
        save_file(tmp.path(), "out.svg", b"old").unwrap();
        let path = save_file(tmp.path(), "out.svg", b"new").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn test_save_file_into_a_file_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        assert!(save_file(&blocker, "out.csv", b"").is_err());
    }
}
