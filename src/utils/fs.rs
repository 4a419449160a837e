//! Session directory handling
//!
//! Artifacts carry captured screen content and audio, so session
//! directories are created owner-only (0o700) and artifacts tightened to
//! 0o600 where the platform supports it.

use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};

/// Create `<output_dir>/<name>_<YYYYmmdd_HHMMSS>` with secure permissions.
pub fn create_session_dir(output_dir: &Path, name: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    secure_directory(output_dir);

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let session_dir = output_dir.join(format!("{}_{}", name, stamp));
    std::fs::create_dir_all(&session_dir)?;
    secure_directory(&session_dir);
    Ok(session_dir)
}

/// Restrict a directory to its owner (0o700). Best-effort, unix only.
pub fn secure_directory(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Restrict a file to its owner (0o600). Best-effort, unix only.
pub fn secure_file(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_dir_is_created_under_output() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = create_session_dir(tmp.path(), "standup").unwrap();
        assert!(dir.exists());
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("standup_"));
    }

    #[cfg(unix)]
    #[test]
    fn test_session_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let dir = create_session_dir(tmp.path(), "s").unwrap();
        let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_file_tightens_mode() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.wav");
        std::fs::write(&file, b"x").unwrap();
        secure_file(&file);
        let mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
