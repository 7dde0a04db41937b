//! Path resolution for client data files.
//!
//! Priority: CLI `--data-dir` > `SUPERAI_DATA_DIR` env > `~/.superai`.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ChatError;

pub const DATA_DIR_ENV: &str = "SUPERAI_DATA_DIR";

/// Resolve the data directory without touching the filesystem.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf, ChatError> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(env_val) = std::env::var(DATA_DIR_ENV) {
        if !env_val.is_empty() {
            return Ok(PathBuf::from(env_val));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".superai"))
        .ok_or_else(|| ChatError::Config("HOME directory not found".into()))
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Create all required subdirectories under the data dir.
pub fn ensure_dirs(data_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::create_dir_all(log_dir(data_dir))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let dir = resolve_data_dir(Some(Path::new("/tmp/superai-test"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/superai-test"));
        assert_eq!(config_path(&dir), PathBuf::from("/tmp/superai-test/config.toml"));
    }

    #[test]
    fn ensure_dirs_creates_log_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("data");
        ensure_dirs(&base).unwrap();
        assert!(log_dir(&base).is_dir());
    }
}
