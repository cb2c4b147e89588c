//! Centralized home-based storage paths.
//!
//! Everything lives under `~/.content-alchemist/` (or `$ALCHEMIST_HOME`):
//! - `config.yaml` - Default configuration file
//! - `sessions/` - Persisted run snapshots, one JSON file per run
//! - `logs/<run-id>/events.jsonl` - Structured audit log per run

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// The name of the home directory used for all persistence.
const ALCHEMIST_DIR: &str = ".content-alchemist";

/// Environment variable that overrides the home directory.
pub const HOME_ENV: &str = "ALCHEMIST_HOME";

/// Returns the storage root, creating it if needed.
///
/// # Errors
///
/// Returns an error if:
/// - Home directory cannot be determined
/// - Directory creation fails
pub fn alchemist_home_dir() -> Result<PathBuf> {
    let root = match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .context("Could not determine home directory for run storage")?
            .join(ALCHEMIST_DIR),
    };
    ensure_dir(&root)
}

/// Returns the default config file path (may not exist).
pub fn config_path() -> Result<PathBuf> {
    Ok(alchemist_home_dir()?.join("config.yaml"))
}

/// Returns the sessions directory: `<root>/sessions/`
pub fn sessions_dir() -> Result<PathBuf> {
    ensure_dir(&sessions_dir_in(&alchemist_home_dir()?))
}

/// Returns the log directory for one run: `<root>/logs/<run-id>/`
pub fn run_logs_dir(run_id: &str) -> Result<PathBuf> {
    ensure_dir(&run_logs_dir_in(&alchemist_home_dir()?, run_id))
}

pub fn sessions_dir_in(root: &Path) -> PathBuf {
    root.join("sessions")
}

pub fn run_logs_dir_in(root: &Path, run_id: &str) -> PathBuf {
    root.join("logs").join(run_id)
}

fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_under_root() {
        let root = Path::new("/data/alchemist");
        assert_eq!(sessions_dir_in(root), root.join("sessions"));
        assert_eq!(
            run_logs_dir_in(root, "abc"),
            root.join("logs").join("abc")
        );
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let created = ensure_dir(&nested).unwrap();
        assert!(created.is_dir());
        // Idempotent
        assert!(ensure_dir(&nested).is_ok());
    }
}
