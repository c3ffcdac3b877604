// Filesystem location resolution for the on-device cache and log output.

use anyhow::Result;
use std::path::PathBuf;

const DATA_DIR_ENV: &str = "CONSOLE_DATA_DIR";
const LOG_DIR_ENV: &str = "CONSOLE_LOG_DIR";
const APP_DIR_NAME: &str = "onboarding-console";
const LOG_DIR_NAME: &str = "Console_Log";

/// Resolve the per-user data folder holding the write-ahead cache.
/// `CONSOLE_DATA_DIR` overrides; otherwise the platform local-data dir.
pub fn resolve_data_folder() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(dir);
        std::fs::create_dir_all(&path)
            .map_err(|e| anyhow::anyhow!("Failed to create data folder: {}", e))?;
        return Ok(path);
    }

    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Unable to resolve a user data directory"))?;
    let path = base.join(APP_DIR_NAME);
    std::fs::create_dir_all(&path)
        .map_err(|e| anyhow::anyhow!("Failed to create data folder: {}", e))?;
    Ok(path)
}

/// Resolve the log folder (absolute path).
///
/// Strategy:
/// - `CONSOLE_LOG_DIR` overrides
/// - Walk up from CWD looking for an existing `Console_Log/` (so smoke runs
///   from nested directories reuse the workspace-level folder)
/// - Fallback: `<data folder>/logs`
pub fn resolve_log_folder() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(dir);
        std::fs::create_dir_all(&path)
            .map_err(|e| anyhow::anyhow!("Failed to create log folder: {}", e))?;
        return Ok(path);
    }

    if let Ok(mut dir) = std::env::current_dir() {
        for _ in 0..12 {
            let candidate = dir.join(LOG_DIR_NAME);
            if candidate.exists() {
                return Ok(candidate);
            }
            if let Some(parent) = dir.parent() {
                dir = parent.to_path_buf();
            } else {
                break;
            }
        }
    }

    let log_dir = resolve_data_folder()?.join("logs");
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder: {}", e))?;
    Ok(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_for_data_folder() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let target = tmp.path().join("cache-root");
        std::env::set_var(DATA_DIR_ENV, &target);
        let resolved = resolve_data_folder().expect("resolve");
        std::env::remove_var(DATA_DIR_ENV);

        assert_eq!(resolved, target);
        assert!(resolved.exists(), "override dir should be created");
    }
}
