//! Canonical home directory resolution
//!
//! Every crate in the workspace resolves the home directory through
//! [`get_home_dir`], so `ADC_HOME` redirects config, the default deployment
//! root and credential lookup in one place. Integration tests set `ADC_HOME`
//! to a temp dir instead of touching the real home:
//!
//! ```ignore
//! let temp_dir = tempfile::TempDir::new().unwrap();
//! let mut cmd = assert_cmd::Command::cargo_bin("adc").unwrap();
//! cmd.env("ADC_HOME", temp_dir.path());
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory name of the default deployment root under home.
pub const DEFAULT_ROOT_DIR: &str = ".agent-deploy";

/// Get the home directory for adc operations
///
/// # Precedence
///
/// 1. `ADC_HOME` environment variable (if set and non-empty)
/// 2. `dirs::home_dir()` platform default
///
/// # Errors
///
/// Returns an error if `ADC_HOME` is unset and the platform home directory
/// cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("ADC_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// Global config file location: `<home>/.config/adc/config.toml`.
pub fn global_config_path(home: &Path) -> PathBuf {
    home.join(".config").join("adc").join("config.toml")
}

/// Expand a leading `~/` against `home`. Other paths are returned unchanged.
pub fn expand_tilde(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
