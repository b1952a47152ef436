//! Configuration discovery and resolution

use super::types::Config;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Repo-local config file name, searched up to the git root.
const REPO_CONFIG_FILE: &str = ".adc.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Merged layers do not form a valid configuration
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Override the deployment root
    pub deployment_dir: Option<PathBuf>,
    /// Override the default agent program
    pub agent_program: Option<String>,
    /// Explicit config file; replaces global and repo-local discovery
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables
/// 3. Repo-local config (.adc.toml in current dir or up to git root)
/// 4. Global config (~/.config/adc/config.toml)
/// 5. Defaults
///
/// File layers are merged key by key, so a repo-local file that only sets
/// `[supervisor] term_timeout_secs` keeps every other global setting.
/// Unparseable discovered files are logged and skipped; an explicit
/// `config_path` that cannot be read is an error.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<Config, ConfigError> {
    let mut merged = toml::Table::new();

    if let Some(path) = &overrides.config_path {
        merge_tables(&mut merged, load_table(path)?);
    } else {
        let global = crate::home::global_config_path(home_dir);
        for path in [Some(global), find_repo_local_config(current_dir)].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            match load_table(&path) {
                Ok(table) => {
                    debug!(path = %path.display(), "loaded config layer");
                    merge_tables(&mut merged, table);
                }
                Err(e) => warn!("Failed to parse config at {}: {e}", path.display()),
            }
        }
    }

    let mut config = toml::Value::Table(merged).try_into::<Config>()?;

    apply_env_overrides(&mut config);
    apply_cli_overrides(&mut config, overrides);

    Ok(config)
}

/// Find repo-local config file
///
/// Searches current directory and parent directories up to git root
fn find_repo_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;

    loop {
        let config_path = dir.join(REPO_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if dir.join(".git").exists() {
            return None;
        }

        dir = dir.parent()?;
    }
}

fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    contents.parse::<toml::Table>().map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Deep-merge `overlay` into `base`; overlay scalars and arrays win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(dir) = std::env::var("ADC_DEPLOYMENT_DIR") {
        if !dir.trim().is_empty() {
            config.deployment.root = Some(PathBuf::from(dir.trim()));
        }
    }

    if let Ok(program) = std::env::var("ADC_AGENT_PROGRAM") {
        if !program.trim().is_empty() {
            config.agent.program = program.trim().to_string();
        }
    }
}

fn apply_cli_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(ref dir) = overrides.deployment_dir {
        config.deployment.root = Some(dir.clone());
    }

    if let Some(ref program) = overrides.agent_program {
        config.agent.program = program.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    fn clear_env() {
        unsafe {
            env::remove_var("ADC_DEPLOYMENT_DIR");
            env::remove_var("ADC_AGENT_PROGRAM");
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_files() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config =
            resolve_config(&ConfigOverrides::default(), temp_dir.path(), temp_dir.path()).unwrap();
        assert!(config.deployment.root.is_none());
        assert_eq!(config.agent.program, "claude");
    }

    #[test]
    #[serial]
    fn test_repo_local_overrides_global_per_key() {
        clear_env();
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        std::fs::create_dir(repo.path().join(".git")).unwrap();
        let nested = repo.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let global = crate::home::global_config_path(home.path());
        std::fs::create_dir_all(global.parent().unwrap()).unwrap();
        std::fs::write(
            &global,
            concat!(
                "[supervisor]\nterm_timeout_secs = 7\nkill_timeout_secs = 9\n",
                "[agent]\nprogram = \"global-runner\"\n",
            ),
        )
        .unwrap();
        std::fs::write(
            repo.path().join(".adc.toml"),
            "[supervisor]\nterm_timeout_secs = 2\n",
        )
        .unwrap();

        let config = resolve_config(&ConfigOverrides::default(), &nested, home.path()).unwrap();
        assert_eq!(config.supervisor.term_timeout_secs, 2);
        assert_eq!(config.supervisor.kill_timeout_secs, 9);
        assert_eq!(config.agent.program, "global-runner");
    }

    #[test]
    #[serial]
    fn test_repo_search_stops_at_git_root() {
        clear_env();
        let outer = TempDir::new().unwrap();
        std::fs::write(outer.path().join(".adc.toml"), "[agent]\nprogram = \"outer\"\n").unwrap();
        let repo = outer.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();

        assert!(find_repo_local_config(&repo).is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(".adc.toml"),
            "[deployment]\nroot = \"/from/file\"\n",
        )
        .unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();

        unsafe {
            env::set_var("ADC_DEPLOYMENT_DIR", "/from/env");
            env::set_var("ADC_AGENT_PROGRAM", "env-runner");
        }
        let config =
            resolve_config(&ConfigOverrides::default(), temp_dir.path(), temp_dir.path()).unwrap();
        clear_env();

        assert_eq!(config.deployment.root, Some(PathBuf::from("/from/env")));
        assert_eq!(config.agent.program, "env-runner");
    }

    #[test]
    #[serial]
    fn test_cli_overrides_env() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        unsafe { env::set_var("ADC_DEPLOYMENT_DIR", "/from/env") };
        let overrides = ConfigOverrides {
            deployment_dir: Some(PathBuf::from("/from/cli")),
            agent_program: Some("cli-runner".to_string()),
            config_path: None,
        };
        let config = resolve_config(&overrides, temp_dir.path(), temp_dir.path()).unwrap();
        clear_env();

        assert_eq!(config.deployment.root, Some(PathBuf::from("/from/cli")));
        assert_eq!(config.agent.program, "cli-runner");
    }

    #[test]
    #[serial]
    fn test_malformed_discovered_config_is_skipped() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        std::fs::write(temp_dir.path().join(".adc.toml"), "invalid toml [[[").unwrap();

        let config =
            resolve_config(&ConfigOverrides::default(), temp_dir.path(), temp_dir.path()).unwrap();
        assert_eq!(config.agent.program, "claude");
    }

    #[test]
    #[serial]
    fn test_explicit_config_path_must_parse() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "invalid toml [[[").unwrap();

        let overrides = ConfigOverrides {
            config_path: Some(path),
            ..ConfigOverrides::default()
        };
        let result = resolve_config(&overrides, temp_dir.path(), temp_dir.path());
        assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
    }
}
