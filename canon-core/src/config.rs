//! User configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.canon/
//!   config.yaml     (mode 0600, directory mode 0700)
//! ```
//!
//! # API pattern
//!
//! Every function takes the home directory explicitly (`fn_at(home: &Path, …)`)
//! so tests can point it at a `TempDir`. Callers resolve the real one with
//! [`home_dir`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// Defaults applied by `canon deploy` / `canon history` when flags are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Actor recorded on each deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
    /// Snapshot existing managed files before overwriting them.
    pub backup: bool,
    /// Directory of `.tera` files overriding the embedded templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
    /// Rows shown by `canon history` without `--limit`.
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deployed_by: None,
            backup: true,
            templates_dir: None,
            history_limit: 10,
        }
    }
}

impl Config {
    /// Keys accepted by [`Config::set`].
    pub const KEYS: [&'static str; 4] = ["deployed_by", "backup", "templates_dir", "history_limit"];

    /// Update one field from its string form. An empty value clears an
    /// optional field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let value = value.trim();
        match key {
            "deployed_by" => {
                self.deployed_by = (!value.is_empty()).then(|| value.to_string());
            }
            "backup" => {
                self.backup = match value.to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" => true,
                    "false" | "no" | "off" => false,
                    _ => return Err(invalid("expected true or false")),
                };
            }
            "templates_dir" => {
                self.templates_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "history_limit" => {
                let limit: usize = value
                    .parse()
                    .map_err(|_| invalid("expected a positive integer"))?;
                if limit == 0 {
                    return Err(invalid("must be at least 1"));
                }
                self.history_limit = limit;
            }
            other => {
                return Err(ConfigError::UnknownKey {
                    key: other.to_string(),
                    expected: Self::KEYS.join(", "),
                })
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.canon/`: pure, no I/O.
pub fn canon_dir_at(home: &Path) -> PathBuf {
    home.join(".canon")
}

/// `<home>/.canon/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    canon_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load `<home>/.canon/config.yaml`.
///
/// A missing file yields [`Config::default`]; malformed YAML yields
/// `ConfigError::Parse` with path and line context.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save `config` to `<home>/.canon/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    let dir = canon_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// The current user's home directory.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_path_is_correct() {
        let home = TempDir::new().expect("tempdir");
        assert!(config_path_at(home.path()).ends_with(".canon/config.yaml"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let home = TempDir::new().expect("tempdir");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, Config::default());
        assert!(config.backup);
        assert_eq!(config.history_limit, 10);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().expect("tempdir");
        let config = Config {
            deployed_by: Some("release-bot".to_string()),
            backup: false,
            templates_dir: Some(PathBuf::from("/srv/rules")),
            history_limit: 25,
        };
        save_at(home.path(), &config).expect("save");
        assert_eq!(load_at(home.path()).expect("load"), config);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let home = TempDir::new().expect("tempdir");
        let dir = canon_dir_at(home.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.yaml"), "deployed_by: ana\n").unwrap();

        let config = load_at(home.path()).expect("load");
        assert_eq!(config.deployed_by.as_deref(), Some("ana"));
        assert!(config.backup);
    }

    #[test]
    fn dir_created_with_perms() {
        let home = TempDir::new().expect("tempdir");
        save_at(home.path(), &Config::default()).expect("save");
        let dir = canon_dir_at(home.path());
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
            let file_mode = std::fs::metadata(config_path_at(home.path()))
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(file_mode, 0o600);
        }
    }

    #[test]
    fn set_updates_each_key() {
        let mut config = Config::default();
        config.set("deployed_by", " ana ").unwrap();
        config.set("backup", "off").unwrap();
        config.set("templates_dir", "/srv/rules").unwrap();
        config.set("history_limit", "3").unwrap();
        assert_eq!(
            config,
            Config {
                deployed_by: Some("ana".to_string()),
                backup: false,
                templates_dir: Some(PathBuf::from("/srv/rules")),
                history_limit: 3,
            }
        );

        config.set("deployed_by", "").unwrap();
        assert_eq!(config.deployed_by, None);
    }

    #[test]
    fn set_rejects_bad_input() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("colour", "red"),
            Err(ConfigError::UnknownKey { .. })
        ));
        assert!(matches!(
            config.set("history_limit", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("backup", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}
