//! Configuration file management for gridplan.
//!
//! Provides a TOML-based config file at `~/.config/gridplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use gridplan_core::feed::DEFAULT_CAPACITY;
use gridplan_db::config::DbConfig;

/// Env var naming the directory of the file backend.
pub const DATA_DIR_ENV: &str = "GRIDPLAN_DATA_DIR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub grid: GridSection,
    #[serde(default)]
    pub media: MediaSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory holding `plans.json` for the file backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// When set, month plans live in PostgreSQL instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GridSection {
    pub capacity: usize,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MediaSection {
    /// Root of the local media store. Defaults to `<data_dir>/media`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the gridplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/gridplan` or `~/.config/gridplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("gridplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("gridplan")
}

/// Return the path to the gridplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default data directory: `$XDG_DATA_HOME/gridplan` or `~/.local/share/gridplan`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("gridplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("gridplan")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents)
}

fn parse_config(contents: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(contents).context("failed to parse config file")?;
    if config.grid.capacity == 0 {
        bail!("grid.capacity must be at least 1");
    }
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix, since it may hold a database URL.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Where month plans are stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    File { data_dir: PathBuf },
    Postgres(DbConfig),
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct GridplanConfig {
    pub storage: Storage,
    pub capacity: usize,
    pub media_dir: PathBuf,
}

impl GridplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Storage: a database URL from `cli_db_url` > `GRIDPLAN_DATABASE_URL` >
    ///   `storage.database_url` selects PostgreSQL; otherwise the file backend in
    ///   `cli_data_dir` > `GRIDPLAN_DATA_DIR` > `storage.data_dir` > [`default_data_dir`].
    /// - Capacity: `cli_capacity` > `grid.capacity` > 30.
    /// - Media: `media.dir` > `<data_dir>/media`.
    pub fn resolve(
        cli_db_url: Option<&str>,
        cli_data_dir: Option<&Path>,
        cli_capacity: Option<usize>,
    ) -> Result<Self> {
        let file_config = match load_config() {
            Ok(cfg) => cfg,
            Err(_) if !config_path().exists() => ConfigFile::default(),
            Err(e) => return Err(e),
        };

        let data_dir = if let Some(dir) = cli_data_dir {
            dir.to_path_buf()
        } else if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(dir)
        } else if let Some(ref dir) = file_config.storage.data_dir {
            dir.clone()
        } else {
            default_data_dir()
        };

        let db_url = if let Some(url) = cli_db_url {
            Some(url.to_string())
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            Some(url)
        } else {
            file_config.storage.database_url.clone()
        };

        let storage = match db_url {
            Some(url) => Storage::Postgres(DbConfig::new(url)),
            None => Storage::File {
                data_dir: data_dir.clone(),
            },
        };

        let capacity = cli_capacity.unwrap_or(file_config.grid.capacity);
        if capacity == 0 {
            bail!("grid capacity must be at least 1");
        }

        let media_dir = file_config
            .media
            .dir
            .unwrap_or_else(|| data_dir.join("media"));

        Ok(Self {
            storage,
            capacity,
            media_dir,
        })
    }

    /// Database settings for `db-init`: the resolved URL, or the default.
    pub fn db_config(cli_db_url: Option<&str>) -> Result<DbConfig> {
        match Self::resolve(cli_db_url, None, None)?.storage {
            Storage::Postgres(db) => Ok(db),
            Storage::File { .. } => Ok(DbConfig::new(DbConfig::DEFAULT_URL)),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
