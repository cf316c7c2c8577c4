use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "depot";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STORAGE_DIR_NAME: &str = "storage";
pub const LOGS_DIR_NAME: &str = "logs";

const MIB: u64 = 1024 * 1024;

/// Per-client request window for the public avatar route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the API HTTP server
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Storage root (defaults to <depot dir>/storage)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,
    /// Prefix for URLs returned by upload routes (e.g. "https://files.example.com")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Bearer token required by the authenticated routes.
    ///  If not set every request is treated as authenticated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_max_avatar_bytes")]
    pub max_avatar_bytes: u64,
    /// Directory avatars are committed into
    #[serde(default = "default_avatar_namespace")]
    pub avatar_namespace: String,
    #[serde(default)]
    pub avatar_rate_limit: RateLimitConfig,
}

fn default_api_port() -> u16 {
    5080
}

fn default_max_upload_bytes() -> u64 {
    500 * MIB
}

fn default_max_avatar_bytes() -> u64 {
    5 * MIB
}

fn default_avatar_namespace() -> String {
    "avatars".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            storage_root: None,
            public_url: None,
            api_token: None,
            max_upload_bytes: default_max_upload_bytes(),
            max_avatar_bytes: default_max_avatar_bytes(),
            avatar_namespace: default_avatar_namespace(),
            avatar_rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the depot directory (~/.depot)
    pub depot_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Resolved storage root
    pub storage_root: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the depot directory path (custom or default ~/.depot)
    pub fn depot_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new depot directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let depot_dir = Self::depot_dir(custom_path)?;

        if depot_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&depot_dir)?;

        let config = config.unwrap_or_default();
        let config_path = depot_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        let storage_root = Self::storage_root_for(&depot_dir, &config);
        fs::create_dir_all(&storage_root)?;

        Ok(Self {
            depot_dir,
            config_path,
            storage_root,
            config,
        })
    }

    /// Load existing state from the depot directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let depot_dir = Self::depot_dir(custom_path)?;

        if !depot_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = depot_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;
        let storage_root = Self::storage_root_for(&depot_dir, &config);

        Ok(Self {
            depot_dir,
            config_path,
            storage_root,
            config,
        })
    }

    /// Default location for daemon log files
    pub fn log_dir(&self) -> PathBuf {
        self.depot_dir.join(LOGS_DIR_NAME)
    }

    fn storage_root_for(depot_dir: &std::path::Path, config: &AppConfig) -> PathBuf {
        match &config.storage_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => depot_dir.join(root),
            None => depot_dir.join(STORAGE_DIR_NAME),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("depot directory not initialized. Run 'depot init' first")]
    NotInitialized,

    #[error("depot directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
