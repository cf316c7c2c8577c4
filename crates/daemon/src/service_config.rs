use std::path::PathBuf;

use common::finalize::CommitMode;

use crate::state::{AppConfig, AppState, RateLimitConfig};

#[derive(Debug, Clone)]
pub struct Config {
    // storage configuration
    /// root directory every stored file lives under
    pub storage_root: PathBuf,
    /// how staged uploads are moved into place
    pub commit_mode: CommitMode,

    // http server configuration
    /// Port for the API HTTP server
    pub api_port: u16,
    /// Prefix for URLs handed back to clients,
    ///  if not set URLs are root-relative
    pub public_url: Option<String>,
    /// Bearer token guarding the authenticated routes
    pub api_token: Option<String>,

    // upload limits
    pub max_upload_bytes: u64,
    pub max_avatar_bytes: u64,
    pub avatar_namespace: String,
    pub avatar_rate_limit: RateLimitConfig,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Service configuration for a loaded depot directory.
    pub fn from_app_state(state: &AppState) -> Self {
        let AppConfig {
            api_port,
            public_url,
            api_token,
            max_upload_bytes,
            max_avatar_bytes,
            avatar_namespace,
            avatar_rate_limit,
            ..
        } = state.config.clone();

        Self {
            storage_root: state.storage_root.clone(),
            commit_mode: CommitMode::default(),
            api_port,
            public_url,
            api_token,
            max_upload_bytes,
            max_avatar_bytes,
            avatar_namespace,
            avatar_rate_limit,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}
