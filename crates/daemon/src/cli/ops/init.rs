use std::path::PathBuf;

use clap::Args;

use depot_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Port for the API HTTP server
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Storage root (defaults to <config dir>/storage)
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Prefix for URLs returned by uploads (e.g. https://files.example.com)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Bearer token required by the authenticated routes
    #[arg(long)]
    pub api_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("state error: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            api_port: self.api_port.unwrap_or(defaults.api_port),
            storage_root: self.storage_root.clone(),
            public_url: self.public_url.clone(),
            api_token: self.api_token.clone(),
            ..defaults
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let mut lines = vec![
            format!("Initialized depot at {}", state.depot_dir.display()),
            format!("  config:       {}", state.config_path.display()),
            format!("  storage root: {}", state.storage_root.display()),
            format!("  api_port:     {}", state.config.api_port),
        ];
        if state.config.api_token.is_none() {
            lines.push("  warning: no api_token set, authenticated routes are open".to_string());
        }
        Ok(lines.join("\n"))
    }
}
