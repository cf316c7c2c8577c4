use std::time::Duration;

use clap::Args;

use common::error::StoreError;
use common::store::{Store, StoreConfig};
use depot_daemon::state::{AppState, StateError};

/// Remove abandoned staging artifacts from the storage root.
#[derive(Args, Debug, Clone)]
pub struct Sweep {
    /// Only remove artifacts not modified for this many seconds
    #[arg(long, default_value_t = 3600)]
    pub older_than_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("sweep failed: {0}")]
    Store(#[from] StoreError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Sweep {
    type Error = SweepError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let store = Store::open(StoreConfig::new(&state.storage_root)).await?;

        let removed = store
            .sweep(Duration::from_secs(self.older_than_secs))
            .await?;
        Ok(format!(
            "removed {} staging artifact(s) older than {}s from {}",
            removed,
            self.older_than_secs,
            store.staging().dir().display()
        ))
    }
}
