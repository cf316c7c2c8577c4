use std::sync::Arc;

use common::error::StoreError;
use common::layout::Namespace;
use common::store::{Store, StoreConfig};

use crate::auth::{Authenticator, BearerToken};
use crate::rate_limit::RateLimiter;
use crate::ServiceConfig;

/// Multipart framing allowance on top of the payload limit
const BODY_LIMIT_SLACK_BYTES: u64 = 1024 * 1024;

/// Upload policy shared by the upload handlers
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_upload_bytes: u64,
    pub max_avatar_bytes: u64,
    pub avatar_namespace: Namespace,
    pub public_url: Option<String>,
}

impl UploadSettings {
    /// Transport-level body limit, a little above the largest payload limit.
    pub fn body_limit(&self) -> usize {
        let limit = self.max_upload_bytes.max(self.max_avatar_bytes) + BODY_LIMIT_SLACK_BYTES;
        usize::try_from(limit).unwrap_or(usize::MAX)
    }

    /// Public URL of a root-relative path.
    pub fn url_for(&self, relative_path: &str) -> String {
        let encoded = relative_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        match &self.public_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), encoded),
            None => format!("/{}", encoded),
        }
    }
}

/// Main service state - shared by every request handler
#[derive(Clone)]
pub struct State {
    store: Store,
    authenticator: Arc<dyn Authenticator>,
    avatar_limiter: Arc<RateLimiter>,
    uploads: Arc<UploadSettings>,
}

impl State {
    pub fn new(
        store: Store,
        authenticator: Arc<dyn Authenticator>,
        avatar_limiter: RateLimiter,
        uploads: UploadSettings,
    ) -> Self {
        Self {
            store,
            authenticator,
            avatar_limiter: Arc::new(avatar_limiter),
            uploads: Arc::new(uploads),
        }
    }

    pub async fn from_config(config: &ServiceConfig) -> Result<Self, StateSetupError> {
        let avatar_namespace: Namespace = config
            .avatar_namespace
            .parse()
            .map_err(StateSetupError::InvalidAvatarNamespace)?;

        let store = Store::open(StoreConfig {
            root: config.storage_root.clone(),
            commit_mode: config.commit_mode,
        })
        .await?;
        tracing::info!(root = %config.storage_root.display(), "storage root ready");

        Ok(Self::new(
            store,
            Arc::new(BearerToken::new(config.api_token.clone())),
            RateLimiter::from_config(&config.avatar_rate_limit),
            UploadSettings {
                max_upload_bytes: config.max_upload_bytes,
                max_avatar_bytes: config.max_avatar_bytes,
                avatar_namespace,
                public_url: config.public_url.clone(),
            },
        ))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn avatar_limiter(&self) -> &RateLimiter {
        &self.avatar_limiter
    }

    pub fn uploads(&self) -> &UploadSettings {
        &self.uploads
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("failed to open storage root: {0}")]
    Store(#[from] StoreError),
    #[error("invalid avatar_namespace: {0}")]
    InvalidAvatarNamespace(StoreError),
}
