use std::fmt::Debug;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use http::request::Parts;
use http::{HeaderMap, StatusCode};

use crate::http_server::api::error::ErrorBody;
use crate::ServiceState;

/// Decides whether a request may use the authenticated routes.
pub trait Authenticator: Send + Sync + Debug {
    fn authenticate(&self, headers: &HeaderMap) -> bool;
}

/// Compares `Authorization: Bearer <token>` against a configured token.
#[derive(Clone)]
pub struct BearerToken {
    token: Option<String>,
}

impl Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("configured", &self.token.is_some())
            .finish()
    }
}

impl BearerToken {
    /// With no token every request passes.
    pub fn new(token: Option<String>) -> Self {
        if token.is_none() {
            tracing::warn!("no api_token configured, authenticated routes are open");
        }
        Self { token }
    }
}

impl Authenticator for BearerToken {
    fn authenticate(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };
        headers
            .typed_get::<Authorization<Bearer>>()
            .is_some_and(|auth| constant_time_eq(auth.token().as_bytes(), expected.as_bytes()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extractor that rejects requests the service's [`Authenticator`] refuses.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated;

#[async_trait]
impl FromRequestParts<ServiceState> for Authenticated {
    type Rejection = Unauthorized;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        if state.authenticator().authenticate(&parts.headers) {
            Ok(Authenticated)
        } else {
            tracing::debug!(uri = %parts.uri, "rejecting unauthenticated request");
            Err(Unauthorized)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("missing or invalid bearer token")]
pub struct Unauthorized;

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        ErrorBody::new("Unauthorized", self.to_string())
            .into_response_with(StatusCode::UNAUTHORIZED)
    }
}
