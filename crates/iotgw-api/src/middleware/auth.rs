// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API key / Basic authentication middleware.
//!
//! A request to a protected path passes when either:
//!
//! - `X-API-Key` equals the configured key, or
//! - `Authorization: Basic` carries the configured username and password.
//!
//! With no credentials configured, every request to a protected path is
//! rejected.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{header, Request},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use iotgw_config::AuthConfig;
use tower::{Layer, Service};

use crate::error::ApiError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Prefixes guarded by default.
pub const DEFAULT_PROTECTED_PREFIXES: [&str; 2] = ["/iotgateway", "/metrics"];

const MISSING: &str = "Authentication required (Basic Auth or API Key)";
const INVALID: &str = "Invalid authentication credentials";

// =============================================================================
// Credential check
// =============================================================================

/// Result of checking a request's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Accepted via `X-API-Key`.
    ApiKey,
    /// Accepted via Basic credentials.
    Basic,
    /// Neither header was sent.
    Missing,
    /// Credentials were sent but did not match.
    Invalid,
}

impl AuthOutcome {
    /// Returns `true` when the request may proceed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, AuthOutcome::ApiKey | AuthOutcome::Basic)
    }
}

/// Checks `api_key` and `authorization` header values against `config`.
pub fn authenticate(
    config: &AuthConfig,
    api_key: Option<&str>,
    authorization: Option<&str>,
) -> AuthOutcome {
    if api_key.is_none() && authorization.is_none() {
        return AuthOutcome::Missing;
    }

    if let (Some(sent), Some(expected)) = (api_key, config.api_key.as_deref()) {
        if sent == expected {
            return AuthOutcome::ApiKey;
        }
    }

    if let Some((user, pass)) = authorization.and_then(decode_basic) {
        let matches = config.username.as_deref() == Some(user.as_str())
            && config.password.as_deref() == Some(pass.as_str());
        if matches {
            return AuthOutcome::Basic;
        }
    }

    AuthOutcome::Invalid
}

/// Decodes `Basic <base64(user:pass)>`.
fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

// =============================================================================
// AuthLayer
// =============================================================================

/// Layer guarding the protected path prefixes.
#[derive(Clone)]
pub struct AuthLayer {
    config: Arc<AuthConfig>,
    protected: Arc<Vec<String>>,
}

impl AuthLayer {
    /// Creates a layer guarding [`DEFAULT_PROTECTED_PREFIXES`].
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
            protected: Arc::new(
                DEFAULT_PROTECTED_PREFIXES
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            ),
        }
    }

    /// Replaces the protected prefixes.
    pub fn with_protected_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.protected = Arc::new(prefixes);
        self
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            config: self.config.clone(),
            protected: self.protected.clone(),
        }
    }
}

// =============================================================================
// AuthMiddleware
// =============================================================================

/// Middleware for API key / Basic authentication.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    config: Arc<AuthConfig>,
    protected: Arc<Vec<String>>,
}

impl<S> AuthMiddleware<S> {
    /// `/iotgateway` and `/iotgateway/...` match; `/iotgatewayx` does not.
    fn is_protected(&self, path: &str) -> bool {
        self.config.enabled
            && self.protected.iter().any(|prefix| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
    }
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        if !self.is_protected(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let headers = req.headers();
        let api_key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let outcome = authenticate(&self.config, api_key, authorization);

        Box::pin(async move {
            match outcome {
                AuthOutcome::ApiKey | AuthOutcome::Basic => {
                    tracing::debug!(method = ?outcome, "Authentication successful");
                    inner.call(req).await
                }
                AuthOutcome::Missing => {
                    tracing::warn!(path = %req.uri().path(), "Request without any authentication");
                    Ok(ApiError::unauthorized(MISSING).into_response())
                }
                AuthOutcome::Invalid => {
                    tracing::warn!(path = %req.uri().path(), "Invalid authentication credentials");
                    Ok(ApiError::unauthorized(INVALID).into_response())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            api_key: Some("k-123".into()),
            username: Some("admin".into()),
            password: Some("s3:cret".into()),
        }
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn test_authenticate() {
        let config = config();
        assert_eq!(authenticate(&config, None, None), AuthOutcome::Missing);
        assert_eq!(authenticate(&config, Some("k-123"), None), AuthOutcome::ApiKey);
        assert_eq!(authenticate(&config, Some("wrong"), None), AuthOutcome::Invalid);
        assert_eq!(
            authenticate(&config, None, Some(&basic("admin", "s3:cret"))),
            AuthOutcome::Basic
        );
        assert_eq!(
            authenticate(&config, None, Some(&basic("admin", "nope"))),
            AuthOutcome::Invalid
        );
        assert_eq!(
            authenticate(&config, Some("wrong"), Some(&basic("admin", "s3:cret"))),
            AuthOutcome::Basic
        );
        assert_eq!(authenticate(&config, None, Some("Bearer abc")), AuthOutcome::Invalid);
    }

    #[test]
    fn test_no_configured_credentials_rejects() {
        let config = AuthConfig::default();
        assert_eq!(authenticate(&config, Some(""), None), AuthOutcome::Invalid);
    }

    #[test]
    fn test_protected_prefixes() {
        let middleware = AuthLayer::new(config()).layer(tower::service_fn(
            |_req: Request<Body>| async {
                Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
            },
        ));
        assert!(middleware.is_protected("/iotgateway/read"));
        assert!(middleware.is_protected("/metrics"));
        assert!(middleware.is_protected("/metrics/prometheus"));
        assert!(!middleware.is_protected("/health"));
        assert!(!middleware.is_protected("/metricsx"));
    }

    #[tokio::test]
    async fn test_middleware_rejects_missing_credentials() {
        let service = AuthLayer::new(config()).layer(tower::service_fn(
            |_req: Request<Body>| async {
                Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
            },
        ));

        let req = Request::builder()
            .uri("/iotgateway/read?ids=a")
            .body(Body::empty())
            .unwrap();
        let response = service.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Basic");

        let req = Request::builder()
            .uri("/iotgateway/read?ids=a")
            .header(API_KEY_HEADER, "k-123")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_disabled_auth_passes() {
        let mut config = config();
        config.enabled = false;
        let service = AuthLayer::new(config).layer(tower::service_fn(
            |_req: Request<Body>| async {
                Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
            },
        ));
        let req = Request::builder()
            .uri("/iotgateway/write")
            .body(Body::empty())
            .unwrap();
        assert_eq!(service.oneshot(req).await.unwrap().status(), StatusCode::OK);
    }
}
