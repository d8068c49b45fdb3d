// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP metrics middleware.
//!
//! Counts every request and records its status class and response time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{body::Body, http::Request, response::Response};
use iotgw_core::MetricsSink;
use tower::{Layer, Service};

/// Layer feeding HTTP metrics into a sink.
#[derive(Clone)]
pub struct MetricsLayer {
    sink: Arc<dyn MetricsSink>,
}

impl MetricsLayer {
    /// Creates a layer reporting to `sink`.
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware {
            inner,
            sink: self.sink.clone(),
        }
    }
}

/// Middleware recording HTTP metrics.
#[derive(Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
    sink: Arc<dyn MetricsSink>,
}

impl<S> Service<Request<Body>> for MetricsMiddleware<S>
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
        let sink = self.sink.clone();
        let mut inner = self.inner.clone();
        sink.http_request();
        let started = Instant::now();

        Box::pin(async move {
            let response = inner.call(req).await?;
            sink.http_response(response.status().as_u16(), started.elapsed());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use iotgw_core::MetricsCollector;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_counts_status_classes() {
        let collector = MetricsCollector::shared();
        let service = MetricsLayer::new(collector.clone()).layer(tower::service_fn(
            |req: Request<Body>| async move {
                let status = if req.uri().path() == "/missing" {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::OK
                };
                let mut response = Response::new(Body::empty());
                *response.status_mut() = status;
                Ok::<_, std::convert::Infallible>(response)
            },
        ));

        for path in ["/health", "/missing", "/health"] {
            let req = Request::builder().uri(path).body(Body::empty()).unwrap();
            service.clone().oneshot(req).await.unwrap();
        }

        let http = collector.http();
        assert_eq!(http.http_requests, 3);
        assert_eq!(http.http_2xx, 2);
        assert_eq!(http.http_4xx, 1);
        assert_eq!(http.http_errors, 1);
    }
}
