//! The external HTTP admission surface: the single endpoint a module
//! proxy calls before fetching or listing a module.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::module::{Module, Version};
use crate::validate::Validator;

/// Shared state reachable from every request.
pub struct AppState {
    pub validator: Arc<dyn Validator>,
    /// Hosts that must never appear as the caller's peer address or
    /// `Host` header: catches a proxy pointed at itself.
    pub forbidden_hosts: HashSet<String>,
}

#[derive(Debug, Deserialize)]
struct ValidationRequest {
    #[serde(rename = "Module")]
    module: String,
    #[serde(rename = "Version")]
    version: Option<String>,
}

pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/validate", axum::routing::post(admission_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handles a single admission call.
///
/// Order of checks, matching the original exactly: misconfiguration
/// guard first (500 on a forbidden source, before anything else is
/// parsed), then content-type (406), then body decoding (400), then an
/// absent version short-circuits as a listing call (200, no
/// validation), and only then does the rule-set pipeline run.
pub async fn admission_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let peer_host = peer.ip().to_string();
    let host_header = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(host_without_port);

    if state.forbidden_hosts.contains(&peer_host)
        || host_header.is_some_and(|h| state.forbidden_hosts.contains(&h))
    {
        tracing::error!(peer = %peer_host, "admission call from forbidden source, check proxy configuration");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "misconfiguration: request originated from a forbidden source",
        )
            .into_response();
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("application/json") {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }

    let request: ValidationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    if request.module.is_empty() {
        return (StatusCode::BAD_REQUEST, "Module must not be empty").into_response();
    }

    let Some(version_str) = request.version.filter(|v| !v.is_empty()) else {
        // No version means this is a "list available versions" call, not
        // a fetch; there's nothing to validate yet.
        return StatusCode::OK.into_response();
    };

    let version = match Version::parse(&version_str) {
        Ok(version) => version,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let module = Module::new(request.module, version);

    match state.validator.validate(&module).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) if e.is_forbidden() => (StatusCode::FORBIDDEN, e.to_string()).into_response(),
        Err(e) => {
            tracing::error!(module = %module, error = %e, "validation failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn host_without_port(host: &str) -> String {
    host.rsplit_once(':').map_or(host, |(h, _)| h).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::resolve::ResolveFuture;
    use crate::validate::ValidateFuture;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct AlwaysOk;
    impl Validator for AlwaysOk {
        fn validate<'a>(&'a self, _module: &'a Module) -> ValidateFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    struct AlwaysForbidden;
    impl Validator for AlwaysForbidden {
        fn validate<'a>(&'a self, module: &'a Module) -> ValidateFuture<'a> {
            let module = module.clone();
            Box::pin(async move { Err(ValidationError::DeniedLicense { module, license: Default::default() }) })
        }
    }

    fn app(validator: Arc<dyn Validator>) -> axum::Router {
        router(Arc::new(AppState {
            validator,
            forbidden_hosts: HashSet::from(["proxy.internal".to_string()]),
        }))
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 54321)))
    }

    #[tokio::test]
    async fn listing_call_without_version_is_ok_without_validating() {
        let app = app(Arc::new(AlwaysForbidden));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/validate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .extension(peer())
                    .body(Body::from(r#"{"Module":"github.com/foo/bar"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_content_type_is_not_acceptable() {
        let app = app(Arc::new(AlwaysOk));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/validate")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .extension(peer())
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn forbidden_peer_host_is_rejected_before_parsing() {
        let app = router(Arc::new(AppState {
            validator: Arc::new(AlwaysOk),
            forbidden_hosts: HashSet::from(["127.0.0.1".to_string()]),
        }));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/validate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .extension(peer())
                    .body(Body::from("not even json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn denied_license_maps_to_forbidden() {
        let app = app(Arc::new(AlwaysForbidden));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/validate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .extension(peer())
                    .body(Body::from(r#"{"Module":"github.com/foo/bar","Version":"v1.0.0"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn strips_port_from_host_header() {
        assert_eq!(host_without_port("proxy.internal:8080"), "proxy.internal");
        assert_eq!(host_without_port("proxy.internal"), "proxy.internal");
    }
}
