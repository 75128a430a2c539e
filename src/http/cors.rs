//! Origin allow-list CORS policy.

use crate::config::CorsConfig;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Method, header};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Max-age advertised on pre-flight responses.
pub const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86400);

/// Headers accepted by the plain HTTP transport.
pub fn plain_allow_headers() -> Vec<HeaderName> {
    vec![header::CONTENT_TYPE, header::AUTHORIZATION]
}

/// Headers accepted by the streamable transport.
pub fn streamable_allow_headers() -> Vec<HeaderName> {
    vec![
        header::CONTENT_TYPE,
        header::ACCEPT,
        crate::http::streamable::PROTOCOL_VERSION_HEADER,
        crate::http::streamable::SESSION_ID_HEADER,
    ]
}

/// Build the CORS layer, or `None` when CORS is disabled.
///
/// A matching `Origin` is reflected back verbatim, wildcard included. Every
/// `OPTIONS` request is answered with an empty 200.
pub fn layer(config: &CorsConfig, allow_headers: Vec<HeaderName>) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let policy = config.clone();
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
        origin.to_str().is_ok_and(|origin| policy.allows(origin))
    });

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(allow_headers)
            .max_age(PREFLIGHT_MAX_AGE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    fn app(origins: &[&str]) -> Router {
        let config = CorsConfig {
            enabled: true,
            origins: origins.iter().map(|o| o.to_string()).collect(),
        };
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .layer(layer(&config, plain_allow_headers()).unwrap())
    }

    fn options(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/health")
            .header("origin", origin)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_wildcard_reflects_origin() {
        let response = app(&["*"]).oneshot(options("http://x.test")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://x.test"
        );
        assert_eq!(
            response.headers().get("access-control-max-age").unwrap(),
            "86400"
        );
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unlisted_origin_not_reflected() {
        let response = app(&["https://example.com"])
            .oneshot(options("http://x.test"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_listed_origin_on_simple_request() {
        let request = Request::builder()
            .uri("/health")
            .header("origin", "https://example.com")
            .body(Body::empty())
            .unwrap();
        let response = app(&["https://example.com"]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_disabled() {
        let config = CorsConfig {
            enabled: false,
            origins: vec!["*".into()],
        };
        assert!(layer(&config, plain_allow_headers()).is_none());
    }
}
