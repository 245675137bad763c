// CORS configuration from the allowed origin list

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Header carrying a JSON file description on chat requests
pub const FILE_DATA_HEADER: &str = "x-file-data";

/// `*` (or an empty list) allows any origin; otherwise only the listed ones
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(FILE_DATA_HEADER),
        ]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    async fn preflight(origins: &[String], origin: &str) -> Option<HeaderValue> {
        let app = Router::new()
            .route("/api/health", get(|| async { "ok" }))
            .layer(cors_layer(origins));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/health")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).cloned()
    }

    #[tokio::test]
    async fn test_listed_origin_is_allowed() {
        let origins = vec!["http://localhost:5173".to_string()];
        assert_eq!(
            preflight(&origins, "http://localhost:5173").await.unwrap(),
            "http://localhost:5173"
        );
        assert!(preflight(&origins, "http://evil.test").await.is_none());
    }

    #[tokio::test]
    async fn test_wildcard_allows_any_origin() {
        let origins = vec!["*".to_string()];
        assert_eq!(preflight(&origins, "http://anything.test").await.unwrap(), "*");
    }
}
