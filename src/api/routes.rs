use crate::{
    api::{health, users},
    config::Config,
};
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, Request},
    routing::get,
    Router,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
}

/// Build the request pipeline: CORS, payload ceiling, request spans, routes.
pub fn create_router(db_pool: PgPool, config: &Config) -> Router {
    let state = AppState { db_pool };

    // Configure CORS with an explicit origin allow-list; wildcard origins
    // cannot be combined with credentials
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let router = Router::new()
        // Health endpoint (performs a DB round-trip)
        .route("/auth/health", get(health::health))
        // Mounted user route table
        .nest("/auth/user", users::router())
        .with_state(state);

    // Per-request spans, gated by the HTTP instrumentation adapter
    let router = if config.telemetry.instrumentation.http {
        router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            },
        ))
    } else {
        router
    };

    router
        // Payload ceiling applies before any handler reads the body
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CorsConfig, DatabaseConfig, InstrumentationConfig, LogConfig, ServerConfig,
        TelemetryConfig,
    };
    use axum::http::StatusCode;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                port: 3000,
                body_limit_bytes: 1024,
            },
            database: DatabaseConfig {
                url: "postgres://127.0.0.1:1/unreachable".to_string(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_seconds: 1,
                idle_timeout_seconds: 60,
            },
            cors: CorsConfig {
                allowed_origins: vec!["http://localhost:5173".to_string()],
            },
            log: LogConfig {
                level: "error".to_string(),
                format: "pretty".to_string(),
            },
            telemetry: TelemetryConfig {
                enabled: false,
                service_name: "auth-service".to_string(),
                otlp_endpoint: "http://localhost:4317".to_string(),
                service_version: "1.0.0".to_string(),
                environment: "test".to_string(),
                instrumentation: InstrumentationConfig {
                    http: false,
                    database: false,
                },
            },
        }
    }

    /// Pool pointed at a port nothing listens on; connections are only
    /// attempted when a query runs.
    fn unreachable_pool(config: &Config) -> PgPool {
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy(&config.database.url)
            .expect("lazy pool")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("parse body")
    }

    #[tokio::test]
    async fn test_health_reports_disconnected_database() {
        let config = test_config();
        let app = create_router(unreachable_pool(&config), &config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["db"], "disconnected");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let config = test_config();
        let app = create_router(unreachable_pool(&config), &config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/health")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:5173")
        );
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_cors_rejects_unlisted_origin() {
        let config = test_config();
        let app = create_router(unreachable_pool(&config), &config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/health")
                    .header(header::ORIGIN, "http://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected_before_handler() {
        let config = test_config();
        let app = create_router(unreachable_pool(&config), &config);

        let padding = "x".repeat(2 * config.server.body_limit_bytes);
        let payload = format!(r#"{{"display_name":"{}"}}"#, padding);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/auth/user/profile/42")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_update_profile_validates_input() {
        let config = test_config();
        let app = create_router(unreachable_pool(&config), &config);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/auth/user/profile/42")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"display_name":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Display name is required");
    }

    #[tokio::test]
    async fn test_update_profile_echoes_profile() {
        let config = test_config();
        let app = create_router(unreachable_pool(&config), &config);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/auth/user/profile/42")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"display_name":"Alex"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], "42");
        assert_eq!(body["display_name"], "Alex");
    }
}
