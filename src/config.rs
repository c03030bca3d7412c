use crate::errors::{AppError, Result};
use axum::http::HeaderValue;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub log: LogConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub service_name: String,
    pub otlp_endpoint: String,
    pub service_version: String,
    pub environment: String,
    pub instrumentation: InstrumentationConfig,
}

/// Instrumentation adapters, each independently enableable.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentationConfig {
    /// Per-request spans for inbound HTTP.
    pub http: bool,
    /// Statement-level logging from the database client.
    pub database: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Build configuration: defaults, then optional file, then prefixed
        // environment variables, then the well-known variable names
        let config = config::Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.body_limit_bytes", 10 * 1024 * 1024)?
            .set_default("database.url", "postgres://localhost:5432/auth")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_seconds", 5)?
            .set_default("database.idle_timeout_seconds", 600)?
            .set_default(
                "cors.allowed_origins",
                vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:8080".to_string(),
                    "http://localhost:5174".to_string(),
                ],
            )?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .set_default("telemetry.enabled", true)?
            .set_default("telemetry.service_name", "auth-service")?
            .set_default("telemetry.otlp_endpoint", "http://localhost:4317")?
            .set_default("telemetry.service_version", "1.0.0")?
            .set_default("telemetry.environment", "development")?
            .set_default("telemetry.instrumentation.http", true)?
            .set_default("telemetry.instrumentation.database", true)?
            .add_source(config::File::with_name("config/default").required(false))
            // Environment variables with prefix AUTH_API
            // e.g., AUTH_API__SERVER__PORT=8080
            .add_source(
                config::Environment::with_prefix("AUTH_API")
                    .separator("__")
                    .try_parsing(true),
            )
            // Well-known variable names take precedence
            .set_override_option("server.port", env::var("API_PORT").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("telemetry.service_name", env::var("OTEL_SERVICE_NAME").ok())?
            .set_override_option(
                "telemetry.otlp_endpoint",
                env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            )?
            .set_override_option("telemetry.service_version", env::var("APP_VERSION").ok())?
            .set_override_option("telemetry.environment", env::var("ENV").ok())?
            .build()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        // Deserialize into our Config struct
        let mut config: Config = config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        // The frontend origin joins the allow-list ahead of the defaults
        if let Ok(frontend_url) = env::var("FRONTEND_URL") {
            if !config.cors.allowed_origins.contains(&frontend_url) {
                config.cors.allowed_origins.insert(0, frontend_url);
            }
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Validate server config
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(AppError::Configuration(
                "Body size limit must be greater than zero".to_string(),
            ));
        }

        // Validate database config
        if self.database.url.is_empty() {
            return Err(AppError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        // Validate CORS config
        if self.cors.allowed_origins.is_empty() {
            return Err(AppError::Configuration(
                "At least one allowed origin is required".to_string(),
            ));
        }
        for origin in &self.cors.allowed_origins {
            if origin.parse::<HeaderValue>().is_err() {
                return Err(AppError::Configuration(format!(
                    "Invalid CORS origin: {}",
                    origin
                )));
            }
        }

        Ok(())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::load().expect("Failed to load config");
        assert!(config.validate().is_ok());
        assert_eq!(config.server.body_limit_bytes, 10 * 1024 * 1024);
        assert!(!config.cors.allowed_origins.is_empty());
        assert!(config.telemetry.instrumentation.http);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::load().expect("Failed to load config");
        assert!(config.validate().is_ok());

        // Test invalid port
        config.server.port = 0;
        assert!(config.validate().is_err());

        // Test malformed origin
        config.server.port = 3000;
        config.cors.allowed_origins = vec!["not a header\nvalue".to_string()];
        assert!(config.validate().is_err());
    }
}
