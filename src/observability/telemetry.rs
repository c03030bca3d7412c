use crate::{
    config::{LogConfig, TelemetryConfig},
    errors::{AppError, Result},
};
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime,
    trace::{self as sdktrace, TracerProvider},
    Resource,
};
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Grace period for flushing buffered spans on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns the tracing pipeline for the lifetime of the process.
///
/// Call [`TelemetryGuard::shutdown`] before exit to flush buffered spans;
/// dropping the guard without it abandons them.
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

/// Initialize logging and the distributed-tracing pipeline.
///
/// Sets up one subscriber registry with an env filter (`RUST_LOG` wins over
/// the configured level), a fmt layer in the configured format, and, when
/// telemetry is enabled, an OpenTelemetry layer exporting spans over
/// OTLP/gRPC to the configured collector endpoint.
///
/// A pipeline construction failure is logged and downgrades the service to
/// local logging only; it never aborts startup.
pub fn init(log: &LogConfig, telemetry: &TelemetryConfig) -> TelemetryGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let (provider, pipeline_err) = if telemetry.enabled {
        match build_pipeline(telemetry) {
            Ok(provider) => (Some(provider), None),
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer("auth-service"))
    });

    let registry = tracing_subscriber::registry().with(filter).with(otel_layer);

    match log.format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().flatten_event(true))
                .init();
        }
        _ => {
            // Pretty format for development
            registry.with(fmt::layer().pretty()).init();
        }
    }

    if let Some(provider) = &provider {
        global::set_tracer_provider(provider.clone());
        global::set_text_map_propagator(TraceContextPropagator::new());
        tracing::info!(
            service = %telemetry.service_name,
            endpoint = %telemetry.otlp_endpoint,
            "OpenTelemetry initialized"
        );
    }
    if let Some(e) = pipeline_err {
        tracing::warn!(
            "Failed to initialize telemetry pipeline, continuing with local logging only: {}",
            e
        );
    }

    tracing::info!(
        "Tracing initialized (level: {}, format: {})",
        log.level,
        log.format
    );

    TelemetryGuard { provider }
}

/// Construct the OTLP exporter and batch span pipeline.
fn build_pipeline(config: &TelemetryConfig) -> Result<TracerProvider> {
    let resource = Resource::new([
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(config.otlp_endpoint.clone()),
        )
        .with_trace_config(sdktrace::Config::default().with_resource(resource))
        .install_batch(runtime::Tokio)
        .map_err(|e| AppError::Telemetry(e.to_string()))
}

impl TelemetryGuard {
    /// Flush and shut down the tracing pipeline, bounded by [`SHUTDOWN_GRACE`].
    ///
    /// Shutdown failures are logged and swallowed; exit is never blocked on
    /// the collector being reachable.
    pub async fn shutdown(self) {
        let Some(provider) = self.provider else {
            return;
        };

        // Provider shutdown blocks while draining the batch processor
        let result = tokio::time::timeout(
            SHUTDOWN_GRACE,
            tokio::task::spawn_blocking(move || provider.shutdown()),
        )
        .await;

        match result {
            Ok(Ok(Ok(()))) => tracing::info!("Telemetry pipeline terminated"),
            Ok(Ok(Err(e))) => tracing::error!("Error terminating telemetry pipeline: {}", e),
            Ok(Err(e)) => tracing::error!("Telemetry shutdown task panicked: {}", e),
            Err(_) => tracing::warn!(
                "Telemetry shutdown did not complete within {:?}",
                SHUTDOWN_GRACE
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_without_pipeline_returns_immediately() {
        let guard = TelemetryGuard { provider: None };
        tokio::time::timeout(Duration::from_millis(100), guard.shutdown())
            .await
            .expect("shutdown should not block");
    }
}
