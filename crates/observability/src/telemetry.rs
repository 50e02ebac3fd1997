//! OpenTelemetry telemetry initialization for version 0.31.0
//!
//! Console logging goes to stderr so command output on stdout stays clean.
//! OTLP export is enabled only when an endpoint is configured.

use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;
use crate::error::ObservabilityError;

// Store the tracer provider for proper shutdown
static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Initialize tracing with the given configuration
///
/// Fails if the log filter cannot be parsed or a global subscriber is
/// already installed. An unreachable OTLP endpoint only downgrades to
/// console-only tracing.
pub fn init(config: ObservabilityConfig) -> Result<(), ObservabilityError> {
    let env_filter = match &config.log_level {
        Some(level) => tracing_subscriber::EnvFilter::try_new(level.as_str())
            .map_err(|e| ObservabilityError::Config(format!("invalid log level '{}': {}", level, e)))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    let resource = build_resource(&config);

    let fmt_layer = config
        .enable_console
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let (otel_layer, otlp_status) = match &config.otlp_endpoint {
        Some(endpoint) => match build_otlp_tracer_provider(&config.service_name, endpoint, resource)
        {
            Ok((tracer, provider)) => {
                // Set as global provider BEFORE creating layer
                global::set_tracer_provider(provider.clone());
                let _ = TRACER_PROVIDER.set(provider);
                (Some(OpenTelemetryLayer::new(tracer)), Ok(Some(endpoint.as_str())))
            }
            Err(e) => (None, Err(e)),
        },
        None => (None, Ok(None)),
    };

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| ObservabilityError::InitFailed(e.to_string()))?;

    // Report only once the subscriber is live so the events are not lost.
    match otlp_status {
        Ok(None) => tracing::debug!(
            service.name = %config.service_name,
            "Tracing initialized (console only, no OTLP endpoint configured)"
        ),
        Ok(Some(endpoint)) => tracing::info!(
            service.name = %config.service_name,
            otlp.endpoint = %endpoint,
            "OTLP tracing enabled"
        ),
        Err(e) => tracing::warn!(
            service.name = %config.service_name,
            error = %e,
            "Failed to initialize OTLP export, falling back to console-only tracing"
        ),
    }

    Ok(())
}

fn build_resource(config: &ObservabilityConfig) -> Resource {
    let mut attributes = vec![KeyValue::new("service.name", config.service_name.clone())];

    if let Some(version) = &config.service_version {
        attributes.push(KeyValue::new("service.version", version.clone()));
    }

    for (key, value) in &config.resource_attributes {
        attributes.push(KeyValue::new(key.clone(), value.clone()));
    }

    // In 0.31, Resource constructors are private; ResourceBuilder is the public API
    Resource::builder().with_attributes(attributes).build()
}

/// Build OTLP tracer provider for OpenTelemetry 0.31
///
/// Pattern: SpanExporter::builder().with_tonic().with_endpoint().build()
/// plus a batch-exporting SdkTracerProvider.
fn build_otlp_tracer_provider(
    service_name: &str,
    endpoint: &str,
    resource: Resource,
) -> Result<(opentelemetry_sdk::trace::SdkTracer, SdkTracerProvider), ObservabilityError> {
    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.to_string())
        .build()
        .map_err(|e| ObservabilityError::InitFailed(e.to_string()))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(service_name.to_string());

    Ok((tracer, provider))
}

/// Shutdown OpenTelemetry tracer provider
///
/// Call this before exit so buffered spans are exported.
pub fn shutdown() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        let _ = provider.shutdown();
        tracing::debug!("OpenTelemetry tracer provider shut down");
    }
}

/// Initialize with configuration from environment variables
pub fn init_from_env() -> Result<(), ObservabilityError> {
    init(ObservabilityConfig::from_env())
}
