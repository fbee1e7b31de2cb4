//! Tracing subscriber and OpenTelemetry provider setup.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{Config, LogFormat};
use crate::error::StartupError;

/// Instrumentation scope of spans created by this service.
pub const TRACER_NAME: &str = "service-product";

/// Installs the global tracer provider, the W3C propagator and the
/// `tracing` subscriber (env filter, console output, OpenTelemetry bridge).
///
/// Spans are exported over OTLP/HTTP only when a collector endpoint is
/// configured; the exporter reads `OTEL_EXPORTER_OTLP_ENDPOINT` itself.
pub fn init(config: &Config) -> Result<TelemetryGuard, StartupError> {
    let resource = Resource::builder()
        .with_attributes([KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_NAME,
            config.service_name.clone(),
        )])
        .build();

    let mut builder = SdkTracerProvider::builder().with_resource(resource);
    if config.otlp_endpoint.is_some() {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .build()
            .map_err(|e| StartupError::Telemetry(e.to_string()))?;
        builder = builder.with_batch_exporter(exporter);
    }
    let provider = builder.build();

    opentelemetry::global::set_tracer_provider(provider.clone());
    saga::init_propagator();

    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer(TRACER_NAME));

    // The fmt layer type differs per format, so each arm builds its own stack.
    let registry = Registry::default().with(env_filter).with(otel_layer);
    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };
    installed.map_err(|e| StartupError::Telemetry(e.to_string()))?;

    Ok(TelemetryGuard { provider })
}

/// Flushes and shuts down the tracer provider on drop.
pub struct TelemetryGuard {
    provider: SdkTracerProvider,
}

impl TelemetryGuard {
    /// A tracer for spans created outside the `tracing` bridge.
    pub fn tracer(&self) -> SdkTracer {
        self.provider.tracer(TRACER_NAME)
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("failed to shut down OpenTelemetry tracer provider: {e}");
        }
    }
}
