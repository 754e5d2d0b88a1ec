//! Tracing and OpenTelemetry initialization.
//!
//! Formatted logs always go to stderr; stdout is reserved for MCP frames.
//! When an OTLP endpoint is configured, traces, logs, and metrics are also
//! exported over gRPC.

use std::time::Duration;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use postmark_conf::TelemetryConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Timeout for OTLP exports - prevents blocking on unavailable endpoints
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_FILTER: &str = "info,postmark_mcp=debug";

const SERVICE_NAME: &str = "postmark-mcp";

struct OtelProviders {
    tracer_provider: SdkTracerProvider,
    logger_provider: SdkLoggerProvider,
    meter_provider: SdkMeterProvider,
}

/// Flushes exporters on [`TelemetryGuard::shutdown`].
#[derive(Default)]
pub struct TelemetryGuard {
    otel: Option<OtelProviders>,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        let Some(otel) = self.otel else {
            return;
        };
        tracing::info!("Shutting down OpenTelemetry");
        if let Err(e) = otel.tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {:?}", e);
        }
        if let Err(e) = otel.meter_provider.shutdown() {
            eprintln!("Failed to shut down meter provider: {:?}", e);
        }
        if let Err(e) = otel.logger_provider.shutdown() {
            eprintln!("Failed to shut down logger provider: {:?}", e);
        }
    }
}

fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    config
        .log_level
        .as_deref()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
pub fn init(config: &TelemetryConfig) -> Result<TelemetryGuard> {
    let otel = config
        .otlp_endpoint
        .as_deref()
        .map(build_providers)
        .transpose()?;

    let telemetry_layer = otel.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer_provider.tracer(SERVICE_NAME))
    });
    let log_appender = otel
        .as_ref()
        .map(|p| OpenTelemetryTracingBridge::new(&p.logger_provider));

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(telemetry_layer)
        .with(log_appender)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!("🔭 OpenTelemetry initialized with OTLP endpoint: {}", endpoint);
    }

    Ok(TelemetryGuard { otel })
}

fn build_providers(otlp_endpoint: &str) -> Result<OtelProviders> {
    let resource = Resource::builder_empty()
        .with_service_name(SERVICE_NAME)
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let endpoint = if otlp_endpoint.starts_with("http") {
        otlp_endpoint.to_string()
    } else {
        format!("http://{}", otlp_endpoint)
    };

    let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP span exporter")?;

    let batch_span_processor =
        opentelemetry_sdk::trace::BatchSpanProcessor::builder(trace_exporter).build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_span_processor(batch_span_processor)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource.clone())
        .build();
    global::set_tracer_provider(tracer_provider.clone());

    let log_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP log exporter")?;

    let log_processor =
        opentelemetry_sdk::logs::BatchLogProcessor::builder(log_exporter).build();

    let logger_provider = SdkLoggerProvider::builder()
        .with_log_processor(log_processor)
        .with_resource(resource.clone())
        .build();

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP metric exporter")?;

    let metric_reader =
        opentelemetry_sdk::metrics::PeriodicReader::builder(metric_exporter).build();

    let meter_provider = SdkMeterProvider::builder()
        .with_reader(metric_reader)
        .with_resource(resource)
        .build();
    global::set_meter_provider(meter_provider.clone());

    Ok(OtelProviders {
        tracer_provider,
        logger_provider,
        meter_provider,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_falls_back_on_garbage() {
        let config = TelemetryConfig {
            otlp_endpoint: None,
            log_level: Some("postmark_mcp=loud".to_string()),
        };
        assert_eq!(env_filter(&config).to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }

    #[test]
    fn test_env_filter_uses_configured_level() {
        let config = TelemetryConfig {
            otlp_endpoint: None,
            log_level: Some("warn".to_string()),
        };
        assert_eq!(env_filter(&config).to_string(), "warn");
    }
}
