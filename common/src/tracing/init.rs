use crate::config::{env_flag, env_value};
use crate::error::{Result, SqlaskError};
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub struct OtelGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            // flush remaining spans before exit
            if let Err(e) = provider.shutdown() {
                eprintln!("error shutting down tracer provider: {}", e);
            }
        }
    }
}

fn console_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

fn otlp_provider(service_name: &str, endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| SqlaskError::Tracing(format!("exporter build failed: {}", e)))?;

    let resource = Resource::builder_empty()
        .with_attribute(KeyValue::new("service.name", service_name.to_string()))
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Install the global subscriber. Console output goes to stderr so that
/// rendered query results on stdout stay clean. Spans are exported over
/// OTLP only when `SQLASK_ENABLE_TRACING` is set and an endpoint is known.
pub fn init_tracing(service_name: &str) -> Result<OtelGuard> {
    let endpoint = env_value("OTEL_EXPORTER_OTLP_ENDPOINT")
        .filter(|_| env_flag("SQLASK_ENABLE_TRACING"));

    let Some(endpoint) = endpoint else {
        // a subscriber may already be installed (tests, repeated init)
        let installed = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(console_filter())
            .finish()
            .try_init();
        if installed.is_ok() {
            tracing::debug!(service = service_name, "console logging initialized");
        }
        return Ok(OtelGuard {
            tracer_provider: None,
        });
    };

    let provider = otlp_provider(service_name, &endpoint)?;
    let telemetry =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()));

    tracing_subscriber::registry()
        .with(telemetry)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(console_filter())
        .try_init()
        .map_err(|e| SqlaskError::Tracing(e.to_string()))?;

    tracing::info!(service = service_name, endpoint = %endpoint, "otlp tracing initialized");

    Ok(OtelGuard {
        tracer_provider: Some(provider),
    })
}
