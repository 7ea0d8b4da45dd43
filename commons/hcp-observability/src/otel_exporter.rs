use opentelemetry::KeyValue;
use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
};
use std::time::Duration;

const EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Owns the meter provider for the process. Consumers receive a [`Meter`]
/// from it explicitly; nothing is installed globally.
#[derive(Clone)]
pub struct MetricsHandle {
    provider: SdkMeterProvider,
    scope: &'static str,
}

impl MetricsHandle {
    pub fn meter(&self) -> Meter {
        self.provider.meter(self.scope)
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "meter provider shutdown failed");
        }
    }
}

// The meter API wants a 'static scope name; built once per handle.
fn leak_name(name: &str) -> &'static str {
    Box::leak(name.to_string().into_boxed_str())
}

fn resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_attribute(KeyValue::new("service.name", service_name.to_string()))
        .build()
}

/// Meter provider with no readers. Instruments record into the void.
pub fn local_metrics(service_name: &str) -> MetricsHandle {
    MetricsHandle {
        provider: SdkMeterProvider::builder()
            .with_resource(resource(service_name))
            .build(),
        scope: leak_name(service_name),
    }
}

/// Meter provider that pushes to an OTLP gRPC collector at `endpoint`.
pub fn otlp_metrics(
    service_name: &str,
    endpoint: &str,
) -> Result<MetricsHandle, Box<dyn std::error::Error + Send + Sync>> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource(service_name))
        .with_reader(reader)
        .build();

    Ok(MetricsHandle {
        provider,
        scope: leak_name(service_name),
    })
}

/// OTLP when an endpoint is configured and non-blank, a local provider otherwise.
pub fn build_metrics(
    service_name: &str,
    endpoint: Option<&str>,
) -> Result<MetricsHandle, Box<dyn std::error::Error + Send + Sync>> {
    match endpoint.map(str::trim).filter(|e| !e.is_empty()) {
        Some(endpoint) => otlp_metrics(service_name, endpoint),
        None => Ok(local_metrics(service_name)),
    }
}
