pub mod health;
pub mod otel_exporter;
pub mod tracing;

#[cfg(feature = "axum")]
pub mod axum_layer;

pub use health::*;
pub use otel_exporter::*;
pub use self::tracing::*;

#[cfg(feature = "axum")]
pub use axum_layer::{OtelMetrics, otel_metrics_middleware};
