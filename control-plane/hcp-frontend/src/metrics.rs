use hcp_models::OperationRequest;
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};

/// Counters for the resource-operation engine. Built from an injected meter.
#[derive(Clone)]
pub struct FrontendMetrics {
    operations_created: Counter<u64>,
    conflicts: Counter<u64>,
    cancellations: Counter<u64>,
}

impl FrontendMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            operations_created: meter
                .u64_counter("hcp_operations_created_total")
                .with_description("Operation records created, by request kind")
                .build(),
            conflicts: meter
                .u64_counter("hcp_conflicts_total")
                .with_description("Requests rejected by the conflict checker, by request kind")
                .build(),
            cancellations: meter
                .u64_counter("hcp_operations_canceled_total")
                .with_description("Active operations superseded by a newer request")
                .build(),
        }
    }

    pub fn operation_created(&self, request: OperationRequest) {
        self.operations_created
            .add(1, &[KeyValue::new("request", request.as_str())]);
    }

    pub fn conflict(&self, request: OperationRequest) {
        self.conflicts
            .add(1, &[KeyValue::new("request", request.as_str())]);
    }

    pub fn operations_canceled(&self, count: usize) {
        if count > 0 {
            self.cancellations.add(count as u64, &[]);
        }
    }
}
