use hcp_observability::{OtelMetrics, build_metrics};

#[test]
fn blank_endpoint_builds_local_provider() {
    let handle = build_metrics("svc", Some("   ")).unwrap();
    let _metrics = OtelMetrics::new(&handle.meter());
    handle.meter().u64_counter("smoke").build().add(1, &[]);
    handle.shutdown();
}

#[test]
fn separate_handles_do_not_share_state() {
    let a = build_metrics("svc-a", None).unwrap();
    let b = build_metrics("svc-b", None).unwrap();
    a.shutdown();
    // `b` stays usable after `a` is shut down.
    let _metrics = OtelMetrics::new(&b.meter());
    b.meter().u64_counter("smoke").build().add(1, &[]);
}
