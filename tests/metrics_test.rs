mod common;

use common::create_test_metrics;
use switchbot_exporter::collector::{FailureReason, FetchOutcome};
use switchbot_exporter::devices::DeviceDescriptor;
use switchbot_exporter::metrics::MetricsCollector;
use switchbot_exporter::switchbot::types::RateLimit;

fn device(id: &str, room: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        room: room.to_string(),
        ..DeviceDescriptor::new(id)
    }
}

fn down() -> FetchOutcome {
    FetchOutcome::failure(FailureReason::HttpStatus {
        status: 500,
        message: String::new(),
    })
}

#[test]
fn test_metrics_registration() {
    // Verify that all metrics can be created and rendered without panicking
    let metrics = create_test_metrics();

    let rendered = metrics.render();
    assert!(rendered.is_ok(), "Failed to render metrics");

    // Labelled gauges only appear once set, rate gauges only once observed
    let output = rendered.unwrap();
    assert!(!output.contains("switchbot_power_watts"));
    assert!(!output.contains("switchbot_api_requests_remaining"));
}

#[test]
fn test_reconcile_success_renders_all_labels() {
    let metrics = create_test_metrics();
    let plug = DeviceDescriptor {
        id: "ABC123".to_string(),
        name: "nas".to_string(),
        room: "work".to_string(),
        shelf: "rack_1".to_string(),
        device_class: "server".to_string(),
        parent_id: "STRIP1".to_string(),
    };

    metrics.reconcile(&plug, &FetchOutcome::Success { watts: 22.6 });

    let rendered = metrics.render().unwrap();
    for label in [
        "room=\"work\"",
        "shelf=\"rack_1\"",
        "device=\"server\"",
        "device_name=\"nas\"",
        "device_id=\"ABC123\"",
        "parent_id=\"STRIP1\"",
    ] {
        assert!(rendered.contains(label), "Missing label {}", label);
    }
    assert!(rendered.contains("22.6"));
    assert!(rendered.contains("switchbot_device_up{device_id=\"ABC123\"} 1"));
}

#[test]
fn test_reconcile_success_is_idempotent() {
    // Given: The same successful outcome applied twice
    let once = create_test_metrics();
    let twice = create_test_metrics();
    let plug = device("p1", "work");
    let outcome = FetchOutcome::Success { watts: 75.0 };

    once.reconcile(&plug, &outcome);
    twice.reconcile(&plug, &outcome);
    twice.reconcile(&plug, &outcome);

    // Then: Both metric sets render identically
    assert_eq!(once.render().unwrap(), twice.render().unwrap());
    assert_eq!(twice.power_reading(&plug), Some(75.0));
}

#[test]
fn test_label_change_replaces_old_series() {
    // Given: A device published under room "work"
    let metrics = create_test_metrics();
    metrics.reconcile(&device("p1", "work"), &FetchOutcome::Success { watts: 10.0 });

    // When: The same device succeeds with room "living"
    let moved = device("p1", "living");
    metrics.reconcile(&moved, &FetchOutcome::Success { watts: 11.0 });

    // Then: Only the new series exists
    let rendered = metrics.render().unwrap();
    assert!(!rendered.contains("room=\"work\""));
    assert!(rendered.contains("room=\"living\""));
    assert_eq!(rendered.matches("device_id=\"p1\"").count(), 2); // power + up
    assert_eq!(metrics.power_reading(&moved), Some(11.0));
}

#[test]
fn test_failure_after_label_change_removes_previous_series() {
    let metrics = create_test_metrics();
    metrics.reconcile(&device("p1", "work"), &FetchOutcome::Success { watts: 10.0 });

    metrics.reconcile(&device("p1", "living"), &down());

    let rendered = metrics.render().unwrap();
    assert!(!rendered.contains("switchbot_power_watts{"));
    assert_eq!(metrics.power_labels("p1"), None);
}

#[test]
fn test_failure_without_prior_success_is_noop_for_power() {
    let metrics = create_test_metrics();
    let plug = device("never", "work");

    metrics.reconcile(&plug, &down());
    metrics.reconcile(&plug, &down());

    assert_eq!(metrics.up_status("never"), Some(0));
    assert_eq!(metrics.power_reading(&plug), None);
}

#[test]
fn test_up_gauge_is_never_removed() {
    let metrics = create_test_metrics();
    let plug = device("p1", "work");

    metrics.reconcile(&plug, &FetchOutcome::Success { watts: 3.0 });
    metrics.reconcile(&plug, &down());

    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("switchbot_device_up{device_id=\"p1\"} 0"));
}

#[test]
fn test_recovery_republishes_power() {
    let metrics = create_test_metrics();
    let plug = device("p1", "work");

    metrics.reconcile(&plug, &FetchOutcome::Success { watts: 3.0 });
    metrics.reconcile(&plug, &down());
    metrics.reconcile(&plug, &FetchOutcome::Success { watts: 4.5 });

    assert_eq!(metrics.up_status("p1"), Some(1));
    assert_eq!(metrics.power_reading(&plug), Some(4.5));
}

#[test]
fn test_devices_are_independent() {
    let metrics = create_test_metrics();
    let a = device("a", "work");
    let b = device("b", "work");

    metrics.reconcile(&a, &FetchOutcome::Success { watts: 1.0 });
    metrics.reconcile(&b, &FetchOutcome::Success { watts: 2.0 });
    metrics.reconcile(&b, &down());

    assert_eq!(metrics.power_reading(&a), Some(1.0));
    assert_eq!(metrics.power_reading(&b), None);
    assert!(metrics.any_device_up());
}

#[test]
fn test_unpolled_device_has_no_up_value() {
    let metrics = create_test_metrics();
    assert_eq!(metrics.up_status("ghost"), None);
    assert!(!metrics.any_device_up());
}

#[test]
fn test_rate_gauges_absent_until_observed() {
    // Given: A fresh metric set
    let metrics = create_test_metrics();
    assert_eq!(metrics.rate_remaining(), None);

    // When: A response carries all three quota headers
    metrics.observe_rate_limit(
        &RateLimit {
            limit: Some(10000),
            remaining: Some(9987),
            reset_ms: Some(1_708_473_600_000),
        },
        100,
    );

    // Then: All three gauges render
    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("switchbot_api_requests_remaining 9987"));
    assert!(rendered.contains("switchbot_api_requests_limit 10000"));
    assert!(rendered.contains("switchbot_api_requests_reset_timestamp_seconds 1708473600"));
    assert_eq!(metrics.rate_remaining(), Some(9987));
}

#[test]
fn test_rate_remaining_last_writer_wins() {
    let metrics = create_test_metrics();
    let observe = |remaining| {
        metrics.observe_rate_limit(
            &RateLimit {
                remaining: Some(remaining),
                ..RateLimit::default()
            },
            100,
        )
    };

    observe(500);
    observe(99);
    observe(120);

    assert_eq!(metrics.rate_remaining(), Some(120));
}

#[test]
fn test_absent_remaining_does_not_register_gauge() {
    let metrics = create_test_metrics();

    metrics.observe_rate_limit(&RateLimit::default(), 100);

    assert_eq!(metrics.rate_remaining(), None);
    assert!(!metrics
        .render()
        .unwrap()
        .contains("switchbot_api_requests_remaining"));
}

#[test]
fn test_failed_rate_gauge_registration_is_not_observed() {
    // Given: A shared registry that already owns the remaining-quota name
    let registry = prometheus::Registry::new();
    let squatter = prometheus::IntGauge::new(
        "switchbot_api_requests_remaining",
        "Registered by another component",
    )
    .unwrap();
    registry.register(Box::new(squatter)).unwrap();
    let metrics = MetricsCollector::with_registry(registry).unwrap();

    // When: The API reports its quota
    metrics.observe_rate_limit(
        &RateLimit {
            limit: Some(10000),
            remaining: Some(42),
            reset_ms: None,
        },
        100,
    );

    // Then: The unexposed gauge is not reported as observed, the others are
    assert_eq!(metrics.rate_remaining(), None);
    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("switchbot_api_requests_limit 10000"));
    assert!(!rendered.contains("switchbot_api_requests_remaining 42"));
}
