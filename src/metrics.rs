// Prometheus metrics for the CipherBot gateway
//
// Exposed on the /metrics HTTP endpoint when enabled:
// - Operation calls by operation and status (counter)
// - Allow-list rejections (counter)
// - Process launches by outcome (counter)
// - Process durations (histogram)
// - Active processes (gauge)

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Operation metrics
    pub static ref OPERATION_CALLS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("gateway_operation_calls_total", "Total number of gateway operation calls"),
        &["operation", "status"]
    ).expect("Failed to create operation calls metric");

    pub static ref ALLOW_LIST_REJECTIONS_TOTAL: IntCounter = IntCounter::new(
        "gateway_allow_list_rejections_total",
        "Total number of dispatch requests rejected by the allow-list"
    ).expect("Failed to create allow-list rejections metric");

    // Process metrics
    pub static ref PROCESS_LAUNCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("gateway_process_launches_total", "Total number of process invocations by outcome"),
        &["outcome"]
    ).expect("Failed to create process launches metric");

    pub static ref PROCESS_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("gateway_process_duration_seconds", "Process wall-clock duration in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 600.0, 900.0]),
        &["program"]
    ).expect("Failed to create process duration metric");

    pub static ref ACTIVE_PROCESSES: IntGauge = IntGauge::new(
        "gateway_active_processes",
        "Number of currently supervised processes"
    ).expect("Failed to create active processes metric");
}

/// Register all metrics with [`REGISTRY`]
///
/// Calling this more than once is harmless.
pub fn init() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(OPERATION_CALLS_TOTAL.clone()),
        Box::new(ALLOW_LIST_REJECTIONS_TOTAL.clone()),
        Box::new(PROCESS_LAUNCHES_TOTAL.clone()),
        Box::new(PROCESS_DURATION_SECONDS.clone()),
        Box::new(ACTIVE_PROCESSES.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Record one finished operation call
pub fn record_operation(operation: &str, is_error: bool) {
    let status = if is_error { "error" } else { "ok" };
    OPERATION_CALLS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
