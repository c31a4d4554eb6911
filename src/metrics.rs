use tracing::trace;

// Trace-based counters; the Prometheus recorder in main.rs covers request
// volume, these add per-upstream visibility without macro churn.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "listinglift.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn llm_elapsed(action: &'static str, elapsed_ms: u128) {
    trace!(
        target = "listinglift.metrics",
        action = action,
        elapsed_ms = elapsed_ms as u64,
        "llm_elapsed"
    );
}

pub fn scrape_elapsed(target: &str, elapsed_ms: u128) {
    trace!(
        target = "listinglift.metrics",
        scrape_target = target,
        elapsed_ms = elapsed_ms as u64,
        "scrape_elapsed"
    );
}
