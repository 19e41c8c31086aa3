//! Prometheus metrics for the RTC token service.

#![allow(clippy::expect_used)]

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rtc_token_tokens_issued_total",
        "Total number of RTC tokens issued",
        &["role"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Rejected requests counter.
pub static REQUESTS_REJECTED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rtc_token_requests_rejected_total",
        "Total number of token requests rejected",
        &["code"]
    )
    .expect("Failed to register requests_rejected metric")
});

/// Issuance latency histogram.
pub static ISSUE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "rtc_token_issue_latency_seconds",
        "Token issuance latency in seconds",
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]
    )
    .expect("Failed to register issue_latency metric")
});

/// Record a token issuance.
pub fn record_token_issued(role: &str) {
    TOKENS_ISSUED.with_label_values(&[role]).inc();
}

/// Record a rejected request.
pub fn record_rejection(code: &str) {
    REQUESTS_REJECTED.with_label_values(&[code]).inc();
}

/// Record issuance latency.
pub fn record_issue_latency(duration_secs: f64) {
    ISSUE_LATENCY.observe(duration_secs);
}

/// Render the default registry in the text exposition format.
///
/// # Errors
///
/// Fails when a metric family cannot be encoded.
pub fn render() -> Result<String, prometheus::Error> {
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_token_issued() {
        record_token_issued("publisher");
        let value = TOKENS_ISSUED.with_label_values(&["publisher"]).get();
        assert!(value > 0.0);
    }

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_rejection("INVALID_ARGUMENT");
        record_issue_latency(0.002);
        let text = render().unwrap();
        assert!(text.contains("rtc_token_requests_rejected_total"));
        assert!(text.contains("rtc_token_issue_latency_seconds"));
    }
}
