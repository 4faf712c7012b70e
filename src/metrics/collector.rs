use crate::shield::{Finding, ThreatType};
use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// Registered with the global registry served by Pingora's Prometheus service
static INSPECTED_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("shield_inspected_requests_total", "Requests seen by the inspector")
        .expect("metric creation failed")
});

static PASSED_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("shield_passed_requests_total", "Requests passed through to upstream")
        .expect("metric creation failed")
});

static BLOCKED_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("shield_blocked_requests_total", "Requests blocked by the inspector"),
        &["threat_type"],
    )
    .expect("metric creation failed")
});

static FINDINGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("shield_findings_total", "Findings produced per detector pass"),
        &["pass"],
    )
    .expect("metric creation failed")
});

/// Handle on the shield counters. Construction registers them once.
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        // AlreadyReg is fine: collectors share the same static counters.
        let _ = prometheus::register(Box::new(INSPECTED_REQUESTS.clone()));
        let _ = prometheus::register(Box::new(PASSED_REQUESTS.clone()));
        let _ = prometheus::register(Box::new(BLOCKED_REQUESTS.clone()));
        let _ = prometheus::register(Box::new(FINDINGS.clone()));

        Self
    }

    pub fn record_findings(&self, findings: &[Finding]) {
        for finding in findings {
            FINDINGS.with_label_values(&[finding.pass.as_str()]).inc();
        }
    }

    pub fn increment_passed_requests(&self) {
        INSPECTED_REQUESTS.inc();
        PASSED_REQUESTS.inc();
    }

    pub fn increment_blocked_requests(&self, threat_type: ThreatType) {
        INSPECTED_REQUESTS.inc();
        BLOCKED_REQUESTS
            .with_label_values(&[threat_type.as_str()])
            .inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
