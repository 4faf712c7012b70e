use crate::shield::*;
use bytes::Bytes;
use std::time::Instant;

/// Per-request proxy state.
pub struct ShieldContext {
    pub request: Option<RequestContext>,
    pub body_inspector: BodyInspector,
    pub findings: Vec<Finding>,
    /// Set once a block response has been written downstream.
    pub blocked: Option<(ThreatType, String)>,
    /// Upstream body is being swapped for the monitoring page.
    pub replace_body: bool,
    pub replacement: Option<Bytes>,
    pub started_at: Instant,
}

impl ShieldContext {
    pub fn new(max_body_size: usize) -> Self {
        Self {
            request: None,
            body_inspector: BodyInspector::new(max_body_size),
            findings: Vec::new(),
            blocked: None,
            replace_body: false,
            replacement: None,
            started_at: Instant::now(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }

    pub fn is_secure(&self) -> bool {
        self.request.as_ref().is_some_and(|r| r.is_secure)
    }

    pub fn client_ip(&self) -> &str {
        self.request
            .as_ref()
            .map(|r| r.client_ip.as_str())
            .unwrap_or("unknown")
    }
}
