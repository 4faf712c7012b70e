pub mod body_inspector;
pub mod header_anomaly;
pub mod honeypot;
pub mod inspector;
pub mod notice;
pub mod payload_tampering;
pub mod proxy_tools;
pub mod request_context;
pub mod response;
pub mod signatures;
pub mod trust;

pub use body_inspector::*;
pub use header_anomaly::*;
pub use honeypot::*;
pub use inspector::*;
pub use payload_tampering::*;
pub use proxy_tools::*;
pub use request_context::*;
pub use response::*;
pub use trust::*;

use serde::Serialize;
use std::fmt;

/// Which detector pass produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    ProxyTool,
    HeaderAnomaly,
    PayloadTampering,
    Honeypot,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::ProxyTool => "proxy_tool",
            PassKind::HeaderAnomaly => "header_anomaly",
            PassKind::PayloadTampering => "payload_tampering",
            PassKind::Honeypot => "honeypot",
        }
    }
}

/// One detected issue, tagged with the pass that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub pass: PassKind,
    pub message: String,
}

impl Finding {
    pub fn new(pass: PassKind, message: impl Into<String>) -> Self {
        Self {
            pass,
            message: message.into(),
        }
    }
}

/// Classification attached to a blocked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatType {
    ProxyTool,
    InjectionAttempt,
    Reconnaissance,
    Tampering,
}

impl ThreatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatType::ProxyTool => "PROXY_TOOL",
            ThreatType::InjectionAttempt => "INJECTION_ATTEMPT",
            ThreatType::Reconnaissance => "RECONNAISSANCE",
            ThreatType::Tampering => "TAMPERING",
        }
    }

    /// Picks the classification for a set of findings.
    ///
    /// Priority: reconnaissance > injection > proxy tool > generic tampering.
    pub fn classify(findings: &[Finding]) -> Self {
        let fired = |kind: PassKind| findings.iter().any(|f| f.pass == kind);

        if fired(PassKind::Honeypot) {
            ThreatType::Reconnaissance
        } else if fired(PassKind::PayloadTampering) {
            ThreatType::InjectionAttempt
        } else if fired(PassKind::ProxyTool) {
            ThreatType::ProxyTool
        } else {
            ThreatType::Tampering
        }
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detector pass over the request context.
pub trait DetectorPass: Send + Sync {
    fn check(&self, request: &RequestContext) -> Vec<Finding>;
    fn name(&self) -> &str;
}
