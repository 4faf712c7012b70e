use super::signatures::{CLIENT_HINT_TOOL, PROXY_TOOL_SIGNATURES, SUSPICIOUS_HEADERS};
use super::{DetectorPass, Finding, PassKind, RequestContext};

/// Detects interception proxies and scanners by User-Agent signature,
/// tool-injected headers and missing User-Agent.
pub struct ProxyToolDetector;

impl ProxyToolDetector {
    pub fn new() -> Self {
        Self
    }

    /// Every signature contained in the User-Agent, in rule-bank order.
    pub fn matching_signatures(user_agent: &str) -> Vec<&'static str> {
        let ua_lower = user_agent.to_lowercase();
        PROXY_TOOL_SIGNATURES
            .iter()
            .copied()
            .filter(|sig| ua_lower.contains(sig))
            .collect()
    }
}

impl Default for ProxyToolDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorPass for ProxyToolDetector {
    fn check(&self, request: &RequestContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let user_agent = request.user_agent_str();

        for sig in Self::matching_signatures(user_agent) {
            findings.push(Finding::new(
                PassKind::ProxyTool,
                format!("Proxy tool signature detected in User-Agent: {}", sig),
            ));
        }

        for header in SUSPICIOUS_HEADERS {
            if request.has_header(header) {
                findings.push(Finding::new(
                    PassKind::ProxyTool,
                    format!("Suspicious header detected: {}", header),
                ));
            }
        }

        if user_agent.trim().is_empty() {
            findings.push(Finding::new(
                PassKind::ProxyTool,
                "Missing User-Agent header (automated tool suspected)",
            ));
        }

        let hint_matches = request
            .sec_ch_ua
            .as_deref()
            .map(|hint| hint.to_lowercase().contains(CLIENT_HINT_TOOL))
            .unwrap_or(false);
        if hint_matches {
            findings.push(Finding::new(
                PassKind::ProxyTool,
                "Burp Suite certificate signature detected",
            ));
        }

        findings
    }

    fn name(&self) -> &str {
        "Proxy Tool Detector"
    }
}
