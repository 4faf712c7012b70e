use super::signatures::{MAX_USER_AGENT_LEN, STANDARD_BROWSER_HEADERS, USER_AGENT_METACHARACTERS};
use super::{DetectorPass, Finding, PassKind, RequestContext};

/// Flags header shapes no real browser produces.
pub struct HeaderAnomalyDetector;

impl HeaderAnomalyDetector {
    pub fn new() -> Self {
        Self
    }

    fn missing_standard_headers(request: &RequestContext) -> Vec<&'static str> {
        let present = [
            request.accept.is_some(),
            request.accept_language.is_some(),
            request.accept_encoding.is_some(),
        ];
        STANDARD_BROWSER_HEADERS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl Default for HeaderAnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorPass for HeaderAnomalyDetector {
    fn check(&self, request: &RequestContext) -> Vec<Finding> {
        let mut anomalies = Vec::new();
        let user_agent = request.user_agent_str();

        if !user_agent.is_empty() {
            if user_agent.chars().count() > MAX_USER_AGENT_LEN {
                anomalies.push(Finding::new(
                    PassKind::HeaderAnomaly,
                    "Abnormally long User-Agent header (possible buffer overflow attempt)",
                ));
            }

            if user_agent.contains(USER_AGENT_METACHARACTERS) {
                anomalies.push(Finding::new(
                    PassKind::HeaderAnomaly,
                    "User-Agent contains suspicious characters",
                ));
            }
        }

        if request.method.eq_ignore_ascii_case("GET") {
            let missing = Self::missing_standard_headers(request);
            if missing.len() >= 2 {
                anomalies.push(Finding::new(
                    PassKind::HeaderAnomaly,
                    format!("Missing standard browser headers: {}", missing.join(", ")),
                ));
            }
        }

        if request.protocol == "HTTP/1.0" {
            anomalies.push(Finding::new(
                PassKind::HeaderAnomaly,
                "Using HTTP/1.0 protocol (uncommon for modern browsers)",
            ));
        }

        for (name, value) in &request.headers {
            if value.contains(['\r', '\n']) {
                anomalies.push(Finding::new(
                    PassKind::HeaderAnomaly,
                    format!("Header injection attempt detected in {}", name),
                ));
            }
        }

        anomalies
    }

    fn name(&self) -> &str {
        "Header Anomaly Detector"
    }
}
