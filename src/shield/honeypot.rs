use super::signatures::HONEYPOT_PATHS;
use super::{DetectorPass, Finding, PassKind, RequestContext};

/// Flags requests for paths that only scanners ask for.
pub struct HoneypotDetector;

impl HoneypotDetector {
    pub fn new() -> Self {
        Self
    }

    /// The honeypot entry hit by `path`, if any. The path is lower-cased and
    /// stripped of trailing slashes first.
    pub fn matching_entry(path: &str) -> Option<&'static str> {
        let lowered = path.to_lowercase();
        let normalized = lowered.trim_end_matches('/');

        HONEYPOT_PATHS.iter().copied().find(|honeypot| {
            normalized == honeypot.trim_end_matches('/') || normalized.starts_with(honeypot)
        })
    }
}

impl Default for HoneypotDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorPass for HoneypotDetector {
    fn check(&self, request: &RequestContext) -> Vec<Finding> {
        match Self::matching_entry(&request.path) {
            Some(_) => vec![Finding::new(
                PassKind::Honeypot,
                format!("Sensitive path probe detected: {}", request.path),
            )],
            None => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "Honeypot Path Detector"
    }
}
