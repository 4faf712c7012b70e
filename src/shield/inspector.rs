use super::{
    BlockResponse, DetectorPass, Finding, HeaderAnomalyDetector, HoneypotDetector,
    PayloadTamperingDetector, ProxyToolDetector, RequestContext, ThreatType, TrustPolicy,
};
use log::warn;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::SystemTime;

/// Outcome of inspecting one request.
#[derive(Debug, Clone)]
pub enum Verdict {
    PassThrough,
    Block(Box<BlockResponse>),
}

impl Verdict {
    pub fn is_block(&self) -> bool {
        matches!(self, Verdict::Block(_))
    }
}

/// Everything learned about a request, for logging and metrics.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub trusted: bool,
    pub findings: Vec<Finding>,
    pub verdict: Verdict,
}

/// Runs the detector passes in order and decides whether to block.
pub struct RequestInspector {
    trust: TrustPolicy,
    passes: Vec<Arc<dyn DetectorPass>>,
    block_mode: bool,
}

impl RequestInspector {
    /// Inspector with the four built-in passes: proxy tools, header anomalies,
    /// payload tampering, honeypot paths.
    pub fn new(trust: TrustPolicy, block_mode: bool) -> Self {
        let mut inspector = Self::empty(trust, block_mode);
        inspector.add_pass(Arc::new(ProxyToolDetector::new()));
        inspector.add_pass(Arc::new(HeaderAnomalyDetector::new()));
        inspector.add_pass(Arc::new(PayloadTamperingDetector::new()));
        inspector.add_pass(Arc::new(HoneypotDetector::new()));
        inspector
    }

    /// Inspector without passes.
    pub fn empty(trust: TrustPolicy, block_mode: bool) -> Self {
        Self {
            trust,
            passes: Vec::new(),
            block_mode,
        }
    }

    pub fn add_pass(&mut self, pass: Arc<dyn DetectorPass>) {
        self.passes.push(pass);
    }

    /// Findings of every pass, in pass order. A pass that panics contributes
    /// nothing and does not stop the others.
    pub fn evaluate_all(&self, request: &RequestContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        for pass in &self.passes {
            match panic::catch_unwind(AssertUnwindSafe(|| pass.check(request))) {
                Ok(found) => findings.extend(found),
                Err(_) => warn!(
                    "{} failed on {} {}; treating as clean",
                    pass.name(),
                    request.method,
                    request.full_path
                ),
            }
        }

        findings
    }

    pub fn inspect(&self, request: &RequestContext) -> Verdict {
        self.examine(request, SystemTime::now()).verdict
    }

    pub fn examine(&self, request: &RequestContext, now: SystemTime) -> Inspection {
        if self.trust.is_trusted(request) {
            return Inspection {
                trusted: true,
                findings: Vec::new(),
                verdict: Verdict::PassThrough,
            };
        }

        let findings = self.evaluate_all(request);
        if findings.is_empty() {
            return Inspection {
                trusted: false,
                findings,
                verdict: Verdict::PassThrough,
            };
        }

        let threat_type = ThreatType::classify(&findings);
        if !self.block_mode {
            warn!(
                "Log-only mode: {} finding(s) classified {} for {} {} from {}, passing",
                findings.len(),
                threat_type,
                request.method,
                request.full_path,
                request.client_ip
            );
            return Inspection {
                trusted: false,
                findings,
                verdict: Verdict::PassThrough,
            };
        }

        let detections = findings.iter().map(|f| f.message.clone()).collect();
        let response = BlockResponse::build(request, detections, threat_type, now);

        Inspection {
            trusted: false,
            findings,
            verdict: Verdict::Block(Box::new(response)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::PassKind;

    struct PanickingPass;

    impl DetectorPass for PanickingPass {
        fn check(&self, _request: &RequestContext) -> Vec<Finding> {
            panic!("rule bank fault")
        }

        fn name(&self) -> &str {
            "Panicking Pass"
        }
    }

    struct FixedPass(PassKind, &'static str);

    impl DetectorPass for FixedPass {
        fn check(&self, _request: &RequestContext) -> Vec<Finding> {
            vec![Finding::new(self.0, self.1)]
        }

        fn name(&self) -> &str {
            "Fixed Pass"
        }
    }

    fn request() -> RequestContext {
        RequestContext {
            client_ip: "198.51.100.4".to_string(),
            method: "GET".to_string(),
            full_path: "/".to_string(),
            path: "/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_panicking_pass_does_not_suppress_others() {
        let mut inspector = RequestInspector::empty(TrustPolicy::default(), true);
        inspector.add_pass(Arc::new(PanickingPass));
        inspector.add_pass(Arc::new(FixedPass(PassKind::ProxyTool, "tool")));

        let findings = inspector.evaluate_all(&request());
        assert_eq!(findings, vec![Finding::new(PassKind::ProxyTool, "tool")]);
    }

    #[test]
    fn test_only_panicking_pass_yields_pass_through() {
        let mut inspector = RequestInspector::empty(TrustPolicy::default(), true);
        inspector.add_pass(Arc::new(PanickingPass));
        assert!(!inspector.inspect(&request()).is_block());
    }

    #[test]
    fn test_findings_keep_pass_order() {
        let mut inspector = RequestInspector::empty(TrustPolicy::default(), true);
        inspector.add_pass(Arc::new(FixedPass(PassKind::ProxyTool, "first")));
        inspector.add_pass(Arc::new(FixedPass(PassKind::Honeypot, "second")));

        match inspector.inspect(&request()) {
            Verdict::Block(response) => {
                assert_eq!(response.detections(), ["first", "second"]);
                assert_eq!(response.threat_type(), ThreatType::Reconnaissance);
            }
            Verdict::PassThrough => panic!("expected block"),
        }
    }

    #[test]
    fn test_log_only_mode_passes_with_findings() {
        let mut inspector = RequestInspector::empty(TrustPolicy::default(), false);
        inspector.add_pass(Arc::new(FixedPass(PassKind::ProxyTool, "tool")));

        let inspection = inspector.examine(&request(), SystemTime::now());
        assert_eq!(inspection.findings.len(), 1);
        assert!(!inspection.verdict.is_block());
    }

    #[test]
    fn test_trusted_request_skips_passes() {
        let mut inspector =
            RequestInspector::empty(TrustPolicy::new("https://shop.example.com"), true);
        inspector.add_pass(Arc::new(PanickingPass));
        inspector.add_pass(Arc::new(FixedPass(PassKind::Honeypot, "honeypot hit")));

        let mut ctx = request();
        ctx.origin = Some("https://shop.example.com".to_string());

        let inspection = inspector.examine(&ctx, SystemTime::now());
        assert!(inspection.trusted);
        assert!(inspection.findings.is_empty());
        assert!(!inspection.verdict.is_block());
    }
}
