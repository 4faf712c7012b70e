//! Text shown to blocked clients. Presentation only; the detectors never read it.

pub const STATUS: &str = "BLOCKED";

pub const THREAT_LEVEL: &str = "CRITICAL";

pub const THREAT_ID_PREFIX: &str = "THREAT-";

pub const MESSAGE: &str = "⚠️ SECURITY VIOLATION DETECTED — YOUR REQUEST HAS BEEN BLOCKED";

pub const WARNING: &str = "Your request has been intercepted by our security system. \
Tampering, interception, or manipulation of requests is strictly prohibited. \
Your device fingerprint, IP address, and all request metadata have been captured and logged.";

pub const SECURITY_NOTICE: &str = "All activities on this system are monitored and recorded. \
Evidence of unauthorized access, tampering, or exploitation attempts \
will be reported to relevant authorities. \
Unauthorized access is a violation of applicable cyber crime laws.";

pub const RECOMMENDATIONS: &[&str] = &[
    "Stop using interception/proxy tools against this application.",
    "Do not attempt to manipulate or replay requests.",
    "Do not attempt SQL injection, XSS, or other attack vectors.",
    "Continued attempts will result in permanent IP ban.",
    "Legal action may be pursued for persistent attacks.",
];

/// Shown in `your_data` when a header was not sent.
pub const NOT_AVAILABLE: &str = "N/A";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
