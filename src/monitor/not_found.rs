use crate::shield::{format_timestamp, RequestContext};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub const NOT_FOUND_STATUS: u16 = 404;

const NOT_AVAILABLE: &str = "N/A";
const NO_REFERER: &str = "Direct Access (No Referer)";

/// Monitoring page served in place of an upstream 404. It echoes what the
/// shield saw of the device and, when the beacon is enabled, posts a browser
/// fingerprint back to it.
#[derive(Debug, Clone)]
pub struct NotFoundPage {
    pub session_hash: String,
    pub trace_id: String,
    pub body: String,
}

impl NotFoundPage {
    pub fn render(request: &RequestContext, beacon_path: Option<&str>, now: SystemTime) -> Self {
        let unix_time = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let session_hash = session_hash(&request.client_ip, request.user_agent_str(), unix_time);
        let trace_id = trace_id(unix_time, &request.full_path, &request.client_ip);

        let or_na = |value: Option<&str>| value.unwrap_or(NOT_AVAILABLE).to_string();
        let rows = [
            ("IP Address", request.client_ip.clone()),
            ("User Agent", or_na(request.user_agent.as_deref())),
            ("Request", format!("{} {}", request.method, request.full_path)),
            (
                "Referer",
                request.referer.clone().unwrap_or_else(|| NO_REFERER.to_string()),
            ),
            ("Accept-Language", or_na(request.accept_language.as_deref())),
            ("Accept-Encoding", or_na(request.accept_encoding.as_deref())),
            ("Connection", or_na(request.header("connection"))),
            ("Host", or_na(request.host.as_deref())),
            ("Timestamp", format_timestamp(now)),
            ("Session Hash", session_hash.clone()),
            ("Trace ID", trace_id.clone()),
        ];

        let mut table = String::new();
        for (label, value) in rows {
            table.push_str(&format!(
                "<tr><th>{}</th><td>{}</td></tr>\n",
                label,
                escape_html(&value)
            ));
        }

        let script = beacon_path.map(beacon_script).unwrap_or_default();

        let body = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="robots" content="noindex, nofollow">
<title>404 | Security Monitoring Active</title>
<style>
body {{ background: #0b0f14; color: #d6e2ee; font-family: monospace; padding: 2rem; }}
h1 {{ color: #ff5c5c; }}
table {{ border-collapse: collapse; margin-top: 1rem; }}
th {{ text-align: left; color: #8aa4bd; padding: .25rem 1rem .25rem 0; }}
td {{ word-break: break-all; }}
</style>
</head>
<body>
<h1>404 | PAGE NOT FOUND</h1>
<p>This request has been logged by the security monitoring system.</p>
<table>
{table}</table>
{script}</body>
</html>
"#
        );

        Self {
            session_hash,
            trace_id,
            body,
        }
    }
}

/// 24 upper-case hex chars of SHA-256(`{client_ip}{user_agent}{unix_time}`).
pub fn session_hash(client_ip: &str, user_agent: &str, unix_time: f64) -> String {
    let raw = format!("{}{}{}", client_ip, user_agent, unix_time);
    let hex = hex::encode_upper(Sha256::digest(raw.as_bytes()));
    hex[..24].to_string()
}

/// `TRC-` followed by 12 upper-case hex chars of
/// SHA-256(`{unix_time}{full_path}{client_ip}`).
pub fn trace_id(unix_time: f64, full_path: &str, client_ip: &str) -> String {
    let raw = format!("{}{}{}", unix_time, full_path, client_ip);
    let hex = hex::encode_upper(Sha256::digest(raw.as_bytes()));
    format!("TRC-{}", &hex[..12])
}

fn beacon_script(path: &str) -> String {
    // The path ends up inside a JS string literal
    let path = serde_json::Value::String(path.to_string()).to_string();
    format!(
        r#"<script>
(function () {{
  var fingerprint = {{
    userAgent: navigator.userAgent,
    language: navigator.language,
    platform: navigator.platform,
    timezone: Intl.DateTimeFormat().resolvedOptions().timeZone,
    screen: screen.width + "x" + screen.height,
    colorDepth: screen.colorDepth,
    cores: navigator.hardwareConcurrency || 0
  }};
  var payload = JSON.stringify({{
    fingerprint: fingerprint,
    url: location.href,
    timestamp: Date.now(),
    viewport: window.innerWidth + "x" + window.innerHeight
  }});
  if (navigator.sendBeacon) {{
    navigator.sendBeacon({path}, new Blob([payload], {{ type: "application/json" }}));
  }}
}})();
</script>
"#
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
