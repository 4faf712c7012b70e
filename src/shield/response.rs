use super::notice;
use super::{RequestContext, ThreatType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub const BLOCK_STATUS: u16 = 403;

/// Stamped on every response that leaves the proxy, blocked or not.
pub const MARKER_HEADERS: &[(&str, &str)] = &[
    ("X-Security", "Active"),
    ("X-Content-Type-Options", "nosniff"),
];

/// Browser hardening headers added to responses served to clients.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("X-Frame-Options", "DENY"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
];

/// Only sent over HTTPS.
pub const HSTS_HEADER: (&str, &str) = (
    "Strict-Transport-Security",
    "max-age=31536000; includeSubDomains; preload",
);

/// Request fields echoed back to a blocked client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientEcho {
    pub ip_address: String,
    pub user_agent: String,
    pub method: String,
    pub path: String,
    pub host: String,
    pub timestamp: String,
    pub secure_connection: bool,
}

/// JSON body of a block response.
#[derive(Debug, Clone, Serialize)]
pub struct BlockPayload {
    pub status: &'static str,
    pub threat_level: &'static str,
    pub threat_type: ThreatType,
    pub threat_id: String,
    pub message: &'static str,
    pub warning: &'static str,
    pub detections: Vec<String>,
    pub your_data: ClientEcho,
    pub security_notice: &'static str,
    pub recommendations: &'static [&'static str],
}

/// Fully formed 403 answer for a blocked request.
#[derive(Debug, Clone)]
pub struct BlockResponse {
    pub status: u16,
    pub payload: BlockPayload,
}

impl BlockResponse {
    pub fn build(
        request: &RequestContext,
        detections: Vec<String>,
        threat_type: ThreatType,
        now: SystemTime,
    ) -> Self {
        let unix_time = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let threat_id = generate_threat_id(&request.client_ip, unix_time, &request.full_path);

        let your_data = ClientEcho {
            ip_address: request.client_ip.clone(),
            user_agent: request
                .user_agent
                .clone()
                .unwrap_or_else(|| notice::NOT_AVAILABLE.to_string()),
            method: request.method.clone(),
            path: request.full_path.clone(),
            host: request
                .host
                .clone()
                .unwrap_or_else(|| notice::NOT_AVAILABLE.to_string()),
            timestamp: format_timestamp(now),
            secure_connection: request.is_secure,
        };

        Self {
            status: BLOCK_STATUS,
            payload: BlockPayload {
                status: notice::STATUS,
                threat_level: notice::THREAT_LEVEL,
                threat_type,
                threat_id,
                message: notice::MESSAGE,
                warning: notice::WARNING,
                detections,
                your_data,
                security_notice: notice::SECURITY_NOTICE,
                recommendations: notice::RECOMMENDATIONS,
            },
        }
    }

    pub fn threat_id(&self) -> &str {
        &self.payload.threat_id
    }

    pub fn threat_type(&self) -> ThreatType {
        self.payload.threat_type
    }

    pub fn detections(&self) -> &[String] {
        &self.payload.detections
    }

    /// Block-specific headers followed by the marker headers.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", "application/json".to_string()),
            ("X-Security-Status", "BLOCKED".to_string()),
            ("X-Threat-ID", self.payload.threat_id.clone()),
            ("X-Warning", "Tampering-Detected".to_string()),
            (
                "Cache-Control",
                "no-store, no-cache, must-revalidate".to_string(),
            ),
            ("Pragma", "no-cache".to_string()),
        ];
        headers.extend(
            MARKER_HEADERS
                .iter()
                .map(|(name, value)| (*name, value.to_string())),
        );
        headers
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.payload)
    }
}

/// `THREAT-` followed by the first 16 upper-case hex chars of
/// SHA-256(`{client_ip}{unix_time}{full_path}`).
pub fn generate_threat_id(client_ip: &str, unix_time: f64, full_path: &str) -> String {
    let raw = format!("{}{}{}", client_ip, unix_time, full_path);
    let digest = Sha256::digest(raw.as_bytes());
    let hex = hex::encode_upper(digest);
    format!("{}{}", notice::THREAT_ID_PREFIX, &hex[..16])
}

pub fn format_timestamp(now: SystemTime) -> String {
    DateTime::<Utc>::from(now)
        .format(notice::TIMESTAMP_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> RequestContext {
        RequestContext {
            client_ip: "203.0.113.9".to_string(),
            user_agent: Some("sqlmap/1.7".to_string()),
            method: "GET".to_string(),
            full_path: "/products?id=1".to_string(),
            path: "/products".to_string(),
            host: Some("api.shop.example.com".to_string()),
            is_secure: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_threat_id_shape() {
        let id = generate_threat_id("1.2.3.4", 1_700_000_000.25, "/.env");
        assert!(id.starts_with("THREAT-"));
        let hex = &id["THREAT-".len()..];
        assert_eq!(hex.len(), 16);
        assert!(hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_threat_id_depends_on_time() {
        assert_eq!(
            generate_threat_id("1.2.3.4", 1.5, "/x"),
            generate_threat_id("1.2.3.4", 1.5, "/x")
        );
        assert_ne!(
            generate_threat_id("1.2.3.4", 1.5, "/x"),
            generate_threat_id("1.2.3.4", 2.5, "/x")
        );
    }

    #[test]
    fn test_timestamp_format() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(format_timestamp(t), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn test_payload_shape() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let response = BlockResponse::build(
            &request(),
            vec!["Proxy tool signature detected in User-Agent: sqlmap".to_string()],
            ThreatType::ProxyTool,
            now,
        );
        let json: serde_json::Value =
            serde_json::from_slice(&response.to_json().unwrap()).unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(json["status"], "BLOCKED");
        assert_eq!(json["threat_level"], "CRITICAL");
        assert_eq!(json["threat_type"], "PROXY_TOOL");
        assert_eq!(json["threat_id"], response.threat_id());
        assert_eq!(json["detections"].as_array().unwrap().len(), 1);
        assert_eq!(json["your_data"]["ip_address"], "203.0.113.9");
        assert_eq!(json["your_data"]["path"], "/products?id=1");
        assert_eq!(json["your_data"]["timestamp"], "2023-11-14 22:13:20 UTC");
        assert_eq!(json["your_data"]["secure_connection"], true);
        assert_eq!(json["recommendations"].as_array().unwrap().len(), 5);
        assert!(json["message"].as_str().unwrap().contains("BLOCKED"));
        assert!(json["security_notice"].is_string());
        assert!(json["warning"].is_string());
    }

    #[test]
    fn test_missing_fields_echo_not_available() {
        let ctx = RequestContext {
            client_ip: "unknown".to_string(),
            method: "GET".to_string(),
            full_path: "/".to_string(),
            ..Default::default()
        };
        let response = BlockResponse::build(&ctx, vec![], ThreatType::Tampering, SystemTime::now());
        assert_eq!(response.payload.your_data.user_agent, "N/A");
        assert_eq!(response.payload.your_data.host, "N/A");
    }

    #[test]
    fn test_block_headers() {
        let response =
            BlockResponse::build(&request(), vec![], ThreatType::Tampering, SystemTime::now());
        let headers = response.headers();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(get("X-Security-Status").as_deref(), Some("BLOCKED"));
        assert_eq!(get("X-Threat-ID").as_deref(), Some(response.threat_id()));
        assert_eq!(get("X-Warning").as_deref(), Some("Tampering-Detected"));
        assert_eq!(
            get("Cache-Control").as_deref(),
            Some("no-store, no-cache, must-revalidate")
        );
        assert_eq!(get("Pragma").as_deref(), Some("no-cache"));
        assert_eq!(get("X-Security").as_deref(), Some("Active"));
        assert_eq!(get("X-Content-Type-Options").as_deref(), Some("nosniff"));
    }
}
