use crate::shield::format_timestamp;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Keys a browser fingerprint beacon always carries.
pub const EXPECTED_KEYS: &[&str] = &["fingerprint", "url", "timestamp", "viewport"];

/// Minimum number of entries in a genuine `fingerprint` object.
pub const MIN_FINGERPRINT_FIELDS: usize = 3;

/// Status and JSON body returned to the beacon caller.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconReply {
    pub status: u16,
    pub body: Value,
}

impl BeaconReply {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.body)
    }
}

/// Answers the security-monitor beacon. The payload is validated and then
/// discarded; nothing is stored.
pub fn handle_beacon(method: &str, body: &[u8], client_ip: &str, now: SystemTime) -> BeaconReply {
    let timestamp = format_timestamp(now);

    if !method.eq_ignore_ascii_case("POST") {
        return BeaconReply {
            status: 405,
            body: json!({
                "status": "METHOD_NOT_ALLOWED",
                "message": "Only POST is accepted on this endpoint.",
                "your_ip": client_ip,
                "timestamp": timestamp,
            }),
        };
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            return BeaconReply {
                status: 400,
                body: json!({
                    "status": "FLAGGED",
                    "message": "⚠️ MALFORMED PAYLOAD DETECTED — Request has been flagged.",
                    "warning": "Your attempt to send a manipulated or corrupted payload \
                                has been detected and logged. The original request data \
                                from your device has already been captured server-side. \
                                Tampering with monitoring endpoints is a security violation.",
                    "threat_id": short_id("MON-", now),
                    "your_ip": client_ip,
                    "timestamp": timestamp,
                }),
            }
        }
    };

    let empty = Map::new();
    let object = payload.as_object();
    let fields = object.unwrap_or(&empty);
    let complete = EXPECTED_KEYS.iter().all(|key| fields.contains_key(*key));

    if object.is_none() || !complete {
        let mut received_keys: Vec<&String> = fields.keys().collect();
        received_keys.sort();
        return BeaconReply {
            status: 422,
            body: json!({
                "status": "ANOMALY_DETECTED",
                "message": "⚠️ REQUEST STRUCTURE ANOMALY — Unexpected payload format.",
                "warning": "The submitted data does not match the expected monitoring format. \
                            This suggests manual crafting or interception of the request. \
                            This anomaly has been recorded.",
                "expected_format": "Standard browser fingerprint beacon",
                "received_keys": received_keys,
                "threat_id": short_id("ANM-", now),
                "your_ip": client_ip,
                "timestamp": timestamp,
            }),
        };
    }

    let fingerprint_ok = fields
        .get("fingerprint")
        .and_then(Value::as_object)
        .map(|fp| fp.len() >= MIN_FINGERPRINT_FIELDS)
        .unwrap_or(false);

    if !fingerprint_ok {
        return BeaconReply {
            status: 422,
            body: json!({
                "status": "TAMPERING_SUSPECTED",
                "message": "⚠️ FINGERPRINT DATA APPEARS MODIFIED",
                "warning": "The device fingerprint data has been stripped or modified. \
                            This is consistent with proxy tool interception. \
                            Your server-side fingerprint has already been captured independently.",
                "your_ip": client_ip,
                "timestamp": timestamp,
            }),
        };
    }

    BeaconReply {
        status: 200,
        body: json!({
            "status": "RECEIVED",
            "monitored": true,
            "trace_id": short_id("BCN-", now),
            "message": "Fingerprint data received and processed.",
            "timestamp": timestamp,
        }),
    }
}

/// `prefix` + 12 upper-case hex chars of SHA-256 over the current unix time.
fn short_id(prefix: &str, now: SystemTime) -> String {
    let unix_time = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    let hex = hex::encode_upper(Sha256::digest(unix_time.to_string().as_bytes()));
    format!("{}{}", prefix, &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(body: &[u8]) -> BeaconReply {
        handle_beacon("POST", body, "203.0.113.5", SystemTime::now())
    }

    #[test]
    fn test_valid_beacon_is_received() {
        let r = reply(
            br#"{"fingerprint":{"tz":"UTC","lang":"en","cores":8},"url":"/x","timestamp":1,"viewport":"1280x720"}"#,
        );
        assert_eq!(r.status, 200);
        assert_eq!(r.body["status"], "RECEIVED");
        assert_eq!(r.body["monitored"], true);
        let trace = r.body["trace_id"].as_str().unwrap();
        assert!(trace.starts_with("BCN-"));
        assert_eq!(trace.len(), 16);
    }

    #[test]
    fn test_malformed_json_is_flagged() {
        let r = reply(b"{not json");
        assert_eq!(r.status, 400);
        assert_eq!(r.body["status"], "FLAGGED");
        assert_eq!(r.body["your_ip"], "203.0.113.5");
        assert!(r.body["threat_id"].as_str().unwrap().starts_with("MON-"));
    }

    #[test]
    fn test_missing_keys_is_anomaly() {
        let r = reply(br#"{"url":"/x","fingerprint":{}}"#);
        assert_eq!(r.status, 422);
        assert_eq!(r.body["status"], "ANOMALY_DETECTED");
        assert_eq!(r.body["received_keys"], json!(["fingerprint", "url"]));
    }

    #[test]
    fn test_non_object_is_anomaly() {
        let r = reply(b"[1,2,3]");
        assert_eq!(r.status, 422);
        assert_eq!(r.body["status"], "ANOMALY_DETECTED");
        assert_eq!(r.body["received_keys"], json!([]));
    }

    #[test]
    fn test_stripped_fingerprint_is_tampering() {
        let r = reply(br#"{"fingerprint":{"tz":"UTC"},"url":"/x","timestamp":1,"viewport":"1x1"}"#);
        assert_eq!(r.status, 422);
        assert_eq!(r.body["status"], "TAMPERING_SUSPECTED");

        let r = reply(br#"{"fingerprint":"abc","url":"/x","timestamp":1,"viewport":"1x1"}"#);
        assert_eq!(r.body["status"], "TAMPERING_SUSPECTED");
    }

    #[test]
    fn test_get_is_rejected() {
        let r = handle_beacon("GET", b"", "1.1.1.1", SystemTime::now());
        assert_eq!(r.status, 405);
    }
}
