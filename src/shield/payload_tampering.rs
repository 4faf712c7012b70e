use super::request_context::percent_decode_lossy;
use super::signatures::{PATH_TRAVERSAL_PATTERNS, SQL_INJECTION_PATTERNS, XSS_PATTERNS};
use super::{DetectorPass, Finding, PassKind, RequestContext};
use regex::Regex;

/// Where an inspected value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    QueryParam,
    PostData,
    JsonBody,
}

impl PayloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadSource::QueryParam => "query_param",
            PayloadSource::PostData => "post_data",
            PayloadSource::JsonBody => "json_body",
        }
    }
}

/// One value pulled out of the request for pattern matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadField {
    pub source: PayloadSource,
    pub key: String,
    pub value: String,
}

/// Scans query parameters, form fields and JSON bodies for SQL injection,
/// XSS and path traversal, plus the URL itself for traversal.
pub struct PayloadTamperingDetector;

impl PayloadTamperingDetector {
    pub fn new() -> Self {
        Self
    }

    /// Collect `(source, key, value)` triples in inspection order.
    ///
    /// The JSON body is only included when the content type mentions json and
    /// the body parses to a JSON object; anything else is treated as absent.
    pub fn collect_fields(request: &RequestContext) -> Vec<PayloadField> {
        let mut fields: Vec<PayloadField> = request
            .query_pairs()
            .into_iter()
            .map(|(key, value)| PayloadField {
                source: PayloadSource::QueryParam,
                key,
                value,
            })
            .collect();

        fields.extend(request.form_pairs().into_iter().map(|(key, value)| PayloadField {
            source: PayloadSource::PostData,
            key,
            value,
        }));

        if let Some(body) = json_object_body(request) {
            fields.push(PayloadField {
                source: PayloadSource::JsonBody,
                key: "body".to_string(),
                value: body,
            });
        }

        fields
    }

    fn matches_any(patterns: &[Regex], input: &str) -> bool {
        patterns.iter().any(|pattern| pattern.is_match(input))
    }
}

impl Default for PayloadTamperingDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn json_object_body(request: &RequestContext) -> Option<String> {
    let is_json = request
        .content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);
    if !is_json {
        return None;
    }

    let body = request.body.as_ref().filter(|b| !b.is_empty())?;
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(_)) => Some(String::from_utf8_lossy(body).into_owned()),
        _ => None,
    }
}

impl DetectorPass for PayloadTamperingDetector {
    fn check(&self, request: &RequestContext) -> Vec<Finding> {
        let mut tampering = Vec::new();

        for field in Self::collect_fields(request) {
            let value = field.value.to_lowercase();
            let source = field.source.as_str();

            if Self::matches_any(&SQL_INJECTION_PATTERNS, &value) {
                tampering.push(Finding::new(
                    PassKind::PayloadTampering,
                    format!("SQL injection pattern detected in {} '{}'", source, field.key),
                ));
            }

            if Self::matches_any(&XSS_PATTERNS, &value) {
                tampering.push(Finding::new(
                    PassKind::PayloadTampering,
                    format!("XSS pattern detected in {} '{}'", source, field.key),
                ));
            }

            if Self::matches_any(&PATH_TRAVERSAL_PATTERNS, &value) {
                tampering.push(Finding::new(
                    PassKind::PayloadTampering,
                    format!("Path traversal attempt detected in {} '{}'", source, field.key),
                ));
            }
        }

        let raw_path = request.full_path.to_lowercase();
        let decoded_path = percent_decode_lossy(&raw_path);
        if Self::matches_any(&PATH_TRAVERSAL_PATTERNS, &raw_path)
            || Self::matches_any(&PATH_TRAVERSAL_PATTERNS, &decoded_path)
        {
            tampering.push(Finding::new(
                PassKind::PayloadTampering,
                "Path traversal attempt detected in URL",
            ));
        }

        tampering
    }

    fn name(&self) -> &str {
        "Payload Tampering Detector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pingora::http::RequestHeader;

    fn get(uri: &str) -> RequestContext {
        let req = RequestHeader::build("GET", uri.as_bytes(), None).unwrap();
        RequestContext::from_request_header(&req, None)
    }

    fn post(content_type: &str, body: &'static [u8]) -> RequestContext {
        let mut req = RequestHeader::build("POST", b"/api/orders", None).unwrap();
        req.insert_header("Content-Type", content_type).unwrap();
        RequestContext::from_request_header(&req, None).with_body(Bytes::from_static(body))
    }

    fn messages(ctx: &RequestContext) -> Vec<String> {
        PayloadTamperingDetector::new()
            .check(ctx)
            .into_iter()
            .map(|f| f.message)
            .collect()
    }

    #[test]
    fn test_boolean_sql_injection_in_query() {
        assert_eq!(
            messages(&get("/products?id=1%20OR%201%3D1")),
            vec!["SQL injection pattern detected in query_param 'id'".to_string()]
        );
    }

    #[test]
    fn test_union_select_in_query() {
        let found = messages(&get("/products?q=1%27%20UNION%20SELECT%20password%20FROM%20users"));
        assert_eq!(found.len(), 1);
        assert!(found[0].starts_with("SQL injection"));
    }

    #[test]
    fn test_timing_attack_in_query() {
        assert_eq!(messages(&get("/p?id=1;waitfor%20delay%20%270:0:5%27")).len(), 1);
        assert_eq!(messages(&get("/p?id=sleep(5)")).len(), 1);
        assert_eq!(messages(&get("/p?id=BENCHMARK(1000000,MD5(1))")).len(), 1);
    }

    #[test]
    fn test_comment_tokens() {
        assert_eq!(messages(&get("/p?user=admin%27--%20")).len(), 1);
        assert_eq!(messages(&get("/p?q=a/*b*/")).len(), 1);
        assert_eq!(messages(&get("/p?q=@@version")).len(), 1);
    }

    #[test]
    fn test_xss_in_query() {
        assert_eq!(
            messages(&get("/search?q=%3Cscript%3Ealert(1)%3C/script%3E")),
            vec!["XSS pattern detected in query_param 'q'".to_string()]
        );
        assert_eq!(messages(&get("/r?next=javascript:alert(1)")).len(), 1);
        assert_eq!(messages(&get("/p?q=%3Cimg%20src=x%20onerror=alert(1)%3E")).len(), 1);
    }

    #[test]
    fn test_one_finding_per_family_per_field() {
        // Matches several SQL patterns and the XSS family once each.
        let found = messages(&get(
            "/p?q=%27%20or%20%271%27%3D%271%27--%20%3Cscript%3E",
        ));
        assert_eq!(
            found,
            vec![
                "SQL injection pattern detected in query_param 'q'".to_string(),
                "XSS pattern detected in query_param 'q'".to_string(),
            ]
        );
    }

    #[test]
    fn test_traversal_in_query_also_flags_url() {
        let found = messages(&get("/download?file=..%2F..%2Fetc%2Fpasswd"));
        assert_eq!(
            found,
            vec![
                "Path traversal attempt detected in query_param 'file'".to_string(),
                "Path traversal attempt detected in URL".to_string(),
            ]
        );
    }

    #[test]
    fn test_traversal_in_path() {
        assert_eq!(
            messages(&get("/static/%2e%2e%2fsettings.py")),
            vec!["Path traversal attempt detected in URL".to_string()]
        );
    }

    #[test]
    fn test_form_body_fields() {
        let ctx = post(
            "application/x-www-form-urlencoded",
            b"name=Ada&note=%3Ciframe%20src%3Dx%3E",
        );
        assert_eq!(
            messages(&ctx),
            vec!["XSS pattern detected in post_data 'note'".to_string()]
        );
    }

    #[test]
    fn test_json_body_pseudo_field() {
        let ctx = post(
            "application/json",
            br#"{"email":"a@b.c","coupon":"x' OR 1=1 --"}"#,
        );
        assert_eq!(
            messages(&ctx),
            vec!["SQL injection pattern detected in json_body 'body'".to_string()]
        );
    }

    #[test]
    fn test_malformed_json_is_excluded() {
        let ctx = post("application/json", b"{\"q\": \"<script>\"");
        assert!(PayloadTamperingDetector::collect_fields(&ctx).is_empty());
        assert!(messages(&ctx).is_empty());
    }

    #[test]
    fn test_non_object_json_is_excluded() {
        let ctx = post("application/json", br#"["<script>alert(1)</script>"]"#);
        assert!(messages(&ctx).is_empty());
    }

    #[test]
    fn test_non_utf8_json_body_does_not_fail() {
        let ctx = post("application/json", b"\xff\xfe\x00{");
        assert!(messages(&ctx).is_empty());
    }

    #[test]
    fn test_clean_catalog_query() {
        assert!(messages(&get("/collections?category=shirts&color=navy&page=2")).is_empty());
    }
}
