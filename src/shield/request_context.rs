use bytes::Bytes;
use pingora::http::RequestHeader;

/// Normalized, per-request view of everything the detector passes look at.
///
/// Built once at request entry and dropped when the request finishes. Header
/// values are decoded lossily so that non-UTF-8 bytes never cause a failure.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Never empty; falls back to `"unknown"`.
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub method: String,
    /// Path plus query string as received.
    pub full_path: String,
    /// Percent-decoded path without the query string.
    pub path: String,
    pub query: String,
    pub host: Option<String>,
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub accept: Option<String>,
    pub accept_language: Option<String>,
    pub accept_encoding: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<usize>,
    pub protocol: String,
    pub is_secure: bool,
    pub is_xhr: bool,
    pub sec_ch_ua: Option<String>,
    /// Every header as (lower-case name, lossy value), in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RequestContext {
    /// Build a context from the request header and the transport peer IP.
    pub fn from_request_header(request: &RequestHeader, peer_ip: Option<&str>) -> Self {
        let header = |name: &str| {
            request
                .headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        };

        let headers = request
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let full_path = request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri.path().to_string());

        let is_secure = header("x-forwarded-proto")
            .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
            .unwrap_or_else(|| request.uri.scheme_str() == Some("https"));

        let host = header("host").or_else(|| request.uri.authority().map(|a| a.to_string()));

        Self {
            client_ip: resolve_client_ip(
                header("x-forwarded-for").as_deref(),
                header("x-real-ip").as_deref(),
                peer_ip,
            ),
            user_agent: header("user-agent"),
            method: request.method.as_str().to_string(),
            full_path,
            path: percent_decode_lossy(request.uri.path()),
            query: request.uri.query().unwrap_or_default().to_string(),
            host,
            origin: header("origin"),
            referer: header("referer"),
            accept: header("accept"),
            accept_language: header("accept-language"),
            accept_encoding: header("accept-encoding"),
            content_type: header("content-type"),
            content_length: header("content-length").and_then(|v| v.trim().parse().ok()),
            protocol: format!("{:?}", request.version),
            is_secure,
            is_xhr: header("x-requested-with").as_deref() == Some("XMLHttpRequest"),
            sec_ch_ua: header("sec-ch-ua"),
            headers,
            body: None,
        }
    }

    /// Attach the fully buffered request body.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// User-Agent, or the empty string when the header is absent.
    pub fn user_agent_str(&self) -> &str {
        self.user_agent.as_deref().unwrap_or_default()
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded query-string pairs, in order, repeated keys included.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        parse_urlencoded(&self.query)
    }

    /// Decoded `application/x-www-form-urlencoded` body pairs. Empty for any
    /// other content type.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let is_form = self
            .content_type
            .as_deref()
            .map(|ct| {
                ct.to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            })
            .unwrap_or(false);

        match (&self.body, is_form) {
            (Some(body), true) => parse_urlencoded(&String::from_utf8_lossy(body)),
            _ => Vec::new(),
        }
    }
}

/// Forwarding headers win over the transport peer. The result is never empty.
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer_ip: Option<&str>,
) -> String {
    let first_forwarded = forwarded_for
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    first_forwarded
        .or_else(|| real_ip.map(str::trim).filter(|ip| !ip.is_empty()))
        .or_else(|| peer_ip.map(str::trim).filter(|ip| !ip.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}

/// True when the request announces a body that has to be buffered before
/// inspection.
pub fn expects_body(request: &RequestHeader) -> bool {
    let chunked = request
        .headers
        .get(http::header::TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    chunked
        || request
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(|len| len > 0)
            .unwrap_or(false)
}

pub(crate) fn percent_decode_lossy(input: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes())).into_owned()
}

fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode_lossy(&key.replace('+', " ")),
                percent_decode_lossy(&value.replace('+', " ")),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut req = RequestHeader::build("GET", b"/", None).unwrap();
        req.insert_header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .unwrap();
        req.insert_header("X-Real-IP", "198.51.100.2").unwrap();

        let ctx = RequestContext::from_request_header(&req, Some("127.0.0.1"));
        assert_eq!(ctx.client_ip, "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip_then_peer() {
        let mut req = RequestHeader::build("GET", b"/", None).unwrap();
        req.insert_header("X-Real-IP", " 198.51.100.2 ").unwrap();
        let ctx = RequestContext::from_request_header(&req, Some("127.0.0.1"));
        assert_eq!(ctx.client_ip, "198.51.100.2");

        let req = RequestHeader::build("GET", b"/", None).unwrap();
        let ctx = RequestContext::from_request_header(&req, Some("127.0.0.1"));
        assert_eq!(ctx.client_ip, "127.0.0.1");
    }

    #[test]
    fn test_client_ip_never_empty() {
        assert_eq!(resolve_client_ip(None, None, None), "unknown");
        assert_eq!(resolve_client_ip(Some(" , 1.2.3.4"), None, None), "unknown");
        assert_eq!(resolve_client_ip(Some(""), Some(""), Some("")), "unknown");
    }

    #[test]
    fn test_path_and_query_split() {
        let req = RequestHeader::build("GET", b"/shop/caf%C3%A9?q=shirt&size=m", None).unwrap();
        let ctx = RequestContext::from_request_header(&req, None);
        assert_eq!(ctx.full_path, "/shop/caf%C3%A9?q=shirt&size=m");
        assert_eq!(ctx.path, "/shop/café");
        assert_eq!(ctx.query, "q=shirt&size=m");
        assert_eq!(ctx.protocol, "HTTP/1.1");
    }

    #[test]
    fn test_query_pairs_are_decoded() {
        let req = RequestHeader::build("GET", b"/p?id=1%20OR%201%3D1&name=a+b&flag", None).unwrap();
        let ctx = RequestContext::from_request_header(&req, None);
        assert_eq!(
            ctx.query_pairs(),
            vec![
                ("id".to_string(), "1 OR 1=1".to_string()),
                ("name".to_string(), "a b".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_form_pairs_only_for_urlencoded_bodies() {
        let mut req = RequestHeader::build("POST", b"/login", None).unwrap();
        req.insert_header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .unwrap();
        let ctx = RequestContext::from_request_header(&req, None)
            .with_body(Bytes::from_static(b"user=admin&pass=x%27"));
        assert_eq!(ctx.form_pairs().len(), 2);
        assert_eq!(ctx.form_pairs()[1].1, "x'");

        let mut req = RequestHeader::build("POST", b"/login", None).unwrap();
        req.insert_header("Content-Type", "text/plain").unwrap();
        let ctx = RequestContext::from_request_header(&req, None)
            .with_body(Bytes::from_static(b"user=admin"));
        assert!(ctx.form_pairs().is_empty());
    }

    #[test]
    fn test_non_utf8_form_body_does_not_fail() {
        let mut req = RequestHeader::build("POST", b"/", None).unwrap();
        req.insert_header("Content-Type", "application/x-www-form-urlencoded")
            .unwrap();
        let ctx = RequestContext::from_request_header(&req, None)
            .with_body(Bytes::from_static(b"a=\xff\xfe&b=%ff"));
        assert_eq!(ctx.form_pairs().len(), 2);
    }

    #[test]
    fn test_secure_and_xhr_flags() {
        let mut req = RequestHeader::build("GET", b"/", None).unwrap();
        req.insert_header("X-Forwarded-Proto", "https").unwrap();
        req.insert_header("X-Requested-With", "XMLHttpRequest").unwrap();
        let ctx = RequestContext::from_request_header(&req, None);
        assert!(ctx.is_secure);
        assert!(ctx.is_xhr);
    }

    #[test]
    fn test_expects_body() {
        let mut req = RequestHeader::build("POST", b"/", None).unwrap();
        assert!(!expects_body(&req));
        req.insert_header("Content-Length", "0").unwrap();
        assert!(!expects_body(&req));
        req.insert_header("Content-Length", "12").unwrap();
        assert!(expects_body(&req));

        let mut req = RequestHeader::build("POST", b"/", None).unwrap();
        req.insert_header("Transfer-Encoding", "chunked").unwrap();
        assert!(expects_body(&req));
    }
}
