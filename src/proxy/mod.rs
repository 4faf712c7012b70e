pub mod context;

use crate::config::{BeaconConfig, ShieldConfig};
use crate::metrics::MetricsCollector;
use crate::monitor::{handle_beacon, is_beacon_path, BeaconReply, NotFoundPage, NOT_FOUND_STATUS};
use crate::shield::*;
use async_trait::async_trait;
use bytes::Bytes;
use context::ShieldContext;
use log::{error, info, warn};
use pingora::http::{RequestHeader, ResponseHeader};
use pingora::prelude::*;
use pingora::upstreams::peer::HttpPeer;
use pingora::{Error, ErrorType};
use pingora_proxy::{FailToProxy, ProxyHttp, Session};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Where clean traffic is forwarded.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub sni: String,
}

/// What the request head alone decides, before anything reaches upstream.
#[derive(Debug)]
pub enum Admission {
    /// Answered locally by the monitor beacon.
    Beacon,
    /// Final. Either the head blocked or there is no body to wait for.
    Decided(Inspection),
    /// The head is clean. The body must be buffered and inspected first.
    AwaitBody,
    /// Declared body is larger than the inspection buffer.
    TooLarge,
}

pub struct ShieldProxy {
    pub inspector: Arc<RequestInspector>,
    pub metrics: Arc<MetricsCollector>,
    pub upstream: Upstream,
    pub beacon: BeaconConfig,
    pub max_body_size: usize,
    pub not_found_page: bool,
}

impl ShieldProxy {
    pub fn new(
        upstream: Upstream,
        inspector: Arc<RequestInspector>,
        metrics: Arc<MetricsCollector>,
        config: &ShieldConfig,
    ) -> Self {
        Self {
            inspector,
            metrics,
            upstream,
            beacon: config.beacon.clone(),
            max_body_size: config.max_body_size,
            not_found_page: config.not_found_page,
        }
    }

    fn peer_ip(session: &Session) -> Option<String> {
        session
            .client_addr()
            .and_then(|addr| addr.as_inet())
            .map(|inet| inet.ip().to_string())
    }

    fn body_too_large(&self) -> Box<Error> {
        Error::explain(
            ErrorType::Custom("BodySizeLimitExceeded"),
            format!(
                "Request body exceeds maximum size of {} bytes",
                self.max_body_size
            ),
        )
    }

    /// Decide from the request head. Header-only findings block here even
    /// when a body follows.
    pub fn admit(
        &self,
        header: &RequestHeader,
        request: &RequestContext,
        now: SystemTime,
    ) -> Admission {
        if self.beacon.enabled && is_beacon_path(&self.beacon.path, &request.path) {
            return Admission::Beacon;
        }

        let inspection = self.inspector.examine(request, now);
        if inspection.verdict.is_block() || !expects_body(header) {
            return Admission::Decided(inspection);
        }

        if request
            .content_length
            .is_some_and(|len| len > self.max_body_size)
        {
            return Admission::TooLarge;
        }

        Admission::AwaitBody
    }

    /// Record the inspection and, on a block verdict, answer the client
    /// directly. Returns true when the request was blocked.
    async fn settle(
        &self,
        session: &mut Session,
        ctx: &mut ShieldContext,
        request: RequestContext,
        inspection: Inspection,
    ) -> Result<bool> {
        self.metrics.record_findings(&inspection.findings);
        ctx.findings = inspection.findings;
        ctx.request = Some(request);

        match inspection.verdict {
            Verdict::PassThrough => {
                self.metrics.increment_passed_requests();
                Ok(false)
            }
            Verdict::Block(response) => {
                error!(
                    "Blocked {} - IP: {}, Type: {}, Detections: {}",
                    response.threat_id(),
                    ctx.client_ip(),
                    response.threat_type(),
                    response.detections().len()
                );
                self.metrics
                    .increment_blocked_requests(response.threat_type());
                ctx.blocked = Some((response.threat_type(), response.threat_id().to_string()));
                self.write_block_response(session, &response).await?;
                Ok(true)
            }
        }
    }

    async fn write_block_response(
        &self,
        session: &mut Session,
        response: &BlockResponse,
    ) -> Result<()> {
        let body = match response.to_json() {
            Ok(json) => Bytes::from(json),
            Err(e) => {
                error!("Failed to serialize block response: {}", e);
                Bytes::from_static(b"{\"status\":\"BLOCKED\"}")
            }
        };

        let header = block_response_header(response, body.len())?;
        session.write_response_header(Box::new(header), false).await?;
        session.write_response_body(Some(body), true).await?;
        Ok(())
    }

    async fn read_full_body(&self, session: &mut Session, ctx: &mut ShieldContext) -> Result<Bytes> {
        while let Some(chunk) = session.read_request_body().await? {
            ctx.body_inspector.append_chunk(&chunk)?;
        }
        Ok(ctx.body_inspector.take_body())
    }

    async fn respond_beacon(&self, session: &mut Session, request: &RequestContext) -> Result<()> {
        let body = request.body.clone().unwrap_or_default();
        let reply = handle_beacon(&request.method, &body, &request.client_ip, SystemTime::now());
        let json = match reply.to_json() {
            Ok(json) => Bytes::from(json),
            Err(e) => {
                error!("Failed to serialize beacon reply: {}", e);
                Bytes::new()
            }
        };

        let header = beacon_response_header(&reply, json.len(), request.is_secure)?;
        session.write_response_header(Box::new(header), false).await?;
        session.write_response_body(Some(json), true).await?;
        Ok(())
    }
}

/// Marker and hardening headers for anything the shield sends to a client.
/// HSTS is only sent over HTTPS.
pub fn stamp_response_headers(header: &mut ResponseHeader, secure: bool) -> Result<()> {
    for (name, value) in MARKER_HEADERS.iter().chain(SECURITY_HEADERS) {
        header.insert_header(*name, *value)?;
    }
    if secure {
        let (name, value) = HSTS_HEADER;
        header.insert_header(name, value)?;
    }
    Ok(())
}

pub fn block_response_header(response: &BlockResponse, content_length: usize) -> Result<ResponseHeader> {
    let mut header = ResponseHeader::build(response.status, None)?;
    for (name, value) in response.headers() {
        header.insert_header(name, value)?;
    }
    header.insert_header("Content-Length", content_length.to_string())?;
    Ok(header)
}

pub fn beacon_response_header(
    reply: &BeaconReply,
    content_length: usize,
    secure: bool,
) -> Result<ResponseHeader> {
    let mut header = ResponseHeader::build(reply.status, None)?;
    header.insert_header("Content-Type", "application/json")?;
    header.insert_header("Content-Length", content_length.to_string())?;
    if reply.status == 405 {
        header.insert_header("Allow", "POST")?;
    }
    stamp_response_headers(&mut header, secure)?;
    Ok(header)
}

/// Whether an upstream response should be swapped for the monitoring page.
/// Responses declared empty are left alone, as are HEAD requests.
pub fn replaces_not_found(upstream: &ResponseHeader, request: &RequestContext) -> bool {
    let declared_empty = upstream
        .headers
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    upstream.status.as_u16() == NOT_FOUND_STATUS
        && !declared_empty
        && !request.method.eq_ignore_ascii_case("HEAD")
}

/// Rewrite the upstream 404 head to describe the monitoring page.
pub fn rewrite_not_found_header(upstream: &mut ResponseHeader, content_length: usize) -> Result<()> {
    for name in [
        "Content-Encoding",
        "Transfer-Encoding",
        "Content-Length",
        "Content-Type",
        "ETag",
        "Last-Modified",
    ] {
        upstream.remove_header(name);
    }
    upstream.insert_header("Content-Type", "text/html; charset=utf-8")?;
    upstream.insert_header("Content-Length", content_length.to_string())?;
    upstream.insert_header("Cache-Control", "no-store")?;
    Ok(())
}

#[async_trait]
impl ProxyHttp for ShieldProxy {
    type CTX = ShieldContext;

    fn new_ctx(&self) -> Self::CTX {
        ShieldContext::new(self.max_body_size)
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool>
    where
        Self::CTX: Send + Sync,
    {
        let request = RequestContext::from_request_header(
            session.req_header(),
            Self::peer_ip(session).as_deref(),
        );

        match self.admit(session.req_header(), &request, SystemTime::now()) {
            Admission::Decided(inspection) => self.settle(session, ctx, request, inspection).await,
            Admission::TooLarge => Err(self.body_too_large()),
            Admission::AwaitBody => {
                // Pingora replays the buffered body upstream once the
                // request is let through.
                session.enable_retry_buffering();
                let body = self.read_full_body(session, ctx).await?;
                if session.retry_buffer_truncated() {
                    return Err(self.body_too_large());
                }

                let request = request.with_body(body);
                let inspection = self.inspector.examine(&request, SystemTime::now());
                self.settle(session, ctx, request, inspection).await
            }
            Admission::Beacon => {
                let body = self.read_full_body(session, ctx).await?;
                let request = request.with_body(body);
                let inspection = self.inspector.examine(&request, SystemTime::now());
                if self.settle(session, ctx, request, inspection).await? {
                    return Ok(true);
                }
                if let Some(request) = ctx.request.as_ref() {
                    self.respond_beacon(session, request).await?;
                }
                Ok(true)
            }
        }
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        if let Some((threat_type, threat_id)) = &ctx.blocked {
            error!(
                "Refusing upstream connection for blocked request {} ({})",
                threat_id, threat_type
            );
            return Err(Error::explain(
                ErrorType::HTTPStatus(BLOCK_STATUS),
                "Request blocked by tamper inspection",
            ));
        }

        let peer = Box::new(HttpPeer::new(
            (self.upstream.host.as_str(), self.upstream.port),
            self.upstream.tls,
            self.upstream.sni.clone(),
        ));
        Ok(peer)
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        if self.not_found_page {
            if let Some(request) = ctx.request.as_ref() {
                if replaces_not_found(upstream_response, request) {
                    let beacon_path = self.beacon.enabled.then_some(self.beacon.path.as_str());
                    let page = NotFoundPage::render(request, beacon_path, SystemTime::now());
                    rewrite_not_found_header(upstream_response, page.body.len())?;
                    info!(
                        "Serving monitoring page {} - IP: {}, Path: {}",
                        page.trace_id, request.client_ip, request.full_path
                    );
                    ctx.replace_body = true;
                    ctx.replacement = Some(Bytes::from(page.body));
                }
            }
        }

        stamp_response_headers(upstream_response, ctx.is_secure())
    }

    fn response_body_filter(
        &self,
        _session: &mut Session,
        body: &mut Option<Bytes>,
        _end_of_stream: bool,
        ctx: &mut Self::CTX,
    ) -> Result<Option<Duration>>
    where
        Self::CTX: Send + Sync,
    {
        // Upstream chunks are dropped; the page goes out with the first one
        if ctx.replace_body {
            *body = ctx.replacement.take();
        }
        Ok(None)
    }

    async fn fail_to_proxy(
        &self,
        session: &mut Session,
        e: &Error,
        ctx: &mut Self::CTX,
    ) -> FailToProxy
    where
        Self::CTX: Send + Sync,
    {
        // The block response is already on the wire
        if ctx.is_blocked() {
            return FailToProxy {
                error_code: BLOCK_STATUS,
                can_reuse_downstream: false,
            };
        }

        let error_code = match e.etype() {
            ErrorType::HTTPStatus(code) => *code,
            ErrorType::Custom("BodySizeLimitExceeded") => 413,
            ErrorType::ReadError | ErrorType::WriteError | ErrorType::ConnectionClosed => 0,
            ErrorType::ConnectTimedout
            | ErrorType::ConnectRefused
            | ErrorType::ConnectNoRoute
            | ErrorType::ConnectError => 502,
            _ => 500,
        };

        if error_code > 0 {
            if let Err(write_err) = session.respond_error(error_code).await {
                error!("Failed to send error response: {:?}", write_err);
            }
        }

        FailToProxy {
            error_code,
            can_reuse_downstream: false,
        }
    }

    async fn logging(&self, session: &mut Session, e: Option<&pingora::Error>, ctx: &mut Self::CTX) {
        let response_code = session
            .response_written()
            .map_or(0, |resp| resp.status.as_u16());

        let client_ip = ctx.client_ip().to_string();
        let method = session.req_header().method.as_str();
        let uri = session.req_header().uri.to_string();
        let elapsed_ms = ctx.started_at.elapsed().as_millis();

        if let Some(error) = e {
            if !ctx.is_blocked() {
                error!(
                    "Request failed - IP: {}, Method: {}, URI: {}, Error: {:?}",
                    client_ip, method, uri, error
                );
            }
        } else {
            info!(
                "Request completed - IP: {}, Method: {}, URI: {}, Status: {}, {}ms",
                client_ip, method, uri, response_code, elapsed_ms
            );
        }

        for finding in &ctx.findings {
            warn!(
                "Detection - IP: {}, Pass: {}, Blocked: {}, Detail: {}",
                client_ip,
                finding.pass.as_str(),
                ctx.is_blocked(),
                finding.message
            );
        }

        ctx.body_inspector.clear();
    }
}
