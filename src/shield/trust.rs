use super::RequestContext;

/// Exempts the first-party frontend from inspection.
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    frontend_url: String,
}

impl TrustPolicy {
    /// `frontend_url` is scheme + host (+ port); trailing slashes are ignored.
    /// An empty URL trusts nothing.
    pub fn new(frontend_url: &str) -> Self {
        Self {
            frontend_url: frontend_url.trim().trim_end_matches('/').to_string(),
        }
    }

    /// Origin must equal the frontend URL. Referer must be the frontend URL
    /// itself or a page under it.
    pub fn is_trusted(&self, request: &RequestContext) -> bool {
        if self.frontend_url.is_empty() {
            return false;
        }

        let origin_matches = request
            .origin
            .as_deref()
            .map(|origin| origin.trim().trim_end_matches('/') == self.frontend_url)
            .unwrap_or(false);

        origin_matches
            || request
                .referer
                .as_deref()
                .map(|referer| self.referer_matches(referer.trim()))
                .unwrap_or(false)
    }

    fn referer_matches(&self, referer: &str) -> bool {
        match referer.strip_prefix(self.frontend_url.as_str()) {
            Some(rest) => {
                rest.trim_end_matches('/').is_empty()
                    || rest.starts_with(['/', '?', '#'])
            }
            None => false,
        }
    }
}
