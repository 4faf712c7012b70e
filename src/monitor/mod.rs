pub mod beacon;
pub mod not_found;

pub use beacon::*;
pub use not_found::*;

/// True when `path` addresses the beacon endpoint, with or without the
/// trailing slash.
pub fn is_beacon_path(configured: &str, path: &str) -> bool {
    let configured = configured.trim_end_matches('/');
    !configured.is_empty() && path.trim_end_matches('/') == configured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beacon_path_matching() {
        assert!(is_beacon_path("/api/security/monitor/", "/api/security/monitor/"));
        assert!(is_beacon_path("/api/security/monitor/", "/api/security/monitor"));
        assert!(!is_beacon_path("/api/security/monitor/", "/api/security/monitor/x"));
        assert!(!is_beacon_path("", "/"));
    }
}
