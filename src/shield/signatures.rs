//! Process-wide rule bank. Everything here is built once and only read.

use once_cell::sync::Lazy;
use regex::Regex;

/// User-Agent substrings of interception proxies, scanners and API clients.
/// Matched against the lower-cased User-Agent.
pub static PROXY_TOOL_SIGNATURES: &[&str] = &[
    "burp",
    "burpsuite",
    "portswigger",
    "owasp",
    "zap",
    "zaproxy",
    "fiddler",
    "fiddlercore",
    "telerik",
    "mitmproxy",
    "charles",
    "charlesproxy",
    "httptoolkit",
    "http-toolkit",
    "paros",
    "webscarab",
    "nikto",
    "sqlmap",
    "nmap",
    "havij",
    "acunetix",
    "nessus",
    "openvas",
    "w3af",
    "arachni",
    "wpscan",
    "dirbuster",
    "gobuster",
    "ffuf",
    "nuclei",
    "httpie",
    "insomnia",
];

/// Non-standard headers injected by interception tools (lower-case names).
pub static SUSPICIOUS_HEADERS: &[&str] = &[
    "x-burp",
    "x-zap",
    "x-forwarded-server",
    "x-scanner",
    "x-attack",
    "x-inject",
    "x-custom-inject",
    "x-proxy-id",
    "x-mitmproxy",
    "x-charles",
    "x-fiddler",
    "proxy-connection",
    "x-wipp",
];

/// Tool name looked for inside the `Sec-CH-UA` client hint.
pub const CLIENT_HINT_TOOL: &str = "burp";

/// Characters that never appear in a real browser User-Agent.
pub static USER_AGENT_METACHARACTERS: &[char] = &['<', '>', '{', '}', '|', '`', '^'];

pub const MAX_USER_AGENT_LEN: usize = 1000;

/// Content negotiation headers every browser sends on navigation.
pub static STANDARD_BROWSER_HEADERS: &[&str] = &["Accept", "Accept-Language", "Accept-Encoding"];

pub static SQL_INJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Keyword pairs
        Regex::new(
            r"(?i)\b(union|select|insert|update|delete|drop|alter|create|exec|execute)\b.*\b(from|into|table|database|where)\b",
        )
        .unwrap(),
        // Comments and terminators
        Regex::new(r"(--\s|/\*|\*/|@@)").unwrap(),
        // Boolean injection
        Regex::new(r"(?i)\b(or|and)\b\s+\d+\s*=\s*\d+").unwrap(),
        Regex::new(r"(?i)'\s*(or|and)\s*'").unwrap(),
        // Time-based blind injection
        Regex::new(r"(?i)\bwaitfor\b\s+\bdelay\b").unwrap(),
        Regex::new(r"(?i)\bbenchmark\b\s*\(").unwrap(),
        Regex::new(r"(?i)\bsleep\b\s*\(").unwrap(),
    ]
});

pub static XSS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)<script[^>]*>").unwrap(),
        Regex::new(r"(?i)javascript\s*:").unwrap(),
        Regex::new(
            r"(?i)on(error|load|click|mouseover|focus|blur|submit|change|keyup|keydown)\s*=",
        )
        .unwrap(),
        Regex::new(r"(?i)<iframe[^>]*>").unwrap(),
        Regex::new(r"(?i)<object[^>]*>").unwrap(),
        Regex::new(r"(?i)<embed[^>]*>").unwrap(),
        Regex::new(r"(?i)<svg[^>]*on\w+\s*=").unwrap(),
        Regex::new(r"(?i)expression\s*\(").unwrap(),
        Regex::new(r#"(?i)url\s*\(\s*['"]?\s*data:"#).unwrap(),
    ]
});

pub static PATH_TRAVERSAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\.\./").unwrap(),
        Regex::new(r"\.\.\\").unwrap(),
        // URL encoded variants
        Regex::new(r"(?i)%2e%2e%2f").unwrap(),
        Regex::new(r"(?i)%2e%2e/").unwrap(),
        Regex::new(r"(?i)\.%2e/").unwrap(),
        Regex::new(r"(?i)%2e\./").unwrap(),
        // Sensitive files
        Regex::new(r"(?i)etc/passwd").unwrap(),
        Regex::new(r"(?i)etc/shadow").unwrap(),
        Regex::new(r"(?i)windows/system32").unwrap(),
        Regex::new(r"(?i)boot\.ini").unwrap(),
        Regex::new(r"(?i)win\.ini").unwrap(),
    ]
});

/// Paths requested by automated scanners. Lower-case; matched exactly or by prefix.
pub static HONEYPOT_PATHS: &[&str] = &[
    "/.env",
    "/.git",
    "/.git/config",
    "/.gitignore",
    "/wp-admin",
    "/wp-login",
    "/wp-login.php",
    "/wp-content",
    "/administrator",
    "/admin",
    "/phpmyadmin",
    "/phpinfo",
    "/phpinfo.php",
    "/config.php",
    "/configuration.php",
    "/.htaccess",
    "/.htpasswd",
    "/server-status",
    "/server-info",
    "/debug",
    "/trace",
    "/console",
    "/actuator",
    "/actuator/health",
    "/elmah.axd",
    "/web.config",
    "/.aws/credentials",
    "/.docker",
    "/dockerfile",
    "/docker-compose.yml",
    "/.ssh",
    "/id_rsa",
    "/backup",
    "/db.sql",
    "/dump.sql",
    "/database.sql",
    "/.svn",
    "/.hg",
    "/robots.txt",
    "/sitemap.xml",
    "/.well-known",
    "/cgi-bin",
    "/shell",
    "/cmd",
    "/eval",
    "/xmlrpc.php",
];
