use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;

const SHIELD: &str = "http://localhost:6188";
const FRONTEND: &str = "https://shop.example.com";

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        ),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/json"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    headers
}

/// Sends `request` and reports whether the status and threat type match.
fn expect(
    name: &str,
    request: RequestBuilder,
    status: u16,
    threat_type: Option<&str>,
    passed: &mut u32,
    failed: &mut u32,
) {
    match request.send() {
        Ok(resp) => {
            let got = resp.status().as_u16();
            let body: serde_json::Value = resp.json().unwrap_or_default();
            let got_type = body["threat_type"].as_str();

            if got == status && (threat_type.is_none() || got_type == threat_type) {
                println!(
                    "   ✓ {} ({}{})",
                    name,
                    got,
                    got_type.map(|t| format!(", {}", t)).unwrap_or_default()
                );
                *passed += 1;
            } else {
                println!(
                    "   ✗ {} - expected {} {:?}, got {} {:?}",
                    name, status, threat_type, got, got_type
                );
                *failed += 1;
            }
        }
        Err(e) => {
            println!("   ✗ Error testing {}: {}", name, e);
            *failed += 1;
        }
    }
}

fn main() {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .default_headers(browser_headers())
        .build()
        .unwrap();

    println!("╔═══════════════════════════════════════════════╗");
    println!("║   Tamper Shield Attack Simulation             ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let mut passed = 0;
    let mut failed = 0;

    println!("✅ Legitimate traffic");
    expect(
        "Browser GET",
        client.get(format!("{}/products?page=2", SHIELD)),
        200,
        None,
        &mut passed,
        &mut failed,
    );
    expect(
        "Frontend-originated request with odd payload",
        client
            .get(format!("{}/search?q=1%20OR%201%3D1", SHIELD))
            .header("Origin", FRONTEND),
        200,
        None,
        &mut passed,
        &mut failed,
    );

    println!("\n🛡️  Interception tools");
    for ua in ["Burp Suite Professional", "sqlmap/1.7", "mitmproxy/10.0"] {
        expect(
            ua,
            client.get(format!("{}/products", SHIELD)).header("User-Agent", ua),
            403,
            Some("PROXY_TOOL"),
            &mut passed,
            &mut failed,
        );
    }
    expect(
        "sqlmap POST with body",
        client
            .post(format!("{}/api/cart", SHIELD))
            .header("User-Agent", "sqlmap/1.7")
            .body(r#"{"item":1}"#),
        403,
        Some("PROXY_TOOL"),
        &mut passed,
        &mut failed,
    );
    expect(
        "Suspicious X-Burp header",
        client.get(format!("{}/products", SHIELD)).header("X-Burp", "1"),
        403,
        Some("PROXY_TOOL"),
        &mut passed,
        &mut failed,
    );

    println!("\n🛡️  Payload tampering");
    expect(
        "SQL injection in query",
        client.get(format!("{}/items?id=1%20OR%201%3D1", SHIELD)),
        403,
        Some("INJECTION_ATTEMPT"),
        &mut passed,
        &mut failed,
    );
    expect(
        "XSS in JSON body",
        client
            .post(format!("{}/api/comments", SHIELD))
            .header("Content-Type", "application/json")
            .body(r#"{"comment":"<script>alert(1)</script>"}"#),
        403,
        Some("INJECTION_ATTEMPT"),
        &mut passed,
        &mut failed,
    );
    expect(
        "Path traversal in form body",
        client
            .post(format!("{}/download", SHIELD))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("file=..%2F..%2Fetc%2Fpasswd"),
        403,
        Some("INJECTION_ATTEMPT"),
        &mut passed,
        &mut failed,
    );

    println!("\n🛡️  Reconnaissance");
    for path in ["/.env", "/.git/config", "/wp-admin/", "/phpmyadmin"] {
        expect(
            path,
            client.get(format!("{}{}", SHIELD, path)),
            403,
            Some("RECONNAISSANCE"),
            &mut passed,
            &mut failed,
        );
    }

    println!("\n🛡️  Header anomalies");
    let bare = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    expect(
        "Missing browser headers",
        bare.get(format!("{}/products", SHIELD))
            .header(USER_AGENT, "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0"),
        403,
        Some("TAMPERING"),
        &mut passed,
        &mut failed,
    );

    println!("\n📡 Monitor beacon");
    let beacon = format!("{}/api/security/monitor/", SHIELD);
    expect(
        "GET on beacon",
        client.get(&beacon),
        405,
        None,
        &mut passed,
        &mut failed,
    );
    expect(
        "Malformed beacon",
        client.post(&beacon).body("{not json"),
        400,
        None,
        &mut passed,
        &mut failed,
    );
    expect(
        "Beacon missing keys",
        client.post(&beacon).body(r#"{"url":"/"}"#),
        422,
        None,
        &mut passed,
        &mut failed,
    );
    expect(
        "Valid beacon",
        client.post(&beacon).body(
            r#"{"fingerprint":{"tz":"UTC","lang":"en","screen":"1920x1080"},"url":"/","timestamp":1,"viewport":"1280x720"}"#,
        ),
        200,
        None,
        &mut passed,
        &mut failed,
    );

    println!("\n🔎 404 monitoring page");
    match client.get(format!("{}/missing/page", SHIELD)).send() {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let page = resp.text().unwrap_or_default();
            if status == 404 && page.contains("TRC-") && page.contains("sendBeacon") {
                println!("   ✓ Upstream 404 replaced by monitoring page");
                passed += 1;
            } else {
                println!("   ✗ Expected monitoring page, got {}", status);
                failed += 1;
            }
        }
        Err(e) => {
            println!("   ✗ Error testing 404 page: {}", e);
            failed += 1;
        }
    }

    println!("\n═══════════════════════════════════════════════");
    println!("Passed: {}  Failed: {}", passed, failed);
    if failed > 0 {
        std::process::exit(1);
    }
}
