// domain-verify-lib/tests/integration.rs

//! Integration tests against local HTTP and WHOIS servers.

use domain_verify_lib::cascade::SourceAdapter;
use domain_verify_lib::protocols::{RdapEndpoints, ScrapeSite};
use domain_verify_lib::{
    registered_domain, AdapterOutcome, BootstrapDirectory, DomainVerifier, HopNote, RdapAdapter,
    RedirectTracer, RelayRdapAdapter, ResolutionCascade, ResolveConfig, ScrapeAdapter, TraceConfig,
    TraceOutcome, VerifyError, WhoisAdapter,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn redirect_to(location: &str) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", location)
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn rdap_body() -> serde_json::Value {
    serde_json::json!({
        "objectClassName": "domain",
        "ldhName": "EXAMPLE.COM",
        "events": [
            {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
            {"eventAction": "expiration", "eventDate": "2026-08-13T04:00:00Z"}
        ],
        "entities": [{
            "roles": ["registrar"],
            "vcardArray": ["vcard", [["version", {}, "text", "4.0"], ["fn", {}, "text", "RESERVED-Internet Assigned Numbers Authority"]]]
        }]
    })
}

/// Serve one WHOIS reply on a local port, then close.
async fn whois_server(reply: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut query = [0u8; 256];
        let _ = socket.read(&mut query).await;
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    port
}

/// Accept one connection, read the query, and never answer.
async fn silent_whois_server() -> (u16, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut query = [0u8; 256];
        let _ = socket.read(&mut query).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(socket);
    });
    (port, handle)
}

/// A port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// Redirect tracing

#[tokio::test]
async fn test_trace_detects_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(redirect_to("/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(redirect_to("/a"))
        .mount(&server)
        .await;

    let tracer = RedirectTracer::new(TraceConfig::default()).unwrap();
    let result = tracer.trace(&format!("{}/a", server.uri())).await.unwrap();

    assert_eq!(result.outcome, TraceOutcome::Loop);
    assert_eq!(result.redirect_count, 1);
    assert_eq!(result.chain.len(), 2);
    assert!(result.chain.iter().all(|hop| hop.status == 302));
    assert!(result.is_high_risk);
    assert!(result.risk_reason.unwrap().contains("loop"));
    assert!(!result.cloaking_detected);
}

#[tokio::test]
async fn test_trace_stops_at_hop_cap() {
    let server = MockServer::start().await;
    for i in 0..8 {
        Mock::given(method("GET"))
            .and(path(format!("/hop/{}", i)))
            .respond_with(redirect_to(&format!("/hop/{}", i + 1)))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/hop/8"))
        .respond_with(html("<p>end</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let tracer = RedirectTracer::new(TraceConfig::default()).unwrap();
    let result = tracer.trace(&format!("{}/hop/0", server.uri())).await.unwrap();

    assert_eq!(result.outcome, TraceOutcome::TooDeep);
    assert_eq!(result.redirect_count, 8);
    assert_eq!(result.chain.len(), 8);
    assert!(result.final_url.ends_with("/hop/8"));
    assert!(result.is_high_risk);
    assert!(result.risk_reason.unwrap().contains("too deep"));
}

#[tokio::test]
async fn test_trace_follows_redirects_to_landing_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/landing"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(html("<html><body>Welcome</body></html>"))
        .mount(&server)
        .await;

    let tracer = RedirectTracer::new(TraceConfig::default()).unwrap();
    let result = tracer.trace(&format!("{}/start", server.uri())).await.unwrap();

    assert_eq!(result.outcome, TraceOutcome::Completed);
    assert_eq!(result.redirect_count, 1);
    assert_eq!(result.final_url, format!("{}/landing", server.uri()));
    assert_eq!(result.chain[0].status, 301);
    assert_eq!(result.chain[1].status, 200);
    assert!(!result.is_high_risk);
    assert!(result.risk_reason.is_none());
}

#[tokio::test]
async fn test_trace_follows_meta_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html(
            r#"<html><head><meta http-equiv="refresh" content="0; url=/next"></head></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&server)
        .await;

    let tracer = RedirectTracer::new(TraceConfig::default()).unwrap();
    let result = tracer.trace(&format!("{}/page", server.uri())).await.unwrap();

    assert_eq!(result.outcome, TraceOutcome::Completed);
    assert_eq!(result.redirect_count, 1);
    assert_eq!(result.chain[0].note, Some(HopNote::MetaRefresh));
    assert_eq!(result.chain[1].note, None);
    assert!(result.final_url.ends_with("/next"));
}

#[tokio::test]
async fn test_trace_detects_cloaking() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/promo"))
        .and(header_regex("user-agent", "iPhone"))
        .respond_with(redirect_to("/scam"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/promo"))
        .and(header_regex("user-agent", "Windows NT"))
        .respond_with(html("<p>Nothing to see here</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/scam"))
        .respond_with(html("<p>Enter your card number</p>"))
        .mount(&server)
        .await;

    let tracer = RedirectTracer::new(TraceConfig::default()).unwrap();
    let result = tracer.trace(&format!("{}/promo", server.uri())).await.unwrap();

    assert_eq!(result.outcome, TraceOutcome::Completed);
    assert!(result.cloaking_detected);
    assert!(result.is_high_risk);
    assert!(result.risk_reason.unwrap().to_lowercase().contains("cloaking"));
}

#[tokio::test]
async fn test_trace_without_cloaking_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/promo"))
        .and(header_regex("user-agent", "Windows NT"))
        .respond_with(html("<p>desktop</p>"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/promo"))
        .respond_with(html("<p>mobile</p>"))
        .mount(&server)
        .await;

    let tracer = RedirectTracer::new(TraceConfig::default().with_cloaking_probe(false)).unwrap();
    let result = tracer.trace(&format!("{}/promo", server.uri())).await.unwrap();

    assert_eq!(result.redirect_count, 0);
    assert!(!result.cloaking_detected);
}

#[tokio::test]
async fn test_trace_respects_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>late</p>").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    // The client itself has no timeout, so only the trace deadline can fire
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let config = TraceConfig::default().with_timeout(Duration::from_millis(500));
    let tracer = RedirectTracer::with_client(client, config);

    let started = Instant::now();
    let result = tracer.trace(&format!("{}/slow", server.uri())).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(result.outcome, TraceOutcome::Timeout);
    assert!(result.chain.is_empty());
    assert!(result.is_high_risk);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_trace_deadline_covers_desktop_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/promo"))
        .and(header_regex("user-agent", "iPhone"))
        .respond_with(html("<p>Limited offer</p>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/promo"))
        .and(header_regex("user-agent", "Windows NT"))
        .respond_with(html("<p>Nothing to see here</p>").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let config = TraceConfig::default().with_timeout(Duration::from_millis(800));
    let tracer = RedirectTracer::with_client(client, config);

    let started = Instant::now();
    let result = tracer.trace(&format!("{}/promo", server.uri())).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(result.outcome, TraceOutcome::Timeout);
    assert!(result.is_high_risk);
    assert!(!result.cloaking_detected);
    assert_eq!(result.chain.len(), 1);
    assert_eq!(result.chain[0].status, 200);
    assert!(result.error.unwrap().contains("desktop"));
}

// Bootstrap directory

#[tokio::test]
async fn test_bootstrap_serves_stale_data_when_refresh_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dns.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "1.0",
            "services": [
                [["example"], ["https://rdap.example-registry.test/"]]
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dns.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let directory = BootstrapDirectory::with_source(
        reqwest::Client::new(),
        format!("{}/dns.json", server.uri()),
        Duration::from_millis(50),
    );
    assert!(directory.is_stale());

    assert_eq!(
        directory.get("example").await.as_deref(),
        Some("https://rdap.example-registry.test")
    );
    assert!(!directory.is_stale());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(directory.is_stale());

    // Refresh fails: old table still answers, timestamp is not moved
    assert_eq!(
        directory.get("EXAMPLE").await.as_deref(),
        Some("https://rdap.example-registry.test")
    );
    assert!(directory.is_stale());
    assert!(directory.get("unknown").await.is_none());
}

#[tokio::test]
async fn test_bootstrap_endpoint_used_by_rdap_adapter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dns.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "services": [[["example"], [format!("{}/rdap/", server.uri())]]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rdap/domain/shop.example"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rdap_body()))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let directory = Arc::new(BootstrapDirectory::with_source(
        client.clone(),
        format!("{}/dns.json", server.uri()),
        Duration::from_secs(3600),
    ));
    let endpoints = Arc::new(RdapEndpoints::new(HashMap::new(), Some(directory), None));
    let adapter = RdapAdapter::new(client, endpoints, "AntiScam-Tool/2.0".to_string());

    match adapter.attempt("shop.example", "example").await {
        AdapterOutcome::Found(result) => {
            assert_eq!(result.source, "rdap-bootstrap");
            assert_eq!(result.registration_date(), Some("1995-08-14"));
        }
        other => panic!("expected a result, got {other:?}"),
    }
}

// RDAP adapters

#[tokio::test]
async fn test_rdap_retries_once_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/domain/example.com"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/domain/example.com"))
        .and(header_regex("user-agent", "AntiScam-Tool"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rdap_body()))
        .expect(1)
        .mount(&server)
        .await;

    let overrides = HashMap::from([("com".to_string(), server.uri())]);
    let endpoints = Arc::new(RdapEndpoints::new(overrides, None, None));
    let adapter = RdapAdapter::new(reqwest::Client::new(), endpoints, "AntiScam-Tool/2.0".to_string());

    match adapter.attempt("example.com", "com").await {
        AdapterOutcome::Found(result) => {
            assert_eq!(result.source, "rdap");
            assert_eq!(result.registration_date(), Some("1995-08-14"));
            assert_eq!(
                result.registrar(),
                Some("RESERVED-Internet Assigned Numbers Authority")
            );
        }
        other => panic!("expected a result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rdap_error_status_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/domain/missing.com"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let overrides = HashMap::from([("com".to_string(), server.uri())]);
    let endpoints = Arc::new(RdapEndpoints::new(overrides, None, None));
    let adapter = RdapAdapter::new(reqwest::Client::new(), endpoints, "AntiScam-Tool/2.0".to_string());

    match adapter.attempt("missing.com", "com").await {
        AdapterOutcome::Absent { status, .. } => assert_eq!(status, Some(404)),
        other => panic!("expected absent, got {other:?}"),
    }
}

#[tokio::test]
async fn test_relay_receives_target_as_query_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "url",
            "https://ccrdap.twnic.tw/tw/domain/example.com.tw",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(rdap_body()))
        .expect(1)
        .mount(&server)
        .await;

    let endpoints = Arc::new(RdapEndpoints::new(HashMap::new(), None, None));
    let adapter = RelayRdapAdapter::new(
        reqwest::Client::new(),
        endpoints,
        Some(format!("{}/relay", server.uri())),
        "AntiScam-Tool/2.0".to_string(),
    );

    match adapter.attempt("example.com.tw", "tw").await {
        AdapterOutcome::Found(result) => assert_eq!(result.source, "rdap-proxy"),
        other => panic!("expected a result, got {other:?}"),
    }
}

// WHOIS

#[tokio::test]
async fn test_whois_reply_is_parsed() {
    let port = whois_server(
        "Domain Name: example.tw\r\n\
         Registrar: HiNet\r\n\
         Record created on 2001-03-09 00:00:00 (UTC+8)\r\n",
    )
    .await;

    let servers = HashMap::from([("tw".to_string(), "127.0.0.1".to_string())]);
    let adapter = WhoisAdapter::new(port, servers);

    match adapter.attempt("example.tw", "tw").await {
        AdapterOutcome::Found(result) => {
            assert_eq!(result.source, "whois");
            assert_eq!(result.registration_date(), Some("2001-03-09"));
            assert_eq!(result.registrar(), Some("HiNet"));
        }
        other => panic!("expected a result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_whois_never_closing_server_is_bounded() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut query = [0u8; 256];
        let _ = socket.read(&mut query).await;
        socket
            .write_all(b"Creation Date: 2019-11-30T08:00:00Z\r\n")
            .await
            .unwrap();
        // Trickle forever without closing
        loop {
            if socket.write_all(b"% padding\r\n").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let servers = HashMap::from([("test".to_string(), "127.0.0.1".to_string())]);
    let adapter = WhoisAdapter::new(port, servers);

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        adapter.attempt("slow.test", "test"),
    )
    .await
    .expect("bounded read should not hang");

    match outcome {
        AdapterOutcome::Found(result) => assert_eq!(result.registration_date(), Some("2019-11-30")),
        other => panic!("expected a result, got {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn test_whois_reply_without_date_is_absent() {
    let port = whois_server("No match for \"NOPE.TEST\".\r\n").await;
    let servers = HashMap::from([("test".to_string(), "127.0.0.1".to_string())]);
    let adapter = WhoisAdapter::new(port, servers);

    assert!(!adapter.attempt("nope.test", "test").await.is_found());
}

#[tokio::test]
async fn test_whois_silent_server_times_out_as_absent() {
    let (port, server) = silent_whois_server().await;
    let servers = HashMap::from([("test".to_string(), "127.0.0.1".to_string())]);
    let adapter = WhoisAdapter::new(port, servers).with_timeout(Duration::from_millis(300));

    let started = Instant::now();
    match adapter.attempt("quiet.test", "test").await {
        AdapterOutcome::Absent { status, reason } => {
            assert_eq!(status, None);
            assert!(reason.contains("Timeout"), "unexpected reason: {reason}");
        }
        other => panic!("expected absent, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    server.abort();
}

#[tokio::test]
async fn test_silent_whois_leaves_time_for_scrape_stage() {
    let (port, whois) = silent_whois_server().await;
    let pages = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whois/example.com"))
        .respond_with(html("<p>Creation Date: 2015-06-01</p>"))
        .expect(1)
        .mount(&pages)
        .await;

    let servers = HashMap::from([("com".to_string(), "127.0.0.1".to_string())]);
    let site = ScrapeSite::new("local", format!("{}/whois/{{domain}}", pages.uri()), None);
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(WhoisAdapter::new(port, servers).with_timeout(Duration::from_millis(300))),
        Box::new(ScrapeAdapter::new(site, reqwest::Client::new(), None)),
    ];
    let cascade = ResolutionCascade::new(adapters, Duration::from_secs(2));

    let domain = registered_domain("example.com").unwrap();
    let result = cascade.run(&domain).await.unwrap();
    assert_eq!(result.source, "scrape:local");
    assert_eq!(result.registration_date(), Some("2015-06-01"));
    whois.abort();
}

// Lookup-page scraping

#[tokio::test]
async fn test_scrape_adapter_extracts_from_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whois/example.com"))
        .respond_with(html(
            r#"<html><head><script>var x = "Creation Date: 1999-01-01";</script></head>
            <body><div class="raw">
            <p>Domain Name: EXAMPLE.COM</p>
            <p>Registrar: Example Registrar, Inc.</p>
            <p>Creation Date: 2015-06-01T12:00:00Z</p>
            </div></body></html>"#,
        ))
        .mount(&server)
        .await;

    let site = ScrapeSite::new("local", format!("{}/whois/{{domain}}", server.uri()), None);
    let adapter = ScrapeAdapter::new(site, reqwest::Client::new(), None);
    assert_eq!(adapter.name(), "scrape:local");

    match adapter.attempt("example.com", "com").await {
        AdapterOutcome::Found(result) => {
            assert_eq!(result.source, "scrape:local");
            assert_eq!(result.registration_date(), Some("2015-06-01"));
            assert_eq!(result.registrar(), Some("Example Registrar, Inc."));
        }
        other => panic!("expected a result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scrape_adapter_sends_cn_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup/example.cn"))
        .and(header_regex("accept-language", "^zh-CN"))
        .and(header_regex("referer", "cnnic"))
        .respond_with(html("<p>注册时间：2010年3月17日</p>"))
        .mount(&server)
        .await;

    let site = ScrapeSite::new("cnnic-local", format!("{}/lookup/{{domain}}", server.uri()), Some("cn"));
    let adapter = ScrapeAdapter::new(site, reqwest::Client::new(), None);

    match adapter.attempt("example.cn", "cn").await {
        AdapterOutcome::Found(result) => assert_eq!(result.registration_date(), Some("2010-03-17")),
        other => panic!("expected a result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scrape_adapter_reads_bounded_prefix() {
    let server = MockServer::start().await;
    let mut page = "<p>".to_string();
    page.push_str(&"x".repeat(1024 * 1024));
    page.push_str("</p><p>Creation Date: 2015-06-01</p>");
    Mock::given(method("GET"))
        .and(path("/whois/example.com"))
        .respond_with(html(&page))
        .mount(&server)
        .await;

    let site = ScrapeSite::new("local", format!("{}/whois/{{domain}}", server.uri()), None);
    let adapter = ScrapeAdapter::new(site, reqwest::Client::new(), None);

    match adapter.attempt("example.com", "com").await {
        AdapterOutcome::Absent { reason, .. } => {
            assert!(reason.contains("no creation date"), "unexpected reason: {reason}")
        }
        other => panic!("date past the read cap was found: {other:?}"),
    }
}

// Full verifier

fn offline_config(rdap_base: String, whois_port: u16) -> ResolveConfig {
    ResolveConfig::default()
        .with_bootstrap(false)
        .with_scrape(false)
        .with_rdap_fallback(None)
        .with_rdap_server("com", rdap_base)
        .with_whois_server("com", "127.0.0.1")
        .with_whois_port(whois_port)
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_verifier_prefers_rdap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/domain/example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rdap_body()))
        .mount(&server)
        .await;

    let port = closed_port().await;
    let verifier =
        DomainVerifier::with_config(offline_config(server.uri(), port), TraceConfig::default())
            .unwrap();

    let result = verifier
        .resolve_domain("https://www.shop.example.com/login")
        .await
        .unwrap();
    assert_eq!(result.source, "rdap");
    assert_eq!(result.events.len(), 2);
}

#[tokio::test]
async fn test_verifier_falls_back_to_whois() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/domain/example.com"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let port = whois_server("Creation Date: 1995-08-14T04:00:00Z\r\nRegistrar: RESERVED-IANA\r\n").await;
    let verifier =
        DomainVerifier::with_config(offline_config(server.uri(), port), TraceConfig::default())
            .unwrap();

    let result = verifier.resolve_domain("example.com").await.unwrap();
    assert_eq!(result.source, "whois");
    assert_eq!(result.registration_date(), Some("1995-08-14"));
    assert_eq!(result.registrar(), Some("RESERVED-IANA"));
}

#[tokio::test]
async fn test_verifier_reports_not_found_with_last_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/domain/example.com"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let port = closed_port().await;
    let verifier =
        DomainVerifier::with_config(offline_config(server.uri(), port), TraceConfig::default())
            .unwrap();

    match verifier.resolve_domain("example.com").await {
        Err(VerifyError::NotFound {
            domain,
            last_status,
            attempts,
            timed_out,
        }) => {
            assert_eq!(domain, "example.com");
            assert_eq!(last_status, Some(404));
            assert_eq!(attempts.len(), 2);
            assert!(attempts[0].starts_with("rdap:"));
            assert!(attempts[1].starts_with("whois:"));
            assert!(!timed_out);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_verifier_skips_direct_rdap_for_cn() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/domain/example.cn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rdap_body()))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param("url", format!("{}/domain/example.cn", server.uri())))
        .respond_with(ResponseTemplate::new(200).set_body_json(rdap_body()))
        .expect(1)
        .mount(&server)
        .await;

    let port = closed_port().await;
    let config = ResolveConfig::default()
        .with_bootstrap(false)
        .with_scrape(false)
        .with_rdap_fallback(None)
        .with_rdap_server("cn", server.uri())
        .with_whois_server("cn", "127.0.0.1")
        .with_whois_port(port)
        .with_relay(format!("{}/relay", server.uri()))
        .with_timeout(Duration::from_secs(5));
    let verifier = DomainVerifier::with_config(config, TraceConfig::default()).unwrap();

    let result = verifier.resolve_domain("www.example.cn").await.unwrap();
    assert_eq!(result.source, "rdap-proxy");
}

#[tokio::test]
async fn test_verifier_batch_trace_keeps_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(html("<p>one</p>").set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(html("<p>two</p>"))
        .mount(&server)
        .await;

    let verifier = DomainVerifier::with_config(
        ResolveConfig::default().with_bootstrap(false),
        TraceConfig::default(),
    )
    .unwrap();
    let inputs = vec![format!("{}/one", server.uri()), format!("{}/two", server.uri())];
    let results = verifier.trace_urls(&inputs).await;

    assert!(results[0].as_ref().unwrap().final_url.ends_with("/one"));
    assert!(results[1].as_ref().unwrap().final_url.ends_with("/two"));
}
