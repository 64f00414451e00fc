// talia-lib/tests/integration.rs

//! Integration tests for talia-lib: real TCP lookups against a local WHOIS
//! stand-in, and the grouped store on disk.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use talia_lib::{
    check_batch, grouped_from_results, load_grouped_file, merge_and_write, Availability,
    BatchChecker, BatchProgress, CheckConfig, Concurrency, GroupedData, WhoisClient,
};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Start a WHOIS stand-in on an ephemeral port.
///
/// `free*` domains get a no-match answer, `silent*` domains get the
/// connection closed without a byte, everything else is registered.
async fn spawn_whois_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut line = String::new();
                BufReader::new(read_half).read_line(&mut line).await.unwrap();
                let domain = line.trim_end().to_string();

                if domain.starts_with("silent") {
                    return;
                }
                let reply = if domain.starts_with("free") {
                    format!("No match for \"{}\".\r\n", domain.to_uppercase())
                } else {
                    format!("   Domain Name: {}\r\n   Registrar: Example\r\n", domain.to_uppercase())
                };
                write_half.write_all(reply.as_bytes()).await.unwrap();
                write_half.shutdown().await.unwrap();
            });
        }
    });

    addr
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_batch_over_tcp_keeps_input_order() {
    let addr = spawn_whois_server().await;
    let domains = names(&[
        "free-one.com",
        "taken-one.com",
        "silent-one.com",
        "free-two.com",
        "taken-two.com",
    ]);

    for concurrency in [
        Concurrency::Sequential,
        Concurrency::Bounded(2),
        Concurrency::Unbounded,
    ] {
        let config = CheckConfig::new(addr.to_string())
            .with_concurrency(concurrency)
            .with_delay(Duration::from_millis(5));
        let report = BatchChecker::new(config).run(&domains).await;

        let got: Vec<(&str, Availability)> = report
            .results
            .iter()
            .map(|r| (r.domain.as_str(), r.availability))
            .collect();
        assert_eq!(
            got,
            vec![
                ("free-one.com", Availability::NoMatch),
                ("taken-one.com", Availability::Taken),
                ("silent-one.com", Availability::Error),
                ("free-two.com", Availability::NoMatch),
                ("taken-two.com", Availability::Taken),
            ],
            "mode {concurrency}"
        );
        assert_eq!(report.stats.available, 2);
        assert_eq!(report.stats.taken, 2);
        assert_eq!(report.stats.errors, 1);
    }
}

#[tokio::test]
async fn test_zero_byte_response_is_an_error_with_log() {
    let addr = spawn_whois_server().await;
    let client = Arc::new(WhoisClient::new(addr.to_string()));
    let config = CheckConfig::new(addr.to_string());

    let results = check_batch(
        &names(&["silent.com"]),
        client,
        &config,
        Arc::new(BatchProgress::new(1)),
    )
    .await;

    assert_eq!(results[0].availability, Availability::Error);
    assert!(results[0].raw_log.starts_with("Error:"));
    assert!(results[0].raw_log.contains("empty"));
}

#[tokio::test]
async fn test_unreachable_server_yields_error_results() {
    // Grab a free port, then close it so connects are refused.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let config = CheckConfig::new(addr.to_string())
        .with_concurrency(Concurrency::Bounded(2))
        .with_dial_timeout(Duration::from_secs(2));
    let report = BatchChecker::new(config)
        .run(&names(&["a.com", "b.com"]))
        .await;

    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.availability == Availability::Error && r.raw_log.starts_with("Error:")));
}

#[tokio::test]
async fn test_batch_results_merge_into_existing_store() {
    let addr = spawn_whois_server().await;
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("grouped.json");
    fs::write(
        &store,
        r#"{"available":[{"domain":"free-old.com","reason":"NO_MATCH"},{"domain":"taken-now.com","reason":"NO_MATCH"}],"unavailable":[]}"#,
    )
    .unwrap();

    let config = CheckConfig::new(addr.to_string()).with_concurrency(Concurrency::Bounded(4));
    let report = BatchChecker::new(config)
        .run(&names(&["taken-now.com", "free-new.com"]))
        .await;
    merge_and_write(&store, grouped_from_results(&report.results, false)).unwrap();

    let merged = load_grouped_file(&store).unwrap();
    assert_eq!(merged.available_domains(), vec!["free-new.com", "free-old.com"]);
    assert_eq!(merged.unavailable.len(), 1);
    assert_eq!(merged.unavailable[0].domain, "taken-now.com");
    assert_eq!(merged.unavailable[0].reason, Availability::Taken);
    assert!(merged.unavailable[0].log.is_none());
}

#[test]
fn test_legacy_flat_file_with_empty_batch_is_upgraded() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("legacy.json");
    fs::write(
        &store,
        r#"[{"domain":"x.com","available":true,"reason":"NO_MATCH"},{"domain":"y.com","available":false,"reason":"TAKEN"}]"#,
    )
    .unwrap();

    merge_and_write(&store, GroupedData::default()).unwrap();

    let raw = fs::read_to_string(&store).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["available"][0]["domain"], "x.com");
    assert_eq!(value["available"][0]["reason"], "NO_MATCH");
    assert_eq!(value["unavailable"][0]["domain"], "y.com");
    assert_eq!(value["unavailable"][0]["reason"], "TAKEN");
    assert!(value.get("unverified").is_none());
}
