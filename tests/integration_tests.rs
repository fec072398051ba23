//! Integration tests for the directory enrichment pipeline
//!
//! These tests validate cross-component interactions and real network
//! behavior against fake upstream services on ephemeral local ports.

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use server::directory::DirectoryClient;
use server::probe::{probe, ProbeError};
use server::profile::ProfileResolver;
use server::state::{AppState, Settings};
use server::{http, refresh, resolver};
use shared::{encode_string, encode_varint, frame_packet, STATUS_PACKET_ID};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

fn status_frame(status_json: &str) -> Vec<u8> {
    let mut body = encode_varint(STATUS_PACKET_ID);
    body.extend_from_slice(&encode_string(status_json));
    frame_packet(&body)
}

/// Spawns a fake game server that answers every status query with
/// `status_json`, delivered in `chunks` separate writes. Returns the
/// listen address and a counter of accepted connections.
async fn spawn_status_server(status_json: String, chunks: usize) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let frame = status_frame(&status_json);
            tokio::spawn(async move {
                // Drain the handshake + status request; content is not
                // validated here.
                let mut buf = [0u8; 512];
                let _ = socket.read(&mut buf).await;

                let chunk_size = frame.len().div_ceil(chunks.max(1));
                for part in frame.chunks(chunk_size) {
                    let _ = socket.write_all(part).await;
                    let _ = socket.flush().await;
                    sleep(Duration::from_millis(10)).await;
                }
                sleep(Duration::from_millis(50)).await;
            });
        }
    });

    (addr, connections)
}

/// Spawns a fake upstream directory returning `page` for every listing
/// request.
async fn spawn_directory_server(page: serde_json::Value) -> SocketAddr {
    let app = Router::new().route(
        "/servers/list",
        post(move || {
            let page = page.clone();
            async move { Json(page) }
        }),
    );
    spawn_http(app).await
}

async fn spawn_http(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());
    addr
}

fn test_state(directory_url: &str, profile_url: &str, settings: Settings) -> AppState {
    let timeout = Duration::from_secs(2);
    AppState::new(
        settings,
        DirectoryClient::new(directory_url, timeout),
        ProfileResolver::new(profile_url, profile_url, timeout),
    )
}

const ALPHA_STATUS: &str =
    r#"{"players":{"online":1,"max":20,"sample":[{"id":"abc","name":"Steve"}]}}"#;

/// STATUS PROBE TESTS
mod probe_tests {
    use super::*;

    /// A response split across several deliveries must parse identically
    /// to a single delivery.
    #[tokio::test]
    async fn probe_reassembles_chunked_response() {
        let (single_addr, _) = spawn_status_server(ALPHA_STATUS.to_string(), 1).await;
        let (chunked_addr, _) = spawn_status_server(ALPHA_STATUS.to_string(), 3).await;

        let single = probe("127.0.0.1", single_addr.port(), Duration::from_secs(2))
            .await
            .unwrap();
        let chunked = probe("127.0.0.1", chunked_addr.port(), Duration::from_secs(2))
            .await
            .unwrap();

        let single_player = single.sample().next().unwrap();
        let chunked_player = chunked.sample().next().unwrap();
        assert_eq!(single_player.id, chunked_player.id);
        assert_eq!(single_player.name, chunked_player.name);
        assert_eq!(chunked_player.name, "Steve");
    }

    /// A silent server must trip the overall deadline, not hang.
    #[tokio::test]
    async fn probe_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            // Accept and say nothing.
            sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let result = probe("127.0.0.1", addr.port(), Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ProbeError::Timeout(_))));
    }

    #[tokio::test]
    async fn probe_reports_connection_failure() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = probe("127.0.0.1", addr.port(), Duration::from_secs(2)).await;
        assert!(matches!(result, Err(ProbeError::Connection(_))));
    }
}

/// PIPELINE TESTS
mod pipeline_tests {
    use super::*;

    fn directory_page(server_name: &str, uuids: &[&str]) -> serde_json::Value {
        json!({
            "result": [{
                "serverName": server_name,
                "state": 4,
                "players": {
                    "online": uuids.len(),
                    "max": 20,
                    "list": uuids.iter().map(|u| json!({"uuid": u})).collect::<Vec<_>>()
                }
            }],
            "pagination": {"total": 1}
        })
    }

    /// Refresh probes the listed server, the cache fills from the probe
    /// sample, and a subsequent request is decorated without re-probing.
    #[tokio::test]
    async fn refresh_feeds_cache_and_request_reads_it() {
        let (probe_addr, probe_count) = spawn_status_server(ALPHA_STATUS.to_string(), 1).await;
        let directory_addr =
            spawn_directory_server(directory_page("127.0.0.1", &["abc"])).await;

        let settings = Settings {
            server_domain: String::new(),
            probe_port: probe_addr.port(),
            probe_timeout: Duration::from_secs(2),
            ..Settings::default()
        };
        let state = Arc::new(test_state(
            &format!("http://{}", directory_addr),
            "http://127.0.0.1:1",
            settings,
        ));

        refresh::refresh_once(&state).await.unwrap();

        let cached = state.cache.get("abc").await.unwrap();
        assert_eq!(cached.name.as_deref(), Some("Steve"));
        assert_eq!(state.queue.len().await, 0);
        assert_eq!(probe_count.load(Ordering::SeqCst), 1);

        // Serve the enriched listing and hit it like a browser would.
        let api_addr = spawn_http(http::router(Arc::clone(&state))).await;
        let response = reqwest::Client::new()
            .post(format!("http://{}/api/servers", api_addr))
            .json(&json!({
                "pagination": {"skip": 0, "limit": 10},
                "sort": {"field": "players.online", "order": "desc"}
            }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.unwrap();
        let player = &body["result"][0]["players"]["list"][0];
        assert_eq!(player["uuid"], "abc");
        assert_eq!(player["name"], "Steve");
        assert_eq!(player["state"], "named");

        // The request path read the cache; no extra probe was issued.
        assert_eq!(probe_count.load(Ordering::SeqCst), 1);
    }

    /// A player absent from the probe sample goes to the fallback queue
    /// and is resolved by the profile service on the next tick.
    #[tokio::test]
    async fn fallback_queue_resolves_unsampled_player() {
        let (probe_addr, _) = spawn_status_server(ALPHA_STATUS.to_string(), 1).await;
        let directory_addr =
            spawn_directory_server(directory_page("127.0.0.1", &["abc", "xyz"])).await;
        let profile_addr = spawn_http(Router::new().route(
            "/{id}",
            get(|| async { Json(json!({"username": "Alex"})) }),
        ))
        .await;

        let settings = Settings {
            server_domain: String::new(),
            probe_port: probe_addr.port(),
            probe_timeout: Duration::from_secs(2),
            ..Settings::default()
        };
        let state = test_state(
            &format!("http://{}", directory_addr),
            &format!("http://{}", profile_addr),
            settings,
        );

        refresh::refresh_once(&state).await.unwrap();
        assert!(state.queue.contains("xyz").await);
        assert!(!state.queue.contains("abc").await);

        resolver::tick(&state).await;

        let cached = state.cache.get("xyz").await.unwrap();
        assert_eq!(cached.name.as_deref(), Some("Alex"));
        assert_eq!(state.queue.len().await, 0);
        assert!(!state.queue.contains("xyz").await);
    }

    /// A rate-limit rejection pauses the drain and keeps the entry at the
    /// front for the first post-cooldown tick.
    #[tokio::test]
    async fn rate_limited_lookup_pauses_queue() {
        let profile_addr = spawn_http(Router::new().route(
            "/{id}",
            get(|| async { axum::http::StatusCode::TOO_MANY_REQUESTS }),
        ))
        .await;

        let settings = Settings {
            rate_limit_cooldown: Duration::from_secs(60),
            ..Settings::default()
        };
        let state = test_state(
            "http://127.0.0.1:1",
            &format!("http://{}", profile_addr),
            settings,
        );

        state
            .queue
            .enqueue(server::queue::PendingPlayer::new(
                shared::PlayerIdent::classify("first"),
                "alpha",
            ))
            .await;
        state
            .queue
            .enqueue(server::queue::PendingPlayer::new(
                shared::PlayerIdent::classify("second"),
                "alpha",
            ))
            .await;

        resolver::tick(&state).await;

        assert!(state.queue.cooldown_active().await);
        assert_eq!(state.queue.len().await, 2);
        // The rejected entry kept its place at the head.
        assert_eq!(state.queue.pop().await.unwrap().ident.as_str(), "first");

        // While cooling down, further ticks drain nothing.
        resolver::tick(&state).await;
        assert_eq!(state.queue.len().await, 1);
    }

    /// Upstream directory failure surfaces as a proxy error, not a crash.
    #[tokio::test]
    async fn directory_failure_returns_proxy_error() {
        let state = Arc::new(test_state(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            Settings::default(),
        ));
        let api_addr = spawn_http(http::router(state)).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/api/servers", api_addr))
            .json(&json!({
                "pagination": {"skip": 0, "limit": 10},
                "sort": {"field": "players.online", "order": "desc"}
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 502);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Proxy error");
        assert!(body["details"].as_str().unwrap().len() > 0);
    }
}
