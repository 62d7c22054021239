//! End-to-end retry/failover behavior against loopback gateways.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use mw_client::{Method, RequestOptions, RequestTransport};
use mw_domain::GatewayConfig;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn counting_gateway(status: StatusCode, body: serde_json::Value) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/v1/rqlite/schema",
        get(move || {
            let h = h.clone();
            let body = body.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                (status, Json(body))
            }
        }),
    );
    (app, hits)
}

fn config(urls: Vec<String>, max_retries: u32) -> GatewayConfig {
    GatewayConfig {
        base_urls: urls,
        max_retries,
        retry_delay_ms: 1,
        failover_cooldown_ms: 60_000,
        ..Default::default()
    }
}

#[tokio::test]
async fn retryable_status_attempts_max_retries_plus_one() {
    let (app, hits) = counting_gateway(StatusCode::SERVICE_UNAVAILABLE, serde_json::json!({}));
    let url = spawn(app).await;

    let transport = RequestTransport::new(&config(vec![url], 2)).unwrap();
    let err = transport
        .execute::<serde_json::Value>(
            Method::GET,
            "/v1/rqlite/schema",
            None,
            &RequestOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), 503);
    assert_eq!(hits.load(Ordering::SeqCst), 3); // initial + 2 retries
}

#[tokio::test]
async fn terminal_status_never_retried() {
    let (app, hits) = counting_gateway(
        StatusCode::NOT_FOUND,
        serde_json::json!({"error": "no such table"}),
    );
    let url = spawn(app).await;

    let transport = RequestTransport::new(&config(vec![url], 3)).unwrap();
    let err = transport
        .execute::<serde_json::Value>(
            Method::GET,
            "/v1/rqlite/schema",
            None,
            &RequestOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), 404);
    assert_eq!(err.code(), "HTTP_404");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_payload_code_and_message_used() {
    let (app, _hits) = counting_gateway(
        StatusCode::BAD_REQUEST,
        serde_json::json!({"error": "bad query syntax", "code": "BAD_QUERY", "line": 3}),
    );
    let url = spawn(app).await;

    let transport = RequestTransport::new(&config(vec![url], 0)).unwrap();
    let err = transport
        .execute::<serde_json::Value>(
            Method::GET,
            "/v1/rqlite/schema",
            None,
            &RequestOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), 400);
    assert_eq!(err.code(), "BAD_QUERY");
    match err {
        mw_domain::Error::Api(api) => {
            assert_eq!(api.message, "bad query syntax");
            assert_eq!(api.details["line"], 3);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn fails_over_to_healthy_gateway_and_sticks() {
    let (bad, bad_hits) = counting_gateway(StatusCode::SERVICE_UNAVAILABLE, serde_json::json!({}));
    let (good, good_hits) = counting_gateway(StatusCode::OK, serde_json::json!({"items": []}));
    let g1 = spawn(bad).await;
    let g2 = spawn(good).await;

    let transport = RequestTransport::new(&config(vec![g1, g2], 1)).unwrap();
    let opts = RequestOptions::new();

    let schema: serde_json::Value = transport
        .execute(Method::GET, "/v1/rqlite/schema", None, &opts)
        .await
        .unwrap();
    assert_eq!(schema, serde_json::json!({"items": []}));
    assert_eq!(bad_hits.load(Ordering::SeqCst), 2); // initial + 1 retry
    assert_eq!(good_hits.load(Ordering::SeqCst), 1);

    // Before the cooldown expires, the next call goes directly to g2.
    let _: serde_json::Value = transport
        .execute(Method::GET, "/v1/rqlite/schema", None, &opts)
        .await
        .unwrap();
    assert_eq!(bad_hits.load(Ordering::SeqCst), 2);
    assert_eq!(good_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn all_gateways_failing_surfaces_last_error() {
    let (a, _) = counting_gateway(StatusCode::SERVICE_UNAVAILABLE, serde_json::json!({}));
    let (b, _) = counting_gateway(StatusCode::BAD_GATEWAY, serde_json::json!({}));
    let g1 = spawn(a).await;
    let g2 = spawn(b).await;

    let transport = RequestTransport::new(&config(vec![g1, g2], 0)).unwrap();
    let err = transport
        .execute::<serde_json::Value>(
            Method::GET,
            "/v1/rqlite/schema",
            None,
            &RequestOptions::new(),
        )
        .await
        .unwrap_err();

    // The last gateway tried was g2; its error surfaces unwrapped.
    assert_eq!(err.status(), 502);
}

#[tokio::test]
async fn transient_then_success_on_same_gateway() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/v1/rqlite/schema",
        get(move || {
            let h = h.clone();
            async move {
                if h.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({})))
                } else {
                    (StatusCode::OK, Json(serde_json::json!({"items": [1]})))
                }
            }
        }),
    );
    let url = spawn(app).await;

    let transport = RequestTransport::new(&config(vec![url], 2)).unwrap();
    let schema: serde_json::Value = transport
        .execute(Method::GET, "/v1/rqlite/schema", None, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(schema["items"], serde_json::json!([1]));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn namespace_path_sends_api_key_only() {
    let seen = Arc::new(parking_lot::Mutex::new(None::<(bool, bool)>));
    let s = seen.clone();
    let app = Router::new().route(
        "/v1/rqlite/query",
        get(move |headers: HeaderMap| {
            let s = s.clone();
            async move {
                *s.lock() = Some((
                    headers.contains_key("x-api-key"),
                    headers.contains_key("authorization"),
                ));
                Json(serde_json::json!({"rows": []}))
            }
        }),
    );
    let url = spawn(app).await;

    let mut cfg = config(vec![url], 0);
    cfg.api_key = Some("mk_live_abc".into());
    cfg.bearer_token = Some("jwt.ey.z".into());
    let transport = RequestTransport::new(&cfg).unwrap();

    let _: serde_json::Value = transport
        .execute(Method::GET, "/v1/rqlite/query", None, &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(*seen.lock(), Some((true, false)));
}

#[tokio::test]
async fn binary_download_streams_bytes() {
    use futures_util::StreamExt;

    let app = Router::new().route(
        "/v1/blob/sha256/abcd",
        get(|| async { vec![0u8, 159, 146, 150, 0] }),
    );
    let url = spawn(app).await;

    let transport = RequestTransport::new(&config(vec![url], 0)).unwrap();
    let mut stream = transport
        .get_binary("/v1/blob/sha256/abcd", &RequestOptions::new())
        .await
        .unwrap();

    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend(chunk.unwrap());
    }
    assert_eq!(collected, vec![0u8, 159, 146, 150, 0]);
}

#[tokio::test]
async fn binary_download_times_out_when_headers_never_arrive() {
    use tokio::io::AsyncReadExt;

    // A gateway that accepts the connection, reads the request, and
    // never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                while matches!(sock.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });

    let transport = RequestTransport::new(&config(vec![format!("http://{addr}")], 0)).unwrap();
    let opts = RequestOptions::new().timeout(Duration::from_millis(200));

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        transport.get_binary("/v1/blob/sha256/slow", &opts),
    )
    .await
    .expect("per-call timeout must bound the download, not hang");

    let err = match result {
        Ok(_) => panic!("expected error, got a stream"),
        Err(e) => e,
    };
    assert_eq!(err.status(), 0);
    assert_eq!(err.code(), mw_domain::error::CODE_TIMEOUT);
}

#[tokio::test]
async fn upload_is_multipart_and_rebuilds_form_per_attempt() {
    let hits = Arc::new(AtomicUsize::new(0));
    let content_types = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let h = hits.clone();
    let ct = content_types.clone();
    let app = Router::new().route(
        "/v1/blob",
        post(move |headers: HeaderMap| {
            let h = h.clone();
            let ct = ct.clone();
            async move {
                ct.lock().push(
                    headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_owned(),
                );
                if h.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({})))
                } else {
                    (StatusCode::OK, Json(serde_json::json!({"sha256": "abcd"})))
                }
            }
        }),
    );
    let url = spawn(app).await;

    let transport = RequestTransport::new(&config(vec![url], 1)).unwrap();
    let forms_built = Arc::new(AtomicUsize::new(0));
    let f = forms_built.clone();
    let receipt: serde_json::Value = transport
        .upload(
            "/v1/blob",
            move || {
                f.fetch_add(1, Ordering::SeqCst);
                reqwest::multipart::Form::new().text("file", "payload bytes")
            },
            &RequestOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(receipt["sha256"], "abcd");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    // The multipart body is not reusable; a fresh form per attempt.
    assert_eq!(forms_built.load(Ordering::SeqCst), 2);
    let content_types = content_types.lock();
    assert_eq!(content_types.len(), 2);
    assert!(content_types
        .iter()
        .all(|c| c.starts_with("multipart/form-data")));
}
