//! Zone deletes that the service accepts as long-running operations.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use serde_json::json;
use tokio::net::TcpListener;
use zoneflow::{
    DnsError, DnsManagementClient, ZoneApi, auth::StaticTokenCredential, config::ClientConfig,
};

const ZONE_PATH: &str =
    "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Network/dnsZones/contoso.com";
const FAILURE_MESSAGE: &str = "The zone 'contoso.com' could not be deleted: backend unavailable.";

/// How the fake operation endpoint settles.
#[derive(Clone, Copy)]
enum Settles {
    FailsAfterOnePoll,
    Never,
}

struct Operation {
    settles: Settles,
    polls: AtomicUsize,
}

async fn accept_delete(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    (
        StatusCode::ACCEPTED,
        [
            ("azure-asyncoperation", format!("http://{host}/operations/op-1")),
            ("retry-after", "0".to_string()),
        ],
    )
        .into_response()
}

async fn operation_status(Extension(op): Extension<Arc<Operation>>) -> Response {
    let poll = op.polls.fetch_add(1, Ordering::SeqCst) + 1;
    let body = match (op.settles, poll) {
        (Settles::FailsAfterOnePoll, 1) | (Settles::Never, _) => json!({"status": "InProgress"}),
        (Settles::FailsAfterOnePoll, _) => json!({
            "status": "Failed",
            "error": {"code": "ZoneDeleteFailed", "message": FAILURE_MESSAGE}
        }),
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn spawn_service(settles: Settles) -> (String, Arc<Operation>) {
    let op = Arc::new(Operation {
        settles,
        polls: AtomicUsize::new(0),
    });
    let app = Router::new()
        .route(ZONE_PATH, delete(accept_delete))
        .route("/operations/op-1", get(operation_status))
        .layer(Extension(op.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), op)
}

fn client(base: &str, timeout: Duration) -> DnsManagementClient {
    let mut config = ClientConfig::new(base, "sub-1");
    config.timeout = timeout;
    config.poll_interval = Duration::from_millis(20);
    DnsManagementClient::new(config, Arc::new(StaticTokenCredential::new("token"))).unwrap()
}

#[tokio::test]
async fn test_failed_operation_reports_service_message() {
    let (base, op) = spawn_service(Settles::FailsAfterOnePoll).await;
    let client = client(&base, Duration::from_secs(5));

    let err = client.delete_zone("rg", "contoso.com").await.unwrap_err();
    match &err {
        DnsError::Unknown { message, .. } => assert_eq!(message, FAILURE_MESSAGE),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.to_string(), FAILURE_MESSAGE);
    assert_eq!(op.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unsettled_operation_times_out_as_transient() {
    let (base, op) = spawn_service(Settles::Never).await;
    let client = client(&base, Duration::from_millis(300));

    let err = client.delete_zone("rg", "contoso.com").await.unwrap_err();
    assert!(matches!(err, DnsError::Transient(_)), "{err:?}");
    assert!(err.is_retryable());
    assert!(op.polls.load(Ordering::SeqCst) >= 2);
}
