//! HTTP Publisher Tests
//!
//! Run the publisher against an in-process axum server bound to an
//! ephemeral port and inspect exactly what was POSTed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use neogrid_em::aggregation::{ChannelWindow, StatsRecord, WindowStats};
use neogrid_em::config::{NodeConfig, PublisherConfig};
use neogrid_em::publisher::{HttpPublisher, PublishError, Publisher};
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Received = Arc<Mutex<Vec<Value>>>;

async fn spawn_server(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route(
            "/",
            post(move |State(store): State<Received>, Json(body): Json<Value>| async move {
                store.lock().unwrap().push(body);
                status
            }),
        )
        .with_state(Arc::clone(&received));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), received)
}

fn publisher(endpoint: String) -> HttpPublisher {
    let config = PublisherConfig {
        endpoint,
        timeout_secs: 5,
        enabled: true,
    };
    let node = NodeConfig {
        id: "bench-01".into(),
        level: "info".into(),
    };
    HttpPublisher::new(&config, &node).unwrap()
}

fn record() -> StatsRecord {
    StatsRecord {
        sequence: 1,
        window_end: Utc.with_ymd_and_hms(2026, 5, 4, 10, 30, 0).unwrap(),
        channels: vec![
            ChannelWindow {
                channel: 6,
                label: "Voltage".into(),
                stats: WindowStats::from_values(&[229.4567, 230.1, 231.0]),
            },
            ChannelWindow {
                channel: 5,
                label: "Current".into(),
                stats: WindowStats::no_data(),
            },
        ],
    }
}

#[tokio::test]
async fn posts_flat_json_payload() {
    let (endpoint, received) = spawn_server(StatusCode::OK).await;
    let mut publisher = publisher(endpoint);

    publisher.publish(&record()).await.unwrap();

    let bodies = received.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["nodeId"], "bench-01");
    assert_eq!(body["level"], "info");
    assert_eq!(body["timestamp"], "2026-05-04T10:30:00.000Z");
    assert_eq!(body["Voltage_min"], 229.457);
    assert_eq!(body["Voltage_max"], 231.0);
    assert_eq!(body["Current_sd"], 0.0);
}

#[tokio::test]
async fn error_status_is_reported() {
    let (endpoint, _received) = spawn_server(StatusCode::INTERNAL_SERVER_ERROR).await;
    let mut publisher = publisher(endpoint);

    match publisher.publish(&record()).await {
        Err(PublishError::Status(status)) => assert_eq!(status.as_u16(), 500),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_http_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut publisher = publisher(format!("http://{addr}/"));
    assert!(matches!(
        publisher.publish(&record()).await,
        Err(PublishError::Http(_))
    ));
}
