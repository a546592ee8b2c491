//! Local stand-in for the SwitchBot status endpoint.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchbot_exporter::collector::CollectionContext;
use switchbot_exporter::config::SwitchBotConfig;
use switchbot_exporter::metrics::MetricsCollector;
use switchbot_exporter::switchbot::SwitchBotClient;

pub const TOKEN: &str = "test_token";
pub const SECRET: &str = "test_secret";

/// Canned reply for one device id
#[derive(Clone, Debug)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub remaining: Option<i64>,
    pub delay: Duration,
}

impl MockReply {
    pub fn power(watts: f64) -> Self {
        Self::json(
            200,
            &format!(
                r#"{{"statusCode":100,"body":{{"deviceId":"X","deviceType":"Plug Mini (JP)","weight":{}}},"message":"success"}}"#,
                watts
            ),
        )
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            remaining: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_remaining(mut self, remaining: i64) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Headers of a request received by the mock
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub device_id: String,
    pub headers: HeaderMap,
}

#[derive(Clone, Default)]
struct MockState {
    replies: Arc<Mutex<HashMap<String, MockReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockVendor {
    pub base_url: String,
    state: MockState,
}

impl MockVendor {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/v1.1/devices/{id}/status", get(status_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock vendor");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock vendor failed");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn reply(&self, device_id: &str, reply: MockReply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(device_id.to_string(), reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn config(&self) -> SwitchBotConfig {
        let mut config = SwitchBotConfig::new(TOKEN, SECRET);
        config.base_url = self.base_url.clone();
        config.request_timeout_seconds = 1;
        config
    }

    pub fn context(&self, metrics: &MetricsCollector) -> CollectionContext {
        CollectionContext {
            client: Arc::new(SwitchBotClient::new(self.config()).expect("Failed to build client")),
            metrics: metrics.clone(),
            rate_limit_low_water: 100,
        }
    }
}

async fn status_handler(
    Path(id): Path<String>,
    State(state): State<MockState>,
    headers: HeaderMap,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        device_id: id.clone(),
        headers,
    });

    let reply = state.replies.lock().unwrap().get(&id).cloned();
    let Some(reply) = reply else {
        return (StatusCode::NOT_FOUND, "unknown device").into_response();
    };

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap();
    let mut response = (status, reply.body).into_response();
    response.headers_mut().insert(
        "content-type",
        HeaderValue::from_static("application/json"),
    );
    if let Some(remaining) = reply.remaining {
        response
            .headers_mut()
            .insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    }
    response
}

/// Metric set with no state, as a fresh exporter would have
pub fn create_test_metrics() -> MetricsCollector {
    MetricsCollector::new().expect("Failed to create metrics")
}
