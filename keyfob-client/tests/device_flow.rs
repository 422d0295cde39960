//! Device-flow timing and classification tests.
//!
//! A scripted transport replays canned endpoint responses while the tokio
//! clock is paused, so polling cadence, slow-down widening, deadlines and
//! cancellation are asserted deterministically and the whole suite runs in
//! milliseconds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use keyfob_client::{
    CancelCoordinator, DeviceAuthClient, FlowError, HttpResponse, Transport,
};

/// Transport that replays canned responses and records request timing.
struct ScriptedTransport {
    device: (u16, String),
    tokens: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTransport {
    fn new(device: (u16, &str), tokens: &[(u16, &str)]) -> Arc<Self> {
        Arc::new(Self {
            device: (device.0, device.1.to_string()),
            tokens: Mutex::new(
                tokens
                    .iter()
                    .map(|(status, body)| (*status, body.to_string()))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn token_request_times(&self, start: Instant) -> Vec<u64> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.contains("token"))
            .map(|(_, at)| at.duration_since(start).as_secs())
            .collect()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_form(
        &self,
        path: &str,
        _params: &[(&str, &str)],
    ) -> Result<HttpResponse, FlowError> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), Instant::now()));

        let (status, body) = if path.contains("device") {
            self.device.clone()
        } else {
            self.tokens
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((400, PENDING.to_string()))
        };
        Ok(HttpResponse {
            status,
            content_type: Some("application/json".to_string()),
            body,
        })
    }
}

const PENDING: &str = r#"{"error":"authorization_pending"}"#;
const SLOW_DOWN: &str = r#"{"error":"slow_down"}"#;
const SUCCESS: &str = r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#;

fn device_body(expires_in: u64, interval: u64) -> String {
    format!(
        r#"{{
            "device_code": "dev-1",
            "user_code": "ABCD-1234",
            "verification_uri": "https://example.com/activate",
            "verification_uri_complete": "https://example.com/activate?code=ABCD-1234",
            "expires_in": {expires_in},
            "interval": {interval}
        }}"#
    )
}

fn client_for(transport: Arc<ScriptedTransport>) -> (DeviceAuthClient, Arc<AtomicUsize>, Arc<Mutex<Option<String>>>) {
    let device_calls = Arc::new(AtomicUsize::new(0));
    let authorization = Arc::new(Mutex::new(None));

    let device_calls_cb = device_calls.clone();
    let authorization_cb = authorization.clone();
    let client = DeviceAuthClient::builder()
        .scope("openid")
        .transport(transport)
        .on_device_code(move |code| {
            assert_eq!(code.user_code, "ABCD-1234");
            device_calls_cb.fetch_add(1, Ordering::SeqCst);
        })
        .on_token(move |_code, token, http| {
            assert_eq!(token.access_token.as_deref(), Some("tok"));
            *authorization_cb.lock().unwrap() = Some(http.authorization().to_string());
        })
        .build()
        .expect("build client");

    (client, device_calls, authorization)
}

#[tokio::test(start_paused = true)]
async fn pending_polls_until_success() {
    let transport = ScriptedTransport::new(
        (200, &device_body(600, 5)),
        &[(400, PENDING), (400, PENDING), (200, SUCCESS)],
    );
    let (client, device_calls, authorization) = client_for(transport.clone());

    let start = Instant::now();
    client.authorize().await.expect("flow succeeds");

    // First poll immediately, then one 5s wait per pending answer.
    assert_eq!(transport.token_request_times(start), vec![0, 5, 10]);
    assert_eq!(device_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        authorization.lock().unwrap().as_deref(),
        Some("Bearer tok")
    );
}

#[tokio::test(start_paused = true)]
async fn slow_down_widens_before_sleeping() {
    let transport = ScriptedTransport::new(
        (200, &device_body(600, 5)),
        &[(400, SLOW_DOWN), (400, PENDING), (200, SUCCESS)],
    );
    let (client, _, _) = client_for(transport.clone());

    let start = Instant::now();
    client.authorize().await.expect("flow succeeds");

    // slow_down widens 5s -> 10s and the widened interval applies at once.
    assert_eq!(transport.token_request_times(start), vec![0, 10, 20]);
}

#[tokio::test(start_paused = true)]
async fn slow_down_never_narrows() {
    let transport = ScriptedTransport::new(
        (200, &device_body(600, 5)),
        &[(400, SLOW_DOWN), (400, SLOW_DOWN), (400, PENDING), (200, SUCCESS)],
    );
    let (client, _, _) = client_for(transport.clone());

    let start = Instant::now();
    client.authorize().await.expect("flow succeeds");

    assert_eq!(transport.token_request_times(start), vec![0, 10, 25, 40]);
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_polling() {
    let transport = ScriptedTransport::new((200, &device_body(7, 5)), &[]);
    let (client, device_calls, _) = client_for(transport.clone());

    let start = Instant::now();
    let err = client.authorize().await.unwrap_err();

    assert!(matches!(err, FlowError::Timeout));
    // Polls at 0s and 5s fit inside the 7s window; nothing after it.
    assert_eq!(transport.token_request_times(start), vec![0, 5]);
    assert_eq!(device_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn denial_ends_the_flow_immediately() {
    let transport = ScriptedTransport::new(
        (200, &device_body(600, 5)),
        &[(403, r#"{"error":"authorization_denied"}"#)],
    );
    let (client, _, authorization) = client_for(transport.clone());

    let start = Instant::now();
    let err = client.authorize().await.unwrap_err();

    assert!(matches!(err, FlowError::Denied));
    assert_eq!(transport.token_request_times(start), vec![0]);
    assert!(authorization.lock().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn expired_device_code_is_terminal() {
    let transport = ScriptedTransport::new(
        (200, &device_body(600, 5)),
        &[(400, r#"{"error":"expired_token"}"#)],
    );
    let (client, _, _) = client_for(transport.clone());

    let err = client.authorize().await.unwrap_err();
    assert!(matches!(err, FlowError::Expired));
}

#[tokio::test(start_paused = true)]
async fn unknown_error_surfaces_with_status() {
    let transport = ScriptedTransport::new(
        (200, &device_body(600, 5)),
        &[(500, r#"{"error":"server_error","error_description":"boom"}"#)],
    );
    let (client, _, _) = client_for(transport.clone());

    match client.authorize().await.unwrap_err() {
        FlowError::Response {
            error,
            description,
            status,
        } => {
            assert_eq!(error, "server_error");
            assert_eq!(description, "boom");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn device_endpoint_failure_aborts_before_any_poll() {
    let transport = ScriptedTransport::new((502, "Bad Gateway"), &[]);
    let (client, device_calls, _) = client_for(transport.clone());

    let err = client.authorize().await.unwrap_err();
    assert!(matches!(err, FlowError::Transport { status: 502, .. }));
    assert_eq!(device_calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_sleep() {
    let transport = ScriptedTransport::new((200, &device_body(600, 5)), &[]);
    let coordinator = CancelCoordinator::new();

    let client = DeviceAuthClient::builder()
        .scope("openid")
        .transport(transport.clone())
        .cancel_signal(coordinator.signal())
        .on_device_code(|_| {})
        .on_token(|_, _, _| panic!("cancelled flow must not yield a token"))
        .build()
        .expect("build client");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        coordinator.cancel();
    });

    let start = Instant::now();
    let err = client.authorize().await.unwrap_err();

    assert!(matches!(err, FlowError::Cancelled));
    assert_eq!(start.elapsed(), Duration::from_secs(12));
    // Polls at 0s, 5s and 10s happened; the sleep toward 15s was cut short.
    assert_eq!(transport.token_request_times(start), vec![0, 5, 10]);
}

#[tokio::test(start_paused = true)]
async fn missing_token_handler_fails_before_any_request() {
    let transport = ScriptedTransport::new((200, &device_body(600, 5)), &[]);
    let client = DeviceAuthClient::builder()
        .scope("openid")
        .transport(transport.clone())
        .on_device_code(|_| {})
        .build()
        .expect("build client");

    let err = client.authorize().await.unwrap_err();
    assert!(matches!(err, FlowError::Config(_)));
    assert_eq!(transport.request_count(), 0);
}
