//! In-process stand-in for the Bot API used by tests of this crate and its dependents.

use axum::Router;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// One request received by the mock API.
#[derive(Clone, Debug, Default)]
pub struct RecordedCall {
    pub token: String,
    pub method: String,
    pub fields: HashMap<String, String>,
    /// File name and content of an uploaded document.
    pub document: Option<(String, Vec<u8>)>,
}

impl RecordedCall {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct MockFailure {
    status: StatusCode,
    description: String,
    retry_after: Option<u64>,
}

impl MockFailure {
    pub fn too_many_requests(retry_after: u64) -> Self {
        MockFailure {
            status: StatusCode::TOO_MANY_REQUESTS,
            description: format!("Too Many Requests: retry after {retry_after}"),
            retry_after: Some(retry_after),
        }
    }

    pub fn server_error() -> Self {
        MockFailure {
            status: StatusCode::BAD_GATEWAY,
            description: "Bad Gateway".into(),
            retry_after: None,
        }
    }

    pub fn bad_request(description: &str) -> Self {
        MockFailure {
            status: StatusCode::BAD_REQUEST,
            description: description.into(),
            retry_after: None,
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    failures: HashMap<String, VecDeque<MockFailure>>,
    updates: VecDeque<Value>,
}

#[derive(Clone)]
pub struct MockBotApi {
    state: Arc<Mutex<MockState>>,
    url: Url,
}

impl MockBotApi {
    /// Binds an ephemeral port and serves the mock API on it.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let api = MockBotApi {
            state: Arc::default(),
            url: Url::parse(&format!("http://{addr}")).unwrap(),
        };

        let app = Router::new()
            .route("/{token}/{method}", post(handle))
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        api
    }

    pub fn url(&self) -> Url {
        self.url.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls to `method` other than `getUpdates`.
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Makes the next call to `method` fail. Failures queue up in order.
    pub fn fail_next(&self, method: &str, failure: MockFailure) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(method.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Queues a raw update object for the next `getUpdates`.
    pub fn push_update(&self, update: Value) {
        self.state.lock().unwrap().updates.push_back(update);
    }

    fn record(&self, call: RecordedCall) -> Result<Vec<Value>, MockFailure> {
        let mut state = self.state.lock().unwrap();
        let failure = state
            .failures
            .get_mut(&call.method)
            .and_then(|queue| queue.pop_front());
        let is_poll = call.method == "getUpdates";
        state.calls.push(call);

        match failure {
            Some(failure) => Err(failure),
            None if is_poll => Ok(state.updates.drain(..).collect()),
            None => Ok(Vec::new()),
        }
    }
}

async fn handle(
    State(api): State<MockBotApi>,
    Path((token, method)): Path<(String, String)>,
    request: Request,
) -> Response {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let mut call = RecordedCall {
        token: token.trim_start_matches("bot").to_string(),
        method,
        ..Default::default()
    };

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    call.document = Some((file_name, field.bytes().await.unwrap().to_vec()));
                }
                None => {
                    call.fields.insert(name, field.text().await.unwrap());
                }
            }
        }
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&bytes) {
            for (key, value) in map {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                call.fields.insert(key, value);
            }
        }
    }

    let method = call.method.clone();
    let chat_id: i64 = call
        .field("chat_id")
        .and_then(|id| id.parse().ok())
        .unwrap_or_default();
    let text = call.field("text").map(str::to_string);

    match api.record(call) {
        Err(failure) => {
            let mut body = json!({
                "ok": false,
                "error_code": failure.status.as_u16(),
                "description": failure.description,
            });
            if let Some(retry_after) = failure.retry_after {
                body["parameters"] = json!({ "retry_after": retry_after });
            }
            (failure.status, axum::Json(body)).into_response()
        }
        Ok(updates) if method == "getUpdates" => {
            if updates.is_empty() {
                // Keep polling loops under test from spinning.
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            axum::Json(json!({ "ok": true, "result": updates })).into_response()
        }
        Ok(_) if method == "sendMessage" || method == "sendDocument" => axum::Json(json!({
            "ok": true,
            "result": {
                "message_id": 1,
                "chat": { "id": chat_id, "type": "channel" },
                "date": 0,
                "text": text,
            }
        }))
        .into_response(),
        Ok(_) => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "ok": false, "error_code": 404, "description": "Not Found" })),
        )
            .into_response(),
    }
}
