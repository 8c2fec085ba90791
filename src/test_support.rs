//! In-process mock of the upstream storage API for tests.
//!
//! Binds to `127.0.0.1:0`, counts calls per endpoint and remembers uploaded
//! files so that listing and metadata calls can see them. Failure switches on
//! `MockState` make individual endpoints answer with a non-200 code.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::{post, put},
};
use percent_encoding::percent_decode_str;
use serde_json::{Value, json};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::net::TcpListener;

pub const MOCK_TOKEN: &str = "mock-token";
pub const MOCK_PASSWORD: &str = "password";
pub const LIST_SIGN: &str = "list-sign";
pub const GET_SIGN: &str = "get-sign";

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub raw_header: String,
    pub path: String,
    pub size: usize,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub login_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub put_calls: AtomicUsize,

    pub fail_list: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    /// Accept uploads but leave them out of listings.
    pub hide_uploads: AtomicBool,
    /// Return a whitespace-only signature from `fs/get`.
    pub blank_sign: AtomicBool,
    /// Answer `fs/list` with `content: null`.
    pub null_listing: AtomicBool,
    /// Answer `fs/list` with HTTP 200 and a body that is not JSON.
    pub garbled_list: AtomicBool,

    uploads: Mutex<Vec<RecordedUpload>>,
    fs_requests: Mutex<Vec<Value>>,
    last_authorization: Mutex<Option<String>>,
}

impl MockState {
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn fs_requests(&self) -> Vec<Value> {
        self.fs_requests.lock().unwrap().clone()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }

    pub fn confirmation_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst) + self.get_calls.load(Ordering::SeqCst)
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *self.last_authorization.lock().unwrap() = value;
    }
}

pub struct MockAlist {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockAlist {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/fs/list", post(list))
            .route("/api/fs/get", post(get))
            .route("/api/fs/put", put(upload))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            state,
        }
    }
}

fn failure(code: u16, message: &str) -> Json<Value> {
    Json(json!({ "code": code, "message": message, "data": null }))
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] != MOCK_PASSWORD {
        return failure(400, "password is incorrect");
    }
    Json(json!({ "code": 200, "message": "success", "data": { "token": MOCK_TOKEN } }))
}

async fn list(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    state.record_auth(&headers);
    state.fs_requests.lock().unwrap().push(body.clone());

    if state.fail_list.load(Ordering::SeqCst) {
        return failure(500, "failed to list objs").into_response();
    }
    if state.garbled_list.load(Ordering::SeqCst) {
        return "<html>maintenance</html>".into_response();
    }
    if state.null_listing.load(Ordering::SeqCst) {
        return Json(json!({
            "code": 200,
            "message": "success",
            "data": { "content": null, "total": 0 }
        }))
        .into_response();
    }

    let dir = body["path"].as_str().unwrap_or("/");
    let content: Vec<Value> = if state.hide_uploads.load(Ordering::SeqCst) {
        Vec::new()
    } else {
        state
            .uploads()
            .iter()
            .filter(|u| parent_of(&u.path) == dir)
            .map(|u| {
                json!({
                    "name": name_of(&u.path),
                    "size": u.size,
                    "is_dir": false,
                    "sign": LIST_SIGN,
                })
            })
            .collect()
    };

    Json(json!({
        "code": 200,
        "message": "success",
        "data": { "content": content, "total": content.len() }
    }))
    .into_response()
}

async fn get(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.get_calls.fetch_add(1, Ordering::SeqCst);
    state.record_auth(&headers);
    state.fs_requests.lock().unwrap().push(body.clone());

    if state.fail_get.load(Ordering::SeqCst) {
        return failure(500, "object not found");
    }

    let path = body["path"].as_str().unwrap_or_default();
    let Some(found) = state.uploads().into_iter().find(|u| u.path == path) else {
        return failure(500, "object not found");
    };
    let sign = if state.blank_sign.load(Ordering::SeqCst) {
        "   "
    } else {
        GET_SIGN
    };

    Json(json!({
        "code": 200,
        "message": "success",
        "data": {
            "name": name_of(&found.path),
            "size": found.size,
            "is_dir": false,
            "sign": sign,
            "raw_url": format!("http://mock{}", found.path),
            "provider": "Local",
        }
    }))
}

async fn upload(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    state.put_calls.fetch_add(1, Ordering::SeqCst);
    state.record_auth(&headers);

    if state.fail_put.load(Ordering::SeqCst) {
        return failure(500, "failed to put file");
    }

    let raw_header = headers
        .get("File-Path")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let path = percent_decode_str(&raw_header)
        .decode_utf8_lossy()
        .into_owned();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    state.uploads.lock().unwrap().push(RecordedUpload {
        raw_header,
        path,
        size: body.len(),
        content_type,
    });

    Json(json!({ "code": 200, "message": "success", "data": null }))
}
