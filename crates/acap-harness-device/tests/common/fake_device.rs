// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fake device for integration tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1 that answers the VAPIX endpoints the harness uses:
//! - `POST /axis-cgi/systemready.cgi`
//! - `POST /axis-cgi/basicdeviceinfo.cgi`
//! - `POST /axis-cgi/applications/list.cgi`
//! - `POST /axis-cgi/applications/upload.cgi`
//! - `POST /axis-cgi/applications/control.cgi?action=..&package=..`
//! - `POST /axis-cgi/firmwaremanagement.cgi`
//! - `GET  /axis-cgi/admin/systemlog.cgi?appname=..`
//!
//! Every request must carry credentials for `root` / `pass`. Digest
//! responses are recomputed from the request method and URI, the fake's
//! nonce and the password, so a wrongly built answer is rejected.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use md5::{Digest, Md5};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Account the fake device accepts
pub const USER: &str = "root";
/// Password the fake device accepts
pub const PASSWORD: &str = "pass";
/// `Basic` credentials for `root:pass`
const BASIC_TOKEN: &str = "Basic cm9vdDpwYXNz";
/// Realm named in authentication challenges
const REALM: &str = "AXIS_B8A44F000000";
/// Nonce handed out in every digest challenge
const NONCE: &str = "0004a3b2Y2RkNzFkOWM=";

/// Authentication the fake device requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeAuth {
    Basic,
    Digest,
}

/// Mutable device state, inspectable from tests
#[derive(Debug, Default)]
pub struct DeviceState {
    /// Requests seen, as `METHOD path?query`
    pub requests: Vec<String>,
    /// Requests rejected for missing or wrong credentials
    pub rejected: usize,
    /// Number of systemready calls to answer "no" before answering "yes"
    pub not_ready_polls: u32,
    /// Answer systemready with HTTP 500 instead
    pub system_ready_fails: bool,
    /// Whether the application is installed
    pub installed: bool,
    /// Whether the application is running
    pub running: bool,
    /// Size of the last uploaded package body
    pub uploaded_bytes: Option<usize>,
    /// Reject uploads
    pub reject_upload: bool,
    /// Reboots requested
    pub reboots: u32,
    /// Reply to reboot with an error object
    pub reboot_error: bool,
    /// Application log, returned by systemlog.cgi
    pub log: String,
    /// Log that replaces `log` when the application is started
    pub log_on_start: Option<String>,
}

#[derive(Clone)]
struct Shared {
    auth: FakeAuth,
    app_name: String,
    state: Arc<Mutex<DeviceState>>,
}

/// Handle to the running fake device
pub struct FakeDevice {
    addr: SocketAddr,
    shared: Shared,
}

impl FakeDevice {
    /// Start the fake device on a random port. Returns once it is listening.
    pub async fn start(auth: FakeAuth, app_name: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Shared {
            auth,
            app_name: app_name.to_string(),
            state: Arc::new(Mutex::new(DeviceState::default())),
        };

        let app = Router::new()
            .route("/axis-cgi/systemready.cgi", post(system_ready))
            .route("/axis-cgi/basicdeviceinfo.cgi", post(device_info))
            .route("/axis-cgi/applications/list.cgi", post(app_list))
            .route("/axis-cgi/applications/upload.cgi", post(upload))
            .route("/axis-cgi/applications/control.cgi", post(control))
            .route("/axis-cgi/firmwaremanagement.cgi", post(firmware))
            .route("/axis-cgi/admin/systemlog.cgi", get(system_log))
            .with_state(shared.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake device server");
        });

        Ok(Self { addr, shared })
    }

    /// Base URL of the device (e.g. `http://127.0.0.1:PORT`)
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Address as a user would configure it (`127.0.0.1:PORT`)
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Lock the device state for inspection or setup
    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.shared.state.lock().expect("fake device state")
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Record the request and check its credentials
fn admit(
    shared: &Shared,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    request: String,
) -> Result<(), Response> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut state = shared.state.lock().expect("fake device state");
    state.requests.push(request);

    let accepted = match shared.auth {
        FakeAuth::Basic => authorization == BASIC_TOKEN,
        FakeAuth::Digest => digest_accepted(&authorization, method, uri),
    };
    if accepted {
        return Ok(());
    }

    state.rejected += 1;
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    let challenge = match shared.auth {
        FakeAuth::Basic => format!(r#"Basic realm="{REALM}""#),
        FakeAuth::Digest => format!(
            r#"Digest realm="{REALM}", nonce="{NONCE}", algorithm=MD5, qop="auth""#
        ),
    };
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        challenge.parse().expect("valid header"),
    );
    Err(response)
}

/// Check a `Digest` authorization header against the expected response
fn digest_accepted(authorization: &str, method: &Method, uri: &Uri) -> bool {
    let Some(fields) = digest_fields(authorization) else {
        return false;
    };
    let request_uri = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    if field(&fields, "username") != USER
        || field(&fields, "realm") != REALM
        || field(&fields, "nonce") != NONCE
        || field(&fields, "uri") != request_uri
    {
        return false;
    }

    let ha1 = md5_hex(&format!("{USER}:{REALM}:{PASSWORD}"));
    let ha2 = md5_hex(&format!("{method}:{request_uri}"));
    let expected = match field(&fields, "qop") {
        "" => md5_hex(&format!("{ha1}:{NONCE}:{ha2}")),
        qop => md5_hex(&format!(
            "{ha1}:{NONCE}:{}:{}:{qop}:{ha2}",
            field(&fields, "nc"),
            field(&fields, "cnonce")
        )),
    };
    field(&fields, "response") == expected
}

/// Split a `Digest` authorization header into its `key=value` fields
fn digest_fields(authorization: &str) -> Option<HashMap<String, String>> {
    let mut rest = authorization.strip_prefix("Digest ")?.trim();
    let mut fields = HashMap::new();
    while !rest.is_empty() {
        let (key, after) = rest.split_once('=')?;
        let (value, remainder) = match after.strip_prefix('"') {
            Some(quoted) => {
                let end = quoted.find('"')?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => after.split_at(after.find(',').unwrap_or(after.len())),
        };
        fields.insert(key.trim().to_string(), value.trim().to_string());
        rest = remainder.trim_start_matches([',', ' ']);
    }
    Some(fields)
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> &'a str {
    fields.get(name).map_or("", String::as_str)
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

fn query_string(query: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join("&")
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn system_ready(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = admit(
        &shared,
        &method,
        &uri,
        &headers,
        "POST /axis-cgi/systemready.cgi".into(),
    ) {
        return response;
    }
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if request["method"] != "systemready" {
        return (StatusCode::BAD_REQUEST, "bad method").into_response();
    }

    let mut state = shared.state.lock().expect("fake device state");
    if state.system_ready_fails {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let ready = if state.not_ready_polls > 0 {
        state.not_ready_polls -= 1;
        "no"
    } else {
        "yes"
    };
    axum::Json(json!({
        "apiVersion": "1.2",
        "method": "systemready",
        "data": { "systemready": ready, "needsetup": "no", "uptime": "1234" }
    }))
    .into_response()
}

async fn device_info(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = admit(
        &shared,
        &method,
        &uri,
        &headers,
        "POST /axis-cgi/basicdeviceinfo.cgi".into(),
    ) {
        return response;
    }
    axum::Json(json!({
        "apiVersion": "1.0",
        "data": {
            "propertyList": {
                "Architecture": "aarch64",
                "ProdNbr": "Q1656",
                "Version": "11.5.64"
            }
        }
    }))
    .into_response()
}

async fn app_list(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = admit(
        &shared,
        &method,
        &uri,
        &headers,
        "POST /axis-cgi/applications/list.cgi".into(),
    ) {
        return response;
    }
    let state = shared.state.lock().expect("fake device state");
    let mut body = String::from("<reply result=\"ok\">\n");
    if state.installed {
        let status = if state.running { "Running" } else { "Stopped" };
        body.push_str(&format!(
            " <application Name=\"{}\" NiceName=\"ACAP runtime test\" Status=\"{status}\"/>\n",
            shared.app_name
        ));
    }
    body.push_str("</reply>");
    body.into_response()
}

async fn upload(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = admit(
        &shared,
        &method,
        &uri,
        &headers,
        "POST /axis-cgi/applications/upload.cgi".into(),
    ) {
        return response;
    }
    let mut state = shared.state.lock().expect("fake device state");
    let multipart = String::from_utf8_lossy(&body);
    if state.reject_upload || !multipart.contains("name=\"file\"") {
        return (StatusCode::BAD_REQUEST, "Error: upload rejected").into_response();
    }
    state.uploaded_bytes = Some(body.len());
    state.installed = true;
    "OK".into_response()
}

async fn control(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let request = format!(
        "POST /axis-cgi/applications/control.cgi?{}",
        query_string(&query)
    );
    if let Err(response) = admit(&shared, &method, &uri, &headers, request) {
        return response;
    }
    let mut state = shared.state.lock().expect("fake device state");
    if !state.installed || query.get("package") != Some(&shared.app_name) {
        return (StatusCode::BAD_REQUEST, "Error: 6").into_response();
    }
    match query.get("action").map(String::as_str) {
        Some("start") => {
            state.running = true;
            if let Some(log) = state.log_on_start.take() {
                state.log = log;
            }
        }
        Some("stop") => state.running = false,
        Some("remove") => {
            state.running = false;
            state.installed = false;
        }
        _ => return (StatusCode::BAD_REQUEST, "Error: 4").into_response(),
    }
    "OK".into_response()
}

async fn firmware(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = admit(
        &shared,
        &method,
        &uri,
        &headers,
        "POST /axis-cgi/firmwaremanagement.cgi".into(),
    ) {
        return response;
    }
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut state = shared.state.lock().expect("fake device state");
    if state.reboot_error || request["method"] != "reboot" {
        return axum::Json(json!({
            "apiVersion": "1.4",
            "error": { "code": 100, "message": "Reboot not allowed" }
        }))
        .into_response();
    }
    state.reboots += 1;
    state.not_ready_polls = 2;
    axum::Json(json!({ "apiVersion": "1.4", "method": "reboot", "data": {} })).into_response()
}

async fn system_log(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let request = format!("GET /axis-cgi/admin/systemlog.cgi?{}", query_string(&query));
    if let Err(response) = admit(&shared, &method, &uri, &headers, request) {
        return response;
    }
    if query.get("appname") != Some(&shared.app_name) {
        return String::new().into_response();
    }
    let state = shared.state.lock().expect("fake device state");
    state.log.clone().into_response()
}
