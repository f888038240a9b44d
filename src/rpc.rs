use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use reqwest::{
    blocking::{Client, Response},
    header::CONTENT_TYPE,
    StatusCode, Url,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    config::{ClientOptions, ServerCredentials},
    model::{AddKind, AddResult, ConnectionReport},
    reference::TorrentReference,
};

pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const AUTH_FAILED: &str = "authentication failed; check the username and password";
const UNKNOWN_RESPONSE: &str = "unknown response";

#[derive(Debug, Error)]
pub enum TransmissionError {
    #[error("invalid server url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("rpc method name must not be empty")]
    InvalidMethod,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("session negotiation failed")]
    Session,
    #[error("daemon rejected the renewed session id")]
    SessionRejected,
    #[error("http error {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl TransmissionError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            TransmissionError::HttpStatus { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

pub type RpcResult<T> = std::result::Result<T, TransmissionError>;

/// Blocking client for the daemon's JSON RPC endpoint. Operations that reset
/// the session id may target a different server each time.
#[derive(Debug)]
pub struct TransmissionClient {
    http: Client,
    timeout: Duration,
    session_id: Mutex<Option<String>>,
}

impl TransmissionClient {
    pub fn new(options: &ClientOptions) -> RpcResult<Self> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone());
        if !options.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().map_err(TransmissionError::Network)?;
        Ok(Self {
            http,
            timeout: options.timeout,
            session_id: Mutex::new(None),
        })
    }

    pub fn session_id(&self) -> Option<String> {
        match self.session_id.lock() {
            Ok(guard) => (*guard).clone(),
            Err(_) => None,
        }
    }

    pub fn reset_session(&self) {
        self.store_session(None);
    }

    fn store_session(&self, value: Option<String>) {
        if let Ok(mut guard) = self.session_id.lock() {
            *guard = value;
        }
    }

    pub fn test_connection(&self, server: &ServerCredentials) -> ConnectionReport {
        self.reset_session();
        match self.call(server, "session-get", None) {
            Ok(value) => {
                let version = value
                    .get("version")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                info!(
                    "connected to {} (version {})",
                    server.url,
                    version.as_deref().unwrap_or("unknown")
                );
                ConnectionReport::connected(version)
            }
            Err(err) if err.is_auth_failure() => {
                warn!("connection test against {} failed: {err}", server.url);
                ConnectionReport::failed(AUTH_FAILED)
            }
            Err(err) => {
                warn!("connection test against {} failed: {err}", server.url);
                ConnectionReport::failed(err.to_string())
            }
        }
    }

    /// `.torrent` links are not uploaded; the caller gets the web UI upload
    /// address instead.
    pub fn add_torrent(
        &self,
        server: &ServerCredentials,
        reference: &TorrentReference,
    ) -> AddResult {
        match reference {
            TorrentReference::TorrentFile { url } => {
                let upload_url = web_upload_url(&server.url, url);
                info!("redirecting {url} to {upload_url}");
                AddResult::redirect(upload_url)
            }
            TorrentReference::Magnet { magnet_link, .. }
            | TorrentReference::Hash { magnet_link, .. } => self.add_magnet(server, magnet_link),
        }
    }

    fn add_magnet(&self, server: &ServerCredentials, magnet: &str) -> AddResult {
        self.reset_session();
        let args = json!({
            "filename": magnet,
        });
        let value = match self.call(server, "torrent-add", Some(args)) {
            Ok(value) => value,
            Err(err) => {
                warn!("torrent-add failed: {err}");
                return AddResult::failed(err.to_string());
            }
        };
        let result = add_result_from(&value);
        if result.success {
            info!("{}", result.summary());
        } else {
            warn!("torrent-add returned neither torrent-added nor torrent-duplicate");
        }
        result
    }

    /// The configured timeout bounds the whole exchange, retry included.
    pub fn call(
        &self,
        server: &ServerCredentials,
        method: &str,
        arguments: Option<Value>,
    ) -> RpcResult<Value> {
        if method.trim().is_empty() {
            return Err(TransmissionError::InvalidMethod);
        }
        let endpoint = rpc_endpoint(&server.url);
        validate_endpoint(&endpoint)?;

        let payload = RpcRequest { method, arguments };
        let deadline = Instant::now() + self.timeout;
        let mut renewed = false;
        loop {
            let response = self.send(&endpoint, server, &payload, deadline)?;
            let status = response.status();
            debug!("{method} {endpoint} -> {status}");
            if status != StatusCode::CONFLICT {
                return self.decode(response);
            }
            if renewed {
                warn!("{endpoint} answered 409 to a renewed session id");
                return Err(TransmissionError::SessionRejected);
            }
            let id = response
                .headers()
                .get(SESSION_HEADER)
                .ok_or(TransmissionError::Session)?
                .to_str()
                .map_err(|_| TransmissionError::Session)?
                .to_string();
            debug!("renewed session id");
            self.store_session(Some(id));
            renewed = true;
        }
    }

    fn send(
        &self,
        endpoint: &str,
        server: &ServerCredentials,
        payload: &RpcRequest<'_>,
        deadline: Instant,
    ) -> RpcResult<Response> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransmissionError::Timeout(self.timeout));
        }
        let mut request = self
            .http
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .timeout(remaining);
        if server.has_credentials() {
            request = request.basic_auth(&server.username, Some(&server.password));
        }
        if let Some(session) = self.session_id() {
            request = request.header(SESSION_HEADER, session);
        }
        request.send().map_err(|err| self.transport_error(err))
    }

    fn decode(&self, response: Response) -> RpcResult<Value> {
        let status = response.status();
        let body = response.text().map_err(|err| self.transport_error(err))?;
        if !status.is_success() {
            return Err(TransmissionError::HttpStatus { status, body });
        }
        let decoded: RpcResponse = serde_json::from_str(&body)?;
        decoded.into_value()
    }

    fn transport_error(&self, err: reqwest::Error) -> TransmissionError {
        if err.is_timeout() {
            TransmissionError::Timeout(self.timeout)
        } else {
            TransmissionError::Network(err)
        }
    }
}

pub fn rpc_endpoint(server_url: &str) -> String {
    if server_url.contains("/rpc") {
        return server_url.to_string();
    }
    let mut endpoint = server_url.to_string();
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    endpoint.push_str("rpc");
    endpoint
}

pub fn web_ui_url(server_url: &str) -> String {
    if server_url.contains("/web/#upload") {
        return server_url.to_string();
    }
    let mut url = server_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str("web/#upload");
    url
}

pub fn web_upload_url(server_url: &str, file_url: &str) -> String {
    format!(
        "{}?magnet={}",
        web_ui_url(server_url),
        urlencoding::encode(file_url)
    )
}

fn validate_endpoint(endpoint: &str) -> RpcResult<()> {
    let url = Url::parse(endpoint).map_err(|err| TransmissionError::InvalidUrl {
        url: endpoint.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TransmissionError::InvalidUrl {
            url: endpoint.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl RpcResponse {
    fn into_value(self) -> RpcResult<Value> {
        if let Some(error) = self.error {
            return Err(TransmissionError::Rpc(error_message(error)));
        }
        if let Some(Value::String(result)) = &self.result {
            if result != "success" {
                return Err(TransmissionError::Rpc(result.clone()));
            }
        }
        match (self.arguments, self.result) {
            (Some(arguments), _) => Ok(arguments),
            (None, Some(result)) if !result.is_string() => Ok(result),
            _ => Ok(Value::Null),
        }
    }
}

fn error_message(error: Value) -> String {
    match error {
        Value::String(message) => message,
        Value::Object(ref fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

const ADDED_KEYS: [&str; 3] = ["torrent-added", "torrentAdded", "torrent_added"];
const DUPLICATE_KEYS: [&str; 3] = ["torrent-duplicate", "torrentDuplicate", "torrent_duplicate"];

fn add_result_from(arguments: &Value) -> AddResult {
    if let Some(torrent) = first_of(arguments, &ADDED_KEYS) {
        accepted(AddKind::Added, torrent)
    } else if let Some(torrent) = first_of(arguments, &DUPLICATE_KEYS) {
        accepted(AddKind::Duplicate, torrent)
    } else {
        AddResult::failed(UNKNOWN_RESPONSE)
    }
}

fn accepted(kind: AddKind, torrent: &Value) -> AddResult {
    let id = torrent.get("id").and_then(|id| match id {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    });
    let hash_string = first_of(torrent, &["hashString", "hash_string"])
        .and_then(Value::as_str)
        .map(str::to_string);
    let name = torrent.get("name").and_then(Value::as_str).map(str::to_string);
    AddResult::accepted(kind, id, hash_string, name)
}

fn first_of<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .find_map(|key| value.get(*key))
        .filter(|found| !found.is_null())
}
