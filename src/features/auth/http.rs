//! Token-aware request pipeline. Every outbound call goes through
//! [`ApiClient::send`]: the current access token is attached as a bearer
//! header, and authorization failures are classified from the response
//! envelope. An expired token triggers the shared refresh (see
//! [`crate::features::auth::refresh`]) and a single replay of the original
//! request; any other 401 clears the session and routes the user back to the
//! login entry point. Forbidden, rate-limit, and server faults surface a
//! notice and propagate unchanged.
//!
//! The concrete browser transport lives in `app_lib::api`; the pipeline only
//! sees the [`HttpTransport`] trait, which keeps this logic testable off the
//! browser.

use crate::app_lib::AppError;
use crate::features::auth::refresh::RefreshCoordinator;
use crate::features::auth::session::SessionStore;
use crate::features::auth::types::ApiEnvelope;
use futures::future::LocalBoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::rc::Rc;

/// Default request timeout (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;
/// Refresh timeout (milliseconds). Shorter than the default: a hung refresh
/// would stall every request queued behind it.
pub const REFRESH_TIMEOUT_MS: u32 = 5_000;
/// Maximum number of error body characters surfaced to the UI.
const MAX_ERROR_CHARS: usize = 200;

/// Envelope `code` marking a 401 as recoverable by refresh.
pub const TOKEN_EXPIRED_CODE: &str = "TOKEN_EXPIRED";

pub const ACCESS_DENIED_NOTICE: &str =
    "Access denied. You do not have permission to perform this action.";
pub const RATE_LIMIT_NOTICE: &str = "Too many requests. Please wait before trying again.";
pub const SERVER_FAULT_NOTICE: &str = "Server error. Please try again later.";
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please log in again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One outbound API call. `bearer` is filled in by the pipeline from the
/// session store immediately before dispatch.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    pub timeout_ms: u32,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Raw response as seen by the pipeline: status plus unparsed body text.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the standard response envelope.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<ApiEnvelope<T>, AppError> {
        serde_json::from_str(&self.body)
            .map_err(|err| AppError::Parse(format!("Failed to decode response: {err}")))
    }

    fn error_body(&self) -> ErrorBody {
        serde_json::from_str(&self.body).unwrap_or_default()
    }

    /// Converts a failure response into an [`AppError::Http`], preferring the
    /// envelope message over the raw body.
    pub fn into_error(self) -> AppError {
        let parsed = self.error_body();
        let message = parsed
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| sanitize_body(&self.body));
        AppError::Http {
            status: self.status,
            message,
            code: parsed.code,
        }
    }
}

/// Minimal view of a failure body; full envelope parsing is not needed to
/// classify a response.
#[derive(Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Failure classes the pipeline reacts to, per the error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    /// 401 carrying the expired-token code: recoverable via refresh.
    ExpiredToken,
    /// Any other 401: the credential is invalid or revoked.
    Unauthorized,
    /// 403: authorized but forbidden. Not a session error.
    Forbidden,
    /// 429.
    RateLimited,
    /// 5xx.
    ServerFault,
    /// Anything else (validation errors and the like); handled by callers.
    Other,
}

pub fn classify(response: &ApiResponse) -> Failure {
    match response.status {
        401 => {
            if response.error_body().code.as_deref() == Some(TOKEN_EXPIRED_CODE) {
                Failure::ExpiredToken
            } else {
                Failure::Unauthorized
            }
        }
        403 => Failure::Forbidden,
        429 => Failure::RateLimited,
        status if status >= 500 => Failure::ServerFault,
        _ => Failure::Other,
    }
}

/// Sanitizes HTTP error bodies for user-facing messages by trimming and truncating.
pub fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

/// Transport seam between the pipeline and the network. The browser
/// implementation wraps `fetch`; tests script responses.
pub trait HttpTransport {
    fn execute(&self, request: ApiRequest) -> LocalBoxFuture<'static, Result<ApiResponse, AppError>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Warning,
}

/// Passive, user-visible notification.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Side-effect sink for the pipeline: passive notices and the redirect to the
/// login entry point. The browser implementation lives in `state`; tests use
/// a recording sink.
pub trait AuthEvents {
    fn notify(&self, kind: NoticeKind, message: &str);
    fn redirect_to_login(&self);
}

/// Request pipeline over a transport, the session store, and an event sink.
#[derive(Clone)]
pub struct ApiClient<T: HttpTransport + Clone + 'static> {
    transport: T,
    store: SessionStore,
    events: Rc<dyn AuthEvents>,
    refresh: RefreshCoordinator,
}

impl<T: HttpTransport + Clone + 'static> ApiClient<T> {
    pub fn new(transport: T, store: SessionStore, events: Rc<dyn AuthEvents>) -> Self {
        Self {
            transport,
            store,
            events,
            refresh: RefreshCoordinator::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Obtains a fresh access token through the shared coordinator. Concurrent
    /// callers join the same in-flight refresh.
    pub async fn refresh(&self) -> Result<String, AppError> {
        self.refresh
            .run(
                self.transport.clone(),
                self.store.clone(),
                Rc::clone(&self.events),
            )
            .await
    }

    /// Sends a request with the current bearer token attached. On an expired
    /// token the request is replayed exactly once after a refresh; every other
    /// failure path propagates after its side effect (session clear, notice,
    /// redirect) has fired.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, AppError> {
        let mut request = request;
        request.bearer = self.store.access_token();

        let mut response = self.transport.execute(request.clone()).await?;
        if response.is_success() {
            return Ok(response);
        }

        if classify(&response) == Failure::ExpiredToken {
            let token = self.refresh().await?;
            request.bearer = Some(token);
            response = self.transport.execute(request).await?;
            if response.is_success() {
                return Ok(response);
            }
            // Already retried once; fall through without another refresh.
        }

        match classify(&response) {
            Failure::ExpiredToken => {}
            Failure::Unauthorized => {
                self.store.clear();
                self.events.redirect_to_login();
            }
            Failure::Forbidden => self.events.notify(NoticeKind::Error, ACCESS_DENIED_NOTICE),
            Failure::RateLimited => self.events.notify(NoticeKind::Warning, RATE_LIMIT_NOTICE),
            Failure::ServerFault => self.events.notify(NoticeKind::Error, SERVER_FAULT_NOTICE),
            Failure::Other => {}
        }

        Err(response.into_error())
    }

    /// Sends a request and parses the response envelope.
    pub async fn request<D: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<ApiEnvelope<D>, AppError> {
        let response = self.send(request).await?;
        response.parse()
    }

    pub async fn get<D: DeserializeOwned>(&self, path: &str) -> Result<ApiEnvelope<D>, AppError> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post<B: serde::Serialize, D: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope<D>, AppError> {
        let body = encode_body(body)?;
        self.request(ApiRequest::post(path).with_body(body)).await
    }

    pub async fn post_empty<D: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiEnvelope<D>, AppError> {
        self.request(ApiRequest::post(path)).await
    }

    pub async fn patch<B: serde::Serialize, D: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope<D>, AppError> {
        let body = encode_body(body)?;
        self.request(ApiRequest::patch(path).with_body(body)).await
    }

    pub async fn delete<D: DeserializeOwned>(&self, path: &str) -> Result<ApiEnvelope<D>, AppError> {
        self.request(ApiRequest::delete(path)).await
    }
}

fn encode_body<B: serde::Serialize>(body: &B) -> Result<Value, AppError> {
    serde_json::to_value(body)
        .map_err(|err| AppError::Serialization(format!("Failed to encode request: {err}")))
}
