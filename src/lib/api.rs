//! Browser transport for the request pipeline, built on `fetch` via
//! `gloo-net` with consistent timeouts and error mapping. Requests always
//! include credentials so the `HttpOnly` refresh cookie travels with them.
//! The transport attaches whatever bearer token the pipeline hands it; it
//! never reads or stores tokens itself.

use crate::app_lib::config::AppConfig;
use crate::app_lib::errors::AppError;
use crate::features::auth::http::{ApiRequest, ApiResponse, HttpMethod, HttpTransport};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use gloo_net::http::{Request, RequestBuilder};
use gloo_timers::callback::Timeout;
use web_sys::{AbortController, RequestCredentials};

/// [`HttpTransport`] implementation over the browser's fetch API.
#[derive(Clone)]
pub struct GlooTransport {
    base_url: String,
}

impl GlooTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Transport pointed at the configured API base URL.
    pub fn from_config() -> Self {
        Self::new(AppConfig::load().api_base_url)
    }
}

impl HttpTransport for GlooTransport {
    fn execute(&self, request: ApiRequest) -> LocalBoxFuture<'static, Result<ApiResponse, AppError>> {
        let url = build_url(&self.base_url, &request.path);
        async move { send(url, request).await }.boxed_local()
    }
}

/// Sends a request with an abort timeout to avoid hanging UI state.
async fn send(url: String, request: ApiRequest) -> Result<ApiResponse, AppError> {
    let controller = AbortController::new()
        .map_err(|_| AppError::Config("Failed to initialize request timeout.".to_string()))?;
    let signal = controller.signal();
    let timeout_controller = controller.clone();
    let _timeout = Timeout::new(request.timeout_ms, move || timeout_controller.abort());

    let mut builder = builder_for(request.method, &url)
        .credentials(RequestCredentials::Include)
        .abort_signal(Some(&signal));

    if let Some(token) = &request.bearer {
        builder = builder.header("Authorization", &format!("Bearer {token}"));
    }

    let built = match request.body {
        Some(body) => {
            let payload = serde_json::to_string(&body).map_err(|err| {
                AppError::Serialization(format!("Failed to encode request: {err}"))
            })?;
            builder.header("Content-Type", "application/json").body(payload)
        }
        None => builder.build(),
    }
    .map_err(|err| AppError::Serialization(format!("Failed to build request: {err}")))?;

    let response = built.send().await.map_err(map_request_error)?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Ok(ApiResponse { status, body })
}

fn builder_for(method: HttpMethod, url: &str) -> RequestBuilder {
    match method {
        HttpMethod::Get => Request::get(url),
        HttpMethod::Post => Request::post(url),
        HttpMethod::Patch => Request::patch(url),
        HttpMethod::Delete => Request::delete(url),
    }
}

/// Builds a URL from the configured base URL and the provided path.
fn build_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Maps network errors into user-facing `AppError` variants with timeout detection.
fn map_request_error(err: gloo_net::Error) -> AppError {
    let message = err.to_string();
    let lowered = message.to_lowercase();

    if lowered.contains("timeout") || lowered.contains("abort") {
        AppError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        AppError::Network(format!("Unable to reach the server: {message}"))
    }
}
