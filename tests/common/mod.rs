//! Shared test support: a scripted transport, a recording event sink, and
//! response builders for the standard envelope.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use ingresso::app_lib::AppError;
use ingresso::features::auth::http::{
    ApiRequest, ApiResponse, AuthEvents, HttpTransport, NoticeKind,
};
use ingresso::features::auth::session::SessionStore;
use ingresso::features::auth::storage::MemoryStorage;
use ingresso::features::auth::types::{Role, User};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

pub type TransportResult = Result<ApiResponse, AppError>;
type Handler = dyn Fn(ApiRequest) -> LocalBoxFuture<'static, TransportResult>;

/// Transport whose responses come from a test-provided handler. Every request
/// is recorded for later assertions.
#[derive(Clone)]
pub struct MockTransport {
    handler: Rc<Handler>,
    requests: Rc<RefCell<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(ApiRequest) -> LocalBoxFuture<'static, TransportResult> + 'static,
    ) -> Self {
        Self {
            handler: Rc::new(handler),
            requests: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.requests
            .borrow()
            .iter()
            .filter(|request| request.path == path)
            .map(|request| request.bearer.clone())
            .collect()
    }
}

impl HttpTransport for MockTransport {
    fn execute(&self, request: ApiRequest) -> LocalBoxFuture<'static, TransportResult> {
        self.requests.borrow_mut().push(request.clone());
        (self.handler)(request)
    }
}

/// Event sink that records notices and counts login redirects.
#[derive(Default)]
pub struct RecordingEvents {
    pub notices: RefCell<Vec<(NoticeKind, String)>>,
    pub redirects: Cell<usize>,
}

impl RecordingEvents {
    pub fn notice_count(&self, message: &str) -> usize {
        self.notices
            .borrow()
            .iter()
            .filter(|(_, text)| text == message)
            .count()
    }
}

impl AuthEvents for RecordingEvents {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices.borrow_mut().push((kind, message.to_string()));
    }

    fn redirect_to_login(&self) {
        self.redirects.set(self.redirects.get() + 1);
    }
}

pub fn ready(response: ApiResponse) -> LocalBoxFuture<'static, TransportResult> {
    async move { Ok(response) }.boxed_local()
}

pub fn ready_err(error: AppError) -> LocalBoxFuture<'static, TransportResult> {
    async move { Err(error) }.boxed_local()
}

pub fn json_response(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        body: body.to_string(),
    }
}

pub fn expired_response() -> ApiResponse {
    json_response(
        401,
        json!({"success": false, "message": "Token expired", "code": "TOKEN_EXPIRED"}),
    )
}

pub fn token_response(token: &str) -> ApiResponse {
    json_response(
        200,
        json!({"success": true, "data": {"accessToken": token}}),
    )
}

pub fn user_json(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "role": "USER",
        "isEmailVerified": false,
        "isActive": true,
        "createdAt": "2025-01-01T00:00:00Z",
        "updatedAt": "2025-01-01T00:00:00Z"
    })
}

pub fn auth_response(id: &str, email: &str, token: &str) -> ApiResponse {
    json_response(
        200,
        json!({
            "success": true,
            "message": "Logged in",
            "data": {"user": user_json(id, email), "accessToken": token}
        }),
    )
}

pub fn test_user(id: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        first_name: None,
        last_name: None,
        role: Role::User,
        is_email_verified: false,
        is_active: true,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
        last_login: None,
    }
}

pub fn empty_store() -> SessionStore {
    SessionStore::new(Arc::new(MemoryStorage::new()))
}

pub fn seeded_store(token: &str) -> SessionStore {
    let store = empty_store();
    store.sign_in(test_user("1", "a@b.com"), token.to_string());
    store
}
