//! Single-flight token refresh. The browser runs one logical thread, but many
//! requests can be suspended on network I/O and each discover an expired
//! token when it resumes. The coordinator is the one piece of real
//! synchronization in the client: a shared in-flight future that every
//! concurrent caller awaits, so at most one call to `/auth/refresh` is
//! outstanding system-wide.
//!
//! The shared handle lives only while the refresh is unresolved. A completed
//! result is never handed to a later caller; whoever arrives after completion
//! starts a new refresh.

use crate::app_lib::AppError;
use crate::features::auth::http::{
    ApiRequest, AuthEvents, HttpTransport, NoticeKind, REFRESH_TIMEOUT_MS, SESSION_EXPIRED_NOTICE,
};
use crate::features::auth::session::SessionStore;
use crate::features::auth::types::TokenPayload;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::rc::Rc;

type RefreshResult = Result<String, AppError>;
type PendingRefresh = Shared<LocalBoxFuture<'static, RefreshResult>>;

/// IDLE/REFRESHING state plus the shared pending result. Clones share the
/// same slot, so every pipeline handle built from one client coordinates.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    in_flight: Rc<RefCell<Option<PendingRefresh>>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtains a new access token, joining the in-flight refresh when one
    /// exists. On success the store holds the new token; on failure the store
    /// is cleared and the session-expired notice and redirect fire exactly
    /// once, no matter how many callers were waiting.
    pub async fn run<T>(
        &self,
        transport: T,
        store: SessionStore,
        events: Rc<dyn AuthEvents>,
    ) -> RefreshResult
    where
        T: HttpTransport + Clone + 'static,
    {
        if let Some(pending) = self.pending() {
            return pending.await;
        }

        let shared = refresh_call(transport, store, events).boxed_local().shared();
        *self.in_flight.borrow_mut() = Some(shared.clone());
        let result = shared.clone().await;

        // Clear only our own entry. A later caller may have seen the completed
        // stale result and already installed a newer refresh in the slot.
        let mut slot = self.in_flight.borrow_mut();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
            slot.take();
        }
        drop(slot);

        result
    }

    /// Live in-flight refresh, if any. A completed shared result still parked
    /// in the slot (the starter was dropped, or has not been woken yet)
    /// counts as absent: stale results are never reused.
    fn pending(&self) -> Option<PendingRefresh> {
        self.in_flight
            .borrow()
            .as_ref()
            .filter(|shared| shared.peek().is_none())
            .cloned()
    }
}

/// The single underlying refresh call. The renewal credential travels in an
/// `HttpOnly` cookie, not in the body, and no bearer token is attached.
async fn refresh_call<T: HttpTransport>(
    transport: T,
    store: SessionStore,
    events: Rc<dyn AuthEvents>,
) -> RefreshResult {
    let request = ApiRequest::post("/auth/refresh").with_timeout(REFRESH_TIMEOUT_MS);

    let outcome = async {
        let response = transport.execute(request).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        let envelope = response.parse::<TokenPayload>()?;
        match envelope.data {
            Some(payload) if envelope.success => Ok(payload.access_token),
            _ => Err(AppError::Parse(
                "Refresh response did not contain an access token.".to_string(),
            )),
        }
    }
    .await;

    match outcome {
        Ok(token) => {
            store.set_access_token(Some(token.clone()));
            Ok(token)
        }
        Err(err) => {
            store.clear();
            events.notify(NoticeKind::Error, SESSION_EXPIRED_NOTICE);
            events.redirect_to_login();
            Err(err)
        }
    }
}
