//! Auth session state and context for the frontend. The provider hydrates the
//! persisted session once on mount, then confirms it against `/auth/status`,
//! and exposes derived auth signals for guards and routes. The access token
//! stays inside the session store; the context only projects read-only state.

use crate::features::auth::http::{AuthEvents, Notice, NoticeKind};
use crate::features::auth::session::Session;
use leptos::prelude::*;

#[derive(Clone, Copy)]
/// Auth session context shared through Leptos.
pub struct AuthContext {
    pub session: RwSignal<Session>,
    pub is_authenticated: Signal<bool>,
    pub is_loading: Signal<bool>,
    pub notices: RwSignal<Vec<Notice>>,
}

impl AuthContext {
    /// Builds a context around the provided session signal.
    pub fn new(session: RwSignal<Session>, notices: RwSignal<Vec<Notice>>) -> Self {
        let is_authenticated = Signal::derive(move || session.get().is_authenticated);
        let is_loading = Signal::derive(move || session.get().is_loading);
        Self {
            session,
            is_authenticated,
            is_loading,
            notices,
        }
    }
}

/// Pipeline event sink for the browser: notices land in a signal the UI
/// renders, session-invalidating failures navigate to the login route.
pub struct BrowserEvents {
    notices: RwSignal<Vec<Notice>>,
}

impl BrowserEvents {
    pub fn new(notices: RwSignal<Vec<Notice>>) -> Self {
        Self { notices }
    }
}

impl AuthEvents for BrowserEvents {
    fn notify(&self, kind: NoticeKind, message: &str) {
        let notice = Notice {
            kind,
            message: message.to_string(),
        };
        self.notices.update(|notices| notices.push(notice));
    }

    fn redirect_to_login(&self) {
        redirect(&crate::app_lib::config::AppConfig::load().login_path);
    }
}

#[cfg(target_arch = "wasm32")]
fn redirect(path: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.location().set_href(path);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn redirect(_path: &str) {}

/// Lifecycle client wired to the browser transport and event sink.
#[cfg(target_arch = "wasm32")]
pub fn browser_client(
    store: &crate::features::auth::session::SessionStore,
    notices: RwSignal<Vec<Notice>>,
) -> crate::features::auth::client::AuthClient<crate::app_lib::api::GlooTransport> {
    crate::features::auth::client::AuthClient::new(
        crate::app_lib::api::GlooTransport::from_config(),
        store.clone(),
        std::rc::Rc::new(BrowserEvents::new(notices)),
    )
}

/// Provides auth context, restores the persisted session, and confirms it
/// against the server once on mount.
#[cfg(target_arch = "wasm32")]
#[component]
pub fn AuthProvider(children: Children) -> impl IntoView {
    use leptos::task::spawn_local;

    let store = crate::features::auth::session::SessionStore::browser();
    store.hydrate();

    let notices = RwSignal::new(Vec::new());
    let auth = AuthContext::new(store.signal(), notices);
    provide_context(auth);

    let client = browser_client(&store, notices);
    spawn_local(async move {
        client.check_auth_status().await;
    });

    view! { {children()} }
}

/// Returns the current auth context or a fallback empty context.
pub fn use_auth() -> AuthContext {
    use_context::<AuthContext>().unwrap_or_else(|| {
        let session = RwSignal::new(Session::default());
        AuthContext::new(session, RwSignal::new(Vec::new()))
    })
}

#[cfg(test)]
mod tests {
    use super::{AuthContext, use_auth};
    use crate::features::auth::session::SessionStore;
    use crate::features::auth::storage::MemoryStorage;
    use crate::features::auth::types::sample_user;
    use leptos::prelude::*;
    use std::sync::Arc;

    #[test]
    fn context_signals_track_the_store() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let auth = AuthContext::new(store.signal(), RwSignal::new(Vec::new()));

        assert!(!auth.is_authenticated.get_untracked());
        store.sign_in(sample_user("1", "a@b.com"), "tok1".to_string());
        assert!(auth.is_authenticated.get_untracked());

        store.set_loading(true);
        assert!(auth.is_loading.get_untracked());
        store.clear();
        assert!(!auth.is_authenticated.get_untracked());
    }

    #[test]
    fn use_auth_outside_provider_is_signed_out() {
        let auth = use_auth();
        assert!(!auth.is_authenticated.get_untracked());
        assert!(!auth.is_loading.get_untracked());
    }
}
