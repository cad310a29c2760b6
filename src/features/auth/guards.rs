//! Navigation guards and the role predicate. The components are UX-only
//! gates; real access control must live on the API.

use crate::features::auth::state::use_auth;
use crate::features::auth::types::{Role, User};
use leptos::prelude::*;
use leptos_router::hooks::use_navigate;

/// Whether the current user satisfies a required-role set. Inactive accounts
/// never satisfy a requirement.
pub fn has_required_role(user: Option<&User>, required: &[Role]) -> bool {
    user.map(|user| user.is_active && required.contains(&user.role))
        .unwrap_or(false)
}

#[component]
pub fn RequireAuth(children: Children) -> impl IntoView {
    let auth = use_auth();
    let navigate = use_navigate();

    Effect::new(move |_| {
        if !auth.is_loading.get() && !auth.is_authenticated.get() {
            navigate(
                &crate::app_lib::config::AppConfig::load().login_path,
                Default::default(),
            );
        }
    });

    view! { {children()} }
}

#[component]
pub fn RequireAdmin(children: Children) -> impl IntoView {
    let auth = use_auth();
    let navigate = use_navigate();

    Effect::new(move |_| {
        if auth.is_loading.get() {
            return;
        }
        let allowed = auth
            .session
            .with(|session| has_required_role(session.user.as_ref(), &[Role::Admin]));
        if !allowed {
            navigate("/", Default::default());
        }
    });

    view! { {children()} }
}
