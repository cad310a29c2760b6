//! Application shell: auth provider, router, and a minimal status view.
//! Feature pages (login, registration, profile) mount inside the router and
//! consume the auth context; the shell itself stays free of form logic.

use crate::app_lib::GIT_COMMIT_HASH;
use crate::features::auth::state::{AuthProvider, use_auth};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    view! {
        <AuthProvider>
            <Router>
                <main>
                    <Routes fallback=|| view! { <p>"Not found."</p> }>
                        <Route path=path!("/") view=Home />
                    </Routes>
                </main>
            </Router>
        </AuthProvider>
    }
}

#[component]
fn Home() -> impl IntoView {
    let auth = use_auth();

    view! {
        <section>
            <p>
                {move || {
                    if auth.is_loading.get() {
                        "Checking session..."
                    } else if auth.is_authenticated.get() {
                        "Signed in."
                    } else {
                        "Signed out."
                    }
                }}
            </p>
            <ul>
                {move || {
                    auth.notices
                        .get()
                        .into_iter()
                        .map(|notice| view! { <li>{notice.message}</li> })
                        .collect_view()
                }}
            </ul>
            <footer>{GIT_COMMIT_HASH}</footer>
        </section>
    }
}
