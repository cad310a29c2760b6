//! Browser client for the ingresso authentication service.
//!
//! The crate is organized the way the UI consumes it: `features::auth` holds
//! the session store, the token-aware request pipeline, the refresh
//! coordinator, and the lifecycle operations; `app_lib` holds shared HTTP,
//! configuration, and error utilities. Route and form code lives downstream
//! and only talks to the exported contract (`AuthContext`, `AuthClient`, and
//! the guard components).
//!
//! Everything that touches the browser (fetch, local storage, `window`
//! navigation) is `wasm32`-gated behind small traits, so the session and
//! token logic compiles and tests on native targets.

#[cfg(target_arch = "wasm32")]
pub mod app;
#[path = "lib/mod.rs"]
pub mod app_lib;
pub mod features;
