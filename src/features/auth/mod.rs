//! Auth feature module covering the session store, the token-aware request
//! pipeline, refresh coordination, and the lifecycle operations (login,
//! registration, verification, password and profile management). It keeps
//! authentication logic out of the UI and must stay aligned with backend
//! protocol expectations. This module handles access tokens and must avoid
//! logging token material.
//!
//! Flow Overview: login and registration store `{user, accessToken}` and
//! persist the snapshot for reloads. Every request reads the store and
//! attaches the token as a bearer header. A response reporting an expired
//! token triggers a single shared refresh; the original request is replayed
//! once with the new token. Refresh failure or a non-refreshable 401 clears
//! the session and sends the user back to the login route.

pub mod client;
pub mod guards;
pub mod http;
pub mod refresh;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;
