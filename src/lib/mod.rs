//! Shared frontend utilities for API access, configuration, and errors.
//!
//! ## Core Authentication Flows
//!
//! ### Login & Registration
//!
//! 1. **Submit:** The client POSTs credentials to `/auth/login` or
//!    `/auth/register` and receives `{user, accessToken}` in the response
//!    envelope.
//! 2. **Attach:** Every subsequent request carries the access token as an
//!    `Authorization: Bearer` header, attached by the request pipeline.
//! 3. **Renew:** When a response reports an expired token, the pipeline
//!    exchanges the `HttpOnly` refresh cookie for a new access token at
//!    `/auth/refresh` and replays the original request once.
//!
//! Centralizing these helpers keeps network behavior consistent and avoids
//! duplicated logic in routes and features. Access tokens pass through here on
//! their way into headers; callers must avoid logging them.

#[cfg(target_arch = "wasm32")]
pub mod api;
pub mod config;
pub mod errors;

/// Commit the client was built from, surfaced for support diagnostics.
pub const GIT_COMMIT_HASH: &str = env!("INGRESSO_WEB_GIT_SHA");

pub use errors::AppError;
