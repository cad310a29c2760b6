//! Lifecycle operations over the request pipeline: login, registration,
//! logout, verification, password and profile management, and the startup
//! status check. Each operation converts transport and HTTP failures into a
//! structured [`AuthOutcome`] so nothing propagates into the UI as an uncaught
//! fault, and each follows the session policy for its endpoint: login and
//! registration store the returned user and token, logout is always locally
//! honored, a successful password change forces re-login, and an
//! indeterminate status check is treated as logged out.

use crate::app_lib::AppError;
use crate::features::auth::http::{ApiClient, AuthEvents, HttpTransport};
use crate::features::auth::session::SessionStore;
use crate::features::auth::types::{
    AuthOutcome, AuthPayload, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    RegisterRequest, ResendVerificationRequest, ResetPasswordRequest, SessionInfo, StatusPayload,
    UpdateProfileRequest, User,
};
use serde_json::Value;
use std::rc::Rc;

const REGISTER_FALLBACK: &str = "Registration failed";
const LOGIN_FALLBACK: &str = "Login failed";
const LOGOUT_MESSAGE: &str = "Logged out.";
const REFRESH_FALLBACK: &str = "Session could not be renewed";
const VERIFY_FALLBACK: &str = "Email verification failed";
const RESEND_FALLBACK: &str = "Failed to resend verification";
const FORGOT_FALLBACK: &str = "Failed to send reset email";
const RESET_FALLBACK: &str = "Password reset failed";
const CHANGE_PASSWORD_FALLBACK: &str = "Password change failed";
const PROFILE_FALLBACK: &str = "Failed to load profile";
const UPDATE_PROFILE_FALLBACK: &str = "Profile update failed";
const REVOKE_FALLBACK: &str = "Failed to revoke session";

/// Clears the loading flag on every exit path, including early returns and
/// error paths.
struct LoadingGuard {
    store: SessionStore,
}

impl LoadingGuard {
    fn begin(store: &SessionStore) -> Self {
        store.set_loading(true);
        Self {
            store: store.clone(),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.store.set_loading(false);
    }
}

/// The session lifecycle API handed to routes and forms.
#[derive(Clone)]
pub struct AuthClient<T: HttpTransport + Clone + 'static> {
    api: ApiClient<T>,
}

impl<T: HttpTransport + Clone + 'static> AuthClient<T> {
    pub fn new(transport: T, store: SessionStore, events: Rc<dyn AuthEvents>) -> Self {
        Self {
            api: ApiClient::new(transport, store, events),
        }
    }

    pub fn store(&self) -> &SessionStore {
        self.api.store()
    }

    /// Registers a new account and signs it in.
    pub async fn register(&self, request: &RegisterRequest) -> AuthOutcome {
        if request.email.trim().is_empty() || request.password.trim().is_empty() {
            return AuthOutcome::failed("Email and password are required.");
        }

        let _loading = LoadingGuard::begin(self.store());
        match self.api.post::<_, AuthPayload>("/auth/register", request).await {
            Ok(envelope) => match envelope.data.filter(|_| envelope.success) {
                Some(payload) => {
                    self.store()
                        .sign_in(payload.user.clone(), payload.access_token);
                    AuthOutcome::ok_with_user(
                        envelope.message.unwrap_or_else(|| "Registered.".to_string()),
                        payload.user,
                    )
                }
                None => AuthOutcome::failed(
                    envelope
                        .message
                        .unwrap_or_else(|| REGISTER_FALLBACK.to_string()),
                ),
            },
            Err(err) => AuthOutcome::failed(err.user_message(REGISTER_FALLBACK)),
        }
    }

    /// Authenticates and stores the returned user and access token.
    pub async fn login(&self, request: &LoginRequest) -> AuthOutcome {
        if request.email.trim().is_empty() || request.password.trim().is_empty() {
            return AuthOutcome::failed("Email and password are required.");
        }

        let _loading = LoadingGuard::begin(self.store());
        match self.api.post::<_, AuthPayload>("/auth/login", request).await {
            Ok(envelope) => match envelope.data.filter(|_| envelope.success) {
                Some(payload) => {
                    self.store()
                        .sign_in(payload.user.clone(), payload.access_token);
                    AuthOutcome::ok_with_user(
                        envelope.message.unwrap_or_else(|| "Logged in.".to_string()),
                        payload.user,
                    )
                }
                None => AuthOutcome::failed(
                    envelope.message.unwrap_or_else(|| LOGIN_FALLBACK.to_string()),
                ),
            },
            Err(err) => AuthOutcome::failed(err.user_message(LOGIN_FALLBACK)),
        }
    }

    /// Ends the session. The local session is cleared whether or not the
    /// remote call succeeds; logout is always locally honored.
    pub async fn logout(&self) -> AuthOutcome {
        let result = self.api.post_empty::<Value>("/auth/logout").await;
        self.store().clear();
        match result {
            Ok(envelope) => {
                AuthOutcome::ok(envelope.message.unwrap_or_else(|| LOGOUT_MESSAGE.to_string()))
            }
            Err(_) => AuthOutcome::ok(LOGOUT_MESSAGE),
        }
    }

    /// Ends every session for this account. Same local semantics as
    /// [`AuthClient::logout`].
    pub async fn logout_all(&self) -> AuthOutcome {
        let result = self.api.post_empty::<Value>("/auth/logout-all").await;
        self.store().clear();
        match result {
            Ok(envelope) => {
                AuthOutcome::ok(envelope.message.unwrap_or_else(|| LOGOUT_MESSAGE.to_string()))
            }
            Err(_) => AuthOutcome::ok(LOGOUT_MESSAGE),
        }
    }

    /// Exchanges the refresh cookie for a new access token through the shared
    /// coordinator. Only the token changes on success; failure clears the
    /// whole session (the coordinator handles that).
    pub async fn refresh_token(&self) -> AuthOutcome {
        match self.api.refresh().await {
            Ok(_) => AuthOutcome::ok("Session renewed."),
            Err(err) => AuthOutcome::failed(err.user_message(REFRESH_FALLBACK)),
        }
    }

    /// Confirms the email address from a verification link. On success the
    /// stored user record is replaced with the flag set; the server remains
    /// the source of truth on the next status check.
    pub async fn verify_email(&self, token: &str) -> AuthOutcome {
        if token.trim().is_empty() {
            return AuthOutcome::failed("Verification token is required.");
        }

        let path = format!("/auth/verify-email?token={token}");
        match self.api.get::<Value>(&path).await {
            Ok(envelope) if envelope.success => {
                if let Some(user) = self.store().get().user {
                    self.store().set_user(Some(User {
                        is_email_verified: true,
                        ..user
                    }));
                }
                AuthOutcome::ok(envelope.message.unwrap_or_else(|| "Email verified.".to_string()))
            }
            Ok(envelope) => AuthOutcome::failed(
                envelope.message.unwrap_or_else(|| VERIFY_FALLBACK.to_string()),
            ),
            Err(err) => AuthOutcome::failed(err.user_message(VERIFY_FALLBACK)),
        }
    }

    pub async fn resend_verification(&self, email: &str) -> AuthOutcome {
        if email.trim().is_empty() {
            return AuthOutcome::failed("Email is required.");
        }

        let request = ResendVerificationRequest {
            email: email.to_string(),
        };
        self.outcome_only("/auth/resend-verification", &request, RESEND_FALLBACK)
            .await
    }

    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> AuthOutcome {
        if request.email.trim().is_empty() {
            return AuthOutcome::failed("Email is required.");
        }

        self.outcome_only("/auth/forgot-password", request, FORGOT_FALLBACK)
            .await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> AuthOutcome {
        if request.token.trim().is_empty() || request.new_password.trim().is_empty() {
            return AuthOutcome::failed("Reset token and new password are required.");
        }

        self.outcome_only("/auth/reset-password", request, RESET_FALLBACK)
            .await
    }

    /// Changes the password. Success clears the session to force a re-login
    /// with the new credential.
    pub async fn change_password(&self, request: &ChangePasswordRequest) -> AuthOutcome {
        if request.current_password.trim().is_empty() || request.new_password.trim().is_empty() {
            return AuthOutcome::failed("Current and new passwords are required.");
        }

        match self.api.post::<_, Value>("/auth/change-password", request).await {
            Ok(envelope) if envelope.success => {
                self.store().clear();
                AuthOutcome::ok(
                    envelope
                        .message
                        .unwrap_or_else(|| "Password changed. Please log in again.".to_string()),
                )
            }
            Ok(envelope) => AuthOutcome::failed(
                envelope
                    .message
                    .unwrap_or_else(|| CHANGE_PASSWORD_FALLBACK.to_string()),
            ),
            Err(err) => AuthOutcome::failed(err.user_message(CHANGE_PASSWORD_FALLBACK)),
        }
    }

    /// Fetches the profile and replaces the stored user record.
    pub async fn get_profile(&self) -> AuthOutcome {
        match self.api.get::<User>("/auth/profile").await {
            Ok(envelope) => match envelope.data.filter(|_| envelope.success) {
                Some(user) => {
                    self.store().set_user(Some(user.clone()));
                    AuthOutcome::ok_with_user(
                        envelope.message.unwrap_or_else(|| "Profile loaded.".to_string()),
                        user,
                    )
                }
                None => AuthOutcome::failed(
                    envelope.message.unwrap_or_else(|| PROFILE_FALLBACK.to_string()),
                ),
            },
            Err(err) => AuthOutcome::failed(err.user_message(PROFILE_FALLBACK)),
        }
    }

    /// Updates profile fields; the server response replaces the stored user
    /// record wholesale.
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> AuthOutcome {
        match self.api.patch::<_, User>("/auth/profile", request).await {
            Ok(envelope) => match envelope.data.filter(|_| envelope.success) {
                Some(user) => {
                    self.store().set_user(Some(user.clone()));
                    AuthOutcome::ok_with_user(
                        envelope.message.unwrap_or_else(|| "Profile updated.".to_string()),
                        user,
                    )
                }
                None => AuthOutcome::failed(
                    envelope
                        .message
                        .unwrap_or_else(|| UPDATE_PROFILE_FALLBACK.to_string()),
                ),
            },
            Err(err) => AuthOutcome::failed(err.user_message(UPDATE_PROFILE_FALLBACK)),
        }
    }

    /// Lists the account's server-side sessions.
    pub async fn sessions(&self) -> Result<Vec<SessionInfo>, AppError> {
        let envelope = self.api.get::<Vec<SessionInfo>>("/auth/sessions").await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Revokes one server-side session by id.
    pub async fn revoke_session(&self, id: &str) -> AuthOutcome {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return AuthOutcome::failed("Session id is required.");
        }

        match self.api.delete::<Value>(&format!("/auth/sessions/{trimmed}")).await {
            Ok(envelope) if envelope.success => AuthOutcome::ok(
                envelope.message.unwrap_or_else(|| "Session revoked.".to_string()),
            ),
            Ok(envelope) => AuthOutcome::failed(
                envelope.message.unwrap_or_else(|| REVOKE_FALLBACK.to_string()),
            ),
            Err(err) => AuthOutcome::failed(err.user_message(REVOKE_FALLBACK)),
        }
    }

    /// Startup/rehydration status check against server truth. Anything
    /// indeterminate is treated as logged out.
    pub async fn check_auth_status(&self) {
        let _loading = LoadingGuard::begin(self.store());
        match self.api.get::<StatusPayload>("/auth/status").await {
            Ok(envelope) => match envelope.data.filter(|_| envelope.success) {
                Some(status) if status.is_authenticated && status.user.is_some() => {
                    self.store().set_user(status.user);
                }
                _ => self.store().clear(),
            },
            Err(_) => self.store().clear(),
        }
    }

    /// POSTs a request whose only interesting result is the outcome message;
    /// no session mutation on either path.
    async fn outcome_only<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> AuthOutcome {
        match self.api.post::<_, Value>(path, body).await {
            Ok(envelope) => {
                let message = envelope.message.unwrap_or_else(|| fallback.to_string());
                if envelope.success {
                    AuthOutcome::ok(message)
                } else {
                    AuthOutcome::failed(message)
                }
            }
            Err(err) => AuthOutcome::failed(err.user_message(fallback)),
        }
    }
}
