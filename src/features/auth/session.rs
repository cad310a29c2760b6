//! Process-wide session state with best-effort persistence. The store is the
//! only mutable shared resource in the client: all mutations go through it,
//! every mutation replaces whole fields (no partial record edits), and the
//! persisted subset `{user, accessToken, isAuthenticated}` is written to
//! durable storage after each change so a reload restores the session.
//!
//! `is_authenticated` is derived: it is recomputed from `user` on every
//! mutation and on hydration, so the two can never drift apart. `is_loading`
//! is a transient UI flag and is never persisted.

use crate::features::auth::storage::{StorageBackend, browser_storage};
use crate::features::auth::types::User;
use leptos::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed local-storage key for the persisted snapshot. Versionless; an entry
/// that fails to parse is treated as absent.
pub const STORAGE_KEY: &str = "auth-store";

/// The client's current belief about who is logged in and with what
/// credential.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

/// Serialized subset of [`Session`] written to durable storage.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    user: Option<User>,
    access_token: Option<String>,
    is_authenticated: bool,
}

/// Cheaply cloneable handle to the single session container. The state lives
/// in a reactive signal so guards and routes observe changes without polling.
#[derive(Clone)]
pub struct SessionStore {
    state: RwSignal<Session>,
    storage: Arc<dyn StorageBackend>,
}

impl SessionStore {
    /// Creates an empty store over the given storage backend. Call
    /// [`SessionStore::hydrate`] to restore a persisted session.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            state: RwSignal::new(Session::default()),
            storage,
        }
    }

    /// Store backed by the storage available on the current target.
    pub fn browser() -> Self {
        Self::new(browser_storage())
    }

    /// Restores the persisted snapshot, if any. A missing or unparsable entry
    /// yields the empty session; hydration never fails. `is_loading` always
    /// starts false.
    pub fn hydrate(&self) {
        let persisted = self
            .storage
            .read(STORAGE_KEY)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str::<PersistedSession>(&raw).ok());

        let session = match persisted {
            Some(snapshot) => Session {
                is_authenticated: snapshot.user.is_some(),
                user: snapshot.user,
                access_token: snapshot.access_token,
                is_loading: false,
            },
            None => Session::default(),
        };

        self.state.set(session);
    }

    /// Synchronous snapshot of the current session.
    pub fn get(&self) -> Session {
        self.state.get_untracked()
    }

    /// Current access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.state.with_untracked(|session| session.access_token.clone())
    }

    /// Reactive projection for the UI layer (guards, provider, routes).
    pub fn signal(&self) -> RwSignal<Session> {
        self.state
    }

    /// Replaces the user record and re-derives `is_authenticated`.
    pub fn set_user(&self, user: Option<User>) {
        self.state.update(|session| {
            session.is_authenticated = user.is_some();
            session.user = user;
        });
        self.persist();
    }

    /// Replaces the access token, leaving the user untouched.
    pub fn set_access_token(&self, token: Option<String>) {
        self.state.update(|session| session.access_token = token);
        self.persist();
    }

    /// Stores a fresh login: user and token together, authenticated.
    pub fn sign_in(&self, user: User, token: String) {
        self.state.update(|session| {
            session.user = Some(user);
            session.access_token = Some(token);
            session.is_authenticated = true;
        });
        self.persist();
    }

    /// Raises or clears the transient loading flag. Not persisted.
    pub fn set_loading(&self, loading: bool) {
        self.state.update(|session| session.is_loading = loading);
    }

    /// Drops user and token and removes the persisted entry. Idempotent.
    pub fn clear(&self) {
        self.state.update(|session| {
            session.user = None;
            session.access_token = None;
            session.is_authenticated = false;
        });
        // Storage failures degrade to in-memory-only state; memory stays
        // authoritative either way.
        let _ = self.storage.remove(STORAGE_KEY);
    }

    fn persist(&self) {
        let snapshot = self.state.with_untracked(|session| PersistedSession {
            user: session.user.clone(),
            access_token: session.access_token.clone(),
            is_authenticated: session.is_authenticated,
        });
        if let Ok(raw) = serde_json::to_string(&snapshot) {
            let _ = self.storage.write(STORAGE_KEY, &raw);
        }
    }
}
