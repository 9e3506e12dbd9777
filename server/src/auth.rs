// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Password hashing, bearer sessions and the session-change feed.
//!
//! The process holds exactly one [`SessionStore`]. It owns every open
//! session and the single broadcast channel that announces sign-ins,
//! sign-outs and profile changes; handlers reach it through `AppState`.
use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use common::{CurrentUser, Profile};
use parking_lot::RwLock;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{database, handlers::AppError, state::AppState};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    PasswordRecovery,
    UserUpdated,
}

/// One change of a user's authentication state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub user_id: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub profile: Option<Profile>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.user_id.clone(),
            email: self.email.clone(),
            profile: self.profile.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(Profile::is_admin)
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    events: broadcast::Sender<AuthEvent>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            events,
            ttl,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Announces a change to every subscriber. Having none is fine.
    pub fn publish(&self, kind: AuthEventKind, user_id: &str) {
        let _ = self.events.send(AuthEvent {
            kind,
            user_id: user_id.to_string(),
            at: Utc::now(),
        });
    }

    pub fn open(&self, user_id: &str, email: &str, profile: Option<Profile>) -> Session {
        let session = Session {
            token: new_id(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            profile,
            expires_at: Utc::now() + self.ttl,
        };
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        info!("Session opened for user {}.", user_id);
        self.publish(AuthEventKind::SignedIn, user_id);
        session
    }

    /// Looks up a live session. Expired ones are dropped on the way.
    pub fn get(&self, token: &str) -> Option<Session> {
        let session = self.sessions.read().get(token).cloned()?;
        if session.expires_at <= Utc::now() {
            debug!("Session for user {} expired.", session.user_id);
            self.sessions.write().remove(token);
            return None;
        }
        Some(session)
    }

    pub fn close(&self, token: &str) -> Option<Session> {
        let closed = self.sessions.write().remove(token);
        if let Some(session) = &closed {
            info!("Session closed for user {}.", session.user_id);
            self.publish(AuthEventKind::SignedOut, &session.user_id);
        }
        closed
    }

    /// Closes every session of `user_id`, e.g. after a password change.
    pub fn close_all_for(&self, user_id: &str) -> usize {
        let closed = {
            let mut sessions = self.sessions.write();
            let before = sessions.len();
            sessions.retain(|_, s| s.user_id != user_id);
            before - sessions.len()
        };
        if closed > 0 {
            info!("Closed {} sessions for user {}.", closed, user_id);
            self.publish(AuthEventKind::SignedOut, user_id);
        }
        closed
    }

    /// Attaches a freshly loaded profile to all sessions of its user.
    pub fn set_profile(&self, profile: &Profile) {
        let mut updated = false;
        for session in self.sessions.write().values_mut() {
            if session.user_id == profile.id {
                session.profile = Some(profile.clone());
                updated = true;
            }
        }
        if updated {
            self.publish(AuthEventKind::UserUpdated, &profile.id);
        }
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }
}

/// Fills in the profile of a session that was opened before the profile row
/// existed. A still-missing profile is not an error.
pub async fn resolve_profile(state: &AppState, session: &mut Session) -> Result<(), AppError> {
    if session.profile.is_some() {
        return Ok(());
    }
    if let Some(profile) = database::get_profile(&state.pool, &session.user_id).await? {
        state.sessions.set_profile(&profile);
        session.profile = Some(profile);
    }
    Ok(())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Extracts the caller's session from `Authorization: Bearer <token>`.
pub struct AuthSession(pub Session);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "Authentication required."))?;
        state
            .sessions
            .get(token)
            .map(AuthSession)
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "Session expired or invalid."))
    }
}

/// Like [`AuthSession`] but only admits admins.
pub struct AdminSession(pub Session);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthSession(mut session) = AuthSession::from_request_parts(parts, state).await?;
        resolve_profile(state, &mut session).await?;
        if !session.is_admin() {
            return Err(AppError::new(StatusCode::FORBIDDEN, "Admin access required."));
        }
        Ok(AdminSession(session))
    }
}
