// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::Duration;
use sqlx::SqlitePool;

use crate::auth::SessionStore;

/// State shared by every handler: the store and the one session registry of
/// the process.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(pool: SqlitePool, session_ttl: Duration) -> Self {
        Self {
            pool,
            sessions: SessionStore::new(session_ttl),
        }
    }
}
