// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use chrono::Duration;

const DEFAULT_DB_URL: &str = "sqlite://database/barbershop.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Credentials of the admin account created on first start.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub session_ttl: Duration,
    pub admin: AdminSeed,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let session_ttl_hours = match env::var("SESSION_TTL_HOURS") {
            Ok(value) => value
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .context("SESSION_TTL_HOURS must be a positive number of hours")?,
            Err(_) => DEFAULT_SESSION_TTL_HOURS,
        };

        let admin = AdminSeed {
            email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@barbershop.local".to_string()),
            password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string()),
            name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
        };
        if admin.password == DEFAULT_ADMIN_PASSWORD {
            tracing::warn!(
                "ADMIN_PASSWORD not set. Using the default admin password. Set ADMIN_PASSWORD in production."
            );
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl: Duration::hours(session_ttl_hours),
            admin,
        })
    }
}
