// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use common::{
    DashboardEntry, Profile, Reservation, ReservationDetails, ReservationStatus, Service,
    UserType, slots,
};
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::{debug, info, warn};

use crate::auth::{hash_password, new_id};
use crate::config::AdminSeed;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY REFERENCES users(id),
        name TEXT NOT NULL,
        user_type TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS password_resets (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        expires_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS services (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NULL,
        price REAL NOT NULL,
        duration_minutes INTEGER NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weekly_slots (
        day_of_week INTEGER NOT NULL,
        time_of_day TEXT NOT NULL,
        PRIMARY KEY (day_of_week, time_of_day)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reservations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id TEXT NOT NULL,
        service_id INTEGER NOT NULL,
        start_at TIMESTAMP NOT NULL,
        end_at TIMESTAMP NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_reservations_start ON reservations (start_at);",
    // At most one active reservation per start time.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_active_slot ON reservations (start_at) WHERE status != 'cancelled';",
];

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.customer_id, p.name AS customer_name, r.service_id,
           s.name AS service_name, s.price AS service_price,
           r.start_at, r.end_at, r.status
    FROM reservations r
    LEFT JOIN services s ON s.id = r.service_id
    LEFT JOIN profiles p ON p.id = r.customer_id
"#;

/// An account row. The password hash never leaves the server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Establishes the database connection pool.
/// If the database does not exist, it creates it, then makes sure the schema is in place.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create schema")?;
    }
    info!("Schema is ready.");
    Ok(())
}

/// Creates the admin account and a starter price list on an empty database.
pub async fn seed_defaults(pool: &SqlitePool, admin: &AdminSeed) -> Result<()> {
    let has_admin = sqlx::query_as::<_, (String,)>("SELECT id FROM profiles WHERE user_type = ? LIMIT 1")
        .bind(UserType::Admin)
        .fetch_optional(pool)
        .await
        .context("Failed to look up admin profile")?
        .is_some();
    if !has_admin {
        let hash = hash_password(&admin.password)
            .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;
        let user = create_user(pool, &admin.name, &admin.email, &hash, UserType::Admin).await?;
        info!("Seeded admin account {} ({}).", user.email, user.id);
    }

    let (services,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await
        .context("Failed to count services")?;
    if services == 0 {
        let defaults = [
            ("Haircut", "Scissor or clipper cut with finish.", 40.0, 30),
            ("Beard trim", "Beard shaping with hot towel.", 25.0, 30),
            ("Haircut and beard", "Full cut plus beard trim.", 60.0, 60),
        ];
        for (name, description, price, duration) in defaults {
            sqlx::query(
                "INSERT INTO services (name, description, price, duration_minutes) VALUES (?, ?, ?, ?)",
            )
            .bind(name)
            .bind(description)
            .bind(price)
            .bind(duration)
            .execute(pool)
            .await
            .context("Failed to seed services")?;
        }
        info!("Seeded {} default services.", defaults.len());
    }
    Ok(())
}

// --- Accounts ---

/// Inserts a user and its profile in one transaction.
pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
    user_type: UserType,
) -> Result<UserRow> {
    let user = UserRow {
        id: new_id(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        created_at: Utc::now(),
    };

    let mut tx = pool.begin().await.context("Failed to start transaction")?;
    sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert user")?;
    sqlx::query("INSERT INTO profiles (id, name, user_type) VALUES (?, ?, ?)")
        .bind(&user.id)
        .bind(name)
        .bind(user_type)
        .execute(&mut *tx)
        .await
        .context("Failed to insert profile")?;
    tx.commit().await.context("Failed to commit new user")?;

    debug!("Created user {} with email {}", user.id, user.email);
    Ok(user)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash, created_at FROM users WHERE lower(email) = lower(?) LIMIT 1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to look up user by email")
}

/// A missing row is `Ok(None)`: profiles can lag behind their user.
pub async fn get_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>("SELECT id, name, user_type FROM profiles WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context(format!("Failed to fetch profile {user_id}"))
}

pub async fn update_password(pool: &SqlitePool, user_id: &str, password_hash: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update password")?;
    Ok(result.rows_affected() > 0)
}

pub async fn store_reset_token(
    pool: &SqlitePool,
    token: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO password_resets (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await
        .context("Failed to store password reset token")?;
    Ok(())
}

/// Consumes a reset token, returning its user if it was still valid.
pub async fn take_reset_token(pool: &SqlitePool, token: &str, now: DateTime<Utc>) -> Result<Option<String>> {
    let row = sqlx::query_as::<_, (String, DateTime<Utc>)>(
        "DELETE FROM password_resets WHERE token = ? RETURNING user_id, expires_at",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to consume password reset token")?;

    Ok(row.and_then(|(user_id, expires_at)| (expires_at > now).then_some(user_id)))
}

pub async fn purge_expired_reset_tokens(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM password_resets WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to purge password reset tokens")?;
    Ok(result.rows_affected())
}

// --- Services ---

pub async fn list_services(pool: &SqlitePool) -> Result<Vec<Service>> {
    sqlx::query_as::<_, Service>(
        "SELECT id, name, description, price, duration_minutes FROM services ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to retrieve services")
}

pub async fn get_service(pool: &SqlitePool, service_id: i64) -> Result<Option<Service>> {
    sqlx::query_as::<_, Service>(
        "SELECT id, name, description, price, duration_minutes FROM services WHERE id = ?",
    )
    .bind(service_id)
    .fetch_optional(pool)
    .await
    .context(format!("Failed to fetch service {service_id}"))
}

// --- Weekly template ---

/// Offered times of one weekday, ascending.
pub async fn get_day_template(pool: &SqlitePool, day_of_week: u8) -> Result<Vec<NaiveTime>> {
    let rows = sqlx::query_as::<_, (NaiveTime,)>(
        "SELECT time_of_day FROM weekly_slots WHERE day_of_week = ? ORDER BY time_of_day ASC",
    )
    .bind(day_of_week)
    .fetch_all(pool)
    .await
    .context(format!("Failed to retrieve template for day {day_of_week}"))?;
    Ok(rows.into_iter().map(|(time,)| time).collect())
}

/// Replaces every time of `day_of_week`. Runs in one transaction, so a failed
/// insert leaves the previous template in place.
pub async fn replace_day_template(pool: &SqlitePool, day_of_week: u8, times: &[NaiveTime]) -> Result<usize> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let removed = sqlx::query("DELETE FROM weekly_slots WHERE day_of_week = ?")
        .bind(day_of_week)
        .execute(&mut *tx)
        .await
        .context("Failed to clear day template")?
        .rows_affected();

    for time in times {
        sqlx::query("INSERT INTO weekly_slots (day_of_week, time_of_day) VALUES (?, ?)")
            .bind(day_of_week)
            .bind(time)
            .execute(&mut *tx)
            .await
            .context("Failed to insert template slot")?;
    }

    tx.commit().await.context("Failed to commit day template")?;
    info!(
        "Replaced template for day {}: {} slots removed, {} inserted.",
        day_of_week,
        removed,
        times.len()
    );
    Ok(times.len())
}

// --- Reservations ---

/// Start times of the non-cancelled reservations on `date`, optionally
/// leaving one reservation out (the one being rescheduled).
pub async fn get_reserved_starts(
    pool: &SqlitePool,
    date: NaiveDate,
    exclude: Option<i64>,
) -> Result<Vec<NaiveDateTime>> {
    let (day_start, day_end) = slots::day_bounds(date);
    let rows = sqlx::query_as::<_, (NaiveDateTime,)>(
        "SELECT start_at FROM reservations WHERE start_at BETWEEN ? AND ? AND status != ? AND (? IS NULL OR id != ?) ORDER BY start_at ASC",
    )
    .bind(day_start)
    .bind(day_end)
    .bind(ReservationStatus::Cancelled)
    .bind(exclude)
    .bind(exclude)
    .fetch_all(pool)
    .await
    .context(format!("Failed to retrieve reservations for {date}"))?;
    Ok(rows.into_iter().map(|(start,)| start).collect())
}

pub async fn get_reservation(pool: &SqlitePool, reservation_id: i64) -> Result<Option<Reservation>> {
    sqlx::query_as::<_, Reservation>(
        "SELECT id, customer_id, service_id, start_at, end_at, status, created_at FROM reservations WHERE id = ?",
    )
    .bind(reservation_id)
    .fetch_optional(pool)
    .await
    .context(format!("Failed to fetch reservation {reservation_id}"))
}

/// Outcome of an update that may claim a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
    Updated,
    /// No reservation with that id.
    Missing,
    /// Another active reservation already starts at that time.
    Taken,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

/// Inserts a `scheduled` reservation. Returns `None` when another active
/// reservation already holds `start_at`.
pub async fn create_reservation(
    pool: &SqlitePool,
    customer_id: &str,
    service_id: i64,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
) -> Result<Option<Reservation>> {
    let created_at = Utc::now();
    let status = ReservationStatus::Scheduled;

    debug!(
        "Insert values: customer_id={}, service_id={}, start_at={}, end_at={}",
        customer_id, service_id, start_at, end_at
    );

    let result = sqlx::query(
        "INSERT INTO reservations (customer_id, service_id, start_at, end_at, status, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(customer_id)
    .bind(service_id)
    .bind(start_at)
    .bind(end_at)
    .bind(status)
    .bind(created_at)
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            warn!("Slot {} was taken before the insert.", start_at);
            return Ok(None);
        }
        Err(e) => return Err(e).context("Failed to insert reservation into DB"),
    };

    Ok(Some(Reservation {
        id,
        customer_id: customer_id.to_string(),
        service_id,
        start_at,
        end_at,
        status,
        created_at,
    }))
}

fn slot_write(
    result: std::result::Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>,
    reservation_id: i64,
    action: &str,
) -> Result<SlotWrite> {
    match result {
        Ok(done) if done.rows_affected() > 0 => Ok(SlotWrite::Updated),
        Ok(_) => Ok(SlotWrite::Missing),
        Err(e) if is_unique_violation(&e) => {
            warn!("Cannot {} reservation {}: slot already taken.", action, reservation_id);
            Ok(SlotWrite::Taken)
        }
        Err(e) => Err(e).context(format!("Failed to {action} reservation {reservation_id}")),
    }
}

/// Moves a reservation to a new slot and service and puts it back to
/// `scheduled`.
pub async fn reschedule_reservation(
    pool: &SqlitePool,
    reservation_id: i64,
    service_id: i64,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
) -> Result<SlotWrite> {
    let result = sqlx::query(
        "UPDATE reservations SET service_id = ?, start_at = ?, end_at = ?, status = ? WHERE id = ?",
    )
    .bind(service_id)
    .bind(start_at)
    .bind(end_at)
    .bind(ReservationStatus::Scheduled)
    .bind(reservation_id)
    .execute(pool)
    .await;
    slot_write(result, reservation_id, "reschedule")
}

/// Sets the status. Reviving a cancelled reservation whose slot has been
/// booked again yields [`SlotWrite::Taken`].
pub async fn update_reservation_status(
    pool: &SqlitePool,
    reservation_id: i64,
    status: ReservationStatus,
) -> Result<SlotWrite> {
    let result = sqlx::query("UPDATE reservations SET status = ? WHERE id = ?")
        .bind(status)
        .bind(reservation_id)
        .execute(pool)
        .await;
    slot_write(result, reservation_id, "update the status of")
}

/// Hard delete; cancelling a reservation removes it.
pub async fn delete_reservation(pool: &SqlitePool, reservation_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reservations WHERE id = ?")
        .bind(reservation_id)
        .execute(pool)
        .await
        .context(format!("Failed to delete reservation {reservation_id}"))?;
    info!(
        "Deleted {} rows for reservation ID: {}",
        result.rows_affected(),
        reservation_id
    );
    Ok(result.rows_affected() > 0)
}

pub async fn list_customer_reservations(pool: &SqlitePool, customer_id: &str) -> Result<Vec<ReservationDetails>> {
    sqlx::query_as::<_, ReservationDetails>(&format!(
        "{DETAILS_SELECT} WHERE r.customer_id = ? ORDER BY r.start_at ASC"
    ))
    .bind(customer_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve customer reservations")
}

/// Reservations starting within `[from, to]`, joined with service and
/// customer.
pub async fn list_reservations_between(
    pool: &SqlitePool,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<ReservationDetails>> {
    sqlx::query_as::<_, ReservationDetails>(&format!(
        "{DETAILS_SELECT} WHERE r.start_at BETWEEN ? AND ? ORDER BY r.start_at ASC"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve reservations")
}

#[derive(sqlx::FromRow)]
struct DashboardRow {
    start_at: Option<String>,
    status: Option<String>,
    service_name: Option<String>,
    service_price: Option<f64>,
    customer_id: Option<String>,
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

impl From<DashboardRow> for DashboardEntry {
    fn from(row: DashboardRow) -> Self {
        let start_at = row.start_at.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                warn!("Skipping malformed reservation start '{}' in dashboard.", raw);
            }
            parsed
        });
        let status = row.status.as_deref().and_then(|raw| match raw.parse() {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Treating reservation as pending: {}", e);
                None
            }
        });
        DashboardEntry {
            start_at,
            status,
            service_name: row.service_name,
            service_price: row.service_price,
            customer_id: row.customer_id,
        }
    }
}

/// Every reservation with the fields the dashboard aggregates. Raw text is
/// read so one malformed row cannot fail the whole load.
pub async fn get_dashboard_entries(pool: &SqlitePool) -> Result<Vec<DashboardEntry>> {
    let rows = sqlx::query_as::<_, DashboardRow>(
        r#"
        SELECT CAST(r.start_at AS TEXT) AS start_at, CAST(r.status AS TEXT) AS status,
               s.name AS service_name, s.price AS service_price, p.id AS customer_id
        FROM reservations r
        LEFT JOIN services s ON s.id = r.service_id
        LEFT JOIN profiles p ON p.id = r.customer_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to retrieve reservations for dashboard")?;
    Ok(rows.into_iter().map(DashboardEntry::from).collect())
}
