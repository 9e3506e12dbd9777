// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Shortest password accepted at sign-up and password reset.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Loose `x@y.z` shape check, enough to catch typos before hitting the store.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    match domain.rsplit_once('.') {
        Some((host, tld)) => !local.is_empty() && !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::Missing("Password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    Ok(())
}

/// Role attached to a profile. Admins manage templates and reservations,
/// customers book for themselves.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Customer,
}

/// Public data about a user. A freshly registered user may not have one yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub user_type: UserType,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }
}

/// A bookable service from the price list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_minutes: Option<i64>,
}

/// One entry of the weekly template: the time `time_of_day` is offered on
/// every `day_of_week` (0 = Sunday).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeeklySlot {
    pub day_of_week: i64,
    pub time_of_day: NaiveTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReservationStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Scheduled => "scheduled",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ReservationStatus::Scheduled),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("unknown reservation status '{other}'")),
        }
    }
}

/// A customer's booking of a service, as stored.
///
/// Start and end are local wall-clock values: slots are compared against
/// the shop's clock, not against UTC.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reservation {
    pub id: i64,
    pub customer_id: String,
    pub service_id: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

/// A reservation joined with its service and customer. Either side may have
/// been removed, hence the options.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReservationDetails {
    pub id: i64,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub service_id: i64,
    pub service_name: Option<String>,
    pub service_price: Option<f64>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: ReservationStatus,
}

/// Customer-facing view of their own reservation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MyReservation {
    #[serde(flatten)]
    pub reservation: ReservationDetails,
    /// Whether the customer may still reschedule or cancel it.
    pub can_modify: bool,
}

// --- API payloads ---

/// Body of `POST /api/reservations` and `PUT /api/reservations/{id}`.
/// `time` is `HH:MM`, as picked from the availability list.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BookingPayload {
    pub service_id: i64,
    pub date: NaiveDate,
    pub time: String,
}

/// Body of `PUT /api/templates/{day}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GenerateTemplatePayload {
    pub start: String,
    pub end: String,
    pub interval_minutes: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TemplateGenerated {
    pub day_of_week: u8,
    pub slots_created: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StatusUpdatePayload {
    pub status: ReservationStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignUpPayload {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignUpPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Missing("Name"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::Missing("Email"));
        }
        if !is_plausible_email(self.email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
        validate_password(&self.password)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignInPayload {
    pub email: String,
    pub password: String,
}

impl SignInPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::Missing("Email"));
        }
        if !is_plausible_email(self.email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
        if self.password.is_empty() {
            return Err(ValidationError::Missing("Password"));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PasswordResetPayload {
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PasswordResetConfirmPayload {
    pub token: String,
    pub new_password: String,
}

/// The authenticated user as seen by clients. `profile` is `None` while the
/// profile row has not been written yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub profile: Option<Profile>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignInResponse {
    pub token: String,
    pub user: CurrentUser,
}
