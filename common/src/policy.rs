// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{Duration, NaiveDateTime};

use crate::error::ChangeDenied;
use crate::models::ReservationStatus;

/// Customers may reschedule or cancel only while more than this many hours
/// remain before the start.
pub const CHANGE_WINDOW_HOURS: i64 = 24;

/// Duration used when a service does not declare one.
pub const DEFAULT_DURATION_MINUTES: i64 = 30;

/// Checks whether a customer may still reschedule or cancel a reservation.
pub fn check_customer_change(
    start_at: NaiveDateTime,
    status: ReservationStatus,
    now: NaiveDateTime,
) -> Result<(), ChangeDenied> {
    check_admin_change(status)?;
    if start_at - now > Duration::hours(CHANGE_WINDOW_HOURS) {
        Ok(())
    } else {
        Err(ChangeDenied::InsideWindow)
    }
}

/// Admins may cancel, confirm or complete anything not yet completed.
pub fn check_admin_change(status: ReservationStatus) -> Result<(), ChangeDenied> {
    if status == ReservationStatus::Completed {
        Err(ChangeDenied::AlreadyCompleted)
    } else {
        Ok(())
    }
}

pub fn can_customer_change(
    start_at: NaiveDateTime,
    status: ReservationStatus,
    now: NaiveDateTime,
) -> bool {
    check_customer_change(start_at, status, now).is_ok()
}

/// End of a reservation starting at `start` for a service of the given length.
pub fn reservation_end(start: NaiveDateTime, duration_minutes: Option<i64>) -> NaiveDateTime {
    let minutes = duration_minutes
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    start + Duration::minutes(minutes)
}
