// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Slot availability: which template times of a given date can still be booked.
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A template time on a concrete date, flagged free or occupied.
///
/// Occupied slots are kept in the output so clients can render them disabled.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    pub time_of_day: NaiveTime,
    pub is_occupied: bool,
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

/// Day of week with 0 = Sunday, the numbering used by the weekly template.
///
/// `NaiveDate` carries no timezone, so the weekday can never drift to the
/// neighbouring day the way a midnight UTC timestamp would.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// First and last second of `date`, both inclusive.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    (start, start + Duration::seconds(86_399))
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Flags every template time of `date` as free or occupied.
///
/// A slot is occupied when a reservation starts at exactly that time (to the
/// second) on `date`, or when `date` is today and the slot's minute is not
/// after the current minute. `reserved_starts` must already exclude cancelled
/// reservations; starts on other dates are ignored.
pub fn compute_availability(
    date: NaiveDate,
    template: &[NaiveTime],
    reserved_starts: &[NaiveDateTime],
    now: NaiveDateTime,
) -> Vec<SlotView> {
    let is_today = now.date() == date;
    let now_minute = minute_of_day(now.time());

    let reserved: Vec<NaiveTime> = reserved_starts
        .iter()
        .filter(|start| start.date() == date)
        .map(|start| start.time())
        .collect();

    template
        .iter()
        .map(|&time_of_day| {
            let taken = reserved.contains(&time_of_day);
            let elapsed = is_today && minute_of_day(time_of_day) <= now_minute;
            SlotView {
                time_of_day,
                is_occupied: taken || elapsed,
            }
        })
        .collect()
}
