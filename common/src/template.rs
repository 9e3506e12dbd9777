// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{Duration, NaiveTime};

use crate::error::TemplateError;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Validates a day-of-week index (0 = Sunday ... 6 = Saturday).
pub fn validate_day_of_week(day: i64) -> Result<u8, TemplateError> {
    match day {
        0..=6 => Ok(day as u8),
        other => Err(TemplateError::InvalidDayOfWeek(other)),
    }
}

/// Parses a strict `HH:MM` clock value.
pub fn parse_clock(value: &str) -> Result<NaiveTime, TemplateError> {
    let well_formed = value.len() == 5
        && value.as_bytes()[2] == b':'
        && value
            .bytes()
            .enumerate()
            .all(|(i, b)| i == 2 || b.is_ascii_digit());
    if !well_formed {
        return Err(TemplateError::InvalidTime(value.to_string()));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| TemplateError::InvalidTime(value.to_string()))
}

/// Generates the offered times of one day: `start`, `start + interval`, ...
/// up to but excluding `end`.
pub fn generate_day_slots(
    start: &str,
    end: &str,
    interval_minutes: i64,
) -> Result<Vec<NaiveTime>, TemplateError> {
    let start = parse_clock(start)?;
    let end = parse_clock(end)?;
    if interval_minutes <= 0 {
        return Err(TemplateError::NonPositiveInterval);
    }
    if interval_minutes >= MINUTES_PER_DAY {
        return Err(TemplateError::IntervalTooLong(MINUTES_PER_DAY));
    }
    if start >= end {
        return Err(TemplateError::StartNotBeforeEnd);
    }

    let step = Duration::minutes(interval_minutes);
    let mut slots = Vec::new();
    let mut current = start;
    while current < end {
        slots.push(current);
        // `overflowing_add_signed` wraps past midnight; stop instead.
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_hour_grid_from_nine_to_six() {
        let slots = generate_day_slots("09:00", "18:00", 30).unwrap();

        assert_eq!(slots.len(), 18);
        assert_eq!(slots.first(), NaiveTime::from_hms_opt(9, 0, 0).as_ref());
        assert_eq!(slots.last(), NaiveTime::from_hms_opt(17, 30, 0).as_ref());
    }

    #[test]
    fn test_interval_not_dividing_the_range() {
        let slots = generate_day_slots("09:00", "10:00", 25).unwrap();
        let rendered: Vec<String> = slots.iter().map(|t| t.format("%H:%M").to_string()).collect();
        assert_eq!(rendered, vec!["09:00", "09:25", "09:50"]);
    }

    #[test]
    fn test_late_evening_does_not_wrap() {
        let slots = generate_day_slots("23:00", "23:59", 45).unwrap();
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_rejects_malformed_times() {
        for bad in ["9:00", "09h00", "24:00", "09:60", "", "09:00:00"] {
            assert_eq!(
                generate_day_slots(bad, "18:00", 30),
                Err(TemplateError::InvalidTime(bad.to_string())),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        assert_eq!(
            generate_day_slots("09:00", "18:00", 0),
            Err(TemplateError::NonPositiveInterval)
        );
        assert_eq!(
            generate_day_slots("09:00", "18:00", -15),
            Err(TemplateError::NonPositiveInterval)
        );
    }

    #[test]
    fn test_rejects_interval_of_a_day_or_more() {
        assert_eq!(
            generate_day_slots("09:00", "18:00", 1440),
            Err(TemplateError::IntervalTooLong(1440))
        );
        assert_eq!(
            generate_day_slots("09:00", "18:00", 9_000_000_000_000_000_000),
            Err(TemplateError::IntervalTooLong(1440))
        );
        assert_eq!(generate_day_slots("09:00", "18:00", 1439).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_end_before_start() {
        assert_eq!(
            generate_day_slots("18:00", "09:00", 30),
            Err(TemplateError::StartNotBeforeEnd)
        );
        assert_eq!(
            generate_day_slots("09:00", "09:00", 30),
            Err(TemplateError::StartNotBeforeEnd)
        );
    }

    #[test]
    fn test_day_of_week_range() {
        assert_eq!(validate_day_of_week(0), Ok(0));
        assert_eq!(validate_day_of_week(6), Ok(6));
        assert_eq!(validate_day_of_week(7), Err(TemplateError::InvalidDayOfWeek(7)));
        assert_eq!(validate_day_of_week(-1), Err(TemplateError::InvalidDayOfWeek(-1)));
    }
}
