// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use thiserror::Error;

/// Input rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required.")]
    Missing(&'static str),
    #[error("Invalid email address.")]
    InvalidEmail,
    #[error("Password must be at least {0} characters long.")]
    PasswordTooShort(usize),
    #[error("Invalid date '{0}', expected YYYY-MM-DD.")]
    InvalidDate(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Errors raised while generating a day of the weekly template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Invalid time format '{0}'. Use HH:MM (e.g. 09:00).")]
    InvalidTime(String),
    #[error("The interval must be a positive number of minutes.")]
    NonPositiveInterval,
    #[error("The interval must be shorter than a day ({0} minutes).")]
    IntervalTooLong(i64),
    #[error("The start time must be before the end time.")]
    StartNotBeforeEnd,
    #[error("Day of week must be between 0 (Sunday) and 6 (Saturday), got {0}.")]
    InvalidDayOfWeek(i64),
}

/// Why a reservation may not be rescheduled, cancelled or completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChangeDenied {
    #[error("This service has already been completed and can no longer be changed.")]
    AlreadyCompleted,
    #[error(
        "Reservations can only be rescheduled or cancelled more than 24 hours before the appointment. Please contact the barbershop."
    )]
    InsideWindow,
}
