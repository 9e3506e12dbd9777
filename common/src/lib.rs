// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Shared types and pure booking logic used by the server and its clients.
//!
//! Nothing in this crate performs I/O: callers fetch templates and
//! reservations from the store and hand them to the functions below.
pub mod dashboard;
pub mod error;
pub mod models;
pub mod policy;
pub mod slots;
pub mod template;

pub use dashboard::{Dashboard, DashboardEntry};
pub use error::{ChangeDenied, TemplateError, ValidationError};
pub use models::*;
pub use slots::SlotView;
