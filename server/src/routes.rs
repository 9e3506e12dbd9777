// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::{handlers, state::AppState};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Accounts and sessions
        .route("/api/auth/sign-up", post(handlers::sign_up))
        .route("/api/auth/sign-in", post(handlers::sign_in))
        .route("/api/auth/sign-out", post(handlers::sign_out))
        .route("/api/auth/password-reset", post(handlers::request_password_reset))
        .route(
            "/api/auth/password-reset/confirm",
            post(handlers::confirm_password_reset),
        )
        .route("/api/auth/me", get(handlers::current_user))
        .route("/api/auth/events", get(handlers::auth_events))
        .route("/api/profiles/{id}", get(handlers::get_profile))
        // Catalogue and weekly template
        .route("/api/services", get(handlers::list_services))
        .route(
            "/api/templates/{day}",
            get(handlers::get_day_template).put(handlers::generate_day_template),
        )
        .route("/api/availability", get(handlers::availability))
        // Reservations
        .route("/api/reservations/mine", get(handlers::list_my_reservations))
        .route(
            "/api/reservations",
            get(handlers::list_day_reservations).post(handlers::create_reservation),
        )
        .route(
            "/api/reservations/{id}",
            put(handlers::reschedule_reservation).delete(handlers::cancel_reservation),
        )
        .route(
            "/api/reservations/{id}/status",
            patch(handlers::update_reservation_status),
        )
        .route("/api/dashboard", get(handlers::dashboard))
        // Adds the shared state to the application
        .with_state(state)
}
