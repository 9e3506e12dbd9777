// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::convert::Infallible;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Utc};
use common::{
    BookingPayload, ChangeDenied, CurrentUser, Dashboard, GenerateTemplatePayload, MyReservation,
    PasswordResetConfirmPayload, PasswordResetPayload, Profile, Reservation, ReservationDetails,
    Service, SignInPayload, SignInResponse, SignUpPayload, SlotView, StatusUpdatePayload,
    TemplateError, TemplateGenerated, UserType, ValidationError, WeeklySlot, policy, slots,
    template,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{self, AdminSession, AuthEventKind, AuthSession, resolve_profile},
    colors::{self, ChartColors},
    database::{self, SlotWrite},
    state::AppState,
};

const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// The shop's wall clock. Slots and reservations are local times.
fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

// --- Authentication ---

/// Handler for registering a new customer account.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpPayload>,
) -> Result<(StatusCode, Json<CurrentUser>), AppError> {
    debug!("Received sign-up request for {}", payload.email);
    payload.validate()?;

    let email = payload.email.trim();
    if database::find_user_by_email(&state.pool, email).await?.is_some() {
        error!("Sign-up rejected: {} is already registered.", email);
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "An account with this email already exists.",
        ));
    }

    let password_hash = auth::hash_password(&payload.password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
    let user = database::create_user(
        &state.pool,
        payload.name.trim(),
        email,
        &password_hash,
        UserType::Customer,
    )
    .await?;
    let profile = database::get_profile(&state.pool, &user.id).await?;

    info!("User {} signed up.", user.id);
    Ok((
        StatusCode::CREATED,
        Json(CurrentUser {
            id: user.id,
            email: user.email,
            profile,
        }),
    ))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInPayload>,
) -> Result<Json<SignInResponse>, AppError> {
    payload.validate()?;

    let user = database::find_user_by_email(&state.pool, payload.email.trim()).await?;
    let Some(user) = user.filter(|u| auth::verify_password(&payload.password, &u.password_hash))
    else {
        warn!("Failed sign-in attempt for {}", payload.email);
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "Incorrect email or password.",
        ));
    };

    // No profile row yet is a normal race right after sign-up.
    let profile = database::get_profile(&state.pool, &user.id).await?;
    let session = state.sessions.open(&user.id, &user.email, profile);

    Ok(Json(SignInResponse {
        token: session.token.clone(),
        user: session.current_user(),
    }))
}

pub async fn sign_out(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> StatusCode {
    state.sessions.close(&session.token);
    StatusCode::NO_CONTENT
}

/// Handler for requesting a password reset link. Always answers 202 so the
/// endpoint cannot be used to probe which emails are registered.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(ValidationError::Missing("Email").into());
    }

    if let Some(user) = database::find_user_by_email(&state.pool, email).await? {
        let token = auth::new_id();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        database::store_reset_token(&state.pool, &token, &user.id, expires_at).await?;
        state
            .sessions
            .publish(AuthEventKind::PasswordRecovery, &user.id);
        info!("Password reset requested for user {}.", user.id);
        debug!("Password reset token for {}: {}", user.email, token);
    } else {
        debug!("Password reset requested for unknown email {}", email);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "If this email is registered, a reset link has been sent."
        })),
    ))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirmPayload>,
) -> Result<StatusCode, AppError> {
    common::models::validate_password(&payload.new_password)?;

    let Some(user_id) = database::take_reset_token(&state.pool, &payload.token, Utc::now()).await?
    else {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "This reset link is invalid or has expired.",
        ));
    };

    let password_hash = auth::hash_password(&payload.new_password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
    database::update_password(&state.pool, &user_id, &password_hash).await?;
    state.sessions.close_all_for(&user_id);

    info!("Password reset completed for user {}.", user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_user(
    State(state): State<AppState>,
    AuthSession(mut session): AuthSession,
) -> Result<Json<CurrentUser>, AppError> {
    resolve_profile(&state, &mut session).await?;
    Ok(Json(session.current_user()))
}

/// Server-sent events announcing the caller's own session changes.
pub async fn auth_events(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let user_id = session.user_id;
    let stream = BroadcastStream::new(state.sessions.subscribe()).filter_map(move |result| {
        let event = result.ok()?;
        if event.user_id != user_id {
            return None;
        }
        Some(Event::default().event("auth").json_data(&event))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn get_profile(
    State(state): State<AppState>,
    AuthSession(mut session): AuthSession,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    if user_id != session.user_id {
        resolve_profile(&state, &mut session).await?;
        if !session.is_admin() {
            return Err(AppError::new(
                StatusCode::FORBIDDEN,
                "You can only view your own profile.",
            ));
        }
    }
    database::get_profile(&state.pool, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Profile not found."))
}

// --- Services and weekly template ---

pub async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<Service>>, AppError> {
    let services = database::list_services(&state.pool).await?;
    info!("Successfully retrieved {} services.", services.len());
    Ok(Json(services))
}

pub async fn get_day_template(
    State(state): State<AppState>,
    Path(day): Path<i64>,
) -> Result<Json<Vec<WeeklySlot>>, AppError> {
    let day = template::validate_day_of_week(day)?;
    let times = database::get_day_template(&state.pool, day).await?;
    Ok(Json(
        times
            .into_iter()
            .map(|time_of_day| WeeklySlot {
                day_of_week: i64::from(day),
                time_of_day,
            })
            .collect(),
    ))
}

/// Handler for regenerating the offered times of one weekday.
pub async fn generate_day_template(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(day): Path<i64>,
    Json(payload): Json<GenerateTemplatePayload>,
) -> Result<Json<TemplateGenerated>, AppError> {
    debug!(
        "Admin {} regenerating day {}: {} to {} every {} minutes",
        admin.user_id, day, payload.start, payload.end, payload.interval_minutes
    );
    let day = template::validate_day_of_week(day)?;
    let times = template::generate_day_slots(&payload.start, &payload.end, payload.interval_minutes)?;

    let slots_created = database::replace_day_template(&state.pool, day, &times).await?;

    info!("{} slots generated for day {}.", slots_created, day);
    Ok(Json(TemplateGenerated {
        day_of_week: day,
        slots_created,
    }))
}

// --- Availability ---

#[derive(Deserialize, Debug)]
pub struct AvailabilityQuery {
    pub date: String,
    /// Reservation being rescheduled; its own slot counts as free.
    pub exclude: Option<i64>,
}

/// Loads the template and reservations of `date` and flags each slot.
async fn load_availability(
    state: &AppState,
    date: NaiveDate,
    exclude: Option<i64>,
    now: NaiveDateTime,
) -> Result<Vec<SlotView>, AppError> {
    let template = database::get_day_template(&state.pool, slots::day_of_week(date)).await?;
    if template.is_empty() {
        return Ok(Vec::new());
    }
    let reserved = database::get_reserved_starts(&state.pool, date, exclude).await?;
    Ok(slots::compute_availability(date, &template, &reserved, now))
}

pub async fn availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<SlotView>>, AppError> {
    let date = slots::parse_date(&query.date)?;
    let slots = load_availability(&state, date, query.exclude, local_now()).await?;
    debug!(
        "{} slots for {}, {} occupied.",
        slots.len(),
        date,
        slots.iter().filter(|s| s.is_occupied).count()
    );
    Ok(Json(slots))
}

// --- Reservations ---

/// Validates a booking request against the current availability and returns
/// the service and the start/end of the reservation.
async fn resolve_booking(
    state: &AppState,
    payload: &BookingPayload,
    exclude: Option<i64>,
) -> Result<(Service, NaiveDateTime, NaiveDateTime), AppError> {
    let time = template::parse_clock(&payload.time)?;
    let service = database::get_service(&state.pool, payload.service_id)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Service not found."))?;

    let slots = load_availability(state, payload.date, exclude, local_now()).await?;
    let Some(slot) = slots.iter().find(|s| s.time_of_day == time) else {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            &format!("{} is not offered on {}.", payload.time, payload.date),
        ));
    };
    if slot.is_occupied {
        return Err(slot_taken());
    }

    let start = payload.date.and_time(time);
    let end = policy::reservation_end(start, service.duration_minutes);
    Ok((service, start, end))
}

/// Handler for booking a slot.
pub async fn create_reservation(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(payload): Json<BookingPayload>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    debug!(
        "Received booking request from {} for {} at {}",
        session.user_id, payload.date, payload.time
    );
    let (service, start, end) = resolve_booking(&state, &payload, None).await?;

    let reservation =
        database::create_reservation(&state.pool, &session.user_id, service.id, start, end)
            .await?
            .ok_or_else(slot_taken)?;

    info!("Reservation created successfully with ID: {}", reservation.id);
    Ok((StatusCode::CREATED, Json(reservation)))
}

fn slot_taken() -> AppError {
    AppError::new(
        StatusCode::CONFLICT,
        "This time slot is no longer available.",
    )
}

fn reservation_not_found(reservation_id: i64) -> AppError {
    AppError::new(
        StatusCode::NOT_FOUND,
        &format!("Reservation with ID {reservation_id} not found."),
    )
}

/// Turns the outcome of a slot-claiming update into the handler's result.
fn check_slot_write(outcome: SlotWrite, reservation_id: i64) -> Result<(), AppError> {
    match outcome {
        SlotWrite::Updated => Ok(()),
        SlotWrite::Missing => Err(reservation_not_found(reservation_id)),
        SlotWrite::Taken => Err(slot_taken()),
    }
}

async fn find_reservation(state: &AppState, reservation_id: i64) -> Result<Reservation, AppError> {
    database::get_reservation(&state.pool, reservation_id)
        .await?
        .ok_or_else(|| reservation_not_found(reservation_id))
}

/// Handler for a customer moving their reservation to another slot.
pub async fn reschedule_reservation(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(reservation_id): Path<i64>,
    Json(payload): Json<BookingPayload>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = find_reservation(&state, reservation_id).await?;
    if reservation.customer_id != session.user_id {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "You can only reschedule your own reservations.",
        ));
    }
    policy::check_customer_change(reservation.start_at, reservation.status, local_now())?;

    let (service, start, end) = resolve_booking(&state, &payload, Some(reservation_id)).await?;
    let outcome =
        database::reschedule_reservation(&state.pool, reservation_id, service.id, start, end).await?;
    check_slot_write(outcome, reservation_id)?;

    info!("Reservation {} moved to {}.", reservation_id, start);
    Ok(Json(find_reservation(&state, reservation_id).await?))
}

/// Handler for cancelling a reservation. Customers are bound by the 24-hour
/// window, admins only by completion.
pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthSession(mut session): AuthSession,
    Path(reservation_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    debug!("Attempting to cancel reservation with ID: {}", reservation_id);
    let reservation = find_reservation(&state, reservation_id).await?;

    resolve_profile(&state, &mut session).await?;
    if session.is_admin() {
        policy::check_admin_change(reservation.status)?;
    } else if reservation.customer_id == session.user_id {
        policy::check_customer_change(reservation.start_at, reservation.status, local_now())?;
    } else {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "You can only cancel your own reservations.",
        ));
    }

    if database::delete_reservation(&state.pool, reservation_id).await? {
        info!("Reservation with ID {} cancelled successfully.", reservation_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        error!("Reservation with ID {} not found for cancellation.", reservation_id);
        Err(reservation_not_found(reservation_id))
    }
}

/// Handler for an admin confirming, completing or cancelling a reservation.
pub async fn update_reservation_status(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
    Path(reservation_id): Path<i64>,
    Json(payload): Json<StatusUpdatePayload>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = find_reservation(&state, reservation_id).await?;
    policy::check_admin_change(reservation.status)?;

    // Reviving a cancelled reservation claims its slot again; the store
    // refuses it when the slot has been rebooked meanwhile.
    let outcome =
        database::update_reservation_status(&state.pool, reservation_id, payload.status).await?;
    check_slot_write(outcome, reservation_id)?;

    info!(
        "Reservation {} moved from {} to {}.",
        reservation_id, reservation.status, payload.status
    );
    Ok(Json(Reservation {
        status: payload.status,
        ..reservation
    }))
}

pub async fn list_my_reservations(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<MyReservation>>, AppError> {
    let now = local_now();
    let reservations = database::list_customer_reservations(&state.pool, &session.user_id).await?;
    Ok(Json(
        reservations
            .into_iter()
            .map(|reservation| MyReservation {
                can_modify: policy::can_customer_change(reservation.start_at, reservation.status, now),
                reservation,
            })
            .collect(),
    ))
}

#[derive(Deserialize, Debug)]
pub struct DayQuery {
    pub date: Option<String>,
}

/// Handler for the admin's day view (today unless `date` is given).
pub async fn list_day_reservations(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<ReservationDetails>>, AppError> {
    let date = match query.date.as_deref() {
        Some(value) => slots::parse_date(value)?,
        None => local_now().date(),
    };
    let (from, to) = slots::day_bounds(date);
    let reservations = database::list_reservations_between(&state.pool, from, to).await?;
    info!("Successfully retrieved {} reservations for {}.", reservations.len(), date);
    Ok(Json(reservations))
}

// --- Dashboard ---

#[derive(Serialize, Deserialize, Debug)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub dashboard: Dashboard,
    pub colors: ChartColors,
}

pub async fn dashboard(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
) -> Result<Json<DashboardResponse>, AppError> {
    let entries = database::get_dashboard_entries(&state.pool).await?;
    let dashboard = Dashboard::build(&entries, local_now());
    let colors = colors::chart_colors(&dashboard);
    info!("Dashboard computed over {} reservations.", entries.len());
    Ok(Json(DashboardResponse { dashboard, colors }))
}

// --- Custom Error Handling ---

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    pub(crate) fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

/// Allows converting an `anyhow::Error` (coming from `database.rs`)
/// into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred.".to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, &err.to_string())
    }
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        ValidationError::from(err).into()
    }
}

impl From<ChangeDenied> for AppError {
    fn from(err: ChangeDenied) -> Self {
        let code = match err {
            ChangeDenied::AlreadyCompleted => StatusCode::CONFLICT,
            ChangeDenied::InsideWindow => StatusCode::FORBIDDEN,
        };
        Self::new(code, &err.to_string())
    }
}

impl From<Infallible> for AppError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use sqlx::SqlitePool;

    // Validation fails before any DB access, so an empty in-memory pool is enough.
    async fn test_state() -> AppState {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        AppState::new(pool, Duration::hours(1))
    }

    fn admin_session() -> Session {
        Session {
            token: "t".to_string(),
            user_id: "admin".to_string(),
            email: "admin@example.com".to_string(),
            profile: Some(Profile {
                id: "admin".to_string(),
                name: "Admin".to_string(),
                user_type: UserType::Admin,
            }),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn customer_session() -> Session {
        Session {
            token: "c".to_string(),
            user_id: "customer".to_string(),
            email: "ana@example.com".to_string(),
            profile: None,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_sign_up_validation_empty_name() {
        // Arrange
        let state = test_state().await;
        let payload = Json(SignUpPayload {
            name: "".to_string(),
            email: "ana@example.com".to_string(),
            password: "secret1".to_string(),
        });

        // Act
        let result = sign_up(State(state), payload).await;

        // Assert
        let err = result.unwrap_err();
        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Name is required.");
    }

    #[tokio::test]
    async fn test_generate_template_rejects_bad_time() {
        let state = test_state().await;
        let payload = Json(GenerateTemplatePayload {
            start: "9h".to_string(),
            end: "18:00".to_string(),
            interval_minutes: 30,
        });

        let result =
            generate_day_template(State(state), AdminSession(admin_session()), Path(1), payload).await;

        let err = result.unwrap_err();
        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("Use HH:MM"));
    }

    #[tokio::test]
    async fn test_generate_template_rejects_huge_interval() {
        let state = test_state().await;
        let payload = Json(GenerateTemplatePayload {
            start: "09:00".to_string(),
            end: "18:00".to_string(),
            interval_minutes: 9_000_000_000_000_000_000,
        });

        let result =
            generate_day_template(State(state), AdminSession(admin_session()), Path(1), payload).await;

        let err = result.unwrap_err();
        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("shorter than a day"));
    }

    #[test]
    fn test_slot_write_outcomes() {
        assert!(check_slot_write(SlotWrite::Updated, 1).is_ok());
        assert_eq!(check_slot_write(SlotWrite::Missing, 1).unwrap_err().code, StatusCode::NOT_FOUND);
        assert_eq!(check_slot_write(SlotWrite::Taken, 1).unwrap_err().code, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_generate_template_rejects_bad_day() {
        let state = test_state().await;
        let payload = Json(GenerateTemplatePayload {
            start: "09:00".to_string(),
            end: "18:00".to_string(),
            interval_minutes: 30,
        });

        let result =
            generate_day_template(State(state), AdminSession(admin_session()), Path(7), payload).await;

        assert_eq!(result.unwrap_err().code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_availability_rejects_malformed_date() {
        let state = test_state().await;
        let query = Query(AvailabilityQuery {
            date: "2025-13-01".to_string(),
            exclude: None,
        });

        let err = availability(State(state), query).await.unwrap_err();

        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("YYYY-MM-DD"));
    }

    #[tokio::test]
    async fn test_booking_rejects_malformed_time() {
        let state = test_state().await;
        let payload = Json(BookingPayload {
            service_id: 1,
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            time: "10".to_string(),
        });

        let err = create_reservation(State(state), AuthSession(customer_session()), payload)
            .await
            .unwrap_err();

        assert_eq!(err.code, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_change_denied_status_codes() {
        assert_eq!(AppError::from(ChangeDenied::AlreadyCompleted).code, StatusCode::CONFLICT);
        assert_eq!(AppError::from(ChangeDenied::InsideWindow).code, StatusCode::FORBIDDEN);
    }
}
