// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use http_body_util::BodyExt; // For `collect`
use serde_json::{Value, json};
use server::{config::AdminSeed, database, routes::create_router, state::AppState};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tower::ServiceExt; // For `oneshot`

const ADMIN_EMAIL: &str = "admin@test.local";
const ADMIN_PASSWORD: &str = "admin-secret";

/// Helper function to set up a fresh, seeded in-memory database for each test.
async fn setup_test_app() -> (Router, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory SQLite");
    database::init_schema(&pool)
        .await
        .expect("Failed to create schema in test DB");
    database::seed_defaults(
        &pool,
        &AdminSeed {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            name: "Admin".to_string(),
        },
    )
    .await
    .expect("Failed to seed test DB");

    let app = create_router(AppState::new(pool.clone(), Duration::hours(1)));
    (app, pool)
}

/// Sends one request and returns the status and the decoded JSON body
/// (`Null` for empty bodies).
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn sign_in(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/sign-in",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "sign-in failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

/// Registers a customer and returns `(user_id, token)`.
async fn sign_up_customer(app: &Router, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/sign-up",
        None,
        Some(json!({ "name": "Ana", "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "sign-up failed: {body}");
    let user_id = body["id"].as_str().unwrap().to_string();
    (user_id, sign_in(app, email, "secret1").await)
}

/// A Monday at least a few days ahead, safely outside the 24-hour window.
fn next_monday() -> NaiveDate {
    let mut date = Local::now().date_naive() + Duration::days(3);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

/// Opens Mondays from 09:00 to 18:00 every 30 minutes.
async fn open_mondays(app: &Router, admin: &str) {
    let (status, body) = send(
        app,
        "PUT",
        "/api/templates/1",
        Some(admin),
        Some(json!({ "start": "09:00", "end": "18:00", "interval_minutes": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "template failed: {body}");
}

async fn book(app: &Router, token: &str, date: NaiveDate, time: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/reservations",
        Some(token),
        Some(json!({ "service_id": 1, "date": date.to_string(), "time": time })),
    )
    .await
}

fn slot<'a>(slots: &'a Value, time: &str) -> &'a Value {
    slots
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["time_of_day"].as_str().unwrap().starts_with(time))
        .unwrap()
}

#[tokio::test]
async fn test_sign_up_sign_in_and_me() {
    let (app, _pool) = setup_test_app().await;

    let (user_id, token) = sign_up_customer(&app, "ana@example.com").await;
    let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id.as_str());
    assert_eq!(me["profile"]["user_type"], "customer");

    // Same email again
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/sign-up",
        None,
        Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/api/auth/sign-out", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_in_with_wrong_password() {
    let (app, _pool) = setup_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/sign-in",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Incorrect email or password.");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let (app, pool) = setup_test_app().await;
    let (user_id, token) = sign_up_customer(&app, "ana@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/password-reset",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // The link would be mailed; plant a known token directly.
    database::store_reset_token(&pool, "reset-1", &user_id, chrono::Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/password-reset/confirm",
        None,
        Some(json!({ "token": "reset-1", "new_password": "newsecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Old sessions are closed and the token is single-use.
    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/password-reset/confirm",
        None,
        Some(json!({ "token": "reset-1", "new_password": "another1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    sign_in(&app, "ana@example.com", "newsecret").await;
}

#[tokio::test]
async fn test_template_generation_requires_admin() {
    let (app, _pool) = setup_test_app().await;
    let (_, customer) = sign_up_customer(&app, "ana@example.com").await;
    let payload = json!({ "start": "09:00", "end": "18:00", "interval_minutes": 30 });

    let (status, _) = send(&app, "PUT", "/api/templates/1", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "PUT", "/api/templates/1", Some(&customer), Some(payload)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_generate_template_and_read_it_back() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/templates/1",
        Some(&admin),
        Some(json!({ "start": "09:00", "end": "18:00", "interval_minutes": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slots_created"], 18);

    // Regenerating replaces the day instead of adding to it.
    let (_, body) = send(
        &app,
        "PUT",
        "/api/templates/1",
        Some(&admin),
        Some(json!({ "start": "10:00", "end": "12:00", "interval_minutes": 60 })),
    )
    .await;
    assert_eq!(body["slots_created"], 2);

    let (status, slots) = send(&app, "GET", "/api/templates/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let times: Vec<&str> = slots
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["time_of_day"].as_str().unwrap())
        .collect();
    assert_eq!(times, vec!["10:00:00", "11:00:00"]);
}

#[tokio::test]
async fn test_booking_marks_slot_occupied_and_rejects_double_booking() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let (_, bia) = sign_up_customer(&app, "bia@example.com").await;
    let monday = next_monday();
    let uri = format!("/api/availability?date={monday}");

    let (_, slots) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(slots.as_array().unwrap().len(), 18);
    assert_eq!(slot(&slots, "10:00")["is_occupied"], false);

    let (status, reservation) = book(&app, &ana, monday, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["status"], "scheduled");

    let (_, slots) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(slot(&slots, "10:00")["is_occupied"], true);
    assert_eq!(slot(&slots, "10:30")["is_occupied"], false);

    let (status, _) = book(&app, &bia, monday, "10:00").await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Not part of the template
    let (status, _) = book(&app, &bia, monday, "10:15").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_closed_day_has_no_slots() {
    let (app, _pool) = setup_test_app().await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let monday = next_monday();

    let (status, slots) = send(&app, "GET", &format!("/api/availability?date={monday}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(slots.as_array().unwrap().is_empty());

    let (status, _) = book(&app, &ana, monday, "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancelled_reservation_frees_its_slot() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let monday = next_monday();

    let (_, reservation) = book(&app, &ana, monday, "11:00").await;
    let id = reservation["id"].as_i64().unwrap();

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/api/reservations/{id}/status"),
        Some(&admin),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "cancelled");

    let (_, slots) = send(&app, "GET", &format!("/api/availability?date={monday}"), None, None).await;
    assert_eq!(slot(&slots, "11:00")["is_occupied"], false);
}

#[tokio::test]
async fn test_cancelled_reservation_cannot_reclaim_rebooked_slot() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let (_, bia) = sign_up_customer(&app, "bia@example.com").await;
    let monday = next_monday();

    let (_, reservation) = book(&app, &ana, monday, "11:00").await;
    let status_uri = format!("/api/reservations/{}/status", reservation["id"]);
    let (status, _) = send(&app, "PATCH", &status_uri, Some(&admin), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = book(&app, &bia, monday, "11:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "PATCH", &status_uri, Some(&admin), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, day) = send(&app, "GET", &format!("/api/reservations?date={monday}"), Some(&admin), None).await;
    let active: Vec<&Value> = day
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["status"] != "cancelled")
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["status"], "scheduled");
}

#[tokio::test]
async fn test_cancelled_reservation_revives_while_slot_is_free() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let monday = next_monday();

    let (_, reservation) = book(&app, &ana, monday, "13:00").await;
    let status_uri = format!("/api/reservations/{}/status", reservation["id"]);
    send(&app, "PATCH", &status_uri, Some(&admin), Some(json!({ "status": "cancelled" }))).await;

    let (status, revived) = send(&app, "PATCH", &status_uri, Some(&admin), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revived["status"], "confirmed");

    let (_, slots) = send(&app, "GET", &format!("/api/availability?date={monday}"), None, None).await;
    assert_eq!(slot(&slots, "13:00")["is_occupied"], true);
}

#[tokio::test]
async fn test_status_update_on_missing_reservation() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _) = send(
        &app,
        "PATCH",
        "/api/reservations/4242/status",
        Some(&admin),
        Some(json!({ "status": "confirmed" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_huge_template_interval_is_rejected() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/templates/1",
        Some(&admin),
        Some(json!({ "start": "09:00", "end": "18:00", "interval_minutes": 9_000_000_000_000_000_000i64 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("shorter than a day"));
}

#[tokio::test]
async fn test_reschedule_moves_reservation() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let (_, bia) = sign_up_customer(&app, "bia@example.com").await;
    let monday = next_monday();

    let (_, reservation) = book(&app, &ana, monday, "09:00").await;
    let id = reservation["id"].as_i64().unwrap();
    let payload = json!({ "service_id": 2, "date": monday.to_string(), "time": "14:00" });

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/reservations/{id}"),
        Some(&bia),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, moved) = send(&app, "PUT", &format!("/api/reservations/{id}"), Some(&ana), Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["service_id"], 2);
    assert_eq!(moved["status"], "scheduled");

    // Its own slot does not block it when shown as excluded.
    let (_, slots) = send(
        &app,
        "GET",
        &format!("/api/availability?date={monday}&exclude={id}"),
        None,
        None,
    )
    .await;
    assert_eq!(slot(&slots, "14:00")["is_occupied"], false);
    assert_eq!(slot(&slots, "09:00")["is_occupied"], false);
}

#[tokio::test]
async fn test_customer_cannot_cancel_inside_window() {
    let (app, pool) = setup_test_app().await;
    let (ana_id, ana) = sign_up_customer(&app, "ana@example.com").await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let soon = Local::now().naive_local() + Duration::hours(2);
    let reservation =
        database::create_reservation(&pool, &ana_id, 1, soon, soon + Duration::minutes(30))
            .await
            .unwrap()
            .unwrap();

    let (status, mine) = send(&app, "GET", "/api/reservations/mine", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine[0]["can_modify"], false);

    let uri = format!("/api/reservations/{}", reservation.id);
    let (status, body) = send(&app, "DELETE", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("24"));

    // Admins are not bound by the window.
    let (status, _) = send(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_customer_cancels_ahead_of_time() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let (_, bia) = sign_up_customer(&app, "bia@example.com").await;
    let monday = next_monday();

    let (_, reservation) = book(&app, &ana, monday, "15:00").await;
    let uri = format!("/api/reservations/{}", reservation["id"]);

    let (status, _) = send(&app, "DELETE", &uri, Some(&bia), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_completed_reservation_is_frozen() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;

    let (_, reservation) = book(&app, &ana, next_monday(), "16:00").await;
    let id = reservation["id"].as_i64().unwrap();
    let status_uri = format!("/api/reservations/{id}/status");

    let (status, _) = send(&app, "PATCH", &status_uri, Some(&admin), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "PATCH", &status_uri, Some(&admin), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, "DELETE", &format!("/api/reservations/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_day_view() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let monday = next_monday();
    book(&app, &ana, monday, "12:00").await;
    book(&app, &ana, monday, "09:30").await;

    let uri = format!("/api/reservations?date={monday}");
    let (status, _) = send(&app, "GET", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, day) = send(&app, "GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let day = day.as_array().unwrap();
    assert_eq!(day.len(), 2);
    assert_eq!(day[0]["customer_name"], "Ana");
    assert_eq!(day[0]["service_name"], "Haircut");
    assert!(day[0]["start_at"].as_str().unwrap().ends_with("09:30:00"));
}

#[tokio::test]
async fn test_dashboard_counts_only_completed_revenue() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    open_mondays(&app, &admin).await;
    let (_, ana) = sign_up_customer(&app, "ana@example.com").await;
    let monday = next_monday();

    let (_, done) = book(&app, &ana, monday, "09:00").await;
    book(&app, &ana, monday, "10:00").await;
    send(
        &app,
        "PATCH",
        &format!("/api/reservations/{}/status", done["id"]),
        Some(&admin),
        Some(json!({ "status": "completed" })),
    )
    .await;

    let (status, _) = send(&app, "GET", "/api/dashboard", Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, dashboard) = send(&app, "GET", "/api/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["metrics"]["total"], 2);
    assert_eq!(dashboard["metrics"]["completed"], 1);
    assert_eq!(dashboard["metrics"]["total_revenue"], 40.0);
    assert_eq!(dashboard["metrics"]["completion_rate"], 50.0);
    assert_eq!(dashboard["services"][0]["name"], "Haircut");
    assert_eq!(dashboard["services"][0]["count"], 2);
    assert_eq!(dashboard["colors"]["statuses"]["completed"], "#4CAF50");
}

#[tokio::test]
async fn test_profile_visibility() {
    let (app, _pool) = setup_test_app().await;
    let admin = sign_in(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (ana_id, ana) = sign_up_customer(&app, "ana@example.com").await;
    let (bia_id, _) = sign_up_customer(&app, "bia@example.com").await;

    let (status, profile) = send(&app, "GET", &format!("/api/profiles/{ana_id}"), Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Ana");

    let (status, _) = send(&app, "GET", &format!("/api/profiles/{bia_id}"), Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", &format!("/api/profiles/{bia_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_services_is_public() {
    let (app, _pool) = setup_test_app().await;

    let (status, services) = send(&app, "GET", "/api/services", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(services.as_array().unwrap().len(), 3);
}
