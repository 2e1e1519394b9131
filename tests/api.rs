use actix_web::{test, web, App};
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;

use servicehub::{
    auth::{hash_password, new_id},
    db,
    models::BookingStatus,
    routes,
    state::AppState,
};

const CUSTOMER_EMAIL: &str = "customer@email.com";
const CUSTOMER_PASSWORD: &str = "customer123";
const PROVIDER_EMAIL: &str = "provider@email.com";
const PROVIDER_PASSWORD: &str = "provider123";
const ADMIN_EMAIL: &str = "admin@services.com";
const ADMIN_PASSWORD: &str = "admin123";

struct Fixture {
    state: AppState,
    customer_id: String,
    provider_id: String,
    service_id: String,
}

async fn setup() -> Fixture {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let customer_id = insert_user(&pool, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, "John Customer", "customer", "approved").await;
    let provider_id = insert_user(&pool, PROVIDER_EMAIL, PROVIDER_PASSWORD, "Ahmed Provider", "provider", "approved").await;
    insert_user(&pool, ADMIN_EMAIL, ADMIN_PASSWORD, "Admin User", "admin", "approved").await;

    let service_id = new_id();
    sqlx::query(
        r#"INSERT INTO services (id, name, category, description, base_price, active, created_at)
           VALUES (?, 'Plumbing', 'Plumbing', 'Pipes and drains', 50, 1, '2026-01-01T00:00:00Z')"#,
    )
    .bind(&service_id)
    .execute(&pool)
    .await
    .unwrap();

    let (events, _) = broadcast::channel(16);
    Fixture {
        state: AppState { db: pool, events },
        customer_id,
        provider_id,
        service_id,
    }
}

async fn insert_user(
    pool: &sqlx::SqlitePool,
    email: &str,
    password: &str,
    display_name: &str,
    role: &str,
    approval: &str,
) -> String {
    let id = new_id();
    let password_hash = hash_password(password).unwrap();
    sqlx::query(
        r#"INSERT INTO users (id, email, display_name, role, password_hash, approval, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, '2026-01-01T00:00:00Z')"#,
    )
    .bind(&id)
    .bind(email)
    .bind(display_name)
    .bind(role)
    .bind(password_hash)
    .bind(approval)
    .execute(pool)
    .await
    .unwrap();
    id
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(routes::public::configure)
                .configure(routes::account::configure)
                .configure(routes::customer::configure)
                .configure(routes::provider::configure)
                .configure(routes::admin::configure),
        )
        .await
    };
}

fn basic(email: &str, password: &str) -> Authorization<Basic> {
    Authorization::from(Basic::new(email.to_string(), Some(password.to_string())))
}

async fn insert_booking(fixture: &Fixture, status: &str, provider: Option<&str>) -> String {
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO bookings
           (id, customer_id, provider_id, service_id, scheduled_for, address, status, amount, notes, requested_at)
           VALUES (?, ?, ?, ?, '2026-09-01T10:00:00Z', '123 Main Street', ?, 75, NULL, '2026-08-01T00:00:00Z')"#,
    )
    .bind(&id)
    .bind(&fixture.customer_id)
    .bind(provider)
    .bind(&fixture.service_id)
    .bind(status)
    .execute(&fixture.state.db)
    .await
    .unwrap();
    id
}

#[actix_web::test]
async fn login_returns_session_for_exact_credentials() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let req = test::TestRequest::get()
        .uri("/login")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["role"], "customer");
    assert_eq!(body["email"], CUSTOMER_EMAIL);
    assert!(body["capabilities"]
        .as_array()
        .unwrap()
        .contains(&json!("book_services")));

    let req = test::TestRequest::get()
        .uri("/login")
        .insert_header(basic(CUSTOMER_EMAIL, "wrong-password"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn login_requires_role_specific_email() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    // Provider credentials never open the customer tree.
    let req = test::TestRequest::get()
        .uri("/customer/bookings")
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn logout_blocks_replayed_credentials_until_login() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let req = test::TestRequest::post().uri("/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let cookie = resp.response().cookies().next().unwrap().into_owned();

    let req = test::TestRequest::get()
        .uri("/customer/bookings")
        .cookie(cookie)
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn booking_walks_the_full_lifecycle() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let req = test::TestRequest::post()
        .uri("/customer/bookings")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({
            "service_id": fixture.service_id,
            "scheduled_for": "2026-09-01T10:00:00Z",
            "address": "123 Main Street",
            "amount": 75.0,
            "notes": "Kitchen sink is leaking"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "pending");
    let booking_id = body["id"].as_str().unwrap().to_string();

    for (action, expected) in [
        ("confirm", "confirmed"),
        ("start", "in_progress"),
        ("complete", "completed"),
    ] {
        let req = test::TestRequest::post()
            .uri(&format!("/provider/bookings/{booking_id}/action"))
            .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
            .set_json(json!({ "action": action }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], expected, "after {action}");
    }

    // Confirm claimed the booking for this provider.
    let row: (Option<String>,) = sqlx::query_as("SELECT provider_id FROM bookings WHERE id = ?")
        .bind(&booking_id)
        .fetch_one(&fixture.state.db)
        .await
        .unwrap();
    assert_eq!(row.0.as_deref(), Some(fixture.provider_id.as_str()));
}

#[actix_web::test]
async fn decline_cancels_a_pending_request() {
    let fixture = setup().await;
    let app = app!(fixture.state);
    let booking_id = insert_booking(&fixture, "pending", None).await;

    let req = test::TestRequest::post()
        .uri(&format!("/provider/bookings/{booking_id}/action"))
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .set_json(json!({ "action": "decline" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "cancelled");
}

#[actix_web::test]
async fn illegal_transitions_are_rejected_and_change_nothing() {
    let fixture = setup().await;
    let app = app!(fixture.state);
    let booking_id = insert_booking(&fixture, "pending", None).await;

    // Complete is only valid from in_progress.
    let req = test::TestRequest::post()
        .uri(&format!("/provider/bookings/{booking_id}/action"))
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .set_json(json!({ "action": "complete" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let status: (String,) = sqlx::query_as("SELECT status FROM bookings WHERE id = ?")
        .bind(&booking_id)
        .fetch_one(&fixture.state.db)
        .await
        .unwrap();
    assert_eq!(status.0, "pending");

    // A stale double-confirm is also rejected.
    let confirmed = insert_booking(&fixture, "confirmed", Some(&fixture.provider_id)).await;
    let req = test::TestRequest::post()
        .uri(&format!("/provider/bookings/{confirmed}/action"))
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .set_json(json!({ "action": "confirm" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_web::test]
async fn foreign_providers_cannot_touch_assigned_bookings() {
    let fixture = setup().await;
    let other = insert_user(
        &fixture.state.db,
        "other@email.com",
        "other123",
        "Other Provider",
        "provider",
        "approved",
    )
    .await;
    let app = app!(fixture.state);
    let booking_id = insert_booking(&fixture, "confirmed", Some(&other)).await;

    let req = test::TestRequest::post()
        .uri(&format!("/provider/bookings/{booking_id}/action"))
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .set_json(json!({ "action": "start" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn upcoming_and_past_tabs_partition_bookings() {
    let fixture = setup().await;
    let app = app!(fixture.state);
    for status in ["pending", "confirmed", "in_progress", "completed", "cancelled"] {
        insert_booking(&fixture, status, None).await;
    }

    let req = test::TestRequest::get()
        .uri("/customer/bookings")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let upcoming: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(upcoming.as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri("/customer/bookings?tab=past")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let past: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(past.as_array().unwrap().len(), 2);
    for booking in past.as_array().unwrap() {
        assert!(booking["status"] == "completed" || booking["status"] == "cancelled");
    }
}

#[actix_web::test]
async fn review_requires_a_completed_booking() {
    let fixture = setup().await;
    let app = app!(fixture.state);
    let pending = insert_booking(&fixture, "pending", None).await;
    let completed = insert_booking(&fixture, "completed", Some(&fixture.provider_id)).await;

    let req = test::TestRequest::post()
        .uri(&format!("/customer/bookings/{pending}/review"))
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({ "rating": 5 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let req = test::TestRequest::post()
        .uri(&format!("/customer/bookings/{completed}/review"))
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({ "rating": 5, "review": "Excellent service, very professional!" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["rating"], 5);
}

#[actix_web::test]
async fn service_toggle_flips_only_the_active_flag() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let req = test::TestRequest::post()
        .uri(&format!("/admin/services/{}/toggle", fixture.service_id))
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["active"], false);

    let req = test::TestRequest::get()
        .uri("/admin/services")
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .to_request();
    let services: Value = test::call_and_read_body_json(&app, req).await;
    let service = &services.as_array().unwrap()[0];
    assert_eq!(service["active"], false);
    assert_eq!(service["name"], "Plumbing");
    assert_eq!(service["base_price"], 50.0);

    // Inactive services disappear from the public catalog.
    let req = test::TestRequest::get().uri("/services").to_request();
    let catalog: Value = test::call_and_read_body_json(&app, req).await;
    assert!(catalog.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn payment_method_default_is_exclusive_and_delete_removes_one() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let mut ids = Vec::new();
    for (label, number, default) in [
        ("Visa Card", "4111 1111 1111 1234", true),
        ("Mastercard", "5500 0000 0000 5678", false),
    ] {
        let req = test::TestRequest::post()
            .uri("/customer/payment-methods")
            .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
            .set_json(json!({
                "kind": "card",
                "label": label,
                "number": number,
                "expiry": "12/27",
                "make_default": default
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let req = test::TestRequest::post()
        .uri(&format!("/customer/payment-methods/{}/default", ids[1]))
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri("/customer/payment-methods")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let methods: Value = test::call_and_read_body_json(&app, req).await;
    let methods = methods.as_array().unwrap();
    assert_eq!(methods.len(), 2);
    let defaults: Vec<_> = methods.iter().filter(|m| m["is_default"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["label"], "Mastercard");
    assert_eq!(defaults[0]["masked_number"], "**** **** **** 5678");

    let req = test::TestRequest::delete()
        .uri(&format!("/customer/payment-methods/{}", ids[0]))
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri("/customer/payment-methods")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let methods: Value = test::call_and_read_body_json(&app, req).await;
    let methods = methods.as_array().unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0]["label"], "Mastercard");
}

#[actix_web::test]
async fn approval_decisions_only_apply_to_pending_users() {
    let fixture = setup().await;
    let pending = insert_user(
        &fixture.state.db,
        "new.provider@email.com",
        "changeme1",
        "Lisa Chen",
        "provider",
        "pending",
    )
    .await;
    let app = app!(fixture.state);

    // Unapproved accounts cannot authenticate.
    let req = test::TestRequest::get()
        .uri("/login")
        .insert_header(basic("new.provider@email.com", "changeme1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri(&format!("/admin/users/{pending}/approval"))
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .set_json(json!({ "decision": "approve" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["approval"], "approved");

    // Approval is not revisited once decided.
    let req = test::TestRequest::post()
        .uri(&format!("/admin/users/{pending}/approval"))
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .set_json(json!({ "decision": "reject" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    // And the approved provider can now log in.
    let req = test::TestRequest::get()
        .uri("/login")
        .insert_header(basic("new.provider@email.com", "changeme1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn booking_creation_validates_its_inputs() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let req = test::TestRequest::post()
        .uri("/customer/bookings")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({
            "service_id": "no-such-service",
            "scheduled_for": "",
            "address": "   ",
            "amount": -5.0
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"].as_array().unwrap().len(), 4);
}

#[actix_web::test]
async fn document_acceptance_toggles() {
    let fixture = setup().await;
    sqlx::query(
        r#"INSERT INTO legal_documents (id, title, version, body, updated_at)
           VALUES ('terms_of_service', 'Terms of Service', '1.0', 'Terms body', '2026-01-01T00:00:00Z')"#,
    )
    .execute(&fixture.state.db)
    .await
    .unwrap();
    let app = app!(fixture.state);

    let req = test::TestRequest::post()
        .uri("/account/documents/terms_of_service/acceptance")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["accepted"], true);

    let req = test::TestRequest::get()
        .uri("/account/documents")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let documents: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(documents.as_array().unwrap()[0]["accepted"], true);

    let req = test::TestRequest::post()
        .uri("/account/documents/terms_of_service/acceptance")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["accepted"], false);
}

#[actix_web::test]
async fn ticket_status_follows_its_transition_table() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let req = test::TestRequest::post()
        .uri("/account/tickets")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({
            "title": "Payment failed",
            "body": "The app says my payment did not go through.",
            "priority": "high"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let ticket_id = body["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/admin/tickets/{ticket_id}/status"))
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .set_json(json!({ "status": "resolved" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "resolved");

    // Resolved tickets never reopen.
    let req = test::TestRequest::post()
        .uri(&format!("/admin/tickets/{ticket_id}/status"))
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .set_json(json!({ "status": "open" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_web::test]
async fn providers_share_the_support_and_documents_surface() {
    let fixture = setup().await;
    sqlx::query(
        r#"INSERT INTO legal_documents (id, title, version, body, updated_at)
           VALUES ('terms_of_service', 'Terms of Service', '1.0', 'Terms body', '2026-01-01T00:00:00Z')"#,
    )
    .execute(&fixture.state.db)
    .await
    .unwrap();
    let app = app!(fixture.state);

    let req = test::TestRequest::post()
        .uri("/account/tickets")
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .set_json(json!({
            "title": "Payout delayed",
            "body": "Last week's payout has not arrived."
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::get()
        .uri("/account/tickets")
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .to_request();
    let tickets: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tickets.as_array().unwrap().len(), 1);
    assert_eq!(tickets.as_array().unwrap()[0]["title"], "Payout delayed");

    let req = test::TestRequest::post()
        .uri("/account/documents/terms_of_service/acceptance")
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["accepted"], true);

    // Admins hold neither capability on this surface.
    let req = test::TestRequest::post()
        .uri("/account/tickets")
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .set_json(json!({ "title": "x", "body": "y" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn admin_confirm_assigns_the_named_provider() {
    let fixture = setup().await;
    let app = app!(fixture.state);
    let booking_id = insert_booking(&fixture, "pending", None).await;

    // An unassigned request cannot be confirmed into limbo.
    let req = test::TestRequest::post()
        .uri(&format!("/admin/bookings/{booking_id}/action"))
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .set_json(json!({ "action": "confirm" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri(&format!("/admin/bookings/{booking_id}/action"))
        .insert_header(basic(ADMIN_EMAIL, ADMIN_PASSWORD))
        .set_json(json!({ "action": "confirm", "provider_id": fixture.provider_id }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["provider_id"], fixture.provider_id.as_str());

    // The assigned provider drives the rest and the booking stays theirs.
    for action in ["start", "complete"] {
        let req = test::TestRequest::post()
            .uri(&format!("/provider/bookings/{booking_id}/action"))
            .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
            .set_json(json!({ "action": action }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200, "after {action}");
    }

    let req = test::TestRequest::get()
        .uri("/provider/bookings?tab=mine")
        .insert_header(basic(PROVIDER_EMAIL, PROVIDER_PASSWORD))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["id"], booking_id.as_str());
    assert_eq!(mine[0]["status"], "completed");
}

#[actix_web::test]
async fn stale_status_snapshots_never_overwrite() {
    let fixture = setup().await;
    let booking_id = insert_booking(&fixture, "cancelled", None).await;

    // A writer that last saw the booking as pending loses to the cancel.
    let moved = db::transition_booking(
        &fixture.state.db,
        &booking_id,
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        Some(&fixture.provider_id),
    )
    .await
    .unwrap();
    assert!(!moved);

    let row: (String, Option<String>) =
        sqlx::query_as("SELECT status, provider_id FROM bookings WHERE id = ?")
            .bind(&booking_id)
            .fetch_one(&fixture.state.db)
            .await
            .unwrap();
    assert_eq!(row.0, "cancelled");
    assert_eq!(row.1, None);
}

#[actix_web::test]
async fn repeat_reviews_are_rejected() {
    let fixture = setup().await;
    let app = app!(fixture.state);
    let booking_id = insert_booking(&fixture, "completed", Some(&fixture.provider_id)).await;

    let req = test::TestRequest::post()
        .uri(&format!("/customer/bookings/{booking_id}/review"))
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({ "rating": 4, "review": "Good work" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["rating"], 4);

    let req = test::TestRequest::post()
        .uri(&format!("/customer/bookings/{booking_id}/review"))
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({ "rating": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let row: (i64, Option<String>) =
        sqlx::query_as("SELECT rating, review FROM bookings WHERE id = ?")
            .bind(&booking_id)
            .fetch_one(&fixture.state.db)
            .await
            .unwrap();
    assert_eq!(row.0, 4);
    assert_eq!(row.1.as_deref(), Some("Good work"));
}

#[actix_web::test]
async fn profile_updates_stick_and_keep_emails_unique() {
    let fixture = setup().await;
    let app = app!(fixture.state);

    let req = test::TestRequest::get()
        .uri("/account/profile")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["email"], CUSTOMER_EMAIL);
    assert_eq!(body["phone"], Value::Null);

    let req = test::TestRequest::put()
        .uri("/account/profile")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({
            "display_name": "John Q. Customer",
            "email": CUSTOMER_EMAIL,
            "phone": "+971 50 123 4567",
            "location": "Dubai Marina"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["display_name"], "John Q. Customer");
    assert_eq!(body["phone"], "+971 50 123 4567");
    assert_eq!(body["location"], "Dubai Marina");

    // Another account's email is off limits.
    let req = test::TestRequest::put()
        .uri("/account/profile")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({
            "display_name": "John Q. Customer",
            "email": PROVIDER_EMAIL
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // A blank name never lands either.
    let req = test::TestRequest::put()
        .uri("/account/profile")
        .insert_header(basic(CUSTOMER_EMAIL, CUSTOMER_PASSWORD))
        .set_json(json!({ "display_name": "  ", "email": CUSTOMER_EMAIL }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}
