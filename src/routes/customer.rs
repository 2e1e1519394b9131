use actix_web::{middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{customer_validator, logout_guard, new_id, AuthUser},
    db::{fetch_booking, log_activity, transition_booking},
    models::{
        BookingRow, BookingStatus, BookingView, PaymentKind, PaymentMethodRow, PaymentMethodView,
    },
    state::{AppState, ServerEvent},
};

#[derive(Deserialize)]
struct BookingTab {
    tab: Option<String>,
}

#[derive(Deserialize)]
struct BookingCreateInput {
    service_id: String,
    provider_id: Option<String>,
    scheduled_for: String,
    address: String,
    notes: Option<String>,
    amount: f64,
}

#[derive(Deserialize)]
struct ReviewInput {
    rating: i64,
    review: Option<String>,
}

#[derive(Deserialize)]
struct PaymentMethodInput {
    kind: PaymentKind,
    label: String,
    number: String,
    expiry: Option<String>,
    #[serde(default)]
    make_default: bool,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/customer")
            .wrap(HttpAuthentication::basic(customer_validator))
            .wrap(from_fn(logout_guard))
            .service(
                web::resource("/bookings")
                    .route(web::get().to(list_bookings))
                    .route(web::post().to(create_booking)),
            )
            .service(web::resource("/bookings/{id}").route(web::get().to(booking_detail)))
            .service(web::resource("/bookings/{id}/cancel").route(web::post().to(cancel_booking)))
            .service(web::resource("/bookings/{id}/review").route(web::post().to(review_booking)))
            .service(
                web::resource("/payment-methods")
                    .route(web::get().to(list_payment_methods))
                    .route(web::post().to(add_payment_method)),
            )
            .service(
                web::resource("/payment-methods/{id}/default")
                    .route(web::post().to(set_default_payment_method)),
            )
            .service(
                web::resource("/payment-methods/{id}")
                    .route(web::delete().to(delete_payment_method)),
            ),
    );
}

async fn list_bookings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<BookingTab>,
) -> Result<HttpResponse> {
    let past = query.tab.as_deref() == Some("past");
    let rows = if past {
        sqlx::query_as::<_, BookingRow>(
            r#"SELECT b.id, b.customer_id, b.provider_id, b.service_id, b.scheduled_for,
                      b.address, b.status, b.amount, b.notes, b.rating, b.review, b.requested_at,
                      c.display_name AS customer_name,
                      p.display_name AS provider_name,
                      s.name AS service_name
               FROM bookings b
               JOIN users c ON b.customer_id = c.id
               LEFT JOIN users p ON b.provider_id = p.id
               JOIN services s ON b.service_id = s.id
               WHERE b.customer_id = ? AND b.status IN ('completed', 'cancelled')
               ORDER BY b.scheduled_for DESC"#,
        )
        .bind(&auth.id)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default()
    } else {
        sqlx::query_as::<_, BookingRow>(
            r#"SELECT b.id, b.customer_id, b.provider_id, b.service_id, b.scheduled_for,
                      b.address, b.status, b.amount, b.notes, b.rating, b.review, b.requested_at,
                      c.display_name AS customer_name,
                      p.display_name AS provider_name,
                      s.name AS service_name
               FROM bookings b
               JOIN users c ON b.customer_id = c.id
               LEFT JOIN users p ON b.provider_id = p.id
               JOIN services s ON b.service_id = s.id
               WHERE b.customer_id = ? AND b.status IN ('pending', 'confirmed', 'in_progress')
               ORDER BY b.scheduled_for ASC"#,
        )
        .bind(&auth.id)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default()
    };

    let bookings: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(bookings))
}

async fn booking_detail(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let row = match fetch_booking(&state.db, &booking_id).await {
        Some(row) if row.customer_id == auth.id => row,
        _ => return Ok(HttpResponse::NotFound().json(json!({ "error": "booking not found" }))),
    };
    Ok(HttpResponse::Ok().json(BookingView::from(row)))
}

async fn create_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    input: web::Json<BookingCreateInput>,
) -> Result<HttpResponse> {
    let input = input.into_inner();
    let mut errors = Vec::new();
    if input.scheduled_for.trim().is_empty() {
        errors.push("Please pick a date and time.".to_string());
    }
    if input.address.trim().is_empty() {
        errors.push("Service address is required.".to_string());
    }
    if input.amount < 0.0 {
        errors.push("Amount cannot be negative.".to_string());
    }

    let service = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM services WHERE id = ? AND active = 1 LIMIT 1",
    )
    .bind(&input.service_id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);
    if service.is_none() {
        errors.push("Please select an available service.".to_string());
    }

    let provider_id = input
        .provider_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if let Some(provider_id) = provider_id.as_deref() {
        let provider = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM users WHERE id = ? AND role = 'provider' AND approval = 'approved' AND active = 1",
        )
        .bind(provider_id)
        .fetch_optional(&state.db)
        .await
        .unwrap_or(None);
        if provider.is_none() {
            errors.push("The requested provider is not available.".to_string());
        }
    }

    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let booking_id = new_id();
    sqlx::query(
        r#"INSERT INTO bookings
           (id, customer_id, provider_id, service_id, scheduled_for, address, status, amount, notes, requested_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&booking_id)
    .bind(&auth.id)
    .bind(&provider_id)
    .bind(&input.service_id)
    .bind(input.scheduled_for.trim())
    .bind(input.address.trim())
    .bind(BookingStatus::Pending.as_str())
    .bind(input.amount)
    .bind(&input.notes)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "booking_created",
        &format!("{} requested a new booking.", auth.display_name),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    let row = match fetch_booking(&state.db, &booking_id).await {
        Some(row) => row,
        None => {
            return Ok(
                HttpResponse::InternalServerError().json(json!({ "error": "booking lost" }))
            )
        }
    };
    let _ = state
        .events
        .send(ServerEvent::from_row("booking_created", row.clone()));

    Ok(HttpResponse::Created().json(BookingView::from(row)))
}

async fn cancel_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let row = match fetch_booking(&state.db, &booking_id).await {
        Some(row) if row.customer_id == auth.id => row,
        _ => return Ok(HttpResponse::NotFound().json(json!({ "error": "booking not found" }))),
    };

    if !row.status.can_transition_to(BookingStatus::Cancelled) {
        return Ok(HttpResponse::Conflict().json(json!({
            "error": format!("illegal transition from {} to cancelled", row.status.as_str())
        })));
    }

    // Guarded on the status read above so a racing confirm is not overwritten.
    let moved = transition_booking(
        &state.db,
        &booking_id,
        row.status,
        BookingStatus::Cancelled,
        row.provider_id.as_deref(),
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;
    if !moved {
        return Ok(HttpResponse::Conflict()
            .json(json!({ "error": "booking changed, reload and retry" })));
    }

    log_activity(
        &state.db,
        "booking_cancelled",
        &format!("{} cancelled booking {}.", auth.display_name, booking_id),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    if let Some(row) = fetch_booking(&state.db, &booking_id).await {
        let _ = state.events.send(ServerEvent::from_row("booking_updated", row.clone()));
        return Ok(HttpResponse::Ok().json(BookingView::from(row)));
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn review_booking(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    input: web::Json<ReviewInput>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let input = input.into_inner();

    if !(1..=5).contains(&input.rating) {
        return Ok(
            HttpResponse::BadRequest().json(json!({ "error": "rating must be between 1 and 5" }))
        );
    }

    let row = match fetch_booking(&state.db, &booking_id).await {
        Some(row) if row.customer_id == auth.id => row,
        _ => return Ok(HttpResponse::NotFound().json(json!({ "error": "booking not found" }))),
    };

    if row.status != BookingStatus::Completed {
        return Ok(HttpResponse::Conflict()
            .json(json!({ "error": "only completed bookings can be reviewed" })));
    }

    if row.rating.is_some() {
        return Ok(
            HttpResponse::Conflict().json(json!({ "error": "booking has already been reviewed" }))
        );
    }

    sqlx::query("UPDATE bookings SET rating = ?, review = ? WHERE id = ?")
        .bind(input.rating)
        .bind(&input.review)
        .bind(&booking_id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "booking_reviewed",
        &format!("{} rated booking {} {}/5.", auth.display_name, booking_id, input.rating),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    match fetch_booking(&state.db, &booking_id).await {
        Some(row) => Ok(HttpResponse::Ok().json(BookingView::from(row))),
        None => Ok(HttpResponse::Ok().json(json!({ "ok": true }))),
    }
}

async fn list_payment_methods(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, PaymentMethodRow>(
        r#"SELECT id, owner_id, kind, label, masked_number, expiry, is_default, created_at
           FROM payment_methods
           WHERE owner_id = ?
           ORDER BY is_default DESC, created_at"#,
    )
    .bind(&auth.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let methods: Vec<PaymentMethodView> = rows.into_iter().map(PaymentMethodView::from).collect();
    Ok(HttpResponse::Ok().json(methods))
}

async fn add_payment_method(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    input: web::Json<PaymentMethodInput>,
) -> Result<HttpResponse> {
    let input = input.into_inner();
    let mut errors = Vec::new();
    if input.label.trim().is_empty() {
        errors.push("A label is required.".to_string());
    }
    let digits: String = input.number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        errors.push("A card or account number is required.".to_string());
    }
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    // Only the last four digits are ever stored.
    let masked_number = format!("**** **** **** {}", &digits[digits.len() - 4..]);

    let method_id = new_id();
    sqlx::query(
        r#"INSERT INTO payment_methods (id, owner_id, kind, label, masked_number, expiry, is_default, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&method_id)
    .bind(&auth.id)
    .bind(&input.kind)
    .bind(input.label.trim())
    .bind(&masked_number)
    .bind(&input.expiry)
    .bind(if input.make_default { 1 } else { 0 })
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    if input.make_default {
        sqlx::query("UPDATE payment_methods SET is_default = 0 WHERE owner_id = ? AND id != ?")
            .bind(&auth.id)
            .bind(&method_id)
            .execute(&state.db)
            .await
            .map_err(actix_web::error::ErrorInternalServerError)?;
    }

    Ok(HttpResponse::Created().json(json!({ "id": method_id })))
}

async fn set_default_payment_method(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let method_id = path.into_inner();
    let result = sqlx::query("UPDATE payment_methods SET is_default = 1 WHERE id = ? AND owner_id = ?")
        .bind(&method_id)
        .bind(&auth.id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "payment method not found" })));
    }

    sqlx::query("UPDATE payment_methods SET is_default = 0 WHERE owner_id = ? AND id != ?")
        .bind(&auth.id)
        .bind(&method_id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn delete_payment_method(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let method_id = path.into_inner();
    let result = sqlx::query("DELETE FROM payment_methods WHERE id = ? AND owner_id = ?")
        .bind(&method_id)
        .bind(&auth.id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "payment method not found" })));
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}
