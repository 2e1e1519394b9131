use actix_web::{middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{logout_guard, provider_validator, AuthUser, Capability},
    db::{fetch_booking, log_activity, transition_booking},
    lifecycle::BookingAction,
    models::{BookingRow, BookingView},
    state::{AppState, ServerEvent},
};

#[derive(Clone, Debug, Serialize)]
struct StatCard {
    label: String,
    value: i64,
}

#[derive(Deserialize)]
struct BookingTab {
    tab: Option<String>,
}

#[derive(Deserialize)]
struct BookingActionInput {
    action: BookingAction,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/provider")
            .wrap(HttpAuthentication::basic(provider_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/bookings").route(web::get().to(list_bookings)))
            .service(
                web::resource("/bookings/{id}/action").route(web::post().to(apply_booking_action)),
            )
            .service(web::resource("/reviews").route(web::get().to(list_reviews))),
    );
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let total = count(
        "SELECT COUNT(*) FROM bookings WHERE provider_id = ?",
        &state,
        &auth.id,
    )
    .await;
    let pending = count(
        "SELECT COUNT(*) FROM bookings WHERE status = 'pending' AND (provider_id IS NULL OR provider_id = ?)",
        &state,
        &auth.id,
    )
    .await;
    let confirmed = count(
        "SELECT COUNT(*) FROM bookings WHERE provider_id = ? AND status = 'confirmed'",
        &state,
        &auth.id,
    )
    .await;
    let completed = count(
        "SELECT COUNT(*) FROM bookings WHERE provider_id = ? AND status = 'completed'",
        &state,
        &auth.id,
    )
    .await;

    let stats = vec![
        StatCard {
            label: "Total bookings".to_string(),
            value: total,
        },
        StatCard {
            label: "Open requests".to_string(),
            value: pending,
        },
        StatCard {
            label: "Confirmed".to_string(),
            value: confirmed,
        },
        StatCard {
            label: "Completed".to_string(),
            value: completed,
        },
    ];

    let rows = sqlx::query_as::<_, BookingRow>(
        r#"SELECT b.id, b.customer_id, b.provider_id, b.service_id, b.scheduled_for,
                  b.address, b.status, b.amount, b.notes, b.rating, b.review, b.requested_at,
                  c.display_name AS customer_name,
                  p.display_name AS provider_name,
                  s.name AS service_name
           FROM bookings b
           JOIN users c ON b.customer_id = c.id
           LEFT JOIN users p ON b.provider_id = p.id
           JOIN services s ON b.service_id = s.id
           WHERE b.provider_id = ?
           ORDER BY b.scheduled_for DESC
           LIMIT 8"#,
    )
    .bind(&auth.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let recent: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();

    Ok(HttpResponse::Ok().json(json!({
        "provider_name": auth.display_name,
        "stats": stats,
        "recent": recent,
    })))
}

async fn list_bookings(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<BookingTab>,
) -> Result<HttpResponse> {
    let requests = query.tab.as_deref() != Some("mine");
    let rows = if requests {
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
               WHERE b.status = 'pending' AND (b.provider_id IS NULL OR b.provider_id = ?)
               ORDER BY b.requested_at DESC"#,
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
               WHERE b.provider_id = ? AND b.status != 'pending'
               ORDER BY b.scheduled_for DESC"#,
        )
        .bind(&auth.id)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default()
    };

    let bookings: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(bookings))
}

async fn apply_booking_action(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    input: web::Json<BookingActionInput>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let action = input.into_inner().action;

    if !auth.can(Capability::ActOnBookings) {
        return Ok(HttpResponse::Forbidden().json(json!({ "error": "not allowed" })));
    }

    let row = match fetch_booking(&state.db, &booking_id).await {
        Some(row) => row,
        None => return Ok(HttpResponse::NotFound().json(json!({ "error": "booking not found" }))),
    };

    let can_edit = row.provider_id.is_none() || row.provider_id.as_deref() == Some(&auth.id);
    if !can_edit {
        return Ok(HttpResponse::Forbidden().json(json!({ "error": "not allowed" })));
    }

    let next = match row.status.apply(action) {
        Ok(next) => next,
        Err(err) => return Ok(HttpResponse::Conflict().json(json!({ "error": err.to_string() }))),
    };

    // Confirming claims an unassigned request.
    let assigned = if action == BookingAction::Confirm {
        Some(auth.id.clone())
    } else {
        row.provider_id.clone()
    };

    // Guarded on the status read above so two racing actions cannot both land.
    let moved = transition_booking(&state.db, &booking_id, row.status, next, assigned.as_deref())
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    if !moved {
        return Ok(HttpResponse::Conflict()
            .json(json!({ "error": "booking changed, reload and retry" })));
    }

    log_activity(
        &state.db,
        "provider_booking_action",
        &format!(
            "{} applied {} to booking {} ({} -> {}).",
            auth.display_name,
            action.as_str(),
            booking_id,
            row.status.as_str(),
            next.as_str()
        ),
        Some(&auth.id),
        Some(&booking_id),
    )
    .await;

    match fetch_booking(&state.db, &booking_id).await {
        Some(row) => {
            let _ = state
                .events
                .send(ServerEvent::from_row("booking_updated", row.clone()));
            Ok(HttpResponse::Ok().json(BookingView::from(row)))
        }
        None => Ok(HttpResponse::Ok().json(json!({ "ok": true }))),
    }
}

async fn list_reviews(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, BookingRow>(
        r#"SELECT b.id, b.customer_id, b.provider_id, b.service_id, b.scheduled_for,
                  b.address, b.status, b.amount, b.notes, b.rating, b.review, b.requested_at,
                  c.display_name AS customer_name,
                  p.display_name AS provider_name,
                  s.name AS service_name
           FROM bookings b
           JOIN users c ON b.customer_id = c.id
           LEFT JOIN users p ON b.provider_id = p.id
           JOIN services s ON b.service_id = s.id
           WHERE b.provider_id = ? AND b.status = 'completed' AND b.rating IS NOT NULL
           ORDER BY b.scheduled_for DESC"#,
    )
    .bind(&auth.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let reviews: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(reviews))
}

async fn count(query: &str, state: &web::Data<AppState>, param: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(query)
        .bind(param)
        .fetch_one(&state.db)
        .await
        .unwrap_or(0)
}
