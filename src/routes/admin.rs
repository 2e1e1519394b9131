use actix_web::{middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{admin_validator, logout_guard, new_id, AuthUser},
    db::{fetch_booking, log_activity, transition_booking},
    lifecycle::BookingAction,
    models::{
        ActivityRow, ApprovalStatus, BookingRow, BookingStatus, BookingView, Role, ServiceRow,
        ServiceView, SupportTicketRow, SupportTicketView, TicketStatus, UserRow, UserView,
    },
    state::{AppState, ServerEvent},
};

#[derive(Clone, Debug, Serialize)]
struct StatCard {
    label: String,
    value: i64,
}

#[derive(Clone, Debug, Serialize)]
struct ActivityView {
    message: String,
    created_at: String,
}

#[derive(Deserialize)]
struct UserFilter {
    role: Option<Role>,
    approval: Option<ApprovalStatus>,
    q: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ApprovalDecision {
    Approve,
    Reject,
}

#[derive(Deserialize)]
struct ApprovalInput {
    decision: ApprovalDecision,
}

#[derive(Deserialize)]
struct BookingFilter {
    status: Option<BookingStatus>,
}

#[derive(Deserialize)]
struct BookingActionInput {
    action: BookingAction,
    provider_id: Option<String>,
}

#[derive(Deserialize)]
struct ServiceInput {
    name: String,
    category: String,
    description: Option<String>,
    base_price: f64,
}

#[derive(Deserialize)]
struct TicketStatusInput {
    status: TicketStatus,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/users").route(web::get().to(list_users)))
            .service(web::resource("/users/{id}/approval").route(web::post().to(decide_approval)))
            .service(web::resource("/bookings").route(web::get().to(list_bookings)))
            .service(web::resource("/bookings/{id}").route(web::get().to(booking_detail)))
            .service(
                web::resource("/bookings/{id}/action").route(web::post().to(apply_booking_action)),
            )
            .service(
                web::resource("/services")
                    .route(web::get().to(list_services))
                    .route(web::post().to(create_service)),
            )
            .service(
                web::resource("/services/{id}")
                    .route(web::put().to(update_service))
                    .route(web::delete().to(delete_service)),
            )
            .service(web::resource("/services/{id}/toggle").route(web::post().to(toggle_service)))
            .service(web::resource("/tickets").route(web::get().to(list_tickets)))
            .service(web::resource("/tickets/{id}/status").route(web::post().to(update_ticket_status))),
    );
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let total = count("SELECT COUNT(*) FROM bookings", &state).await;
    let pending = count("SELECT COUNT(*) FROM bookings WHERE status = 'pending'", &state).await;
    let in_flight = count(
        "SELECT COUNT(*) FROM bookings WHERE status IN ('confirmed', 'in_progress')",
        &state,
    )
    .await;
    let completed = count("SELECT COUNT(*) FROM bookings WHERE status = 'completed'", &state).await;
    let awaiting_approval =
        count("SELECT COUNT(*) FROM users WHERE approval = 'pending'", &state).await;

    let stats = vec![
        StatCard {
            label: "Total bookings".to_string(),
            value: total,
        },
        StatCard {
            label: "Pending review".to_string(),
            value: pending,
        },
        StatCard {
            label: "In flight".to_string(),
            value: in_flight,
        },
        StatCard {
            label: "Completed".to_string(),
            value: completed,
        },
        StatCard {
            label: "Users awaiting approval".to_string(),
            value: awaiting_approval,
        },
    ];

    let activity_rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities ORDER BY created_at DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let activities: Vec<ActivityView> = activity_rows
        .into_iter()
        .map(|row| ActivityView {
            message: row.message,
            created_at: row.created_at,
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "admin_name": auth.display_name,
        "stats": stats,
        "activities": activities,
    })))
}

async fn list_users(
    state: web::Data<AppState>,
    query: web::Query<UserFilter>,
) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, display_name, role, password_hash, phone, avatar_url,
                  location, approval, active, created_at
           FROM users
           ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let needle = query.q.as_deref().unwrap_or("").trim().to_lowercase();
    let users: Vec<UserView> = rows
        .into_iter()
        .filter(|row| query.role.map_or(true, |role| row.role == role))
        .filter(|row| query.approval.map_or(true, |approval| row.approval == approval))
        .filter(|row| {
            needle.is_empty()
                || row.display_name.to_lowercase().contains(&needle)
                || row.email.to_lowercase().contains(&needle)
        })
        .map(UserView::from)
        .collect();

    Ok(HttpResponse::Ok().json(users))
}

async fn decide_approval(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    input: web::Json<ApprovalInput>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let target = match input.into_inner().decision {
        ApprovalDecision::Approve => ApprovalStatus::Approved,
        ApprovalDecision::Reject => ApprovalStatus::Rejected,
    };

    let current = sqlx::query_scalar::<_, ApprovalStatus>("SELECT approval FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await
        .unwrap_or(None);

    let current = match current {
        Some(current) => current,
        None => return Ok(HttpResponse::NotFound().json(json!({ "error": "user not found" }))),
    };

    let next = match current.decide(target) {
        Ok(next) => next,
        Err(err) => return Ok(HttpResponse::Conflict().json(json!({ "error": err.to_string() }))),
    };

    let result = sqlx::query("UPDATE users SET approval = ? WHERE id = ? AND approval = ?")
        .bind(next.as_str())
        .bind(&user_id)
        .bind(current.as_str())
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    if result.rows_affected() == 0 {
        return Ok(HttpResponse::Conflict()
            .json(json!({ "error": "approval already decided" })));
    }

    log_activity(
        &state.db,
        "user_approval",
        &format!("{} marked user {} as {}.", auth.display_name, user_id, next.as_str()),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "approval": next })))
}

async fn list_bookings(
    state: web::Data<AppState>,
    query: web::Query<BookingFilter>,
) -> Result<HttpResponse> {
    let rows = match query.status {
        None => sqlx::query_as::<_, BookingRow>(
            r#"SELECT b.id, b.customer_id, b.provider_id, b.service_id, b.scheduled_for,
                      b.address, b.status, b.amount, b.notes, b.rating, b.review, b.requested_at,
                      c.display_name AS customer_name,
                      p.display_name AS provider_name,
                      s.name AS service_name
               FROM bookings b
               JOIN users c ON b.customer_id = c.id
               LEFT JOIN users p ON b.provider_id = p.id
               JOIN services s ON b.service_id = s.id
               ORDER BY b.requested_at DESC"#,
        )
        .fetch_all(&state.db)
        .await
        .unwrap_or_default(),
        Some(status) => sqlx::query_as::<_, BookingRow>(
            r#"SELECT b.id, b.customer_id, b.provider_id, b.service_id, b.scheduled_for,
                      b.address, b.status, b.amount, b.notes, b.rating, b.review, b.requested_at,
                      c.display_name AS customer_name,
                      p.display_name AS provider_name,
                      s.name AS service_name
               FROM bookings b
               JOIN users c ON b.customer_id = c.id
               LEFT JOIN users p ON b.provider_id = p.id
               JOIN services s ON b.service_id = s.id
               WHERE b.status = ?
               ORDER BY b.requested_at DESC"#,
        )
        .bind(status.as_str())
        .fetch_all(&state.db)
        .await
        .unwrap_or_default(),
    };

    let bookings: Vec<BookingView> = rows.into_iter().map(BookingView::from).collect();
    Ok(HttpResponse::Ok().json(bookings))
}

async fn booking_detail(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    match fetch_booking(&state.db, &booking_id).await {
        Some(row) => Ok(HttpResponse::Ok().json(BookingView::from(row))),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "booking not found" }))),
    }
}

async fn apply_booking_action(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    input: web::Json<BookingActionInput>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let input = input.into_inner();
    let action = input.action;

    let row = match fetch_booking(&state.db, &booking_id).await {
        Some(row) => row,
        None => return Ok(HttpResponse::NotFound().json(json!({ "error": "booking not found" }))),
    };

    let next = match row.status.apply(action) {
        Ok(next) => next,
        Err(err) => return Ok(HttpResponse::Conflict().json(json!({ "error": err.to_string() }))),
    };

    // A confirmed booking always belongs to a provider. Admins are not
    // providers themselves, so the assignment has to come with the action.
    let assigned = if action == BookingAction::Confirm {
        let assigned = match input.provider_id.or_else(|| row.provider_id.clone()) {
            Some(assigned) => assigned,
            None => {
                return Ok(HttpResponse::BadRequest()
                    .json(json!({ "error": "confirming requires a provider assignment" })))
            }
        };
        let provider = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM users WHERE id = ? AND role = 'provider' AND approval = 'approved' AND active = 1",
        )
        .bind(&assigned)
        .fetch_optional(&state.db)
        .await
        .unwrap_or(None);
        if provider.is_none() {
            return Ok(HttpResponse::BadRequest()
                .json(json!({ "error": "the requested provider is not available" })));
        }
        Some(assigned)
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
        "admin_booking_action",
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

async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, name, category, description, base_price, active, created_at
           FROM services
           ORDER BY name"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let services: Vec<ServiceView> = rows.into_iter().map(ServiceView::from).collect();
    Ok(HttpResponse::Ok().json(services))
}

fn validate_service(input: &ServiceInput) -> Vec<String> {
    let mut errors = Vec::new();
    if input.name.trim().is_empty() {
        errors.push("Please enter a service name.".to_string());
    }
    if input.category.trim().is_empty() {
        errors.push("Please select a category.".to_string());
    }
    if input.base_price < 0.0 {
        errors.push("Base price cannot be negative.".to_string());
    }
    errors
}

async fn create_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    input: web::Json<ServiceInput>,
) -> Result<HttpResponse> {
    let input = input.into_inner();
    let errors = validate_service(&input);
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let service_id = new_id();
    sqlx::query(
        r#"INSERT INTO services (id, name, category, description, base_price, active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&service_id)
    .bind(input.name.trim())
    .bind(input.category.trim())
    .bind(input.description.as_deref().unwrap_or("").trim())
    .bind(input.base_price)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "service_created",
        &format!("{} added service {}.", auth.display_name, input.name.trim()),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Created().json(json!({ "id": service_id })))
}

async fn update_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    input: web::Json<ServiceInput>,
) -> Result<HttpResponse> {
    let service_id = path.into_inner();
    let input = input.into_inner();
    let errors = validate_service(&input);
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let result = sqlx::query(
        "UPDATE services SET name = ?, category = ?, description = ?, base_price = ? WHERE id = ?",
    )
    .bind(input.name.trim())
    .bind(input.category.trim())
    .bind(input.description.as_deref().unwrap_or("").trim())
    .bind(input.base_price)
    .bind(&service_id)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "service not found" })));
    }

    log_activity(
        &state.db,
        "service_updated",
        &format!("{} updated service {}.", auth.display_name, service_id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn toggle_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let service_id = path.into_inner();
    let result = sqlx::query("UPDATE services SET active = 1 - active WHERE id = ?")
        .bind(&service_id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "service not found" })));
    }

    let active = sqlx::query_scalar::<_, i64>("SELECT active FROM services WHERE id = ?")
        .bind(&service_id)
        .fetch_one(&state.db)
        .await
        .unwrap_or(0);

    log_activity(
        &state.db,
        "service_toggled",
        &format!(
            "{} turned service {} {}.",
            auth.display_name,
            service_id,
            if active == 1 { "on" } else { "off" }
        ),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "active": active == 1 })))
}

async fn delete_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let service_id = path.into_inner();
    let result = sqlx::query("DELETE FROM services WHERE id = ?")
        .bind(&service_id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "service not found" })));
    }

    log_activity(
        &state.db,
        "service_deleted",
        &format!("{} removed service {}.", auth.display_name, service_id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn list_tickets(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, SupportTicketRow>(
        r#"SELECT id, owner_id, title, body, status, priority, created_at, updated_at
           FROM support_tickets
           ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let tickets: Vec<SupportTicketView> = rows.into_iter().map(SupportTicketView::from).collect();
    Ok(HttpResponse::Ok().json(tickets))
}

async fn update_ticket_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    input: web::Json<TicketStatusInput>,
) -> Result<HttpResponse> {
    let ticket_id = path.into_inner();
    let target = input.into_inner().status;

    let current = sqlx::query_scalar::<_, TicketStatus>(
        "SELECT status FROM support_tickets WHERE id = ?",
    )
    .bind(&ticket_id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);

    let current = match current {
        Some(current) => current,
        None => return Ok(HttpResponse::NotFound().json(json!({ "error": "ticket not found" }))),
    };

    let next = match current.advance(target) {
        Ok(next) => next,
        Err(err) => return Ok(HttpResponse::Conflict().json(json!({ "error": err.to_string() }))),
    };

    let result =
        sqlx::query("UPDATE support_tickets SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(&ticket_id)
            .bind(current.as_str())
            .execute(&state.db)
            .await
            .map_err(actix_web::error::ErrorInternalServerError)?;
    if result.rows_affected() == 0 {
        return Ok(HttpResponse::Conflict()
            .json(json!({ "error": "ticket changed, reload and retry" })));
    }

    log_activity(
        &state.db,
        "ticket_status",
        &format!("{} moved ticket {} to {}.", auth.display_name, ticket_id, next.as_str()),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "status": next })))
}

async fn count(query: &str, state: &web::Data<AppState>) -> i64 {
    sqlx::query_scalar::<_, i64>(query)
        .fetch_one(&state.db)
        .await
        .unwrap_or(0)
}
