use actix_web::{middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{basic_validator, logout_guard, new_id, AuthUser, Capability},
    db::log_activity,
    models::{
        LegalDocumentRow, SupportTicketRow, SupportTicketView, TicketPriority, TicketStatus,
        UserRow, UserView,
    },
    state::AppState,
};

#[derive(Deserialize)]
struct ProfileInput {
    display_name: String,
    email: String,
    phone: Option<String>,
    location: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct TicketInput {
    title: String,
    body: String,
    priority: Option<TicketPriority>,
}

#[derive(Serialize)]
struct DocumentView {
    #[serde(flatten)]
    document: LegalDocumentRow,
    accepted: bool,
}

/// Surface shared by every signed-in role: profile, support tickets, and
/// legal documents. Customers and providers both land here.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/account")
            .wrap(HttpAuthentication::basic(basic_validator))
            .wrap(from_fn(logout_guard))
            .service(
                web::resource("/profile")
                    .route(web::get().to(profile))
                    .route(web::put().to(update_profile)),
            )
            .service(
                web::resource("/tickets")
                    .route(web::get().to(list_tickets))
                    .route(web::post().to(create_ticket)),
            )
            .service(web::resource("/documents").route(web::get().to(list_documents)))
            .service(
                web::resource("/documents/{id}/acceptance")
                    .route(web::post().to(toggle_document_acceptance)),
            ),
    );
}

async fn profile(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    match fetch_user(&state, &auth.id).await {
        Some(row) => Ok(HttpResponse::Ok().json(UserView::from(row))),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "account not found" }))),
    }
}

async fn update_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    input: web::Json<ProfileInput>,
) -> Result<HttpResponse> {
    let input = input.into_inner();
    let mut errors = Vec::new();
    if input.display_name.trim().is_empty() {
        errors.push("Please enter your name.".to_string());
    }
    let email = input.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        errors.push("A valid email address is required.".to_string());
    }

    // The email is the login key, so it has to stay unique.
    let taken = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM users WHERE email = ? AND id != ? LIMIT 1",
    )
    .bind(&email)
    .bind(&auth.id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);
    if taken.is_some() {
        errors.push("That email address is already in use.".to_string());
    }

    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    sqlx::query(
        r#"UPDATE users
           SET display_name = ?, email = ?, phone = ?, location = ?, avatar_url = ?
           WHERE id = ?"#,
    )
    .bind(input.display_name.trim())
    .bind(&email)
    .bind(&input.phone)
    .bind(&input.location)
    .bind(&input.avatar_url)
    .bind(&auth.id)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "profile_updated",
        &format!("{} updated their profile.", input.display_name.trim()),
        Some(&auth.id),
        None,
    )
    .await;

    match fetch_user(&state, &auth.id).await {
        Some(row) => Ok(HttpResponse::Ok().json(UserView::from(row))),
        None => Ok(HttpResponse::Ok().json(json!({ "ok": true }))),
    }
}

async fn list_tickets(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, SupportTicketRow>(
        r#"SELECT id, owner_id, title, body, status, priority, created_at, updated_at
           FROM support_tickets
           WHERE owner_id = ?
           ORDER BY created_at DESC"#,
    )
    .bind(&auth.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let tickets: Vec<SupportTicketView> = rows.into_iter().map(SupportTicketView::from).collect();
    Ok(HttpResponse::Ok().json(tickets))
}

async fn create_ticket(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    input: web::Json<TicketInput>,
) -> Result<HttpResponse> {
    if !auth.can(Capability::OpenTickets) {
        return Ok(HttpResponse::Forbidden().json(json!({ "error": "not allowed" })));
    }

    let input = input.into_inner();
    let mut errors = Vec::new();
    if input.title.trim().is_empty() {
        errors.push("A title is required.".to_string());
    }
    if input.body.trim().is_empty() {
        errors.push("Please describe the problem.".to_string());
    }
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let ticket_id = new_id();
    let now = chrono::Utc::now().to_rfc3339();
    let priority = input.priority.unwrap_or(TicketPriority::Medium);
    sqlx::query(
        r#"INSERT INTO support_tickets (id, owner_id, title, body, status, priority, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&ticket_id)
    .bind(&auth.id)
    .bind(input.title.trim())
    .bind(input.body.trim())
    .bind(TicketStatus::Open.as_str())
    .bind(priority)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "ticket_opened",
        &format!("{} opened a support ticket.", auth.display_name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Created().json(json!({ "id": ticket_id })))
}

async fn list_documents(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, LegalDocumentRow>(
        "SELECT id, title, version, body, updated_at FROM legal_documents ORDER BY title",
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let accepted: Vec<String> = sqlx::query_scalar::<_, String>(
        "SELECT document_id FROM document_acceptances WHERE user_id = ?",
    )
    .bind(&auth.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let documents: Vec<DocumentView> = rows
        .into_iter()
        .map(|document| DocumentView {
            accepted: accepted.contains(&document.id),
            document,
        })
        .collect();

    Ok(HttpResponse::Ok().json(documents))
}

async fn toggle_document_acceptance(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    if !auth.can(Capability::AcceptDocuments) {
        return Ok(HttpResponse::Forbidden().json(json!({ "error": "not allowed" })));
    }

    let document_id = path.into_inner();
    let exists = sqlx::query_as::<_, (String,)>("SELECT id FROM legal_documents WHERE id = ?")
        .bind(&document_id)
        .fetch_optional(&state.db)
        .await
        .unwrap_or(None);
    if exists.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "document not found" })));
    }

    let removed = sqlx::query(
        "DELETE FROM document_acceptances WHERE user_id = ? AND document_id = ?",
    )
    .bind(&auth.id)
    .bind(&document_id)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    if removed.rows_affected() > 0 {
        return Ok(HttpResponse::Ok().json(json!({ "accepted": false })));
    }

    sqlx::query(
        "INSERT INTO document_acceptances (user_id, document_id, accepted_at) VALUES (?, ?, ?)",
    )
    .bind(&auth.id)
    .bind(&document_id)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(json!({ "accepted": true })))
}

async fn fetch_user(state: &AppState, user_id: &str) -> Option<UserRow> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, display_name, role, password_hash, phone, avatar_url,
                  location, approval, active, created_at
           FROM users
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None)
}
