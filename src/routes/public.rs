use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use actix_web::http::header::Header;
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use serde::Serialize;
use serde_json::json;

use crate::{
    auth::{authenticate_credentials, clear_logout_cookie, logout_cookie, Capability, AUTH_REALM},
    models::{Role, ServiceRow, ServiceView},
    state::AppState,
};

/// The session payload handed back on login: identity, role, and the
/// capability set resolved once for that role.
#[derive(Debug, Serialize)]
struct SessionView {
    id: String,
    email: String,
    display_name: String,
    role: Role,
    avatar_url: Option<String>,
    capabilities: &'static [Capability],
}

#[derive(Debug, Serialize)]
struct ProviderSummary {
    id: String,
    display_name: String,
    initials: String,
    location: Option<String>,
    avatar_url: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/login").route(web::get().to(login)))
        .service(web::resource("/logout").route(web::post().to(logout)))
        .service(web::resource("/services").route(web::get().to(service_catalog)))
        .service(web::resource("/providers").route(web::get().to(provider_directory)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn logout(req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(json!({ "ok": true }))
}

async fn login(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let auth = match Authorization::<Basic>::parse(&req) {
        Ok(auth) => auth,
        Err(_) => return auth_challenge(),
    };
    let credentials = auth.into_scheme();
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();

    let user = match authenticate_credentials(&state, email, password).await {
        Some(user) => user,
        None => return auth_challenge(),
    };

    let avatar_url = sqlx::query_scalar::<_, Option<String>>(
        "SELECT avatar_url FROM users WHERE id = ?",
    )
    .bind(&user.id)
    .fetch_one(&state.db)
    .await
    .unwrap_or(None);

    HttpResponse::Ok()
        .cookie(clear_logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(SessionView {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            capabilities: user.role.capabilities(),
            role: user.role,
            avatar_url,
        })
}

fn auth_challenge() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", AUTH_REALM)))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(json!({ "error": "invalid email or password" }))
}

async fn service_catalog(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, name, category, description, base_price, active, created_at
           FROM services
           WHERE active = 1
           ORDER BY name"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let services: Vec<ServiceView> = rows.into_iter().map(ServiceView::from).collect();
    Ok(HttpResponse::Ok().json(services))
}

async fn provider_directory(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, (String, String, Option<String>, Option<String>)>(
        r#"SELECT id, display_name, location, avatar_url
           FROM users
           WHERE role = 'provider' AND approval = 'approved' AND active = 1
           ORDER BY display_name"#,
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let providers: Vec<ProviderSummary> = rows
        .into_iter()
        .map(|(id, display_name, location, avatar_url)| {
            let initials = display_name
                .split_whitespace()
                .filter_map(|part| part.chars().next())
                .take(2)
                .collect::<String>();
            ProviderSummary {
                id,
                display_name,
                initials: initials.to_uppercase(),
                location,
                avatar_url,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(providers))
}
