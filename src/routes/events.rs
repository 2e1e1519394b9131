use actix_web::{http::header, middleware::from_fn, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{
    auth::{basic_validator, logout_guard},
    state::{AppState, ServerEvent},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/events")
            .wrap(HttpAuthentication::basic(basic_validator))
            .wrap(from_fn(logout_guard))
            .route(web::get().to(stream_events)),
    )
    .service(web::resource("/bookings/{id}/events").route(web::get().to(stream_booking_events)));
}

async fn stream_events(state: web::Data<AppState>) -> HttpResponse {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event))),
        Err(_) => None,
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn event_to_bytes(event: &ServerEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: update\ndata: {}\n\n", payload))
}

/// Unauthenticated per-booking stream: status changes only, no customer
/// contact details.
#[derive(serde::Serialize)]
struct PublicStatusEvent {
    booking_id: Option<String>,
    status: Option<crate::models::BookingStatus>,
    service_name: Option<String>,
    scheduled_for: Option<String>,
    provider_name: Option<String>,
}

async fn stream_booking_events(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let booking_id = path.into_inner();
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) => event,
            Err(_) => return None,
        };
        if event.booking_id.as_deref() != Some(&booking_id) {
            return None;
        }
        let public = PublicStatusEvent {
            booking_id: event.booking_id,
            status: event.status,
            service_name: event.service_name,
            scheduled_for: event.scheduled_for,
            provider_name: event.provider_name,
        };
        Some(Ok::<web::Bytes, actix_web::Error>(public_event_to_bytes(&public)))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn public_event_to_bytes(event: &PublicStatusEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: update\ndata: {}\n\n", payload))
}
