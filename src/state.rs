use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::models::{BookingRow, BookingStatus};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
}

/// Broadcast payload for the booking event streams.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub booking_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub customer_name: Option<String>,
    pub provider_name: Option<String>,
    pub service_name: Option<String>,
    pub scheduled_for: Option<String>,
    pub address: Option<String>,
    pub amount: Option<f64>,
}

impl ServerEvent {
    pub fn from_row(kind: &str, row: BookingRow) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: Some(row.id),
            status: Some(row.status),
            customer_name: Some(row.customer_name),
            provider_name: row.provider_name,
            service_name: Some(row.service_name),
            scheduled_for: Some(row.scheduled_for),
            address: Some(row.address),
            amount: Some(row.amount),
        }
    }
}
