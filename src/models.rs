use serde::{Deserialize, Serialize};

/// Account role. Fixed for the lifetime of the account; selects which
/// route tree and capability set apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Customer,
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
            Role::Provider => "provider",
        }
    }
}

/// Booking lifecycle. Transitions are validated in `lifecycle`; nothing
/// else may write a status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// Admin review state for a registered account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentKind {
    Card,
    Bank,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub approval: ApprovalStatus,
    pub active: i64,
    pub created_at: String,
}

/// Booking plus the display names joined in from users and services.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: String,
    pub customer_id: String,
    pub provider_id: Option<String>,
    pub service_id: String,
    pub scheduled_for: String,
    pub address: String,
    pub status: BookingStatus,
    pub amount: f64,
    pub notes: Option<String>,
    pub rating: Option<i64>,
    pub review: Option<String>,
    pub requested_at: String,
    pub customer_name: String,
    pub provider_name: Option<String>,
    pub service_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub base_price: f64,
    pub active: i64,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentMethodRow {
    pub id: String,
    pub owner_id: String,
    pub kind: PaymentKind,
    pub label: String,
    pub masked_number: String,
    pub expiry: Option<String>,
    pub is_default: i64,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupportTicketRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub body: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LegalDocumentRow {
    pub id: String,
    pub title: String,
    pub version: String,
    pub body: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

/// JSON shape for a booking, shared by all three route trees.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
    pub service_id: String,
    pub service_name: String,
    pub scheduled_for: String,
    pub address: String,
    pub status: BookingStatus,
    pub amount: f64,
    pub notes: Option<String>,
    pub rating: Option<i64>,
    pub review: Option<String>,
    pub requested_at: String,
}

impl From<BookingRow> for BookingView {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            provider_id: row.provider_id,
            provider_name: row.provider_name,
            service_id: row.service_id,
            service_name: row.service_name,
            scheduled_for: row.scheduled_for,
            address: row.address,
            status: row.status,
            amount: row.amount,
            notes: row.notes,
            rating: row.rating,
            review: row.review,
            requested_at: row.requested_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub base_price: f64,
    pub active: bool,
    pub created_at: String,
}

impl From<ServiceRow> for ServiceView {
    fn from(row: ServiceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            base_price: row.base_price,
            active: row.active == 1,
            created_at: row.created_at,
        }
    }
}

/// Account as exposed over the admin API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub approval: ApprovalStatus,
    pub active: bool,
    pub created_at: String,
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            role: row.role,
            phone: row.phone,
            avatar_url: row.avatar_url,
            location: row.location,
            approval: row.approval,
            active: row.active == 1,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodView {
    pub id: String,
    pub kind: PaymentKind,
    pub label: String,
    pub masked_number: String,
    pub expiry: Option<String>,
    pub is_default: bool,
}

impl From<PaymentMethodRow> for PaymentMethodView {
    fn from(row: PaymentMethodRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            label: row.label,
            masked_number: row.masked_number,
            expiry: row.expiry,
            is_default: row.is_default == 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportTicketView {
    pub id: String,
    pub title: String,
    pub body: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SupportTicketRow> for SupportTicketView {
    fn from(row: SupportTicketRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            body: row.body,
            status: row.status,
            priority: row.priority,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
