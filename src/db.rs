use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{ApprovalStatus, BookingRow, BookingStatus, Role},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    seed_services(pool).await?;
    seed_legal_documents(pool).await?;
    if env::var("SEED_DEMO").unwrap_or_else(|_| "false".to_string()) == "true" {
        seed_demo_accounts(pool).await?;
    }
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    booking_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, booking_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(booking_id)
    .execute(pool)
    .await;
}

pub async fn fetch_booking(pool: &SqlitePool, booking_id: &str) -> Option<BookingRow> {
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
           WHERE b.id = ?
           LIMIT 1"#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

/// Compare-and-swap on the status column. Returns false when the row has
/// already moved away from `from`, so the caller answers 409 instead of
/// overwriting a concurrent transition.
pub async fn transition_booking(
    pool: &SqlitePool,
    booking_id: &str,
    from: BookingStatus,
    to: BookingStatus,
    provider_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE bookings SET status = ?, provider_id = ? WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(provider_id)
    .bind(booking_id)
    .bind(from.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(Role::Admin.as_str())
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@services.com".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let display_name = env::var("ADMIN_DISPLAY_NAME").unwrap_or_else(|_| "Admin User".to_string());

    if password == "admin123" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin123'. Set ADMIN_PASSWORD in production.");
    }

    insert_user(
        pool,
        &email,
        &display_name,
        Role::Admin,
        &password,
        ApprovalStatus::Approved,
        None,
    )
    .await
}

async fn seed_services(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let catalog = vec![
        (
            "Plumbing",
            "Plumbing",
            "Professional plumbing services for all your water and drainage needs",
            50.0,
        ),
        (
            "Electrical",
            "Electrical",
            "Certified electricians for electrical installations and repairs",
            75.0,
        ),
        (
            "HVAC Maintenance",
            "HVAC",
            "Heating and cooling maintenance, repair, and installation",
            95.0,
        ),
        (
            "Home Cleaning",
            "Cleaning",
            "Thorough cleaning for homes, apartments, and offices",
            40.0,
        ),
        (
            "Painting",
            "Painting",
            "Professional painting services for interior and exterior",
            60.0,
        ),
    ];

    for (name, category, description, base_price) in catalog {
        let exists = sqlx::query_as::<_, (String,)>("SELECT id FROM services WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }
        sqlx::query(
            r#"INSERT INTO services (id, name, category, description, base_price, active, created_at)
               VALUES (?, ?, ?, ?, ?, 1, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(category)
        .bind(description)
        .bind(base_price)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_legal_documents(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let documents = vec![
        (
            "terms_of_service",
            "Terms of Service",
            "1.0",
            "These terms govern your use of the ServiceHub platform, including booking, fulfilment, and payment records.",
        ),
        (
            "privacy_policy",
            "Privacy Policy",
            "1.0",
            "How ServiceHub collects, stores, and uses account and booking information.",
        ),
    ];

    for (id, title, version, body) in documents {
        let exists =
            sqlx::query_as::<_, (String,)>("SELECT id FROM legal_documents WHERE id = ? LIMIT 1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        if exists.is_some() {
            continue;
        }
        sqlx::query(
            r#"INSERT INTO legal_documents (id, title, version, body, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(id)
        .bind(title)
        .bind(version)
        .bind(body)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Demo identities matching the published quick-login table. Only seeded
/// when SEED_DEMO=true.
async fn seed_demo_accounts(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let accounts = vec![
        (
            "customer@email.com",
            "customer123",
            "John Customer",
            Role::Customer,
            "https://images.pexels.com/photos/1222271/pexels-photo-1222271.jpeg?auto=compress&cs=tinysrgb&w=200",
        ),
        (
            "provider@email.com",
            "provider123",
            "Ahmed Provider",
            Role::Provider,
            "https://images.pexels.com/photos/1239291/pexels-photo-1239291.jpeg?auto=compress&cs=tinysrgb&w=200",
        ),
    ];

    for (email, password, display_name, role, avatar_url) in accounts {
        let exists = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }
        log::warn!("Seeding demo account {email} with a published password. Do not enable SEED_DEMO in production.");
        insert_user(
            pool,
            email,
            display_name,
            role,
            password,
            ApprovalStatus::Approved,
            Some(avatar_url),
        )
        .await?;
    }

    seed_demo_booking(pool).await
}

async fn seed_demo_booking(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM bookings LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let customer =
        sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE email = 'customer@email.com'")
            .fetch_optional(pool)
            .await?;
    let service = sqlx::query_as::<_, (String,)>("SELECT id FROM services WHERE name = 'Plumbing'")
        .fetch_optional(pool)
        .await?;

    let (Some((customer_id,)), Some((service_id,))) = (customer, service) else {
        return Ok(());
    };

    sqlx::query(
        r#"INSERT INTO bookings
           (id, customer_id, provider_id, service_id, scheduled_for, address, status, amount, notes, requested_at)
           VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(customer_id)
    .bind(service_id)
    .bind("2026-09-01T10:00:00Z")
    .bind("123 Main Street, Dubai, UAE")
    .bind(BookingStatus::Pending.as_str())
    .bind(75.0)
    .bind("Kitchen sink is leaking, needs immediate repair")
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    display_name: &str,
    role: Role,
    password: &str,
    approval: ApprovalStatus,
    avatar_url: Option<&str>,
) -> Result<(), sqlx::Error> {
    let password_hash =
        hash_password(password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (id, email, display_name, role, password_hash, avatar_url, approval, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(email)
    .bind(display_name)
    .bind(role.as_str())
    .bind(password_hash)
    .bind(avatar_url)
    .bind(approval.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
