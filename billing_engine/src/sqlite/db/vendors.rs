use log::debug;
use sqlx::SqliteConnection;

use super::map_unique_violation;
use crate::{
    db_types::{NewVendor, SubscriptionStatus, Vendor},
    traits::BillingDatabaseError,
};

pub async fn insert_vendor(vendor: NewVendor, conn: &mut SqliteConnection) -> Result<Vendor, BillingDatabaseError> {
    let username = vendor.username.clone();
    let vendor: Vendor = sqlx::query_as(
        r#"
            INSERT INTO vendors (
                username,
                password_hash,
                stripe_customer_id,
                trial_expires_at
            ) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(vendor.username)
    .bind(vendor.password_hash)
    .bind(vendor.stripe_customer_id)
    .bind(vendor.trial_expires_at)
    .fetch_one(conn)
    .await
    .map_err(|e| map_unique_violation(e, BillingDatabaseError::VendorAlreadyExists(username)))?;
    debug!("🧑️ Vendor [{}] inserted with id {}", vendor.username, vendor.id);
    Ok(vendor)
}

/// The processor customer ids of the vendor's clients, in the order they were associated.
pub async fn fetch_customers(vendor_id: i64, conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT customer_id FROM vendor_customers WHERE vendor_id = $1 ORDER BY created_at ASC, customer_id ASC",
    )
    .bind(vendor_id)
    .fetch_all(conn)
    .await
}

async fn with_customers(vendor: Option<Vendor>, conn: &mut SqliteConnection) -> Result<Option<Vendor>, sqlx::Error> {
    match vendor {
        Some(mut v) => {
            v.customers = fetch_customers(v.id, conn).await?;
            Ok(Some(v))
        },
        None => Ok(None),
    }
}

pub async fn fetch_vendor_by_username(
    username: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Vendor>, sqlx::Error> {
    let vendor =
        sqlx::query_as("SELECT * FROM vendors WHERE username = $1").bind(username).fetch_optional(&mut *conn).await?;
    with_customers(vendor, conn).await
}

pub async fn fetch_vendor_by_customer_id(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Vendor>, sqlx::Error> {
    let vendor = sqlx::query_as("SELECT * FROM vendors WHERE stripe_customer_id = $1")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;
    with_customers(vendor, conn).await
}

pub async fn fetch_vendors(conn: &mut SqliteConnection) -> Result<Vec<Vendor>, sqlx::Error> {
    let vendors: Vec<Vendor> = sqlx::query_as("SELECT * FROM vendors ORDER BY id ASC").fetch_all(&mut *conn).await?;
    let mut result = Vec::with_capacity(vendors.len());
    for mut vendor in vendors {
        vendor.customers = fetch_customers(vendor.id, conn).await?;
        result.push(vendor);
    }
    Ok(result)
}

/// Sets the approval flag. Returns `None` if there is no vendor with the given username.
pub async fn approve_vendor(username: &str, conn: &mut SqliteConnection) -> Result<Option<Vendor>, sqlx::Error> {
    let vendor = sqlx::query_as("UPDATE vendors SET approved = TRUE WHERE username = $1 RETURNING *")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
    with_customers(vendor, conn).await
}

/// Returns `false` if the customer was already associated with the vendor.
pub async fn add_customer(vendor_id: i64, customer_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT OR IGNORE INTO vendor_customers (vendor_id, customer_id) VALUES ($1, $2)")
        .bind(vendor_id)
        .bind(customer_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_subscription_status(
    vendor_id: i64,
    status: SubscriptionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Vendor>, sqlx::Error> {
    let vendor = sqlx::query_as("UPDATE vendors SET subscription_status = $1 WHERE id = $2 RETURNING *")
        .bind(status)
        .bind(vendor_id)
        .fetch_optional(&mut *conn)
        .await?;
    with_customers(vendor, conn).await
}

pub async fn update_payout_account(
    vendor_id: i64,
    account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Vendor>, sqlx::Error> {
    let vendor = sqlx::query_as("UPDATE vendors SET payout_account_id = $1 WHERE id = $2 RETURNING *")
        .bind(account_id)
        .bind(vendor_id)
        .fetch_optional(&mut *conn)
        .await?;
    with_customers(vendor, conn).await
}
