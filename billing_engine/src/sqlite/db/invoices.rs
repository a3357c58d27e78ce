use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use super::map_unique_violation;
use crate::{
    db_types::{Invoice, InvoiceStatus, NewInvoice},
    traits::BillingDatabaseError,
};

pub async fn insert_invoice(invoice: NewInvoice, conn: &mut SqliteConnection) -> Result<Invoice, BillingDatabaseError> {
    let invoice_id = invoice.invoice_id.clone();
    let invoice: Invoice = sqlx::query_as(
        r#"
            INSERT INTO invoices (
                invoice_id,
                customer_id,
                amount,
                currency,
                description,
                hosted_invoice_url,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(invoice.invoice_id)
    .bind(invoice.customer_id)
    .bind(invoice.amount.value())
    .bind(invoice.currency)
    .bind(invoice.description)
    .bind(invoice.hosted_invoice_url)
    .bind(invoice.status)
    .fetch_one(conn)
    .await
    .map_err(|e| map_unique_violation(e, BillingDatabaseError::InvoiceAlreadyExists(invoice_id)))?;
    debug!("🧾️ Invoice [{}] inserted with id {}", invoice.invoice_id, invoice.id);
    Ok(invoice)
}

pub async fn fetch_invoice_by_invoice_id(
    invoice_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE invoice_id = $1").bind(invoice_id).fetch_optional(conn).await
}

pub async fn update_invoice_status(
    id: i64,
    status: InvoiceStatus,
    conn: &mut SqliteConnection,
) -> Result<Invoice, sqlx::Error> {
    sqlx::query_as("UPDATE invoices SET status = $1 WHERE id = $2 RETURNING *")
        .bind(status)
        .bind(id)
        .fetch_one(conn)
        .await
}

/// Fetches every invoice whose customer id is in `customer_ids`, newest first.
pub async fn fetch_invoices_for_customers(
    customer_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, sqlx::Error> {
    if customer_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM invoices WHERE customer_id IN (");
    let mut ids = builder.separated(", ");
    for id in customer_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(") ORDER BY created_at DESC, id DESC");
    let invoices = builder.build_query_as::<Invoice>().fetch_all(conn).await?;
    Ok(invoices)
}
