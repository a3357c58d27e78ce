use crate::{
    db_types::{Invoice, InvoiceStatus, NewInvoice},
    traits::BillingDatabaseError,
};

#[allow(async_fn_in_trait)]
pub trait InvoiceManagement {
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, BillingDatabaseError>;

    /// Sets the status of the invoice with the given processor invoice id. Fails with `InvoiceNotFound` if there is no
    /// such invoice.
    async fn update_invoice_status(
        &self,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> Result<Invoice, BillingDatabaseError>;

    /// Fetches an invoice by the processor's invoice id.
    async fn fetch_invoice_by_invoice_id(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingDatabaseError>;

    /// All invoices billed to any of the given customers, newest first. An empty set yields no invoices.
    async fn fetch_invoices_for_customers(&self, customer_ids: &[String]) -> Result<Vec<Invoice>, BillingDatabaseError>;
}
