use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{Customer, ErrorEnvelope, Invoice, InvoiceItem, List, PaymentMethod, Payout, Refund, Subscription},
    StripeApiError,
};

type Params = Vec<(String, String)>;

fn param<K: Into<String>, V: Into<String>>(key: K, value: V) -> (String, String) {
    (key.into(), value.into())
}

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let auth = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&auth).map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn currency(&self) -> &str {
        self.config.currency.as_str()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    /// Sends a form-encoded request to Stripe.
    ///
    /// `GET` and `DELETE` parameters are sent in the query string, everything else in the body. When an
    /// `idempotency_key` is given, Stripe guarantees that retries with the same key produce the same result.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
        connected_account: Option<&str>,
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method.clone(), url);
        if !params.is_empty() {
            req = if method == Method::GET || method == Method::DELETE { req.query(params) } else { req.form(params) };
        }
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if let Some(account) = connected_account {
            req = req.header("Stripe-Account", account);
        }
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ REST query successful. {status}");
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let body = response.text().await?;
            Err(parse_error(status.as_u16(), &body))
        }
    }

    pub async fn create_customer(&self, name: &str, metadata: &[(&str, &str)]) -> Result<Customer, StripeApiError> {
        let mut params = vec![param("name", name)];
        params.extend(metadata.iter().map(|(k, v)| param(format!("metadata[{k}]"), *v)));
        let customer: Customer = self.rest_query(Method::POST, "/customers", &params, None, None).await?;
        info!("💳️ Created customer {} for {name}", customer.id);
        Ok(customer)
    }

    pub async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer, StripeApiError> {
        let path = format!("/customers/{customer_id}");
        self.rest_query(Method::GET, &path, &[], None, None).await
    }

    pub async fn create_invoice_item(
        &self,
        customer_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<InvoiceItem, StripeApiError> {
        let params: Params = vec![
            param("customer", customer_id),
            param("amount", amount.to_string()),
            param("currency", self.currency()),
            param("description", description),
        ];
        self.rest_query(Method::POST, "/invoiceitems", &params, None, None).await
    }

    pub async fn create_invoice(&self, customer_id: &str, description: &str) -> Result<Invoice, StripeApiError> {
        let params: Params = vec![
            param("customer", customer_id),
            param("description", description),
            param("collection_method", "charge_automatically"),
            param("pending_invoice_items_behavior", "include"),
            param("auto_advance", "false"),
        ];
        self.rest_query(Method::POST, "/invoices", &params, None, None).await
    }

    pub async fn finalize_invoice(&self, invoice_id: &str) -> Result<Invoice, StripeApiError> {
        let path = format!("/invoices/{invoice_id}/finalize");
        self.rest_query(Method::POST, &path, &[], None, None).await
    }

    pub async fn pay_invoice(&self, invoice_id: &str) -> Result<Invoice, StripeApiError> {
        let path = format!("/invoices/{invoice_id}/pay");
        self.rest_query(Method::POST, &path, &[], None, None).await
    }

    pub async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<Subscription>, StripeApiError> {
        let params: Params = vec![param("customer", customer_id), param("status", "all")];
        let list: List<Subscription> = self.rest_query(Method::GET, "/subscriptions", &params, None, None).await?;
        if list.has_more {
            warn!("💳️ Customer {customer_id} has more subscriptions than a single page. Only the first page is used.");
        }
        Ok(list.data)
    }

    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        trial_end: Option<i64>,
    ) -> Result<Subscription, StripeApiError> {
        let mut params: Params = vec![param("customer", customer_id), param("items[0][price]", price_id)];
        if let Some(ts) = trial_end {
            params.push(param("trial_end", ts.to_string()));
        }
        self.rest_query(Method::POST, "/subscriptions", &params, None, None).await
    }

    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, StripeApiError> {
        let path = format!("/subscriptions/{subscription_id}");
        self.rest_query(Method::DELETE, &path, &[], None, None).await
    }

    /// Pays out `amount` from the balance of the connected account `account_id` to its default external account.
    pub async fn create_payout(&self, account_id: &str, amount: i64) -> Result<Payout, StripeApiError> {
        let params: Params = vec![param("amount", amount.to_string()), param("currency", self.currency())];
        self.rest_query(Method::POST, "/payouts", &params, None, Some(account_id)).await
    }

    pub async fn create_refund(&self, charge_id: &str, idempotency_key: &str) -> Result<Refund, StripeApiError> {
        let params: Params = vec![param("charge", charge_id), param("reason", "fraudulent")];
        let refund: Refund = self.rest_query(Method::POST, "/refunds", &params, Some(idempotency_key), None).await?;
        info!("💳️ Refund {} created for charge {charge_id}", refund.id);
        Ok(refund)
    }

    pub async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<PaymentMethod, StripeApiError> {
        let path = format!("/payment_methods/{payment_method_id}/attach");
        let params: Params = vec![param("customer", customer_id)];
        self.rest_query(Method::POST, &path, &params, None, None).await
    }

    pub async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<Customer, StripeApiError> {
        let path = format!("/customers/{customer_id}");
        let params: Params = vec![param("invoice_settings[default_payment_method]", payment_method_id)];
        self.rest_query(Method::POST, &path, &params, None, None).await
    }
}

fn parse_error(status: u16, body: &str) -> StripeApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let e = envelope.error;
            let message = match (e.error_type, e.message) {
                (Some(t), Some(m)) => format!("{t}: {m}"),
                (None, Some(m)) => m,
                (Some(t), None) => t,
                (None, None) => body.to_string(),
            };
            StripeApiError::QueryError { status, message, code: e.code }
        },
        Err(_) => StripeApiError::QueryError { status, message: body.to_string(), code: None },
    }
}
