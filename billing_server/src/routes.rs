//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (database calls, processor
//! calls) must be expressed as futures so that they don't block the worker.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use billing_engine::{
    db_types::Vendor,
    helpers::{verify_event, VerificationError, SIGNATURE_HEADER},
    traits::{BillingDatabase, PaymentProcessor},
    vendor_objects::{
        AddCustomerRequest,
        InvoiceRequest,
        PaymentMethodRequest,
        PayoutAccountRequest,
        PayoutRequest,
        RegisterVendorRequest,
        SubscriptionRequest,
    },
    ActivityLedger,
    ReconciliationApi,
    VendorApi,
};
use bytes::Bytes;
use chrono::Utc;
use log::*;

use crate::{
    auth::VendorCredentials,
    config::WebhookConfig,
    data_objects::{ActivityQuery, JsonResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires admin) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AdminKeyMiddlewareFactory::new());
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(stripe_webhook => Post "/stripe/webhook" impl BillingDatabase, PaymentProcessor);
/// Route handler for processor webhook deliveries.
///
/// The raw body is verified against the `Stripe-Signature` header before anything else happens. Verification failures
/// are the only deliveries that get an error response (400). Every verified event is acknowledged with a 200, whatever
/// the reconciliation outcome, since redelivering it would not change that outcome.
pub async fn stripe_webhook<B, P>(
    req: HttpRequest,
    body: Bytes,
    config: web::Data<WebhookConfig>,
    api: web::Data<ReconciliationApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    trace!("🪝️ Received webhook delivery ({} bytes)", body.len());
    if config.signing_secret.is_empty() {
        error!("🪝️ No webhook signing secret is configured. Rejecting delivery.");
        return Err(VerificationError::InvalidSecret("no signing secret is configured".into()).into());
    }
    let header = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = verify_event(&body, header, config.signing_secret.reveal(), Utc::now(), config.tolerance)
        .map_err(|e| {
            warn!("🪝️ Rejecting webhook delivery. {e}");
            ServerError::from(e)
        })?;
    debug!("🪝️ Verified event {} ({})", event.id, event.event_type);
    let outcome = api.handle_event(&event).await;
    let response = if outcome.is_success() { JsonResponse::success(&outcome) } else { JsonResponse::failure(&outcome) };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Vendors  ----------------------------------------------------
route!(register_vendor => Post "/vendors/register" impl BillingDatabase, PaymentProcessor);
/// Route handler for vendor self-registration.
///
/// A processor customer is created for the vendor, and the trial period starts. The vendor cannot bill anyone until an
/// admin approves them.
pub async fn register_vendor<B, P>(
    body: web::Json<RegisterVendorRequest>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let RegisterVendorRequest { username, password } = body.into_inner();
    debug!("💻️ POST register vendor {username}");
    let vendor = api.register_vendor(&username, &password).await?;
    Ok(HttpResponse::Created().json(vendor))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(approve_vendor => Post "/vendors/{username}/approve" impl BillingDatabase, PaymentProcessor where requires admin);
pub async fn approve_vendor<B, P>(
    path: web::Path<String>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let username = path.into_inner();
    debug!("💻️ POST approve vendor {username}");
    let vendor = api.approve_vendor(&username).await?;
    Ok(HttpResponse::Ok().json(vendor))
}

route!(vendors => Get "/vendors" impl BillingDatabase, PaymentProcessor where requires admin);
pub async fn vendors<B, P>(api: web::Data<VendorApi<B, P>>) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    debug!("💻️ GET vendors");
    let vendors = api.fetch_vendors().await?;
    Ok(HttpResponse::Ok().json(vendors))
}

route!(activity => Get "/activity" impl BillingDatabase where requires admin);
/// Route handler for the activity ledger. Entries are returned newest first. Use `?limit=n` to control how many.
pub async fn activity<B: BillingDatabase>(
    query: web::Query<ActivityQuery>,
    ledger: web::Data<ActivityLedger<B>>,
) -> Result<HttpResponse, ServerError> {
    let limit = query.limit();
    debug!("💻️ GET activity (limit {limit})");
    let entries = ledger.recent(limit).await.map_err(|e| {
        debug!("💻️ Could not fetch the activity ledger. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(entries))
}

//----------------------------------------------   Vendor self-service  ----------------------------------------------
async fn authenticated<B, P>(creds: VendorCredentials, api: &VendorApi<B, P>) -> Result<Vendor, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = api.authenticate(&creds.username, &creds.password).await?;
    trace!("💻️ Vendor {} authenticated", vendor.username);
    Ok(vendor)
}

route!(add_customer => Post "/customers" impl BillingDatabase, PaymentProcessor);
pub async fn add_customer<B, P>(
    creds: VendorCredentials,
    body: web::Json<AddCustomerRequest>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ POST customer {} for {}", body.customer_id, vendor.username);
    let vendor = api.add_customer(&vendor, &body.customer_id).await?;
    Ok(HttpResponse::Ok().json(vendor))
}

route!(create_invoice => Post "/invoices" impl BillingDatabase, PaymentProcessor);
/// Route handler for billing one of the vendor's customers.
///
/// Processor failures return a 502 naming the pipeline step that failed. Nothing is recorded locally in that case.
pub async fn create_invoice<B, P>(
    creds: VendorCredentials,
    body: web::Json<InvoiceRequest>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    let request = body.into_inner();
    debug!("💻️ POST invoice for {} from {}", request.customer_id, vendor.username);
    let invoice = api.create_invoice(&vendor, request).await?;
    Ok(HttpResponse::Created().json(invoice))
}

route!(my_invoices => Get "/invoices" impl BillingDatabase, PaymentProcessor);
pub async fn my_invoices<B, P>(
    creds: VendorCredentials,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ GET invoices for {}", vendor.username);
    let invoices = api.fetch_invoices(&vendor).await?;
    Ok(HttpResponse::Ok().json(invoices))
}

route!(subscribe => Post "/subscription" impl BillingDatabase, PaymentProcessor);
pub async fn subscribe<B, P>(
    creds: VendorCredentials,
    body: web::Json<SubscriptionRequest>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ POST subscription {} for {}", body.price_id, vendor.username);
    let subscription = api.subscribe(&vendor, &body.price_id).await?;
    Ok(HttpResponse::Created().json(subscription))
}

route!(cancel_subscription => Delete "/subscription" impl BillingDatabase, PaymentProcessor);
pub async fn cancel_subscription<B, P>(
    creds: VendorCredentials,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ DELETE subscription for {}", vendor.username);
    let cancelled = api.cancel_subscription(&vendor).await?;
    Ok(HttpResponse::Ok().json(cancelled))
}

route!(my_subscriptions => Get "/subscriptions" impl BillingDatabase, PaymentProcessor);
pub async fn my_subscriptions<B, P>(
    creds: VendorCredentials,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ GET subscriptions for {}", vendor.username);
    let subscriptions = api.list_subscriptions(&vendor).await?;
    Ok(HttpResponse::Ok().json(subscriptions))
}

route!(update_payment_method => Post "/payment_method" impl BillingDatabase, PaymentProcessor);
pub async fn update_payment_method<B, P>(
    creds: VendorCredentials,
    body: web::Json<PaymentMethodRequest>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ POST payment method for {}", vendor.username);
    api.update_payment_method(&vendor, &body.payment_method_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Default payment method updated")))
}

route!(set_payout_account => Post "/payout_account" impl BillingDatabase, PaymentProcessor);
pub async fn set_payout_account<B, P>(
    creds: VendorCredentials,
    body: web::Json<PayoutAccountRequest>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ POST payout account for {}", vendor.username);
    let vendor = api.set_payout_account(&vendor, &body.account_id).await?;
    Ok(HttpResponse::Ok().json(vendor))
}

route!(create_payout => Post "/payouts" impl BillingDatabase, PaymentProcessor);
pub async fn create_payout<B, P>(
    creds: VendorCredentials,
    body: web::Json<PayoutRequest>,
    api: web::Data<VendorApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BillingDatabase,
    P: PaymentProcessor,
{
    let vendor = authenticated(creds, &api).await?;
    debug!("💻️ POST payout of {} for {}", body.amount, vendor.username);
    let payout = api.create_payout(&vendor, body.amount).await?;
    Ok(HttpResponse::Created().json(payout))
}
