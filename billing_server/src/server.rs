use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use billing_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    traits::PaymentProcessor,
    ActivityLedger,
    ReconciliationApi,
    SqliteDatabase,
    VendorApi,
    OPS_LOG_TARGET,
};
use futures::FutureExt;
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::AdminKey,
    retention_worker::start_retention_worker,
    routes::{
        health,
        ActivityRoute,
        AddCustomerRoute,
        ApproveVendorRoute,
        CancelSubscriptionRoute,
        CreateInvoiceRoute,
        CreatePayoutRoute,
        MyInvoicesRoute,
        MySubscriptionsRoute,
        RegisterVendorRoute,
        SetPayoutAccountRoute,
        StripeWebhookRoute,
        SubscribeRoute,
        UpdatePaymentMethodRoute,
        VendorsRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

#[cfg(feature = "stripe")]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    use crate::integrations::stripe::StripeProcessor;

    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let processor = StripeProcessor::new(config.stripe_config.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the Stripe client. {e}")))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_hooks());
    let producers = handlers.producers();
    let sweeper = ReconciliationApi::new(
        db.clone(),
        processor.clone(),
        EventProducers::default(),
        config.reconciliation_options(),
    );
    let _retention = start_retention_worker(sweeper, config.event_retention);
    let srv = create_server_instance(config, db, processor, producers)?;
    handlers.start_handlers().await;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Refund failures are the one thing an operator must hear about, so they go to the ops log at error level.
pub fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_refund_failed(|ev| {
            async move {
                error!(
                    target: OPS_LOG_TARGET,
                    "🚨️ Automatic refund of charge {} for dispute {} failed: {}. Refund it by hand.",
                    ev.charge_id,
                    ev.dispute_id,
                    ev.reason
                );
            }
            .boxed()
        })
        .on_invoice_paid(|ev| {
            async move {
                info!("🧾️ Invoice {} ({}) has been paid", ev.invoice.invoice_id, ev.invoice.amount);
            }
            .boxed()
        })
        .on_subscription_changed(|ev| {
            async move {
                info!(
                    "🔄️ Subscription {} for {} changed to {}",
                    ev.subscription_id, ev.vendor.username, ev.vendor.subscription_status
                );
            }
            .boxed()
        });
    hooks
}

/// Builds the HTTP server. The payment processor is a parameter so that tests can run the full server against a fake.
pub fn create_server_instance<P>(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: P,
    producers: EventProducers,
) -> Result<Server, ServerError>
where
    P: PaymentProcessor + Clone + Send + 'static,
{
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vb::access_log"))
            .configure(|cfg| configure_routes(cfg, &config, db.clone(), processor.clone(), producers.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("💻️ Server listening on {host}:{port}");
    Ok(srv)
}

/// Registers the app data and every route of the server.
pub fn configure_routes<P>(
    cfg: &mut ServiceConfig,
    config: &ServerConfig,
    db: SqliteDatabase,
    processor: P,
    producers: EventProducers,
) where
    P: PaymentProcessor + Clone + 'static,
{
    let options = config.reconciliation_options();
    let reconciliation_api = ReconciliationApi::new(db.clone(), processor.clone(), producers, options);
    let vendor_api = VendorApi::new(db.clone(), processor).with_trial_period(config.trial_period);
    let ledger = ActivityLedger::new(db);
    let admin_scope = web::scope("/admin")
        .service(ApproveVendorRoute::<SqliteDatabase, P>::new())
        .service(VendorsRoute::<SqliteDatabase, P>::new())
        .service(ActivityRoute::<SqliteDatabase>::new());
    let vendor_scope = web::scope("/vendor")
        .service(AddCustomerRoute::<SqliteDatabase, P>::new())
        .service(CreateInvoiceRoute::<SqliteDatabase, P>::new())
        .service(MyInvoicesRoute::<SqliteDatabase, P>::new())
        .service(SubscribeRoute::<SqliteDatabase, P>::new())
        .service(CancelSubscriptionRoute::<SqliteDatabase, P>::new())
        .service(MySubscriptionsRoute::<SqliteDatabase, P>::new())
        .service(UpdatePaymentMethodRoute::<SqliteDatabase, P>::new())
        .service(SetPayoutAccountRoute::<SqliteDatabase, P>::new())
        .service(CreatePayoutRoute::<SqliteDatabase, P>::new());
    cfg.app_data(web::Data::new(reconciliation_api))
        .app_data(web::Data::new(vendor_api))
        .app_data(web::Data::new(ledger))
        .app_data(web::Data::new(config.webhook.clone()))
        .app_data(web::Data::new(AdminKey(config.admin_api_key.clone())))
        .service(health)
        .service(StripeWebhookRoute::<SqliteDatabase, P>::new())
        .service(RegisterVendorRoute::<SqliteDatabase, P>::new())
        .service(admin_scope)
        .service(vendor_scope);
}
