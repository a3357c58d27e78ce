use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    InvoicePaidEvent,
    RefundFailedEvent,
    SubscriptionChangedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub invoice_paid_producer: Vec<EventProducer<InvoicePaidEvent>>,
    pub subscription_changed_producer: Vec<EventProducer<SubscriptionChangedEvent>>,
    pub refund_failed_producer: Vec<EventProducer<RefundFailedEvent>>,
}

pub struct EventHandlers {
    pub on_invoice_paid: Option<EventHandler<InvoicePaidEvent>>,
    pub on_subscription_changed: Option<EventHandler<SubscriptionChangedEvent>>,
    pub on_refund_failed: Option<EventHandler<RefundFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_invoice_paid = hooks.on_invoice_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_subscription_changed = hooks.on_subscription_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_refund_failed = hooks.on_refund_failed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_invoice_paid, on_subscription_changed, on_refund_failed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_invoice_paid {
            result.invoice_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_subscription_changed {
            result.subscription_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_failed {
            result.refund_failed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_invoice_paid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_subscription_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_refund_failed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_invoice_paid: Option<Handler<InvoicePaidEvent>>,
    pub on_subscription_changed: Option<Handler<SubscriptionChangedEvent>>,
    pub on_refund_failed: Option<Handler<RefundFailedEvent>>,
}

impl EventHooks {
    pub fn on_invoice_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoicePaidEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_invoice_paid = Some(Arc::new(f));
        self
    }

    pub fn on_subscription_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SubscriptionChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_subscription_changed = Some(Arc::new(f));
        self
    }

    /// The alerting hook. Called whenever an automatic dispute refund fails.
    pub fn on_refund_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundFailedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_refund_failed = Some(Arc::new(f));
        self
    }
}
