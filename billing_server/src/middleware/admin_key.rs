//! Admin key middleware.
//!
//! This middleware can be placed on any route or service. It checks the `X-Admin-Key` header of the incoming request
//! against the [`AdminKey`] registered as app data. If the key matches, the request is allowed to continue. Otherwise a
//! 401 response is returned. If no key is configured, every request is rejected.
use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::{ok, Ready};
use log::*;
use vb_common::Secret;

use crate::errors::{AuthError, ServerError};

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

#[derive(Clone, Debug, Default)]
pub struct AdminKey(pub Secret<String>);

impl AdminKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(Secret::new(key.into()))
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        !self.0.is_empty() && self.0.matches(candidate)
    }
}

pub struct AdminKeyMiddlewareFactory;

impl AdminKeyMiddlewareFactory {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        AdminKeyMiddlewareFactory
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminKeyMiddlewareService { service: Rc::new(service) })
    }
}

pub struct AdminKeyMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let allowed = match req.app_data::<web::Data<AdminKey>>() {
                Some(key) => {
                    let candidate = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("");
                    key.accepts(candidate)
                },
                None => {
                    warn!("💻️ No admin key is registered with the server. Denying access to {}", req.path());
                    false
                },
            };
            if allowed {
                service.call(req).await
            } else {
                debug!("💻️ Admin request to {} was rejected", req.path());
                Err(ServerError::AuthenticationError(AuthError::InvalidAdminKey).into())
            }
        })
    }
}
