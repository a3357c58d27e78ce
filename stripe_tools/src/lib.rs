//! A thin REST client for the Stripe API.
//!
//! Only the calls the billing server makes are exposed. Every call is fallible and returns a [`StripeApiError`] rather
//! than panicking, so callers can turn processor failures into local error responses.
mod api;
mod config;
mod error;

pub mod data_objects;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use error::StripeApiError;
