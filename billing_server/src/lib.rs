//! # Vendor billing server
//! This crate hosts the HTTP server for the vendor billing system. It is responsible for:
//! * Receiving webhook deliveries from the payment processor, verifying them, and handing them to the reconciliation
//!   engine.
//! * The vendor self-service API: registration, billing customers, subscriptions and payouts.
//! * A small admin API for approving vendors and reading the activity ledger.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/stripe/webhook`: Processor webhook deliveries. Requires a valid `Stripe-Signature` header.
//! * `/vendors/register`: Vendor self-registration.
//! * `/vendor/*`: Vendor self-service. Requires HTTP Basic credentials.
//! * `/admin/*`: Requires the `X-Admin-Key` header.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod retention_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
