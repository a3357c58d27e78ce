mod setup;
mod steps;
mod world;

pub use world::BillingWorld;
