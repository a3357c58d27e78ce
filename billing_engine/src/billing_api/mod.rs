pub mod errors;
pub mod ledger;
pub mod reconciliation_api;
pub mod vendor_api;
pub mod vendor_objects;
