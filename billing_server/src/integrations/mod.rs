#[cfg(feature = "stripe")]
pub mod stripe;
