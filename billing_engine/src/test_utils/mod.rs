//! Helpers for tests in this and downstream crates. Enabled with the `test_utils` feature.
pub mod fake_processor;
pub mod prepare_env;
