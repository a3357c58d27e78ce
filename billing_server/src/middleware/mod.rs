mod admin_key;

pub use admin_key::{AdminKey, AdminKeyMiddlewareFactory, AdminKeyMiddlewareService, ADMIN_KEY_HEADER};
