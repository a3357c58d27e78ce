//! Vendor credentials.
//!
//! Vendors authenticate each request with HTTP Basic authentication. The [`VendorCredentials`] extractor only parses
//! the header; handlers check the credentials against the password hash via
//! [`billing_engine::VendorApi::authenticate`].
use std::future::{ready, Ready};

use actix_web::{
    dev::Payload,
    http::header::{HeaderValue, AUTHORIZATION},
    FromRequest,
    HttpRequest,
};
use log::debug;

use crate::errors::{AuthError, ServerError};

#[derive(Clone, PartialEq, Eq)]
pub struct VendorCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for VendorCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VendorCredentials({}, ****)", self.username)
    }
}

impl FromRequest for VendorCredentials {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = parse_basic_auth(req.headers().get(AUTHORIZATION)).map_err(|e| {
            debug!("💻️ Rejecting vendor credentials. {e}");
            ServerError::AuthenticationError(e)
        });
        ready(result)
    }
}

pub fn parse_basic_auth(header: Option<&HeaderValue>) -> Result<VendorCredentials, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;
    let value = header.to_str().map_err(|e| AuthError::PoorlyFormattedCredentials(e.to_string()))?;
    let encoded = value
        .strip_prefix("Basic ")
        .ok_or_else(|| AuthError::PoorlyFormattedCredentials("Expected Basic authentication".into()))?;
    let decoded = base64::decode(encoded.trim()).map_err(|e| AuthError::PoorlyFormattedCredentials(e.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|e| AuthError::PoorlyFormattedCredentials(e.to_string()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::PoorlyFormattedCredentials("Expected username:password".into()))?;
    if username.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(VendorCredentials { username: username.to_string(), password: password.to_string() })
}

/// The value of an `Authorization` header for the given credentials.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", base64::encode(format!("{username}:{password}")))
}
