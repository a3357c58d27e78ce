//! Processor webhook authentication.
//!
//! The processor signs every delivery with the endpoint's shared secret. The signature header looks like
//!
//! ```text
//! Stripe-Signature: t=1492774577,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd,v0=6ffbb59b...
//! ```
//!
//! The signed payload is `"{t}.{raw body}"` and each `v1` entry is the hex-encoded HMAC-SHA256 of it. More than one
//! `v1` entry appears while a secret is being rolled. `v0` entries are ignored.
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use thiserror::Error;

use crate::processor_events::ProcessorEvent;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("No signature header was provided")]
    MissingHeader,
    #[error("The signature header is malformed: {0}")]
    MalformedHeader(String),
    #[error("The signature header has no v1 signatures")]
    NoSignatures,
    #[error("No signature matches the payload")]
    SignatureMismatch,
    #[error("Timestamp {timestamp} is outside the tolerance window (now: {now})")]
    StaleTimestamp { timestamp: i64, now: i64 },
    #[error("The payload is not a valid event: {0}")]
    InvalidPayload(String),
    #[error("The webhook secret cannot be used as an HMAC key: {0}")]
    InvalidSecret(String),
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, VerificationError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for item in header.split(',') {
        let (key, value) = item
            .trim()
            .split_once('=')
            .ok_or_else(|| VerificationError::MalformedHeader(format!("'{item}' is not a key=value pair")))?;
        match key {
            "t" => {
                let ts = value
                    .parse::<i64>()
                    .map_err(|_| VerificationError::MalformedHeader(format!("'{value}' is not a timestamp")))?;
                timestamp = Some(ts);
            },
            // A v1 entry that isn't valid hex can never match, so it is skipped rather than failing the header
            "v1" => match hex::decode(value) {
                Ok(sig) => signatures.push(sig),
                Err(_) => trace!("🔐️ Ignoring non-hex v1 signature"),
            },
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| VerificationError::MalformedHeader("no timestamp".into()))?;
    if signatures.is_empty() {
        return Err(VerificationError::NoSignatures);
    }
    Ok(SignatureHeader { timestamp, signatures })
}

fn signed_payload_mac(body: &[u8], timestamp: i64, secret: &str) -> Result<HmacSha256, VerificationError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| VerificationError::InvalidSecret(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Checks the signature header against the raw body.
///
/// Signatures are compared in constant time. The timestamp must be within `tolerance` of `now` in either direction.
pub fn verify_signature(
    body: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), VerificationError> {
    let header = parse_header(header)?;
    let mac = signed_payload_mac(body, header.timestamp, secret)?;
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if !matched {
        return Err(VerificationError::SignatureMismatch);
    }
    let now = now.timestamp();
    let age = now.abs_diff(header.timestamp);
    if age > tolerance.as_secs() {
        return Err(VerificationError::StaleTimestamp { timestamp: header.timestamp, now });
    }
    Ok(())
}

/// Authenticates a webhook delivery and parses its envelope.
///
/// This is a pure function of its inputs. Nothing may be mutated on the strength of a delivery until this returns
/// `Ok`.
pub fn verify_event(
    body: &[u8],
    header: Option<&str>,
    secret: &str,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<ProcessorEvent, VerificationError> {
    let header = header.filter(|h| !h.trim().is_empty()).ok_or(VerificationError::MissingHeader)?;
    verify_signature(body, header, secret, now, tolerance)?;
    serde_json::from_slice::<ProcessorEvent>(body).map_err(|e| VerificationError::InvalidPayload(e.to_string()))
}

/// Produces a signature header for `body`, in the same format the processor uses.
pub fn sign_payload(body: &[u8], secret: &str, timestamp: i64) -> Result<String, VerificationError> {
    let mac = signed_payload_mac(body, timestamp, secret)?;
    let sig = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={sig}"))
}
