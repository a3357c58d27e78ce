mod password;
mod retry;
mod webhook_signature;

pub use password::{hash_password, verify_password, PasswordError};
pub use retry::RetryPolicy;
pub use webhook_signature::{
    sign_payload,
    verify_event,
    verify_signature,
    VerificationError,
    DEFAULT_WEBHOOK_TOLERANCE,
    SIGNATURE_HEADER,
};
