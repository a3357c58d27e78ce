use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use billing_engine::{helpers::VerificationError, VendorApiError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Webhook verification failed. {0}")]
    WebhookVerification(#[from] VerificationError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Conflict. {0}")]
    Conflict(String),
    #[error("The payment processor reported an error. {0}")]
    UpstreamError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::WebhookVerification(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedCredentials(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::InvalidAdminKey => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No credentials were provided.")]
    MissingCredentials,
    #[error("Credentials are not in the correct format. {0}")]
    PoorlyFormattedCredentials(String),
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Invalid admin key.")]
    InvalidAdminKey,
}

impl From<VendorApiError> for ServerError {
    fn from(e: VendorApiError) -> Self {
        match e {
            VendorApiError::InvalidInput(s) => Self::InvalidRequestBody(s),
            VendorApiError::Unauthorized => Self::AuthenticationError(AuthError::InvalidCredentials),
            VendorApiError::NotApproved(_) => Self::InsufficientPermissions(e.to_string()),
            VendorApiError::NotFound(s) => Self::NoRecordFound(s),
            VendorApiError::Conflict(s) => Self::Conflict(s),
            VendorApiError::Upstream { .. } => Self::UpstreamError(e.to_string()),
            VendorApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            VendorApiError::CredentialError(s) => {
                error!("💻️ Password hashing failed: {s}");
                Self::BackendError(s)
            },
        }
    }
}
