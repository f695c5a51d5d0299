//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Client input rejected before any upstream call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Stripe API error
    #[error("Stripe error ({status}): {message}")]
    Stripe { status: u16, message: String },

    /// Upstream call did not complete in time
    #[error("Stripe request timed out after {0}s")]
    Timeout(u64),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// HTTP status this error should be surfaced with
    pub fn http_status(&self) -> u16 {
        match self {
            PaymentError::InvalidRequest(_)
            | PaymentError::WebhookSignature(_)
            | PaymentError::WebhookParse(_) => 400,
            PaymentError::Stripe { status, .. } if (400..600).contains(status) => *status,
            PaymentError::Stripe { .. } => 502,
            PaymentError::Timeout(_) => 504,
            PaymentError::Config(_) => 500,
        }
    }

    /// Stable machine-readable code for error bodies
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::InvalidRequest(_) => "INVALID_REQUEST",
            PaymentError::Stripe { .. } => "STRIPE_ERROR",
            PaymentError::Timeout(_) => "STRIPE_TIMEOUT",
            PaymentError::WebhookSignature(_) => "INVALID_SIGNATURE",
            PaymentError::WebhookParse(_) => "INVALID_PAYLOAD",
            PaymentError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::InvalidRequest(reason) => reason.clone(),
            PaymentError::Stripe { message, .. } => message.clone(),
            PaymentError::Timeout(_) => "Payment platform did not respond in time.".into(),
            PaymentError::WebhookSignature(_) => "Invalid signature".into(),
            PaymentError::WebhookParse(_) => "Invalid webhook payload".into(),
            PaymentError::Config(_) => "Service configuration error.".into(),
        }
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        match err {
            stripe::StripeError::Stripe(request) => PaymentError::Stripe {
                status: request.http_status,
                message: request
                    .message
                    .unwrap_or_else(|| "Payment processing failed".into()),
            },
            other => PaymentError::Stripe {
                status: 502,
                message: other.to_string(),
            },
        }
    }
}
