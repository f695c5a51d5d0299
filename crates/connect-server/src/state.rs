//! Application State

use std::sync::Arc;

use connect_payments::{Fulfillment, PaymentPlatform, WebhookVerifier};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Settings loaded at startup
    pub config: Arc<Config>,

    /// Stripe, or an in-memory stand-in under test
    pub platform: Arc<dyn PaymentPlatform>,

    /// Checks `Stripe-Signature` on webhook deliveries
    pub verifier: Arc<WebhookVerifier>,

    /// Side effect for completed checkouts
    pub fulfillment: Arc<dyn Fulfillment>,
}

impl AppState {
    pub fn new(
        config: Config,
        platform: Arc<dyn PaymentPlatform>,
        fulfillment: Arc<dyn Fulfillment>,
    ) -> Self {
        let verifier = Arc::new(
            WebhookVerifier::new(config.webhook_secret.clone())
                .with_tolerance(config.webhook_tolerance_secs),
        );
        Self {
            config: Arc::new(config),
            platform,
            verifier,
            fulfillment,
        }
    }
}
