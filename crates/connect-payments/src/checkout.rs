//! Direct-charge Checkout
//!
//! Builds the hosted Checkout session a customer is sent to when buying from
//! a connected account. The charge lands on the connected account and the
//! platform's cut is attached as an application fee.

use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::fee::FeeSchedule;

/// Product sold through the sample storefront
pub const PRODUCT_NAME: &str = "Guitar lesson";

/// Product image shown on the hosted checkout page
pub const PRODUCT_IMAGE: &str = "https://i.ibb.co/2PNy7yB/guitar.png";

/// Prefix every connected account id carries
pub const ACCOUNT_ID_PREFIX: &str = "acct_";

/// Placeholder Stripe substitutes with the session id on redirect
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Number of items being bought
    pub quantity: u64,

    /// Connected account the charge is made on
    pub account: String,
}

/// Where Checkout sends the customer afterwards
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl RedirectUrls {
    /// Success and cancel pages served from `domain`
    pub fn for_domain(domain: &str) -> Self {
        let domain = domain.trim_end_matches('/');
        Self {
            success_url: format!("{domain}/success.html?session_id={SESSION_ID_PLACEHOLDER}"),
            cancel_url: format!("{domain}/canceled.html"),
        }
    }
}

/// Everything the platform needs to open a session for one order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionParams {
    /// Connected account the session is created on
    pub account: String,
    pub product_name: String,
    pub product_image: String,
    /// Price per item in minor units
    pub unit_amount: i64,
    pub quantity: u64,
    /// Platform cut in minor units
    pub application_fee_amount: i64,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionParams {
    /// Price one order at `base_price` per item and take the platform's cut.
    pub fn build(
        request: &CheckoutRequest,
        base_price: i64,
        fees: &FeeSchedule,
        urls: RedirectUrls,
    ) -> Result<Self> {
        validate_account_id(&request.account)?;
        let application_fee_amount = fees.application_fee(base_price, request.quantity)?;

        Ok(Self {
            account: request.account.trim().to_string(),
            product_name: PRODUCT_NAME.to_string(),
            product_image: PRODUCT_IMAGE.to_string(),
            unit_amount: base_price,
            quantity: request.quantity,
            application_fee_amount,
            success_url: urls.success_url,
            cancel_url: urls.cancel_url,
        })
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect the customer to
    pub url: String,
}

/// Reject anything that is not a connected account id before calling out.
pub fn validate_account_id(account: &str) -> Result<()> {
    let account = account.trim();
    if account.is_empty() {
        return Err(PaymentError::InvalidRequest("account is required".into()));
    }
    let well_formed = account.len() > ACCOUNT_ID_PREFIX.len()
        && account.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !account.starts_with(ACCOUNT_ID_PREFIX) || !well_formed {
        return Err(PaymentError::InvalidRequest(format!(
            "account must be a connected account id ({ACCOUNT_ID_PREFIX}...), got {account:?}"
        )));
    }
    Ok(())
}
