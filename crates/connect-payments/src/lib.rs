//! # connect-payments
//!
//! Direct charges on behalf of connected accounts, with the platform taking
//! an application fee.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  quantity,  ┌──────────────────────┐   Stripe-Account:   ┌─────────────────┐
//! │  Storefront │────────────▶│ CheckoutSessionParams│────────────────────▶│  Stripe Hosted  │
//! │             │  acct_...   │  unit × qty, 10% fee │   acct_...          │  Checkout Page  │
//! └─────────────┘             └──────────────────────┘                     └────────┬────────┘
//!                                                                                   │
//!        ┌──────────────────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌──────────────┐  verified   ┌────────────────┐
//! │   /webhook   │────────────▶│  Fulfillment   │
//! │  (signed)    │             │  (log by default)
//! └──────────────┘             └────────────────┘
//! ```
//!
//! The charge is created on the connected account, so the customer pays the
//! merchant directly and the fee is moved to the platform's balance.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use connect_payments::{
//!     CheckoutRequest, CheckoutSessionParams, FeeSchedule, PaymentPlatform, RedirectUrls,
//!     StripeClient,
//! };
//!
//! let stripe = StripeClient::new("sk_test_xxx");
//!
//! let params = CheckoutSessionParams::build(
//!     &CheckoutRequest { quantity: 2, account: "acct_123".into() },
//!     1000,
//!     &FeeSchedule::default(),
//!     RedirectUrls::for_domain("https://yoursite.com"),
//! )?;
//! assert_eq!(params.application_fee_amount, 200);
//!
//! let session = stripe.create_checkout_session(&params).await?;
//! // Redirect customer to: session.url
//! ```

mod account;
mod checkout;
mod client;
mod error;
mod fee;
mod platform;
mod webhook;

pub use account::{cap_accounts, AccountCapabilities, ConnectedAccount, ACCOUNT_LIST_LIMIT};
pub use checkout::{
    validate_account_id, CheckoutRequest, CheckoutSession, CheckoutSessionParams, RedirectUrls,
    PRODUCT_IMAGE, PRODUCT_NAME,
};
pub use client::{StripeClient, DEFAULT_TIMEOUT};
pub use error::{PaymentError, Result};
pub use fee::{FeeSchedule, DEFAULT_FEE_PERCENT};
pub use platform::PaymentPlatform;
pub use webhook::{
    CheckoutCompletion, EventData, Fulfillment, FulfillmentOrder, LogFulfillment, WebhookEvent,
    WebhookHandler, WebhookOutcome, WebhookVerifier, CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED,
    CHECKOUT_SESSION_COMPLETED, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
};
