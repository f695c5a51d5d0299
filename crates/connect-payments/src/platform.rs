//! Payment platform abstraction
//!
//! The handlers only talk to the platform through this trait so the HTTP
//! layer can be exercised without network access.

use async_trait::async_trait;

use crate::account::ConnectedAccount;
use crate::checkout::{CheckoutSession, CheckoutSessionParams};
use crate::error::Result;

#[async_trait]
pub trait PaymentPlatform: Send + Sync {
    /// Most recently created connected accounts, at most `limit` of them
    async fn list_accounts(&self, limit: u8) -> Result<Vec<ConnectedAccount>>;

    /// Single-use Express dashboard login URL for `account`
    async fn create_login_link(&self, account: &str, redirect_url: &str) -> Result<String>;

    /// Single-use onboarding URL for `account`
    async fn create_onboarding_link(
        &self,
        account: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String>;

    /// Open a hosted Checkout session on the connected account in `params`
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession>;
}
