//! Stripe client
//!
//! Platform-credential client that issues account-scoped calls for direct
//! charges. Every call is bounded by a timeout; nothing is retried.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use stripe::{
    Account, AccountId, AccountLink, AccountLinkType, CheckoutSession as StripeCheckoutSession,
    CheckoutSessionMode, Client, CreateAccountLink, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCheckoutSessionPaymentIntentData,
    Currency, ListAccounts, LoginLink, StripeError,
};

use crate::account::{AccountCapabilities, ConnectedAccount};
use crate::checkout::{validate_account_id, CheckoutSession, CheckoutSessionParams};
use crate::error::{PaymentError, Result};
use crate::platform::PaymentPlatform;

/// Default bound on a single Stripe call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe client wrapper
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    timeout: Duration,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every call by `timeout` instead of the default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Client that acts on behalf of a connected account (`Stripe-Account` header)
    fn on_behalf_of(&self, account: &str) -> Result<Client> {
        let account_id = parse_account_id(account)?;
        Ok(self.client.clone().with_stripe_account(account_id))
    }

    async fn call<T, F>(&self, request: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StripeError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(PaymentError::from),
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Stripe call timed out");
                Err(PaymentError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}

#[async_trait]
impl PaymentPlatform for StripeClient {
    async fn list_accounts(&self, limit: u8) -> Result<Vec<ConnectedAccount>> {
        let mut params = ListAccounts::new();
        params.limit = Some(u64::from(limit));

        let accounts = self.call(Account::list(&self.client, &params)).await?;
        tracing::debug!(count = accounts.data.len(), "Listed connected accounts");

        accounts.data.iter().map(project_account).collect()
    }

    async fn create_login_link(&self, account: &str, redirect_url: &str) -> Result<String> {
        let account_id = parse_account_id(account)?;
        let link = self
            .call(LoginLink::create(&self.client, &account_id, redirect_url))
            .await?;

        tracing::info!(account = %account_id, "Created Express dashboard login link");
        Ok(link.url)
    }

    async fn create_onboarding_link(
        &self,
        account: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String> {
        let account_id = parse_account_id(account)?;
        let mut params = CreateAccountLink::new(account_id.clone(), AccountLinkType::AccountOnboarding);
        params.refresh_url = Some(refresh_url);
        params.return_url = Some(return_url);

        let link = self.call(AccountLink::create(&self.client, params)).await?;

        tracing::info!(account = %account_id, "Created account onboarding link");
        Ok(link.url)
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession> {
        let client = self.on_behalf_of(&params.account)?;

        let mut create = CreateCheckoutSession::new();
        create.mode = Some(CheckoutSessionMode::Payment);
        create.success_url = Some(params.success_url.as_str());
        create.cancel_url = Some(params.cancel_url.as_str());
        create.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(params.quantity),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(params.unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: params.product_name.clone(),
                    images: Some(vec![params.product_image.clone()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        create.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            application_fee_amount: Some(params.application_fee_amount),
            ..Default::default()
        });

        let session = self.call(StripeCheckoutSession::create(&client, create)).await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe {
                status: 502,
                message: "No checkout URL returned".into(),
            })?;

        tracing::info!(
            session_id = %session.id,
            account = %params.account,
            quantity = params.quantity,
            application_fee_amount = params.application_fee_amount,
            "Created checkout session"
        );

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url,
        })
    }
}

fn parse_account_id(account: &str) -> Result<AccountId> {
    validate_account_id(account)?;
    account
        .trim()
        .parse::<AccountId>()
        .map_err(|e| PaymentError::InvalidRequest(format!("invalid account id: {e}")))
}

/// Wire shape of the account fields the storefront reads
#[derive(Deserialize)]
struct AccountFields {
    id: String,
    #[serde(rename = "type", default)]
    account_type: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    capabilities: Option<AccountCapabilities>,
    #[serde(default)]
    charges_enabled: Option<bool>,
}

impl From<AccountFields> for ConnectedAccount {
    fn from(fields: AccountFields) -> Self {
        ConnectedAccount {
            id: fields.id,
            account_type: fields.account_type,
            email: fields.email,
            capabilities: fields.capabilities.unwrap_or_default(),
            charges_enabled: fields.charges_enabled.unwrap_or(false),
        }
    }
}

/// Project a Stripe account through its JSON representation.
fn project_account(account: &Account) -> Result<ConnectedAccount> {
    let value = serde_json::to_value(account)
        .map_err(|e| PaymentError::Stripe { status: 502, message: e.to_string() })?;
    project_account_json(value)
}

fn project_account_json(value: serde_json::Value) -> Result<ConnectedAccount> {
    serde_json::from_value::<AccountFields>(value)
        .map(ConnectedAccount::from)
        .map_err(|e| PaymentError::Stripe {
            status: 502,
            message: format!("unexpected account shape: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_full_account() {
        let account = project_account_json(json!({
            "id": "acct_1Example",
            "object": "account",
            "type": "express",
            "email": "tutor@example.com",
            "charges_enabled": true,
            "capabilities": { "card_payments": "active", "transfers": "active" },
            "details_submitted": true
        }))
        .unwrap();

        assert_eq!(account.id, "acct_1Example");
        assert_eq!(account.account_type.as_deref(), Some("express"));
        assert_eq!(account.email.as_deref(), Some("tutor@example.com"));
        assert_eq!(account.capabilities.card_payments.as_deref(), Some("active"));
        assert!(account.charges_enabled);
    }

    #[test]
    fn test_project_sparse_account() {
        let account = project_account_json(json!({ "id": "acct_2", "email": null })).unwrap();
        assert_eq!(account.account_type, None);
        assert_eq!(account.capabilities, AccountCapabilities::default());
        assert!(!account.charges_enabled);
    }

    #[tokio::test]
    async fn test_call_times_out_as_504() {
        let client = StripeClient::new("sk_test_xxx").with_timeout(Duration::from_millis(20));

        let err = client
            .call(std::future::pending::<std::result::Result<(), StripeError>>())
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Timeout(_)));
        assert_eq!(err.http_status(), 504);
        assert_eq!(err.code(), "STRIPE_TIMEOUT");
    }

    #[tokio::test]
    async fn test_call_passes_through_result() {
        let client = StripeClient::new("sk_test_xxx");
        let value = client
            .call(std::future::ready(Ok::<_, StripeError>(7)))
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_account_id() {
        assert!(parse_account_id("acct_123").is_ok());
        assert!(matches!(
            parse_account_id("cus_123"),
            Err(PaymentError::InvalidRequest(_))
        ));
        assert!(matches!(parse_account_id(""), Err(PaymentError::InvalidRequest(_))));
    }
}
