//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{FromRequest, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use connect_payments::{
    cap_accounts, validate_account_id, CheckoutRequest, CheckoutSessionParams, ConnectedAccount,
    PaymentError, RedirectUrls, WebhookHandler, WebhookOutcome, ACCOUNT_LIST_LIMIT,
    SIGNATURE_HEADER,
};

use crate::config::ResponseMode;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub accounts: AccountList,
    pub public_key: String,
    pub base_price: i64,
    pub currency: String,
    /// `json` or `redirect`, so the page knows whether to fetch or navigate
    pub response_mode: &'static str,
}

/// Same envelope Stripe list endpoints use, which the storefront script expects
#[derive(Serialize)]
pub struct AccountList {
    pub data: Vec<StorefrontAccount>,
}

#[derive(Serialize)]
pub struct StorefrontAccount {
    #[serde(flatten)]
    pub account: ConnectedAccount,

    /// Offered for checkout; otherwise the page links to onboarding
    pub accepts_payments: bool,
}

impl From<ConnectedAccount> for StorefrontAccount {
    fn from(account: ConnectedAccount) -> Self {
        Self {
            accepts_payments: account.can_accept_payments(),
            account,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Serialize)]
pub struct LinkResponse {
    pub url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn bad_request(error: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, error, "INVALID_REQUEST")
}

fn payment_error(err: &PaymentError) -> ApiError {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
    api_error(status, err.user_message(), err.code())
}

// ============================================================================
// Checkout body
// ============================================================================

/// Quantity as sent by a JSON client (number) or an HTML form (text)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuantityField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct CheckoutForm {
    quantity: QuantityField,
    #[serde(default)]
    account: String,
}

impl CheckoutForm {
    fn into_request(self) -> Result<CheckoutRequest, ApiError> {
        let quantity = match self.quantity {
            QuantityField::Number(n) => n,
            QuantityField::Text(text) => text.trim().parse().map_err(|_| {
                bad_request(format!("quantity must be a positive integer, got {text:?}"))
            })?,
        };
        Ok(CheckoutRequest {
            quantity,
            account: self.account,
        })
    }
}

/// Checkout order from either `application/json` or a URL-encoded form
pub struct CheckoutPayload(pub CheckoutRequest);

impl<S> FromRequest<S> for CheckoutPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        let form = if is_form {
            let Form(form) = Form::<CheckoutForm>::from_request(req, state)
                .await
                .map_err(|e| bad_request(e.body_text()))?;
            form
        } else {
            let Json(form) = Json::<CheckoutForm>::from_request(req, state)
                .await
                .map_err(|e| bad_request(e.body_text()))?;
            form
        };

        form.into_request().map(Self)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Base URL redirect targets are built on: `DOMAIN`, else the request's host.
fn public_base_url(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(domain) = &state.config.domain {
        return Ok(domain.clone());
    }

    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(|host| format!("http://{host}"))
        .ok_or_else(|| bad_request("Cannot build redirect URLs without DOMAIN or a Host header"))
}

fn require_account(query: AccountQuery) -> Result<String, ApiError> {
    let account = query.account_id.unwrap_or_default().trim().to_string();
    validate_account_id(&account).map_err(|e| payment_error(&e))?;
    Ok(account)
}

fn url_response(mode: ResponseMode, url: String) -> Response {
    match mode {
        ResponseMode::Json => Json(LinkResponse { url }).into_response(),
        ResponseMode::Redirect => Redirect::to(&url).into_response(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Storefront configuration with the newest connected accounts
pub async fn get_config(
    State(state): State<AppState>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let accounts = state
        .platform
        .list_accounts(ACCOUNT_LIST_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!("Account listing failed: {}", e);
            payment_error(&e)
        })?;

    Ok(Json(ConfigResponse {
        accounts: AccountList {
            data: cap_accounts(accounts, ACCOUNT_LIST_LIMIT)
                .into_iter()
                .map(StorefrontAccount::from)
                .collect(),
        },
        public_key: state.config.publishable_key.clone(),
        base_price: state.config.base_price,
        currency: state.config.currency.clone(),
        response_mode: state.config.response_mode.as_str(),
    }))
}

/// Express dashboard login link for a connected account
pub async fn express_dashboard_link(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let account = require_account(query)?;

    let redirect_url = match headers.get(header::REFERER).and_then(|v| v.to_str().ok()) {
        Some(referer) => referer.to_string(),
        None => public_base_url(&state, &headers)?,
    };

    let url = state
        .platform
        .create_login_link(&account, &redirect_url)
        .await
        .map_err(|e| {
            tracing::error!(account = %account, "Login link error: {}", e);
            payment_error(&e)
        })?;

    Ok(url_response(state.config.response_mode, url))
}

/// Onboarding link for a connected account that has not finished signing up
pub async fn onboarding_link(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let account = require_account(query)?;
    let base_url = public_base_url(&state, &headers)?;

    let refresh_url = format!("{base_url}/onboarding-link?account_id={account}");
    let return_url = format!("{base_url}/");

    let url = state
        .platform
        .create_onboarding_link(&account, &refresh_url, &return_url)
        .await
        .map_err(|e| {
            tracing::error!(account = %account, "Onboarding link error: {}", e);
            payment_error(&e)
        })?;

    Ok(url_response(state.config.response_mode, url))
}

/// Create a direct-charge Checkout session on a connected account
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    CheckoutPayload(request): CheckoutPayload,
) -> Result<Response, ApiError> {
    let base_url = public_base_url(&state, &headers)?;

    let params = CheckoutSessionParams::build(
        &request,
        state.config.base_price,
        &state.config.fees,
        RedirectUrls::for_domain(&base_url),
    )
    .map_err(|e| {
        tracing::warn!(account = %request.account, quantity = request.quantity, "Checkout rejected: {}", e);
        payment_error(&e)
    })?;

    let session = state
        .platform
        .create_checkout_session(&params)
        .await
        .map_err(|e| {
            tracing::error!(account = %params.account, "Checkout error: {}", e);
            payment_error(&e)
        })?;

    Ok(match state.config.response_mode {
        ResponseMode::Json => Json(CheckoutResponse {
            session_id: session.id,
            url: session.url,
        })
        .into_response(),
        ResponseMode::Redirect => Redirect::to(&session.url).into_response(),
    })
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "Missing Stripe signature",
                "MISSING_SIGNATURE",
            )
        })?;

    let event = state.verifier.verify(&body, signature).map_err(|e| {
        tracing::warn!("Webhook rejected: {}", e);
        payment_error(&e)
    })?;

    let handler = WebhookHandler::new(state.fulfillment.clone());

    let outcome = handler.handle(event).await.map_err(|e| {
        tracing::error!("Webhook processing error: {}", e);
        payment_error(&e)
    })?;

    if let WebhookOutcome::Fulfilled(order) = outcome {
        tracing::debug!(session_id = %order.session_id, "Webhook fulfilled");
    }

    Ok(Json(WebhookAck { received: true }))
}
