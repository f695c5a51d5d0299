//! Stripe Webhook Handling
//!
//! Verifies `Stripe-Signature` headers and dispatches checkout completion
//! events from connected accounts to a [`Fulfillment`] sink.
//!
//! ```text
//!   raw body + header ──▶ WebhookVerifier::verify ──▶ WebhookEvent ──▶ WebhookHandler::handle
//!            │                                                                │
//!            └── 400, nothing parsed                       checkout.session.completed
//!                                                          checkout.session.async_payment_succeeded
//!                                                                             │
//!                                                                   Fulfillment::fulfill
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header Stripe signs deliveries with
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed delivery, in seconds. Future timestamps are not limited.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
    "checkout.session.async_payment_succeeded";

/// Verifies webhook signatures with the endpoint's signing secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: u64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify `header` against `payload` and only then parse the event.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<WebhookEvent> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock.
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<WebhookEvent> {
        self.verify_signature(payload, header, now)?;
        WebhookEvent::from_slice(payload)
    }

    fn verify_signature(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let parsed = SignatureHeader::parse(header)?;

        // Past timestamps only; a sender clock ahead of ours is accepted.
        let age = now.saturating_sub(parsed.timestamp);
        if u64::try_from(age).is_ok_and(|age| age > self.tolerance_secs) {
            return Err(PaymentError::WebhookSignature(format!(
                "timestamp {} older than tolerance of {}s",
                parsed.timestamp, self.tolerance_secs
            )));
        }

        let mac = self.mac_for(parsed.timestamp, payload)?;
        let matched = parsed.signatures.iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            mac.clone().verify_slice(&expected).is_ok()
        });

        if matched {
            Ok(())
        } else {
            Err(PaymentError::WebhookSignature(
                "no signature matches the payload".into(),
            ))
        }
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Build a `Stripe-Signature` value for `payload`, as the Stripe CLI does
    /// when forwarding test events.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let signature = hex::encode(self.mac_for(timestamp, payload)?.finalize().into_bytes());
        Ok(format!("t={timestamp},v1={signature}"))
    }
}

/// Parsed `t=...,v1=...` header
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for pair in header.split(',') {
            let Some((key, value)) = pair.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        PaymentError::WebhookSignature(format!("invalid timestamp {value:?}"))
                    })?);
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            PaymentError::WebhookSignature("missing timestamp in signature header".into())
        })?;
        if signatures.is_empty() {
            return Err(PaymentError::WebhookSignature(
                "no v1 signature in signature header".into(),
            ));
        }

        Ok(Self { timestamp, signatures })
    }
}

/// Verified Stripe event. The session payload stays opaque.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Connected account the event originated on
    #[serde(default)]
    pub account: Option<String>,

    pub data: EventData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }
}

/// Checkout outcome that warrants fulfillment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutCompletion {
    /// Paid synchronously (cards)
    Completed,
    /// Delayed payment method has now settled
    AsyncPaymentSucceeded,
}

impl CheckoutCompletion {
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            CHECKOUT_SESSION_COMPLETED => Some(Self::Completed),
            CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => Some(Self::AsyncPaymentSucceeded),
            _ => None,
        }
    }
}

/// A paid order ready to be fulfilled
#[derive(Clone, Debug, Serialize)]
pub struct FulfillmentOrder {
    pub event_id: String,
    pub kind: CheckoutCompletion,
    pub account: Option<String>,
    pub session_id: String,
    pub payment_status: Option<String>,
    pub session: serde_json::Value,
}

/// Side effect run once per recognized checkout completion delivery
#[async_trait]
pub trait Fulfillment: Send + Sync {
    async fn fulfill(&self, order: &FulfillmentOrder) -> Result<()>;
}

/// Fulfillment that records the purchase in the service log
#[derive(Clone, Debug, Default)]
pub struct LogFulfillment;

#[async_trait]
impl Fulfillment for LogFulfillment {
    async fn fulfill(&self, order: &FulfillmentOrder) -> Result<()> {
        tracing::info!(
            event_id = %order.event_id,
            kind = ?order.kind,
            account = order.account.as_deref().unwrap_or("-"),
            session_id = %order.session_id,
            payment_status = order.payment_status.as_deref().unwrap_or("-"),
            "Fulfilling checkout session"
        );
        tracing::debug!(session = %order.session, "Checkout session payload");
        Ok(())
    }
}

/// What the handler did with an event
#[derive(Clone, Debug)]
pub enum WebhookOutcome {
    Fulfilled(FulfillmentOrder),
    Ignored { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler<F: Fulfillment + ?Sized> {
    fulfillment: Arc<F>,
}

impl<F: Fulfillment + ?Sized> WebhookHandler<F> {
    pub fn new(fulfillment: Arc<F>) -> Self {
        Self { fulfillment }
    }

    /// Process a verified webhook event
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            account = event.account.as_deref().unwrap_or("-"),
            "Processing Stripe webhook"
        );

        let Some(kind) = CheckoutCompletion::from_event_type(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "Unhandled webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        };

        let order = Self::order_from(kind, event)?;
        self.fulfillment.fulfill(&order).await?;

        Ok(WebhookOutcome::Fulfilled(order))
    }

    fn order_from(kind: CheckoutCompletion, event: WebhookEvent) -> Result<FulfillmentOrder> {
        let session = event.data.object;
        let session_id = session
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| PaymentError::WebhookParse("checkout session without id".into()))?
            .to_string();
        let payment_status = session
            .get("payment_status")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        Ok(FulfillmentOrder {
            event_id: event.id,
            kind,
            account: event.account,
            session_id,
            payment_status,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    const SECRET: &str = "whsec_test123secret456";
    const NOW: i64 = 1_700_000_000;

    #[derive(Default)]
    struct RecordingFulfillment {
        orders: Mutex<Vec<FulfillmentOrder>>,
    }

    #[async_trait]
    impl Fulfillment for RecordingFulfillment {
        async fn fulfill(&self, order: &FulfillmentOrder) -> Result<()> {
            self.orders.lock().unwrap().push(order.clone());
            Ok(())
        }
    }

    fn event_payload(event_type: &str) -> Vec<u8> {
        json!({
            "id": "evt_1",
            "object": "event",
            "type": event_type,
            "account": "acct_123",
            "data": {
                "object": {
                    "id": "cs_test_abc",
                    "object": "checkout.session",
                    "payment_status": "paid"
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_valid_signature_parses_event() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);
        let header = verifier.sign(&payload, NOW).unwrap();

        let event = verifier.verify_at(&payload, &header, NOW + 5).unwrap();
        assert_eq!(event.event_type, CHECKOUT_SESSION_COMPLETED);
        assert_eq!(event.account.as_deref(), Some("acct_123"));
        assert_eq!(event.data.object["id"], "cs_test_abc");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);
        let header = WebhookVerifier::new("whsec_other").sign(&payload, NOW).unwrap();

        let result = WebhookVerifier::new(SECRET).verify_at(&payload, &header, NOW);
        assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);
        let header = verifier.sign(&payload, NOW).unwrap();
        let tampered = event_payload("payment_intent.created");

        assert!(verifier.verify_at(&tampered, &header, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);
        let header = verifier.sign(&payload, NOW - 600).unwrap();

        assert!(matches!(
            verifier.verify_at(&payload, &header, NOW),
            Err(PaymentError::WebhookSignature(_))
        ));
    }

    #[test]
    fn test_timestamp_ahead_of_clock_accepted() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);
        let header = verifier.sign(&payload, NOW + 600).unwrap();

        assert!(verifier.verify_at(&payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_custom_tolerance() {
        let verifier = WebhookVerifier::new(SECRET).with_tolerance(3600);
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);

        let header = verifier.sign(&payload, NOW - 600).unwrap();
        assert!(verifier.verify_at(&payload, &header, NOW).is_ok());

        let header = verifier.sign(&payload, NOW - 3601).unwrap();
        assert!(verifier.verify_at(&payload, &header, NOW).is_err());
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);
        let signed = verifier.sign(&payload, NOW).unwrap();
        let good = signed.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v0=legacy,v1={good}", "0".repeat(64));

        assert!(verifier.verify_at(&payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = event_payload(CHECKOUT_SESSION_COMPLETED);

        let unsigned = format!("t={NOW}");

        for header in ["", "garbage", "t=abc,v1=00", "v1=00", unsigned.as_str()] {
            assert!(
                matches!(
                    verifier.verify_at(&payload, header, NOW),
                    Err(PaymentError::WebhookSignature(_))
                ),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_signed_invalid_json_is_parse_error() {
        let verifier = WebhookVerifier::new(SECRET);
        let payload = b"not json";
        let header = verifier.sign(payload, NOW).unwrap();

        assert!(matches!(
            verifier.verify_at(payload, &header, NOW),
            Err(PaymentError::WebhookParse(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", WebhookVerifier::new(SECRET));
        assert!(!rendered.contains(SECRET));
    }

    #[tokio::test]
    async fn test_completed_event_fulfilled_once() {
        let recorder = Arc::new(RecordingFulfillment::default());
        let handler = WebhookHandler::new(recorder.clone());
        let event = WebhookEvent::from_slice(&event_payload(CHECKOUT_SESSION_COMPLETED)).unwrap();

        let outcome = handler.handle(event).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Fulfilled(_)));

        let orders = recorder.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].kind, CheckoutCompletion::Completed);
        assert_eq!(orders[0].account.as_deref(), Some("acct_123"));
        assert_eq!(orders[0].session_id, "cs_test_abc");
        assert_eq!(orders[0].payment_status.as_deref(), Some("paid"));
    }

    #[tokio::test]
    async fn test_async_payment_succeeded_fulfilled() {
        let recorder = Arc::new(RecordingFulfillment::default());
        let handler = WebhookHandler::new(recorder.clone());
        let event =
            WebhookEvent::from_slice(&event_payload(CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED))
                .unwrap();

        handler.handle(event).await.unwrap();
        let orders = recorder.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].kind, CheckoutCompletion::AsyncPaymentSucceeded);
    }

    #[tokio::test]
    async fn test_other_events_ignored() {
        let recorder = Arc::new(RecordingFulfillment::default());
        let handler = WebhookHandler::new(recorder.clone());
        let event = WebhookEvent::from_slice(&event_payload("payment_intent.created")).unwrap();

        let outcome = handler.handle(event).await.unwrap();
        assert!(matches!(
            outcome,
            WebhookOutcome::Ignored { ref event_type } if event_type == "payment_intent.created"
        ));
        assert!(recorder.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completed_event_without_session_id_rejected() {
        let recorder = Arc::new(RecordingFulfillment::default());
        let handler = WebhookHandler::new(recorder.clone());
        let event: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": CHECKOUT_SESSION_COMPLETED,
            "data": { "object": {} }
        }))
        .unwrap();

        assert!(matches!(
            handler.handle(event).await,
            Err(PaymentError::WebhookParse(_))
        ));
        assert!(recorder.orders.lock().unwrap().is_empty());
    }
}
