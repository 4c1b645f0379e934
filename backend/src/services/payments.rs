//! # Payment Service
//!
//! Gateway orders, webhook reconciliation, and the manual UPI path.
//!
//! ## Payment State Machine
//!
//! ```text
//!                 ┌──► SUCCESS   (terminal)
//!   PENDING ──────┤
//!                 └──► FAILED    (terminal)
//! ```
//!
//! Only a verified webhook moves a payment out of `PENDING`, and the move
//! happens at most once per order id. Gateways redeliver webhooks, so a
//! delivery for a payment that is already terminal is acknowledged and
//! otherwise ignored.
//!
//! ## Webhook Flow
//!
//! ```text
//! 1. HMAC-SHA256(secret, raw body) == signature header?   no → InvalidSignature
//!                ↓
//! 2. Parse {type, data.order.order_id}                    bad → MalformedPayload
//!                ↓
//! 3. Stored status terminal?                              yes → ack (duplicate)
//!                ↓
//! 4. Map type → SUCCESS / FAILED                          other → ack (ignored)
//!                ↓
//! 5. Conditional terminal write                           fail → StoreUnavailable
//! ```

use std::sync::Arc;

use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::db::{PaymentConfirmation, PaymentRecord, PaymentStatus, PaymentStore, SettleOutcome};
use crate::models::UpiLinkResponse;

use super::gateway::{GatewayError, OrderRequest, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

/// Webhook event that settles a payment successfully.
pub const PAYMENT_SUCCESS_EVENT: &str = "PAYMENT_SUCCESS_WEBHOOK";

/// Webhook event that settles a payment as failed.
pub const PAYMENT_FAILED_EVENT: &str = "PAYMENT_FAILED_WEBHOOK";

/// Amount used for UPI links when none is given.
pub const DEFAULT_UPI_AMOUNT: &str = "1500";

/// Errors that can occur in payment operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Missing or invalid input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Order creation at the gateway failed.
    #[error(transparent)]
    GatewayError(#[from] GatewayError),

    /// Webhook signature missing or wrong.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook body is not the expected envelope.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// No payment with this order id.
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// The payment store failed.
    #[error("Payment store unavailable: {0}")]
    StoreUnavailable(String),
}

impl PaymentError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::InvalidRequest(_) => "INVALID_REQUEST",
            PaymentError::GatewayError(GatewayError::NotConfigured) => "GATEWAY_NOT_CONFIGURED",
            PaymentError::GatewayError(_) => "GATEWAY_ERROR",
            PaymentError::InvalidSignature => "INVALID_SIGNATURE",
            PaymentError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            PaymentError::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            PaymentError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

/// Outcome of an accepted webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    /// This delivery moved the payment into the given terminal status.
    Applied(PaymentStatus),
    /// The payment was already terminal; nothing changed.
    Duplicate,
    /// Authentic event of a type this service does not act on.
    Ignored,
}

/// A gateway order that was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: String,
    pub payment_session_id: String,
    /// Whether the `PENDING` row was written.
    pub payment_recorded: bool,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    order: Option<WebhookOrder>,
}

#[derive(Debug, Deserialize)]
struct WebhookOrder {
    order_id: Option<String>,
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check a webhook signature in constant time.
///
/// An empty secret or a missing signature never verifies.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let provided = match signature.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };
    if secret.is_empty() {
        return false;
    }

    match sign_payload(secret, body) {
        Some(expected) => expected.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() == 1,
        None => false,
    }
}

/// Orders, webhooks and UPI confirmations.
///
/// ## Usage
///
/// ```rust,ignore
/// let payments = PaymentService::new(store, Arc::new(CashfreeGateway::new(&config)?), &config);
///
/// let order = payments.create_order("order_1", 2000, "guest-42", "98765", None).await?;
/// let ack = payments.receive_webhook(&raw_body, signature).await?;
/// ```
#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,

    /// Shared gateway secret; keys the webhook HMAC.
    webhook_secret: String,

    default_return_url: Option<String>,
    upi_id: String,
    merchant_name: String,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            payments,
            gateway,
            webhook_secret: config.cashfree_secret_key.clone(),
            default_return_url: config.payment_return_url.clone(),
            upi_id: config.upi_id.clone(),
            merchant_name: config.merchant_name.clone(),
        }
    }

    // ==========================================
    // GATEWAY ORDERS
    // ==========================================

    /// Open an order at the gateway and record it as `PENDING`.
    ///
    /// Recording is best-effort: once the gateway has created the order,
    /// a failed insert is logged and reported through
    /// `payment_recorded = false` instead of failing the call.
    pub async fn create_order(
        &self,
        order_id: &str,
        amount: i64,
        customer_id: &str,
        phone: &str,
        return_url: Option<&str>,
    ) -> Result<CreatedOrder, PaymentError> {
        let order_id = order_id.trim();
        if order_id.is_empty() || customer_id.trim().is_empty() || phone.trim().is_empty() {
            return Err(PaymentError::InvalidRequest(
                "order_id, amount, customer_id and phone are required".to_string(),
            ));
        }
        if amount <= 0 {
            return Err(PaymentError::InvalidRequest(format!("Invalid amount: {}", amount)));
        }

        let order = OrderRequest {
            order_id: order_id.to_string(),
            amount,
            customer_id: customer_id.trim().to_string(),
            customer_phone: phone.trim().to_string(),
            return_url: return_url
                .filter(|u| !u.trim().is_empty())
                .map(str::to_string)
                .or_else(|| self.default_return_url.clone()),
        };

        let payment_session_id = self.gateway.create_order(&order).await?;

        let payment_recorded = match self.payments.insert_pending_payment(order_id, amount).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Order {} created but pending payment not recorded: {}", order_id, e);
                false
            }
        };

        info!("💳 Order {} opened for {} (recorded: {})", order_id, amount, payment_recorded);

        Ok(CreatedOrder {
            order_id: order_id.to_string(),
            payment_session_id,
            payment_recorded,
        })
    }

    // ==========================================
    // WEBHOOKS
    // ==========================================

    /// Verify and apply one webhook delivery.
    ///
    /// `raw_body` must be the exact bytes received; the signature covers
    /// them, not a re-serialization.
    pub async fn receive_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, PaymentError> {
        if !verify_signature(&self.webhook_secret, raw_body, signature) {
            warn!("Rejected webhook with invalid signature ({} bytes)", raw_body.len());
            return Err(PaymentError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;

        let order_id = event
            .data
            .and_then(|d| d.order)
            .and_then(|o| o.order_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| PaymentError::MalformedPayload("missing order_id".to_string()))?;
        let event_type = event.event_type.unwrap_or_default();

        debug!("Webhook {} for order {}", event_type, order_id);

        // Fast path for redeliveries; the conditional write below is what
        // actually guarantees a single transition.
        match self.payments.find_payment(&order_id).await {
            Ok(Some(existing)) => {
                let terminal = PaymentStatus::parse(&existing.status)
                    .map(|s| s.is_terminal())
                    .unwrap_or(false);
                if terminal {
                    info!("Duplicate webhook for order {} ({})", order_id, existing.status);
                    return Ok(WebhookAck::Duplicate);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Payment lookup for order {} failed, proceeding: {}", order_id, e);
            }
        }

        let status = match event_type.as_str() {
            PAYMENT_SUCCESS_EVENT => PaymentStatus::Success,
            PAYMENT_FAILED_EVENT => PaymentStatus::Failed,
            other => {
                info!("Ignoring webhook type {:?} for order {}", other, order_id);
                return Ok(WebhookAck::Ignored);
            }
        };

        match self.payments.settle_payment(&order_id, status).await {
            Ok(SettleOutcome::Applied) => {
                info!("✅ Payment {} settled as {}", order_id, status.as_str());
                Ok(WebhookAck::Applied(status))
            }
            Ok(SettleOutcome::AlreadyTerminal) => {
                info!("Concurrent delivery already settled order {}", order_id);
                Ok(WebhookAck::Duplicate)
            }
            Err(e) => {
                error!("Failed to settle payment {}: {}", order_id, e);
                Err(PaymentError::StoreUnavailable(e.to_string()))
            }
        }
    }

    /// Current record of a payment.
    pub async fn payment_status(&self, order_id: &str) -> Result<PaymentRecord, PaymentError> {
        self.payments
            .find_payment(order_id)
            .await
            .map_err(|e| PaymentError::StoreUnavailable(e.to_string()))?
            .ok_or_else(|| PaymentError::PaymentNotFound(order_id.to_string()))
    }

    // ==========================================
    // UPI
    // ==========================================

    /// `upi://pay` deep link for a payment.
    pub fn upi_link(
        &self,
        payment_id: &str,
        amount: Option<&str>,
    ) -> Result<UpiLinkResponse, PaymentError> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Err(PaymentError::InvalidRequest("payment id is required".to_string()));
        }

        let amount = amount
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_UPI_AMOUNT);
        match amount.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => {}
            _ => return Err(PaymentError::InvalidRequest(format!("Invalid amount: {}", amount))),
        }

        let note = format!("Payment ID: {}", payment_id);
        let link = Url::parse_with_params(
            "upi://pay",
            &[
                ("pa", self.upi_id.as_str()),
                ("pn", self.merchant_name.as_str()),
                ("am", amount),
                ("cu", "INR"),
                ("tn", note.as_str()),
            ],
        )
        .map_err(|e| PaymentError::InvalidRequest(e.to_string()))?;

        Ok(UpiLinkResponse {
            payment_id: payment_id.to_string(),
            amount: amount.to_string(),
            upi_link: link.to_string(),
            payee_vpa: self.upi_id.clone(),
            payee_name: self.merchant_name.clone(),
        })
    }

    /// Store the UTR a guest entered after paying over UPI.
    pub async fn record_utr(
        &self,
        booking_id: &str,
        utr: &str,
    ) -> Result<PaymentConfirmation, PaymentError> {
        let (booking_id, utr) = (booking_id.trim(), utr.trim());
        if booking_id.is_empty() {
            return Err(PaymentError::InvalidRequest("booking id is required".to_string()));
        }
        if utr.is_empty() {
            return Err(PaymentError::InvalidRequest("UTR is required".to_string()));
        }

        let confirmation = self
            .payments
            .record_utr(booking_id, utr)
            .await
            .map_err(|e| PaymentError::StoreUnavailable(e.to_string()))?;

        info!("UTR recorded for booking {}", booking_id);
        Ok(confirmation)
    }
}
