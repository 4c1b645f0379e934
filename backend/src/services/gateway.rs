//! # Payment Gateway Client
//!
//! Creates hosted-checkout orders with Cashfree (`POST {base}/pg/orders`,
//! API version `2023-08-01`). The gateway later reports the outcome
//! through a signed webhook, handled in [`payments`](super::payments).
//!
//! ## Request Shape
//!
//! ```json
//! {
//!     "order_id": "order_1712345",
//!     "order_amount": 2000.0,
//!     "order_currency": "INR",
//!     "customer_details": { "customer_id": "guest-42", "customer_phone": "9876543210" },
//!     "order_meta": { "return_url": "https://example.com/receipt" }
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::utils::truncate_string;

const API_VERSION: &str = "2023-08-01";

/// Errors from the payment gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Credentials or base URL missing.
    #[error("Payment gateway is not configured")]
    NotConfigured,

    /// The request never got an HTTP answer (connect, TLS, timeout).
    #[error("Gateway request failed: {0}")]
    Transport(String),

    /// The gateway answered with a non-2xx status.
    #[error("Gateway rejected order: {status} {body}")]
    Rejected { status: u16, body: String },

    /// 2xx answer without a `payment_session_id`.
    #[error("Gateway response missing payment_session_id")]
    MissingSessionId,

    /// 2xx answer that is not the expected JSON.
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// An order to open at the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub order_id: String,
    /// Whole rupees, positive.
    pub amount: i64,
    pub customer_id: String,
    pub customer_phone: String,
    pub return_url: Option<String>,
}

/// Order creation at a hosted-checkout gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create the order and return its payment session token.
    async fn create_order(&self, order: &OrderRequest) -> Result<String, GatewayError>;
}

#[derive(Serialize)]
struct CustomerDetails<'a> {
    customer_id: &'a str,
    customer_phone: &'a str,
}

#[derive(Serialize)]
struct OrderMeta<'a> {
    return_url: &'a str,
}

#[derive(Serialize)]
struct CreateOrderPayload<'a> {
    order_id: &'a str,
    order_amount: f64,
    order_currency: &'static str,
    customer_details: CustomerDetails<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_meta: Option<OrderMeta<'a>>,
}

impl<'a> CreateOrderPayload<'a> {
    fn new(order: &'a OrderRequest) -> Self {
        Self {
            order_id: &order.order_id,
            order_amount: order.amount as f64,
            order_currency: "INR",
            customer_details: CustomerDetails {
                customer_id: &order.customer_id,
                customer_phone: &order.customer_phone,
            },
            order_meta: order.return_url.as_deref().map(|return_url| OrderMeta { return_url }),
        }
    }
}

#[derive(Deserialize)]
struct CreateOrderReply {
    payment_session_id: Option<String>,
}

/// Cashfree PG client.
///
/// ## Usage
///
/// ```rust,ignore
/// let gateway = CashfreeGateway::new(&config)?;
/// let session = gateway.create_order(&order).await?;
/// ```
#[derive(Clone)]
pub struct CashfreeGateway {
    client: Client,
    app_id: String,
    secret_key: String,
    base_url: String,
}

impl CashfreeGateway {
    /// Build the client with the configured gateway timeout.
    pub fn new(config: &AppConfig) -> Result<Self, GatewayError> {
        Self::with_credentials(
            &config.cashfree_app_id,
            &config.cashfree_secret_key,
            &config.cashfree_base_url,
            config.gateway_timeout,
        )
    }

    pub fn with_credentials(
        app_id: &str,
        secret_key: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            app_id: app_id.to_string(),
            secret_key: secret_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.secret_key.is_empty() && !self.base_url.is_empty()
    }
}

#[async_trait]
impl PaymentGateway for CashfreeGateway {
    async fn create_order(&self, order: &OrderRequest) -> Result<String, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let url = format!("{}/pg/orders", self.base_url);
        debug!("Creating gateway order {} at {}", order.order_id, url);

        let response = self
            .client
            .post(&url)
            .header("x-client-id", &self.app_id)
            .header("x-client-secret", &self.secret_key)
            .header("x-api-version", API_VERSION)
            .json(&CreateOrderPayload::new(order))
            .send()
            .await
            .map_err(|e| {
                error!("Gateway request for order {} failed: {}", order.order_id, e);
                GatewayError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            error!(
                "Gateway rejected order {}: {} {}",
                order.order_id,
                status.as_u16(),
                truncate_string(&body, 200)
            );
            return Err(GatewayError::Rejected { status: status.as_u16(), body });
        }

        let reply: CreateOrderReply = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let session_id = reply
            .payment_session_id
            .filter(|s| !s.is_empty())
            .ok_or(GatewayError::MissingSessionId)?;

        info!("Gateway order {} created", order.order_id);
        Ok(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Read one HTTP request (headers plus `content-length` body) and
    /// return it as text.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serve a single canned response and hand back the request it got.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request
        });
        (format!("http://{}", addr), handle)
    }

    fn gateway(base_url: &str, timeout: Duration) -> CashfreeGateway {
        CashfreeGateway::with_credentials("app-id", "secret", base_url, timeout).unwrap()
    }

    fn order(return_url: Option<&str>) -> OrderRequest {
        OrderRequest {
            order_id: "order_1".into(),
            amount: 2000,
            customer_id: "guest-42".into(),
            customer_phone: "9876543210".into(),
            return_url: return_url.map(str::to_string),
        }
    }

    #[test]
    fn test_payload_shape() {
        let order = order(Some("https://example.com/r"));
        let json = serde_json::to_value(CreateOrderPayload::new(&order)).unwrap();
        assert_eq!(json["order_id"], "order_1");
        assert_eq!(json["order_amount"], 2000.0);
        assert_eq!(json["order_currency"], "INR");
        assert_eq!(json["customer_details"]["customer_phone"], "9876543210");
        assert_eq!(json["order_meta"]["return_url"], "https://example.com/r");
    }

    #[test]
    fn test_payload_without_return_url() {
        let order = order(None);
        let json = serde_json::to_value(CreateOrderPayload::new(&order)).unwrap();
        assert!(json.get("order_meta").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_fails_fast() {
        let gateway =
            CashfreeGateway::with_credentials("", "", "https://sandbox.cashfree.com", Duration::from_secs(1))
                .unwrap();
        let err = gateway.create_order(&order(None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured));
    }

    #[tokio::test]
    async fn test_create_order_returns_session_and_sends_headers() {
        let (base, server) = serve_once("200 OK", r#"{"payment_session_id":"session_abc"}"#).await;

        let session = gateway(&base, Duration::from_secs(5))
            .create_order(&order(Some("https://example.com/r")))
            .await
            .unwrap();
        assert_eq!(session, "session_abc");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post /pg/orders "));
        assert!(request.contains("x-client-id: app-id"));
        assert!(request.contains("x-client-secret: secret"));
        assert!(request.contains("x-api-version: 2023-08-01"));
        assert!(request.contains("\"order_id\":\"order_1\""));
    }

    #[tokio::test]
    async fn test_non_2xx_embeds_status_and_body() {
        let (base, _server) =
            serve_once("400 Bad Request", r#"{"message":"order_amount invalid"}"#).await;

        let err = gateway(&base, Duration::from_secs(5))
            .create_order(&order(None))
            .await
            .unwrap_err();
        match err {
            GatewayError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("order_amount invalid"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_without_session_id() {
        let (base, _server) = serve_once("200 OK", r#"{"order_id":"order_1"}"#).await;

        let err = gateway(&base, Duration::from_secs(5))
            .create_order(&order(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MissingSessionId));
    }

    #[tokio::test]
    async fn test_success_with_unexpected_body() {
        let (base, _server) = serve_once("200 OK", "not json").await;

        let err = gateway(&base, Duration::from_secs(5))
            .create_order(&order(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_stalled_gateway_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let started = std::time::Instant::now();
        let err = gateway(&base, Duration::from_millis(50))
            .create_order(&order(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = gateway(&base, Duration::from_secs(2))
            .create_order(&order(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
