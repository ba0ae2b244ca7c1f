use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("payment gateway timed out")]
    Timeout,

    #[error("checkout signature is not valid hex")]
    MalformedSignature,

    #[error("checkout signature does not match")]
    SignatureMismatch,
}

/// Order handle returned by the gateway before the client-side checkout runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    pub trip_id: Uuid,
    pub amount_inr: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Seam to the hosted payment gateway. Internals (HTTP, retries on reads)
/// live behind this trait; the engine only sees order handles.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn create_order(&self, trip_id: Uuid, amount_inr: i64) -> Result<PaymentOrder, PaymentError>;

    async fn capture(&self, order_id: &str, amount_inr: i64) -> Result<(), PaymentError>;
}

/// Gateway stand-in for tests and local runs.
pub struct MockPaymentAdapter;

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_order(&self, trip_id: Uuid, amount_inr: i64) -> Result<PaymentOrder, PaymentError> {
        Ok(PaymentOrder {
            id: format!("order_mock_{}", trip_id.simple()),
            trip_id,
            amount_inr,
            currency: "INR".to_string(),
            created_at: Utc::now(),
        })
    }

    async fn capture(&self, order_id: &str, _amount_inr: i64) -> Result<(), PaymentError> {
        if order_id.starts_with("order_mock_") {
            Ok(())
        } else {
            Err(PaymentError::Gateway(format!("unknown order {}", order_id)))
        }
    }
}

/// Recompute the checkout signature the gateway's client SDK produces:
/// hex(HMAC-SHA256(secret, "order_id|payment_id")).
pub fn checkout_signature(order_id: &str, payment_id: &str, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a client-supplied checkout signature. Comparison is constant-time
/// via `Mac::verify_slice`; any mismatch is a hard failure.
pub fn verify_checkout_signature(
    order_id: &str,
    payment_id: &str,
    signature_hex: &str,
    secret: &[u8],
) -> Result<(), PaymentError> {
    let supplied = hex::decode(signature_hex).map_err(|_| PaymentError::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&supplied)
        .map_err(|_| PaymentError::SignatureMismatch)
}
