// src/api/razorpay.rs
//
// Minimal client for the Razorpay Orders API (https://api.razorpay.com).
// Authentication: HTTP basic auth with key id / key secret.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

const RAZORPAY_API_BASE: &str = "https://api.razorpay.com";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum RazorpayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("razorpay api error status={status} body={body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

pub async fn create_order(
    key_id: &str,
    key_secret: &str,
    req: CreateOrderRequest,
) -> Result<Order, RazorpayError> {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{RAZORPAY_API_BASE}/v1/orders"))
        .basic_auth(key_id, Some(key_secret))
        .json(&req)
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(RazorpayError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<Order>(&body)
        .map_err(|e| RazorpayError::InvalidResponse(format!("{e}; body={body}")))
}

/// Checks the checkout callback signature: the hex HMAC-SHA256 of
/// `"<order_id>|<payment_id>"` under the key secret. The comparison runs in
/// constant time via `Mac::verify_slice`. Only a holder of the secret can
/// produce a matching signature, which makes this the sole authenticity
/// control for payment completion.
pub fn verify_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(provided) = hex::decode(signature) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(key_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());

    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    fn sign(order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_valid_signature() {
        let sig = sign("order_abc123", "pay_def456");
        assert!(verify_signature(SECRET, "order_abc123", "pay_def456", &sig));
    }

    #[test]
    fn rejects_a_tampered_signature() {
        let mut sig = sign("order_abc123", "pay_def456");
        // flip one hex digit
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });

        assert!(!verify_signature(SECRET, "order_abc123", "pay_def456", &sig));
    }

    #[test]
    fn rejects_a_signature_for_a_different_order() {
        let sig = sign("order_abc123", "pay_def456");
        assert!(!verify_signature(SECRET, "order_zzz999", "pay_def456", &sig));
        assert!(!verify_signature(SECRET, "order_abc123", "pay_zzz999", &sig));
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let sig = sign("order_abc123", "pay_def456");
        assert!(!verify_signature(
            "other_secret",
            "order_abc123",
            "pay_def456",
            &sig
        ));
    }

    #[test]
    fn rejects_garbage_signatures() {
        assert!(!verify_signature(SECRET, "order_abc123", "pay_def456", ""));
        assert!(!verify_signature(
            SECRET,
            "order_abc123",
            "pay_def456",
            "not-hex-at-all"
        ));
    }
}
