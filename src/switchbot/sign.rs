//! Request signing for the SwitchBot v1.1 API
//!
//! Every request carries a token, a millisecond timestamp `t`, a random
//! `nonce`, and `sign`: the uppercased Base64 HMAC-SHA256 of
//! `token + t + nonce` keyed by the account secret.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Authentication values for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub sign: String,
    /// Milliseconds since the Unix epoch, as decimal digits
    pub t: String,
    /// UUID v4, hyphenated (36 characters)
    pub nonce: String,
}

/// Sign a request made now, with a fresh nonce.
pub fn sign(token: &str, secret: &str) -> Signature {
    let t = chrono::Utc::now().timestamp_millis().to_string();
    let nonce = Uuid::new_v4().to_string();
    sign_with(token, secret, &t, &nonce)
}

/// Sign with an explicit timestamp and nonce.
pub fn sign_with(token: &str, secret: &str, t: &str, nonce: &str) -> Signature {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    mac.update(t.as_bytes());
    mac.update(nonce.as_bytes());
    let digest = mac.finalize().into_bytes();

    Signature {
        sign: STANDARD.encode(digest).to_uppercase(),
        t: t.to_string(),
        nonce: nonce.to_string(),
    }
}
