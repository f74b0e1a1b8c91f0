//! GitHub webhook signature verification (`X-Hub-Signature-256`)

use hex::decode as hex_decode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

const SUPPORTED_ALGORITHM: &str = "sha256";

/// Verifies that `raw_body` was signed with `secret`.
///
/// `signature_header` is the raw header value, `sha256=<hex digest>`. Fails
/// closed on a missing header, any algorithm other than `sha256`, or a
/// digest that is not valid hex. The body must be the bytes exactly as they
/// came off the wire.
///
/// Digest comparison goes through [`Mac::verify_slice`], which is constant
/// time. Neither the secret nor either digest is ever logged.
pub fn verify(raw_body: &[u8], signature_header: Option<&str>, secret: &[u8]) -> bool {
    let Some(header) = signature_header else {
        warn!("Signature header is missing");
        return false;
    };

    let Some((algorithm, digest_hex)) = header.split_once('=') else {
        warn!("Signature header is malformed");
        return false;
    };
    if algorithm != SUPPORTED_ALGORITHM {
        warn!("Unsupported signature algorithm {:?}", algorithm);
        return false;
    }

    let received = match hex_decode(digest_hex) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!("Signature digest is not valid hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(raw_body);

    if mac.verify_slice(&received).is_err() {
        warn!("Signature does not match payload");
        return false;
    }
    true
}

/// HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a digest the way GitHub sends it: `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}={}", SUPPORTED_ALGORITHM, hex::encode(signature))
}
