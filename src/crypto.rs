//! WeChat signature utilities
//!
//! SHA1 digests used by the webhook handshake and the JS-SDK signer.

use sha1::{Digest, Sha1};

/// SHA1 over the UTF-8 bytes of `input`, as lowercase hex
pub fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

/// Webhook signature handler
pub struct WechatCrypto;

impl WechatCrypto {
    /// Verify WeChat signature
    ///
    /// WeChat sends: signature = SHA1(sort(token, timestamp, nonce))
    pub fn verify(token: &str, timestamp: &str, nonce: &str, signature: &str) -> bool {
        let computed = Self::sign(token, timestamp, nonce);
        computed.eq_ignore_ascii_case(signature)
    }

    /// Generate signature
    pub fn sign(token: &str, timestamp: &str, nonce: &str) -> String {
        let mut parts = [token, timestamp, nonce];
        parts.sort();

        sha1_hex(&parts.concat())
    }
}
