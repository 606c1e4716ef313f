//! Shared-secret comparison for API key authentication.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const DOMAIN: &[u8] = b"yachtsync-api-key";

fn tag(key: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(DOMAIN);
    mac
}

/// Compare a provided key with the configured one in constant time.
///
/// Both keys are reduced to fixed-length HMAC tags first, so neither the
/// content nor the length of the expected key leaks through timing. An empty
/// expected key never matches.
pub fn keys_match(expected: &str, provided: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let expected_tag = tag(expected).finalize().into_bytes();
    tag(provided).verify_slice(&expected_tag).is_ok()
}
