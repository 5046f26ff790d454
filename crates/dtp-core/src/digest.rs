//! Short content digests used to correlate orderings across log lines and
//! reports without dumping whole test lists.

use std::fmt::Write as _;

use dtp_types::TestOrder;
use sha2::{Digest, Sha256};

/// Hex characters kept from a digest.
const DIGEST_CHARS: usize = 16;

/// Stable digest of an ordering (ids and their order).
pub fn order_digest(order: &TestOrder) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"dtp-order-v1:");
    for id in order {
        hasher.update(id.as_str().as_bytes());
        hasher.update(b"\n");
    }
    hex_encode_truncated(&hasher.finalize(), DIGEST_CHARS)
}

/// Identifier of one search request: mode, failing test, universe, seed.
pub(crate) fn search_id(
    mode: &str,
    failing_test: Option<&str>,
    universe: &TestOrder,
    seed: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"dtp-search-v1:");
    hasher.update(mode.as_bytes());
    hasher.update(b":");
    hasher.update(failing_test.unwrap_or_default().as_bytes());
    hasher.update(b":");
    hasher.update(order_digest(universe).as_bytes());
    hasher.update(seed.to_le_bytes());
    format!("dtp-{}", hex_encode_truncated(&hasher.finalize(), DIGEST_CHARS))
}

/// Encode bytes as hex, truncated to `max_chars` characters.
fn hex_encode_truncated(bytes: &[u8], max_chars: usize) -> String {
    let mut s = String::with_capacity(max_chars);
    for byte in bytes {
        if s.len() >= max_chars {
            break;
        }
        let _ = write!(s, "{byte:02x}");
    }
    s.truncate(max_chars);
    s
}
