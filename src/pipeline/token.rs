//! Session token minting.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Mint a fresh session token for a first-time visitor.
///
/// Hashes the current time and client address together with a random
/// UUID, so concurrent first visits from one address still diverge.
pub fn mint(client_ip: &str) -> String {
    let now = Utc::now();
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.update(client_ip.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_is_hex_sha256() {
        let token = mint("203.0.113.1");
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_address_same_instant_still_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| mint("203.0.113.1")).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
