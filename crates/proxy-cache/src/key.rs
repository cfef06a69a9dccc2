//! Deterministic cache-key derivation (§4.3).

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Builds cache keys for the two shapes this system needs: a hashed key for
/// contract-call results (whose identity depends on the call arguments) and
/// a plain path-based key for everything else.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// `{prefix}_call_{address}_{contract}_{function}_{network}_{hash10}`
    /// where `hash10` is the first 10 hex characters of the SHA-256 digest
    /// of `args` serialized via `serde_json`'s default (sorted-key) object
    /// encoding, so identical argument sets always hash identically
    /// regardless of construction order.
    pub fn contract_call_key(
        prefix: &str,
        address: &str,
        contract: &str,
        function: &str,
        network: &str,
        args: &Value,
    ) -> String {
        let stable = serde_json::to_string(args).unwrap_or_else(|_| "null".to_string());
        let hash = Self::hash10(stable.as_bytes());
        format!("{prefix}_call_{address}_{contract}_{function}_{network}_{hash}")
    }

    /// `{route_prefix}{path with '/' replaced by '_'}`.
    pub fn path_key(route_prefix: &str, path: &str) -> String {
        format!("{route_prefix}{}", path.replace('/', "_"))
    }

    fn hash10(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(10);
        for byte in digest.iter().take(5) {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contract_call_key_is_deterministic_and_order_independent() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        let key_a = CacheKeyBuilder::contract_call_key(
            "hiro-api", "SP000...", "pool", "get-price", "mainnet", &a,
        );
        let key_b = CacheKeyBuilder::contract_call_key(
            "hiro-api", "SP000...", "pool", "get-price", "mainnet", &b,
        );
        assert_eq!(key_a, key_b);
        assert!(key_a.starts_with("hiro-api_call_SP000..._pool_get-price_mainnet_"));
        let hash = key_a.rsplit('_').next().unwrap();
        assert_eq!(hash.len(), 10);
    }

    #[test]
    fn contract_call_key_differs_on_distinct_args() {
        let key_a = CacheKeyBuilder::contract_call_key(
            "hiro-api", "SP1", "pool", "f", "mainnet", &json!({"x": 1}),
        );
        let key_b = CacheKeyBuilder::contract_call_key(
            "hiro-api", "SP1", "pool", "f", "mainnet", &json!({"x": 2}),
        );
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn path_key_replaces_slashes() {
        assert_eq!(
            CacheKeyBuilder::path_key("stx-city_", "/tokens/list"),
            "stx-city__tokens_list"
        );
    }
}
