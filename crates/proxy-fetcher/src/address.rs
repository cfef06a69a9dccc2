//! Stacks address syntactic validation (glossary: "prefix determines
//! network: `SP|SM` mainnet, `ST|SN` testnet").
//!
//! This is a syntactic check only (§4.9 step 7: "deep type validation is
//! out of scope; the upstream executor rejects mismatches") — it does not
//! verify the c32check checksum, only that the string has the right shape
//! to plausibly be a Stacks principal.

/// c32 alphabet: base32 minus the visually ambiguous `I`, `L`, `O`, `U`.
const C32_ALPHABET: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Some(Network::Mainnet),
            "testnet" => Some(Network::Testnet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

/// Returns `true` if `address` has the shape of a syntactically valid
/// Stacks principal: a two-letter network prefix followed by 28-40 c32
/// characters, optionally followed by `.contract-name`.
pub fn is_valid_stacks_address(address: &str) -> bool {
    let principal = address.split('.').next().unwrap_or(address);
    if principal.len() < 30 || principal.len() > 41 {
        return false;
    }
    let (prefix, rest) = principal.split_at(2);
    if !matches!(prefix, "SP" | "SM" | "ST" | "SN") {
        return false;
    }
    rest.chars().all(|c| C32_ALPHABET.contains(c.to_ascii_uppercase()))
}

/// Splits `addr.contract-name` into its parts; returns `None` if there is
/// no `.` separator.
pub fn split_contract_id(contract_id: &str) -> Option<(&str, &str)> {
    contract_id.split_once('.')
}
