//! Rate-limited upstream access (§4.6-§4.7), contract ABI caching (§4.7,
//! §4.9 step 5), the Clarity value model (§4.9.1), and Stacks address
//! validation (glossary).

mod abi;
mod address;
mod clarity;
mod executor;
mod fetcher;

pub use abi::{AbiSource, ContractAbi, ContractAbiStore, FunctionAbi, FunctionAccess};
pub use address::{is_valid_stacks_address, split_contract_id, Network};
pub use clarity::{decode, from_simplified, ClarityValue, DecodeOptions};
pub use executor::ContractCallExecutor;
pub use fetcher::{ContractCallFetcher, FetchOptions, RateLimitedFetcher, ResponseBody};
