//! The read-only contract-call execution backend and ABI source are out of
//! scope (§4.7: "via an external library") — this is the integration point
//! a deployment wires to its actual Stacks node client. The stub errors
//! clearly rather than silently returning fake data.

use async_trait::async_trait;
use proxy_core::ApiError;
use proxy_fetcher::{AbiSource, ClarityValue, ContractAbi, ContractCallExecutor, Network};

pub struct UnconfiguredChainClient;

#[async_trait]
impl ContractCallExecutor for UnconfiguredChainClient {
    async fn call_read_only(
        &self,
        _address: &str,
        _contract_name: &str,
        _function_name: &str,
        _args: &[ClarityValue],
        _network: Network,
        _sender_address: Option<&str>,
    ) -> Result<ClarityValue, ApiError> {
        Err(ApiError::upstream(
            "no contract-call execution backend is configured",
        ))
    }
}

#[async_trait]
impl AbiSource for UnconfiguredChainClient {
    async fn fetch_abi(&self, _address: &str, _contract_name: &str) -> Result<ContractAbi, ApiError> {
        Err(ApiError::upstream("no ABI source backend is configured"))
    }
}
