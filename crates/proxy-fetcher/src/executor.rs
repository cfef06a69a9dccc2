//! The out-of-scope collaborator that actually executes a read-only smart
//! contract call (§4.7: "calls a read-only smart-contract function via an
//! external library"). Kept as a trait so the rate-limited fetcher and its
//! retry/cache discipline are testable without a live chain.

use async_trait::async_trait;
use proxy_core::ApiError;

use crate::address::Network;
use crate::clarity::ClarityValue;

#[async_trait]
pub trait ContractCallExecutor: Send + Sync {
    async fn call_read_only(
        &self,
        address: &str,
        contract_name: &str,
        function_name: &str,
        args: &[ClarityValue],
        network: Network,
        sender_address: Option<&str>,
    ) -> Result<ClarityValue, ApiError>;
}
