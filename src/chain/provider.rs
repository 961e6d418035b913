use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use color_eyre::eyre::Result;

/// Read-side connection to an Ethereum node.
///
/// A trait-object-based wrapper so callers never spell out the full generic
/// provider type. Timeouts and retries are whatever the underlying transport
/// does; this wrapper adds no policy of its own.
pub struct EthProvider {
    provider: Box<dyn Provider + Send + Sync>,
    chain_id: u64,
}

impl EthProvider {
    /// Connect via HTTP RPC and resolve the chain id once.
    pub async fn connect(rpc_url: &str) -> Result<Self> {
        let url = rpc_url.parse()?;
        let provider = ProviderBuilder::new().on_http(url);
        let chain_id = provider.get_chain_id().await?;
        Ok(Self {
            provider: Box::new(provider),
            chain_id,
        })
    }

    /// Return the chain ID obtained at connection time.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Execute an `eth_call` against a contract with pre-encoded calldata.
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(data));
        let result = self.provider.call(tx).await?;
        Ok(result)
    }
}
