use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use lru::LruCache;
use tracing::warn;

use crate::chain::abi;
use crate::chain::batch::{CallExecutor, ContractClient};
use crate::chain::error::ChainError;
use crate::utils::short_address;

const DIRECTORY_SIZE: usize = 256;

/// Display metadata for an ERC-20 token.
#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Resolves and caches ERC-20 name/symbol/decimals.
///
/// A lookup that fails degrades to placeholder metadata so rendering never
/// blocks on a misbehaving token contract. Failures are not cached, so a
/// later reload can still pick up the real values.
pub struct TokenDirectory {
    executor: Arc<dyn CallExecutor>,
    cache: Mutex<LruCache<Address, TokenMetadata>>,
}

impl TokenDirectory {
    pub fn new(executor: Arc<dyn CallExecutor>) -> Self {
        Self {
            executor,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(DIRECTORY_SIZE).unwrap())),
        }
    }

    pub async fn resolve(&self, address: Address) -> TokenMetadata {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&address) {
                return cached.clone();
            }
        }

        match self.fetch(address).await {
            Ok(metadata) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(address, metadata.clone());
                }
                metadata
            }
            Err(e) => {
                warn!(token = %address, error = %e, "token metadata lookup failed");
                placeholder(address)
            }
        }
    }

    async fn fetch(&self, address: Address) -> Result<TokenMetadata, ChainError> {
        let client = ContractClient::new(
            "erc20",
            address,
            abi::token_abi(),
            Arc::clone(&self.executor),
        );

        let values = client
            .batch()
            .call("name", &[])
            .call("symbol", &[])
            .call("decimals", &[])
            .execute()
            .await?;

        Ok(TokenMetadata {
            address,
            name: values.string(0)?,
            symbol: values.string(1)?,
            decimals: values.u8(2)?,
        })
    }
}

fn placeholder(address: Address) -> TokenMetadata {
    TokenMetadata {
        address,
        name: short_address(&address),
        symbol: "???".to_string(),
        decimals: 18,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy::primitives::{Bytes, U256};
    use async_trait::async_trait;

    use super::*;
    use crate::chain::batch::EncodedCall;

    struct StaticExecutor {
        responses: Mutex<VecDeque<Result<Vec<Bytes>, ChainError>>>,
        executed: AtomicUsize,
    }

    impl StaticExecutor {
        fn new(responses: Vec<Result<Vec<Bytes>, ChainError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                executed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CallExecutor for StaticExecutor {
        async fn execute(&self, _calls: Vec<EncodedCall>) -> Result<Vec<Bytes>, ChainError> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChainError::Batch("no canned response".into())))
        }
    }

    /// ABI encoding of a single dynamic string return value.
    fn string_word(s: &str) -> Bytes {
        let mut out = Vec::new();
        out.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(s.len() as u64).to_be_bytes::<32>());
        let mut data = s.as_bytes().to_vec();
        while data.len() % 32 != 0 {
            data.push(0);
        }
        out.extend_from_slice(&data);
        Bytes::from(out)
    }

    fn uint_word(value: u64) -> Bytes {
        Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec())
    }

    #[tokio::test]
    async fn test_resolve_and_cache() {
        let executor = StaticExecutor::new(vec![Ok(vec![
            string_word("Bond Token"),
            string_word("BOND"),
            uint_word(18),
        ])]);
        let directory = TokenDirectory::new(Arc::clone(&executor) as Arc<dyn CallExecutor>);
        let address = Address::from_slice(&[0x42; 20]);

        let metadata = directory.resolve(address).await;
        assert_eq!(metadata.name, "Bond Token");
        assert_eq!(metadata.symbol, "BOND");
        assert_eq!(metadata.decimals, 18);

        // Second lookup is served from the cache; the queue is empty but no
        // further batch is executed.
        let again = directory.resolve(address).await;
        assert_eq!(again.symbol, "BOND");
        assert_eq!(executor.executed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_failure_degrades() {
        let executor = StaticExecutor::new(vec![Err(ChainError::Batch("down".into()))]);
        let directory = TokenDirectory::new(executor);
        let address = Address::from_slice(&[0x42; 20]);

        let metadata = directory.resolve(address).await;
        assert_eq!(metadata.symbol, "???");
        assert_eq!(metadata.decimals, 18);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let executor = StaticExecutor::new(vec![
            Err(ChainError::Batch("down".into())),
            Ok(vec![string_word("Bond Token"), string_word("BOND"), uint_word(18)]),
        ]);
        let directory = TokenDirectory::new(executor);
        let address = Address::from_slice(&[0x42; 20]);

        assert_eq!(directory.resolve(address).await.symbol, "???");
        assert_eq!(directory.resolve(address).await.symbol, "BOND");
    }
}
