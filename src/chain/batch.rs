use std::sync::Arc;

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use futures::future::try_join_all;

use crate::chain::abi;
use crate::chain::error::ChainError;
use crate::chain::provider::EthProvider;

/// A single encoded read call, ready for transport.
#[derive(Debug, Clone)]
pub struct EncodedCall {
    pub to: Address,
    pub data: Bytes,
}

/// Executes a group of independent read calls as one unit.
///
/// Implementations must be all-or-nothing: if any call fails, the whole
/// batch fails and no partial results are returned.
#[async_trait]
pub trait CallExecutor: Send + Sync {
    async fn execute(&self, calls: Vec<EncodedCall>) -> Result<Vec<Bytes>, ChainError>;
}

/// Production executor backed by `eth_call` over the shared provider.
/// Calls in a batch are issued together and joined; the first failure
/// aborts the batch.
pub struct RpcExecutor {
    provider: Arc<EthProvider>,
}

impl RpcExecutor {
    pub fn new(provider: Arc<EthProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CallExecutor for RpcExecutor {
    async fn execute(&self, calls: Vec<EncodedCall>) -> Result<Vec<Bytes>, ChainError> {
        let futures = calls.into_iter().map(|call| {
            let provider = Arc::clone(&self.provider);
            async move {
                provider
                    .call(call.to, call.data)
                    .await
                    .map_err(|e| ChainError::Batch(e.to_string()))
            }
        });
        try_join_all(futures).await
    }
}

/// One remote contract: display name, address, function table, and the
/// executor used for its reads. Cloning is cheap; the function table is a
/// `'static` built-in and the executor is shared.
#[derive(Clone)]
pub struct ContractClient {
    name: &'static str,
    address: Address,
    abi: &'static JsonAbi,
    executor: Arc<dyn CallExecutor>,
}

impl ContractClient {
    pub fn new(
        name: &'static str,
        address: Address,
        abi: &'static JsonAbi,
        executor: Arc<dyn CallExecutor>,
    ) -> Self {
        Self {
            name,
            address,
            abi,
            executor,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn function(&self, method: &str) -> Result<&'static Function, ChainError> {
        abi::find_function(self.abi, method)
            .ok_or_else(|| ChainError::UnknownFunction(self.name, method.to_string()))
    }

    /// Encode a call to `method` with the given arguments, selector included.
    pub fn encode(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes, ChainError> {
        let func = self.function(method)?;
        let data = func
            .abi_encode_input(args)
            .map_err(|e| ChainError::Abi(format!("{}.{method}: {e}", self.name)))?;
        Ok(Bytes::from(data))
    }

    /// Start a new read batch against this contract.
    pub fn batch(&self) -> BatchBuilder<'_> {
        BatchBuilder {
            client: self,
            calls: Vec::new(),
            error: None,
        }
    }
}

/// Collects independent read calls and executes them as one batch.
/// Encoding problems are deferred to `execute` so call sites can chain.
pub struct BatchBuilder<'a> {
    client: &'a ContractClient,
    calls: Vec<(&'static Function, Bytes)>,
    error: Option<ChainError>,
}

impl BatchBuilder<'_> {
    pub fn call(mut self, method: &str, args: &[DynSolValue]) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.client.function(method) {
            Ok(func) => match func.abi_encode_input(args) {
                Ok(data) => self.calls.push((func, Bytes::from(data))),
                Err(e) => {
                    self.error = Some(ChainError::Abi(format!(
                        "{}.{method}: {e}",
                        self.client.name
                    )));
                }
            },
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Execute the batch. Either every call succeeds and decodes, or the
    /// whole batch fails and the caller applies nothing.
    pub async fn execute(self) -> Result<BatchValues, ChainError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let encoded = self
            .calls
            .iter()
            .map(|(_, data)| EncodedCall {
                to: self.client.address,
                data: data.clone(),
            })
            .collect();
        let raw = self.client.executor.execute(encoded).await?;

        if raw.len() != self.calls.len() {
            return Err(ChainError::Batch(format!(
                "{}: expected {} results, got {}",
                self.client.name,
                self.calls.len(),
                raw.len()
            )));
        }

        let mut values = Vec::with_capacity(raw.len());
        for ((func, _), bytes) in self.calls.iter().zip(raw) {
            let decoded = func.abi_decode_output(&bytes, false).map_err(|e| {
                ChainError::Batch(format!("decoding `{}` output: {e}", func.name))
            })?;
            values.push(decoded);
        }
        Ok(BatchValues { values })
    }
}

/// Decoded results of a batch, indexed by call position.
pub struct BatchValues {
    values: Vec<Vec<DynSolValue>>,
}

impl BatchValues {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn single(&self, index: usize) -> Result<&DynSolValue, ChainError> {
        self.values
            .get(index)
            .and_then(|outputs| outputs.first())
            .ok_or_else(|| ChainError::Batch(format!("missing batch result at index {index}")))
    }

    pub fn uint(&self, index: usize) -> Result<U256, ChainError> {
        match self.single(index)? {
            DynSolValue::Uint(value, _) => Ok(*value),
            other => Err(type_mismatch(index, "uint", other)),
        }
    }

    pub fn u64(&self, index: usize) -> Result<u64, ChainError> {
        let value = self.uint(index)?;
        u64::try_from(value)
            .map_err(|_| ChainError::Batch(format!("value at index {index} exceeds u64")))
    }

    pub fn u8(&self, index: usize) -> Result<u8, ChainError> {
        let value = self.uint(index)?;
        u8::try_from(value)
            .map_err(|_| ChainError::Batch(format!("value at index {index} exceeds u8")))
    }

    pub fn address(&self, index: usize) -> Result<Address, ChainError> {
        match self.single(index)? {
            DynSolValue::Address(value) => Ok(*value),
            other => Err(type_mismatch(index, "address", other)),
        }
    }

    pub fn bool(&self, index: usize) -> Result<bool, ChainError> {
        match self.single(index)? {
            DynSolValue::Bool(value) => Ok(*value),
            other => Err(type_mismatch(index, "bool", other)),
        }
    }

    pub fn string(&self, index: usize) -> Result<String, ChainError> {
        match self.single(index)? {
            DynSolValue::String(value) => Ok(value.clone()),
            other => Err(type_mismatch(index, "string", other)),
        }
    }
}

fn type_mismatch(index: usize, expected: &str, got: &DynSolValue) -> ChainError {
    ChainError::Batch(format!(
        "batch result {index}: expected {expected}, got {got:?}"
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::chain::abi;

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

        fn executed(&self) -> usize {
            self.executed.load(Ordering::SeqCst)
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

    fn uint_word(value: u64) -> Bytes {
        Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec())
    }

    fn client(executor: Arc<dyn CallExecutor>) -> ContractClient {
        ContractClient::new("token", Address::from_slice(&[0x11; 20]), abi::token_abi(), executor)
    }

    #[test]
    fn test_encode_includes_selector() {
        let executor = StaticExecutor::new(vec![]);
        let client = client(executor);
        let owner = Address::from_slice(&[0x22; 20]);
        let data = client
            .encode("balanceOf", &[DynSolValue::Address(owner)])
            .unwrap();
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(data.len(), 4 + 32);
    }

    #[test]
    fn test_encode_unknown_function() {
        let executor = StaticExecutor::new(vec![]);
        let client = client(executor);
        let err = client.encode("mint", &[]).unwrap_err();
        assert!(matches!(err, ChainError::UnknownFunction("token", _)));
    }

    #[tokio::test]
    async fn test_batch_decodes_in_order() {
        let executor = StaticExecutor::new(vec![Ok(vec![uint_word(7), uint_word(42)])]);
        let client = client(Arc::clone(&executor) as Arc<dyn CallExecutor>);
        let owner = Address::from_slice(&[0x22; 20]);

        let values = client
            .batch()
            .call("totalSupply", &[])
            .call("balanceOf", &[DynSolValue::Address(owner)])
            .execute()
            .await
            .unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values.uint(0).unwrap(), U256::from(7));
        assert_eq!(values.u64(1).unwrap(), 42);
        assert_eq!(executor.executed(), 1);
    }

    #[tokio::test]
    async fn test_batch_transport_failure_propagates() {
        let executor = StaticExecutor::new(vec![Err(ChainError::Batch("boom".into()))]);
        let client = client(executor);

        let result = client.batch().call("totalSupply", &[]).execute().await;
        assert!(matches!(result, Err(ChainError::Batch(_))));
    }

    #[tokio::test]
    async fn test_batch_unknown_function_skips_transport() {
        let executor = StaticExecutor::new(vec![Ok(vec![uint_word(1)])]);
        let client = client(Arc::clone(&executor) as Arc<dyn CallExecutor>);

        let result = client
            .batch()
            .call("totalSupply", &[])
            .call("mint", &[])
            .execute()
            .await;

        assert!(matches!(result, Err(ChainError::UnknownFunction(_, _))));
        // The deferred error short-circuits before any network activity.
        assert_eq!(executor.executed(), 0);
    }

    #[tokio::test]
    async fn test_batch_result_count_mismatch() {
        let executor = StaticExecutor::new(vec![Ok(vec![uint_word(1)])]);
        let client = client(executor);

        let result = client
            .batch()
            .call("totalSupply", &[])
            .call("decimals", &[])
            .execute()
            .await;
        assert!(matches!(result, Err(ChainError::Batch(_))));
    }

    #[tokio::test]
    async fn test_values_type_mismatch() {
        let executor = StaticExecutor::new(vec![Ok(vec![uint_word(9)])]);
        let client = client(executor);

        let values = client.batch().call("totalSupply", &[]).execute().await.unwrap();
        assert!(values.address(0).is_err());
        assert!(values.bool(0).is_err());
        assert!(values.uint(1).is_err());
    }

    #[tokio::test]
    async fn test_u8_range_check() {
        let executor = StaticExecutor::new(vec![Ok(vec![uint_word(300)])]);
        let client = client(executor);

        let values = client.batch().call("totalSupply", &[]).execute().await.unwrap();
        assert!(values.u8(0).is_err());
        assert_eq!(values.u64(0).unwrap(), 300);
    }
}
