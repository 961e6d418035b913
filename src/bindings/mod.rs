pub mod governance;
pub mod rewards;
pub mod staking;
pub mod token;

use async_trait::async_trait;

use crate::chain::error::ChainError;

/// Cached fields of one contract binding.
///
/// `common` holds account-independent values, `user` account-scoped ones.
/// Every field starts unloaded (`None`) and only ever holds the last value a
/// successful batch produced.
///
/// `generation` advances on every account change. A user batch records the
/// generation when it starts and must not apply its results if the
/// generation has moved on; common batches apply unconditionally, so
/// overlapping refreshes for the same account resolve to last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct FieldSet<C, U> {
    pub common: C,
    pub user: U,
    generation: u64,
}

impl<C: Default, U: Default> FieldSet<C, U> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop all account-scoped fields and start a new generation.
    pub fn invalidate_user(&mut self) {
        self.user = U::default();
        self.generation += 1;
    }

    /// True if a batch that started at `started` may still apply user fields.
    pub fn is_current(&self, started: u64) -> bool {
        self.generation == started
    }
}

/// Uniform surface the portfolio uses to drive every contract binding.
#[async_trait]
pub trait Binding: Send + Sync {
    fn contract_name(&self) -> &'static str;

    /// Refresh account-independent fields. One or more batches; each batch
    /// applies atomically or not at all.
    async fn load_common(&self) -> Result<(), ChainError>;

    /// Refresh account-scoped fields for the current wallet account.
    /// Fails with `NoAccount` (and issues no reads) when no account is
    /// connected.
    async fn load_user(&self) -> Result<(), ChainError>;

    /// React to a wallet account change: drop user fields immediately and
    /// notify subscribers, before any new data arrives.
    async fn account_changed(&self);
}


#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use alloy::primitives::{Address, B256, Bytes, U256};
    use alloy::rpc::types::TransactionRequest;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use crate::chain::batch::{CallExecutor, EncodedCall};
    use crate::chain::error::ChainError;
    use crate::chain::wallet::{TxDispatcher, TxOutcome};

    pub fn uint_word(value: u64) -> Bytes {
        Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec())
    }

    pub fn address_word(addr: Address) -> Bytes {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        Bytes::from(word.to_vec())
    }

    /// Returns canned batch responses in arrival order.
    pub struct QueueExecutor {
        responses: Mutex<VecDeque<Result<Vec<Bytes>, ChainError>>>,
        executed: AtomicUsize,
    }

    impl QueueExecutor {
        pub fn new(responses: Vec<Result<Vec<Bytes>, ChainError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                executed: AtomicUsize::new(0),
            })
        }

        /// Number of batches executed so far.
        pub fn executed(&self) -> usize {
            self.executed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CallExecutor for QueueExecutor {
        async fn execute(&self, _calls: Vec<EncodedCall>) -> Result<Vec<Bytes>, ChainError> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChainError::Batch("response queue exhausted".into())))
        }
    }

    /// Holds every batch in flight until the test resolves it explicitly,
    /// so tests can control completion order.
    pub struct ManualExecutor {
        pending: Mutex<Vec<Option<oneshot::Sender<Result<Vec<Bytes>, ChainError>>>>>,
    }

    impl ManualExecutor {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                pending: Mutex::new(Vec::new()),
            })
        }

        /// Wait (cooperatively) until `n` batches have been issued.
        pub async fn wait_for(&self, n: usize) {
            for _ in 0..10_000 {
                if self.pending.lock().unwrap().len() >= n {
                    return;
                }
                tokio::task::yield_now().await;
            }
            panic!("timed out waiting for {n} in-flight batches");
        }

        /// Complete the batch issued `index`-th with the given response.
        pub fn resolve(&self, index: usize, response: Result<Vec<Bytes>, ChainError>) {
            let sender = self.pending.lock().unwrap()[index]
                .take()
                .expect("batch already resolved");
            let _ = sender.send(response);
        }
    }

    #[async_trait]
    impl CallExecutor for ManualExecutor {
        async fn execute(&self, _calls: Vec<EncodedCall>) -> Result<Vec<Bytes>, ChainError> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().push(Some(tx));
            match rx.await {
                Ok(response) => response,
                Err(_) => Err(ChainError::Batch("executor dropped".into())),
            }
        }
    }

    /// Records dispatched transactions and returns a fixed outcome.
    pub struct RecordingDispatcher {
        pub sent: Mutex<Vec<TransactionRequest>>,
        fail: bool,
    }

    impl RecordingDispatcher {
        pub fn ok() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        pub fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TxDispatcher for RecordingDispatcher {
        async fn dispatch(&self, tx: TransactionRequest) -> Result<TxOutcome, ChainError> {
            self.sent.lock().unwrap().push(tx);
            if self.fail {
                Err(ChainError::Transaction("execution reverted".into()))
            } else {
                Ok(TxOutcome {
                    tx_hash: B256::ZERO,
                    gas_used: 64_000,
                })
            }
        }
    }
}
