use std::collections::HashMap;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use crate::bindings::{Binding, FieldSet};
use crate::chain::abi;
use crate::chain::batch::{BatchValues, CallExecutor, ContractClient};
use crate::chain::error::ChainError;
use crate::chain::wallet::{TxOutcome, WalletSession};
use crate::events::{AppEvent, Notifier};

pub const CONTRACT_NAME: &str = "staking";

/// Pool-wide figures for one staked token.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolCommon {
    pub current_epoch_pool_size: Option<U256>,
    pub next_epoch_pool_size: Option<U256>,
}

/// Account-scoped figures for one staked token.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolUser {
    pub balance: Option<U256>,
    pub current_epoch_balance: Option<U256>,
    pub next_epoch_balance: Option<U256>,
}

#[derive(Debug, Clone, Default)]
pub struct StakingCommon {
    pub current_epoch: Option<u64>,
    /// Unix timestamp of the start of epoch 1.
    pub epoch_start: Option<u64>,
    /// Epoch length in seconds.
    pub epoch_duration: Option<u64>,
    pub pools: HashMap<Address, PoolCommon>,
}

#[derive(Debug, Clone, Default)]
pub struct StakingUser {
    pub pools: HashMap<Address, PoolUser>,
}

/// Start, end, and progress of the currently running epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Elapsed share of the epoch, 0..100.
    pub progress: f64,
}

/// Binding for the epoch staking pool contract.
pub struct StakingBinding {
    contract: ContractClient,
    session: WalletSession,
    notifier: Notifier,
    staked_tokens: Vec<Address>,
    state: RwLock<FieldSet<StakingCommon, StakingUser>>,
}

impl StakingBinding {
    pub fn new(
        address: Address,
        staked_tokens: Vec<Address>,
        executor: Arc<dyn CallExecutor>,
        session: WalletSession,
        notifier: Notifier,
    ) -> Self {
        Self {
            contract: ContractClient::new(CONTRACT_NAME, address, abi::staking_abi(), executor),
            session,
            notifier,
            staked_tokens,
            state: RwLock::new(FieldSet::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn staked_tokens(&self) -> &[Address] {
        &self.staked_tokens
    }

    pub async fn common(&self) -> StakingCommon {
        self.state.read().await.common.clone()
    }

    pub async fn user(&self) -> StakingUser {
        self.state.read().await.user.clone()
    }

    /// The window of the running epoch, if epoch metadata is loaded.
    pub async fn epoch_window(&self) -> Option<EpochWindow> {
        let common = self.common().await;
        window_for(
            common.epoch_start?,
            common.epoch_duration?,
            common.current_epoch?,
            Utc::now().timestamp(),
        )
    }

    /// Stake `amount` of `token` into the pool, then refresh account data.
    pub async fn stake(&self, token: Address, amount: U256) -> Result<TxOutcome, ChainError> {
        let data = self.contract.encode(
            "deposit",
            &[DynSolValue::Address(token), DynSolValue::Uint(amount, 256)],
        )?;
        self.submit("deposit", data).await
    }

    /// Withdraw `amount` of `token` from the pool, then refresh account data.
    pub async fn unstake(&self, token: Address, amount: U256) -> Result<TxOutcome, ChainError> {
        let data = self.contract.encode(
            "withdraw",
            &[DynSolValue::Address(token), DynSolValue::Uint(amount, 256)],
        )?;
        self.submit("withdraw", data).await
    }

    async fn submit(&self, operation: &'static str, data: Bytes) -> Result<TxOutcome, ChainError> {
        self.notifier.send(AppEvent::TxSubmitted {
            contract: CONTRACT_NAME,
            operation,
        });
        let outcome = self
            .session
            .send(self.contract.address(), data, U256::ZERO)
            .await?;
        self.notifier.send(AppEvent::TxConfirmed {
            contract: CONTRACT_NAME,
            operation,
            tx_hash: outcome.tx_hash,
            gas_used: outcome.gas_used,
        });

        if let Err(e) = self.load_user().await {
            warn!(contract = CONTRACT_NAME, error = %e, "post-transaction refresh failed");
        }
        Ok(outcome)
    }

    fn epoch_arg(epoch: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(epoch), 128)
    }
}

#[async_trait]
impl Binding for StakingBinding {
    fn contract_name(&self) -> &'static str {
        CONTRACT_NAME
    }

    async fn load_common(&self) -> Result<(), ChainError> {
        // First batch: epoch metadata.
        let meta = self
            .contract
            .batch()
            .call("getCurrentEpoch", &[])
            .call("epoch1Start", &[])
            .call("epochDuration", &[])
            .execute()
            .await?;
        let current_epoch = meta.u64(0)?;
        let epoch_start = meta.u64(1)?;
        let epoch_duration = meta.u64(2)?;

        {
            let mut state = self.state.write().await;
            state.common.current_epoch = Some(current_epoch);
            state.common.epoch_start = Some(epoch_start);
            state.common.epoch_duration = Some(epoch_duration);
        }
        self.notifier.data_changed(CONTRACT_NAME);

        // Second batch: pool sizes for the running and the next epoch,
        // two calls per staked token.
        let mut batch = self.contract.batch();
        for token in &self.staked_tokens {
            batch = batch
                .call(
                    "getEpochPoolSize",
                    &[DynSolValue::Address(*token), Self::epoch_arg(current_epoch)],
                )
                .call(
                    "getEpochPoolSize",
                    &[
                        DynSolValue::Address(*token),
                        Self::epoch_arg(current_epoch + 1),
                    ],
                );
        }
        let sizes = batch.execute().await?;
        let pools = self.decode_pool_sizes(&sizes)?;

        {
            let mut state = self.state.write().await;
            state.common.pools = pools;
        }
        self.notifier.data_changed(CONTRACT_NAME);
        Ok(())
    }

    async fn load_user(&self) -> Result<(), ChainError> {
        let account = self.session.account().await.ok_or(ChainError::NoAccount)?;
        let started = self.state.read().await.generation();

        // The epoch may have rolled over since the last common load, so
        // re-read it in the same round trip as the balances.
        let meta = self
            .contract
            .batch()
            .call("getCurrentEpoch", &[])
            .execute()
            .await?;
        let current_epoch = meta.u64(0)?;

        let mut batch = self.contract.batch();
        for token in &self.staked_tokens {
            batch = batch
                .call(
                    "balanceOf",
                    &[DynSolValue::Address(account), DynSolValue::Address(*token)],
                )
                .call(
                    "getEpochUserBalance",
                    &[
                        DynSolValue::Address(account),
                        DynSolValue::Address(*token),
                        Self::epoch_arg(current_epoch),
                    ],
                )
                .call(
                    "getEpochUserBalance",
                    &[
                        DynSolValue::Address(account),
                        DynSolValue::Address(*token),
                        Self::epoch_arg(current_epoch + 1),
                    ],
                );
        }
        let values = batch.execute().await?;

        let mut pools = HashMap::new();
        for (i, token) in self.staked_tokens.iter().enumerate() {
            pools.insert(
                *token,
                PoolUser {
                    balance: Some(values.uint(3 * i)?),
                    current_epoch_balance: Some(values.uint(3 * i + 1)?),
                    next_epoch_balance: Some(values.uint(3 * i + 2)?),
                },
            );
        }

        {
            let mut state = self.state.write().await;
            state.common.current_epoch = Some(current_epoch);
            if !state.is_current(started) {
                // The account changed while the batch was in flight.
                return Ok(());
            }
            state.user.pools = pools;
        }
        self.notifier.data_changed(CONTRACT_NAME);
        Ok(())
    }

    async fn account_changed(&self) {
        {
            let mut state = self.state.write().await;
            state.invalidate_user();
        }
        self.notifier.data_changed(CONTRACT_NAME);
    }
}

impl StakingBinding {
    fn decode_pool_sizes(
        &self,
        values: &BatchValues,
    ) -> Result<HashMap<Address, PoolCommon>, ChainError> {
        let mut pools = HashMap::new();
        for (i, token) in self.staked_tokens.iter().enumerate() {
            pools.insert(
                *token,
                PoolCommon {
                    current_epoch_pool_size: Some(values.uint(2 * i)?),
                    next_epoch_pool_size: Some(values.uint(2 * i + 1)?),
                },
            );
        }
        Ok(pools)
    }
}

/// Compute the window of the running epoch. Returns None for epoch 0
/// (staking has not started yet).
fn window_for(epoch_start: u64, duration: u64, epoch: u64, now: i64) -> Option<EpochWindow> {
    if epoch == 0 || duration == 0 {
        return None;
    }
    let start_ts = epoch_start + (epoch - 1) * duration;
    let end_ts = start_ts + duration;
    let progress = ((now - start_ts as i64) as f64 / duration as f64 * 100.0).clamp(0.0, 100.0);

    Some(EpochWindow {
        start: DateTime::from_timestamp(start_ts as i64, 0)?,
        end: DateTime::from_timestamp(end_ts as i64, 0)?,
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::testing::{QueueExecutor, RecordingDispatcher, uint_word};
    use crate::events::Notifier;

    fn token_x() -> Address {
        Address::from_slice(&[0x10; 20])
    }

    fn token_y() -> Address {
        Address::from_slice(&[0x20; 20])
    }

    fn account() -> Address {
        Address::from_slice(&[0xaa; 20])
    }

    fn binding(
        executor: Arc<dyn CallExecutor>,
        session: WalletSession,
        tokens: Vec<Address>,
    ) -> StakingBinding {
        let (notifier, _rx) = Notifier::channel();
        StakingBinding::new(
            Address::from_slice(&[0x05; 20]),
            tokens,
            executor,
            session,
            notifier,
        )
    }

    #[tokio::test]
    async fn test_load_common_two_batches() {
        let executor = QueueExecutor::new(vec![
            // epoch meta: current epoch 4, start 1_600_000_000, duration 1 week
            Ok(vec![uint_word(4), uint_word(1_600_000_000), uint_word(604_800)]),
            // pool sizes for two tokens, current and next epoch each
            Ok(vec![
                uint_word(1_000),
                uint_word(1_100),
                uint_word(2_000),
                uint_word(2_200),
            ]),
        ]);
        let binding = binding(
            Arc::clone(&executor) as Arc<dyn CallExecutor>,
            WalletSession::new(),
            vec![token_x(), token_y()],
        );

        binding.load_common().await.unwrap();
        assert_eq!(executor.executed(), 2);

        let common = binding.common().await;
        assert_eq!(common.current_epoch, Some(4));
        assert_eq!(common.epoch_duration, Some(604_800));

        let x = common.pools[&token_x()];
        assert_eq!(x.current_epoch_pool_size, Some(U256::from(1_000)));
        assert_eq!(x.next_epoch_pool_size, Some(U256::from(1_100)));
        let y = common.pools[&token_y()];
        assert_eq!(y.current_epoch_pool_size, Some(U256::from(2_000)));
        assert_eq!(y.next_epoch_pool_size, Some(U256::from(2_200)));
    }

    #[tokio::test]
    async fn test_load_common_second_batch_failure_keeps_pools() {
        let executor = QueueExecutor::new(vec![
            Ok(vec![uint_word(4), uint_word(1_600_000_000), uint_word(604_800)]),
            Ok(vec![uint_word(1_000), uint_word(1_100)]),
            Ok(vec![uint_word(5), uint_word(1_600_000_000), uint_word(604_800)]),
            Err(ChainError::Batch("node unavailable".into())),
        ]);
        let binding = binding(
            Arc::clone(&executor) as Arc<dyn CallExecutor>,
            WalletSession::new(),
            vec![token_x()],
        );

        binding.load_common().await.unwrap();
        let result = binding.load_common().await;
        assert!(matches!(result, Err(ChainError::Batch(_))));

        let common = binding.common().await;
        // The first batch of the failed reload applied (epoch advanced), the
        // second did not: pool sizes are the previous batch's values.
        assert_eq!(common.current_epoch, Some(5));
        assert_eq!(
            common.pools[&token_x()].current_epoch_pool_size,
            Some(U256::from(1_000))
        );
    }

    #[tokio::test]
    async fn test_load_user_populates_pools() {
        let session = WalletSession::new();
        session.watch(account()).await;
        let executor = QueueExecutor::new(vec![
            Ok(vec![uint_word(4)]),
            Ok(vec![uint_word(500), uint_word(450), uint_word(500)]),
        ]);
        let binding = binding(executor, session, vec![token_x()]);

        binding.load_user().await.unwrap();

        let user = binding.user().await;
        let pool = user.pools[&token_x()];
        assert_eq!(pool.balance, Some(U256::from(500)));
        assert_eq!(pool.current_epoch_balance, Some(U256::from(450)));
        assert_eq!(pool.next_epoch_balance, Some(U256::from(500)));

        // The user load also refreshed the epoch counter.
        assert_eq!(binding.common().await.current_epoch, Some(4));
    }

    #[tokio::test]
    async fn test_load_user_without_account() {
        let executor = QueueExecutor::new(vec![]);
        let binding = binding(
            Arc::clone(&executor) as Arc<dyn CallExecutor>,
            WalletSession::new(),
            vec![token_x()],
        );

        assert!(matches!(binding.load_user().await, Err(ChainError::NoAccount)));
        assert_eq!(executor.executed(), 0);
    }

    #[tokio::test]
    async fn test_account_change_clears_pool_balances() {
        let session = WalletSession::new();
        session.watch(account()).await;
        let executor = QueueExecutor::new(vec![
            Ok(vec![uint_word(4)]),
            Ok(vec![uint_word(500), uint_word(450), uint_word(500)]),
        ]);
        let binding = binding(executor, session, vec![token_x()]);

        binding.load_user().await.unwrap();
        assert!(!binding.user().await.pools.is_empty());

        binding.account_changed().await;
        assert!(binding.user().await.pools.is_empty());
    }

    #[tokio::test]
    async fn test_stake_triggers_refresh() {
        let session = WalletSession::new();
        let dispatcher = RecordingDispatcher::ok();
        session
            .attach(account(), dispatcher.clone() as Arc<dyn crate::chain::wallet::TxDispatcher>)
            .await;

        let executor = QueueExecutor::new(vec![
            Ok(vec![uint_word(4)]),
            Ok(vec![uint_word(750), uint_word(450), uint_word(750)]),
        ]);
        let binding = binding(
            Arc::clone(&executor) as Arc<dyn CallExecutor>,
            session,
            vec![token_x()],
        );

        binding.stake(token_x(), U256::from(250)).await.unwrap();
        assert_eq!(dispatcher.count(), 1);
        assert_eq!(executor.executed(), 2);
        assert_eq!(
            binding.user().await.pools[&token_x()].balance,
            Some(U256::from(750))
        );
    }

    #[tokio::test]
    async fn test_unstake_without_account() {
        let executor = QueueExecutor::new(vec![]);
        let binding = binding(
            Arc::clone(&executor) as Arc<dyn CallExecutor>,
            WalletSession::new(),
            vec![token_x()],
        );

        let result = binding.unstake(token_x(), U256::from(1)).await;
        assert!(matches!(result, Err(ChainError::NoAccount)));
        assert_eq!(executor.executed(), 0);
    }

    #[test]
    fn test_window_midway_through_epoch() {
        // Epoch 3 of one-week epochs starting at t=1_000_000.
        let start = 1_000_000u64;
        let duration = 604_800u64;
        let epoch = 3u64;
        let epoch_start = start + 2 * duration;
        let now = (epoch_start + duration / 4) as i64;

        let window = window_for(start, duration, epoch, now).unwrap();
        assert_eq!(window.start.timestamp() as u64, epoch_start);
        assert_eq!(window.end.timestamp() as u64, epoch_start + duration);
        assert!((window.progress - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_window_clamps_progress() {
        let window = window_for(1_000_000, 3_600, 1, 900_000).unwrap();
        assert_eq!(window.progress, 0.0);

        let window = window_for(1_000_000, 3_600, 1, 10_000_000).unwrap();
        assert_eq!(window.progress, 100.0);
    }

    #[test]
    fn test_window_before_first_epoch() {
        assert!(window_for(1_000_000, 3_600, 0, 999_999).is_none());
        assert!(window_for(1_000_000, 0, 3, 999_999).is_none());
    }
}
