use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::bindings::{Binding, FieldSet};
use crate::chain::abi;
use crate::chain::batch::{CallExecutor, ContractClient};
use crate::chain::error::ChainError;
use crate::chain::wallet::{TxOutcome, WalletSession};
use crate::events::{AppEvent, Notifier};

pub const CONTRACT_NAME: &str = "rewards";

#[derive(Debug, Clone, Default)]
pub struct RewardsCommon {
    /// Rewards distributed to all participants since launch.
    pub total_distributed: Option<U256>,
}

#[derive(Debug, Clone, Default)]
pub struct RewardsUser {
    pub claimable: Option<U256>,
    pub claimed: Option<U256>,
}

/// Binding for the rewards pool contract.
pub struct RewardsBinding {
    contract: ContractClient,
    session: WalletSession,
    notifier: Notifier,
    state: RwLock<FieldSet<RewardsCommon, RewardsUser>>,
}

impl RewardsBinding {
    pub fn new(
        address: Address,
        executor: Arc<dyn CallExecutor>,
        session: WalletSession,
        notifier: Notifier,
    ) -> Self {
        Self {
            contract: ContractClient::new(CONTRACT_NAME, address, abi::rewards_abi(), executor),
            session,
            notifier,
            state: RwLock::new(FieldSet::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub async fn common(&self) -> RewardsCommon {
        self.state.read().await.common.clone()
    }

    pub async fn user(&self) -> RewardsUser {
        self.state.read().await.user.clone()
    }

    /// Claim all accrued rewards, then refresh account data.
    pub async fn claim(&self) -> Result<TxOutcome, ChainError> {
        let data = self.contract.encode("claim", &[])?;

        self.notifier.send(AppEvent::TxSubmitted {
            contract: CONTRACT_NAME,
            operation: "claim",
        });
        let outcome = self
            .session
            .send(self.contract.address(), data, U256::ZERO)
            .await?;
        self.notifier.send(AppEvent::TxConfirmed {
            contract: CONTRACT_NAME,
            operation: "claim",
            tx_hash: outcome.tx_hash,
            gas_used: outcome.gas_used,
        });

        if let Err(e) = self.load_user().await {
            warn!(contract = CONTRACT_NAME, error = %e, "post-transaction refresh failed");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Binding for RewardsBinding {
    fn contract_name(&self) -> &'static str {
        CONTRACT_NAME
    }

    async fn load_common(&self) -> Result<(), ChainError> {
        let values = self
            .contract
            .batch()
            .call("totalDistributed", &[])
            .execute()
            .await?;
        let total_distributed = values.uint(0)?;

        {
            let mut state = self.state.write().await;
            state.common.total_distributed = Some(total_distributed);
        }
        self.notifier.data_changed(CONTRACT_NAME);
        Ok(())
    }

    async fn load_user(&self) -> Result<(), ChainError> {
        let account = self.session.account().await.ok_or(ChainError::NoAccount)?;
        let started = self.state.read().await.generation();

        let values = self
            .contract
            .batch()
            .call("claimableAmount", &[DynSolValue::Address(account)])
            .call("userClaimed", &[DynSolValue::Address(account)])
            .execute()
            .await?;

        let user = RewardsUser {
            claimable: Some(values.uint(0)?),
            claimed: Some(values.uint(1)?),
        };

        {
            let mut state = self.state.write().await;
            if !state.is_current(started) {
                return Ok(());
            }
            state.user = user;
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
