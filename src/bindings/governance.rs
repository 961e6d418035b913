use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::bindings::{Binding, FieldSet};
use crate::chain::abi;
use crate::chain::batch::{CallExecutor, ContractClient};
use crate::chain::error::ChainError;
use crate::chain::wallet::{TxOutcome, WalletSession};
use crate::events::{AppEvent, Notifier};

pub const CONTRACT_NAME: &str = "governance";

#[derive(Debug, Clone, Default)]
pub struct GovernanceCommon {
    /// Project tokens staked across all governance participants.
    pub total_staked: Option<U256>,
}

#[derive(Debug, Clone, Default)]
pub struct GovernanceUser {
    pub staked_balance: Option<U256>,
    pub voting_power: Option<U256>,
    /// Unix timestamp until which the stake is locked; 0 means unlocked.
    pub locked_until: Option<u64>,
    /// Delegate address, None when voting power is kept.
    pub delegated_to: Option<Address>,
}

/// Binding for the governance staking contract.
pub struct GovernanceBinding {
    contract: ContractClient,
    session: WalletSession,
    notifier: Notifier,
    state: RwLock<FieldSet<GovernanceCommon, GovernanceUser>>,
}

impl GovernanceBinding {
    pub fn new(
        address: Address,
        executor: Arc<dyn CallExecutor>,
        session: WalletSession,
        notifier: Notifier,
    ) -> Self {
        Self {
            contract: ContractClient::new(CONTRACT_NAME, address, abi::governance_abi(), executor),
            session,
            notifier,
            state: RwLock::new(FieldSet::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub async fn common(&self) -> GovernanceCommon {
        self.state.read().await.common.clone()
    }

    pub async fn user(&self) -> GovernanceUser {
        self.state.read().await.user.clone()
    }

    /// Deposit project tokens into governance staking.
    pub async fn deposit(&self, amount: U256) -> Result<TxOutcome, ChainError> {
        let data = self
            .contract
            .encode("deposit", &[DynSolValue::Uint(amount, 256)])?;
        self.submit("deposit", data).await
    }

    /// Withdraw project tokens from governance staking.
    pub async fn withdraw(&self, amount: U256) -> Result<TxOutcome, ChainError> {
        let data = self
            .contract
            .encode("withdraw", &[DynSolValue::Uint(amount, 256)])?;
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
}

#[async_trait]
impl Binding for GovernanceBinding {
    fn contract_name(&self) -> &'static str {
        CONTRACT_NAME
    }

    async fn load_common(&self) -> Result<(), ChainError> {
        let values = self
            .contract
            .batch()
            .call("bondStaked", &[])
            .execute()
            .await?;
        let total_staked = values.uint(0)?;

        {
            let mut state = self.state.write().await;
            state.common.total_staked = Some(total_staked);
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
            .call("balanceOf", &[DynSolValue::Address(account)])
            .call("votingPower", &[DynSolValue::Address(account)])
            .call("userLockedUntil", &[DynSolValue::Address(account)])
            .call("userDelegatedTo", &[DynSolValue::Address(account)])
            .execute()
            .await?;

        let delegate = values.address(3)?;
        let user = GovernanceUser {
            staked_balance: Some(values.uint(0)?),
            voting_power: Some(values.uint(1)?),
            locked_until: Some(values.u64(2)?),
            delegated_to: (delegate != Address::ZERO).then_some(delegate),
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
