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

pub const CONTRACT_NAME: &str = "token";

/// Account-independent token fields.
#[derive(Debug, Clone, Default)]
pub struct TokenCommon {
    pub total_supply: Option<U256>,
}

/// Account-scoped token fields.
#[derive(Debug, Clone, Default)]
pub struct TokenUser {
    pub balance: Option<U256>,
    /// Allowance granted to the epoch staking pool.
    pub staking_allowance: Option<U256>,
    /// Allowance granted to governance staking.
    pub governance_allowance: Option<U256>,
}

/// Binding for the protocol's ERC-20 project token.
pub struct TokenBinding {
    contract: ContractClient,
    session: WalletSession,
    notifier: Notifier,
    staking: Address,
    governance: Address,
    state: RwLock<FieldSet<TokenCommon, TokenUser>>,
}

impl TokenBinding {
    pub fn new(
        address: Address,
        staking: Address,
        governance: Address,
        executor: Arc<dyn CallExecutor>,
        session: WalletSession,
        notifier: Notifier,
    ) -> Self {
        Self {
            contract: ContractClient::new(CONTRACT_NAME, address, abi::token_abi(), executor),
            session,
            notifier,
            staking,
            governance,
            state: RwLock::new(FieldSet::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub async fn common(&self) -> TokenCommon {
        self.state.read().await.common.clone()
    }

    pub async fn user(&self) -> TokenUser {
        self.state.read().await.user.clone()
    }

    /// Approve `spender` to move `amount` of the token, then refresh the
    /// allowances once.
    pub async fn approve(&self, spender: Address, amount: U256) -> Result<TxOutcome, ChainError> {
        let data = self.contract.encode(
            "approve",
            &[DynSolValue::Address(spender), DynSolValue::Uint(amount, 256)],
        )?;
        self.submit("approve", data).await
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

        // One refresh of account-scoped fields; a failure here only means
        // the UI keeps last-known values until the next reload.
        if let Err(e) = self.load_user().await {
            warn!(contract = CONTRACT_NAME, error = %e, "post-transaction refresh failed");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Binding for TokenBinding {
    fn contract_name(&self) -> &'static str {
        CONTRACT_NAME
    }

    async fn load_common(&self) -> Result<(), ChainError> {
        let values = self
            .contract
            .batch()
            .call("totalSupply", &[])
            .execute()
            .await?;
        let total_supply = values.uint(0)?;

        {
            let mut state = self.state.write().await;
            state.common.total_supply = Some(total_supply);
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
            .call(
                "allowance",
                &[DynSolValue::Address(account), DynSolValue::Address(self.staking)],
            )
            .call(
                "allowance",
                &[
                    DynSolValue::Address(account),
                    DynSolValue::Address(self.governance),
                ],
            )
            .execute()
            .await?;

        let user = TokenUser {
            balance: Some(values.uint(0)?),
            staking_allowance: Some(values.uint(1)?),
            governance_allowance: Some(values.uint(2)?),
        };

        {
            let mut state = self.state.write().await;
            if !state.is_current(started) {
                // The account changed while this batch was in flight.
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
