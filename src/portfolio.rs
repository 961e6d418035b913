use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::Address;
use tracing::{debug, warn};

use crate::bindings::Binding;
use crate::bindings::governance::{GovernanceBinding, GovernanceCommon, GovernanceUser};
use crate::bindings::rewards::{RewardsBinding, RewardsCommon, RewardsUser};
use crate::bindings::staking::{EpochWindow, StakingBinding, StakingCommon, StakingUser};
use crate::bindings::token::{TokenBinding, TokenCommon, TokenUser};
use crate::chain::batch::CallExecutor;
use crate::chain::deployments::Deployment;
use crate::chain::error::ChainError;
use crate::chain::wallet::WalletSession;
use crate::events::{AppEvent, Notifier};

/// Coherent read-only copy of every binding's cached fields.
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub account: Option<Address>,
    pub reloads: u64,
    pub token_common: TokenCommon,
    pub token_user: TokenUser,
    pub staking_common: StakingCommon,
    pub staking_user: StakingUser,
    pub epoch_window: Option<EpochWindow>,
    pub governance_common: GovernanceCommon,
    pub governance_user: GovernanceUser,
    pub rewards_common: RewardsCommon,
    pub rewards_user: RewardsUser,
}

/// Owns the contract bindings for one deployment and drives them together.
///
/// This is the explicit context object presentation code holds on to: no
/// binding is reachable through globals, and the wallet session is shared
/// with the bindings by handle.
pub struct Portfolio {
    token: Arc<TokenBinding>,
    staking: Arc<StakingBinding>,
    governance: Arc<GovernanceBinding>,
    rewards: Arc<RewardsBinding>,
    bindings: Vec<Arc<dyn Binding>>,
    session: WalletSession,
    notifier: Notifier,
    reload_seq: AtomicU64,
}

impl Portfolio {
    pub fn new(
        deployment: &Deployment,
        executor: Arc<dyn CallExecutor>,
        session: WalletSession,
        notifier: Notifier,
    ) -> Self {
        let token = Arc::new(TokenBinding::new(
            deployment.token,
            deployment.staking,
            deployment.governance,
            Arc::clone(&executor),
            session.clone(),
            notifier.clone(),
        ));
        let staking = Arc::new(StakingBinding::new(
            deployment.staking,
            deployment.staked_tokens.clone(),
            Arc::clone(&executor),
            session.clone(),
            notifier.clone(),
        ));
        let governance = Arc::new(GovernanceBinding::new(
            deployment.governance,
            Arc::clone(&executor),
            session.clone(),
            notifier.clone(),
        ));
        let rewards = Arc::new(RewardsBinding::new(
            deployment.rewards,
            Arc::clone(&executor),
            session.clone(),
            notifier.clone(),
        ));

        let bindings: Vec<Arc<dyn Binding>> = vec![
            Arc::clone(&token) as Arc<dyn Binding>,
            Arc::clone(&staking) as Arc<dyn Binding>,
            Arc::clone(&governance) as Arc<dyn Binding>,
            Arc::clone(&rewards) as Arc<dyn Binding>,
        ];

        Self {
            token,
            staking,
            governance,
            rewards,
            bindings,
            session,
            notifier,
            reload_seq: AtomicU64::new(0),
        }
    }

    pub fn token(&self) -> &TokenBinding {
        &self.token
    }

    pub fn staking(&self) -> &StakingBinding {
        &self.staking
    }

    pub fn governance(&self) -> &GovernanceBinding {
        &self.governance
    }

    pub fn rewards(&self) -> &RewardsBinding {
        &self.rewards
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    /// How many reload signals have fired so far.
    pub fn reload_count(&self) -> u64 {
        self.reload_seq.load(Ordering::Relaxed)
    }

    /// Load everything appropriate to the current session state, in order,
    /// surfacing the first failure. One-shot commands use this.
    pub async fn load_all(&self) -> Result<(), ChainError> {
        for binding in &self.bindings {
            binding.load_common().await?;
        }
        if self.session.account().await.is_some() {
            for binding in &self.bindings {
                binding.load_user().await?;
            }
        }
        Ok(())
    }

    /// Fire the reload signal: bump the counter and refresh every binding in
    /// the background. Failures are logged and swallowed; subscribers simply
    /// keep seeing last-known values.
    pub fn reload(&self) {
        let seq = self.reload_seq.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(seq, "reload signal fired");

        for binding in &self.bindings {
            let binding = Arc::clone(binding);
            let session = self.session.clone();
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                if let Err(e) = binding.load_common().await {
                    warn!(contract = binding.contract_name(), error = %e, "common data refresh failed");
                    notifier.error(format!("{} refresh failed: {e}", binding.contract_name()));
                }
                if session.account().await.is_some() {
                    if let Err(e) = binding.load_user().await {
                        warn!(contract = binding.contract_name(), error = %e, "account data refresh failed");
                        notifier.error(format!("{} refresh failed: {e}", binding.contract_name()));
                    }
                }
            });
        }
    }

    /// Propagate a wallet account change: every binding drops its
    /// account-scoped fields before subscribers hear about the new account,
    /// and fresh user data is loaded in the background if an account is
    /// present.
    pub async fn account_changed(&self) {
        let account = self.session.account().await;
        for binding in &self.bindings {
            binding.account_changed().await;
        }
        self.notifier.send(AppEvent::AccountChanged(account));

        if account.is_some() {
            for binding in &self.bindings {
                let binding = Arc::clone(binding);
                let notifier = self.notifier.clone();
                tokio::spawn(async move {
                    if let Err(e) = binding.load_user().await {
                        warn!(contract = binding.contract_name(), error = %e, "account data refresh failed");
                        notifier.error(format!("{} refresh failed: {e}", binding.contract_name()));
                    }
                });
            }
        }
    }

    pub async fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            account: self.session.account().await,
            reloads: self.reload_count(),
            token_common: self.token.common().await,
            token_user: self.token.user().await,
            staking_common: self.staking.common().await,
            staking_user: self.staking.user().await,
            epoch_window: self.staking.epoch_window().await,
            governance_common: self.governance.common().await,
            governance_user: self.governance.user().await,
            rewards_common: self.rewards.common().await,
            rewards_user: self.rewards.user().await,
        }
    }
}
