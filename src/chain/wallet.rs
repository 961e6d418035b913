use std::path::PathBuf;
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::chain::error::ChainError;

/// One entry in the static connector catalogue.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub requires: &'static str,
}

/// The wallet connectors this client knows how to open.
pub const CONNECTORS: &[ConnectorInfo] = &[
    ConnectorInfo {
        id: "private-key",
        label: "Raw private key",
        requires: "--private-key or PRIVATE_KEY",
    },
    ConnectorInfo {
        id: "keystore",
        label: "Encrypted JSON keystore",
        requires: "--keystore and KEYSTORE_PASSWORD",
    },
    ConnectorInfo {
        id: "mnemonic",
        label: "BIP-39 mnemonic phrase",
        requires: "MNEMONIC (and optionally --mnemonic-index)",
    },
];

/// Credential material gathered from flags and environment for `connect`.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub private_key: Option<String>,
    pub keystore_path: Option<PathBuf>,
    pub keystore_password: Option<String>,
    pub mnemonic: Option<String>,
    pub mnemonic_index: u32,
}

/// Outcome of a mined, successful transaction.
#[derive(Debug, Clone, Copy)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub gas_used: u64,
}

/// Submits a signed transaction and waits for its receipt.
#[async_trait]
pub trait TxDispatcher: Send + Sync {
    async fn dispatch(&self, tx: TransactionRequest) -> Result<TxOutcome, ChainError>;
}

/// Production dispatcher: a wallet-filled provider over the same RPC endpoint.
struct RpcDispatcher {
    provider: Box<dyn Provider + Send + Sync>,
}

#[async_trait]
impl TxDispatcher for RpcDispatcher {
    async fn dispatch(&self, tx: TransactionRequest) -> Result<TxOutcome, ChainError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Transaction(e.to_string()))?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Transaction(e.to_string()))?;

        if !receipt.status() {
            return Err(ChainError::Transaction(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(TxOutcome {
            tx_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used,
        })
    }
}

struct SessionState {
    account: Address,
    // None for watch-only accounts.
    dispatcher: Option<Arc<dyn TxDispatcher>>,
}

/// The current wallet session: at most one connected account.
///
/// Cheaply cloneable handle; bindings hold a clone and read the account,
/// but only the owner (the CLI driver) connects or disconnects.
#[derive(Clone)]
pub struct WalletSession {
    state: Arc<RwLock<Option<SessionState>>>,
}

impl WalletSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// The connected account, if any.
    pub async fn account(&self) -> Option<Address> {
        self.state.read().await.as_ref().map(|s| s.account)
    }

    /// True if an account is attached but cannot sign.
    pub async fn is_watch_only(&self) -> bool {
        matches!(
            self.state.read().await.as_ref(),
            Some(state) if state.dispatcher.is_none()
        )
    }

    /// Open a connector and attach its account to the session.
    pub async fn connect(
        &self,
        connector_id: &str,
        rpc_url: &str,
        opts: &ConnectOptions,
    ) -> Result<Address, ChainError> {
        let signer = build_signer(connector_id, opts)?;
        let account = signer.address();

        let url = rpc_url
            .parse()
            .map_err(|e| ChainError::Wallet(format!("invalid rpc url: {e}")))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(url);

        let dispatcher: Arc<dyn TxDispatcher> = Arc::new(RpcDispatcher {
            provider: Box::new(provider),
        });
        *self.state.write().await = Some(SessionState {
            account,
            dispatcher: Some(dispatcher),
        });

        info!(account = %account, connector = connector_id, "wallet connected");
        Ok(account)
    }

    /// Attach a watch-only account: data loads work, transactions do not.
    pub async fn watch(&self, account: Address) {
        *self.state.write().await = Some(SessionState {
            account,
            dispatcher: None,
        });
        info!(account = %account, "watch-only account attached");
    }

    pub async fn disconnect(&self) {
        *self.state.write().await = None;
    }

    /// Submit a state-changing call through the connected wallet and wait
    /// for the receipt. Fails fast without touching the network when no
    /// account is connected or the account cannot sign.
    pub async fn send(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<TxOutcome, ChainError> {
        let (account, dispatcher) = {
            let state = self.state.read().await;
            match state.as_ref() {
                None => return Err(ChainError::NoAccount),
                Some(session) => match &session.dispatcher {
                    None => return Err(ChainError::WatchOnly),
                    Some(dispatcher) => (session.account, Arc::clone(dispatcher)),
                },
            }
        };

        let tx = TransactionRequest::default()
            .from(account)
            .to(to)
            .value(value)
            .input(TransactionInput::new(data));
        dispatcher.dispatch(tx).await
    }

    #[cfg(test)]
    pub(crate) async fn attach(&self, account: Address, dispatcher: Arc<dyn TxDispatcher>) {
        *self.state.write().await = Some(SessionState {
            account,
            dispatcher: Some(dispatcher),
        });
    }
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}

fn build_signer(connector_id: &str, opts: &ConnectOptions) -> Result<PrivateKeySigner, ChainError> {
    match connector_id {
        "private-key" => {
            let key = opts
                .private_key
                .as_deref()
                .ok_or_else(|| ChainError::Wallet("missing private key".into()))?;
            key.trim()
                .trim_start_matches("0x")
                .parse::<PrivateKeySigner>()
                .map_err(|e| ChainError::Wallet(e.to_string()))
        }
        "keystore" => {
            let path = opts
                .keystore_path
                .as_ref()
                .ok_or_else(|| ChainError::Wallet("missing keystore path".into()))?;
            let password = opts
                .keystore_password
                .as_deref()
                .ok_or_else(|| ChainError::Wallet("missing keystore password".into()))?;
            PrivateKeySigner::decrypt_keystore(path, password)
                .map_err(|e| ChainError::Wallet(e.to_string()))
        }
        "mnemonic" => {
            let phrase = opts
                .mnemonic
                .as_deref()
                .ok_or_else(|| ChainError::Wallet("missing mnemonic phrase".into()))?;
            MnemonicBuilder::<English>::default()
                .phrase(phrase.trim())
                .index(opts.mnemonic_index)
                .map_err(|e| ChainError::Wallet(e.to_string()))?
                .build()
                .map_err(|e| ChainError::Wallet(e.to_string()))
        }
        other => Err(ChainError::UnknownConnector(other.to_string())),
    }
}
