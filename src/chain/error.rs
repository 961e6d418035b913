use thiserror::Error;

/// Errors produced by the chain layer.
///
/// Read batches fail as a unit: a `Batch` error means none of the values in
/// the batch were applied. Transaction errors carry whatever the wallet or
/// node reported; nothing in this layer retries.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("no wallet account connected")]
    NoAccount,

    #[error("connected account is watch-only; a signing connector is required")]
    WatchOnly,

    #[error("read batch failed: {0}")]
    Batch(String),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("unknown wallet connector `{0}`")]
    UnknownConnector(String),

    #[error("wallet connector error: {0}")]
    Wallet(String),

    #[error("contract `{0}` has no function `{1}`")]
    UnknownFunction(&'static str, String),

    #[error("abi encoding failed: {0}")]
    Abi(String),
}
