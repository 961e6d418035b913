use alloy::primitives::{Address, B256};
use tokio::sync::mpsc;

/// Events pushed from data tasks to whatever front end is listening.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Provider connected and chain id resolved.
    Connected { chain_id: u64 },

    /// The wallet session account changed (None on disconnect). Every
    /// binding has already dropped its account-scoped fields when this
    /// event is observed.
    AccountChanged(Option<Address>),

    /// A binding applied a batch or invalidated fields; subscribers should
    /// re-read the binding's state.
    DataChanged(&'static str),

    /// A transaction was handed to the wallet for signing and submission.
    TxSubmitted {
        contract: &'static str,
        operation: &'static str,
    },

    /// A transaction was mined successfully.
    TxConfirmed {
        contract: &'static str,
        operation: &'static str,
        tx_hash: B256,
        gas_used: u64,
    },

    Error(String),
}

/// Clonable sending half of the app event channel.
///
/// Sends never fail: once the receiver is gone there is nobody left to
/// render the data, so events are silently dropped.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    pub fn data_changed(&self, contract: &'static str) {
        self.send(AppEvent::DataChanged(contract));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(AppEvent::Error(message.into()));
    }
}
