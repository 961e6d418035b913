use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::chain::wallet::ConnectOptions;

#[derive(Parser, Debug)]
#[command(name = "stakedeck", about = "Terminal client for epoch-based staking protocols")]
pub struct Config {
    /// RPC endpoint URL; overrides the chain preset's default
    #[arg(short, long)]
    pub rpc_url: Option<String>,

    /// Chain deployment (mainnet, sepolia, local, or a custom override name)
    #[arg(long, default_value = "mainnet")]
    pub chain: String,

    /// Wallet connector to open (see `stakedeck connectors`)
    #[arg(long)]
    pub connector: Option<String>,

    /// Watch-only account address; data loads work, transactions do not
    #[arg(long)]
    pub account: Option<String>,

    /// Raw private key for the private-key connector
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Path to an encrypted JSON keystore
    #[arg(long, env = "KEYSTORE_PATH")]
    pub keystore: Option<PathBuf>,

    /// Password for the keystore connector
    #[arg(long, env = "KEYSTORE_PASSWORD", hide_env_values = true)]
    pub keystore_password: Option<String>,

    /// BIP-39 phrase for the mnemonic connector
    #[arg(long, env = "MNEMONIC", hide_env_values = true)]
    pub mnemonic: Option<String>,

    /// Derivation index for the mnemonic connector
    #[arg(long, default_value = "0")]
    pub mnemonic_index: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a snapshot of protocol and account state
    Overview,

    /// Keep reloading and reprint whenever data changes
    Watch {
        /// Seconds between reload signals
        #[arg(long, default_value = "30")]
        interval: u64,
    },

    /// List the supported wallet connectors
    Connectors,

    /// Approve a protocol contract to spend the project token
    Approve {
        /// Which contract to approve: staking or governance
        spender: String,
        /// Token amount, e.g. "150.5"
        amount: String,
    },

    /// Stake tokens into the epoch pool
    Stake {
        amount: String,
        /// Staked token address; defaults to the first configured pool token
        #[arg(long)]
        token: Option<String>,
    },

    /// Withdraw tokens from the epoch pool
    Unstake {
        amount: String,
        /// Staked token address; defaults to the first configured pool token
        #[arg(long)]
        token: Option<String>,
    },

    /// Deposit project tokens into governance staking
    GovDeposit { amount: String },

    /// Withdraw project tokens from governance staking
    GovWithdraw { amount: String },

    /// Claim accrued rewards
    Claim,

    /// Export the current snapshot to a file
    Export {
        /// Output path
        path: String,
        /// Output format: csv or json
        #[arg(long, default_value = "csv")]
        format: String,
    },
}

impl Config {
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            private_key: self.private_key.clone(),
            keystore_path: self.keystore.clone(),
            keystore_password: self.keystore_password.clone(),
            mnemonic: self.mnemonic.clone(),
            mnemonic_index: self.mnemonic_index,
        }
    }
}
