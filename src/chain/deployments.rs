use std::fs;
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};

const DEPLOYMENTS_FILE: &str = "deployments.json";
const APP_DIR: &str = "stakedeck";

/// Addresses of the protocol contracts on one chain, plus connection defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub chain_name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub token: Address,
    pub staking: Address,
    pub governance: Address,
    pub rewards: Address,
    /// Tokens accepted by the epoch staking pool.
    pub staked_tokens: Vec<Address>,
}

/// Get a built-in deployment preset by chain name.
pub fn preset(name: &str) -> Option<Deployment> {
    match name.to_lowercase().as_str() {
        "mainnet" | "ethereum" | "eth" => Some(Deployment {
            chain_name: "mainnet".to_string(),
            chain_id: 1,
            rpc_url: "https://eth.merkle.io".to_string(),
            token: address!("0391D2021f89DC339F60Fff84546EA23E337750f"),
            staking: address!("b0Fa2BeEe3Cf36a7Ac7E99B885b48538Ab364853"),
            governance: address!("10e138877df69Ca44Fdc68655f86c88CDe142D7F"),
            rewards: address!("9d0CF25b4cBC1CDA533664077f69aae5742Ee1ae"),
            staked_tokens: vec![
                // USDC, DAI
                address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
                address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
            ],
        }),
        "sepolia" => Some(Deployment {
            chain_name: "sepolia".to_string(),
            chain_id: 11155111,
            rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
            token: address!("52b9895ba39deb2bcb03b48c17e6c2b2ad297d47"),
            staking: address!("8a791620dd6260079bf849dc5567adc3f2fdc318"),
            governance: address!("610178da211fef7d417bc0e6fed39f05609ad788"),
            rewards: address!("b7f8bc63bbcad18155201308c8f3540b07f84f5e"),
            staked_tokens: vec![address!("52b9895ba39deb2bcb03b48c17e6c2b2ad297d47")],
        }),
        // Deterministic first-deploy addresses of a fresh local devnet.
        "local" | "anvil" => Some(Deployment {
            chain_name: "local".to_string(),
            chain_id: 31337,
            rpc_url: "http://localhost:8545".to_string(),
            token: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
            staking: address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
            governance: address!("9fE46736679d2D9a65F0992F2272dE9f3c7fA6e0"),
            rewards: address!("Cf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9"),
            staked_tokens: vec![address!("5FbDB2315678afecb367f032d93F642f64180aa3")],
        }),
        _ => None,
    }
}

/// Names of all built-in presets.
pub fn supported_presets() -> Vec<&'static str> {
    vec!["mainnet", "sepolia", "local"]
}

/// Resolve a chain name to a deployment: user overrides first, presets second.
pub fn resolve(name: &str) -> Option<Deployment> {
    if let Some(path) = deployments_path() {
        let overrides = load_overrides_from(&path);
        if let Some(found) = overrides
            .into_iter()
            .find(|d| d.chain_name.eq_ignore_ascii_case(name))
        {
            return Some(found);
        }
    }
    preset(name)
}

/// Load custom deployments from disk. Returns an empty list if the file is
/// missing or unreadable; a broken overrides file never blocks startup.
fn load_overrides_from(path: &Path) -> Vec<Deployment> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_str(&data) {
        Ok(deployments) => deployments,
        Err(_) => Vec::new(),
    }
}

/// Path to the custom deployments file.
pub fn deployments_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join(APP_DIR).join(DEPLOYMENTS_FILE))
}
