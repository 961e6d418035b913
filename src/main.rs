mod bindings;
mod chain;
mod config;
mod events;
mod export;
mod portfolio;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::chain::batch::{CallExecutor, RpcExecutor};
use crate::chain::deployments::{self, Deployment};
use crate::chain::provider::EthProvider;
use crate::chain::tokens::TokenDirectory;
use crate::chain::wallet::{CONNECTORS, WalletSession};
use crate::config::{Command, Config};
use crate::events::{AppEvent, Notifier};
use crate::portfolio::Portfolio;
use crate::utils::{format_amount, format_pct, format_timestamp, short_address};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stakedeck=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    if matches!(config.command, Command::Connectors) {
        println!("Supported wallet connectors:");
        for connector in CONNECTORS {
            println!("  {:<14} {} (needs {})", connector.id, connector.label, connector.requires);
        }
        return Ok(());
    }

    let deployment = deployments::resolve(&config.chain).ok_or_else(|| {
        eyre!(
            "unknown chain `{}`; built-in presets: {}",
            config.chain,
            deployments::supported_presets().join(", ")
        )
    })?;
    let rpc_url = config
        .rpc_url
        .clone()
        .unwrap_or_else(|| deployment.rpc_url.clone());

    eprintln!("Connecting to {rpc_url}...");
    let provider = EthProvider::connect(&rpc_url).await?;
    let chain_id = provider.chain_id();
    if chain_id != deployment.chain_id {
        warn!(
            expected = deployment.chain_id,
            actual = chain_id,
            "connected chain id does not match the selected deployment"
        );
    }

    let (notifier, event_rx) = Notifier::channel();
    notifier.send(AppEvent::Connected { chain_id });

    let executor: Arc<dyn CallExecutor> = Arc::new(RpcExecutor::new(Arc::new(provider)));
    let directory = TokenDirectory::new(Arc::clone(&executor));
    let session = WalletSession::new();

    if let Some(connector) = &config.connector {
        let account = session
            .connect(connector, &rpc_url, &config.connect_options())
            .await?;
        eprintln!("Connected account {account}");
    } else if let Some(raw) = &config.account {
        let account: Address = raw
            .parse()
            .map_err(|e| eyre!("invalid account address `{raw}`: {e}"))?;
        session.watch(account).await;
        eprintln!("Watching account {account} (read-only)");
    }

    let portfolio = Arc::new(Portfolio::new(
        &deployment,
        executor,
        session.clone(),
        notifier.clone(),
    ));

    match config.command {
        Command::Connectors => unreachable!("handled above"),

        Command::Overview => {
            if let Err(e) = portfolio.load_all().await {
                warn!(error = %e, "snapshot incomplete; showing last-known values");
            }
            print_overview(&portfolio, &directory, &deployment, chain_id).await;
        }

        Command::Watch { interval } => {
            run_watch(&portfolio, &directory, &deployment, chain_id, event_rx, interval).await?;
        }

        Command::Approve { spender, amount } => {
            let spender_addr = match spender.as_str() {
                "staking" => deployment.staking,
                "governance" => deployment.governance,
                other => return Err(eyre!("unknown spender `{other}`; use staking or governance")),
            };
            let meta = directory.resolve(deployment.token).await;
            let raw = utils::parse_units(&amount, meta.decimals).map_err(|e| eyre!(e))?;

            let outcome = portfolio.token().approve(spender_addr, raw).await?;
            println!(
                "Approved {} {} for {spender}: tx {:#x} (gas used {})",
                amount, meta.symbol, outcome.tx_hash, outcome.gas_used
            );
        }

        Command::Stake { amount, token } => {
            let token_addr = staked_token(&deployment, token.as_deref())?;
            let meta = directory.resolve(token_addr).await;
            let raw = utils::parse_units(&amount, meta.decimals).map_err(|e| eyre!(e))?;

            let outcome = portfolio.staking().stake(token_addr, raw).await?;
            println!(
                "Staked {} {}: tx {:#x} (gas used {})",
                amount, meta.symbol, outcome.tx_hash, outcome.gas_used
            );
        }

        Command::Unstake { amount, token } => {
            let token_addr = staked_token(&deployment, token.as_deref())?;
            let meta = directory.resolve(token_addr).await;
            let raw = utils::parse_units(&amount, meta.decimals).map_err(|e| eyre!(e))?;

            let outcome = portfolio.staking().unstake(token_addr, raw).await?;
            println!(
                "Unstaked {} {}: tx {:#x} (gas used {})",
                amount, meta.symbol, outcome.tx_hash, outcome.gas_used
            );
        }

        Command::GovDeposit { amount } => {
            let meta = directory.resolve(deployment.token).await;
            let raw = utils::parse_units(&amount, meta.decimals).map_err(|e| eyre!(e))?;

            let outcome = portfolio.governance().deposit(raw).await?;
            println!(
                "Deposited {} {} into governance: tx {:#x} (gas used {})",
                amount, meta.symbol, outcome.tx_hash, outcome.gas_used
            );
        }

        Command::GovWithdraw { amount } => {
            let meta = directory.resolve(deployment.token).await;
            let raw = utils::parse_units(&amount, meta.decimals).map_err(|e| eyre!(e))?;

            let outcome = portfolio.governance().withdraw(raw).await?;
            println!(
                "Withdrew {} {} from governance: tx {:#x} (gas used {})",
                amount, meta.symbol, outcome.tx_hash, outcome.gas_used
            );
        }

        Command::Claim => {
            let outcome = portfolio.rewards().claim().await?;
            println!(
                "Claimed rewards: tx {:#x} (gas used {})",
                outcome.tx_hash, outcome.gas_used
            );
        }

        Command::Export { path, format } => {
            if let Err(e) = portfolio.load_all().await {
                warn!(error = %e, "snapshot incomplete; exporting last-known values");
            }
            let snapshot = portfolio.snapshot().await;
            let message = match format.as_str() {
                "csv" => export::export_csv(&snapshot, &path).map_err(|e| eyre!(e))?,
                "json" => export::export_json(&snapshot, &path).map_err(|e| eyre!(e))?,
                other => return Err(eyre!("unknown export format `{other}`; use csv or json")),
            };
            println!("{message}");
        }
    }

    Ok(())
}

fn staked_token(deployment: &Deployment, flag: Option<&str>) -> Result<Address> {
    match flag {
        Some(raw) => raw
            .parse()
            .map_err(|e| eyre!("invalid token address `{raw}`: {e}")),
        None => deployment
            .staked_tokens
            .first()
            .copied()
            .ok_or_else(|| eyre!("deployment has no staked tokens configured; pass --token")),
    }
}

/// Periodic reload loop: fire the reload signal on an interval and reprint
/// the snapshot whenever any binding reports changed data.
async fn run_watch(
    portfolio: &Arc<Portfolio>,
    directory: &TokenDirectory,
    deployment: &Deployment,
    chain_id: u64,
    mut event_rx: mpsc::UnboundedReceiver<AppEvent>,
    interval_secs: u64,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                portfolio.reload();
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let mut repaint = matches!(event, AppEvent::DataChanged(_));
                handle_event(&event);

                // Coalesce whatever else is already queued into one repaint.
                while let Ok(extra) = event_rx.try_recv() {
                    repaint |= matches!(extra, AppEvent::DataChanged(_));
                    handle_event(&extra);
                }
                if repaint {
                    print_overview(portfolio, directory, deployment, chain_id).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping...");
                break;
            }
        }
    }
    Ok(())
}

fn handle_event(event: &AppEvent) {
    match event {
        AppEvent::Error(message) => warn!(%message, "background task reported an error"),
        AppEvent::TxConfirmed {
            contract,
            operation,
            tx_hash,
            gas_used,
        } => {
            println!("{contract}.{operation} confirmed: tx {tx_hash:#x} (gas used {gas_used})");
        }
        _ => {}
    }
}

async fn print_overview(
    portfolio: &Arc<Portfolio>,
    directory: &TokenDirectory,
    deployment: &Deployment,
    chain_id: u64,
) {
    let snapshot = portfolio.snapshot().await;
    let token_meta = directory.resolve(deployment.token).await;

    println!();
    println!("=== {} (chain {chain_id}) ===", deployment.chain_name);
    let watch_only = portfolio.session().is_watch_only().await;
    match snapshot.account {
        Some(account) if watch_only => {
            println!("Account        {} (watch-only)", short_address(&account));
        }
        Some(account) => println!("Account        {}", short_address(&account)),
        None => println!("Account        not connected"),
    }

    match (snapshot.staking_common.current_epoch, snapshot.epoch_window) {
        (Some(epoch), Some(window)) => {
            println!(
                "Epoch          #{epoch}  {} → {}  ({} elapsed)",
                format_timestamp(window.start.timestamp() as u64),
                format_timestamp(window.end.timestamp() as u64),
                format_pct(window.progress),
            );
        }
        (Some(epoch), None) => println!("Epoch          #{epoch}"),
        _ => println!("Epoch          —"),
    }

    println!();
    println!("[{}]", token_meta.symbol);
    println!(
        "  total supply        {}",
        format_amount(snapshot.token_common.total_supply, token_meta.decimals, &token_meta.symbol)
    );
    println!(
        "  balance             {}",
        format_amount(snapshot.token_user.balance, token_meta.decimals, &token_meta.symbol)
    );
    println!(
        "  staking allowance   {}",
        format_amount(
            snapshot.token_user.staking_allowance,
            token_meta.decimals,
            &token_meta.symbol
        )
    );
    println!(
        "  governance allowance {}",
        format_amount(
            snapshot.token_user.governance_allowance,
            token_meta.decimals,
            &token_meta.symbol
        )
    );

    for token in portfolio.staking().staked_tokens() {
        let meta = directory.resolve(*token).await;
        let common = snapshot.staking_common.pools.get(token);
        let user = snapshot.staking_user.pools.get(token);

        println!();
        println!("[staking pool {}]", meta.symbol);
        println!(
            "  pool size (epoch)   {}",
            format_amount(
                common.and_then(|p| p.current_epoch_pool_size),
                meta.decimals,
                &meta.symbol
            )
        );
        println!(
            "  pool size (next)    {}",
            format_amount(
                common.and_then(|p| p.next_epoch_pool_size),
                meta.decimals,
                &meta.symbol
            )
        );
        println!(
            "  my stake            {}",
            format_amount(user.and_then(|p| p.balance), meta.decimals, &meta.symbol)
        );
        println!(
            "  my stake (epoch)    {}",
            format_amount(
                user.and_then(|p| p.current_epoch_balance),
                meta.decimals,
                &meta.symbol
            )
        );
        println!(
            "  my stake (next)     {}",
            format_amount(
                user.and_then(|p| p.next_epoch_balance),
                meta.decimals,
                &meta.symbol
            )
        );
    }

    println!();
    println!("[governance]");
    println!(
        "  total staked        {}",
        format_amount(
            snapshot.governance_common.total_staked,
            token_meta.decimals,
            &token_meta.symbol
        )
    );
    println!(
        "  my stake            {}",
        format_amount(
            snapshot.governance_user.staked_balance,
            token_meta.decimals,
            &token_meta.symbol
        )
    );
    println!(
        "  voting power        {}",
        format_amount(
            snapshot.governance_user.voting_power,
            token_meta.decimals,
            &token_meta.symbol
        )
    );
    match snapshot.governance_user.locked_until {
        Some(0) | None => println!("  locked until        —"),
        Some(ts) => println!("  locked until        {}", format_timestamp(ts)),
    }
    match snapshot.governance_user.delegated_to {
        Some(delegate) => println!("  delegated to        {}", short_address(&delegate)),
        None => println!("  delegated to        —"),
    }

    println!();
    println!("[rewards]");
    println!(
        "  total distributed   {}",
        format_amount(
            snapshot.rewards_common.total_distributed,
            token_meta.decimals,
            &token_meta.symbol
        )
    );
    println!(
        "  claimable           {}",
        format_amount(snapshot.rewards_user.claimable, token_meta.decimals, &token_meta.symbol)
    );
    println!(
        "  claimed             {}",
        format_amount(snapshot.rewards_user.claimed, token_meta.decimals, &token_meta.symbol)
    );
}
