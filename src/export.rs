use std::fs;
use std::io::Write;

use alloy::primitives::U256;

use crate::portfolio::PortfolioSnapshot;
use crate::utils::format_timestamp;

fn opt_u256(value: Option<U256>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_u64(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Export a portfolio snapshot to CSV.
///
/// Columns: section, field, value. Amounts are raw token units so the file
/// survives re-import without precision loss; unloaded fields export as
/// empty strings.
pub fn export_csv(snapshot: &PortfolioSnapshot, path: &str) -> Result<String, String> {
    let file = fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(["section", "field", "value"])
        .map_err(|e| format!("Failed to write CSV header: {e}"))?;

    let mut rows: Vec<(String, String, String)> = vec![
        (
            "session".into(),
            "account".into(),
            snapshot
                .account
                .map(|a| format!("{a:#x}"))
                .unwrap_or_default(),
        ),
        ("session".into(), "reloads".into(), snapshot.reloads.to_string()),
        (
            "token".into(),
            "total_supply".into(),
            opt_u256(snapshot.token_common.total_supply),
        ),
        (
            "token".into(),
            "balance".into(),
            opt_u256(snapshot.token_user.balance),
        ),
        (
            "token".into(),
            "staking_allowance".into(),
            opt_u256(snapshot.token_user.staking_allowance),
        ),
        (
            "token".into(),
            "governance_allowance".into(),
            opt_u256(snapshot.token_user.governance_allowance),
        ),
        (
            "staking".into(),
            "current_epoch".into(),
            opt_u64(snapshot.staking_common.current_epoch),
        ),
        (
            "staking".into(),
            "epoch_start".into(),
            opt_u64(snapshot.staking_common.epoch_start),
        ),
        (
            "staking".into(),
            "epoch_duration".into(),
            opt_u64(snapshot.staking_common.epoch_duration),
        ),
        (
            "governance".into(),
            "total_staked".into(),
            opt_u256(snapshot.governance_common.total_staked),
        ),
        (
            "governance".into(),
            "staked_balance".into(),
            opt_u256(snapshot.governance_user.staked_balance),
        ),
        (
            "governance".into(),
            "voting_power".into(),
            opt_u256(snapshot.governance_user.voting_power),
        ),
        (
            "rewards".into(),
            "total_distributed".into(),
            opt_u256(snapshot.rewards_common.total_distributed),
        ),
        (
            "rewards".into(),
            "claimable".into(),
            opt_u256(snapshot.rewards_user.claimable),
        ),
        (
            "rewards".into(),
            "claimed".into(),
            opt_u256(snapshot.rewards_user.claimed),
        ),
    ];

    for (token, pool) in &snapshot.staking_common.pools {
        rows.push((
            format!("staking:{token:#x}"),
            "current_epoch_pool_size".into(),
            opt_u256(pool.current_epoch_pool_size),
        ));
        rows.push((
            format!("staking:{token:#x}"),
            "next_epoch_pool_size".into(),
            opt_u256(pool.next_epoch_pool_size),
        ));
    }
    for (token, pool) in &snapshot.staking_user.pools {
        rows.push((
            format!("staking:{token:#x}"),
            "balance".into(),
            opt_u256(pool.balance),
        ));
        rows.push((
            format!("staking:{token:#x}"),
            "current_epoch_balance".into(),
            opt_u256(pool.current_epoch_balance),
        ));
        rows.push((
            format!("staking:{token:#x}"),
            "next_epoch_balance".into(),
            opt_u256(pool.next_epoch_balance),
        ));
    }

    for (section, field, value) in &rows {
        wtr.write_record([section, field, value])
            .map_err(|e| format!("Failed to write CSV row: {e}"))?;
    }

    wtr.flush().map_err(|e| format!("Failed to flush CSV: {e}"))?;
    Ok(format!("Exported {} rows to {path}", rows.len()))
}

/// Export a portfolio snapshot to pretty-printed JSON.
pub fn export_json(snapshot: &PortfolioSnapshot, path: &str) -> Result<String, String> {
    let json = serde_json::json!({
        "account": snapshot.account.map(|a| format!("{a:#x}")),
        "reloads": snapshot.reloads,
        "token": {
            "total_supply": snapshot.token_common.total_supply.map(|v| v.to_string()),
            "balance": snapshot.token_user.balance.map(|v| v.to_string()),
            "staking_allowance": snapshot.token_user.staking_allowance.map(|v| v.to_string()),
            "governance_allowance": snapshot.token_user.governance_allowance.map(|v| v.to_string()),
        },
        "staking": {
            "current_epoch": snapshot.staking_common.current_epoch,
            "epoch_start": snapshot.staking_common.epoch_start,
            "epoch_duration": snapshot.staking_common.epoch_duration,
            "epoch_window": snapshot.epoch_window.map(|w| serde_json::json!({
                "starts": format_timestamp(w.start.timestamp() as u64),
                "ends": format_timestamp(w.end.timestamp() as u64),
                "progress_pct": w.progress,
            })),
            "pools": snapshot.staking_common.pools.iter().map(|(token, pool)| {
                let user = snapshot.staking_user.pools.get(token);
                serde_json::json!({
                    "token": format!("{token:#x}"),
                    "current_epoch_pool_size": pool.current_epoch_pool_size.map(|v| v.to_string()),
                    "next_epoch_pool_size": pool.next_epoch_pool_size.map(|v| v.to_string()),
                    "balance": user.and_then(|u| u.balance).map(|v| v.to_string()),
                    "current_epoch_balance": user.and_then(|u| u.current_epoch_balance).map(|v| v.to_string()),
                    "next_epoch_balance": user.and_then(|u| u.next_epoch_balance).map(|v| v.to_string()),
                })
            }).collect::<Vec<_>>(),
        },
        "governance": {
            "total_staked": snapshot.governance_common.total_staked.map(|v| v.to_string()),
            "staked_balance": snapshot.governance_user.staked_balance.map(|v| v.to_string()),
            "voting_power": snapshot.governance_user.voting_power.map(|v| v.to_string()),
            "locked_until": snapshot.governance_user.locked_until,
            "delegated_to": snapshot.governance_user.delegated_to.map(|a| format!("{a:#x}")),
        },
        "rewards": {
            "total_distributed": snapshot.rewards_common.total_distributed.map(|v| v.to_string()),
            "claimable": snapshot.rewards_user.claimable.map(|v| v.to_string()),
            "claimed": snapshot.rewards_user.claimed.map(|v| v.to_string()),
        },
    });

    let formatted = serde_json::to_string_pretty(&json)
        .map_err(|e| format!("Failed to serialize JSON: {e}"))?;

    let mut file = fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    file.write_all(formatted.as_bytes())
        .map_err(|e| format!("Failed to write file: {e}"))?;

    Ok(format!("Exported snapshot to {path}"))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};

    use super::*;
    use crate::bindings::governance::{GovernanceCommon, GovernanceUser};
    use crate::bindings::rewards::{RewardsCommon, RewardsUser};
    use crate::bindings::staking::{PoolCommon, PoolUser, StakingCommon, StakingUser};
    use crate::bindings::token::{TokenCommon, TokenUser};

    fn sample_snapshot() -> PortfolioSnapshot {
        let token = Address::from_slice(&[0x10; 20]);
        let mut staking_common = StakingCommon {
            current_epoch: Some(4),
            epoch_start: Some(1_600_000_000),
            epoch_duration: Some(604_800),
            ..Default::default()
        };
        staking_common.pools.insert(
            token,
            PoolCommon {
                current_epoch_pool_size: Some(U256::from(1_000)),
                next_epoch_pool_size: Some(U256::from(1_100)),
            },
        );
        let mut staking_user = StakingUser::default();
        staking_user.pools.insert(
            token,
            PoolUser {
                balance: Some(U256::from(500)),
                current_epoch_balance: Some(U256::from(450)),
                next_epoch_balance: Some(U256::from(500)),
            },
        );

        PortfolioSnapshot {
            account: Some(Address::from_slice(&[0xaa; 20])),
            reloads: 3,
            token_common: TokenCommon {
                total_supply: Some(U256::from(10_000)),
            },
            token_user: TokenUser {
                balance: Some(U256::from(100)),
                staking_allowance: Some(U256::from(50)),
                governance_allowance: None,
            },
            staking_common,
            staking_user,
            epoch_window: None,
            governance_common: GovernanceCommon {
                total_staked: Some(U256::from(9_000)),
            },
            governance_user: GovernanceUser::default(),
            rewards_common: RewardsCommon {
                total_distributed: Some(U256::from(1_000_000)),
            },
            rewards_user: RewardsUser {
                claimable: Some(U256::from(120)),
                claimed: None,
            },
        }
    }

    #[test]
    fn test_export_csv() {
        let snapshot = sample_snapshot();
        let path = "/tmp/stakedeck-test-snapshot.csv";
        let result = export_csv(&snapshot, path);
        assert!(result.is_ok());

        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.contains("section,field,value"));
        assert!(contents.contains("token,total_supply,10000"));
        assert!(contents.contains("current_epoch_pool_size,1000"));
        // Unloaded fields export as empty values.
        assert!(contents.contains("token,governance_allowance,\n"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_export_json() {
        let snapshot = sample_snapshot();
        let path = "/tmp/stakedeck-test-snapshot.json";
        let result = export_json(&snapshot, path);
        assert!(result.is_ok());

        let contents = fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["token"]["total_supply"], "10000");
        assert_eq!(parsed["staking"]["current_epoch"], 4);
        assert!(parsed["governance"]["staked_balance"].is_null());
        assert_eq!(parsed["staking"]["pools"][0]["balance"], "500");

        let _ = fs::remove_file(path);
    }
}
