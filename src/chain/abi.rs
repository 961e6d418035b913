use std::sync::OnceLock;

use alloy::json_abi::{Function, JsonAbi};

// --- Built-in protocol ABI singletons ---
//
// Each table lists only the functions the bindings actually call, in the
// spirit of a hand-maintained minimal interface rather than a full compiler
// artifact.

static TOKEN_ABI: OnceLock<JsonAbi> = OnceLock::new();
static STAKING_ABI: OnceLock<JsonAbi> = OnceLock::new();
static GOVERNANCE_ABI: OnceLock<JsonAbi> = OnceLock::new();
static REWARDS_ABI: OnceLock<JsonAbi> = OnceLock::new();

/// ERC-20 interface of the project token.
pub fn token_abi() -> &'static JsonAbi {
    TOKEN_ABI.get_or_init(|| {
        serde_json::from_str(include_str!("../../abis/token.json"))
            .expect("built-in token ABI should be valid")
    })
}

/// Epoch staking pool interface.
pub fn staking_abi() -> &'static JsonAbi {
    STAKING_ABI.get_or_init(|| {
        serde_json::from_str(include_str!("../../abis/staking.json"))
            .expect("built-in staking ABI should be valid")
    })
}

/// Governance staking ("barn") interface.
pub fn governance_abi() -> &'static JsonAbi {
    GOVERNANCE_ABI.get_or_init(|| {
        serde_json::from_str(include_str!("../../abis/governance.json"))
            .expect("built-in governance ABI should be valid")
    })
}

/// Rewards pool interface.
pub fn rewards_abi() -> &'static JsonAbi {
    REWARDS_ABI.get_or_init(|| {
        serde_json::from_str(include_str!("../../abis/rewards.json"))
            .expect("built-in rewards ABI should be valid")
    })
}

/// Look up a function by name. The protocol interfaces carry no overloads,
/// so the first match is the only match.
pub fn find_function<'a>(abi: &'a JsonAbi, name: &str) -> Option<&'a Function> {
    abi.functions().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_abis_parse() {
        assert!(token_abi().functions().count() >= 5);
        assert!(staking_abi().functions().count() >= 6);
        assert!(governance_abi().functions().count() >= 5);
        assert!(rewards_abi().functions().count() >= 3);
    }

    #[test]
    fn test_erc20_selectors() {
        // Well-known ERC-20 selectors pin down the function table encoding.
        let balance_of = find_function(token_abi(), "balanceOf").unwrap();
        assert_eq!(balance_of.selector().as_slice(), &[0x70, 0xa0, 0x82, 0x31]);

        let approve = find_function(token_abi(), "approve").unwrap();
        assert_eq!(approve.selector().as_slice(), &[0x09, 0x5e, 0xa7, 0xb3]);
    }

    #[test]
    fn test_find_function_missing() {
        assert!(find_function(token_abi(), "transferFrom").is_none());
    }

    #[test]
    fn test_staking_functions_present() {
        for name in [
            "epoch1Start",
            "epochDuration",
            "getCurrentEpoch",
            "getEpochPoolSize",
            "getEpochUserBalance",
            "balanceOf",
            "deposit",
            "withdraw",
        ] {
            assert!(find_function(staking_abi(), name).is_some(), "missing {name}");
        }
    }
}
