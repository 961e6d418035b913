use alloy::primitives::{Address, U256};
use chrono::DateTime;

/// Truncate an address to "0xabcd...ef12" form.
pub fn short_address(addr: &Address) -> String {
    let s = format!("{addr}");
    if s.len() > 14 {
        format!("{}...{}", &s[..8], &s[s.len() - 4..])
    } else {
        s
    }
}

/// Format a raw token amount as a decimal string, trimmed to at most
/// 4 fractional digits.
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        return format!("{whole}");
    }

    let padded = format!("{:0>width$}", remainder, width = decimals as usize);
    let trimmed = padded.trim_end_matches('0');
    let shown = trimmed.len().min(4);
    if shown == 0 {
        return format!("{whole}");
    }
    format!("{whole}.{}", &trimmed[..shown])
}

/// Format an optional cached amount with its token symbol; unloaded fields
/// render as a dash.
pub fn format_amount(value: Option<U256>, decimals: u8, symbol: &str) -> String {
    match value {
        Some(v) => format!("{} {symbol}", format_units(v, decimals)),
        None => "—".to_string(),
    }
}

/// Parse a human decimal amount ("150.5") into a raw token amount.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty amount".to_string());
    }

    let (whole_str, frac_str) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };

    if whole_str.is_empty() && frac_str.is_empty() {
        return Err("empty amount".to_string());
    }
    if !whole_str.chars().all(|c| c.is_ascii_digit())
        || !frac_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(format!("invalid amount `{input}`"));
    }
    if frac_str.len() > decimals as usize {
        return Err(format!(
            "amount `{input}` has more than {decimals} decimal places"
        ));
    }

    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = if whole_str.is_empty() {
        U256::ZERO
    } else {
        whole_str
            .parse::<U256>()
            .map_err(|e| format!("invalid amount `{input}`: {e}"))?
    };

    let frac = if frac_str.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{frac_str:0<width$}", width = decimals as usize);
        padded
            .parse::<U256>()
            .map_err(|e| format!("invalid amount `{input}`: {e}"))?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| format!("amount `{input}` overflows"))
}

/// Format a Unix timestamp as a datetime string.
pub fn format_timestamp(timestamp: u64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format("%b %d, %Y %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Format a duration in seconds as "2d 4h", "3h 12m", or "45m".
pub fn format_countdown(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Format a percentage with one decimal place, clamped to 0..100.
pub fn format_pct(pct: f64) -> String {
    format!("{:.1}%", pct.clamp(0.0, 100.0))
}
