//! Display helpers for RPC server status fields
//!
//! All functions are total and return `"N/A"` for missing readings.

const NOT_AVAILABLE: &str = "N/A";

/// Render a latency reading, e.g. `"42ms"`
pub fn format_latency(latency_ms: Option<u64>) -> String {
    match latency_ms {
        Some(ms) => format!("{}ms", ms),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Render a block number with thousands separators, e.g. `"18,000,000"`
pub fn format_block_number(block: Option<u64>) -> String {
    let Some(block) = block else {
        return NOT_AVAILABLE.to_string();
    };

    let digits = block.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Render a block age in seconds as a coarse "time ago" string
pub fn format_block_age(age_secs: Option<u64>) -> String {
    let Some(age) = age_secs else {
        return NOT_AVAILABLE.to_string();
    };

    if age < 60 {
        format!("{}s ago", age)
    } else if age < 3_600 {
        format!("{}m ago", age / 60)
    } else if age < 86_400 {
        format!("{}h {}m ago", age / 3_600, (age % 3_600) / 60)
    } else {
        format!("{}d {}h ago", age / 86_400, (age % 86_400) / 3_600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(Some(0)), "0ms");
        assert_eq!(format_latency(Some(153)), "153ms");
        assert_eq!(format_latency(None), "N/A");
    }

    #[test]
    fn test_format_block_number_grouping() {
        assert_eq!(format_block_number(Some(0)), "0");
        assert_eq!(format_block_number(Some(999)), "999");
        assert_eq!(format_block_number(Some(1_000)), "1,000");
        assert_eq!(format_block_number(Some(18_123_456)), "18,123,456");
        assert_eq!(format_block_number(Some(100_000)), "100,000");
        assert_eq!(format_block_number(None), "N/A");
    }

    #[test]
    fn test_format_block_age_boundaries() {
        assert_eq!(format_block_age(Some(0)), "0s ago");
        assert_eq!(format_block_age(Some(59)), "59s ago");
        assert_eq!(format_block_age(Some(60)), "1m ago");
        assert_eq!(format_block_age(Some(3_599)), "59m ago");
        assert_eq!(format_block_age(Some(3_600)), "1h 0m ago");
        assert_eq!(format_block_age(Some(3_660)), "1h 1m ago");
        assert_eq!(format_block_age(Some(86_399)), "23h 59m ago");
        assert_eq!(format_block_age(Some(86_400)), "1d 0h ago");
        assert_eq!(format_block_age(Some(90_000)), "1d 1h ago");
        assert_eq!(format_block_age(None), "N/A");
    }
}
