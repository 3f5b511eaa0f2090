//! Cost estimate for a query, derived from the bytes a dry run reports.

use std::fmt;

pub const BYTES_PER_TERABYTE: u64 = 1_099_511_627_776;
pub const BYTES_PER_GIGABYTE: u64 = 1_073_741_824;
pub const BYTES_PER_MEGABYTE: u64 = 1_048_576;

/// On-demand price in USD per terabyte processed
pub const DEFAULT_PRICE_PER_TERABYTE: f64 = 5.0;

/// Bytes a query would process and what that costs.
///
/// The cost is never rounded here; rounding happens only when it is displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub bytes_processed: u64,
    pub estimated_cost_usd: f64,
}

impl CostEstimate {
    pub fn from_bytes(bytes_processed: u64) -> Self {
        Self::with_price(bytes_processed, DEFAULT_PRICE_PER_TERABYTE)
    }

    pub fn with_price(bytes_processed: u64, price_per_terabyte: f64) -> Self {
        let estimated_cost_usd =
            bytes_processed as f64 / BYTES_PER_TERABYTE as f64 * price_per_terabyte;
        Self {
            bytes_processed,
            estimated_cost_usd,
        }
    }

    /// Cost rounded to 4 decimal places
    pub fn rounded_cost(&self) -> f64 {
        (self.estimated_cost_usd * 10_000.0).round() / 10_000.0
    }

    pub fn cost_display(&self) -> String {
        format!("${:.4}", self.estimated_cost_usd)
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes ({}), estimated cost {}",
            format_number(self.bytes_processed),
            format_bytes(self.bytes_processed),
            self.cost_display()
        )
    }
}

/// Format a byte count the way the warehouse console does: TB, GB, MB, then raw bytes
pub fn format_bytes(bytes: u64) -> String {
    let scaled = |unit: u64| bytes as f64 / unit as f64;

    if bytes >= BYTES_PER_TERABYTE {
        format!("{:.2}TB", scaled(BYTES_PER_TERABYTE))
    } else if bytes >= BYTES_PER_GIGABYTE {
        format!("{:.2}GB", scaled(BYTES_PER_GIGABYTE))
    } else if bytes >= BYTES_PER_MEGABYTE {
        format!("{:.2}MB", scaled(BYTES_PER_MEGABYTE))
    } else {
        format!("{} bytes", bytes)
    }
}

/// Group digits in threes with commas
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_gibibyte_costs_0049() {
        let estimate = CostEstimate::from_bytes(1_073_741_824);
        assert_eq!(estimate.rounded_cost(), 0.0049);
        assert_eq!(estimate.cost_display(), "$0.0049");
    }

    #[test]
    fn test_cost_is_not_rounded_internally() {
        let estimate = CostEstimate::from_bytes(1_073_741_824);
        assert_eq!(estimate.estimated_cost_usd, 0.0048828125);
    }

    #[test]
    fn test_one_terabyte_costs_price() {
        let estimate = CostEstimate::from_bytes(BYTES_PER_TERABYTE);
        assert_eq!(estimate.rounded_cost(), 5.0);
    }

    #[test]
    fn test_zero_bytes_is_free() {
        let estimate = CostEstimate::from_bytes(0);
        assert_eq!(estimate.estimated_cost_usd, 0.0);
        assert_eq!(estimate.cost_display(), "$0.0000");
    }

    #[test]
    fn test_custom_price() {
        let estimate = CostEstimate::with_price(BYTES_PER_TERABYTE * 2, 6.25);
        assert_eq!(estimate.rounded_cost(), 12.5);
    }

    #[test]
    fn test_rounding_matches_formula_for_various_sizes() {
        for bytes in [1u64, 999, 104_857_600, 15_000_000_000, 123_456_789_012] {
            let estimate = CostEstimate::from_bytes(bytes);
            let expected = (bytes as f64 / 1_099_511_627_776.0 * 5.0 * 10_000.0).round() / 10_000.0;
            assert_eq!(estimate.rounded_cost(), expected, "bytes = {}", bytes);
        }
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(104_857_600), "100.00MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00GB");
        assert_eq!(format_bytes(15_000_000_000), "13.97GB");
        assert_eq!(format_bytes(BYTES_PER_TERABYTE * 3 / 2), "1.50TB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(12_345_678), "12,345,678");
        assert_eq!(format_number(104_857_600), "104,857,600");
    }

    #[test]
    fn test_display() {
        let estimate = CostEstimate::from_bytes(1_073_741_824);
        assert_eq!(
            estimate.to_string(),
            "1,073,741,824 bytes (1.00GB), estimated cost $0.0049"
        );
    }
}
