//! Byte quantities in Kubernetes notation (`10M`, `1Gi`, `512`).

use crate::{ApiError, Result};

const SUFFIXES: [(&str, u64); 12] = [
    ("Ki", 1 << 10),
    ("Mi", 1 << 20),
    ("Gi", 1 << 30),
    ("Ti", 1 << 40),
    ("Pi", 1 << 50),
    ("Ei", 1 << 60),
    ("k", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("E", 1_000_000_000_000_000_000),
];

/// Parse a quantity into bytes, rounding fractional results up
pub fn parse_bytes(quantity: &str) -> Result<u64> {
    let trimmed = quantity.trim();
    let invalid = || ApiError::InvalidQuantity(quantity.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| trimmed.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((trimmed, 1));

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(invalid);
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    let bytes = (value * multiplier as f64).ceil();
    if bytes > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_bytes("512").unwrap(), 512);
        assert_eq!(parse_bytes("10M").unwrap(), 10_000_000);
        assert_eq!(parse_bytes("1Gi").unwrap(), 1_073_741_824);
        assert_eq!(parse_bytes("1.5Ki").unwrap(), 1536);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_bytes("").is_err());
        assert!(parse_bytes("ten").is_err());
        assert!(parse_bytes("-1M").is_err());
        assert!(parse_bytes("20Ei").is_err());
    }
}
