//! Authoring-time unit conversion.
//!
//! Conditions store byte counts and seconds; these helpers turn the
//! human-friendly inputs of a rule editor ("5MB", "30d") into those values.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::RuleError;

const DAY_SECS: f64 = 24.0 * 60.0 * 60.0;

/// Size unit used while authoring a size condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SizeUnit {
    #[strum(serialize = "B")]
    Bytes,
    #[strum(serialize = "KB")]
    Kilobytes,
    #[strum(serialize = "MB")]
    Megabytes,
    #[strum(serialize = "GB")]
    Gigabytes,
    #[strum(serialize = "TB")]
    Terabytes,
}

impl SizeUnit {
    /// Number of bytes in one unit.
    pub fn multiplier(self) -> u64 {
        match self {
            Self::Bytes => 1,
            Self::Kilobytes => 1024,
            Self::Megabytes => 1024 * 1024,
            Self::Gigabytes => 1024 * 1024 * 1024,
            Self::Terabytes => 1024 * 1024 * 1024 * 1024,
        }
    }

    /// Convert an amount in this unit to bytes.
    pub fn to_bytes(self, amount: f64) -> u64 {
        (amount.max(0.0) * self.multiplier() as f64) as u64
    }
}

/// Parse a size string (e.g., "512", "1KB", "5MB", "1.5G") into bytes.
pub fn parse_size(input: &str) -> Result<u64, RuleError> {
    let invalid = || RuleError::InvalidQuantity {
        what: "size",
        input: input.to_string(),
    };
    let s = input.trim().to_uppercase();
    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    let amount: f64 = number.parse().map_err(|_| invalid())?;

    let unit = match suffix.trim() {
        "" | "B" => SizeUnit::Bytes,
        "K" | "KB" => SizeUnit::Kilobytes,
        "M" | "MB" => SizeUnit::Megabytes,
        "G" | "GB" => SizeUnit::Gigabytes,
        "T" | "TB" => SizeUnit::Terabytes,
        _ => return Err(invalid()),
    };

    Ok(unit.to_bytes(amount))
}

/// Parse an age string (e.g., "1y", "6m", "2w", "30d", "12h") into seconds.
pub fn parse_age(input: &str) -> Result<u64, RuleError> {
    let invalid = || RuleError::InvalidQuantity {
        what: "age",
        input: input.to_string(),
    };
    let s = input.trim().to_lowercase();
    let unit = s.chars().last().ok_or_else(invalid)?;

    let multiplier = match unit {
        'y' => 365.0 * DAY_SECS,
        'm' => 30.0 * DAY_SECS,
        'w' => 7.0 * DAY_SECS,
        'd' => DAY_SECS,
        'h' => 60.0 * 60.0,
        _ => return Err(invalid()),
    };
    let amount: f64 = s[..s.len() - 1].parse().map_err(|_| invalid())?;
    if amount < 0.0 {
        return Err(invalid());
    }

    Ok((amount * multiplier) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("5MB").unwrap(), 5 * 1024 * 1024);
        assert_eq!(parse_size("1.5g").unwrap(), 1024 * 1024 * 1024 * 3 / 2);
        assert_eq!(parse_size(" 10 kb ").unwrap(), 10 * 1024);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("5XB").is_err());
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("30d").unwrap(), 30 * 24 * 60 * 60);
        assert_eq!(parse_age("2w").unwrap(), 14 * 24 * 60 * 60);
        assert_eq!(parse_age("12h").unwrap(), 12 * 60 * 60);
        assert!(parse_age("").is_err());
        assert!(parse_age("soon").is_err());
    }

    #[test]
    fn test_size_unit() {
        assert_eq!(SizeUnit::Megabytes.to_bytes(5.0), 5 * 1024 * 1024);
        assert_eq!("mb".parse::<SizeUnit>().unwrap(), SizeUnit::Megabytes);
        assert_eq!(SizeUnit::Gigabytes.to_string(), "GB");
    }
}
