//! Loosely typed JSON values shared by the REST payloads.
//!
//! Rate APIs report numbers either as JSON numbers or as decimal strings
//! (token amounts routinely exceed `u64`). Unparsable values read as zero.

use serde::Deserialize;

/// A number that may arrive as a JSON number or a string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
    #[default]
    Null,
}

impl LooseNumber {
    pub fn as_f64(&self) -> f64 {
        let value = match self {
            LooseNumber::Int(n) => *n as f64,
            LooseNumber::Float(f) => *f,
            LooseNumber::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            LooseNumber::Null => 0.0,
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Integer value, truncating any fractional part.
    pub fn as_i64(&self) -> i64 {
        match self {
            LooseNumber::Int(n) => *n,
            other => other.as_f64().trunc() as i64,
        }
    }

    /// `None` for null or empty values.
    pub fn as_opt_i64(&self) -> Option<i64> {
        match self {
            LooseNumber::Null => None,
            LooseNumber::Text(s) if s.trim().is_empty() => None,
            other => Some(other.as_i64()),
        }
    }

    /// Token decimals; `None` when missing or out of range.
    pub fn as_decimals(&self) -> Option<u32> {
        self.as_opt_i64()
            .filter(|d| (0..=MAX_DECIMALS).contains(d))
            .map(|d| d as u32)
    }
}

/// Largest decimals value accepted from an API.
const MAX_DECIMALS: i64 = 36;

/// Token decimals, defaulting to 18 when missing, zero or out of range.
pub fn decimals_or_default(decimals: &LooseNumber) -> u32 {
    decimals.as_decimals().filter(|d| *d > 0).unwrap_or(18)
}

/// USD value of a raw token amount: `price * amount / 10^decimals`.
pub fn usd_amount(price: f64, raw_amount: f64, decimals: u32) -> f64 {
    price * (raw_amount / 10f64.powi(decimals as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default)]
        value: LooseNumber,
    }

    fn parse(json: &str) -> LooseNumber {
        serde_json::from_str::<Holder>(json).unwrap().value
    }

    #[test]
    fn test_loose_number_accepts_strings_and_numbers() {
        assert_eq!(parse(r#"{"value": 390}"#).as_i64(), 390);
        assert_eq!(parse(r#"{"value": "390"}"#).as_i64(), 390);
        assert_eq!(parse(r#"{"value": "1.5"}"#).as_f64(), 1.5);
        assert_eq!(parse(r#"{"value": 2.75}"#).as_i64(), 2);
    }

    #[test]
    fn test_loose_number_defaults_to_zero() {
        assert_eq!(parse(r#"{}"#).as_i64(), 0);
        assert_eq!(parse(r#"{"value": null}"#).as_f64(), 0.0);
        assert_eq!(parse(r#"{"value": "abc"}"#).as_i64(), 0);
        assert_eq!(parse(r#"{"value": null}"#).as_opt_i64(), None);
    }

    #[test]
    fn test_large_amount_strings() {
        let n = parse(r#"{"value": "125000000000000000000000"}"#);
        assert_eq!(n.as_f64(), 1.25e23);
    }

    #[test]
    fn test_usd_amount() {
        assert_eq!(usd_amount(2.0, 5_000_000.0, 6), 10.0);
        assert_eq!(decimals_or_default(&LooseNumber::Null), 18);
        assert_eq!(decimals_or_default(&LooseNumber::Int(0)), 18);
        assert_eq!(decimals_or_default(&LooseNumber::Int(6)), 6);
    }

    #[test]
    fn test_decimals_accept_strings() {
        assert_eq!(parse(r#"{"value": "6"}"#).as_decimals(), Some(6));
        assert_eq!(decimals_or_default(&parse(r#"{"value": "8"}"#)), 8);
        assert_eq!(parse(r#"{"value": 400}"#).as_decimals(), None);
        assert_eq!(parse(r#"{}"#).as_decimals(), None);
    }
}
