//! Monetary amounts in base units
//!
//! An [`Amount`] is an integer count of the smallest denomination. It is
//! never negative and never wider than 63 bits, so its 8-byte encoding
//! always has the sign bit clear. Decimal coin strings ("0.5", "21000000")
//! are parsed and printed with integer arithmetic only.

use crate::constants::{MAX_AMOUNT, SATOSHIS_PER_COIN};
use crate::error::ValueError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places in a coin string
const COIN_DECIMALS: usize = 8;

/// Non-negative 63-bit amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(MAX_AMOUNT);

    /// Amount from base units. Rejects anything with bit 63 set.
    pub fn from_sat(value: u64) -> Result<Self, ValueError> {
        if value > MAX_AMOUNT {
            return Err(ValueError::Overflow);
        }
        Ok(Amount(value))
    }

    /// Amount from a signed base-unit count, as read off the wire
    pub fn from_signed(value: i64) -> Result<Self, ValueError> {
        if value < 0 {
            return Err(ValueError::Negative);
        }
        Ok(Amount(value as u64))
    }

    pub fn as_sat(self) -> u64 {
        self.0
    }

    /// 8-byte little-endian wire encoding
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).and_then(|v| Amount::from_sat(v).ok())
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Decimal coin string: "50", "0.5", "0.00000001"
    pub fn to_coin_string(self) -> String {
        let whole = self.0 / SATOSHIS_PER_COIN;
        let frac = self.0 % SATOSHIS_PER_COIN;
        if frac == 0 {
            return whole.to_string();
        }
        let digits = format!("{:0width$}", frac, width = COIN_DECIMALS);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }

    /// Parse a decimal coin string without going through floating point
    pub fn from_coin_string(s: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::InvalidDecimal(s.to_string());
        let s = s.trim();
        if s.starts_with('-') {
            return Err(ValueError::Negative);
        }
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > COIN_DECIMALS {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| ValueError::Overflow)?
        };
        let mut frac_units: u64 = 0;
        for (i, digit) in frac.bytes().enumerate() {
            frac_units += (digit - b'0') as u64 * 10u64.pow((COIN_DECIMALS - 1 - i) as u32);
        }

        let value = whole
            .checked_mul(SATOSHIS_PER_COIN)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or(ValueError::Overflow)?;
        Amount::from_sat(value)
    }
}

impl TryFrom<u64> for Amount {
    type Error = ValueError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Amount::from_sat(value)
    }
}

impl TryFrom<i64> for Amount {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::from_signed(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_coin_string())
    }
}

impl FromStr for Amount {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_coin_string(s)
    }
}

// JSON carries amounts as decimal coin strings
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_coin_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_coin_string(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_bit_boundary() {
        assert!(Amount::from_sat((1u64 << 63) - 1).is_ok());
        assert_eq!(Amount::from_sat(1u64 << 63), Err(ValueError::Overflow));
        assert_eq!(Amount::from_sat(u64::MAX), Err(ValueError::Overflow));
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(Amount::from_signed(-1), Err(ValueError::Negative));
        assert_eq!(Amount::from_signed(i64::MAX).unwrap(), Amount::MAX);
        assert_eq!(Amount::try_from(0i64).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_coin_string_format() {
        assert_eq!(Amount::from_sat(5_000_000_000).unwrap().to_coin_string(), "50");
        assert_eq!(Amount::from_sat(50_000_000).unwrap().to_coin_string(), "0.5");
        assert_eq!(Amount::from_sat(1).unwrap().to_coin_string(), "0.00000001");
        assert_eq!(Amount::from_sat(123_456_789).unwrap().to_coin_string(), "1.23456789");
        assert_eq!(Amount::ZERO.to_coin_string(), "0");
    }

    #[test]
    fn test_coin_string_parse() {
        assert_eq!(Amount::from_coin_string("0.5").unwrap().as_sat(), 50_000_000);
        assert_eq!(Amount::from_coin_string("50").unwrap().as_sat(), 5_000_000_000);
        assert_eq!(Amount::from_coin_string(".1").unwrap().as_sat(), 10_000_000);
        assert_eq!(Amount::from_coin_string("1.").unwrap().as_sat(), 100_000_000);
        assert_eq!(Amount::from_coin_string("0.00000001").unwrap().as_sat(), 1);
    }

    #[test]
    fn test_coin_string_rejects() {
        assert!(matches!(Amount::from_coin_string(""), Err(ValueError::InvalidDecimal(_))));
        assert!(matches!(Amount::from_coin_string("."), Err(ValueError::InvalidDecimal(_))));
        assert!(matches!(Amount::from_coin_string("1e5"), Err(ValueError::InvalidDecimal(_))));
        assert!(matches!(
            Amount::from_coin_string("0.000000001"),
            Err(ValueError::InvalidDecimal(_))
        ));
        assert_eq!(Amount::from_coin_string("-1"), Err(ValueError::Negative));
        assert_eq!(Amount::from_coin_string("99999999999999999999"), Err(ValueError::Overflow));
        // 2^63 satoshis
        assert_eq!(Amount::from_coin_string("92233720368.54775808"), Err(ValueError::Overflow));
        assert!(Amount::from_coin_string("92233720368.54775807").is_ok());
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::from_sat(10).unwrap();
        let b = Amount::from_sat(3).unwrap();
        assert_eq!(a.checked_sub(b).unwrap().as_sat(), 7);
        assert!(b.checked_sub(a).is_none());
        assert!(Amount::MAX.checked_add(b).is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let amount = Amount::from_sat(150_000_000).unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1.5\"");
        let back: Amount = serde_json::from_str("\"1.5\"").unwrap();
        assert_eq!(back, amount);
        assert!(serde_json::from_str::<Amount>("\"-2\"").is_err());
    }
}
