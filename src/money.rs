//! Fixed-point Zcash amounts.
//!
//! Internal arithmetic always uses integer zatoshis ([`Zatoshis`]); a
//! `rust_decimal`-backed [`Zec`] wrapper is used only at JSON/HTTP/DB
//! boundaries, never binary floating-point (spec §9 "Decimal money").

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};

/// 1 ZEC = 10^8 zatoshis.
pub const ZATOSHIS_PER_ZEC: u64 = 100_000_000;

/// An integer amount of zatoshis, the unit all internal arithmetic uses.
///
/// Serializes as a JSON number so RPC/DB round-trips never lose precision
/// through a locale-dependent decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Zatoshis(pub u64);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount exceeds representable zatoshi range")]
    OutOfRange,
}

impl Zatoshis {
    pub fn new(value: u64) -> Self {
        Zatoshis(value)
    }

    pub fn zero() -> Self {
        Zatoshis(0)
    }

    pub fn checked_require_positive(self) -> Result<Self, MoneyError> {
        if self.0 == 0 {
            Err(MoneyError::NotPositive)
        } else {
            Ok(self)
        }
    }

    /// Absolute difference between two amounts, saturating at zero.
    pub fn abs_diff(self, other: Zatoshis) -> u64 {
        self.0.abs_diff(other.0)
    }

    pub fn to_zec(self) -> Zec {
        Zec(Decimal::from(self.0) / Decimal::from(ZATOSHIS_PER_ZEC))
    }
}

impl Add for Zatoshis {
    type Output = Zatoshis;
    fn add(self, rhs: Self) -> Self::Output {
        Zatoshis(self.0 + rhs.0)
    }
}

impl Sub for Zatoshis {
    type Output = Option<Zatoshis>;
    fn sub(self, rhs: Self) -> Self::Output {
        self.0.checked_sub(rhs.0).map(Zatoshis)
    }
}

impl fmt::Display for Zatoshis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Zatoshis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Zatoshis {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Ok(Zatoshis(value))
    }
}

/// A decimal ZEC amount, used only at serialization boundaries (JSON bodies,
/// `numeric(20,8)` database columns). Converts losslessly to/from
/// [`Zatoshis`] because the decimal scale never exceeds 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zec(pub Decimal);

impl Zec {
    pub fn to_zatoshis(self) -> Result<Zatoshis, MoneyError> {
        let scaled = self.0 * Decimal::from(ZATOSHIS_PER_ZEC);
        let zats = scaled.trunc().to_u64().ok_or(MoneyError::OutOfRange)?;
        Ok(Zatoshis(zats))
    }
}

impl fmt::Display for Zec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn zec_to_zatoshis_round_trips() {
        let zec = Zec(Decimal::from_str("1.00000001").unwrap());
        let zats = zec.to_zatoshis().unwrap();
        assert_eq!(zats, Zatoshis(100_000_001));
        assert_eq!(zats.to_zec().0, zec.0);
    }

    #[test]
    fn zero_is_not_positive() {
        assert_eq!(
            Zatoshis::zero().checked_require_positive(),
            Err(MoneyError::NotPositive)
        );
    }

    #[test]
    fn abs_diff_within_tolerance() {
        let a = Zatoshis(100_000_000);
        let b = Zatoshis(99_999_999);
        assert_eq!(a.abs_diff(b), 1);
    }
}
