use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

const SATOSHIS_PER_BITCOIN: u64 = 100_000_000;

/// A bitcoin amount, in satoshis.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn from_sat(satoshis: u64) -> Self {
        Self(satoshis)
    }

    pub const fn to_sat(self) -> u64 {
        self.0
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{:08} BTC",
            self.0 / SATOSHIS_PER_BITCOIN,
            self.0 % SATOSHIS_PER_BITCOIN
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bitcoin amount `{0}`")]
pub struct ParseAmountError(String);

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// parses a decimal BTC string, eg `0.0005` or `12`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAmountError(s.to_owned());
        let (whole, fraction) = match s.trim().split_once('.') {
            Some((w, f)) => (w, f),
            None => (s.trim(), ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(err());
        }
        if fraction.len() > 8 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            format!("{:0<8}", fraction).parse().map_err(|_| err())?
        };

        whole
            .checked_mul(SATOSHIS_PER_BITCOIN)
            .and_then(|w| w.checked_add(fraction))
            .map(Self)
            .ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_eight_decimals() {
        assert_eq!("0.00050000 BTC", Amount::from_sat(50_000).to_string());
        assert_eq!("12.00000001 BTC", Amount::from_sat(1_200_000_001).to_string());
    }

    #[test]
    fn parse_decimal_btc() {
        assert_eq!(Ok(Amount::from_sat(50_000)), "0.0005".parse());
        assert_eq!(Ok(Amount::from_sat(200_000_000)), "2".parse());
        assert_eq!(Ok(Amount::from_sat(10_000_000)), ".1".parse());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Amount>().is_err());
        assert!("1.123456789".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("1.2x".parse::<Amount>().is_err());
    }
}
