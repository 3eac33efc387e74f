//! Fixed-point coin amounts and the exact rational used by stake accounting.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::error::{LedgerError, LedgerResult};

/// Base units per whole coin.
pub const DECIMALS: i64 = 100_000;
const DECIMAL_SCALE: u32 = 5;

/// Coin amount in base units (5 decimals).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Coin(pub i64);

impl Coin {
    pub const fn new(units: i64) -> Self {
        Coin(units)
    }

    pub const fn zero() -> Self {
        Coin(0)
    }

    /// Whole coins, saturating at the representable range.
    pub const fn from_whole(coins: i64) -> Self {
        Coin(coins.saturating_mul(DECIMALS))
    }

    pub fn units(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_plus(self, other: Coin) -> LedgerResult<Coin> {
        self.0
            .checked_add(other.0)
            .map(Coin)
            .ok_or_else(|| LedgerError::InvalidArgument(format!("coin overflow: {} + {}", self, other)))
    }

    pub fn checked_minus(self, other: Coin) -> LedgerResult<Coin> {
        self.0
            .checked_sub(other.0)
            .map(Coin)
            .ok_or_else(|| LedgerError::InvalidArgument(format!("coin overflow: {} - {}", self, other)))
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, DECIMAL_SCALE)
    }

    pub fn to_ratio(&self) -> StakeRatio {
        StakeRatio::from_coin(*self)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal().normalize())
    }
}

/// Exact non-float rational number. Always kept reduced with a positive
/// denominator, so structural equality is numeric equality.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StakeRatio {
    numer: BigInt,
    denom: BigInt,
}

impl StakeRatio {
    pub fn zero() -> Self {
        Self { numer: BigInt::zero(), denom: BigInt::one() }
    }

    pub fn one() -> Self {
        Self { numer: BigInt::one(), denom: BigInt::one() }
    }

    pub fn new(numer: impl Into<BigInt>, denom: impl Into<BigInt>) -> LedgerResult<Self> {
        let denom = denom.into();
        if denom.is_zero() {
            return Err(LedgerError::InvalidArgument("zero denominator".to_string()));
        }
        Ok(Self::reduced(numer.into(), denom))
    }

    fn reduced(numer: BigInt, denom: BigInt) -> Self {
        let gcd = numer.gcd(&denom);
        let (mut numer, mut denom) = if gcd.is_zero() || gcd.is_one() {
            (numer, denom)
        } else {
            (numer / &gcd, denom / &gcd)
        };
        if denom.is_negative() {
            numer = -numer;
            denom = -denom;
        }
        if numer.is_zero() {
            denom = BigInt::one();
        }
        Self { numer, denom }
    }

    pub fn from_coin(coin: Coin) -> Self {
        Self { numer: BigInt::from(coin.0), denom: BigInt::one() }
    }

    /// Exact conversion: mantissa / 10^scale.
    pub fn from_decimal(value: Decimal) -> Self {
        let denom = BigInt::from(10u32).pow(value.scale());
        Self::reduced(BigInt::from(value.mantissa()), denom)
    }

    pub fn numer(&self) -> &BigInt {
        &self.numer
    }

    pub fn denom(&self) -> &BigInt {
        &self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.numer.is_negative()
    }

    pub fn mul_coin(&self, coin: Coin) -> StakeRatio {
        Self::reduced(&self.numer * BigInt::from(coin.0), self.denom.clone())
    }

    /// Largest coin not above this value.
    pub fn floor_coin(&self) -> LedgerResult<Coin> {
        self.numer
            .div_floor(&self.denom)
            .to_i64()
            .map(Coin)
            .ok_or_else(|| LedgerError::InvalidArgument(format!("ratio {} exceeds coin range", self)))
    }
}

impl Default for StakeRatio {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for StakeRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

impl Ord for StakeRatio {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.numer * &other.denom).cmp(&(&other.numer * &self.denom))
    }
}

impl PartialOrd for StakeRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for StakeRatio {
    type Output = StakeRatio;

    fn add(self, rhs: StakeRatio) -> StakeRatio {
        if self.denom == rhs.denom {
            return Self::reduced(self.numer + rhs.numer, self.denom);
        }
        Self::reduced(
            &self.numer * &rhs.denom + &rhs.numer * &self.denom,
            &self.denom * &rhs.denom,
        )
    }
}

impl Sub for StakeRatio {
    type Output = StakeRatio;

    fn sub(self, rhs: StakeRatio) -> StakeRatio {
        self + StakeRatio { numer: -rhs.numer, denom: rhs.denom }
    }
}

impl Mul for StakeRatio {
    type Output = StakeRatio;

    fn mul(self, rhs: StakeRatio) -> StakeRatio {
        Self::reduced(self.numer * rhs.numer, self.denom * rhs.denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_coin_arithmetic() {
        let a = Coin::from_whole(10);
        let b = Coin::new(250_000);
        assert_eq!(a.checked_plus(b).unwrap(), Coin::new(1_250_000));
        assert_eq!(a.checked_minus(b).unwrap(), Coin::new(750_000));
        assert!(Coin::new(i64::MAX).checked_plus(Coin::new(1)).is_err());
        assert_eq!(Coin::new(150_000).to_string(), "1.5");
    }

    #[test]
    fn test_ratio_reduces() {
        let r = StakeRatio::new(302_400, 604_800).unwrap();
        assert_eq!(r, StakeRatio::new(1, 2).unwrap());
        let neg = StakeRatio::new(3, -6).unwrap();
        assert_eq!(neg.denom(), &BigInt::from(2));
        assert!(neg.is_negative());
        assert!(StakeRatio::new(1, 0).is_err());
    }

    #[test]
    fn test_ratio_arithmetic() {
        let half = StakeRatio::new(1, 2).unwrap();
        let third = StakeRatio::new(1, 3).unwrap();
        assert_eq!(half.clone() + third.clone(), StakeRatio::new(5, 6).unwrap());
        assert_eq!(half.clone() - third.clone(), StakeRatio::new(1, 6).unwrap());
        assert_eq!(half.clone() * third.clone(), StakeRatio::new(1, 6).unwrap());
        assert!(third < half);
        assert_eq!(half.mul_coin(Coin::new(500)).floor_coin().unwrap(), Coin::new(250));
    }

    #[test]
    fn test_floor_rounds_down() {
        assert_eq!(StakeRatio::new(7, 2).unwrap().floor_coin().unwrap(), Coin::new(3));
        assert_eq!(StakeRatio::new(-7, 2).unwrap().floor_coin().unwrap(), Coin::new(-4));
    }

    #[test]
    fn test_from_decimal_is_exact() {
        let r = StakeRatio::from_decimal(Decimal::from_str("0.25").unwrap());
        assert_eq!(r, StakeRatio::new(1, 4).unwrap());
        let whole = StakeRatio::from_decimal(Decimal::from(3));
        assert_eq!(whole, StakeRatio::from_coin(Coin::new(3)));
    }
}
