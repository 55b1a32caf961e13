use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "IDR";

//--------------------------------------     MinorUnits      ---------------------------------------------------------
/// An amount of money expressed in the smallest unit of its currency (e.g. cents, or whole rupiah).
///
/// All money arithmetic in the storefront happens on this type. There is deliberately no conversion to or from
/// floating point values.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MinorUnitsConversionError(String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for MinorUnits {
    type Error = MinorUnitsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MinorUnitsConversionError(format!("{value} is too large to be stored as an amount")))
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies a unit price by a quantity. Returns `None` on overflow.
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let mut a = MinorUnits::from(33_333);
        a += MinorUnits::from(1);
        assert_eq!(a, MinorUnits::from(33_334));
        assert_eq!(-a, MinorUnits::from(-33_334));
        let total: MinorUnits = [1, 2, 3].into_iter().map(MinorUnits::from).sum();
        assert_eq!(total.value(), 6);
        assert_eq!(MinorUnits::from(33_333).checked_mul(3), Some(MinorUnits::from(99_999)));
        assert_eq!(MinorUnits::from(i64::MAX).checked_mul(2), None);
        assert!(MinorUnits::try_from(u64::MAX).is_err());
    }

    #[test]
    fn serializes_as_a_plain_integer() {
        let json = serde_json::to_string(&MinorUnits::from(100_000)).unwrap();
        assert_eq!(json, "100000");
        let v: MinorUnits = serde_json::from_str("42").unwrap();
        assert_eq!(v.value(), 42);
    }
}
