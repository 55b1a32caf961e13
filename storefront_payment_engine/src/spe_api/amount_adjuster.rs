//! Integer-exact reconciliation of line item prices against the gross amount the gateway will charge.
//!
//! The gateway refuses a session if the item details do not add up to the gross amount, so any discrepancy between
//! the locally computed line totals and the order total has to be pushed back into the unit prices. Small
//! discrepancies are spread over the lines in proportion to their quantity. Large ones mean something upstream is
//! broken, and the adjuster refuses to paper over them.
use log::*;
use thiserror::Error;

use crate::db_types::MinorUnits;

pub const DEFAULT_AMOUNT_TOLERANCE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustableLine {
    pub price: MinorUnits,
    pub quantity: i64,
}

impl AdjustableLine {
    pub fn new<M: Into<MinorUnits>>(price: M, quantity: i64) -> Self {
        Self { price: price.into(), quantity }
    }
}

/// A line after reconciliation. `source` is the index of the input line it came from. An input line can yield two
/// output lines when the rounding leftover could not be spread evenly over its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustedLine {
    pub source: usize,
    pub price: MinorUnits,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountMismatchError {
    #[error("The difference of {diff} exceeds the tolerance of {tolerance}")]
    ExceedsTolerance { expected: MinorUnits, calculated: MinorUnits, diff: MinorUnits, tolerance: MinorUnits },
    #[error("Adjusting line {line} would leave it with a unit price of {price}")]
    NonPositivePrice { expected: MinorUnits, calculated: MinorUnits, line: usize, price: MinorUnits },
    #[error("Line {0} has a non-positive quantity")]
    InvalidQuantity(usize),
    #[error("There are no lines to carry the difference")]
    NoLines { expected: MinorUnits, calculated: MinorUnits },
    #[error("The line totals overflow")]
    Overflow,
}

impl AmountMismatchError {
    /// The (expected, calculated) totals, where known.
    pub fn totals(&self) -> (MinorUnits, MinorUnits) {
        match self {
            Self::ExceedsTolerance { expected, calculated, .. } |
            Self::NonPositivePrice { expected, calculated, .. } |
            Self::NoLines { expected, calculated } => (*expected, *calculated),
            Self::InvalidQuantity(_) | Self::Overflow => (MinorUnits::default(), MinorUnits::default()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmountAdjuster {
    tolerance: MinorUnits,
}

impl Default for AmountAdjuster {
    fn default() -> Self {
        Self::new(MinorUnits::from(DEFAULT_AMOUNT_TOLERANCE))
    }
}

impl AmountAdjuster {
    pub fn new(tolerance: MinorUnits) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> MinorUnits {
        self.tolerance
    }

    /// Returns lines whose totals, plus `shipping_fee`, add up to exactly `target_gross`.
    ///
    /// Unit prices move as little as possible: the difference is shared out in proportion to each line's quantity,
    /// with each line's share rounded half away from zero, and whatever rounding leaves over goes to the highest-value
    /// line that can absorb it. If no line's quantity divides the leftover, one unit of the highest-value line is split
    /// into its own line.
    pub fn reconcile(
        &self,
        lines: &[AdjustableLine],
        shipping_fee: MinorUnits,
        target_gross: MinorUnits,
    ) -> Result<Vec<AdjustedLine>, AmountMismatchError> {
        if let Some(i) = lines.iter().position(|l| l.quantity <= 0) {
            return Err(AmountMismatchError::InvalidQuantity(i));
        }
        let calculated = lines
            .iter()
            .try_fold(shipping_fee, |acc, l| l.price.checked_mul(l.quantity).and_then(|t| acc.checked_add(t)))
            .ok_or(AmountMismatchError::Overflow)?;
        if calculated == target_gross {
            let unchanged = lines
                .iter()
                .enumerate()
                .map(|(source, l)| AdjustedLine { source, price: l.price, quantity: l.quantity })
                .collect();
            return Ok(unchanged);
        }
        let diff = target_gross.value() - calculated.value();
        if diff.unsigned_abs() > self.tolerance.value().unsigned_abs() {
            warn!("⚖️ Item totals {calculated} differ from the gross amount {target_gross} by more than {}", self.tolerance);
            return Err(AmountMismatchError::ExceedsTolerance {
                expected: target_gross,
                calculated,
                diff: MinorUnits::from(diff),
                tolerance: self.tolerance,
            });
        }
        if lines.is_empty() {
            return Err(AmountMismatchError::NoLines { expected: target_gross, calculated });
        }
        debug!("⚖️ Spreading a difference of {diff} over {} lines", lines.len());

        // Highest value lines first. Ties keep their input order.
        let mut by_value = (0..lines.len()).collect::<Vec<_>>();
        by_value.sort_by_key(|&i| std::cmp::Reverse(i128::from(lines[i].price.value()) * i128::from(lines[i].quantity)));

        let total_quantity = lines.iter().map(|l| i128::from(l.quantity)).sum::<i128>();
        let mut unit_adjustments = vec![0i64; lines.len()];
        let mut applied = 0i128;
        for &i in &by_value {
            let quantity = i128::from(lines[i].quantity);
            let share = round_div(i128::from(diff) * quantity, total_quantity);
            // Truncate so that no line overshoots its share. The leftover is settled below.
            let per_unit = share / quantity;
            unit_adjustments[i] = per_unit as i64;
            applied += per_unit * quantity;
        }
        // |leftover| is bounded by the tolerance plus the rounding error, so it fits in an i64
        let leftover = (i128::from(diff) - applied) as i64;

        let mut split = None;
        if leftover != 0 {
            match by_value.iter().find(|&&i| leftover % lines[i].quantity == 0) {
                Some(&i) => unit_adjustments[i] += leftover / lines[i].quantity,
                None => split = Some(by_value[0]),
            }
        }

        let mut result = Vec::with_capacity(lines.len() + 1);
        for (source, line) in lines.iter().enumerate() {
            let price = line.price + MinorUnits::from(unit_adjustments[source]);
            check_price(source, price, target_gross, calculated)?;
            if split == Some(source) {
                let odd_price = price + MinorUnits::from(leftover);
                check_price(source, odd_price, target_gross, calculated)?;
                if line.quantity > 1 {
                    result.push(AdjustedLine { source, price, quantity: line.quantity - 1 });
                }
                result.push(AdjustedLine { source, price: odd_price, quantity: 1 });
            } else {
                result.push(AdjustedLine { source, price, quantity: line.quantity });
            }
        }
        trace!("⚖️ Adjusted lines: {result:?}");
        Ok(result)
    }
}

fn check_price(
    line: usize,
    price: MinorUnits,
    expected: MinorUnits,
    calculated: MinorUnits,
) -> Result<(), AmountMismatchError> {
    if price.is_positive() {
        Ok(())
    } else {
        Err(AmountMismatchError::NonPositivePrice { expected, calculated, line, price })
    }
}

/// Integer division rounding half away from zero. `d` must be positive.
fn round_div(n: i128, d: i128) -> i128 {
    let q = n / d;
    let r = n % d;
    if 2 * r.abs() >= d {
        q + n.signum()
    } else {
        q
    }
}

/// Sum of the line totals plus the shipping fee. Used to double-check the output of [`AmountAdjuster::reconcile`].
pub fn gross_total(lines: &[AdjustedLine], shipping_fee: MinorUnits) -> Option<MinorUnits> {
    lines.iter().try_fold(shipping_fee, |acc, l| l.price.checked_mul(l.quantity).and_then(|t| acc.checked_add(t)))
}
