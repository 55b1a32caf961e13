use spg_common::MinorUnits;

use crate::GatewayApiError;

/// Item names longer than this are rejected by the gateway.
pub const MAX_ITEM_NAME_LENGTH: usize = 50;

/// The gateway reports amounts as decimal strings, e.g. `"100000.00"`. Currencies handled by the storefront have no
/// minor subdivision on the gateway side, so any fractional part must be zero.
pub fn parse_gross_amount(amount: &str) -> Result<MinorUnits, GatewayApiError> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if !fraction.chars().all(|c| c == '0') {
        return Err(GatewayApiError::InvalidCurrencyAmount(format!("{amount} has a non-zero fractional part")));
    }
    whole
        .parse::<i64>()
        .map(MinorUnits::from)
        .map_err(|e| GatewayApiError::InvalidCurrencyAmount(format!("{amount}. {e}")))
}

/// Truncates a name to the gateway's limit on a character boundary.
pub fn truncate_item_name(name: &str) -> String {
    name.chars().take(MAX_ITEM_NAME_LENGTH).collect()
}
