use crate::Decimal;
use rust_decimal::RoundingStrategy;

/// Quantize to two decimal places, rounding half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

pub fn format_amount(value: Decimal) -> String {
    round2(value).to_string()
}
