use crate::constants::TOKEN_DECIMALS;
use crate::error::GateError;

/// Parse a human-readable price (`"$0.03"`, `"0.01"`, `"$1"`) into atomic token units.
///
/// Integer-only: the fractional part is padded or truncated to
/// [`TOKEN_DECIMALS`] digits, never routed through `f64`.
pub fn parse_price(price: &str) -> Result<u64, GateError> {
    let cleaned: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return Err(GateError::InvalidPrice(format!(
            "'{price}': no numeric content"
        )));
    }

    let overflow = || GateError::InvalidPrice(format!("'{price}': overflow"));
    let multiplier = 10u64.pow(TOKEN_DECIMALS);

    let (integer_part, fractional_part) = cleaned
        .split_once('.')
        .unwrap_or((cleaned.as_str(), ""));

    let integer: u64 = if integer_part.is_empty() {
        0
    } else {
        integer_part
            .parse()
            .map_err(|e| GateError::InvalidPrice(format!("'{price}': integer part: {e}")))?
    };

    let decimals = TOKEN_DECIMALS as usize;
    let frac_str = &fractional_part[..fractional_part.len().min(decimals)];
    let fractional: u64 = if frac_str.is_empty() {
        0
    } else {
        frac_str
            .parse()
            .map_err(|e| GateError::InvalidPrice(format!("'{price}': fractional part: {e}")))?
    };
    let scale = 10u64.pow((decimals - frac_str.len()) as u32);

    integer
        .checked_mul(multiplier)
        .ok_or_else(overflow)?
        .checked_add(fractional.checked_mul(scale).ok_or_else(overflow)?)
        .ok_or_else(overflow)
}
