//! Instrument helpers

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Display scale for quoting stop distances in pips
///
/// Currency pairs (`frx`-prefixed provider symbols or bare six-letter pairs
/// like `EURUSD`) use 0.0001, everything else quotes in whole points.
pub fn pip_factor(instrument: &str) -> Decimal {
    let bare_pair = instrument.len() == 6 && instrument.chars().all(|c| c.is_ascii_uppercase());
    if instrument.starts_with("frx") || bare_pair {
        dec!(0.0001)
    } else {
        Decimal::ONE
    }
}

/// Check that a symbol can be sent to the provider
pub fn validate_instrument(instrument: &str) -> bool {
    !instrument.is_empty() && !instrument.chars().any(char::is_whitespace)
}
