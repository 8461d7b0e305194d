//! True range, Wilder smoothing and average true range

use crate::market::Bar;
use rust_decimal::Decimal;

/// TR[t] = max(high - low, |high - close[t-1]|, |low - close[t-1]|)
///
/// TR[0] has no previous close and is left empty.
pub fn true_range(bars: &[Bar]) -> Vec<Option<Decimal>> {
    let mut out = vec![None; bars.len()];
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, bar) = (&pair[0], &pair[1]);
        let range = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());
        out[i + 1] = Some(range);
    }
    out
}

/// Wilder smoothing: S[t] = (S[t-1] * (period - 1) + x[t]) / period
///
/// Seeded with the mean of the first `period` values after any leading gap.
/// A gap after the seed ends the output.
pub fn wilder_smooth(values: &[Option<Decimal>], period: usize) -> Vec<Option<Decimal>> {
    let n = values.len();
    let mut out = vec![None; n];
    if period == 0 {
        return out;
    }

    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };
    let seed_end = start + period;
    if seed_end > n {
        return out;
    }
    let Some(window) = values[start..seed_end].iter().copied().collect::<Option<Vec<_>>>() else {
        return out;
    };

    let p = Decimal::from(period);
    let mut prev = window.iter().sum::<Decimal>() / p;
    out[seed_end - 1] = Some(prev);

    for (slot, value) in out.iter_mut().zip(values).skip(seed_end) {
        let Some(value) = value else { break };
        prev = (prev * (p - Decimal::ONE) + value) / p;
        *slot = Some(prev);
    }

    out
}

/// Average true range; first value at index `period`
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<Decimal>> {
    wilder_smooth(&true_range(bars), period)
}
