//! Exponential moving average
//!
//! EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seeded at index `period - 1` with the simple mean of the first `period`
//! values.

use rust_decimal::Decimal;

pub fn ema(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let n = values.len();
    let mut out = vec![None; n];
    if period == 0 || n < period {
        return out;
    }

    let seed = values[..period].iter().sum::<Decimal>() / Decimal::from(period);
    out[period - 1] = Some(seed);

    let alpha = Decimal::TWO / Decimal::from(period + 1);
    let keep = Decimal::ONE - alpha;
    let mut prev = seed;
    for (slot, &value) in out.iter_mut().zip(values).skip(period) {
        prev = alpha * value + keep * prev;
        *slot = Some(prev);
    }

    out
}
