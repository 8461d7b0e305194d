//! Average directional index (Wilder)
//!
//! +DM/-DM and TR are Wilder-smoothed over `period`, giving +DI and -DI;
//! DX = 100 * |+DI - -DI| / (+DI + -DI) is smoothed again over `period`.
//! The first value lands at index `2 * period - 1`.

use super::atr::{true_range, wilder_smooth};
use crate::market::Bar;
use rust_decimal::Decimal;

pub fn adx(bars: &[Bar], period: usize) -> Vec<Option<Decimal>> {
    let n = bars.len();
    if n < 2 || period == 0 {
        return vec![None; n];
    }

    let mut plus_dm = vec![None; n];
    let mut minus_dm = vec![None; n];
    for (i, pair) in bars.windows(2).enumerate() {
        let up = pair[1].high - pair[0].high;
        let down = pair[0].low - pair[1].low;
        plus_dm[i + 1] = Some(if up > down && up > Decimal::ZERO {
            up
        } else {
            Decimal::ZERO
        });
        minus_dm[i + 1] = Some(if down > up && down > Decimal::ZERO {
            down
        } else {
            Decimal::ZERO
        });
    }

    let smooth_tr = wilder_smooth(&true_range(bars), period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let hundred = Decimal::ONE_HUNDRED;
    let dx: Vec<Option<Decimal>> = (0..n)
        .map(|i| {
            let (tr, plus, minus) = (smooth_tr[i]?, smooth_plus[i]?, smooth_minus[i]?);
            // Flat market: no directional movement
            if tr.is_zero() {
                return Some(Decimal::ZERO);
            }
            let plus_di = hundred * plus / tr;
            let minus_di = hundred * minus / tr;
            let sum = plus_di + minus_di;
            if sum.is_zero() {
                Some(Decimal::ZERO)
            } else {
                Some(hundred * (plus_di - minus_di).abs() / sum)
            }
        })
        .collect();

    wilder_smooth(&dx, period)
}
