use std::iter;

use crate::{
    model::{Price, PriceRecord},
    stats,
};

/// `(close - open) / open * 100`. Not finite when `open` is zero.
pub fn daily_return_pct(record: &PriceRecord) -> f64 {
    (record.close - record.open) / record.open * 100.0
}

/// Trailing mean of `closes`, one output per input.
///
/// Index `i` is `None` while `i + 1 < window`. A zero window is never full.
pub fn moving_average(closes: &[Price], window: usize) -> impl Iterator<Item = Option<Price>> + '_ {
    MovingAverage {
        closes,
        window,
        ix: 0,
        sum: 0.0,
    }
}

/// Keeps a running sum: each step adds the incoming close and drops the one
/// leaving the window.
struct MovingAverage<'a> {
    closes: &'a [Price],
    window: usize,
    ix: usize,
    sum: Price,
}

impl Iterator for MovingAverage<'_> {
    type Item = Option<Price>;

    fn next(&mut self) -> Option<Self::Item> {
        let close = *self.closes.get(self.ix)?;

        self.sum += close;
        if self.window > 0 && self.ix >= self.window {
            self.sum -= self.closes[self.ix - self.window];
        }
        self.ix += 1;

        let full = self.window > 0 && self.ix >= self.window;
        Some(full.then(|| self.sum / self.window as Price))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.closes.len() - self.ix;
        (remaining, Some(remaining))
    }
}

/// Trailing sample standard deviation of `closes`, same windowing as
/// [`moving_average`]. Windows shorter than two are never defined.
pub fn rolling_std(closes: &[Price], window: usize) -> impl Iterator<Item = Option<Price>> + '_ {
    let (warmup, windows) = if window >= 2 {
        ((window - 1).min(closes.len()), closes.windows(window))
    } else {
        (closes.len(), closes[..0].windows(1))
    };

    iter::repeat(None)
        .take(warmup)
        .chain(windows.map(stats::sample_std))
}
