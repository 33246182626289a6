use eyre::{bail, eyre};
use itertools::{izip, Itertools};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    indicators::{daily_return_pct, moving_average, rolling_std},
    model::{Column, DerivedRecord, PriceRecord, RawPriceRecord},
    trend::classify_trend,
};

/// Window lengths, in records. The derived record fields are named after the
/// defaults (`ma_50`, `ma_200`, `rolling_std_30`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    short_window: usize,
    long_window: usize,
    volatility_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            short_window: 50,
            long_window: 200,
            volatility_window: 30,
        }
    }
}

impl PipelineConfig {
    pub fn with_short_window(mut self, value: usize) -> Self {
        self.short_window = value;
        self
    }

    pub fn with_long_window(mut self, value: usize) -> Self {
        self.long_window = value;
        self
    }

    pub fn with_volatility_window(mut self, value: usize) -> Self {
        self.volatility_window = value;
        self
    }

    pub fn short_window(&self) -> usize {
        self.short_window
    }

    pub fn long_window(&self) -> usize {
        self.long_window
    }

    pub fn volatility_window(&self) -> usize {
        self.volatility_window
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.short_window == 0 {
            bail!("short window must be at least 1");
        }
        if self.short_window >= self.long_window {
            bail!(
                "short window ({}) must be shorter than long window ({})",
                self.short_window,
                self.long_window
            );
        }
        if self.volatility_window < 2 {
            bail!("volatility window must be at least 2 for a sample deviation");
        }
        Ok(())
    }
}

/// Turns an ordered price history into derived records.
///
/// The stages are exposed separately so callers can inspect intermediate
/// results; [`run`](Self::run) chains all of them.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesMetricsPipeline {
    config: PipelineConfig,
}

impl TimeSeriesMetricsPipeline {
    pub fn new(config: PipelineConfig) -> eyre::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Carries each price and volume field's most recent value forward into
    /// empty cells. Leading gaps have nothing to carry and stay empty.
    ///
    /// Dates are never carried: a copied date would always collide with the
    /// row it came from.
    pub fn fill_missing(records: &[RawPriceRecord]) -> Vec<RawPriceRecord> {
        let mut last = RawPriceRecord::default();

        records
            .iter()
            .map(|r| {
                last = RawPriceRecord {
                    date: r.date,
                    open: r.open.or(last.open),
                    high: r.high.or(last.high),
                    low: r.low.or(last.low),
                    close: r.close.or(last.close),
                    volume: r.volume.or(last.volume),
                };
                last
            })
            .collect()
    }

    /// Converts filled rows into price records, rejecting empty dates, leading
    /// gaps and dates that are not strictly ascending.
    pub fn resolve(records: &[RawPriceRecord]) -> eyre::Result<Vec<PriceRecord>> {
        let resolved = records
            .iter()
            .enumerate()
            .map(|(ix, raw)| {
                let missing = |column: Column| {
                    eyre!(
                        "row {}: {column} is empty and has no earlier value to carry forward",
                        ix + 1
                    )
                };

                Ok(PriceRecord {
                    date: raw.date.ok_or_else(|| eyre!("row {}: Date is empty", ix + 1))?,
                    open: raw.open.ok_or_else(|| missing(Column::Open))?,
                    high: raw.high.ok_or_else(|| missing(Column::High))?,
                    low: raw.low.ok_or_else(|| missing(Column::Low))?,
                    close: raw.close.ok_or_else(|| missing(Column::Close))?,
                    volume: raw.volume.ok_or_else(|| missing(Column::Volume))?,
                })
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        if let Some((prev, next)) = resolved
            .iter()
            .tuple_windows()
            .find(|(prev, next)| prev.date >= next.date)
        {
            bail!(
                "dates must be strictly ascending: {} is followed by {}",
                prev.date,
                next.date
            );
        }

        Ok(resolved)
    }

    /// One derived record per input record.
    pub fn compute(&self, records: &[PriceRecord]) -> Vec<DerivedRecord> {
        let closes = records.iter().map(|r| r.close).collect_vec();

        let derived = izip!(
            records,
            moving_average(&closes, self.config.short_window),
            moving_average(&closes, self.config.long_window),
            rolling_std(&closes, self.config.volatility_window),
        )
        .map(|(record, ma_50, ma_200, rolling_std_30)| DerivedRecord {
            record: *record,
            daily_return_pct: Some(daily_return_pct(record)).filter(|r| r.is_finite()),
            ma_50,
            ma_200,
            rolling_std_30,
            trend: classify_trend(ma_50, ma_200),
        })
        .collect_vec();

        let invalid = derived
            .iter()
            .filter(|d| d.daily_return_pct.is_none())
            .count();
        if invalid > 0 {
            warn!(invalid, "daily return undefined for zero-priced opens");
        }

        derived
    }

    pub fn run(&self, records: &[RawPriceRecord]) -> eyre::Result<Vec<DerivedRecord>> {
        let filled = Self::fill_missing(records);
        let carried = count_missing(records) - count_missing(&filled);
        debug!(carried, "forward filled empty cells");

        let resolved = Self::resolve(&filled)?;
        let derived = self.compute(&resolved);

        info!(
            records = derived.len(),
            short_window = self.config.short_window,
            long_window = self.config.long_window,
            volatility_window = self.config.volatility_window,
            "computed derived metrics"
        );

        Ok(derived)
    }
}

fn count_missing(records: &[RawPriceRecord]) -> usize {
    records
        .iter()
        .map(|r| Column::ALL.iter().filter(|c| r.is_missing(**c)).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};
    use itertools::Itertools;

    use super::{PipelineConfig, TimeSeriesMetricsPipeline};
    use crate::model::{PriceRecord, RawPriceRecord, Trend};

    fn date(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Days::new(offset)
    }

    fn history(closes: &[f64]) -> Vec<PriceRecord> {
        closes
            .iter()
            .enumerate()
            .map(|(ix, close)| PriceRecord {
                date: date(ix as u64),
                open: close - 1.0,
                high: close + 2.0,
                low: close - 2.0,
                close: *close,
                volume: 1_000 + ix as u64,
            })
            .collect()
    }

    #[test]
    fn unittest_default_config() -> eyre::Result<()> {
        let config = PipelineConfig::default();
        assert_eq!(config.short_window(), 50);
        assert_eq!(config.long_window(), 200);
        assert_eq!(config.volatility_window(), 30);
        config.validate()?;
        Ok(())
    }

    #[test]
    fn unittest_invalid_config() {
        let inverted = PipelineConfig::default()
            .with_short_window(200)
            .with_long_window(50);
        assert!(TimeSeriesMetricsPipeline::new(inverted).is_err());

        let zero = PipelineConfig::default().with_short_window(0);
        assert!(zero.validate().is_err());

        let tiny = PipelineConfig::default().with_volatility_window(1);
        assert!(tiny.validate().is_err());
    }

    #[test]
    fn unittest_fill_missing_carries_last_value() {
        let raw = vec![
            RawPriceRecord {
                date: Some(date(0)),
                open: Some(10.0),
                high: Some(12.0),
                low: Some(9.0),
                close: Some(11.0),
                volume: Some(100),
            },
            RawPriceRecord {
                date: Some(date(1)),
                open: None,
                high: Some(13.0),
                low: None,
                close: None,
                volume: Some(200),
            },
            RawPriceRecord {
                date: Some(date(2)),
                close: Some(14.0),
                ..Default::default()
            },
        ];

        let filled = TimeSeriesMetricsPipeline::fill_missing(&raw);

        assert_eq!(filled.len(), 3);
        assert_eq!(filled[1].open, Some(10.0));
        assert_eq!(filled[1].low, Some(9.0));
        assert_eq!(filled[1].close, Some(11.0));
        assert_eq!(filled[2].open, Some(10.0));
        assert_eq!(filled[2].high, Some(13.0));
        assert_eq!(filled[2].close, Some(14.0));
        assert_eq!(filled[2].volume, Some(200));
        assert!(filled.iter().all(|r| r.is_complete()));
    }

    #[test]
    fn unittest_fill_missing_is_idempotent() {
        let complete = history(&[1.0, 2.0, 3.0])
            .into_iter()
            .map(RawPriceRecord::from)
            .collect_vec();
        assert_eq!(TimeSeriesMetricsPipeline::fill_missing(&complete), complete);

        let gappy = vec![
            RawPriceRecord {
                open: Some(1.0),
                ..Default::default()
            },
            RawPriceRecord {
                date: Some(date(1)),
                ..Default::default()
            },
        ];
        let once = TimeSeriesMetricsPipeline::fill_missing(&gappy);
        assert_eq!(TimeSeriesMetricsPipeline::fill_missing(&once), once);
    }

    #[test]
    fn unittest_leading_gap_is_rejected() {
        let raw = vec![
            RawPriceRecord {
                date: Some(date(0)),
                open: Some(1.0),
                high: Some(1.0),
                low: Some(1.0),
                close: None,
                volume: Some(10),
            },
            RawPriceRecord::from(history(&[5.0])[0]),
        ];

        let filled = TimeSeriesMetricsPipeline::fill_missing(&raw);
        assert_eq!(filled[0].close, None);

        let err = TimeSeriesMetricsPipeline::resolve(&filled).unwrap_err();
        assert!(err.to_string().contains("row 1: Close"));
    }

    #[test]
    fn unittest_empty_date_is_rejected() {
        let mut raw = history(&[1.0, 2.0, 3.0])
            .into_iter()
            .map(RawPriceRecord::from)
            .collect_vec();
        raw[1].date = None;

        let filled = TimeSeriesMetricsPipeline::fill_missing(&raw);
        assert_eq!(filled[1].date, None);

        let err = TimeSeriesMetricsPipeline::default().run(&raw).unwrap_err();
        assert_eq!(err.to_string(), "row 2: Date is empty");
    }

    #[test]
    fn unittest_unordered_dates_are_rejected() {
        let mut records = history(&[1.0, 2.0, 3.0]);
        records[2].date = records[1].date;
        let raw = records.into_iter().map(RawPriceRecord::from).collect_vec();

        assert!(TimeSeriesMetricsPipeline::resolve(&raw).is_err());
    }

    #[test]
    fn unittest_derived_lengths_and_windows() -> eyre::Result<()> {
        let closes = (0..250).map(|ix| 100.0 + ix as f64).collect_vec();
        let raw = history(&closes)
            .into_iter()
            .map(RawPriceRecord::from)
            .collect_vec();

        let derived = TimeSeriesMetricsPipeline::default().run(&raw)?;

        assert_eq!(derived.len(), raw.len());
        for (ix, d) in derived.iter().enumerate() {
            assert_eq!(d.ma_50.is_some(), ix >= 49, "ma_50 at {ix}");
            assert_eq!(d.ma_200.is_some(), ix >= 199, "ma_200 at {ix}");
            assert_eq!(d.rolling_std_30.is_some(), ix >= 29, "rolling_std_30 at {ix}");

            let expected = match (d.ma_50, d.ma_200) {
                (Some(s), Some(l)) if s > l => Trend::Bullish,
                (Some(s), Some(l)) if s < l => Trend::Bearish,
                _ => Trend::Neutral,
            };
            assert_eq!(d.trend, expected);
        }

        // rising closes: short average leads the long one
        assert_eq!(derived[199].trend, Trend::Bullish);
        assert_eq!(derived[198].trend, Trend::Neutral);
        assert!((derived[49].ma_50.unwrap() - 124.5).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn unittest_falling_series_is_bearish() -> eyre::Result<()> {
        let closes = (0..12).map(|ix| 100.0 - ix as f64).collect_vec();
        let pipeline = TimeSeriesMetricsPipeline::new(
            PipelineConfig::default()
                .with_short_window(2)
                .with_long_window(4)
                .with_volatility_window(3),
        )?;

        let derived = pipeline.compute(&history(&closes));

        assert_eq!(derived[2].trend, Trend::Neutral);
        assert!(derived[3..].iter().all(|d| d.trend == Trend::Bearish));
        Ok(())
    }

    #[test]
    fn unittest_zero_open_is_flagged() {
        let mut records = history(&[10.0, 20.0]);
        records[0].open = 0.0;

        let derived = TimeSeriesMetricsPipeline::default().compute(&records);

        assert_eq!(derived[0].daily_return_pct, None);
        let second = derived[1].daily_return_pct.unwrap();
        assert!((second - 100.0 / 19.0).abs() < 1e-9);
    }
}
