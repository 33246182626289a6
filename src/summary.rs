use std::fmt;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    model::{Column, DerivedRecord, Price, RawPriceRecord, Trend},
    pipeline::TimeSeriesMetricsPipeline,
    stats,
    trend::{trend_segments, TrendSegment},
};

/// Empty cells per column, counted before forward fill.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingValues {
    pub date: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: usize,
}

impl MissingValues {
    pub fn count(records: &[RawPriceRecord]) -> Self {
        let mut missing = Self::default();
        for record in records {
            for column in Column::ALL {
                if record.is_missing(column) {
                    *missing.get_mut(column) += 1;
                }
            }
        }
        missing
    }

    pub fn get(&self, column: Column) -> usize {
        match column {
            Column::Date => self.date,
            Column::Open => self.open,
            Column::High => self.high,
            Column::Low => self.low,
            Column::Close => self.close,
            Column::Volume => self.volume,
        }
    }

    fn get_mut(&mut self, column: Column) -> &mut usize {
        match column {
            Column::Date => &mut self.date,
            Column::Open => &mut self.open,
            Column::High => &mut self.high,
            Column::Low => &mut self.low,
            Column::Close => &mut self.close,
            Column::Volume => &mut self.volume,
        }
    }

    pub fn total(&self) -> usize {
        Column::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub missing: MissingValues,
    pub average_return_pct: Option<f64>,
    pub median_return_pct: Option<f64>,
    /// Records whose return could not be computed.
    pub invalid_returns: usize,
    pub close_std: Option<Price>,
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
}

impl Summary {
    pub fn new(missing: MissingValues, records: &[DerivedRecord]) -> Self {
        let returns = records
            .iter()
            .filter_map(|r| r.daily_return_pct)
            .collect_vec();
        let closes = records.iter().map(|r| r.close()).collect_vec();
        let trends = records.iter().map(|r| r.trend).counts();
        let trend_count = |trend: Trend| trends.get(&trend).copied().unwrap_or_default();

        Self {
            rows: records.len(),
            first_date: records.first().map(|r| r.date()),
            last_date: records.last().map(|r| r.date()),
            missing,
            average_return_pct: stats::mean(&returns),
            median_return_pct: stats::median(&returns),
            invalid_returns: records.len() - returns.len(),
            close_std: stats::sample_std(&closes),
            bullish: trend_count(Trend::Bullish),
            bearish: trend_count(Trend::Bearish),
            neutral: trend_count(Trend::Neutral),
        }
    }
}

fn fmt_value(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "n/a".to_owned(), |v| format!("{v:.2}{suffix}"))
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => writeln!(f, "Rows: {} ({first} to {last})", self.rows)?,
            _ => writeln!(f, "Rows: {}", self.rows)?,
        }

        writeln!(f, "Missing values in each column:")?;
        for column in Column::ALL {
            writeln!(f, "  {column:<8}{}", self.missing.get(column))?;
        }

        writeln!(
            f,
            "Average Daily Return: {}",
            fmt_value(self.average_return_pct, "%")
        )?;
        writeln!(
            f,
            "Median Daily Return: {}",
            fmt_value(self.median_return_pct, "%")
        )?;
        if self.invalid_returns > 0 {
            writeln!(f, "Invalid Daily Returns: {}", self.invalid_returns)?;
        }
        writeln!(
            f,
            "Standard Deviation of Closing Price: {}",
            fmt_value(self.close_std, "")
        )?;
        write!(
            f,
            "Trend: {} bullish, {} bearish, {} neutral",
            self.bullish, self.bearish, self.neutral
        )
    }
}

/// Derived records plus their summary, ready for printing or rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: Summary,
    pub records: Vec<DerivedRecord>,
}

impl Analysis {
    pub fn from_raw(
        pipeline: &TimeSeriesMetricsPipeline,
        raw: &[RawPriceRecord],
    ) -> eyre::Result<Self> {
        let missing = MissingValues::count(raw);
        if missing.total() > 0 {
            warn!(?missing, "input has empty cells, forward filling");
        }

        let records = pipeline.run(raw)?;

        Ok(Self {
            summary: Summary::new(missing, &records),
            records,
        })
    }

    /// First `n` records.
    pub fn head(&self, n: usize) -> &[DerivedRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Last `n` records, e.g. the window for a candlestick chart.
    pub fn tail(&self, n: usize) -> &[DerivedRecord] {
        &self.records[self.records.len().saturating_sub(n)..]
    }

    pub fn trend_segments(&self) -> Vec<TrendSegment> {
        trend_segments(&self.records)
    }

    pub fn to_json(&self) -> eyre::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
