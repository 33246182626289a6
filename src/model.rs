use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};

pub type Price = f64;

/// Input columns, in file order.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Date,
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
    ];
}

/// One row as read from the file. `None` marks an empty cell.
#[derive(Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRecord {
    pub date: Option<NaiveDate>,
    pub open: Option<Price>,
    pub high: Option<Price>,
    pub low: Option<Price>,
    pub close: Option<Price>,
    pub volume: Option<u64>,
}

impl RawPriceRecord {
    pub fn is_missing(&self, column: Column) -> bool {
        match column {
            Column::Date => self.date.is_none(),
            Column::Open => self.open.is_none(),
            Column::High => self.high.is_none(),
            Column::Low => self.low.is_none(),
            Column::Close => self.close.is_none(),
            Column::Volume => self.volume.is_none(),
        }
    }

    pub fn is_complete(&self) -> bool {
        Column::ALL.iter().all(|c| !self.is_missing(*c))
    }
}

impl From<PriceRecord> for RawPriceRecord {
    fn from(record: PriceRecord) -> Self {
        Self {
            date: Some(record.date),
            open: Some(record.open),
            high: Some(record.high),
            low: Some(record.low),
            close: Some(record.close),
            volume: Some(record.volume),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: u64,
}

#[derive(Default, Debug, Display, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

/// A price record with everything the pipeline derives for it.
///
/// Window-based fields stay `None` until the window is full. `daily_return_pct`
/// is `None` when the return is not a finite number (zero open).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    #[serde(flatten)]
    pub record: PriceRecord,
    pub daily_return_pct: Option<f64>,
    pub ma_50: Option<Price>,
    pub ma_200: Option<Price>,
    pub rolling_std_30: Option<Price>,
    pub trend: Trend,
}

impl DerivedRecord {
    pub fn date(&self) -> NaiveDate {
        self.record.date
    }

    pub fn close(&self) -> Price {
        self.record.close
    }
}
