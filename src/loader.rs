use std::{
    fs::File,
    io::{BufReader, Read},
    path::PathBuf,
};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use eyre::{bail, ensure, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Column, Price, RawPriceRecord};

/// Cell contents read as an empty value, as pandas does by default.
const MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub trait PriceDataLoader {
    fn load(&self) -> eyre::Result<Vec<RawPriceRecord>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    delimiter: u8,
    date_format: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            date_format: "%Y-%m-%d".to_owned(),
        }
    }
}

impl LoaderConfig {
    pub fn with_delimiter(mut self, value: u8) -> Self {
        self.delimiter = value;
        self
    }

    pub fn with_date_format(mut self, value: impl Into<String>) -> Self {
        self.date_format = value.into();
        self
    }
}

/// Reads a `Date, Open, High, Low, Close, Volume` file.
pub struct CsvPriceLoader {
    path: PathBuf,
    config: LoaderConfig,
}

impl CsvPriceLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: LoaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }
}

impl PriceDataLoader for CsvPriceLoader {
    fn load(&self) -> eyre::Result<Vec<RawPriceRecord>> {
        info!(path = %self.path.display(), "loading price history");

        let file = File::open(&self.path)
            .wrap_err_with(|| format!("failed to open {}", self.path.display()))?;
        let records = read_records(BufReader::new(file), &self.config)
            .wrap_err_with(|| format!("failed to read {}", self.path.display()))?;

        info!(rows = records.len(), "loaded price history");

        Ok(records)
    }
}

/// Parses rows in file order. Header names are matched case-insensitively and
/// extra columns are ignored.
pub fn read_records(reader: impl Read, config: &LoaderConfig) -> eyre::Result<Vec<RawPriceRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(config.delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let positions = ColumnPositions::from_headers(reader.headers()?)?;
    let mut records = Vec::new();

    for (ix, row) in reader.records().enumerate() {
        // header is line 1
        let line = ix + 2;
        let row = row?;

        records.push(
            positions
                .parse(&row, &config.date_format)
                .wrap_err_with(|| format!("line {line}"))?,
        );
    }

    Ok(records)
}

struct ColumnPositions([usize; 6]);

impl ColumnPositions {
    fn from_headers(headers: &StringRecord) -> eyre::Result<Self> {
        let mut positions = [0; 6];

        for (slot, column) in positions.iter_mut().zip(Column::ALL) {
            let name = column.to_string();
            match headers.iter().position(|h| h.eq_ignore_ascii_case(&name)) {
                Some(position) => *slot = position,
                None => bail!("missing required column `{name}`"),
            }
        }

        Ok(Self(positions))
    }

    fn cell<'a>(&self, row: &'a StringRecord, column: Column) -> Option<&'a str> {
        row.get(self.0[column as usize])
            .filter(|s| !MISSING_MARKERS.contains(s))
    }

    fn price(&self, row: &StringRecord, column: Column) -> eyre::Result<Option<Price>> {
        self.cell(row, column)
            .map(|s| -> eyre::Result<Price> {
                let price = s
                    .parse::<Price>()
                    .wrap_err_with(|| format!("{column}: invalid number `{s}`"))?;
                ensure!(price.is_finite(), "{column}: non-finite number `{s}`");
                Ok(price)
            })
            .transpose()
    }

    fn parse(&self, row: &StringRecord, date_format: &str) -> eyre::Result<RawPriceRecord> {
        let date = self
            .cell(row, Column::Date)
            .map(|s| {
                NaiveDate::parse_from_str(s, date_format)
                    .wrap_err_with(|| format!("Date: `{s}` does not match `{date_format}`"))
            })
            .transpose()?;

        // volumes are sometimes exported as floats
        let volume = self
            .cell(row, Column::Volume)
            .map(|s| -> eyre::Result<u64> {
                let volume = s
                    .parse::<f64>()
                    .wrap_err_with(|| format!("Volume: invalid number `{s}`"))?;
                ensure!(
                    volume.is_finite() && volume >= 0.0 && volume < u64::MAX as f64,
                    "Volume: invalid number `{s}`"
                );
                Ok(volume as u64)
            })
            .transpose()?;

        Ok(RawPriceRecord {
            date,
            open: self.price(row, Column::Open)?,
            high: self.price(row, Column::High)?,
            low: self.price(row, Column::Low)?,
            close: self.price(row, Column::Close)?,
            volume,
        })
    }
}
