//! Daily price history metrics: forward-filled OHLCV records, daily returns,
//! trailing moving averages and volatility, and a moving-average trend label.
//!
//! ```no_run
//! use stock_metrics::{analyze_csv, LoaderConfig, PipelineConfig};
//!
//! let analysis = analyze_csv("infy_stock.csv", LoaderConfig::default(), PipelineConfig::default())?;
//! println!("{}", analysis.summary);
//! # Ok::<(), eyre::Report>(())
//! ```

pub mod indicators;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod stats;
pub mod summary;
pub mod trend;

use std::path::Path;

pub use loader::{CsvPriceLoader, LoaderConfig, PriceDataLoader};
pub use model::{Column, DerivedRecord, Price, PriceRecord, RawPriceRecord, Trend};
pub use pipeline::{PipelineConfig, TimeSeriesMetricsPipeline};
pub use summary::{Analysis, MissingValues, Summary};
pub use trend::TrendSegment;

/// Loads one file and runs it through the pipeline.
pub fn analyze_csv(
    path: impl AsRef<Path>,
    loader: LoaderConfig,
    pipeline: PipelineConfig,
) -> eyre::Result<Analysis> {
    let pipeline = TimeSeriesMetricsPipeline::new(pipeline)?;
    let raw = CsvPriceLoader::new(path.as_ref())
        .with_config(loader)
        .load()?;

    Analysis::from_raw(&pipeline, &raw)
}
