use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{DerivedRecord, Price, Trend};

/// Short average above long is bullish, below is bearish. Anything with an
/// undefined side is neutral.
pub fn classify_trend(short: Option<Price>, long: Option<Price>) -> Trend {
    match (short, long) {
        (Some(s), Some(l)) if s > l => Trend::Bullish,
        (Some(s), Some(l)) if s < l => Trend::Bearish,
        _ => Trend::Neutral,
    }
}

/// A maximal run of consecutive records sharing one trend label.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSegment {
    pub trend: Trend,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub len: usize,
}

pub fn trend_segments(records: &[DerivedRecord]) -> Vec<TrendSegment> {
    let mut segments = Vec::new();
    let groups = records.iter().group_by(|r| r.trend);

    for (trend, group) in &groups {
        let group = group.collect_vec();
        if let (Some(first), Some(last)) = (group.first(), group.last()) {
            segments.push(TrendSegment {
                trend,
                start: first.date(),
                end: last.date(),
                len: group.len(),
            });
        }
    }

    segments
}
