use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use strum::{Display, EnumString};

use crate::error::{ForesightError, Result};

/// Metric a forecaster is trained to predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetMetric {
    Revenue,
    Profit,
}

/// One day of business activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub date: NaiveDate,
    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
    pub region: String,
    pub product_category: String,
    pub units_sold: f64,
    pub customer_satisfaction: f64,
}

impl TimeSeriesRecord {
    /// Value of the given target metric
    pub fn value(&self, metric: TargetMetric) -> f64 {
        match metric {
            TargetMetric::Revenue => self.revenue,
            TargetMetric::Profit => self.profit,
        }
    }
}

/// Extract the target column of a history.
pub fn target_series(records: &[TimeSeriesRecord], metric: TargetMetric) -> Vec<f64> {
    records.iter().map(|r| r.value(metric)).collect()
}

/// Reject histories that are not strictly ascending by date or carry
/// non-finite financial values.
pub fn validate_history(records: &[TimeSeriesRecord]) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        if !(record.revenue.is_finite() && record.costs.is_finite() && record.profit.is_finite()) {
            return Err(ForesightError::InvalidHistory {
                index,
                reason: "non-finite revenue, costs or profit".to_string(),
            });
        }
        if index == 0 {
            continue;
        }
        let prev = records[index - 1].date;
        if record.date == prev {
            return Err(ForesightError::InvalidHistory {
                index,
                reason: format!("duplicate date {}", record.date),
            });
        }
        if record.date < prev {
            return Err(ForesightError::InvalidHistory {
                index,
                reason: format!("date {} precedes {}", record.date, prev),
            });
        }
    }
    Ok(())
}

/// Fingerprint of the part of a history a model depends on: record count,
/// dates and target values.
pub fn history_fingerprint(records: &[TimeSeriesRecord], metric: TargetMetric) -> u64 {
    let mut hasher = DefaultHasher::new();
    records.len().hash(&mut hasher);
    metric.hash(&mut hasher);
    for record in records {
        record.date.num_days_from_ce().hash(&mut hasher);
        record.value(metric).to_bits().hash(&mut hasher);
    }
    hasher.finish()
}
