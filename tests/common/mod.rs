#![allow(dead_code)]

use business_foresight::domain::TimeSeriesRecord;
use chrono::{Duration, NaiveDate};

/// Daily history with a weekly cycle on top of a slow upward trend.
pub fn weekly_history(days: usize) -> Vec<TimeSeriesRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..days)
        .map(|i| {
            let weekly = [0.0, 40.0, 55.0, 60.0, 70.0, 120.0, -30.0][i % 7];
            let revenue = 1_000.0 + 2.5 * i as f64 + weekly;
            let costs = 650.0 + 1.0 * i as f64;
            TimeSeriesRecord {
                date: start + Duration::days(i as i64),
                revenue,
                costs,
                profit: revenue - costs,
                region: ["North", "South", "East"][i % 3].to_string(),
                product_category: "Retail".to_string(),
                units_sold: revenue / 25.0,
                customer_satisfaction: 4.2,
            }
        })
        .collect()
}

pub fn constant_history(days: usize, revenue: f64) -> Vec<TimeSeriesRecord> {
    let mut records = weekly_history(days);
    for r in &mut records {
        r.revenue = revenue;
        r.costs = revenue * 0.5;
        r.profit = revenue * 0.5;
    }
    records
}
