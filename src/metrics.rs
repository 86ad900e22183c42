//! Filter and aggregation pipeline behind the dashboard KPIs and charts.
//!
//! Everything here is a pure function of the loaded records and a selection. Missing or
//! unparsable values are left out of sums and means rather than counted as zero.

use crate::models::{FilterSelection, RideRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grouping key for successful rides that carry no payment method.
pub const UNSPECIFIED_PAYMENT: &str = "(unspecified)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_rides: usize,
    pub completed_rides: usize,
    pub total_revenue: f64,
    /// Two-decimal mean; `None` when no ride in the selection has a distance.
    pub avg_ride_distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub rides: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: String,
    pub rides: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRevenue {
    pub payment_method: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingComparison {
    pub customer: Option<f64>,
    pub driver: Option<f64>,
}

impl RatingComparison {
    /// Chart rows in display order.
    pub fn series(&self) -> [(&'static str, Option<f64>); 2] {
        [("Customer Rating", self.customer), ("Driver Rating", self.driver)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub kpis: Kpis,
    pub ride_volume: Vec<DailyVolume>,
    pub status_breakdown: Vec<StatusCount>,
    pub revenue_by_payment: Vec<PaymentRevenue>,
    pub ratings: RatingComparison,
}

pub fn filter_records<'a>(records: &'a [RideRecord], selection: &FilterSelection) -> Vec<&'a RideRecord> {
    records.iter().filter(|record| selection.matches(record)).collect()
}

pub fn compute(records: &[RideRecord], selection: &FilterSelection, success_status: &str) -> DashboardMetrics {
    let filtered = filter_records(records, selection);
    DashboardMetrics {
        kpis: kpis(&filtered, success_status),
        ride_volume: ride_volume(&filtered),
        status_breakdown: status_breakdown(&filtered),
        revenue_by_payment: revenue_by_payment(&filtered, success_status),
        ratings: RatingComparison {
            customer: mean(filtered.iter().map(|record| record.customer_rating)),
            driver: mean(filtered.iter().map(|record| record.driver_rating)),
        },
    }
}

pub fn kpis(filtered: &[&RideRecord], success_status: &str) -> Kpis {
    let completed = filtered
        .iter()
        .filter(|record| is_success(record, success_status))
        .collect::<Vec<_>>();

    Kpis {
        total_rides: filtered.len(),
        completed_rides: completed.len(),
        total_revenue: completed.iter().filter_map(|record| record.booking_value).sum(),
        avg_ride_distance: mean(filtered.iter().map(|record| record.ride_distance)).map(round2),
    }
}

pub fn ride_volume(filtered: &[&RideRecord]) -> Vec<DailyVolume> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in filtered.iter().filter_map(|record| record.date) {
        *per_day.entry(date.date()).or_insert(0) += 1;
    }

    per_day
        .into_iter()
        .map(|(date, rides)| DailyVolume { date, rides })
        .collect()
}

/// Counts per status, largest first; ties keep first-seen order.
pub fn status_breakdown(filtered: &[&RideRecord]) -> Vec<StatusCount> {
    let mut counts: Vec<StatusCount> = Vec::new();
    for status in filtered.iter().filter_map(|record| record.booking_status.as_deref()) {
        match counts.iter_mut().find(|entry| entry.status == status) {
            Some(entry) => entry.rides += 1,
            None => counts.push(StatusCount {
                status: status.to_string(),
                rides: 1,
            }),
        }
    }

    counts.sort_by(|left, right| right.rides.cmp(&left.rides));
    counts
}

pub fn revenue_by_payment(filtered: &[&RideRecord], success_status: &str) -> Vec<PaymentRevenue> {
    let mut per_method: BTreeMap<&str, f64> = BTreeMap::new();
    for record in filtered.iter().filter(|record| is_success(record, success_status)) {
        let Some(value) = record.booking_value else {
            continue;
        };
        let method = record.payment_method.as_deref().unwrap_or(UNSPECIFIED_PAYMENT);
        *per_method.entry(method).or_insert(0.0) += value;
    }

    per_method
        .into_iter()
        .map(|(method, revenue)| PaymentRevenue {
            payment_method: method.to_string(),
            revenue,
        })
        .collect()
}

pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .fold((0.0_f64, 0usize), |(sum, count), value| (sum + value, count + 1));

    (count > 0).then(|| sum / count as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Whole currency units with thousands separators, e.g. `₹ 12,345`. Halves round to even.
pub fn format_revenue(symbol: &str, amount: f64) -> String {
    let rounded = amount.round_ties_even();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if negative {
        format!("{} -{}", symbol, grouped)
    } else {
        format!("{} {}", symbol, grouped)
    }
}

pub fn format_optional(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_else(|| "NaN".to_string())
}

fn is_success(record: &RideRecord, success_status: &str) -> bool {
    record.booking_status.as_deref() == Some(success_status)
}
