use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// One cell of an ad hoc result. Types are whatever the driver reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the cell. Unparsable text and non-finite reals are missing.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Integer(value) => *value as f64,
            Self::Real(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
            Self::Null | Self::Timestamp(_) | Self::Blob(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Categorical view of the cell. Nulls are missing, everything else is its display text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(text) => Some(text.clone()),
            other => Some(other.to_display_string()),
        }
    }

    /// Date-time view of the cell, coercing text the way a lenient date parser would.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(value) => Some(*value),
            Self::Text(text) => parse_datetime(text),
            _ => None,
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::Timestamp(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Result of executing arbitrary SQL text. Columns keep the engine's order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResultTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRecord {
    pub date: Option<NaiveDateTime>,
    pub booking_id: String,
    pub booking_status: Option<String>,
    pub vehicle_type: Option<String>,
    pub booking_value: Option<f64>,
    pub payment_method: Option<String>,
    pub ride_distance: Option<f64>,
    pub driver_rating: Option<f64>,
    pub customer_rating: Option<f64>,
}

/// Distinct observed values offered by the sidebar multiselects, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub vehicle_types: Vec<String>,
    pub booking_statuses: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[RideRecord]) -> Self {
        let vehicle_types: BTreeSet<&str> = records
            .iter()
            .filter_map(|record| record.vehicle_type.as_deref())
            .collect();
        let booking_statuses: BTreeSet<&str> = records
            .iter()
            .filter_map(|record| record.booking_status.as_deref())
            .collect();

        Self {
            vehicle_types: vehicle_types.into_iter().map(ToString::to_string).collect(),
            booking_statuses: booking_statuses.into_iter().map(ToString::to_string).collect(),
        }
    }
}

/// `None` on either axis means every record passes that axis, missing categories included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    pub vehicle_types: Option<BTreeSet<String>>,
    pub booking_statuses: Option<BTreeSet<String>>,
}

impl FilterSelection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a selection restricted to the observed options. Values that were never
    /// observed are dropped; a choice covering every observed value collapses to "all".
    pub fn restricted<V, S>(options: &FilterOptions, vehicle_types: Option<V>, booking_statuses: Option<S>) -> Self
    where
        V: IntoIterator<Item = String>,
        S: IntoIterator<Item = String>,
    {
        Self {
            vehicle_types: vehicle_types.and_then(|chosen| restrict_axis("vehicle_type", &options.vehicle_types, chosen)),
            booking_statuses: booking_statuses
                .and_then(|chosen| restrict_axis("booking_status", &options.booking_statuses, chosen)),
        }
    }

    pub fn matches(&self, record: &RideRecord) -> bool {
        axis_matches(self.vehicle_types.as_ref(), record.vehicle_type.as_deref())
            && axis_matches(self.booking_statuses.as_ref(), record.booking_status.as_deref())
    }
}

fn restrict_axis<I>(axis: &str, observed: &[String], chosen: I) -> Option<BTreeSet<String>>
where
    I: IntoIterator<Item = String>,
{
    let mut kept = BTreeSet::new();
    for value in chosen {
        if observed.iter().any(|candidate| candidate == &value) {
            kept.insert(value);
        } else {
            tracing::warn!(axis, value = %value, "dropping filter value not present in base table");
        }
    }

    if kept.len() == observed.len() {
        None
    } else {
        Some(kept)
    }
}

fn axis_matches(selected: Option<&BTreeSet<String>>, value: Option<&str>) -> bool {
    match selected {
        None => true,
        Some(set) => value.is_some_and(|value| set.contains(value)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub message: String,
}

impl ConnectionStatus {
    pub fn connected() -> Self {
        Self {
            connected: true,
            message: "Connected to database successfully".to_string(),
        }
    }

    pub fn failed(reason: &str) -> Self {
        Self {
            connected: false,
            message: format!("Database connection failed: {}", reason),
        }
    }
}
