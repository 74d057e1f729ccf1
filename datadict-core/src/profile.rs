//! Data quality profiling over bounded table samples.
//!
//! Statistics are computed per column from the JSON rows of a
//! [`TableSample`]: completeness, uniqueness, and distinct count always;
//! a numeric distribution for numeric-typed columns; a freshness signal
//! for time-like columns; top-N value counts for everything else. The
//! profile is computed from a bounded sample, not the full table, and
//! makes no claim of full statistical rigor.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use crate::models::{
    ColumnDescriptor, ColumnStats, Freshness, NumericSummary, QualityProfile, TableDescriptor,
    TableSample, TopValue,
};

/// Row cap applied to every sample query.
pub const SAMPLE_ROW_CAP: u32 = 1000;

/// How many frequent values are recorded for categorical columns.
const TOP_VALUE_COUNT: usize = 5;

/// Normalized type names treated as numeric.
const NUMERIC_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "bigint",
    "int",
    "int2",
    "int4",
    "int8",
    "tinyint",
    "mediumint",
    "decimal",
    "numeric",
    "real",
    "double precision",
    "double",
    "float",
    "float4",
    "float8",
    "serial",
    "bigserial",
    "money",
];

fn is_numeric_type(data_type: &str) -> bool {
    // Strip precision suffixes like "numeric(10,2)"
    let base = data_type.split('(').next().unwrap_or(data_type).trim();
    NUMERIC_TYPES.contains(&base)
}

fn is_time_like(column: &ColumnDescriptor) -> bool {
    let type_lower = column.data_type.to_lowercase();
    if type_lower.contains("date") || type_lower.contains("time") {
        return true;
    }
    let name_lower = column.name.to_lowercase();
    name_lower.contains("date") || name_lower.contains("time") || name_lower.contains("created")
}

/// Computes the per-column quality profile for one sampled table.
///
/// A sample with zero rows yields the empty-table sentinel rather than
/// per-column statistics.
pub fn profile_sample(table: &TableDescriptor, sample: &TableSample) -> QualityProfile {
    if sample.rows.is_empty() {
        return QualityProfile::empty_table();
    }

    let total = sample.rows.len();
    let mut columns = BTreeMap::new();

    for column in &table.columns {
        let values: Vec<&JsonValue> = sample
            .rows
            .iter()
            .map(|row| row.get(&column.name).unwrap_or(&JsonValue::Null))
            .collect();

        columns.insert(column.name.clone(), profile_column(column, &values, total));
    }

    QualityProfile::from_columns(columns)
}

fn profile_column(column: &ColumnDescriptor, values: &[&JsonValue], total: usize) -> ColumnStats {
    let non_null: Vec<&JsonValue> = values.iter().copied().filter(|v| !v.is_null()).collect();
    let null_count = total - non_null.len();

    let distinct: HashSet<String> = non_null.iter().map(|v| canonical(v)).collect();
    let distinct_count = distinct.len() as u64;

    let completeness = (1.0 - null_count as f64 / total as f64).clamp(0.0, 1.0);
    let uniqueness = (distinct_count as f64 / total as f64).clamp(0.0, 1.0);

    let mut stats = ColumnStats {
        completeness,
        uniqueness,
        distinct_count,
        data_type: column.data_type.clone(),
        numeric: None,
        freshness: None,
        top_values: None,
    };

    if is_numeric_type(&column.data_type) {
        stats.numeric = Some(numeric_summary(&non_null));
    } else if is_time_like(column) {
        // Coercion failures silently omit the freshness block
        stats.freshness = freshness(&non_null);
    } else {
        stats.top_values = Some(top_values(&non_null));
    }

    stats
}

fn numeric_values(values: &[&JsonValue]) -> Vec<f64> {
    values.iter().filter_map(|v| v.as_f64()).collect()
}

/// Distribution summary over the non-null numeric values of a column.
///
/// Statistics undefined on the input (empty window, single-row standard
/// deviation) are recorded as absent.
fn numeric_summary(values: &[&JsonValue]) -> NumericSummary {
    let mut numbers = numeric_values(values);
    if numbers.is_empty() {
        return NumericSummary::default();
    }
    numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = numbers.len();
    let mean = numbers.iter().sum::<f64>() / n as f64;

    // Sample standard deviation; undefined for a single value
    let std_dev = if n > 1 {
        let variance =
            numbers.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
        Some(variance.sqrt())
    } else {
        None
    };

    NumericSummary {
        mean: Some(mean),
        std_dev,
        min: numbers.first().copied(),
        p25: percentile(&numbers, 0.25),
        p50: percentile(&numbers, 0.50),
        p75: percentile(&numbers, 0.75),
        max: numbers.last().copied(),
    }
}

/// Linearly interpolated percentile over a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let weight = rank - lo as f64;
    Some(sorted[lo] * (1.0 - weight) + sorted[hi] * weight)
}

/// Attempts timestamp coercion of a sampled value.
fn coerce_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}

fn freshness(values: &[&JsonValue]) -> Option<Freshness> {
    let timestamps: Vec<DateTime<Utc>> = values.iter().filter_map(|v| coerce_timestamp(v)).collect();
    let max = timestamps.iter().max().copied()?;
    let min = timestamps.iter().min().copied()?;

    Some(Freshness {
        max_timestamp: max,
        min_timestamp: min,
        days_since_max: (Utc::now() - max).num_days(),
    })
}

/// The most frequent values with their occurrence counts, highest first.
///
/// Ties break on the value text so the result is deterministic.
fn top_values(values: &[&JsonValue]) -> Vec<TopValue> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for value in values {
        *counts.entry(display(value)).or_insert(0) += 1;
    }

    let mut ranked: Vec<TopValue> = counts
        .into_iter()
        .map(|(value, count)| TopValue { value, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    ranked.truncate(TOP_VALUE_COUNT);
    ranked
}

/// Canonical form used for distinct counting.
fn canonical(value: &JsonValue) -> String {
    value.to_string()
}

/// Display form used for top-value reporting (strings unquoted).
fn display(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ForeignKeyDescriptor;
    use serde_json::json;

    fn descriptor(columns: &[(&str, &str)]) -> TableDescriptor {
        TableDescriptor {
            schema_name: "public".to_string(),
            table_name: "users".to_string(),
            columns: columns
                .iter()
                .map(|(name, data_type)| ColumnDescriptor {
                    name: (*name).to_string(),
                    data_type: (*data_type).to_string(),
                    tags: Default::default(),
                })
                .collect(),
            foreign_keys: Vec::<ForeignKeyDescriptor>::new(),
        }
    }

    fn sample(rows: Vec<serde_json::Value>) -> TableSample {
        TableSample {
            schema_name: "public".to_string(),
            table_name: "users".to_string(),
            sample_size: rows.len() as u32,
            rows,
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_sample_yields_sentinel() {
        let table = descriptor(&[("id", "integer")]);
        let profile = profile_sample(&table, &sample(vec![]));

        assert!(profile.empty_table);
        assert!(profile.columns.is_empty());
    }

    #[test]
    fn test_completeness_and_uniqueness_ranges() {
        let table = descriptor(&[("id", "integer"), ("status", "text")]);
        let rows = vec![
            json!({"id": 1, "status": "active"}),
            json!({"id": 2, "status": null}),
            json!({"id": 3, "status": "active"}),
            json!({"id": 4, "status": "inactive"}),
        ];
        let profile = profile_sample(&table, &sample(rows));

        for stats in profile.columns.values() {
            assert!((0.0..=1.0).contains(&stats.completeness));
            assert!((0.0..=1.0).contains(&stats.uniqueness));
        }

        let status = &profile.columns["status"];
        assert!((status.completeness - 0.75).abs() < 1e-9);
        assert_eq!(status.distinct_count, 2);
        assert!((status.uniqueness - 0.5).abs() < 1e-9);

        let id = &profile.columns["id"];
        assert!((id.completeness - 1.0).abs() < 1e-9);
        assert!((id.uniqueness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_keys_count_as_null() {
        let table = descriptor(&[("email", "text")]);
        let rows = vec![json!({"email": "a@example.com"}), json!({})];
        let profile = profile_sample(&table, &sample(rows));

        assert!((profile.columns["email"].completeness - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_distribution() {
        let table = descriptor(&[("amount", "numeric")]);
        let rows = (1..=5).map(|v| json!({"amount": v})).collect();
        let profile = profile_sample(&table, &sample(rows));

        let numeric = profile.columns["amount"].numeric.as_ref().unwrap();
        assert_eq!(numeric.mean, Some(3.0));
        assert_eq!(numeric.min, Some(1.0));
        assert_eq!(numeric.max, Some(5.0));
        assert_eq!(numeric.p25, Some(2.0));
        assert_eq!(numeric.p50, Some(3.0));
        assert_eq!(numeric.p75, Some(4.0));
        // Sample standard deviation of 1..5 is sqrt(2.5)
        assert!((numeric.std_dev.unwrap() - 2.5_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.5), Some(2.5));
        assert_eq!(percentile(&sorted, 0.25), Some(1.75));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_all_null_numeric_column_records_absent_stats() {
        let table = descriptor(&[("amount", "double")]);
        let rows = vec![json!({"amount": null}), json!({"amount": null})];
        let profile = profile_sample(&table, &sample(rows));

        let stats = &profile.columns["amount"];
        assert_eq!(stats.completeness, 0.0);
        let numeric = stats.numeric.as_ref().unwrap();
        assert_eq!(*numeric, NumericSummary::default());
    }

    #[test]
    fn test_numeric_type_detection() {
        assert!(is_numeric_type("integer"));
        assert!(is_numeric_type("double precision"));
        assert!(is_numeric_type("numeric(10,2)"));
        assert!(!is_numeric_type("text"));
        // "interval" must not be mistaken for an int type
        assert!(!is_numeric_type("interval"));
    }

    #[test]
    fn test_freshness_for_time_like_column() {
        let table = descriptor(&[("created_at", "timestamp without time zone")]);
        let rows = vec![
            json!({"created_at": "2024-01-01 10:00:00"}),
            json!({"created_at": "2024-06-15 08:30:00"}),
            json!({"created_at": null}),
        ];
        let profile = profile_sample(&table, &sample(rows));

        let freshness = profile.columns["created_at"].freshness.as_ref().unwrap();
        assert_eq!(
            freshness.max_timestamp,
            NaiveDate::from_ymd_opt(2024, 6, 15)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap()
                .and_utc()
        );
        assert!(freshness.min_timestamp < freshness.max_timestamp);
        assert!(freshness.days_since_max >= 0);
    }

    #[test]
    fn test_time_like_by_name_with_uncoercible_values_omits_freshness() {
        let table = descriptor(&[("created_label", "text")]);
        let rows = vec![
            json!({"created_label": "last week"}),
            json!({"created_label": "yesterday"}),
        ];
        let profile = profile_sample(&table, &sample(rows));

        let stats = &profile.columns["created_label"];
        assert!(stats.freshness.is_none());
        // Time-like columns do not fall through to top values
        assert!(stats.top_values.is_none());
    }

    #[test]
    fn test_top_values_for_categorical_column() {
        let table = descriptor(&[("status", "text")]);
        let rows = vec![
            json!({"status": "active"}),
            json!({"status": "active"}),
            json!({"status": "inactive"}),
            json!({"status": "pending"}),
            json!({"status": "active"}),
            json!({"status": null}),
        ];
        let profile = profile_sample(&table, &sample(rows));

        let top = profile.columns["status"].top_values.as_ref().unwrap();
        assert_eq!(top[0].value, "active");
        assert_eq!(top[0].count, 3);
        assert_eq!(top.len(), 3);
    }

    #[test]
    fn test_top_values_are_capped_at_five() {
        let table = descriptor(&[("code", "text")]);
        let rows = (0..8).map(|v| json!({"code": format!("c{}", v)})).collect();
        let profile = profile_sample(&table, &sample(rows));

        let top = profile.columns["code"].top_values.as_ref().unwrap();
        assert_eq!(top.len(), 5);
    }

    #[test]
    fn test_timestamp_coercion_formats() {
        assert!(coerce_timestamp(&json!("2024-03-04T10:00:00Z")).is_some());
        assert!(coerce_timestamp(&json!("2024-03-04 10:00:00")).is_some());
        assert!(coerce_timestamp(&json!("2024-03-04")).is_some());
        assert!(coerce_timestamp(&json!("not a date")).is_none());
        assert!(coerce_timestamp(&json!(42)).is_none());
    }
}
