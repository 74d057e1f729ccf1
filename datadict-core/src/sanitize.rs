//! Metric sanitization.
//!
//! Profiling arithmetic can produce NaN or infinite values (standard
//! deviation over a single row, mean of an empty window). These are not
//! representable in strict interchange formats, so every profile passes
//! through this module before persistence or serialization: non-finite
//! numeric leaves become absent, everything else passes through unchanged.
//! Sanitization is idempotent.

use serde_json::Value;

use crate::models::{ColumnStats, NumericSummary, QualityProfile};

/// Keeps a numeric leaf only if it is finite.
fn finite_or_none(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn sanitize_numeric(summary: NumericSummary) -> NumericSummary {
    NumericSummary {
        mean: finite_or_none(summary.mean),
        std_dev: finite_or_none(summary.std_dev),
        min: finite_or_none(summary.min),
        p25: finite_or_none(summary.p25),
        p50: finite_or_none(summary.p50),
        p75: finite_or_none(summary.p75),
        max: finite_or_none(summary.max),
    }
}

fn sanitize_stats(stats: ColumnStats) -> ColumnStats {
    ColumnStats {
        completeness: if stats.completeness.is_finite() {
            stats.completeness
        } else {
            0.0
        },
        uniqueness: if stats.uniqueness.is_finite() {
            stats.uniqueness
        } else {
            0.0
        },
        numeric: stats.numeric.map(sanitize_numeric),
        ..stats
    }
}

/// Normalizes every numeric leaf of a quality profile.
///
/// Non-finite distribution statistics become `None`; the ratio fields,
/// which must always be present, fall back to 0. Sanitizing an already
/// sanitized profile is a no-op.
pub fn sanitize_profile(profile: QualityProfile) -> QualityProfile {
    QualityProfile {
        empty_table: profile.empty_table,
        columns: profile
            .columns
            .into_iter()
            .map(|(name, stats)| (name, sanitize_stats(stats)))
            .collect(),
    }
}

/// Recursively sanitizes an arbitrary JSON tree.
///
/// Walks maps, sequences, and leaves; any numeric leaf that does not hold a
/// finite value becomes `null`. This guards the artifact boundary, where
/// payloads are assembled from mixed sources rather than the typed profile.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| (key, sanitize_json(inner)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Number(number) => {
            // Integers are always finite; only float leaves can be degenerate.
            match number.as_f64() {
                Some(float) if float.is_finite() => Value::Number(number),
                Some(_) => Value::Null,
                None => Value::Number(number),
            }
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn stats_with_numeric(numeric: NumericSummary) -> ColumnStats {
        ColumnStats {
            completeness: 1.0,
            uniqueness: 1.0,
            distinct_count: 3,
            data_type: "double".to_string(),
            numeric: Some(numeric),
            freshness: None,
            top_values: None,
        }
    }

    #[test]
    fn test_non_finite_leaves_become_absent() {
        let mut columns = BTreeMap::new();
        columns.insert(
            "amount".to_string(),
            stats_with_numeric(NumericSummary {
                mean: Some(f64::NAN),
                std_dev: Some(f64::INFINITY),
                min: Some(1.0),
                p25: Some(f64::NEG_INFINITY),
                p50: Some(2.0),
                p75: Some(3.0),
                max: Some(4.0),
            }),
        );

        let sanitized = sanitize_profile(QualityProfile::from_columns(columns));
        let numeric = sanitized.columns["amount"].numeric.as_ref().unwrap();

        assert_eq!(numeric.mean, None);
        assert_eq!(numeric.std_dev, None);
        assert_eq!(numeric.p25, None);
        assert_eq!(numeric.min, Some(1.0));
        assert_eq!(numeric.p50, Some(2.0));
        assert_eq!(numeric.max, Some(4.0));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let mut columns = BTreeMap::new();
        columns.insert(
            "amount".to_string(),
            stats_with_numeric(NumericSummary {
                mean: Some(f64::NAN),
                std_dev: Some(0.5),
                min: Some(0.0),
                p25: None,
                p50: Some(1.0),
                p75: None,
                max: Some(2.0),
            }),
        );
        let mut ratio_broken = stats_with_numeric(NumericSummary::default());
        ratio_broken.completeness = f64::NAN;
        columns.insert("status".to_string(), ratio_broken);

        let once = sanitize_profile(QualityProfile::from_columns(columns));
        let twice = sanitize_profile(once.clone());

        assert_eq!(once, twice);
        assert_eq!(once.columns["status"].completeness, 0.0);
    }

    #[test]
    fn test_empty_sentinel_passes_through() {
        let sanitized = sanitize_profile(QualityProfile::empty_table());
        assert!(sanitized.empty_table);
        assert!(sanitized.columns.is_empty());
    }

    #[test]
    fn test_sanitize_json_walks_nested_structures() {
        let payload = json!({
            "profile": {
                "amount": {"mean": 1.5, "values": [1, 2.5, null]},
            },
            "summary": "text",
            "count": 7,
        });

        let sanitized = sanitize_json(payload.clone());
        assert_eq!(sanitized, payload);
    }

    #[test]
    fn test_sanitize_json_is_idempotent() {
        let payload = json!([{"a": 1.0}, {"b": [true, "x", 2]}]);
        let once = sanitize_json(payload);
        let twice = sanitize_json(once.clone());
        assert_eq!(once, twice);
    }
}
