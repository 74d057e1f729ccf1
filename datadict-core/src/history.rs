//! Metric history snapshots and quality alerts.
//!
//! Before a table's stored metrics are overwritten, the prior profile is
//! captured as an immutable [`MetricHistory`] record. The fresh profile is
//! then evaluated against quality thresholds; each violating column raises
//! one [`Alert`]. Alerts are not de-duplicated across runs: every run that
//! still violates a threshold raises a new alert, and suppression belongs
//! to consumers of the alert stream.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Alert, AlertKind, AlertSeverity, MetricHistory, QualityProfile, TableMetadata};

/// Columns below this completeness fraction raise an alert.
pub const COMPLETENESS_THRESHOLD: f64 = 0.8;

/// Outcome of reconciling a fresh profile against prior state.
#[derive(Debug)]
pub struct Reconciliation {
    /// Snapshot of the previous profile, present only when a prior record
    /// existed (a first-ever extraction creates no history)
    pub history: Option<MetricHistory>,
    /// Alerts raised by the fresh profile
    pub alerts: Vec<Alert>,
}

/// Reconciles a freshly sanitized profile against the previous metadata.
///
/// `table_metadata_id` is the id the upserted record will carry; history
/// and alerts both reference it.
pub fn reconcile(
    previous: Option<&TableMetadata>,
    fresh: &QualityProfile,
    table_metadata_id: Uuid,
    qualified_table: &str,
) -> Reconciliation {
    let history = previous.map(|prior| MetricHistory {
        id: Uuid::new_v4(),
        table_metadata_id,
        quality: prior.quality.clone(),
        captured_at: Utc::now(),
    });

    let alerts = evaluate_completeness(fresh, table_metadata_id, qualified_table);

    Reconciliation { history, alerts }
}

/// Raises one completeness alert per column below the threshold.
fn evaluate_completeness(
    profile: &QualityProfile,
    table_metadata_id: Uuid,
    qualified_table: &str,
) -> Vec<Alert> {
    profile
        .columns
        .iter()
        .filter(|(_, stats)| stats.completeness < COMPLETENESS_THRESHOLD)
        .map(|(column, stats)| {
            let message = format!(
                "Column '{}' in table '{}' has completeness {:.1}% (threshold {:.0}%)",
                column,
                qualified_table,
                stats.completeness * 100.0,
                COMPLETENESS_THRESHOLD * 100.0
            );
            tracing::warn!("Quality violation: {}", message);
            Alert::new(
                table_metadata_id,
                AlertKind::Completeness,
                AlertSeverity::Medium,
                message,
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ColumnStats;
    use std::collections::BTreeMap;

    fn stats(completeness: f64) -> ColumnStats {
        ColumnStats {
            completeness,
            uniqueness: 1.0,
            distinct_count: 1,
            data_type: "text".to_string(),
            numeric: None,
            freshness: None,
            top_values: None,
        }
    }

    fn profile(columns: &[(&str, f64)]) -> QualityProfile {
        QualityProfile::from_columns(
            columns
                .iter()
                .map(|(name, c)| ((*name).to_string(), stats(*c)))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn metadata_with(profile: QualityProfile) -> TableMetadata {
        TableMetadata {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            schema_name: "public".to_string(),
            table_name: "users".to_string(),
            columns: Vec::new(),
            relationships: Vec::new(),
            summary: String::new(),
            quality: profile,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_low_completeness_raises_exactly_one_alert() {
        let fresh = profile(&[("email", 0.75), ("id", 1.0)]);
        let id = Uuid::new_v4();

        let outcome = reconcile(None, &fresh, id, "public.users");

        assert_eq!(outcome.alerts.len(), 1);
        let alert = &outcome.alerts[0];
        assert_eq!(alert.kind, AlertKind::Completeness);
        assert_eq!(alert.severity, AlertSeverity::Medium);
        assert_eq!(alert.table_metadata_id, id);
        assert!(alert.message.contains("email"));
        assert!(alert.message.contains("public.users"));
        assert!(alert.message.contains("75.0%"));
        assert!(!alert.resolved);
    }

    #[test]
    fn test_threshold_boundary_is_exclusive() {
        // Exactly at the threshold is not a violation
        let fresh = profile(&[("email", 0.8)]);
        let outcome = reconcile(None, &fresh, Uuid::new_v4(), "public.users");
        assert!(outcome.alerts.is_empty());

        let fresh = profile(&[("email", 0.799)]);
        let outcome = reconcile(None, &fresh, Uuid::new_v4(), "public.users");
        assert_eq!(outcome.alerts.len(), 1);
    }

    #[test]
    fn test_first_extraction_creates_no_history() {
        let fresh = profile(&[("id", 1.0)]);
        let outcome = reconcile(None, &fresh, Uuid::new_v4(), "public.users");
        assert!(outcome.history.is_none());
    }

    #[test]
    fn test_prior_record_snapshots_old_metrics() {
        let old = profile(&[("email", 0.9)]);
        let previous = metadata_with(old.clone());
        let fresh = profile(&[("email", 0.5)]);
        let id = previous.id;

        let outcome = reconcile(Some(&previous), &fresh, id, "public.users");

        let history = outcome.history.unwrap();
        assert_eq!(history.table_metadata_id, id);
        // The snapshot holds the *old* metrics, not the fresh ones
        assert_eq!(history.quality, old);
    }

    #[test]
    fn test_empty_table_profile_raises_no_alerts() {
        let fresh = QualityProfile::empty_table();
        let outcome = reconcile(None, &fresh, Uuid::new_v4(), "public.empty");
        assert!(outcome.alerts.is_empty());
    }

    #[test]
    fn test_multiple_violations_raise_multiple_alerts() {
        let fresh = profile(&[("a", 0.1), ("b", 0.2), ("c", 0.95)]);
        let outcome = reconcile(None, &fresh, Uuid::new_v4(), "public.t");
        assert_eq!(outcome.alerts.len(), 2);
    }
}
