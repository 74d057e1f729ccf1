//! Column sensitivity classification.
//!
//! Pattern-matches column names against a fixed five-category taxonomy.
//! Matching is case-insensitive and runs against names only, never against
//! sampled values. This is a best-effort heuristic: false negatives are
//! possible and no guarantee is made.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sensitivity category assigned to a column by name pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SensitivityTag {
    /// Person-name-like fields
    Pii,
    /// Email, phone, and other reachability fields
    Contact,
    /// Salary, card, and account fields
    Financial,
    /// Credentials, government identifiers, dates of birth
    Sensitive,
    /// Address and geo fields
    Location,
}

impl std::fmt::Display for SensitivityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensitivityTag::Pii => write!(f, "PII"),
            SensitivityTag::Contact => write!(f, "Contact"),
            SensitivityTag::Financial => write!(f, "Financial"),
            SensitivityTag::Sensitive => write!(f, "Sensitive"),
            SensitivityTag::Location => write!(f, "Location"),
        }
    }
}

/// Fixed taxonomy: one pattern per category, matched against column names.
static TAG_PATTERNS: LazyLock<Vec<(SensitivityTag, Regex)>> = LazyLock::new(|| {
    [
        (
            SensitivityTag::Pii,
            r"(?i)((first|last|middle|full|maiden|sur|nick)_?name|^name$)",
        ),
        (
            SensitivityTag::Contact,
            r"(?i)(e?mail|phone|mobile|telephone|fax)",
        ),
        (
            SensitivityTag::Financial,
            r"(?i)(salary|income|credit_?card|card_?number|iban|swift|account_?num|routing|balance|payment)",
        ),
        (
            SensitivityTag::Sensitive,
            r"(?i)(password|passwd|pwd|secret|token|api_?key|ssn|social_?security|passport|licen[cs]e|(date_?of_?)?birth|dob$)",
        ),
        (
            SensitivityTag::Location,
            r"(?i)(address|street|city|state|country|zip|postal|postcode|latitude|longitude|geo)",
        ),
    ]
    .into_iter()
    .map(|(tag, pattern)| {
        #[allow(clippy::expect_used)]
        let regex = Regex::new(pattern).expect("taxonomy pattern is valid");
        (tag, regex)
    })
    .collect()
});

/// Classifies a column name into zero or more sensitivity tags.
///
/// A column may carry multiple tags (e.g. `user_email_address` is both
/// Contact and Location by pattern); set semantics prevent duplicates.
pub fn tags_for(column_name: &str) -> BTreeSet<SensitivityTag> {
    TAG_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(column_name))
        .map(|(tag, _)| *tag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_column_is_contact() {
        let tags = tags_for("user_email_address");
        assert!(tags.contains(&SensitivityTag::Contact));
    }

    #[test]
    fn test_plain_id_column_is_untagged() {
        assert!(tags_for("order_id").is_empty());
        assert!(tags_for("quantity").is_empty());
    }

    #[test]
    fn test_name_columns_are_pii() {
        assert!(tags_for("first_name").contains(&SensitivityTag::Pii));
        assert!(tags_for("SURNAME").contains(&SensitivityTag::Pii));
        assert!(tags_for("name").contains(&SensitivityTag::Pii));
        // "hostname" is not a person name
        assert!(!tags_for("hostname").contains(&SensitivityTag::Pii));
    }

    #[test]
    fn test_case_insensitive_matching() {
        assert!(tags_for("EMAIL").contains(&SensitivityTag::Contact));
        assert!(tags_for("Password_Hash").contains(&SensitivityTag::Sensitive));
    }

    #[test]
    fn test_financial_and_sensitive_patterns() {
        assert!(tags_for("annual_salary").contains(&SensitivityTag::Financial));
        assert!(tags_for("credit_card_number").contains(&SensitivityTag::Financial));
        assert!(tags_for("ssn").contains(&SensitivityTag::Sensitive));
        assert!(tags_for("date_of_birth").contains(&SensitivityTag::Sensitive));
        assert!(tags_for("api_key").contains(&SensitivityTag::Sensitive));
    }

    #[test]
    fn test_location_patterns() {
        assert!(tags_for("shipping_address").contains(&SensitivityTag::Location));
        assert!(tags_for("zip_code").contains(&SensitivityTag::Location));
    }

    #[test]
    fn test_multiple_tags_on_one_column() {
        let tags = tags_for("billing_address_email");
        assert!(tags.contains(&SensitivityTag::Contact));
        assert!(tags.contains(&SensitivityTag::Location));
        assert_eq!(tags.len(), 2);
    }
}
