//! Per-project mapping overrides and collection filters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps a TestRail status id to a standard execution status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMapping {
    pub standard_status: String,
}

/// Maps a TestRail case type id to a standard test type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMapping {
    pub standard_type: String,
}

/// Maps a TestRail priority id to a standard priority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityMapping {
    pub standard_priority: String,
}

/// Describes how a custom case field lands in the domain layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldMapping {
    /// Attribute name in `custom_attributes`
    pub target_field: String,
    /// One of `string`, `boolean`, `number`, `date`
    #[serde(default, deserialize_with = "null_as_default::deserialize")]
    pub field_type: String,
}

/// Scope configuration for one (connection, project) pair.
///
/// Mapping keys are the TestRail ids rendered as decimal strings. Absent and
/// `null` fields both decode to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeConfig {
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub status_mappings: HashMap<String, StatusMapping>,
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub type_mappings: HashMap<String, TypeMapping>,
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub priority_mappings: HashMap<String, PriorityMapping>,
    /// Keyed by the custom field's system name (e.g., `custom_automation_type`)
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub custom_field_mappings: HashMap<String, CustomFieldMapping>,
    /// Custom field whose value marks a case as automated
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub automation_status_field: String,
    /// Values of `automation_status_field` that count as automated
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub automated_values: Vec<String>,
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub include_suite_ids: Vec<i64>,
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub exclude_suite_ids: Vec<i64>,
    #[serde(deserialize_with = "null_as_default::deserialize")]
    pub include_milestone_ids: Vec<i64>,
}

/// Serde helper that reads `null` as the type's default.
mod null_as_default {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

impl ScopeConfig {
    /// Whether cases and sections of the given suite are collected and converted.
    pub fn suite_allowed(&self, suite_id: i64) -> bool {
        (self.include_suite_ids.is_empty() || self.include_suite_ids.contains(&suite_id))
            && !self.exclude_suite_ids.contains(&suite_id)
    }

    /// Whether a run attached to the given milestone is converted and has its
    /// results collected.
    ///
    /// A run without a milestone only passes when no milestone filter is set.
    pub fn milestone_allowed(&self, milestone_id: Option<i64>) -> bool {
        if self.include_milestone_ids.is_empty() {
            return true;
        }
        milestone_id.is_some_and(|id| self.include_milestone_ids.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_camel_case() {
        let json = r#"{
            "statusMappings": {"5": {"standardStatus": "ABORTED"}},
            "typeMappings": {"1": {"standardType": "USER_ACCEPTANCE"}},
            "customFieldMappings": {
                "custom_automation_type": {"targetField": "automationType", "fieldType": "string"}
            },
            "automationStatusField": "custom_automated",
            "automatedValues": ["yes", "true"],
            "includeSuiteIds": [3]
        }"#;
        let config: ScopeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.status_mappings["5"].standard_status, "ABORTED");
        assert_eq!(config.type_mappings["1"].standard_type, "USER_ACCEPTANCE");
        assert_eq!(
            config.custom_field_mappings["custom_automation_type"].target_field,
            "automationType"
        );
        assert_eq!(config.automated_values, vec!["yes", "true"]);
        assert!(config.priority_mappings.is_empty());
        assert!(config.exclude_suite_ids.is_empty());
    }

    #[test]
    fn test_decode_null_fields() {
        let json = r#"{
            "statusMappings": {"5": {"standardStatus": "ABORTED"}},
            "typeMappings": null,
            "priorityMappings": null,
            "customFieldMappings": {
                "custom_component": {"targetField": "component", "fieldType": null}
            },
            "automationStatusField": null,
            "automatedValues": null,
            "includeSuiteIds": null,
            "excludeSuiteIds": [4],
            "includeMilestoneIds": null
        }"#;
        let config: ScopeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.status_mappings["5"].standard_status, "ABORTED");
        assert!(config.type_mappings.is_empty());
        assert!(config.priority_mappings.is_empty());
        assert_eq!(config.custom_field_mappings["custom_component"].field_type, "");
        assert_eq!(config.automation_status_field, "");
        assert!(config.automated_values.is_empty());
        assert!(config.include_suite_ids.is_empty());
        assert_eq!(config.exclude_suite_ids, vec![4]);
        assert!(config.suite_allowed(1));
        assert!(config.milestone_allowed(None));
    }

    #[test]
    fn test_suite_filter() {
        let config = ScopeConfig::default();
        assert!(config.suite_allowed(7));

        let config = ScopeConfig {
            include_suite_ids: vec![1, 2],
            exclude_suite_ids: vec![2],
            ..Default::default()
        };
        assert!(config.suite_allowed(1));
        assert!(!config.suite_allowed(2));
        assert!(!config.suite_allowed(3));

        let config = ScopeConfig {
            exclude_suite_ids: vec![9],
            ..Default::default()
        };
        assert!(config.suite_allowed(1));
        assert!(!config.suite_allowed(9));
    }

    #[test]
    fn test_milestone_filter() {
        let config = ScopeConfig::default();
        assert!(config.milestone_allowed(None));
        assert!(config.milestone_allowed(Some(4)));

        let config = ScopeConfig {
            include_milestone_ids: vec![4],
            ..Default::default()
        };
        assert!(config.milestone_allowed(Some(4)));
        assert!(!config.milestone_allowed(Some(5)));
        assert!(!config.milestone_allowed(None));
    }
}
