//! Mapping engine: TestRail ids to standard vocabulary
//!
//! Lookup order for every kind is the scope override (keyed by the id as a
//! decimal string), then the built-in table, then the kind's fallback.
//! Everything here is pure.

use crate::models::ScopeConfig;
use crate::types::from_unix;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Number, Value};

/// What a source id names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Status,
    CaseType,
    Priority,
}

/// Values of the automation field treated as "automated" when the scope sets none
pub const DEFAULT_AUTOMATED_VALUES: &[&str] = &["automated", "yes", "true", "1"];

/// Map a TestRail id to its standard value, honoring scope overrides
pub fn normalize(kind: MappingKind, source_id: i64, scope: Option<&ScopeConfig>) -> String {
    if let Some(value) = scope.and_then(|s| override_for(kind, source_id, s)) {
        return value;
    }
    builtin(kind, source_id).to_string()
}

fn override_for(kind: MappingKind, source_id: i64, scope: &ScopeConfig) -> Option<String> {
    let key = source_id.to_string();
    match kind {
        MappingKind::Status => scope
            .status_mappings
            .get(&key)
            .map(|m| m.standard_status.clone()),
        MappingKind::CaseType => scope
            .type_mappings
            .get(&key)
            .map(|m| m.standard_type.clone()),
        MappingKind::Priority => scope
            .priority_mappings
            .get(&key)
            .map(|m| m.standard_priority.clone()),
    }
}

fn builtin(kind: MappingKind, source_id: i64) -> &'static str {
    match kind {
        MappingKind::Status => match source_id {
            1 => "SUCCESS",
            2 => "BLOCKED",
            5 => "FAILED",
            // Custom status 1 is conventionally "Skipped"
            6 => "SKIPPED",
            // Untested, retest, remaining custom statuses
            _ => "PENDING",
        },
        MappingKind::CaseType => match source_id {
            1 => "acceptance",
            2 => "accessibility",
            3 => "automated",
            4 => "compatibility",
            5 => "destructive",
            6 => "functional",
            7 => "other",
            8 => "performance",
            9 => "regression",
            10 => "security",
            11 => "smoke",
            12 => "usability",
            _ => "functional",
        },
        MappingKind::Priority => match source_id {
            1 => "low",
            2 => "medium",
            3 => "high",
            4 => "critical",
            _ => "medium",
        },
    }
}

/// Whether a case is automated according to the scope's automation field.
///
/// Values compare case-insensitively after rendering numbers and booleans as text.
pub fn is_automated(custom_fields: &Map<String, Value>, scope: Option<&ScopeConfig>) -> bool {
    let Some(scope) = scope else {
        return false;
    };
    if scope.automation_status_field.is_empty() {
        return false;
    }
    let Some(value) = custom_fields
        .get(&scope.automation_status_field)
        .and_then(scalar_text)
    else {
        return false;
    };

    if scope.automated_values.is_empty() {
        DEFAULT_AUTOMATED_VALUES
            .iter()
            .any(|v| v.eq_ignore_ascii_case(&value))
    } else {
        scope
            .automated_values
            .iter()
            .any(|v| v.eq_ignore_ascii_case(&value))
    }
}

/// Build the domain `custom_attributes` object from a case's custom fields.
///
/// Only fields named in `customFieldMappings` are kept, renamed to their
/// target field and coerced to the declared type. A value that cannot be
/// coerced keeps its raw JSON form. Null values are dropped.
pub fn custom_attributes(custom_fields: &Map<String, Value>, scope: Option<&ScopeConfig>) -> Value {
    let mut attributes = Map::new();
    let Some(scope) = scope else {
        return Value::Object(attributes);
    };

    for (system_name, mapping) in &scope.custom_field_mappings {
        let Some(raw) = custom_fields.get(system_name) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }
        let target = if mapping.target_field.is_empty() {
            system_name.clone()
        } else {
            mapping.target_field.clone()
        };
        attributes.insert(target, coerce(raw, &mapping.field_type));
    }

    Value::Object(attributes)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce(raw: &Value, field_type: &str) -> Value {
    let coerced = match field_type {
        "string" => scalar_text(raw).map(Value::String),
        "boolean" => coerce_bool(raw).map(Value::Bool),
        "number" => coerce_number(raw).map(Value::Number),
        "date" => coerce_date(raw).map(|dt| Value::String(dt.to_rfc3339())),
        _ => None,
    };
    coerced.unwrap_or_else(|| raw.clone())
}

fn coerce_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_number(raw: &Value) -> Option<Number> {
    match raw {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Number::from(i))
            } else {
                s.parse::<f64>().ok().and_then(Number::from_f64)
            }
        }
        _ => None,
    }
}

fn coerce_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n.as_i64().map(from_unix),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            // TestRail date fields render as m/d/Y; ISO dates also show up
            ["%Y-%m-%d", "%m/%d/%Y"]
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomFieldMapping, StatusMapping, TypeMapping};
    use serde_json::json;

    fn status_config() -> ScopeConfig {
        let mut config = ScopeConfig::default();
        for (id, status) in [
            ("1", "PASSED_WITH_RESERVATIONS"),
            ("5", "ABORTED"),
            ("99", "CUSTOM_SUCCESS"),
        ] {
            config.status_mappings.insert(
                id.to_string(),
                StatusMapping {
                    standard_status: status.to_string(),
                },
            );
        }
        config
    }

    #[test]
    fn test_status_defaults() {
        let expected = [
            (1, "SUCCESS"),
            (2, "BLOCKED"),
            (3, "PENDING"),
            (4, "PENDING"),
            (5, "FAILED"),
            (6, "SKIPPED"),
            (7, "PENDING"),
            (8, "PENDING"),
            (9, "PENDING"),
            (10, "PENDING"),
            (99, "PENDING"),
        ];
        for (id, status) in expected {
            assert_eq!(normalize(MappingKind::Status, id, None), status, "status {}", id);
        }
    }

    #[test]
    fn test_status_with_overrides() {
        let config = status_config();
        assert_eq!(
            normalize(MappingKind::Status, 1, Some(&config)),
            "PASSED_WITH_RESERVATIONS"
        );
        assert_eq!(normalize(MappingKind::Status, 5, Some(&config)), "ABORTED");
        assert_eq!(
            normalize(MappingKind::Status, 99, Some(&config)),
            "CUSTOM_SUCCESS"
        );
        // Unmapped ids fall back to the built-in table
        assert_eq!(normalize(MappingKind::Status, 2, Some(&config)), "BLOCKED");
    }

    #[test]
    fn test_case_type_mapping() {
        assert_eq!(normalize(MappingKind::CaseType, 1, None), "acceptance");
        assert_eq!(normalize(MappingKind::CaseType, 9, None), "regression");
        assert_eq!(normalize(MappingKind::CaseType, 99, None), "functional");

        let mut config = ScopeConfig::default();
        config.type_mappings.insert(
            "1".to_string(),
            TypeMapping {
                standard_type: "USER_ACCEPTANCE".to_string(),
            },
        );
        config.type_mappings.insert(
            "99".to_string(),
            TypeMapping {
                standard_type: "EXPLORATORY".to_string(),
            },
        );
        assert_eq!(
            normalize(MappingKind::CaseType, 1, Some(&config)),
            "USER_ACCEPTANCE"
        );
        assert_eq!(
            normalize(MappingKind::CaseType, 99, Some(&config)),
            "EXPLORATORY"
        );
        assert_eq!(normalize(MappingKind::CaseType, 9, Some(&config)), "regression");
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(normalize(MappingKind::Priority, 1, None), "low");
        assert_eq!(normalize(MappingKind::Priority, 4, None), "critical");
        assert_eq!(normalize(MappingKind::Priority, 0, None), "medium");

        let config: ScopeConfig = serde_json::from_value(json!({
            "priorityMappings": {"4": {"standardPriority": "blocker"}}
        }))
        .unwrap();
        assert_eq!(normalize(MappingKind::Priority, 4, Some(&config)), "blocker");
        assert_eq!(normalize(MappingKind::Priority, 3, Some(&config)), "high");
    }

    #[test]
    fn test_is_automated() {
        let fields = json!({"custom_automation": "Yes", "custom_flag": 1})
            .as_object()
            .cloned()
            .unwrap();

        assert!(!is_automated(&fields, None));

        let mut config = ScopeConfig {
            automation_status_field: "custom_automation".to_string(),
            ..Default::default()
        };
        assert!(is_automated(&fields, Some(&config)));

        config.automated_values = vec!["automated".to_string()];
        assert!(!is_automated(&fields, Some(&config)));

        config.automation_status_field = "custom_flag".to_string();
        config.automated_values = vec!["1".to_string()];
        assert!(is_automated(&fields, Some(&config)));

        config.automation_status_field = "custom_missing".to_string();
        assert!(!is_automated(&fields, Some(&config)));
    }

    #[test]
    fn test_custom_attributes_coercion() {
        let fields = json!({
            "custom_steps": "Open page",
            "custom_is_smoke": "yes",
            "custom_points": "3",
            "custom_due": "2024-02-01",
            "custom_weird": {"nested": true},
            "custom_empty": null,
            "custom_unmapped": "ignored"
        })
        .as_object()
        .cloned()
        .unwrap();

        let mut config = ScopeConfig::default();
        for (system, target, ty) in [
            ("custom_steps", "steps", "string"),
            ("custom_is_smoke", "smoke", "boolean"),
            ("custom_points", "points", "number"),
            ("custom_due", "due", "date"),
            ("custom_weird", "weird", "number"),
            ("custom_empty", "empty", "string"),
        ] {
            config.custom_field_mappings.insert(
                system.to_string(),
                CustomFieldMapping {
                    target_field: target.to_string(),
                    field_type: ty.to_string(),
                },
            );
        }

        let attrs = custom_attributes(&fields, Some(&config));
        assert_eq!(attrs["steps"], json!("Open page"));
        assert_eq!(attrs["smoke"], json!(true));
        assert_eq!(attrs["points"], json!(3));
        assert_eq!(attrs["due"], json!("2024-02-01T00:00:00+00:00"));
        assert_eq!(attrs["weird"], json!({"nested": true}));
        assert!(attrs.get("empty").is_none());
        assert!(attrs.get("unmapped").is_none());

        assert_eq!(custom_attributes(&fields, None), json!({}));
    }
}
