//! Serializable filter and update requests handed whole to the engine.
//!
//! Two JSON shapes are accepted. The native one names its lists `conditions`/`rules` and its cap
//! `cap`, with entries as objects. The legacy web shape uses `filters`/`updates`, `max_records`
//! and positional arrays such as `["age", ">", "26"]`.

use crate::condition::{Condition, Operator, UpdateRule};
use crate::error::{ReclimitError, Result};
use crate::pipeline::RowCap;
use serde::{Deserialize, Serialize};

/// One condition as written in a request. The operator stays a raw token until conversion so a
/// bad token is reported by name rather than as a shape mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ConditionEntry {
    Object {
        column: String,
        operator: String,
        literal: String,
    },
    Positional(String, String, String),
}

impl TryFrom<ConditionEntry> for Condition {
    type Error = ReclimitError;

    fn try_from(entry: ConditionEntry) -> Result<Self> {
        match entry {
            ConditionEntry::Object {
                column,
                operator,
                literal,
            }
            | ConditionEntry::Positional(column, operator, literal) => {
                Ok(Condition::new(column, operator.parse::<Operator>()?, literal))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum RuleEntry {
    Object {
        column: String,
        operator: String,
        literal: String,
        replacement: String,
    },
    Positional(String, String, String, String),
}

impl TryFrom<RuleEntry> for UpdateRule {
    type Error = ReclimitError;

    fn try_from(entry: RuleEntry) -> Result<Self> {
        match entry {
            RuleEntry::Object {
                column,
                operator,
                literal,
                replacement,
            }
            | RuleEntry::Positional(column, operator, literal, replacement) => Ok(UpdateRule::new(
                column,
                operator.parse::<Operator>()?,
                literal,
                replacement,
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFilterRequest {
    #[serde(default, alias = "filters")]
    conditions: Vec<ConditionEntry>,
    #[serde(default, alias = "max_records")]
    cap: Option<i64>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUpdateRequest {
    #[serde(default, alias = "updates")]
    rules: Vec<RuleEntry>,
    #[serde(default, alias = "max_records")]
    cap: Option<i64>,
    #[serde(default)]
    filename: Option<String>,
}

/// Conditions plus cap, validated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterRequest {
    pub conditions: Vec<Condition>,
    pub cap: RowCap,
    /// Stored upload the request refers to, when it came from the web shape.
    pub filename: Option<String>,
}

/// Rules plus cap, validated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateRequest {
    pub rules: Vec<UpdateRule>,
    pub cap: RowCap,
    pub filename: Option<String>,
}

impl FilterRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawFilterRequest = serde_json::from_str(json)?;
        Ok(Self {
            conditions: raw
                .conditions
                .into_iter()
                .map(Condition::try_from)
                .collect::<Result<_>>()?,
            cap: RowCap::from_wire(raw.cap)?,
            filename: raw.filename,
        })
    }

    /// Native JSON shape of this request.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&WireFilter {
            conditions: &self.conditions,
            cap: self.cap.limit(),
            filename: self.filename.as_deref(),
        })?)
    }
}

impl UpdateRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawUpdateRequest = serde_json::from_str(json)?;
        Ok(Self {
            rules: raw
                .rules
                .into_iter()
                .map(UpdateRule::try_from)
                .collect::<Result<_>>()?,
            cap: RowCap::from_wire(raw.cap)?,
            filename: raw.filename,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&WireUpdate {
            rules: &self.rules,
            cap: self.cap.limit(),
            filename: self.filename.as_deref(),
        })?)
    }
}

#[derive(Serialize)]
struct WireFilter<'a> {
    conditions: &'a [Condition],
    cap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

#[derive(Serialize)]
struct WireUpdate<'a> {
    rules: &'a [UpdateRule],
    cap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

/// Group flat command-line values (`COL OP VALUE` triples) into conditions.
pub fn conditions_from_args(values: &[String]) -> Result<Vec<Condition>> {
    if values.len() % 3 != 0 {
        return Err(ReclimitError::Validation(
            "each --where needs a column, an operator and a value".into(),
        ));
    }
    values
        .chunks(3)
        .map(|c| Ok(Condition::new(c[0].clone(), c[1].parse()?, c[2].clone())))
        .collect()
}

/// Group flat command-line values (`COL OP VALUE REPLACEMENT` quads) into update rules.
pub fn rules_from_args(values: &[String]) -> Result<Vec<UpdateRule>> {
    if values.len() % 4 != 0 {
        return Err(ReclimitError::Validation(
            "each --set needs a column, an operator, a value and a replacement".into(),
        ));
    }
    values
        .chunks(4)
        .map(|c| {
            Ok(UpdateRule::new(
                c[0].clone(),
                c[1].parse()?,
                c[2].clone(),
                c[3].clone(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_filter_request() {
        let req = FilterRequest::from_json(
            r#"{"conditions": [{"column": "age", "operator": ">", "literal": "26"}], "cap": 5}"#,
        )
        .unwrap();
        assert_eq!(
            req.conditions,
            vec![Condition::new("age", Operator::GreaterThan, "26")]
        );
        assert_eq!(req.cap.limit(), Some(5));
        assert!(req.filename.is_none());
    }

    #[test]
    fn test_legacy_update_request() {
        let req = UpdateRequest::from_json(
            r#"{"filename": "people.csv", "updates": [["age", "<", "28", "YOUNG"]], "max_records": null}"#,
        )
        .unwrap();
        assert_eq!(
            req.rules,
            vec![UpdateRule::new("age", Operator::LessThan, "28", "YOUNG")]
        );
        assert!(req.cap.is_unlimited());
        assert_eq!(req.filename.as_deref(), Some("people.csv"));
    }

    #[test]
    fn test_missing_entry_field_is_rejected() {
        let err = FilterRequest::from_json(r#"{"conditions": [{"column": "age", "operator": ">"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ReclimitError::Request(_)));
    }

    #[test]
    fn test_bad_operator_is_named() {
        let err = FilterRequest::from_json(r#"{"filters": [["age", "=~", "1"]]}"#).unwrap_err();
        assert!(matches!(err, ReclimitError::Validation(_)));
        assert!(err.to_string().contains("\"=~\""), "{}", err);

        let err = UpdateRequest::from_json(
            r#"{"rules": [{"column": "age", "operator": "gt", "literal": "1", "replacement": "x"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("\"gt\""), "{}", err);
    }

    #[test]
    fn test_bad_cap_is_rejected() {
        let err = FilterRequest::from_json(r#"{"conditions": [], "cap": 0}"#).unwrap_err();
        assert!(matches!(err, ReclimitError::Validation(_)));
        assert!(FilterRequest::from_json(r#"{"conditions": [], "cap": "ten"}"#).is_err());
    }

    #[test]
    fn test_to_json_reads_back() {
        let req = FilterRequest {
            conditions: vec![Condition::new("name", Operator::NotContains, "bo")],
            cap: RowCap::new(3).unwrap(),
            filename: None,
        };
        let json = req.to_json().unwrap();
        assert!(json.contains("\"not contains\""));
        assert_eq!(FilterRequest::from_json(&json).unwrap(), req);
    }

    #[test]
    fn test_args_grouping() {
        let values: Vec<String> = ["age", ">=", "18", "name", "contains", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let conditions = conditions_from_args(&values).unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[1].operator, Operator::Contains);
        assert!(conditions_from_args(&values[..2]).is_err());

        let bad: Vec<String> = ["age", "like", "1", "x"].iter().map(|s| s.to_string()).collect();
        assert!(rules_from_args(&bad).is_err());
    }
}
