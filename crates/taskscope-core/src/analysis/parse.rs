//! Decoding and validation of provider output.
//!
//! Provider text is free-form: it may wrap the JSON in prose or code fences.
//! [`decode`] finds the first balanced JSON value and never fails; anything it
//! can't make sense of comes back as [`ParsedResponse::Unparsed`].
//! [`validate`] then checks one candidate against the task schema.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{AutomationLevel, FALLBACK_CATEGORY, TaskDraft, TaskFrequency};

/// Labels treated as a workshop's catch-all category
const CATCH_ALL_LABELS: &[&str] = &[
    "other",
    "others",
    "기타",
    "etc",
    "misc",
    "miscellaneous",
    "general",
];

/// Outcome of decoding a provider response
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// Candidate task objects, not yet validated
    Tasks(Vec<Value>),
    Unparsed { reason: String },
}

impl ParsedResponse {
    /// Canonical JSON for the cache. Only decoded responses have one.
    pub fn canonical(&self) -> Option<String> {
        match self {
            Self::Tasks(items) => serde_json::to_string(items).ok(),
            Self::Unparsed { .. } => None,
        }
    }
}

/// End offset (exclusive) of the balanced JSON value opening at `start`
fn balanced_end(raw: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in raw.bytes().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode provider text into candidate task objects
pub fn decode(raw: &str) -> ParsedResponse {
    let mut saw_bracket = false;

    for (start, b) in raw.bytes().enumerate() {
        if b != b'[' && b != b'{' {
            continue;
        }
        saw_bracket = true;
        let Some(end) = balanced_end(raw, start) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(&raw[start..end]) else {
            continue;
        };

        return match value {
            Value::Array(items) => ParsedResponse::Tasks(items),
            Value::Object(mut map) => match map.remove("tasks") {
                Some(Value::Array(items)) => ParsedResponse::Tasks(items),
                Some(_) => ParsedResponse::Unparsed {
                    reason: "\"tasks\" is not an array".into(),
                },
                None => ParsedResponse::Tasks(vec![Value::Object(map)]),
            },
            _ => continue,
        };
    }

    ParsedResponse::Unparsed {
        reason: if saw_bracket {
            "no well-formed JSON value found".into()
        } else {
            "response contains no JSON".into()
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    title: Option<String>,
    description: Option<String>,
    #[serde(alias = "time_spent", alias = "hours")]
    time_spent: Option<Value>,
    frequency: Option<String>,
    #[serde(alias = "automationPotential", alias = "automation_potential")]
    automation: Option<String>,
    #[serde(alias = "automation_method")]
    automation_method: Option<String>,
    category: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn positive_hours(v: &Value) -> Option<f64> {
    let hours = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (hours.is_finite() && hours > 0.0).then_some(hours)
}

/// Check one candidate against the task schema. Pure; `None` drops it.
pub fn validate(candidate: &Value, domains: &[String]) -> Option<TaskDraft> {
    let raw: RawTask = serde_json::from_value(candidate.clone()).ok()?;

    Some(TaskDraft {
        title: non_empty(raw.title)?,
        description: non_empty(raw.description)?,
        time_spent: positive_hours(raw.time_spent.as_ref()?)?,
        frequency: TaskFrequency::from_str(raw.frequency.as_deref()?)?,
        automation: AutomationLevel::from_str(raw.automation.as_deref()?)?,
        automation_method: non_empty(raw.automation_method)?,
        category: normalize_category(raw.category.as_deref().unwrap_or_default(), domains),
    })
}

/// Validate every candidate, dropping the invalid ones
pub fn validate_all(candidates: &[Value], domains: &[String]) -> Vec<TaskDraft> {
    candidates.iter().filter_map(|c| validate(c, domains)).collect()
}

/// Map a free-form category onto the domain set: exact, then case-insensitive,
/// then containment either way, then the fallback.
pub fn normalize_category(raw: &str, domains: &[String]) -> String {
    let raw = raw.trim();
    if !raw.is_empty() {
        if let Some(d) = domains.iter().find(|d| d.as_str() == raw) {
            return d.clone();
        }

        let lowered = raw.to_lowercase();
        if let Some(d) = domains.iter().find(|d| d.to_lowercase() == lowered) {
            return d.clone();
        }

        if let Some(d) = domains.iter().find(|d| {
            let d = d.to_lowercase();
            !d.is_empty()
                && (lowered.contains(&d)
                    || (lowered.chars().count() >= 3 && d.contains(&lowered)))
        }) {
            return d.clone();
        }
    }
    fallback_category(domains)
}

/// A catch-all label from the set, else the first label, else "other"
pub fn fallback_category(domains: &[String]) -> String {
    domains
        .iter()
        .find(|d| CATCH_ALL_LABELS.contains(&d.trim().to_lowercase().as_str()))
        .or_else(|| domains.first())
        .cloned()
        .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn domains() -> Vec<String> {
        vec!["Sales".into(), "Finance".into()]
    }

    fn task_json() -> Value {
        json!({
            "title": "Weekly report",
            "description": "Summarize pipeline",
            "timeSpent": 1.5,
            "frequency": "weekly",
            "automation": "high",
            "automationMethod": "Scheduled script",
            "category": "sales"
        })
    }

    #[test]
    fn test_decode_plain_array() {
        let parsed = decode(r#"[{"title": "a"}]"#);
        assert_eq!(parsed, ParsedResponse::Tasks(vec![json!({"title": "a"})]));
    }

    #[test]
    fn test_decode_tolerates_prose_and_fences() {
        let raw = "Here you go:\n```json\n[{\"title\": \"a ] tricky\"}]\n```\nThanks!";
        match decode(raw) {
            ParsedResponse::Tasks(items) => assert_eq!(items[0]["title"], "a ] tricky"),
            other => panic!("expected tasks, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_skips_broken_prefix() {
        let raw = "note [not json] then [{\"title\": \"b\"}]";
        match decode(raw) {
            ParsedResponse::Tasks(items) => assert_eq!(items[0]["title"], "b"),
            other => panic!("expected tasks, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_object_wrappers() {
        assert_eq!(
            decode(r#"{"tasks": [{"title": "x"}]}"#),
            ParsedResponse::Tasks(vec![json!({"title": "x"})])
        );
        assert_eq!(
            decode(r#"{"title": "solo"}"#),
            ParsedResponse::Tasks(vec![json!({"title": "solo"})])
        );
    }

    #[test]
    fn test_decode_unparsed() {
        assert!(matches!(decode("I could not find any tasks."), ParsedResponse::Unparsed { .. }));
        assert!(matches!(decode("[1, 2"), ParsedResponse::Unparsed { .. }));
        assert_eq!(decode("nothing").canonical(), None);
    }

    #[test]
    fn test_validate_accepts_and_normalizes() {
        let draft = validate(&task_json(), &domains()).unwrap();
        assert_eq!(draft.category, "Sales");
        assert_eq!(draft.frequency, TaskFrequency::Weekly);
        assert_eq!(draft.time_spent, 1.5);
    }

    #[test]
    fn test_validate_rejects_bad_candidates() {
        let mut zero_time = task_json();
        zero_time["timeSpent"] = json!(0);
        let mut bad_freq = task_json();
        bad_freq["frequency"] = json!("yearly");
        let mut bad_level = task_json();
        bad_level["automation"] = json!("extreme");
        let mut blank_title = task_json();
        blank_title["title"] = json!("   ");
        let mut no_method = task_json();
        no_method.as_object_mut().unwrap().remove("automationMethod");

        for candidate in [zero_time, bad_freq, bad_level, blank_title, no_method, json!(42)] {
            assert!(validate(&candidate, &domains()).is_none(), "{candidate}");
        }
    }

    #[test]
    fn test_validate_accepts_numeric_string_hours() {
        let mut candidate = task_json();
        candidate["timeSpent"] = json!("0.25");
        assert_eq!(validate(&candidate, &domains()).unwrap().time_spent, 0.25);
    }

    #[test]
    fn test_validate_all_keeps_order() {
        let mut second = task_json();
        second["title"] = json!("Invoice check");
        let drafts = validate_all(&[task_json(), json!({"bogus": true}), second], &domains());
        let titles: Vec<_> = drafts.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Weekly report", "Invoice check"]);
    }

    #[test]
    fn test_normalize_category() {
        let d = domains();
        assert_eq!(normalize_category("Finance", &d), "Finance");
        assert_eq!(normalize_category("FINANCE", &d), "Finance");
        assert_eq!(normalize_category("Finance & Accounting", &d), "Finance");
        assert_eq!(normalize_category("Logistics", &d), "Sales");
        assert_eq!(normalize_category("", &d), "Sales");
    }

    #[test]
    fn test_fallback_prefers_catch_all() {
        let d = vec!["영업".to_string(), "기타".to_string()];
        assert_eq!(normalize_category("물류", &d), "기타");
        assert_eq!(fallback_category(&[]), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_category_always_in_domain_set() {
        let d = domains();
        for raw in ["", "x", "Sales", "finance team", "☃"] {
            assert!(d.contains(&normalize_category(raw, &d)));
        }
    }
}
