//! Input and output data shapes for a CV analysis.
//!
//! Input jobs are forwarded to the model untouched; the output types use the
//! camelCase field names of the analysis contract.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ────────────────────────────────────────────────────────────────────────────
// Input
// ────────────────────────────────────────────────────────────────────────────

/// A job posting submitted for comparison. Every field is forwarded to the
/// model exactly as the caller sent it; only `id` and `type` are read here.
/// Absent and null fields are both left out when forwarding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub title: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub company: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub description: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub requirements: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub location: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub salary: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Value::is_null")]
    pub job_type: Value,
    /// Any other fields the caller attached (url, postedAt, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    /// The id as the model will echo it back: string ids as-is, numeric ids
    /// in their JSON spelling. `None` for missing, empty or non-scalar ids.
    pub fn id_key(&self) -> Option<String> {
        match &self.id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.job_type.as_str()
    }
}

/// Free-form search filters, serialized into the prompt verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(pub Map<String, Value>);

impl Filters {
    /// The `type` filter, if one is set.
    pub fn job_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }
}

/// Everything the core needs for one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub resume_text: String,
    pub jobs: Vec<Job>,
    pub filters: Filters,
}

impl AnalysisRequest {
    pub fn new(resume_text: impl Into<String>, jobs: Vec<Job>, filters: Filters) -> Self {
        Self {
            resume_text: resume_text.into(),
            jobs,
            filters,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchLocation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lng: Option<f64>,
}

/// One scored job. `suitability_percentage` is always within 0..=100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMatch {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: MatchLocation,
    pub salary: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub suitability_percentage: f64,
}

/// Narrative analysis of the résumé. All four lists are always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvAnalysis {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub extracted_skills: Vec<String>,
    pub suggested_skills_to_learn: Vec<String>,
}

/// Normalized analysis: matches sorted by suitability, highest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub job_matches: Vec<JobMatch>,
    pub cv_analysis: CvAnalysis,
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient field helpers
// ────────────────────────────────────────────────────────────────────────────

/// Accepts a string, a number, or null for a text field. Models and job
/// boards both hand out numeric ids and salaries.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

/// Accepts `85`, `85.5`, `"85"` or `"85%"`. Anything else, including
/// `"NaN"` and `"inf"`, is treated as absent.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite()))
}

/// A location given either as an object or as a bare place name.
pub(crate) fn lenient_location<'de, D>(deserializer: D) -> Result<MatchLocation, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(MatchLocation::default()),
        Value::String(name) => Ok(MatchLocation {
            name,
            ..MatchLocation::default()
        }),
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_forwards_fields_exactly_and_keeps_extras() {
        let input = json!({
            "id": 42,
            "title": "Backend Engineer",
            "company": "Acme",
            "type": "Full-time",
            "salary": 95000,
            "url": "https://jobs.example.com/42"
        });
        let job: Job = serde_json::from_value(input.clone()).unwrap();

        assert_eq!(job.id_key().as_deref(), Some("42"));
        assert_eq!(job.type_name(), Some("Full-time"));
        assert_eq!(job.extra["url"], "https://jobs.example.com/42");
        assert_eq!(serde_json::to_value(&job).unwrap(), input);
    }

    #[test]
    fn test_job_omits_absent_fields_when_forwarding() {
        let job: Job =
            serde_json::from_value(json!({"title": "Engineer", "company": null})).unwrap();
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value, json!({"title": "Engineer"}));
        assert_eq!(job.id_key(), None);
        assert_eq!(job.type_name(), None);
    }

    #[test]
    fn test_lenient_number_rejects_non_finite() {
        #[derive(Deserialize)]
        struct Score {
            #[serde(default, deserialize_with = "lenient_number")]
            value: Option<f64>,
        }
        let read = |v: Value| serde_json::from_value::<Score>(json!({ "value": v })).unwrap().value;

        assert_eq!(read(json!("85%")), Some(85.0));
        assert_eq!(read(json!(12.5)), Some(12.5));
        assert_eq!(read(json!("NaN")), None);
        assert_eq!(read(json!("inf")), None);
        assert_eq!(read(json!("-Infinity")), None);
    }

    #[test]
    fn test_filters_job_type() {
        let filters: Filters = serde_json::from_value(json!({"type": "Remote"})).unwrap();
        assert_eq!(filters.job_type(), Some("Remote"));
        assert_eq!(Filters::default().job_type(), None);
    }

    #[test]
    fn test_analysis_result_uses_contract_field_names() {
        let result = AnalysisResult {
            job_matches: vec![JobMatch {
                id: "A".to_string(),
                title: "Engineer".to_string(),
                company: "Acme".to_string(),
                location: MatchLocation {
                    name: "Berlin".to_string(),
                    lat: Some(52.52),
                    lng: Some(13.40),
                },
                salary: "70k".to_string(),
                job_type: "Full-time".to_string(),
                suitability_percentage: 80.0,
            }],
            cv_analysis: CvAnalysis::default(),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["jobMatches"][0]["suitabilityPercentage"], 80.0);
        assert_eq!(value["jobMatches"][0]["type"], "Full-time");
        assert!(value["cvAnalysis"]["suggestedSkillsToLearn"].is_array());
        assert!(value["cvAnalysis"]["extractedSkills"].is_array());
    }
}
