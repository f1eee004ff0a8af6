//! Validates the extracted object against the analysis contract and shapes
//! it into an `AnalysisResult`.
//!
//! The two top-level keys are mandatory. A `jobMatches` item that cannot be
//! read as a match is dropped with a warning. Inside `cvAnalysis` every list
//! is optional and defaults to empty. Job matches are sorted by suitability,
//! highest first; the sort is stable so ties keep the submitted order.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::models::{
    lenient_location, lenient_number, lenient_string, value_to_string, AnalysisResult,
    CvAnalysis, Job, JobMatch, MatchLocation,
};
use super::AnalysisError;

const SUGGESTED_SKILLS_RANGE: std::ops::RangeInclusive<usize> = 3..=5;

/// A job match as the model wrote it, before clamping and defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJobMatch {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    company: String,
    #[serde(default, deserialize_with = "lenient_location")]
    location: MatchLocation,
    #[serde(default, deserialize_with = "lenient_string")]
    salary: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    job_type: String,
    #[serde(default, deserialize_with = "lenient_number")]
    suitability_percentage: Option<f64>,
}

impl From<RawJobMatch> for JobMatch {
    fn from(raw: RawJobMatch) -> Self {
        let suitability_percentage = match raw.suitability_percentage {
            Some(score) => score.clamp(0.0, 100.0),
            None => {
                warn!("Job match {:?} has no suitabilityPercentage; scoring it 0", raw.id);
                0.0
            }
        };
        JobMatch {
            id: raw.id,
            title: raw.title,
            company: raw.company,
            location: raw.location,
            salary: raw.salary,
            job_type: raw.job_type,
            suitability_percentage,
        }
    }
}

pub fn normalize(parsed: Value) -> Result<AnalysisResult, AnalysisError> {
    let mut root = match parsed {
        Value::Object(root) => root,
        other => {
            return Err(validation(
                "<root>",
                format!("expected an object, found {}", kind_of(&other)),
            ))
        }
    };

    let raw_matches = match root.remove("jobMatches") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(validation(
                "jobMatches",
                format!("expected an array, found {}", kind_of(&other)),
            ))
        }
        None => return Err(validation("jobMatches", "missing".to_string())),
    };

    let mut cv = match root.remove("cvAnalysis") {
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(validation(
                "cvAnalysis",
                format!("expected an object, found {}", kind_of(&other)),
            ))
        }
        None => return Err(validation("cvAnalysis", "missing".to_string())),
    };

    let mut job_matches: Vec<JobMatch> = raw_matches
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<RawJobMatch>(item) {
            Ok(raw) => Some(JobMatch::from(raw)),
            Err(e) => {
                warn!("Dropping malformed jobMatches[{i}]: {e}");
                None
            }
        })
        .collect();

    // Vec::sort_by is stable.
    job_matches.sort_by(|a, b| b.suitability_percentage.total_cmp(&a.suitability_percentage));

    let cv_analysis = CvAnalysis {
        strengths: string_list(&mut cv, "strengths"),
        weaknesses: string_list(&mut cv, "weaknesses"),
        extracted_skills: string_list(&mut cv, "extractedSkills"),
        suggested_skills_to_learn: string_list(&mut cv, "suggestedSkillsToLearn"),
    };

    let suggested = cv_analysis.suggested_skills_to_learn.len();
    if !SUGGESTED_SKILLS_RANGE.contains(&suggested) {
        warn!("Model suggested {suggested} skills to learn (expected 3-5)");
    }

    Ok(AnalysisResult {
        job_matches,
        cv_analysis,
    })
}

/// Drops matches for jobs that were never submitted and repeated ids, so
/// the result never has more matches than input jobs. Order is preserved.
pub fn retain_submitted(job_matches: Vec<JobMatch>, jobs: &[Job]) -> Vec<JobMatch> {
    let known: HashSet<String> = jobs.iter().filter_map(Job::id_key).collect();

    let mut kept = Vec::with_capacity(job_matches.len().min(jobs.len()));

    if known.is_empty() {
        // Nothing to match ids against; only the length bound applies.
        kept.extend(job_matches.into_iter().take(jobs.len()));
        return kept;
    }

    let mut seen = HashSet::new();
    for job_match in job_matches {
        if !known.contains(job_match.id.as_str()) {
            warn!("Dropping match for unknown job id {:?}", job_match.id);
            continue;
        }
        if !seen.insert(job_match.id.clone()) {
            warn!("Dropping duplicate match for job id {:?}", job_match.id);
            continue;
        }
        kept.push(job_match);
    }
    kept.truncate(jobs.len());
    kept
}

/// Reads an optional list of strings. Missing or null becomes empty; a bare
/// string becomes a one-item list; non-scalar items are skipped.
fn string_list(fields: &mut Map<String, Value>, key: &str) -> Vec<String> {
    match fields.remove(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter(|item| item.is_string() || item.is_number())
            .map(value_to_string)
            .collect(),
        Some(other) => {
            warn!("cvAnalysis.{key} is {}, not a list; ignoring it", kind_of(&other));
            Vec::new()
        }
    }
}

fn validation(field: &str, reason: String) -> AnalysisError {
    AnalysisError::Validation {
        field: field.to_string(),
        reason,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
