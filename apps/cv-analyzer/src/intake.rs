//! Job intake: the caller-side filtering and capping that happens before a
//! job list reaches the analysis core.

use serde::Serialize;
use tracing::info;

use crate::analyzer::{AnalysisResult, CvAnalysis, Filters, Job, JobMatch};

/// Filter value meaning "no type restriction".
const ALL_TYPES: &str = "All";

#[derive(Debug, Clone)]
pub struct JobSelection {
    pub jobs: Vec<Job>,
    /// Jobs left after filtering, before the cap.
    pub total_available: usize,
}

/// Keeps jobs whose `type` matches `filters.type` (unless it is absent or
/// `"All"`), then keeps at most `max_jobs` of them in submitted order.
pub fn select_jobs(jobs: Vec<Job>, filters: &Filters, max_jobs: usize) -> JobSelection {
    let submitted = jobs.len();
    let wanted_type = filters.job_type().filter(|t| *t != ALL_TYPES);

    let mut filtered: Vec<Job> = match wanted_type {
        Some(wanted) => jobs
            .into_iter()
            .filter(|job| job.type_name() == Some(wanted))
            .collect(),
        None => jobs,
    };
    let total_available = filtered.len();
    filtered.truncate(max_jobs);

    info!(
        "Analyzing {} jobs (out of {} filtered, {} total)",
        filtered.len(),
        total_available,
        submitted
    );

    JobSelection {
        jobs: filtered,
        total_available,
    }
}

/// What the caller hands back to the user: the analysis plus intake counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub job_matches: Vec<JobMatch>,
    pub cv_analysis: CvAnalysis,
    pub total_jobs_analyzed: usize,
    pub total_jobs_available: usize,
}

impl AnalysisReport {
    pub fn new(result: AnalysisResult, selection: &JobSelection) -> Self {
        Self {
            job_matches: result.job_matches,
            cv_analysis: result.cv_analysis,
            total_jobs_analyzed: selection.jobs.len(),
            total_jobs_available: selection.total_available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(id: &str, job_type: &str) -> Job {
        Job {
            id: json!(id),
            job_type: json!(job_type),
            ..Job::default()
        }
    }

    fn filters(value: serde_json::Value) -> Filters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_type_filter_keeps_matching_jobs() {
        let jobs = vec![job("1", "Full-time"), job("2", "Contract"), job("3", "Full-time")];
        let selection = select_jobs(jobs, &filters(json!({"type": "Full-time"})), 200);
        let ids: Vec<&str> = selection.jobs.iter().filter_map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(selection.total_available, 2);
    }

    #[test]
    fn test_all_and_missing_filter_keep_everything() {
        let jobs = vec![job("1", "Full-time"), job("2", "Contract")];
        assert_eq!(select_jobs(jobs.clone(), &filters(json!({"type": "All"})), 200).jobs.len(), 2);
        assert_eq!(select_jobs(jobs, &Filters::default(), 200).jobs.len(), 2);
    }

    #[test]
    fn test_jobs_without_type_do_not_match_a_type_filter() {
        let untyped = Job {
            id: json!(7),
            ..Job::default()
        };
        let jobs = vec![untyped, job("8", "Contract")];
        let selection = select_jobs(jobs, &filters(json!({"type": "Contract"})), 200);
        assert_eq!(selection.jobs.len(), 1);
        assert_eq!(selection.jobs[0].id, "8");
    }

    #[test]
    fn test_cap_applies_after_filter() {
        let jobs: Vec<Job> = (0..10).map(|i| job(&i.to_string(), "Remote")).collect();
        let selection = select_jobs(jobs, &Filters::default(), 3);
        assert_eq!(selection.jobs.len(), 3);
        assert_eq!(selection.total_available, 10);
        assert_eq!(selection.jobs[0].id, "0");
    }

    #[test]
    fn test_report_counts() {
        let jobs = vec![job("1", "Remote"), job("2", "Remote")];
        let selection = select_jobs(jobs, &Filters::default(), 1);
        let report = AnalysisReport::new(AnalysisResult::default(), &selection);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["totalJobsAnalyzed"], 1);
        assert_eq!(value["totalJobsAvailable"], 2);
        assert!(value["cvAnalysis"]["weaknesses"].is_array());
    }
}
