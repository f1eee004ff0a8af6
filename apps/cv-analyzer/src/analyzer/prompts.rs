// Prompt text and the output schema for CV analysis.
// The task description is shared; backends without schema support get the
// schema spelled out in prose instead.

use serde_json::{json, Value};

use super::backend::BackendKind;

pub const TASK_SYSTEM: &str = "\
You are an AI-powered Career Assistant and CV Analyzer.

Your task is to take a user's CV, a list of job postings, and filters, and return a comprehensive analysis in JSON format.

You must:

1. Parse the CV to extract skills, experience, education, and job titles.

2. Compare the CV against EACH job in the provided job list.

3. For each job, calculate a 'suitabilityPercentage' (0-100) based on how well the CV matches the job's 'title', 'description', and 'requirements'.

4. Perform an in-depth analysis of the CV itself, identifying strengths, weaknesses, extracted skills, and suggesting 3-5 specific skills to learn.
";

/// Appended for backends that enforce `response_schema()` themselves.
pub const SCHEMA_BOUND_INSTRUCTION: &str =
    "5. Return a single JSON object matching the provided schema exactly.";

/// Appended for backends that only offer a JSON response mode.
pub const PROSE_SCHEMA_INSTRUCTION: &str = r#"5. Return ONLY valid JSON matching this exact schema:
{
  "jobMatches": [
    {
      "id": "string",
      "title": "string",
      "company": "string",
      "location": {
        "name": "string",
        "lat": number,
        "lng": number
      },
      "salary": "string",
      "type": "string",
      "suitabilityPercentage": number
    }
  ],
  "cvAnalysis": {
    "strengths": ["string"],
    "weaknesses": ["string"],
    "extractedSkills": ["string"],
    "suggestedSkillsToLearn": ["string"]
  }
}"#;

pub const JSON_ONLY_REMINDER: &str =
    "Return ONLY valid JSON without any markdown formatting or code blocks.";

pub fn system_prompt(kind: BackendKind) -> String {
    let closing = if kind.supports_response_schema() {
        SCHEMA_BOUND_INSTRUCTION
    } else {
        PROSE_SCHEMA_INSTRUCTION
    };
    format!("{TASK_SYSTEM}\n{closing}")
}

pub fn user_prompt(
    kind: BackendKind,
    cv_text: &str,
    jobs_json: &str,
    filters_json: &str,
) -> String {
    let mut prompt = format!(
        "Please analyze the following CV and job list.\n\n\
         --- CV TEXT ---\n{cv_text}\n\n\
         --- JOB LIST ---\n{jobs_json}\n\n\
         --- FILTERS ---\n{filters_json}\n"
    );
    if !kind.supports_response_schema() {
        prompt.push('\n');
        prompt.push_str(JSON_ONLY_REMINDER);
    }
    prompt
}

/// Output schema in the provider's OpenAPI subset (upper-case type names).
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "jobMatches": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "title": { "type": "STRING" },
                        "company": { "type": "STRING" },
                        "location": {
                            "type": "OBJECT",
                            "properties": {
                                "name": { "type": "STRING" },
                                "lat": { "type": "NUMBER" },
                                "lng": { "type": "NUMBER" }
                            }
                        },
                        "salary": { "type": "STRING" },
                        "type": { "type": "STRING" },
                        "suitabilityPercentage": { "type": "NUMBER" }
                    },
                    "required": [
                        "id", "title", "company", "location",
                        "salary", "type", "suitabilityPercentage"
                    ]
                }
            },
            "cvAnalysis": {
                "type": "OBJECT",
                "properties": {
                    "strengths": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "weaknesses": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "extractedSkills": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "suggestedSkillsToLearn": { "type": "ARRAY", "items": { "type": "STRING" } }
                },
                "required": [
                    "strengths", "weaknesses", "extractedSkills", "suggestedSkillsToLearn"
                ]
            }
        },
        "required": ["jobMatches", "cvAnalysis"]
    })
}
