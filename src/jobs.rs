//! Job listing extraction from prediction replies
//!
//! Job-search chatflows answer with a JSON array embedded in the reply text,
//! frequently wrapped in a markdown code fence or surrounded by prose. The
//! parser first tries the text as-is, then falls back to a tolerant scan
//! that slices from the first `[` to the last `]` before giving up.
//!
//! Records are coerced leniently: absent fields become empty strings,
//! unknown fields are ignored, and an element is never rejected for missing
//! fields. An empty array is a successful zero-job result, distinct from a
//! malformed payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single job listing extracted from a reply payload
///
/// The remote service controls the exact key set, so every field is a
/// plain string and defaults to empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job title (the `name` key is accepted as an alias)
    pub title: String,
    /// Hiring company
    pub company: String,
    /// Advertised wage or salary range
    pub wage: String,
    /// Job location
    pub location: String,
    /// Employment type (full-time, contract, ...)
    pub job_type: String,
    /// Posting URL
    pub url: String,
    /// Free-form listing details
    pub details: String,
    /// Why the listing matched the query
    pub explanation: String,
}

impl JobRecord {
    /// Coerce one array element into a record, field by field
    fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let title = match field(object, "title") {
            t if t.is_empty() => field(object, "name"),
            t => t,
        };

        Self {
            title,
            company: field(object, "company"),
            wage: field(object, "wage"),
            location: field(object, "location"),
            job_type: field(object, "job_type"),
            url: field(object, "url"),
            details: field(object, "details"),
            explanation: field(object, "explanation"),
        }
    }
}

/// Read a scalar field as a string; non-scalars and absent keys become empty
fn field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Failure to locate a job array in a reply payload
#[derive(Error, Debug)]
pub enum JobParseError {
    /// No parseable JSON array was found in the text
    #[error("malformed job payload: no JSON array found")]
    Malformed {
        /// The original text, retained for diagnostics
        raw: String,
    },
}

/// Extract job records from a reply text field
///
/// # Examples
///
/// ```
/// use parlance::jobs::parse_job_payload;
///
/// let jobs = parse_job_payload("```json\n[{\"title\":\"Welder\"}]\n```").unwrap();
/// assert_eq!(jobs[0].title, "Welder");
/// assert_eq!(jobs[0].company, "");
///
/// assert!(parse_job_payload("[]").unwrap().is_empty());
/// assert!(parse_job_payload("not json").is_err());
/// ```
pub fn parse_job_payload(raw: &str) -> Result<Vec<JobRecord>, JobParseError> {
    if let Some(jobs) = parse_array(raw) {
        return Ok(jobs);
    }
    if let Some(slice) = extract_array(raw) {
        if let Some(jobs) = parse_array(slice) {
            return Ok(jobs);
        }
    }
    Err(JobParseError::Malformed {
        raw: raw.to_string(),
    })
}

fn parse_array(text: &str) -> Option<Vec<JobRecord>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Some(items.iter().map(JobRecord::from_value).collect()),
        _ => None,
    }
}

/// Slice from the first `[` to the last `]`, tolerating any wrapper
fn extract_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}
