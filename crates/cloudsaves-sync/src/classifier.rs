//! Listing error classification
//!
//! A sync run lists the remote save folder first. On a first run that folder
//! usually does not exist yet, and every provider reports that differently.
//! [`ErrorClassifier`] decides whether a listing error means "folder missing"
//! (recoverable: create it and carry on) or anything else (the run fails).
//!
//! ## Design Notes
//!
//! - An interrupted or failed request starts out irrecoverable.
//! - For failed requests the body is parsed as JSON. Bodies that do not parse
//!   are passed through the configured [`BodyRepair`] list, first successful
//!   parse wins. The default list holds [`StrayPeriodRepair`] for a provider
//!   that injects `.` characters into otherwise valid JSON.
//! - Structured "not found" shapes and known literal phrases in the raw body
//!   are checked independently; either one makes the error recoverable.

use cloudsaves_core::domain::ErrorResponse;
use serde_json::Value;
use tracing::{debug, warn};

/// Literal phrases that mean the remote save folder (or one of its parents)
/// does not exist yet.
const MISSING_FOLDER_PHRASES: &[&str] = &[
    "subdirectory not found",
    "no such file found in its parent directory",
];

/// Rewrites an unparsable error body into something that may parse
pub trait BodyRepair: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Repaired body, or `None` if this repair does not apply
    fn repair(&self, body: &str) -> Option<String>;
}

/// Replaces every `.` with a space
#[derive(Debug, Clone, Copy, Default)]
pub struct StrayPeriodRepair;

impl BodyRepair for StrayPeriodRepair {
    fn name(&self) -> &'static str {
        "stray-period"
    }

    fn repair(&self, body: &str) -> Option<String> {
        body.contains('.').then(|| body.replace('.', " "))
    }
}

/// Decides whether a listing error is fatal to the sync run
pub struct ErrorClassifier {
    repairs: Vec<Box<dyn BodyRepair>>,
}

impl ErrorClassifier {
    /// A classifier with no body repairs
    pub fn new() -> Self {
        Self {
            repairs: Vec::new(),
        }
    }

    /// Append a body repair, tried after the ones already registered
    #[must_use]
    pub fn with_repair(mut self, repair: impl BodyRepair + 'static) -> Self {
        self.repairs.push(Box::new(repair));
        self
    }

    /// Number of registered body repairs
    pub fn repairs_count(&self) -> usize {
        self.repairs.len()
    }

    /// Returns true unless the error says the remote folder is missing
    pub fn is_irrecoverable(&self, error: &ErrorResponse) -> bool {
        let mut irrecoverable = error.interrupted || error.failed;
        if !error.failed {
            return irrecoverable;
        }

        debug!(body = %error.body, status = ?error.http_status, "Classifying listing error");

        if let Some(value) = self.parse_body(&error.body) {
            if reports_not_found(&value) {
                irrecoverable = false;
            }
        }

        if mentions_missing_folder(&error.body) {
            irrecoverable = false;
        }

        irrecoverable
    }

    fn parse_body(&self, body: &str) -> Option<Value> {
        if let Ok(value) = serde_json::from_str(body) {
            return Some(value);
        }
        self.repairs.iter().find_map(|repair| {
            let repaired = repair.repair(body)?;
            let value = serde_json::from_str(&repaired).ok()?;
            debug!(repair = repair.name(), "Error body parsed after repair");
            Some(value)
        })
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new().with_repair(StrayPeriodRepair)
    }
}

/// Structured "not found" shapes
///
/// - `{"error_summary": "path/not_found/..."}`
/// - `{"error": {"code": "itemNotFound", ...}}`
fn reports_not_found(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    let mut not_found = false;

    if let Some(summary) = object.get("error_summary").and_then(Value::as_str) {
        if summary.contains("not_found") {
            not_found = true;
        }
    }

    if let Some(error) = object.get("error").and_then(Value::as_object) {
        match error.get("code") {
            Some(Value::String(code)) => {
                if code == "itemNotFound" {
                    not_found = true;
                }
            }
            Some(other) => warn!(code = %other, "Error object has a non-string code"),
            None => warn!("Error object has no code"),
        }
    }

    not_found
}

fn mentions_missing_folder(body: &str) -> bool {
    MISSING_FOLDER_PHRASES
        .iter()
        .any(|phrase| body.contains(phrase))
        || (body.contains("itemNotFound") && body.contains("Item does not exist"))
}
