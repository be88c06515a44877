use serde_json::Value;
use tracing::warn;

use crate::error::ExtractionError;
use crate::model::issue::{
    IssueRecord, NO_CREATED_DATE, NO_STATUS, NO_SUMMARY, OTHERS, UNASSIGNED,
};
use crate::model::raw::{OptionField, RawIssue, RawResponse};

/// Custom field holding the improvement classification.
pub const DEFAULT_IMPROVEMENT_FIELD: &str = "customfield_35600";

/// Result of reading one search page.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<IssueRecord>,
    /// Total reported by the tracker for the whole query, not this page.
    pub total: u64,
    pub errors: Vec<ExtractionError>,
}

/// Turn one raw search page into canonical records.
///
/// Entries that cannot be read are logged and skipped; the rest of the page
/// is still extracted.
pub fn extract(raw: &RawResponse, project: &str, improvement_field: &str) -> Extraction {
    let mut out = Extraction {
        total: raw.total,
        ..Default::default()
    };

    for (index, entry) in raw.issues.iter().enumerate() {
        match extract_issue(entry, project, improvement_field) {
            Ok(record) => out.records.push(record),
            Err(reason) => {
                let err = ExtractionError {
                    index,
                    key: entry_key(entry),
                    reason,
                };
                warn!(project, error = %err, "skipping issue");
                out.errors.push(err);
            }
        }
    }

    out
}

fn extract_issue(
    entry: &Value,
    project: &str,
    improvement_field: &str,
) -> Result<IssueRecord, String> {
    let issue: RawIssue = serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;
    let fields = issue.fields;

    let improvement_type = match fields.custom.get(improvement_field) {
        None | Some(Value::Null) => OTHERS.to_string(),
        Some(value) => {
            let options: Vec<OptionField> = serde_json::from_value(value.clone())
                .map_err(|e| format!("{improvement_field}: {e}"))?;
            // Element zero as delivered; the tracker gives no ordering guarantee.
            options
                .into_iter()
                .next()
                .and_then(|o| o.value)
                .unwrap_or_else(|| OTHERS.to_string())
        }
    };

    Ok(IssueRecord {
        source: project.to_string(),
        program: project.to_string(),
        task_id: issue.key,
        status: fields
            .status
            .and_then(|s| s.name)
            .unwrap_or_else(|| NO_STATUS.to_string()),
        user_name: fields
            .assignee
            .and_then(|a| a.display_name)
            .unwrap_or_else(|| UNASSIGNED.to_string()),
        date_time: fields
            .created
            .unwrap_or_else(|| NO_CREATED_DATE.to_string()),
        task_name: fields.summary.unwrap_or_else(|| NO_SUMMARY.to_string()),
        improvement_type,
    })
}

fn entry_key(entry: &Value) -> String {
    entry
        .get("key")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string()
}
