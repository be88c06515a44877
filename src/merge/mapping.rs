use std::collections::BTreeMap;

use csv::StringRecord;

use crate::error::MergeError;
use crate::model::issue::IssueRecord;

/// Canonical columns a mapping can fill. `Source` always comes from the
/// input's label.
pub const MAPPED_COLUMNS: [&str; 7] = [
    "Program",
    "Task_ID",
    "Status",
    "User_Name",
    "Date_Time",
    "Task_Name",
    "Improvement_Type",
];

pub const TRACKER: &str = "tracker";
pub const WORKSHEET: &str = "worksheet";
pub const CANONICAL: &str = "canonical";

/// Canonical column name to source column name, for one kind of input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub name: String,
    pub columns: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new<'a>(name: &str, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            name: name.to_string(),
            columns: pairs
                .into_iter()
                .map(|(canonical, source)| (canonical.to_string(), source.to_string()))
                .collect(),
        }
    }

    /// Resolve the mapping against one file's header row. Header names are
    /// matched exactly.
    pub fn bind(&self, headers: &StringRecord) -> BoundMapping {
        let position = |canonical: &str| {
            let wanted = self.columns.get(canonical)?;
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == wanted)
        };
        BoundMapping {
            indices: MAPPED_COLUMNS.map(position),
        }
    }
}

/// A mapping resolved to column positions of one file.
pub struct BoundMapping {
    indices: [Option<usize>; 7],
}

impl BoundMapping {
    /// Columns the file lacks become empty strings.
    pub fn apply(&self, label: &str, row: &StringRecord) -> IssueRecord {
        let [program, task_id, status, user_name, date_time, task_name, improvement_type] = self
            .indices
            .map(|i| i.and_then(|i| row.get(i)).unwrap_or_default().to_string());
        IssueRecord {
            source: label.to_string(),
            program,
            task_id,
            status,
            user_name,
            date_time,
            task_name,
            improvement_type,
        }
    }

    pub fn missing(&self) -> Vec<&'static str> {
        MAPPED_COLUMNS
            .iter()
            .zip(self.indices)
            .filter(|(_, i)| i.is_none())
            .map(|(c, _)| *c)
            .collect()
    }
}

/// Built-in tables plus any declared in config.
pub struct MappingTables {
    tables: BTreeMap<String, ColumnMapping>,
}

impl MappingTables {
    pub fn builtin() -> Self {
        let tables = [
            ColumnMapping::new(
                TRACKER,
                [
                    ("Program", "Project"),
                    ("Task_ID", "Key"),
                    ("Status", "Status"),
                    ("User_Name", "Assignee"),
                    ("Date_Time", "Created"),
                    ("Task_Name", "Summary"),
                    ("Improvement_Type", "Improvement Type"),
                ],
            ),
            ColumnMapping::new(
                WORKSHEET,
                [
                    ("Program", "program"),
                    ("Task_ID", "task_id"),
                    ("Status", "status_name"),
                    ("User_Name", "user_name"),
                    ("Date_Time", "date_time_req"),
                    ("Task_Name", "task_name"),
                    ("Improvement_Type", "improvement_type"),
                ],
            ),
            ColumnMapping::new(CANONICAL, MAPPED_COLUMNS.map(|c| (c, c))),
        ];
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Built-ins overlaid with `extra`; a configured table replaces a
    /// built-in of the same name.
    pub fn with_extra(extra: &BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let mut tables = Self::builtin();
        for (name, columns) in extra {
            tables.tables.insert(
                name.clone(),
                ColumnMapping {
                    name: name.clone(),
                    columns: columns.clone(),
                },
            );
        }
        tables
    }

    pub fn get(&self, name: &str) -> Result<&ColumnMapping, MergeError> {
        self.tables
            .get(name)
            .ok_or_else(|| MergeError::UnknownMapping(name.to_string()))
    }

    /// The first table whose every source column appears in `headers`.
    pub fn detect(&self, headers: &StringRecord) -> Option<&ColumnMapping> {
        self.tables
            .values()
            .find(|t| !t.columns.is_empty() && t.bind(headers).missing().len() == unmapped(t))
    }
}

/// Canonical columns a table leaves out; these stay missing after binding.
fn unmapped(table: &ColumnMapping) -> usize {
    MAPPED_COLUMNS
        .iter()
        .filter(|c| !table.columns.contains_key(**c))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn tracker_table_maps_store_header() {
        let tables = MappingTables::builtin();
        let headers = record(&[
            "Project", "Key", "Status", "Assignee", "Created", "Summary", "Improvement Type",
        ]);
        let bound = tables.get(TRACKER).unwrap().bind(&headers);
        assert!(bound.missing().is_empty());

        let row = record(&["SUMMIT", "SUM-1", "Open", "Jane", "2024-01-01", "Fix it", "Yield"]);
        let r = bound.apply("jira_issues", &row);
        assert_eq!(r.source, "jira_issues");
        assert_eq!(r.program, "SUMMIT");
        assert_eq!(r.task_id, "SUM-1");
        assert_eq!(r.user_name, "Jane");
        assert_eq!(r.task_name, "Fix it");
        assert_eq!(r.improvement_type, "Yield");
    }

    #[test]
    fn names_are_not_case_folded() {
        let tables = MappingTables::builtin();
        let headers = record(&["program", "task_id"]);
        let bound = tables.get(TRACKER).unwrap().bind(&headers);
        assert_eq!(bound.missing().len(), 7);
    }

    #[test]
    fn absent_columns_are_empty_not_sentinels() {
        let tables = MappingTables::builtin();
        let headers = record(&["program", "task_id", "task_name"]);
        let bound = tables.get(WORKSHEET).unwrap().bind(&headers);
        assert_eq!(
            bound.missing(),
            ["Status", "User_Name", "Date_Time", "Improvement_Type"]
        );

        let r = bound.apply("WW2619", &record(&["WW", "WW-9", "Calibrate"]));
        assert_eq!(r.task_id, "WW-9");
        assert_eq!(r.user_name, "");
        assert_eq!(r.improvement_type, "");
    }

    #[test]
    fn configured_table_overrides_builtin() {
        let mut extra = BTreeMap::new();
        extra.insert(
            WORKSHEET.to_string(),
            BTreeMap::from([("Task_ID".to_string(), "Ticket".to_string())]),
        );
        let tables = MappingTables::with_extra(&extra);
        let mapping = tables.get(WORKSHEET).unwrap();
        assert_eq!(mapping.columns.len(), 1);
        assert_eq!(mapping.columns["Task_ID"], "Ticket");
        assert!(tables.get(TRACKER).is_ok());
    }

    #[test]
    fn detects_table_from_header() {
        let tables = MappingTables::builtin();
        let store = record(&[
            "Project", "Key", "Status", "Assignee", "Created", "Summary", "Improvement Type",
        ]);
        assert_eq!(tables.detect(&store).unwrap().name, TRACKER);

        let ww = record(&[
            "program", "task_id", "status_name", "user_name", "date_time_req", "task_name",
            "improvement_type", "notes",
        ]);
        assert_eq!(tables.detect(&ww).unwrap().name, WORKSHEET);

        assert!(tables.detect(&record(&["Project", "Key", "Status"])).is_none());
    }

    #[test]
    fn unknown_table_is_an_error() {
        let tables = MappingTables::builtin();
        assert!(matches!(
            tables.get("nope"),
            Err(MergeError::UnknownMapping(name)) if name == "nope"
        ));
    }
}
