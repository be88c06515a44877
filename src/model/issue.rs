use serde::Serialize;

pub const NO_STATUS: &str = "No Status";
pub const UNASSIGNED: &str = "Unassigned";
pub const NO_CREATED_DATE: &str = "No Created Date";
pub const NO_SUMMARY: &str = "No Summary";
pub const OTHERS: &str = "Others";

/// Header of the collected store file, one column per extracted field.
pub const STORE_HEADER: [&str; 7] = [
    "Project",
    "Key",
    "Status",
    "Assignee",
    "Created",
    "Summary",
    "Improvement Type",
];

/// Header of the full-mode merge output.
pub const CANONICAL_HEADER: [&str; 8] = [
    "Source",
    "Program",
    "Task_ID",
    "Status",
    "User_Name",
    "Date_Time",
    "Task_Name",
    "Improvement_Type",
];

/// One issue in the unified shape shared by every source.
///
/// Serializes with the full-mode merge column names. The collected store
/// uses its own column layout, see [`IssueRecord::store_row`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRecord {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Program")]
    pub program: String,
    #[serde(rename = "Task_ID")]
    pub task_id: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "User_Name")]
    pub user_name: String,
    #[serde(rename = "Date_Time")]
    pub date_time: String,
    #[serde(rename = "Task_Name")]
    pub task_name: String,
    #[serde(rename = "Improvement_Type")]
    pub improvement_type: String,
}

impl IssueRecord {
    pub fn store_row(&self) -> [&str; 7] {
        [
            &self.program,
            &self.task_id,
            &self.status,
            &self.user_name,
            &self.date_time,
            &self.task_name,
            &self.improvement_type,
        ]
    }

    /// Rebuild a record from a store row. The project column doubles as the
    /// source label for tracker records.
    pub fn from_store_row(row: &csv::StringRecord) -> Option<Self> {
        let field = |i: usize| row.get(i).map(str::to_string);
        let program = field(0)?;
        Some(Self {
            source: program.clone(),
            program,
            task_id: field(1)?,
            status: field(2)?,
            user_name: field(3)?,
            date_time: field(4)?,
            task_name: field(5)?,
            improvement_type: field(6)?,
        })
    }
}
