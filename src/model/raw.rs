use serde::Deserialize;
use serde_json::Value;

/// One page of a tracker search, as returned by `/rest/api/2/search`.
///
/// Issues stay untyped here so a single malformed entry can be rejected on
/// its own during extraction instead of failing the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub issues: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawIssue {
    pub key: String,
    pub fields: RawFields,
}

/// Field bag of one issue. Every field may be missing or `null`.
#[derive(Debug, Deserialize)]
pub struct RawFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<StatusField>,
    #[serde(default)]
    pub assignee: Option<UserField>,
    #[serde(default)]
    pub created: Option<String>,
    /// Custom fields, looked up by id at extraction time.
    #[serde(flatten)]
    pub custom: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct StatusField {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserField {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Element of a multi-select custom field.
#[derive(Debug, Deserialize)]
pub struct OptionField {
    #[serde(default)]
    pub value: Option<String>,
}
