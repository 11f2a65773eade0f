use crate::utils::error::UploadError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Names of the caller-identity columns appended to every accepted row.
pub const IDENTITY_FIELDS: [&str; 4] = ["providerId", "team", "teamId", "locationId"];

/// Column added to rejected rows in the report.
pub const REJECTION_REASON_FIELD: &str = "rejectionReason";

/// Identifiers already known to the reference service, fetched once per upload.
pub type ReferenceSet = HashSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Clients,
    Contacts,
    Results,
}

impl UploadType {
    pub const ALL: [UploadType; 3] = [UploadType::Clients, UploadType::Contacts, UploadType::Results];

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Clients => "clients",
            UploadType::Contacts => "contacts",
            UploadType::Results => "results",
        }
    }

    /// Reads the second underscore-delimited segment of `<prefix>_<type>_<suffix...>`.
    ///
    /// Returns `None` for any other value; the orchestrator defers that failure
    /// until the output directory is resolved.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        file_name
            .split('_')
            .nth(1)
            .and_then(|segment| segment.parse().ok())
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadType {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clients" => Ok(UploadType::Clients),
            "contacts" => Ok(UploadType::Contacts),
            "results" => Ok(UploadType::Results),
            other => Err(UploadError::InvalidUploadType {
                value: other.to_string(),
            }),
        }
    }
}

/// One data record of the uploaded CSV, read in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn get_named(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|index| self.get(index))
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRow {
    pub row: Row,
    pub outcome: Outcome,
}

/// A rejected row as reported back to the caller: its original fields plus
/// `rejectionReason`, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub row: Row,
    pub reason: String,
}

impl Serialize for RejectedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.row.values().len() + 1))?;
        for (column, value) in self.row.columns().iter().zip(self.row.values()) {
            map.serialize_entry(column, value)?;
        }
        map.serialize_entry(REJECTION_REASON_FIELD, &self.reason)?;
        map.end()
    }
}

/// An accepted row with the four caller-identity values appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRow {
    pub values: Vec<String>,
}

/// Provider, team and location attributes of the authenticated uploader.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    #[serde(deserialize_with = "string_or_number")]
    pub provider_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub team: String,
    #[serde(deserialize_with = "string_or_number")]
    pub team_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub location_id: String,
}

impl CallerIdentity {
    pub fn new(
        provider_id: impl Into<String>,
        team: impl Into<String>,
        team_id: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            team: team.into(),
            team_id: team_id.into(),
            location_id: location_id.into(),
        }
    }

    /// Values in the order of [`IDENTITY_FIELDS`].
    pub fn values(&self) -> [&str; 4] {
        [
            self.provider_id.as_str(),
            self.team.as_str(),
            self.team_id.as_str(),
            self.location_id.as_str(),
        ]
    }
}

/// The decoded bearer token attached by the authentication layer.
#[derive(Debug, Clone, Deserialize)]
pub struct DecodedToken {
    pub data: CallerIdentity,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {}",
            other
        ))),
    }
}

/// File attached to an upload request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub upload_type: UploadType,
    pub output_path: String,
    pub accepted_count: usize,
    pub rejected: bool,
    pub rejected_rows: Vec<RejectedRow>,
}

impl UploadReport {
    pub fn message(&self) -> String {
        format!(
            "{} upload processed: {} row(s) accepted",
            self.upload_type, self.accepted_count
        )
    }
}
