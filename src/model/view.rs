use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::project::{Project, ProjectStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// How the project list is sorted. `None` at the use site means insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    /// Wire name of the project field, e.g. `name` or `taskCount`
    pub key: String,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: impl Into<String>, direction: SortDirection) -> Self {
        SortConfig {
            key: key.into(),
            direction,
        }
    }
}

/// Active project filters. Absent fields mean no filtering on that field.
///
/// Stored as a JSON object keyed by field name; empty strings read back as
/// "no filter" since that is what a cleared input box produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Case-insensitive substring match on the project name
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Exact status match
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<ProjectStatus>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().is_none_or(str::is_empty) && self.status.is_none()
    }
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

/// A project field value as seen by the sorter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortValue<'a> {
    Text(&'a str),
    Number(i64),
}

impl Project {
    /// Look up a field by its wire name. Unknown keys yield `None`.
    pub fn sort_value(&self, key: &str) -> Option<SortValue<'_>> {
        match key {
            "id" => Some(SortValue::Text(&self.id)),
            "name" => Some(SortValue::Text(&self.name)),
            "description" => Some(SortValue::Text(&self.description)),
            "status" => Some(SortValue::Text(self.status.as_str())),
            "taskCount" => Some(SortValue::Number(self.task_count)),
            "completedTaskCount" => Some(SortValue::Number(self.completed_task_count)),
            "createdAt" => Some(SortValue::Text(&self.created_at)),
            "updatedAt" => Some(SortValue::Text(&self.updated_at)),
            _ => None,
        }
    }
}
