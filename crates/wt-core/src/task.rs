//! Trackable work items.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Which host page a task was captured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CaptureType {
    AzureDevops,
    Glpi,
    #[default]
    Other,
}

impl CaptureType {
    /// String representation used in persisted state and exports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AzureDevops => "azure_devops",
            Self::Glpi => "glpi",
            Self::Other => "other",
        }
    }

    /// Lenient normalization: unknown, empty, or legacy labels become [`Self::Other`].
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for CaptureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureType {
    type Err = UnknownCaptureType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure_devops" => Ok(Self::AzureDevops),
            "glpi" => Ok(Self::Glpi),
            "other" | "outros" => Ok(Self::Other),
            _ => Err(UnknownCaptureType(s.to_string())),
        }
    }
}

impl Serialize for CaptureType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CaptureType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map(Self::normalize).unwrap_or_default())
    }
}

/// Error type for capture type strings outside the known set.
#[derive(Debug, Clone)]
pub struct UnknownCaptureType(String);

impl fmt::Display for UnknownCaptureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown capture type: {}", self.0)
    }
}

impl std::error::Error for UnknownCaptureType {}

/// Identifying metadata for a trackable unit of work.
///
/// The core only looks at `id`; the other fields are carried through to
/// records and exports untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub project_name: String,
    #[serde(default)]
    pub capture_type: CaptureType,
}

impl TaskRef {
    /// Creates a task with empty metadata.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: String::new(),
            project_name: String::new(),
            capture_type: CaptureType::Other,
        }
    }

    #[must_use]
    pub fn with_project(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = project_name.into();
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub const fn with_capture_type(mut self, capture_type: CaptureType) -> Self {
        self.capture_type = capture_type;
        self
    }

    /// Returns true if both refer to the same work item.
    #[must_use]
    pub fn is_same_task(&self, other: &Self) -> bool {
        normalize_id(&self.id) == normalize_id(&other.id)
    }
}

/// String-normalizes a task id for comparisons.
#[must_use]
pub fn normalize_id(id: &str) -> &str {
    id.trim()
}

/// Accepts text written as a JSON string, number, or null.
///
/// Ids in particular arrive as numbers from some capture sources.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

/// Renders a loosely-typed JSON scalar as a string; null becomes empty.
pub(crate) fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
