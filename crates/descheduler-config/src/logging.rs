use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::validation::{require_positive, FieldPath, Validate, ValidationErrors};

pub const SUPPORTED_FORMATS: &[&str] = &["text", "json"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLoggingConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub flush_frequency: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmodule: Option<Vec<VModuleItem>>,
}

/// Per-file verbosity override, e.g. `{filePattern: "pod*", verbosity: 4}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VModuleItem {
    pub file_pattern: String,
    pub verbosity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfiguration {
    pub format: String,
    #[serde(with = "humantime_serde")]
    pub flush_frequency: Duration,
    pub verbosity: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vmodule: Vec<VModuleItem>,
}

fn default_format() -> String {
    "text".to_string()
}

fn default_flush_frequency() -> Duration {
    Duration::from_secs(5)
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        RawLoggingConfiguration::default().into_defaulted()
    }
}

impl RawLoggingConfiguration {
    pub fn into_defaulted(self) -> LoggingConfiguration {
        LoggingConfiguration {
            format: self.format.unwrap_or_else(default_format),
            flush_frequency: self.flush_frequency.unwrap_or_else(default_flush_frequency),
            verbosity: self.verbosity.unwrap_or(0),
            vmodule: self.vmodule.unwrap_or_default(),
        }
    }
}

impl Validate for LoggingConfiguration {
    fn validate_into(&self, path: &FieldPath, errors: &mut ValidationErrors) {
        if !SUPPORTED_FORMATS.contains(&self.format.as_str()) {
            errors.not_supported(path.child("format"), &self.format, SUPPORTED_FORMATS);
        }
        require_positive(self.flush_frequency, path.child("flushFrequency"), errors);

        for (i, item) in self.vmodule.iter().enumerate() {
            let item_path = path.child("vmodule").index(i).child("filePattern");
            if item.file_pattern.is_empty() {
                errors.required(item_path, "must not be empty");
            } else if item.file_pattern.contains(['=', ',']) {
                errors.invalid(
                    item_path,
                    format!("must not contain '=' or ',', got {:?}", item.file_pattern),
                );
            }
        }
    }
}
