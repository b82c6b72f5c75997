use serde::{Deserialize, Serialize};

use crate::validation::{FieldPath, Validate, ValidationErrors};

pub const DEFAULT_SERVICE_NAME: &str = "descheduler";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_SAMPLE_RATE: f64 = 1.0;

/// Tracing options as written in the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTracingConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
}

/// OpenTelemetry exporter settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingConfiguration {
    /// Collector address. Empty disables tracing (no-op provider).
    pub collector_endpoint: String,
    /// Certificate for the collector connection. Empty means insecure.
    pub transport_cert: String,
    pub service_name: String,
    pub namespace: String,
    /// Fraction of traces kept, 1.0 keeps all of them.
    pub sample_rate: f64,
}

impl TracingConfiguration {
    pub fn is_enabled(&self) -> bool {
        !self.collector_endpoint.is_empty()
    }

    pub fn is_insecure(&self) -> bool {
        self.transport_cert.is_empty()
    }
}

impl Default for TracingConfiguration {
    fn default() -> Self {
        RawTracingConfiguration::default().into_defaulted()
    }
}

impl RawTracingConfiguration {
    pub fn into_defaulted(self) -> TracingConfiguration {
        TracingConfiguration {
            collector_endpoint: self.collector_endpoint.unwrap_or_default(),
            transport_cert: self.transport_cert.unwrap_or_default(),
            service_name: non_empty_or(self.service_name, DEFAULT_SERVICE_NAME),
            namespace: non_empty_or(self.namespace, DEFAULT_NAMESPACE),
            sample_rate: self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        }
    }
}

// An explicit empty string is treated like an absent one for name-like fields.
fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

impl Validate for TracingConfiguration {
    fn validate_into(&self, path: &FieldPath, errors: &mut ValidationErrors) {
        if !(0.0..=1.0).contains(&self.sample_rate) {
            errors.invalid(
                path.child("sampleRate"),
                format!("must be in [0,1], got {}", self.sample_rate),
            );
        }
    }
}
