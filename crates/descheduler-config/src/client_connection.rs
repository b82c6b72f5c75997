use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::validation::{require_positive, FieldPath, Validate, ValidationErrors};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClientConnectionConfiguration {
    /// Path to kubeconfig. Takes precedence over the top-level `kubeconfigFile`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_content_types: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qps: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<i32>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// API server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConnectionConfiguration {
    /// Path to kubeconfig. Empty means in-cluster or default discovery.
    pub kubeconfig: String,
    pub accept_content_types: String,
    pub content_type: String,
    /// Sustained queries per second allowed towards the API server.
    pub qps: f32,
    /// Extra queries allowed above `qps` in a short burst.
    pub burst: i32,
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

fn default_content_type() -> String {
    "application/vnd.kubernetes.protobuf".to_string()
}

fn default_qps() -> f32 {
    50.0
}

fn default_burst() -> i32 {
    100
}

impl Default for ClientConnectionConfiguration {
    fn default() -> Self {
        RawClientConnectionConfiguration::default().into_defaulted()
    }
}

impl ClientConnectionConfiguration {
    /// `None` when the client should fall back to in-cluster credentials.
    pub fn kubeconfig_path(&self) -> Option<&str> {
        if self.kubeconfig.is_empty() {
            None
        } else {
            Some(&self.kubeconfig)
        }
    }
}

impl RawClientConnectionConfiguration {
    pub fn into_defaulted(self) -> ClientConnectionConfiguration {
        ClientConnectionConfiguration {
            kubeconfig: self.kubeconfig.unwrap_or_default(),
            accept_content_types: self.accept_content_types.unwrap_or_default(),
            content_type: self.content_type.unwrap_or_else(default_content_type),
            qps: self.qps.unwrap_or_else(default_qps),
            burst: self.burst.unwrap_or_else(default_burst),
            timeout: self.timeout,
        }
    }
}

impl Validate for ClientConnectionConfiguration {
    fn validate_into(&self, path: &FieldPath, errors: &mut ValidationErrors) {
        if !self.qps.is_finite() {
            errors.invalid(path.child("qps"), format!("must be a finite number, got {}", self.qps));
        }
        if self.burst < 0 {
            errors.invalid(
                path.child("burst"),
                format!("must be greater than or equal to 0, got {}", self.burst),
            );
        }
        if let Some(timeout) = self.timeout {
            require_positive(timeout, path.child("timeout"), errors);
        }
    }
}
