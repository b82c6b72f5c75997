use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::client_connection::{ClientConnectionConfiguration, RawClientConnectionConfiguration};
use crate::defaults::set_defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::leader_election::{LeaderElectionConfiguration, RawLeaderElectionConfiguration};
use crate::logging::{LoggingConfiguration, RawLoggingConfiguration};
use crate::telemetry::{RawTracingConfiguration, TracingConfiguration};
use crate::validation::{validate, ValidatedConfiguration};

/// The configuration document as written. Every field is optional so that an
/// explicit `0`, `false` or `""` can be told apart from an omitted field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeschedulerConfiguration {
    /// Time between descheduling passes, e.g. "5m".
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub descheduling_interval: Option<Duration>,
    /// Deprecated: use `clientConnection.kubeconfig`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_config_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_no_of_pods_to_evict_per_node: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evict_local_storage_pods: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_pvc_pods: Option<bool>,
    #[serde(default)]
    pub tracing: RawTracingConfiguration,
    #[serde(default)]
    pub leader_election: RawLeaderElectionConfiguration,
    #[serde(default)]
    pub logging: RawLoggingConfiguration,
    #[serde(default)]
    pub client_connection: RawClientConnectionConfiguration,
}

impl RawDeschedulerConfiguration {
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Fully defaulted configuration.
///
/// The deprecated `kubeconfigFile` has no counterpart here: by the time a
/// value of this type exists it has been folded into `client_connection`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeschedulerConfiguration {
    /// `None` means a single pass.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub descheduling_interval: Option<Duration>,
    pub policy_config_file: String,
    pub dry_run: bool,
    pub node_selector: String,
    /// Per-node eviction cap for one pass. `None` leaves the policy's limits alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_no_of_pods_to_evict_per_node: Option<i32>,
    pub evict_local_storage_pods: bool,
    pub ignore_pvc_pods: bool,
    pub tracing: TracingConfiguration,
    pub leader_election: LeaderElectionConfiguration,
    pub logging: LoggingConfiguration,
    pub client_connection: ClientConnectionConfiguration,
}

impl DeschedulerConfiguration {
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Parse, default and validate a YAML document.
pub fn load_from_str(content: &str) -> ConfigResult<ValidatedConfiguration> {
    let raw = RawDeschedulerConfiguration::from_yaml_str(content)?;
    Ok(validate(set_defaults(raw))?)
}

/// Read, parse, default and validate a configuration file.
pub fn load_from_file(path: &Path) -> ConfigResult<ValidatedConfiguration> {
    let raw = RawDeschedulerConfiguration::from_file(path)?;
    let validated = validate(set_defaults(raw))?;
    tracing::info!(path = %path.display(), "Loaded descheduler configuration");
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
deschedulingInterval: 10m
policyConfigFile: /etc/descheduler/policy.yaml
dryRun: true
nodeSelector: "node-role.kubernetes.io/worker="
maxNoOfPodsToEvictPerNode: 5
evictLocalStoragePods: true
ignorePvcPods: true
tracing:
  collectorEndpoint: "otel:4317"
  sampleRate: 0.5
leaderElection:
  leaderElect: true
logging:
  format: json
clientConnection:
  kubeconfig: /root/.kube/config
  qps: 20
"#;
        let raw = RawDeschedulerConfiguration::from_yaml_str(yaml).unwrap();
        assert_eq!(raw.descheduling_interval, Some(Duration::from_secs(600)));
        assert_eq!(raw.dry_run, Some(true));
        assert_eq!(raw.max_no_of_pods_to_evict_per_node, Some(5));
        assert_eq!(raw.evict_local_storage_pods, Some(true));
        assert_eq!(raw.ignore_pvc_pods, Some(true));
        assert_eq!(raw.tracing.sample_rate, Some(0.5));
        assert_eq!(raw.leader_election.leader_elect, Some(true));
        assert_eq!(raw.client_connection.qps, Some(20.0));
        assert_eq!(raw.kubeconfig_file, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let raw = RawDeschedulerConfiguration::from_yaml_str(
            "apiVersion: descheduler/v1alpha1\nkind: DeschedulerConfiguration\ndryRun: true\n",
        )
        .unwrap();
        assert_eq!(raw.dry_run, Some(true));
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let err = RawDeschedulerConfiguration::from_yaml_str("dryRun: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = RawDeschedulerConfiguration::from_yaml_str("deschedulingInterval: soon\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_str_rejects_invalid() {
        let err = load_from_str("maxNoOfPodsToEvictPerNode: -2\ndryRun: true\n").unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations.touches("maxNoOfPodsToEvictPerNode"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "deschedulingInterval: 1h\npolicyConfigFile: /p.yaml").unwrap();

        let valid = load_from_file(file.path()).unwrap();
        assert_eq!(valid.descheduling_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(valid.policy_config_file(), "/p.yaml");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_from_file(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_to_yaml_uses_document_field_names() {
        let valid = load_from_str("policyConfigFile: /p\ndeschedulingInterval: 5m\n").unwrap();
        let yaml = valid.config().to_yaml().unwrap();
        assert!(yaml.contains("policyConfigFile: /p"));
        assert!(yaml.contains("deschedulingInterval: 5m"));
        assert!(yaml.contains("serviceName: descheduler"));
        assert!(!yaml.contains("kubeconfigFile"));
    }
}
