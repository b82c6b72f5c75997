use std::fmt;

use crate::config::{DeschedulerConfiguration, RawDeschedulerConfiguration};

/// Where the effective kubeconfig path came from after defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `clientConnection.kubeconfig` was set.
    ClientConnection,
    /// Only the deprecated top-level `kubeconfigFile` was set; it was moved
    /// into the client connection.
    LegacyKubeconfigFile,
    /// Neither was set; the client discovers in-cluster credentials.
    InCluster,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientConnection => write!(f, "clientConnection.kubeconfig"),
            Self::LegacyKubeconfigFile => write!(f, "kubeconfigFile"),
            Self::InCluster => write!(f, "in-cluster"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The legacy value became the effective one.
    Migrated,
    /// The replacement was already set and the legacy value was dropped.
    Ignored { effective: String },
}

/// A deprecated field was present in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationNotice {
    pub field: &'static str,
    pub replacement: &'static str,
    pub legacy_value: String,
    pub resolution: Resolution,
}

impl fmt::Display for DeprecationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resolution {
            Resolution::Migrated => write!(
                f,
                "{} is deprecated, use {} instead; using {:?}",
                self.field, self.replacement, self.legacy_value
            ),
            Resolution::Ignored { effective } => write!(
                f,
                "{} is deprecated and ignored because {} is set; using {:?} instead of {:?}",
                self.field, self.replacement, effective, self.legacy_value
            ),
        }
    }
}

/// Output of [`set_defaults`]: a fully populated configuration that has not
/// been validated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaulted {
    pub config: DeschedulerConfiguration,
    pub credential_source: CredentialSource,
    pub notices: Vec<DeprecationNotice>,
}

// Path fields treat "" the same as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Fill every optional field and resolve deprecated-field precedence.
/// Never fails.
pub fn set_defaults(raw: RawDeschedulerConfiguration) -> Defaulted {
    let RawDeschedulerConfiguration {
        descheduling_interval,
        kubeconfig_file,
        policy_config_file,
        dry_run,
        node_selector,
        max_no_of_pods_to_evict_per_node,
        evict_local_storage_pods,
        ignore_pvc_pods,
        tracing: tracing_config,
        leader_election,
        logging,
        mut client_connection,
    } = raw;

    let mut notices = Vec::new();
    let legacy = non_empty(kubeconfig_file);
    let current = non_empty(client_connection.kubeconfig.take());

    let (kubeconfig, credential_source) = match (legacy, current) {
        (None, Some(current)) => (Some(current), CredentialSource::ClientConnection),
        (Some(legacy), None) => {
            notices.push(DeprecationNotice {
                field: "kubeconfigFile",
                replacement: "clientConnection.kubeconfig",
                legacy_value: legacy.clone(),
                resolution: Resolution::Migrated,
            });
            (Some(legacy), CredentialSource::LegacyKubeconfigFile)
        }
        (Some(legacy), Some(current)) => {
            notices.push(DeprecationNotice {
                field: "kubeconfigFile",
                replacement: "clientConnection.kubeconfig",
                legacy_value: legacy,
                resolution: Resolution::Ignored {
                    effective: current.clone(),
                },
            });
            (Some(current), CredentialSource::ClientConnection)
        }
        (None, None) => (None, CredentialSource::InCluster),
    };
    client_connection.kubeconfig = kubeconfig;

    for notice in &notices {
        tracing::warn!(
            field = notice.field,
            replacement = notice.replacement,
            "{notice}"
        );
    }

    let config = DeschedulerConfiguration {
        descheduling_interval,
        policy_config_file: policy_config_file.unwrap_or_default(),
        dry_run: dry_run.unwrap_or(false),
        node_selector: node_selector.unwrap_or_default(),
        max_no_of_pods_to_evict_per_node,
        evict_local_storage_pods: evict_local_storage_pods.unwrap_or(false),
        ignore_pvc_pods: ignore_pvc_pods.unwrap_or(false),
        tracing: tracing_config.into_defaulted(),
        leader_election: leader_election.into_defaulted(),
        logging: logging.into_defaulted(),
        client_connection: client_connection.into_defaulted(),
    };

    tracing::debug!(credential_source = %credential_source, "Configuration defaulted");

    Defaulted {
        config,
        credential_source,
        notices,
    }
}
