use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::client_connection::ClientConnectionConfiguration;
use crate::config::DeschedulerConfiguration;
use crate::defaults::{CredentialSource, Defaulted, DeprecationNotice};
use crate::leader_election::LeaderElectionConfiguration;
use crate::logging::LoggingConfiguration;
use crate::selector;
use crate::telemetry::TracingConfiguration;

/// Dotted path to a configuration field, e.g. `logging.vmodule[0].filePattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{name}", self.0))
    }

    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{i}]", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// A value the configuration cannot run without is missing or empty.
    Required,
    /// The value is present but outside its allowed range or shape.
    Invalid,
    /// The value is not one of an enumerated set.
    NotSupported,
}

/// A single violated invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub path: FieldPath,
    pub kind: FieldErrorKind,
    pub detail: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.detail)
    }
}

/// Every violation found in one validation run, in check order.
#[derive(Error, Debug, Clone, Default, PartialEq)]
#[error("{}", render(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn required(&mut self, path: FieldPath, detail: impl Into<String>) {
        self.push(path, FieldErrorKind::Required, detail);
    }

    pub fn invalid(&mut self, path: FieldPath, detail: impl Into<String>) {
        self.push(path, FieldErrorKind::Invalid, detail);
    }

    pub fn not_supported(&mut self, path: FieldPath, value: &str, supported: &[&str]) {
        self.push(
            path,
            FieldErrorKind::NotSupported,
            format!("unsupported value {value:?}, supported values: {}", supported.join(", ")),
        );
    }

    fn push(&mut self, path: FieldPath, kind: FieldErrorKind, detail: impl Into<String>) {
        self.errors.push(FieldError {
            path,
            kind,
            detail: detail.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any violation points at `path` or one of its children.
    pub fn touches(&self, path: &str) -> bool {
        self.errors.iter().any(|e| {
            let p = e.path.as_str();
            p == path
                || p.strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        })
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn render(errors: &[FieldError]) -> String {
    let mut out = format!("{} violation(s)", errors.len());
    for err in errors {
        out.push_str("\n  - ");
        out.push_str(&err.to_string());
    }
    out
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Invariant checks for one configuration sub-tree. Implementations record
/// every violation into `errors` and never stop at the first one.
pub trait Validate {
    fn validate_into(&self, path: &FieldPath, errors: &mut ValidationErrors);
}

pub(crate) fn require_positive(
    value: Duration,
    path: FieldPath,
    errors: &mut ValidationErrors,
) {
    if value.is_zero() {
        errors.invalid(path, "must be greater than zero");
    }
}

/// Check a defaulted configuration and freeze it when every invariant holds.
pub fn validate(defaulted: Defaulted) -> Result<ValidatedConfiguration, ValidationErrors> {
    let errors = check(&defaulted.config);
    errors.into_result()?;

    let Defaulted {
        config,
        credential_source,
        notices,
    } = defaulted;
    Ok(ValidatedConfiguration {
        inner: Arc::new(Frozen {
            config,
            credential_source,
            notices,
        }),
    })
}

/// Run every root-level check against `config`.
pub fn check(config: &DeschedulerConfiguration) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if let Some(interval) = config.descheduling_interval {
        require_positive(interval, FieldPath::root("deschedulingInterval"), &mut errors);
    }

    if !config.dry_run && config.policy_config_file.trim().is_empty() {
        errors.required(
            FieldPath::root("policyConfigFile"),
            "must be set unless dryRun is enabled",
        );
    }

    if let Err(e) = selector::parse(&config.node_selector) {
        errors.invalid(
            FieldPath::root("nodeSelector"),
            format!("malformed label selector {:?}: {e}", config.node_selector),
        );
    }

    if let Some(max) = config.max_no_of_pods_to_evict_per_node {
        if max < 0 {
            errors.invalid(
                FieldPath::root("maxNoOfPodsToEvictPerNode"),
                format!("must be greater than or equal to 0, got {max}"),
            );
        }
    }

    config
        .tracing
        .validate_into(&FieldPath::root("tracing"), &mut errors);
    config
        .leader_election
        .validate_into(&FieldPath::root("leaderElection"), &mut errors);
    config
        .logging
        .validate_into(&FieldPath::root("logging"), &mut errors);
    config
        .client_connection
        .validate_into(&FieldPath::root("clientConnection"), &mut errors);

    errors
}

#[derive(Debug)]
struct Frozen {
    config: DeschedulerConfiguration,
    credential_source: CredentialSource,
    notices: Vec<DeprecationNotice>,
}

/// A configuration that passed validation. Read-only; clones share the same
/// allocation and may be handed to any number of readers.
#[derive(Debug, Clone)]
pub struct ValidatedConfiguration {
    inner: Arc<Frozen>,
}

impl ValidatedConfiguration {
    pub fn config(&self) -> &DeschedulerConfiguration {
        &self.inner.config
    }

    pub fn descheduling_interval(&self) -> Option<Duration> {
        self.inner.config.descheduling_interval
    }

    /// True when no interval was configured and a single pass is expected.
    pub fn runs_once(&self) -> bool {
        self.inner.config.descheduling_interval.is_none()
    }

    pub fn policy_config_file(&self) -> &str {
        &self.inner.config.policy_config_file
    }

    pub fn dry_run(&self) -> bool {
        self.inner.config.dry_run
    }

    pub fn node_selector(&self) -> &str {
        &self.inner.config.node_selector
    }

    pub fn max_pods_to_evict_per_node(&self) -> Option<u32> {
        self.inner
            .config
            .max_no_of_pods_to_evict_per_node
            .and_then(|n| u32::try_from(n).ok())
    }

    pub fn evict_local_storage_pods(&self) -> bool {
        self.inner.config.evict_local_storage_pods
    }

    pub fn ignore_pvc_pods(&self) -> bool {
        self.inner.config.ignore_pvc_pods
    }

    pub fn tracing(&self) -> &TracingConfiguration {
        &self.inner.config.tracing
    }

    pub fn leader_election(&self) -> &LeaderElectionConfiguration {
        &self.inner.config.leader_election
    }

    pub fn logging(&self) -> &LoggingConfiguration {
        &self.inner.config.logging
    }

    pub fn client_connection(&self) -> &ClientConnectionConfiguration {
        &self.inner.config.client_connection
    }

    /// Which field the effective kubeconfig path came from.
    pub fn credential_source(&self) -> CredentialSource {
        self.inner.credential_source
    }

    pub fn deprecation_notices(&self) -> &[DeprecationNotice] {
        &self.inner.notices
    }

    /// True when both handles point at the same frozen instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
