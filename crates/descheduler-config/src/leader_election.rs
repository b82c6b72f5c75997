use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::validation::{require_positive, FieldPath, Validate, ValidationErrors};

/// Resource lock kinds the leader elector knows how to hold.
pub const SUPPORTED_RESOURCE_LOCKS: &[&str] = &["leases", "endpointsleases", "configmapsleases"];

/// Retry jitter applied by the elector; the renew deadline must leave room for it.
pub const JITTER_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLeaderElectionConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_elect: Option<bool>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub lease_duration: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub renew_deadline: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub retry_period: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_lock: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_namespace: Option<String>,
}

/// Settings handed to the leader-election runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderElectionConfiguration {
    pub leader_elect: bool,
    /// How long non-leaders wait after observing a renewal before trying to take over.
    #[serde(with = "humantime_serde")]
    pub lease_duration: Duration,
    /// How long the acting leader keeps retrying a renewal before giving up.
    #[serde(with = "humantime_serde")]
    pub renew_deadline: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_period: Duration,
    pub resource_lock: String,
    pub resource_name: String,
    pub resource_namespace: String,
}

fn default_lease_duration() -> Duration {
    Duration::from_secs(15)
}

fn default_renew_deadline() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_period() -> Duration {
    Duration::from_secs(2)
}

fn default_resource_lock() -> String {
    "leases".to_string()
}

fn default_resource_name() -> String {
    "descheduler".to_string()
}

fn default_resource_namespace() -> String {
    "kube-system".to_string()
}

impl Default for LeaderElectionConfiguration {
    fn default() -> Self {
        RawLeaderElectionConfiguration::default().into_defaulted()
    }
}

impl RawLeaderElectionConfiguration {
    pub fn into_defaulted(self) -> LeaderElectionConfiguration {
        LeaderElectionConfiguration {
            leader_elect: self.leader_elect.unwrap_or(false),
            lease_duration: self.lease_duration.unwrap_or_else(default_lease_duration),
            renew_deadline: self.renew_deadline.unwrap_or_else(default_renew_deadline),
            retry_period: self.retry_period.unwrap_or_else(default_retry_period),
            resource_lock: self.resource_lock.unwrap_or_else(default_resource_lock),
            resource_name: self.resource_name.unwrap_or_else(default_resource_name),
            resource_namespace: self
                .resource_namespace
                .unwrap_or_else(default_resource_namespace),
        }
    }
}

impl Validate for LeaderElectionConfiguration {
    fn validate_into(&self, path: &FieldPath, errors: &mut ValidationErrors) {
        // Timings and lock identity only matter once election is switched on.
        if !self.leader_elect {
            return;
        }

        require_positive(self.lease_duration, path.child("leaseDuration"), errors);
        require_positive(self.renew_deadline, path.child("renewDeadline"), errors);
        require_positive(self.retry_period, path.child("retryPeriod"), errors);

        if self.lease_duration <= self.renew_deadline {
            errors.invalid(
                path.child("leaseDuration"),
                format!(
                    "must be greater than renewDeadline ({:?}), got {:?}",
                    self.renew_deadline, self.lease_duration
                ),
            );
        }

        let jittered_retry = self.retry_period.as_secs_f64() * JITTER_FACTOR;
        if self.renew_deadline.as_secs_f64() <= jittered_retry {
            errors.invalid(
                path.child("renewDeadline"),
                format!(
                    "must be greater than retryPeriod*{JITTER_FACTOR} ({jittered_retry}s), got {:?}",
                    self.renew_deadline
                ),
            );
        }

        if !SUPPORTED_RESOURCE_LOCKS.contains(&self.resource_lock.as_str()) {
            errors.not_supported(
                path.child("resourceLock"),
                &self.resource_lock,
                SUPPORTED_RESOURCE_LOCKS,
            );
        }
        if self.resource_name.trim().is_empty() {
            errors.required(path.child("resourceName"), "must be set when leaderElect is true");
        }
        if self.resource_namespace.trim().is_empty() {
            errors.required(
                path.child("resourceNamespace"),
                "must be set when leaderElect is true",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violations(config: &LeaderElectionConfiguration) -> Vec<String> {
        let mut errors = ValidationErrors::new();
        config.validate_into(&FieldPath::root("leaderElection"), &mut errors);
        errors.iter().map(|e| e.path.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let le = LeaderElectionConfiguration::default();
        assert!(!le.leader_elect);
        assert_eq!(le.lease_duration, Duration::from_secs(15));
        assert_eq!(le.renew_deadline, Duration::from_secs(10));
        assert_eq!(le.retry_period, Duration::from_secs(2));
        assert_eq!(le.resource_lock, "leases");
        assert_eq!(le.resource_name, "descheduler");
        assert_eq!(le.resource_namespace, "kube-system");
    }

    #[test]
    fn test_enabled_defaults_are_valid() {
        let le = LeaderElectionConfiguration {
            leader_elect: true,
            ..Default::default()
        };
        assert!(violations(&le).is_empty());
    }

    #[test]
    fn test_disabled_skips_checks() {
        let le = LeaderElectionConfiguration {
            leader_elect: false,
            lease_duration: Duration::ZERO,
            resource_lock: "bogus".into(),
            ..Default::default()
        };
        assert!(violations(&le).is_empty());
    }

    #[test]
    fn test_lease_must_exceed_renew_deadline() {
        let le = LeaderElectionConfiguration {
            leader_elect: true,
            lease_duration: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(violations(&le), vec!["leaderElection.leaseDuration"]);
    }

    #[test]
    fn test_renew_deadline_must_exceed_jittered_retry() {
        let le = LeaderElectionConfiguration {
            leader_elect: true,
            renew_deadline: Duration::from_secs(3),
            retry_period: Duration::from_millis(2600),
            ..Default::default()
        };
        assert_eq!(violations(&le), vec!["leaderElection.renewDeadline"]);
    }

    #[test]
    fn test_lock_and_identity_checked() {
        let le = LeaderElectionConfiguration {
            leader_elect: true,
            resource_lock: "configmaps".into(),
            resource_name: String::new(),
            resource_namespace: " ".into(),
            ..Default::default()
        };
        assert_eq!(
            violations(&le),
            vec![
                "leaderElection.resourceLock",
                "leaderElection.resourceName",
                "leaderElection.resourceNamespace",
            ]
        );
    }

    #[test]
    fn test_raw_durations_parse_humantime() {
        let raw: RawLeaderElectionConfiguration =
            serde_yaml::from_str("leaderElect: true\nleaseDuration: 30s\nretryPeriod: 500ms\n")
                .unwrap();
        let le = raw.into_defaulted();
        assert!(le.leader_elect);
        assert_eq!(le.lease_duration, Duration::from_secs(30));
        assert_eq!(le.retry_period, Duration::from_millis(500));
        assert_eq!(le.renew_deadline, Duration::from_secs(10));
    }
}
