//! Configuration model for the descheduler.
//!
//! A document moves through three stages, each with its own type:
//! [`RawDeschedulerConfiguration`] (as parsed, every field optional),
//! [`Defaulted`] (every field populated, deprecated fields resolved) and
//! [`ValidatedConfiguration`] (frozen, shareable, only produced by
//! [`validate`]). A rejected document yields [`ValidationErrors`] listing
//! every violated invariant.

pub mod client_connection;
pub mod config;
pub mod defaults;
pub mod error;
pub mod leader_election;
pub mod logging;
pub mod selector;
pub mod telemetry;
pub mod validation;

pub use client_connection::ClientConnectionConfiguration;
pub use config::{load_from_file, load_from_str, DeschedulerConfiguration, RawDeschedulerConfiguration};
pub use defaults::{set_defaults, CredentialSource, Defaulted, DeprecationNotice, Resolution};
pub use error::{ConfigError, ConfigResult};
pub use leader_election::LeaderElectionConfiguration;
pub use logging::{LoggingConfiguration, VModuleItem};
pub use telemetry::TracingConfiguration;
pub use validation::{
    validate, FieldError, FieldErrorKind, FieldPath, ValidatedConfiguration, ValidationErrors,
};
