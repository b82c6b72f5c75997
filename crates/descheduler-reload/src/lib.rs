//! Loading and hot-reloading of the descheduler configuration.
//!
//! [`ConfigStore`] fetches a document from a [`ConfigSource`], runs it
//! through defaulting and validation, and publishes the result with an atomic
//! swap so readers never observe a partially applied configuration.

pub mod event;
pub mod source;
pub mod store;

pub use event::{ChannelEventSink, ConfigEvent, EventSink, TracingEventSink};
pub use source::{ConfigSource, FileSource, StaticSource};
pub use store::{ConfigSnapshot, ConfigStore};
