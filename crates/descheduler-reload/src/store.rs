use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};

use descheduler_config::{
    set_defaults, validate, ConfigError, ConfigResult, RawDeschedulerConfiguration,
    ValidatedConfiguration,
};

use crate::event::{ConfigEvent, EventSink};
use crate::source::ConfigSource;

/// A published configuration together with where and when it was loaded.
#[derive(Debug)]
pub struct ConfigSnapshot {
    pub config: ValidatedConfiguration,
    /// Starts at 1 and increases by one with every successful load.
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub source: String,
}

/// Holds the active configuration and replaces it on reload.
///
/// Loads run one at a time; a reload requested while another is in flight
/// waits for it. Readers never lock: [`ConfigStore::current`] returns the
/// snapshot that was active at the time of the call, and a concurrent swap
/// never exposes a half-built one.
pub struct ConfigStore {
    source: Arc<dyn ConfigSource>,
    current: ArcSwap<ConfigSnapshot>,
    // Held for the whole fetch/default/validate/publish sequence.
    generation: Mutex<u64>,
    changes: watch::Sender<u64>,
    event_sinks: Vec<Arc<dyn EventSink>>,
}

impl ConfigStore {
    /// Perform the first load. A rejected document is fatal here since there
    /// is no previous configuration to fall back to.
    pub async fn initialize(
        source: Arc<dyn ConfigSource>,
        event_sinks: Vec<Arc<dyn EventSink>>,
    ) -> ConfigResult<Self> {
        let description = source.describe();
        let config = match load_once(source.as_ref()).await {
            Ok(config) => config,
            Err(e) => {
                emit_rejected(&event_sinks, &description, &e).await;
                return Err(e);
            }
        };

        let snapshot = Arc::new(ConfigSnapshot {
            config,
            generation: 1,
            loaded_at: Utc::now(),
            source: description,
        });
        emit_loaded(&event_sinks, &snapshot).await;

        let (changes, _) = watch::channel(1);
        Ok(Self {
            source,
            current: ArcSwap::new(snapshot),
            generation: Mutex::new(1),
            changes,
            event_sinks,
        })
    }

    /// The active snapshot.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// The active configuration.
    pub fn config(&self) -> ValidatedConfiguration {
        self.current.load().config.clone()
    }

    /// Receives the generation number every time a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Fetch, default and validate the document again and publish it.
    ///
    /// On failure the previously published snapshot stays active and the
    /// error is returned to the caller.
    pub async fn reload(&self) -> ConfigResult<Arc<ConfigSnapshot>> {
        let mut generation = self.generation.lock().await;
        let description = self.source.describe();

        let config = match load_once(self.source.as_ref()).await {
            Ok(config) => config,
            Err(e) => {
                emit_rejected(&self.event_sinks, &description, &e).await;
                return Err(e);
            }
        };

        *generation += 1;
        let snapshot = Arc::new(ConfigSnapshot {
            config,
            generation: *generation,
            loaded_at: Utc::now(),
            source: description,
        });
        self.current.store(Arc::clone(&snapshot));
        self.changes.send_replace(*generation);

        emit_loaded(&self.event_sinks, &snapshot).await;
        Ok(snapshot)
    }

    /// Reload whenever a trigger arrives until `shutdown` flips to true, its
    /// sender is dropped, or the trigger channel closes. Rejected reloads are
    /// reported to the event sinks and skipped.
    pub async fn run_reload_loop(
        &self,
        mut triggers: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                trigger = triggers.recv() => {
                    if trigger.is_none() {
                        tracing::info!("Reload trigger channel closed, stopping reload loop");
                        break;
                    }
                    // Rejections already went to the sinks.
                    let _ = self.reload().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::info!("Shutdown sender dropped, stopping reload loop");
                        break;
                    }
                    if *shutdown.borrow() {
                        tracing::info!("Shutdown signal received, stopping reload loop");
                        break;
                    }
                }
            }
        }
    }
}

async fn load_once(source: &dyn ConfigSource) -> ConfigResult<ValidatedConfiguration> {
    let content = source.fetch().await.map_err(ConfigError::Source)?;
    let raw = RawDeschedulerConfiguration::from_yaml_str(&content)?;
    Ok(validate(set_defaults(raw))?)
}

async fn emit_loaded(sinks: &[Arc<dyn EventSink>], snapshot: &ConfigSnapshot) {
    for notice in snapshot.config.deprecation_notices() {
        for sink in sinks {
            sink.emit(ConfigEvent::Deprecated {
                source: snapshot.source.clone(),
                notice: notice.clone(),
            })
            .await;
        }
    }
    for sink in sinks {
        sink.emit(ConfigEvent::Loaded {
            generation: snapshot.generation,
            source: snapshot.source.clone(),
            credential_source: snapshot.config.credential_source(),
            at: snapshot.loaded_at,
        })
        .await;
    }
}

async fn emit_rejected(sinks: &[Arc<dyn EventSink>], source: &str, error: &ConfigError) {
    let violations: Vec<String> = error
        .violations()
        .map(|v| v.iter().map(ToString::to_string).collect())
        .unwrap_or_default();
    for sink in sinks {
        sink.emit(ConfigEvent::Rejected {
            source: source.to_string(),
            error: error.to_string(),
            violations: violations.clone(),
            at: Utc::now(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChannelEventSink, TracingEventSink};
    use crate::source::StaticSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // Counts WARN and ERROR events emitted while installed as the default.
    struct WarningCounter(Arc<AtomicUsize>);

    impl tracing::Subscriber for WarningCounter {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }
        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() <= tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        fn enter(&self, _: &tracing::span::Id) {}
        fn exit(&self, _: &tracing::span::Id) {}
    }

    fn count_warnings() -> (Arc<AtomicUsize>, tracing::subscriber::DefaultGuard) {
        let count = Arc::new(AtomicUsize::new(0));
        let guard = tracing::subscriber::set_default(WarningCounter(Arc::clone(&count)));
        (count, guard)
    }

    const VALID: &str = "deschedulingInterval: 5m\npolicyConfigFile: /etc/policy.yaml\n";

    async fn store_with(
        content: &str,
    ) -> (
        Arc<StaticSource>,
        ConfigStore,
        mpsc::UnboundedReceiver<ConfigEvent>,
    ) {
        let source = Arc::new(StaticSource::new("test", content));
        let (sink, rx) = ChannelEventSink::new();
        let store = ConfigStore::initialize(source.clone(), vec![Arc::new(sink) as Arc<dyn EventSink>])
            .await
            .unwrap();
        (source, store, rx)
    }

    #[tokio::test]
    async fn test_initialize_publishes_first_generation() {
        let (_, store, mut rx) = store_with(VALID).await;
        let snapshot = store.current();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.source, "static:test");
        assert_eq!(
            snapshot.config.descheduling_interval(),
            Some(Duration::from_secs(300))
        );
        assert!(matches!(
            rx.recv().await,
            Some(ConfigEvent::Loaded { generation: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_initialize_fails_on_invalid_document() {
        let source = Arc::new(StaticSource::new("bad", "tracing:\n  sampleRate: 4\n"));
        let (sink, mut rx) = ChannelEventSink::new();
        let result = ConfigStore::initialize(source, vec![Arc::new(sink) as Arc<dyn EventSink>]).await;
        let err = result.err().unwrap();
        assert_eq!(err.violations().unwrap().len(), 2);
        match rx.recv().await {
            Some(ConfigEvent::Rejected { violations, .. }) => assert_eq!(violations.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot_and_notifies() {
        let (source, store, _rx) = store_with(VALID).await;
        let mut changes = store.subscribe();
        let before = store.current();

        source
            .replace("deschedulingInterval: 10m\npolicyConfigFile: /etc/policy.yaml\n")
            .await;
        let after = store.reload().await.unwrap();

        assert_eq!(after.generation, 2);
        assert_eq!(*changes.borrow_and_update(), 2);
        assert_eq!(
            store.config().descheduling_interval(),
            Some(Duration::from_secs(600))
        );
        // Readers holding the old snapshot still see it intact.
        assert_eq!(before.generation, 1);
        assert_eq!(
            before.config.descheduling_interval(),
            Some(Duration::from_secs(300))
        );
    }

    #[tokio::test]
    async fn test_rejected_reload_keeps_last_good() {
        let (source, store, mut rx) = store_with(VALID).await;
        let _ = rx.recv().await;

        source.replace("maxNoOfPodsToEvictPerNode: -1\n").await;
        let err = store.reload().await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let snapshot = store.current();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.config.policy_config_file(), "/etc/policy.yaml");
        assert!(matches!(rx.recv().await, Some(ConfigEvent::Rejected { .. })));

        source.replace("dryRun: [").await;
        let err = store.reload().await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert_eq!(store.current().generation, 1);
    }

    #[tokio::test]
    async fn test_concurrent_reloads_are_serialized() {
        let (_, store, _rx) = store_with(VALID).await;
        let (a, b) = tokio::join!(store.reload(), store.reload());
        let mut generations = vec![a.unwrap().generation, b.unwrap().generation];
        generations.sort_unstable();
        assert_eq!(generations, vec![2, 3]);
        assert_eq!(store.current().generation, 3);
    }

    #[tokio::test]
    async fn test_deprecated_field_emits_event() {
        let (_, _store, mut rx) =
            store_with("dryRun: true\nkubeconfigFile: /legacy.conf\n").await;
        match rx.recv().await {
            Some(ConfigEvent::Deprecated { notice, .. }) => {
                assert_eq!(notice.field, "kubeconfigFile");
                assert_eq!(notice.legacy_value, "/legacy.conf");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(rx.recv().await, Some(ConfigEvent::Loaded { .. })));
    }

    #[tokio::test]
    async fn test_reload_loop_stops_on_shutdown() {
        let (source, store, _rx) = store_with(VALID).await;
        let store = Arc::new(store);
        let (trigger_tx, trigger_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut changes = store.subscribe();

        let handle = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.run_reload_loop(trigger_rx, shutdown_rx).await })
        };

        source.replace("dryRun: true\n").await;
        trigger_tx.send(()).await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow(), 2);
        assert!(store.config().dry_run());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_reload_loop_stops_when_shutdown_sender_dropped() {
        let (_, store, _rx) = store_with(VALID).await;
        let (_trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        tokio::time::timeout(
            Duration::from_secs(5),
            store.run_reload_loop(trigger_rx, shutdown_rx),
        )
        .await
        .expect("reload loop should return once the shutdown sender is gone");
    }

    #[tokio::test]
    async fn test_reload_loop_stops_when_triggers_close() {
        let (_, store, _rx) = store_with(VALID).await;
        let (trigger_tx, trigger_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        trigger_tx.send(()).await.unwrap();
        drop(trigger_tx);

        tokio::time::timeout(
            Duration::from_secs(5),
            store.run_reload_loop(trigger_rx, shutdown_rx),
        )
        .await
        .expect("reload loop should return once the trigger channel closes");
        assert_eq!(store.current().generation, 2);
    }

    #[tokio::test]
    async fn test_rejected_reload_logged_once() {
        let source = Arc::new(StaticSource::new("test", VALID));
        let store = ConfigStore::initialize(
            source.clone(),
            vec![Arc::new(TracingEventSink) as Arc<dyn EventSink>],
        )
        .await
        .unwrap();
        let (count, _guard) = count_warnings();

        source.replace("maxNoOfPodsToEvictPerNode: -1\n").await;
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        trigger_tx.send(()).await.unwrap();
        drop(trigger_tx);
        store.run_reload_loop(trigger_rx, shutdown_rx).await;

        assert_eq!(store.current().generation, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deprecation_logged_once() {
        let (count, _guard) = count_warnings();
        let source = Arc::new(StaticSource::new(
            "legacy",
            "dryRun: true\nkubeconfigFile: /legacy.conf\n",
        ));
        let (channel, mut rx) = ChannelEventSink::new();
        let _store = ConfigStore::initialize(
            source,
            vec![
                Arc::new(TracingEventSink) as Arc<dyn EventSink>,
                Arc::new(channel) as Arc<dyn EventSink>,
            ],
        )
        .await
        .unwrap();

        assert!(matches!(rx.recv().await, Some(ConfigEvent::Deprecated { .. })));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
