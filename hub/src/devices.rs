use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use ledhub_common::{
    CammingLights, CammingSetRequest, CammingSnapshot, CammingState, LedCommand, PresetBook,
    PresetError, PresetSnapshot, SegmentState, SegmentUpdate, SegmentsSnapshot, StateCache,
    StripConfig, UpdateError,
};

use crate::{
    publisher::{publish_json, CommandSink},
    store::PresetStore,
};

/// Pushes a stored snapshot onto live devices.
pub trait SnapshotApplier<S>: Send + Sync {
    fn apply(&self, snapshot: &S);

    /// When true, automatic default application (boot and watcher) is skipped.
    fn default_suppressed(&self) -> bool {
        false
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Main LED controller: the segment cache plus its command topic.
///
/// Commands are published while the cache lock is held so the broker sees
/// them in the same order the cache merged them.
pub struct LedStrips {
    cache: Mutex<StateCache>,
    sink: Arc<dyn CommandSink>,
    topic: String,
}

impl LedStrips {
    pub fn new(sink: Arc<dyn CommandSink>, topic: impl Into<String>) -> Self {
        Self {
            cache: Mutex::new(StateCache::default()),
            sink,
            topic: topic.into(),
        }
    }

    pub fn set(&self, update: &SegmentUpdate) -> Result<(), UpdateError> {
        let mut cache = lock(&self.cache);
        let command = cache.apply_update(update)?;
        publish_json(self.sink.as_ref(), &self.topic, &LedCommand::Set(command));
        Ok(())
    }

    pub fn set_all(&self, update: &SegmentUpdate) -> Vec<SegmentState> {
        let mut cache = lock(&self.cache);
        for command in cache.apply_to_all(update) {
            publish_json(self.sink.as_ref(), &self.topic, &LedCommand::Set(command));
        }
        cache.entries().to_vec()
    }

    pub fn ping(&self, segment: Option<String>) {
        publish_json(self.sink.as_ref(), &self.topic, &LedCommand::Ping { segment });
    }

    pub fn entries(&self) -> Vec<SegmentState> {
        lock(&self.cache).entries().to_vec()
    }

    pub fn snapshot(&self) -> SegmentsSnapshot {
        lock(&self.cache).snapshot()
    }
}

impl SnapshotApplier<SegmentsSnapshot> for LedStrips {
    fn apply(&self, snapshot: &SegmentsSnapshot) {
        let mut cache = lock(&self.cache);
        let (commands, skipped) = cache.apply_snapshot(snapshot);
        for command in commands {
            publish_json(self.sink.as_ref(), &self.topic, &LedCommand::Set(command));
        }
        if !skipped.is_empty() {
            warn!("skipped undeclared segments in preset: {}", skipped.join(", "));
        }
    }
}

/// The ESP32U camming controller.
pub struct CammingDevice {
    lights: Mutex<CammingLights>,
    sink: Arc<dyn CommandSink>,
    topic: String,
}

impl CammingDevice {
    pub fn new(
        sink: Arc<dyn CommandSink>,
        topic: impl Into<String>,
        strips: Vec<StripConfig>,
    ) -> Self {
        Self {
            lights: Mutex::new(CammingLights::new(strips)),
            sink,
            topic: topic.into(),
        }
    }

    pub fn set(&self, request: &CammingSetRequest) -> CammingState {
        let mut lights = lock(&self.lights);
        let command = lights.set(request);
        publish_json(self.sink.as_ref(), &self.topic, &command);
        lights.state().clone()
    }

    pub fn state(&self) -> CammingState {
        lock(&self.lights).state().clone()
    }

    pub fn snapshot(&self) -> CammingSnapshot {
        lock(&self.lights).snapshot()
    }
}

impl SnapshotApplier<CammingSnapshot> for CammingDevice {
    fn apply(&self, snapshot: &CammingSnapshot) {
        let mut lights = lock(&self.lights);
        let command = lights.apply_snapshot(snapshot);
        publish_json(self.sink.as_ref(), &self.topic, &command);
    }

    fn default_suppressed(&self) -> bool {
        lock(&self.lights).is_off_latched()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedPreset<S> {
    pub name: String,
    pub data: S,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresetListing<S> {
    pub states: Vec<NamedPreset<S>>,
    pub default: Option<String>,
}

/// A preset store bound to the device its snapshots drive.
pub struct PresetGroup<S> {
    label: &'static str,
    store: PresetStore<S>,
    applier: Arc<dyn SnapshotApplier<S>>,
}

impl<S: PresetSnapshot> PresetGroup<S> {
    pub fn new(
        label: &'static str,
        store: PresetStore<S>,
        applier: Arc<dyn SnapshotApplier<S>>,
    ) -> Self {
        Self {
            label,
            store,
            applier,
        }
    }

    pub async fn list(&self) -> PresetListing<S> {
        let book = self.store.load().await;
        PresetListing {
            states: book
                .iter()
                .map(|(name, data)| NamedPreset {
                    name: name.to_string(),
                    data: data.clone(),
                })
                .collect(),
            default: book.default_name().map(str::to_string),
        }
    }

    pub async fn save_preset(
        &self,
        name: &str,
        snapshot: S,
    ) -> Result<NamedPreset<S>, PresetError> {
        let data = snapshot.clone();
        let name = self
            .store
            .update(|book| book.save_preset(name, snapshot))
            .await?;
        info!(group = self.label, preset = %name, "preset saved");
        Ok(NamedPreset { name, data })
    }

    /// Returns the default after removal.
    pub async fn delete_preset(&self, name: &str) -> Result<Option<String>, PresetError> {
        let default = self.store.update(|book| book.delete_preset(name)).await?;
        info!(group = self.label, preset = name.trim(), "preset deleted");
        Ok(default)
    }

    pub async fn apply_preset(&self, name: &str) -> Result<NamedPreset<S>, PresetError> {
        let book = self.store.load().await;
        let data = book.get(name)?.clone();
        self.applier.apply(&data);
        Ok(NamedPreset {
            name: name.trim().to_string(),
            data,
        })
    }

    /// Persists the new default and applies it right away. An explicit
    /// choice ignores any suppression on the device.
    pub async fn set_default(&self, name: &str) -> Result<String, PresetError> {
        let snapshot = self
            .store
            .update(|book| book.set_default(name).cloned())
            .await?;
        self.applier.apply(&snapshot);
        info!(group = self.label, preset = name.trim(), "default preset set");
        Ok(name.trim().to_string())
    }

    /// Applies the stored default if there is one and the device allows it.
    pub async fn apply_default(&self) -> bool {
        if self.applier.default_suppressed() {
            info!(group = self.label, "default apply suppressed by manual off");
            return false;
        }
        let book: PresetBook<S> = self.store.load().await;
        let Some((name, snapshot)) = book.default_snapshot() else {
            return false;
        };
        self.applier.apply(snapshot);
        info!(group = self.label, preset = name, "default preset applied");
        true
    }
}
