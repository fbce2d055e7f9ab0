use std::{io::ErrorKind, marker::PhantomData, path::PathBuf, sync::Arc};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use ledhub_common::{PresetBook, PresetError, PresetSnapshot, WeatherSnapshot};

/// A single JSON document on disk, rewritten wholesale on every save.
#[derive(Clone)]
pub struct JsonFile {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        match tokio::fs::read(self.path.as_ref()).await {
            Ok(raw) => {
                let value = serde_json::from_slice::<T>(&raw)
                    .with_context(|| format!("malformed json in {}", self.path.display()))?;
                Ok(Some(value))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    async fn write<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let path = self.path.as_ref().clone();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, payload)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Named snapshots of one device group, persisted as `{states, default}`.
///
/// Reads never fail (a broken file is an empty store) and write failures are
/// logged, so the UI keeps working on a read-only filesystem.
pub struct PresetStore<S> {
    file: JsonFile,
    _snapshot: PhantomData<fn() -> S>,
}

impl<S> Clone for PresetStore<S> {
    fn clone(&self) -> Self {
        Self {
            file: self.file.clone(),
            _snapshot: PhantomData,
        }
    }
}

impl<S: PresetSnapshot> PresetStore<S> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            _snapshot: PhantomData,
        }
    }

    pub async fn load(&self) -> PresetBook<S> {
        let _guard = self.file.lock.lock().await;
        self.read_book().await
    }

    /// Runs one load-modify-save cycle under the file lock. Nothing is
    /// written when `change` fails.
    pub async fn update<T, F>(&self, change: F) -> Result<T, PresetError>
    where
        F: FnOnce(&mut PresetBook<S>) -> Result<T, PresetError>,
    {
        let _guard = self.file.lock.lock().await;
        let mut book = self.read_book().await;
        let outcome = change(&mut book)?;
        self.write_book(&book).await;
        Ok(outcome)
    }

    async fn read_book(&self) -> PresetBook<S> {
        match self.file.read::<Value>().await {
            Ok(Some(document)) => {
                let (book, notes) = PresetBook::read_document(document);
                for note in notes {
                    warn!(path = %self.file.path.display(), "preset file: {note}");
                }
                book
            }
            Ok(None) => PresetBook::default(),
            Err(err) => {
                warn!("preset store unreadable, treating as empty: {err:#}");
                PresetBook::default()
            }
        }
    }

    async fn write_book(&self, book: &PresetBook<S>) {
        if let Err(err) = self.file.write(&book.to_document()).await {
            warn!("failed to persist presets: {err:#}");
        }
    }
}

/// Single last-known weather record.
#[derive(Clone)]
pub struct WeatherCache {
    file: JsonFile,
}

impl WeatherCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub async fn read(&self) -> Option<WeatherSnapshot> {
        let _guard = self.file.lock.lock().await;
        match self.file.read::<WeatherSnapshot>().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("weather cache unreadable: {err:#}");
                None
            }
        }
    }

    pub async fn write(&self, snapshot: &WeatherSnapshot) {
        let _guard = self.file.lock.lock().await;
        if let Err(err) = self.file.write(snapshot).await {
            warn!("failed to persist weather cache: {err:#}");
        }
    }
}
