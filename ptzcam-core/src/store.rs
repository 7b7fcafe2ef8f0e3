//! Endpoint, preset and profile persistence.
//!
//! The dispatcher only sees the [`EndpointStore`], [`PresetStore`] and
//! [`ProfileStore`] traits. Two implementations ship here:
//! [`MemoryStore`] for tests and embedding, and [`JsonFileStore`], which
//! keeps one pretty-printed JSON array per record type and rewrites it
//! atomically on every change. Both keep records in insertion order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PtzError;
use crate::types::{CameraEndpoint, Preset, PresetProfile};

pub const ENDPOINTS_FILE: &str = "endpoints.json";
pub const PRESETS_FILE: &str = "presets.json";
pub const PROFILES_FILE: &str = "profiles.json";

/// A persisted record keyed by a string id.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Used in `NotFound` errors.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

impl Record for CameraEndpoint {
    const KIND: &'static str = "endpoint";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Preset {
    const KIND: &'static str = "preset";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for PresetProfile {
    const KIND: &'static str = "profile";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Load/save service for one record type.
#[async_trait]
pub trait RecordStore<T: Record>: Send + Sync {
    /// Every record, in insertion order.
    async fn load_all(&self) -> Result<Vec<T>, PtzError>;

    async fn get(&self, id: &str) -> Result<T, PtzError> {
        self.load_all()
            .await?
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| PtzError::not_found(T::KIND, id))
    }

    /// Create, or replace in place if the id exists.
    async fn save(&self, record: T) -> Result<(), PtzError>;

    async fn delete(&self, id: &str) -> Result<(), PtzError>;
}

pub trait EndpointStore: RecordStore<CameraEndpoint> {}
impl<S: RecordStore<CameraEndpoint> + ?Sized> EndpointStore for S {}

pub trait PresetStore: RecordStore<Preset> {}
impl<S: RecordStore<Preset> + ?Sized> PresetStore for S {}

pub trait ProfileStore: RecordStore<PresetProfile> {}
impl<S: RecordStore<PresetProfile> + ?Sized> ProfileStore for S {}

fn upsert<T: Record>(records: &mut Vec<T>, record: T) {
    match records.iter_mut().find(|r| r.id() == record.id()) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

fn remove<T: Record>(records: &mut Vec<T>, id: &str) -> Result<(), PtzError> {
    let before = records.len();
    records.retain(|r| r.id() != id);
    if records.len() == before {
        return Err(PtzError::not_found(T::KIND, id));
    }
    Ok(())
}

// ── MemoryStore ──────────────────────────────────────────────────

/// Volatile store.
#[derive(Debug)]
pub struct MemoryStore<T> {
    records: Mutex<Vec<T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> RecordStore<T> for MemoryStore<T> {
    async fn load_all(&self) -> Result<Vec<T>, PtzError> {
        Ok(self.records.lock().await.clone())
    }

    async fn save(&self, record: T) -> Result<(), PtzError> {
        upsert(&mut *self.records.lock().await, record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), PtzError> {
        remove(&mut *self.records.lock().await, id)
    }
}

// ── JsonFileStore ────────────────────────────────────────────────

/// One JSON array on disk, cached in memory.
#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    records: Mutex<Vec<T>>,
}

impl<T: Record> JsonFileStore<T> {
    /// Load `path`; a missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PtzError> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PtzError::Storage(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(storage_error(&path, e)),
        };
        debug!("loaded {} {}(s) from {}", records.len(), T::KIND, path.display());
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write-then-rename so a crash never leaves a truncated file.
    async fn persist(&self, records: &[T]) -> Result<(), PtzError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| storage_error(dir, e))?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }
}

impl JsonFileStore<CameraEndpoint> {
    pub async fn endpoints(data_dir: &Path) -> Result<Self, PtzError> {
        Self::open(data_dir.join(ENDPOINTS_FILE)).await
    }
}

impl JsonFileStore<Preset> {
    pub async fn presets(data_dir: &Path) -> Result<Self, PtzError> {
        Self::open(data_dir.join(PRESETS_FILE)).await
    }
}

impl JsonFileStore<PresetProfile> {
    pub async fn profiles(data_dir: &Path) -> Result<Self, PtzError> {
        Self::open(data_dir.join(PROFILES_FILE)).await
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> PtzError {
    PtzError::Storage(format!("{}: {e}", path.display()))
}

#[async_trait]
impl<T: Record> RecordStore<T> for JsonFileStore<T> {
    async fn load_all(&self) -> Result<Vec<T>, PtzError> {
        Ok(self.records.lock().await.clone())
    }

    async fn save(&self, record: T) -> Result<(), PtzError> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        upsert(&mut next, record);
        self.persist(&next).await?;
        *records = next;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), PtzError> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        remove(&mut next, id)?;
        self.persist(&next).await?;
        *records = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::NormalizedPosition;
    use crate::types::ProtocolConfig;

    fn preset(name: &str) -> Preset {
        Preset::new(name, NormalizedPosition::HOME, "#123456").unwrap()
    }

    #[tokio::test]
    async fn memory_store_crud() {
        let store = MemoryStore::new();
        let a = preset("A");
        let b = preset("B");
        store.save(a.clone()).await.unwrap();
        store.save(b.clone()).await.unwrap();

        let mut renamed = a.clone();
        renamed.name = "A2".into();
        store.save(renamed).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "A2");
        assert_eq!(all[1].id, b.id);

        store.delete(&a.id).await.unwrap();
        assert!(matches!(
            store.get(&a.id).await,
            Err(PtzError::NotFound { kind: "preset", .. })
        ));
        assert!(store.delete(&a.id).await.is_err());
    }

    #[tokio::test]
    async fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ep = CameraEndpoint::new(
            "Stage",
            ProtocolConfig::Visca {
                host: "10.1.1.1".into(),
                port: 52381,
            },
        );
        {
            let store = JsonFileStore::endpoints(dir.path()).await.unwrap();
            store.save(ep.clone()).await.unwrap();
        }
        let reopened = JsonFileStore::endpoints(dir.path()).await.unwrap();
        assert_eq!(reopened.get(&ep.id).await.unwrap(), ep);
        assert!(dir.path().join(ENDPOINTS_FILE).exists());
        assert!(!dir.path().join("endpoints.json.tmp").exists());
    }

    #[tokio::test]
    async fn json_store_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::presets(dir.path()).await.unwrap();
        let names = ["Wide", "Pulpit", "Choir", "Organ"];
        for name in names {
            store.save(preset(name)).await.unwrap();
        }
        let reopened = JsonFileStore::<Preset>::presets(dir.path()).await.unwrap();
        let loaded: Vec<String> = reopened
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(loaded, names);
    }

    #[tokio::test]
    async fn missing_and_empty_files_are_empty_stores() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<Preset>::open(dir.path().join("nested/presets.json"))
            .await
            .unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
        store.save(preset("x")).await.unwrap();
        assert!(dir.path().join("nested/presets.json").exists());

        let blank = dir.path().join("blank.json");
        std::fs::write(&blank, "  \n").unwrap();
        assert!(JsonFileStore::<Preset>::open(&blank).await.unwrap().load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn profiles_carry_their_presets_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let profile =
            PresetProfile::new("Sunday", 48.0, Some("ep-1".into()), vec![preset("Pulpit")])
                .unwrap();
        JsonFileStore::profiles(dir.path())
            .await
            .unwrap()
            .save(profile.clone())
            .await
            .unwrap();
        let reopened = JsonFileStore::<PresetProfile>::profiles(dir.path()).await.unwrap();
        assert_eq!(reopened.get(&profile.id).await.unwrap(), profile);
        assert!(matches!(
            reopened.delete("nope").await,
            Err(PtzError::NotFound { kind: "profile", .. })
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PRESETS_FILE);
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::<Preset>::open(&path).await,
            Err(PtzError::Storage(_))
        ));
    }
}
