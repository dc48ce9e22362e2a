use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::{distr::Alphanumeric, Rng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use praygram_types::api::CreatePrayerRequest;

const OFFLINE_PRAYERS_FILE: &str = "praygram_offline_prayers.json";
const OFFLINE_QUEUE_FILE: &str = "praygram_offline_queue.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("offline store I/O failed")]
    Io(#[from] std::io::Error),
    #[error("offline store serialization failed")]
    Json(#[from] serde_json::Error),
}

/// A prayer captured while disconnected. Append-only until a sync pass flips
/// `synced` and the cleanup removes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflinePrayer {
    pub id: String,
    #[serde(flatten)]
    pub draft: CreatePrayerRequest,
    /// Unix millis at capture time; doubles as the merge sort key.
    pub timestamp: i64,
    pub synced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    CreatePrayer,
    AddReaction,
    RemoveReaction,
}

/// A queued write to replay on reconnect. `data` carries the payload of the
/// matching API call verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub data: serde_json::Value,
    pub timestamp: i64,
    #[serde(rename = "groupId")]
    pub group_id: String,
}

/// Durable-ish local storage for pending offline writes: two JSON files under
/// one directory. Every read-modify-write sequence holds the mutex for its
/// whole span, so concurrent UI events cannot lose each other's updates.
pub struct OfflineStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl OfflineStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Capture a prayer draft locally. Never touches the network; persisted
    /// write-through before returning. Returns the locally generated id.
    pub fn save_offline_prayer(&self, draft: CreatePrayerRequest) -> Result<String, StoreError> {
        let _guard = self.guard();

        let prayer = OfflinePrayer {
            id: local_id("offline"),
            draft,
            timestamp: chrono::Utc::now().timestamp_millis(),
            synced: false,
        };
        let id = prayer.id.clone();

        let mut prayers: Vec<OfflinePrayer> = self.read_list(OFFLINE_PRAYERS_FILE);
        prayers.push(prayer);
        self.write_list(OFFLINE_PRAYERS_FILE, &prayers)?;

        Ok(id)
    }

    pub fn offline_prayers(&self) -> Vec<OfflinePrayer> {
        let _guard = self.guard();
        self.read_list(OFFLINE_PRAYERS_FILE)
    }

    pub fn offline_prayers_for_group(&self, group_id: &str) -> Vec<OfflinePrayer> {
        self.offline_prayers()
            .into_iter()
            .filter(|p| p.draft.group_id == group_id)
            .collect()
    }

    /// Append an action to the replay queue. No deduplication: queuing the
    /// same reaction twice replays it twice.
    pub fn queue_action(
        &self,
        kind: ActionKind,
        group_id: &str,
        data: serde_json::Value,
    ) -> Result<String, StoreError> {
        let _guard = self.guard();

        let action = OfflineAction {
            id: local_id("action"),
            kind,
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
            group_id: group_id.to_string(),
        };
        let id = action.id.clone();

        let mut queue: Vec<OfflineAction> = self.read_list(OFFLINE_QUEUE_FILE);
        queue.push(action);
        self.write_list(OFFLINE_QUEUE_FILE, &queue)?;

        Ok(id)
    }

    /// The replay queue in insertion (FIFO) order.
    pub fn queue(&self) -> Vec<OfflineAction> {
        let _guard = self.guard();
        self.read_list(OFFLINE_QUEUE_FILE)
    }

    pub fn clear_queue(&self) -> Result<(), StoreError> {
        let _guard = self.guard();
        let path = self.dir.join(OFFLINE_QUEUE_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn mark_synced(&self, offline_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard();

        let mut prayers: Vec<OfflinePrayer> = self.read_list(OFFLINE_PRAYERS_FILE);
        for prayer in prayers.iter_mut() {
            if prayer.id == offline_id {
                prayer.synced = true;
            }
        }
        self.write_list(OFFLINE_PRAYERS_FILE, &prayers)
    }

    /// Drop everything a sync pass confirmed; unsynced entries stay.
    pub fn remove_synced(&self) -> Result<(), StoreError> {
        let _guard = self.guard();

        let prayers: Vec<OfflinePrayer> = self.read_list(OFFLINE_PRAYERS_FILE);
        let unsynced: Vec<OfflinePrayer> = prayers.into_iter().filter(|p| !p.synced).collect();
        self.write_list(OFFLINE_PRAYERS_FILE, &unsynced)
    }

    /// The guard only serializes file access; a panic while holding it cannot
    /// leave the files half-written, so a poisoned lock is safe to reclaim.
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Missing file means an empty list; a corrupt file is logged and treated
    /// as empty rather than wedging every caller.
    fn read_list<T: DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let path = self.dir.join(file);
        match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Corrupt offline store file {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    fn write_list<T: Serialize>(&self, file: &str, list: &[T]) -> Result<(), StoreError> {
        let path = self.dir.join(file);
        let raw = serde_json::to_string(list)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

/// Time plus a random suffix — unique enough for ids that never leave this
/// browser-profile-equivalent store.
fn local_id(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!(
        "{}_{}_{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(group: &str, title: &str) -> CreatePrayerRequest {
        CreatePrayerRequest {
            title: title.to_string(),
            content: "content".to_string(),
            group_id: group.to_string(),
            is_private: None,
        }
    }

    #[test]
    fn saved_prayer_round_trips_unsynced() {
        let dir = tempfile::tempdir().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        let id = store.save_offline_prayer(draft("g1", "T")).unwrap();
        assert!(id.starts_with("offline_"));

        let prayers = store.offline_prayers();
        assert_eq!(prayers.len(), 1);
        assert_eq!(prayers[0].id, id);
        assert_eq!(prayers[0].draft.title, "T");
        assert!(!prayers[0].synced);
    }

    #[test]
    fn prayers_filter_by_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        store.save_offline_prayer(draft("g1", "a")).unwrap();
        store.save_offline_prayer(draft("g2", "b")).unwrap();

        let g1 = store.offline_prayers_for_group("g1");
        assert_eq!(g1.len(), 1);
        assert_eq!(g1[0].draft.title, "a");
    }

    #[test]
    fn queue_preserves_order_and_does_not_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        let payload = serde_json::json!({ "prayer_id": "p1", "type": "pray" });
        store
            .queue_action(ActionKind::AddReaction, "g1", payload.clone())
            .unwrap();
        store
            .queue_action(ActionKind::AddReaction, "g1", payload)
            .unwrap();

        let queue = store.queue();
        assert_eq!(queue.len(), 2, "identical actions both stay queued");
        assert!(queue[0].timestamp <= queue[1].timestamp);

        store.clear_queue().unwrap();
        assert!(store.queue().is_empty());
    }

    #[test]
    fn remove_synced_keeps_unsynced_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        let first = store.save_offline_prayer(draft("g1", "a")).unwrap();
        let second = store.save_offline_prayer(draft("g1", "b")).unwrap();

        store.mark_synced(&first).unwrap();
        store.remove_synced().unwrap();

        let left = store.offline_prayers();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, second);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        std::fs::write(dir.path().join(OFFLINE_PRAYERS_FILE), "not json").unwrap();
        assert!(store.offline_prayers().is_empty());

        // and the store recovers on the next write
        store.save_offline_prayer(draft("g1", "a")).unwrap();
        assert_eq!(store.offline_prayers().len(), 1);
    }

    #[test]
    fn poisoned_lock_does_not_wedge_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(OfflineStore::open(dir.path()).unwrap());
        store.save_offline_prayer(draft("g1", "a")).unwrap();

        // Poison the mutex by panicking while holding it.
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert_eq!(store.offline_prayers().len(), 1);
        store.save_offline_prayer(draft("g1", "b")).unwrap();
        assert_eq!(store.offline_prayers().len(), 2);
    }

    #[test]
    fn action_kind_serializes_screaming_snake() {
        let raw = serde_json::to_string(&ActionKind::AddReaction).unwrap();
        assert_eq!(raw, "\"ADD_REACTION\"");
    }
}
