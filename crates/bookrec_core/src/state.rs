//! crates/bookrec_core/src/state.rs
//!
//! Typed, per-user access to persisted state.
//!
//! Every operation opens a [`UserState`] which holds that user's lock until it
//! is dropped, so a read-modify-write spanning several keys is never interleaved
//! with another operation for the same user. Writes are staged and only reach
//! the store on [`UserState::commit`], all together or not at all.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::ports::{PortError, PortResult, StateKey, StateStore};

pub struct StateRepository {
    store: Arc<dyn StateStore>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl StateRepository {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive access to one user's state.
    pub async fn open(&self, user_id: Uuid) -> UserState {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Locks nobody holds or waits on are only referenced by the map.
            locks.retain(|id, lock| *id == user_id || Arc::strong_count(lock) > 1);
            locks.entry(user_id).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        UserState {
            store: self.store.clone(),
            user_id,
            staged: Vec::new(),
            _guard: guard,
        }
    }
}

pub struct UserState {
    store: Arc<dyn StateStore>,
    user_id: Uuid,
    staged: Vec<(StateKey, String)>,
    _guard: OwnedMutexGuard<()>,
}

impl UserState {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Reads and decodes a key, seeing writes staged on this handle.
    /// Missing or malformed values yield `T::default()`.
    pub async fn read<T>(&self, key: StateKey) -> PortResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let raw = match self.staged.iter().find(|(k, _)| *k == key) {
            Some((_, raw)) => raw.clone(),
            None => match self.store.load(self.user_id, key).await? {
                Some(raw) => raw,
                None => return Ok(T::default()),
            },
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(user_id = %self.user_id, %key, "Discarding malformed state: {}", e);
                Ok(T::default())
            }
        }
    }

    /// Stages a value. Nothing is stored until [`UserState::commit`].
    pub fn write<T>(&mut self, key: StateKey, value: &T) -> PortResult<()>
    where
        T: Serialize + ?Sized,
    {
        let raw = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        match self.staged.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = raw,
            None => self.staged.push((key, raw)),
        }
        Ok(())
    }

    /// Stores every staged write in one step. Dropping the handle instead
    /// discards them.
    pub async fn commit(self) -> PortResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        self.store.save_many(self.user_id, &self.staged).await
    }
}

//=========================================================================================
// In-Memory Store
//=========================================================================================

/// A `StateStore` backed by a map, used in tests and for ephemeral runs.
#[derive(Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<(Uuid, StateKey), String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, user_id: Uuid, key: StateKey) -> PortResult<Option<String>> {
        Ok(self.values.read().await.get(&(user_id, key)).cloned())
    }

    async fn save(&self, user_id: Uuid, key: StateKey, value: &str) -> PortResult<()> {
        self.values
            .write()
            .await
            .insert((user_id, key), value.to_string());
        Ok(())
    }

    async fn save_many(&self, user_id: Uuid, entries: &[(StateKey, String)]) -> PortResult<()> {
        let mut values = self.values.write().await;
        for (key, value) in entries {
            values.insert((user_id, *key), value.clone());
        }
        Ok(())
    }
}
