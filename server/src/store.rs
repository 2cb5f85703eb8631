//! Latest known motion state per client
//!
//! Records are created on the first state-bearing message and are kept after
//! the client disconnects. Only the command processor writes here; readers
//! (the operator console, tests) always receive copies.

use shared::{ClientId, StatePatch, StateRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct StateStore {
    records: Arc<RwLock<HashMap<ClientId, StateRecord>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the fields present in `patch`, creating the record if needed.
    /// Returns the record as it stands after the update.
    pub async fn update(&self, client_id: ClientId, patch: &StatePatch) -> StateRecord {
        let mut records = self.records.write().await;
        let record = records.entry(client_id).or_default();
        patch.apply_to(record);
        *record
    }

    pub async fn read(&self, client_id: ClientId) -> Option<StateRecord> {
        self.records.read().await.get(&client_id).copied()
    }

    pub async fn contains(&self, client_id: ClientId) -> bool {
        self.records.read().await.contains_key(&client_id)
    }

    /// Copies of every record, ordered by client id
    pub async fn snapshot(&self) -> Vec<(ClientId, StateRecord)> {
        let mut all: Vec<(ClientId, StateRecord)> = self
            .records
            .read()
            .await
            .iter()
            .map(|(id, record)| (*id, *record))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
