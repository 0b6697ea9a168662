//! In-memory profiles and turn history for testing

use speechcoach::error::{CoachError, CoachResult};
use speechcoach::scoring::FeatureVector;
use speechcoach::storage::{ProfileLabel, ReferenceProfileStore, SessionPersistence, TurnRecord};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<(Option<i64>, String, ProfileLabel), FeatureVector>>,
    pub turns: Mutex<Vec<TurnRecord>>,
    /// Reject every save
    pub fail_saves: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(
        &self,
        child_id: Option<i64>,
        phoneme: &str,
        label: ProfileLabel,
        features: FeatureVector,
    ) {
        self.profiles
            .lock()
            .unwrap()
            .insert((child_id, phoneme.to_string(), label), features);
    }

    pub fn saved(&self) -> Vec<TurnRecord> {
        self.turns.lock().unwrap().clone()
    }
}

impl ReferenceProfileStore for MemoryStore {
    fn load(
        &self,
        child_id: Option<i64>,
        phoneme: &str,
        label: ProfileLabel,
    ) -> Option<FeatureVector> {
        self.profiles
            .lock()
            .unwrap()
            .get(&(child_id, phoneme.to_string(), label))
            .cloned()
    }
}

impl SessionPersistence for MemoryStore {
    fn save_turn_outcome(&self, record: &TurnRecord) -> CoachResult<i64> {
        if *self.fail_saves.lock().unwrap() {
            return Err(CoachError::Storage("disk full".into()));
        }
        let mut turns = self.turns.lock().unwrap();
        turns.push(record.clone());
        Ok(turns.len() as i64)
    }
}
