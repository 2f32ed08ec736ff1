use iat_core::{PersistenceError, SessionId, SessionPersistence, SessionRecord};
use std::collections::BTreeMap;

/// Keeps sealed sessions in memory. Duplicate session ids are rejected.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sessions: BTreeMap<SessionId, SessionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionPersistence for MemoryStore {
    fn save(&mut self, record: &SessionRecord) -> Result<(), PersistenceError> {
        if self.sessions.contains_key(&record.session_id) {
            return Err(PersistenceError::Duplicate(record.session_id.to_string()));
        }
        self.sessions.insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
        Ok(self.sessions.values().cloned().collect())
    }
}
