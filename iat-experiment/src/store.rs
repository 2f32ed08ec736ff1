use chrono::{DateTime, Local};
use iat_core::{BlockId, BlockStatistics, SessionId, SessionRecord, TrialResult};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("session {0} is sealed and accepts no further results")]
    Sealed(SessionId),
}

/// Append-only ledger of one session's accepted trials.
#[derive(Debug, Clone)]
pub struct ResultStore {
    record: SessionRecord,
    sealed: bool,
}

impl ResultStore {
    pub fn new(participant_id: impl Into<String>, session_id: SessionId, started_at: DateTime<Local>) -> Self {
        Self {
            record: SessionRecord {
                participant_id: participant_id.into(),
                session_id,
                started_at,
                results: Vec::new(),
            },
            sealed: false,
        }
    }

    pub fn append(&mut self, result: TrialResult) -> Result<(), StoreError> {
        if self.sealed {
            return Err(StoreError::Sealed(self.record.session_id.clone()));
        }
        self.record.results.push(result);
        Ok(())
    }

    pub fn statistics_for(&self, block: BlockId) -> BlockStatistics {
        self.record.statistics_for(block)
    }

    /// Freezes the ledger. Succeeds exactly once.
    pub fn seal(&mut self) -> Result<&SessionRecord, StoreError> {
        if self.sealed {
            return Err(StoreError::Sealed(self.record.session_id.clone()));
        }
        self.sealed = true;
        Ok(&self.record)
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.record.results
    }

    pub fn participant_id(&self) -> &str {
        &self.record.participant_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.record.session_id
    }

    pub fn len(&self) -> usize {
        self.record.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.results.is_empty()
    }
}
