use crate::block::BlockId;
use crate::stimulus::{Category, ResponseSide};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scheduled presentation within a block. Lives only as long as its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSpec {
    pub word: String,
    pub category: Category,
    pub correct_response: ResponseSide,
    /// 1-based position within the block.
    pub sequence_index: usize,
}

/// Recorded result per accepted trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResult {
    pub participant_id: String,
    pub session_id: SessionId,
    pub block_id: BlockId,
    pub sequence_index: usize,
    pub word: String,
    pub category: Category,
    pub correct_response: ResponseSide,
    pub observed_response: ResponseSide,
    pub latency_ms: u64,
    pub is_correct: bool,
}

/// `{participantLabel}_{YYYYMMDD_HHMMSS}`.
///
/// Two sessions for the same label started within one second share an id;
/// persistence rejects the second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new<Tz>(participant: &str, started_at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self(format!("{participant}_{}", started_at.format("%Y%m%d_%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub participant_id: String,
    pub session_id: SessionId,
    pub started_at: DateTime<Local>,
    pub results: Vec<TrialResult>,
}

impl SessionRecord {
    pub fn block_results(&self, block: BlockId) -> impl Iterator<Item = &TrialResult> {
        self.results.iter().filter(move |r| r.block_id == block)
    }

    pub fn statistics_for(&self, block: BlockId) -> BlockStatistics {
        BlockStatistics::compute(self.block_results(block))
    }

    pub fn summary(&self, compatible: BlockId, incompatible: BlockId) -> SessionSummary {
        SessionSummary::new(
            self.statistics_for(compatible),
            self.statistics_for(incompatible),
            self.results.len(),
        )
    }
}

/// Accuracy and speed of one block, derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BlockStatistics {
    pub trials: usize,
    pub correct: usize,
    pub accuracy_percent: f64,
    /// Mean over correct trials only; 0 when there are none.
    pub mean_latency_ms: f64,
}

impl BlockStatistics {
    pub fn compute<'a>(results: impl IntoIterator<Item = &'a TrialResult>) -> Self {
        let mut trials = 0usize;
        let mut correct = 0usize;
        let mut latency_sum = 0u64;
        for result in results {
            trials += 1;
            if result.is_correct {
                correct += 1;
                latency_sum += result.latency_ms;
            }
        }

        let accuracy_percent = if trials == 0 {
            0.0
        } else {
            100.0 * correct as f64 / trials as f64
        };
        let mean_latency_ms = if correct == 0 {
            0.0
        } else {
            latency_sum as f64 / correct as f64
        };

        Self {
            trials,
            correct,
            accuracy_percent,
            mean_latency_ms,
        }
    }
}

/// Compatible vs. incompatible test-block comparison shown at session end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSummary {
    pub compatible: BlockStatistics,
    pub incompatible: BlockStatistics,
    /// Incompatible minus compatible mean latency, in ms.
    pub iat_effect_ms: f64,
    pub total_trials: usize,
}

impl SessionSummary {
    pub fn new(compatible: BlockStatistics, incompatible: BlockStatistics, total_trials: usize) -> Self {
        Self {
            compatible,
            incompatible,
            iat_effect_ms: incompatible.mean_latency_ms - compatible.mean_latency_ms,
            total_trials,
        }
    }
}
