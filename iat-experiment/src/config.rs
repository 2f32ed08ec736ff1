use iat_core::BlockId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Inclusive bounds of the fixation-cross duration, drawn per trial.
    pub fixation_range_ms: (u64, u64),
    /// How long the completion screen stays up before the engine returns to idle.
    pub completion_return_ms: u64,
    /// Block whose mapping matches the hypothesised association.
    pub compatible_block: BlockId,
    pub incompatible_block: BlockId,
}

impl ExperimentConfig {
    /// Fixation bounds with `lo <= hi`, whatever order the file gave them in.
    pub fn fixation_bounds_ms(&self) -> (u64, u64) {
        let (a, b) = self.fixation_range_ms;
        (a.min(b), a.max(b))
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            fixation_range_ms: (300, 300),
            completion_return_ms: 60_000,
            compatible_block: 4,
            incompatible_block: 7,
        }
    }
}
