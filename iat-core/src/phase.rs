use serde::{Deserialize, Serialize};

/// Session-level phases of the IAT engine.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Idle,
    Instruction,
    BlockInstruction,
    Fixation,
    Trial,
    BlockEnd,
    Complete,
}

impl SessionPhase {
    pub fn accepts_responses(&self) -> bool {
        matches!(self, Self::Trial)
    }

    pub fn accepts_advance(&self) -> bool {
        matches!(self, Self::BlockEnd)
    }

    /// Phases in which a session is running and an unsealed record exists.
    pub fn is_in_session(&self) -> bool {
        !matches!(self, Self::Idle | Self::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_trial_accepts_responses() {
        use SessionPhase::*;
        for phase in [Idle, Instruction, BlockInstruction, Fixation, BlockEnd, Complete] {
            assert!(!phase.accepts_responses(), "{phase:?}");
        }
        assert!(Trial.accepts_responses());
    }

    #[test]
    fn only_block_end_accepts_advance() {
        use SessionPhase::*;
        for phase in [Idle, Instruction, BlockInstruction, Fixation, Trial, Complete] {
            assert!(!phase.accepts_advance(), "{phase:?}");
        }
        assert!(BlockEnd.accepts_advance());
    }

    #[test]
    fn session_spans_instruction_to_block_end() {
        assert!(!SessionPhase::Idle.is_in_session());
        assert!(SessionPhase::Fixation.is_in_session());
        assert!(SessionPhase::BlockEnd.is_in_session());
        assert!(!SessionPhase::Complete.is_in_session());
    }
}
