//! Turns one Left/Right response into either a finished trial or a retry.
//!
//! Practice blocks force correction: a wrong key marks the trial and the same
//! word stays up until the right key is pressed. Test blocks score the first
//! key press as-is.

use crate::trial::TrialContext;
use iat_core::{BlockSpec, ResponseSide, TrialSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePolicy {
    Practice,
    Test,
}

impl ResponsePolicy {
    pub fn for_block(block: &BlockSpec) -> Self {
        if block.is_practice {
            ResponsePolicy::Practice
        } else {
            ResponsePolicy::Test
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialOutcome {
    pub observed: ResponseSide,
    pub latency_ms: u64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Practice error: nothing recorded, the stimulus stays pending.
    Retry,
    Accepted(TrialOutcome),
}

pub fn classify(
    spec: &TrialSpec,
    policy: ResponsePolicy,
    context: &mut TrialContext,
    response: ResponseSide,
    latency_ms: u64,
) -> Classification {
    let matches = response == spec.correct_response;
    match policy {
        ResponsePolicy::Practice if !matches => {
            context.mark_error();
            Classification::Retry
        }
        ResponsePolicy::Practice => Classification::Accepted(TrialOutcome {
            observed: response,
            latency_ms,
            is_correct: !context.had_error(),
        }),
        ResponsePolicy::Test => Classification::Accepted(TrialOutcome {
            observed: response,
            latency_ms,
            is_correct: matches,
        }),
    }
}
