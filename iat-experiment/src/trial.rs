use std::fmt;

/// Identity of one stimulus presentation.
///
/// Tokens come from the engine's phase epoch, which moves on every phase
/// transition, so a token never matches any later trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrialToken(u64);

impl TrialToken {
    pub(crate) fn from_epoch(epoch: u64) -> Self {
        Self(epoch)
    }
}

impl fmt::Display for TrialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-trial sub-state of the `Trial` phase. Built in one piece at onset so
/// the error marker and onset timestamp can never disagree about which trial
/// they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialContext {
    token: TrialToken,
    onset_ns: u64,
    had_error: bool,
}

impl TrialContext {
    pub fn begin(token: TrialToken, onset_ns: u64) -> Self {
        Self {
            token,
            onset_ns,
            had_error: false,
        }
    }

    pub fn token(&self) -> TrialToken {
        self.token
    }

    pub fn onset_ns(&self) -> u64 {
        self.onset_ns
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub(crate) fn mark_error(&mut self) {
        self.had_error = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_no_error() {
        let mut ctx = TrialContext::begin(TrialToken::from_epoch(3), 42);
        assert!(!ctx.had_error());
        ctx.mark_error();
        assert!(ctx.had_error());

        let next = TrialContext::begin(TrialToken::from_epoch(5), 99);
        assert!(!next.had_error());
        assert_eq!(next.onset_ns(), 99);
        assert_ne!(next.token(), ctx.token());
    }
}
