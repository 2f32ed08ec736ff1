pub mod block;
pub mod error;
pub mod persistence;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use block::{BlockId, BlockSpec, SamplingRule};
pub use error::{ConfigurationError, PersistenceError};
pub use persistence::SessionPersistence;
pub use phase::SessionPhase;
pub use stimulus::{Category, CategoryKind, ResponseSide, StimulusWord};
pub use trial::{BlockStatistics, SessionId, SessionRecord, SessionSummary, TrialResult, TrialSpec};
