use crate::block::{BlockId, SamplingRule};
use crate::stimulus::Category;
use thiserror::Error;

/// A block plan that the catalog cannot satisfy. Raised before any trial runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("block {block} references no categories")]
    NoCategories { block: BlockId },
    #[error("block {block} assigns category {category} to more than one side")]
    AmbiguousSide { block: BlockId, category: Category },
    #[error("block {block} needs {needed} words of {category} but the catalog has {available}")]
    InsufficientWords {
        block: BlockId,
        category: Category,
        needed: usize,
        available: usize,
    },
    #[error("block {block} declares {declared} trials but {rule:?} yields {produced}")]
    TrialCountMismatch {
        block: BlockId,
        rule: SamplingRule,
        declared: usize,
        produced: usize,
    },
    #[error("block {block} assigns category {category} to neither side")]
    UnassignedCategory { block: BlockId, category: Category },
    #[error("block {block} samples zero words per category")]
    EmptySample { block: BlockId },
    #[error("block plan is empty")]
    EmptyPlan,
    #[error("block id {id} appears more than once in the plan")]
    DuplicateBlockId { id: BlockId },
    #[error("block id {id} is not part of the plan")]
    UnknownBlock { id: BlockId },
}

/// Failure of the durable-storage collaborator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("session {0} is already stored")]
    Duplicate(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored session could not be encoded or decoded: {0}")]
    Encoding(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
