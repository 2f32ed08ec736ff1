pub mod catalog;
pub mod classifier;
pub mod config;
pub mod plan;
pub mod sequencer;
pub mod state;
pub mod store;
pub mod trial;

pub use catalog::StimulusCatalog;
pub use classifier::{Classification, ResponsePolicy, TrialOutcome, classify};
pub use config::ExperimentConfig;
pub use plan::BlockPlan;
pub use sequencer::generate_trials;
pub use state::{DropReason, EventOutcome, ExperimentError, ExperimentEvent, ExperimentStateMachine, StimulusView};
pub use store::{ResultStore, StoreError};
pub use trial::{TrialContext, TrialToken};
