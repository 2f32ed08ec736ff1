pub mod latency;
pub mod schedule;
pub mod timer;

pub use latency::latency_between;
pub use schedule::{Scheduler, TimerHandle};
pub use timer::{HighPrecisionTimer, ManualTimer, Timer};
