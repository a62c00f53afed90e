//! Runtime plumbing shared by the viewer: deterministic metrics and
//! cancellable one-shot timers.

pub mod metrics;
pub mod timer;

pub use metrics::{Histogram, Metrics};
pub use timer::*;
