pub mod logger;
pub mod profiler;
pub mod timer;

pub use profiler::{PhaseTiming, Profiler};
pub use timer::Stopwatch;
