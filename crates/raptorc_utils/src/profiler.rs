use std::time::{Duration, Instant};

/// Records named timing measurements for engine phases.
#[derive(Default)]
pub struct Profiler {
    phases: Vec<PhaseTiming>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_phase<F, T>(&mut self, name: impl Into<String>, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let name = name.into();
        let start = Instant::now();
        let output = f();
        let duration = start.elapsed();
        self.phases.push(PhaseTiming { name, duration });
        output
    }

    pub fn phases(&self) -> &[PhaseTiming] {
        &self.phases
    }

    pub fn total(&self) -> Duration {
        self.phases.iter().map(|phase| phase.duration).sum()
    }
}

#[derive(Clone, Debug)]
pub struct PhaseTiming {
    pub name: String,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_phase_returns_output() {
        let mut profiler = Profiler::new();
        let value = profiler.record_phase("resolve", || 41 + 1);
        assert_eq!(value, 42);
        assert_eq!(profiler.phases().len(), 1);
        assert_eq!(profiler.phases()[0].name, "resolve");
        assert_eq!(profiler.total(), profiler.phases()[0].duration);
    }
}
