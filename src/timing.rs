use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Wall time of one pipeline phase, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTiming {
    pub phase: String,
    pub millis: f64,
}

/// A simple struct to measure and report execution time
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Create a new timer with the given name
    pub fn new(name: &str) -> Self {
        Timer {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    /// Get the elapsed time since the timer was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Stop the timer and keep the measurement
    pub fn finish(self) -> PhaseTiming {
        PhaseTiming {
            millis: self.elapsed_ms(),
            phase: self.name,
        }
    }
}

impl fmt::Display for PhaseTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2} ms", self.phase, self.millis)
    }
}
