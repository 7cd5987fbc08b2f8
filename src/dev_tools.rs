use std::time::{Duration, Instant};

use tracing::debug;

/// Logs the wall-clock time spent in consecutive stages of a run.
pub struct Timer {
    label: &'static str,
    last: Instant,
}

impl Timer {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            last: Instant::now(),
        }
    }

    // Logs the time since the previous lap (or creation) and restarts the clock.
    pub fn lap(&mut self, stage: &str) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        debug!(timer = self.label, stage, ?elapsed, "Stage finished");
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lap_restarts_the_clock() {
        let mut timer = Timer::new("test");
        std::thread::sleep(Duration::from_millis(20));
        let first = timer.lap("sleep");
        let second = timer.lap("noop");
        assert!(first >= Duration::from_millis(20));
        assert!(second < first);
    }
}
