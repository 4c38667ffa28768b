//! Wall-clock timing for batch runs.

use std::fmt;
use std::time::{Duration, Instant};

/// Records when a run started and finished.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    started: Option<Instant>,
    finished: Option<Instant>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of the run. Calling it again restarts the clock.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.finished = None;
    }

    /// Marks the end of the run.
    pub fn finish(&mut self) {
        self.finished = Some(Instant::now());
    }

    /// Elapsed time between `start` and `finish` (or now, if still running).
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.finished) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn summary(&self, prompt_count: usize) -> RunSummary {
        RunSummary::new(self.elapsed(), prompt_count)
    }
}

/// Derived statistics of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub prompt_count: usize,
}

impl RunSummary {
    pub fn new(elapsed: Duration, prompt_count: usize) -> Self {
        Self {
            elapsed,
            prompt_count,
        }
    }

    /// Builds a summary from explicit start/end offsets.
    pub fn from_bounds(start: Duration, end: Duration, prompt_count: usize) -> Self {
        Self::new(end.saturating_sub(start), prompt_count)
    }

    /// Mean elapsed time per prompt; `None` when no prompts were processed.
    pub fn mean_per_prompt(&self) -> Option<Duration> {
        let count = u32::try_from(self.prompt_count).ok()?;
        if count == 0 {
            return None;
        }
        Some(self.elapsed / count)
    }

    /// Throughput; `None` when nothing was processed or no time elapsed.
    pub fn prompts_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if self.prompt_count == 0 || secs == 0.0 {
            return None;
        }
        Some(self.prompt_count as f64 / secs)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} prompts in {:.2}s, ",
            self.prompt_count,
            self.elapsed.as_secs_f64()
        )?;
        match self.mean_per_prompt() {
            Some(mean) => write!(f, "{:.4}s per prompt", mean.as_secs_f64())?,
            None => write!(f, "undefined per prompt")?,
        }
        match self.prompts_per_second() {
            Some(rate) => write!(f, ", {rate:.2} prompts/s"),
            None => write!(f, ", throughput undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_for_ten_prompts_in_ten_seconds() {
        let summary = RunSummary::from_bounds(Duration::ZERO, Duration::from_secs(10), 10);
        assert_eq!(summary.mean_per_prompt(), Some(Duration::from_secs(1)));
        assert_eq!(summary.prompts_per_second(), Some(1.0));
    }

    #[test]
    fn test_zero_prompts_is_undefined() {
        let summary = RunSummary::from_bounds(Duration::ZERO, Duration::from_secs(3), 0);
        assert_eq!(summary.mean_per_prompt(), None);
        assert_eq!(summary.prompts_per_second(), None);
        assert!(summary.to_string().contains("undefined per prompt"));
    }

    #[test]
    fn test_display_formats_mean() {
        let summary = RunSummary::new(Duration::from_millis(2500), 2);
        assert_eq!(
            summary.to_string(),
            "2 prompts in 2.50s, 1.2500s per prompt, 0.80 prompts/s"
        );
    }

    #[test]
    fn test_recorder_without_start_reports_zero() {
        let recorder = MetricsRecorder::new();
        assert_eq!(recorder.elapsed(), Duration::ZERO);
        assert_eq!(recorder.summary(0).mean_per_prompt(), None);
    }

    #[test]
    fn test_recorder_measures_elapsed() {
        let mut recorder = MetricsRecorder::new();
        recorder.start();
        std::thread::sleep(Duration::from_millis(5));
        recorder.finish();

        let elapsed = recorder.elapsed();
        assert!(elapsed >= Duration::from_millis(5));
        assert_eq!(recorder.elapsed(), elapsed);
    }
}
