//! A plain-text progress meter for run logs (`3/10 [01:30<03:30, 30.00s/it]`).

use std::time::{Duration, Instant};

/// Tracks elapsed time over a known number of steps.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    total: usize,
    started: Instant,
}

impl ProgressMeter {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            started: Instant::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Meter after `done` steps.
    pub fn format(&self, done: usize) -> String {
        format_meter(done, self.total, self.started.elapsed())
    }
}

/// `done/total [elapsed<remaining, rate]`; the remaining time is extrapolated from the
/// mean step time so far.
pub fn format_meter(done: usize, total: usize, elapsed: Duration) -> String {
    let elapsed_secs = elapsed.as_secs_f64();

    if done == 0 {
        return format!("{done}/{total} [{}<?, ?s/it]", format_interval(elapsed_secs));
    }

    let per_step = elapsed_secs / done as f64;
    let remaining = per_step * total.saturating_sub(done) as f64;
    let rate = if per_step >= 1.0 || per_step == 0.0 {
        format!("{per_step:.2}s/it")
    } else {
        format!("{:.2}it/s", 1.0 / per_step)
    };

    format!(
        "{done}/{total} [{}<{}, {rate}]",
        format_interval(elapsed_secs),
        format_interval(remaining)
    )
}

/// `MM:SS`, or `H:MM:SS` past the hour.
fn format_interval(secs: f64) -> String {
    let secs = secs.max(0.0).round() as u64;
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_extrapolates_remaining_time() {
        let line = format_meter(3, 10, Duration::from_secs(90));
        assert_eq!(line, "3/10 [01:30<03:30, 30.00s/it]");
    }

    #[test]
    fn fast_steps_report_iterations_per_second() {
        let line = format_meter(4, 4, Duration::from_secs(1));
        assert_eq!(line, "4/4 [00:01<00:00, 4.00it/s]");
    }

    #[test]
    fn nothing_done_yet_has_unknown_rate() {
        assert_eq!(format_meter(0, 5, Duration::ZERO), "0/5 [00:00<?, ?s/it]");
    }

    #[test]
    fn long_runs_show_hours() {
        let line = format_meter(1, 2, Duration::from_secs(3725));
        assert!(line.starts_with("1/2 [1:02:05<1:02:05"));
    }
}
