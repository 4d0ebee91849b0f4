//! Progress & Status
//!
//! A proportional-progress callback plus non-fatal diagnostics, matching
//! the cadence convention of the teacher's download/import crates: report
//! in coarse percent steps (`ceil(fraction * 100)`), not per-row.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Receives progress and status updates from the orchestrator. The default
/// no-op implementation costs nothing when a caller does not need progress
/// reporting (e.g. library consumers, tests).
pub trait ProgressSink {
    fn on_progress(&mut self, _percent: u8) {}
    fn on_status(&mut self, _message: &str) {}
}

/// Discards every update.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {}

/// Tracks fractional progress across `total` units of work and reports a
/// new percent only when it has advanced, matching §5's "only an optional
/// progress callback at coarse intervals" cooperative-scheduling note.
pub struct ProgressTracker {
    total: usize,
    done: usize,
    last_reported_pct: u8,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        ProgressTracker { total: total.max(1), done: 0, last_reported_pct: 0 }
    }

    /// Advances by one unit and reports to `sink` if the percent changed.
    pub fn advance(&mut self, sink: &mut dyn ProgressSink) {
        self.done += 1;
        let fraction = self.done as f64 / self.total as f64;
        let pct = (fraction * 100.0).ceil().min(100.0) as u8;
        if pct != self.last_reported_pct {
            self.last_reported_pct = pct;
            sink.on_progress(pct);
        }
    }
}

/// Rewrites `progress.txt` at each reported percent, per §6's frozen
/// two-line schema: integer percent, then an elapsed/remaining estimate.
pub struct FileProgressSink {
    path: PathBuf,
    started_at: Instant,
    last_pct: u8,
}

impl FileProgressSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileProgressSink { path: path.into(), started_at: Instant::now(), last_pct: 0 }
    }

    fn write(&self, pct: u8) -> io::Result<()> {
        let elapsed_s = self.started_at.elapsed().as_secs_f64();
        let remaining_s = if pct > 0 {
            (elapsed_s / pct as f64 * (100 - pct) as f64).max(0.0)
        } else {
            0.0
        };
        let body = format!("{pct}\nElapsed Time: {elapsed_s:.1} s, Remaining: {remaining_s:.1} s\n");
        fs::write(&self.path, body)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressSink for FileProgressSink {
    fn on_progress(&mut self, percent: u8) {
        self.last_pct = percent;
        let _ = self.write(percent);
    }

    fn on_status(&mut self, message: &str) {
        tracing::info!(status = message, "afc-engine status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        pcts: Vec<u8>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&mut self, percent: u8) {
            self.pcts.push(percent);
        }
    }

    #[test]
    fn tracker_reports_only_on_percent_change() {
        let mut sink = RecordingSink { pcts: Vec::new() };
        let mut tracker = ProgressTracker::new(200);
        for _ in 0..200 {
            tracker.advance(&mut sink);
        }
        assert_eq!(sink.pcts.last(), Some(&100));
        // with 200 steps over 100 percent, each step moves by 0.5%, so we
        // should see far fewer reports than total steps.
        assert!(sink.pcts.len() < 200);
        assert!(sink.pcts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn file_sink_writes_two_lines() {
        let dir = std::env::temp_dir().join(format!("afc-progress-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("progress.txt");
        let mut sink = FileProgressSink::new(&path);
        sink.on_progress(42);
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines[0], "42");
        assert!(lines[1].starts_with("Elapsed Time:"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
