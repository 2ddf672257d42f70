//! Cooperative progress reporting
//!
//! An operation declares its total work with [`Monitor::start`], reports
//! increments with [`Monitor::progress`] and finishes with [`Monitor::done`].
//! Callers decide whether progress is visible by handing in either a
//! [`ConsoleMonitor`] or the inert [`NullMonitor`].

use std::io::Write;

/// Receives progress from a running operation
pub trait Monitor {
    /// Begins a task labelled `label` with `total_work` units to do
    fn start(&mut self, label: &str, total_work: f64);

    /// Reports `work` more units as completed
    fn progress(&mut self, work: f64);

    /// Ends the current task
    fn done(&mut self);
}

/// A monitor that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn start(&mut self, _label: &str, _total_work: f64) {}

    fn progress(&mut self, _work: f64) {}

    fn done(&mut self) {}
}

/// Writes `label: started`, `label:  NN%` and `label: done` lines
pub struct ConsoleMonitor<W: Write> {
    out: W,
    label: Option<String>,
    total_work: f64,
    worked: f64,
    last_percent: Option<u32>,
}

impl<W: Write> ConsoleMonitor<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            label: None,
            total_work: 0.0,
            worked: 0.0,
            last_percent: None,
        }
    }

    fn line(&mut self, text: &str) {
        let label = self.label.as_deref().unwrap_or("");
        // Progress output is best-effort; a closed stdout must not fail the operation
        let _ = writeln!(self.out, "{}: {}", label, text);
        let _ = self.out.flush();
    }
}

impl<W: Write> Monitor for ConsoleMonitor<W> {
    fn start(&mut self, label: &str, total_work: f64) {
        self.label = Some(label.to_string());
        self.total_work = total_work;
        self.worked = 0.0;
        self.last_percent = None;
        self.line("started");
    }

    fn progress(&mut self, work: f64) {
        self.worked += work;
        if self.total_work <= 0.0 {
            return;
        }

        let percent = ((self.worked / self.total_work) * 100.0).clamp(0.0, 100.0) as u32;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            self.line(&format!("{:>3}%", percent));
        }
    }

    fn done(&mut self) {
        self.line("done");
        self.label = None;
    }
}
