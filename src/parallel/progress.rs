//! Progress and ETA reporting for a running dispatch
//!
//! The dispatcher owns a single [`ProgressReporter`] and calls it from its
//! collecting thread after every completed molecule, so reporters never see
//! concurrent or out-of-order updates.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

/// Completion state after one molecule finished
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn new(completed: usize, total: usize, started: Instant) -> Self {
        Self {
            completed,
            total,
            elapsed: started.elapsed(),
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }

    /// Remaining minutes, extrapolated from the average pace so far
    pub fn eta_minutes(&self) -> f64 {
        let fraction = self.fraction();
        if fraction <= 0.0 {
            return f64::INFINITY;
        }
        (self.elapsed_minutes() * (1.0 / fraction - 1.0)).max(0.0)
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Sink for progress updates
pub trait ProgressReporter: Send {
    fn report(&mut self, snapshot: &ProgressSnapshot, label: &str);

    /// Called once the dispatch ends, successfully or not
    fn finish(&mut self) {}
}

/// Render one progress line (without the trailing `\r` or `\n`)
pub fn format_progress_line(
    snapshot: &ProgressSnapshot,
    label: &str,
    now: DateTime<Local>,
) -> String {
    format!(
        "{} {:.2}% {} done after {:.2} minutes. Remaining: {:.2} minutes.",
        now.format("%Y-%m-%d %H:%M:%S%.6f"),
        snapshot.fraction() * 100.0,
        label,
        snapshot.elapsed_minutes(),
        snapshot.eta_minutes()
    )
}

/// Writes one line per completion, rewriting it in place until the last molecule
pub struct LineReporter<W: Write + Send> {
    writer: W,
    dirty: bool,
}

impl<W: Write + Send> LineReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, dirty: false }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl LineReporter<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl LineReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ProgressReporter for LineReporter<W> {
    fn report(&mut self, snapshot: &ProgressSnapshot, label: &str) {
        let line = format_progress_line(snapshot, label, Local::now());
        let terminator = if snapshot.is_done() { "\n" } else { "\r" };
        // Progress output is best-effort; a closed pipe must not fail the dispatch
        let _ = write!(self.writer, "{line}{terminator}");
        let _ = self.writer.flush();
        self.dirty = !snapshot.is_done();
    }

    fn finish(&mut self) {
        // Leave an interrupted in-place line intact and move past it
        if self.dirty {
            let _ = writeln!(self.writer);
            let _ = self.writer.flush();
            self.dirty = false;
        }
    }
}

/// Emits progress as `tracing` events
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&mut self, snapshot: &ProgressSnapshot, label: &str) {
        tracing::info!(
            completed = snapshot.completed,
            total = snapshot.total,
            "{:.2}% {} done after {:.2} minutes. Remaining: {:.2} minutes.",
            snapshot.fraction() * 100.0,
            label,
            snapshot.elapsed_minutes(),
            snapshot.eta_minutes()
        );
    }
}

/// Terminal progress bar, created on the first update
#[derive(Default)]
pub struct BarReporter {
    bar: Option<ProgressBar>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&mut self, total: usize, label: &str) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let style = ProgressStyle::with_template(
                "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} molecules {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            let bar = ProgressBar::new(total as u64);
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar
        })
    }
}

impl ProgressReporter for BarReporter {
    fn report(&mut self, snapshot: &ProgressSnapshot, label: &str) {
        let bar = self.bar(snapshot.total, label);
        bar.set_position(snapshot.completed as u64);
        bar.set_message(format!("ETA {:.2} min", snapshot.eta_minutes()));
        if snapshot.is_done() {
            bar.finish();
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take()
            && !bar.is_finished()
        {
            bar.abandon();
        }
    }
}

/// Discards all updates
#[derive(Debug, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&mut self, _snapshot: &ProgressSnapshot, _label: &str) {}
}

/// Where progress goes, as selected by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    #[default]
    Stderr,
    Stdout,
    Log,
    Bar,
    None,
}

impl ProgressMode {
    pub fn reporter(self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Stderr => Box::new(LineReporter::stderr()),
            ProgressMode::Stdout => Box::new(LineReporter::stdout()),
            ProgressMode::Log => Box::new(TracingReporter),
            ProgressMode::Bar => Box::new(BarReporter::new()),
            ProgressMode::None => Box::new(SilentReporter),
        }
    }
}
