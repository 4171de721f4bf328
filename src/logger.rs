//! Log output that shares the terminal with progress bars.

use indicatif::{MultiProgress, ProgressBar};
use log::{Level, LevelFilter, Log, Metadata, Record};

/// `log` backend printing above the active progress bars.
#[derive(Clone)]
pub struct CliLogger {
    bars: MultiProgress,
    level: LevelFilter,
}

impl CliLogger {
    /// Install as the global logger and return a handle for adding bars.
    pub fn install(level: LevelFilter) -> Result<Self, log::SetLoggerError> {
        let logger = Self {
            bars: MultiProgress::new(),
            level,
        };
        log::set_boxed_logger(Box::new(logger.clone()))?;
        log::set_max_level(level);
        Ok(logger)
    }

    /// Register a bar so log lines are drawn above it.
    pub fn add_bar(&self, bar: ProgressBar) -> ProgressBar {
        self.bars.add(bar)
    }
}

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = match record.level() {
            Level::Info => record.args().to_string(),
            level => format!("{}: {}", level.as_str().to_lowercase(), record.args()),
        };

        // Hidden targets (not a terminal) swallow println.
        if self.bars.is_hidden() {
            eprintln!("{line}");
        } else {
            let _ = self.bars.println(line);
        }
    }

    fn flush(&self) {}
}

/// [`p4kit::Progress`] driving a progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl p4kit::Progress for BarProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn advance(&self, done: usize, failed: usize) {
        self.bar.set_position(done as u64);
        if failed > 0 {
            self.bar.set_message(format!("{failed} failed"));
        }
    }

    fn finish(&self, report: &p4kit::BatchReport) {
        self.bar
            .finish_with_message(format!("{} ok, {} failed", report.succeeded, report.failed));
    }
}
