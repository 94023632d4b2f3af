use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only progress bar and final summary
    Summary = 1,   // Run milestones (default)
    Detailed = 2,  // Per-link and per-page detail, warnings
    Debug = 3,     // Every browser action
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

/// Side-channel log of browser-automation and download activity.
///
/// Every line is buffered regardless of verbosity so the caller can show the
/// full log after a run, on success and on failure. Verbosity only controls
/// what is echoed to stderr while the run is in progress.
#[derive(Clone)]
pub struct DiagnosticsLog {
    verbosity: VerbosityLevel,
    echo: bool,
    show_progress: bool,
    progress_bar: Arc<Mutex<Option<ProgressBar>>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<String>,
}

impl DiagnosticsLog {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            echo: true,
            show_progress: true,
            progress_bar: Arc::new(Mutex::new(None)),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            log_file_path: Some(log_file_path),
            ..Self::new(verbosity)
        }
    }

    /// Buffers everything, prints nothing. Used by tests and embedding callers.
    pub fn quiet() -> Self {
        Self {
            echo: false,
            show_progress: false,
            ..Self::new(VerbosityLevel::Silent)
        }
    }

    pub fn info(&self, message: &str) {
        self.record("INFO", message, VerbosityLevel::Summary);
    }

    pub fn warn(&self, message: &str) {
        self.record("WARN", message, VerbosityLevel::Detailed);
    }

    pub fn error(&self, message: &str) {
        // errors are echoed at every verbosity
        self.record("ERROR", message, VerbosityLevel::Silent);
    }

    pub fn debug(&self, message: &str) {
        self.record("DEBUG", message, VerbosityLevel::Debug);
    }

    fn record(&self, level: &str, message: &str, echo_at: VerbosityLevel) {
        let line = format!("[{}] {}: {}", timestamp(), level, message);

        if let Ok(mut buffer) = self.log_buffer.lock() {
            buffer.push(line.clone());
        }

        if !self.echo || self.verbosity < echo_at {
            return;
        }

        // Print through the progress bar when one is active so lines don't tear it
        if let Ok(guard) = self.progress_bar.try_lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(line);
                return;
            }
        }

        eprintln!("{}", line);
    }

    pub fn start_progress(&self, total_steps: u64, message: &str) {
        let pb = if self.show_progress {
            ProgressBar::new(total_steps)
        } else {
            ProgressBar::hidden()
        };

        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message(message.to_string());

        if let Ok(mut guard) = self.progress_bar.lock() {
            *guard = Some(pb);
        }
    }

    pub fn advance_progress(&self, message: &str) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(message.to_string());
                pb.inc(1);
            }
        }
    }

    pub fn finish_progress(&self) {
        if let Ok(mut guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    /// Snapshot of every buffered line, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.log_buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    /// Number of buffered lines containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.log_buffer
            .lock()
            .map(|buffer| buffer.iter().filter(|l| l.contains(needle)).count())
            .unwrap_or(0)
    }

    /// Write the whole log to `out`, framed for display.
    pub fn print_to(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "=== Browser Log ===")?;
        for line in self.entries() {
            writeln!(out, "{}", line)?;
        }
        writeln!(out, "===================")
    }

    /// Export all collected logs to the configured file, if any
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(ref log_file_path) = self.log_file_path else {
            return Ok(());
        };

        if let Some(parent) = Path::new(log_file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;

        for entry in self.entries() {
            writeln!(file, "{}", entry)?;
        }

        file.flush()
    }
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();

    format!(
        "{:02}:{:02}:{:02}.{:03}",
        (secs / 3600) % 24,
        (secs % 3600) / 60,
        secs % 60,
        now.subsec_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(VerbosityLevel::from_verbose_count(0), VerbosityLevel::Summary);
        assert_eq!(VerbosityLevel::from_verbose_count(1), VerbosityLevel::Detailed);
        assert_eq!(VerbosityLevel::from_verbose_count(5), VerbosityLevel::Debug);
    }

    #[test]
    fn test_quiet_log_still_buffers_everything() {
        let log = DiagnosticsLog::quiet();
        log.debug("clicked year selector");
        log.warn("page 2 yielded nothing");
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].contains("DEBUG: clicked year selector"));
        assert!(entries[1].contains("WARN: page 2 yielded nothing"));
    }

    #[test]
    fn test_clones_share_buffer() {
        let log = DiagnosticsLog::quiet();
        let clone = log.clone();
        clone.info("from clone");
        assert_eq!(log.count_containing("from clone"), 1);
    }

    #[test]
    fn test_export_logs_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("browser.log");
        let log = DiagnosticsLog {
            echo: false,
            ..DiagnosticsLog::with_log_file(VerbosityLevel::Silent, path.to_string_lossy().into_owned())
        };
        log.info("session acquired");
        log.export_logs().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("INFO: session acquired"));
    }

    #[test]
    fn test_print_to_frames_log() {
        let log = DiagnosticsLog::quiet();
        log.info("one");
        let mut out = Vec::new();
        log.print_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("=== Browser Log ==="));
        assert!(text.contains("INFO: one"));
    }
}
