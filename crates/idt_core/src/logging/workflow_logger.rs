//! Per-run logger with file and console output.
//!
//! Each workflow run gets its own logger that:
//! - Writes to `logs/workflow_<timestamp>.log` under the run's output dir
//! - Mirrors messages to the console through `tracing`
//! - Sends formatted lines to an optional callback
//! - Records external tool output verbatim for post-mortem diagnosis
//! - Keeps the last stderr lines of tools for display after a failure

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};
use crate::naming;

/// `tracing` target used when mirroring to the console.
const CONSOLE_TARGET: &str = "workflow";

/// Per-run logger with dual output (file + console).
pub struct WorkflowLogger {
    /// Logger name.
    name: String,
    /// Path to log file (None for console-only loggers).
    log_path: Option<PathBuf>,
    /// File writer.
    file_writer: Mutex<Option<RollingFileAppender>>,
    /// Extra sink for formatted lines.
    callback: Mutex<Option<LogCallback>>,
    /// Logging configuration.
    config: LogConfig,
    /// Last stderr lines of external tools.
    tail_buffer: Mutex<VecDeque<String>>,
}

impl WorkflowLogger {
    /// Create a logger writing to a new timestamped file in `logs_dir`.
    ///
    /// # Arguments
    /// * `name` - Logger name (shown in the header line)
    /// * `logs_dir` - Directory for the log file (created if missing)
    /// * `config` - Logging configuration
    /// * `callback` - Optional extra sink
    pub fn new(
        name: impl Into<String>,
        logs_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> io::Result<Self> {
        let name = name.into();
        let logs_dir = logs_dir.as_ref();

        fs::create_dir_all(logs_dir)?;

        let prefix = format!("workflow_{}", naming::timestamp(Local::now()));
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(prefix.as_str())
            .filename_suffix("log")
            .build(logs_dir)
            .map_err(io::Error::other)?;
        let log_path = logs_dir.join(format!("{}.log", prefix));

        let logger = Self {
            name,
            log_path: Some(log_path),
            file_writer: Mutex::new(Some(appender)),
            callback: Mutex::new(callback),
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
        };

        if let Some(path) = logger.log_path() {
            let header = format!("{} log file: {}", logger.name, path.display());
            logger.info(&header);
        }

        Ok(logger)
    }

    /// Create a logger without a file sink.
    pub fn console(name: impl Into<String>, config: LogConfig) -> Self {
        Self {
            name: name.into(),
            log_path: None,
            file_writer: Mutex::new(None),
            callback: Mutex::new(None),
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
        }
    }

    /// Get the logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Replace the extra sink.
    pub fn set_callback(&self, callback: Option<LogCallback>) {
        *self.callback.lock() = callback;
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        if self.config.console {
            emit_console(level, message);
        }

        let formatted = self.format_message(level, message);
        self.output(&formatted);
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    /// Log a section marker.
    pub fn section(&self, section_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(section_name));
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Record captured output of an external tool.
    ///
    /// Stdout is written verbatim at info level, stderr verbatim at
    /// warning level. Blank streams are skipped. Stderr lines also go to
    /// the tail buffer.
    pub fn tool_output(&self, tool: &str, stdout: &str, stderr: &str) {
        if !stdout.trim().is_empty() {
            self.info(&format!("{} output:\n{}", tool, stdout.trim_end()));
        }
        if !stderr.trim().is_empty() {
            self.warn(&format!("{} stderr:\n{}", tool, stderr.trim_end()));
            self.add_to_tail(stderr);
        }
    }

    /// Show the tail buffer (e.g., after an error).
    pub fn show_tail(&self, label: &str) {
        let lines = self.get_tail();
        if lines.is_empty() {
            return;
        }
        self.error(&format!(
            "--- Last {} lines of {} stderr ---\n{}",
            lines.len(),
            label,
            lines.join("\n")
        ));
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Clear the tail buffer.
    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    /// Format a message with level and timestamp (if enabled).
    fn format_message(&self, level: LogLevel, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            format!("[{}] {} {}", timestamp, level.label(), message)
        } else {
            format!("{} {}", level.label(), message)
        }
    }

    fn add_to_tail(&self, text: &str) {
        if self.config.error_tail == 0 {
            return;
        }
        let mut buffer = self.tail_buffer.lock();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            buffer.push_back(line.to_string());
        }
    }

    /// Output a formatted line to the file and the callback.
    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = *self.callback.lock() {
            callback(formatted);
        }
    }
}

impl Drop for WorkflowLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn emit_console(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => tracing::trace!(target: CONSOLE_TARGET, "{}", message),
        LogLevel::Debug => tracing::debug!(target: CONSOLE_TARGET, "{}", message),
        LogLevel::Info => tracing::info!(target: CONSOLE_TARGET, "{}", message),
        LogLevel::Warn => tracing::warn!(target: CONSOLE_TARGET, "{}", message),
        LogLevel::Error => tracing::error!(target: CONSOLE_TARGET, "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn file_logger(dir: &Path) -> WorkflowLogger {
        WorkflowLogger::new("workflow_orchestrator", dir, LogConfig::quiet(), None).unwrap()
    }

    #[test]
    fn creates_timestamped_log_file() {
        let dir = tempdir().unwrap();
        let logger = file_logger(dir.path());

        let path = logger.log_path().unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("workflow_"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = file_logger(dir.path());

        logger.info("Test message");
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("INFO Test message"));
        assert!(content.contains("log file:"));
    }

    #[test]
    fn debug_is_filtered_at_info_level() {
        let dir = tempdir().unwrap();
        let logger = file_logger(dir.path());

        logger.debug("hidden detail");
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(!content.contains("hidden detail"));
    }

    #[test]
    fn tool_output_is_verbatim() {
        let dir = tempdir().unwrap();
        let logger = file_logger(dir.path());

        logger.tool_output("ConvertImage.py", "converted 3 files\ndone\n", "warning: exif\n");
        logger.tool_output("image_describer.py", "   \n", "");
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("INFO ConvertImage.py output:\nconverted 3 files\ndone"));
        assert!(content.contains("WARNING ConvertImage.py stderr:\nwarning: exif"));
        assert!(!content.contains("image_describer.py"));
    }

    #[test]
    fn tail_keeps_last_stderr_lines() {
        let config = LogConfig {
            error_tail: 2,
            ..LogConfig::quiet()
        };
        let logger = WorkflowLogger::console("test", config);

        logger.tool_output("image_describer.py", "ignored\n", "one\ntwo\n\nthree\n");
        assert_eq!(logger.get_tail(), vec!["two", "three"]);

        logger.clear_tail();
        assert!(logger.get_tail().is_empty());
    }

    #[test]
    fn calls_callback() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();

        let logger = WorkflowLogger::console("test", LogConfig::quiet());
        logger.set_callback(Some(Box::new(move |_line| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })));

        logger.info("Message 1");
        logger.warn("Message 2");
        logger.debug("filtered");

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
        assert!(logger.log_path().is_none());
    }
}
