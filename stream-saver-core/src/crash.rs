//! Crash reports
//!
//! An unexpected error or a panic leaves a plain-text report in the debug
//! directory (`<config_home>/stream-saver/debug/`). The `debug` command of
//! the binary lists and prints them.

use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

const REPORT_PREFIX: &str = "crash-";
const REPORT_EXTENSION: &str = "log";
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%Hh%Mm%Ss";

/// What went wrong, and where when known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashInfo {
    pub message: String,
    pub location: Option<String>,
}

impl CrashInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Render the report body
#[must_use]
pub fn render_report(info: &CrashInfo, at: &DateTime<Local>, backtrace: &Backtrace) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "stream-saver crash report");
    let _ = writeln!(report, "time:     {}", at.to_rfc3339());
    let _ = writeln!(report, "version:  {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(report, "os:       {}", std::env::consts::OS);
    let _ = writeln!(report, "arch:     {}", std::env::consts::ARCH);
    let _ = writeln!(report, "family:   {}", std::env::consts::FAMILY);
    let _ = writeln!(report, "location: {}", info.location.as_deref().unwrap_or("unknown"));
    let _ = writeln!(report);
    let _ = writeln!(report, "error:");
    let _ = writeln!(report, "{}", info.message);
    let _ = writeln!(report);
    let _ = writeln!(report, "backtrace:");
    let _ = writeln!(report, "{backtrace}");
    report
}

/// Write a report for `info` into `dir`, creating it if needed.
///
/// Returns the path of the new report. Reports written within the same
/// second get a numeric suffix instead of overwriting each other.
pub fn write_report(dir: &Path, info: &CrashInfo) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let now = Local::now();
    let body = render_report(info, &now, &Backtrace::force_capture());
    let stem = format!("{REPORT_PREFIX}{}", now.format(FILE_TIMESTAMP_FORMAT));

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.{REPORT_EXTENSION}")
        } else {
            format!("{stem}-{attempt}.{REPORT_EXTENSION}")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(body.as_bytes())?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Crash reports in `dir`, newest first. A missing directory has none.
pub fn list_reports(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut reports = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if is_report(&path) {
            reports.push(path);
        }
    }
    // Timestamped names sort chronologically.
    reports.sort_by(|a, b| b.cmp(a));
    Ok(reports)
}

fn is_report(path: &Path) -> bool {
    path.is_file()
        && path.extension().is_some_and(|ext| ext == REPORT_EXTENSION)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(REPORT_PREFIX))
}

/// Write a crash report for every panic, then exit with status 1.
pub fn install_panic_hook(dir: PathBuf) {
    std::panic::set_hook(Box::new(move |panic| {
        let payload = panic.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with a non-string payload".to_string());

        let mut info = CrashInfo::new(format!("panic: {message}"));
        if let Some(location) = panic.location() {
            info = info.with_location(format!("{}:{}:{}", location.file(), location.line(), location.column()));
        }

        eprintln!("stream-saver crashed: {message}");
        match write_report(&dir, &info) {
            Ok(path) => eprintln!("Crash report written to {}", path.display()),
            Err(e) => eprintln!("Could not write crash report to {}: {e}", dir.display()),
        }
        std::process::exit(1);
    }));
}
