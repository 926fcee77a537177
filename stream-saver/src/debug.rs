//! `stream-saver debug`: crash report viewer

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use stream_saver_core::crash;

/// List the reports in `dir`, then print the newest one (or all of them).
pub fn show_reports<W: Write>(dir: &Path, all: bool, out: &mut W) -> Result<()> {
    let reports = crash::list_reports(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    if reports.is_empty() {
        writeln!(out, "No crash reports in {}", dir.display())?;
        return Ok(());
    }

    writeln!(out, "{} crash report(s) in {}:", reports.len(), dir.display())?;
    for report in &reports {
        if let Some(name) = report.file_name() {
            writeln!(out, "  {}", name.to_string_lossy())?;
        }
    }

    let shown = if all { &reports[..] } else { &reports[..1] };
    for report in shown {
        let body = std::fs::read_to_string(report).with_context(|| format!("failed to read {}", report.display()))?;
        writeln!(out)?;
        writeln!(out, "==> {} <==", report.display())?;
        write!(out, "{body}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn render(dir: &Path, all: bool) -> String {
        let mut out = Vec::new();
        show_reports(dir, all, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_no_reports() {
        let temp_dir = tempdir().unwrap();
        assert!(render(&temp_dir.path().join("debug"), false).starts_with("No crash reports"));
    }

    #[test]
    fn test_newest_report_printed() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("crash-2024-01-01-00h00m00s.log"), "old failure\n").unwrap();
        std::fs::write(temp_dir.path().join("crash-2024-06-01-00h00m00s.log"), "new failure\n").unwrap();

        let text = render(temp_dir.path(), false);
        assert!(text.contains("2 crash report(s)"));
        assert!(text.contains("new failure"));
        assert!(!text.contains("old failure"));

        let text = render(temp_dir.path(), true);
        assert!(text.contains("new failure"));
        assert!(text.contains("old failure"));
    }
}
