//! Post-processing of raw captures
//!
//! A raw file is either moved verbatim (fast mode) or remuxed into its final
//! location (repair mode). Both write to a staging file next to the final
//! path and rename it into place, so a failure never touches an existing
//! final file. The raw file is only removed once the final file exists.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tool::ExternalTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Move the raw file as is
    Move,
    /// Remux through the repair tool, tolerating decode errors
    Repair,
}

impl ProcessingMode {
    /// Mode selected by the `disable_ffmpeg` flag
    #[must_use]
    pub const fn from_disable_ffmpeg(disable_ffmpeg: bool) -> Self {
        if disable_ffmpeg {
            Self::Move
        } else {
            Self::Repair
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Moved,
    Repaired,
}

pub struct FileProcessor {
    mode: ProcessingMode,
    remux: Arc<dyn ExternalTool>,
}

impl FileProcessor {
    pub fn new(mode: ProcessingMode, remux: Arc<dyn ExternalTool>) -> Self {
        Self { mode, remux }
    }

    #[must_use]
    pub const fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Turn `raw` into `processed`.
    ///
    /// On `Err` the raw file is still in place and no processed file exists.
    pub async fn process(&self, raw: &Path, processed: &Path) -> Result<ProcessOutcome> {
        match self.mode {
            ProcessingMode::Move => {
                move_file(raw, processed).await?;
                Ok(ProcessOutcome::Moved)
            }
            ProcessingMode::Repair => {
                self.repair(raw, processed).await?;
                Ok(ProcessOutcome::Repaired)
            }
        }
    }

    async fn repair(&self, raw: &Path, processed: &Path) -> Result<()> {
        let staging = staging_path(processed);
        let output = match self.remux.run(&remux_args(raw, &staging)).await {
            Ok(output) => output,
            Err(e) => {
                discard_partial(&staging).await;
                return Err(e);
            }
        };

        if !output.success() {
            discard_partial(&staging).await;
            return Err(Error::Tool(format!(
                "{} failed on {}: {}",
                self.remux.name(),
                raw.display(),
                output.failure_reason()
            )));
        }

        if !tokio::fs::try_exists(&staging).await.unwrap_or(false) {
            return Err(Error::Tool(format!(
                "{} reported success but {} was not written",
                self.remux.name(),
                staging.display()
            )));
        }

        promote(&staging, processed).await?;
        tokio::fs::remove_file(raw).await?;
        Ok(())
    }
}

/// `-y -err_detect ignore_err -i <raw> -c copy <processed>`
#[must_use]
pub fn remux_args(raw: &Path, processed: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-err_detect".into(),
        "ignore_err".into(),
        "-i".into(),
        raw.as_os_str().to_owned(),
        "-c".into(),
        "copy".into(),
        processed.as_os_str().to_owned(),
    ]
}

/// `<dir>/.partial-<name>`, keeping the extension so the remux tool still
/// picks the right container
fn staging_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".partial-");
    if let Some(file_name) = target.file_name() {
        name.push(file_name);
    }
    target.with_file_name(name)
}

/// Rename `staging` over `target`, discarding `staging` on failure
async fn promote(staging: &Path, target: &Path) -> Result<()> {
    if let Err(e) = tokio::fs::rename(staging, target).await {
        discard_partial(staging).await;
        return Err(e.into());
    }
    Ok(())
}

/// Rename, falling back to copy and delete across filesystems
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    tracing::debug!(from = %from.display(), to = %to.display(), "Rename failed, copying instead");
    let staging = staging_path(to);
    if let Err(e) = tokio::fs::copy(from, &staging).await {
        discard_partial(&staging).await;
        return Err(e.into());
    }
    promote(&staging, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove partial output"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tool::ToolOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Remux stand-in: copies input to output on success, leaves a truncated
    /// output behind on failure.
    pub(crate) struct FakeRemux {
        pub succeed: bool,
        pub runs: AtomicUsize,
    }

    impl FakeRemux {
        pub(crate) fn new(succeed: bool) -> Self {
            Self {
                succeed,
                runs: AtomicUsize::new(0),
            }
        }

        pub(crate) fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExternalTool for FakeRemux {
        fn name(&self) -> &str {
            "fake-ffmpeg"
        }

        async fn run(&self, args: &[OsString]) -> Result<ToolOutput> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let input = Path::new(&args[4]);
            let output = Path::new(&args[args.len() - 1]);
            if self.succeed {
                std::fs::copy(input, output)?;
                Ok(ToolOutput {
                    exit_code: Some(0),
                    ..ToolOutput::default()
                })
            } else {
                std::fs::write(output, b"trunc")?;
                Ok(ToolOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "Invalid data found when processing input".to_string(),
                })
            }
        }
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(ProcessingMode::from_disable_ffmpeg(true), ProcessingMode::Move);
        assert_eq!(ProcessingMode::from_disable_ffmpeg(false), ProcessingMode::Repair);
    }

    #[test]
    fn test_remux_args() {
        let args = remux_args(Path::new("/r/in.mp4"), Path::new("/p/out.mp4"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-y", "-err_detect", "ignore_err", "-i", "/r/in.mp4", "-c", "copy", "/p/out.mp4"]
        );
    }

    #[tokio::test]
    async fn test_repair_success_removes_raw() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw.mp4");
        let processed = temp_dir.path().join("processed.mp4");
        std::fs::write(&raw, b"media bytes").unwrap();

        let remux = Arc::new(FakeRemux::new(true));
        let processor = FileProcessor::new(ProcessingMode::Repair, remux.clone());

        let outcome = processor.process(&raw, &processed).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Repaired);
        assert!(!raw.exists());
        assert!(processed.exists());
        assert_eq!(remux.runs(), 1);
    }

    #[tokio::test]
    async fn test_repair_failure_keeps_raw() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw.mp4");
        let processed = temp_dir.path().join("processed.mp4");
        std::fs::write(&raw, b"media bytes").unwrap();

        let processor = FileProcessor::new(ProcessingMode::Repair, Arc::new(FakeRemux::new(false)));

        let err = processor.process(&raw, &processed).await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
        assert!(err.to_string().contains("exit code 1"));
        assert_eq!(std::fs::read(&raw).unwrap(), b"media bytes");
        assert!(!processed.exists());
    }

    #[tokio::test]
    async fn test_repair_without_output_keeps_raw() {
        struct SilentRemux;

        #[async_trait]
        impl ExternalTool for SilentRemux {
            fn name(&self) -> &str {
                "silent"
            }

            async fn run(&self, _args: &[OsString]) -> Result<ToolOutput> {
                Ok(ToolOutput {
                    exit_code: Some(0),
                    ..ToolOutput::default()
                })
            }
        }

        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw.mp4");
        let processed = temp_dir.path().join("processed.mp4");
        std::fs::write(&raw, b"media bytes").unwrap();

        let processor = FileProcessor::new(ProcessingMode::Repair, Arc::new(SilentRemux));
        assert!(processor.process(&raw, &processed).await.is_err());
        assert!(raw.exists());
    }

    #[tokio::test]
    async fn test_move_is_byte_identical() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw.ts");
        let processed = temp_dir.path().join("out").join("final.ts");
        std::fs::create_dir_all(processed.parent().unwrap()).unwrap();

        let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024 + 7).collect();
        std::fs::write(&raw, &payload).unwrap();

        let remux = Arc::new(FakeRemux::new(true));
        let processor = FileProcessor::new(ProcessingMode::Move, remux.clone());

        let outcome = processor.process(&raw, &processed).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Moved);
        assert!(!raw.exists());
        assert_eq!(std::fs::read(&processed).unwrap(), payload);
        assert_eq!(remux.runs(), 0);
    }

    #[tokio::test]
    async fn test_failed_move_keeps_existing_final_file() {
        let temp_dir = tempdir().unwrap();
        let final_path = temp_dir.path().join("final.mp4");
        std::fs::write(&final_path, b"earlier recording").unwrap();

        let processor = FileProcessor::new(ProcessingMode::Move, Arc::new(FakeRemux::new(true)));
        let result = processor.process(&temp_dir.path().join("gone.mp4"), &final_path).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"earlier recording");
        assert!(!staging_path(&final_path).exists());
    }

    #[tokio::test]
    async fn test_failed_repair_keeps_existing_final_file() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw.mp4");
        let final_path = temp_dir.path().join("final.mp4");
        std::fs::write(&raw, b"media bytes").unwrap();
        std::fs::write(&final_path, b"earlier recording").unwrap();

        let processor = FileProcessor::new(ProcessingMode::Repair, Arc::new(FakeRemux::new(false)));
        assert!(processor.process(&raw, &final_path).await.is_err());

        assert_eq!(std::fs::read(&final_path).unwrap(), b"earlier recording");
        assert!(raw.exists());
        assert!(!staging_path(&final_path).exists());
    }

    #[test]
    fn test_staging_path_keeps_extension() {
        assert_eq!(
            staging_path(Path::new("/p/streamer/a.mp4")),
            PathBuf::from("/p/streamer/.partial-a.mp4")
        );
    }

    #[tokio::test]
    async fn test_move_missing_source_fails() {
        let temp_dir = tempdir().unwrap();
        let processor = FileProcessor::new(ProcessingMode::Move, Arc::new(FakeRemux::new(true)));

        let result = processor
            .process(&temp_dir.path().join("gone.mp4"), &temp_dir.path().join("final.mp4"))
            .await;
        assert!(result.is_err());
        assert!(!temp_dir.path().join("final.mp4").exists());
    }
}
