mod console;
mod debug;
mod setup;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use stream_saver_core::{
    bootstrap::{self, CONFIG_PATH_ENV},
    config::{debug_dir, default_config_path},
    crash::{self, CrashInfo},
    layout::DownloadLayout,
    logging,
    processor::{FileProcessor, ProcessingMode},
    session::{RecordingSession, SessionSettings},
    status::TwitchStatusChecker,
    token::{TwitchTokenProvider, TokenStore},
    Config, PollLoop, ProcessTool,
};
use stream_saver_twitch::TwitchClient;

use console::ConsoleReporter;

#[derive(Parser, Debug)]
#[command(name = "stream-saver", version)]
#[command(about = "Record a Twitch broadcaster every time they go live", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    record: RecordArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the broadcaster and record every stream (default)
    Record(RecordArgs),
    /// Create the config file interactively
    Setup(SetupArgs),
    /// Show crash reports
    Debug(DebugArgs),
}

#[derive(Args, Debug, Default)]
struct RecordArgs {
    /// Config file path
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Broadcaster login to watch
    #[arg(short, long)]
    username: Option<String>,

    /// Stream quality passed to streamlink (best, 720p60, ...)
    #[arg(short, long)]
    quality: Option<String>,

    /// Seconds between checks while offline (minimum 15)
    #[arg(short = 'i', long)]
    interval: Option<u64>,

    /// Move recordings as they are instead of repairing them with ffmpeg
    #[arg(long)]
    disable_ffmpeg: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl RecordArgs {
    /// Command line flags take precedence over file and environment.
    fn apply(&self, config: &mut Config) {
        if let Some(username) = &self.username {
            config.recorder.username.clone_from(username);
        }
        if let Some(quality) = &self.quality {
            config.recorder.quality.clone_from(quality);
        }
        if let Some(interval) = self.interval {
            config.recorder.check_interval = interval;
        }
        if self.disable_ffmpeg {
            config.recorder.disable_ffmpeg = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
    }
}

#[derive(Args, Debug)]
struct SetupArgs {
    /// Where to write the config file
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DebugArgs {
    /// Print every report instead of only the newest
    #[arg(long)]
    all: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let crash_dir = debug_dir();

    let result = match cli.command.unwrap_or(Command::Record(cli.record)) {
        Command::Record(args) => {
            crash::install_panic_hook(crash_dir.clone());
            record(args).await
        }
        Command::Setup(args) => {
            let path = args.config.unwrap_or_else(default_config_path);
            setup::run_interactive(&path)
        }
        Command::Debug(args) => debug::show_reports(&crash_dir, args.all, &mut std::io::stdout().lock()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report_failure(&err, &crash_dir)),
    }
}

async fn record(args: RecordArgs) -> Result<()> {
    let mut config_file = bootstrap::locate_config_file(args.config.as_deref());

    if config_file.is_none() && wants_first_run_setup() {
        let path = default_config_path();
        setup::run_interactive(&path)?;
        config_file = Some(path);
    }

    let mut config = bootstrap::load_config(config_file.as_deref())?;
    args.apply(&mut config);
    bootstrap::ensure_valid(&config)?;

    logging::init_logging(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "stream-saver starting");

    let mut poll = build_poll_loop(&config).await?;
    poll.run().await?;
    Ok(())
}

/// First run: nothing configured anywhere and someone at the keyboard.
fn wants_first_run_setup() -> bool {
    let env_has_credentials = Config::from_env().is_ok_and(|c| c.has_credentials());
    !env_has_credentials && std::io::stdin().is_terminal()
}

async fn build_poll_loop(config: &Config) -> Result<PollLoop> {
    let recorder = &config.recorder;
    let client = TwitchClient::with_endpoints(config.twitch.credentials(), config.twitch.endpoints())?;

    info!("Fetching access token");
    let tokens = TokenStore::fetch(Arc::new(TwitchTokenProvider::new(client.clone()))).await?;

    let mode = ProcessingMode::from_disable_ffmpeg(recorder.disable_ffmpeg);
    let processor = FileProcessor::new(mode, Arc::new(ProcessTool::new(&recorder.ffmpeg_path)));
    let session = RecordingSession::new(
        SessionSettings {
            username: recorder.username.clone(),
            quality: recorder.quality.clone(),
            file_extension: recorder.file_extension.clone(),
        },
        DownloadLayout::new(&recorder.download_dir, &recorder.username),
        Arc::new(ProcessTool::new(&recorder.streamlink_path).show_output(true)),
        processor,
    );

    Ok(PollLoop::new(
        Arc::new(TwitchStatusChecker::new(client)),
        tokens,
        session,
        recorder.check_interval,
        Arc::new(ConsoleReporter::new()),
    ))
}

/// Print the reason, write a crash report for anything unexpected, return
/// the exit status.
fn report_failure(err: &anyhow::Error, crash_dir: &Path) -> u8 {
    if err.downcast_ref::<setup::SetupCancelled>().is_some() {
        eprintln!("Exiting");
        return 1;
    }

    if let Some(core) = err.downcast_ref::<stream_saver_core::Error>() {
        if core.is_expected() {
            eprintln!("{core}");
            return core.exit_code();
        }
    }

    eprintln!("stream-saver stopped unexpectedly: {err:#}");
    match crash::write_report(crash_dir, &CrashInfo::new(format!("{err:?}"))) {
        Ok(path) => eprintln!("Crash report written to {}", path.display()),
        Err(e) => eprintln!("Could not write crash report to {}: {e}", crash_dir.display()),
    }
    1
}
