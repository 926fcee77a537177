//! Interactive first-run setup

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stream_saver_core::config::default_download_dir;
use stream_saver_core::{bootstrap, Config};

/// The operator declined to continue
#[derive(Debug, thiserror::Error)]
#[error("setup cancelled")]
pub struct SetupCancelled;

/// Run the wizard on the terminal and write the result to `config_path`.
pub fn run_interactive(config_path: &Path) -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout().lock();

    let config = run_wizard(&mut input, &mut output, &default_download_dir())?;
    write_config(config_path, &config)?;
    writeln!(output, "Config written to {}", config_path.display())?;
    Ok(())
}

/// Ask the questions, create the download directory, return the config.
pub fn run_wizard<R: BufRead, W: Write>(input: &mut R, output: &mut W, default_dir: &Path) -> Result<Config> {
    writeln!(
        output,
        "It looks like this is your first run of stream-saver. The following questions will set up your config."
    )?;
    writeln!(
        output,
        "stream-saver needs a Twitch developer application (https://dev.twitch.tv/console/apps) for its client ID and secret."
    )?;
    writeln!(output, "Please create one before continuing.")?;

    let confirm = prompt(input, output, "When you are ready press Y", None)?;
    if !confirm.eq_ignore_ascii_case("y") {
        return Err(SetupCancelled.into());
    }

    let mut config = Config::default();
    config.twitch.client_id = prompt_required(input, output, "What is the client ID from the Twitch developer site?")?;
    config.twitch.client_secret =
        prompt_required(input, output, "What is the client secret from the Twitch developer site?")?;
    config.recorder.username = prompt_required(input, output, "Which Twitch username do you want to record?")?;

    let default_dir = default_dir.display().to_string();
    let download_dir = prompt(input, output, "Where do you want downloads to go?", Some(&default_dir))?;
    config.recorder.download_dir = PathBuf::from(download_dir);

    bootstrap::ensure_valid(&config)?;

    std::fs::create_dir_all(&config.recorder.download_dir).with_context(|| {
        format!(
            "failed to create download directory {}",
            config.recorder.download_dir.display()
        )
    })?;

    Ok(config)
}

/// Serialize `config` as YAML to `path`, creating parent directories.
pub fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))?;

    // The file holds the client secret.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => write!(output, "{question} [{default}]: ")?,
        None => write!(output, "{question}: ")?,
    }
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(SetupCancelled.into());
    }

    let answer = line.trim();
    Ok(match default {
        Some(default) if answer.is_empty() => default.to_string(),
        _ => answer.to_string(),
    })
}

fn prompt_required<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    loop {
        let answer = prompt(input, output, question, None)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
        writeln!(output, "A value is required.")?;
    }
}
