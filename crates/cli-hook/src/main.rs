use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use env_logger::{Env, Target};
use hook::{Hook, HookConfig, ImportEvent, Outcome, Source};
use log::{error, info};

/// Re-encode high-bitrate imports overnight via at(1)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log the conversion job instead of submitting it
    #[arg(long)]
    dry_run: bool,

    /// Download manager invoking the hook (sonarr or radarr)
    #[arg(long, value_parser = parse_source)]
    source: Option<Source>,
}

fn parse_source(raw: &str) -> Result<Source, String> {
    match raw.to_ascii_lowercase().as_str() {
        "sonarr" => Ok(Source::Sonarr),
        "radarr" => Ok(Source::Radarr),
        other => Err(format!("unknown source '{}', expected sonarr or radarr", other)),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match load_config(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            // No log file is known yet, so stderr is the only place to report this
            eprintln!("reencode-hook: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&cfg, args.verbose) {
        // The log file could not be opened; stderr is used only before logging exists
        eprintln!("reencode-hook: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Import hook started");
    let code = run(&cfg).await;
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn load_config(args: &Args) -> Result<HookConfig> {
    let mut cfg = HookConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if args.dry_run {
        cfg.dry_run = true;
    }
    if let Some(source) = args.source {
        cfg.source = source;
    }
    Ok(cfg)
}

/// Route all log output to the append-only log file.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(cfg: &HookConfig, verbose: bool) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_file)
        .with_context(|| format!("Failed to open log file: {}", cfg.log_file.display()))?;

    let level = if verbose { "debug" } else { cfg.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<8} {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .try_init()
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Handle the import event and return the process exit code
async fn run(cfg: &HookConfig) -> i32 {
    let hook = match Hook::from_config(cfg) {
        Ok(hook) => hook,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return 1;
        }
    };

    let event = match ImportEvent::from_env(cfg.source) {
        Ok(event) => event,
        Err(e) => {
            error!("Error reading environment variables: {}", e);
            return e.exit_code();
        }
    };

    match hook.run(&event, Local::now().naive_local()).await {
        Ok(outcome) => {
            match outcome {
                Outcome::TestEvent => info!("Successful test, exiting"),
                Outcome::UnrecognizedQuality { .. } | Outcome::UnderThreshold { .. } => {
                    info!("No conversion needed for {}", event.file_path.display())
                }
                Outcome::DryRun { job, .. } => {
                    info!("Dry run complete for {} (would run {})", job.input_path.display(), job.scheduled_date)
                }
                Outcome::Scheduled { job } => {
                    info!("Scheduled conversion of {} for {}", job.input_path.display(), job.scheduled_date)
                }
            }
            0
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        assert_eq!(parse_source("sonarr"), Ok(Source::Sonarr));
        assert_eq!(parse_source("Radarr"), Ok(Source::Radarr));
        assert!(parse_source("lidarr").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from(["reencode-hook", "--dry-run", "--source", "radarr"]);
        let cfg = load_config(&args).unwrap();
        assert!(cfg.dry_run);
        assert_eq!(cfg.source, Source::Radarr);
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::parse_from(["reencode-hook"]);
        let cfg = load_config(&args).unwrap();
        assert!(!cfg.dry_run);
        assert_eq!(cfg.source, Source::Sonarr);
    }

    #[test]
    fn test_unopenable_log_file_is_reported() {
        let cfg = HookConfig {
            log_file: PathBuf::from("/nonexistent/reencode-hook/hook.log"),
            ..HookConfig::default()
        };
        let err = init_logging(&cfg, false).unwrap_err();
        assert!(format!("{:#}", err).starts_with("Failed to open log file: /nonexistent/reencode-hook/hook.log"));
    }
}
