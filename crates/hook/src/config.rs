use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Download manager whose environment contract the hook reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Sonarr,
    Radarr,
}

impl Source {
    /// Environment variable holding the event type
    pub fn event_type_var(&self) -> &'static str {
        match self {
            Source::Sonarr => "sonarr_eventtype",
            Source::Radarr => "radarr_eventtype",
        }
    }

    /// Environment variable holding the imported file path
    pub fn file_path_var(&self) -> &'static str {
        match self {
            Source::Sonarr => "sonarr_episodefile_path",
            Source::Radarr => "radarr_moviefile_path",
        }
    }

    /// Environment variable holding the quality label
    pub fn quality_var(&self) -> &'static str {
        match self {
            Source::Sonarr => "sonarr_episodefile_quality",
            Source::Radarr => "radarr_moviefile_quality",
        }
    }
}

/// Configuration for the re-encode import hook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Which download manager invokes the hook
    pub source: Source,
    /// Append-only log file for diagnostics
    pub log_file: PathBuf,
    /// Log level filter (error, warn, info, debug, trace)
    pub log_level: String,
    /// Path to ffprobe binary
    pub ffprobe_bin: PathBuf,
    /// Path to ffmpeg binary, as invoked later by the deferred job
    pub ffmpeg_bin: PathBuf,
    /// Path to at(1) for submitting deferred jobs
    pub at_bin: PathBuf,
    /// Path to atq(1) for listing deferred jobs
    pub atq_bin: PathBuf,
    /// Video encoder passed to ffmpeg
    pub video_codec: String,
    /// Local time of day deferred conversions start, "HH:MM"
    pub run_at: String,
    /// Directory for two-pass statistics files
    pub pass_log_dir: PathBuf,
    /// Compose and log jobs without submitting them
    pub dry_run: bool,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl HookConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            source: Source::Sonarr,
            log_file: std::env::temp_dir().join("reencode-hook.log"),
            log_level: "info".to_string(),
            ffprobe_bin: PathBuf::from("ffprobe"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            at_bin: PathBuf::from("at"),
            atq_bin: PathBuf::from("atq"),
            video_codec: "libx264".to_string(),
            run_at: "23:00".to_string(),
            pass_log_dir: std::env::temp_dir(),
            dry_run: false,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        config.run_time()?;
        Ok(config)
    }

    /// Parsed `run_at` time of day
    pub fn run_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M")
            .with_context(|| format!("Invalid run_at time (expected HH:MM): {}", self.run_at))
    }
}
