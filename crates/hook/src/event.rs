use std::path::PathBuf;
use crate::config::Source;
use crate::error::{HookError, Result};

/// Event type reported by the download manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    /// Connection test from the download manager's settings page
    Test,
    /// A file was imported or upgraded
    Download,
    /// Any event the hook does not handle
    Other(String),
}

impl EventType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Test" => EventType::Test,
            "Download" => EventType::Download,
            other => EventType::Other(other.to_string()),
        }
    }
}

/// Inbound import event, captured once per invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEvent {
    pub event_type: EventType,
    pub file_path: PathBuf,
    pub quality_label: String,
}

impl ImportEvent {
    /// Build the event from the process environment
    pub fn from_env(source: Source) -> Result<Self> {
        Self::from_lookup(source, |key| std::env::var(key).ok())
    }

    /// Build the event from an arbitrary variable lookup.
    ///
    /// File path and quality are only required for `Download` events; a test
    /// event from the download manager carries neither.
    pub fn from_lookup<F>(source: Source, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_type = lookup(source.event_type_var()).ok_or_else(|| {
            HookError::Input(format!("{} is not set", source.event_type_var()))
        })?;
        let event_type = EventType::parse(&raw_type);

        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(HookError::Input(format!("{} is not set", key))),
            }
        };

        let (file_path, quality_label) = if event_type == EventType::Download {
            (
                PathBuf::from(required(source.file_path_var())?),
                required(source.quality_var())?,
            )
        } else {
            (
                lookup(source.file_path_var()).map(PathBuf::from).unwrap_or_default(),
                lookup(source.quality_var()).unwrap_or_default(),
            )
        };

        Ok(ImportEvent {
            event_type,
            file_path,
            quality_label,
        })
    }
}
