pub mod config;
pub mod error;
pub mod event;
pub mod quality;
pub mod ffprobe;
pub mod bitrate;
pub mod schedule;
pub mod job;
pub mod runner;

pub use config::{HookConfig, Source};
pub use error::HookError;
pub use event::{EventType, ImportEvent};
pub use job::{ConversionJob, JobComposer, JobStep};
pub use runner::{Hook, Outcome};
