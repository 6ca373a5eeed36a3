//! Self-update engine: manifest → resolve → download → verify → record.

pub mod checksum;
pub mod config;
pub mod error;
pub mod filename;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod resolver;
pub mod settings;
pub mod transport;

pub use error::UpdateError;
pub use manifest::{Manifest, UpdateDescriptor};
pub use orchestrator::{CycleReport, Orchestrator, UpdateEvent, UpdateOutcome};
pub use settings::{ApplicationSettings, SettingsStore};
pub use transport::{CancelToken, CurlTransport, ProgressEvent, Transport};
