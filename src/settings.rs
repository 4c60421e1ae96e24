//! Booking-time configuration. The engine reads one snapshot per request and
//! never writes settings; an admin-facing component elsewhere owns mutation.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::limits::MAX_TURNAROUND_BUFFER_DAYS;

fn default_buffer_days() -> u32 {
    1
}

/// Values the engine needs at booking time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSettings {
    /// Shared secret gating public submission. `None` or empty disables the
    /// gate. This is an informational gate, not a security boundary — the
    /// comparison is a plain string match.
    #[serde(default)]
    pub booking_password: Option<String>,
    /// Days an item stays blocked after a reservation ends, for cleaning and
    /// inspection. Defaults to 1 when unset.
    #[serde(default = "default_buffer_days")]
    pub turnaround_buffer_days: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            booking_password: None,
            turnaround_buffer_days: default_buffer_days(),
        }
    }
}

impl BookingSettings {
    /// Exact, case-sensitive match. An unset or empty password admits any
    /// supplied value, including none.
    pub fn gate_passes(&self, supplied: Option<&str>) -> bool {
        match self.booking_password.as_deref() {
            None | Some("") => true,
            Some(required) => supplied == Some(required),
        }
    }

    /// Buffer with the misconfiguration clamp applied.
    pub fn effective_buffer_days(&self) -> u32 {
        self.turnaround_buffer_days.min(MAX_TURNAROUND_BUFFER_DAYS)
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Malformed(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "settings read failed: {e}"),
            SettingsError::Malformed(e) => write!(f, "settings malformed: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Source of the per-request settings snapshot.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn snapshot(&self) -> Result<BookingSettings, SettingsError>;
}

/// Constant settings, for tests and embedders that manage config themselves.
#[derive(Debug, Clone, Default)]
pub struct FixedSettings {
    settings: BookingSettings,
}

impl FixedSettings {
    pub fn new(settings: BookingSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SettingsProvider for FixedSettings {
    async fn snapshot(&self) -> Result<BookingSettings, SettingsError> {
        Ok(self.settings.clone())
    }
}

/// JSON file provider. The file is re-read on every snapshot so admin edits
/// apply to the next request without a restart.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

#[async_trait]
impl SettingsProvider for JsonFileSettings {
    async fn snapshot(&self) -> Result<BookingSettings, SettingsError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(SettingsError::Io)?;
        serde_json::from_slice(&bytes).map_err(|e| SettingsError::Malformed(e.to_string()))
    }
}
