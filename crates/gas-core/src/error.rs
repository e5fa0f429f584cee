//! Error types for the configuration console.
//!
//! This module defines the primary error type, `ConsoleError`, together with the
//! category types it wraps. Using the `thiserror` crate, each category carries
//! exactly the information the host UI needs to present it.
//!
//! ## Error Hierarchy
//!
//! - **`Validation`**: Per-channel rule failures. Recoverable, rendered inline next
//!   to the offending channel, never sent to the backend.
//! - **`Persistence`**: Failures of the session-scoped local draft store. These are
//!   logged and treated as "no draft available"; they never abort an operation.
//! - **`Backend`**: Save, clear, or import failures reported by the backend. The
//!   backend's message is surfaced verbatim and local state is left untouched so
//!   the operator can retry.
//! - **`ImportFormat`**: A malformed bulk-import payload. Reported as a single
//!   top-level error; no row of the payload is applied.
//! - **`Export`**: The export table could not be written.
//!
//! None of these are fatal to the host application.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::channel::ChannelId;

/// Convenience alias for results using the console error type.
pub type AppResult<T> = std::result::Result<T, ConsoleError>;

/// A channel number outside `1..=15`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("channel {0} is out of range (1-15)")]
pub struct ChannelRangeError(pub i64);

/// Error reported by the configuration backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failures of the local draft store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("draft store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("draft store payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Malformed bulk-import payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportFormatError {
    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("channel {0} appears more than once")]
    DuplicateChannel(ChannelId),

    #[error("import table is unreadable: {0}")]
    Table(String),
}

/// Validation messages keyed by channel.
///
/// Only channels that failed appear in the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub BTreeMap<ChannelId, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, channel: ChannelId) -> Option<&str> {
        self.0.get(&channel).map(String::as_str)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.0.keys().copied()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(channel, message)| format!("channel {channel}: {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Primary error type for the configuration console.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Draft persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Import error: {0}")]
    ImportFormat(#[from] ImportFormatError),

    #[error("Export error: {0}")]
    Export(String),

    #[error(transparent)]
    ChannelRange(#[from] ChannelRangeError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl ConsoleError {
    /// The backend message, when this error came from the backend.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ConsoleError::Backend(err) => Some(&err.message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_is_verbatim() {
        let err: ConsoleError = BackendError::new("device 7 is locked by calibration").into();
        assert_eq!(
            err.backend_message(),
            Some("device 7 is locked by calibration")
        );
        assert_eq!(
            err.to_string(),
            "Backend error: device 7 is locked by calibration"
        );
    }

    #[test]
    fn validation_errors_display_lists_channels() {
        let mut map = BTreeMap::new();
        map.insert(ChannelId::new(2).unwrap(), "invalid tumbler volume".to_string());
        map.insert(ChannelId::new(9).unwrap(), "invalid inoculum weight".to_string());
        let errors = ValidationErrors(map);
        assert_eq!(
            errors.to_string(),
            "channel 2: invalid tumbler volume; channel 9: invalid inoculum weight"
        );
    }
}
