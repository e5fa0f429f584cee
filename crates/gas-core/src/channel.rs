//! Channel configuration model.
//!
//! Every gas-measurement device exposes exactly [`CHANNEL_COUNT`] channel slots.
//! A channel's experiment parameters exist in two shapes:
//!
//! - [`ChannelConfig`]: the persisted shape, as stored by the backend. Magnitudes
//!   are numbers.
//! - [`ChannelDraft`]: the editable shape the operator works on. Magnitudes are
//!   raw text so that half-typed or invalid input survives until validation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ChannelRangeError;

/// Number of channel slots on every device.
pub const CHANNEL_COUNT: u8 = 15;

// =============================================================================
// Identity
// =============================================================================

/// Opaque device identifier supplied by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Immutable device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(id),
            name: name.into(),
        }
    }
}

/// A channel slot number in `1..=15`.
///
/// Construction is the only place the range is checked; every other module
/// relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ChannelId(u8);

impl ChannelId {
    pub fn new(number: u8) -> Result<Self, ChannelRangeError> {
        if (1..=CHANNEL_COUNT).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ChannelRangeError(i64::from(number)))
        }
    }

    /// Accepts any integer, as found in imported rows or restored JSON keys.
    pub fn from_i64(number: i64) -> Result<Self, ChannelRangeError> {
        u8::try_from(number)
            .ok()
            .and_then(|n| Self::new(n).ok())
            .ok_or(ChannelRangeError(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// All channels in slot order.
    pub fn all() -> impl Iterator<Item = ChannelId> + Clone {
        (1..=CHANNEL_COUNT).map(ChannelId)
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = ChannelRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelId> for u8 {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Persisted shape
// =============================================================================

/// Experiment parameters of one device channel as persisted by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub inoculum_sample_id: Option<String>,
    pub substrate_sample_id: Option<String>,
    pub inoculum_weight_grams: Option<f64>,
    pub substrate_weight_grams: Option<f64>,
    pub tumbler_volume: Option<f64>,
    /// Cross-device channel mapping, `1..=15`.
    pub chimera_channel: Option<u8>,
    pub in_service: bool,
    pub notes: String,
}

impl ChannelConfig {
    /// True if any numeric or reference field carries a value.
    ///
    /// Zero magnitudes count as unset. `in_service` and `notes` are ignored.
    pub fn is_configured(&self) -> bool {
        let magnitude = |v: Option<f64>| v.is_some_and(|v| v != 0.0);
        self.inoculum_sample_id.as_deref().is_some_and(|s| !s.is_empty())
            || self.substrate_sample_id.as_deref().is_some_and(|s| !s.is_empty())
            || magnitude(self.inoculum_weight_grams)
            || magnitude(self.substrate_weight_grams)
            || magnitude(self.tumbler_volume)
            || self.chimera_channel.is_some_and(|c| c != 0)
    }

    /// An inactive record with every field cleared.
    pub fn inactive() -> Self {
        Self::default()
    }
}

// =============================================================================
// Editable shape
// =============================================================================

/// The operator's working copy of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDraft {
    pub inoculum_sample_id: Option<String>,
    pub substrate_sample_id: Option<String>,
    pub inoculum_weight_grams: String,
    pub substrate_weight_grams: String,
    pub tumbler_volume: String,
    pub chimera_channel: String,
    pub in_service: bool,
    pub notes: String,
}

impl ChannelDraft {
    /// Derive the draft shown for a confirmed value; `None` yields the default.
    pub fn from_confirmed(confirmed: Option<&ChannelConfig>) -> Self {
        let Some(config) = confirmed else {
            return Self::default();
        };
        Self {
            inoculum_sample_id: config.inoculum_sample_id.clone(),
            substrate_sample_id: config.substrate_sample_id.clone(),
            inoculum_weight_grams: format_magnitude(config.inoculum_weight_grams),
            substrate_weight_grams: format_magnitude(config.substrate_weight_grams),
            tumbler_volume: format_magnitude(config.tumbler_volume),
            chimera_channel: config
                .chimera_channel
                .map(|c| c.to_string())
                .unwrap_or_default(),
            in_service: config.in_service,
            notes: config.notes.clone(),
        }
    }

    /// True if any numeric or reference field is non-empty and non-zero.
    pub fn is_configured(&self) -> bool {
        let text = |s: &str| {
            let s = s.trim();
            !s.is_empty() && s.parse::<f64>().map_or(true, |v| v != 0.0)
        };
        self.inoculum_sample_id.as_deref().is_some_and(|s| !s.is_empty())
            || self.substrate_sample_id.as_deref().is_some_and(|s| !s.is_empty())
            || text(&self.inoculum_weight_grams)
            || text(&self.substrate_weight_grams)
            || text(&self.tumbler_volume)
            || text(&self.chimera_channel)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Zero and absent both render as an empty field.
pub fn format_magnitude(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 => v.to_string(),
        _ => String::new(),
    }
}
