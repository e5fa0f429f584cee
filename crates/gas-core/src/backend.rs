//! Configuration backend seam.
//!
//! The console never talks to the network directly. Everything it needs from the
//! authoritative store goes through [`ConfigurationBackend`], which the host
//! implements over its REST client (and tests implement with
//! [`MockBackend`](crate::mock::MockBackend)).
//!
//! Timeouts and retries belong to the implementation; the console applies no
//! policy of its own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelConfig, ChannelId, DeviceId};
use crate::error::BackendError;

/// Confirmed configuration of a device. Absent channels have no saved record.
pub type ConfirmedMap = BTreeMap<ChannelId, ChannelConfig>;

/// Authoritative store for per-channel configuration.
#[async_trait]
pub trait ConfigurationBackend: Send + Sync {
    /// Fetch every saved channel configuration of a device.
    async fn fetch(&self, device: &DeviceId) -> Result<ConfirmedMap, BackendError>;

    /// Persist a single channel.
    async fn persist(
        &self,
        device: &DeviceId,
        channel: ChannelId,
        config: &ChannelConfig,
    ) -> Result<(), BackendError>;

    /// Persist several channels. All-or-nothing from the caller's perspective.
    async fn persist_batch(
        &self,
        device: &DeviceId,
        batch: &[(ChannelId, ChannelConfig)],
    ) -> Result<(), BackendError>;

    /// Mark a channel's saved record as cleared.
    async fn clear(&self, device: &DeviceId, channel: ChannelId) -> Result<(), BackendError>;

    /// Parse an uploaded import file into structured rows.
    async fn import_configurations(
        &self,
        device: &DeviceId,
        file: &[u8],
    ) -> Result<ImportPayload, BackendError>;
}

/// Structured result of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPayload {
    pub configurations: Vec<ImportRow>,
}

/// One imported row.
///
/// `channel` stays a raw integer: rows outside `1..=15` are legal in the payload
/// and skipped on import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportRow {
    pub channel: i64,
    pub inoculum_weight_grams: Option<f64>,
    pub substrate_weight_grams: Option<f64>,
    pub tumbler_volume: Option<f64>,
    pub chimera_channel: Option<i64>,
    pub notes: Option<String>,
}
