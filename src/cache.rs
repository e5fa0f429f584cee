//! Confirmed state cache.
//!
//! Holds the last configuration known to be persisted on the backend, per
//! `(device, channel)`. Each entry also carries the value the reconciliation
//! pass last *observed* for that channel, so that a refresh reporting an
//! unchanged value is recognized as such and does not touch the draft again.
//!
//! Writers:
//! - [`ConfirmedStateCache::replace_device`] for the external bulk fetch. Only the
//!   value changes; reconciliation decides what the draft does about it.
//! - [`ConfirmedStateCache::confirm`] for saves, clears and optimistic imports.
//!   These already synced the draft themselves, so the snapshot advances too.

use std::collections::HashMap;

use gas_core::{ChannelConfig, ChannelId, ConfirmedMap, DeviceId};

/// What the reconciliation pass last saw for a channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Observed {
    /// No pass has looked at this channel yet.
    #[default]
    Never,
    /// The confirmed value at the time of the last pass (`None` = no record).
    Seen(Option<ChannelConfig>),
}

impl Observed {
    /// The observed value, treating `Never` as "no record".
    pub fn value(&self) -> Option<&ChannelConfig> {
        match self {
            Observed::Seen(value) => value.as_ref(),
            Observed::Never => None,
        }
    }
}

/// Confirmed value of one channel plus its last observed snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// Last value known to be persisted; `None` when there is no record.
    pub confirmed: Option<ChannelConfig>,
    /// Snapshot taken by the last reconciliation pass.
    pub last_observed: Observed,
}

impl CacheEntry {
    /// True if the confirmed value differs from what was last observed.
    pub fn is_pending(&self) -> bool {
        match &self.last_observed {
            Observed::Never => true,
            Observed::Seen(seen) => *seen != self.confirmed,
        }
    }
}

/// `(device, channel) → confirmed configuration`.
#[derive(Debug, Default)]
pub struct ConfirmedStateCache {
    entries: HashMap<(DeviceId, ChannelId), CacheEntry>,
}

impl ConfirmedStateCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for a channel. Untracked channels read as an empty entry.
    pub fn entry(&self, device: &DeviceId, channel: ChannelId) -> CacheEntry {
        self.entries
            .get(&(device.clone(), channel))
            .cloned()
            .unwrap_or_default()
    }

    /// Confirmed value of a channel, if it has a record.
    pub fn get(&self, device: &DeviceId, channel: ChannelId) -> Option<&ChannelConfig> {
        self.entries
            .get(&(device.clone(), channel))
            .and_then(|entry| entry.confirmed.as_ref())
    }

    /// True if the channel has a saved record.
    pub fn has_record(&self, device: &DeviceId, channel: ChannelId) -> bool {
        self.get(device, channel).is_some()
    }

    /// Saved records of a device, in channel order.
    pub fn records(&self, device: &DeviceId) -> ConfirmedMap {
        ChannelId::all()
            .filter_map(|channel| {
                self.get(device, channel)
                    .map(|config| (channel, config.clone()))
            })
            .collect()
    }

    /// Apply the result of a bulk fetch. Channels absent from `fetched` have no record.
    pub fn replace_device(&mut self, device: &DeviceId, mut fetched: ConfirmedMap) {
        for channel in ChannelId::all() {
            let entry = self.entries.entry((device.clone(), channel)).or_default();
            entry.confirmed = fetched.remove(&channel);
        }
    }

    /// Record a value the console itself just wrote, advancing the snapshot.
    pub fn confirm(&mut self, device: &DeviceId, channel: ChannelId, value: Option<ChannelConfig>) {
        let entry = self.entries.entry((device.clone(), channel)).or_default();
        entry.last_observed = Observed::Seen(value.clone());
        entry.confirmed = value;
    }

    /// Advance the snapshot to the current confirmed value.
    pub fn mark_observed(&mut self, device: &DeviceId, channel: ChannelId) {
        let entry = self.entries.entry((device.clone(), channel)).or_default();
        entry.last_observed = Observed::Seen(entry.confirmed.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(v: f64) -> ChannelConfig {
        ChannelConfig {
            tumbler_volume: Some(v),
            in_service: true,
            ..Default::default()
        }
    }

    #[test]
    fn fetch_marks_entries_pending_until_observed() {
        let device = DeviceId::new("gas-01");
        let ch4 = ChannelId::new(4).unwrap();
        let mut cache = ConfirmedStateCache::new();

        let mut fetched = ConfirmedMap::new();
        fetched.insert(ch4, volume(12.5));
        cache.replace_device(&device, fetched.clone());

        assert!(cache.entry(&device, ch4).is_pending());
        cache.mark_observed(&device, ch4);
        assert!(!cache.entry(&device, ch4).is_pending());

        cache.replace_device(&device, fetched);
        assert!(!cache.entry(&device, ch4).is_pending());
    }

    #[test]
    fn absent_channels_lose_their_record() {
        let device = DeviceId::new("gas-01");
        let ch2 = ChannelId::new(2).unwrap();
        let mut cache = ConfirmedStateCache::new();
        cache.confirm(&device, ch2, Some(volume(1.0)));
        assert!(cache.has_record(&device, ch2));

        cache.replace_device(&device, ConfirmedMap::new());
        assert!(!cache.has_record(&device, ch2));
        assert!(cache.entry(&device, ch2).is_pending());
    }

    #[test]
    fn devices_are_isolated() {
        let a = DeviceId::new("a");
        let b = DeviceId::new("b");
        let ch1 = ChannelId::new(1).unwrap();
        let mut cache = ConfirmedStateCache::new();
        cache.confirm(&a, ch1, Some(volume(3.0)));

        assert!(cache.get(&b, ch1).is_none());
        assert_eq!(cache.records(&a).len(), 1);
        assert!(cache.records(&b).is_empty());
    }
}
