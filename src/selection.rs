//! Channel selection for fan-out editing.
//!
//! The selection is toggled with the modifier gesture (ctrl/cmd-click in the
//! host UI). It is independent of `in_service` and only shrinks on explicit
//! deselection.

use std::collections::BTreeSet;

use gas_core::ChannelId;

/// Channels selected with the modifier gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    channels: BTreeSet<ChannelId>,
}

impl SelectionSet {
    /// An empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `channel`. Returns true if it is now selected.
    pub fn toggle(&mut self, channel: ChannelId) -> bool {
        if self.channels.remove(&channel) {
            false
        } else {
            self.channels.insert(channel);
            true
        }
    }

    /// Add `channel`.
    pub fn select(&mut self, channel: ChannelId) {
        self.channels.insert(channel);
    }

    /// Remove `channel`.
    pub fn deselect(&mut self, channel: ChannelId) {
        self.channels.remove(&channel);
    }

    /// Remove every channel.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// True if `channel` is selected.
    pub fn contains(&self, channel: ChannelId) -> bool {
        self.channels.contains(&channel)
    }

    /// Number of selected channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Selected channels in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().copied()
    }

    /// Channels an operation on `channel` applies to.
    ///
    /// The whole selection when `channel` belongs to a selection of two or more,
    /// otherwise just `channel`.
    pub fn target_set(&self, channel: ChannelId) -> Vec<ChannelId> {
        if self.channels.len() >= 2 && self.channels.contains(&channel) {
            self.channels.iter().copied().collect()
        } else {
            vec![channel]
        }
    }
}
