//! Draft store.
//!
//! The operator's working copy of every channel of one device. The map is
//! always fully populated: channels without edits hold [`ChannelDraft::default`].
//!
//! # Persistence
//!
//! [`DraftStore::restore`] loads the serialized map from the session store once,
//! when the device is opened. Every later mutation writes the whole map back.
//! Writes before `restore` ran are suppressed so the defaults can never
//! overwrite a stored draft that has not been read yet.
//!
//! Store failures are logged and otherwise ignored: a missing draft just means
//! the operator starts from confirmed state.

use std::collections::BTreeMap;
use std::sync::Arc;

use gas_core::{ChannelDraft, ChannelId, DeviceId, PersistenceError, CHANNEL_COUNT};
use tracing::{debug, warn};

use crate::session_store::{drafts_key, SessionStore};

/// How [`DraftStore::set_with`] treats the `in_service` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Touched channels become active. The default for field edits.
    Activate,
    /// The updater alone decides `in_service`. Used for deactivation.
    Preserve,
}

/// Working copy of the 15 channel drafts of one device.
pub struct DraftStore {
    device: DeviceId,
    drafts: [ChannelDraft; CHANNEL_COUNT as usize],
    store: Arc<dyn SessionStore>,
    restored: bool,
}

impl DraftStore {
    /// All-default drafts; call [`DraftStore::restore`] before mutating.
    pub fn new(device: DeviceId, store: Arc<dyn SessionStore>) -> Self {
        Self {
            device,
            drafts: std::array::from_fn(|_| ChannelDraft::default()),
            store,
            restored: false,
        }
    }

    fn slot(channel: ChannelId) -> usize {
        usize::from(channel.number() - 1)
    }

    /// The draft of `channel`.
    pub fn get(&self, channel: ChannelId) -> &ChannelDraft {
        &self.drafts[Self::slot(channel)]
    }

    /// Drafts in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &ChannelDraft)> {
        ChannelId::all().zip(self.drafts.iter())
    }

    /// Apply `updater` to every channel in `channels`, marking them active.
    pub fn set<F>(&mut self, channels: &[ChannelId], updater: F)
    where
        F: Fn(&mut ChannelDraft),
    {
        self.set_with(channels, SetMode::Activate, updater);
    }

    /// Apply `updater` to every channel in `channels` under `mode`.
    pub fn set_with<F>(&mut self, channels: &[ChannelId], mode: SetMode, updater: F)
    where
        F: Fn(&mut ChannelDraft),
    {
        for &channel in channels {
            let draft = &mut self.drafts[Self::slot(channel)];
            updater(draft);
            if mode == SetMode::Activate {
                draft.in_service = true;
            }
        }
        self.persist();
    }

    /// Replace one draft wholesale.
    pub fn replace(&mut self, channel: ChannelId, draft: ChannelDraft) {
        self.replace_many([(channel, draft)]);
    }

    /// Replace several drafts, persisting once.
    pub fn replace_many(&mut self, drafts: impl IntoIterator<Item = (ChannelId, ChannelDraft)>) {
        let mut changed = false;
        for (channel, draft) in drafts {
            self.drafts[Self::slot(channel)] = draft;
            changed = true;
        }
        if changed {
            self.persist();
        }
    }

    /// Reset channels to the default draft, which is inactive.
    pub fn reset(&mut self, channels: &[ChannelId]) {
        self.set_with(channels, SetMode::Preserve, |draft| {
            *draft = ChannelDraft::default();
        });
    }

    /// Load previously stored drafts. Returns true if a stored map was applied.
    ///
    /// After this call, mutations are written back to the store.
    pub fn restore(&mut self) -> bool {
        let key = drafts_key(&self.device);
        let result = self.load(&key);
        self.restored = true;
        match result {
            Ok(Some(stored)) => {
                for (number, draft) in stored {
                    match ChannelId::from_i64(number) {
                        Ok(channel) => self.drafts[Self::slot(channel)] = draft,
                        Err(e) => debug!(device = %self.device, error = %e, "Dropping stored draft"),
                    }
                }
                debug!(device = %self.device, "Restored drafts from session store");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(device = %self.device, error = %e, "Could not restore drafts, using defaults");
                false
            }
        }
    }

    fn load(&self, key: &str) -> Result<Option<BTreeMap<i64, ChannelDraft>>, PersistenceError> {
        let Some(raw) = self.store.load(key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Write the full map to the session store. No-op until restored.
    pub fn persist(&self) {
        if !self.restored {
            return;
        }
        let map: BTreeMap<u8, &ChannelDraft> = self
            .iter()
            .map(|(channel, draft)| (channel.number(), draft))
            .collect();
        let result = serde_json::to_string(&map)
            .map_err(PersistenceError::from)
            .and_then(|json| self.store.save(&drafts_key(&self.device), &json));
        if let Err(e) = result {
            warn!(device = %self.device, error = %e, "Failed to persist drafts");
        }
    }

}
