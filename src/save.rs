//! Save dispatch.
//!
//! Turns drafts into backend writes. Requests carry a per-channel version
//! taken from a monotonic counter; a completion is only applied while its
//! version is still the newest issued for that channel. Two saves racing for
//! the same channel (auto-save on blur followed by an explicit save-all, say)
//! therefore resolve to the one issued last, whatever order they complete in.
//!
//! Batch saves validate every channel before anything is sent.

use std::collections::{BTreeMap, HashMap};

use gas_core::{
    BackendError, ChannelConfig, ChannelDraft, ChannelId, ConfigurationBackend, DeviceId,
    ValidationErrors,
};
use tracing::{debug, info};

use crate::cache::ConfirmedStateCache;
use crate::drafts::DraftStore;
use crate::validation::{ValidationEngine, Verdict};

/// How a save-all treats one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveClass {
    /// Inactive with a saved record: written as explicitly inactive.
    PersistInactive,
    /// Inactive, never saved, nothing configured: not written.
    Skip,
    /// Active with no parameters: written as an active placeholder.
    Placeholder,
    /// Active and configured: validated, then written.
    Configured,
}

/// Classify a draft for a save-all.
///
/// An inactive, never-saved channel that does carry parameters is written as
/// inactive so the parameters are not lost.
pub fn classify(draft: &ChannelDraft, has_record: bool) -> SaveClass {
    match (draft.in_service, draft.is_configured()) {
        (false, configured) if has_record || configured => SaveClass::PersistInactive,
        (false, _) => SaveClass::Skip,
        (true, false) => SaveClass::Placeholder,
        (true, true) => SaveClass::Configured,
    }
}

/// Identity of one issued request for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    /// Device the request targets.
    pub device: DeviceId,
    /// Channel the request targets.
    pub channel: ChannelId,
    /// Per-channel issue counter; higher is newer.
    pub version: u64,
}

/// A validated single-channel save that has not been sent yet.
#[derive(Debug, Clone)]
pub struct PendingSave {
    /// Identity of the request.
    pub ticket: SaveTicket,
    /// Normalized configuration to write.
    pub config: ChannelConfig,
    /// The draft the request was built from.
    pub sent_draft: ChannelDraft,
}

impl PendingSave {
    /// Send the request. Never touches local state.
    pub async fn send<B>(self, backend: &B) -> SaveOutcome
    where
        B: ConfigurationBackend + ?Sized,
    {
        let result = backend
            .persist(&self.ticket.device, self.ticket.channel, &self.config)
            .await;
        SaveOutcome {
            pending: self,
            result,
        }
    }
}

/// A sent single-channel save and the backend's answer.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// The request that was sent.
    pub pending: PendingSave,
    /// Backend response.
    pub result: Result<(), BackendError>,
}

/// A validated save-all that has not been sent yet.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    /// Device the batch targets.
    pub device: DeviceId,
    /// One entry per channel that is written.
    pub entries: Vec<PendingSave>,
    /// Channels left out of the batch.
    pub skipped: Vec<ChannelId>,
}

impl PendingBatch {
    /// Send the batch in one call; an empty batch sends nothing.
    pub async fn send<B>(self, backend: &B) -> BatchOutcome
    where
        B: ConfigurationBackend + ?Sized,
    {
        let batch: Vec<(ChannelId, ChannelConfig)> = self
            .entries
            .iter()
            .map(|entry| (entry.ticket.channel, entry.config.clone()))
            .collect();
        let result = if batch.is_empty() {
            Ok(())
        } else {
            backend.persist_batch(&self.device, &batch).await
        };
        BatchOutcome {
            pending: self,
            result,
        }
    }
}

/// A sent batch and the backend's answer.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// The batch that was sent.
    pub pending: PendingBatch,
    /// Backend response for the whole batch.
    pub result: Result<(), BackendError>,
}

/// Summary of an applied save-all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Channels written and confirmed.
    pub saved: Vec<ChannelId>,
    /// Channels not written.
    pub skipped: Vec<ChannelId>,
    /// Saved, but superseded by a newer request before the response arrived.
    pub stale: Vec<ChannelId>,
}

/// Issues save requests and tracks the newest one per channel.
#[derive(Debug, Default)]
pub struct SaveDispatcher {
    issued: HashMap<(DeviceId, ChannelId), u64>,
}

impl SaveDispatcher {
    /// A dispatcher with nothing issued.
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self, device: &DeviceId, channel: ChannelId) -> SaveTicket {
        let version = self.issued.entry((device.clone(), channel)).or_insert(0);
        *version += 1;
        SaveTicket {
            device: device.clone(),
            channel,
            version: *version,
        }
    }

    /// True if no newer request was issued for the ticket's channel.
    pub fn is_latest(&self, ticket: &SaveTicket) -> bool {
        self.issued
            .get(&(ticket.device.clone(), ticket.channel))
            .is_some_and(|&latest| latest == ticket.version)
    }

    /// Normalize and validate one draft; issue a ticket if it passes.
    pub fn prepare_channel(
        &mut self,
        device: &DeviceId,
        channel: ChannelId,
        draft: &ChannelDraft,
        validator: &ValidationEngine,
    ) -> Result<PendingSave, String> {
        let verdict = validator.validate(channel, draft)?;
        if matches!(verdict, Verdict::Placeholder(_)) {
            info!(%device, %channel, "Saving channel in service with no parameters yet");
        }
        Ok(PendingSave {
            ticket: self.issue(device, channel),
            config: verdict.into_config(),
            sent_draft: draft.clone(),
        })
    }

    /// Classify and validate every channel. Nothing is issued unless all pass.
    pub fn prepare_batch(
        &mut self,
        device: &DeviceId,
        drafts: &DraftStore,
        cache: &ConfirmedStateCache,
        validator: &ValidationEngine,
    ) -> Result<PendingBatch, ValidationErrors> {
        let mut staged = Vec::new();
        let mut skipped = Vec::new();
        let mut errors = BTreeMap::new();

        for (channel, draft) in drafts.iter() {
            let class = classify(draft, cache.has_record(device, channel));
            let config = match class {
                SaveClass::Skip => {
                    skipped.push(channel);
                    continue;
                }
                SaveClass::PersistInactive | SaveClass::Placeholder => {
                    validator.normalize_lenient(draft)
                }
                SaveClass::Configured => match validator.validate(channel, draft) {
                    Ok(verdict) => verdict.into_config(),
                    Err(message) => {
                        errors.insert(channel, message);
                        continue;
                    }
                },
            };
            staged.push((channel, config, draft.clone()));
        }

        if !errors.is_empty() {
            debug!(%device, failed = errors.len(), "Batch save rejected by validation");
            return Err(ValidationErrors(errors));
        }

        let entries = staged
            .into_iter()
            .map(|(channel, config, sent_draft)| PendingSave {
                ticket: self.issue(device, channel),
                config,
                sent_draft,
            })
            .collect();
        Ok(PendingBatch {
            device: device.clone(),
            entries,
            skipped,
        })
    }
}
