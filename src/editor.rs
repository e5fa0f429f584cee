//! Per-device channel configuration editor.
//!
//! `ChannelEditor` wires the cache, drafts, selection, validation and save
//! dispatch together for one device. The host UI calls it from its single
//! event loop: every method takes `&mut self`, and the only awaits are backend
//! calls.
//!
//! # Flow
//!
//! ```text
//! edit ──▶ DraftStore (fanned out over the selection)
//!                │
//! save ──▶ ValidationEngine ──▶ SaveDispatcher ──▶ backend
//!                                                    │
//! refresh ◀───────────────── ConfirmedStateCache ◀───┘
//!    │
//!    └──▶ reconcile ──▶ DraftStore (unedited channels only)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let mut editor = ChannelEditor::open(device, backend, store, EditorOptions::default());
//! editor.refresh().await?;
//! editor.toggle_selected(ChannelId::new(3)?);
//! editor.toggle_selected(ChannelId::new(5)?);
//! editor.edit(ChannelId::new(3)?, |d| d.tumbler_volume = "500".into());
//! editor.save_all().await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use gas_core::{
    AppResult, ChannelConfig, ChannelDraft, ChannelId, ConfigurationBackend, ConfirmedMap,
    ConsoleError, Device, DeviceId, ImportPayload, ValidationErrors,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::ConfirmedStateCache;
use crate::drafts::{DraftStore, SetMode};
use crate::reconcile::{reconcile_device, ReconcileReport};
use crate::save::{classify, BatchOutcome, PendingSave, SaveClass, SaveDispatcher, SaveOutcome, SaveReport};
use crate::selection::SelectionSet;
use crate::session_store::SessionStore;
use crate::transfer;
use crate::validation::ValidationEngine;

/// Behaviour switches for one editing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// Deactivating a channel resets its draft and clears the saved record.
    pub clear_on_toggle: bool,
    /// Without clear-on-toggle: write the new service flag immediately.
    pub commit_on_toggle: bool,
    /// Cross-device channel mapping is available in this context.
    pub chimera_enabled: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            clear_on_toggle: true,
            commit_on_toggle: false,
            chimera_enabled: false,
        }
    }
}

/// Channel configuration editor for one device.
pub struct ChannelEditor {
    device: Device,
    backend: Arc<dyn ConfigurationBackend>,
    options: EditorOptions,
    cache: ConfirmedStateCache,
    drafts: DraftStore,
    selection: SelectionSet,
    errors: BTreeMap<ChannelId, String>,
    validator: ValidationEngine,
    dispatcher: SaveDispatcher,
}

impl ChannelEditor {
    /// Open the editor for a device, restoring unsaved drafts of this session.
    pub fn open(
        device: Device,
        backend: Arc<dyn ConfigurationBackend>,
        store: Arc<dyn SessionStore>,
        options: EditorOptions,
    ) -> Self {
        let mut drafts = DraftStore::new(device.id.clone(), store);
        drafts.restore();
        Self {
            device,
            backend,
            options,
            cache: ConfirmedStateCache::new(),
            drafts,
            selection: SelectionSet::new(),
            errors: BTreeMap::new(),
            validator: ValidationEngine::new(options.chimera_enabled),
            dispatcher: SaveDispatcher::new(),
        }
    }

    fn device_id(&self) -> &DeviceId {
        &self.device.id
    }

    /// The device being edited.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Behaviour switches of this context.
    pub fn options(&self) -> EditorOptions {
        self.options
    }

    /// Current draft of `channel`.
    pub fn draft(&self, channel: ChannelId) -> &ChannelDraft {
        self.drafts.get(channel)
    }

    /// All drafts in channel order.
    pub fn drafts(&self) -> impl Iterator<Item = (ChannelId, &ChannelDraft)> {
        self.drafts.iter()
    }

    /// Last saved configuration of `channel`.
    pub fn confirmed(&self, channel: ChannelId) -> Option<&ChannelConfig> {
        self.cache.get(self.device_id(), channel)
    }

    /// Confirmed state of every tracked channel.
    pub fn cache(&self) -> &ConfirmedStateCache {
        &self.cache
    }

    /// Inline error of a channel; empty when there is none.
    pub fn error(&self, channel: ChannelId) -> &str {
        self.errors.get(&channel).map_or("", String::as_str)
    }

    /// Inline errors by channel.
    pub fn errors(&self) -> &BTreeMap<ChannelId, String> {
        &self.errors
    }

    /// Channels currently selected for fan-out.
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    // =========================================================================
    // Confirmed state
    // =========================================================================

    /// Fetch confirmed state from the backend and reconcile.
    pub async fn refresh(&mut self) -> AppResult<ReconcileReport> {
        let fetched = self.backend.fetch(self.device_id()).await?;
        Ok(self.apply_confirmed(fetched))
    }

    /// Reconcile with confirmed state fetched by the host.
    pub fn apply_confirmed(&mut self, fetched: ConfirmedMap) -> ReconcileReport {
        let device = self.device.id.clone();
        self.cache.replace_device(&device, fetched);
        reconcile_device(&mut self.cache, &device, &mut self.drafts)
    }

    // =========================================================================
    // Selection and edits
    // =========================================================================

    /// Modifier-gesture toggle of a channel's selection membership.
    pub fn toggle_selected(&mut self, channel: ChannelId) -> bool {
        self.selection.toggle(channel)
    }

    /// Remove `channel` from the selection.
    pub fn deselect(&mut self, channel: ChannelId) {
        self.selection.deselect(channel);
    }

    /// Deselect every channel.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Apply `updater` to `channel`, or to the whole selection if `channel` is
    /// part of a multi-selection. Touched channels become active.
    pub fn edit<F>(&mut self, channel: ChannelId, updater: F) -> Vec<ChannelId>
    where
        F: Fn(&mut ChannelDraft),
    {
        let targets = self.selection.target_set(channel);
        self.drafts.set(&targets, updater);
        targets
    }

    /// Run validation over all drafts and replace the error map.
    pub fn validate(&mut self) -> ValidationErrors {
        let errors = self.validator.validate_all(self.drafts.iter());
        self.errors = errors.0.clone();
        errors
    }

    // =========================================================================
    // Activate / deactivate
    // =========================================================================

    /// Flip the service state of `channel` (and its selection).
    pub async fn toggle_service(&mut self, channel: ChannelId) -> AppResult<Vec<ChannelId>> {
        let targets = self.selection.target_set(channel);
        let activate = !self.drafts.get(channel).in_service;

        if activate {
            self.drafts.set(&targets, |_| {});
            debug!(device = %self.device.id, ?targets, "Channels activated");
            if !self.options.clear_on_toggle && self.options.commit_on_toggle {
                self.commit(&targets).await?;
            }
            return Ok(targets);
        }

        if self.options.clear_on_toggle {
            return self.deactivate_and_clear(targets).await;
        }

        self.drafts
            .set_with(&targets, SetMode::Preserve, |d| d.in_service = false);
        for &target in &targets {
            self.errors.remove(&target);
        }
        if self.options.commit_on_toggle {
            self.commit(&targets).await?;
        }
        Ok(targets)
    }

    async fn deactivate_and_clear(&mut self, targets: Vec<ChannelId>) -> AppResult<Vec<ChannelId>> {
        let device = self.device.id.clone();
        let with_record: Vec<ChannelId> = targets
            .iter()
            .copied()
            .filter(|&target| self.cache.has_record(&device, target))
            .collect();

        let backend = Arc::clone(&self.backend);
        let results = join_all(
            with_record
                .iter()
                .map(|&target| backend.clear(&device, target)),
        )
        .await;

        let mut first_error = None;
        let mut failed = Vec::new();
        for (&target, result) in with_record.iter().zip(results) {
            match result {
                Ok(()) => {
                    info!(%device, channel = %target, "Cleared saved configuration");
                    self.cache.confirm(&device, target, None);
                }
                Err(e) => {
                    warn!(%device, channel = %target, error = %e, "Clear failed");
                    failed.push(target);
                    first_error.get_or_insert(e);
                }
            }
        }

        let reset: Vec<ChannelId> = targets
            .into_iter()
            .filter(|target| !failed.contains(target))
            .collect();
        self.drafts.reset(&reset);
        for target in &reset {
            self.errors.remove(target);
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(reset),
        }
    }

    /// Write the service flag of `targets` right away.
    async fn commit(&mut self, targets: &[ChannelId]) -> AppResult<()> {
        let mut first_error = None;
        for &target in targets {
            let has_record = self.cache.has_record(self.device_id(), target);
            if classify(self.drafts.get(target), has_record) == SaveClass::Skip {
                continue;
            }
            if let Err(e) = self.save_channel(target).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Validate one channel and build its request without sending it.
    ///
    /// On validation failure the inline error is set and no request is issued.
    pub fn prepare_save(&mut self, channel: ChannelId) -> AppResult<PendingSave> {
        let device = self.device.id.clone();
        match self
            .dispatcher
            .prepare_channel(&device, channel, self.drafts.get(channel), &self.validator)
        {
            Ok(pending) => Ok(pending),
            Err(message) => {
                self.errors.insert(channel, message.clone());
                Err(ValidationErrors(BTreeMap::from([(channel, message)])).into())
            }
        }
    }

    /// Fold a completed single-channel save back into local state.
    ///
    /// Returns `Ok(false)` when a newer request for the channel was issued in
    /// the meantime and this completion was discarded.
    pub fn apply_save(&mut self, outcome: SaveOutcome) -> AppResult<bool> {
        let SaveOutcome { pending, result } = outcome;
        let ticket = &pending.ticket;
        if !self.dispatcher.is_latest(ticket) {
            warn!(device = %ticket.device, channel = %ticket.channel, version = ticket.version, "Discarding stale save completion");
            return Ok(false);
        }
        result?;
        info!(device = %ticket.device, channel = %ticket.channel, "Saved channel configuration");
        self.cache
            .confirm(&ticket.device, ticket.channel, Some(pending.config));
        self.errors.remove(&ticket.channel);
        Ok(true)
    }

    /// Validate and persist one channel.
    pub async fn save_channel(&mut self, channel: ChannelId) -> AppResult<bool> {
        let pending = self.prepare_save(channel)?;
        let outcome = pending.send(self.backend.as_ref()).await;
        self.apply_save(outcome)
    }

    /// Validate every channel, then persist all that need writing in one batch.
    ///
    /// A single validation failure aborts the batch before any request is sent.
    pub async fn save_all(&mut self) -> AppResult<SaveReport> {
        let device = self.device.id.clone();
        let batch = match self
            .dispatcher
            .prepare_batch(&device, &self.drafts, &self.cache, &self.validator)
        {
            Ok(batch) => batch,
            Err(errors) => {
                self.errors = errors.0.clone();
                return Err(errors.into());
            }
        };
        self.errors.clear();
        let outcome = batch.send(self.backend.as_ref()).await;
        self.apply_batch(outcome)
    }

    /// Fold a completed batch back into local state. A failed batch changes nothing.
    pub fn apply_batch(&mut self, outcome: BatchOutcome) -> AppResult<SaveReport> {
        let BatchOutcome { pending, result } = outcome;
        result?;

        let mut report = SaveReport {
            skipped: pending.skipped,
            ..Default::default()
        };
        let mut draft_updates = Vec::new();
        for entry in pending.entries {
            let channel = entry.ticket.channel;
            if !self.dispatcher.is_latest(&entry.ticket) {
                report.stale.push(channel);
                continue;
            }
            let saved = ChannelDraft::from_confirmed(Some(&entry.config));
            let current = self.drafts.get(channel);
            let next = if *current == entry.sent_draft {
                saved
            } else {
                ChannelDraft {
                    in_service: saved.in_service,
                    ..current.clone()
                }
            };
            draft_updates.push((channel, next));
            self.cache
                .confirm(&pending.device, channel, Some(entry.config));
            report.saved.push(channel);
        }
        self.drafts.replace_many(draft_updates);
        info!(
            device = %pending.device,
            saved = report.saved.len(),
            skipped = report.skipped.len(),
            "Saved channel configurations"
        );
        Ok(report)
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Apply structured import rows to confirmed state and drafts together.
    ///
    /// The payload is validated as a whole first; on error nothing changes.
    pub fn apply_import(&mut self, payload: &ImportPayload) -> AppResult<Vec<ChannelId>> {
        let staged = transfer::stage_import(payload, self.options.chimera_enabled)?;
        let device = self.device.id.clone();
        let channels: Vec<ChannelId> = staged.iter().map(|(channel, _)| *channel).collect();

        let mut draft_updates = Vec::with_capacity(staged.len());
        for (channel, config) in staged {
            draft_updates.push((channel, ChannelDraft::from_confirmed(Some(&config))));
            self.cache.confirm(&device, channel, Some(config));
            self.errors.remove(&channel);
        }
        self.drafts.replace_many(draft_updates);
        info!(%device, imported = channels.len(), "Imported channel configurations");
        Ok(channels)
    }

    /// Send an uploaded file to the backend importer and apply the result.
    pub async fn import_file(&mut self, file: &[u8]) -> AppResult<Vec<ChannelId>> {
        let payload = self
            .backend
            .import_configurations(self.device_id(), file)
            .await?;
        self.apply_import(&payload)
    }

    /// Parse a table in the export layout locally and apply it.
    pub fn import_table(&mut self, table: &[u8]) -> AppResult<Vec<ChannelId>> {
        let payload = transfer::parse_table(table).map_err(ConsoleError::from)?;
        self.apply_import(&payload)
    }

    /// Export confirmed state (not drafts) as CSV.
    pub fn export_table(&self) -> AppResult<Vec<u8>> {
        transfer::export_table(
            &self.cache.records(self.device_id()),
            self.options.chimera_enabled,
        )
    }
}
