//! Draft reconciliation against confirmed state.
//!
//! [`reconcile`] decides, for one channel, what the draft becomes after the
//! confirmed value changed. It compares the new confirmed value with the
//! channel's last observed snapshot, never with the draft, so a background
//! refresh that reports the same value again is a no-op no matter what the
//! operator has typed since.
//!
//! | confirmed vs. snapshot | draft      | result                               |
//! |------------------------|------------|--------------------------------------|
//! | unchanged              | any        | untouched                            |
//! | changed                | unedited   | replaced by the derived draft        |
//! | changed                | edited     | edits kept, `in_service` synced      |
//!
//! A draft is unedited when it equals the default draft or the draft derived
//! from the snapshot.

use gas_core::{ChannelConfig, ChannelDraft, ChannelId, DeviceId};
use tracing::{debug, trace};

use crate::cache::{ConfirmedStateCache, Observed};
use crate::drafts::DraftStore;

/// What reconciliation did to one draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Confirmed value matches the snapshot; draft untouched.
    Unchanged,
    /// Unedited draft replaced by the one derived from the new value.
    Replaced,
    /// Edited draft kept, only `in_service` follows the new value.
    ServiceSynced,
}

/// Result of [`reconcile`] for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// The draft the channel should hold next.
    pub draft: ChannelDraft,
    /// Which branch produced it.
    pub decision: Decision,
}

/// Compute the next draft of `channel`. Pure and total.
pub fn reconcile(
    channel: ChannelId,
    new_confirmed: Option<&ChannelConfig>,
    last_observed: &Observed,
    current_draft: &ChannelDraft,
) -> Reconciled {
    if let Observed::Seen(seen) = last_observed {
        if seen.as_ref() == new_confirmed {
            return Reconciled {
                draft: current_draft.clone(),
                decision: Decision::Unchanged,
            };
        }
    }

    let derived = ChannelDraft::from_confirmed(new_confirmed);
    let unedited = current_draft.is_default()
        || *current_draft == ChannelDraft::from_confirmed(last_observed.value());

    if unedited {
        trace!(%channel, "Replacing unedited draft");
        Reconciled {
            draft: derived,
            decision: Decision::Replaced,
        }
    } else {
        trace!(%channel, in_service = derived.in_service, "Keeping edits, syncing service flag");
        let mut draft = current_draft.clone();
        draft.in_service = derived.in_service;
        Reconciled {
            draft,
            decision: Decision::ServiceSynced,
        }
    }
}

/// Channels grouped by the decision taken for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Drafts replaced by the derived draft.
    pub replaced: Vec<ChannelId>,
    /// Edited drafts whose service flag was synced.
    pub service_synced: Vec<ChannelId>,
    /// Channels whose confirmed value did not change.
    pub unchanged: Vec<ChannelId>,
}

/// Reconcile every channel of `device` and advance the snapshots.
pub fn reconcile_device(
    cache: &mut ConfirmedStateCache,
    device: &DeviceId,
    drafts: &mut DraftStore,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut updates = Vec::new();

    for channel in ChannelId::all() {
        let entry = cache.entry(device, channel);
        if !entry.is_pending() {
            report.unchanged.push(channel);
            continue;
        }
        let next = reconcile(
            channel,
            entry.confirmed.as_ref(),
            &entry.last_observed,
            drafts.get(channel),
        );
        match next.decision {
            Decision::Unchanged => report.unchanged.push(channel),
            Decision::Replaced => report.replaced.push(channel),
            Decision::ServiceSynced => report.service_synced.push(channel),
        }
        if next.draft != *drafts.get(channel) {
            updates.push((channel, next.draft));
        }
        cache.mark_observed(device, channel);
    }

    drafts.replace_many(updates);
    debug!(
        %device,
        replaced = report.replaced.len(),
        service_synced = report.service_synced.len(),
        "Reconciled drafts with confirmed state"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(n: u8) -> ChannelId {
        ChannelId::new(n).unwrap()
    }

    fn saved(volume: f64) -> ChannelConfig {
        ChannelConfig {
            tumbler_volume: Some(volume),
            in_service: true,
            ..Default::default()
        }
    }

    #[test]
    fn unchanged_confirmed_leaves_edits_alone() {
        let confirmed = saved(12.5);
        let mut draft = ChannelDraft::from_confirmed(Some(&confirmed));
        draft.inoculum_weight_grams = "3.2".into();

        let next = reconcile(
            ch(4),
            Some(&confirmed),
            &Observed::Seen(Some(confirmed.clone())),
            &draft,
        );
        assert_eq!(next.decision, Decision::Unchanged);
        assert_eq!(next.draft.inoculum_weight_grams, "3.2");
    }

    #[test]
    fn first_observation_replaces_default_draft() {
        let confirmed = saved(12.5);
        let next = reconcile(ch(1), Some(&confirmed), &Observed::Never, &ChannelDraft::default());
        assert_eq!(next.decision, Decision::Replaced);
        assert_eq!(next.draft, ChannelDraft::from_confirmed(Some(&confirmed)));
    }

    #[test]
    fn edited_draft_only_takes_service_flag() {
        let old = saved(12.5);
        let new = ChannelConfig {
            in_service: false,
            ..saved(20.0)
        };
        let mut draft = ChannelDraft::from_confirmed(Some(&old));
        draft.substrate_weight_grams = "7".into();

        let next = reconcile(ch(2), Some(&new), &Observed::Seen(Some(old)), &draft);
        assert_eq!(next.decision, Decision::ServiceSynced);
        assert_eq!(next.draft.tumbler_volume, "12.5");
        assert_eq!(next.draft.substrate_weight_grams, "7");
        assert!(!next.draft.in_service);
    }

    #[test]
    fn draft_matching_snapshot_counts_as_unedited() {
        let old = saved(12.5);
        let new = saved(14.0);
        let draft = ChannelDraft::from_confirmed(Some(&old));

        let next = reconcile(ch(2), Some(&new), &Observed::Seen(Some(old)), &draft);
        assert_eq!(next.decision, Decision::Replaced);
        assert_eq!(next.draft.tumbler_volume, "14");
    }

    #[test]
    fn removed_record_resets_unedited_draft() {
        let old = saved(12.5);
        let draft = ChannelDraft::from_confirmed(Some(&old));
        let next = reconcile(ch(6), None, &Observed::Seen(Some(old)), &draft);
        assert!(next.draft.is_default());
    }
}
