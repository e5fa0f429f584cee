//! Per-channel validation and normalization.
//!
//! Only active channels are validated. An inactive channel never produces an
//! error, whatever its fields hold; it is normalized leniently when it has to
//! be written as inactive.

use std::collections::BTreeMap;

use gas_core::{ChannelConfig, ChannelDraft, ChannelId, ValidationErrors, CHANNEL_COUNT};
use tracing::debug;

/// Inline error for an unparseable or negative tumbler volume.
pub const INVALID_TUMBLER_VOLUME: &str = "invalid tumbler volume";
/// Inline error for an unparseable or negative inoculum weight.
pub const INVALID_INOCULUM_WEIGHT: &str = "invalid inoculum weight";
/// Inline error for an unparseable or negative substrate weight.
pub const INVALID_SUBSTRATE_WEIGHT: &str = "invalid substrate weight";
/// Inline error for a chimera channel outside 1-15.
pub const CHIMERA_OUT_OF_RANGE: &str = "chimera channel must be between 1 and 15";

/// Outcome of validating one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Inactive; written as inactive if it has to be written at all.
    Inactive(ChannelConfig),
    /// Active with no parameters yet.
    Placeholder(ChannelConfig),
    /// Active and configured.
    Valid(ChannelConfig),
}

impl Verdict {
    /// The normalized configuration to write.
    pub fn into_config(self) -> ChannelConfig {
        match self {
            Verdict::Inactive(c) | Verdict::Placeholder(c) | Verdict::Valid(c) => c,
        }
    }
}

/// Validates and normalizes drafts for one editing context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine {
    chimera_enabled: bool,
}

impl ValidationEngine {
    /// `chimera_enabled` turns on cross-device channel mapping for this context.
    pub fn new(chimera_enabled: bool) -> Self {
        Self { chimera_enabled }
    }

    /// Classify one draft, normalizing it. Only active, configured drafts can fail.
    pub fn validate(&self, channel: ChannelId, draft: &ChannelDraft) -> Result<Verdict, String> {
        if !draft.in_service {
            return Ok(Verdict::Inactive(self.normalize_lenient(draft)));
        }
        if !draft.is_configured() {
            debug!(%channel, "Channel is in service with no parameters yet");
            return Ok(Verdict::Placeholder(self.normalize_lenient(draft)));
        }
        self.normalize(draft).map(Verdict::Valid)
    }

    /// Validate every draft and collect the failures.
    pub fn validate_all<'a>(
        &self,
        drafts: impl IntoIterator<Item = (ChannelId, &'a ChannelDraft)>,
    ) -> ValidationErrors {
        let errors: BTreeMap<ChannelId, String> = drafts
            .into_iter()
            .filter_map(|(channel, draft)| self.validate(channel, draft).err().map(|e| (channel, e)))
            .collect();
        ValidationErrors(errors)
    }

    /// Strict normalization. The first failing field decides the message.
    pub fn normalize(&self, draft: &ChannelDraft) -> Result<ChannelConfig, String> {
        let tumbler_volume = parse_magnitude(&draft.tumbler_volume, INVALID_TUMBLER_VOLUME)?;
        let inoculum_weight_grams =
            parse_magnitude(&draft.inoculum_weight_grams, INVALID_INOCULUM_WEIGHT)?;
        let substrate_weight_grams =
            parse_magnitude(&draft.substrate_weight_grams, INVALID_SUBSTRATE_WEIGHT)?;
        let chimera_channel = if self.chimera_enabled {
            parse_chimera(&draft.chimera_channel)?
        } else {
            None
        };

        Ok(ChannelConfig {
            inoculum_sample_id: draft.inoculum_sample_id.clone(),
            substrate_sample_id: draft.substrate_sample_id.clone(),
            inoculum_weight_grams: Some(inoculum_weight_grams),
            substrate_weight_grams: Some(substrate_weight_grams),
            tumbler_volume: Some(tumbler_volume),
            chimera_channel,
            in_service: draft.in_service,
            notes: draft.notes.clone(),
        })
    }

    /// Normalization that never fails: unparseable magnitudes become zero and
    /// an invalid chimera channel is dropped.
    pub fn normalize_lenient(&self, draft: &ChannelDraft) -> ChannelConfig {
        let magnitude = |text: &str| parse_magnitude(text, "").unwrap_or(0.0);
        let chimera_channel = if self.chimera_enabled {
            parse_chimera(&draft.chimera_channel).ok().flatten()
        } else {
            None
        };
        ChannelConfig {
            inoculum_sample_id: draft.inoculum_sample_id.clone(),
            substrate_sample_id: draft.substrate_sample_id.clone(),
            inoculum_weight_grams: Some(magnitude(&draft.inoculum_weight_grams)),
            substrate_weight_grams: Some(magnitude(&draft.substrate_weight_grams)),
            tumbler_volume: Some(magnitude(&draft.tumbler_volume)),
            chimera_channel,
            in_service: draft.in_service,
            notes: draft.notes.clone(),
        }
    }
}

/// Blank means zero. Anything else must be a finite, non-negative number.
fn parse_magnitude(text: &str, message: &str) -> Result<f64, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0.0);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(message.to_string()),
    }
}

fn parse_chimera(text: &str) -> Result<Option<u8>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse::<u8>() {
        Ok(value) if (1..=CHANNEL_COUNT).contains(&value) => Ok(Some(value)),
        _ => Err(CHIMERA_OUT_OF_RANGE.to_string()),
    }
}
