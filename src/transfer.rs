//! Bulk import and export of channel configuration tables.
//!
//! The export table is CSV with a fixed header:
//!
//! ```text
//! channel,inoculum_weight_grams,substrate_weight_grams,tumbler_volume[,chimera_channel],notes
//! ```
//!
//! `chimera_channel` is only present when cross-device mapping is enabled for
//! the device context. The same layout is accepted by [`parse_table`], so an
//! exported file (or the blank template) can be filled in and imported again.

use std::collections::BTreeSet;

use gas_core::{
    format_magnitude, ChannelConfig, ChannelId, ConfirmedMap, ConsoleError, ImportFormatError,
    ImportPayload, ImportRow,
};
use tracing::debug;

const CHANNEL: &str = "channel";
const INOCULUM_WEIGHT: &str = "inoculum_weight_grams";
const SUBSTRATE_WEIGHT: &str = "substrate_weight_grams";
const TUMBLER_VOLUME: &str = "tumbler_volume";
const CHIMERA_CHANNEL: &str = "chimera_channel";
const NOTES: &str = "notes";

/// Header of the export table.
pub fn columns(chimera_enabled: bool) -> Vec<&'static str> {
    let mut columns = vec![CHANNEL, INOCULUM_WEIGHT, SUBSTRATE_WEIGHT, TUMBLER_VOLUME];
    if chimera_enabled {
        columns.push(CHIMERA_CHANNEL);
    }
    columns.push(NOTES);
    columns
}

// =============================================================================
// Import
// =============================================================================

/// Validate a payload and build the configurations it describes.
///
/// Rows for channels outside 1-15 are ignored. Any invalid in-range row fails
/// the whole payload.
pub fn stage_import(
    payload: &ImportPayload,
    chimera_enabled: bool,
) -> Result<Vec<(ChannelId, ChannelConfig)>, ImportFormatError> {
    let mut seen = BTreeSet::new();
    let mut staged = Vec::with_capacity(payload.configurations.len());

    for (index, row) in payload.configurations.iter().enumerate() {
        let row_number = index + 1;
        let Ok(channel) = ChannelId::from_i64(row.channel) else {
            debug!(channel = row.channel, "Skipping import row for unknown channel");
            continue;
        };
        if !seen.insert(channel) {
            return Err(ImportFormatError::DuplicateChannel(channel));
        }

        let invalid = |message: String| ImportFormatError::InvalidRow {
            row: row_number,
            message,
        };
        for (name, value) in [
            (INOCULUM_WEIGHT, row.inoculum_weight_grams),
            (SUBSTRATE_WEIGHT, row.substrate_weight_grams),
            (TUMBLER_VOLUME, row.tumbler_volume),
        ] {
            if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(invalid(format!("{name} must be a non-negative number")));
            }
        }
        let chimera_channel = match (chimera_enabled, row.chimera_channel) {
            (true, Some(value)) => Some(
                ChannelId::from_i64(value)
                    .map_err(|_| invalid(format!("{CHIMERA_CHANNEL} must be between 1 and 15")))?
                    .number(),
            ),
            _ => None,
        };

        staged.push((
            channel,
            ChannelConfig {
                inoculum_weight_grams: row.inoculum_weight_grams,
                substrate_weight_grams: row.substrate_weight_grams,
                tumbler_volume: row.tumbler_volume,
                chimera_channel,
                notes: row.notes.clone().unwrap_or_default(),
                in_service: true,
                ..Default::default()
            },
        ));
    }
    Ok(staged)
}

/// Parse a CSV table in the export layout.
///
/// Rows that only carry a channel number (the blank template) are skipped.
pub fn parse_table(bytes: &[u8]) -> Result<ImportPayload, ImportFormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| ImportFormatError::Table(e.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let channel_column = column(CHANNEL)
        .ok_or_else(|| ImportFormatError::Table(format!("missing '{CHANNEL}' column")))?;

    let mut configurations = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| ImportFormatError::Table(e.to_string()))?;
        let cell = |name: &str| {
            column(name)
                .and_then(|i| record.get(i))
                .filter(|value| !value.is_empty())
        };
        let invalid = |name: &str| ImportFormatError::InvalidRow {
            row,
            message: format!("{name} is not a number"),
        };
        let number = |name: &str| -> Result<Option<f64>, ImportFormatError> {
            cell(name)
                .map(|value| value.parse::<f64>().map_err(|_| invalid(name)))
                .transpose()
        };

        let channel = record
            .get(channel_column)
            .unwrap_or_default()
            .parse::<i64>()
            .map_err(|_| invalid(CHANNEL))?;
        let parsed = ImportRow {
            channel,
            inoculum_weight_grams: number(INOCULUM_WEIGHT)?,
            substrate_weight_grams: number(SUBSTRATE_WEIGHT)?,
            tumbler_volume: number(TUMBLER_VOLUME)?,
            chimera_channel: cell(CHIMERA_CHANNEL)
                .map(|value| value.parse::<i64>().map_err(|_| invalid(CHIMERA_CHANNEL)))
                .transpose()?,
            notes: cell(NOTES).map(str::to_string),
        };

        let blank = ImportRow {
            channel,
            ..Default::default()
        };
        if parsed != blank {
            configurations.push(parsed);
        }
    }
    Ok(ImportPayload { configurations })
}

// =============================================================================
// Export
// =============================================================================

/// Render saved records as an export table.
///
/// Only configured channels are written. When there is nothing configured to
/// write, all 15 channels are written as blank rows so the file works as a
/// template.
pub fn export_table(records: &ConfirmedMap, chimera_enabled: bool) -> Result<Vec<u8>, ConsoleError> {
    let export_err = |e: csv::Error| ConsoleError::Export(e.to_string());
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(columns(chimera_enabled))
        .map_err(export_err)?;

    let configured: Vec<_> = records
        .iter()
        .filter(|(_, config)| config.is_configured())
        .collect();

    if configured.is_empty() {
        for channel in ChannelId::all() {
            let mut row = vec![channel.to_string()];
            row.resize(columns(chimera_enabled).len(), String::new());
            writer.write_record(&row).map_err(export_err)?;
        }
    } else {
        for (channel, config) in configured {
            let mut row = vec![
                channel.to_string(),
                format_magnitude(config.inoculum_weight_grams),
                format_magnitude(config.substrate_weight_grams),
                format_magnitude(config.tumbler_volume),
            ];
            if chimera_enabled {
                row.push(
                    config
                        .chimera_channel
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                );
            }
            row.push(config.notes.clone());
            writer.write_record(&row).map_err(export_err)?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| ConsoleError::Export(e.to_string()))
}
