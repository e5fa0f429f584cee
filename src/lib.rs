//! # gas-daq Channel Configuration Console
//!
//! Per-device, per-channel configuration editing for multi-channel gas
//! measurement devices. Operators edit drafts for the 15 channels of a device,
//! select several channels to edit them together, toggle channels in and out
//! of service, save one channel or all of them, and move configurations in
//! and out through CSV tables.
//!
//! ## Crate Structure
//!
//! - **`cache`**: Last known saved configuration per (device, channel), with
//!   the snapshot each draft was last reconciled against.
//! - **`config`**: Figment-based console configuration (TOML + environment).
//! - **`drafts`**: The 15 editable drafts of a device, persisted in a
//!   [`session_store::SessionStore`] so navigation does not lose edits.
//! - **`editor`**: [`editor::ChannelEditor`], the façade the UI drives.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`reconcile`**: Merges freshly fetched records into drafts without
//!   overwriting unsaved edits.
//! - **`save`**: Save classification, batch preparation and last-issued-wins
//!   ordering of save completions.
//! - **`selection`**: Multi-channel selection and fan-out.
//! - **`session_store`**: Memory and directory backed draft storage.
//! - **`transfer`**: Import staging and export table rendering.
//! - **`validation`**: Draft validation and normalization.
//!
//! Shared types (channel identifiers, configurations, errors and the
//! [`gas_core::ConfigurationBackend`] trait) live in the `gas-core` crate.

pub mod cache;
pub mod config;
pub mod drafts;
pub mod editor;
pub mod logging;
pub mod reconcile;
pub mod save;
pub mod selection;
pub mod session_store;
pub mod transfer;
pub mod validation;

pub use editor::{ChannelEditor, EditorOptions};
pub use gas_core::{
    AppResult, ChannelConfig, ChannelDraft, ChannelId, ConfigurationBackend, ConsoleError,
    Device, DeviceId,
};
