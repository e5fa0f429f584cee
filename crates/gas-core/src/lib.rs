//! `gas-core`
//!
//! Core types and collaborator seams for the gas-measurement configuration console.
//!
//! This crate holds what both the console engine and its hosts need to agree on:
//! the per-channel configuration model, the error taxonomy, and the backend trait
//! through which confirmed state is fetched and saved.
//!
//! ## Key Types
//!
//! - [`ChannelConfig`]: persisted experiment parameters of one channel
//! - [`ChannelDraft`]: the operator's editable copy of a channel
//! - [`ChannelId`]: a validated channel slot number (1-15)
//! - [`ConfigurationBackend`]: async seam to the authoritative store
//! - [`ConsoleError`]: umbrella error with recovery-oriented categories

pub mod backend;
pub mod channel;
pub mod error;
pub mod mock;

pub use backend::{ConfigurationBackend, ConfirmedMap, ImportPayload, ImportRow};
pub use channel::{
    format_magnitude, ChannelConfig, ChannelDraft, ChannelId, Device, DeviceId, CHANNEL_COUNT,
};
pub use error::{
    AppResult, BackendError, ChannelRangeError, ConsoleError, ImportFormatError,
    PersistenceError, ValidationErrors,
};
