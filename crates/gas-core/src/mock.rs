//! In-memory configuration backend.
//!
//! Stores records per device, logs every call in order and supports error
//! injection per operation. Used by the integration tests and by the CLI when
//! no real backend is wired in.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{ConfigurationBackend, ConfirmedMap, ImportPayload};
use crate::channel::{ChannelConfig, ChannelId, DeviceId};
use crate::error::BackendError;

/// Backend operations, used for call logs and error injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Persist,
    PersistBatch,
    Clear,
    Import,
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Fetch(DeviceId),
    Persist(DeviceId, ChannelId, ChannelConfig),
    PersistBatch(DeviceId, Vec<(ChannelId, ChannelConfig)>),
    Clear(DeviceId, ChannelId),
    Import(DeviceId, usize),
}

#[derive(Default)]
struct MockState {
    records: HashMap<DeviceId, ConfirmedMap>,
    calls: Vec<BackendCall>,
    /// Message to fail with, per operation. Consumed on use unless sticky.
    failures: HashMap<Operation, (String, bool)>,
    import_response: ImportPayload,
}

/// In-memory [`ConfigurationBackend`].
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a saved record.
    pub fn with_record(self, device: &DeviceId, channel: ChannelId, config: ChannelConfig) -> Self {
        self.state
            .lock()
            .records
            .entry(device.clone())
            .or_default()
            .insert(channel, config);
        self
    }

    /// Fail the next call of `operation` with `message`.
    pub fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        self.state
            .lock()
            .failures
            .insert(operation, (message.into(), false));
    }

    /// Fail every call of `operation` until [`MockBackend::recover`].
    pub fn fail_always(&self, operation: Operation, message: impl Into<String>) {
        self.state
            .lock()
            .failures
            .insert(operation, (message.into(), true));
    }

    pub fn recover(&self) {
        self.state.lock().failures.clear();
    }

    /// Rows returned by the next import calls.
    pub fn set_import_response(&self, payload: ImportPayload) {
        self.state.lock().import_response = payload;
    }

    /// Overwrite a record directly, as another console or a migration would.
    pub fn set_record(&self, device: &DeviceId, channel: ChannelId, config: Option<ChannelConfig>) {
        let mut state = self.state.lock();
        let records = state.records.entry(device.clone()).or_default();
        match config {
            Some(config) => {
                records.insert(channel, config);
            }
            None => {
                records.remove(&channel);
            }
        }
    }

    pub fn record(&self, device: &DeviceId, channel: ChannelId) -> Option<ChannelConfig> {
        self.state
            .lock()
            .records
            .get(device)
            .and_then(|records| records.get(&channel).cloned())
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls that write (persist, batch, clear).
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| !matches!(call, BackendCall::Fetch(_) | BackendCall::Import(..)))
            .count()
    }

    pub fn clear_calls(&self) -> Vec<ChannelId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Clear(_, channel) => Some(*channel),
                _ => None,
            })
            .collect()
    }

    fn begin(&self, operation: Operation, call: BackendCall) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        let Some((message, sticky)) = state.failures.get(&operation).cloned() else {
            return Ok(());
        };
        if !sticky {
            state.failures.remove(&operation);
        }
        Err(BackendError::new(message))
    }
}

#[async_trait]
impl ConfigurationBackend for MockBackend {
    async fn fetch(&self, device: &DeviceId) -> Result<ConfirmedMap, BackendError> {
        self.begin(Operation::Fetch, BackendCall::Fetch(device.clone()))?;
        Ok(self
            .state
            .lock()
            .records
            .get(device)
            .cloned()
            .unwrap_or_default())
    }

    async fn persist(
        &self,
        device: &DeviceId,
        channel: ChannelId,
        config: &ChannelConfig,
    ) -> Result<(), BackendError> {
        self.begin(
            Operation::Persist,
            BackendCall::Persist(device.clone(), channel, config.clone()),
        )?;
        self.set_record(device, channel, Some(config.clone()));
        Ok(())
    }

    async fn persist_batch(
        &self,
        device: &DeviceId,
        batch: &[(ChannelId, ChannelConfig)],
    ) -> Result<(), BackendError> {
        self.begin(
            Operation::PersistBatch,
            BackendCall::PersistBatch(device.clone(), batch.to_vec()),
        )?;
        let mut state = self.state.lock();
        let records = state.records.entry(device.clone()).or_insert_with(BTreeMap::new);
        for (channel, config) in batch {
            records.insert(*channel, config.clone());
        }
        Ok(())
    }

    async fn clear(&self, device: &DeviceId, channel: ChannelId) -> Result<(), BackendError> {
        self.begin(Operation::Clear, BackendCall::Clear(device.clone(), channel))?;
        self.set_record(device, channel, None);
        Ok(())
    }

    async fn import_configurations(
        &self,
        device: &DeviceId,
        file: &[u8],
    ) -> Result<ImportPayload, BackendError> {
        self.begin(Operation::Import, BackendCall::Import(device.clone(), file.len()))?;
        Ok(self.state.lock().import_response.clone())
    }
}
