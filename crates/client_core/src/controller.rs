use std::{collections::HashSet, sync::Arc, time::Duration};

use shared::domain::{CustomerFields, Record, RecordId};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::{
    error::{PhoneValidationError, StoreError},
    form::FormState,
    gateway::RecordStoreGateway,
    validation::validate_phone,
};

/// Fixed display time of the timed "Saving..." indicator.
pub const LEGACY_SAVING_DISPLAY_WINDOW: Duration = Duration::from_secs(3);

const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// When set, the saving indicator is also dropped once this much time has passed since
    /// the submit that raised it. Completion clears it regardless.
    pub saving_display_window: Option<Duration>,
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            saving_display_window: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub form: FormState,
    pub records: Vec<Record>,
    pub saving: bool,
    pub record_count: usize,
    pub is_empty: bool,
    pub submit_label: &'static str,
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(ControllerSnapshot),
    StoreFailure(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blocked locally by the phone rule; the store was not contacted.
    Rejected(PhoneValidationError),
    Saved { id: RecordId, created: bool },
}

#[derive(Default)]
struct ControllerState {
    records: Vec<Record>,
    form: FormState,
    saving: bool,
    inflight_submits: usize,
    saving_generation: u64,
}

impl ControllerState {
    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            form: self.form.clone(),
            records: self.records.clone(),
            saving: self.saving,
            record_count: self.records.len(),
            is_empty: self.records.is_empty(),
            submit_label: self.form.submit_label(),
        }
    }
}

struct PendingWrite {
    id: Option<RecordId>,
    fields: CustomerFields,
    generation: u64,
}

/// Owns the record list and the form draft, and sequences every write as
/// write -> refresh -> clear.
pub struct CustomerController {
    gateway: Arc<dyn RecordStoreGateway>,
    config: ControllerConfig,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl CustomerController {
    pub fn new(gateway: Arc<dyn RecordStoreGateway>) -> Arc<Self> {
        Self::with_config(gateway, ControllerConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn RecordStoreGateway>, config: ControllerConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new(Self {
            gateway,
            config,
            inner: Mutex::new(ControllerState::default()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Initial population of the list at start-up.
    pub async fn load(&self) -> Result<(), StoreError> {
        self.refresh().await
    }

    pub async fn start_edit(&self, record: &Record) {
        self.update(|state| state.form.start_edit(record)).await;
    }

    /// Looks the record up in the current list. Returns `false` for an unknown id.
    pub async fn start_edit_by_id(&self, id: &RecordId) -> bool {
        self.update(|state| {
            let Some(record) = state.records.iter().find(|r| &r.id == id).cloned() else {
                return false;
            };
            state.form.start_edit(&record);
            true
        })
        .await
    }

    pub async fn clear(&self) {
        self.update(|state| state.form.clear()).await;
    }

    pub async fn change_name(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.form.change_name(value)).await;
    }

    pub async fn change_email(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.form.change_email(value)).await;
    }

    /// Returns `false` when the input was dropped for containing a non-digit.
    pub async fn change_phone(&self, value: &str) -> bool {
        self.update(|state| state.form.change_phone(value)).await
    }

    pub async fn submit(self: &Arc<Self>) -> Result<SubmitOutcome, StoreError> {
        let pending = self
            .update(|state| {
                if state.form.phone_invalid {
                    let reason = validate_phone(&state.form.phone)
                        .err()
                        .unwrap_or(PhoneValidationError::Empty);
                    return Err(reason);
                }
                state.form.revalidate_phone()?;
                state.inflight_submits += 1;
                state.saving_generation += 1;
                state.saving = true;
                Ok(PendingWrite {
                    id: state.form.editing_id.clone(),
                    fields: state.form.fields(),
                    generation: state.saving_generation,
                })
            })
            .await;

        let pending = match pending {
            Ok(pending) => pending,
            Err(reason) => {
                debug!(%reason, "submit blocked by phone validation");
                return Ok(SubmitOutcome::Rejected(reason));
            }
        };

        if let Some(window) = self.config.saving_display_window {
            self.arm_saving_window(pending.generation, window);
        }

        let result = self
            .gateway
            .upsert(pending.id.as_ref(), &pending.fields)
            .await;

        self.update(|state| {
            state.inflight_submits = state.inflight_submits.saturating_sub(1);
            if state.inflight_submits == 0 {
                state.saving = false;
            }
        })
        .await;

        match result {
            Ok(id) => {
                // A failed refresh is surfaced on its own; the write itself succeeded.
                let _ = self.refresh().await;
                self.clear().await;
                Ok(SubmitOutcome::Saved {
                    id,
                    created: pending.id.is_none(),
                })
            }
            Err(err) => {
                self.surface(&err);
                Err(err)
            }
        }
    }

    pub async fn delete_record(&self, id: &RecordId) -> Result<(), StoreError> {
        if let Err(err) = self.gateway.delete(id).await {
            self.surface(&err);
            return Err(err);
        }
        let _ = self.refresh().await;
        Ok(())
    }

    /// Replaces the whole list on success; keeps the current list on failure.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        match self.gateway.list_all().await {
            Ok(records) => {
                let records = unique_by_id(records);
                self.update(|state| state.records = records).await;
                Ok(())
            }
            Err(err) => {
                self.surface(&err);
                Err(err)
            }
        }
    }

    fn arm_saving_window(self: &Arc<Self>, generation: u64, window: Duration) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            controller
                .update(|state| {
                    if state.saving && state.saving_generation == generation {
                        debug!(generation, "saving indicator display window elapsed");
                        state.saving = false;
                    }
                })
                .await;
        });
    }

    fn surface(&self, err: &StoreError) {
        let _ = self.events.send(ControllerEvent::StoreFailure(err.clone()));
    }

    /// Applies `apply` under the lock and publishes a snapshot if anything visible changed.
    async fn update<R>(&self, apply: impl FnOnce(&mut ControllerState) -> R) -> R {
        let mut guard = self.inner.lock().await;
        let before = guard.snapshot();
        let result = apply(&mut *guard);
        let after = guard.snapshot();
        if after != before {
            let _ = self.events.send(ControllerEvent::StateChanged(after));
        }
        result
    }
}

fn unique_by_id(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(record.id.clone());
            if !fresh {
                warn!(record_id = %record.id, "dropping duplicate record id from listing");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
