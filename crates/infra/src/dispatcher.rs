//! Command execution pipeline for versioned records.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load snapshot (with version) from the record store
//!   ↓
//! 2. Handle command against the loaded state (pure, produces events)
//!   ↓
//! 3. Apply events and save with ExpectedVersion::Exact(loaded version)
//!   ↓  (version conflict → reload and decide again, bounded)
//! 4. Publish committed events to the bus
//! ```
//!
//! Guards that protect stock (e.g. "only the transition *into* `Cancelled`
//! restocks") live in the aggregates' `handle`. Because the decision is
//! re-made against whatever state won the race, exactly one writer ever
//! commits a releasing event; callers perform ledger side effects only for
//! events returned in [`Committed::events`].

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use stockyard_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use stockyard_events::{Event, EventBus, EventEnvelope};

use crate::store::{RecordStore, StoreError};

/// Default number of decide/commit attempts before giving up with `Concurrency`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic business rule failure.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic retries exhausted.
    #[error("optimistic concurrency retries exhausted: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Committed<A: Aggregate> {
    /// State after the command (unchanged if `events` is empty).
    pub record: A,
    /// Events this call committed. Empty means the command was a no-op.
    pub events: Vec<A::Event>,
}

/// Reusable command execution engine over a [`RecordStore`].
#[derive(Debug)]
pub struct RecordDispatcher<S, B> {
    store: S,
    bus: B,
    max_attempts: u32,
}

impl<S, B> RecordDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> RecordDispatcher<S, B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load the current snapshot without executing anything.
    pub fn load<A>(&self, id: &A::Id) -> Result<Option<A>, DispatchError>
    where
        A: Aggregate,
        S: RecordStore<A::Id, A>,
    {
        Ok(self.store.load(id)?)
    }

    /// Execute `command` against the record `id`, retrying on version conflicts.
    ///
    /// `make_aggregate` builds the not-yet-created instance used when the store
    /// has no snapshot for `id`.
    pub fn dispatch<A>(
        &self,
        aggregate_type: &str,
        id: A::Id,
        command: &A::Command,
        make_aggregate: impl Fn() -> A,
    ) -> Result<Committed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Clone,
        A::Id: Copy + Into<AggregateId>,
        A::Event: Event + Serialize,
        S: RecordStore<A::Id, A>,
    {
        let aggregate_id: AggregateId = id.into();
        let mut attempt = 0;
        loop {
            attempt += 1;

            // 1) Load
            let loaded = self.store.load(&id)?;
            let expected = match &loaded {
                Some(record) => ExpectedVersion::Exact(record.version()),
                None => ExpectedVersion::Absent,
            };
            let mut record = loaded.unwrap_or_else(&make_aggregate);
            let base_version = record.version();

            // 2) Decide
            let events = record.handle(command)?;
            if events.is_empty() {
                return Ok(Committed { record, events });
            }

            // 3) Apply + compare-and-swap
            for event in &events {
                record.apply(event);
            }
            match self.store.save(id, record.clone(), expected) {
                Ok(()) => {
                    self.publish(aggregate_type, aggregate_id, base_version, &events);
                    return Ok(Committed { record, events });
                }
                Err(StoreError::Concurrency(msg)) if attempt < self.max_attempts => {
                    debug!(
                        aggregate_type,
                        %aggregate_id,
                        attempt,
                        "version conflict, re-deciding: {msg}"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// 4) Publish. The record is already committed, so a failed publication is
    /// logged rather than surfaced: the caller still owes the stock side effects.
    fn publish<E>(&self, aggregate_type: &str, aggregate_id: AggregateId, base_version: u64, events: &[E])
    where
        E: Event + Serialize,
    {
        for (offset, event) in events.iter().enumerate() {
            let payload = match serde_json::to_value(event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(aggregate_type, %aggregate_id, "event serialization failed: {err}");
                    continue;
                }
            };
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                aggregate_id,
                aggregate_type,
                base_version + offset as u64 + 1,
                event.event_type(),
                event.occurred_at(),
                payload,
            );
            if let Err(err) = self.bus.publish(envelope) {
                warn!(aggregate_type, %aggregate_id, "event publication failed: {err:?}");
            }
        }
    }
}
