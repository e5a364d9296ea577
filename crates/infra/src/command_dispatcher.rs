//! Command execution pipeline.
//!
//! ```text
//! Command
//!   -> load stream (tenant-scoped) -> rehydrate aggregate
//!   -> handle (pure decision)
//!   -> append with ExpectedVersion::Exact(loaded revision)
//!   -> publish committed envelopes
//! ```
//!
//! A stale append (another writer got there first) is retried from the load
//! step up to `max_retries` times. Re-deciding against fresh state is what
//! keeps two concurrent take-outs of the last unit from both succeeding.
//!
//! Append and publish run under one lock so subscribers observe events in
//! commit order.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use promostock_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use promostock_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

pub const DEFAULT_COMMAND_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure that survived every retry.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvariantViolation(String),

    /// Business rule conflict (duplicate, inactive, still referenced, ...).
    #[error("{0}")]
    Conflict(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: u64, held: u64 },

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    /// Historical payload could not be decoded into the aggregate event type.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Events were committed but publication failed; read models catch up on restart.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::InsufficientStock {
                requested,
                available,
            } => DispatchError::InsufficientStock {
                requested,
                available,
            },
            DomainError::InsufficientHoldings { requested, held } => {
                DispatchError::InsufficientHoldings { requested, held }
            }
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
        }
    }
}

/// What a successful dispatch produced: the rehydrated aggregate with the new
/// events applied, and the committed events (empty when the command was a no-op).
#[derive(Debug)]
pub struct Dispatched<A> {
    pub state: A,
    pub committed: Vec<StoredEvent>,
}

/// Reusable command execution engine for event-sourced aggregates.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    max_retries: u32,
    commit_lock: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            max_retries: DEFAULT_COMMAND_RETRIES,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load current state of an aggregate without issuing a command.
    pub async fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl Fn(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id).await?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Run `command` against the aggregate's current state and commit the result.
    pub async fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(TenantId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: promostock_events::Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0u32;
        loop {
            let history = self.store.load_stream(tenant_id, aggregate_id).await?;
            validate_loaded_stream(tenant_id, aggregate_id, &history)?;
            let expected = ExpectedVersion::Exact(stream_version(&history));

            let mut aggregate = make_aggregate(tenant_id, aggregate_id);
            apply_history(&mut aggregate, &history)?;

            let decided = aggregate.handle(&command)?;
            if decided.is_empty() {
                return Ok(Dispatched {
                    state: aggregate,
                    committed: vec![],
                });
            }

            let uncommitted = decided
                .iter()
                .map(|ev| {
                    UncommittedEvent::from_typed(
                        tenant_id,
                        aggregate_id,
                        aggregate_type,
                        Uuid::now_v7(),
                        ev,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;

            let _guard = self.commit_lock.lock().await;
            match self.store.append(uncommitted, expected).await {
                Ok(committed) => {
                    for stored in &committed {
                        self.bus
                            .publish(stored.to_envelope())
                            .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
                    }
                    debug!(
                        aggregate_type,
                        %aggregate_id,
                        events = committed.len(),
                        "command committed"
                    );

                    for ev in &decided {
                        aggregate.apply(ev);
                    }
                    return Ok(Dispatched {
                        state: aggregate,
                        committed,
                    });
                }
                Err(EventStoreError::Concurrency(msg)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        aggregate_type,
                        %aggregate_id,
                        attempt,
                        reason = %msg,
                        "stale append, retrying command"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use promostock_brands::{Brand, BrandCommand, BrandId, CreateBrand, UpdateBrand};
    use promostock_core::{AggregateRoot, UserId};
    use promostock_events::InMemoryEventBus;
    use promostock_inventory::{
        CreateItem, InventoryCommand, InventoryItem, InventoryItemId, Quantity, SizeId, SizeSpec,
        TakeOut,
    };
    use promostock_promoters::PromoterId;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn brand_dispatcher() -> CommandDispatcher<Arc<InMemoryEventStore>, Bus> {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn create_brand(tenant_id: TenantId, brand_id: BrandId, name: &str) -> BrandCommand {
        BrandCommand::CreateBrand(CreateBrand {
            tenant_id,
            brand_id,
            name: name.to_string(),
            logo_url: None,
            occurred_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn dispatch_commits_publishes_and_returns_state() {
        let dispatcher = brand_dispatcher();
        let sub = dispatcher.bus().subscribe();
        let tenant_id = TenantId::new();
        let brand_id = BrandId::new(AggregateId::new());

        let out = dispatcher
            .dispatch(
                tenant_id,
                brand_id.0,
                promostock_brands::AGGREGATE_TYPE,
                create_brand(tenant_id, brand_id, "Acme"),
                |_, id| Brand::empty(BrandId::new(id)),
            )
            .await
            .unwrap();

        assert_eq!(out.committed.len(), 1);
        assert_eq!(out.state.name(), "Acme");
        assert_eq!(out.state.version(), 1);

        let env = sub.try_recv().unwrap();
        assert_eq!(env.tenant_id(), tenant_id);
        assert_eq!(env.sequence_number(), 1);
    }

    #[tokio::test]
    async fn domain_errors_are_mapped_not_retried() {
        let dispatcher = brand_dispatcher();
        let tenant_id = TenantId::new();
        let brand_id = BrandId::new(AggregateId::new());

        let err = dispatcher
            .dispatch(
                tenant_id,
                brand_id.0,
                promostock_brands::AGGREGATE_TYPE,
                BrandCommand::UpdateBrand(UpdateBrand {
                    tenant_id,
                    brand_id,
                    name: "Nope".to_string(),
                    logo_url: None,
                    occurred_at: Utc::now(),
                }),
                |_, id| Brand::empty(BrandId::new(id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }

    /// Store that reports a stale revision on the first `failures` appends.
    struct FlakyStore {
        inner: InMemoryEventStore,
        failures: std::sync::Mutex<u32>,
    }

    #[async_trait]
    impl EventStore for FlakyStore {
        async fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            {
                let mut left = self.failures.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(EventStoreError::Concurrency("simulated".to_string()));
                }
            }
            self.inner.append(events, expected_version).await
        }

        async fn load_stream(
            &self,
            tenant_id: TenantId,
            aggregate_id: AggregateId,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(tenant_id, aggregate_id).await
        }

        async fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn stale_appends_are_retried_up_to_the_limit() {
        let tenant_id = TenantId::new();

        for (failures, should_succeed) in [(2, true), (3, true), (4, false)] {
            let store = FlakyStore {
                inner: InMemoryEventStore::new(),
                failures: std::sync::Mutex::new(failures),
            };
            let dispatcher =
                CommandDispatcher::new(store, Arc::new(InMemoryEventBus::new())).with_max_retries(3);
            let brand_id = BrandId::new(AggregateId::new());

            let res = dispatcher
                .dispatch(
                    tenant_id,
                    brand_id.0,
                    promostock_brands::AGGREGATE_TYPE,
                    create_brand(tenant_id, brand_id, "Acme"),
                    |_, id| Brand::empty(BrandId::new(id)),
                )
                .await;

            assert_eq!(res.is_ok(), should_succeed, "failures={failures}");
            if !should_succeed {
                assert!(matches!(res, Err(DispatchError::Concurrency(_))));
            }
        }
    }

    #[tokio::test]
    async fn concurrent_take_outs_never_oversell() {
        let dispatcher = Arc::new(
            CommandDispatcher::new(
                Arc::new(InMemoryEventStore::new()),
                Arc::new(InMemoryEventBus::<EventEnvelope<JsonValue>>::new()),
            )
            .with_max_retries(20),
        );
        let tenant_id = TenantId::new();
        let item_id = InventoryItemId::new(AggregateId::new());
        let size_id = SizeId::new();

        dispatcher
            .dispatch(
                tenant_id,
                item_id.0,
                promostock_inventory::AGGREGATE_TYPE,
                InventoryCommand::CreateItem(CreateItem {
                    tenant_id,
                    item_id,
                    brand_id: BrandId::new(AggregateId::new()),
                    name: "Cap".to_string(),
                    product_id: "CAP-1".to_string(),
                    image_url: None,
                    sizes: vec![SizeSpec {
                        size_id,
                        label: "One size".to_string(),
                        quantity: 5,
                    }],
                    occurred_at: Utc::now(),
                }),
                |_, id| InventoryItem::empty(InventoryItemId::new(id)),
            )
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..12 {
            let d = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                d.dispatch(
                    tenant_id,
                    item_id.0,
                    promostock_inventory::AGGREGATE_TYPE,
                    InventoryCommand::TakeOut(TakeOut {
                        tenant_id,
                        item_id,
                        size_id,
                        quantity: Quantity::new(1).unwrap(),
                        promoter_id: PromoterId::new(AggregateId::new()),
                        employee_id: UserId::new(),
                        notes: None,
                        occurred_at: Utc::now(),
                    }),
                    |_, id| InventoryItem::empty(InventoryItemId::new(id)),
                )
                .await
            }));
        }

        let mut ok = 0;
        let mut sold_out = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DispatchError::InsufficientStock { .. }) => sold_out += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(ok, 5);
        assert_eq!(sold_out, 7);

        let item = dispatcher
            .load(tenant_id, item_id.0, |_, id| InventoryItem::empty(InventoryItemId::new(id)))
            .await
            .unwrap();
        let size = item.size(size_id).unwrap();
        assert_eq!(size.available_quantity(), 0);
        assert_eq!(size.in_circulation(), 5);
    }
}
