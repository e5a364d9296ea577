//! Runtime wiring: event store, bus, read models, the projection worker and
//! the realtime fan-out behind `/stream`.

use std::{
    convert::Infallible,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use secrecy::ExposeSecret;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use promostock_core::TenantId;
use promostock_events::{EventEnvelope, InMemoryEventBus};
use promostock_infra::{
    AppConfig, PromoStock, ServiceError,
    event_store::{EventStoreError, InMemoryEventStore, PostgresEventStore},
    projections::{ProjectionError, ProjectionSet},
    services::{SharedEventBus, SharedEventStore},
    workers::{ProjectionWorker, WorkerHandle},
};

const REALTIME_CAPACITY: usize = 256;

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: JsonValue,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("event store unavailable: {0}")]
    Store(#[from] EventStoreError),

    #[error("read model rebuild failed: {0}")]
    Rebuild(#[from] ServiceError),

    #[error("failed to start projection worker: {0}")]
    Worker(#[from] io::Error),
}

pub struct AppServices {
    stock: PromoStock,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    pub fn stock(&self) -> &PromoStock {
        &self.stock
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Stop the projection worker. Later calls do nothing.
    pub fn shutdown(&self) {
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}

/// In-memory wiring used by tests and local runs without a database.
pub async fn build_in_memory_services() -> Result<AppServices, StartupError> {
    wire(Arc::new(InMemoryEventStore::new()), None, None).await
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let store: SharedEventStore = match (&config.use_persistent_stores, &config.database_url) {
        (true, Some(url)) => {
            tracing::info!("using postgres event store");
            Arc::new(PostgresEventStore::connect(url.expose_secret()).await?)
        }
        _ => {
            tracing::info!("using in-memory event store");
            Arc::new(InMemoryEventStore::new())
        }
    };

    wire(store, Some(config.command_retries), Some(config.max_page_size)).await
}

async fn wire(
    store: SharedEventStore,
    command_retries: Option<u32>,
    max_page_size: Option<usize>,
) -> Result<AppServices, StartupError> {
    let bus: SharedEventBus = Arc::new(InMemoryEventBus::new());
    let projections = Arc::new(ProjectionSet::new());

    let mut stock = PromoStock::new(store, bus.clone(), projections.clone());
    if let Some(retries) = command_retries {
        stock = stock.with_max_retries(retries);
    }
    if let Some(max) = max_page_size {
        stock = stock.with_max_page_size(max);
    }

    // Replay before the worker subscribes; nothing is dispatched until the
    // router is serving.
    stock.rebuild_read_models().await?;

    let (realtime_tx, _) = broadcast::channel(REALTIME_CAPACITY);
    let worker = spawn_projection_worker(&bus, projections, realtime_tx.clone())?;

    Ok(AppServices {
        stock,
        realtime_tx,
        worker: Mutex::new(Some(worker)),
    })
}

/// Applies every published envelope to the read models (duplicates of what
/// the service already projected are skipped by the stream cursors) and
/// tells SSE clients which aggregate changed.
fn spawn_projection_worker(
    bus: &SharedEventBus,
    projections: Arc<ProjectionSet>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
) -> io::Result<WorkerHandle> {
    ProjectionWorker::spawn(
        "read-models",
        &**bus,
        None,
        move |env: EventEnvelope<JsonValue>| {
            projections.apply_envelope(&env)?;

            // Lossy: nobody listening is fine.
            let _ = realtime_tx.send(RealtimeMessage {
                tenant_id: env.tenant_id(),
                topic: format!("{}.projection_updated", env.aggregate_type()),
                payload: serde_json::json!({
                    "aggregate_id": env.aggregate_id(),
                    "sequence_number": env.sequence_number(),
                }),
            });
            Ok::<(), ProjectionError>(())
        },
    )
}

pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
