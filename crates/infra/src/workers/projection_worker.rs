use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use promostock_core::TenantId;
use promostock_events::{EventBus, EventEnvelope, Subscription};

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Bus subscriber loop on a dedicated thread.
///
/// - Subscribes before returning, so nothing published afterwards is missed
/// - Applies an idempotent handler for each envelope
/// - Optional tenant filter
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// `handler` must tolerate redelivery. Handler errors are logged and the
    /// loop keeps going.
    pub fn spawn<P, B, H, E>(
        name: &'static str,
        bus: &B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        P: Send + 'static,
        B: EventBus<EventEnvelope<P>>,
        H: FnMut(EventEnvelope<P>) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, tenant_id, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<P, H, E>(
    name: &'static str,
    sub: Subscription<EventEnvelope<P>>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    handler: &mut H,
) where
    H: FnMut(EventEnvelope<P>) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(envelope) => {
                if tenant_id.is_some_and(|t| envelope.tenant_id() != t) {
                    continue;
                }

                if let Err(err) = handler(envelope) {
                    warn!(worker = name, error = ?err, "projection worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(worker = name, "projection worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use promostock_core::AggregateId;
    use promostock_events::InMemoryEventBus;
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId, seq: u64) -> EventEnvelope<u64> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            AggregateId::new(),
            "test".to_string(),
            seq,
            seq,
        )
    }

    #[test]
    fn applies_messages_of_the_selected_tenant_until_shutdown() {
        let bus = InMemoryEventBus::new();
        let (mine, other) = (TenantId::new(), TenantId::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let handle = ProjectionWorker::spawn("test-worker", &bus, Some(mine), move |env| {
            sink.lock().unwrap().push(*env.payload());
            Ok::<_, ()>(())
        })
        .unwrap();

        bus.publish(envelope(mine, 1)).unwrap();
        bus.publish(envelope(other, 2)).unwrap();
        bus.publish(envelope(mine, 3)).unwrap();

        for _ in 0..40 {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    }
}
