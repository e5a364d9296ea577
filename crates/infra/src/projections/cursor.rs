use std::collections::HashMap;
use std::sync::RwLock;

use promostock_core::{AggregateId, TenantId};

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// Last applied sequence number per `(tenant, aggregate)` stream.
///
/// Makes a projection idempotent under at-least-once delivery: replays at or
/// below the cursor are skipped, gaps are rejected. Streams are expected from
/// sequence 1 since read models are always rebuilt from the full log.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `apply` when `seq` is the next event of the stream, then advance
    /// the cursor. Returns `Ok(false)` for duplicates.
    ///
    /// The cursor lock is held while `apply` runs so one stream is never
    /// applied concurrently.
    pub(crate) fn advance(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<bool, ProjectionError> {
        let mut cursors = self
            .inner
            .write()
            .map_err(|_| ProjectionError::Poisoned)?;

        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        cursors.insert(key, seq);
        Ok(true)
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}
