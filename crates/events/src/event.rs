use chrono::{DateTime, Utc};

/// An immutable, versioned fact emitted by an aggregate.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `"inventory.stock.taken_out"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time of the fact. For stock movements this is the transaction timestamp.
    fn occurred_at(&self) -> DateTime<Utc>;
}
