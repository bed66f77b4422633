use chrono::{DateTime, Utc};

/// A fact emitted by a commerce state machine.
///
/// Events are immutable and carry a stable dotted type name
/// (e.g. `"sales.order.cancelled"`) so subscribers can route on it without
/// deserializing the payload.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
