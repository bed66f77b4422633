//! Long-running tasks started next to the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use stockyard_events::EventBus;
use stockyard_infra::services::SharedBus;

use super::AppServices;

/// Log one audit line per committed event.
///
/// Subscriptions block, so the loop runs on the blocking pool. It ends when
/// the bus is dropped.
pub fn spawn_audit_log(bus: SharedBus) -> JoinHandle<()> {
    let subscription = bus.subscribe();
    tokio::task::spawn_blocking(move || {
        while let Ok(envelope) = subscription.recv() {
            info!(
                target: "audit",
                event_id = %envelope.event_id(),
                aggregate_type = envelope.aggregate_type(),
                aggregate_id = %envelope.aggregate_id(),
                sequence = envelope.sequence_number(),
                event_type = envelope.event_type(),
                "event committed"
            );
        }
    })
}

/// Periodically cancel online orders whose payment session was abandoned.
pub fn spawn_session_sweeper(services: Arc<AppServices>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let ttl = services.config.payment_session_ttl;
            match services
                .commerce
                .payments
                .expire_stale_sessions(ttl, Utc::now())
                .await
            {
                Ok(0) => {}
                Ok(expired) => info!(expired, "payment session sweep"),
                Err(err) => warn!("payment session sweep failed: {err}"),
            }
        }
    })
}
