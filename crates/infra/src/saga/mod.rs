//! Compensating sagas over the stock ledger.
//!
//! A multi-line checkout is not one database transaction: each line is its own
//! conditional decrement. The saga records every successful step so a later
//! failure (another line short, or the order write failing) can be undone by
//! releasing exactly what was taken.

pub mod checkout;

pub use checkout::{ReservationSaga, ReservationState, ReservationStep};
