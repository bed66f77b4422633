//! Rentals domain module: single-unit, time-boxed leases.

pub mod duration;
pub mod rental;

pub use duration::{DurationUnit, RentalDuration};
pub use rental::{
    AssessLateFees, ChangeRentalStatus, ExtendRental, LateFeesAssessed, OpenRental, Rental,
    RentalCancelled, RentalCommand, RentalCompleted, RentalEvent, RentalExtended, RentalId,
    RentalOpened, RentalPaymentStatus, RentalStatus, RentalStatusChanged, calculate_late_fees,
};
