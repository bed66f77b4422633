use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_catalog::ProductId;
use stockyard_core::{Aggregate, AggregateRoot, DomainError, UserId, typed_id};
use stockyard_events::Event;

use crate::duration::RentalDuration;

typed_id!(RentalId);

/// Lease lifecycle. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Overdue,
}

impl RentalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RentalStatus::Completed | RentalStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RentalStatus::Pending => "pending",
            RentalStatus::Active => "active",
            RentalStatus::Completed => "completed",
            RentalStatus::Cancelled => "cancelled",
            RentalStatus::Overdue => "overdue",
        }
    }
}

impl core::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RentalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RentalStatus::Pending),
            "active" => Ok(RentalStatus::Active),
            "completed" => Ok(RentalStatus::Completed),
            "cancelled" | "canceled" => Ok(RentalStatus::Cancelled),
            "overdue" => Ok(RentalStatus::Overdue),
            other => Err(DomainError::invalid_state(format!(
                "unknown rental status '{other}'"
            ))),
        }
    }
}

/// Rentals are settled outside the gateway flow; the status is carried for
/// readers and starts `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalPaymentStatus {
    Pending,
    Paid,
}

/// Late fee owed at `now`: 10% of the effective daily rate per day past the
/// end date, where a started day counts as a full day.
///
/// The effective daily rate is `total_price / billed_days`, so extensions
/// priced at a newer rent price shift it.
pub fn calculate_late_fees(rental: &Rental, now: DateTime<Utc>) -> u64 {
    if now <= rental.end_date || rental.billed_days == 0 {
        return 0;
    }
    let overdue = now - rental.end_date;
    let mut days_late = overdue.num_days();
    if overdue > chrono::Duration::days(days_late) {
        days_late += 1;
    }

    let fee = u128::from(days_late.unsigned_abs()) * u128::from(rental.total_price)
        / (u128::from(rental.billed_days) * 10);
    u64::try_from(fee).unwrap_or(u64::MAX)
}

/// Aggregate root: Rental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    id: RentalId,
    product_id: ProductId,
    renter_id: UserId,
    seller_id: UserId,
    duration: RentalDuration,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    daily_rate: u64,
    billed_days: u64,
    total_price: u64,
    status: RentalStatus,
    payment_status: RentalPaymentStatus,
    returned_at: Option<DateTime<Utc>>,
    late_fees: u64,
    version: u64,
    created: bool,
}

impl Rental {
    /// Create an empty, not-yet-opened rental instance.
    pub fn empty(id: RentalId) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id,
            product_id: ProductId::new(id.0),
            renter_id: UserId::from_uuid(*id.0.as_uuid()),
            seller_id: UserId::from_uuid(*id.0.as_uuid()),
            duration: RentalDuration::days(1),
            start_date: epoch,
            end_date: epoch,
            daily_rate: 0,
            billed_days: 0,
            total_price: 0,
            status: RentalStatus::Pending,
            payment_status: RentalPaymentStatus::Pending,
            returned_at: None,
            late_fees: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RentalId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn renter_id(&self) -> UserId {
        self.renter_id
    }

    pub fn seller_id(&self) -> UserId {
        self.seller_id
    }

    pub fn duration(&self) -> RentalDuration {
        self.duration
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }

    /// Rent price snapshot taken when the lease was opened.
    pub fn daily_rate(&self) -> u64 {
        self.daily_rate
    }

    pub fn billed_days(&self) -> u64 {
        self.billed_days
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn status(&self) -> RentalStatus {
        self.status
    }

    pub fn payment_status(&self) -> RentalPaymentStatus {
        self.payment_status
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn late_fees(&self) -> u64 {
        self.late_fees
    }

    pub fn is_opened(&self) -> bool {
        self.created
    }

    pub fn is_party(&self, user: UserId) -> bool {
        self.renter_id == user || self.seller_id == user
    }
}

impl AggregateRoot for Rental {
    type Id = RentalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenRental. One unit must already be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRental {
    pub rental_id: RentalId,
    pub product_id: ProductId,
    pub renter_id: UserId,
    pub seller_id: UserId,
    pub duration: RentalDuration,
    pub daily_rate: u64,
    pub start_date: DateTime<Utc>,
}

/// Command: ExtendRental. `daily_rate` is the product's current rent price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendRental {
    pub actor: UserId,
    pub duration: RentalDuration,
    pub daily_rate: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeRentalStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRentalStatus {
    pub actor: UserId,
    pub status: RentalStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssessLateFees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessLateFees {
    pub actor: UserId,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalCommand {
    OpenRental(OpenRental),
    ExtendRental(ExtendRental),
    ChangeRentalStatus(ChangeRentalStatus),
    AssessLateFees(AssessLateFees),
}

/// Event: RentalOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalOpened {
    pub rental_id: RentalId,
    pub product_id: ProductId,
    pub renter_id: UserId,
    pub seller_id: UserId,
    pub duration: RentalDuration,
    pub daily_rate: u64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_price: u64,
}

/// Event: RentalExtended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalExtended {
    pub rental_id: RentalId,
    pub added: RentalDuration,
    pub added_price: u64,
    pub end_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RentalStatusChanged (moves that do not touch stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalStatusChanged {
    pub rental_id: RentalId,
    pub from: RentalStatus,
    pub to: RentalStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RentalCompleted. The unit goes back to stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalCompleted {
    pub rental_id: RentalId,
    pub product_id: ProductId,
    pub returned_at: DateTime<Utc>,
}

/// Event: RentalCancelled. The unit goes back to stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalCancelled {
    pub rental_id: RentalId,
    pub product_id: ProductId,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LateFeesAssessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateFeesAssessed {
    pub rental_id: RentalId,
    pub late_fees: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalEvent {
    RentalOpened(RentalOpened),
    RentalExtended(RentalExtended),
    RentalStatusChanged(RentalStatusChanged),
    RentalCompleted(RentalCompleted),
    RentalCancelled(RentalCancelled),
    LateFeesAssessed(LateFeesAssessed),
}

impl RentalEvent {
    /// Product whose leased unit must be released after this event commits.
    pub fn released_unit(&self) -> Option<ProductId> {
        match self {
            RentalEvent::RentalCompleted(e) => Some(e.product_id),
            RentalEvent::RentalCancelled(e) => Some(e.product_id),
            _ => None,
        }
    }
}

impl Event for RentalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RentalEvent::RentalOpened(_) => "rentals.rental.opened",
            RentalEvent::RentalExtended(_) => "rentals.rental.extended",
            RentalEvent::RentalStatusChanged(_) => "rentals.rental.status_changed",
            RentalEvent::RentalCompleted(_) => "rentals.rental.completed",
            RentalEvent::RentalCancelled(_) => "rentals.rental.cancelled",
            RentalEvent::LateFeesAssessed(_) => "rentals.rental.late_fees_assessed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RentalEvent::RentalOpened(e) => e.start_date,
            RentalEvent::RentalExtended(e) => e.occurred_at,
            RentalEvent::RentalStatusChanged(e) => e.occurred_at,
            RentalEvent::RentalCompleted(e) => e.returned_at,
            RentalEvent::RentalCancelled(e) => e.occurred_at,
            RentalEvent::LateFeesAssessed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Rental {
    type Command = RentalCommand;
    type Event = RentalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RentalEvent::RentalOpened(e) => {
                self.id = e.rental_id;
                self.product_id = e.product_id;
                self.renter_id = e.renter_id;
                self.seller_id = e.seller_id;
                self.duration = e.duration;
                self.daily_rate = e.daily_rate;
                self.start_date = e.start_date;
                self.end_date = e.end_date;
                self.billed_days = e.duration.billed_days();
                self.total_price = e.total_price;
                self.status = RentalStatus::Pending;
                self.payment_status = RentalPaymentStatus::Pending;
                self.created = true;
            }
            RentalEvent::RentalExtended(e) => {
                self.end_date = e.end_date;
                // Bounds were checked when the extension was decided.
                self.billed_days = self.billed_days.saturating_add(e.added.billed_days());
                self.total_price = self.total_price.saturating_add(e.added_price);
            }
            RentalEvent::RentalStatusChanged(e) => {
                self.status = e.to;
            }
            RentalEvent::RentalCompleted(e) => {
                self.status = RentalStatus::Completed;
                self.returned_at = Some(e.returned_at);
            }
            RentalEvent::RentalCancelled(_) => {
                self.status = RentalStatus::Cancelled;
            }
            RentalEvent::LateFeesAssessed(e) => {
                self.late_fees = e.late_fees;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RentalCommand::OpenRental(cmd) => self.handle_open(cmd),
            RentalCommand::ExtendRental(cmd) => self.handle_extend(cmd),
            RentalCommand::ChangeRentalStatus(cmd) => self.handle_change_status(cmd),
            RentalCommand::AssessLateFees(cmd) => self.handle_assess(cmd),
        }
    }
}

impl Rental {
    fn ensure_opened(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("rental"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenRental) -> Result<Vec<RentalEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("rental already exists"));
        }
        cmd.duration.validate()?;
        if cmd.daily_rate == 0 {
            return Err(DomainError::invalid_input("rent price must be positive"));
        }

        Ok(vec![RentalEvent::RentalOpened(RentalOpened {
            rental_id: cmd.rental_id,
            product_id: cmd.product_id,
            renter_id: cmd.renter_id,
            seller_id: cmd.seller_id,
            duration: cmd.duration,
            daily_rate: cmd.daily_rate,
            start_date: cmd.start_date,
            end_date: cmd.duration.advance(cmd.start_date)?,
            total_price: cmd.duration.price(cmd.daily_rate)?,
        })])
    }

    fn handle_extend(&self, cmd: &ExtendRental) -> Result<Vec<RentalEvent>, DomainError> {
        self.ensure_opened()?;
        if cmd.actor != self.renter_id {
            return Err(DomainError::Unauthorized);
        }
        if self.status != RentalStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "only active rentals can be extended (rental is {})",
                self.status
            )));
        }
        cmd.duration.validate()?;
        if cmd.daily_rate == 0 {
            return Err(DomainError::invalid_input("rent price must be positive"));
        }

        let added_price = cmd.duration.price(cmd.daily_rate)?;
        let totals_fit = self.total_price.checked_add(added_price).is_some()
            && self
                .billed_days
                .checked_add(cmd.duration.billed_days())
                .is_some();
        if !totals_fit {
            return Err(DomainError::invalid_input("extended rental total overflows"));
        }

        Ok(vec![RentalEvent::RentalExtended(RentalExtended {
            rental_id: self.id,
            added: cmd.duration,
            added_price,
            end_date: cmd.duration.advance(self.end_date)?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeRentalStatus,
    ) -> Result<Vec<RentalEvent>, DomainError> {
        self.ensure_opened()?;
        if !self.is_party(cmd.actor) {
            return Err(DomainError::Unauthorized);
        }
        if cmd.status == self.status {
            return Ok(vec![]);
        }
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "rental is already {}",
                self.status
            )));
        }

        if cmd.status == RentalStatus::Cancelled {
            if !matches!(self.status, RentalStatus::Pending | RentalStatus::Active) {
                return Err(DomainError::invalid_state(format!(
                    "cannot cancel a rental that is {}",
                    self.status
                )));
            }
            return Ok(vec![RentalEvent::RentalCancelled(RentalCancelled {
                rental_id: self.id,
                product_id: self.product_id,
                cancelled_by: cmd.actor,
                occurred_at: cmd.occurred_at,
            })]);
        }

        if cmd.actor != self.seller_id {
            return Err(DomainError::Unauthorized);
        }

        let allowed = matches!(
            (self.status, cmd.status),
            (RentalStatus::Pending, RentalStatus::Active)
                | (RentalStatus::Active, RentalStatus::Overdue)
                | (RentalStatus::Active, RentalStatus::Completed)
                | (RentalStatus::Overdue, RentalStatus::Completed)
        );
        if !allowed {
            return Err(DomainError::invalid_state(format!(
                "cannot move rental from {} to {}",
                self.status, cmd.status
            )));
        }

        if cmd.status == RentalStatus::Completed {
            return Ok(vec![RentalEvent::RentalCompleted(RentalCompleted {
                rental_id: self.id,
                product_id: self.product_id,
                returned_at: cmd.occurred_at,
            })]);
        }

        Ok(vec![RentalEvent::RentalStatusChanged(RentalStatusChanged {
            rental_id: self.id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assess(&self, cmd: &AssessLateFees) -> Result<Vec<RentalEvent>, DomainError> {
        self.ensure_opened()?;
        if !self.is_party(cmd.actor) {
            return Err(DomainError::Unauthorized);
        }
        if !matches!(self.status, RentalStatus::Active | RentalStatus::Overdue) {
            return Err(DomainError::invalid_state(format!(
                "late fees apply to active or overdue rentals (rental is {})",
                self.status
            )));
        }

        let late_fees = calculate_late_fees(self, cmd.now);
        if late_fees == self.late_fees {
            return Ok(vec![]);
        }

        Ok(vec![RentalEvent::LateFeesAssessed(LateFeesAssessed {
            rental_id: self.id,
            late_fees,
            occurred_at: cmd.now,
        })])
    }
}
