use serde::{Deserialize, Serialize};

use stockyard_catalog::ProductId;
use stockyard_core::{Aggregate, AggregateRoot, DomainError};

/// Versioned stock counter for one product.
///
/// `stock` is unsigned: a reservation that would take it below zero is
/// rejected in `handle`, never clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    product_id: ProductId,
    stock: u32,
    version: u64,
}

impl StockRecord {
    /// A freshly seeded counter (version 1).
    pub fn seeded(product_id: ProductId, stock: u32) -> Self {
        Self {
            product_id,
            stock,
            version: 1,
        }
    }

    /// Rebuild from persisted columns.
    pub fn from_parts(product_id: ProductId, stock: u32, version: u64) -> Self {
        Self {
            product_id,
            stock,
            version,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    /// Convenience: decide and apply in one step, returning the new level.
    pub fn execute(&mut self, command: &StockCommand) -> Result<u32, DomainError> {
        for event in self.handle(command)? {
            self.apply(&event);
        }
        Ok(self.stock)
    }
}

impl AggregateRoot for StockRecord {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    /// Decrement if and only if enough stock is available.
    Reserve { quantity: u32 },
    /// Unconditional increment (compensation or return).
    Release { quantity: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    Reserved { quantity: u32 },
    Released { quantity: u32 },
}

impl Aggregate for StockRecord {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::Reserved { quantity } => self.stock -= quantity,
            StockEvent::Released { quantity } => self.stock += quantity,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match *command {
            StockCommand::Reserve { quantity } => {
                ensure_positive(quantity)?;
                if quantity > self.stock {
                    return Err(DomainError::insufficient_stock(
                        self.product_id.0,
                        quantity,
                        self.stock,
                    ));
                }
                Ok(vec![StockEvent::Reserved { quantity }])
            }
            StockCommand::Release { quantity } => {
                ensure_positive(quantity)?;
                if self.stock.checked_add(quantity).is_none() {
                    return Err(DomainError::invalid_input("stock counter overflow"));
                }
                Ok(vec![StockEvent::Released { quantity }])
            }
        }
    }
}

fn ensure_positive(quantity: u32) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::invalid_input("quantity must be at least 1"));
    }
    Ok(())
}
