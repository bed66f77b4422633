use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_catalog::{PriceMode, ProductId};
use stockyard_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId, typed_id};
use stockyard_events::Event;

typed_id!(
    /// Cart identifier. Every user has exactly one, derived from the user id.
    CartId
);

typed_id!(CartItemId);

impl CartId {
    pub fn for_owner(owner: UserId) -> Self {
        Self(AggregateId::from_uuid(*owner.as_uuid()))
    }
}

/// One basket line. Lines are unique per `(product_id, is_rental)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price snapshot taken on the last add/update, smallest currency unit.
    pub unit_price: u64,
    pub is_rental: bool,
}

impl CartItem {
    /// Saturates; lines whose total would not fit are refused on add/update.
    pub fn line_total(&self) -> u64 {
        u64::from(self.quantity).saturating_mul(self.unit_price)
    }

    pub fn price_mode(&self) -> PriceMode {
        if self.is_rental {
            PriceMode::Rental
        } else {
            PriceMode::Purchase
        }
    }
}

/// Aggregate root: Cart.
///
/// The total is never stored; it is always the sum of the line totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    owner: UserId,
    items: Vec<CartItem>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Cart {
    /// Not-yet-created cart for `owner`; also what readers get for a user who
    /// never added anything.
    pub fn empty(owner: UserId) -> Self {
        Self {
            id: CartId::for_owner(owner),
            owner,
            items: Vec::new(),
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn total(&self) -> u64 {
        self.items
            .iter()
            .map(CartItem::line_total)
            .fold(0, u64::saturating_add)
    }

    fn line_for(&self, product_id: ProductId, is_rental: bool) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|i| i.product_id == product_id && i.is_rental == is_rental)
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddItem.
///
/// `available` is the product's stock as read by the caller. It is advisory
/// only; the ledger re-checks at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub owner: UserId,
    /// Id used if a new line is appended; ignored on merge.
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: u64,
    pub is_rental: bool,
    pub available: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub owner: UserId,
    pub item_id: CartItemId,
    pub quantity: u32,
    pub unit_price: u64,
    pub available: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub owner: UserId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClearCart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCart {
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    AddItem(AddItem),
    UpdateItem(UpdateItem),
    RemoveItem(RemoveItem),
    ClearCart(ClearCart),
}

/// Event: ItemAdded (a new line was appended).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub owner: UserId,
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: u64,
    pub is_rental: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemQuantityChanged (merge or explicit update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantityChanged {
    pub owner: UserId,
    pub item_id: CartItemId,
    pub quantity: u32,
    pub unit_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub owner: UserId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CartCleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    ItemAdded(ItemAdded),
    ItemQuantityChanged(ItemQuantityChanged),
    ItemRemoved(ItemRemoved),
    CartCleared(CartCleared),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::ItemAdded(_) => "cart.item_added",
            CartEvent::ItemQuantityChanged(_) => "cart.item_quantity_changed",
            CartEvent::ItemRemoved(_) => "cart.item_removed",
            CartEvent::CartCleared(_) => "cart.cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::ItemQuantityChanged(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::CartCleared(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::ItemAdded(e) => {
                self.created = true;
                self.items.push(CartItem {
                    id: e.item_id,
                    product_id: e.product_id,
                    quantity: e.quantity,
                    unit_price: e.unit_price,
                    is_rental: e.is_rental,
                });
                self.updated_at = Some(e.occurred_at);
            }
            CartEvent::ItemQuantityChanged(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.id == e.item_id) {
                    item.quantity = e.quantity;
                    item.unit_price = e.unit_price;
                }
                self.updated_at = Some(e.occurred_at);
            }
            CartEvent::ItemRemoved(e) => {
                self.items.retain(|i| i.id != e.item_id);
                self.updated_at = Some(e.occurred_at);
            }
            CartEvent::CartCleared(e) => {
                self.items.clear();
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::AddItem(cmd) => self.handle_add(cmd),
            CartCommand::UpdateItem(cmd) => self.handle_update(cmd),
            CartCommand::RemoveItem(cmd) => self.handle_remove(cmd),
            CartCommand::ClearCart(cmd) => self.handle_clear(cmd),
        }
    }
}

impl Cart {
    fn ensure_owner(&self, owner: UserId) -> Result<(), DomainError> {
        if self.owner != owner {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    fn ensure_quantity(product_id: ProductId, quantity: u32, available: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::invalid_input("quantity must be at least 1"));
        }
        if quantity > available {
            return Err(DomainError::insufficient_stock(product_id.0, quantity, available));
        }
        Ok(())
    }

    fn ensure_priceable(quantity: u32, unit_price: u64) -> Result<(), DomainError> {
        u64::from(quantity)
            .checked_mul(unit_price)
            .map(|_| ())
            .ok_or_else(|| DomainError::invalid_input("line total overflows"))
    }

    fn handle_add(&self, cmd: &AddItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_owner(cmd.owner)?;
        Self::ensure_quantity(cmd.product_id, cmd.quantity, cmd.available)?;

        if let Some(existing) = self.line_for(cmd.product_id, cmd.is_rental) {
            let quantity = existing
                .quantity
                .checked_add(cmd.quantity)
                .ok_or_else(|| DomainError::invalid_input("quantity too large"))?;
            Self::ensure_priceable(quantity, cmd.unit_price)?;
            return Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
                owner: cmd.owner,
                item_id: existing.id,
                quantity,
                unit_price: cmd.unit_price,
                occurred_at: cmd.occurred_at,
            })]);
        }

        Self::ensure_priceable(cmd.quantity, cmd.unit_price)?;
        Ok(vec![CartEvent::ItemAdded(ItemAdded {
            owner: cmd.owner,
            item_id: cmd.item_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            is_rental: cmd.is_rental,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateItem) -> Result<Vec<CartEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("cart"));
        }
        self.ensure_owner(cmd.owner)?;
        let item = self
            .item(cmd.item_id)
            .ok_or_else(|| DomainError::not_found("cart item"))?;
        Self::ensure_quantity(item.product_id, cmd.quantity, cmd.available)?;
        Self::ensure_priceable(cmd.quantity, cmd.unit_price)?;

        Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
            owner: cmd.owner,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveItem) -> Result<Vec<CartEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("cart"));
        }
        self.ensure_owner(cmd.owner)?;
        if self.item(cmd.item_id).is_none() {
            return Err(DomainError::not_found("cart item"));
        }

        Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
            owner: cmd.owner,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear(&self, cmd: &ClearCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_owner(cmd.owner)?;
        if self.items.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::CartCleared(CartCleared {
            owner: cmd.owner,
            occurred_at: cmd.occurred_at,
        })])
    }
}
