//! Cart operations.
//!
//! Availability checked here is advisory: nothing is reserved until checkout.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockyard_cart::{
    AddItem, Cart, CartCommand, CartId, CartItem, CartItemId, ClearCart, RemoveItem, UpdateItem,
};
use stockyard_catalog::{PriceMode, Product, ProductId};
use stockyard_core::UserId;

use crate::error::{CommerceError, CommerceResult};
use crate::ledger::LedgerError;

use super::{CART_AGGREGATE, CartDispatcher, SharedCatalog, SharedLedger};

/// A cart line expanded with the product's current details. `product_name`
/// and `available` are `None` when the product has since disappeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub item: CartItem,
    pub line_total: u64,
    pub product_name: Option<String>,
    pub available: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub owner: UserId,
    pub items: Vec<CartLineView>,
    pub total: u64,
}

#[derive(Clone)]
pub struct CartService {
    dispatcher: CartDispatcher,
    catalog: SharedCatalog,
    ledger: SharedLedger,
}

impl CartService {
    pub fn new(dispatcher: CartDispatcher, catalog: SharedCatalog, ledger: SharedLedger) -> Self {
        Self {
            dispatcher,
            catalog,
            ledger,
        }
    }

    fn product(&self, id: ProductId) -> CommerceResult<Product> {
        self.catalog
            .get(id)?
            .ok_or_else(|| CommerceError::not_found(format!("product {id}")))
    }

    async fn available(&self, id: ProductId) -> CommerceResult<u32> {
        match self.ledger.available(id).await {
            Ok(level) => Ok(level),
            Err(LedgerError::NotFound(_)) => Err(CommerceError::not_found(format!("product {id}"))),
            Err(other) => Err(other.into()),
        }
    }

    fn run(&self, owner: UserId, command: CartCommand) -> CommerceResult<Cart> {
        let committed = self.dispatcher.dispatch(
            CART_AGGREGATE,
            CartId::for_owner(owner),
            &command,
            || Cart::empty(owner),
        )?;
        Ok(committed.record)
    }

    /// Stored cart, or `None` if the user never added anything.
    pub(crate) fn load(&self, owner: UserId) -> CommerceResult<Option<Cart>> {
        Ok(self.dispatcher.load::<Cart>(&CartId::for_owner(owner))?)
    }

    #[instrument(skip(self), fields(user = %owner), err)]
    pub async fn add_item(
        &self,
        owner: UserId,
        product_id: ProductId,
        quantity: u32,
        is_rental: bool,
    ) -> CommerceResult<CartView> {
        let product = self.product(product_id)?;
        let mode = if is_rental {
            PriceMode::Rental
        } else {
            PriceMode::Purchase
        };
        let unit_price = product.unit_price(mode)?;
        let available = self.available(product_id).await?;

        let cart = self.run(
            owner,
            CartCommand::AddItem(AddItem {
                owner,
                item_id: CartItemId::generate(),
                product_id,
                quantity,
                unit_price,
                is_rental,
                available,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(product = %product_id, quantity, is_rental, "item added to cart");
        self.expand(cart).await
    }

    #[instrument(skip(self), fields(user = %owner), err)]
    pub async fn update_item(
        &self,
        owner: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> CommerceResult<CartView> {
        let cart = self
            .load(owner)?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CommerceError::not_found("cart"))?;
        let item = cart
            .item(item_id)
            .cloned()
            .ok_or_else(|| CommerceError::not_found("cart item"))?;

        let product = self.product(item.product_id)?;
        let unit_price = product.unit_price(item.price_mode())?;
        let available = self.available(item.product_id).await?;

        let cart = self.run(
            owner,
            CartCommand::UpdateItem(UpdateItem {
                owner,
                item_id,
                quantity,
                unit_price,
                available,
                occurred_at: Utc::now(),
            }),
        )?;

        info!(item = %item_id, quantity, "cart item updated");
        self.expand(cart).await
    }

    #[instrument(skip(self), fields(user = %owner), err)]
    pub async fn remove_item(&self, owner: UserId, item_id: CartItemId) -> CommerceResult<CartView> {
        let cart = self.run(
            owner,
            CartCommand::RemoveItem(RemoveItem {
                owner,
                item_id,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(item = %item_id, "cart item removed");
        self.expand(cart).await
    }

    /// Idempotent: clearing an absent or empty cart succeeds.
    #[instrument(skip(self), fields(user = %owner), err)]
    pub async fn clear(&self, owner: UserId) -> CommerceResult<()> {
        if self.load(owner)?.is_none() {
            return Ok(());
        }
        self.run(
            owner,
            CartCommand::ClearCart(ClearCart {
                owner,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Clear after a successful checkout. The order is already durable, so a
    /// failure here is logged rather than surfaced.
    pub(crate) async fn clear_after_checkout(&self, owner: UserId) {
        if let Err(err) = self.clear(owner).await {
            warn!(user = %owner, "cart not cleared after checkout: {err}");
        }
    }

    pub async fn get(&self, owner: UserId) -> CommerceResult<CartView> {
        let cart = self.load(owner)?.unwrap_or_else(|| Cart::empty(owner));
        self.expand(cart).await
    }

    async fn expand(&self, cart: Cart) -> CommerceResult<CartView> {
        let mut items = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            let product_name = self.catalog.get(item.product_id)?.map(|p| p.name);
            let available = match self.ledger.available(item.product_id).await {
                Ok(level) => Some(level),
                Err(LedgerError::NotFound(_)) => None,
                Err(other) => return Err(other.into()),
            };
            items.push(CartLineView {
                item: item.clone(),
                line_total: item.line_total(),
                product_name,
                available,
            });
        }

        Ok(CartView {
            owner: cart.owner(),
            items,
            total: cart.total(),
        })
    }
}
