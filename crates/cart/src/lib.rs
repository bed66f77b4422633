//! Shopping cart domain module.
//!
//! A cart belongs to exactly one user and has no authority over stock: the
//! availability it is given with each command is advisory, the ledger decides
//! at checkout.

pub mod cart;

pub use cart::{
    AddItem, Cart, CartCleared, CartCommand, CartEvent, CartId, CartItem, CartItemId, ClearCart,
    ItemAdded, ItemQuantityChanged, ItemRemoved, RemoveItem, UpdateItem,
};
