//! Product catalog storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockyard_catalog::{Product, ProductId};

use crate::store::StoreError;

/// Lookup/registration surface the commerce services need from the catalog.
pub trait ProductCatalog: Send + Sync {
    fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Register a new product. Ids are unique; re-registering is a conflict.
    fn insert(&self, product: Product) -> Result<(), StoreError>;

    /// Replace a registered product (price changes). Last writer wins.
    fn update(&self, product: Product) -> Result<(), StoreError>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get(id)
    }

    fn insert(&self, product: Product) -> Result<(), StoreError> {
        (**self).insert(product)
    }

    fn update(&self, product: Product) -> Result<(), StoreError> {
        (**self).update(product)
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(products.get(&id).cloned())
    }

    fn insert(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        if products.contains_key(&product.id) {
            return Err(StoreError::Concurrency(format!(
                "product {} already registered",
                product.id
            )));
        }
        products.insert(product.id, product);
        Ok(())
    }

    fn update(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        match products.get_mut(&product.id) {
            Some(slot) => {
                *slot = product;
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "product {} is not registered",
                product.id
            ))),
        }
    }
}
