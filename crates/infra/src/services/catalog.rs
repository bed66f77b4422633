//! Minimal product registration and repricing surface.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use stockyard_catalog::{Product, ProductId, ProductOffer};
use stockyard_core::UserId;

use crate::error::{CommerceError, CommerceResult};

use super::{SharedCatalog, SharedLedger};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterProduct {
    pub name: String,
    pub price: Option<u64>,
    pub rent_price: Option<u64>,
    pub stock: u32,
}

/// New prices for an existing product. Omitted or zero means "not offered".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePrices {
    pub price: Option<u64>,
    pub rent_price: Option<u64>,
}

/// A product together with its current ledger level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub stock: u32,
}

#[derive(Clone)]
pub struct CatalogService {
    catalog: SharedCatalog,
    ledger: SharedLedger,
}

impl CatalogService {
    pub fn new(catalog: SharedCatalog, ledger: SharedLedger) -> Self {
        Self { catalog, ledger }
    }

    #[instrument(skip(self, request), fields(seller = %seller), err)]
    pub async fn register_product(
        &self,
        seller: UserId,
        request: RegisterProduct,
    ) -> CommerceResult<ProductView> {
        let offer = ProductOffer::from_prices(request.price, request.rent_price)?;
        let product = Product::new(ProductId::generate(), seller, request.name, offer, Utc::now())?;

        self.catalog.insert(product.clone())?;
        self.ledger.seed(product.id, request.stock).await?;

        info!(product = %product.id, stock = request.stock, "product registered");
        Ok(ProductView {
            product,
            stock: request.stock,
        })
    }

    /// Replace the product's offer. Existing orders and rentals keep the
    /// prices they were placed at; cart updates and rental extensions read
    /// the new ones.
    #[instrument(skip(self, request), fields(seller = %seller, product = %id), err)]
    pub async fn update_prices(
        &self,
        seller: UserId,
        id: ProductId,
        request: UpdatePrices,
    ) -> CommerceResult<ProductView> {
        let offer = ProductOffer::from_prices(request.price, request.rent_price)?;
        let product = self.product(id)?.repriced(seller, offer)?;
        self.catalog.update(product.clone())?;

        info!(offer = ?product.offer, "product repriced");
        let stock = self.ledger.available(id).await?;
        Ok(ProductView { product, stock })
    }

    pub async fn product_view(&self, id: ProductId) -> CommerceResult<ProductView> {
        let product = self.product(id)?;
        let stock = self.ledger.available(id).await?;
        Ok(ProductView { product, stock })
    }

    pub fn product(&self, id: ProductId) -> CommerceResult<Product> {
        self.catalog
            .get(id)?
            .ok_or_else(|| CommerceError::not_found(format!("product {id}")))
    }
}
