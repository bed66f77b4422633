use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{DomainError, DomainResult, UserId, typed_id};

typed_id!(
    /// Product identifier; also keys the product's stock record.
    ProductId
);

/// Which price a cart line or lease draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    Purchase,
    Rental,
}

/// Offer type without the price payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Buy,
    Rent,
    Both,
}

/// Highest accepted price per unit (purchase) or per day (rent), in the
/// smallest currency unit.
pub const MAX_UNIT_PRICE: u64 = 1_000_000_000_000;

/// Tagged offer variant: each kind carries exactly the price fields it needs.
///
/// Prices are in the smallest currency unit; `rent_price` is per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProductOffer {
    Buy { price: u64 },
    Rent { rent_price: u64 },
    Both { price: u64, rent_price: u64 },
}

impl ProductOffer {
    /// Build an offer from the optional price fields of a registration request.
    ///
    /// A zero price is treated as undefined.
    pub fn from_prices(price: Option<u64>, rent_price: Option<u64>) -> DomainResult<Self> {
        if price.into_iter().chain(rent_price).any(|p| p > MAX_UNIT_PRICE) {
            return Err(DomainError::invalid_input(format!(
                "price cannot exceed {MAX_UNIT_PRICE}"
            )));
        }
        match (price.filter(|p| *p > 0), rent_price.filter(|p| *p > 0)) {
            (Some(price), Some(rent_price)) => Ok(Self::Both { price, rent_price }),
            (Some(price), None) => Ok(Self::Buy { price }),
            (None, Some(rent_price)) => Ok(Self::Rent { rent_price }),
            (None, None) => Err(DomainError::invalid_input(
                "product needs a positive price or rent_price",
            )),
        }
    }

    pub fn kind(&self) -> ProductKind {
        match self {
            ProductOffer::Buy { .. } => ProductKind::Buy,
            ProductOffer::Rent { .. } => ProductKind::Rent,
            ProductOffer::Both { .. } => ProductKind::Both,
        }
    }

    pub fn price(&self) -> Option<u64> {
        match self {
            ProductOffer::Buy { price } | ProductOffer::Both { price, .. } => Some(*price),
            ProductOffer::Rent { .. } => None,
        }
    }

    pub fn rent_price(&self) -> Option<u64> {
        match self {
            ProductOffer::Rent { rent_price } | ProductOffer::Both { rent_price, .. } => {
                Some(*rent_price)
            }
            ProductOffer::Buy { .. } => None,
        }
    }
}

/// Catalog entry as seen by the commerce engine.
///
/// Stock is deliberately absent: the stock counter is owned by the inventory
/// ledger and read through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub name: String,
    pub offer: ProductOffer,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: ProductId,
        seller_id: UserId,
        name: impl Into<String>,
        offer: ProductOffer,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::invalid_input("name cannot be empty"));
        }
        Ok(Self {
            id,
            seller_id,
            name,
            offer,
            created_at,
        })
    }

    /// Price for the requested mode, or `InvalidInput` if the offer lacks it.
    pub fn unit_price(&self, mode: PriceMode) -> DomainResult<u64> {
        let price = match mode {
            PriceMode::Purchase => self.offer.price(),
            PriceMode::Rental => self.offer.rent_price(),
        };
        price.ok_or_else(|| {
            DomainError::invalid_input(format!(
                "product {} has no {} price",
                self.id,
                match mode {
                    PriceMode::Purchase => "purchase",
                    PriceMode::Rental => "rent",
                }
            ))
        })
    }

    pub fn is_rentable(&self) -> bool {
        self.offer.rent_price().is_some()
    }

    /// Copy of this product with a new offer. Only its seller may reprice it.
    pub fn repriced(&self, actor: UserId, offer: ProductOffer) -> DomainResult<Self> {
        if actor != self.seller_id {
            return Err(DomainError::Unauthorized);
        }
        Ok(Self {
            offer,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(offer: ProductOffer) -> Product {
        Product::new(ProductId::generate(), UserId::new(), "Tent", offer, Utc::now()).unwrap()
    }

    #[test]
    fn buy_only_product_has_no_rent_price() {
        let p = product(ProductOffer::Buy { price: 500 });
        assert_eq!(p.unit_price(PriceMode::Purchase).unwrap(), 500);
        assert!(matches!(
            p.unit_price(PriceMode::Rental),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(!p.is_rentable());
    }

    #[test]
    fn both_offer_exposes_both_prices() {
        let p = product(ProductOffer::Both {
            price: 900,
            rent_price: 40,
        });
        assert_eq!(p.unit_price(PriceMode::Purchase).unwrap(), 900);
        assert_eq!(p.unit_price(PriceMode::Rental).unwrap(), 40);
        assert_eq!(p.offer.kind(), ProductKind::Both);
    }

    #[test]
    fn offer_from_prices_picks_variant() {
        assert_eq!(
            ProductOffer::from_prices(None, Some(30)).unwrap(),
            ProductOffer::Rent { rent_price: 30 }
        );
        assert_eq!(
            ProductOffer::from_prices(Some(10), Some(0)).unwrap(),
            ProductOffer::Buy { price: 10 }
        );
        assert!(ProductOffer::from_prices(None, None).is_err());
    }

    #[test]
    fn prices_above_the_cap_are_rejected() {
        assert!(ProductOffer::from_prices(Some(MAX_UNIT_PRICE), None).is_ok());
        assert!(matches!(
            ProductOffer::from_prices(Some(MAX_UNIT_PRICE + 1), None),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            ProductOffer::from_prices(Some(10), Some(u64::MAX / 2 + 1)),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn only_the_seller_can_reprice() {
        let p = product(ProductOffer::Rent { rent_price: 100 });
        let err = p
            .repriced(UserId::new(), ProductOffer::Rent { rent_price: 150 })
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));

        let repriced = p
            .repriced(p.seller_id, ProductOffer::Rent { rent_price: 150 })
            .unwrap();
        assert_eq!(repriced.unit_price(PriceMode::Rental).unwrap(), 150);
        assert_eq!(repriced.id, p.id);
    }

    #[test]
    fn offer_serializes_with_type_tag() {
        let json = serde_json::to_value(ProductOffer::Rent { rent_price: 12 }).unwrap();
        assert_eq!(json["type"], "rent");
        assert_eq!(json["rent_price"], 12);
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = Product::new(
            ProductId::generate(),
            UserId::new(),
            "  ",
            ProductOffer::Buy { price: 1 },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}
