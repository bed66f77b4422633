//! Rental lifecycle: one unit reserved per lease, released exactly once on
//! completion or cancellation.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use stockyard_catalog::{PriceMode, Product, ProductId};
use stockyard_core::UserId;
use stockyard_rentals::{
    AssessLateFees, ChangeRentalStatus, ExtendRental, OpenRental, Rental, RentalCommand,
    RentalDuration, RentalId, RentalStatus,
};

use crate::dispatcher::Committed;
use crate::error::{CommerceError, CommerceResult};

use super::{RENTAL_AGGREGATE, RentalDispatcher, SharedCatalog, SharedLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CreateRental {
    pub product_id: ProductId,
    pub duration: RentalDuration,
}

#[derive(Clone)]
pub struct RentalService {
    dispatcher: RentalDispatcher,
    catalog: SharedCatalog,
    ledger: SharedLedger,
}

impl RentalService {
    pub fn new(dispatcher: RentalDispatcher, catalog: SharedCatalog, ledger: SharedLedger) -> Self {
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

    async fn transition(
        &self,
        rental_id: RentalId,
        command: RentalCommand,
    ) -> CommerceResult<Committed<Rental>> {
        let committed = self.dispatcher.dispatch(
            RENTAL_AGGREGATE,
            rental_id,
            &command,
            || Rental::empty(rental_id),
        )?;

        for event in &committed.events {
            if let Some(product) = event.released_unit() {
                if let Err(err) = self.ledger.release(product, 1).await {
                    error!(rental = %rental_id, %product, "releasing rented unit failed: {err}");
                } else {
                    info!(rental = %rental_id, %product, "rented unit released");
                }
            }
        }
        Ok(committed)
    }

    #[instrument(skip(self, request), fields(user = %renter, product = %request.product_id), err)]
    pub async fn create_rental(&self, renter: UserId, request: CreateRental) -> CommerceResult<Rental> {
        let product = self.product(request.product_id)?;
        let daily_rate = product.unit_price(PriceMode::Rental)?;
        request.duration.validate()?;

        self.ledger.try_reserve(product.id, 1).await?;

        let rental_id = RentalId::generate();
        let command = RentalCommand::OpenRental(OpenRental {
            rental_id,
            product_id: product.id,
            renter_id: renter,
            seller_id: product.seller_id,
            duration: request.duration,
            daily_rate,
            start_date: Utc::now(),
        });
        match self
            .dispatcher
            .dispatch(RENTAL_AGGREGATE, rental_id, &command, || Rental::empty(rental_id))
        {
            Ok(committed) => {
                info!(
                    rental = %rental_id,
                    total = committed.record.total_price(),
                    "rental opened"
                );
                Ok(committed.record)
            }
            Err(err) => {
                warn!(rental = %rental_id, "rental not persisted, releasing unit: {err}");
                if let Err(release_err) = self.ledger.release(product.id, 1).await {
                    error!(product = %product.id, "compensating release failed: {release_err}");
                }
                Err(err.into())
            }
        }
    }

    /// Extend an active rental, priced at the product's current rent price.
    #[instrument(skip(self), fields(user = %actor), err)]
    pub async fn extend_rental(
        &self,
        actor: UserId,
        rental_id: RentalId,
        duration: RentalDuration,
    ) -> CommerceResult<Rental> {
        let rental = self.load_opened(rental_id)?;
        let daily_rate = self.product(rental.product_id())?.unit_price(PriceMode::Rental)?;

        let committed = self
            .transition(
                rental_id,
                RentalCommand::ExtendRental(ExtendRental {
                    actor,
                    duration,
                    daily_rate,
                    occurred_at: Utc::now(),
                }),
            )
            .await?;
        info!(
            rental = %rental_id,
            end_date = %committed.record.end_date(),
            total = committed.record.total_price(),
            "rental extended"
        );
        Ok(committed.record)
    }

    /// `status` is the raw requested value.
    #[instrument(skip(self), fields(user = %actor), err)]
    pub async fn update_status(
        &self,
        actor: UserId,
        rental_id: RentalId,
        status: &str,
    ) -> CommerceResult<Rental> {
        let status: RentalStatus = status.parse()?;
        self.change_status(actor, rental_id, status).await
    }

    pub async fn complete_rental(&self, actor: UserId, rental_id: RentalId) -> CommerceResult<Rental> {
        self.change_status(actor, rental_id, RentalStatus::Completed).await
    }

    pub async fn cancel_rental(&self, actor: UserId, rental_id: RentalId) -> CommerceResult<Rental> {
        self.change_status(actor, rental_id, RentalStatus::Cancelled).await
    }

    async fn change_status(
        &self,
        actor: UserId,
        rental_id: RentalId,
        status: RentalStatus,
    ) -> CommerceResult<Rental> {
        let committed = self
            .transition(
                rental_id,
                RentalCommand::ChangeRentalStatus(ChangeRentalStatus {
                    actor,
                    status,
                    occurred_at: Utc::now(),
                }),
            )
            .await?;
        if !committed.events.is_empty() {
            info!(rental = %rental_id, %status, "rental status changed");
        }
        Ok(committed.record)
    }

    #[instrument(skip(self), fields(user = %actor), err)]
    pub async fn assess_late_fees(
        &self,
        actor: UserId,
        rental_id: RentalId,
        now: DateTime<Utc>,
    ) -> CommerceResult<Rental> {
        let committed = self
            .transition(
                rental_id,
                RentalCommand::AssessLateFees(AssessLateFees { actor, now }),
            )
            .await?;
        Ok(committed.record)
    }

    fn load_opened(&self, rental_id: RentalId) -> CommerceResult<Rental> {
        self.dispatcher
            .load::<Rental>(&rental_id)?
            .filter(Rental::is_opened)
            .ok_or_else(|| CommerceError::not_found("rental"))
    }

    fn matching(&self, keep: impl Fn(&Rental) -> bool) -> CommerceResult<Vec<Rental>> {
        let mut rentals: Vec<Rental> = self
            .dispatcher
            .store()
            .list()?
            .into_iter()
            .filter(|r| r.is_opened() && keep(r))
            .collect();
        rentals.sort_by_key(|r| std::cmp::Reverse(r.start_date()));
        Ok(rentals)
    }

    pub async fn user_rentals(&self, renter: UserId) -> CommerceResult<Vec<Rental>> {
        self.matching(|r| r.renter_id() == renter)
    }

    pub async fn received_rentals(&self, seller: UserId) -> CommerceResult<Vec<Rental>> {
        self.matching(|r| r.seller_id() == seller)
    }

    pub async fn get_rental(&self, actor: UserId, rental_id: RentalId) -> CommerceResult<Rental> {
        let rental = self.load_opened(rental_id)?;
        if !rental.is_party(actor) {
            return Err(CommerceError::Unauthorized);
        }
        Ok(rental)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::{GatewayError, GatewaySession, PaymentGateway, SessionRequest};
    use crate::services::{CommerceServices, PaymentSettings, RegisterProduct};
    use async_trait::async_trait;
    use stockyard_rentals::DurationUnit;

    struct NoGateway;

    #[async_trait]
    impl PaymentGateway for NoGateway {
        async fn init_session(&self, _: &SessionRequest) -> Result<GatewaySession, GatewayError> {
            Err(GatewayError::Unreachable("not wired".into()))
        }
    }

    fn services() -> CommerceServices {
        CommerceServices::in_memory(
            Arc::new(NoGateway),
            PaymentSettings {
                public_base_url: "http://localhost".into(),
                currency: "BDT".into(),
            },
        )
    }

    async fn product(svc: &CommerceServices, seller: UserId, price: Option<u64>, rent: Option<u64>) -> ProductId {
        svc.catalog
            .register_product(
                seller,
                RegisterProduct {
                    name: "Tent".into(),
                    price,
                    rent_price: rent,
                    stock: 2,
                },
            )
            .await
            .unwrap()
            .product
            .id
    }

    #[tokio::test]
    async fn buy_only_product_cannot_be_rented() {
        let svc = services();
        let p = product(&svc, UserId::new(), Some(900), None).await;
        let err = svc
            .rentals
            .create_rental(
                UserId::new(),
                CreateRental {
                    product_id: p,
                    duration: RentalDuration::days(3),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(svc.catalog.product_view(p).await.unwrap().stock, 2);
    }

    #[tokio::test]
    async fn cancel_by_either_party_releases_once() {
        let svc = services();
        let seller = UserId::new();
        let renter = UserId::new();
        let p = product(&svc, seller, None, Some(50)).await;
        let rental = svc
            .rentals
            .create_rental(
                renter,
                CreateRental {
                    product_id: p,
                    duration: RentalDuration::new(1, DurationUnit::Week).unwrap(),
                },
            )
            .await
            .unwrap();
        assert_eq!(rental.total_price(), 350);
        assert_eq!(svc.catalog.product_view(p).await.unwrap().stock, 1);

        let id = rental.id_typed();
        svc.rentals.cancel_rental(renter, id).await.unwrap();
        svc.rentals.cancel_rental(seller, id).await.unwrap();
        assert_eq!(svc.catalog.product_view(p).await.unwrap().stock, 2);
    }

    #[tokio::test]
    async fn only_renter_extends_and_only_while_active() {
        let svc = services();
        let seller = UserId::new();
        let renter = UserId::new();
        let p = product(&svc, seller, None, Some(100)).await;
        let id = svc
            .rentals
            .create_rental(
                renter,
                CreateRental {
                    product_id: p,
                    duration: RentalDuration::days(2),
                },
            )
            .await
            .unwrap()
            .id_typed();

        let err = svc
            .rentals
            .extend_rental(renter, id, RentalDuration::days(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        svc.rentals.update_status(seller, id, "active").await.unwrap();
        let err = svc
            .rentals
            .extend_rental(seller, id, RentalDuration::days(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn late_fees_are_persisted_on_request() {
        let svc = services();
        let seller = UserId::new();
        let renter = UserId::new();
        let p = product(&svc, seller, None, Some(100)).await;
        let rental = svc
            .rentals
            .create_rental(
                renter,
                CreateRental {
                    product_id: p,
                    duration: RentalDuration::days(10),
                },
            )
            .await
            .unwrap();
        let id = rental.id_typed();
        svc.rentals.update_status(seller, id, "active").await.unwrap();

        let later = rental.end_date() + Duration::days(3);
        let assessed = svc.rentals.assess_late_fees(renter, id, later).await.unwrap();
        // 3 days × (1000 / 10 days) / 10
        assert_eq!(assessed.late_fees(), 30);

        let err = svc
            .rentals
            .update_status(seller, id, "returned")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
