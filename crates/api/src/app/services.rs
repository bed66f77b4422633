//! Backend selection for the running process.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use stockyard_infra::config::AppConfig;
use stockyard_infra::gateway::{GatewayError, HttpPaymentGateway};
use stockyard_infra::ledger::{InMemoryStockLedger, LedgerError, PostgresStockLedger};
use stockyard_infra::services::{CommerceServices, PaymentSettings, SharedLedger};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("stock ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
}

pub struct AppServices {
    pub commerce: CommerceServices,
    pub config: AppConfig,
}

/// Postgres ledger when `DATABASE_URL` is set, in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, BuildError> {
    let ledger: SharedLedger = match &config.database_url {
        Some(url) => {
            info!("using postgres stock ledger");
            Arc::new(PostgresStockLedger::connect(url).await?)
        }
        None => {
            info!("using in-memory stock ledger");
            Arc::new(InMemoryStockLedger::new())
        }
    };
    let gateway = Arc::new(HttpPaymentGateway::new(&config.gateway)?);

    Ok(AppServices {
        commerce: CommerceServices::new(ledger, gateway, PaymentSettings::from_config(config)),
        config: config.clone(),
    })
}
