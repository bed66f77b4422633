//! Form-encoded REST client for the hosted payment page provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::config::GatewayConfig;

use super::{GatewayError, GatewaySession, PaymentGateway, SessionRequest, format_amount};

const SESSION_PATH: &str = "/gwprocess/v4/api.php";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    status: String,
    #[serde(rename = "GatewayPageURL", default)]
    gateway_page_url: Option<String>,
    #[serde(default)]
    failedreason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    session_url: String,
    store_id: String,
    store_password: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            session_url: format!("{}{}", config.base_url, SESSION_PATH),
            store_id: config.store_id.clone(),
            store_password: config.store_password.clone(),
        })
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_connect() || err.is_builder() {
        GatewayError::Unreachable(err.to_string())
    } else {
        GatewayError::Indeterminate(err.to_string())
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(tran_id = %request.tran_id), err)]
    async fn init_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        let form = [
            ("store_id", self.store_id.clone()),
            ("store_passwd", self.store_password.clone()),
            ("total_amount", format_amount(request.total_amount)),
            ("currency", request.currency.clone()),
            ("tran_id", request.tran_id.clone()),
            ("success_url", request.success_url.clone()),
            ("fail_url", request.fail_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("ipn_url", request.ipn_url.clone()),
            ("value_a", request.value_a.clone()),
            ("value_b", request.value_b.clone()),
            ("value_c", request.value_c.clone()),
            ("value_d", request.value_d.clone()),
        ];

        let resp = self
            .client
            .post(&self.session_url)
            .form(&form)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "gateway refused session init");
            return Err(GatewayError::Rejected(format!("HTTP {status}")));
        }

        let body = resp.text().await.map_err(classify)?;
        let parsed: SessionResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Rejected(format!("unexpected response shape: {e}")))?;

        match parsed {
            SessionResponse {
                status,
                gateway_page_url: Some(url),
                ..
            } if status.eq_ignore_ascii_case("SUCCESS") && !url.is_empty() => {
                info!("payment session opened");
                Ok(GatewaySession { redirect_url: url })
            }
            SessionResponse {
                status,
                failedreason,
                ..
            } => Err(GatewayError::Rejected(format!(
                "status {status}: {}",
                failedreason.unwrap_or_else(|| "no reason given".to_string())
            ))),
        }
    }
}
