use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::IntegrationsConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    /// Our reference, echoed back by the gateway
    pub receipt: String,
}

/// An order created at the gateway, handed to the client to complete checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

/// Payment gateway collaborator: create an order, later ask for its status.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: OrderRequest) -> Result<PaymentOrder, ApiError>;

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, ApiError>;
}

/// Gateway with an orders REST API authenticated by HTTP basic auth.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Deserialize)]
struct OrderBody {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    status: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        HttpPaymentGateway {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    async fn read_order(&self, res: reqwest::Response) -> Result<OrderBody, ApiError> {
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ApiError::Upstream(format!("Payment gateway read failed: {}", e)))?;
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), payload = %text, "payment gateway rejected request");
            return Err(ApiError::Upstream(format!(
                "Payment gateway returned {}",
                status
            )));
        }
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(payload = %text, "unexpected payment gateway response");
            ApiError::Upstream(format!("Invalid payment gateway response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_order(&self, request: OrderRequest) -> Result<PaymentOrder, ApiError> {
        let res = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Payment gateway unreachable: {}", e)))?;
        let body = self.read_order(res).await?;
        tracing::info!(order_id = %body.id, amount = body.amount, "payment order created");
        Ok(PaymentOrder {
            id: body.id,
            amount: body.amount,
            currency: body.currency,
        })
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, ApiError> {
        let res = self
            .client
            .get(format!("{}/orders/{}", self.base_url, order_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Payment gateway unreachable: {}", e)))?;
        let body = self.read_order(res).await?;
        Ok(parse_status(&body.status))
    }
}

fn parse_status(status: &str) -> OrderStatus {
    match status {
        "paid" | "captured" => OrderStatus::Paid,
        "created" | "attempted" | "authorized" => OrderStatus::Pending,
        _ => OrderStatus::Failed,
    }
}

/// Used when no gateway credentials are configured; paid enrollment fails
/// with an upstream error while free enrollment keeps working.
pub struct UnconfiguredPaymentGateway;

#[async_trait::async_trait]
impl PaymentGateway for UnconfiguredPaymentGateway {
    async fn create_order(&self, _request: OrderRequest) -> Result<PaymentOrder, ApiError> {
        Err(ApiError::Upstream(
            "Payment gateway is not configured".to_string(),
        ))
    }

    async fn order_status(&self, _order_id: &str) -> Result<OrderStatus, ApiError> {
        Err(ApiError::Upstream(
            "Payment gateway is not configured".to_string(),
        ))
    }
}

pub fn from_config(config: &IntegrationsConfig) -> Arc<dyn PaymentGateway> {
    match (
        &config.payment_api_url,
        &config.payment_key_id,
        &config.payment_key_secret,
    ) {
        (Some(url), Some(id), Some(secret)) => {
            Arc::new(HttpPaymentGateway::new(url, id, secret))
        }
        _ => {
            tracing::warn!("payment gateway not configured; paid enrollments are disabled");
            Arc::new(UnconfiguredPaymentGateway)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_statuses() {
        assert_eq!(parse_status("paid"), OrderStatus::Paid);
        assert_eq!(parse_status("attempted"), OrderStatus::Pending);
        assert_eq!(parse_status("cancelled"), OrderStatus::Failed);
    }
}
