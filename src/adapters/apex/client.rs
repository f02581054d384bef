//! Apex signed REST client
//!
//! Every private request carries:
//! - `APEX-API-KEY`, `APEX-PASSPHRASE`
//! - `APEX-TIMESTAMP`: Unix ms
//! - `APEX-SIGNATURE`: hex HMAC-SHA256 over `timestamp + METHOD + path + body`,
//!   where `path` includes the query string

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::adapters::apex::types::{ApexAccount, ApexOrder, ApexOrderRequest, ApexResponse};
use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::signing::hmac_sha256_hex;
use crate::adapters::traits::VenueClient;
use crate::adapters::types::{
    create_http_client, current_time_ms, parse_decimal, AccountInfo, OrderHandle, OrderRequest,
};
use crate::core::logging::sanitize;

pub struct ApexClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    passphrase: String,
    http_client: reqwest::Client,
}

impl ApexClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        let client = Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: passphrase.into(),
            http_client: create_http_client("apex"),
        };
        info!(
            venue = "apex",
            base_url = %client.base_url,
            api_key = %sanitize(&client.api_key),
            "REST client ready"
        );
        client
    }

    fn sign(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> ExchangeResult<String> {
        let message = format!("{}{}{}{}", timestamp, method.as_str(), path, body);
        hmac_sha256_hex(&self.api_secret, &message)
    }

    /// Signed request. `reject` builds the error for a non-2xx status.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        reject: fn(String) -> ExchangeError,
    ) -> ExchangeResult<T> {
        let body = body.unwrap_or_default();
        let timestamp = current_time_ms().to_string();
        let signature = self.sign(&timestamp, &method, path, &body)?;

        let mut builder = self
            .http_client
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .header("APEX-API-KEY", &self.api_key)
            .header("APEX-SIGNATURE", signature)
            .header("APEX-TIMESTAMP", &timestamp)
            .header("APEX-PASSPHRASE", &self.passphrase);
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(reject(format!("{} {} -> HTTP {}: {}", method, path, status.as_u16(), text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid JSON: {} - {}", e, text)))
    }
}

#[async_trait]
impl VenueClient for ApexClient {
    async fn place_order(&self, order: OrderRequest) -> ExchangeResult<OrderHandle> {
        let body = serde_json::to_string(&ApexOrderRequest::from(&order))
            .map_err(|e| ExchangeError::InvalidResponse(format!("encode order: {}", e)))?;
        let resp: ApexResponse<ApexOrder> = self
            .request(Method::POST, "/api/v1/order", Some(body), ExchangeError::OrderRejected)
            .await?;
        let placed = resp
            .data
            .ok_or_else(|| ExchangeError::InvalidResponse("order response without data".into()))?;
        debug!(venue = "apex", order_id = %placed.id, status = %placed.status, "Order accepted");
        Ok(OrderHandle {
            order_id: placed.id,
            client_order_id: order.client_order_id,
            symbol: order.symbol,
            side: order.side,
        })
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        let path = format!("/api/v1/open-orders?symbol={}", symbol);
        let _: serde_json::Value = self
            .request(Method::DELETE, &path, None, ExchangeError::OrderRejected)
            .await?;
        Ok(())
    }

    async fn get_account(&self) -> ExchangeResult<AccountInfo> {
        let resp: ApexResponse<ApexAccount> = self
            .request(Method::GET, "/api/v1/account", None, ExchangeError::InvalidResponse)
            .await?;
        let account = resp
            .data
            .ok_or_else(|| ExchangeError::InvalidResponse("account response without data".into()))?;
        Ok(AccountInfo {
            total_equity: parse_decimal("equityValue", &account.equity_value)?,
            available_balance: parse_decimal("availableValue", &account.available_value)?,
        })
    }

    fn venue_name(&self) -> &'static str {
        "apex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::types::OrderSide;
    use mockito::Matcher;

    fn client(url: &str) -> ApexClient {
        ApexClient::new(url, "apex-key", "apex-secret", "apex-pass")
    }

    #[test]
    fn test_sign_covers_method_path_and_body() {
        let c = client("http://localhost");
        let a = c.sign("1", &Method::POST, "/api/v1/order", "{}").unwrap();
        let b = c.sign("1", &Method::GET, "/api/v1/order", "{}").unwrap();
        let d = c.sign("1", &Method::POST, "/api/v1/order", "").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, d);
        assert_eq!(a, hmac_sha256_hex("apex-secret", "1POST/api/v1/order{}").unwrap());
    }

    #[tokio::test]
    async fn test_get_account_sends_auth_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/account")
            .match_header("APEX-API-KEY", "apex-key")
            .match_header("APEX-PASSPHRASE", "apex-pass")
            .match_header("APEX-SIGNATURE", Matcher::Regex("^[0-9a-f]{64}$".into()))
            .match_header("APEX-TIMESTAMP", Matcher::Regex("^[0-9]{13}$".into()))
            .with_status(200)
            .with_body(r#"{"data":{"equityValue":"1500.5","availableValue":"800"}}"#)
            .create_async()
            .await;

        let account = client(&server.url()).get_account().await.unwrap();
        assert_eq!(account.total_equity, 1500.5);
        assert_eq!(account.available_balance, 800.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_place_order_posts_ioc_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/order")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "symbol": "BTC-USDC",
                "side": "BUY",
                "type": "LIMIT",
                "timeInForce": "IOC",
                "reduceOnly": false,
            })))
            .with_status(201)
            .with_body(r#"{"data":{"id":"ord-1","symbol":"BTC-USDC","status":"OPEN"}}"#)
            .create_async()
            .await;

        let order = OrderRequest::ioc_limit(
            "cid-1".into(),
            "BTC-USDC".into(),
            OrderSide::Buy,
            "99.0".into(),
            "0.010".into(),
        );
        let handle = client(&server.url()).place_order(order).await.unwrap();
        assert_eq!(handle.order_id, "ord-1");
        assert_eq!(handle.client_order_id, "cid-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_place_order_http_error_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/order")
            .with_status(400)
            .with_body(r#"{"code":3,"msg":"insufficient margin"}"#)
            .create_async()
            .await;

        let order = OrderRequest::ioc_limit(
            "cid-2".into(),
            "BTC-USDC".into(),
            OrderSide::Sell,
            "101.0".into(),
            "0.010".into(),
        );
        let err = client(&server.url()).place_order(order).await.unwrap_err();
        assert!(matches!(err, ExchangeError::OrderRejected(ref m) if m.contains("insufficient margin")));
    }

    #[tokio::test]
    async fn test_cancel_all_targets_symbol() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/v1/open-orders")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTC-USDC".into()))
            .with_status(200)
            .with_body(r#"{"data":null}"#)
            .create_async()
            .await;

        client(&server.url()).cancel_all_orders("BTC-USDC").await.unwrap();
        mock.assert_async().await;
    }
}
