//! Bybit V5 signed REST client
//!
//! Signature: hex HMAC-SHA256 over `timestamp + apiKey + recvWindow + payload`,
//! where payload is the query string for GET and the JSON body for POST.
//! A response is only successful when the HTTP status is 2xx and `retCode == 0`.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use tracing::{debug, info};

use crate::adapters::bybit::types::{
    BybitCancelAll, BybitOrderCreate, BybitOrderResult, BybitResponse, BybitWalletResult,
};
use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::signing::hmac_sha256_hex;
use crate::adapters::traits::VenueClient;
use crate::adapters::types::{
    create_http_client, current_time_ms, parse_decimal, AccountInfo, OrderHandle, OrderRequest,
};
use crate::core::logging::sanitize;

/// `X-BAPI-RECV-WINDOW` in milliseconds
pub const RECV_WINDOW_MS: u64 = 5000;

/// String the V5 signature is computed over
pub fn signature_payload(timestamp: &str, api_key: &str, recv_window: u64, payload: &str) -> String {
    format!("{}{}{}{}", timestamp, api_key, recv_window, payload)
}

pub struct BybitClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    http_client: reqwest::Client,
}

impl BybitClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let client = Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            http_client: create_http_client("bybit"),
        };
        info!(
            venue = "bybit",
            base_url = %client.base_url,
            api_key = %sanitize(&client.api_key),
            "REST client ready"
        );
        client
    }

    fn sign(&self, timestamp: &str, payload: &str) -> ExchangeResult<String> {
        hmac_sha256_hex(
            &self.api_secret,
            &signature_payload(timestamp, &self.api_key, RECV_WINDOW_MS, payload),
        )
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &str) -> ExchangeResult<T> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        self.send(Method::GET, url, query, None, ExchangeError::InvalidResponse)
            .await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: String) -> ExchangeResult<T> {
        let url = format!("{}{}", self.base_url, path);
        self.send(Method::POST, url, &body, Some(body.clone()), ExchangeError::OrderRejected)
            .await
    }

    /// Signed request; `reject` builds the error for HTTP or `retCode` failures
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        signed_payload: &str,
        body: Option<String>,
        reject: fn(String) -> ExchangeError,
    ) -> ExchangeResult<T> {
        let timestamp = current_time_ms().to_string();
        let signature = self.sign(&timestamp, signed_payload)?;

        let mut builder = self
            .http_client
            .request(method.clone(), &url)
            .header("Content-Type", "application/json")
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW_MS.to_string());
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(reject(format!("{} {} -> HTTP {}: {}", method, url, status.as_u16(), text)));
        }

        // Rejections carry `"result":{}`, so `retCode` is checked before `result` is decoded
        let parsed: BybitResponse<Box<RawValue>> = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid JSON: {} - {}", e, text)))?;
        if parsed.ret_code != 0 {
            return Err(reject(format!("retCode={}: {}", parsed.ret_code, parsed.ret_msg)));
        }
        let result = parsed
            .result
            .ok_or_else(|| ExchangeError::InvalidResponse("response without result".into()))?;
        serde_json::from_str(result.get())
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid result: {} - {}", e, result.get())))
    }
}

#[async_trait]
impl VenueClient for BybitClient {
    async fn place_order(&self, order: OrderRequest) -> ExchangeResult<OrderHandle> {
        let body = serde_json::to_string(&BybitOrderCreate::from(&order))
            .map_err(|e| ExchangeError::InvalidResponse(format!("encode order: {}", e)))?;
        let placed: BybitOrderResult = self.post("/v5/order/create", body).await?;
        debug!(venue = "bybit", order_id = %placed.order_id, link_id = %placed.order_link_id, "Order accepted");
        Ok(OrderHandle {
            order_id: placed.order_id,
            client_order_id: order.client_order_id,
            symbol: order.symbol,
            side: order.side,
        })
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        let body = serde_json::to_string(&BybitCancelAll {
            category: "linear",
            symbol,
        })
        .map_err(|e| ExchangeError::InvalidResponse(format!("encode cancel: {}", e)))?;
        let _: serde_json::Value = self.post("/v5/order/cancel-all", body).await?;
        Ok(())
    }

    async fn get_account(&self) -> ExchangeResult<AccountInfo> {
        let wallet: BybitWalletResult = self
            .get("/v5/account/wallet-balance", "accountType=UNIFIED")
            .await?;
        let account = wallet
            .list
            .first()
            .ok_or_else(|| ExchangeError::InvalidResponse("empty wallet list".into()))?;
        Ok(AccountInfo {
            total_equity: parse_decimal("totalEquity", &account.total_equity)?,
            available_balance: parse_decimal("totalAvailableBalance", &account.total_available_balance)?,
        })
    }

    fn venue_name(&self) -> &'static str {
        "bybit"
    }
}
