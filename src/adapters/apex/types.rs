//! Apex wire types

use serde::{Deserialize, Serialize};

use crate::adapters::types::{OrderRequest, OrderSide, OrderType, TimeInForce};

/// `orderbook.{symbol}` push payload. Numbers arrive as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApexBookPayload {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
    #[serde(default)]
    pub ts: i64,
}

/// REST response wrapper: `{"data": ...}`
#[derive(Debug, Deserialize)]
pub struct ApexResponse<T> {
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApexAccount {
    pub equity_value: String,
    pub available_value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApexOrder {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub status: String,
}

/// `POST /api/v1/order` body
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApexOrderRequest {
    pub symbol: String,
    pub side: &'static str,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub time_in_force: &'static str,
    pub reduce_only: bool,
    pub client_order_id: String,
}

impl From<&OrderRequest> for ApexOrderRequest {
    fn from(order: &OrderRequest) -> Self {
        Self {
            symbol: order.symbol.clone(),
            side: match order.side {
                OrderSide::Buy => "BUY",
                OrderSide::Sell => "SELL",
            },
            order_type: match order.order_type {
                OrderType::Limit => "LIMIT",
                OrderType::Market => "MARKET",
            },
            size: order.quantity.clone(),
            price: order.price.clone(),
            time_in_force: match order.time_in_force {
                TimeInForce::Gtc => "GTT",
                TimeInForce::Ioc => "IOC",
                TimeInForce::Fok => "FOK",
            },
            reduce_only: order.reduce_only,
            client_order_id: order.client_order_id.clone(),
        }
    }
}
