//! Bybit V5 wire types

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::adapters::types::{OrderRequest, OrderSide, OrderType, TimeInForce};

/// Any text frame on the public stream: topic pushes, op replies and pongs
#[derive(Debug, Deserialize)]
pub struct BybitFrame {
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub ret_msg: Option<String>,
    #[serde(default)]
    pub req_id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

/// `orderbook.1.{symbol}` data segment
#[derive(Debug, Clone, Deserialize)]
pub struct BybitBookPayload {
    #[serde(default)]
    pub s: String,
    #[serde(default)]
    pub b: Vec<Vec<String>>,
    #[serde(default)]
    pub a: Vec<Vec<String>>,
}

/// REST response wrapper
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitResponse<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    pub result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitOrderResult {
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BybitWalletResult {
    #[serde(default)]
    pub list: Vec<BybitWallet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitWallet {
    pub total_equity: String,
    pub total_available_balance: String,
}

/// `POST /v5/order/create` body
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BybitOrderCreate {
    pub category: &'static str,
    pub symbol: String,
    pub side: &'static str,
    pub order_type: &'static str,
    pub qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub time_in_force: &'static str,
    pub reduce_only: bool,
    pub order_link_id: String,
}

impl From<&OrderRequest> for BybitOrderCreate {
    fn from(order: &OrderRequest) -> Self {
        Self {
            category: "linear",
            symbol: order.symbol.clone(),
            side: match order.side {
                OrderSide::Buy => "Buy",
                OrderSide::Sell => "Sell",
            },
            order_type: match order.order_type {
                OrderType::Limit => "Limit",
                OrderType::Market => "Market",
            },
            qty: order.quantity.clone(),
            price: order.price.clone(),
            time_in_force: match order.time_in_force {
                TimeInForce::Gtc => "GTC",
                TimeInForce::Ioc => "IOC",
                TimeInForce::Fok => "FOK",
            },
            reduce_only: order.reduce_only,
            order_link_id: order.client_order_id.clone(),
        }
    }
}

/// `POST /v5/order/cancel-all` body
#[derive(Debug, Clone, Serialize)]
pub struct BybitCancelAll<'a> {
    pub category: &'static str,
    pub symbol: &'a str,
}
