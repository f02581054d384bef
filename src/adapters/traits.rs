//! Venue client trait definition
//!
//! `VenueClient` is the order-submission and account-query collaborator the
//! engine depends on. Market data does not go through it; that is the
//! `StreamClient`'s job.

use async_trait::async_trait;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::types::{AccountInfo, OrderHandle, OrderRequest};

/// Common trait for the REST side of a venue
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Submit an order.
    ///
    /// # Returns
    /// The venue's acknowledgement. Acceptance of an IOC order does not imply a
    /// fill; the engine treats acceptance as the leg having happened.
    async fn place_order(&self, order: OrderRequest) -> ExchangeResult<OrderHandle>;

    /// Cancel every open order on `symbol`
    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()>;

    /// Fetch account equity and available balance
    async fn get_account(&self) -> ExchangeResult<AccountInfo>;

    /// Venue name used in logs ("apex", "bybit", ...)
    fn venue_name(&self) -> &'static str;
}
