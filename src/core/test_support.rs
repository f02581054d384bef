//! In-memory `VenueClient` for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::VenueClient;
use crate::adapters::types::{AccountInfo, OrderHandle, OrderRequest};

pub(crate) struct MockVenue {
    name: &'static str,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub cancels: AtomicUsize,
    reject_orders: AtomicBool,
    /// `None` makes `get_account` fail
    available: Mutex<Option<f64>>,
}

impl MockVenue {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            orders: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            reject_orders: AtomicBool::new(false),
            available: Mutex::new(Some(10_000.0)),
        }
    }

    pub fn rejecting(name: &'static str) -> Self {
        let venue = Self::new(name);
        venue.set_rejecting(true);
        venue
    }

    pub fn set_rejecting(&self, reject: bool) {
        self.reject_orders.store(reject, Ordering::SeqCst);
    }

    pub fn set_available(&self, available: Option<f64>) {
        *self.available.lock().unwrap() = available;
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl VenueClient for MockVenue {
    async fn place_order(&self, order: OrderRequest) -> ExchangeResult<OrderHandle> {
        self.orders.lock().unwrap().push(order.clone());
        if self.reject_orders.load(Ordering::SeqCst) {
            return Err(ExchangeError::OrderRejected(format!("{} rejected", self.name)));
        }
        Ok(OrderHandle {
            order_id: format!("{}-{}", self.name, order.client_order_id),
            client_order_id: order.client_order_id,
            symbol: order.symbol,
            side: order.side,
        })
    }

    async fn cancel_all_orders(&self, _symbol: &str) -> ExchangeResult<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_account(&self) -> ExchangeResult<AccountInfo> {
        match *self.available.lock().unwrap() {
            Some(available) => Ok(AccountInfo {
                total_equity: available,
                available_balance: available,
            }),
            None => Err(ExchangeError::InvalidResponse("account unavailable".into())),
        }
    }

    fn venue_name(&self) -> &'static str {
        self.name
    }
}
