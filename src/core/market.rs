//! Latest-wins market state fed by the venue streams
//!
//! Each price field is its own atomic cell with a single writer (the venue's
//! read task) and any number of readers. There is no sequencing across
//! fields: a reader can observe a bid from one update and an ask from the
//! next, which is acceptable for a top-of-book arbitrage check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::adapters::types::TopOfBook;

/// f64 stored as raw bits in an `AtomicU64`
#[derive(Debug, Default)]
pub struct PriceCell(AtomicU64);

impl PriceCell {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Best bid/ask for one venue. Zero means "not seen yet".
#[derive(Debug, Default)]
pub struct VenueQuote {
    best_bid: PriceCell,
    best_bid_size: PriceCell,
    best_ask: PriceCell,
    best_ask_size: PriceCell,
}

impl VenueQuote {
    /// Overwrite with the latest book; no merging
    pub fn store(&self, book: TopOfBook) {
        self.best_bid.store(book.best_bid);
        self.best_bid_size.store(book.best_bid_size);
        self.best_ask.store(book.best_ask);
        self.best_ask_size.store(book.best_ask_size);
    }

    pub fn load(&self) -> TopOfBook {
        TopOfBook {
            best_bid: self.best_bid.load(),
            best_bid_size: self.best_bid_size.load(),
            best_ask: self.best_ask.load(),
            best_ask_size: self.best_ask_size.load(),
        }
    }

    /// Both prices have been observed
    pub fn is_ready(&self) -> bool {
        self.load().is_tradable()
    }
}

/// Both venues' quotes, shared between the stream handlers and the engine
#[derive(Debug, Default, Clone)]
pub struct MarketView {
    pub home: Arc<VenueQuote>,
    pub hedge: Arc<VenueQuote>,
}

impl MarketView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.home.is_ready() && self.hedge.is_ready()
    }

    /// Read both snapshots together (the tick's only synchronisation point)
    pub fn snapshot(&self) -> (TopOfBook, TopOfBook) {
        (self.home.load(), self.hedge.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(bid: f64, ask: f64) -> TopOfBook {
        TopOfBook {
            best_bid: bid,
            best_bid_size: 1.0,
            best_ask: ask,
            best_ask_size: 2.0,
        }
    }

    #[test]
    fn test_price_cell_round_trip() {
        let cell = PriceCell::new(0.0);
        assert_eq!(cell.load(), 0.0);
        cell.store(101.25);
        assert_eq!(cell.load(), 101.25);
    }

    #[test]
    fn test_quote_latest_wins() {
        let quote = VenueQuote::default();
        assert!(!quote.is_ready());
        quote.store(book(99.0, 100.0));
        quote.store(book(98.0, 99.5));
        assert_eq!(quote.load(), book(98.0, 99.5));
        assert!(quote.is_ready());
    }

    #[test]
    fn test_market_ready_needs_both_sides() {
        let market = MarketView::new();
        market.home.store(book(99.0, 100.0));
        assert!(!market.is_ready());
        market.hedge.store(book(0.0, 100.0));
        assert!(!market.is_ready());
        market.hedge.store(book(100.5, 100.6));
        assert!(market.is_ready());
    }

    #[test]
    fn test_clones_share_cells() {
        let market = MarketView::new();
        let writer = market.clone();
        writer.hedge.store(book(1.0, 2.0));
        assert_eq!(market.snapshot().1.best_ask, 2.0);
    }
}
