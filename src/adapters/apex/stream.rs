//! Apex websocket dialect
//!
//! Liveness uses websocket control frames: the probe is a Ping whose payload
//! is the decimal sequence number and the venue echoes it in the Pong.

use tokio_tungstenite::tungstenite::Message;

use crate::adapters::apex::types::ApexBookPayload;
use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::stream::{parse_envelope, Inbound, StreamProtocol};
use crate::adapters::types::TopOfBook;

#[derive(Debug, Clone, Copy, Default)]
pub struct ApexProtocol;

impl StreamProtocol for ApexProtocol {
    fn venue(&self) -> &'static str {
        "apex"
    }

    fn book_topic(&self, symbol: &str) -> String {
        format!("orderbook.{}", symbol)
    }

    fn probe_frame(&self, seq: u64) -> Message {
        Message::Ping(seq.to_string().into_bytes())
    }

    fn classify(&self, frame: &Message) -> Inbound {
        match frame {
            Message::Pong(payload) => std::str::from_utf8(payload)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Inbound::Ack)
                .unwrap_or(Inbound::Ignore),
            Message::Text(text) => parse_envelope(text),
            _ => Inbound::Ignore,
        }
    }

    fn decode_book(&self, payload: &str) -> ExchangeResult<Option<TopOfBook>> {
        let book: ApexBookPayload = serde_json::from_str(payload)
            .map_err(|e| ExchangeError::InvalidResponse(format!("apex book: {}", e)))?;
        TopOfBook::from_levels(&book.bids, &book.asks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_topic() {
        assert_eq!(ApexProtocol.book_topic("BTC-USDC"), "orderbook.BTC-USDC");
    }

    #[test]
    fn test_probe_and_ack_round_trip() {
        let probe = ApexProtocol.probe_frame(17);
        let Message::Ping(payload) = probe else {
            panic!("expected ping");
        };
        assert_eq!(ApexProtocol.classify(&Message::Pong(payload)), Inbound::Ack(17));
    }

    #[test]
    fn test_pong_without_sequence_is_ignored() {
        assert_eq!(ApexProtocol.classify(&Message::Pong(Vec::new())), Inbound::Ignore);
        assert_eq!(ApexProtocol.classify(&Message::Pong(b"abc".to_vec())), Inbound::Ignore);
    }

    #[test]
    fn test_classify_book_push() {
        let text = r#"{"topic":"orderbook.BTC-USDC","data":{"symbol":"BTC-USDC","bids":[["99.5","1"]],"asks":[["100.0","2"]],"ts":1}}"#;
        match ApexProtocol.classify(&Message::Text(text.into())) {
            Inbound::Data { topic, payload } => {
                assert_eq!(topic, "orderbook.BTC-USDC");
                let book = ApexProtocol.decode_book(&payload).unwrap().unwrap();
                assert_eq!(book.best_bid, 99.5);
                assert_eq!(book.best_ask, 100.0);
                assert_eq!(book.best_ask_size, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_is_error() {
        assert!(ApexProtocol.decode_book("{not json").is_err());
        assert!(ApexProtocol.decode_book(r#"{"bids":[["x","1"]],"asks":[["1","1"]]}"#).is_err());
    }

    #[test]
    fn test_decode_one_sided_is_skipped() {
        let book = ApexProtocol
            .decode_book(r#"{"symbol":"BTC-USDC","bids":[],"asks":[["100","1"]]}"#)
            .unwrap();
        assert!(book.is_none());
    }
}
