//! Bybit V5 public websocket dialect
//!
//! Liveness is application level: `{"op":"ping","req_id":"<seq>"}` is answered
//! with `{"op":"ping","ret_msg":"pong","req_id":"<seq>",...}`.

use tokio_tungstenite::tungstenite::Message;

use crate::adapters::bybit::types::{BybitBookPayload, BybitFrame};
use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::stream::{Inbound, StreamProtocol};
use crate::adapters::types::TopOfBook;

#[derive(Debug, Clone, Copy, Default)]
pub struct BybitProtocol;

impl StreamProtocol for BybitProtocol {
    fn venue(&self) -> &'static str {
        "bybit"
    }

    fn book_topic(&self, symbol: &str) -> String {
        format!("orderbook.1.{}", symbol)
    }

    fn probe_frame(&self, seq: u64) -> Message {
        Message::Text(serde_json::json!({ "op": "ping", "req_id": seq.to_string() }).to_string())
    }

    fn classify(&self, frame: &Message) -> Inbound {
        let Message::Text(text) = frame else {
            return Inbound::Ignore;
        };
        let Ok(parsed) = serde_json::from_str::<BybitFrame>(text) else {
            return Inbound::Ignore;
        };

        let is_pong = parsed.op.as_deref() == Some("ping") || parsed.ret_msg.as_deref() == Some("pong");
        if is_pong {
            return parsed
                .req_id
                .and_then(|id| id.parse::<u64>().ok())
                .map(Inbound::Ack)
                .unwrap_or(Inbound::Ignore);
        }

        match (parsed.topic, parsed.data) {
            (Some(topic), Some(data)) if !topic.is_empty() => Inbound::Data {
                topic,
                payload: data.get().to_string(),
            },
            _ => Inbound::Ignore,
        }
    }

    fn decode_book(&self, payload: &str) -> ExchangeResult<Option<TopOfBook>> {
        let book: BybitBookPayload = serde_json::from_str(payload)
            .map_err(|e| ExchangeError::InvalidResponse(format!("bybit book: {}", e)))?;
        TopOfBook::from_levels(&book.b, &book.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Message {
        Message::Text(s.to_string())
    }

    #[test]
    fn test_book_topic() {
        assert_eq!(BybitProtocol.book_topic("BTCUSDT"), "orderbook.1.BTCUSDT");
    }

    #[test]
    fn test_probe_frame_shape() {
        let Message::Text(raw) = BybitProtocol.probe_frame(5) else {
            panic!("expected text probe");
        };
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["op"], "ping");
        assert_eq!(json["req_id"], "5");
    }

    #[test]
    fn test_pong_reply_is_ack() {
        let reply = r#"{"success":true,"ret_msg":"pong","conn_id":"abc","req_id":"5","op":"ping"}"#;
        assert_eq!(BybitProtocol.classify(&text(reply)), Inbound::Ack(5));
    }

    #[test]
    fn test_pong_without_req_id_is_ignored() {
        let reply = r#"{"success":true,"ret_msg":"pong","op":"ping"}"#;
        assert_eq!(BybitProtocol.classify(&text(reply)), Inbound::Ignore);
    }

    #[test]
    fn test_subscribe_reply_is_ignored() {
        let reply = r#"{"success":true,"ret_msg":"","conn_id":"abc","op":"subscribe"}"#;
        assert_eq!(BybitProtocol.classify(&text(reply)), Inbound::Ignore);
    }

    #[test]
    fn test_book_push_decodes() {
        let push = r#"{"topic":"orderbook.1.BTCUSDT","type":"snapshot","ts":1,"data":{"s":"BTCUSDT","b":[["100.5","3"]],"a":[["100.6","4"]],"u":1,"seq":2}}"#;
        match BybitProtocol.classify(&text(push)) {
            Inbound::Data { topic, payload } => {
                assert_eq!(topic, "orderbook.1.BTCUSDT");
                let book = BybitProtocol.decode_book(&payload).unwrap().unwrap();
                assert_eq!(book.best_bid, 100.5);
                assert_eq!(book.best_bid_size, 3.0);
                assert_eq!(book.best_ask, 100.6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_delta_with_empty_side_is_skipped() {
        let book = BybitProtocol
            .decode_book(r#"{"s":"BTCUSDT","b":[],"a":[["100.6","4"]]}"#)
            .unwrap();
        assert!(book.is_none());
    }

    #[test]
    fn test_binary_and_control_frames_ignored() {
        assert_eq!(BybitProtocol.classify(&Message::Binary(vec![1, 2])), Inbound::Ignore);
        assert_eq!(BybitProtocol.classify(&Message::Pong(b"1".to_vec())), Inbound::Ignore);
    }
}
