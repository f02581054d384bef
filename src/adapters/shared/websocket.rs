//! Shared WebSocket connection helpers
//!
//! TLS-enabled dialing used by every venue stream.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// Type alias for the WebSocket stream with TLS
pub type TlsWebSocketStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
/// Write half of a split stream
pub type WsWriter = SplitSink<TlsWebSocketStream, Message>;
/// Read half of a split stream
pub type WsReader = SplitStream<TlsWebSocketStream>;

/// Connect to a WebSocket endpoint with TLS (TLSv1.2 minimum)
///
/// Plain `ws://` URLs are accepted as well; the connector is only used for
/// `wss://`.
pub async fn connect_tls(url: &str) -> ExchangeResult<TlsWebSocketStream> {
    let tls = native_tls::TlsConnector::builder()
        .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
        .build()
        .map_err(|e| ExchangeError::ConnectionFailed(format!("TLS error: {}", e)))?;

    let (ws_stream, _response) =
        connect_async_tls_with_config(url, None, false, Some(Connector::NativeTls(tls)))
            .await
            .map_err(|e| ExchangeError::WebSocket(Box::new(e)))?;

    Ok(ws_stream)
}

/// `connect_tls` bounded by `timeout`
pub async fn connect_with_timeout(url: &str, timeout: Duration) -> ExchangeResult<TlsWebSocketStream> {
    match tokio::time::timeout(timeout, connect_tls(url)).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::NetworkTimeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect_with_timeout(&format!("ws://{}", addr), Duration::from_secs(2)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_times_out_on_silent_server() {
        // Server accepts TCP but never answers the upgrade
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let result = connect_with_timeout(&format!("ws://{}", addr), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ExchangeError::NetworkTimeout(100))));
    }
}
