//! WebSocket connection to the control backend

use futures::stream::{SplitSink, SplitStream};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tb_core::ConnectionError;

/// Type alias for the `WebSocket` stream used by the bridge
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the channel
pub(crate) type WsWriter = SplitSink<WsStream, Message>;

/// Read half of the channel
pub(crate) type WsReader = SplitStream<WsStream>;

/// Readiness of the channel as seen by the hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Connection attempt in progress
    Connecting,
    /// Frames can be exchanged
    Open,
    /// Channel is gone; the client is being torn down
    Closed,
}

/// A live `WebSocket` connection to the backend
pub(crate) struct BridgeConnection {
    writer: WsWriter,
    reader: WsReader,
}

impl BridgeConnection {
    /// Connect to the given `ws://` URL
    pub(crate) async fn connect(url: &str) -> Result<Self, ConnectionError> {
        tracing::debug!("Connecting to {}", url);
        let (ws, _response) =
            connect_async(url)
                .await
                .map_err(|e| ConnectionError::ConnectFailed {
                    address: url.to_string(),
                    reason: e.to_string(),
                })?;
        let (writer, reader) = ws.split();
        Ok(Self { writer, reader })
    }

    /// Take the split halves for use with `tokio::select!`
    pub(crate) fn into_parts(self) -> (WsWriter, WsReader) {
        (self.writer, self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("ws://127.0.0.1:{}", port);
        let result = BridgeConnection::connect(&url).await;
        match result {
            Err(ConnectionError::ConnectFailed { address, .. }) => assert_eq!(address, url),
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => panic!("Expected connection failure"),
        }
    }
}
