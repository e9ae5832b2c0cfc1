//! WebSocket transport for the order event bus.
//!
//! Each connection is pumped by one task: inbound text frames are forwarded
//! to [`Connection::inbound`], frames queued on [`Connection::outbound`] are
//! written to the socket. The task ends, closing both sides, when either the
//! socket closes or the hub drops `outbound`.

use crate::bus::{BusError, Connection, EventTransport};
use crate::model::Identity;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    buffer_size: usize,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, buffer_size: usize) -> Self {
        Self {
            url: url.into(),
            buffer_size,
        }
    }

    fn endpoint(&self, identity: &Identity) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}userId={}", self.url, separator, identity.user_id)
    }
}

#[async_trait]
impl EventTransport for WsTransport {
    async fn connect(&self, identity: &Identity) -> Result<Connection, BusError> {
        let mut request = self
            .endpoint(identity)
            .into_client_request()
            .map_err(|e| BusError::Connect(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", identity.token))
            .map_err(|e| BusError::Connect(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        info!(%identity, "WebSocket connected");

        let (inbound_tx, inbound) = mpsc::channel(self.buffer_size);
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(self.buffer_size);
        let (mut sink, mut stream) = socket.split();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if inbound_tx.send(text.to_string()).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(other)) => debug!(?other, "Ignoring non-text frame"),
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket read failed");
                            break;
                        }
                    },
                    frame = outbound_rx.recv() => match frame {
                        Some(frame) => {
                            if let Err(e) = sink.send(Message::text(frame)).await {
                                warn!(error = %e, "WebSocket write failed");
                                break;
                            }
                        }
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    },
                }
            }
            debug!("WebSocket pump stopped");
        });

        Ok(Connection { inbound, outbound })
    }
}
