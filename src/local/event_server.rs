//! # Local Event Server
//!
//! In-process stand-in for the push server. Each identity has one broadcast
//! channel; every open connection of that identity receives every frame
//! published to it. Frames published while nobody is connected are lost,
//! the same as the real server.

use crate::bus::{BusError, BusMessage, Connection, EventTransport};
use crate::model::{Identity, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Registry {
    channels: HashMap<UserId, broadcast::Sender<String>>,
    /// Frames sent by clients, in arrival order.
    received: Vec<String>,
}

#[derive(Clone, Default)]
pub struct LocalEventServer {
    registry: Arc<Mutex<Registry>>,
}

impl LocalEventServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pushes `message` to every open connection of `user_id`. Returns how
    /// many connections received it.
    pub fn publish(&self, user_id: &UserId, message: &BusMessage) -> usize {
        match message.encode() {
            Ok(frame) => self.publish_frame(user_id, frame),
            Err(e) => {
                warn!(error = %e, "Dropping unencodable message");
                0
            }
        }
    }

    /// Pushes a raw text frame, valid or not.
    pub fn publish_frame(&self, user_id: &UserId, frame: String) -> usize {
        let delivered = self
            .registry()
            .channels
            .get(user_id)
            .and_then(|sender| sender.send(frame).ok())
            .unwrap_or(0);
        if delivered == 0 {
            debug!(%user_id, "No open connection; frame lost");
        }
        delivered
    }

    pub fn connection_count(&self, user_id: &UserId) -> usize {
        self.registry()
            .channels
            .get(user_id)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Server-side close of every connection of `user_id`.
    pub fn drop_connections(&self, user_id: &UserId) {
        if self.registry().channels.remove(user_id).is_some() {
            info!(%user_id, "Server closed connections");
        }
    }

    pub fn received_frames(&self) -> Vec<String> {
        self.registry().received.clone()
    }
}

#[async_trait]
impl EventTransport for LocalEventServer {
    async fn connect(&self, identity: &Identity) -> Result<Connection, BusError> {
        let mut frames = self
            .registry()
            .channels
            .entry(identity.user_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        let (inbound_tx, inbound) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let registry = self.registry.clone();
        let user_id = identity.user_id.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = frames.recv() => match frame {
                        Ok(frame) => {
                            if inbound_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(%user_id, skipped, "Connection lagged; frames lost");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    frame = outbound_rx.recv() => match frame {
                        Some(frame) => registry
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .received
                            .push(frame),
                        None => break,
                    },
                }
            }
            debug!(%user_id, "Local connection closed");
        });

        Ok(Connection { inbound, outbound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::fixtures::order;

    #[tokio::test]
    async fn frames_reach_every_connection_of_the_identity() {
        let server = LocalEventServer::new();
        let identity = Identity::new("u1", "token");
        let mut first = server.connect(&identity).await.unwrap();
        let mut second = server.connect(&identity).await.unwrap();

        let message = BusMessage::OrderStatusUpdate(order("o1", "u1"));
        assert_eq!(server.publish(&identity.user_id, &message), 2);

        let frame = first.inbound.recv().await.unwrap();
        assert_eq!(BusMessage::decode(&frame).unwrap(), message);
        assert!(second.inbound.recv().await.is_some());
        assert_eq!(server.publish(&UserId::from("u2"), &message), 0);
    }

    #[tokio::test]
    async fn client_frames_are_recorded() {
        let server = LocalEventServer::new();
        let connection = server.connect(&Identity::new("u1", "token")).await.unwrap();
        connection.outbound.send("hello".into()).await.unwrap();
        drop(connection);

        for _ in 0..100 {
            if !server.received_frames().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(server.received_frames(), vec!["hello".to_string()]);
    }
}
