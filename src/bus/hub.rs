//! # Order Event Hub
//!
//! One actor per session multiplexes a single transport connection across
//! every mounted surface:
//!
//! - The connection is opened by the first subscriber and closed when the last
//!   one leaves (reference count = registered surfaces).
//! - Surfaces are keyed by [`SurfaceId`]. Subscribing again with the same id
//!   replaces the previous registration, so re-renders never accumulate
//!   duplicate handlers.
//! - Frames are delivered to every surface in arrival order. Frames that do
//!   not decode are logged and skipped.
//! - Subscribing with a different identity closes the old connection and
//!   drops the old identity's subscribers.
//!
//! Requests travel over an unbounded channel so that [`Subscription`]'s
//! `Drop` can unregister without awaiting.

use crate::bus::{BusError, BusMessage, Connection, EventTransport};
use crate::model::Identity;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Stable name of a UI surface ("navbar", "order-detail:o1", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub String);

impl From<&str> for SurfaceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time view of the hub, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubStatus {
    pub connected: bool,
    pub subscribers: usize,
    pub connections_opened: u64,
}

#[derive(Debug)]
enum HubRequest {
    Subscribe {
        identity: Identity,
        surface: SurfaceId,
        handler: mpsc::UnboundedSender<BusMessage>,
        respond_to: oneshot::Sender<Result<u64, BusError>>,
    },
    Unsubscribe {
        surface: SurfaceId,
        token: u64,
    },
    Publish {
        message: BusMessage,
        respond_to: oneshot::Sender<Result<(), BusError>>,
    },
    Reconnect {
        respond_to: oneshot::Sender<Result<(), BusError>>,
    },
    Status {
        respond_to: oneshot::Sender<HubStatus>,
    },
}

struct Registration {
    token: u64,
    handler: mpsc::UnboundedSender<BusMessage>,
}

pub struct OrderEventHub {
    receiver: mpsc::UnboundedReceiver<HubRequest>,
    transport: Arc<dyn EventTransport>,
    identity: Option<Identity>,
    connection: Option<Connection>,
    surfaces: HashMap<SurfaceId, Registration>,
    next_token: u64,
    connections_opened: u64,
}

impl OrderEventHub {
    pub fn new(transport: Arc<dyn EventTransport>) -> (Self, EventBusClient) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let hub = Self {
            receiver,
            transport,
            identity: None,
            connection: None,
            surfaces: HashMap::new(),
            next_token: 1,
            connections_opened: 0,
        };
        (hub, EventBusClient { sender })
    }

    /// Runs until every [`EventBusClient`] and [`Subscription`] is dropped.
    pub async fn run(mut self) {
        info!("Event hub started");
        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                frame = next_frame(&mut self.connection) => match frame {
                    Some(frame) => self.dispatch(&frame),
                    None => {
                        warn!(subscribers = self.surfaces.len(), "Event connection lost");
                        self.connection = None;
                    }
                },
            }
        }
        self.connection = None;
        info!("Event hub shutdown");
    }

    async fn handle_request(&mut self, request: HubRequest) {
        match request {
            HubRequest::Subscribe {
                identity,
                surface,
                handler,
                respond_to,
            } => {
                let result = self.subscribe(identity, surface, handler).await;
                let _ = respond_to.send(result);
            }
            HubRequest::Unsubscribe { surface, token } => {
                let current = self.surfaces.get(&surface).map(|r| r.token);
                if current != Some(token) {
                    debug!(%surface, token, "Ignoring unsubscribe of a replaced registration");
                    return;
                }
                self.surfaces.remove(&surface);
                info!(%surface, subscribers = self.surfaces.len(), "Surface unsubscribed");
                if self.surfaces.is_empty() && self.connection.take().is_some() {
                    info!("Last subscriber left; connection closed");
                }
            }
            HubRequest::Publish {
                message,
                respond_to,
            } => {
                let result = self.publish(&message).await;
                let _ = respond_to.send(result);
            }
            HubRequest::Reconnect { respond_to } => {
                let result = match self.identity.clone() {
                    Some(identity) if !self.surfaces.is_empty() => {
                        self.connection = None;
                        self.open(&identity).await
                    }
                    _ => Err(BusError::Disconnected),
                };
                let _ = respond_to.send(result);
            }
            HubRequest::Status { respond_to } => {
                let _ = respond_to.send(HubStatus {
                    connected: self.connection.is_some(),
                    subscribers: self.surfaces.len(),
                    connections_opened: self.connections_opened,
                });
            }
        }
    }

    async fn subscribe(
        &mut self,
        identity: Identity,
        surface: SurfaceId,
        handler: mpsc::UnboundedSender<BusMessage>,
    ) -> Result<u64, BusError> {
        if self.identity.as_ref() != Some(&identity) {
            if !self.surfaces.is_empty() {
                warn!(
                    dropped = self.surfaces.len(),
                    "Identity changed; dropping previous subscribers"
                );
            }
            self.surfaces.clear();
            self.connection = None;
            self.identity = Some(identity.clone());
        }

        if self.connection.is_none() {
            self.open(&identity).await?;
        }

        let token = self.next_token;
        self.next_token += 1;
        let replaced = self
            .surfaces
            .insert(surface.clone(), Registration { token, handler })
            .is_some();
        info!(%surface, replaced, subscribers = self.surfaces.len(), "Surface subscribed");
        Ok(token)
    }

    async fn open(&mut self, identity: &Identity) -> Result<(), BusError> {
        match self.transport.connect(identity).await {
            Ok(connection) => {
                self.connections_opened += 1;
                self.connection = Some(connection);
                info!(%identity, "Event connection opened");
                Ok(())
            }
            Err(e) => {
                warn!(%identity, error = %e, "Event connection failed");
                Err(e)
            }
        }
    }

    async fn publish(&mut self, message: &BusMessage) -> Result<(), BusError> {
        let Some(connection) = &self.connection else {
            return Err(BusError::Disconnected);
        };
        let frame = message.encode()?;
        if connection.outbound.send(frame).await.is_err() {
            warn!("Publish on a closed connection");
            self.connection = None;
            return Err(BusError::Disconnected);
        }
        debug!(event = message.event_name(), order_id = %message.order().id, "Published");
        Ok(())
    }

    fn dispatch(&mut self, frame: &str) {
        let message = match BusMessage::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable frame");
                return;
            }
        };
        debug!(
            event = message.event_name(),
            order_id = %message.order().id,
            status = ?message.order().status,
            subscribers = self.surfaces.len(),
            "Dispatching"
        );
        for (surface, registration) in &self.surfaces {
            if registration.handler.send(message.clone()).is_err() {
                debug!(%surface, "Subscriber gone before unsubscribe");
            }
        }
    }
}

/// Next inbound frame, or pending forever while disconnected.
async fn next_frame(connection: &mut Option<Connection>) -> Option<String> {
    match connection {
        Some(connection) => connection.inbound.recv().await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to the [`OrderEventHub`].
#[derive(Clone)]
pub struct EventBusClient {
    sender: mpsc::UnboundedSender<HubRequest>,
}

impl EventBusClient {
    /// Registers `surface` for status events of `identity`, opening the
    /// shared connection if needed.
    #[instrument(skip(self), fields(identity = %identity, surface = %surface))]
    pub async fn subscribe(
        &self,
        identity: &Identity,
        surface: SurfaceId,
    ) -> Result<Subscription, BusError> {
        let (handler, events) = mpsc::unbounded_channel();
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(HubRequest::Subscribe {
                identity: identity.clone(),
                surface: surface.clone(),
                handler,
                respond_to,
            })
            .map_err(|_| BusError::HubClosed)?;
        let token = response.await.map_err(|_| BusError::HubClosed)??;
        Ok(Subscription {
            surface,
            token,
            events,
            hub: self.sender.clone(),
        })
    }

    /// Sends a message to the server over the live connection.
    pub async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(HubRequest::Publish {
                message,
                respond_to,
            })
            .map_err(|_| BusError::HubClosed)?;
        response.await.map_err(|_| BusError::HubClosed)?
    }

    /// Re-opens the connection for the current subscribers. Events sent while
    /// disconnected are not replayed.
    #[instrument(skip(self))]
    pub async fn reconnect(&self) -> Result<(), BusError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(HubRequest::Reconnect { respond_to })
            .map_err(|_| BusError::HubClosed)?;
        response.await.map_err(|_| BusError::HubClosed)?
    }

    pub async fn status(&self) -> Result<HubStatus, BusError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(HubRequest::Status { respond_to })
            .map_err(|_| BusError::HubClosed)?;
        response.await.map_err(|_| BusError::HubClosed)
    }
}

/// A surface's registration. Dropping it unregisters the surface.
#[derive(Debug)]
pub struct Subscription {
    surface: SurfaceId,
    token: u64,
    events: mpsc::UnboundedReceiver<BusMessage>,
    hub: mpsc::UnboundedSender<HubRequest>,
}

impl Subscription {
    pub fn surface(&self) -> &SurfaceId {
        &self.surface
    }

    /// Next event for this surface. `None` once the registration was
    /// replaced or the hub shut down.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.events.recv().await
    }

    /// Explicit teardown; equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.hub.send(HubRequest::Unsubscribe {
            surface: self.surface.clone(),
            token: self.token,
        });
    }
}
