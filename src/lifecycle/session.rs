use crate::bus::{BusError, EventBusClient, EventTransport, OrderEventHub, SurfaceId};
use crate::bus::ws::WsTransport;
use crate::cart::{CartActor, CartClient, CartError};
use crate::checkout::CheckoutCoordinator;
use crate::config::{Config, ConfigError};
use crate::local::{InMemoryCartAuthority, InMemoryOrderAuthority, LocalEventServer};
use crate::model::{Identity, OrderId};
use crate::orders::{mount, NotificationFeed, OrderDetailView, OrderListView, SurfaceHandle};
use crate::remote::{CartAuthority, HttpAuthority, OrderAuthority, RemoteError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("Actor task failed: {0}")]
    Task(String),
}

/// The three collaborators a session talks to.
#[derive(Clone)]
pub struct Backend {
    pub carts: Arc<dyn CartAuthority>,
    pub orders: Arc<dyn OrderAuthority>,
    pub transport: Arc<dyn EventTransport>,
}

impl Backend {
    /// REST + WebSocket when `api_url` is configured, otherwise a freshly
    /// started [`LocalBackend`] (returned so it can be shut down).
    pub fn from_config(config: &Config) -> Result<(Self, Option<LocalBackend>), SessionError> {
        match (&config.api_url, &config.events_url) {
            (Some(api_url), Some(events_url)) => {
                info!(%api_url, %events_url, "Using remote backend");
                let http = Arc::new(HttpAuthority::new(api_url.clone(), config.request_timeout)?);
                let backend = Self {
                    carts: http.clone(),
                    orders: http,
                    transport: Arc::new(WsTransport::new(events_url.clone(), config.channel_buffer)),
                };
                Ok((backend, None))
            }
            (Some(_), None) => Err(ConfigError::Missing("STOREFRONT_EVENTS_URL").into()),
            (None, _) => {
                info!("Using in-process backend");
                let local = LocalBackend::start(config.channel_buffer);
                Ok((local.backend(), Some(local)))
            }
        }
    }
}

/// In-process authorities and event server, each actor in its own task.
pub struct LocalBackend {
    pub carts: InMemoryCartAuthority,
    pub orders: InMemoryOrderAuthority,
    pub events: LocalEventServer,
    handles: Vec<JoinHandle<()>>,
}

impl LocalBackend {
    pub fn start(buffer_size: usize) -> Self {
        let events = LocalEventServer::new();
        let (cart_actor, carts) = InMemoryCartAuthority::new(buffer_size);
        let (order_actor, orders) = InMemoryOrderAuthority::new(buffer_size);

        let cart_handle = tokio::spawn(cart_actor.run(()));
        // Status changes are pushed through the event server.
        let order_handle = tokio::spawn(order_actor.run(events.clone()));

        Self {
            carts,
            orders,
            events,
            handles: vec![cart_handle, order_handle],
        }
    }

    pub fn backend(&self) -> Backend {
        Backend {
            carts: Arc::new(self.carts.clone()),
            orders: Arc::new(self.orders.clone()),
            transport: Arc::new(self.events.clone()),
        }
    }

    /// Stops the authorities. Every [`Backend`] and session built from this
    /// one must be shut down first.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        drop(self.carts);
        drop(self.orders);
        join_all(self.handles).await?;
        info!("Local backend stopped");
        Ok(())
    }
}

/// Everything one signed-in customer needs: the shared cart, the event hub
/// and the checkout coordinator.
pub struct StorefrontSession {
    pub identity: Identity,
    pub cart: CartClient,
    pub bus: EventBusClient,
    pub checkout: CheckoutCoordinator,
    pub orders: Arc<dyn OrderAuthority>,
    handles: Vec<JoinHandle<()>>,
}

impl StorefrontSession {
    /// Spawns the cart actor and event hub, then loads the identity's cart.
    pub async fn start(
        backend: &Backend,
        identity: Identity,
        config: &Config,
    ) -> Result<Self, SessionError> {
        let (cart_actor, cart) = CartActor::new(backend.carts.clone(), config.channel_buffer);
        let (hub, bus) = OrderEventHub::new(backend.transport.clone());
        let handles = vec![tokio::spawn(cart_actor.run()), tokio::spawn(hub.run())];

        cart.sign_in(identity.clone()).await?;
        let checkout = CheckoutCoordinator::new(
            identity.clone(),
            cart.clone(),
            backend.orders.clone(),
            bus.clone(),
        );
        info!(%identity, "Session started");

        Ok(Self {
            identity,
            cart,
            bus,
            checkout,
            orders: backend.orders.clone(),
            handles,
        })
    }

    /// Order list fed by the bus, seeded from order history.
    pub async fn mount_order_list(&self) -> Result<SurfaceHandle<OrderListView>, SessionError> {
        let subscription = self.bus.subscribe(&self.identity, "order-list".into()).await?;
        let mut view = OrderListView::new();
        view.refresh(self.orders.as_ref(), &self.identity).await?;
        Ok(mount(view, subscription))
    }

    pub async fn mount_order_detail(
        &self,
        order_id: OrderId,
    ) -> Result<SurfaceHandle<OrderDetailView>, SessionError> {
        let surface = SurfaceId(format!("order-detail:{order_id}"));
        let subscription = self.bus.subscribe(&self.identity, surface).await?;
        let mut view = OrderDetailView::new(order_id);
        view.load(self.orders.as_ref(), &self.identity).await?;
        Ok(mount(view, subscription))
    }

    pub async fn mount_notifications(&self) -> Result<SurfaceHandle<NotificationFeed>, SessionError> {
        let subscription = self.bus.subscribe(&self.identity, "notifications".into()).await?;
        Ok(mount(NotificationFeed::new(), subscription))
    }

    /// Drops the session's clients and waits for its actors to stop.
    ///
    /// Surfaces must be unmounted first; a live subscription keeps the hub
    /// running.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        info!(identity = %self.identity, "Shutting down session...");
        drop(self.checkout);
        drop(self.cart);
        drop(self.bus);
        join_all(self.handles).await?;
        info!("Session shutdown complete.");
        Ok(())
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) -> Result<(), SessionError> {
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Actor task failed: {:?}", e);
            return Err(SessionError::Task(format!("{e:?}")));
        }
    }
    Ok(())
}
