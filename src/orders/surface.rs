//! Drives a surface from a bus subscription.
//!
//! [`mount`] spawns a task that feeds every event of a [`Subscription`] into
//! an [`OrderSurface`] and publishes the surface's new state. The task owns
//! the subscription, so unmounting (or dropping the handle) unregisters it
//! from the hub whatever the reason for teardown.

use crate::bus::{BusMessage, Subscription};
use crate::orders::{NotificationFeed, OrderDetailView, OrderListView};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A view that merges bus events into its own state.
pub trait OrderSurface: Clone + Send + Sync + 'static {
    fn on_event(&mut self, message: &BusMessage);
}

impl OrderSurface for OrderListView {
    fn on_event(&mut self, message: &BusMessage) {
        self.apply(message);
    }
}

impl OrderSurface for OrderDetailView {
    fn on_event(&mut self, message: &BusMessage) {
        self.apply(message);
    }
}

impl OrderSurface for NotificationFeed {
    fn on_event(&mut self, message: &BusMessage) {
        self.apply(message);
    }
}

pub struct SurfaceHandle<S> {
    state: watch::Receiver<S>,
    task: JoinHandle<()>,
}

pub fn mount<S: OrderSurface>(surface: S, mut subscription: Subscription) -> SurfaceHandle<S> {
    let (publish, state) = watch::channel(surface.clone());
    let name = subscription.surface().clone();
    info!(surface = %name, "Surface mounted");

    let task = tokio::spawn(async move {
        let mut surface = surface;
        while let Some(message) = subscription.recv().await {
            surface.on_event(&message);
            publish.send_replace(surface.clone());
        }
        debug!(surface = %name, "Subscription ended");
    });

    SurfaceHandle { state, task }
}

impl<S: OrderSurface> SurfaceHandle<S> {
    pub fn state(&self) -> S {
        self.state.borrow().clone()
    }

    pub fn changes(&self) -> watch::Receiver<S> {
        self.state.clone()
    }

    /// Stops the surface and waits until its subscription is released.
    pub async fn unmount(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl<S> Drop for SurfaceHandle<S> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
