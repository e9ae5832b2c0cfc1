//! # Cart Actor
//!
//! Owns the single live [`CartState`] for a session. Requests arrive from
//! [`CartClient`] handles; remote calls run in spawned tasks and report back
//! on a separate settlement channel, so the actor keeps serving requests
//! while mutations are in flight.
//!
//! Every state change is published on a `watch` channel, which is how
//! surfaces observe the cart without holding private copies.

use crate::cart::optimistic::{MutationId, OptimisticLedger, Settled};
use crate::cart::{CartClient, CartError, CartState};
use crate::model::{AddToCart, CartBucket, Identity, ItemId};
use crate::remote::{CartAuthority, RemoteError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

pub(crate) type Reply = oneshot::Sender<Result<(), CartError>>;

/// Messages accepted by the cart actor.
#[derive(Debug)]
pub(crate) enum CartRequest {
    SignIn { identity: Identity, respond_to: Reply },
    SignOut { respond_to: Reply },
    Fetch { respond_to: Reply },
    Add { request: AddToCart, respond_to: Reply },
    UpdateQuantity { item_id: ItemId, quantity: u32, respond_to: Reply },
    Remove { item_id: ItemId, respond_to: Reply },
    Clear { respond_to: Reply },
}

/// Outcomes of remote calls, fed back into the actor loop.
enum Settlement {
    Fetched {
        session: u64,
        result: Result<Vec<CartBucket>, RemoteError>,
        respond_to: Reply,
    },
    Mutated {
        id: MutationId,
        result: Result<Option<CartBucket>, RemoteError>,
        respond_to: Reply,
    },
}

pub struct CartActor {
    receiver: mpsc::Receiver<CartRequest>,
    settle_tx: mpsc::UnboundedSender<Settlement>,
    settle_rx: mpsc::UnboundedReceiver<Settlement>,
    remote: Arc<dyn CartAuthority>,
    identity: Option<Identity>,
    /// Bumped on sign-in and sign-out; fetches from an older session are dropped.
    session: u64,
    state: CartState,
    ledger: OptimisticLedger<CartState>,
    published: watch::Sender<CartState>,
}

impl CartActor {
    pub fn new(remote: Arc<dyn CartAuthority>, buffer_size: usize) -> (Self, CartClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();
        let (published, observed) = watch::channel(CartState::default());
        let actor = Self {
            receiver,
            settle_tx,
            settle_rx,
            remote,
            identity: None,
            session: 0,
            state: CartState::default(),
            ledger: OptimisticLedger::new(),
            published,
        };
        (actor, CartClient::new(sender, observed))
    }

    /// Runs until every [`CartClient`] is dropped.
    pub async fn run(mut self) {
        info!("Cart actor started");
        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                Some(settlement) = self.settle_rx.recv() => self.handle_settlement(settlement),
            }
        }
        info!(pending = self.ledger.pending_count(), "Cart actor shutdown");
    }

    fn handle_request(&mut self, request: CartRequest) {
        match request {
            CartRequest::SignIn {
                identity,
                respond_to,
            } => {
                info!(%identity, "Cart signed in");
                self.identity = Some(identity);
                self.start_session();
                self.fetch(respond_to);
            }
            CartRequest::SignOut { respond_to } => {
                info!("Cart signed out");
                self.identity = None;
                self.start_session();
                let _ = respond_to.send(Ok(()));
            }
            CartRequest::Fetch { respond_to } => self.fetch(respond_to),
            CartRequest::Add {
                request,
                respond_to,
            } => {
                if let Err(e) = validate_add(&request) {
                    let _ = respond_to.send(Err(e));
                    return;
                }
                let result = self.begin("add", respond_to, |state| state.add(&request));
                if let Some((identity, id, respond_to)) = result {
                    let remote = self.remote.clone();
                    self.spawn_remote(id, respond_to, async move {
                        remote.add(&identity, &request).await.map(Some)
                    });
                }
            }
            CartRequest::UpdateQuantity {
                item_id,
                quantity,
                respond_to,
            } => {
                if quantity < 1 {
                    let _ = respond_to.send(Err(CartError::Validation(
                        "quantity must be at least 1; remove the item instead".into(),
                    )));
                    return;
                }
                let result = self.begin("update_quantity", respond_to, |state| {
                    state.set_quantity(&item_id, quantity)
                });
                if let Some((identity, id, respond_to)) = result {
                    let remote = self.remote.clone();
                    self.spawn_remote(id, respond_to, async move {
                        remote
                            .update_quantity(&identity, &item_id, quantity)
                            .await
                            .map(|()| None)
                    });
                }
            }
            CartRequest::Remove {
                item_id,
                respond_to,
            } => {
                let result = self.begin("remove", respond_to, |state| state.remove_item(&item_id));
                if let Some((identity, id, respond_to)) = result {
                    let remote = self.remote.clone();
                    self.spawn_remote(id, respond_to, async move {
                        remote.remove(&identity, &item_id).await.map(|()| None)
                    });
                }
            }
            CartRequest::Clear { respond_to } => {
                let result = self.begin("clear", respond_to, |state| {
                    state.clear();
                    Ok(())
                });
                if let Some((identity, id, respond_to)) = result {
                    let remote = self.remote.clone();
                    self.spawn_remote(id, respond_to, async move {
                        remote.clear(&identity).await.map(|()| None)
                    });
                }
            }
        }
    }

    fn start_session(&mut self) {
        self.session += 1;
        let epoch = self.ledger.reset();
        self.state = CartState::default();
        self.publish();
        debug!(session = self.session, epoch, "Cart session reset");
    }

    /// Reads the authoritative cart. Not optimistic.
    fn fetch(&mut self, respond_to: Reply) {
        let Some(identity) = self.identity.clone() else {
            let _ = respond_to.send(Err(CartError::Unauthenticated));
            return;
        };
        let remote = self.remote.clone();
        let settle_tx = self.settle_tx.clone();
        let session = self.session;
        tokio::spawn(async move {
            let result = remote.fetch(&identity).await;
            let _ = settle_tx.send(Settlement::Fetched {
                session,
                result,
                respond_to,
            });
        });
    }

    /// Runs the optimistic step. Returns what the remote call needs, or
    /// `None` after answering the caller with the failure.
    fn begin(
        &mut self,
        label: &'static str,
        respond_to: Reply,
        change: impl FnOnce(&mut CartState) -> Result<(), CartError>,
    ) -> Option<(Identity, MutationId, Reply)> {
        let Some(identity) = self.identity.clone() else {
            let _ = respond_to.send(Err(CartError::Unauthenticated));
            return None;
        };
        match self.ledger.begin(label, &mut self.state, change) {
            Ok(id) => {
                debug!(%id, label, count = self.state.total_item_count(), "Optimistic change applied");
                self.publish();
                Some((identity, id, respond_to))
            }
            Err(e) => {
                debug!(label, error = %e, "Change rejected locally");
                let _ = respond_to.send(Err(e));
                None
            }
        }
    }

    fn spawn_remote<F>(&self, id: MutationId, respond_to: Reply, call: F)
    where
        F: std::future::Future<Output = Result<Option<CartBucket>, RemoteError>> + Send + 'static,
    {
        let settle_tx = self.settle_tx.clone();
        tokio::spawn(async move {
            let result = call.await;
            let _ = settle_tx.send(Settlement::Mutated {
                id,
                result,
                respond_to,
            });
        });
    }

    fn handle_settlement(&mut self, settlement: Settlement) {
        match settlement {
            Settlement::Fetched {
                session,
                result,
                respond_to,
            } => {
                if session != self.session {
                    debug!(session, current = self.session, "Dropping stale fetch");
                    let _ = respond_to.send(result.map(|_| ()).map_err(CartError::from));
                    return;
                }
                match result {
                    Ok(buckets) => {
                        let epoch = self.ledger.reset();
                        self.state.replace_all(buckets);
                        info!(epoch, count = self.state.total_item_count(), "Cart loaded");
                        self.publish();
                        let _ = respond_to.send(Ok(()));
                    }
                    Err(e) => {
                        warn!(error = %e, "Cart fetch failed");
                        let _ = respond_to.send(Err(e.into()));
                    }
                }
            }
            Settlement::Mutated {
                id,
                result,
                respond_to,
            } => {
                match self.ledger.settle(id, &mut self.state, result.is_ok()) {
                    Settled::Committed => {
                        if let Ok(Some(bucket)) = &result {
                            if self.ledger.pending_count() == 0 {
                                self.state.replace_bucket(bucket.clone());
                            }
                        }
                        debug!(%id, count = self.state.total_item_count(), "Mutation committed");
                    }
                    Settled::RolledBack => {
                        if let Err(e) = &result {
                            warn!(%id, error = %e, count = self.state.total_item_count(), "Mutation rolled back");
                        }
                    }
                    Settled::Stale => debug!(%id, "Settlement for a reset session ignored"),
                }
                self.publish();
                let _ = respond_to.send(result.map(|_| ()).map_err(CartError::from));
            }
        }
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }
}

fn validate_add(request: &AddToCart) -> Result<(), CartError> {
    if request.items.is_empty() {
        return Err(CartError::Validation("no items to add".into()));
    }
    if let Some(item) = request.items.iter().find(|item| item.quantity < 1) {
        return Err(CartError::Validation(format!(
            "quantity for {} must be at least 1",
            item.item_id
        )));
    }
    Ok(())
}
