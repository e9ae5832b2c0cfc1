//! # Scripted Authorities
//!
//! [`MockCartAuthority`] and [`MockOrderAuthority`] answer calls from a queue
//! of expectations, one queue shared by all methods but matched per method
//! (the first queued expectation for the called method is consumed). Every
//! call is recorded so tests can assert what reached the "server".
//!
//! `hold()` parks the reply until the test resolves it, which is how tests
//! interleave two in-flight cart mutations:
//!
//! ```ignore
//! let remote = MockCartAuthority::new();
//! remote.expect_fetch().return_ok(vec![]);
//! let first = remote.expect_update_quantity().hold();
//! remote.expect_remove().return_err(RemoteError::Transport("down".into()));
//! // ... issue both mutations, then:
//! first.succeed(());
//! remote.verify();
//! ```

use crate::model::{
    AddToCart, CartBucket, Identity, ItemId, Order, OrderId, PlaceOrderRequest, StatusChange,
};
use crate::remote::{CartAuthority, OrderAuthority, RemoteError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// A scripted reply: available immediately or parked until the test releases it.
pub enum Reply<R> {
    Ready(Result<R, RemoteError>),
    Held(oneshot::Receiver<Result<R, RemoteError>>),
}

impl<R> Reply<R> {
    async fn resolve(self) -> Result<R, RemoteError> {
        match self {
            Reply::Ready(result) => result,
            Reply::Held(receiver) => receiver
                .await
                .unwrap_or_else(|_| Err(RemoteError::Transport("held reply dropped".into()))),
        }
    }
}

/// Releases a reply created with [`ExpectationBuilder::hold`].
pub struct HeldReply<R> {
    sender: oneshot::Sender<Result<R, RemoteError>>,
}

impl<R> HeldReply<R> {
    pub fn succeed(self, value: R) {
        let _ = self.sender.send(Ok(value));
    }

    pub fn fail(self, error: RemoteError) {
        let _ = self.sender.send(Err(error));
    }
}

struct ScriptState<E, C> {
    expectations: VecDeque<E>,
    calls: Vec<C>,
    unexpected: Vec<C>,
}

/// Expectation queue and call log shared by a mock and its builders.
struct Script<E, C> {
    state: Arc<Mutex<ScriptState<E, C>>>,
}

impl<E, C> Clone for Script<E, C> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<E, C: Clone> Script<E, C> {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                expectations: VecDeque::new(),
                calls: Vec::new(),
                unexpected: Vec::new(),
            })),
        }
    }

    fn push(&self, expectation: E) {
        if let Ok(mut state) = self.state.lock() {
            state.expectations.push_back(expectation);
        }
    }

    /// Records `call` and removes the first expectation `extract` accepts.
    fn take<R>(&self, call: C, extract: fn(&mut Option<E>) -> Option<Reply<R>>) -> Option<Reply<R>> {
        let mut state = self.state.lock().ok()?;
        state.calls.push(call.clone());
        for position in 0..state.expectations.len() {
            let mut slot = state.expectations.remove(position);
            if let Some(reply) = extract(&mut slot) {
                return Some(reply);
            }
            if let Some(expectation) = slot {
                state.expectations.insert(position, expectation);
            }
        }
        state.unexpected.push(call);
        None
    }

    fn calls(&self) -> Vec<C> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    fn verify(&self)
    where
        C: std::fmt::Debug,
    {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.unexpected.is_empty() {
            panic!("Unexpected calls: {:?}", state.unexpected);
        }
        if !state.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                state.expectations.len()
            );
        }
    }
}

/// Completes an expectation with a success, an error, or a held reply.
pub struct ExpectationBuilder<E, C, R> {
    wrap: fn(Reply<R>) -> E,
    script: Script<E, C>,
}

impl<E, C: Clone, R> ExpectationBuilder<E, C, R> {
    pub fn return_ok(self, value: R) {
        self.script.push((self.wrap)(Reply::Ready(Ok(value))));
    }

    pub fn return_err(self, error: RemoteError) {
        self.script.push((self.wrap)(Reply::Ready(Err(error))));
    }

    /// Parks the reply until the returned handle is resolved.
    pub fn hold(self) -> HeldReply<R> {
        let (sender, receiver) = oneshot::channel();
        self.script.push((self.wrap)(Reply::Held(receiver)));
        HeldReply { sender }
    }
}

fn unexpected(method: &str) -> RemoteError {
    RemoteError::Transport(format!("unexpected {method} call"))
}

// =============================================================================
// CART
// =============================================================================

pub enum CartExpectation {
    Fetch(Reply<Vec<CartBucket>>),
    Add(Reply<CartBucket>),
    UpdateQuantity(Reply<()>),
    Remove(Reply<()>),
    Clear(Reply<()>),
}

/// A call observed by [`MockCartAuthority`].
#[derive(Debug, Clone, PartialEq)]
pub enum CartCall {
    Fetch,
    Add(AddToCart),
    UpdateQuantity(ItemId, u32),
    Remove(ItemId),
    Clear,
}

#[derive(Clone)]
pub struct MockCartAuthority {
    script: Script<CartExpectation, CartCall>,
}

impl Default for MockCartAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCartAuthority {
    pub fn new() -> Self {
        Self {
            script: Script::new(),
        }
    }

    fn builder<R>(&self, wrap: fn(Reply<R>) -> CartExpectation) -> ExpectationBuilder<CartExpectation, CartCall, R> {
        ExpectationBuilder {
            wrap,
            script: self.script.clone(),
        }
    }

    pub fn expect_fetch(&self) -> ExpectationBuilder<CartExpectation, CartCall, Vec<CartBucket>> {
        self.builder(CartExpectation::Fetch)
    }

    pub fn expect_add(&self) -> ExpectationBuilder<CartExpectation, CartCall, CartBucket> {
        self.builder(CartExpectation::Add)
    }

    pub fn expect_update_quantity(&self) -> ExpectationBuilder<CartExpectation, CartCall, ()> {
        self.builder(CartExpectation::UpdateQuantity)
    }

    pub fn expect_remove(&self) -> ExpectationBuilder<CartExpectation, CartCall, ()> {
        self.builder(CartExpectation::Remove)
    }

    pub fn expect_clear(&self) -> ExpectationBuilder<CartExpectation, CartCall, ()> {
        self.builder(CartExpectation::Clear)
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<CartCall> {
        self.script.calls()
    }

    /// Panics on unexpected calls or unconsumed expectations.
    pub fn verify(&self) {
        self.script.verify();
    }
}

#[async_trait]
impl CartAuthority for MockCartAuthority {
    async fn fetch(&self, _identity: &Identity) -> Result<Vec<CartBucket>, RemoteError> {
        let reply = self.script.take(CartCall::Fetch, |slot| match slot.take() {
            Some(CartExpectation::Fetch(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("fetch")),
        }
    }

    async fn add(&self, _identity: &Identity, request: &AddToCart) -> Result<CartBucket, RemoteError> {
        let reply = self.script.take(CartCall::Add(request.clone()), |slot| match slot.take() {
            Some(CartExpectation::Add(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("add")),
        }
    }

    async fn update_quantity(
        &self,
        _identity: &Identity,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let call = CartCall::UpdateQuantity(item_id.clone(), quantity);
        let reply = self.script.take(call, |slot| match slot.take() {
            Some(CartExpectation::UpdateQuantity(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("update_quantity")),
        }
    }

    async fn remove(&self, _identity: &Identity, item_id: &ItemId) -> Result<(), RemoteError> {
        let reply = self.script.take(CartCall::Remove(item_id.clone()), |slot| match slot.take() {
            Some(CartExpectation::Remove(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("remove")),
        }
    }

    async fn clear(&self, _identity: &Identity) -> Result<(), RemoteError> {
        let reply = self.script.take(CartCall::Clear, |slot| match slot.take() {
            Some(CartExpectation::Clear(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("clear")),
        }
    }
}

// =============================================================================
// ORDERS
// =============================================================================

pub enum OrderExpectation {
    PlaceOrder(Reply<Order>),
    GetOrder(Reply<Order>),
    UpdateStatus(Reply<Order>),
    OrderHistory(Reply<Vec<Order>>),
}

/// A call observed by [`MockOrderAuthority`].
#[derive(Debug, Clone, PartialEq)]
pub enum OrderCall {
    PlaceOrder(PlaceOrderRequest),
    GetOrder(OrderId),
    UpdateStatus(OrderId, StatusChange),
    OrderHistory,
}

#[derive(Clone)]
pub struct MockOrderAuthority {
    script: Script<OrderExpectation, OrderCall>,
}

impl Default for MockOrderAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOrderAuthority {
    pub fn new() -> Self {
        Self {
            script: Script::new(),
        }
    }

    fn builder<R>(&self, wrap: fn(Reply<R>) -> OrderExpectation) -> ExpectationBuilder<OrderExpectation, OrderCall, R> {
        ExpectationBuilder {
            wrap,
            script: self.script.clone(),
        }
    }

    pub fn expect_place_order(&self) -> ExpectationBuilder<OrderExpectation, OrderCall, Order> {
        self.builder(OrderExpectation::PlaceOrder)
    }

    pub fn expect_get_order(&self) -> ExpectationBuilder<OrderExpectation, OrderCall, Order> {
        self.builder(OrderExpectation::GetOrder)
    }

    pub fn expect_update_status(&self) -> ExpectationBuilder<OrderExpectation, OrderCall, Order> {
        self.builder(OrderExpectation::UpdateStatus)
    }

    pub fn expect_order_history(&self) -> ExpectationBuilder<OrderExpectation, OrderCall, Vec<Order>> {
        self.builder(OrderExpectation::OrderHistory)
    }

    pub fn calls(&self) -> Vec<OrderCall> {
        self.script.calls()
    }

    pub fn verify(&self) {
        self.script.verify();
    }
}

#[async_trait]
impl OrderAuthority for MockOrderAuthority {
    async fn place_order(
        &self,
        _identity: &Identity,
        request: &PlaceOrderRequest,
    ) -> Result<Order, RemoteError> {
        let call = OrderCall::PlaceOrder(request.clone());
        let reply = self.script.take(call, |slot| match slot.take() {
            Some(OrderExpectation::PlaceOrder(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("place_order")),
        }
    }

    async fn get_order(&self, _identity: &Identity, id: &OrderId) -> Result<Order, RemoteError> {
        let reply = self.script.take(OrderCall::GetOrder(id.clone()), |slot| match slot.take() {
            Some(OrderExpectation::GetOrder(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("get_order")),
        }
    }

    async fn update_status(
        &self,
        _identity: &Identity,
        id: &OrderId,
        change: &StatusChange,
    ) -> Result<Order, RemoteError> {
        let call = OrderCall::UpdateStatus(id.clone(), change.clone());
        let reply = self.script.take(call, |slot| match slot.take() {
            Some(OrderExpectation::UpdateStatus(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("update_status")),
        }
    }

    async fn order_history(&self, _identity: &Identity) -> Result<Vec<Order>, RemoteError> {
        let reply = self.script.take(OrderCall::OrderHistory, |slot| match slot.take() {
            Some(OrderExpectation::OrderHistory(reply)) => Some(reply),
            other => {
                *slot = other;
                None
            }
        });
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(unexpected("order_history")),
        }
    }
}
