//! Merges bus events into locally held order snapshots.
//!
//! The merge rule is the same for every surface:
//!
//! - an event identical to the held snapshot is a duplicate (no change)
//! - a snapshot in a terminal state keeps its status; later events for the
//!   same order are accepted but ignored
//! - a terminal event replaces a non-terminal snapshot whatever its
//!   `updated_at`, so a skewed clock cannot hide a cancellation
//! - any other event older than the held snapshot (`updated_at`) is ignored
//! - otherwise the event replaces the snapshot
//!
//! Applying the same event twice therefore leaves the same snapshot as
//! applying it once. Transitions are trusted as-is; no legality check.

use crate::bus::BusMessage;
use crate::model::{Identity, Order, OrderId};
use crate::remote::{OrderAuthority, RemoteError};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Duplicate,
    /// The held snapshot is terminal; its status was kept.
    TerminalKept,
    Outdated,
    /// The event concerns an order this view does not show.
    Unrelated,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        matches!(self, MergeOutcome::Inserted | MergeOutcome::Updated)
    }
}

/// Merges `incoming` into `current`. Both must describe the same order.
pub fn merge(current: &mut Order, incoming: &Order) -> MergeOutcome {
    if current == incoming {
        return MergeOutcome::Duplicate;
    }
    if current.status.is_terminal() && incoming.status != current.status {
        debug!(order_id = %current.id, held = ?current.status, incoming = ?incoming.status, "Terminal status kept");
        return MergeOutcome::TerminalKept;
    }
    if incoming.updated_at < current.updated_at && !incoming.status.is_terminal() {
        return MergeOutcome::Outdated;
    }
    *current = incoming.clone();
    MergeOutcome::Updated
}

/// The order list surface: every order of the identity, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderListView {
    orders: Vec<Order>,
}

impl OrderListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| &order.id == id)
    }

    pub fn load(&mut self, orders: Vec<Order>) {
        self.orders = orders;
        self.sort();
    }

    /// Merges one bus event. Orders the view has not seen are inserted.
    pub fn apply(&mut self, message: &BusMessage) -> MergeOutcome {
        let outcome = self.upsert(message.order());
        if outcome == MergeOutcome::Inserted {
            self.sort();
        }
        outcome
    }

    /// Poll-based reconciliation: merges the server's order history into
    /// the view. Used on mount and after a reconnect, since the bus does not
    /// replay missed events.
    pub async fn refresh(
        &mut self,
        authority: &dyn OrderAuthority,
        identity: &Identity,
    ) -> Result<usize, RemoteError> {
        let history = authority.order_history(identity).await?;
        let changed = history
            .iter()
            .filter(|order| self.upsert(order).changed())
            .count();
        self.sort();
        info!(%identity, total = self.orders.len(), changed, "Order list refreshed");
        Ok(changed)
    }

    fn upsert(&mut self, incoming: &Order) -> MergeOutcome {
        match self.orders.iter_mut().find(|order| order.id == incoming.id) {
            Some(current) => merge(current, incoming),
            None => {
                self.orders.push(incoming.clone());
                MergeOutcome::Inserted
            }
        }
    }

    fn sort(&mut self) {
        self.orders
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

/// The order detail surface: one order, tracked by id.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetailView {
    order_id: OrderId,
    order: Option<Order>,
}

impl OrderDetailView {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            order: None,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.order
            .as_ref()
            .is_some_and(|order| order.status.is_terminal())
    }

    /// Whether the customer may still cancel.
    pub fn can_cancel(&self) -> bool {
        self.order
            .as_ref()
            .is_some_and(|order| order.status.is_cancellable_by_customer())
    }

    pub async fn load(
        &mut self,
        authority: &dyn OrderAuthority,
        identity: &Identity,
    ) -> Result<(), RemoteError> {
        let order = authority.get_order(identity, &self.order_id).await?;
        self.set(order);
        Ok(())
    }

    /// Installs a snapshot read from the server, subject to the merge rule.
    pub fn set(&mut self, order: Order) -> MergeOutcome {
        if order.id != self.order_id {
            return MergeOutcome::Unrelated;
        }
        match &mut self.order {
            Some(current) => merge(current, &order),
            None => {
                self.order = Some(order);
                MergeOutcome::Inserted
            }
        }
    }

    pub fn apply(&mut self, message: &BusMessage) -> MergeOutcome {
        self.set(message.order().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::fixtures::{order, with_status};
    use crate::model::{CancelledBy, OrderStatus};
    use crate::remote::mock::MockOrderAuthority;
    use chrono::Duration;

    fn later(mut order: Order, seconds: i64) -> Order {
        order.updated_at += Duration::seconds(seconds);
        order
    }

    #[test]
    fn same_event_twice_is_idempotent() {
        let placed = order("o1", "u1");
        let accepted = later(with_status(placed.clone(), OrderStatus::Accepted), 5);
        let event = BusMessage::OrderStatusUpdate(accepted.clone());

        let mut view = OrderDetailView::new("o1".into());
        view.set(placed);
        assert_eq!(view.apply(&event), MergeOutcome::Updated);
        let once = view.clone();
        assert_eq!(view.apply(&event), MergeOutcome::Duplicate);
        assert_eq!(view, once);
        assert_eq!(view.order(), Some(&accepted));
    }

    #[test]
    fn cancelled_is_sticky() {
        let placed = order("o1", "u1");
        let mut cancelled = later(placed.clone(), 5);
        cancelled.status = OrderStatus::Cancelled;
        cancelled.cancelled_by = Some(CancelledBy::Restaurant);

        let mut view = OrderDetailView::new("o1".into());
        view.set(placed.clone());
        view.apply(&BusMessage::OrderStatusUpdate(cancelled));
        assert!(view.is_terminal());
        assert!(!view.can_cancel());

        let ready = later(with_status(placed, OrderStatus::OrderReady), 10);
        assert_eq!(
            view.apply(&BusMessage::OrderStatusUpdate(ready)),
            MergeOutcome::TerminalKept
        );
        assert_eq!(view.order().unwrap().status, OrderStatus::Cancelled);
    }

    #[test]
    fn older_snapshots_are_ignored() {
        let accepted = later(with_status(order("o1", "u1"), OrderStatus::Accepted), 10);
        let mut view = OrderDetailView::new("o1".into());
        view.set(accepted);

        let stale = order("o1", "u1");
        assert_eq!(view.set(stale), MergeOutcome::Outdated);
        assert_eq!(view.order().unwrap().status, OrderStatus::Accepted);
    }

    #[test]
    fn terminal_event_wins_despite_older_timestamp() {
        let accepted = later(with_status(order("o1", "u1"), OrderStatus::Accepted), 10);
        let mut view = OrderDetailView::new("o1".into());
        view.set(accepted);

        let mut cancelled = with_status(order("o1", "u1"), OrderStatus::Cancelled);
        cancelled.cancelled_by = Some(CancelledBy::Restaurant);
        assert_eq!(
            view.apply(&BusMessage::OrderStatusUpdate(cancelled)),
            MergeOutcome::Updated
        );
        assert!(view.is_terminal());
        assert_eq!(view.order().unwrap().cancelled_by, Some(CancelledBy::Restaurant));
    }

    #[test]
    fn detail_ignores_other_orders() {
        let mut view = OrderDetailView::new("o1".into());
        let other = BusMessage::OrderStatusUpdate(order("o2", "u1"));
        assert_eq!(view.apply(&other), MergeOutcome::Unrelated);
        assert!(view.order().is_none());
    }

    #[test]
    fn list_inserts_unknown_orders_newest_first() {
        let mut older = order("o1", "u1");
        older.created_at -= Duration::minutes(5);
        let mut view = OrderListView::new();
        view.load(vec![older]);

        let outcome = view.apply(&BusMessage::NewOrder(order("o2", "u1")));
        assert_eq!(outcome, MergeOutcome::Inserted);
        let ids: Vec<_> = view.orders().iter().map(|o| o.id.0.as_str()).collect();
        assert_eq!(ids, vec!["o2", "o1"]);
    }

    #[tokio::test]
    async fn refresh_catches_up_missed_transitions() {
        let placed = order("o1", "u1");
        let mut view = OrderListView::new();
        view.load(vec![placed.clone()]);

        let authority = MockOrderAuthority::new();
        let delivered = later(with_status(placed, OrderStatus::OrderPickedUp), 60);
        authority
            .expect_order_history()
            .return_ok(vec![delivered.clone(), order("o2", "u1")]);

        let identity = Identity::new("u1", "token");
        let changed = view.refresh(&authority, &identity).await.unwrap();

        assert_eq!(changed, 2);
        assert_eq!(view.get(&"o1".into()), Some(&delivered));
        authority.verify();
    }
}
