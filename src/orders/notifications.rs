use crate::bus::BusMessage;
use crate::model::{CancelledBy, Order, OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// One line of the notification feed, derived from one bus event.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEntry {
    pub id: u64,
    pub text: String,
    pub time: DateTime<Utc>,
    pub read: bool,
    pub order_id: OrderId,
    pub is_cancelled: bool,
    /// Cancelled by the restaurant or support rather than by the customer.
    pub cancelled_by_counterparty: bool,
}

/// Notification feed surface. Lives only as long as the surface is mounted.
///
/// Entries are deduplicated by `(order, status)`, so a repeated event or the
/// same transition seen as both `newOrder` and `orderStatusUpdate` yields one
/// entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFeed {
    entries: Vec<NotificationEntry>,
    seen: HashSet<(OrderId, OrderStatus)>,
    next_id: u64,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first.
    pub fn entries(&self) -> &[NotificationEntry] {
        &self.entries
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.read).count()
    }

    /// Returns the new entry, or `None` for a duplicate.
    pub fn apply(&mut self, message: &BusMessage) -> Option<&NotificationEntry> {
        let order = message.order();
        if !self.seen.insert((order.id.clone(), order.status)) {
            return None;
        }
        self.next_id += 1;
        self.entries.insert(
            0,
            NotificationEntry {
                id: self.next_id,
                text: describe(order),
                time: order.updated_at,
                read: false,
                order_id: order.id.clone(),
                is_cancelled: order.status == OrderStatus::Cancelled,
                cancelled_by_counterparty: order.is_cancelled_by_counterparty(),
            },
        );
        self.entries.first()
    }

    pub fn mark_read(&mut self, id: u64) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        self.entries.iter_mut().for_each(|entry| entry.read = true);
    }
}

fn describe(order: &Order) -> String {
    if order.status != OrderStatus::Cancelled {
        return format!(
            "Your order {} from {} {}",
            order.id,
            order.restaurant_name,
            order.status.describe()
        );
    }
    let by = match order.cancelled_by {
        Some(CancelledBy::Customer) => "you",
        Some(CancelledBy::Admin) => "support",
        Some(CancelledBy::Restaurant) | None => "the restaurant",
    };
    match &order.cancel_reason {
        Some(reason) => format!(
            "Your order {} from {} was cancelled by {by}: {reason}",
            order.id, order.restaurant_name
        ),
        None => format!(
            "Your order {} from {} was cancelled by {by}",
            order.id, order.restaurant_name
        ),
    }
}
