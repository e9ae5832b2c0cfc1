use chrono::{Duration as TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use storefront_sync::bus::{BusMessage, EventBusClient, OrderEventHub, SurfaceId};
use storefront_sync::local::LocalEventServer;
use storefront_sync::model::{
    CancelledBy, CartItem, Identity, Order, OrderId, OrderStatus, OrderType, PaymentMethod,
    RestaurantId, UserId,
};
use storefront_sync::orders::{mount, NotificationFeed, OrderDetailView, OrderListView};
use storefront_sync::remote::mock::MockOrderAuthority;
use tokio::time::{sleep, timeout};

fn identity() -> Identity {
    Identity::new("user_1", "token")
}

fn user() -> UserId {
    UserId::from("user_1")
}

fn placed(id: &str) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::from(id),
        user_id: user(),
        items: vec![CartItem::new("I1", "Masala Dosa", 2, 50.0)],
        total_amount: 100.0,
        order_type: OrderType::Delivery,
        status: OrderStatus::OrderPlaced,
        restaurant_id: RestaurantId::from("R1"),
        restaurant_name: "Spice Hub".into(),
        payment_method: PaymentMethod::Cash,
        cancelled_by: None,
        cancel_reason: None,
        created_at: now,
        updated_at: now,
    }
}

/// Same order, later timestamp, new status.
fn advanced(order: &Order, status: OrderStatus) -> Order {
    let mut next = order.clone();
    next.status = status;
    next.updated_at = order.updated_at + TimeDelta::seconds(1);
    next
}

fn update(order: &Order) -> BusMessage {
    BusMessage::OrderStatusUpdate(order.clone())
}

fn start_hub(server: &LocalEventServer) -> EventBusClient {
    let (hub, bus) = OrderEventHub::new(Arc::new(server.clone()));
    tokio::spawn(hub.run());
    bus
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(2), async {
        while !check().await {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// One connection, many surfaces: every surface gets every event, in order.
#[tokio::test]
async fn test_events_fan_out_in_arrival_order() {
    let server = LocalEventServer::new();
    let bus = start_hub(&server);

    let mut navbar = bus.subscribe(&identity(), "navbar".into()).await.unwrap();
    let mut list = bus.subscribe(&identity(), "order-list".into()).await.unwrap();
    assert_eq!(server.connection_count(&user()), 1);

    let order = placed("o1");
    let accepted = advanced(&order, OrderStatus::Accepted);
    assert_eq!(server.publish(&user(), &BusMessage::NewOrder(order.clone())), 1);
    assert_eq!(server.publish(&user(), &update(&accepted)), 1);

    for subscription in [&mut navbar, &mut list] {
        let first = subscription.recv().await.unwrap();
        let second = subscription.recv().await.unwrap();
        assert_eq!(first.event_name(), "newOrder");
        assert_eq!(second.order().status, OrderStatus::Accepted);
    }

    let status = bus.status().await.unwrap();
    assert_eq!(status.subscribers, 2);
    assert_eq!(status.connections_opened, 1);
}

/// A restaurant cancellation reaches the detail view and the feed; a late
/// "ready" event does not revive the order.
#[tokio::test]
async fn test_cancellation_is_sticky_across_surfaces() {
    let server = LocalEventServer::new();
    let bus = start_hub(&server);
    let order = placed("o1");

    let mut view = OrderDetailView::new(order.id.clone());
    view.set(order.clone());
    let detail = mount(
        view,
        bus.subscribe(&identity(), "order-detail:o1".into()).await.unwrap(),
    );
    let notifications = mount(
        NotificationFeed::new(),
        bus.subscribe(&identity(), "notifications".into()).await.unwrap(),
    );

    let mut cancelled = advanced(&order, OrderStatus::Cancelled);
    cancelled.cancelled_by = Some(CancelledBy::Restaurant);
    cancelled.cancel_reason = Some("Out of stock".into());
    server.publish(&user(), &update(&cancelled));

    let late_ready = advanced(&cancelled, OrderStatus::OrderReady);
    server.publish(&user(), &update(&late_ready));

    let mut feed_changes = notifications.changes();
    timeout(
        Duration::from_secs(2),
        feed_changes.wait_for(|feed| feed.entries().len() == 2),
    )
    .await
    .expect("feed did not receive both events")
    .unwrap();
    let mut detail_changes = detail.changes();
    timeout(
        Duration::from_secs(2),
        detail_changes.wait_for(|view| view.is_terminal()),
    )
    .await
    .expect("detail never saw the cancellation")
    .unwrap();

    let view = detail.state();
    assert_eq!(view.order().unwrap().status, OrderStatus::Cancelled);
    assert_eq!(view.order().unwrap().cancelled_by, Some(CancelledBy::Restaurant));
    assert!(view.is_terminal());
    assert!(!view.can_cancel());

    let feed = notifications.state();
    let cancel_entry = feed.entries().iter().find(|e| e.is_cancelled).unwrap();
    assert!(cancel_entry.text.contains("cancelled by the restaurant"));
    assert_eq!(feed.unread_count(), 2);

    detail.unmount().await;
    notifications.unmount().await;
}

/// Delivering the same event twice leaves the surfaces as after the first.
#[tokio::test]
async fn test_duplicate_events_are_idempotent() {
    let server = LocalEventServer::new();
    let bus = start_hub(&server);
    let list = mount(
        OrderListView::new(),
        bus.subscribe(&identity(), "order-list".into()).await.unwrap(),
    );
    let notifications = mount(
        NotificationFeed::new(),
        bus.subscribe(&identity(), "notifications".into()).await.unwrap(),
    );

    let accepted = advanced(&placed("o1"), OrderStatus::Accepted);
    server.publish(&user(), &update(&accepted));
    let mut list_changes = list.changes();
    timeout(
        Duration::from_secs(2),
        list_changes.wait_for(|view| view.orders().len() == 1),
    )
    .await
    .unwrap()
    .unwrap();
    let mut feed_changes = notifications.changes();
    timeout(
        Duration::from_secs(2),
        feed_changes.wait_for(|feed| feed.entries().len() == 1),
    )
    .await
    .unwrap()
    .unwrap();
    let list_once = list.state();
    let feed_once = notifications.state();

    // The duplicate is followed by a marker event; once the marker shows
    // up, the duplicate has been processed.
    server.publish(&user(), &update(&accepted));
    let marker = placed("o2");
    server.publish(&user(), &update(&marker));
    timeout(
        Duration::from_secs(2),
        list_changes.wait_for(|view| view.orders().len() == 2),
    )
    .await
    .unwrap()
    .unwrap();
    timeout(
        Duration::from_secs(2),
        feed_changes.wait_for(|feed| feed.entries().len() == 2),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(list.state().get(&accepted.id), list_once.get(&accepted.id));
    let feed = notifications.state();
    let o1_entries = feed
        .entries()
        .iter()
        .filter(|e| e.order_id == accepted.id)
        .count();
    assert_eq!(o1_entries, 1);
    assert_eq!(feed_once.entries().len(), 1);

    list.unmount().await;
    notifications.unmount().await;
}

#[tokio::test]
async fn test_undecodable_frames_are_skipped() {
    let server = LocalEventServer::new();
    let bus = start_hub(&server);
    let mut subscription = bus.subscribe(&identity(), "order-list".into()).await.unwrap();

    server.publish_frame(&user(), "not json".to_string());
    server.publish_frame(&user(), r#"{"event":"mystery","data":{}}"#.to_string());
    server.publish(&user(), &update(&placed("o1")));

    let message = timeout(Duration::from_secs(2), subscription.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.order().id, OrderId::from("o1"));
    assert!(bus.status().await.unwrap().connected);
}

/// Events sent while the connection is down are lost. After reconnecting,
/// the list catches up by polling order history.
#[tokio::test]
async fn test_no_replay_after_reconnect_refresh_catches_up() {
    let server = LocalEventServer::new();
    let bus = start_hub(&server);
    let list = mount(
        OrderListView::new(),
        bus.subscribe(&identity(), "order-list".into()).await.unwrap(),
    );

    server.drop_connections(&user());
    eventually(|| {
        let bus = bus.clone();
        async move { !bus.status().await.unwrap().connected }
    })
    .await;

    let missed = advanced(&placed("o1"), OrderStatus::Accepted);
    assert_eq!(server.publish(&user(), &update(&missed)), 0);

    bus.reconnect().await.unwrap();
    let status = bus.status().await.unwrap();
    assert!(status.connected);
    assert_eq!(status.connections_opened, 2);
    assert_eq!(server.connection_count(&user()), 1);

    // Live again: a new event arrives, the missed one never does.
    let live = placed("o2");
    server.publish(&user(), &update(&live));
    let mut changes = list.changes();
    timeout(
        Duration::from_secs(2),
        changes.wait_for(|view| view.get(&live.id).is_some()),
    )
    .await
    .unwrap()
    .unwrap();
    let mut view = list.state();
    assert!(view.get(&missed.id).is_none());

    let history = MockOrderAuthority::new();
    history
        .expect_order_history()
        .return_ok(vec![missed.clone(), live.clone()]);
    let changed = view.refresh(&history, &identity()).await.unwrap();
    assert_eq!(changed, 1);
    assert_eq!(view.get(&missed.id).unwrap().status, OrderStatus::Accepted);
    history.verify();

    list.unmount().await;
}

#[tokio::test]
async fn test_connection_follows_subscribers() {
    let server = LocalEventServer::new();
    let bus = start_hub(&server);

    let list = mount(
        OrderListView::new(),
        bus.subscribe(&identity(), "order-list".into()).await.unwrap(),
    );
    let feed = mount(
        NotificationFeed::new(),
        bus.subscribe(&identity(), "notifications".into()).await.unwrap(),
    );
    // Re-subscribing a surface replaces its registration.
    let navbar = bus.subscribe(&identity(), "navbar".into()).await.unwrap();
    let navbar_again = bus.subscribe(&identity(), "navbar".into()).await.unwrap();
    drop(navbar);

    let status = bus.status().await.unwrap();
    assert_eq!(status.subscribers, 3);
    assert_eq!(status.connections_opened, 1);

    list.unmount().await;
    feed.unmount().await;
    assert_eq!(navbar_again.surface(), &SurfaceId::from("navbar"));
    navbar_again.unsubscribe();

    eventually(|| {
        let bus = bus.clone();
        async move {
            let status = bus.status().await.unwrap();
            status.subscribers == 0 && !status.connected
        }
    })
    .await;
    eventually(|| {
        let server = server.clone();
        async move { server.connection_count(&user()) == 0 }
    })
    .await;
}

/// Signing in as someone else closes the previous identity's connection
/// and ends its subscriptions.
#[tokio::test]
async fn test_identity_switch_drops_previous_subscribers() {
    let server = LocalEventServer::new();
    let bus = start_hub(&server);

    let mut old = bus.subscribe(&identity(), "order-list".into()).await.unwrap();
    let other = Identity::new("user_2", "token");
    let mut new = bus.subscribe(&other, "order-list".into()).await.unwrap();

    assert!(timeout(Duration::from_secs(2), old.recv()).await.unwrap().is_none());

    let mut order = placed("o9");
    order.user_id = other.user_id.clone();
    server.publish(&other.user_id, &update(&order));
    let message = timeout(Duration::from_secs(2), new.recv()).await.unwrap().unwrap();
    assert_eq!(message.order().id, order.id);
}
