//! Demo: one customer fills a cart, hits the single-restaurant rule, places
//! an order and watches the restaurant cancel it.

use storefront_sync::checkout::DeliveryAddress;
use storefront_sync::config::Config;
use storefront_sync::lifecycle::{setup_tracing, Backend, SessionError, StorefrontSession};
use storefront_sync::model::{
    AddToCart, CancelledBy, CartItem, CustomerAddress, Identity, OrderType, PaymentMethod,
    ServiceType, StatusChange,
};
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    let _ = dotenvy::dotenv();
    setup_tracing();

    let config = Config::load()?;
    let (backend, local) = Backend::from_config(&config)?;
    let identity = Identity::new("user_1", "demo-token");
    let session = StorefrontSession::start(&backend, identity, &config).await?;

    let notifications = session.mount_notifications().await?;
    let list = session.mount_order_list().await?;

    let span = tracing::info_span!("cart");
    async {
        session
            .cart
            .add(AddToCart::new(
                "R1",
                "Spice Hub",
                ServiceType::Both,
                vec![
                    CartItem::new("I1", "Masala Dosa", 1, 50.0),
                    CartItem::new("I2", "Filter Coffee", 2, 20.0),
                ],
            ))
            .await?;
        session.cart.update_quantity("I1".into(), 3).await?;
        info!(count = session.cart.total_item_count(), "Cart ready");

        let pizza = AddToCart::new(
            "R2",
            "Pizza Place",
            ServiceType::Delivery,
            vec![CartItem::new("P1", "Margherita", 1, 300.0)],
        );
        if let Err(e) = session.cart.add(pizza).await {
            warn!(error = %e, conflict = e.is_conflict(), "Kept the current cart");
        }
        Ok::<_, SessionError>(())
    }
    .instrument(span)
    .await?;

    let address = CustomerAddress {
        name: "Asha".into(),
        phone: "9800000000".into(),
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        pincode: "560001".into(),
        landmark: None,
    };
    let order = match session
        .checkout
        .place_order(
            &session.cart.snapshot(),
            OrderType::Delivery,
            Some(DeliveryAddress::Entered(address)),
            PaymentMethod::Upi,
        )
        .await
    {
        Ok(order) => order,
        Err(e) => {
            warn!(error = %e, "Checkout failed");
            return Ok(());
        }
    };
    info!(order_id = %order.id, cart_empty = session.cart.snapshot().is_empty(), "Order placed");

    if let Some(local) = &local {
        let change = StatusChange::cancel(CancelledBy::Restaurant, Some("Kitchen closed".into()));
        local.orders.set_status(&order.id, change).await?;

        let mut changes = notifications.changes();
        let _ = changes.wait_for(|feed| feed.unread_count() > 0).await;
        for entry in notifications.state().entries() {
            info!(cancelled = entry.is_cancelled, "{}", entry.text);
        }
    }

    info!(orders = list.state().orders().len(), "Order list");
    list.unmount().await;
    notifications.unmount().await;
    session.shutdown().await?;
    drop(backend);
    if let Some(local) = local {
        local.shutdown().await?;
    }

    info!("Demo completed");
    Ok(())
}
