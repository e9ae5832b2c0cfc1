//! # Checkout Coordinator
//!
//! Turns the cart into a placed order. On success it clears the cart and is
//! the only component that announces `newOrder` on the bus. On failure the
//! cart is left exactly as it was.
//!
//! No idempotency key is sent with a placement. Duplicate submits from the
//! same session are refused while one is in flight ([`CheckoutError::InFlight`]).

use crate::bus::{BusMessage, EventBusClient};
use crate::cart::{CartClient, CartState};
use crate::checkout::CheckoutError;
use crate::model::{
    AddressId, CancelledBy, CustomerAddress, Identity, Order, OrderId, OrderType, PaymentMethod,
    PlaceOrderRequest, StatusChange,
};
use crate::remote::OrderAuthority;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Where a delivery goes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryAddress {
    /// An address already saved in the profile.
    Saved(AddressId),
    /// An address typed in at checkout.
    Entered(CustomerAddress),
}

#[derive(Clone)]
pub struct CheckoutCoordinator {
    identity: Identity,
    cart: CartClient,
    orders: Arc<dyn OrderAuthority>,
    bus: EventBusClient,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag however placement ends.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CheckoutCoordinator {
    pub fn new(
        identity: Identity,
        cart: CartClient,
        orders: Arc<dyn OrderAuthority>,
        bus: EventBusClient,
    ) -> Self {
        Self {
            identity,
            cart,
            orders,
            bus,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Places an order for the active bucket of `cart`.
    ///
    /// Address fields are checked only for a delivery to an entered address.
    #[instrument(skip(self, cart, address), fields(identity = %self.identity))]
    pub async fn place_order(
        &self,
        cart: &CartState,
        order_type: OrderType,
        address: Option<DeliveryAddress>,
        payment_method: PaymentMethod,
    ) -> Result<Order, CheckoutError> {
        let request = build_request(cart, order_type, address, payment_method)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Duplicate placement refused");
            return Err(CheckoutError::InFlight);
        }
        let _guard = InFlightGuard(self.in_flight.clone());

        let order = match self.orders.place_order(&self.identity, &request).await {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Order placement failed; cart left untouched");
                return Err(e.into());
            }
        };
        info!(order_id = %order.id, total = order.total_amount, "Order placed");

        if let Err(e) = self.cart.clear().await {
            warn!(order_id = %order.id, error = %e, "Cart not cleared after placement");
        }
        if let Err(e) = self.bus.publish(BusMessage::NewOrder(order.clone())).await {
            warn!(order_id = %order.id, error = %e, "newOrder not announced");
        }
        Ok(order)
    }

    /// Issues the customer's cancel. Only allowed while the order is
    /// `ORDER_PLACED`.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn cancel_order(
        &self,
        order_id: &OrderId,
        reason: Option<String>,
    ) -> Result<Order, CheckoutError> {
        let current = self.orders.get_order(&self.identity, order_id).await?;
        if !current.status.is_cancellable_by_customer() {
            return Err(CheckoutError::NotCancellable {
                id: current.id,
                status: current.status,
            });
        }
        let change = StatusChange::cancel(CancelledBy::Customer, reason);
        let order = self
            .orders
            .update_status(&self.identity, order_id, &change)
            .await?;
        info!(%order_id, "Order cancelled by customer");
        Ok(order)
    }

    pub async fn order_history(&self) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.orders.order_history(&self.identity).await?)
    }
}

fn build_request(
    cart: &CartState,
    order_type: OrderType,
    address: Option<DeliveryAddress>,
    payment_method: PaymentMethod,
) -> Result<PlaceOrderRequest, CheckoutError> {
    let bucket = cart
        .buckets()
        .first()
        .ok_or_else(|| CheckoutError::Validation("cart is empty".into()))?;

    if !bucket.service_type.supports(order_type) {
        return Err(CheckoutError::Validation(format!(
            "{} does not offer {order_type:?}",
            bucket.restaurant_name
        )));
    }

    let (address_id, customer_address_data) = match (order_type, address) {
        (OrderType::Pickup, _) => (None, None),
        (OrderType::Delivery, None) => {
            return Err(CheckoutError::Validation("delivery needs an address".into()));
        }
        (OrderType::Delivery, Some(DeliveryAddress::Saved(id))) => (Some(id), None),
        (OrderType::Delivery, Some(DeliveryAddress::Entered(entered))) => {
            let missing = entered.missing_fields();
            if !missing.is_empty() {
                return Err(CheckoutError::Validation(format!(
                    "missing address fields: {}",
                    missing.join(", ")
                )));
            }
            (None, Some(entered))
        }
    };

    Ok(PlaceOrderRequest {
        items: bucket.items.clone(),
        total_amount: bucket.total_amount(),
        payment_method,
        order_type,
        restaurant_id: bucket.restaurant_id.clone(),
        restaurant_name: bucket.restaurant_name.clone(),
        address_id,
        customer_address_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::OrderEventHub;
    use crate::cart::CartActor;
    use crate::local::LocalEventServer;
    use crate::model::order::fixtures::{order, with_status};
    use crate::model::{AddToCart, CartItem, OrderStatus, ServiceType};
    use crate::remote::mock::{MockCartAuthority, MockOrderAuthority, OrderCall};
    use crate::remote::RemoteError;

    fn cart_with(service_type: ServiceType) -> CartState {
        let mut state = CartState::default();
        state
            .add(&AddToCart::new(
                "R1",
                "Spice Hub",
                service_type,
                vec![CartItem::new("I1", "Dosa", 2, 50.0)],
            ))
            .unwrap();
        state
    }

    async fn coordinator(
        carts: &MockCartAuthority,
        orders: &MockOrderAuthority,
    ) -> (CheckoutCoordinator, CartClient) {
        let identity = Identity::new("u1", "token");
        let (actor, cart) = CartActor::new(Arc::new(carts.clone()), 8);
        tokio::spawn(actor.run());
        carts.expect_fetch().return_ok(vec![]);
        cart.sign_in(identity.clone()).await.unwrap();

        let (hub, bus) = OrderEventHub::new(Arc::new(LocalEventServer::new()));
        tokio::spawn(hub.run());
        let checkout = CheckoutCoordinator::new(identity, cart.clone(), Arc::new(orders.clone()), bus);
        (checkout, cart)
    }

    #[test]
    fn delivery_address_is_validated() {
        let cart = cart_with(ServiceType::Both);
        let incomplete = CustomerAddress {
            name: "Asha".into(),
            ..Default::default()
        };

        let err = build_request(
            &cart,
            OrderType::Delivery,
            Some(DeliveryAddress::Entered(incomplete)),
            PaymentMethod::Cash,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CheckoutError::Validation("missing address fields: phone, street, city, pincode".into())
        );

        let pickup = build_request(&cart, OrderType::Pickup, None, PaymentMethod::Upi).unwrap();
        assert_eq!(pickup.total_amount, 100.0);
        assert!(pickup.customer_address_data.is_none());

        let saved = build_request(
            &cart,
            OrderType::Delivery,
            Some(DeliveryAddress::Saved(AddressId("a1".into()))),
            PaymentMethod::Card,
        )
        .unwrap();
        assert_eq!(saved.address_id, Some(AddressId("a1".into())));
    }

    #[test]
    fn service_type_must_allow_order_type() {
        let cart = cart_with(ServiceType::Pickup);
        let err = build_request(
            &cart,
            OrderType::Delivery,
            Some(DeliveryAddress::Saved(AddressId("a1".into()))),
            PaymentMethod::Cash,
        )
        .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
    }

    #[tokio::test]
    async fn failed_placement_leaves_cart_alone() {
        let carts = MockCartAuthority::new();
        let orders = MockOrderAuthority::new();
        let (checkout, _cart) = coordinator(&carts, &orders).await;

        orders
            .expect_place_order()
            .return_err(RemoteError::Status { status: 503, message: "busy".into() });
        let err = checkout
            .place_order(&cart_with(ServiceType::Both), OrderType::Pickup, None, PaymentMethod::Cash)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Remote(_)));
        carts.verify();
        orders.verify();
    }

    #[tokio::test]
    async fn second_submit_is_refused_while_first_is_pending() {
        let carts = MockCartAuthority::new();
        let orders = MockOrderAuthority::new();
        let (checkout, _cart) = coordinator(&carts, &orders).await;
        let held = orders.expect_place_order().hold();
        carts.expect_clear().return_ok(());

        let first = {
            let checkout = checkout.clone();
            tokio::spawn(async move {
                checkout
                    .place_order(&cart_with(ServiceType::Both), OrderType::Pickup, None, PaymentMethod::Cash)
                    .await
            })
        };
        while orders.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        let second = checkout
            .place_order(&cart_with(ServiceType::Both), OrderType::Pickup, None, PaymentMethod::Cash)
            .await;
        assert_eq!(second.unwrap_err(), CheckoutError::InFlight);

        held.succeed(order("o1", "u1"));
        assert_eq!(first.await.unwrap().unwrap().id, OrderId::from("o1"));
        assert_eq!(orders.calls().len(), 1);
    }

    #[tokio::test]
    async fn cancel_only_from_order_placed() {
        let carts = MockCartAuthority::new();
        let orders = MockOrderAuthority::new();
        let (checkout, _cart) = coordinator(&carts, &orders).await;

        orders
            .expect_get_order()
            .return_ok(with_status(order("o1", "u1"), OrderStatus::Accepted));
        let err = checkout.cancel_order(&"o1".into(), None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotCancellable { .. }));

        orders.expect_get_order().return_ok(order("o2", "u1"));
        orders
            .expect_update_status()
            .return_ok(with_status(order("o2", "u1"), OrderStatus::Cancelled));
        checkout.cancel_order(&"o2".into(), None).await.unwrap();

        let change = orders.calls().into_iter().find_map(|call| match call {
            OrderCall::UpdateStatus(_, change) => Some(change),
            _ => None,
        });
        assert_eq!(
            change,
            Some(StatusChange::cancel(CancelledBy::Customer, None))
        );
    }
}
