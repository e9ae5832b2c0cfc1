//! Cart State Manager.
//!
//! - [`CartState`] - the pure model and its mutations
//! - [`optimistic`] - snapshot/apply/rollback bookkeeping shared by all mutations
//! - [`CartActor`] - owns the live state for one session
//! - [`CartClient`] - the handle surfaces hold

pub mod actor;
pub mod client;
pub mod error;
pub mod optimistic;
pub mod state;

pub use actor::CartActor;
pub use client::CartClient;
pub use error::CartError;
pub use state::CartState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddToCart, CartItem, Identity, ServiceType};
    use crate::remote::mock::{CartCall, MockCartAuthority};
    use crate::remote::RemoteError;
    use std::sync::Arc;

    fn identity() -> Identity {
        Identity::new("u1", "token")
    }

    async fn signed_in(remote: &MockCartAuthority) -> CartClient {
        let (actor, client) = CartActor::new(Arc::new(remote.clone()), 8);
        tokio::spawn(actor.run());
        remote.expect_fetch().return_ok(vec![]);
        client.sign_in(identity()).await.unwrap();
        client
    }

    fn dosa(quantity: u32) -> AddToCart {
        AddToCart::new(
            "R1",
            "Spice Hub",
            ServiceType::Both,
            vec![CartItem::new("I1", "Dosa", quantity, 50.0)],
        )
    }

    #[tokio::test]
    async fn mutations_require_identity() {
        let remote = MockCartAuthority::new();
        let (actor, client) = CartActor::new(Arc::new(remote.clone()), 8);
        tokio::spawn(actor.run());

        assert_eq!(client.add(dosa(1)).await, Err(CartError::Unauthenticated));
        assert_eq!(client.fetch().await, Err(CartError::Unauthenticated));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_add_rolls_back() {
        let remote = MockCartAuthority::new();
        let client = signed_in(&remote).await;

        remote
            .expect_add()
            .return_err(RemoteError::Status { status: 500, message: "boom".into() });
        let err = client.add(dosa(1)).await.unwrap_err();

        assert!(matches!(err, CartError::Remote(_)));
        assert!(client.snapshot().is_empty());
        assert_eq!(client.total_item_count(), 0);
        remote.verify();
    }

    #[tokio::test]
    async fn local_conflict_skips_remote() {
        let remote = MockCartAuthority::new();
        let client = signed_in(&remote).await;
        let bucket = {
            let mut state = CartState::default();
            state.add(&dosa(1)).unwrap();
            state.buckets()[0].clone()
        };
        remote.expect_add().return_ok(bucket);
        client.add(dosa(1)).await.unwrap();

        let other = AddToCart::new(
            "R2",
            "Pizza Place",
            ServiceType::Delivery,
            vec![CartItem::new("P1", "Margherita", 1, 300.0)],
        );
        let err = client.add(other).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(
            remote.calls().iter().filter(|c| matches!(c, CartCall::Add(_))).count(),
            1
        );
    }

    #[tokio::test]
    async fn overflowing_add_keeps_actor_alive() {
        let remote = MockCartAuthority::new();
        let (actor, client) = CartActor::new(Arc::new(remote.clone()), 8);
        let handle = tokio::spawn(actor.run());
        let bucket = {
            let mut state = CartState::default();
            state.add(&dosa(u32::MAX)).unwrap();
            state.buckets()[0].clone()
        };
        remote.expect_fetch().return_ok(vec![bucket.clone()]);
        client.sign_in(identity()).await.unwrap();

        let err = client.add(dosa(1)).await.unwrap_err();
        assert!(matches!(err, CartError::Validation(_)));
        assert_eq!(client.total_item_count(), u32::MAX);

        remote.expect_fetch().return_ok(vec![bucket]);
        client.fetch().await.unwrap();
        assert_eq!(remote.calls(), vec![CartCall::Fetch, CartCall::Fetch]);
        assert!(!handle.is_finished());
        remote.verify();
    }

    #[tokio::test]
    async fn rejected_quantity_is_not_sent() {
        let remote = MockCartAuthority::new();
        let client = signed_in(&remote).await;

        let err = client.update_quantity("I1".into(), 0).await.unwrap_err();
        assert!(matches!(err, CartError::Validation(_)));
        assert_eq!(remote.calls(), vec![CartCall::Fetch]);
    }

    #[tokio::test]
    async fn sign_out_drops_cart_and_stales_pending_mutations() {
        let remote = MockCartAuthority::new();
        let client = signed_in(&remote).await;
        let held = remote.expect_add().hold();

        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.add(dosa(2)).await })
        };
        let mut changes = client.subscribe();
        changes.wait_for(|state| state.total_item_count() == 2).await.unwrap();

        client.sign_out().await.unwrap();
        held.fail(RemoteError::Transport("offline".into()));

        assert!(pending.await.unwrap().is_err());
        assert!(client.snapshot().is_empty());
        assert_eq!(client.add(dosa(1)).await, Err(CartError::Unauthenticated));
    }
}
