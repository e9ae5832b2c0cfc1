//! The in-memory cart model and its pure mutations.
//!
//! `CartState` keeps `total_item_count` as a stored counter that every
//! mutation moves by exactly the delta it applied to the items. It is never
//! recomputed from the items, so [`CartState::count_is_consistent`] is a real
//! check rather than a tautology.

use crate::cart::CartError;
use crate::model::{AddToCart, CartBucket, CartItem, ItemId, RestaurantRef};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    buckets: Vec<CartBucket>,
    total_item_count: u32,
}

impl CartState {
    /// Builds a state from server buckets. Empty buckets are dropped.
    pub fn from_buckets(buckets: Vec<CartBucket>) -> Self {
        let mut state = Self::default();
        state.replace_all(buckets);
        state
    }

    pub fn buckets(&self) -> &[CartBucket] {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn total_item_count(&self) -> u32 {
        self.total_item_count
    }

    /// The restaurant that owns the active bucket.
    pub fn restaurant(&self) -> Option<RestaurantRef> {
        self.buckets.first().map(CartBucket::restaurant)
    }

    pub fn is_in_cart(&self, item_id: &ItemId) -> bool {
        self.item(item_id).is_some()
    }

    pub fn item(&self, item_id: &ItemId) -> Option<&CartItem> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.items.iter())
            .find(|item| &item.item_id == item_id)
    }

    /// True when the stored count equals the sum of all quantities.
    pub fn count_is_consistent(&self) -> bool {
        self.counted() == self.total_item_count
    }

    /// Wholesale replacement; the only place the count is derived from items.
    pub fn replace_all(&mut self, buckets: Vec<CartBucket>) {
        self.buckets = buckets
            .into_iter()
            .filter(|bucket| !bucket.items.is_empty())
            .collect();
        self.total_item_count = self.counted();
    }

    fn counted(&self) -> u32 {
        self.buckets
            .iter()
            .fold(0u32, |count, bucket| count.saturating_add(bucket.item_count()))
    }

    /// The restaurant an add for `request` would collide with, if any.
    pub fn conflict_with(&self, request: &AddToCart) -> Option<RestaurantRef> {
        if request.reset {
            return None;
        }
        self.buckets
            .iter()
            .find(|bucket| bucket.restaurant_id != request.restaurant_id)
            .map(CartBucket::restaurant)
    }

    /// Creates, merges into, or (with `reset`) replaces the active bucket.
    ///
    /// Items already in the bucket have their quantity increased by the
    /// added quantity. A merged quantity past `u32::MAX` is a validation
    /// failure; on any error the state is left as it was.
    pub fn add(&mut self, request: &AddToCart) -> Result<(), CartError> {
        if let Some(current) = self.conflict_with(request) {
            return Err(CartError::DifferentRestaurant { current });
        }
        let mut next = self.clone();
        next.merge(request)?;
        *self = next;
        Ok(())
    }

    fn merge(&mut self, request: &AddToCart) -> Result<(), CartError> {
        let mut delta: i64 = 0;
        let restaurant_id = &request.restaurant_id;
        self.buckets.retain(|bucket| {
            let keep = &bucket.restaurant_id == restaurant_id;
            if !keep {
                delta -= i64::from(bucket.item_count());
            }
            keep
        });

        let position = match self
            .buckets
            .iter()
            .position(|bucket| &bucket.restaurant_id == restaurant_id)
        {
            Some(position) => position,
            None => {
                self.buckets.push(CartBucket {
                    restaurant_id: request.restaurant_id.clone(),
                    restaurant_name: request.restaurant_name.clone(),
                    service_type: request.service_type,
                    items: Vec::new(),
                });
                self.buckets.len() - 1
            }
        };

        let bucket = &mut self.buckets[position];
        for incoming in &request.items {
            match bucket
                .items
                .iter_mut()
                .find(|item| item.item_id == incoming.item_id)
            {
                Some(existing) => {
                    let merged = existing.quantity.checked_add(incoming.quantity).ok_or_else(|| {
                        CartError::Validation(format!("quantity for {} is too large", incoming.item_id))
                    })?;
                    existing.set_quantity(merged);
                }
                None => bucket.items.push(incoming.clone()),
            }
            delta += i64::from(incoming.quantity);
        }

        self.move_count(delta);
        Ok(())
    }

    /// Rewrites one item's quantity and line total. Callers enforce the floor.
    pub fn set_quantity(&mut self, item_id: &ItemId, quantity: u32) -> Result<(), CartError> {
        let item = self
            .buckets
            .iter_mut()
            .flat_map(|bucket| bucket.items.iter_mut())
            .find(|item| &item.item_id == item_id)
            .ok_or_else(|| CartError::ItemNotInCart(item_id.clone()))?;

        let delta = i64::from(quantity) - i64::from(item.quantity);
        item.set_quantity(quantity);
        self.move_count(delta);
        Ok(())
    }

    /// Deletes the item; a bucket left without items is deleted with it.
    pub fn remove_item(&mut self, item_id: &ItemId) -> Result<(), CartError> {
        let (bucket_index, item_index) = self
            .buckets
            .iter()
            .enumerate()
            .find_map(|(b, bucket)| {
                bucket
                    .items
                    .iter()
                    .position(|item| &item.item_id == item_id)
                    .map(|i| (b, i))
            })
            .ok_or_else(|| CartError::ItemNotInCart(item_id.clone()))?;

        let removed = self.buckets[bucket_index].items.remove(item_index);
        if self.buckets[bucket_index].items.is_empty() {
            self.buckets.remove(bucket_index);
        }
        self.move_count(-i64::from(removed.quantity));
        Ok(())
    }

    pub fn clear(&mut self) {
        let delta = -i64::from(self.total_item_count);
        self.buckets.clear();
        self.move_count(delta);
    }

    /// Swaps in the server's view of one bucket, moving the count by the
    /// difference between the two.
    pub fn replace_bucket(&mut self, bucket: CartBucket) {
        let previous = self
            .buckets
            .iter()
            .position(|b| b.restaurant_id == bucket.restaurant_id);
        let mut delta = i64::from(bucket.item_count());

        match previous {
            Some(index) => {
                delta -= i64::from(self.buckets[index].item_count());
                if bucket.items.is_empty() {
                    self.buckets.remove(index);
                } else {
                    self.buckets[index] = bucket;
                }
            }
            None if !bucket.items.is_empty() => self.buckets.push(bucket),
            None => {}
        }
        self.move_count(delta);
    }

    fn move_count(&mut self, delta: i64) {
        let next = i64::from(self.total_item_count) + delta;
        self.total_item_count = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
    }
}
