//! Order View Reconciler: per-surface state built from bus events.

pub mod notifications;
pub mod reconciler;
pub mod surface;

pub use notifications::{NotificationEntry, NotificationFeed};
pub use reconciler::{merge, MergeOutcome, OrderDetailView, OrderListView};
pub use surface::{mount, OrderSurface, SurfaceHandle};
