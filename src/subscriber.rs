//! Change subscribers
//!
//! The controller does not interpret the snapshot for anyone. After every
//! update it asks each [`Subscriber`] whether the slice it cares about changed
//! ([`on_possible_change`](Subscriber::on_possible_change)) and, if so, tells it
//! to [`publish`](Subscriber::publish) its new state to the hub.
//!
//! [`SubscriberSet`] holds subscribers weakly, keyed by their identity:
//! subscribing the same identity twice is a no-op, and a subscriber whose last
//! strong reference is dropped disappears from the set on the next walk.

use crate::snapshot::Snapshot;
use std::sync::{Arc, Weak};

/// Something that wants to hear about rig state changes.
pub trait Subscriber: Send + Sync {
    /// Stable identity, unique within one controller (the device name).
    fn subscriber_id(&self) -> &str;

    /// Compare the cached observed value with `snapshot`; update the cache and
    /// return `true` when it differs.
    fn on_possible_change(&self, snapshot: &Snapshot) -> bool;

    /// Push the current state to the hub. Called only after
    /// [`on_possible_change`](Self::on_possible_change) returned `true`.
    fn publish(&self);
}

/// Subscribers in subscription order.
#[derive(Default)]
pub struct SubscriberSet {
    entries: Vec<(String, Weak<dyn Subscriber>)>,
}

impl SubscriberSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subscriber`. Returns `false` if a live subscriber with the same
    /// identity is already registered.
    pub fn subscribe(&mut self, subscriber: &Arc<dyn Subscriber>) -> bool {
        let id = subscriber.subscriber_id();
        if let Some(pos) = self.entries.iter().position(|(key, _)| key == id) {
            if self.entries[pos].1.strong_count() > 0 {
                return false;
            }
            // A dead entry under the same identity is replaced in place.
            self.entries[pos].1 = Arc::downgrade(subscriber);
            return true;
        }
        self.entries
            .push((id.to_string(), Arc::downgrade(subscriber)));
        true
    }

    /// Remove the subscriber registered as `id`. Returns whether one was found.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| key != id);
        self.entries.len() != before
    }

    /// Whether `id` is registered and still alive.
    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|(key, weak)| key == id && weak.strong_count() > 0)
    }

    /// Drop entries whose subscriber no longer exists and return the live ones
    /// in subscription order.
    pub fn live(&mut self) -> Vec<Arc<dyn Subscriber>> {
        let mut live = Vec::with_capacity(self.entries.len());
        self.entries.retain(|(key, weak)| match weak.upgrade() {
            Some(subscriber) => {
                live.push(subscriber);
                true
            }
            None => {
                tracing::debug!(subscriber = %key, "Pruning dropped subscriber");
                false
            }
        });
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(String);

    impl Subscriber for Named {
        fn subscriber_id(&self) -> &str {
            &self.0
        }
        fn on_possible_change(&self, _snapshot: &Snapshot) -> bool {
            false
        }
        fn publish(&self) {}
    }

    fn named(id: &str) -> Arc<dyn Subscriber> {
        Arc::new(Named(id.to_string()))
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        let mut set = SubscriberSet::new();
        let a = named("arm 0");
        let a_again = named("arm 0");

        assert!(set.subscribe(&a));
        assert!(!set.subscribe(&a));
        assert!(!set.subscribe(&a_again));
        assert_eq!(set.live().len(), 1);
    }

    #[test]
    fn test_order_is_subscription_order() {
        let mut set = SubscriberSet::new();
        let subs: Vec<_> = ["c", "a", "b"].iter().map(|id| named(id)).collect();
        for s in &subs {
            set.subscribe(s);
        }

        let ids: Vec<String> = set
            .live()
            .iter()
            .map(|s| s.subscriber_id().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut set = SubscriberSet::new();
        let a = named("a");
        set.subscribe(&a);

        assert!(set.unsubscribe("a"));
        assert!(!set.unsubscribe("a"));
        assert!(set.entries.is_empty());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut set = SubscriberSet::new();
        let a = named("a");
        let b = named("b");
        set.subscribe(&a);
        set.subscribe(&b);

        drop(a);
        assert!(!set.contains("a"));
        assert_eq!(set.live().len(), 1);
        assert_eq!(set.entries.len(), 1);

        // The identity is free again.
        let a2 = named("a");
        assert!(set.subscribe(&a2));
    }
}
