//! Per-monitor subscription manager.
//!
//! Tracks which event names a monitor connection is subscribed to and
//! provides server-side event filtering.

use std::collections::HashSet;

/// Wildcard subscribing to every event.
pub const WILDCARD: &str = "*";

/// Manages the set of event subscriptions for a single monitor connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed event names. If `subscribe_all` is true, this set is ignored.
    events: HashSet<String>,
    /// Whether the monitor subscribes to all events (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds event names to the subscription set. `"*"` enables the wildcard.
    pub fn subscribe<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if name == WILDCARD {
                self.subscribe_all = true;
            } else {
                self.events.insert(name.to_string());
            }
        }
    }

    /// Removes event names from the subscription set. `"*"` clears the
    /// wildcard.
    pub fn unsubscribe<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if name == WILDCARD {
                self.subscribe_all = false;
            } else {
                self.events.remove(name);
            }
        }
    }

    /// Returns `true` if the given event name matches the subscription filter.
    #[must_use]
    pub fn matches(&self, event_name: &str) -> bool {
        self.subscribe_all || self.events.contains(event_name)
    }

    /// Returns the explicitly subscribed event names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of explicitly subscribed event names.
    #[must_use]
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches("DMphase"));
    }

    #[test]
    fn subscribe_specific_event() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&["EPFeedback"]);
        assert!(mgr.matches("EPFeedback"));
        assert!(!mgr.matches("ITI"));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[WILDCARD]);
        assert!(mgr.matches("PrepDM"));
        assert!(mgr.matches("array_saved"));
        assert_eq!(mgr.count(), 0);
    }

    #[test]
    fn unsubscribe_removes_event_and_wildcard() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&["ITI", WILDCARD]);
        mgr.unsubscribe(&[WILDCARD]);
        assert!(mgr.matches("ITI"));
        assert!(!mgr.matches("PrepDM"));
        mgr.unsubscribe(&["ITI"]);
        assert!(!mgr.matches("ITI"));
    }

    #[test]
    fn names_are_sorted() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&["b", "a", "a"]);
        assert_eq!(mgr.names(), vec!["a", "b"]);
        assert_eq!(mgr.count(), 2);
    }
}
