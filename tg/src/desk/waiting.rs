//! Requesters parked until they supply their trade code

use std::collections::VecDeque;

use tracing::{debug, info};

use super::context::Requester;

/// Bounded FIFO of parked requests, one per identity
#[derive(Debug)]
pub struct WaitingList<P> {
    capacity: usize,
    entries: VecDeque<(Requester, P)>,
}

impl<P> WaitingList<P> {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "WaitingList::new: called");
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Park a request, replacing any earlier one from the same identity
    ///
    /// Returns the requester evicted to make room, if any.
    pub fn park(&mut self, requester: Requester, payload: P) -> Option<Requester> {
        debug!(identity = %requester.identity, "WaitingList::park: called");
        self.entries.retain(|(r, _)| r.identity != requester.identity);

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front().map(|(r, _)| r)
        } else {
            None
        };
        if let Some(r) = &evicted {
            info!(identity = %r.identity, "Evicted from full waiting list");
        }

        self.entries.push_back((requester, payload));
        evicted
    }

    /// Take an identity's parked request
    pub fn take(&mut self, identity: &str) -> Option<(Requester, P)> {
        let index = self.entries.iter().position(|(r, _)| r.identity == identity)?;
        self.entries.remove(index)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.iter().any(|(r, _)| r.identity == identity)
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_park_and_take() {
        let mut list = WaitingList::new(10);
        assert!(list.park(Requester::new("a"), 1).is_none());
        assert!(list.contains("a"));

        let (requester, payload) = list.take("a").unwrap();
        assert_eq!(requester.identity, "a");
        assert_eq!(payload, 1);
        assert!(list.take("a").is_none());
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut list = WaitingList::new(2);
        list.park(Requester::new("a"), 1);
        list.park(Requester::new("b"), 2);

        let evicted = list.park(Requester::new("c"), 3).unwrap();
        assert_eq!(evicted.identity, "a");
        assert_eq!(list.len(), 2);
        assert!(!list.contains("a"));
    }

    #[test]
    fn test_repark_replaces_payload() {
        let mut list = WaitingList::new(2);
        list.park(Requester::new("a"), 1);
        list.park(Requester::new("b"), 2);

        // Replacing does not evict
        assert!(list.park(Requester::new("a"), 5).is_none());
        assert_eq!(list.len(), 2);
        assert_eq!(list.take("a").unwrap().1, 5);
    }

    #[test]
    fn test_clear() {
        let mut list = WaitingList::new(5);
        list.park(Requester::new("a"), ());
        list.park(Requester::new("b"), ());
        assert_eq!(list.clear(), 2);
        assert!(list.is_empty());
    }
}
