//! Queue admission implementation

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::priority::Tier;

use super::types::{
    AdmissionResult, Admitted, EntryState, QueueEntry, QueuePosition, QueueStats, RemovalResult, RequestKind,
    RoutineKind, TicketId,
};
use super::workers::{WorkerPool, estimate_eta};

/// `(tier, enqueued_at, ticket)`; the ticket only breaks timestamp ties
type ServiceKey = (Tier, DateTime<Utc>, TicketId);

fn service_key<P>(entry: &QueueEntry<P>) -> ServiceKey {
    (entry.tier, entry.enqueued_at, entry.ticket)
}

/// Internal state protected by mutex
struct QueueInner<P> {
    /// Every live entry, waiting or processing
    entries: HashMap<TicketId, QueueEntry<P>>,

    /// Waiting entries in service order
    order: BTreeSet<ServiceKey>,

    /// Live entry per identity
    by_identity: HashMap<String, TicketId>,

    /// Next ticket to hand out
    next_ticket: TicketId,

    /// Whether non-sudo admissions are accepted
    open: bool,

    /// Statistics
    stats: QueueStats,
}

impl<P> QueueInner<P> {
    /// 1-based rank of a waiting entry
    fn rank(&self, key: ServiceKey) -> usize {
        self.order.range(..=key).count()
    }

    fn position_of(&self, ticket: TicketId) -> Option<QueuePosition> {
        let entry = self.entries.get(&ticket)?;
        let position = match entry.state {
            EntryState::Waiting => self.rank(service_key(entry)),
            EntryState::Processing => 0,
        };
        Some(QueuePosition {
            position,
            ticket,
            routine: entry.routine,
            state: entry.state,
        })
    }

    fn drop_entry(&mut self, ticket: TicketId) -> Option<QueueEntry<P>> {
        let entry = self.entries.remove(&ticket)?;
        self.order.remove(&service_key(&entry));
        self.by_identity.remove(&entry.identity);
        Some(entry)
    }
}

/// Position-ordered admission queue with one live entry per identity
///
/// Service order is `(tier, enqueued_at)`, with the ticket breaking ties
/// between equal timestamps.
pub struct QueueAdmission<P> {
    inner: Mutex<QueueInner<P>>,
    workers: Arc<dyn WorkerPool>,
    clock: Arc<dyn Clock>,
}

impl<P: Clone + Send> QueueAdmission<P> {
    /// Create a new queue fed by the given worker pool
    pub fn new(workers: Arc<dyn WorkerPool>, clock: Arc<dyn Clock>) -> Self {
        debug!("QueueAdmission::new: called");
        Self {
            inner: Mutex::new(QueueInner {
                entries: HashMap::new(),
                order: BTreeSet::new(),
                by_identity: HashMap::new(),
                next_ticket: 1,
                open: true,
                stats: QueueStats::default(),
            }),
            workers,
            clock,
        }
    }

    pub fn with_system_clock(workers: Arc<dyn WorkerPool>) -> Self {
        Self::new(workers, Arc::new(SystemClock))
    }

    /// Admit a request at the given tier
    ///
    /// Only `Tier::SUDO` gets through a closed queue; see `admit_gated`.
    pub async fn admit(
        &self,
        identity: &str,
        tier: Tier,
        payload: P,
        routine: RoutineKind,
        request: RequestKind,
    ) -> AdmissionResult {
        self.admit_gated(identity, tier, payload, routine, request, tier.is_sudo())
            .await
    }

    /// Admit a request, with the closed-queue bypass decided by the caller
    ///
    /// A sudo requester can be queued at a lower tier and still get through
    /// a closed queue.
    pub async fn admit_gated(
        &self,
        identity: &str,
        tier: Tier,
        payload: P,
        routine: RoutineKind,
        request: RequestKind,
        bypass_gate: bool,
    ) -> AdmissionResult {
        debug!(%identity, %tier, %routine, bypass_gate, "QueueAdmission::admit_gated: called");
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.by_identity.get(identity) {
            debug!(%identity, ticket = existing, "QueueAdmission::admit_gated: already queued, rejecting");
            inner.stats.total_duplicates += 1;
            return AdmissionResult::AlreadyInQueue;
        }

        if !inner.open && !bypass_gate {
            debug!(%identity, "QueueAdmission::admit_gated: queue closed, rejecting");
            return AdmissionResult::QueueClosed;
        }

        let ticket = inner.next_ticket;
        inner.next_ticket += 1;

        let entry = QueueEntry {
            identity: identity.to_string(),
            payload,
            tier,
            routine,
            request,
            enqueued_at: self.clock.now(),
            ticket,
            state: EntryState::Waiting,
            cancel_requested: false,
        };

        let key = service_key(&entry);
        inner.entries.insert(ticket, entry);
        inner.order.insert(key);
        inner.by_identity.insert(identity.to_string(), ticket);
        inner.stats.total_admitted += 1;
        inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.order.len());

        let position = inner.rank(key);
        let eta = estimate_eta(position, self.workers.as_ref());

        info!(%identity, ticket, position, %tier, "Admitted to queue");
        AdmissionResult::Added(Admitted { ticket, position, eta })
    }

    /// Remove an identity's entry
    ///
    /// A processing entry stays with its worker but is flagged for
    /// cancellation; it leaves the queue when the worker completes it.
    pub async fn remove(&self, identity: &str) -> RemovalResult {
        debug!(%identity, "QueueAdmission::remove: called");
        let mut inner = self.inner.lock().await;

        let Some(ticket) = inner.by_identity.get(identity).copied() else {
            debug!(%identity, "QueueAdmission::remove: not in queue");
            return RemovalResult::NotInQueue;
        };

        let processing = inner
            .entries
            .get(&ticket)
            .is_some_and(|e| e.state == EntryState::Processing);

        if processing {
            if let Some(entry) = inner.entries.get_mut(&ticket) {
                entry.cancel_requested = true;
            }
            info!(%identity, ticket, "Cancellation requested for processing entry");
            return RemovalResult::CurrentlyProcessing;
        }

        inner.drop_entry(ticket);
        inner.stats.total_removed += 1;
        info!(%identity, ticket, "Removed from queue");
        RemovalResult::Removed
    }

    /// Remove every live entry; returns how many were removed
    pub async fn clear_all(&self) -> usize {
        debug!("QueueAdmission::clear_all: called");
        let mut inner = self.inner.lock().await;

        let removed = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        inner.by_identity.clear();
        inner.stats.total_removed += removed as u64;

        info!(removed, "Cleared queue");
        removed
    }

    /// Where an identity stands, if it has a live entry
    pub async fn position(&self, identity: &str) -> Option<QueuePosition> {
        debug!(%identity, "QueueAdmission::position: called");
        let inner = self.inner.lock().await;
        let ticket = *inner.by_identity.get(identity)?;
        inner.position_of(ticket)
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.inner.lock().await.by_identity.contains_key(identity)
    }

    /// Hand the best waiting entry for these routines to a worker
    ///
    /// An empty `routines` slice matches every routine.
    pub async fn take_next(&self, routines: &[RoutineKind]) -> Option<QueueEntry<P>> {
        debug!(?routines, "QueueAdmission::take_next: called");
        let mut inner = self.inner.lock().await;

        let key = inner
            .order
            .iter()
            .find(|(_, _, ticket)| {
                inner
                    .entries
                    .get(ticket)
                    .is_some_and(|e| routines.is_empty() || routines.contains(&e.routine))
            })
            .copied()?;

        inner.order.remove(&key);
        let entry = inner.entries.get_mut(&key.2)?;
        entry.state = EntryState::Processing;

        info!(identity = %entry.identity, ticket = key.2, "Handed entry to worker");
        Some(entry.clone())
    }

    /// Finish a processing entry; returns whether it existed
    pub async fn complete(&self, ticket: TicketId) -> bool {
        debug!(ticket, "QueueAdmission::complete: called");
        let mut inner = self.inner.lock().await;

        let processing = inner
            .entries
            .get(&ticket)
            .is_some_and(|e| e.state == EntryState::Processing);
        if !processing {
            debug!(ticket, "QueueAdmission::complete: no processing entry");
            return false;
        }

        if let Some(entry) = inner.drop_entry(ticket) {
            inner.stats.total_completed += 1;
            info!(identity = %entry.identity, ticket, cancelled = entry.cancel_requested, "Completed entry");
        }
        true
    }

    /// Whether removal was requested for a processing entry
    pub async fn is_cancel_requested(&self, ticket: TicketId) -> bool {
        self.inner
            .lock()
            .await
            .entries
            .get(&ticket)
            .is_some_and(|e| e.cancel_requested)
    }

    /// First `count` waiting entries in service order
    pub async fn on_deck(&self, count: usize) -> Vec<QueueEntry<P>> {
        debug!(count, "QueueAdmission::on_deck: called");
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .take(count)
            .filter_map(|(_, _, ticket)| inner.entries.get(ticket).cloned())
            .collect()
    }

    /// Every waiting entry in service order
    pub async fn snapshot(&self) -> Vec<QueueEntry<P>> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|(_, _, ticket)| inner.entries.get(ticket).cloned())
            .collect()
    }

    /// Live entries, waiting and processing
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Open or close the queue to non-sudo admissions
    pub async fn set_open(&self, open: bool) {
        debug!(open, "QueueAdmission::set_open: called");
        self.inner.lock().await.open = open;
        info!(open, "Queue gate changed");
    }

    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.open
    }

    pub async fn stats(&self) -> QueueStats {
        self.inner.lock().await.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::types::Eta;
    use crate::queue::workers::FixedWorkerPool;

    fn queue(workers: usize) -> QueueAdmission<String> {
        QueueAdmission::with_system_clock(Arc::new(FixedWorkerPool::new(workers, 1.5)))
    }

    async fn admit(q: &QueueAdmission<String>, identity: &str, tier: Tier) -> AdmissionResult {
        q.admit(identity, tier, format!("{}-payload", identity), RoutineKind::LinkTrade, RequestKind::Specific)
            .await
    }

    fn added(result: AdmissionResult) -> Admitted {
        match result {
            AdmissionResult::Added(a) => a,
            other => panic!("expected Added, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_rejection() {
        let q = queue(1);

        assert!(admit(&q, "u4", Tier::new(2)).await.is_added());
        assert_eq!(admit(&q, "u4", Tier::new(2)).await, AdmissionResult::AlreadyInQueue);

        assert_eq!(q.len().await, 1);
        assert_eq!(q.stats().await.total_duplicates, 1);
    }

    #[tokio::test]
    async fn test_positions_follow_tier_then_arrival() {
        let q = queue(1);

        assert_eq!(added(admit(&q, "free1", Tier::FREE).await).position, 1);
        assert_eq!(added(admit(&q, "free2", Tier::FREE).await).position, 2);
        assert_eq!(added(admit(&q, "gold", Tier::new(2)).await).position, 1);
        assert_eq!(added(admit(&q, "sudo", Tier::SUDO).await).position, 1);

        assert_eq!(q.position("free1").await.unwrap().position, 3);
        assert_eq!(q.position("free2").await.unwrap().position, 4);
        assert_eq!(q.position("gold").await.unwrap().position, 2);

        let order: Vec<_> = q.snapshot().await.into_iter().map(|e| e.identity).collect();
        assert_eq!(order, vec!["sudo", "gold", "free1", "free2"]);
    }

    #[tokio::test]
    async fn test_tickets_are_monotonic_and_never_reused() {
        let q = queue(1);

        let a = added(admit(&q, "a", Tier::FREE).await).ticket;
        let b = added(admit(&q, "b", Tier::FREE).await).ticket;
        assert!(b > a);

        q.remove("a").await;
        q.clear_all().await;

        let c = added(admit(&q, "a", Tier::FREE).await).ticket;
        assert!(c > b);
    }

    #[tokio::test]
    async fn test_eta_reporting() {
        let q = queue(2);

        assert_eq!(added(admit(&q, "a", Tier::FREE).await).eta, Eta::WithinCycle);
        assert_eq!(added(admit(&q, "b", Tier::FREE).await).eta, Eta::WithinCycle);
        assert_eq!(added(admit(&q, "c", Tier::FREE).await).eta, Eta::Minutes(3.0));
    }

    #[tokio::test]
    async fn test_remove_outcomes() {
        let q = queue(1);
        admit(&q, "waiting", Tier::FREE).await;
        admit(&q, "busy", Tier::SUDO).await;

        let taken = q.take_next(&[]).await.unwrap();
        assert_eq!(taken.identity, "busy");
        assert_eq!(taken.state, EntryState::Processing);

        assert_eq!(q.remove("waiting").await, RemovalResult::Removed);
        assert_eq!(q.remove("waiting").await, RemovalResult::NotInQueue);
        assert_eq!(q.remove("busy").await, RemovalResult::CurrentlyProcessing);

        // Still live until the worker completes it
        assert!(q.is_cancel_requested(taken.ticket).await);
        assert_eq!(admit(&q, "busy", Tier::SUDO).await, AdmissionResult::AlreadyInQueue);

        assert!(q.complete(taken.ticket).await);
        assert!(!q.complete(taken.ticket).await);
        assert!(q.is_empty().await);
    }

    #[tokio::test]
    async fn test_processing_position() {
        let q = queue(1);
        admit(&q, "a", Tier::FREE).await;
        admit(&q, "b", Tier::FREE).await;

        q.take_next(&[]).await.unwrap();

        let a = q.position("a").await.unwrap();
        assert_eq!(a.state, EntryState::Processing);
        assert_eq!(a.position, 0);
        assert_eq!(q.position("b").await.unwrap().position, 1);
        assert!(q.position("nobody").await.is_none());
    }

    #[tokio::test]
    async fn test_take_next_filters_by_routine() {
        let q = queue(1);
        q.admit("trader", Tier::SUDO, "t".into(), RoutineKind::LinkTrade, RequestKind::Specific)
            .await;
        q.admit("dumper", Tier::FREE, "d".into(), RoutineKind::Dump, RequestKind::Dump)
            .await;

        let next = q.take_next(&[RoutineKind::Dump]).await.unwrap();
        assert_eq!(next.identity, "dumper");
        assert!(q.take_next(&[RoutineKind::Clone]).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_all_includes_processing() {
        let q = queue(1);
        admit(&q, "a", Tier::FREE).await;
        admit(&q, "b", Tier::FREE).await;
        q.take_next(&[]).await;

        assert_eq!(q.clear_all().await, 2);
        assert!(q.is_empty().await);
        assert!(!q.contains("a").await);
    }

    #[tokio::test]
    async fn test_closed_queue_admits_only_sudo() {
        let q = queue(1);
        q.set_open(false).await;
        assert!(!q.is_open().await);

        assert_eq!(admit(&q, "free", Tier::FREE).await, AdmissionResult::QueueClosed);
        assert_eq!(admit(&q, "gold", Tier::new(2)).await, AdmissionResult::QueueClosed);
        assert!(admit(&q, "root", Tier::SUDO).await.is_added());

        q.set_open(true).await;
        assert!(admit(&q, "free", Tier::FREE).await.is_added());
    }

    #[tokio::test]
    async fn test_bypass_gate_keeps_requested_tier() {
        let q = queue(1);
        q.set_open(false).await;

        let result = q
            .admit_gated("owner", Tier::FREE, "x".into(), RoutineKind::LinkTrade, RequestKind::Specific, true)
            .await;
        assert!(result.is_added());
        assert_eq!(q.snapshot().await[0].tier, Tier::FREE);

        let result = q
            .admit_gated("user", Tier::FREE, "y".into(), RoutineKind::LinkTrade, RequestKind::Specific, false)
            .await;
        assert_eq!(result, AdmissionResult::QueueClosed);
    }

    #[tokio::test]
    async fn test_service_order_follows_enqueue_time() {
        use crate::clock::ManualClock;
        use chrono::Duration;

        let clock = Arc::new(ManualClock::default());
        let q: QueueAdmission<String> = QueueAdmission::new(Arc::new(FixedWorkerPool::new(1, 1.0)), clock.clone());

        admit(&q, "a", Tier::FREE).await;
        clock.advance(Duration::minutes(-5));
        assert_eq!(added(admit(&q, "b", Tier::FREE).await).position, 1);

        let order: Vec<_> = q.snapshot().await.into_iter().map(|e| e.identity).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(q.position("a").await.unwrap().position, 2);

        // Equal timestamps fall back to ticket order
        admit(&q, "c", Tier::FREE).await;
        let order: Vec<_> = q.snapshot().await.into_iter().map(|e| e.identity).collect();
        assert_eq!(order, vec!["b", "c", "a"]);

        assert_eq!(q.take_next(&[]).await.unwrap().identity, "b");
        assert_eq!(q.remove("a").await, RemovalResult::Removed);
        assert_eq!(q.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_on_deck() {
        let q = queue(1);
        for name in ["a", "b", "c", "d"] {
            admit(&q, name, Tier::FREE).await;
        }

        let deck: Vec<_> = q.on_deck(2).await.into_iter().map(|e| e.payload).collect();
        assert_eq!(deck, vec!["a-payload", "b-payload"]);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_same_identity() {
        let q = Arc::new(queue(1));

        let (first, second) = tokio::join!(admit(&q, "dup", Tier::FREE), admit(&q, "dup", Tier::FREE));

        let added = [first, second].iter().filter(|r| r.is_added()).count();
        let duplicates = [first, second]
            .iter()
            .filter(|r| **r == AdmissionResult::AlreadyInQueue)
            .count();
        assert_eq!(added, 1);
        assert_eq!(duplicates, 1);
        assert_eq!(q.len().await, 1);
    }
}
