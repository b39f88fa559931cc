//! Issues statistics requests to the worker and decides which responses count
//!
//! Only the most recently issued request is authoritative. Responses for any
//! other id, or for a request that already timed out, are dropped here
//! rather than in the worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::worker::{BackgroundStatsWorker, WorkerFailure, WorkerResponse};
use super::RequestId;
use crate::data::record::{Domain, Series};
use crate::data::stats::VariableStats;
use crate::error::{Result, TrendError};

/// Bookkeeping for one issued request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRequest {
    pub domain: Domain,
    pub issued_at: Instant,
}

/// Issued requests still awaiting a terminal response
#[derive(Debug, Default)]
pub struct RequestTable {
    latest: Option<RequestId>,
    in_flight: HashMap<RequestId, PendingRequest>,
}

impl RequestTable {
    pub fn issue(&mut self, request_id: RequestId, domain: Domain, now: Instant) {
        self.latest = Some(request_id);
        self.in_flight.insert(
            request_id,
            PendingRequest {
                domain,
                issued_at: now,
            },
        );
    }

    pub fn latest(&self) -> Option<RequestId> {
        self.latest
    }

    /// `true` when `request_id` is the newest request and still unanswered
    pub fn is_current(&self, request_id: RequestId) -> bool {
        self.latest == Some(request_id) && self.in_flight.contains_key(&request_id)
    }

    pub fn resolve(&mut self, request_id: RequestId) -> Option<PendingRequest> {
        self.in_flight.remove(&request_id)
    }

    /// The current request when its budget has run out
    pub fn expired(&self, now: Instant, budget: Duration) -> Option<RequestId> {
        let id = self.latest?;
        let pending = self.in_flight.get(&id)?;
        (now.saturating_duration_since(pending.issued_at) >= budget).then_some(id)
    }

    pub fn is_waiting(&self) -> bool {
        self.latest.is_some_and(|id| self.in_flight.contains_key(&id))
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn clear(&mut self) {
        self.latest = None;
        self.in_flight.clear();
    }
}

/// Something the UI should react to
#[derive(Debug)]
pub enum SchedulerEvent {
    Progress {
        request_id: RequestId,
        percent: u8,
    },
    Ready {
        request_id: RequestId,
        domain: Domain,
        stats: Vec<VariableStats>,
    },
    Failed(TrendError),
}

/// Owns the worker and the request table
pub struct StatsScheduler {
    worker: BackgroundStatsWorker,
    table: RequestTable,
    budget: Duration,
    threshold: usize,
}

impl StatsScheduler {
    pub fn new(progress_interval: usize, budget: Duration, threshold: usize) -> Self {
        Self {
            worker: BackgroundStatsWorker::with_settings(progress_interval),
            table: RequestTable::default(),
            budget,
            threshold,
        }
    }

    /// Whether the window holds enough points to be worth the worker round trip
    pub fn should_offload(&self, series: &[Series], domain: Domain) -> bool {
        window_point_count(series, domain) > self.threshold
    }

    /// Issue a request; any earlier one becomes stale
    pub fn submit(&mut self, domain: Domain, series: Arc<[Series]>) -> Result<RequestId> {
        let request_id = self.worker.submit(domain, series)?;
        self.table.issue(request_id, domain, Instant::now());
        tracing::debug!(%request_id, start = domain.start, end = domain.end, "statistics request issued");
        Ok(request_id)
    }

    /// Next relevant event, if any (non-blocking)
    pub fn poll(&mut self) -> Option<SchedulerEvent> {
        loop {
            let response = match self.worker.poll() {
                Ok(Some(response)) => response,
                Ok(None) => return None,
                Err(err) => {
                    if !self.table.is_waiting() {
                        return None;
                    }
                    self.table.clear();
                    return Some(SchedulerEvent::Failed(err));
                }
            };

            let request_id = response.request_id();
            if !self.table.is_current(request_id) {
                if !matches!(response, WorkerResponse::Progress { .. }) {
                    self.table.resolve(request_id);
                }
                tracing::trace!(%request_id, latest = ?self.table.latest(), "discarded stale statistics response");
                continue;
            }

            return Some(match response {
                WorkerResponse::Progress { percent, .. } => SchedulerEvent::Progress {
                    request_id,
                    percent,
                },
                WorkerResponse::Result { stats, .. } => {
                    let domain = match self.table.resolve(request_id) {
                        Some(pending) => pending.domain,
                        None => continue,
                    };
                    SchedulerEvent::Ready {
                        request_id,
                        domain,
                        stats,
                    }
                }
                WorkerResponse::Error { reason, .. } => {
                    self.table.resolve(request_id);
                    SchedulerEvent::Failed(match reason {
                        WorkerFailure::Cancelled => TrendError::WorkerCancelled { request_id },
                        WorkerFailure::Failed(reason) => {
                            tracing::warn!(%request_id, %reason, "statistics request failed");
                            TrendError::WorkerFailed { request_id, reason }
                        }
                    })
                }
            });
        }
    }

    /// Turn an over-budget request into a retryable timeout
    pub fn expire(&mut self, now: Instant) -> Option<SchedulerEvent> {
        let request_id = self.table.expired(now, self.budget)?;
        self.table.resolve(request_id);
        self.worker.cancel(request_id);
        tracing::warn!(%request_id, budget_ms = self.budget.as_millis() as u64, "statistics request timed out");
        Some(SchedulerEvent::Failed(TrendError::WorkerTimeout {
            request_id,
            budget: self.budget,
        }))
    }

    /// Drop the current request; its late responses will be discarded
    pub fn cancel(&mut self) {
        if let Some(request_id) = self.table.latest() {
            if self.table.resolve(request_id).is_some() {
                self.worker.cancel(request_id);
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.table.is_waiting()
    }

    pub fn table(&self) -> &RequestTable {
        &self.table
    }
}

/// Total points of `series` inside `domain`
pub fn window_point_count(series: &[Series], domain: Domain) -> usize {
    series.iter().map(|s| s.window(domain).len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{Point, VariableId};

    fn dataset(n: i64) -> Arc<[Series]> {
        vec![Series::new(
            VariableId::new("A", ""),
            (0..n).map(|i| Point::new(i, (i % 17) as f64)).collect::<Vec<_>>(),
        )]
        .into()
    }

    fn wait_for_ready(scheduler: &mut StatsScheduler) -> Vec<SchedulerEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            match scheduler.poll() {
                Some(event @ SchedulerEvent::Ready { .. }) => {
                    events.push(event);
                    break;
                }
                Some(event) => events.push(event),
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        events
    }

    #[test]
    fn test_request_table_tracks_latest() {
        let mut table = RequestTable::default();
        let domain = Domain::new(0, 10).unwrap();
        let now = Instant::now();

        table.issue(RequestId(1), domain, now);
        table.issue(RequestId(2), domain, now);
        assert!(!table.is_current(RequestId(1)));
        assert!(table.is_current(RequestId(2)));
        assert_eq!(table.in_flight_len(), 2);

        assert!(table.resolve(RequestId(2)).is_some());
        assert!(!table.is_current(RequestId(2)));
        assert!(!table.is_waiting());
    }

    #[test]
    fn test_request_table_expiry() {
        let mut table = RequestTable::default();
        let issued = Instant::now();
        table.issue(RequestId(3), Domain::new(0, 1).unwrap(), issued);

        assert_eq!(table.expired(issued, Duration::from_millis(50)), None);
        assert_eq!(
            table.expired(issued + Duration::from_millis(50), Duration::from_millis(50)),
            Some(RequestId(3))
        );
    }

    #[test]
    fn test_latest_request_wins() {
        let mut scheduler = StatsScheduler::new(1000, Duration::from_secs(10), 0);
        let series = dataset(20_000);

        let first = scheduler
            .submit(Domain::new(0, 19_999).unwrap(), series.clone())
            .unwrap();
        let second = scheduler
            .submit(Domain::new(100, 200).unwrap(), series)
            .unwrap();
        assert_ne!(first, second);

        let events = wait_for_ready(&mut scheduler);
        match events.last() {
            Some(SchedulerEvent::Ready {
                request_id,
                domain,
                stats,
            }) => {
                assert_eq!(*request_id, second);
                assert_eq!(*domain, Domain::new(100, 200).unwrap());
                assert_eq!(stats[0].stats.map(|s| s.count), Some(101));
            }
            other => panic!("expected ready event, got {other:?}"),
        }
        assert!(events.iter().all(|e| match e {
            SchedulerEvent::Progress { request_id, .. } => *request_id == second,
            SchedulerEvent::Ready { request_id, .. } => *request_id == second,
            SchedulerEvent::Failed(_) => false,
        }));
        assert!(!scheduler.is_busy());
    }

    #[test]
    fn test_timeout_is_retryable_and_late_result_discarded() {
        let mut scheduler = StatsScheduler::new(1000, Duration::ZERO, 0);
        scheduler
            .submit(Domain::new(0, 10).unwrap(), dataset(100))
            .unwrap();

        match scheduler.expire(Instant::now()) {
            Some(SchedulerEvent::Failed(err)) => {
                assert!(matches!(err, TrendError::WorkerTimeout { .. }));
                assert!(err.is_retryable());
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        std::thread::sleep(Duration::from_millis(100));
        assert!(scheduler.poll().is_none());
        assert!(!scheduler.is_busy());
    }

    #[test]
    fn test_should_offload_threshold() {
        let scheduler = StatsScheduler::new(1000, Duration::from_secs(1), 50);
        let series = dataset(100);
        assert!(scheduler.should_offload(&series, Domain::new(0, 99).unwrap()));
        assert!(!scheduler.should_offload(&series, Domain::new(0, 10).unwrap()));
    }
}
