//! Background worker for window statistics
//!
//! The worker owns no shared mutable state: requests and responses travel
//! over `std::sync::mpsc` channels. At most one computation runs at a time,
//! and the running one polls its own request channel every
//! `progress_interval` records, so a newer request or an explicit cancel
//! stops it early. A superseded request always gets a `Cancelled` error.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use super::RequestId;
use crate::constants::stats::PROGRESS_INTERVAL;
use crate::data::record::{Domain, Series};
use crate::data::stats::{VariableStats, WindowStats};
use crate::error::{Result, TrendError};

/// One statistics job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsRequest {
    pub request_id: RequestId,
    pub domain: Domain,
    pub series: Arc<[Series]>,
}

/// Messages sent to the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerRequest {
    Compute(StatsRequest),
    Cancel { request_id: RequestId },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerFailure {
    /// Superseded by a newer request or cancelled explicitly
    Cancelled,
    /// The computation panicked
    Failed(String),
}

/// Messages returned by the worker; every variant echoes its request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerResponse {
    Progress {
        request_id: RequestId,
        percent: u8,
    },
    Result {
        request_id: RequestId,
        stats: Vec<VariableStats>,
    },
    Error {
        request_id: RequestId,
        reason: WorkerFailure,
    },
}

impl WorkerResponse {
    pub fn request_id(&self) -> RequestId {
        match self {
            WorkerResponse::Progress { request_id, .. }
            | WorkerResponse::Result { request_id, .. }
            | WorkerResponse::Error { request_id, .. } => *request_id,
        }
    }

    /// Terminal outcome, `None` for progress
    pub fn into_outcome(self) -> Option<Result<Vec<VariableStats>>> {
        match self {
            WorkerResponse::Progress { .. } => None,
            WorkerResponse::Result { stats, .. } => Some(Ok(stats)),
            WorkerResponse::Error {
                request_id,
                reason: WorkerFailure::Cancelled,
            } => Some(Err(TrendError::WorkerCancelled { request_id })),
            WorkerResponse::Error {
                request_id,
                reason: WorkerFailure::Failed(reason),
            } => Some(Err(TrendError::WorkerFailed { request_id, reason })),
        }
    }
}

/// Handle to the worker thread. Dropping it shuts the thread down.
pub struct BackgroundStatsWorker {
    tx: Sender<WorkerRequest>,
    rx: Receiver<WorkerResponse>,
    handle: Option<JoinHandle<()>>,
    next_id: AtomicU64,
}

impl BackgroundStatsWorker {
    pub fn spawn() -> Self {
        Self::with_settings(PROGRESS_INTERVAL)
    }

    /// Report progress and poll for cancellation every `progress_interval` records
    pub fn with_settings(progress_interval: usize) -> Self {
        let (req_tx, req_rx) = channel::<WorkerRequest>();
        let (res_tx, res_rx) = channel::<WorkerResponse>();

        let handle = thread::Builder::new()
            .name("stats-worker".into())
            .spawn(move || WorkerLoop::new(req_rx, res_tx, progress_interval).run())
            .map_err(|e| tracing::warn!(error = %e, "failed to spawn statistics worker"))
            .ok();

        Self {
            tx: req_tx,
            rx: res_rx,
            handle,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_request_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Queue a computation and return its id (non-blocking)
    pub fn submit(&self, domain: Domain, series: Arc<[Series]>) -> Result<RequestId> {
        let request_id = self.next_request_id();
        self.tx
            .send(WorkerRequest::Compute(StatsRequest {
                request_id,
                domain,
                series,
            }))
            .map_err(|_| TrendError::WorkerDisconnected)?;
        Ok(request_id)
    }

    pub fn cancel(&self, request_id: RequestId) {
        let _ = self.tx.send(WorkerRequest::Cancel { request_id });
    }

    /// Poll for a response (non-blocking)
    pub fn poll(&self) -> Result<Option<WorkerResponse>> {
        match self.rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TrendError::WorkerDisconnected),
        }
    }
}

impl Drop for BackgroundStatsWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Why a running computation stopped early
enum Interrupt {
    Cancelled,
    Shutdown,
}

/// What to do after absorbing one incoming message
#[derive(PartialEq)]
enum Control {
    Continue,
    Stop,
}

struct WorkerLoop {
    rx: Receiver<WorkerRequest>,
    tx: Sender<WorkerResponse>,
    pending: Option<StatsRequest>,
    progress_interval: usize,
    reduce: fn(&[f64]) -> Option<WindowStats>,
}

impl WorkerLoop {
    fn new(rx: Receiver<WorkerRequest>, tx: Sender<WorkerResponse>, progress_interval: usize) -> Self {
        Self {
            rx,
            tx,
            pending: None,
            progress_interval: progress_interval.max(1),
            reduce: WindowStats::compute,
        }
    }

    fn run(mut self) {
        loop {
            if self.pending.is_none() {
                match self.rx.recv() {
                    Ok(message) => {
                        if self.absorb(message) == Control::Stop {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }

            // Only the newest queued request survives
            if self.drain() == Control::Stop {
                return;
            }

            let Some(request) = self.pending.take() else {
                continue;
            };

            if self.execute(request) == Control::Stop {
                return;
            }
        }
    }

    /// Absorb queued messages without blocking
    fn drain(&mut self) -> Control {
        loop {
            match self.rx.try_recv() {
                Ok(message) => {
                    if self.absorb(message) == Control::Stop {
                        return Control::Stop;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return Control::Continue;
                }
            }
        }
    }

    fn absorb(&mut self, message: WorkerRequest) -> Control {
        match message {
            WorkerRequest::Compute(request) => {
                if let Some(superseded) = self.pending.replace(request) {
                    self.send_cancelled(superseded.request_id);
                }
                Control::Continue
            }
            WorkerRequest::Cancel { request_id } => {
                if self.pending.as_ref().map(|p| p.request_id) == Some(request_id) {
                    self.pending = None;
                    self.send_cancelled(request_id);
                }
                Control::Continue
            }
            WorkerRequest::Shutdown => Control::Stop,
        }
    }

    fn send_cancelled(&self, request_id: RequestId) {
        tracing::debug!(%request_id, "statistics request cancelled");
        let _ = self.tx.send(WorkerResponse::Error {
            request_id,
            reason: WorkerFailure::Cancelled,
        });
    }

    fn execute(&mut self, request: StatsRequest) -> Control {
        profiling::scope!("stats_worker_execute");

        let request_id = request.request_id;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.compute(&request)));

        match outcome {
            Ok(Ok(stats)) => {
                let _ = self.tx.send(WorkerResponse::Result { request_id, stats });
                Control::Continue
            }
            Ok(Err(Interrupt::Cancelled)) => {
                self.send_cancelled(request_id);
                Control::Continue
            }
            Ok(Err(Interrupt::Shutdown)) => {
                self.send_cancelled(request_id);
                Control::Stop
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "statistics computation panicked".to_string());
                tracing::warn!(%request_id, %reason, "statistics worker failed");
                let _ = self.tx.send(WorkerResponse::Error {
                    request_id,
                    reason: WorkerFailure::Failed(reason),
                });
                Control::Continue
            }
        }
    }

    fn compute(&mut self, request: &StatsRequest) -> std::result::Result<Vec<VariableStats>, Interrupt> {
        let windows: Vec<_> = request
            .series
            .iter()
            .map(|s| (s, s.window(request.domain)))
            .collect();
        let total: usize = windows.iter().map(|(_, w)| w.len()).sum();

        let mut processed = 0usize;
        // Records since the last report, carried across series
        let mut since_report = 0usize;
        let mut results = Vec::with_capacity(windows.len());

        for (series, window) in windows {
            let mut values = Vec::with_capacity(window.len());
            for point in window.iter() {
                values.push(point.value);
                processed += 1;
                since_report += 1;

                if since_report == self.progress_interval {
                    since_report = 0;
                    let percent = (processed * 100 / total.max(1)).min(100) as u8;
                    let _ = self.tx.send(WorkerResponse::Progress {
                        request_id: request.request_id,
                        percent,
                    });
                    self.check_interrupt(request.request_id)?;
                }
            }

            results.push(VariableStats {
                variable: series.variable.clone(),
                stats: (self.reduce)(&values),
            });
        }

        Ok(results)
    }

    /// Cooperative cancellation point
    fn check_interrupt(&mut self, current: RequestId) -> std::result::Result<(), Interrupt> {
        loop {
            match self.rx.try_recv() {
                Ok(WorkerRequest::Compute(newer)) => {
                    // The newer request starts after the current one reports cancellation
                    if let Some(superseded) = self.pending.replace(newer) {
                        self.send_cancelled(superseded.request_id);
                    }
                    return Err(Interrupt::Cancelled);
                }
                Ok(WorkerRequest::Cancel { request_id }) if request_id == current => {
                    return Err(Interrupt::Cancelled);
                }
                Ok(WorkerRequest::Cancel { .. }) => {}
                Ok(WorkerRequest::Shutdown) => return Err(Interrupt::Shutdown),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{Point, VariableId};
    use crate::data::stats::compute_stats;

    fn dataset(n: i64) -> Arc<[Series]> {
        vec![
            Series::new(
                VariableId::new("A", ""),
                (0..n).map(|i| Point::new(i, i as f64)).collect::<Vec<_>>(),
            ),
            Series::new(
                VariableId::new("B", "bar"),
                (0..n).map(|i| Point::new(i * 2, 1.0)).collect::<Vec<_>>(),
            ),
        ]
        .into()
    }

    fn request(id: u64, series: &Arc<[Series]>) -> WorkerRequest {
        WorkerRequest::Compute(StatsRequest {
            request_id: RequestId(id),
            domain: Domain::new(0, 10_000).unwrap(),
            series: series.clone(),
        })
    }

    /// Run the loop on this thread over pre-queued messages
    fn run_loop(messages: Vec<WorkerRequest>, interval: usize) -> Vec<WorkerResponse> {
        let (req_tx, req_rx) = channel();
        let (res_tx, res_rx) = channel();
        for m in messages {
            req_tx.send(m).unwrap();
        }
        drop(req_tx);
        WorkerLoop::new(req_rx, res_tx, interval).run();
        res_rx.try_iter().collect()
    }

    #[test]
    fn test_superseded_request_gets_cancellation() {
        let series = dataset(100);
        let responses = run_loop(vec![request(1, &series), request(2, &series)], 1000);

        assert_eq!(
            responses[0],
            WorkerResponse::Error {
                request_id: RequestId(1),
                reason: WorkerFailure::Cancelled
            }
        );
        let last = responses.last().unwrap();
        assert_eq!(last.request_id(), RequestId(2));
        assert!(matches!(last, WorkerResponse::Result { .. }));
        // R1 never produces a success
        assert!(!responses
            .iter()
            .any(|r| matches!(r, WorkerResponse::Result { request_id, .. } if *request_id == RequestId(1))));
    }

    #[test]
    fn test_explicit_cancel() {
        let series = dataset(10);
        let responses = run_loop(
            vec![
                request(5, &series),
                WorkerRequest::Cancel {
                    request_id: RequestId(5),
                },
            ],
            1000,
        );
        assert_eq!(
            responses,
            vec![WorkerResponse::Error {
                request_id: RequestId(5),
                reason: WorkerFailure::Cancelled
            }]
        );
    }

    #[test]
    fn test_progress_cadence_and_result() {
        let series = dataset(5000);
        let responses = run_loop(vec![request(9, &series)], 1000);

        let progress: Vec<u8> = responses
            .iter()
            .filter_map(|r| match r {
                WorkerResponse::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        // A: 5000 points in window, B: 5000 points with t <= 10_000 → 5000
        assert_eq!(progress.len(), 10);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100));

        match responses.last().unwrap() {
            WorkerResponse::Result { request_id, stats } => {
                assert_eq!(*request_id, RequestId(9));
                assert_eq!(stats, &compute_stats(&series, Domain::new(0, 10_000).unwrap()));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    /// `count` series of `len` points each, all inside the test domain
    fn short_series(count: usize, len: i64) -> Arc<[Series]> {
        (0..count)
            .map(|c| {
                Series::new(
                    VariableId::new(format!("S{c}"), ""),
                    (0..len).map(|i| Point::new(i, c as f64)).collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn progress_count(responses: &[WorkerResponse]) -> usize {
        responses
            .iter()
            .filter(|r| matches!(r, WorkerResponse::Progress { .. }))
            .count()
    }

    /// Block until the worker answers, with a generous timeout
    fn wait_for(worker: &BackgroundStatsWorker) -> WorkerResponse {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if let Some(response) = worker.poll().unwrap() {
                return response;
            }
            assert!(std::time::Instant::now() < deadline, "worker did not answer");
            thread::sleep(std::time::Duration::from_millis(2));
        }
    }

    #[test]
    fn test_progress_spans_short_series() {
        // 50 × 999 records: no single series reaches the interval
        let series = short_series(50, 999);
        let responses = run_loop(vec![request(3, &series)], 1000);

        assert_eq!(progress_count(&responses), 49_950 / 1000);
        assert!(matches!(
            responses.last(),
            Some(WorkerResponse::Result { stats, .. }) if stats.len() == 50
        ));
    }

    #[test]
    fn test_newer_request_interrupts_short_series() {
        let series = short_series(50, 999);
        let (req_tx, req_rx) = channel();
        let (res_tx, res_rx) = channel();
        let mut worker = WorkerLoop::new(req_rx, res_tx, 1000);

        // R2 is already queued when R1 reaches its first checkpoint
        req_tx.send(request(2, &series)).unwrap();
        let WorkerRequest::Compute(first) = request(1, &series) else {
            unreachable!()
        };
        assert!(worker.execute(first) == Control::Continue);

        let responses: Vec<_> = res_rx.try_iter().collect();
        assert_eq!(progress_count(&responses), 1);
        assert_eq!(
            responses.last(),
            Some(&WorkerResponse::Error {
                request_id: RequestId(1),
                reason: WorkerFailure::Cancelled
            })
        );
        assert_eq!(worker.pending.as_ref().map(|p| p.request_id), Some(RequestId(2)));
    }

    #[test]
    fn test_panicking_computation_reports_failure() {
        let series = dataset(10);
        let (req_tx, req_rx) = channel();
        let (res_tx, res_rx) = channel();
        req_tx.send(request(4, &series)).unwrap();
        drop(req_tx);

        let mut worker = WorkerLoop::new(req_rx, res_tx, 1000);
        worker.reduce = |_| panic!("reduction exploded");
        worker.run();

        let responses: Vec<_> = res_rx.try_iter().collect();
        assert_eq!(
            responses,
            vec![WorkerResponse::Error {
                request_id: RequestId(4),
                reason: WorkerFailure::Failed("reduction exploded".into())
            }]
        );
        assert!(matches!(
            responses[0].clone().into_outcome(),
            Some(Err(TrendError::WorkerFailed { request_id: RequestId(4), .. }))
        ));
    }

    #[test]
    fn test_panic_does_not_stop_the_loop() {
        let series = dataset(10);
        let (req_tx, req_rx) = channel();
        let (res_tx, res_rx) = channel();
        let mut worker = WorkerLoop::new(req_rx, res_tx, 1000);
        worker.reduce = |_| panic!("reduction exploded");

        let WorkerRequest::Compute(first) = request(6, &series) else {
            unreachable!()
        };
        assert!(worker.execute(first) == Control::Continue);

        worker.reduce = WindowStats::compute;
        req_tx.send(request(7, &series)).unwrap();
        drop(req_tx);
        worker.run();

        let responses: Vec<_> = res_rx.try_iter().collect();
        assert!(matches!(
            responses[0],
            WorkerResponse::Error {
                request_id: RequestId(6),
                reason: WorkerFailure::Failed(_)
            }
        ));
        assert!(matches!(
            responses.last(),
            Some(WorkerResponse::Result { request_id: RequestId(7), .. })
        ));
    }

    #[test]
    fn test_thread_round_trip_matches_inline() {
        let series = dataset(2500);
        let domain = Domain::new(100, 3000).unwrap();
        let worker = BackgroundStatsWorker::with_settings(500);
        let id = worker.submit(domain, series.clone()).unwrap();

        let remote = loop {
            let response = wait_for(&worker);
            assert_eq!(response.request_id(), id);
            if let Some(outcome) = response.into_outcome() {
                break outcome.unwrap();
            }
        };
        let local = compute_stats(&series, domain);
        assert_eq!(remote, local);
    }

    #[test]
    fn test_poll_after_submit() {
        let worker = BackgroundStatsWorker::spawn();
        let id = worker
            .submit(Domain::new(0, 5).unwrap(), dataset(10))
            .unwrap();

        let response = wait_for(&worker);
        assert_eq!(response.request_id(), id);
        assert!(matches!(
            response.into_outcome(),
            Some(Ok(ref stats)) if stats.len() == 2
        ));
    }

    #[test]
    fn test_outcome_maps_to_errors() {
        let cancelled = WorkerResponse::Error {
            request_id: RequestId(2),
            reason: WorkerFailure::Cancelled,
        };
        assert!(matches!(
            cancelled.into_outcome(),
            Some(Err(TrendError::WorkerCancelled { .. }))
        ));

        let failed = WorkerResponse::Error {
            request_id: RequestId(2),
            reason: WorkerFailure::Failed("boom".into()),
        };
        let err = failed.into_outcome().unwrap().unwrap_err();
        assert!(err.is_retryable());
    }
}
