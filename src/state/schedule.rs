//! Cancellable deadline task used to coalesce rapid domain changes

use std::time::{Duration, Instant};

/// A single pending deadline. Re-scheduling pushes the deadline back, so a
/// continuous drag fires once, `delay` after the last movement.
///
/// Time is passed in by the caller; the task never reads the clock itself.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    delay: Duration,
    deadline: Option<Instant>,
}

impl ScheduledTask {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Arm (or re-arm) the task to fire `delay` after `now`
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Arm the task so the next poll at or after `now` fires
    pub fn schedule_now(&mut self, now: Instant) {
        self.deadline = Some(now);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the deadline, for repaint scheduling
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// `true` exactly once when the deadline has passed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Fire immediately if pending
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_delay() {
        let start = Instant::now();
        let mut task = ScheduledTask::new(Duration::from_millis(75));

        task.schedule(start);
        assert!(!task.poll(start + Duration::from_millis(74)));
        assert!(task.poll(start + Duration::from_millis(75)));
        assert!(!task.poll(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_reschedule_coalesces() {
        let start = Instant::now();
        let mut task = ScheduledTask::new(Duration::from_millis(75));

        for i in 0..10 {
            task.schedule(start + Duration::from_millis(i * 10));
        }
        // Last schedule at +90ms → fires at +165ms
        assert!(!task.poll(start + Duration::from_millis(160)));
        assert!(task.poll(start + Duration::from_millis(165)));
    }

    #[test]
    fn test_cancel_and_flush() {
        let start = Instant::now();
        let mut task = ScheduledTask::new(Duration::from_millis(75));

        task.schedule(start);
        task.cancel();
        assert!(!task.is_pending());
        assert!(!task.poll(start + Duration::from_secs(1)));

        task.schedule(start);
        assert_eq!(task.remaining(start), Some(Duration::from_millis(75)));
        assert!(task.flush());
        assert!(!task.flush());
    }
}
