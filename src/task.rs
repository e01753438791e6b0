//! Single-shot delayed task
//!
//! A cancellable, restartable timer entry owned by the event loop. The loop
//! asks for [`DelayedTask::deadline`] to know when to wake up and calls
//! [`DelayedTask::fire_if_due`] when it does. Restarting replaces the pending
//! deadline, so there is never more than one live timer.

use std::time::Duration;
use tokio::time::Instant;

/// Fire-after-delay task with cancel-and-replace semantics
#[derive(Debug, Clone)]
pub struct DelayedTask {
    delay: Duration,
    deadline: Option<Instant>,
    /// Number of times the task was (re)armed, for diagnostics
    generation: u64,
}

impl DelayedTask {
    /// Create a killed task with the given delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the task to fire `delay` after `now`, replacing any pending deadline
    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
        self.generation += 1;
    }

    /// Cancel the pending deadline, if any
    pub fn kill(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true exactly once when the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    #[test]
    fn test_new_task_is_killed() {
        let mut task = DelayedTask::new(DELAY);
        assert!(!task.is_armed());
        assert!(!task.fire_if_due(Instant::now() + DELAY * 10));
    }

    #[test]
    fn test_fires_once_after_delay() {
        let start = Instant::now();
        let mut task = DelayedTask::new(DELAY);
        task.restart(start);

        assert!(!task.fire_if_due(start + Duration::from_millis(499)));
        assert!(task.fire_if_due(start + DELAY));
        assert!(!task.fire_if_due(start + DELAY * 2));
        assert!(!task.is_armed());
    }

    #[test]
    fn test_restart_replaces_deadline() {
        let start = Instant::now();
        let mut task = DelayedTask::new(DELAY);
        task.restart(start);
        task.restart(start + Duration::from_millis(300));

        assert_eq!(task.deadline(), Some(start + Duration::from_millis(800)));
        assert_eq!(task.generation(), 2);
        // The first deadline no longer exists
        assert!(!task.fire_if_due(start + DELAY));
        assert!(task.fire_if_due(start + Duration::from_millis(800)));
    }

    #[test]
    fn test_kill_cancels() {
        let start = Instant::now();
        let mut task = DelayedTask::new(DELAY);
        task.restart(start);
        task.kill();
        assert!(!task.fire_if_due(start + DELAY));
    }
}
