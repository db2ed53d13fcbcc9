//! Cancellable timer registry
//!
//! Timers are keyed by [`TimerKind`]; arming a kind replaces whatever timer of
//! that kind was live, so no kind can ever have two live timers. Time is a
//! virtual offset from session start, advanced by the caller (the runtime
//! maps tokio instants onto it, tests step it directly). Nothing here sleeps.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

/// Shortest interval period accepted; guards against a zero-period spin
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Timer kinds owned by a player session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Periodic progress sync (interval)
    ProgressSync,
    /// Auto-advance countdown tick (interval, 1s)
    AutoAdvance,
    /// Controls auto-hide (one-shot)
    ControlsHide,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Duration,
    period: Option<Duration>,
}

/// Timer registry for one session
#[derive(Debug, Default)]
pub struct Timers {
    now: Duration,
    slots: BTreeMap<TimerKind, Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move virtual time forward without firing anything
    ///
    /// Time never moves backward.
    pub fn set_now(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Arm a one-shot timer, replacing any live timer of the same kind
    pub fn arm_once(&mut self, kind: TimerKind, delay: Duration) {
        let deadline = self.now + delay;
        if self
            .slots
            .insert(kind, Timer { deadline, period: None })
            .is_some()
        {
            trace!(?kind, "Replaced live timer");
        }
        trace!(?kind, ?deadline, "Armed one-shot timer");
    }

    /// Arm an interval timer whose first tick is one period from now
    pub fn arm_interval(&mut self, kind: TimerKind, period: Duration) {
        let period = period.max(MIN_PERIOD);
        let deadline = self.now + period;
        if self
            .slots
            .insert(
                kind,
                Timer {
                    deadline,
                    period: Some(period),
                },
            )
            .is_some()
        {
            trace!(?kind, "Replaced live timer");
        }
        trace!(?kind, ?period, "Armed interval timer");
    }

    /// Cancel the timer of this kind; returns whether one was live
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let was_live = self.slots.remove(&kind).is_some();
        if was_live {
            trace!(?kind, "Cancelled timer");
        }
        was_live
    }

    pub fn cancel_all(&mut self) {
        self.slots.clear();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Number of live timers of a kind (0 or 1)
    pub fn live_count(&self, kind: TimerKind) -> usize {
        usize::from(self.is_armed(kind))
    }

    /// Number of live timers of all kinds
    pub fn total_live(&self) -> usize {
        self.slots.len()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.slots.values().map(|t| t.deadline).min()
    }

    /// Fire the earliest timer due at or before `until`
    ///
    /// Virtual time moves to that timer's deadline. One-shot timers are
    /// removed; interval timers are rescheduled one period later. Ties fire
    /// in `TimerKind` order. Call repeatedly until it returns `None`.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerKind> {
        let (kind, timer) = self
            .slots
            .iter()
            .filter(|(_, t)| t.deadline <= until)
            .min_by_key(|(kind, t)| (t.deadline, **kind))
            .map(|(kind, t)| (*kind, *t))?;

        self.set_now(timer.deadline);
        match timer.period {
            Some(period) => {
                self.slots.insert(
                    kind,
                    Timer {
                        deadline: timer.deadline + period,
                        period: Some(period),
                    },
                );
            }
            None => {
                self.slots.remove(&kind);
            }
        }
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_rearming_replaces_existing_timer() {
        let mut timers = Timers::new();
        timers.arm_interval(TimerKind::ProgressSync, secs(10));
        timers.arm_interval(TimerKind::ProgressSync, secs(10));
        timers.arm_interval(TimerKind::ProgressSync, secs(10));

        assert_eq!(timers.live_count(TimerKind::ProgressSync), 1);
        assert_eq!(timers.total_live(), 1);
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut timers = Timers::new();
        timers.arm_once(TimerKind::ControlsHide, secs(3));

        assert_eq!(timers.pop_due(secs(2)), None);
        assert_eq!(timers.pop_due(secs(3)), Some(TimerKind::ControlsHide));
        assert_eq!(timers.now(), secs(3));
        assert_eq!(timers.pop_due(secs(100)), None);
        assert!(!timers.is_armed(TimerKind::ControlsHide));
    }

    #[test]
    fn test_interval_reschedules() {
        let mut timers = Timers::new();
        timers.arm_interval(TimerKind::AutoAdvance, secs(1));

        let mut fired = 0;
        while timers.pop_due(secs(5)).is_some() {
            fired += 1;
        }
        assert_eq!(fired, 5);
        assert_eq!(timers.next_deadline(), Some(secs(6)));
    }

    #[test]
    fn test_earliest_deadline_fires_first() {
        let mut timers = Timers::new();
        timers.arm_interval(TimerKind::ProgressSync, secs(10));
        timers.arm_once(TimerKind::ControlsHide, secs(3));

        assert_eq!(timers.next_deadline(), Some(secs(3)));
        assert_eq!(timers.pop_due(secs(20)), Some(TimerKind::ControlsHide));
        assert_eq!(timers.pop_due(secs(20)), Some(TimerKind::ProgressSync));
    }

    #[test]
    fn test_cancel() {
        let mut timers = Timers::new();
        timers.arm_interval(TimerKind::ProgressSync, secs(10));
        assert!(timers.cancel(TimerKind::ProgressSync));
        assert!(!timers.cancel(TimerKind::ProgressSync));
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn test_arm_is_relative_to_current_time() {
        let mut timers = Timers::new();
        timers.set_now(secs(7));
        timers.arm_once(TimerKind::ControlsHide, secs(3));
        assert_eq!(timers.next_deadline(), Some(secs(10)));

        // Time never moves backward
        timers.set_now(secs(2));
        assert_eq!(timers.now(), secs(7));
    }
}
