//! Periodic refresh scheduling.
//!
//! [`RefreshScheduler`] owns the single repeating refresh trigger of a view.
//! It is poll-driven: the UI loop calls [`RefreshScheduler::poll`] with the
//! current instant and the scheduler decides whether a tick is due.
//!
//! A tick refreshes the target only when the target's view is visible and no
//! other build is in flight. Ticks that do not qualify are dropped, never
//! queued.
//!
//! ## Reloading
//!
//! Components that can be swapped at runtime expose a [`ReloadHooks`] record.
//! The scheduler side of a reload is [`RefreshScheduler::prepare_for_reload`]
//! (stop, so nothing fires against half-replaced state) followed by
//! [`RefreshScheduler::resume_after_reload`] (re-arm and refresh at once).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Result;

/// Something the scheduler can refresh.
pub trait RefreshTarget {
    /// Whether the view fed by this target is currently on screen.
    fn is_visible(&self) -> bool;

    /// Rebuild and re-render. Must be synchronous.
    fn refresh(&mut self) -> Result<()>;
}

/// What happened on a poll or tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not armed, or the next tick is not due yet
    Idle,
    /// The target was refreshed
    Refreshed,
    /// The view was not visible; tick dropped
    Hidden,
    /// Another build was still running; tick dropped
    Overlapping,
    /// The refresh returned an error; previous output stays in place
    Failed,
}

/// Counters for scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub refreshed: u64,
    pub skipped_hidden: u64,
    pub skipped_overlap: u64,
    pub failed: u64,
}

/// Marks a build as in flight until dropped.
#[derive(Debug)]
pub struct BuildGuard {
    flag: Arc<AtomicBool>,
}

impl BuildGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owner of a view's periodic refresh trigger.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    interval: Option<Duration>,
    next_due: Option<Instant>,
    in_flight: Arc<AtomicBool>,
    stats: RefreshStats,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the trigger to fire every `interval`, first at `now + interval`.
    ///
    /// Re-arming replaces any previous trigger.
    pub fn start(&mut self, interval: Duration, now: Instant) {
        self.interval = Some(interval);
        self.next_due = Some(now + interval);
        tracing::debug!(interval_secs = interval.as_secs(), "Refresh scheduler armed");
    }

    /// Disarm the trigger. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if self.next_due.take().is_some() {
            tracing::debug!("Refresh scheduler stopped");
        }
    }

    /// Change the interval used by the next `start` or `resume_after_reload`.
    ///
    /// An armed trigger keeps its current deadline.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = Some(interval);
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Interval of the last `start`, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn stats(&self) -> RefreshStats {
        self.stats
    }

    /// Claim the build slot for a refresh started outside the scheduler,
    /// such as a manual refresh. Returns `None` while a build is running.
    pub fn begin_build(&self) -> Option<BuildGuard> {
        BuildGuard::try_acquire(&self.in_flight)
    }

    /// Fire a tick if one is due at `now`.
    ///
    /// The next tick is scheduled one interval after `now`, so a stalled loop
    /// never produces a burst of catch-up ticks.
    pub fn poll<T: RefreshTarget + ?Sized>(&mut self, now: Instant, target: &mut T) -> TickOutcome {
        match (self.next_due, self.interval) {
            (Some(due), Some(interval)) if now >= due => {
                self.next_due = Some(now + interval);
                self.tick(target)
            }
            _ => TickOutcome::Idle,
        }
    }

    /// Run one tick immediately, regardless of the timer.
    pub fn tick<T: RefreshTarget + ?Sized>(&mut self, target: &mut T) -> TickOutcome {
        if !target.is_visible() {
            self.stats.skipped_hidden += 1;
            tracing::trace!("Refresh tick skipped: view not visible");
            return TickOutcome::Hidden;
        }

        let Some(_guard) = self.begin_build() else {
            self.stats.skipped_overlap += 1;
            tracing::debug!("Refresh tick dropped: build already in flight");
            return TickOutcome::Overlapping;
        };

        match target.refresh() {
            Ok(()) => {
                self.stats.refreshed += 1;
                TickOutcome::Refreshed
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!(error = %e, "Refresh failed; keeping previous table");
                TickOutcome::Failed
            }
        }
    }

    /// Stop the trigger before the state it refreshes is replaced.
    pub fn prepare_for_reload(&mut self) {
        self.stop();
    }

    /// Re-arm with the previous interval and refresh at once.
    pub fn resume_after_reload<T: RefreshTarget + ?Sized>(
        &mut self,
        now: Instant,
        target: &mut T,
    ) -> TickOutcome {
        if let Some(interval) = self.interval {
            self.start(interval, now);
        }
        self.tick(target)
    }
}

/// Lifecycle hooks of a reloadable component, resolved once at registration.
///
/// `before` is mandatory and must stop anything that could fire against the
/// component while it is swapped; `after` is optional.
pub struct ReloadHooks<T: ?Sized> {
    pub before: fn(&mut T),
    pub after: Option<fn(&mut T)>,
}

impl<T: ?Sized> Clone for ReloadHooks<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ReloadHooks<T> {}

impl<T: ?Sized> ReloadHooks<T> {
    pub fn new(before: fn(&mut T)) -> Self {
        Self {
            before,
            after: None,
        }
    }

    pub fn with_after(mut self, after: fn(&mut T)) -> Self {
        self.after = Some(after);
        self
    }

    /// Run `before`, then `swap`, then `after`.
    ///
    /// `after` runs even when `swap` fails so the component resumes on its old
    /// state; the swap error is returned.
    pub fn reload<F>(&self, target: &mut T, swap: F) -> Result<()>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        (self.before)(target);
        let swapped = swap(target);
        if let Some(after) = self.after {
            after(target);
        }
        swapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct CountingTarget {
        visible: bool,
        refreshes: u32,
        fail: bool,
    }

    impl RefreshTarget for CountingTarget {
        fn is_visible(&self) -> bool {
            self.visible
        }

        fn refresh(&mut self) -> Result<()> {
            if self.fail {
                return Err(Error::Config("boom".to_string()));
            }
            self.refreshes += 1;
            Ok(())
        }
    }

    fn visible() -> CountingTarget {
        CountingTarget {
            visible: true,
            ..Default::default()
        }
    }

    const INTERVAL: Duration = Duration::from_secs(30);

    #[test]
    fn test_poll_fires_once_per_interval() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new();
        let mut target = visible();

        assert_eq!(scheduler.poll(t0, &mut target), TickOutcome::Idle);
        scheduler.start(INTERVAL, t0);
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(29), &mut target), TickOutcome::Idle);
        assert_eq!(scheduler.poll(t0 + INTERVAL, &mut target), TickOutcome::Refreshed);
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(31), &mut target), TickOutcome::Idle);
        assert_eq!(scheduler.poll(t0 + Duration::from_secs(60), &mut target), TickOutcome::Refreshed);
        assert_eq!(target.refreshes, 2);
    }

    #[test]
    fn test_stalled_loop_does_not_burst() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new();
        let mut target = visible();
        scheduler.start(INTERVAL, t0);

        let late = t0 + Duration::from_secs(300);
        assert_eq!(scheduler.poll(late, &mut target), TickOutcome::Refreshed);
        assert_eq!(scheduler.poll(late, &mut target), TickOutcome::Idle);
        assert_eq!(target.refreshes, 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new();
        let mut target = visible();
        scheduler.start(INTERVAL, t0);
        scheduler.stop();
        scheduler.stop();

        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.poll(t0 + INTERVAL * 3, &mut target), TickOutcome::Idle);
        assert_eq!(target.refreshes, 0);
    }

    #[test]
    fn test_hidden_view_ticks_are_dropped() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new();
        let mut target = CountingTarget::default();
        scheduler.start(INTERVAL, t0);

        assert_eq!(scheduler.poll(t0 + INTERVAL, &mut target), TickOutcome::Hidden);
        assert_eq!(target.refreshes, 0);
        assert_eq!(scheduler.stats().skipped_hidden, 1);
        // Still armed for the next interval.
        assert!(scheduler.is_armed());
    }

    #[test]
    fn test_overlapping_tick_is_dropped() {
        let mut scheduler = RefreshScheduler::new();
        let mut target = visible();

        let guard = scheduler.begin_build().expect("slot should be free");
        assert!(scheduler.begin_build().is_none());
        assert_eq!(scheduler.tick(&mut target), TickOutcome::Overlapping);
        drop(guard);

        assert_eq!(scheduler.tick(&mut target), TickOutcome::Refreshed);
        assert_eq!(target.refreshes, 1);
        assert_eq!(scheduler.stats().skipped_overlap, 1);
    }

    #[test]
    fn test_failed_refresh_is_reported_and_releases_slot() {
        let mut scheduler = RefreshScheduler::new();
        let mut target = CountingTarget {
            visible: true,
            fail: true,
            ..Default::default()
        };

        assert_eq!(scheduler.tick(&mut target), TickOutcome::Failed);
        assert_eq!(scheduler.stats().failed, 1);
        assert!(scheduler.begin_build().is_some());
    }

    #[test]
    fn test_reload_adds_exactly_one_tick() {
        let t0 = Instant::now();
        let secs = |s: u64| t0 + Duration::from_secs(s);
        let mut scheduler = RefreshScheduler::new();
        let mut target = visible();
        scheduler.start(INTERVAL, t0);

        assert_eq!(scheduler.poll(secs(30), &mut target), TickOutcome::Refreshed);

        scheduler.prepare_for_reload();
        // Nothing fires while the reload is in progress.
        assert_eq!(scheduler.poll(secs(60), &mut target), TickOutcome::Idle);
        assert_eq!(scheduler.poll(secs(90), &mut target), TickOutcome::Idle);
        assert_eq!(target.refreshes, 1);

        assert_eq!(
            scheduler.resume_after_reload(secs(95), &mut target),
            TickOutcome::Refreshed
        );
        assert_eq!(target.refreshes, 2);

        // Back on the regular interval, measured from the resume.
        assert_eq!(scheduler.poll(secs(120), &mut target), TickOutcome::Idle);
        assert_eq!(scheduler.poll(secs(125), &mut target), TickOutcome::Refreshed);
        assert_eq!(target.refreshes, 3);
    }

    #[test]
    fn test_resume_uses_updated_interval() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new();
        let mut target = visible();
        scheduler.start(INTERVAL, t0);

        scheduler.prepare_for_reload();
        scheduler.set_interval(Duration::from_secs(10));
        assert!(!scheduler.is_armed());
        scheduler.resume_after_reload(t0, &mut target);

        assert_eq!(scheduler.interval(), Some(Duration::from_secs(10)));
        assert_eq!(
            scheduler.poll(t0 + Duration::from_secs(10), &mut target),
            TickOutcome::Refreshed
        );
    }

    struct Component {
        scheduler: RefreshScheduler,
        target: CountingTarget,
        generation: u32,
        now: Instant,
    }

    impl Component {
        fn before(&mut self) {
            self.scheduler.prepare_for_reload();
        }

        fn after(&mut self) {
            let now = self.now;
            self.scheduler.resume_after_reload(now, &mut self.target);
        }
    }

    #[test]
    fn test_reload_hooks_run_in_order() {
        let now = Instant::now();
        let mut component = Component {
            scheduler: RefreshScheduler::new(),
            target: visible(),
            generation: 1,
            now,
        };
        component.scheduler.start(INTERVAL, now);

        let hooks = ReloadHooks::new(Component::before).with_after(Component::after);
        hooks
            .reload(&mut component, |c| {
                assert!(!c.scheduler.is_armed(), "before must stop the scheduler");
                c.generation += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(component.generation, 2);
        assert!(component.scheduler.is_armed());
        assert_eq!(component.target.refreshes, 1);
    }

    #[test]
    fn test_reload_hooks_resume_after_failed_swap() {
        let now = Instant::now();
        let mut component = Component {
            scheduler: RefreshScheduler::new(),
            target: visible(),
            generation: 1,
            now,
        };
        component.scheduler.start(INTERVAL, now);

        let hooks = ReloadHooks::new(Component::before).with_after(Component::after);
        let result = hooks.reload(&mut component, |_| Err(Error::Config("bad".to_string())));

        assert!(result.is_err());
        assert_eq!(component.generation, 1);
        assert!(component.scheduler.is_armed());
    }

    #[test]
    fn test_reload_without_after_leaves_scheduler_stopped() {
        let now = Instant::now();
        let mut component = Component {
            scheduler: RefreshScheduler::new(),
            target: visible(),
            generation: 1,
            now,
        };
        component.scheduler.start(INTERVAL, now);

        let hooks = ReloadHooks::new(Component::before);
        hooks.reload(&mut component, |_| Ok(())).unwrap();
        assert!(!component.scheduler.is_armed());
        assert_eq!(component.target.refreshes, 0);
    }
}
