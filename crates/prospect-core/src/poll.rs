use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Deadline-driven repeating timer.
///
/// The scheduler never sleeps or spawns; the owner asks for the next
/// deadline, waits however it likes, then calls [`PollingScheduler::poll`].
/// At most one token is active at a time. Ticks that fall due while the
/// surface is hidden are skipped, and a late poll never fires more than once.
#[derive(Debug)]
pub struct PollingScheduler<T> {
    active: Option<Active<T>>,
    visible: bool,
    skipped: u64,
}

#[derive(Debug)]
struct Active<T> {
    token: T,
    interval: Duration,
    next_due: Instant,
}

impl<T: Clone> PollingScheduler<T> {
    pub fn new() -> Self {
        Self {
            active: None,
            visible: true,
            skipped: 0,
        }
    }

    /// Begin ticking for `token`, replacing whatever was active. The first
    /// tick is due one interval after `now`.
    pub fn start(&mut self, token: T, interval: Duration, now: Instant) {
        let interval = interval.max(Duration::from_millis(1));
        self.active = Some(Active {
            token,
            interval,
            next_due: now + interval,
        });
    }

    /// Cancel the active token. Does nothing when idle.
    pub fn stop(&mut self) {
        self.active = None;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn token(&self) -> Option<&T> {
        self.active.as_ref().map(|active| &active.token)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|active| active.next_due)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Ticks that fell due while hidden.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Returns the token when a tick is due at `now`. Missed intervals are
    /// not caught up; the next tick is due one interval after `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let active = self.active.as_mut()?;
        if now < active.next_due {
            return None;
        }
        active.next_due = now + active.interval;
        if !self.visible {
            self.skipped += 1;
            return None;
        }
        Some(active.token.clone())
    }
}

impl<T: Clone> Default for PollingScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(5000);

    #[test]
    fn first_tick_is_one_interval_after_start() {
        let t0 = Instant::now();
        let mut scheduler = PollingScheduler::new();
        scheduler.start(7u32, INTERVAL, t0);
        assert_eq!(scheduler.poll(t0), None);
        assert_eq!(scheduler.poll(t0 + Duration::from_millis(4999)), None);
        assert_eq!(scheduler.poll(t0 + INTERVAL), Some(7));
        assert_eq!(scheduler.next_deadline(), Some(t0 + INTERVAL * 2));
    }

    #[test]
    fn late_poll_fires_once_without_catch_up() {
        let t0 = Instant::now();
        let mut scheduler = PollingScheduler::new();
        scheduler.start("a", INTERVAL, t0);
        let late = t0 + INTERVAL * 4;
        assert_eq!(scheduler.poll(late), Some("a"));
        assert_eq!(scheduler.poll(late), None);
        assert_eq!(scheduler.next_deadline(), Some(late + INTERVAL));
    }

    #[test]
    fn start_replaces_previous_token() {
        let t0 = Instant::now();
        let mut scheduler = PollingScheduler::new();
        scheduler.start(1u32, INTERVAL, t0);
        scheduler.start(2u32, INTERVAL, t0 + Duration::from_secs(1));
        assert_eq!(scheduler.token(), Some(&2));
        assert_eq!(scheduler.poll(t0 + INTERVAL), None);
        assert_eq!(
            scheduler.poll(t0 + Duration::from_secs(1) + INTERVAL),
            Some(2)
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let t0 = Instant::now();
        let mut scheduler: PollingScheduler<u32> = PollingScheduler::new();
        scheduler.stop();
        assert!(!scheduler.is_active());
        scheduler.start(1, INTERVAL, t0);
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.poll(t0 + INTERVAL), None);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn hidden_ticks_are_skipped_and_counted() {
        let t0 = Instant::now();
        let mut scheduler = PollingScheduler::new();
        scheduler.start(1u32, INTERVAL, t0);
        scheduler.set_visible(false);
        assert_eq!(scheduler.poll(t0 + INTERVAL), None);
        assert_eq!(scheduler.skipped(), 1);
        assert!(scheduler.is_active());

        scheduler.set_visible(true);
        assert_eq!(scheduler.poll(t0 + INTERVAL * 2), Some(1));
    }
}
