//! Heartbeat tracking and the watchdog probe
//!
//! The device sends a heartbeat (`48/5`) periodically. Each one is answered
//! with an acknowledgement and refreshes the last-heartbeat instant. A
//! watchdog timer checks the silence since then; once it exceeds the timeout,
//! every tick sends a device info request to nudge the device. The probe does
//! not refresh the timer, only a real heartbeat does, and nothing here ever
//! closes the connection.

use mfd_protocol::{device_info_request, heartbeat_ack, Envelope};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Liveness as seen at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessStatus {
    /// Not armed yet (no connection opened)
    Idle,
    /// Heartbeat seen within the timeout
    Alive,
    /// Heartbeat silence exceeded the timeout
    Silent,
}

/// Tracks heartbeat receipt time for the current connection.
#[derive(Debug)]
pub struct LivenessMonitor {
    timeout: Duration,
    last_heartbeat: Option<Instant>,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_heartbeat: None,
        }
    }

    /// Start measuring silence from `now` (called when a connection opens).
    pub fn arm(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }

    /// Record a heartbeat and return the acknowledgement to send.
    pub fn on_heartbeat(&mut self, now: Instant) -> Envelope {
        self.last_heartbeat = Some(now);
        heartbeat_ack()
    }

    /// Watchdog check: a device info request if the device has been silent too long.
    pub fn check(&self, now: Instant) -> Option<Envelope> {
        match self.status(now) {
            LivenessStatus::Silent => Some(device_info_request()),
            LivenessStatus::Idle | LivenessStatus::Alive => None,
        }
    }

    pub fn status(&self, now: Instant) -> LivenessStatus {
        match self.since_heartbeat(now) {
            None => LivenessStatus::Idle,
            Some(elapsed) if elapsed > self.timeout => LivenessStatus::Silent,
            Some(_) => LivenessStatus::Alive,
        }
    }

    /// Time since the last heartbeat (or since arming)
    pub fn since_heartbeat(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat
            .map(|last| now.saturating_duration_since(last))
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.last_heartbeat
    }
}

/// The periodic watchdog timer.
///
/// At most one interval exists at a time: arming replaces any previous one.
#[derive(Debug, Default)]
pub struct Watchdog {
    interval: Option<Interval>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm the timer. The first tick fires one `period` from now.
    pub fn arm(&mut self, period: Duration) {
        self.disarm();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn disarm(&mut self) {
        self.interval = None;
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Wait for the next tick. Never completes while disarmed.
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(10_000);

    #[test]
    fn test_idle_until_armed() {
        let monitor = LivenessMonitor::new(TIMEOUT);
        let now = Instant::now();
        assert_eq!(monitor.status(now), LivenessStatus::Idle);
        assert!(monitor.check(now + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_heartbeat_produces_one_ack() {
        let mut monitor = LivenessMonitor::new(TIMEOUT);
        let now = Instant::now();
        let ack = monitor.on_heartbeat(now);
        assert_eq!(ack.message_type, 128);
        assert_eq!(ack.message_cmd, 0);
        assert_eq!(ack.size, 1);
        assert_eq!(ack.data, vec![0]);
        assert_eq!(monitor.last_heartbeat(), Some(now));
    }

    #[test]
    fn test_probe_only_after_timeout() {
        let mut monitor = LivenessMonitor::new(TIMEOUT);
        let opened = Instant::now();
        monitor.arm(opened);

        assert!(monitor.check(opened + Duration::from_millis(5_000)).is_none());
        assert!(monitor.check(opened + TIMEOUT).is_none());

        let probe = monitor.check(opened + Duration::from_millis(10_001)).unwrap();
        assert_eq!(probe.message_type, 49);
        assert_eq!(probe.message_cmd, 1);
        assert_eq!(probe.data, vec![0, 0, 0]);
    }

    #[test]
    fn test_probe_does_not_reset_timer() {
        let mut monitor = LivenessMonitor::new(TIMEOUT);
        let opened = Instant::now();
        monitor.arm(opened);

        let t1 = opened + Duration::from_millis(15_000);
        assert!(monitor.check(t1).is_some());
        assert!(monitor.check(t1 + Duration::from_millis(5_000)).is_some());
        assert_eq!(monitor.last_heartbeat(), Some(opened));
    }

    #[test]
    fn test_heartbeat_resets_timer() {
        let mut monitor = LivenessMonitor::new(TIMEOUT);
        let opened = Instant::now();
        monitor.arm(opened);

        let late = opened + Duration::from_millis(20_000);
        assert_eq!(monitor.status(late), LivenessStatus::Silent);
        monitor.on_heartbeat(late);
        assert_eq!(monitor.status(late + Duration::from_millis(5_000)), LivenessStatus::Alive);
        assert!(monitor.check(late + Duration::from_millis(5_000)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_ticks_once_per_period() {
        let mut watchdog = Watchdog::new();
        assert!(!watchdog.is_armed());

        let start = Instant::now();
        watchdog.arm(Duration::from_millis(5_000));
        let first = watchdog.tick().await;
        assert_eq!(first - start, Duration::from_millis(5_000));
        let second = watchdog.tick().await;
        assert_eq!(second - first, Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let mut watchdog = Watchdog::new();
        watchdog.arm(Duration::from_millis(5_000));
        tokio::time::advance(Duration::from_millis(3_000)).await;

        let rearmed_at = Instant::now();
        watchdog.arm(Duration::from_millis(5_000));
        let tick = watchdog.tick().await;
        assert_eq!(tick - rearmed_at, Duration::from_millis(5_000));

        watchdog.disarm();
        assert!(!watchdog.is_armed());
        let pending = tokio::time::timeout(Duration::from_secs(30), watchdog.tick()).await;
        assert!(pending.is_err());
    }
}
