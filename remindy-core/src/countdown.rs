//! Live countdown for a mounted, scheduled reminder.
//!
//! A [`CountdownClock`] is `Idle` until mounted with a scheduled status, then
//! `Ticking`: a tokio task recomputes the label once per second and publishes
//! it on a watch channel. The repeating timer is held by a [`TickerGuard`];
//! every path out of `Ticking` (unmount, status change, stop, drop) releases
//! it exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

use crate::clock::Clock;
use crate::reminder::ReminderStatus;

pub const OVERDUE_LABEL: &str = "00d 00h 00m 00s";

const TICK: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownState {
    pub remaining_label: String,
    pub is_overdue: bool,
}

/// Countdown to `target` as seen at `now`.
///
/// The difference is truncated to whole seconds first, so anything under a
/// second away already counts as overdue.
pub fn countdown_at(target: DateTime<Utc>, now: DateTime<Utc>) -> CountdownState {
    let secs = (target - now).num_seconds();
    if secs <= 0 {
        return CountdownState {
            remaining_label: OVERDUE_LABEL.to_string(),
            is_overdue: true,
        };
    }
    CountdownState {
        remaining_label: format_remaining(secs),
        is_overdue: false,
    }
}

/// `1d 1h 1m 1s`; leading zero units are dropped, seconds always shown.
pub fn format_remaining(total_secs: i64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if days > 0 || hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

/// Count of live repeating timers, shareable across clocks.
#[derive(Debug, Clone, Default)]
pub struct TimerGauge(Arc<AtomicUsize>);

impl TimerGauge {
    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns one repeating tick task. Released on `release()` or drop.
#[derive(Debug)]
pub struct TickerGuard {
    handle: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    gauge: TimerGauge,
}

impl TickerGuard {
    fn spawn(
        runtime: &Handle,
        clock: Arc<dyn Clock>,
        target: DateTime<Utc>,
        state: Arc<watch::Sender<CountdownState>>,
        gauge: TimerGauge,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        gauge.0.fetch_add(1, Ordering::SeqCst);
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                // A tick racing with release must not publish.
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                state.send_replace(countdown_at(target, clock.now()));
            }
        });

        Self {
            handle: Some(handle),
            cancelled,
            gauge,
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancelled.store(true, Ordering::SeqCst);
            handle.abort();
            self.gauge.0.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    Idle,
    Ticking,
}

pub struct CountdownClock {
    clock: Arc<dyn Clock>,
    runtime: Handle,
    gauge: TimerGauge,
    state: Arc<watch::Sender<CountdownState>>,
    target: Option<DateTime<Utc>>,
    /// `None` while unmounted.
    status: Option<ReminderStatus>,
    ticker: Option<TickerGuard>,
}

impl CountdownClock {
    pub fn new(clock: Arc<dyn Clock>, runtime: Handle) -> Self {
        let (tx, _rx) = watch::channel(CountdownState::default());
        Self {
            clock,
            runtime,
            gauge: TimerGauge::default(),
            state: Arc::new(tx),
            target: None,
            status: None,
            ticker: None,
        }
    }

    pub fn with_gauge(mut self, gauge: TimerGauge) -> Self {
        self.gauge = gauge;
        self
    }

    /// Display appeared. Starts ticking if `status` is scheduled.
    pub fn mount(&mut self, target: DateTime<Utc>, status: ReminderStatus) {
        self.target = Some(target);
        self.status = Some(status);
        self.sync();
    }

    /// Display went away.
    pub fn unmount(&mut self) {
        self.status = None;
        self.release();
    }

    /// Reminder status changed upstream.
    pub fn set_status(&mut self, status: ReminderStatus) {
        if self.status.is_none() || self.status == Some(status) {
            return;
        }
        self.status = Some(status);
        self.sync();
    }

    /// Reminder was rescheduled while displayed.
    pub fn retarget(&mut self, target: DateTime<Utc>) {
        if self.target == Some(target) {
            return;
        }
        self.target = Some(target);
        if self.ticker.is_some() {
            self.start(target);
        }
    }

    /// Stop ticking without unmounting. Remount or a status change restarts.
    pub fn stop(&mut self) {
        self.release();
    }

    pub fn phase(&self) -> ClockPhase {
        if self.ticker.is_some() {
            ClockPhase::Ticking
        } else {
            ClockPhase::Idle
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.phase() == ClockPhase::Ticking
    }

    pub fn current(&self) -> CountdownState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.state.subscribe()
    }

    fn sync(&mut self) {
        match (self.status, self.target) {
            (Some(ReminderStatus::Scheduled), Some(target)) => self.start(target),
            _ => self.release(),
        }
    }

    fn start(&mut self, target: DateTime<Utc>) {
        self.release();
        self.state.send_replace(countdown_at(target, self.clock.now()));
        self.ticker = Some(TickerGuard::spawn(
            &self.runtime,
            Arc::clone(&self.clock),
            target,
            Arc::clone(&self.state),
            self.gauge.clone(),
        ));
        trace!(%target, "countdown ticking");
    }

    fn release(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.release();
            trace!("countdown idle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 6, 12, 0, 0).unwrap()
    }

    fn clock_with(mock: &MockClock, gauge: &TimerGauge) -> CountdownClock {
        CountdownClock::new(Arc::new(mock.clone()), Handle::current()).with_gauge(gauge.clone())
    }

    #[test]
    fn labels() {
        let now = start();
        assert_eq!(
            countdown_at(now + Duration::milliseconds(90_061_000), now).remaining_label,
            "1d 1h 1m 1s"
        );
        assert_eq!(
            countdown_at(now + Duration::milliseconds(45_000), now).remaining_label,
            "45s"
        );
        assert!(
            countdown_at(now + Duration::milliseconds(172_800_000), now)
                .remaining_label
                .contains("2d")
        );
        assert_eq!(format_remaining(86_405), "1d 0h 0m 5s");
        assert_eq!(format_remaining(3_605), "1h 0m 5s");
    }

    #[test]
    fn sub_second_and_past_are_overdue() {
        let now = start();
        for diff in [500, 0, -1, -86_400_000] {
            let s = countdown_at(now + Duration::milliseconds(diff), now);
            assert!(s.is_overdue, "{diff}");
            assert_eq!(s.remaining_label, OVERDUE_LABEL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mount_then_unmount_leaves_no_timer() {
        let mock = MockClock::new(start());
        let gauge = TimerGauge::default();
        let mut cd = clock_with(&mock, &gauge);

        cd.mount(start() + Duration::minutes(5), ReminderStatus::Scheduled);
        assert_eq!(gauge.active(), 1);
        cd.unmount();
        assert_eq!(gauge.active(), 0);
        assert_eq!(cd.phase(), ClockPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_each_second_while_mounted() {
        let mock = MockClock::new(start());
        let gauge = TimerGauge::default();
        let mut cd = clock_with(&mock, &gauge);
        let mut rx = cd.subscribe();

        cd.mount(start() + Duration::seconds(5), ReminderStatus::Scheduled);
        assert_eq!(rx.borrow_and_update().remaining_label, "5s");

        mock.advance(Duration::seconds(1));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().remaining_label, "4s");

        mock.advance(Duration::seconds(10));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_overdue);
        // Overdue does not stop the clock; a status change does.
        assert!(cd.is_ticking());

        cd.unmount();
        mock.advance(Duration::seconds(10));
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn status_change_releases_timer() {
        let mock = MockClock::new(start());
        let gauge = TimerGauge::default();
        let mut cd = clock_with(&mock, &gauge);

        cd.mount(start() + Duration::minutes(1), ReminderStatus::Scheduled);
        assert!(cd.is_ticking());
        cd.set_status(ReminderStatus::Completed);
        assert!(!cd.is_ticking());
        assert_eq!(gauge.active(), 0);

        cd.set_status(ReminderStatus::Scheduled);
        assert!(cd.is_ticking());
        cd.stop();
        assert_eq!(gauge.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_scheduled_mount_stays_idle() {
        let mock = MockClock::new(start());
        let gauge = TimerGauge::default();
        let mut cd = clock_with(&mock, &gauge);

        cd.mount(start() + Duration::minutes(1), ReminderStatus::Failed);
        assert_eq!(cd.phase(), ClockPhase::Idle);
        assert_eq!(gauge.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_never_duplicates_timers() {
        let mock = MockClock::new(start());
        let gauge = TimerGauge::default();
        let mut a = clock_with(&mock, &gauge);
        let mut b = clock_with(&mock, &gauge);

        a.mount(start() + Duration::minutes(1), ReminderStatus::Scheduled);
        a.mount(start() + Duration::minutes(2), ReminderStatus::Scheduled);
        a.retarget(start() + Duration::minutes(3));
        b.mount(start() + Duration::minutes(1), ReminderStatus::Scheduled);
        assert_eq!(gauge.active(), 2);
        assert_eq!(a.current().remaining_label, "3m 0s");

        drop(a);
        assert_eq!(gauge.active(), 1);
        b.unmount();
        assert_eq!(gauge.active(), 0);
    }
}
