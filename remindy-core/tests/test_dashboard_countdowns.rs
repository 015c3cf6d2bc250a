use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use remindy_core::{
    CountdownClock, DashboardState, MockClock, ReminderPage, ReminderRecord, ReminderStatus,
    StatusFilter, TimerGauge,
};
use tokio::runtime::Handle;

fn record(id: &str, status: ReminderStatus, at: &str) -> ReminderRecord {
    ReminderRecord {
        id: id.into(),
        title: format!("call {id}"),
        message: "hello".into(),
        phone_number: "+15551234567".into(),
        masked_phone_number: Some("+1******4567".into()),
        scheduled_time_utc: at.into(),
        timezone: "America/New_York".into(),
        status,
        time_remaining_seconds: 0.0,
        failure_reason: None,
        created_at: None,
        updated_at: None,
    }
}

fn mount_page(
    state: &DashboardState,
    mock: &MockClock,
    gauge: &TimerGauge,
) -> HashMap<String, CountdownClock> {
    let mut cards = HashMap::new();
    for r in &state.reminders {
        let Ok(target) = r.scheduled_instant() else {
            continue;
        };
        let mut clock = CountdownClock::new(Arc::new(mock.clone()), Handle::current())
            .with_gauge(gauge.clone());
        clock.mount(target, r.status);
        cards.insert(r.id.clone(), clock);
    }
    cards
}

#[tokio::test(start_paused = true)]
async fn test_only_scheduled_cards_tick_and_tab_switch_releases_all() {
    let mock = MockClock::new(Utc.with_ymd_and_hms(2026, 1, 6, 19, 0, 0).unwrap());
    let gauge = TimerGauge::default();

    let mut state = DashboardState::default();
    state.apply_loaded(ReminderPage {
        page: 1,
        per_page: 25,
        total_items: 4,
        items: vec![
            record("a", ReminderStatus::Scheduled, "2026-01-06T19:57:00"),
            record("b", ReminderStatus::Scheduled, "2026-01-07T20:00:05Z"),
            record("c", ReminderStatus::Completed, "2026-01-05T10:00:00"),
            record("d", ReminderStatus::Scheduled, "garbage"),
        ],
    });

    let mut cards = mount_page(&state, &mock, &gauge);
    assert_eq!(cards.len(), 3);
    assert_eq!(gauge.active(), 2);
    assert_eq!(cards["a"].current().remaining_label, "57m 0s");
    assert_eq!(cards["b"].current().remaining_label, "1d 1h 0m 5s");
    assert!(!cards["c"].is_ticking());

    mock.advance(Duration::minutes(57));
    let mut rx = cards["a"].subscribe();
    rx.changed().await.unwrap();
    assert!(rx.borrow().is_overdue);

    state.set_tab(StatusFilter::Failed);
    for (_, mut clock) in cards.drain() {
        clock.unmount();
    }
    assert_eq!(gauge.active(), 0);
    assert_eq!(state.page, 1);
}
