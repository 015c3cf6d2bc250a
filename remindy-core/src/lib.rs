//! remindy-core: timezone-correct scheduling and countdowns for voice-call reminders

pub mod catalog;
pub mod clock;
pub mod compose;
pub mod countdown;
pub mod dashboard;
pub mod error;
pub mod phone;
pub mod reminder;
pub mod time;

pub use catalog::{COUNTRIES, Country, TIMEZONES, CatalogTimezone, nearest_catalog_timezone};
pub use clock::{Clock, FixedTimezone, MockClock, SystemClock, SystemTimezone, TimezoneProvider};
pub use compose::{ComposedSchedule, PinnedSchedule, ScheduleComposer, ScheduleInput};
pub use countdown::{
    ClockPhase, CountdownClock, CountdownState, TickerGuard, TimerGauge, countdown_at,
};
pub use dashboard::{DashboardState, Modal, SortChoice};
pub use error::{ConvertError, Field, FieldErrors, ValidationError};
pub use phone::{PhoneParts, split_phone};
pub use reminder::{
    CreateReminder, ListQuery, ReminderPage, ReminderRecord, ReminderStatus, SortOrder,
    StatusFilter, UpdateReminder,
};
pub use time::{
    DisplayTime, LocalDateTime, display_local, format_instant, parse_instant, to_browser_local,
    to_local, to_utc,
};
