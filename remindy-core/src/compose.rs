//! Schedule composition: form fields -> validated UTC instant, and back.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{default_country, is_supported_timezone, nearest_catalog_timezone};
use crate::clock::{Clock, TimezoneProvider};
use crate::error::{Field, FieldErrors, ValidationError};
use crate::phone::{is_e164, join_phone, normalize_phone, split_phone};
use crate::reminder::{CreateReminder, ReminderRecord, UpdateReminder};
use crate::time::{
    format_instant, parse_date, parse_time, parse_tz, resolve_local, LocalDateTime,
};

pub const QUICK_CREATE_LEAD_MINUTES: i64 = 1;
pub const QUICK_CREATE_MESSAGE: &str = "This is a quick reminder call.";

/// Create/edit form state. Lives only while the form is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub title: String,
    pub message: String,
    /// Dialing code and national number, e.g. `"+1 5550000000"`.
    pub phone: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, seconds optional
    pub time: String,
    pub timezone: String,
    /// Pre-filled by the system a short lead into the future; skips the past check.
    #[serde(default)]
    pub quick_create: bool,
    /// Stored schedule the form was filled from. Kept as-is while date, time
    /// and timezone still read the same, so an untouched schedule never moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<PinnedSchedule>,
}

impl ScheduleInput {
    pub fn local(&self) -> Option<LocalDateTime> {
        LocalDateTime::parse(&self.date, &self.time)
    }

    /// The pinned instant, if the schedule fields haven't been edited.
    pub fn pinned_instant(&self) -> Option<DateTime<Utc>> {
        self.pinned
            .as_ref()
            .filter(|p| {
                p.date == self.date.trim()
                    && p.time == self.time.trim()
                    && p.timezone == self.timezone.trim()
            })
            .map(|p| p.instant)
    }
}

/// Exact instant behind a decomposed schedule and the fields it rendered to.
///
/// Wall-clock fields alone can't always say which instant they came from:
/// the repeated hour of a fall-back day, or sub-second precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedSchedule {
    pub instant: DateTime<Utc>,
    pub date: String,
    pub time: String,
    pub timezone: String,
}

/// A validated schedule ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedSchedule {
    pub title: String,
    pub message: String,
    /// E.164, no whitespace.
    pub phone_number: String,
    pub scheduled_time_utc: DateTime<Utc>,
    pub timezone: String,
}

impl ComposedSchedule {
    pub fn to_create(&self) -> CreateReminder {
        CreateReminder {
            title: self.title.clone(),
            message: self.message.clone(),
            phone_number: self.phone_number.clone(),
            scheduled_time_utc: format_instant(self.scheduled_time_utc),
            timezone: self.timezone.clone(),
        }
    }

    /// Partial update carrying only what differs from `original`.
    ///
    /// Instant and timezone travel together so the server never pairs a new
    /// instant with a stale zone.
    pub fn to_update(&self, original: &ReminderRecord) -> UpdateReminder {
        let mut update = UpdateReminder::default();
        if self.title != original.title {
            update.title = Some(self.title.clone());
        }
        if self.message != original.message {
            update.message = Some(self.message.clone());
        }
        if self.phone_number != normalize_phone(&original.phone_number) {
            update.phone_number = Some(self.phone_number.clone());
        }
        let moved = original.scheduled_instant().ok() != Some(self.scheduled_time_utc);
        if moved || self.timezone != original.timezone {
            update.scheduled_time_utc = Some(format_instant(self.scheduled_time_utc));
            update.timezone = Some(self.timezone.clone());
        }
        update
    }
}

pub struct ScheduleComposer<C: Clock> {
    clock: C,
}

impl<C: Clock> ScheduleComposer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate and convert. All independent field errors are returned together.
    pub fn compose(&self, input: &ScheduleInput) -> Result<ComposedSchedule, FieldErrors> {
        let (errors, instant) = self.check(input);
        match instant {
            Some(scheduled_time_utc) if errors.is_empty() => Ok(ComposedSchedule {
                title: input.title.trim().to_string(),
                message: input.message.trim().to_string(),
                phone_number: normalize_phone(&input.phone),
                scheduled_time_utc,
                timezone: input.timezone.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }

    pub fn validate(&self, input: &ScheduleInput) -> FieldErrors {
        self.check(input).0
    }

    /// Re-check after `field` was edited, clearing errors that no longer apply.
    ///
    /// Date, time and timezone share the schedule rule, so editing any of them
    /// refreshes all three.
    pub fn revalidate_field(&self, input: &ScheduleInput, field: Field, errors: &mut FieldErrors) {
        let fresh = self.validate(input);
        let affected: &[Field] = match field {
            Field::Date | Field::Time | Field::Timezone => {
                &[Field::Date, Field::Time, Field::Timezone]
            }
            Field::Title => &[Field::Title],
            Field::Message => &[Field::Message],
            Field::Phone => &[Field::Phone],
        };
        for &f in affected {
            errors.clear(f);
            if let Some(err) = fresh.get(f) {
                errors.insert(f, err);
            }
        }
    }

    fn check(&self, input: &ScheduleInput) -> (FieldErrors, Option<DateTime<Utc>>) {
        let mut errors = FieldErrors::new();

        if input.title.trim().is_empty() {
            errors.insert(Field::Title, ValidationError::RequiredField);
        }
        if input.message.trim().is_empty() {
            errors.insert(Field::Message, ValidationError::RequiredField);
        }

        let phone = normalize_phone(&input.phone);
        if phone.is_empty() {
            errors.insert(Field::Phone, ValidationError::RequiredField);
        } else if !is_e164(&phone) {
            errors.insert(Field::Phone, ValidationError::InvalidPhoneFormat);
        }

        let date = parse_date(&input.date);
        let time = parse_time(&input.time);
        if date.is_none() {
            errors.insert(Field::Date, ValidationError::InvalidDateTime);
        }
        if time.is_none() {
            errors.insert(Field::Time, ValidationError::InvalidDateTime);
        }

        let tz_name = input.timezone.trim();
        let tz = if is_supported_timezone(tz_name) {
            parse_tz(tz_name).ok()
        } else {
            None
        };
        if tz.is_none() {
            errors.insert(Field::Timezone, ValidationError::InvalidTimezone);
        }

        let instant = match (date, time, tz) {
            (Some(date), Some(time), Some(tz)) => Some(
                input
                    .pinned_instant()
                    .unwrap_or_else(|| resolve_local(tz, LocalDateTime::new(date, time).naive())),
            ),
            _ => None,
        };

        if let Some(at) = instant {
            if !input.quick_create && at <= self.clock.now() {
                errors.insert(Field::Date, ValidationError::PastSchedule);
                errors.insert(Field::Time, ValidationError::PastSchedule);
            }
        }

        (errors, instant)
    }

    /// Pre-fill an edit form from a persisted reminder, in the reminder's own zone.
    ///
    /// An unknown stored zone is shown as UTC (and then fails catalog
    /// validation until the user picks one); a malformed stored instant leaves
    /// date and time blank.
    pub fn decompose(&self, record: &ReminderRecord) -> ScheduleInput {
        let (zone, timezone) = match parse_tz(&record.timezone) {
            Ok(zone) => (zone, record.timezone.clone()),
            Err(_) => {
                debug!(
                    id = %record.id,
                    tz = %record.timezone,
                    "unknown stored timezone, editing in UTC"
                );
                (chrono_tz::UTC, "UTC".to_string())
            }
        };

        let (date, time, pinned) = match record.scheduled_instant() {
            Ok(instant) => {
                let local = LocalDateTime::from(instant.with_timezone(&zone).naive_local());
                let (date, time) = (local.date_string(), local.time_string());
                let pinned = PinnedSchedule {
                    instant,
                    date: date.clone(),
                    time: time.clone(),
                    timezone: timezone.clone(),
                };
                (date, time, Some(pinned))
            }
            Err(err) => {
                debug!(id = %record.id, %err, "stored instant unreadable");
                (String::new(), String::new(), None)
            }
        };

        let parts = split_phone(&record.phone_number);

        ScheduleInput {
            title: record.title.clone(),
            message: record.message.clone(),
            phone: join_phone(parts.dial_code(), &parts.national_number),
            date,
            time,
            timezone,
            quick_create: false,
            pinned,
        }
    }

    /// Blank create form defaulting to now, in the detected zone mapped onto
    /// the catalog.
    pub fn create_input(&self, zone: &dyn TimezoneProvider) -> ScheduleInput {
        self.prefilled(self.clock.now(), zone, false)
    }

    /// Quick-create form: a minute from now, future by construction.
    pub fn quick_create_input(&self, zone: &dyn TimezoneProvider) -> ScheduleInput {
        let at = self.clock.now() + Duration::minutes(QUICK_CREATE_LEAD_MINUTES);
        let mut input = self.prefilled(at, zone, true);
        input.message = QUICK_CREATE_MESSAGE.to_string();
        input
    }

    fn prefilled(
        &self,
        at: DateTime<Utc>,
        zone: &dyn TimezoneProvider,
        quick_create: bool,
    ) -> ScheduleInput {
        let name = nearest_catalog_timezone(zone.detected(), at);
        let tz = parse_tz(name).unwrap_or(chrono_tz::UTC);
        let local = LocalDateTime::from(at.with_timezone(&tz).naive_local());

        ScheduleInput {
            title: String::new(),
            message: String::new(),
            phone: default_country().dial_code.to_string(),
            date: local.date_string(),
            time: local.time.format("%H:%M").to_string(),
            timezone: name.to_string(),
            quick_create,
            pinned: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedTimezone, MockClock};
    use crate::reminder::ReminderStatus;
    use chrono::TimeZone;

    fn composer_at(y: i32, m: u32, d: u32, h: u32, min: u32) -> ScheduleComposer<MockClock> {
        ScheduleComposer::new(MockClock::new(
            Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
        ))
    }

    fn input(date: &str, time: &str, tz: &str) -> ScheduleInput {
        ScheduleInput {
            title: "Dentist".into(),
            message: "Bring the insurance card".into(),
            phone: "+1 5550000000".into(),
            date: date.into(),
            time: time.into(),
            timezone: tz.into(),
            quick_create: false,
            pinned: None,
        }
    }

    fn record(utc: &str, tz: &str) -> ReminderRecord {
        ReminderRecord {
            id: "r-1".into(),
            title: "Dentist".into(),
            message: "Bring the insurance card".into(),
            phone_number: "+15550000000".into(),
            masked_phone_number: None,
            scheduled_time_utc: utc.into(),
            timezone: tz.into(),
            status: ReminderStatus::Scheduled,
            time_remaining_seconds: 0.0,
            failure_reason: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn compose_new_york_new_year() {
        let c = composer_at(2026, 1, 1, 0, 0);
        let out = c.compose(&input("2099-12-31", "23:59", "America/New_York")).unwrap();
        assert_eq!(format_instant(out.scheduled_time_utc), "2100-01-01T04:59:00Z");
        assert_eq!(out.phone_number, "+15550000000");
        assert_eq!(out.to_create().scheduled_time_utc, "2100-01-01T04:59:00Z");
    }

    #[test]
    fn past_schedule_rejected_and_next_minute_accepted() {
        // 15:00 UTC == 10:00 in New York (EST).
        let c = composer_at(2026, 1, 6, 15, 0);

        let errs = c.compose(&input("2026-01-06", "09:59", "America/New_York")).unwrap_err();
        assert_eq!(errs.get(Field::Date), Some(ValidationError::PastSchedule));
        assert_eq!(errs.get(Field::Time), Some(ValidationError::PastSchedule));

        let errs = c.compose(&input("2026-01-06", "10:00", "America/New_York")).unwrap_err();
        assert_eq!(errs.get(Field::Date), Some(ValidationError::PastSchedule));

        assert!(c.compose(&input("2026-01-06", "10:01", "America/New_York")).is_ok());
    }

    #[test]
    fn quick_create_skips_past_check() {
        let c = composer_at(2026, 1, 6, 15, 0);
        let mut i = input("2026-01-06", "09:00", "America/New_York");
        i.quick_create = true;
        assert!(c.compose(&i).is_ok());
    }

    #[test]
    fn independent_field_errors_collected() {
        let c = composer_at(2026, 1, 6, 15, 0);
        let i = ScheduleInput {
            title: "   ".into(),
            message: "hi".into(),
            phone: "+1 555".into(),
            date: "2026-02-30".into(),
            time: "25:00".into(),
            timezone: "Mars/Olympus".into(),
            quick_create: false,
            pinned: None,
        };
        let errs = c.compose(&i).unwrap_err();
        assert_eq!(errs.get(Field::Title), Some(ValidationError::RequiredField));
        assert_eq!(errs.get(Field::Phone), Some(ValidationError::InvalidPhoneFormat));
        assert_eq!(errs.get(Field::Date), Some(ValidationError::InvalidDateTime));
        assert_eq!(errs.get(Field::Time), Some(ValidationError::InvalidDateTime));
        assert_eq!(errs.get(Field::Timezone), Some(ValidationError::InvalidTimezone));
        assert!(!errs.contains(Field::Message));
    }

    #[test]
    fn valid_iana_zone_outside_catalog_rejected_on_submit() {
        let c = composer_at(2026, 1, 6, 15, 0);
        let errs = c.compose(&input("2027-01-06", "10:00", "Europe/Bucharest")).unwrap_err();
        assert_eq!(errs.get(Field::Timezone), Some(ValidationError::InvalidTimezone));
    }

    #[test]
    fn empty_phone_is_required() {
        let c = composer_at(2026, 1, 6, 15, 0);
        let mut i = input("2027-01-06", "10:00", "America/New_York");
        i.phone = "  ".into();
        let errs = c.compose(&i).unwrap_err();
        assert_eq!(errs.get(Field::Phone), Some(ValidationError::RequiredField));
    }

    #[test]
    fn revalidate_clears_fixed_field_only() {
        let c = composer_at(2026, 1, 6, 15, 0);
        let mut i = input("2026-01-06", "09:00", "America/New_York");
        i.title.clear();
        let mut errs = c.validate(&i);
        assert!(errs.contains(Field::Title));
        assert!(errs.contains(Field::Time));

        i.time = "11:00".into();
        c.revalidate_field(&i, Field::Time, &mut errs);
        assert!(!errs.contains(Field::Time));
        assert!(!errs.contains(Field::Date));
        assert!(errs.contains(Field::Title));
    }

    #[test]
    fn decompose_uses_record_zone() {
        let c = composer_at(2026, 1, 1, 0, 0);
        let form = c.decompose(&record("2026-01-06T19:57:00Z", "America/New_York"));
        assert_eq!(form.date, "2026-01-06");
        assert_eq!(form.time, "14:57");
        assert_eq!(form.timezone, "America/New_York");
        assert_eq!(form.phone, "+1 5550000000");
    }

    #[test]
    fn decompose_then_compose_is_identity() {
        let c = composer_at(2026, 1, 1, 0, 0);
        for (utc, tz) in [
            ("2026-01-06T19:57:00Z", "America/New_York"),
            ("2026-07-04T08:15:30", "Asia/Kathmandu"),
            ("2026-03-29T00:59:00Z", "Europe/London"),
        ] {
            let rec = record(utc, tz);
            let out = c.compose(&c.decompose(&rec)).unwrap();
            assert_eq!(out.scheduled_time_utc, rec.scheduled_instant().unwrap(), "{utc} {tz}");
            assert!(out.to_update(&rec).is_empty());
        }
    }

    #[test]
    fn decompose_degrades_on_bad_record() {
        let c = composer_at(2026, 1, 1, 0, 0);
        let form = c.decompose(&record("2026-01-06T19:57:00Z", "Not/AZone"));
        assert_eq!(form.timezone, "UTC");
        assert_eq!(form.time, "19:57");

        let form = c.decompose(&record("garbage", "America/New_York"));
        assert!(form.date.is_empty());
        assert_eq!(
            c.validate(&form).get(Field::Date),
            Some(ValidationError::InvalidDateTime)
        );
    }

    #[test]
    fn update_sends_instant_with_zone() {
        let c = composer_at(2026, 1, 1, 0, 0);
        let rec = record("2026-01-06T19:57:00Z", "America/New_York");
        let mut form = c.decompose(&rec);
        form.timezone = "America/Chicago".into();
        let update = c.compose(&form).unwrap().to_update(&rec);
        assert_eq!(update.timezone.as_deref(), Some("America/Chicago"));
        assert_eq!(update.scheduled_time_utc.as_deref(), Some("2026-01-06T20:57:00Z"));
        assert!(update.title.is_none());
    }

    #[test]
    fn title_edit_keeps_second_occurrence_of_repeated_hour() {
        // 06:30Z is the second 01:30 in New York on the fall-back day.
        let c = composer_at(2026, 10, 1, 0, 0);
        let rec = record("2026-11-01T06:30:00Z", "America/New_York");
        let mut form = c.decompose(&rec);
        assert_eq!(form.time, "01:30");
        form.title = "Dentist (moved office)".into();

        let out = c.compose(&form).unwrap();
        assert_eq!(format_instant(out.scheduled_time_utc), "2026-11-01T06:30:00Z");
        let update = out.to_update(&rec);
        assert_eq!(update.title.as_deref(), Some("Dentist (moved office)"));
        assert_eq!(update.scheduled_time_utc, None);
        assert_eq!(update.timezone, None);
    }

    #[test]
    fn retyping_repeated_hour_resolves_to_earlier_occurrence() {
        let c = composer_at(2026, 10, 1, 0, 0);
        let rec = record("2026-11-01T06:30:00Z", "America/New_York");
        let mut form = c.decompose(&rec);
        form.time = "01:30:00".into();
        let update = c.compose(&form).unwrap().to_update(&rec);
        assert_eq!(update.scheduled_time_utc.as_deref(), Some("2026-11-01T05:30:00Z"));
    }

    #[test]
    fn sub_second_instant_survives_unchanged_edit() {
        let c = composer_at(2026, 1, 1, 0, 0);
        let rec = record("2026-01-06T19:57:00.123456", "America/New_York");
        let out = c.compose(&c.decompose(&rec)).unwrap();
        assert_eq!(out.scheduled_time_utc, rec.scheduled_instant().unwrap());
        assert!(out.to_update(&rec).is_empty());
    }

    #[test]
    fn quick_create_prefill() {
        let c = composer_at(2026, 1, 6, 15, 0);
        let form = c.quick_create_input(&FixedTimezone(chrono_tz::America::Toronto));
        assert!(form.quick_create);
        assert_eq!(form.timezone, "America/New_York");
        assert_eq!(form.date, "2026-01-06");
        assert_eq!(form.time, "10:01");
        assert_eq!(form.message, QUICK_CREATE_MESSAGE);
        assert_eq!(form.phone, "+1");
    }

    #[test]
    fn create_form_defaults_to_now() {
        let c = composer_at(2026, 1, 6, 15, 0);
        let form = c.create_input(&FixedTimezone(chrono_tz::Europe::London));
        assert!(!form.quick_create);
        assert_eq!(form.time, "15:00");
        assert_eq!(form.timezone, "Europe/London");
    }
}
