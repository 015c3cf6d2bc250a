use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Subcommand;
use remindy_core::catalog::{find_country, nearest_catalog_timezone, TIMEZONES};
use remindy_core::phone::{join_phone, normalize_phone};
use remindy_core::time::{display_browser_local, utc_offset_label};
use remindy_core::{
    countdown_at, display_local, CountdownClock, DashboardState, FieldErrors, ReminderRecord,
    ReminderStatus, ScheduleComposer, ScheduleInput, SortChoice, SortOrder, StatusFilter,
    SystemClock, SystemTimezone, TimezoneProvider,
};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::{load_config, Config};

#[derive(Subcommand, Debug)]
pub enum RemindersCommand {
    /// List reminders, one page at a time
    List {
        /// all | scheduled | completed | failed
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size (default from config.dashboard.per_page)
        #[arg(long)]
        per_page: Option<u32>,

        /// ascending | descending (by scheduled time); server order if omitted
        #[arg(long)]
        sort: Option<SortOrder>,
    },

    /// Schedule a new reminder call
    Create {
        #[arg(long)]
        title: String,

        /// Spoken during the call
        #[arg(long)]
        message: String,

        /// E.164 (+15550000000), or a national number together with --country
        #[arg(long)]
        phone: String,

        /// Country whose dialing code prefixes a national --phone
        #[arg(long)]
        country: Option<String>,

        /// YYYY-MM-DD in --timezone
        #[arg(long)]
        date: String,

        /// HH:MM in --timezone
        #[arg(long)]
        time: String,

        /// IANA zone from `remindy timezones` (default: detected)
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Schedule a call one minute from now
    QuickCreate {
        #[arg(long, default_value = "Quick reminder")]
        title: String,

        #[arg(long)]
        phone: String,

        #[arg(long)]
        country: Option<String>,

        /// Overrides the default quick-call message
        #[arg(long)]
        message: Option<String>,
    },

    /// Change a scheduled or failed reminder; only given fields change
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        message: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        country: Option<String>,

        /// YYYY-MM-DD, read in the reminder's zone (or --timezone)
        #[arg(long)]
        date: Option<String>,

        /// HH:MM, read in the reminder's zone (or --timezone)
        #[arg(long)]
        time: Option<String>,

        #[arg(long)]
        timezone: Option<String>,
    },

    /// Delete a reminder
    Delete {
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Live countdown for one reminder until it leaves `scheduled`
    Watch {
        id: String,

        /// Seconds between status refreshes
        #[arg(long, default_value_t = 10)]
        poll_secs: u64,
    },

    /// Selectable timezones with their current offset
    Timezones,
}

struct Ctx {
    cfg: Config,
    api: ApiClient,
    zone: SystemTimezone,
}

impl Ctx {
    fn load() -> Result<Self> {
        let cfg = load_config()?;
        let api = ApiClient::new(&cfg.api)?;
        let zone = SystemTimezone::new(cfg.dashboard.fallback_tz());
        Ok(Self { cfg, api, zone })
    }

    fn composer(&self) -> ScheduleComposer<SystemClock> {
        ScheduleComposer::new(SystemClock)
    }

    fn phone(&self, raw: &str, country: Option<&str>) -> Result<String> {
        resolve_phone(raw, country, &self.cfg.dashboard.default_country)
    }
}

/// `+...` is taken as already international (and must match `country` when
/// one is given); anything else gets the dialing code of `country`, or of
/// `default_country`.
fn resolve_phone(raw: &str, country: Option<&str>, default_country: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.starts_with('+') {
        if let Some(code) = country {
            let country = find_country(code)
                .with_context(|| format!("unknown country code: {code}"))?;
            if !normalize_phone(raw).starts_with(country.dial_code) {
                bail!(
                    "phone {raw} does not start with {} ({})",
                    country.dial_code,
                    country.name
                );
            }
        }
        return Ok(raw.to_string());
    }
    let code = country.unwrap_or(default_country);
    let country = find_country(code).with_context(|| format!("unknown country code: {code}"))?;
    Ok(join_phone(country.dial_code, raw))
}

pub async fn run(cmd: RemindersCommand) -> Result<()> {
    if let RemindersCommand::Timezones = cmd {
        return timezones();
    }
    let ctx = Ctx::load()?;
    match cmd {
        RemindersCommand::List {
            status,
            page,
            per_page,
            sort,
        } => list(&ctx, status, page, per_page, sort).await,
        RemindersCommand::Create {
            title,
            message,
            phone,
            country,
            date,
            time,
            timezone,
        } => {
            let mut input = ctx.composer().create_input(&ctx.zone);
            input.title = title;
            input.message = message;
            input.phone = ctx.phone(&phone, country.as_deref())?;
            input.date = date;
            input.time = time;
            if let Some(tz) = timezone {
                input.timezone = tz;
            }
            create(&ctx, &input).await
        }
        RemindersCommand::QuickCreate {
            title,
            phone,
            country,
            message,
        } => {
            let mut input = ctx.composer().quick_create_input(&ctx.zone);
            input.title = title;
            input.phone = ctx.phone(&phone, country.as_deref())?;
            if let Some(m) = message {
                input.message = m;
            }
            create(&ctx, &input).await
        }
        RemindersCommand::Edit {
            id,
            title,
            message,
            phone,
            country,
            date,
            time,
            timezone,
        } => {
            let record = ctx.api.get(&id).await?;
            if record.status == ReminderStatus::Completed {
                bail!("Completed reminders cannot be edited");
            }
            let mut input = ctx.composer().decompose(&record);
            if let Some(v) = title {
                input.title = v;
            }
            if let Some(v) = message {
                input.message = v;
            }
            if let Some(v) = phone {
                input.phone = ctx.phone(&v, country.as_deref())?;
            }
            if let Some(v) = date {
                input.date = v;
            }
            if let Some(v) = time {
                input.time = v;
            }
            if let Some(v) = timezone {
                input.timezone = v;
            }
            edit(&ctx, &record, &input).await
        }
        RemindersCommand::Delete { id, yes } => delete(&ctx, &id, yes).await,
        RemindersCommand::Watch { id, poll_secs } => watch(&ctx, &id, poll_secs).await,
        RemindersCommand::Timezones => timezones(),
    }
}

async fn list(
    ctx: &Ctx,
    status: StatusFilter,
    page: u32,
    per_page: Option<u32>,
    sort: Option<SortOrder>,
) -> Result<()> {
    let mut state = DashboardState::new(per_page.unwrap_or(ctx.cfg.dashboard.per_page));
    state.set_tab(status);
    state.page = page.max(1);
    state.set_sort(match sort {
        None => SortChoice::Default,
        Some(SortOrder::Ascending) => SortChoice::Ascending,
        Some(SortOrder::Descending) => SortChoice::Descending,
    });

    let loaded = ctx.api.list(&state.list_query()).await;
    match loaded {
        Ok(p) => state.apply_loaded(p),
        Err(err) => {
            warn!(%err, "list reminders failed");
            bail!("{}", remindy_core::dashboard::LOAD_ERROR);
        }
    }

    if state.reminders.is_empty() {
        println!("No reminders ({}).", state.tab.as_str());
        return Ok(());
    }

    let now = Utc::now();
    for r in &state.reminders {
        print_reminder(r, &ctx.zone, now);
    }
    println!(
        "page {} of {} ({} total, {}, sort: {})",
        state.page,
        state.total_pages(),
        state.total_items,
        state.tab.as_str(),
        state.sort.label()
    );
    Ok(())
}

fn print_reminder(r: &ReminderRecord, zone: &dyn TimezoneProvider, now: chrono::DateTime<Utc>) {
    let local = display_local(&r.scheduled_time_utc, &r.timezone);
    let mine = display_browser_local(&r.scheduled_time_utc, zone);
    let phone = r.masked_phone_number.as_deref().unwrap_or(&r.phone_number);

    println!("{}  [{}]  {}", r.id, r.status, r.title);
    println!(
        "    {} {} {}  (your time: {} {})",
        local.date, local.time, local.zone, mine.date, mine.time
    );
    println!("    call {phone}");
    if let (true, Some(at)) = (r.is_scheduled(), local.instant) {
        let cd = countdown_at(at, now);
        if cd.is_overdue {
            println!("    due now");
        } else {
            println!("    in {}", cd.remaining_label);
        }
    }
    if let Some(reason) = r.failure_reason.as_deref().filter(|s| !s.is_empty()) {
        println!("    failed: {reason}");
    }
    println!();
}

fn report_field_errors(errors: &FieldErrors) {
    eprintln!("Please fix:");
    for (field, err) in errors.iter() {
        eprintln!("- {field}: {err}");
    }
}

async fn create(ctx: &Ctx, input: &ScheduleInput) -> Result<()> {
    let composed = match ctx.composer().compose(input) {
        Ok(c) => c,
        Err(errors) => {
            report_field_errors(&errors);
            bail!("reminder not saved");
        }
    };
    let record = ctx.api.create(&composed.to_create()).await?;
    println!("Scheduled:\n");
    print_reminder(&record, &ctx.zone, Utc::now());
    Ok(())
}

async fn edit(ctx: &Ctx, original: &ReminderRecord, input: &ScheduleInput) -> Result<()> {
    let composed = match ctx.composer().compose(input) {
        Ok(c) => c,
        Err(errors) => {
            report_field_errors(&errors);
            bail!("reminder not saved");
        }
    };
    let update = composed.to_update(original);
    if update.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }
    let record = ctx.api.update(&original.id, &update).await?;
    println!("Updated:\n");
    print_reminder(&record, &ctx.zone, Utc::now());
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

async fn delete(ctx: &Ctx, id: &str, yes: bool) -> Result<()> {
    if !yes {
        let record = ctx.api.get(id).await?;
        let answer = prompt(&format!("Delete \"{}\"? [y/N]", record.title))?;
        if !matches!(answer.as_str(), "y" | "Y" | "yes") {
            println!("Kept.");
            return Ok(());
        }
    }
    ctx.api.delete(id).await?;
    println!("Deleted {id}");
    Ok(())
}

async fn watch(ctx: &Ctx, id: &str, poll_secs: u64) -> Result<()> {
    let record = ctx.api.get(id).await?;
    let target = record
        .scheduled_instant()
        .with_context(|| format!("reminder {id} has an unreadable scheduled time"))?;

    println!("{}  [{}]", record.title, record.status);
    if !record.is_scheduled() {
        return Ok(());
    }

    let mut clock = CountdownClock::new(Arc::new(SystemClock), tokio::runtime::Handle::current());
    let mut rx = clock.subscribe();
    clock.mount(target, record.status);

    let period = Duration::from_secs(poll_secs.max(1));
    let mut poll = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let mut last_status = record.status;

    let outcome: Result<()> = loop {
        {
            let state = rx.borrow_and_update();
            print!("\r  {:<24}", state.remaining_label);
            io::stdout().flush().ok();
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
            }
            _ = poll.tick() => {
                match ctx.api.get(id).await {
                    Ok(fresh) => {
                        if let Ok(at) = fresh.scheduled_instant() {
                            clock.retarget(at);
                        }
                        clock.set_status(fresh.status);
                        last_status = fresh.status;
                        if !fresh.is_scheduled() {
                            break Ok(());
                        }
                    }
                    Err(err) => debug!(%err, "refresh failed, keeping last known state"),
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    clock.unmount();
    println!();
    if last_status != ReminderStatus::Scheduled {
        println!("Status: {last_status}");
    }
    outcome
}

fn timezones() -> Result<()> {
    let cfg = load_config()?;
    let now = Utc::now();
    let detected = SystemTimezone::new(cfg.dashboard.fallback_tz()).detected();
    let nearest = nearest_catalog_timezone(detected, now);

    for entry in TIMEZONES {
        let Ok(tz) = entry.name.parse::<chrono_tz::Tz>() else {
            continue;
        };
        let mark = if entry.name == nearest { "*" } else { " " };
        println!("{mark} {:<32} {}", entry.name, utc_offset_label(tz, now));
    }
    println!("\n* detected: {}", detected.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_number_gets_country_code() {
        assert_eq!(resolve_phone("2071234567", Some("gb"), "US").unwrap(), "+44 2071234567");
        assert_eq!(resolve_phone(" 5550000000 ", None, "US").unwrap(), "+1 5550000000");
    }

    #[test]
    fn international_number_is_not_prefixed_twice() {
        assert_eq!(resolve_phone("+44 2071234567", Some("GB"), "US").unwrap(), "+44 2071234567");
        assert_eq!(resolve_phone("+15550000000", None, "GB").unwrap(), "+15550000000");
    }

    #[test]
    fn international_number_must_match_given_country() {
        assert!(resolve_phone("+15550000000", Some("GB"), "US").is_err());
        assert!(resolve_phone("2071234567", Some("XX"), "US").is_err());
    }
}
