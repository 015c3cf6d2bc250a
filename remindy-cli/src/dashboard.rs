use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use remindy_core::catalog::{default_country, find_country, TIMEZONES};
use remindy_core::dashboard::LOAD_ERROR;
use remindy_core::time::display_browser_local;
use remindy_core::{
    display_local, CountdownClock, DashboardState, Field, FieldErrors, Modal, ReminderRecord,
    ReminderStatus, ScheduleComposer, ScheduleInput, StatusFilter, SystemClock, SystemTimezone,
    TimerGauge,
};
use std::collections::HashMap;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::Config;

const FORM_FIELDS: [Field; 6] = [
    Field::Title,
    Field::Message,
    Field::Phone,
    Field::Date,
    Field::Time,
    Field::Timezone,
];

struct Form {
    input: ScheduleInput,
    errors: FieldErrors,
    focus: usize,
    /// Set when editing an existing reminder.
    original: Option<ReminderRecord>,
    submit_error: Option<String>,
}

impl Form {
    fn new(input: ScheduleInput, original: Option<ReminderRecord>) -> Self {
        Self {
            input,
            errors: FieldErrors::new(),
            focus: 0,
            original,
            submit_error: None,
        }
    }

    fn focused(&self) -> Field {
        FORM_FIELDS[self.focus]
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.input.title,
            Field::Message => &mut self.input.message,
            Field::Phone => &mut self.input.phone,
            Field::Date => &mut self.input.date,
            Field::Time => &mut self.input.time,
            Field::Timezone => &mut self.input.timezone,
        }
    }

    fn value(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.input.title,
            Field::Message => &self.input.message,
            Field::Phone => &self.input.phone,
            Field::Date => &self.input.date,
            Field::Time => &self.input.time,
            Field::Timezone => &self.input.timezone,
        }
    }

    /// Step the timezone through the catalog.
    fn cycle_timezone(&mut self, forward: bool) {
        let n = TIMEZONES.len();
        let pos = TIMEZONES.iter().position(|t| t.name == self.input.timezone);
        let next = match (pos, forward) {
            (Some(i), true) => (i + 1) % n,
            (Some(i), false) => (i + n - 1) % n,
            (None, _) => 0,
        };
        self.input.timezone = TIMEZONES[next].name.to_string();
    }
}

struct App {
    state: DashboardState,
    api: ApiClient,
    composer: ScheduleComposer<SystemClock>,
    zone: SystemTimezone,
    runtime: Handle,
    gauge: TimerGauge,
    /// One countdown per displayed reminder, keyed by id.
    cards: HashMap<String, CountdownClock>,
    selected: usize,
    form: Option<Form>,
    flash: Option<String>,
    dial_code: &'static str,
    needs_reload: bool,
    last_load: Instant,
    refresh: Duration,
}

impl App {
    fn new(cfg: &Config, api: ApiClient) -> Self {
        let dial_code = find_country(&cfg.dashboard.default_country)
            .unwrap_or_else(default_country)
            .dial_code;
        Self {
            state: DashboardState::new(cfg.dashboard.per_page),
            api,
            composer: ScheduleComposer::new(SystemClock),
            zone: SystemTimezone::new(cfg.dashboard.fallback_tz()),
            runtime: Handle::current(),
            gauge: TimerGauge::default(),
            cards: HashMap::new(),
            selected: 0,
            form: None,
            flash: None,
            dial_code,
            needs_reload: true,
            last_load: Instant::now(),
            refresh: Duration::from_secs(cfg.dashboard.refresh_secs.max(1)),
        }
    }

    async fn reload(&mut self) {
        self.needs_reload = false;
        self.last_load = Instant::now();
        match self.api.list(&self.state.list_query()).await {
            Ok(page) => {
                debug!(items = page.items.len(), total = page.total_items, "page loaded");
                self.state.apply_loaded(page);
            }
            Err(err) => {
                warn!(%err, "load reminders failed");
                self.state.set_error(LOAD_ERROR);
            }
        }
        self.sync_cards();
    }

    /// Mount clocks for rows on screen, update the ones that stayed, and
    /// unmount the ones that went away.
    fn sync_cards(&mut self) {
        let mut keep: HashMap<String, CountdownClock> = HashMap::new();
        for r in &self.state.reminders {
            let Ok(target) = r.scheduled_instant() else {
                continue;
            };
            let clock = match self.cards.remove(&r.id) {
                Some(mut clock) => {
                    clock.retarget(target);
                    clock.set_status(r.status);
                    clock
                }
                None => {
                    let mut clock = CountdownClock::new(Arc::new(SystemClock), self.runtime.clone())
                        .with_gauge(self.gauge.clone());
                    clock.mount(target, r.status);
                    clock
                }
            };
            keep.insert(r.id.clone(), clock);
        }
        for (_, mut gone) in self.cards.drain() {
            gone.unmount();
        }
        self.cards = keep;
        if self.selected >= self.state.reminders.len() {
            self.selected = self.state.reminders.len().saturating_sub(1);
        }
    }

    fn selected_record(&self) -> Option<&ReminderRecord> {
        self.state.reminders.get(self.selected)
    }

    fn open_create(&mut self, quick: bool) {
        let mut input = if quick {
            self.state.open_quick_create();
            self.composer.quick_create_input(&self.zone)
        } else {
            self.state.open_create();
            self.composer.create_input(&self.zone)
        };
        input.phone = self.dial_code.to_string();
        self.form = Some(Form::new(input, None));
    }

    fn open_edit(&mut self) {
        let Some(record) = self.selected_record().cloned() else {
            return;
        };
        if record.status == ReminderStatus::Completed {
            self.flash = Some("Completed reminders cannot be edited".to_string());
            return;
        }
        self.state.open_edit(record.id.clone());
        let input = self.composer.decompose(&record);
        self.form = Some(Form::new(input, Some(record)));
    }

    fn close_form(&mut self) {
        self.form = None;
        self.state.close_modal();
    }

    async fn submit_form(&mut self) {
        let Some(mut form) = self.form.take() else {
            return;
        };
        let composed = match self.composer.compose(&form.input) {
            Ok(c) => c,
            Err(errors) => {
                form.errors = errors;
                self.form = Some(form);
                return;
            }
        };

        let result = match &form.original {
            None => self.api.create(&composed.to_create()).await.map(|rec| {
                info!(id = %rec.id, "reminder created");
                self.state.apply_created(rec);
            }),
            Some(original) => {
                let update = composed.to_update(original);
                if update.is_empty() {
                    self.state.close_modal();
                    return;
                }
                self.api.update(&original.id, &update).await.map(|rec| {
                    info!(id = %rec.id, "reminder updated");
                    self.state.apply_updated(rec);
                })
            }
        };

        match result {
            Ok(()) => self.sync_cards(),
            Err(err) => {
                form.submit_error = Some(err.to_string());
                self.form = Some(form);
            }
        }
    }

    async fn confirm_delete(&mut self) {
        let Some(id) = self.state.confirm_delete() else {
            return;
        };
        match self.api.delete(&id).await {
            Ok(()) => {
                info!(%id, "reminder deleted");
                self.state.apply_deleted(&id);
                self.sync_cards();
                self.flash = Some("Reminder deleted".to_string());
            }
            Err(err) => {
                warn!(%id, %err, "delete failed");
                self.flash = Some(err.to_string());
            }
        }
    }

    /// Returns false when the user asked to quit.
    async fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return false;
        }
        if self.form.is_some() {
            self.on_form_key(key).await;
            return true;
        }
        if self.state.pending_delete().is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_delete().await,
                _ => self.state.cancel_delete(),
            }
            return true;
        }

        self.flash = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char(c @ '1'..='4') => {
                let idx = (c as usize) - ('1' as usize);
                self.switch_tab(StatusFilter::ALL[idx]);
            }
            KeyCode::Tab => {
                let idx = StatusFilter::ALL.iter().position(|t| *t == self.state.tab).unwrap_or(0);
                self.switch_tab(StatusFilter::ALL[(idx + 1) % StatusFilter::ALL.len()]);
            }
            KeyCode::Char('s') => {
                self.state.cycle_sort();
                self.needs_reload = true;
            }
            KeyCode::Char('n') | KeyCode::Right => {
                if self.state.next_page() {
                    self.selected = 0;
                    self.needs_reload = true;
                }
            }
            KeyCode::Char('p') | KeyCode::Left => {
                if self.state.prev_page() {
                    self.selected = 0;
                    self.needs_reload = true;
                }
            }
            KeyCode::Char('r') => self.needs_reload = true,
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.state.reminders.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Char('c') => self.open_create(false),
            KeyCode::Char('+') => self.open_create(true),
            KeyCode::Char('e') | KeyCode::Enter => self.open_edit(),
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_record().map(|r| r.id.clone()) {
                    self.state.request_delete(id);
                }
            }
            _ => {}
        }
        true
    }

    fn switch_tab(&mut self, tab: StatusFilter) {
        if self.state.tab != tab {
            self.state.set_tab(tab);
            self.selected = 0;
            self.needs_reload = true;
        }
    }

    async fn on_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let field = form.focused();
        match key.code {
            KeyCode::Esc => {
                self.close_form();
                return;
            }
            KeyCode::Enter => {
                self.submit_form().await;
                return;
            }
            KeyCode::Tab | KeyCode::Down => {
                form.focus = (form.focus + 1) % FORM_FIELDS.len();
                return;
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.focus = (form.focus + FORM_FIELDS.len() - 1) % FORM_FIELDS.len();
                return;
            }
            KeyCode::Left if field == Field::Timezone => form.cycle_timezone(false),
            KeyCode::Right if field == Field::Timezone => form.cycle_timezone(true),
            KeyCode::Backspace => {
                form.value_mut(field).pop();
            }
            KeyCode::Char(c) => form.value_mut(field).push(c),
            _ => return,
        }
        form.submit_error = None;
        if !form.errors.is_empty() {
            self.composer.revalidate_field(&form.input, field, &mut form.errors);
        }
    }
}

pub async fn run_dashboard(cfg: &Config) -> Result<()> {
    let api = ApiClient::new(&cfg.api)?;
    let mut app = App::new(cfg, api);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = dashboard_loop(&mut terminal, &mut app).await;

    for (_, mut clock) in app.cards.drain() {
        clock.unmount();
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn dashboard_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        if app.form.is_none()
            && app.state.pending_delete().is_none()
            && app.last_load.elapsed() >= app.refresh
        {
            app.needs_reload = true;
        }
        if app.needs_reload {
            app.state.begin_load();
            terminal.draw(|f| draw(f, app))?;
            app.reload().await;
        }

        terminal.draw(|f| draw(f, app))?;

        let ready = tokio::task::block_in_place(|| event::poll(Duration::from_millis(50)))?;
        if ready {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if !app.on_key(key).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(f.area());

    let titles: Vec<Line> = StatusFilter::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(format!("{} {}", i + 1, t.as_str())))
        .collect();
    let selected_tab = StatusFilter::ALL
        .iter()
        .position(|t| *t == app.state.tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected_tab)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).title(format!(
            "remindy  page {}/{}  sort: {}  ({} total)",
            app.state.page,
            app.state.total_pages(),
            app.state.sort.label(),
            app.state.total_items
        )));
    f.render_widget(tabs, chunks[0]);

    f.render_widget(reminder_list(app), chunks[1]);
    f.render_widget(footer(app), chunks[2]);

    if let Some(form) = &app.form {
        draw_form(f, form, &app.state.modal);
    }
}

fn reminder_list(app: &App) -> Paragraph<'_> {
    let block = Block::default().borders(Borders::ALL).title("reminders");

    if app.state.is_loading {
        return Paragraph::new("Loading...").block(block);
    }
    if let Some(err) = &app.state.error {
        return Paragraph::new(vec![
            Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))),
            Line::from(Span::styled("press r to retry", Style::default().fg(Color::Gray))),
        ])
        .block(block);
    }
    if app.state.reminders.is_empty() {
        return Paragraph::new("No reminders here yet. Press c to create one.").block(block);
    }

    let mut lines: Vec<Line> = Vec::new();
    for (i, r) in app.state.reminders.iter().enumerate() {
        let marker = if i == app.selected { "> " } else { "  " };
        let status_color = match r.status {
            ReminderStatus::Scheduled => Color::Cyan,
            ReminderStatus::Completed => Color::Green,
            ReminderStatus::Failed => Color::Red,
        };
        let title_style = if i == app.selected {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(r.title.clone(), title_style),
            Span::raw("  "),
            Span::styled(format!("[{}]", r.status), Style::default().fg(status_color)),
        ]));

        let local = display_local(&r.scheduled_time_utc, &r.timezone);
        let mine = display_browser_local(&r.scheduled_time_utc, &app.zone);
        let phone = r.masked_phone_number.as_deref().unwrap_or(&r.phone_number);
        lines.push(Line::raw(format!(
            "    {} {} {}  (your time {} {})  {}",
            local.date, local.time, local.zone, mine.date, mine.time, phone
        )));

        let detail = match (r.status, app.cards.get(&r.id)) {
            (ReminderStatus::Scheduled, Some(clock)) => {
                let cd = clock.current();
                if cd.is_overdue {
                    Span::styled("    calling soon", Style::default().fg(Color::Yellow))
                } else {
                    Span::styled(
                        format!("    in {}", cd.remaining_label),
                        Style::default().fg(Color::Cyan),
                    )
                }
            }
            (ReminderStatus::Failed, _) => Span::styled(
                format!("    {}", r.failure_reason.as_deref().unwrap_or("call failed")),
                Style::default().fg(Color::Red),
            ),
            _ => Span::raw(""),
        };
        lines.push(Line::from(detail));
    }

    Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
}

fn footer(app: &App) -> Paragraph<'_> {
    let line = if let Some(id) = app.state.pending_delete() {
        let title = app.state.find(id).map(|r| r.title.as_str()).unwrap_or(id);
        Line::from(Span::styled(
            format!("Delete \"{title}\"? y = delete, any other key = cancel"),
            Style::default().fg(Color::Yellow),
        ))
    } else if let Some(msg) = &app.flash {
        Line::from(Span::styled(msg.clone(), Style::default().fg(Color::Yellow)))
    } else {
        Line::from(Span::styled(
            format!(
                "1-4/Tab tabs  s sort  n/p page  c new  + quick  e edit  d delete  r refresh  q quit   timers: {}",
                app.gauge.active()
            ),
            Style::default().fg(Color::Gray),
        ))
    };
    Paragraph::new(line).block(Block::default().borders(Borders::ALL))
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn draw_form(f: &mut Frame, form: &Form, modal: &Modal) {
    let title = match modal {
        Modal::QuickCreate => "quick reminder",
        Modal::Edit(_) => "edit reminder",
        _ => "new reminder",
    };
    let area = centered(f.area(), 72, 20);

    let mut lines: Vec<Line> = Vec::new();
    for (i, field) in FORM_FIELDS.iter().enumerate() {
        let focused = i == form.focus;
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let cursor = if focused { "_" } else { "" };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<9}", field.as_str()), label_style),
            Span::raw(format!("{}{}", form.value(*field), cursor)),
        ]));
        match form.errors.get(*field) {
            Some(err) => lines.push(Line::from(Span::styled(
                format!("         {err}"),
                Style::default().fg(Color::Red),
            ))),
            None => lines.push(Line::raw("")),
        }
    }
    if let Some(err) = &form.submit_error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(Span::styled(
        "Tab/Up/Down move  Left/Right timezone  Enter save  Esc cancel",
        Style::default().fg(Color::Gray),
    )));

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}
