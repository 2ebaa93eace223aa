use std::io;
use std::panic;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use time::OffsetDateTime;

use crate::analytics;
use crate::api::Transport;
use crate::console::Console;
use crate::core::{
    CrossPlatformUser, DashboardData, LicenseReport, RiskStatus, SecurityRisk, Severity,
};
use crate::pages::{self, PageState};
use crate::refresh::AutoRefresh;

pub fn run<T: Transport + 'static>(
    console: Arc<Console<T>>,
    color: bool,
    refresh_interval: Duration,
) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

    let mut terminal =
        Terminal::new(CrosstermBackend::new(stdout)).context("failed to initialize terminal")?;
    terminal.clear().ok();

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        run_app(&mut terminal, console, color, refresh_interval)
    }));

    let _ = terminal.show_cursor();
    let _ = disable_raw_mode();
    let mut stdout = io::stdout();
    let _ = execute!(stdout, LeaveAlternateScreen);

    match res {
        Ok(res) => res,
        Err(_) => Err(anyhow::anyhow!(
            "panic inside the dashboard UI (terminal state was restored)"
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Dashboard,
    GhostUsers,
    Risks,
    Licenses,
}

impl View {
    const ALL: [View; 4] = [View::Dashboard, View::GhostUsers, View::Risks, View::Licenses];

    fn title(self) -> &'static str {
        match self {
            View::Dashboard => "Dashboard",
            View::GhostUsers => "Ghost users",
            View::Risks => "Security risks",
            View::Licenses => "Licenses",
        }
    }

    fn index(self) -> usize {
        View::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }

    fn next(self) -> View {
        View::ALL[(self.index() + 1) % View::ALL.len()]
    }

    fn prev(self) -> View {
        View::ALL[(self.index() + View::ALL.len() - 1) % View::ALL.len()]
    }
}

enum Loaded {
    Dashboard(PageState<DashboardData>),
    GhostUsers(PageState<Vec<CrossPlatformUser>>),
    Risks(PageState<Vec<SecurityRisk>>),
    Licenses(PageState<LicenseReport>),
}

struct PendingFetch {
    view: View,
    rx: mpsc::Receiver<Loaded>,
    started_at: Instant,
}

struct PendingUpdate {
    risk_id: String,
    status: RiskStatus,
    rx: mpsc::Receiver<std::result::Result<SecurityRisk, String>>,
}

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    None,
    Quit,
    Refresh,
    UpdateRisk { id: String, status: RiskStatus },
}

struct App {
    view: View,
    color: bool,
    dashboard: PageState<DashboardData>,
    ghosts: PageState<Vec<CrossPlatformUser>>,
    risks: PageState<Vec<SecurityRisk>>,
    licenses: PageState<LicenseReport>,
    ghost_state: ListState,
    risk_state: ListState,
    license_state: ListState,
    pending: Vec<PendingFetch>,
    pending_update: Option<PendingUpdate>,
    status: Option<String>,
    refreshed_at: Option<OffsetDateTime>,
    tick: usize,
}

impl App {
    fn new(color: bool) -> Self {
        Self {
            view: View::Dashboard,
            color,
            dashboard: PageState::Loading,
            ghosts: PageState::Loading,
            risks: PageState::Loading,
            licenses: PageState::Loading,
            ghost_state: ListState::default(),
            risk_state: ListState::default(),
            license_state: ListState::default(),
            pending: Vec::new(),
            pending_update: None,
            status: None,
            refreshed_at: None,
            tick: 0,
        }
    }

    fn is_busy(&self) -> bool {
        !self.pending.is_empty() || self.pending_update.is_some()
    }

    fn apply(&mut self, loaded: Loaded) {
        match loaded {
            Loaded::Dashboard(state) => self.dashboard = state,
            Loaded::GhostUsers(state) => {
                let len = state.ready().map_or(0, Vec::len);
                self.ghosts = state;
                clamp_selection(&mut self.ghost_state, len);
            }
            Loaded::Risks(state) => {
                let state = state.map(|risks| analytics::filter_risks(&risks, None, None));
                let len = state.ready().map_or(0, Vec::len);
                self.risks = state;
                clamp_selection(&mut self.risk_state, len);
            }
            Loaded::Licenses(state) => {
                let len = state.ready().map_or(0, |r| r.recommendations.len());
                self.licenses = state;
                clamp_selection(&mut self.license_state, len);
            }
        }
    }

    fn selected_risk(&self) -> Option<&SecurityRisk> {
        let risks = self.risks.ready()?;
        risks.get(self.risk_state.selected()?)
    }

    fn move_selection(&mut self, delta: i32) {
        match self.view {
            View::Dashboard => {}
            View::GhostUsers => {
                let len = self.ghosts.ready().map_or(0, Vec::len);
                move_list_selection(&mut self.ghost_state, len, delta);
            }
            View::Risks => {
                let len = self.risks.ready().map_or(0, Vec::len);
                move_list_selection(&mut self.risk_state, len, delta);
            }
            View::Licenses => {
                let len = self.licenses.ready().map_or(0, |r| r.recommendations.len());
                move_list_selection(&mut self.license_state, len, delta);
            }
        }
    }
}

fn move_list_selection(state: &mut ListState, len: usize, delta: i32) {
    if len == 0 {
        state.select(None);
        return;
    }
    let selected = state.selected().unwrap_or(0) as i32;
    let next = (selected + delta).clamp(0, (len as i32).saturating_sub(1));
    state.select(Some(next as usize));
}

fn clamp_selection(state: &mut ListState, len: usize) {
    match state.selected() {
        _ if len == 0 => state.select(None),
        None => state.select(Some(0)),
        Some(i) if i >= len => state.select(Some(len - 1)),
        Some(_) => {}
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Tab | KeyCode::Right => {
            app.view = app.view.next();
            KeyAction::None
        }
        KeyCode::BackTab | KeyCode::Left => {
            app.view = app.view.prev();
            KeyAction::None
        }
        KeyCode::Char(c @ '1'..='4') => {
            let idx = (c as usize) - ('1' as usize);
            app.view = View::ALL[idx];
            KeyAction::None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.move_selection(-1);
            KeyAction::None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.move_selection(1);
            KeyAction::None
        }
        KeyCode::Char('r') => KeyAction::Refresh,
        KeyCode::Char(c @ ('a' | 'x')) if app.view == View::Risks => {
            if app.pending_update.is_some() {
                return KeyAction::None;
            }
            let status = if c == 'a' {
                RiskStatus::Acknowledged
            } else {
                RiskStatus::Resolved
            };
            let selected = app.selected_risk().map(|r| (r.id.clone(), r.status));
            match selected {
                Some((id, current)) if current != status => KeyAction::UpdateRisk { id, status },
                Some(_) => {
                    app.status = Some(format!("risk is already {status}"));
                    KeyAction::None
                }
                None => KeyAction::None,
            }
        }
        _ => KeyAction::None,
    }
}

fn start_fetch<T: Transport + 'static>(app: &mut App, console: &Arc<Console<T>>, view: View) {
    app.pending.retain(|p| p.view != view);
    match view {
        View::Dashboard => app.dashboard = PageState::Loading,
        View::GhostUsers => app.ghosts = PageState::Loading,
        View::Risks => app.risks = PageState::Loading,
        View::Licenses => app.licenses = PageState::Loading,
    }

    let (tx, rx) = mpsc::channel();
    let console = Arc::clone(console);
    thread::spawn(move || {
        let loaded = match view {
            View::Dashboard => Loaded::Dashboard(pages::dashboard(&*console)),
            View::GhostUsers => Loaded::GhostUsers(pages::ghost_users(&*console)),
            View::Risks => Loaded::Risks(pages::security_risks(&*console)),
            View::Licenses => Loaded::Licenses(pages::licenses(&*console)),
        };
        let _ = tx.send(loaded);
    });
    app.pending.push(PendingFetch {
        view,
        rx,
        started_at: Instant::now(),
    });
}

/// Drops cached responses and reloads every view. Results of fetches still in
/// flight are discarded with their receivers.
fn refresh_all<T: Transport + 'static>(app: &mut App, console: &Arc<Console<T>>) {
    console.refresh();
    app.pending.clear();
    for view in View::ALL {
        start_fetch(app, console, view);
    }
}

fn start_update<T: Transport + 'static>(
    app: &mut App,
    console: &Arc<Console<T>>,
    id: String,
    status: RiskStatus,
) {
    let (tx, rx) = mpsc::channel();
    let console = Arc::clone(console);
    let risk_id = id.clone();
    thread::spawn(move || {
        let res = console
            .update_risk_status(&risk_id, status)
            .map_err(|e| e.user_message("Failed to update risk status"));
        let _ = tx.send(res);
    });
    app.status = Some(format!("updating risk {id}..."));
    app.pending_update = Some(PendingUpdate {
        risk_id: id,
        status,
        rx,
    });
}

fn poll_workers<T: Transport + 'static>(app: &mut App, console: &Arc<Console<T>>) {
    let mut done = Vec::new();
    let mut still_pending = Vec::new();
    for pending in app.pending.drain(..) {
        match pending.rx.try_recv() {
            Ok(loaded) => {
                tracing::debug!(
                    view = pending.view.title(),
                    elapsed_ms = pending.started_at.elapsed().as_millis() as u64,
                    "view loaded"
                );
                done.push(loaded);
            }
            Err(mpsc::TryRecvError::Empty) => still_pending.push(pending),
            Err(mpsc::TryRecvError::Disconnected) => {
                done.push(failed_view(pending.view, "Data loader stopped unexpectedly"));
            }
        }
    }
    app.pending = still_pending;
    let any_done = !done.is_empty();
    for loaded in done {
        app.apply(loaded);
    }
    if any_done && app.pending.is_empty() {
        app.refreshed_at = Some(OffsetDateTime::now_utc());
    }

    let Some(update) = app.pending_update.as_ref() else {
        return;
    };
    let res = match update.rx.try_recv() {
        Ok(res) => res,
        Err(mpsc::TryRecvError::Empty) => return,
        Err(mpsc::TryRecvError::Disconnected) => Err("Failed to update risk status".to_string()),
    };
    let update = app.pending_update.take();
    match (res, update) {
        (Ok(_), Some(update)) => {
            app.status = Some(format!("risk {} marked {}", update.risk_id, update.status));
            start_fetch(app, console, View::Risks);
            start_fetch(app, console, View::Dashboard);
        }
        (Err(message), _) => app.status = Some(message),
        (Ok(_), None) => {}
    }
}

fn failed_view(view: View, message: &str) -> Loaded {
    let failed = || message.to_string();
    match view {
        View::Dashboard => Loaded::Dashboard(PageState::Failed { message: failed() }),
        View::GhostUsers => Loaded::GhostUsers(PageState::Failed { message: failed() }),
        View::Risks => Loaded::Risks(PageState::Failed { message: failed() }),
        View::Licenses => Loaded::Licenses(PageState::Failed { message: failed() }),
    }
}

fn run_app<T: Transport + 'static>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    console: Arc<Console<T>>,
    color: bool,
    refresh_interval: Duration,
) -> Result<()> {
    let mut app = App::new(color);
    for view in View::ALL {
        start_fetch(&mut app, &console, view);
    }

    let (tick_tx, tick_rx) = mpsc::channel::<()>();
    let _timer = AutoRefresh::start(refresh_interval, move || {
        let _ = tick_tx.send(());
    });

    let tick_rate = Duration::from_millis(120);
    loop {
        poll_workers(&mut app, &console);
        if tick_rx.try_recv().is_ok() {
            while tick_rx.try_recv().is_ok() {}
            tracing::debug!("auto-refresh tick");
            refresh_all(&mut app, &console);
        }

        app.tick = app.tick.wrapping_add(1);
        terminal.draw(|f| draw(f, &mut app)).context("failed to draw")?;

        if !event::poll(tick_rate).context("failed to poll terminal events")? {
            continue;
        }
        let Event::Key(key) = event::read().context("failed to read terminal event")? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match handle_key(&mut app, key) {
            KeyAction::None => {}
            KeyAction::Quit => return Ok(()),
            KeyAction::Refresh => {
                app.status = None;
                refresh_all(&mut app, &console);
            }
            KeyAction::UpdateRisk { id, status } => start_update(&mut app, &console, id, status),
        }
    }
}

fn draw(f: &mut ratatui::Frame, app: &mut App) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(size);

    draw_header(f, chunks[0], app);
    draw_footer(f, chunks[2], app);

    match app.view {
        View::Dashboard => draw_dashboard(f, chunks[1], app),
        View::GhostUsers => draw_ghosts(f, chunks[1], app),
        View::Risks => draw_risks(f, chunks[1], app),
        View::Licenses => draw_licenses(f, chunks[1], app),
    }
}

fn draw_header(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let titles: Vec<&str> = View::ALL.iter().map(|v| v.title()).collect();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("saasboard {}", env!("CARGO_PKG_VERSION"))),
        )
        .select(app.view.index())
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_widget(tabs, area);
}

fn draw_footer(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let mut hints = "Tab/←/→ switch  ↑/↓ select  r refresh  q quit".to_string();
    if app.view == View::Risks {
        hints.push_str("  a acknowledge  x resolve");
    }
    let status = match (&app.status, app.is_busy(), app.refreshed_at) {
        (Some(msg), _, _) => msg.clone(),
        (None, true, _) => format!("{} loading", spinner_frame(app.tick)),
        (None, false, Some(at)) => format!(
            "updated {:02}:{:02}:{:02} UTC",
            at.hour(),
            at.minute(),
            at.second()
        ),
        (None, false, None) => String::new(),
    };
    let text = Text::from(vec![
        Line::from(Span::styled(hints, dim(app.color))),
        Line::from(status),
    ]);
    f.render_widget(Paragraph::new(text), area);
}

fn spinner_frame(tick: usize) -> &'static str {
    const FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
    FRAMES[tick % FRAMES.len()]
}

/// Renders the non-ready states shared by every view. Returns `true` when the
/// page still needs its own content drawn.
fn draw_page_status<V>(
    f: &mut ratatui::Frame,
    area: Rect,
    state: &PageState<V>,
    title: &str,
    color: bool,
) -> bool {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let text = match state {
        PageState::Ready(_) => return true,
        PageState::Loading => Text::from(vec![
            Line::from("Loading..."),
            Line::from(Span::styled("░░░░░░░░░░░░░░░░░░░░", dim(color))),
        ]),
        PageState::ComingSoon => Text::from("This integration is coming soon."),
        PageState::Failed { message } => Text::from(vec![
            Line::from(Span::styled(message.clone(), error_style(color))),
            Line::from(""),
            Line::from("press r to retry"),
        ]),
    };
    f.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: false }), area);
    false
}

fn draw_dashboard(f: &mut ratatui::Frame, area: Rect, app: &App) {
    if !draw_page_status(f, area, &app.dashboard, "Dashboard", app.color) {
        return;
    }
    let Some(data) = app.dashboard.ready() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(1)])
        .split(area);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut risks_line = vec![
        Span::raw("Open risks:       "),
        Span::styled(data.open_risks.to_string(), bold),
    ];
    if data.critical_risks > 0 {
        risks_line.push(Span::raw("  "));
        risks_line.push(Span::styled(
            format!("{} critical", data.critical_risks),
            severity_style(Severity::Critical, app.color),
        ));
    }
    let summary = Text::from(vec![
        Line::from(vec![
            Span::raw("Users:            "),
            Span::styled(data.total_users.to_string(), bold),
            Span::raw(format!(
                "  ({} active, {})",
                data.active_users,
                analytics::ratio_percent(data.active_users, data.total_users)
            )),
        ]),
        Line::from(format!(
            "Ghost users:      {}   Duplicates: {}",
            data.ghost_users, data.duplicate_users
        )),
        Line::from(format!(
            "Monthly cost:     {}",
            analytics::format_currency(data.total_monthly_cost)
        )),
        Line::from(format!(
            "Potential saving: {}",
            analytics::format_currency(data.potential_savings)
        )),
        Line::from(risks_line),
    ]);
    f.render_widget(
        Paragraph::new(summary).block(Block::default().borders(Borders::ALL).title("Summary")),
        chunks[0],
    );

    let items: Vec<ListItem> = if data.platforms.is_empty() {
        vec![ListItem::new("No platforms connected yet.")]
    } else {
        data.platforms
            .iter()
            .map(|p| {
                let mark = if p.connected { "●" } else { "○" };
                ListItem::new(format!(
                    "{mark} {:<16} {:>6} users  {:>12}",
                    p.platform,
                    p.users,
                    analytics::format_currency(p.monthly_cost)
                ))
            })
            .collect()
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Platforms"));
    f.render_widget(list, chunks[1]);
}

fn split_list_detail(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    (chunks[0], chunks[1])
}

fn draw_ghosts(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    if !draw_page_status(f, area, &app.ghosts, "Ghost users", app.color) {
        return;
    }
    let Some(users) = app.ghosts.ready() else {
        return;
    };
    let (left, right) = split_list_detail(area);

    let items: Vec<ListItem> = users
        .iter()
        .map(|u| {
            ListItem::new(format!(
                "{:<32} {:>2} platforms  {}",
                u.email,
                u.platforms.len(),
                analytics::format_currency(u.estimated_monthly_cost)
            ))
        })
        .collect();
    let title = format!("Ghost users ({})", users.len());
    let detail = app
        .ghost_state
        .selected()
        .and_then(|i| users.get(i))
        .map(ghost_detail)
        .unwrap_or_else(|| Text::from("No ghost users found."));

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_widget(
        Paragraph::new(detail)
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: false }),
        right,
    );
    f.render_stateful_widget(list, left, &mut app.ghost_state);
}

fn ghost_detail(user: &CrossPlatformUser) -> Text<'static> {
    let mut lines = vec![
        Line::from(Span::styled(
            user.email.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(user.display_name.clone().unwrap_or_default()),
        Line::from(format!(
            "Last activity: {}",
            user.last_activity_at.as_deref().unwrap_or("never")
        )),
        Line::from(""),
    ];
    for account in &user.platforms {
        let state = if account.is_active { "active" } else { "inactive" };
        lines.push(Line::from(format!(
            "{:<12} {:<8} {}",
            account.platform,
            state,
            analytics::format_currency(account.monthly_cost)
        )));
    }
    Text::from(lines)
}

fn draw_risks(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    if !draw_page_status(f, area, &app.risks, "Security risks", app.color) {
        return;
    }
    let Some(risks) = app.risks.ready() else {
        return;
    };
    let (left, right) = split_list_detail(area);
    let color = app.color;

    let items: Vec<ListItem> = risks
        .iter()
        .map(|r| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<8}", analytics::severity_badge(r.severity)),
                    severity_style(r.severity, color),
                ),
                Span::raw(format!(
                    " {:<9} {:<10} {}",
                    analytics::status_badge(r.status),
                    r.platform,
                    r.user_email
                )),
            ]))
        })
        .collect();
    let title = match analytics::highest_severity(risks) {
        Some(top) => format!("Security risks ({}, highest {top})", risks.len()),
        None => "Security risks (0)".to_string(),
    };
    let detail = app
        .risk_state
        .selected()
        .and_then(|i| risks.get(i))
        .map(|r| risk_detail(r, color))
        .unwrap_or_else(|| Text::from("No security risks found."));

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_widget(
        Paragraph::new(detail)
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: false }),
        right,
    );
    f.render_stateful_widget(list, left, &mut app.risk_state);
}

fn risk_detail(risk: &SecurityRisk, color: bool) -> Text<'static> {
    Text::from(vec![
        Line::from(Span::styled(
            risk.risk_type.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::raw("Severity: "),
            Span::styled(risk.severity.to_string(), severity_style(risk.severity, color)),
        ]),
        Line::from(format!("Status:   {}", risk.status)),
        Line::from(format!("Platform: {}", risk.platform)),
        Line::from(format!("User:     {}", risk.user_email)),
        Line::from(format!(
            "Detected: {}",
            risk.detected_at.as_deref().unwrap_or("-")
        )),
        Line::from(format!("ID:       {}", risk.id)),
        Line::from(""),
        Line::from(risk.description.clone()),
    ])
}

fn draw_licenses(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    if !draw_page_status(f, area, &app.licenses, "Licenses", app.color) {
        return;
    }
    let Some(report) = app.licenses.ready() else {
        return;
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(1)])
        .split(area);

    let summary = Text::from(vec![
        Line::from(format!(
            "Monthly cost:      {}",
            analytics::format_currency(report.total_monthly_cost)
        )),
        Line::from(format!(
            "Potential savings: {}",
            analytics::format_currency(report.potential_savings)
        )),
    ]);
    f.render_widget(
        Paragraph::new(summary).block(Block::default().borders(Borders::ALL).title("Licenses")),
        chunks[0],
    );

    let items: Vec<ListItem> = if report.recommendations.is_empty() {
        vec![ListItem::new("No license recommendations.")]
    } else {
        report
            .recommendations
            .iter()
            .map(|r| {
                ListItem::new(format!(
                    "{:<10} {:<28} {:>10}  {} ({})",
                    r.platform,
                    r.user_email,
                    analytics::format_currency(r.monthly_cost),
                    r.recommended_action,
                    r.reason
                ))
            })
            .collect()
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Recommendations"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, chunks[1], &mut app.license_state);
}

fn dim(enabled: bool) -> Style {
    if enabled {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    }
}

fn error_style(enabled: bool) -> Style {
    if enabled {
        Style::default().fg(Color::Red)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    }
}

fn severity_style(severity: Severity, enabled: bool) -> Style {
    if !enabled {
        return Style::default();
    }
    match severity {
        Severity::Low => Style::default().fg(Color::DarkGray),
        Severity::Medium => Style::default().fg(Color::Yellow),
        Severity::High => Style::default().fg(Color::Red),
        Severity::Critical => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn risk(id: &str, severity: Severity, status: RiskStatus) -> SecurityRisk {
        SecurityRisk {
            id: id.to_string(),
            user_email: format!("{id}@acme.io"),
            platform: "github".to_string(),
            severity,
            risk_type: "no_mfa".to_string(),
            description: String::new(),
            status,
            detected_at: None,
        }
    }

    #[test]
    fn tab_keys_cycle_views() {
        let mut app = App::new(false);
        assert_eq!(handle_key(&mut app, press(KeyCode::Tab)), KeyAction::None);
        assert_eq!(app.view, View::GhostUsers);
        handle_key(&mut app, press(KeyCode::Left));
        handle_key(&mut app, press(KeyCode::Left));
        assert_eq!(app.view, View::Licenses);
        handle_key(&mut app, press(KeyCode::Char('3')));
        assert_eq!(app.view, View::Risks);
        assert_eq!(handle_key(&mut app, press(KeyCode::Char('q'))), KeyAction::Quit);
        let ctrl_c = KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..press(KeyCode::Char('c'))
        };
        assert_eq!(handle_key(&mut app, ctrl_c), KeyAction::Quit);
    }

    #[test]
    fn loaded_risks_are_ranked_and_selected() {
        let mut app = App::new(false);
        app.apply(Loaded::Risks(PageState::Ready(vec![
            risk("1", Severity::Low, RiskStatus::Open),
            risk("2", Severity::Critical, RiskStatus::Open),
            risk("3", Severity::Medium, RiskStatus::Open),
        ])));
        assert_eq!(app.risk_state.selected(), Some(0));
        assert_eq!(app.selected_risk().map(|r| r.id.as_str()), Some("2"));

        app.view = View::Risks;
        handle_key(&mut app, press(KeyCode::Down));
        handle_key(&mut app, press(KeyCode::Down));
        handle_key(&mut app, press(KeyCode::Down));
        assert_eq!(app.selected_risk().map(|r| r.id.as_str()), Some("1"));
    }

    #[test]
    fn risk_keys_request_status_updates_on_risks_view_only() {
        let mut app = App::new(false);
        app.apply(Loaded::Risks(PageState::Ready(vec![risk(
            "r1",
            Severity::High,
            RiskStatus::Acknowledged,
        )])));

        assert_eq!(handle_key(&mut app, press(KeyCode::Char('x'))), KeyAction::None);

        app.view = View::Risks;
        assert_eq!(
            handle_key(&mut app, press(KeyCode::Char('x'))),
            KeyAction::UpdateRisk {
                id: "r1".to_string(),
                status: RiskStatus::Resolved,
            }
        );
        assert_eq!(handle_key(&mut app, press(KeyCode::Char('a'))), KeyAction::None);
        assert_eq!(app.status.as_deref(), Some("risk is already acknowledged"));
    }

    #[test]
    fn failed_load_clears_selection() {
        let mut app = App::new(false);
        app.apply(Loaded::GhostUsers(PageState::Ready(Vec::new())));
        assert_eq!(app.ghost_state.selected(), None);

        app.apply(failed_view(View::Licenses, "Failed to load licenses"));
        assert_eq!(
            app.licenses,
            PageState::Failed {
                message: "Failed to load licenses".to_string()
            }
        );
        assert_eq!(app.license_state.selected(), None);
    }

    #[test]
    fn selection_is_clamped_when_list_shrinks() {
        let mut state = ListState::default();
        state.select(Some(5));
        clamp_selection(&mut state, 2);
        assert_eq!(state.selected(), Some(1));
        move_list_selection(&mut state, 2, -4);
        assert_eq!(state.selected(), Some(0));
    }
}
