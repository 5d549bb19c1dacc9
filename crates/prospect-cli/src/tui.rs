use crate::config::UiConfig;
use crate::worker::{ControllerCommand, WorkerEvent, WorkerHandle};
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyModifiers,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use prospect_core::progress::{self, LogTone};
use prospect_core::transcript;
use prospect_core::types::{
    ActivityEntry, Campaign, CampaignId, CampaignStatus, ContactStage, ContactUpdate, EntryId,
    Message, Speaker,
};
use prospect_core::{ControllerView, LogState};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::io;
use std::sync::mpsc::TryRecvError;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, PrimitiveDateTime};

pub struct TuiContext {
    pub worker: WorkerHandle,
    pub ui_config: UiConfig,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
struct UiTheme {
    accent: Color,
    operator: Color,
    contact: Color,
    heading: Color,
    muted: Color,
    neutral: Color,
    error: Color,
    success: Color,
    warning: Color,
}

impl UiTheme {
    fn from_config(config: &UiConfig) -> Self {
        match config.color_theme.as_str() {
            "plain" => Self::plain(),
            _ => Self::minimal(),
        }
    }

    fn minimal() -> Self {
        Self {
            accent: Color::Rgb(80, 200, 200),
            operator: Color::Rgb(170, 170, 170),
            contact: Color::Rgb(150, 150, 150),
            heading: Color::Rgb(140, 140, 140),
            muted: Color::Rgb(110, 110, 110),
            neutral: Color::Rgb(210, 210, 210),
            error: Color::Rgb(220, 100, 100),
            success: Color::Rgb(120, 200, 130),
            warning: Color::Rgb(220, 180, 90),
        }
    }

    fn plain() -> Self {
        Self {
            accent: Color::White,
            operator: Color::Reset,
            contact: Color::Reset,
            heading: Color::Reset,
            muted: Color::Reset,
            neutral: Color::Reset,
            error: Color::Reset,
            success: Color::Reset,
            warning: Color::Reset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Campaigns,
    Activity,
}

#[derive(Debug, Clone)]
struct PaletteState {
    filter: String,
    selected: usize,
}

impl PaletteState {
    fn new() -> Self {
        Self {
            filter: String::new(),
            selected: 0,
        }
    }
}

/// Destructive action waiting for a yes/no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    Stop(CampaignId),
    Delete(CampaignId),
    RemoveContact(EntryId),
}

impl PendingAction {
    fn prompt(self) -> String {
        match self {
            PendingAction::Stop(id) => format!("Stop campaign {id}?"),
            PendingAction::Delete(id) => format!("Delete campaign {id}? This cannot be undone."),
            PendingAction::RemoveContact(entry) => {
                format!("Remove contact {entry} from the campaign?")
            }
        }
    }

    fn confirmed(self) -> ControllerCommand {
        match self {
            PendingAction::Stop(id) => ControllerCommand::Stop {
                id,
                confirmed: true,
            },
            PendingAction::Delete(id) => ControllerCommand::Delete {
                id,
                confirmed: true,
            },
            PendingAction::RemoveContact(entry) => ControllerCommand::RemoveContact {
                entry,
                confirmed: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConversationState {
    entry: EntryId,
    scroll: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StageEditorState {
    entry: EntryId,
    stage: ContactStage,
    notes: String,
}

#[derive(Debug, Clone)]
enum UiMode {
    Normal,
    Palette(PaletteState),
    Confirm(PendingAction),
    Conversation(ConversationState),
    StageEditor(StageEditorState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaletteCommandId {
    Refresh,
    RefreshActivity,
    StartCampaign,
    StopCampaign,
    DeleteCampaign,
    OpenConversation,
    EditContact,
    RemoveContact,
    SwitchPane,
    Quit,
}

#[derive(Debug, Clone, Copy)]
struct PaletteCommand {
    id: PaletteCommandId,
    label: &'static str,
    category: &'static str,
}

#[derive(Debug)]
enum UiAction {
    None,
    Quit,
    Send(ControllerCommand),
}

/// Presentation state. Everything campaign-related comes from the latest
/// controller view; the rest is cursor and overlay state.
struct App {
    view: ControllerView,
    focus: Pane,
    campaign_cursor: usize,
    activity_cursor: usize,
    mode: UiMode,
    show_activity: bool,
    connected: bool,
}

impl App {
    fn new(show_activity: bool) -> Self {
        Self {
            view: ControllerView::default(),
            focus: Pane::Campaigns,
            campaign_cursor: 0,
            activity_cursor: 0,
            mode: UiMode::Normal,
            show_activity,
            connected: true,
        }
    }

    fn apply_view(&mut self, view: ControllerView) {
        let selection_changed = view.selected != self.view.selected;
        self.view = view;
        if selection_changed {
            if let Some(pos) = self.selected_index() {
                self.campaign_cursor = pos;
            }
            self.activity_cursor = 0;
        }
        self.campaign_cursor = clamp_cursor(self.campaign_cursor, self.view.campaigns.len());
        self.activity_cursor = clamp_cursor(self.activity_cursor, self.view.activity.len());

        let vanished = match &self.mode {
            UiMode::Conversation(state) => self.entry(state.entry).is_none(),
            UiMode::StageEditor(state) => self.entry(state.entry).is_none(),
            _ => false,
        };
        if vanished {
            self.mode = UiMode::Normal;
        }
    }

    fn selected_index(&self) -> Option<usize> {
        let id = self.view.selected?;
        self.view
            .campaigns
            .iter()
            .position(|campaign| campaign.id == id)
    }

    fn cursor_campaign(&self) -> Option<&Campaign> {
        self.view.campaigns.get(self.campaign_cursor)
    }

    fn cursor_entry(&self) -> Option<&ActivityEntry> {
        self.view.activity.get(self.activity_cursor)
    }

    fn entry(&self, id: EntryId) -> Option<&ActivityEntry> {
        self.view.activity.iter().find(|entry| entry.id == id)
    }

    fn enter_mode(&mut self, next: Option<UiMode>) {
        if let Some(mode) = next {
            self.mode = mode;
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Pane::Campaigns if self.show_activity => Pane::Activity,
            _ => Pane::Campaigns,
        };
    }

    fn move_cursor(&mut self, down: bool) {
        let (cursor, len) = match self.focus {
            Pane::Campaigns => (&mut self.campaign_cursor, self.view.campaigns.len()),
            Pane::Activity => (&mut self.activity_cursor, self.view.activity.len()),
        };
        if down {
            *cursor = clamp_cursor(cursor.saturating_add(1), len);
        } else {
            *cursor = cursor.saturating_sub(1);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> UiAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return UiAction::Quit;
        }
        match std::mem::replace(&mut self.mode, UiMode::Normal) {
            UiMode::Normal => self.handle_normal(key),
            UiMode::Palette(state) => self.handle_palette(state, key),
            UiMode::Confirm(pending) => self.handle_confirm(pending, key),
            UiMode::Conversation(state) => self.handle_conversation(state, key),
            UiMode::StageEditor(state) => self.handle_stage_editor(state, key),
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) -> UiAction {
        if key.code == KeyCode::Char('p') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.mode = UiMode::Palette(PaletteState::new());
            return UiAction::None;
        }
        match key.code {
            KeyCode::Char('q') => UiAction::Quit,
            KeyCode::Tab => self.dispatch(PaletteCommandId::SwitchPane),
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_cursor(false);
                UiAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_cursor(true);
                UiAction::None
            }
            KeyCode::Enter => match self.focus {
                Pane::Campaigns => match self.cursor_campaign() {
                    Some(campaign) => UiAction::Send(ControllerCommand::Select(campaign.id)),
                    None => UiAction::None,
                },
                Pane::Activity => self.dispatch(PaletteCommandId::OpenConversation),
            },
            KeyCode::Char('r') => self.dispatch(PaletteCommandId::Refresh),
            KeyCode::Char('a') => self.dispatch(PaletteCommandId::RefreshActivity),
            KeyCode::Char('s') => self.dispatch(PaletteCommandId::StartCampaign),
            KeyCode::Char('x') => self.dispatch(PaletteCommandId::StopCampaign),
            KeyCode::Char('c') => self.dispatch(PaletteCommandId::OpenConversation),
            KeyCode::Char('e') => self.dispatch(PaletteCommandId::EditContact),
            KeyCode::Char('d') => match self.focus {
                Pane::Campaigns => self.dispatch(PaletteCommandId::DeleteCampaign),
                Pane::Activity => self.dispatch(PaletteCommandId::RemoveContact),
            },
            _ => UiAction::None,
        }
    }

    fn handle_palette(&mut self, mut state: PaletteState, key: KeyEvent) -> UiAction {
        match key.code {
            KeyCode::Esc => return UiAction::None,
            KeyCode::Up => state.selected = state.selected.saturating_sub(1),
            KeyCode::Down => state.selected = state.selected.saturating_add(1),
            KeyCode::Backspace => {
                state.filter.pop();
                state.selected = 0;
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                state.filter.push(ch);
                state.selected = 0;
            }
            KeyCode::Enter => {
                let commands = filtered_commands(&self.view, &state.filter);
                let picked = commands
                    .get(state.selected.min(commands.len().saturating_sub(1)))
                    .map(|command| command.id);
                return match picked {
                    Some(id) => self.dispatch(id),
                    None => UiAction::None,
                };
            }
            _ => {}
        }
        self.mode = UiMode::Palette(state);
        UiAction::None
    }

    fn handle_confirm(&mut self, pending: PendingAction, key: KeyEvent) -> UiAction {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                UiAction::Send(pending.confirmed())
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => UiAction::None,
            _ => {
                self.mode = UiMode::Confirm(pending);
                UiAction::None
            }
        }
    }

    fn handle_conversation(&mut self, mut state: ConversationState, key: KeyEvent) -> UiAction {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => return UiAction::None,
            KeyCode::Up | KeyCode::Char('k') => state.scroll = state.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => state.scroll = state.scroll.saturating_add(1),
            _ => {}
        }
        self.mode = UiMode::Conversation(state);
        UiAction::None
    }

    fn handle_stage_editor(&mut self, mut state: StageEditorState, key: KeyEvent) -> UiAction {
        match key.code {
            KeyCode::Esc => return UiAction::None,
            KeyCode::Enter => {
                return UiAction::Send(ControllerCommand::UpdateContact {
                    entry: state.entry,
                    update: ContactUpdate {
                        stage: state.stage,
                        notes: normalize_notes(&state.notes),
                    },
                });
            }
            KeyCode::Left => state.stage = state.stage.previous(),
            KeyCode::Right => state.stage = state.stage.next(),
            KeyCode::Backspace => {
                state.notes.pop();
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                state.notes.push(ch);
            }
            _ => {}
        }
        self.mode = UiMode::StageEditor(state);
        UiAction::None
    }

    fn dispatch(&mut self, id: PaletteCommandId) -> UiAction {
        match id {
            PaletteCommandId::Refresh => UiAction::Send(ControllerCommand::Reload),
            PaletteCommandId::RefreshActivity => {
                UiAction::Send(ControllerCommand::RefreshActivity)
            }
            PaletteCommandId::StartCampaign => match self.view.selected {
                Some(id) => UiAction::Send(ControllerCommand::Start(id)),
                None => UiAction::None,
            },
            PaletteCommandId::StopCampaign => {
                if let Some(id) = self.view.selected {
                    self.mode = UiMode::Confirm(PendingAction::Stop(id));
                }
                UiAction::None
            }
            PaletteCommandId::DeleteCampaign => {
                let Some(id) = self.view.selected else {
                    return UiAction::None;
                };
                if self.view.selected_status == Some(CampaignStatus::Running) {
                    // Refused by the controller before any prompt; it records why.
                    return UiAction::Send(ControllerCommand::Delete {
                        id,
                        confirmed: false,
                    });
                }
                self.mode = UiMode::Confirm(PendingAction::Delete(id));
                UiAction::None
            }
            PaletteCommandId::OpenConversation => {
                let next = self.cursor_entry().map(|entry| {
                    UiMode::Conversation(ConversationState {
                        entry: entry.id,
                        scroll: 0,
                    })
                });
                self.enter_mode(next);
                UiAction::None
            }
            PaletteCommandId::EditContact => {
                let next = self.cursor_entry().map(|entry| {
                    UiMode::StageEditor(StageEditorState {
                        entry: entry.id,
                        stage: entry.stage.clone(),
                        notes: entry.notes.clone().unwrap_or_default(),
                    })
                });
                self.enter_mode(next);
                UiAction::None
            }
            PaletteCommandId::RemoveContact => {
                let next = self
                    .cursor_entry()
                    .map(|entry| UiMode::Confirm(PendingAction::RemoveContact(entry.id)));
                self.enter_mode(next);
                UiAction::None
            }
            PaletteCommandId::SwitchPane => {
                self.toggle_focus();
                UiAction::None
            }
            PaletteCommandId::Quit => UiAction::Quit,
        }
    }
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen);
    }
}

pub fn run(ctx: TuiContext) -> Result<(), Box<dyn std::error::Error>> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let _terminal_guard = TerminalGuard;

    // Panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = terminal::disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen);
        original_hook(info);
    }));

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let TuiContext {
        worker,
        ui_config,
        poll_interval,
    } = ctx;
    let theme = UiTheme::from_config(&ui_config);
    let mut app = App::new(ui_config.show_activity);

    loop {
        // Drain all pending views; only the latest matters.
        loop {
            match worker.events.try_recv() {
                Ok(WorkerEvent::View(view)) => app.apply_view(*view),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    app.connected = false;
                    break;
                }
            }
        }

        terminal.draw(|frame| {
            let [title_area, content_area, footer_area] = Layout::vertical([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .areas(frame.area());

            render_title_bar(frame, title_area, &theme);

            let [list_area, separator_area, detail_area] = Layout::horizontal([
                Constraint::Percentage(32),
                Constraint::Length(1),
                Constraint::Percentage(68),
            ])
            .areas(content_area);

            let separator = Paragraph::new(Text::from(
                (0..separator_area.height)
                    .map(|_| Line::from(Span::styled("|", Style::default().fg(theme.muted))))
                    .collect::<Vec<_>>(),
            ));
            frame.render_widget(separator, separator_area);

            render_campaign_list(frame, list_area, &app, &theme);
            render_detail(frame, detail_area, &app, &theme);
            render_footer(frame, footer_area, &app, &theme, poll_interval);

            match &app.mode {
                UiMode::Palette(state) => render_palette(frame, state, &app.view, &theme),
                UiMode::Confirm(pending) => render_confirm(frame, *pending, &theme),
                UiMode::Conversation(state) => {
                    if let Some(entry) = app.entry(state.entry) {
                        render_conversation(frame, entry, state.scroll, &theme);
                    }
                }
                UiMode::StageEditor(state) => render_stage_editor(frame, state, &theme),
                UiMode::Normal => {}
            }
        })?;

        if event::poll(Duration::from_millis(50))? {
            let action = match event::read()? {
                Event::Key(key) => app.handle_key(key),
                Event::FocusGained => UiAction::Send(ControllerCommand::SetVisible(true)),
                Event::FocusLost => UiAction::Send(ControllerCommand::SetVisible(false)),
                _ => UiAction::None,
            };
            match action {
                UiAction::Quit => break,
                UiAction::Send(command) => {
                    if worker.commands.send(command).is_err() {
                        app.connected = false;
                    }
                }
                UiAction::None => {}
            }
        }
    }

    worker.shutdown();
    Ok(())
}

fn render_title_bar(frame: &mut ratatui::Frame, area: Rect, theme: &UiTheme) {
    let hint = "ctrl+p command palette";
    let hint_len = hint.len() as u16;
    let [left, right] =
        Layout::horizontal([Constraint::Min(1), Constraint::Length(hint_len + 1)]).areas(area);

    let version = prospect_core::version();
    let left_line = Line::from(vec![
        Span::styled("■ ", Style::default().fg(theme.accent)),
        Span::styled(
            format!("prospect v{version}"),
            Style::default().fg(theme.accent),
        ),
    ]);
    let right_line = Line::from(Span::styled(hint, Style::default().fg(theme.muted)));

    frame.render_widget(Paragraph::new(left_line), left);
    frame.render_widget(
        Paragraph::new(right_line).alignment(Alignment::Right),
        right,
    );
}

fn render_campaign_list(frame: &mut ratatui::Frame, area: Rect, app: &App, theme: &UiTheme) {
    let focused = app.focus == Pane::Campaigns;
    let mut lines = vec![Line::from(Span::styled(
        format!("Campaigns ({})", app.view.campaigns.len()),
        Style::default().fg(if focused { theme.accent } else { theme.heading }),
    ))];
    if app.view.campaigns.is_empty() {
        lines.push(Line::from(Span::styled(
            "no campaigns",
            Style::default().fg(theme.muted),
        )));
    }
    for (idx, campaign) in app.view.campaigns.iter().enumerate() {
        let cursor = if focused && idx == app.campaign_cursor {
            "› "
        } else {
            "  "
        };
        let selected = app.view.selected == Some(campaign.id);
        let name_style = if selected {
            Style::default().fg(theme.accent)
        } else {
            Style::default().fg(theme.neutral)
        };
        lines.push(Line::from(vec![
            Span::styled(cursor, Style::default().fg(theme.accent)),
            Span::styled(campaign.name.clone(), name_style),
            Span::raw(" "),
            Span::styled(
                campaign.status.label().to_string(),
                status_style(theme, campaign.status),
            ),
        ]));
    }

    let visible_rows = area.height.saturating_sub(1) as usize;
    let cursor_row = app.campaign_cursor + 1;
    let scroll = (cursor_row + 1).saturating_sub(visible_rows.max(1)) as u16;
    let paragraph = Paragraph::new(Text::from(pad_lines(&lines))).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_detail(frame: &mut ratatui::Frame, area: Rect, app: &App, theme: &UiTheme) {
    let Some(campaign) = app.view.selected_campaign() else {
        frame.render_widget(
            Paragraph::new(Span::styled(
                " select a campaign",
                Style::default().fg(theme.muted),
            )),
            area,
        );
        return;
    };

    let (header_area, log_area, activity_area) = if app.show_activity {
        let [header, log, activity] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Percentage(55),
            Constraint::Min(3),
        ])
        .areas(area);
        (header, log, Some(activity))
    } else {
        let [header, log] =
            Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(area);
        (header, log, None)
    };

    let header = vec![
        Line::from(vec![
            Span::styled(campaign.name.clone(), Style::default().fg(theme.neutral)),
            Span::raw("  "),
            Span::styled(
                campaign.status.label().to_string(),
                status_style(theme, campaign.status),
            ),
        ]),
        Line::from(Span::styled(
            format!(
                "follow-up {}m  first message every {}s",
                campaign.followup_interval_minutes, campaign.initial_message_interval_seconds
            ),
            Style::default().fg(theme.muted),
        )),
    ];
    frame.render_widget(Paragraph::new(Text::from(pad_lines(&header))), header_area);

    render_scrolled_paragraph(frame, log_area, &log_panel_lines(&app.view.log, theme));

    if let Some(activity_area) = activity_area {
        let lines = activity_lines(
            &app.view.activity,
            app.activity_cursor,
            app.focus == Pane::Activity,
            theme,
        );
        let visible_rows = activity_area.height.saturating_sub(1) as usize;
        let scroll = (app.activity_cursor + 2).saturating_sub(visible_rows.max(1)) as u16;
        frame.render_widget(
            Paragraph::new(Text::from(pad_lines(&lines))).scroll((scroll, 0)),
            activity_area,
        );
    }
}

fn render_footer(
    frame: &mut ratatui::Frame,
    area: Rect,
    app: &App,
    theme: &UiTheme,
    interval: Duration,
) {
    let status = if app.connected {
        footer_status(&app.view, interval)
    } else {
        "controller stopped".to_string()
    };
    let status_style = if app.view.polling && app.view.visible {
        Style::default().fg(theme.accent)
    } else {
        Style::default().fg(theme.muted)
    };

    let (message, message_style) = match &app.view.error {
        Some(notice) => (notice.message.clone(), Style::default().fg(theme.error)),
        None => (
            "s start  x stop  d delete  r refresh  tab pane  enter open  q quit".to_string(),
            Style::default().fg(theme.muted),
        ),
    };

    let [left, right] = Layout::horizontal([
        Constraint::Length(status.chars().count() as u16 + 2),
        Constraint::Min(1),
    ])
    .areas(area);

    frame.render_widget(Paragraph::new(status).style(status_style), left);
    frame.render_widget(
        Paragraph::new(message)
            .alignment(Alignment::Right)
            .style(message_style),
        right,
    );
}

fn render_palette(
    frame: &mut ratatui::Frame,
    state: &PaletteState,
    view: &ControllerView,
    theme: &UiTheme,
) {
    let width = 60.min(frame.area().width.saturating_sub(4) as usize) as u16;
    let height = 2 + 1 + 10;
    let area = centered_rect(width, height, frame.area());
    frame.render_widget(Clear, area);
    frame.render_widget(Block::default().borders(Borders::ALL), area);

    let inner = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    };

    let [title_area, input_area, list_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(1),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new("Command Palette")
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.heading)),
        title_area,
    );

    let input_line = format!("> {}", state.filter);
    frame.render_widget(Paragraph::new(input_line), input_area);

    let commands = filtered_commands(view, &state.filter);
    let selected = if commands.is_empty() {
        0
    } else {
        state.selected.min(commands.len().saturating_sub(1))
    };
    let visible = limit_commands(&commands, selected, list_area.height as usize);
    let lines = render_command_lines(visible, theme, list_area.width as usize);
    frame.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true }),
        list_area,
    );
}

fn render_command_lines(
    commands: Vec<(PaletteCommand, bool)>,
    theme: &UiTheme,
    width: usize,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (command, is_selected) in commands {
        let available = width.saturating_sub(1);
        let gap = available
            .saturating_sub(command.label.len())
            .saturating_sub(command.category.len())
            .max(1);
        let padding = " ".repeat(gap);
        let spans = if is_selected {
            vec![
                Span::styled(
                    command.label,
                    Style::default().fg(Color::Black).bg(theme.accent),
                ),
                Span::styled(padding, Style::default().bg(theme.accent)),
                Span::styled(
                    command.category,
                    Style::default().fg(Color::Black).bg(theme.accent),
                ),
            ]
        } else {
            vec![
                Span::styled(command.label, Style::default().fg(theme.neutral)),
                Span::raw(padding),
                Span::styled(command.category, Style::default().fg(theme.muted)),
            ]
        };
        lines.push(Line::from(spans));
    }
    lines
}

fn render_confirm(frame: &mut ratatui::Frame, pending: PendingAction, theme: &UiTheme) {
    let prompt = pending.prompt();
    let width = (prompt.chars().count() as u16 + 6).min(frame.area().width.saturating_sub(4));
    let area = centered_rect(width, 5, frame.area());
    frame.render_widget(Clear, area);

    let body = Text::from(vec![
        Line::from(Span::styled(prompt, Style::default().fg(theme.neutral))),
        Line::from(Span::styled(
            "y confirm  n cancel",
            Style::default().fg(theme.muted),
        )),
    ]);
    let dialog = Paragraph::new(body)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled("Confirm", Style::default().fg(theme.warning))),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(dialog, area);
}

fn render_conversation(
    frame: &mut ratatui::Frame,
    entry: &ActivityEntry,
    scroll: u16,
    theme: &UiTheme,
) {
    let width = 80.min(frame.area().width.saturating_sub(4) as usize) as u16;
    let height = frame.area().height.saturating_sub(4);
    let area = centered_rect(width, height, frame.area());
    frame.render_widget(Clear, area);

    let messages = transcript::parse(&entry.transcript);
    let lines = conversation_lines(&messages, theme);
    let scroll = scroll.min(lines.len().saturating_sub(1) as u16);
    let title = format!("{} (Esc close)", display_name(entry));
    let viewer = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(title, Style::default().fg(theme.heading))),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(viewer, area);
}

fn render_stage_editor(frame: &mut ratatui::Frame, state: &StageEditorState, theme: &UiTheme) {
    let width = 70.min(frame.area().width.saturating_sub(4) as usize) as u16;
    let height = 10.min(frame.area().height.saturating_sub(4) as usize) as u16;
    let area = centered_rect(width, height, frame.area());
    frame.render_widget(Clear, area);

    let notes = if state.notes.is_empty() {
        Line::from(Span::styled("notes...", Style::default().fg(theme.muted)))
    } else {
        Line::from(Span::styled(
            state.notes.clone(),
            Style::default().fg(theme.neutral),
        ))
    };
    let body = Text::from(vec![
        Line::from(vec![
            Span::styled("stage  ", Style::default().fg(theme.muted)),
            Span::styled("‹ ", Style::default().fg(theme.muted)),
            Span::styled(
                state.stage.label().to_string(),
                Style::default().fg(theme.accent),
            ),
            Span::styled(" ›", Style::default().fg(theme.muted)),
        ]),
        Line::from(""),
        notes,
    ]);

    let editor = Paragraph::new(body)
        .block(Block::default().borders(Borders::ALL).title(Span::styled(
            format!(
                "Contact {} (←/→ stage, Enter save, Esc cancel)",
                state.entry
            ),
            Style::default().fg(theme.heading),
        )))
        .wrap(Wrap { trim: false });
    frame.render_widget(editor, area);
}

fn render_scrolled_paragraph(frame: &mut ratatui::Frame, area: Rect, lines: &[Line<'static>]) {
    let scroll = lines.len().saturating_sub(area.height as usize) as u16;
    let padded = pad_lines(lines);
    let paragraph = Paragraph::new(Text::from(padded))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn pad_lines(lines: &[Line<'static>]) -> Vec<Line<'static>> {
    lines
        .iter()
        .cloned()
        .map(|line| {
            let mut spans = vec![Span::raw(" ")];
            spans.extend(line.spans);
            Line::from(spans)
        })
        .collect()
}

fn log_panel_lines(log: &LogState, theme: &UiTheme) -> Vec<Line<'static>> {
    let muted = |text: &str| {
        vec![Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(theme.muted),
        ))]
    };
    match log {
        LogState::Idle => muted("loading log..."),
        LogState::Unavailable => muted("log unavailable: the campaign no longer exists"),
        LogState::Loaded(text) => {
            let lines = progress::log_lines(text);
            if lines.is_empty() {
                return muted("no log output yet");
            }
            lines
                .into_iter()
                .map(|(tone, line)| {
                    Line::from(Span::styled(line.to_string(), tone_style(theme, tone)))
                })
                .collect()
        }
    }
}

fn activity_lines(
    entries: &[ActivityEntry],
    cursor: usize,
    focused: bool,
    theme: &UiTheme,
) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!("Contacts ({})", entries.len()),
        Style::default().fg(if focused { theme.accent } else { theme.heading }),
    ))];
    if entries.is_empty() {
        lines.push(Line::from(Span::styled(
            "no contacts in this campaign",
            Style::default().fg(theme.muted),
        )));
        return lines;
    }
    for (idx, entry) in entries.iter().enumerate() {
        let marker = if focused && idx == cursor { "› " } else { "  " };
        let updated = entry
            .updated_at
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(theme.accent)),
            Span::styled(
                format!("{:<24}", display_name(entry)),
                Style::default().fg(theme.neutral),
            ),
            Span::styled(
                format!("{:<20}", entry.stage.label()),
                Style::default().fg(theme.heading),
            ),
            Span::styled(updated, Style::default().fg(theme.muted)),
        ]));
    }
    lines
}

fn conversation_lines(messages: &[Message], theme: &UiTheme) -> Vec<Line<'static>> {
    if messages.is_empty() {
        return vec![Line::from(Span::styled(
            "no conversation history",
            Style::default().fg(theme.muted),
        ))];
    }
    let mut lines = Vec::new();
    for message in messages {
        let (label, style) = match message.speaker {
            Speaker::Operator => ("Operator", Style::default().fg(theme.operator)),
            Speaker::Contact => ("Contact", Style::default().fg(theme.contact)),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(theme.heading),
        )));
        for text_line in message.text.lines() {
            lines.push(Line::from(Span::styled(format!("  {text_line}"), style)));
        }
        lines.push(Line::from(""));
    }
    lines.pop();
    lines
}

fn display_name(entry: &ActivityEntry) -> String {
    let name = entry.contact_name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    let phone = entry.contact_phone.trim();
    if !phone.is_empty() {
        return phone.to_string();
    }
    format!("contact {}", entry.id)
}

fn footer_status(view: &ControllerView, interval: Duration) -> String {
    if view.polling {
        let mut status = format!("live every {}", format_interval(interval));
        if !view.visible {
            status.push_str(" (paused)");
        }
        if view.skipped_ticks > 0 {
            status.push_str(&format!(" skipped:{}", view.skipped_ticks));
        }
        return status;
    }
    match view.log {
        LogState::Unavailable => "unavailable".to_string(),
        _ => "idle".to_string(),
    }
}

fn filtered_commands(view: &ControllerView, filter: &str) -> Vec<PaletteCommand> {
    let commands = commands_for_view(view);
    if filter.trim().is_empty() {
        return commands;
    }
    commands
        .into_iter()
        .filter(|command| fuzzy_match(filter, command.label))
        .collect()
}

fn commands_for_view(view: &ControllerView) -> Vec<PaletteCommand> {
    let mut commands = vec![PaletteCommand {
        id: PaletteCommandId::Refresh,
        label: "Refresh campaigns",
        category: "Campaign",
    }];
    if let Some(status) = view.selected_status {
        if status.can_start() {
            commands.push(PaletteCommand {
                id: PaletteCommandId::StartCampaign,
                label: "Start campaign",
                category: "Campaign",
            });
        }
        if status.can_stop() {
            commands.push(PaletteCommand {
                id: PaletteCommandId::StopCampaign,
                label: "Stop campaign",
                category: "Campaign",
            });
        }
        if status.allows_mutation() {
            commands.push(PaletteCommand {
                id: PaletteCommandId::DeleteCampaign,
                label: "Delete campaign",
                category: "Campaign",
            });
        }
        commands.push(PaletteCommand {
            id: PaletteCommandId::RefreshActivity,
            label: "Refresh contacts",
            category: "Contacts",
        });
    }
    if !view.activity.is_empty() {
        commands.extend([
            PaletteCommand {
                id: PaletteCommandId::OpenConversation,
                label: "Open conversation",
                category: "Contacts",
            },
            PaletteCommand {
                id: PaletteCommandId::EditContact,
                label: "Edit contact stage",
                category: "Contacts",
            },
            PaletteCommand {
                id: PaletteCommandId::RemoveContact,
                label: "Remove contact",
                category: "Contacts",
            },
        ]);
    }
    commands.extend([
        PaletteCommand {
            id: PaletteCommandId::SwitchPane,
            label: "Switch pane",
            category: "View",
        },
        PaletteCommand {
            id: PaletteCommandId::Quit,
            label: "Quit",
            category: "App",
        },
    ]);
    commands
}

fn limit_commands(
    commands: &[PaletteCommand],
    selected: usize,
    max_rows: usize,
) -> Vec<(PaletteCommand, bool)> {
    if commands.is_empty() || max_rows == 0 {
        return Vec::new();
    }
    let mut selected = selected.min(commands.len().saturating_sub(1));
    let start = if selected >= max_rows {
        selected + 1 - max_rows
    } else {
        0
    };
    let end = (start + max_rows).min(commands.len());
    selected -= start;

    commands[start..end]
        .iter()
        .enumerate()
        .map(|(idx, command)| (*command, idx == selected))
        .collect()
}

fn fuzzy_match(needle: &str, haystack: &str) -> bool {
    let needle = needle.to_lowercase();
    let haystack = haystack.to_lowercase();
    let mut chars = needle.chars();
    let mut current = chars.next();

    for ch in haystack.chars() {
        match current {
            Some(target) if ch == target => current = chars.next(),
            Some(_) => {}
            None => return true,
        }
    }

    current.is_none()
}

/// Render a backend timestamp as `YYYY-MM-DD HH:MM`. Accepts RFC 3339 and
/// naive ISO 8601 (with or without fractional seconds); anything else is
/// shown as sent.
fn format_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(output) = time::format_description::parse("[year]-[month]-[day] [hour]:[minute]") else {
        return trimmed.to_string();
    };
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339)
        && let Ok(formatted) = parsed.format(&output)
    {
        return formatted;
    }

    let naive = trimmed.split('.').next().unwrap_or(trimmed).replacen(' ', "T", 1);
    let Ok(input) = time::format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second]")
    else {
        return trimmed.to_string();
    };
    PrimitiveDateTime::parse(&naive, &input)
        .ok()
        .and_then(|parsed| parsed.format(&output).ok())
        .unwrap_or_else(|| trimmed.to_string())
}

fn format_interval(interval: Duration) -> String {
    let millis = interval.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{:.1}s", interval.as_secs_f64())
    }
}

fn normalize_notes(notes: &str) -> Option<String> {
    let trimmed = notes.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}

fn status_style(theme: &UiTheme, status: CampaignStatus) -> Style {
    match status {
        CampaignStatus::Running => Style::default().fg(theme.accent),
        CampaignStatus::Completed => Style::default().fg(theme.success),
        CampaignStatus::Error => Style::default().fg(theme.error),
        CampaignStatus::Stopped => Style::default().fg(theme.warning),
        CampaignStatus::Pending => Style::default().fg(theme.muted),
    }
}

fn tone_style(theme: &UiTheme, tone: LogTone) -> Style {
    match tone {
        LogTone::Error => Style::default().fg(theme.error),
        LogTone::Success => Style::default().fg(theme.success),
        LogTone::Interrupted => Style::default().fg(theme.warning),
        LogTone::Normal => Style::default().fg(theme.neutral),
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));

    let [_, middle, _] = Layout::vertical([
        Constraint::Length((area.height.saturating_sub(height)) / 2),
        Constraint::Length(height),
        Constraint::Min(0),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Length((area.width.saturating_sub(width)) / 2),
        Constraint::Length(width),
        Constraint::Min(0),
    ])
    .areas(middle);

    center
}
