//! Terminal console for the comms view.
//!
//! Shows the agent topology as a tree above the live event feed, with
//! dialogs for sending a message between agents and posting a task.
//!
//! Launch with `wws-comms`.

mod forms;

pub use forms::{SendForm, TaskForm};

use std::collections::HashSet;
use std::io::{self, Stdout};
use std::time::Duration;

use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph},
    Frame, Terminal,
};

use wws_comms_protocol::{CommsEvent, CommsSendRequest, CommsTaskRequest, Node, Topology};

use crate::event_feed::FeedState;
use crate::present::{
    kind_color, kind_icon, kind_label, relative_time, short_time, state_color, truncate,
};
use crate::view_model::{ViewChange, ViewModel};

const HINTS: &str =
    "[s]end  [t]ask  [r]eload  [g] topology  [c] reconnect  [Tab] focus  [\u{2191}\u{2193}] scroll  [q]uit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Topology,
    Events,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    None,
    Send(SendForm),
    Task(TaskForm),
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Continue,
    Quit,
    /// Tear down and re-activate the whole view.
    Reload,
    /// Refetch only the topology snapshot.
    ReloadTopology,
    Reconnect,
    SendMessage(CommsSendRequest),
    PostTask(CommsTaskRequest),
}

/// Progress of the submission made from the open dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Enter was pressed; the event loop has not issued it yet.
    Submitted,
    /// Issued as view action `id`.
    InFlight(u64),
}

/// UI-only state. Everything shown about agents and events comes from the
/// [`ViewModel`].
pub struct ConsoleState {
    focus: Focus,
    modal: Modal,
    events: ListState,
    topology_scroll: u16,
    status: Option<(String, Color)>,
    /// Submission from the open dialog not yet answered.
    pending: Option<Pending>,
    tick: usize,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self {
            focus: Focus::Topology,
            modal: Modal::None,
            events: ListState::default(),
            topology_scroll: 0,
            status: None,
            pending: None,
            tick: 0,
        }
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|(msg, _)| msg.as_str())
    }

    pub fn selected_event(&self) -> Option<usize> {
        self.events.selected()
    }

    pub fn set_status(&mut self, msg: impl Into<String>, color: Color) {
        self.status = Some((msg.into(), color));
    }

    /// Record the view action id of the submission just returned by
    /// [`ConsoleState::handle_key`]. Only that id's result closes the dialog.
    pub fn track_submission(&mut self, id: u64) {
        if self.pending == Some(Pending::Submitted) {
            self.pending = Some(Pending::InFlight(id));
        }
    }

    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Handle one key press. `event_count` bounds the feed selection.
    pub fn handle_key(&mut self, key: KeyEvent, event_count: usize) -> ConsoleAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return ConsoleAction::Quit;
        }
        match self.modal {
            Modal::None => self.handle_main_key(key.code, event_count),
            _ => self.handle_modal_key(key.code),
        }
    }

    fn handle_main_key(&mut self, code: KeyCode, event_count: usize) -> ConsoleAction {
        match code {
            KeyCode::Char('q') => return ConsoleAction::Quit,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Topology => Focus::Events,
                    Focus::Events => Focus::Topology,
                };
            }
            KeyCode::Char('s') => self.modal = Modal::Send(SendForm::new()),
            KeyCode::Char('t') => self.modal = Modal::Task(TaskForm::new()),
            KeyCode::Char('r') => return ConsoleAction::Reload,
            KeyCode::Char('g') => return ConsoleAction::ReloadTopology,
            KeyCode::Char('c') => return ConsoleAction::Reconnect,
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(event_count),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(event_count),
            _ => {}
        }
        ConsoleAction::Continue
    }

    fn scroll_up(&mut self, event_count: usize) {
        match self.focus {
            Focus::Topology => self.topology_scroll = self.topology_scroll.saturating_sub(1),
            Focus::Events if event_count > 0 => {
                let i = self.events.selected().unwrap_or(0);
                let next = if i == 0 { event_count - 1 } else { i - 1 };
                self.events.select(Some(next));
            }
            Focus::Events => {}
        }
    }

    fn scroll_down(&mut self, event_count: usize) {
        match self.focus {
            Focus::Topology => self.topology_scroll = self.topology_scroll.saturating_add(1),
            Focus::Events if event_count > 0 => {
                let next = self
                    .events
                    .selected()
                    .map_or(0, |i| (i + 1) % event_count);
                self.events.select(Some(next));
            }
            Focus::Events => {}
        }
    }

    fn handle_modal_key(&mut self, code: KeyCode) -> ConsoleAction {
        if code == KeyCode::Esc {
            // A result still in flight only updates the status line.
            self.modal = Modal::None;
            self.pending = None;
            return ConsoleAction::Continue;
        }
        if code == KeyCode::Enter {
            return self.submit_modal();
        }
        match &mut self.modal {
            Modal::Send(form) => match code {
                KeyCode::Tab => form.next_field(),
                KeyCode::BackTab => form.prev_field(),
                KeyCode::Backspace => form.backspace(),
                KeyCode::Char(c) => form.push(c),
                _ => {}
            },
            Modal::Task(form) => match code {
                KeyCode::Tab => form.next_field(),
                KeyCode::BackTab => form.prev_field(),
                KeyCode::Backspace => form.backspace(),
                KeyCode::Char(c) => form.push(c),
                _ => {}
            },
            Modal::None => {}
        }
        ConsoleAction::Continue
    }

    fn submit_modal(&mut self) -> ConsoleAction {
        if self.pending.is_some() {
            return ConsoleAction::Continue;
        }
        match &self.modal {
            Modal::Send(form) => match form.submit() {
                Some(req) => {
                    self.pending = Some(Pending::Submitted);
                    self.set_status("Sending\u{2026}", Color::Yellow);
                    ConsoleAction::SendMessage(req)
                }
                None => {
                    self.set_status("From, to and message are all required", Color::Red);
                    ConsoleAction::Continue
                }
            },
            Modal::Task(form) => match form.submit() {
                Some(req) => {
                    self.pending = Some(Pending::Submitted);
                    self.set_status("Posting\u{2026}", Color::Yellow);
                    ConsoleAction::PostTask(req)
                }
                None => {
                    self.set_status("A task needs a title", Color::Red);
                    ConsoleAction::Continue
                }
            },
            Modal::None => ConsoleAction::Continue,
        }
    }

    /// React to a change applied by the view model.
    pub fn on_change(&mut self, change: &ViewChange) {
        match change {
            ViewChange::ActionSucceeded { id, message, .. } => {
                if self.pending == Some(Pending::InFlight(*id)) {
                    self.pending = None;
                    self.modal = Modal::None;
                }
                self.set_status(message.clone(), Color::Green);
            }
            ViewChange::ActionFailed { id, message, .. } => {
                if self.pending == Some(Pending::InFlight(*id)) {
                    self.pending = None;
                }
                self.set_status(message.clone(), Color::Red);
            }
            ViewChange::StreamEnded => {
                self.set_status("Event stream closed; press c to reconnect", Color::Yellow);
            }
            ViewChange::Nothing | ViewChange::FeedUpdated | ViewChange::TopologyUpdated => {}
        }
    }

    /// Forget UI state tied to the previous session.
    pub fn reset(&mut self) {
        self.pending = None;
        self.modal = Modal::None;
        self.events.select(None);
        self.topology_scroll = 0;
    }

    /// Render the full console layout.
    pub fn render(&mut self, frame: &mut Frame, view: &ViewModel) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),      // Header
                Constraint::Percentage(40), // Topology
                Constraint::Min(6),         // Event feed
                Constraint::Length(1),      // Status / hints
            ])
            .split(frame.area());

        self.render_header(frame, outer[0], view);
        self.render_topology(frame, outer[1], view);
        self.render_events(frame, outer[2], view);
        self.render_status(frame, outer[3], view);

        match &self.modal {
            Modal::Send(form) => render_form(
                frame,
                " Send Message ",
                &SendForm::LABELS,
                &form.values(),
                form.focused(),
                "[Tab] field  [Enter] send  [Esc] cancel",
            ),
            Modal::Task(form) => render_form(
                frame,
                " Post Task ",
                &TaskForm::LABELS,
                &form.values(),
                form.focused(),
                "[Tab] field  [Enter] post  [Esc] cancel",
            ),
            Modal::None => {}
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, view: &ViewModel) {
        let block = Block::default()
            .title(" WWS Comms ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let topology = view.topology().topology();
        let state = view.feed_state();
        let line = Line::from(vec![
            Span::styled("  Agents: ", Style::default().fg(Color::Gray)),
            Span::styled(topology.nodes.len().to_string(), Style::default().fg(Color::White)),
            Span::styled("  |  Edges: ", Style::default().fg(Color::Gray)),
            Span::styled(topology.edges.len().to_string(), Style::default().fg(Color::White)),
            Span::styled("  |  Events: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}/{}", view.events().len(), view.events().capacity()),
                Style::default().fg(Color::Magenta),
            ),
            Span::styled("  |  Feed: ", Style::default().fg(Color::Gray)),
            Span::styled(state.as_str(), Style::default().fg(feed_color(state))),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn render_topology(&self, frame: &mut Frame, area: Rect, view: &ViewModel) {
        let title = if self.focus == Focus::Topology {
            " \u{25b6} Agent Topology "
        } else {
            " Agent Topology "
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow));

        let topology = view.topology().topology();
        if topology.is_empty() {
            let msg = if view.load_error().is_some() {
                "  Topology unavailable."
            } else {
                "  No agents running."
            };
            let text = Paragraph::new(Span::styled(msg, Style::default().fg(Color::DarkGray)));
            frame.render_widget(text.block(block), area);
            return;
        }

        let lines = topology_lines(topology);
        let visible = area.height.saturating_sub(2);
        let max_scroll = u16::try_from(lines.len())
            .unwrap_or(u16::MAX)
            .saturating_sub(visible);
        let scroll = self.topology_scroll.min(max_scroll);
        frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)).block(block), area);
    }

    fn render_events(&mut self, frame: &mut Frame, area: Rect, view: &ViewModel) {
        let events = view.events();
        let last = events
            .newest()
            .map(|e| format!(", last {}", relative_time(&e.timestamp, Utc::now())))
            .unwrap_or_default();
        let marker = if self.focus == Focus::Events { "\u{25b6} " } else { "" };
        let block = Block::default()
            .title(format!(" {marker}Live Event Feed ({} events{last}) ", events.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightBlue));

        if events.is_empty() {
            let text = Paragraph::new(Span::styled(
                "  No inter-agent events yet.",
                Style::default().fg(Color::DarkGray),
            ));
            frame.render_widget(text.block(block), area);
            return;
        }

        if let Some(selected) = self.events.selected() {
            if selected >= events.len() {
                self.events.select(Some(events.len() - 1));
            }
        }

        let items: Vec<ListItem> = events.iter().map(event_item).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, area, &mut self.events);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, view: &ViewModel) {
        let stream_failure = view.stream_error().map(stream_failed_status);
        let (msg, color) = match (&self.status, view.load_error(), &stream_failure) {
            (Some((msg, color)), _, _) => (msg.as_str(), *color),
            (None, Some(err), _) => (err, Color::Red),
            (None, None, Some(failure)) => (failure.as_str(), Color::Yellow),
            (None, None, None) => ("", Color::Gray),
        };
        let mut spans = Vec::new();
        if !msg.is_empty() {
            spans.push(Span::styled(format!(" {msg} "), Style::default().fg(color)));
            spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(HINTS, Style::default().fg(Color::DarkGray)));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_failed_status(err: &str) -> String {
    format!("Event stream failed: {err}; press c to reconnect")
}

fn feed_color(state: FeedState) -> Color {
    match state {
        FeedState::Streaming => Color::Green,
        FeedState::Connecting => Color::Yellow,
        FeedState::Idle => Color::Gray,
        FeedState::Closed => Color::Red,
    }
}

fn event_item(ev: &CommsEvent) -> ListItem<'static> {
    let target = ev
        .target_label()
        .map(|t| format!(" \u{2192} {t}"))
        .unwrap_or_default();
    let detail = truncate(ev.detail.as_deref().unwrap_or(""), 50);
    ListItem::new(Line::from(vec![
        Span::styled(
            format!("{:<8}", short_time(&ev.timestamp)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!(" {} {:<8}", kind_icon(&ev.kind), kind_label(&ev.kind)),
            Style::default().fg(kind_color(&ev.kind)),
        ),
        Span::styled(
            format!(" {}", ev.source_label()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(target, Style::default().fg(Color::Magenta)),
        Span::styled(format!("  {detail}"), Style::default().fg(Color::Gray)),
    ]))
}

/// Tree lines for the topology panel.
///
/// Roots first, each followed by its descendants. Nodes on a parent/child
/// cycle are marked instead of followed; nodes not reachable from any root
/// are listed after the roots.
pub fn topology_lines(topology: &Topology) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut shown = HashSet::new();
    let mut path = Vec::new();
    for root in topology.roots() {
        push_node(topology, root, "", None, &mut path, &mut shown, &mut lines);
    }
    for node in &topology.nodes {
        if !shown.contains(node.id.as_str()) {
            push_node(topology, node, "", None, &mut path, &mut shown, &mut lines);
        }
    }
    lines
}

/// `is_last` is `None` at the top level.
fn push_node<'a>(
    topology: &'a Topology,
    node: &'a Node,
    prefix: &str,
    is_last: Option<bool>,
    path: &mut Vec<&'a str>,
    shown: &mut HashSet<&'a str>,
    lines: &mut Vec<Line<'static>>,
) {
    let branch = match is_last {
        None => "  ".to_string(),
        Some(true) => format!("{prefix}\u{2514}\u{2500}\u{2500} "),
        Some(false) => format!("{prefix}\u{251c}\u{2500}\u{2500} "),
    };
    let on_cycle = path.contains(&node.id.as_str());
    shown.insert(node.id.as_str());

    let name_style = if is_last.is_none() {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let mut spans = vec![
        Span::styled(branch, Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("[{}]", node.state),
            Style::default().fg(state_color(&node.state)),
        ),
        Span::styled(format!(" {}", node.display_name()), name_style),
    ];
    if let Some(model) = &node.model {
        spans.push(Span::styled(format!(" ({model})"), Style::default().fg(Color::DarkGray)));
    }
    if on_cycle {
        spans.push(Span::styled(" \u{21ba} cycle", Style::default().fg(Color::Red)));
        lines.push(Line::from(spans));
        return;
    }
    for peer in topology.peers_of(&node.id) {
        spans.push(Span::styled(
            format!("  \u{2194} {}", peer.display_name()),
            Style::default().fg(Color::Magenta),
        ));
    }
    lines.push(Line::from(spans));

    let child_prefix = match is_last {
        None => "    ".to_string(),
        Some(true) => format!("{prefix}    "),
        Some(false) => format!("{prefix}\u{2502}   "),
    };
    let children = topology.children_of(&node.id);
    let count = children.len();
    path.push(node.id.as_str());
    for (i, child) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        push_node(topology, child, &child_prefix, Some(last), path, shown, lines);
    }
    path.pop();
}

fn render_form(
    frame: &mut Frame,
    title: &'static str,
    labels: &[&'static str],
    values: &[&str],
    focused: usize,
    hint: &'static str,
) {
    let area = centered_rect(50, 12, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .padding(Padding::uniform(1));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::with_capacity(labels.len() * 2 + 1);
    for (i, label) in labels.iter().enumerate() {
        let label_style = if i == focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        lines.push(Line::from(Span::styled(*label, label_style)));
        let cursor = if i == focused { "\u{2588}" } else { "" };
        lines.push(Line::from(Span::styled(
            format!("  {}{cursor}", values.get(i).copied().unwrap_or("")),
            Style::default().fg(Color::White),
        )));
    }
    lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    frame.render_widget(Paragraph::new(lines), inner);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let w = u16::try_from(u32::from(area.width) * u32::from(percent_x) / 100)
        .unwrap_or(area.width);
    let x = area.x + area.width.saturating_sub(w) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, w, height.min(area.height))
}

/// Set up the terminal for TUI rendering.
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the console until the user quits.
///
/// The view should already be activated; a failed activation is shown in
/// the status line and can be retried with `r`.
pub async fn run_console(view: &mut ViewModel, tick_rate: Duration) -> Result<(), anyhow::Error> {
    use std::io::IsTerminal;
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        return Err(anyhow::anyhow!("Comms console requires a terminal (TTY)."));
    }

    // Set up panic hook to restore terminal.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut console = ConsoleState::new();
    let result = event_loop(&mut terminal, &mut console, view, tick_rate).await;
    restore_terminal(&mut terminal)?;
    view.deactivate();
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    console: &mut ConsoleState,
    view: &mut ViewModel,
    tick_rate: Duration,
) -> Result<(), anyhow::Error> {
    loop {
        for change in view.drain_updates() {
            console.on_change(&change);
        }
        console.tick();
        terminal.draw(|frame| console.render(frame, view))?;

        if !event::poll(tick_rate)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match console.handle_key(key, view.events().len()) {
            ConsoleAction::Continue => {}
            ConsoleAction::Quit => return Ok(()),
            ConsoleAction::Reload => {
                console.reset();
                console.set_status("Reloading\u{2026}", Color::Yellow);
                terminal.draw(|frame| console.render(frame, view))?;
                match view.activate().await {
                    Ok(()) => match view.stream_error() {
                        Some(err) => console.set_status(stream_failed_status(err), Color::Yellow),
                        None => console.set_status("Reloaded", Color::Green),
                    },
                    Err(e) => console.set_status(format!("Reload failed: {e}"), Color::Red),
                }
            }
            ConsoleAction::ReloadTopology => match view.reload_topology().await {
                Ok(topology) => console.set_status(
                    format!("Topology reloaded ({} agents)", topology.nodes.len()),
                    Color::Green,
                ),
                Err(e) => console.set_status(format!("Topology reload failed: {e}"), Color::Red),
            },
            ConsoleAction::Reconnect => match view.reconnect().await {
                Ok(()) => console.set_status("Event stream reconnected", Color::Green),
                Err(e) => console.set_status(format!("Reconnect failed: {e}"), Color::Red),
            },
            ConsoleAction::SendMessage(req) => {
                let id = view.send_message(req);
                console.track_submission(id);
            }
            ConsoleAction::PostTask(req) => {
                let id = view.post_task(req);
                console.track_submission(id);
            }
        }
    }
}
