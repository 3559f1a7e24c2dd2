//! TUI implementation for tribunal

use tokio::sync::mpsc;

use crossterm::event::{Event, EventStream, MouseEventKind};
use futures::StreamExt;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use std::time::Instant;
use tribunal_api::Party;
use tribunal_chat::{
    AccountChange, AttachmentKind, ChatEvent, ChatSession, Evidence, EvidenceLocker, Message,
    MessageId, MessageKind, Policy, PolicyCatalog, PolicyCategory, RequestContext, Role, Session,
    StreamOutcome,
};
use tribunal_tui::{
    Theme,
    input::{Action, event_to_action},
    widgets::{
        Card, CardList, ChatMessage, InputBox, MessageList, Speaker, Spinner, TabBar,
        message_list::calculate_message_height,
    },
};

use crate::commands::{CommandContext, CommandResult, execute_command};
use crate::utils::{decision_metadata, truncate_chars};

/// Messages sent from UI to the session handler
#[derive(Debug)]
pub enum UiMessage {
    /// User submitted a complaint
    Submit(String),
    /// Slash command
    Command(String),
    /// User requested clear
    Clear,
    /// Argue under the policy with this id
    UsePolicy(String),
    /// Error acknowledged
    DismissError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Chat,
    Policies,
    Evidence,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Chat, Tab::Policies, Tab::Evidence];
    const TITLES: [&'static str; 3] = ["Chat", "Policies", "Evidence"];

    fn index(self) -> usize {
        match self {
            Tab::Chat => 0,
            Tab::Policies => 1,
            Tab::Evidence => 2,
        }
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// What the event loop does after an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
    /// Forget the wallet session and leave
    Disconnect,
}

/// TUI application state
pub struct TuiState {
    tab: Tab,
    /// Conversation mirror, in message order
    messages: Vec<(MessageId, ChatMessage)>,
    input: InputBox,
    scroll: usize,
    /// Response being streamed
    streaming: Option<MessageId>,
    status: String,
    error: Option<String>,
    theme: Theme,
    spinner_start: Instant,
    tick: usize,
    /// Connected account, shortened
    account: Option<String>,
    context_label: String,
    policy_selected: usize,
    policy_expanded: Option<usize>,
    evidence_filter: Option<Party>,
    evidence_selected: usize,
    ui_tx: mpsc::Sender<UiMessage>,
}

impl TuiState {
    pub fn new(theme: Theme, ui_tx: mpsc::Sender<UiMessage>) -> Self {
        let mut input = InputBox::new()
            .with_placeholder("Describe your complaint...")
            .with_disabled_placeholder("Waiting for the decision...");
        input.set_focused(true);

        Self {
            tab: Tab::Chat,
            messages: Vec::new(),
            input,
            scroll: 0,
            streaming: None,
            status: "Ready".to_string(),
            error: None,
            theme,
            spinner_start: Instant::now(),
            tick: 0,
            account: None,
            context_label: String::new(),
            policy_selected: 0,
            policy_expanded: None,
            evidence_filter: None,
            evidence_selected: 0,
            ui_tx,
        }
    }

    fn is_loading(&self) -> bool {
        self.streaming.is_some()
    }

    /// Mirror a chat event
    pub fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::MessageAppended { message } => {
                self.messages.push((message.id, to_view(&message)));
                self.scroll_to_bottom();
            }
            ChatEvent::MessageUpdated { message } => {
                let streaming = self.streaming == Some(message.id);
                if let Some((_, view)) = self.messages.iter_mut().find(|(id, _)| *id == message.id) {
                    *view = to_view(&message).streaming(streaming);
                }
                self.scroll_to_bottom();
            }
            ChatEvent::StreamStart { message_id } => {
                self.streaming = Some(message_id);
                self.spinner_start = Instant::now();
                self.status = "Awaiting decision".to_string();
                self.error = None;
                self.input.set_disabled(true);
                self.set_streaming(message_id, true);
            }
            ChatEvent::StreamEnd {
                message_id,
                outcome,
            } => {
                self.streaming = None;
                self.input.set_disabled(false);
                self.set_streaming(message_id, false);
                self.status = match outcome {
                    StreamOutcome::Completed => "Decision complete",
                    StreamOutcome::Closed => "Stream closed",
                    StreamOutcome::Failed => "Request failed",
                }
                .to_string();
            }
            ChatEvent::Error { message } => {
                if let Some(id) = self.streaming {
                    if let Some((_, view)) = self.messages.iter_mut().find(|(i, _)| *i == id) {
                        view.is_error = view.content.ends_with(message.as_str());
                    }
                }
                self.error = Some(message);
            }
            ChatEvent::Cleared => {
                self.messages.clear();
                self.scroll = 0;
                self.status = "Cleared".to_string();
            }
        }
    }

    fn set_streaming(&mut self, id: MessageId, streaming: bool) {
        if let Some((_, view)) = self.messages.iter_mut().find(|(i, _)| *i == id) {
            view.is_streaming = streaming;
        }
    }

    pub fn handle_account_change(&mut self, change: &AccountChange) {
        match change {
            AccountChange::Switched(user) => {
                self.account = Some(user.short_address());
                self.show_system_message(&format!("Wallet switched to {}", user.short_address()));
            }
            AccountChange::Disconnected => {
                self.account = None;
                self.status = "Wallet disconnected".to_string();
            }
            AccountChange::Unchanged => {}
        }
    }

    fn scroll_to_bottom(&mut self) {
        // Resolved during render once the content height is known
        self.scroll = usize::MAX;
    }

    pub fn show_system_message(&mut self, content: &str) {
        let id = MessageId(u64::MAX - self.messages.len() as u64);
        self.messages.push((id, ChatMessage::system(content)));
        self.scroll_to_bottom();
    }

    /// Queue a message for the session handler.
    ///
    /// Never waits: the handler is not polled while a request streams.
    fn post(&self, message: UiMessage) {
        if let Err(e) = self.ui_tx.try_send(message) {
            tracing::warn!(error = %e, "dropping UI message");
        }
    }

    /// Handle keyboard action
    pub fn handle_action(
        &mut self,
        action: Action,
        width: u16,
        catalog: &PolicyCatalog,
        locker: &EvidenceLocker,
    ) -> Flow {
        match action {
            Action::Quit | Action::Eof => return Flow::Quit,
            Action::Disconnect => return Flow::Disconnect,
            Action::Interrupt => {
                if !self.input.content().is_empty() && !self.input.is_disabled() {
                    self.input.clear();
                    return Flow::Continue;
                }
                return Flow::Quit;
            }
            Action::NextTab => {
                self.tab = self.tab.next();
                return Flow::Continue;
            }
            Action::PrevTab => {
                self.tab = self.tab.prev();
                return Flow::Continue;
            }
            Action::Escape => {
                if self.error.take().is_some() {
                    self.post(UiMessage::DismissError);
                } else if self.tab != Tab::Chat {
                    self.tab = Tab::Chat;
                }
                return Flow::Continue;
            }
            Action::Clear => {
                if !self.is_loading() {
                    self.post(UiMessage::Clear);
                }
                return Flow::Continue;
            }
            _ => {}
        }

        match self.tab {
            Tab::Chat => self.handle_chat_action(action, width),
            Tab::Policies => self.handle_policy_action(action, catalog),
            Tab::Evidence => self.handle_evidence_action(action, locker),
        }
        Flow::Continue
    }

    fn handle_chat_action(&mut self, action: Action, width: u16) {
        match action {
            Action::Submit => {
                if let Some(content) = self.input.take() {
                    let msg = if content.starts_with('/') {
                        UiMessage::Command(content)
                    } else {
                        UiMessage::Submit(content)
                    };
                    self.post(msg);
                }
            }
            Action::PageUp => self.scroll = self.scroll.saturating_sub(10),
            Action::PageDown => self.scroll = self.scroll.saturating_add(10),
            Action::Up => self.scroll = self.scroll.saturating_sub(1),
            Action::Down => self.scroll = self.scroll.saturating_add(1),
            _ => {
                self.input.handle_action(&action, width);
            }
        }
    }

    fn handle_policy_action(&mut self, action: Action, catalog: &PolicyCatalog) {
        let count = catalog.len();
        match action {
            Action::Up => self.policy_selected = self.policy_selected.saturating_sub(1),
            Action::Down if self.policy_selected + 1 < count => self.policy_selected += 1,
            Action::Submit => {
                self.policy_expanded = match self.policy_expanded {
                    Some(i) if i == self.policy_selected => None,
                    _ => Some(self.policy_selected),
                };
            }
            Action::Char('c') => {
                if let Some(policy) = catalog.list().get(self.policy_selected) {
                    self.post(UiMessage::UsePolicy(policy.id.clone()));
                    self.tab = Tab::Chat;
                }
            }
            _ => {}
        }
    }

    fn handle_evidence_action(&mut self, action: Action, locker: &EvidenceLocker) {
        let count = self.filtered_evidence(locker).len();
        match action {
            Action::Up => self.evidence_selected = self.evidence_selected.saturating_sub(1),
            Action::Down if self.evidence_selected + 1 < count => self.evidence_selected += 1,
            Action::Left | Action::Right => {
                const FILTERS: [Option<Party>; 3] =
                    [None, Some(Party::Claimant), Some(Party::Defendant)];
                let pos = FILTERS
                    .iter()
                    .position(|f| *f == self.evidence_filter)
                    .unwrap_or(0);
                let step = if action == Action::Right { 1 } else { FILTERS.len() - 1 };
                self.evidence_filter = FILTERS[(pos + step) % FILTERS.len()];
                self.evidence_selected = 0;
            }
            _ => {}
        }
    }

    fn filtered_evidence<'a>(&self, locker: &'a EvidenceLocker) -> Vec<&'a Evidence> {
        match self.evidence_filter {
            Some(party) => locker.by_party(party).collect(),
            None => locker.list().iter().collect(),
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame, catalog: &PolicyCatalog, locker: &EvidenceLocker) {
        let size = frame.area();
        let input_height = if self.tab == Tab::Chat { 3 } else { 0 };

        // Layout: tabs (1), body (flex), status bar (1), input (3)
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(input_height),
            ])
            .split(size);

        let account = match &self.account {
            Some(account) => Span::styled(format!("● {} ", account), self.theme.success_style()),
            None => Span::styled("○ not connected ", self.theme.dim_style()),
        };
        let tabs = TabBar::new(&Tab::TITLES, self.tab.index(), &self.theme).status(account);
        frame.render_widget(tabs, chunks[0]);

        match self.tab {
            Tab::Chat => self.render_messages(frame, chunks[1]),
            Tab::Policies => self.render_policies(frame, chunks[1], catalog),
            Tab::Evidence => self.render_evidence(frame, chunks[1], locker),
        }

        self.render_status(frame, chunks[2]);

        if self.tab == Tab::Chat {
            self.input.render(chunks[3], frame.buffer_mut(), &self.theme);
        }
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(" tribunal │ {} ", self.context_label);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(title);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 || self.messages.is_empty() {
            frame.render_widget(welcome(&self.theme), inner);
            return;
        }

        let views: Vec<ChatMessage> = self.messages.iter().map(|(_, m)| m.clone()).collect();
        // One column for the scrollbar
        let width = inner.width.saturating_sub(1) as usize;
        let content_height = calculate_message_height(&views, width);
        let max_scroll = content_height.saturating_sub(inner.height as usize);
        self.scroll = self.scroll.min(max_scroll);

        let list_area = Rect {
            width: inner.width.saturating_sub(1),
            ..inner
        };
        let list = MessageList::new(&views, &self.theme)
            .scroll(self.scroll)
            .tick(self.tick);
        frame.render_widget(list, list_area);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn render_policies(&mut self, frame: &mut Frame, area: Rect, catalog: &PolicyCatalog) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(" Agreed policies │ Enter: expand · c: use for requests ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        self.policy_selected = self.policy_selected.min(catalog.len().saturating_sub(1));
        let cards: Vec<Card> = catalog
            .list()
            .iter()
            .enumerate()
            .map(|(i, policy)| {
                let category = policy.category();
                let body = if self.policy_expanded == Some(i) {
                    policy.content.clone()
                } else {
                    policy_summary(policy)
                };
                Card::new(&policy.title, body)
                    .badge(category.label(), self.category_color(category))
                    .subtitle(format!(
                        "Version {} · agreed {}",
                        policy.version,
                        policy.agreed_at.format("%Y-%m-%d")
                    ))
            })
            .collect();

        let list = CardList::new(&cards, &self.theme)
            .selected(self.policy_selected)
            .empty_text("No policies on file");
        frame.render_widget(list, inner);
    }

    fn render_evidence(&mut self, frame: &mut Frame, area: Rect, locker: &EvidenceLocker) {
        let filter = match self.evidence_filter {
            Some(party) => party.name(),
            None => "All parties",
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(format!(" Evidence │ ◂ {} ▸ ", filter));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let records = self.filtered_evidence(locker);
        self.evidence_selected = self.evidence_selected.min(records.len().saturating_sub(1));

        let cards: Vec<Card> = records
            .iter()
            .map(|evidence| {
                let color = match evidence.submitted_by {
                    Party::Claimant => self.theme.claimant,
                    Party::Defendant => self.theme.defendant,
                };
                let checked = if evidence.is_fact_checked {
                    "fact-checked"
                } else {
                    "unverified"
                };
                let mut card = Card::new(&evidence.title, &evidence.description)
                    .badge(evidence.submitted_by.name(), color)
                    .subtitle(format!(
                        "#{} · {} · {}",
                        evidence.id,
                        evidence.submitted_at.format("%Y-%m-%d %H:%M"),
                        checked
                    ));
                if !evidence.attachments.is_empty() {
                    let files: Vec<String> = evidence
                        .attachments
                        .iter()
                        .map(|name| match AttachmentKind::from_name(name) {
                            Some(kind) => format!("{} ({})", name, kind.label()),
                            None => name.clone(),
                        })
                        .collect();
                    card = card.footer(format!("Attachments: {}", files.join(", ")));
                }
                card
            })
            .collect();

        let list = CardList::new(&cards, &self.theme)
            .selected(self.evidence_selected)
            .empty_text("No evidence from this party");
        frame.render_widget(list, inner);
    }

    fn category_color(&self, category: PolicyCategory) -> Color {
        match category {
            PolicyCategory::Eligibility => self.theme.success,
            PolicyCategory::Restriction => self.theme.error,
            PolicyCategory::Technical => self.theme.accent,
            PolicyCategory::Legal => self.theme.warning,
            PolicyCategory::General => self.theme.dim,
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if self.is_loading() {
            let spinner = Spinner::new(&self.status, &self.theme, self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        if let Some(error) = &self.error {
            let text = format!("Error: {} (Esc to dismiss)", truncate_chars(error, 200));
            frame.render_widget(
                Paragraph::new(Span::styled(text, self.theme.error_style())),
                area,
            );
            return;
        }

        let left_content = format!("{} │ {}", self.context_label, self.status);
        let right_content = "Tab: views │ Ctrl+L: clear │ Ctrl+C: quit";

        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(left_content, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(Span::styled(left_content, self.theme.dim_style()))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn to_view(message: &Message) -> ChatMessage {
    let view = match (message.kind, message.role) {
        (MessageKind::Evidence, _) => ChatMessage::new(Speaker::Evidence, message.text.clone()),
        (MessageKind::Information, Role::User) => ChatMessage::user(message.text.clone()),
        (MessageKind::Information, Role::System) => ChatMessage::tribunal(message.text.clone()),
    };
    match decision_metadata(message) {
        Some(metadata) => view.with_metadata(metadata),
        None => view,
    }
}

/// Section headings of a collapsed policy
fn policy_summary(policy: &Policy) -> String {
    let headings: Vec<String> = policy
        .sections()
        .into_iter()
        .filter_map(|s| s.heading)
        .collect();
    if headings.is_empty() {
        truncate_chars(policy.content.lines().next().unwrap_or_default(), 60)
    } else {
        headings.join(" · ")
    }
}

fn welcome(theme: &Theme) -> Paragraph<'static> {
    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(k, Style::default().fg(Color::Cyan)),
            Span::styled(what, Style::default().fg(Color::White)),
        ])
    };

    Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(
                "  ⚖ ",
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "tribunal",
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" - dispute resolution", theme.dim_style()),
        ]),
        Line::from(""),
        Line::from(Span::styled("  Keybindings", theme.warning_style())),
        Line::from(""),
        key("    Enter     ", "Send complaint"),
        key("    Tab       ", "Chat / Policies / Evidence"),
        key("    Ctrl+L    ", "Clear conversation"),
        key("    Ctrl+X    ", "Disconnect wallet"),
        key("    Ctrl+C    ", "Quit"),
        key("    PgUp/Dn   ", "Scroll history"),
        Line::from(""),
        Line::from(Span::styled(
            "  Describe your dispute to get started. /help lists commands.",
            theme.dim_style(),
        )),
    ])
}

/// How the TUI ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    /// The wallet session ended
    Disconnected,
}

/// Run the TUI application
pub async fn run_tui(
    chat: &mut ChatSession,
    session: &mut Session,
    catalog: &PolicyCatalog,
    locker: &mut EvidenceLocker,
    theme: Theme,
) -> anyhow::Result<Exit> {
    use crossterm::{
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    };
    use ratatui::{Terminal, backend::CrosstermBackend};
    use std::io;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (ui_tx, mut ui_rx) = mpsc::channel::<UiMessage>(32);
    let mut state = TuiState::new(theme, ui_tx);
    state.account = session.user().map(|u| u.short_address());
    state.context_label = chat.context().label().to_string();

    let mut chat_rx = chat.subscribe();
    let mut event_stream = EventStream::new();
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(80));

    let mut pending_prompt: Option<String> = None;

    let result = 'outer: loop {
        if let Some(content) = pending_prompt.take() {
            let mut send_future = std::pin::pin!(chat.send_message(&content));

            // Poll the request alongside input until it finishes
            let send_result = loop {
                terminal.draw(|frame| state.render(frame, catalog, locker))?;
                let area_width = terminal.size()?.width;

                tokio::select! {
                    biased;

                    result = &mut send_future => break result,

                    event = chat_rx.recv() => {
                        if let Ok(chat_event) = event {
                            state.handle_chat_event(chat_event);
                        }
                    }

                    change = session.next_account_change() => {
                        state.handle_account_change(&change);
                        if change == AccountChange::Disconnected {
                            break 'outer Ok(Exit::Disconnected);
                        }
                    }

                    event = event_stream.next() => {
                        match event {
                            Some(Ok(Event::Mouse(mouse))) => scroll_with_mouse(&mut state, mouse.kind),
                            Some(Ok(event)) => {
                                let Some(action) = event_to_action(event) else {
                                    continue;
                                };
                                match state.handle_action(action, area_width, catalog, locker) {
                                    Flow::Continue => {}
                                    Flow::Quit => break 'outer Ok(Exit::Quit),
                                    Flow::Disconnect => {
                                        forget_session(session);
                                        break 'outer Ok(Exit::Disconnected);
                                    }
                                }
                            }
                            Some(Err(e)) => break 'outer Err(anyhow::anyhow!("Event error: {}", e)),
                            None => break 'outer Ok(Exit::Quit),
                        }
                    }

                    _ = tick_interval.tick() => state.tick = state.tick.wrapping_add(1),
                }
            };

            // Drain events the request left behind
            while let Ok(chat_event) = chat_rx.try_recv() {
                state.handle_chat_event(chat_event);
            }
            if let Err(e) = send_result {
                tracing::debug!(error = %e, "complaint not sent");
                if state.error.is_none() {
                    state.error = Some(e.to_string());
                }
            }
            continue;
        }

        terminal.draw(|frame| state.render(frame, catalog, locker))?;
        let area_width = terminal.size()?.width;

        tokio::select! {
            biased;

            event = chat_rx.recv() => {
                if let Ok(chat_event) = event {
                    state.handle_chat_event(chat_event);
                }
            }

            change = session.next_account_change() => {
                state.handle_account_change(&change);
                if change == AccountChange::Disconnected {
                    break Ok(Exit::Disconnected);
                }
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(Event::Mouse(mouse))) => scroll_with_mouse(&mut state, mouse.kind),
                    Some(Ok(event)) => {
                        let Some(action) = event_to_action(event) else {
                            continue;
                        };
                        match state.handle_action(action, area_width, catalog, locker) {
                            Flow::Continue => {}
                            Flow::Quit => break Ok(Exit::Quit),
                            Flow::Disconnect => {
                                forget_session(session);
                                break Ok(Exit::Disconnected);
                            }
                        }
                    }
                    Some(Err(e)) => break Err(anyhow::anyhow!("Event error: {}", e)),
                    None => break Ok(Exit::Quit),
                }
            }

            _ = tick_interval.tick() => state.tick = state.tick.wrapping_add(1),

            msg = ui_rx.recv() => {
                match msg {
                    Some(UiMessage::Submit(content)) => pending_prompt = Some(content),
                    Some(UiMessage::Command(cmd)) => {
                        let ctx = CommandContext {
                            catalog,
                            locker,
                            user: session.user(),
                            request_context: chat.context(),
                        };
                        let Some(result) = execute_command(&cmd, &ctx) else {
                            continue;
                        };
                        match result {
                            CommandResult::Message(msg) => state.show_system_message(&msg),
                            CommandResult::Clear => chat.clear(),
                            CommandResult::Exit => break Ok(Exit::Quit),
                            CommandResult::Submit(submission) => match locker.submit(submission) {
                                Ok(evidence) => {
                                    chat.append_evidence_notice(&evidence);
                                    crate::refresh_case_evidence(chat, locker);
                                }
                                Err(e) => state.show_system_message(&format!("Could not file evidence: {}", e)),
                            },
                            CommandResult::SetContext(context) => {
                                set_context(&mut state, chat, context);
                            }
                            CommandResult::Disconnect => {
                                forget_session(session);
                                break Ok(Exit::Disconnected);
                            }
                            CommandResult::Unknown(cmd) => {
                                state.show_system_message(&format!("Unknown command: /{}\nType /help for available commands.", cmd));
                            }
                        }
                    }
                    Some(UiMessage::Clear) => chat.clear(),
                    Some(UiMessage::UsePolicy(id)) => {
                        if let Some(policy) = catalog.get(&id) {
                            let context = RequestContext::case(policy.clone(), locker);
                            set_context(&mut state, chat, context);
                        }
                    }
                    Some(UiMessage::DismissError) => {
                        chat.dismiss_error();
                        session.dismiss_error();
                    }
                    None => break Ok(Exit::Quit),
                }
            }
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn forget_session(session: &mut Session) {
    if let Err(e) = session.disconnect() {
        tracing::warn!(error = %e, "failed to clear session state");
    }
}

fn set_context(state: &mut TuiState, chat: &mut ChatSession, context: RequestContext) {
    state.context_label = context.label().to_string();
    state.show_system_message(&format!("Requests now carry: {}", context.label()));
    chat.set_context(context);
}

fn scroll_with_mouse(state: &mut TuiState, kind: MouseEventKind) {
    match kind {
        MouseEventKind::ScrollUp => state.scroll = state.scroll.saturating_sub(3),
        MouseEventKind::ScrollDown => state.scroll = state.scroll.saturating_add(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_chat::{Conversation, INITIAL_RESPONSE};

    fn state() -> (TuiState, mpsc::Receiver<UiMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (TuiState::new(Theme::dark(), tx), rx)
    }

    #[test]
    fn test_mirrors_streamed_response() {
        let (mut state, _rx) = state();
        let mut conversation = Conversation::new();
        let user = conversation.push_user("refund please");
        state.handle_chat_event(ChatEvent::MessageAppended {
            message: conversation.get(user).unwrap().clone(),
        });

        let handle = conversation.open_response();
        let id = handle.id();
        let placeholder = handle.message().clone();
        state.handle_chat_event(ChatEvent::MessageAppended { message: placeholder });
        state.handle_chat_event(ChatEvent::StreamStart { message_id: id });

        assert!(state.is_loading());
        assert!(state.input.is_disabled());
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].1.content, INITIAL_RESPONSE);
        assert!(state.messages[1].1.is_streaming);

        state.handle_chat_event(ChatEvent::StreamEnd {
            message_id: id,
            outcome: StreamOutcome::Completed,
        });
        assert!(!state.is_loading());
        assert!(!state.messages[1].1.is_streaming);
        assert_eq!(state.status, "Decision complete");
    }

    #[test]
    fn test_error_event_marks_rewritten_placeholder() {
        let (mut state, _rx) = state();
        let mut conversation = Conversation::new();
        let handle = conversation.open_response();
        let id = handle.id();
        state.handle_chat_event(ChatEvent::MessageAppended {
            message: handle.message().clone(),
        });
        state.handle_chat_event(ChatEvent::StreamStart { message_id: id });
        handle.fail("Policy not found");

        let failed = conversation.get(id).unwrap().clone();
        state.handle_chat_event(ChatEvent::MessageUpdated { message: failed });
        state.handle_chat_event(ChatEvent::Error {
            message: "Policy not found".into(),
        });

        assert!(state.messages[0].1.is_error);
        assert_eq!(state.error.as_deref(), Some("Policy not found"));
    }

    #[test]
    fn test_submit_sends_trimmed_text() {
        let (mut state, mut rx) = state();
        let catalog = PolicyCatalog::builtin();
        let locker = EvidenceLocker::builtin();
        for c in " late delivery ".chars() {
            state.handle_action(Action::Char(c), 80, &catalog, &locker);
        }
        state.handle_action(Action::Submit, 80, &catalog, &locker);
        assert!(matches!(rx.try_recv(), Ok(UiMessage::Submit(text)) if text == "late delivery"));

        state.handle_action(Action::Submit, 80, &catalog, &locker);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tabs_and_policy_expand() {
        let (mut state, mut rx) = state();
        let catalog = PolicyCatalog::builtin();
        let locker = EvidenceLocker::builtin();

        state.handle_action(Action::NextTab, 80, &catalog, &locker);
        assert_eq!(state.tab, Tab::Policies);
        state.handle_action(Action::Down, 80, &catalog, &locker);
        state.handle_action(Action::Submit, 80, &catalog, &locker);
        assert_eq!(state.policy_expanded, Some(1));
        state.handle_action(Action::Submit, 80, &catalog, &locker);
        assert_eq!(state.policy_expanded, None);

        state.handle_action(Action::Char('c'), 80, &catalog, &locker);
        assert!(matches!(rx.try_recv(), Ok(UiMessage::UsePolicy(id)) if id == "2"));
        assert_eq!(state.tab, Tab::Chat);

        state.handle_action(Action::PrevTab, 80, &catalog, &locker);
        assert_eq!(state.tab, Tab::Evidence);
    }

    #[test]
    fn test_actions_never_wait_on_a_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let mut state = TuiState::new(Theme::dark(), tx);
        let catalog = PolicyCatalog::builtin();
        let locker = EvidenceLocker::builtin();
        state.streaming = Some(MessageId(7));

        // Nobody drains the channel while a decision streams
        for _ in 0..5 {
            state.tab = Tab::Policies;
            assert_eq!(
                state.handle_action(Action::Char('c'), 80, &catalog, &locker),
                Flow::Continue
            );
        }
        assert_eq!(
            state.handle_action(Action::Interrupt, 80, &catalog, &locker),
            Flow::Quit
        );
    }

    #[test]
    fn test_disconnect_while_streaming() {
        let (mut state, mut rx) = state();
        let catalog = PolicyCatalog::builtin();
        let locker = EvidenceLocker::builtin();
        state.streaming = Some(MessageId(3));
        state.input.set_disabled(true);

        assert_eq!(
            state.handle_action(Action::Disconnect, 80, &catalog, &locker),
            Flow::Disconnect
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_evidence_notice_uses_evidence_speaker() {
        let mut locker = EvidenceLocker::builtin();
        let evidence = locker
            .submit(tribunal_chat::NewEvidence::new(
                Party::Defendant,
                "Uptime log",
                "No outage recorded.",
            ))
            .unwrap();

        let mut chat = ChatSession::new(std::sync::Arc::new(
            tribunal_api::HttpArbitrationClient::default(),
        ));
        let id = chat.append_evidence_notice(&evidence);
        let notice = chat.conversation().get(id).unwrap();

        assert_eq!(to_view(notice).speaker, Speaker::Evidence);
    }

    #[test]
    fn test_evidence_filter_cycles() {
        let (mut state, _rx) = state();
        let catalog = PolicyCatalog::builtin();
        let locker = EvidenceLocker::builtin();
        state.tab = Tab::Evidence;

        state.handle_action(Action::Right, 80, &catalog, &locker);
        assert_eq!(state.evidence_filter, Some(Party::Claimant));
        assert_eq!(state.filtered_evidence(&locker).len(), 2);
        state.handle_action(Action::Right, 80, &catalog, &locker);
        assert_eq!(state.evidence_filter, Some(Party::Defendant));
        state.handle_action(Action::Right, 80, &catalog, &locker);
        assert_eq!(state.evidence_filter, None);
        state.handle_action(Action::Left, 80, &catalog, &locker);
        assert_eq!(state.evidence_filter, Some(Party::Defendant));
    }
}
