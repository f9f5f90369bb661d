use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use member_registry::{Gender, Member};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::io;

const PAGE_JUMP: usize = 20;
const UNKNOWN_COUNTY: &str = "(no county)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Members,
    Counties,
    Sources,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Members => Page::Counties,
            Page::Counties => Page::Sources,
            Page::Sources => Page::Members,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Members => Page::Sources,
            Page::Counties => Page::Members,
            Page::Sources => Page::Counties,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Members => "Members",
            Page::Counties => "Counties",
            Page::Sources => "Sources",
        }
    }
}

pub struct App {
    pub members: Vec<Member>,
    pub members_state: TableState,
    pub counties_state: TableState,
    pub sources_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    county_summary: Vec<(String, usize)>,
    source_summary: Vec<(String, usize)>,
}

impl App {
    pub fn new(members: Vec<Member>) -> Self {
        let county_summary = summarize(members.iter().map(|m| {
            m.county
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNKNOWN_COUNTY)
                .to_string()
        }));
        let source_summary = summarize(
            members
                .iter()
                .flat_map(|m| m.data_sources().iter().map(|s| s.name().to_string())),
        );

        let mut app = Self {
            members,
            members_state: TableState::default(),
            counties_state: TableState::default(),
            sources_state: TableState::default(),
            current_page: Page::Members,
            show_detail: false,
            county_summary,
            source_summary,
        };

        for page in [Page::Members, Page::Counties, Page::Sources] {
            if app.len_of(page) > 0 {
                app.state_of(page).select(Some(0));
            }
        }
        app
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_member(&self) -> Option<&Member> {
        self.members_state.selected().and_then(|i| self.members.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    /// Members per county, most populous first
    pub fn county_summary(&self) -> &[(String, usize)] {
        &self.county_summary
    }

    /// Members each source contributed to, largest first
    pub fn source_summary(&self) -> &[(String, usize)] {
        &self.source_summary
    }

    fn len_of(&self, page: Page) -> usize {
        match page {
            Page::Members => self.members.len(),
            Page::Counties => self.county_summary.len(),
            Page::Sources => self.source_summary.len(),
        }
    }

    fn state_of(&mut self, page: Page) -> &mut TableState {
        match page {
            Page::Members => &mut self.members_state,
            Page::Counties => &mut self.counties_state,
            Page::Sources => &mut self.sources_state,
        }
    }

    fn move_selection<F>(&mut self, step: F)
    where
        F: FnOnce(usize, usize) -> usize,
    {
        let page = self.current_page;
        let len = self.len_of(page);
        if len == 0 {
            return;
        }
        let state = self.state_of(page);
        let i = match state.selected() {
            Some(i) => step(i, len),
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn next(&mut self) {
        self.move_selection(|i, len| if i >= len - 1 { 0 } else { i + 1 });
    }

    pub fn previous(&mut self) {
        self.move_selection(|i, len| if i == 0 { len - 1 } else { i - 1 });
    }

    pub fn page_down(&mut self) {
        self.move_selection(|i, len| (i + PAGE_JUMP).min(len - 1));
    }

    pub fn page_up(&mut self) {
        self.move_selection(|i, _| i.saturating_sub(PAGE_JUMP));
    }

    pub fn first(&mut self) {
        self.move_selection(|_, _| 0);
    }

    pub fn last(&mut self) {
        self.move_selection(|_, len| len - 1);
    }

    pub fn stats(&self) -> MemberStats {
        let mut stats = MemberStats {
            total: self.members.len(),
            ..MemberStats::default()
        };

        for member in &self.members {
            if member.data_sources().len() > 1 {
                stats.multi_source += 1;
            }
            match member.gender {
                Gender::Male => stats.male += 1,
                Gender::Female => stats.female += 1,
                Gender::Unknown => {}
            }
            if member.leadership_title.is_some() {
                stats.leaders += 1;
            }
        }

        stats
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MemberStats {
    pub total: usize,
    pub multi_source: usize,
    pub male: usize,
    pub female: usize,
    pub leaders: usize,
}

fn summarize<I: Iterator<Item = String>>(keys: I) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut result: Vec<(String, usize)> = counts.into_iter().collect();
    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    result
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Members {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        render_members(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Members => render_members(f, chunks[1], app),
            Page::Counties => render_counties(f, chunks[1], app),
            Page::Sources => render_sources(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.stats();

    let mut tab_spans = vec![];
    for (i, page) in [Page::Members, Page::Counties, Page::Sources].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Members: {}", stats.total),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Multi-source: {}", stats.multi_source),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("M {} / F {}", stats.male, stats.female),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_members(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.members.iter().map(|m| {
        let source_count = m.data_sources().len();
        let color = match source_count {
            0 | 1 => Color::White,
            2 => Color::Yellow,
            _ => Color::Green,
        };

        Row::new(vec![
            Cell::from(truncate(m.name(), 30)),
            Cell::from(truncate(m.constituency.as_deref().unwrap_or("-"), 22)),
            Cell::from(truncate(m.county.as_deref().unwrap_or("-"), 16)),
            Cell::from(truncate(m.party.as_deref().unwrap_or("-"), 10)),
            Cell::from(format!("{}", source_count)).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(24),
            Constraint::Length(18),
            Constraint::Length(12),
            Constraint::Length(8),
        ],
    )
    .header(header_row(&["Name", "Constituency", "County", "Party", "Sources"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Members "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.members_state);
}

fn render_counties(f: &mut Frame, area: Rect, app: &mut App) {
    let total = app.members.len().max(1);
    let rows: Vec<Row> = app
        .county_summary()
        .iter()
        .map(|(county, count)| {
            Row::new(vec![
                Cell::from(county.clone()),
                Cell::from(format!("{}", count)),
                Cell::from(format!("{:.1}%", *count as f64 * 100.0 / total as f64)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(28), Constraint::Length(10), Constraint::Length(10)],
    )
    .header(header_row(&["County", "Members", "Share"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Counties - Members by County "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.counties_state);
}

fn render_sources(f: &mut Frame, area: Rect, app: &mut App) {
    let total = app.members.len().max(1);
    let rows: Vec<Row> = app
        .source_summary()
        .iter()
        .map(|(source, count)| {
            Row::new(vec![
                Cell::from(source.clone()),
                Cell::from(format!("{}", count)),
                Cell::from(format!("{:.1}%", *count as f64 * 100.0 / total as f64)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(20), Constraint::Length(10), Constraint::Length(10)],
    )
    .header(header_row(&["Source", "Members", "Coverage"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Sources - Provenance Coverage "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.sources_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &mut App) {
    let page = app.current_page;
    let total = app.len_of(page);
    let selected = app.state_of(page).selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, total),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" Fast | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn detail_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  {}: ", label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(value),
    ])
}

fn section_title(title: &str) -> Line<'static> {
    Line::from(vec![Span::styled(
        format!("  {}", title),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    )])
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let m = match app.selected_member() {
        Some(m) => m,
        None => {
            let no_selection = Paragraph::new("No member selected").block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Member Details "),
            );
            f.render_widget(no_selection, area);
            return;
        }
    };

    let mut content = vec![
        Line::from(""),
        detail_line("Name", m.name().to_string()),
        detail_line("Key", m.normalized_name().to_string()),
        detail_line("Constituency", or_dash(m.constituency.as_deref())),
        detail_line("County", or_dash(m.county.as_deref())),
        detail_line("Party", or_dash(m.party.as_deref())),
        detail_line("Status", m.status.as_str().to_string()),
        detail_line("Gender", m.gender.as_str().to_string()),
        detail_line("Leadership", or_dash(m.leadership_title.as_deref())),
        detail_line("Email", or_dash(Some(m.email.display()).filter(|s| !s.is_empty()))),
        detail_line("Phone", or_dash(Some(m.phone.display()).filter(|s| !s.is_empty()))),
        Line::from(""),
        section_title("COMMITTEES"),
    ];

    if m.committees.is_empty() {
        content.push(Line::from("  -"));
    }
    for committee in &m.committees {
        content.push(Line::from(format!("  • {}", committee)));
    }

    content.push(Line::from(""));
    content.push(section_title("PROVENANCE"));
    for source in m.data_sources() {
        let link = m.profile_links.get(source).cloned().unwrap_or_default();
        content.push(Line::from(vec![
            Span::styled(format!("  {} ", source.name()), Style::default().fg(Color::Green)),
            Span::styled(link, Style::default().fg(Color::DarkGray)),
        ]));
    }

    if let Some(bio) = m.biography.as_deref() {
        content.push(Line::from(""));
        content.push(section_title("BIOGRAPHY"));
        for line in wrap_text(bio, 40) {
            content.push(Line::from(Span::styled(
                format!("  {}", line),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Member Details "),
    );

    f.render_widget(detail_panel, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.chars().count() + word.chars().count() + 1 > width {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}
