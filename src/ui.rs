use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use entity_field::{Field, FieldStats, TypeSummary};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Groups,
    Types,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Groups => Page::Types,
            Page::Types => Page::Groups,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Groups => "Groups",
            Page::Types => "Types & Links",
        }
    }
}

/// One member line in the detail panel
#[derive(Debug, Clone)]
pub struct MemberRow {
    pub entity_type: String,
    pub value: String,
    pub linked: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub name: String,
    pub size: usize,
    pub types: Vec<(String, usize)>,
    pub members: Vec<MemberRow>,
}

impl GroupRow {
    fn has_type(&self, entity_type: &str) -> bool {
        self.types.iter().any(|(t, _)| t == entity_type)
    }
}

/// Snapshot of a field, taken once when the UI starts
pub struct App {
    pub groups: Vec<GroupRow>,
    pub filtered_groups: Vec<GroupRow>,
    pub state: TableState,
    pub types: Vec<TypeSummary>,
    pub links: Vec<(String, String, usize, usize)>,
    pub types_state: TableState,
    pub overview: FieldStats,
    pub current_page: Page,
    pub show_detail: bool,
    /// Only groups containing this type are listed
    pub type_filter: Option<String>,
}

impl App {
    pub fn new(field: &Field) -> Self {
        let groups: Vec<GroupRow> = field
            .list_groups(usize::MAX)
            .into_iter()
            .filter_map(|summary| {
                let group = field.group_by_name(&summary.name).ok()?;
                let members = group
                    .members()
                    .filter_map(|id| field.entity(id).ok())
                    .map(|entity| MemberRow {
                        entity_type: entity.entity_type.clone(),
                        value: entity.value.clone(),
                        linked: field
                            .neighbours(entity.id)
                            .unwrap_or_default()
                            .iter()
                            .map(|other| other.value.clone())
                            .collect(),
                    })
                    .collect();

                Some(GroupRow {
                    name: summary.name,
                    size: summary.size,
                    types: summary.types.into_iter().collect(),
                    members,
                })
            })
            .collect();

        let links = field
            .links_by_type()
            .pairs()
            .map(|(from, to, l)| (from.to_string(), to.to_string(), l.links, l.distinct_targets()))
            .collect();

        let mut state = TableState::default();
        if !groups.is_empty() {
            state.select(Some(0));
        }
        let mut types_state = TableState::default();
        types_state.select(Some(0));

        Self {
            filtered_groups: groups.clone(),
            groups,
            state,
            types: field.type_summaries(),
            links,
            types_state,
            overview: field.stats(),
            current_page: Page::Groups,
            show_detail: false,
            type_filter: None,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_group(&self) -> Option<&GroupRow> {
        self.state.selected().and_then(|i| self.filtered_groups.get(i))
    }

    /// Step the type filter: none → first type → ... → last type → none
    pub fn cycle_type_filter(&mut self) {
        let position = self
            .type_filter
            .as_ref()
            .and_then(|current| self.types.iter().position(|t| &t.entity_type == current));

        self.type_filter = match position {
            None => self.types.first().map(|t| t.entity_type.clone()),
            Some(i) => self.types.get(i + 1).map(|t| t.entity_type.clone()),
        };
        self.apply_filter();
    }

    pub fn clear_filter(&mut self) {
        self.type_filter = None;
        self.apply_filter();
    }

    fn apply_filter(&mut self) {
        self.filtered_groups = match &self.type_filter {
            None => self.groups.clone(),
            Some(entity_type) => self
                .groups
                .iter()
                .filter(|g| g.has_type(entity_type))
                .cloned()
                .collect(),
        };

        if self.filtered_groups.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn next(&mut self) {
        let len = self.filtered_groups.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.filtered_groups.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.filtered_groups.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = match self.state.selected() {
            Some(i) => i.saturating_sub(20),
            None => 0,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

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
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab | KeyCode::BackTab => app.current_page = app.current_page.next(),
                KeyCode::Char('t') => app.cycle_type_filter(),
                KeyCode::Char('c') => app.clear_filter(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    if !app.filtered_groups.is_empty() {
                        app.state.select(Some(app.filtered_groups.len() - 1));
                    }
                }
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

    match app.current_page {
        Page::Groups if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                .split(chunks[1]);

            render_groups(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Groups => render_groups(f, chunks[1], app),
        Page::Types => render_types(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, page) in [Page::Groups, Page::Types].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    let overview = &app.overview;
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Entities: {}", overview.entities),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("Links: {}", overview.edges),
        Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("Groups: {}", overview.groups),
        Style::default().fg(Color::Green),
    ));
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("Ungrouped: {}", overview.ungrouped),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn render_groups(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.filtered_groups.iter().map(|group| {
        let types: Vec<String> = group
            .types
            .iter()
            .map(|(t, n)| format!("{}×{}", t, n))
            .collect();
        let color = if group.size >= 10 { Color::Green } else { Color::White };

        Row::new(vec![
            Cell::from(group.name.clone()),
            Cell::from(format!("{}", group.size)).style(Style::default().fg(color)),
            Cell::from(truncate(&types.join(" "), 40)),
        ])
        .height(1)
    });

    let title = match &app.type_filter {
        Some(t) => format!(" Groups containing {} ", t),
        None => " Groups ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Min(20),
        ],
    )
    .header(header_row(&["Group", "Size", "Types"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![];

    match app.selected_group() {
        Some(group) => {
            lines.push(Line::from(Span::styled(
                format!("{} - {} members", group.name, group.size),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            for member in &group.members {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{:<14}", truncate(&member.entity_type, 14)),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::raw(" "),
                    Span::styled(member.value.clone(), Style::default().add_modifier(Modifier::BOLD)),
                ]));
                lines.push(Line::from(Span::styled(
                    format!("               ↔ {}", truncate(&member.linked.join(", "), 60)),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
        None => lines.push(Line::from("No group selected")),
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Members "),
    );

    f.render_widget(panel, area);
}

fn render_types(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let type_rows = app.types.iter().map(|summary| {
        Row::new(vec![
            Cell::from(summary.entity_type.clone()),
            Cell::from(format!("{}", summary.entities)),
            Cell::from(format!("{}", summary.link_total)),
            Cell::from(format!("{}", summary.link_types)),
            Cell::from(format!("{}", summary.distinct_targets)),
        ])
    });

    let types_table = Table::new(
        type_rows,
        [
            Constraint::Length(22),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .header(header_row(&["Type", "Entities", "Links", "Types", "Distinct"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Types "),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(types_table, chunks[0], &mut app.types_state);

    let link_rows = app.links.iter().map(|(from, to, links, distinct)| {
        Row::new(vec![
            Cell::from(from.clone()),
            Cell::from(to.clone()),
            Cell::from(format!("{}", links)),
            Cell::from(format!("{}", distinct)),
        ])
    });

    let links_table = Table::new(
        link_rows,
        [
            Constraint::Length(22),
            Constraint::Length(22),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header_row(&["From", "To", "Links", "Distinct"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Links by Type "),
    );

    f.render_widget(links_table, chunks[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.filtered_groups.len();

    let mut status_spans = vec![Span::styled(
        format!(" Group: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(t) = &app.type_filter {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", t),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    for (key, label, color) in [
        ("Enter", " Members | ", Color::Yellow),
        ("Tab", " Page | ", Color::Yellow),
        ("t", " Type filter | ", Color::Yellow),
        ("↑/↓", " Nav | ", Color::Yellow),
        ("q", " Quit", Color::Red),
    ] {
        if key == "Enter" {
            status_spans.push(Span::raw(" | "));
        }
        status_spans.push(Span::styled(key, Style::default().fg(color)));
        status_spans.push(Span::raw(label));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
