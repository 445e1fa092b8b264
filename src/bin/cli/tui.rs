use super::*;
use categoria_lib::expansion::ExpansionState;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};

// ============================================================================
// TUI State
// ============================================================================

/// Tree browser state.
///
/// `view` is the filtered tree currently shown. Every time it is rebuilt
/// (reload, status change, search) the expansion set is recomputed from it.
struct TuiApp {
    source: PathBuf,
    snapshot: CategorySnapshot,
    query: CategoryQuery,
    view: Vec<Category>,
    expansion: ExpansionState,
    list_state: ListState,

    search_mode: bool,
    search_input: String,

    status_message: String,
}

impl TuiApp {
    fn new(snapshot: CategorySnapshot, source: PathBuf) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        let mut app = Self {
            source,
            snapshot,
            query: CategoryQuery {
                sort: settings::default_sort(),
                ..CategoryQuery::default()
            },
            view: Vec::new(),
            expansion: ExpansionState::default(),
            list_state,
            search_mode: false,
            search_input: String::new(),
            status_message: String::new(),
        };
        app.rebuild_view();
        app
    }

    fn rebuild_view(&mut self) {
        self.view = self.snapshot.tree_view(&self.query);
        self.expansion = ExpansionState::for_forest(&self.view);
        let rows = self.row_count();
        if rows == 0 {
            self.list_state.select(None);
        } else {
            let selected = self.list_state.selected().unwrap_or(0).min(rows - 1);
            self.list_state.select(Some(selected));
        }
    }

    fn reload(&mut self) {
        match load_snapshot(&self.source) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                self.rebuild_view();
                self.status_message = format!(
                    "Reloaded {} categories ({} rejected)",
                    self.snapshot.records().len(),
                    self.snapshot.rejected().len()
                );
            }
            Err(e) => self.status_message = e,
        }
    }

    fn row_count(&self) -> usize {
        self.expansion.visible_rows(&self.view).len()
    }

    fn selected_id(&self) -> Option<CategoryId> {
        let selected = self.list_state.selected()?;
        self.expansion.visible_rows(&self.view).get(selected).map(|row| row.node.id)
    }

    fn selected_node(&self) -> Option<&Category> {
        self.selected_id().and_then(|id| hierarchy::find(&self.view, id))
    }

    fn toggle_selected(&mut self) {
        let Some(node) = self.selected_node() else { return };
        if !node.has_children() {
            return;
        }
        let id = node.id;
        self.expansion.toggle(id);
        self.clamp_selection();
    }

    fn set_selected_expanded(&mut self, expanded: bool) {
        let Some(node) = self.selected_node() else { return };
        if !node.has_children() {
            return;
        }
        let id = node.id;
        if expanded {
            self.expansion.expand(id);
        } else {
            self.expansion.collapse(id);
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let rows = self.row_count();
        if let Some(selected) = self.list_state.selected() {
            if selected >= rows {
                self.list_state.select(Some(rows.saturating_sub(1)));
            }
        }
    }

    fn cycle_status(&mut self) {
        self.query.status = match self.query.status {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Inactive,
            StatusFilter::Inactive => StatusFilter::All,
        };
        self.rebuild_view();
        self.status_message = format!("Status filter: {:?}", self.query.status);
    }

    fn apply_search(&mut self) {
        let term = self.search_input.trim().to_string();
        self.query.search = if term.is_empty() { None } else { Some(term) };
        self.rebuild_view();
        self.status_message = match &self.query.search {
            Some(term) => format!("{} categories match '{}'", hierarchy::count_nodes(&self.view), term),
            None => "Search cleared".to_string(),
        };
    }

    fn select_next(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected < self.row_count().saturating_sub(1) {
                self.list_state.select(Some(selected + 1));
            }
        }
    }

    fn select_prev(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected > 0 {
                self.list_state.select(Some(selected - 1));
            }
        }
    }
}

pub(crate) fn run_tui(snapshot: CategorySnapshot, source: PathBuf) -> Result<(), String> {
    // Setup terminal
    enable_raw_mode().map_err(|e| e.to_string())?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| e.to_string())?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| e.to_string())?;

    let mut app = TuiApp::new(snapshot, source);
    app.status_message = format!(
        "Loaded {} categories. Enter:toggle  a:status  /:search  r:reload  q:quit",
        app.snapshot.records().len()
    );

    let result = run_tui_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().map_err(|e| e.to_string())?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).map_err(|e| e.to_string())?;
    terminal.show_cursor().map_err(|e| e.to_string())?;

    result
}

fn run_tui_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut TuiApp,
) -> Result<(), String> {
    loop {
        terminal.draw(|f| draw_ui(f, app)).map_err(|e| e.to_string())?;

        if !event::poll(std::time::Duration::from_millis(200)).map_err(|e| e.to_string())? {
            continue;
        }
        let Event::Key(key) = event::read().map_err(|e| e.to_string())? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if app.search_mode {
            match key.code {
                KeyCode::Esc => {
                    app.search_mode = false;
                    app.status_message = "Search cancelled".to_string();
                }
                KeyCode::Enter => {
                    app.search_mode = false;
                    app.apply_search();
                }
                KeyCode::Backspace => {
                    app.search_input.pop();
                }
                KeyCode::Char(c) => app.search_input.push(c),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => return Ok(()),
            KeyCode::Down | KeyCode::Char('j') => app.select_next(),
            KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
            KeyCode::Enter | KeyCode::Char(' ') => app.toggle_selected(),
            KeyCode::Right | KeyCode::Char('l') => app.set_selected_expanded(true),
            KeyCode::Left | KeyCode::Char('h') => app.set_selected_expanded(false),
            KeyCode::Char('E') => {
                app.expansion.expand_all(&app.view);
                app.status_message = "Expanded all".to_string();
            }
            KeyCode::Char('C') => {
                app.expansion.collapse_all();
                app.clamp_selection();
                app.status_message = "Collapsed all".to_string();
            }
            KeyCode::Char('a') => app.cycle_status(),
            KeyCode::Char('/') => {
                app.search_mode = true;
                app.search_input = app.query.search.clone().unwrap_or_default();
            }
            KeyCode::Esc => {
                if app.query.search.is_some() {
                    app.search_input.clear();
                    app.apply_search();
                }
            }
            KeyCode::Char('r') => app.reload(),
            _ => {}
        }
    }
}

// ============================================================================
// Drawing
// ============================================================================

fn draw_ui(f: &mut Frame, app: &TuiApp) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.size());

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(outer[0]);

    draw_tree(f, app, panes[0]);
    draw_detail(f, app, panes[1]);
    draw_status_bar(f, app, outer[1]);
}

fn draw_tree(f: &mut Frame, app: &TuiApp, area: Rect) {
    // Account for: borders (2), highlight symbol "→ " (3)
    let usable_width = area.width.saturating_sub(5) as usize;

    let items: Vec<ListItem> = app.expansion.visible_rows(&app.view).iter().map(|row| {
        let node = row.node;
        let indent = "  ".repeat(row.depth);
        let prefix = if !node.has_children() {
            "•"
        } else if row.expanded {
            "▼"
        } else {
            "▶"
        };
        let count = if node.has_children() {
            format!(" ({})", node.children.len())
        } else {
            String::new()
        };

        let title = utils::ellipsize(&format!("{}{} {}{}", indent, prefix, node.name, count), usable_width);
        let style = if node.is_active {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        ListItem::new(Line::from(Span::styled(title, style)))
    }).collect();

    let title = match (&app.query.search, app.query.status) {
        (Some(term), StatusFilter::All) => format!(" Categories · '{}' ", term),
        (Some(term), status) => format!(" Categories · '{}' · {:?} ", term, status),
        (None, StatusFilter::All) => " Categories ".to_string(),
        (None, status) => format!(" Categories · {:?} ", status),
    };

    let tree = List::new(items)
        .block(Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(tree, area, &mut app.list_state.clone());
}

fn draw_detail(f: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Details ");

    let Some(node) = app.selected_node() else {
        f.render_widget(Paragraph::new("No category selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Yellow);
    let mut lines = vec![
        Line::from(Span::styled(node.name.clone(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(vec![Span::styled("id:        ", label), Span::raw(node.id.to_string())]),
        Line::from(vec![Span::styled("slug:      ", label), Span::raw(node.slug.clone())]),
        Line::from(vec![
            Span::styled("status:    ", label),
            Span::raw(if node.is_active { "active" } else { "inactive" }),
        ]),
        Line::from(vec![Span::styled("order:     ", label), Span::raw(node.sort_order.to_string())]),
    ];
    if let Some(parent) = node.parent_id {
        let note = if app.snapshot.get(parent).is_some() { "" } else { " (not loaded)" };
        lines.push(Line::from(vec![Span::styled("parent:    ", label), Span::raw(format!("{}{}", parent, note))]));
    }
    if let Some(count) = node.products_count {
        lines.push(Line::from(vec![Span::styled("products:  ", label), Span::raw(count.to_string())]));
    }
    if let Some(updated) = node.updated_at {
        lines.push(Line::from(vec![
            Span::styled("updated:   ", label),
            Span::raw(updated.format("%Y-%m-%d %H:%M").to_string()),
        ]));
    }
    if let Some(description) = &node.description {
        lines.push(Line::from(""));
        lines.push(Line::from(description.clone()));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn draw_status_bar(f: &mut Frame, app: &TuiApp, area: Rect) {
    let line = if app.search_mode {
        Line::from(vec![
            Span::styled(" / ", Style::default().fg(Color::Black).bg(Color::Yellow)),
            Span::raw(format!(" {}", app.search_input)),
        ])
    } else {
        Line::from(Span::styled(
            format!(" {}", app.status_message),
            Style::default().fg(Color::Gray),
        ))
    };
    f.render_widget(Paragraph::new(line), area);
}
