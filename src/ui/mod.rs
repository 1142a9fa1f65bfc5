//! 终端界面：顶部标题、左侧菜单、主视图、底部命令栏和日志

use crate::app_state::{App, FocusArea, FormulaSource, InputMode, Pane, MENU};
use crate::search::paged_view::ViewMode;
use crate::session::dto::{
    DatabaseStatus, FilterOptions, FormulaDetail, FormulaSummary, ImportSummary, Ingredient,
    IngredientUsage, Pagination, ServerBackup,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

const CARD_INGREDIENTS: usize = 5;

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // 顶部栏
            Constraint::Min(0),    // 中间
            Constraint::Length(12), // 底部命令栏 + 日志
        ])
        .split(f.size());

    render_top_bar(f, app, chunks[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(18), Constraint::Min(0)])
        .split(chunks[1]);

    render_left_menu(f, app, middle[0]);
    render_main_view(f, app, middle[1]);
    render_bottom_bar(f, app, chunks[2]);
}

fn render_top_bar(f: &mut Frame, app: &App, area: Rect) {
    let mode = match app.input_mode {
        InputMode::Normal => "正常",
        InputMode::Command => "命令",
    };
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "Formulary",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  模式: {}  视图: {}", mode, app.view_mode)),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::White)
    }
}

fn render_left_menu(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = MENU
        .iter()
        .enumerate()
        .map(|(i, (label, pane))| {
            let style = if i == app.menu_selected_index {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else if *pane == app.pane {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(*label).style(style)
        })
        .collect();
    let menu = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("菜单")
            .style(focus_style(app.focus_area == FocusArea::Menu)),
    );
    f.render_widget(menu, area);
}

fn main_block(app: &App, title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(focus_style(app.focus_area == FocusArea::MainView))
}

fn highlight() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

fn render_main_view(f: &mut Frame, app: &mut App, area: Rect) {
    match app.pane {
        Pane::Formulas => render_formulas(f, app, area),
        Pane::Detail => {
            let (title, lines) = match &app.detail {
                Some(d) => (
                    format!("{} | {} (x 返回)", d.object_number, d.formulation_name),
                    detail_lines(d),
                ),
                None => ("配方详情".to_string(), vec![placeholder("输入 /formula <编号> 查看详情")]),
            };
            let p = Paragraph::new(lines)
                .block(main_block(app, title))
                .wrap(Wrap { trim: false })
                .scroll((app.scroll, 0));
            f.render_widget(p, area);
        }
        Pane::Ingredients => render_ingredients(f, app, area),
        Pane::Aliases => {
            let (title, items) = match &app.aliases {
                Some((ing, aliases)) => (
                    format!(
                        "{} ({}) 的别名",
                        ing.name,
                        or_dash(ing.fing_item_number.as_deref())
                    ),
                    if aliases.is_empty() {
                        vec![ListItem::new("(no aliases)")]
                    } else {
                        aliases
                            .iter()
                            .map(|a| ListItem::new(format!("#{:<6} {}", a.id, a.alias)))
                            .collect()
                    },
                ),
                None => (
                    "别名".to_string(),
                    vec![ListItem::new("输入 /alias select <原料 id> 选择原料")],
                ),
            };
            let list = List::new(items)
                .block(main_block(app, title))
                .highlight_style(highlight())
                .highlight_symbol(">> ");
            let mut state = ratatui::widgets::ListState::default();
            state.select(Some(app.selected_index));
            f.render_stateful_widget(list, area, &mut state);
        }
        Pane::Backups => {
            let rows: Vec<Row> = app.backups.iter().map(backup_row).collect();
            let title = format!("服务端备份 ({})", app.backups.len());
            if rows.is_empty() {
                let p = Paragraph::new("No backups found").block(main_block(app, title));
                f.render_widget(p, area);
                return;
            }
            let table = Table::new(
                rows,
                [
                    Constraint::Length(26),
                    Constraint::Length(20),
                    Constraint::Length(14),
                    Constraint::Min(10),
                ],
            )
            .header(header(&["ID", "创建时间", "别名数", "大小"]))
            .block(main_block(app, title))
            .highlight_style(highlight())
            .highlight_symbol(">> ");
            f.render_stateful_widget(table, area, &mut app.table_state);
        }
        Pane::Database => {
            let mut lines = match &app.db_status {
                Some((status, export_enabled)) => status_lines(status, *export_enabled),
                None => vec![placeholder("输入 /db status 读取数据库状态")],
            };
            if let Some(summary) = &app.summary {
                lines.push(Line::from(""));
                lines.extend(summary_lines(summary));
            }
            let p = Paragraph::new(lines)
                .block(main_block(app, "数据库".to_string()))
                .wrap(Wrap { trim: false })
                .scroll((app.scroll, 0));
            f.render_widget(p, area);
        }
    }
}

fn placeholder(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray),
    ))
}

fn header(labels: &[&'static str]) -> Row<'static> {
    Row::new(labels.to_vec()).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

fn render_formulas(f: &mut Frame, app: &mut App, area: Rect) {
    let area = match &app.options {
        Some(options) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(6), Constraint::Min(0)])
                .split(area);
            let p = Paragraph::new(option_lines(options))
                .block(Block::default().borders(Borders::ALL).title("筛选项"));
            f.render_widget(p, parts[0]);
            parts[1]
        }
        None => area,
    };

    let Some((source, page)) = &app.formulas else {
        let p = Paragraph::new(placeholder("输入 /formulas 或 /search 加载配方"))
            .block(main_block(app, "配方".to_string()));
        f.render_widget(p, area);
        return;
    };
    let title = format!(
        "{} | {}",
        match source {
            FormulaSource::List => "配方列表",
            FormulaSource::Search => "搜索结果",
        },
        pagination_line(&page.pagination)
    );
    if page.formulas.is_empty() {
        let p = Paragraph::new("No formulas found").block(main_block(app, title));
        f.render_widget(p, area);
        return;
    }

    match app.view_mode {
        ViewMode::List => {
            let rows: Vec<Row> = page.formulas.iter().map(formula_row).collect();
            let table = Table::new(
                rows,
                [
                    Constraint::Length(14),
                    Constraint::Min(24),
                    Constraint::Length(16),
                    Constraint::Length(16),
                    Constraint::Length(12),
                ],
            )
            .header(header(&["编号", "名称", "品牌", "类别", "阶段"]))
            .block(main_block(app, title))
            .highlight_style(highlight())
            .highlight_symbol(">> ");
            f.render_stateful_widget(table, area, &mut app.table_state);
        }
        ViewMode::Card => {
            let lines: Vec<Line> = page.formulas.iter().flat_map(card_lines).collect();
            let p = Paragraph::new(lines)
                .block(main_block(app, title))
                .scroll((app.scroll, 0));
            f.render_widget(p, area);
        }
    }
}

fn render_ingredients(f: &mut Frame, app: &mut App, area: Rect) {
    let Some(page) = &app.ingredients else {
        let p = Paragraph::new(placeholder("输入 /ingredients 加载原料"))
            .block(main_block(app, "原料".to_string()));
        f.render_widget(p, area);
        return;
    };
    let title = if app.ingredient_term.is_empty() {
        format!("原料 | {}", pagination_line(&page.pagination))
    } else {
        format!(
            "原料 \"{}\" | {}",
            app.ingredient_term,
            pagination_line(&page.pagination)
        )
    };
    if page.ingredients.is_empty() {
        let p = Paragraph::new("No ingredients found").block(main_block(app, title));
        f.render_widget(p, area);
        return;
    }
    let rows: Vec<Row> = page
        .ingredients
        .iter()
        .map(|ing| {
            let mark = if app.selected_ingredient == Some(ing.id) {
                "*"
            } else {
                ""
            };
            Row::new(vec![
                mark.to_string(),
                ing.id.to_string(),
                ing.name.clone(),
                or_dash(ing.fing_item_number.as_deref()).to_string(),
                ingredient_hint(ing, &app.ingredient_term),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Length(7),
            Constraint::Min(24),
            Constraint::Length(12),
            Constraint::Min(24),
        ],
    )
    .header(header(&["", "ID", "名称", "物料号", "别名"]))
    .block(main_block(app, title))
    .highlight_style(highlight())
    .highlight_symbol(">> ");
    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_bottom_bar(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let input = match app.input_mode {
        InputMode::Command => {
            let mut spans = vec![
                Span::styled("/", Style::default().fg(Color::Yellow)),
                Span::raw(app.command_input.clone()),
            ];
            if let Some(hint) = app.completion_hint() {
                spans.push(Span::styled(hint, Style::default().fg(Color::DarkGray)));
            }
            Paragraph::new(Line::from(spans)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("命令 (Enter 执行, Esc 取消, Tab 补全)")
                    .style(Style::default().fg(Color::Yellow)),
            )
        }
        InputMode::Normal => Paragraph::new(placeholder(
            "/ 输入命令  ←/→ 切换焦点  ↑/↓ 选择  Enter 打开  n/p 翻页  v 切换视图  q 退出",
        ))
        .block(Block::default().borders(Borders::ALL).title("命令")),
    };
    f.render_widget(input, chunks[0]);
    if app.input_mode == InputMode::Command {
        let x = chunks[0].x + 2 + cursor_width(&app.command_input, app.command_cursor);
        f.set_cursor(x.min(chunks[0].right().saturating_sub(2)), chunks[0].y + 1);
    }

    let logs: Vec<ListItem> = app
        .log_messages
        .iter()
        .rev()
        .take(20)
        .map(|m| {
            let style = if m.starts_with('✓') {
                Style::default().fg(Color::Green)
            } else if m.starts_with('✗') {
                Style::default().fg(Color::Red)
            } else if m.starts_with('⚠') {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            ListItem::new(m.as_str()).style(style)
        })
        .collect();
    let list = List::new(logs).block(Block::default().borders(Borders::ALL).title("日志"));
    f.render_widget(list, chunks[1]);
}

/// 光标前文字的显示宽度，中文占两格
fn cursor_width(input: &str, cursor: usize) -> u16 {
    input
        .chars()
        .take(cursor)
        .map(|c| if c.is_ascii() { 1 } else { 2 })
        .sum()
}

fn or_dash(v: Option<&str>) -> &str {
    v.filter(|s| !s.trim().is_empty()).unwrap_or("-")
}

fn fmt_amount(usage: &IngredientUsage) -> String {
    match usage.amount {
        Some(a) => format!("{} {}", a, usage.unit.as_deref().unwrap_or(""))
            .trim_end()
            .to_string(),
        None => "-".to_string(),
    }
}

fn fmt_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{} B", b),
    }
}

fn pagination_line(p: &Pagination) -> String {
    let mut line = format!(
        "第 {}/{} 页，共 {} 条",
        p.current_page,
        p.pages.max(1),
        p.total
    );
    if p.has_prev {
        line.push_str(" | prev");
    }
    if p.has_next {
        line.push_str(" | next");
    }
    line
}

fn formula_row(f: &FormulaSummary) -> Row<'static> {
    Row::new(vec![
        f.object_number.clone(),
        f.formulation_name.clone(),
        or_dash(f.formula_brand.as_deref()).to_string(),
        or_dash(f.sbu_category.as_deref()).to_string(),
        or_dash(f.lifecycle_phase.as_deref()).to_string(),
    ])
}

fn card_lines(f: &FormulaSummary) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("┌ {}", f.object_number),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" | {}", f.formulation_name)),
        ]),
        Line::from(format!(
            "│ 品牌: {}  类别: {}  阶段: {}",
            or_dash(f.formula_brand.as_deref()),
            or_dash(f.sbu_category.as_deref()),
            or_dash(f.lifecycle_phase.as_deref()),
        )),
    ];
    for usage in f.ingredients.iter().take(CARD_INGREDIENTS) {
        lines.push(Line::from(format!(
            "│  - {} {}",
            usage.name,
            fmt_amount(usage)
        )));
    }
    if f.ingredients.len() > CARD_INGREDIENTS {
        lines.push(Line::from(format!(
            "│  … 另有 {} 种原料",
            f.ingredients.len() - CARD_INGREDIENTS
        )));
    }
    lines.push(Line::from("└"));
    lines
}

fn detail_lines(d: &FormulaDetail) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::Yellow);
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{}: ", name), label),
            Span::raw(value),
        ])
    };
    let join = |ids: &[String]| {
        if ids.is_empty() {
            "-".to_string()
        } else {
            ids.join(", ")
        }
    };

    let mut lines: Vec<Line<'static>> = [
        ("品牌", d.formula_brand.as_deref()),
        ("类别", d.sbu_category.as_deref()),
        ("生命周期", d.lifecycle_phase.as_deref()),
        ("Dossier", d.dossier_type.as_deref()),
        ("生产地", d.production_sites.as_deref()),
        ("法规备注", d.regulatory_comments.as_deref()),
        ("一般备注", d.general_comments.as_deref()),
    ]
    .into_iter()
    .map(|(name, value)| field(name, or_dash(value).to_string()))
    .collect();
    lines.push(field("前序配方", join(&d.predecessor_formulation_number)));
    lines.push(field("后续配方", join(&d.successor_formulation_number)));
    lines.push(Line::from(Span::styled(
        format!("原料 ({}):", d.ingredients.len()),
        label,
    )));
    for usage in &d.ingredients {
        lines.push(Line::from(format!(
            "  {:<10} {:<32} {:>12}  {}",
            or_dash(usage.fing_item_number.as_deref()),
            usage.name,
            fmt_amount(usage),
            usage.display_description(),
        )));
    }
    lines
}

fn option_lines(o: &FilterOptions) -> Vec<Line<'static>> {
    [
        ("brand", &o.brands),
        ("category", &o.categories),
        ("phase", &o.lifecycle_phases),
        ("site", &o.production_sites),
    ]
    .into_iter()
    .map(|(name, values)| Line::from(format!("{}: {}", name, values.join(" | "))))
    .collect()
}

fn ingredient_hint(ing: &Ingredient, term: &str) -> String {
    match ing.matching_alias(term) {
        Some(alias) => format!("Matched alias: {}", alias),
        None if !ing.aliases.is_empty() => format!("{} aliases", ing.aliases.len()),
        None => String::new(),
    }
}

fn backup_row(b: &ServerBackup) -> Row<'static> {
    let created = b
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    Row::new(vec![
        b.id.clone(),
        created,
        format!("{} aliases", b.aliases_count),
        fmt_size(b.size),
    ])
}

fn status_lines(status: &DatabaseStatus, export_enabled: bool) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format!(
        "有数据: {}{}",
        if status.has_data { "是" } else { "否" },
        status
            .status
            .as_deref()
            .map(|s| format!(" ({})", s))
            .unwrap_or_default()
    ))];
    if let Some(c) = &status.counts {
        lines.push(Line::from(format!(
            "原料: {}  配方: {}  配方-原料关系: {}",
            c.ingredients, c.formulas, c.formula_ingredients
        )));
    }
    lines.push(Line::from(if export_enabled {
        Span::styled("导出: 可用", Style::default().fg(Color::Green))
    } else {
        Span::styled("导出: 不可用（数据库为空）", Style::default().fg(Color::DarkGray))
    }));
    lines
}

fn summary_lines(s: &ImportSummary) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!("✓ {}", s.message.as_deref().unwrap_or("Import completed")),
        Style::default().fg(Color::Green),
    ))];
    for (name, n) in [
        ("原料", s.ingredients_created),
        ("配方", s.formulas_created),
        ("配方-原料关系", s.formula_ingredients_created),
        ("错误", s.errors),
    ] {
        if let Some(n) = n {
            lines.push(Line::from(format!("  {}: {}", name, n)));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppEvent;
    use crate::session::dto::{FormulaPage, IngredientPage};
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn formula() -> FormulaSummary {
        FormulaSummary {
            id: 1,
            object_number: "F-001".into(),
            formulation_name: "Hand Cream".into(),
            lifecycle_phase: Some("Active".into()),
            formula_brand: Some("Acme".into()),
            sbu_category: None,
            ingredients: (0..7)
                .map(|i| IngredientUsage {
                    id: i,
                    name: format!("Ing{}", i),
                    fing_item_number: None,
                    amount: Some(1.5),
                    unit: Some("%".into()),
                    description: None,
                    description_expanded: None,
                })
                .collect(),
        }
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn card_lines_cap_ingredients() {
        let lines: Vec<String> = card_lines(&formula()).iter().map(text).collect();
        assert!(lines.contains(&"│  - Ing0 1.5 %".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Ing5")));
        assert!(lines.iter().any(|l| l.contains("另有 2 种原料")));
    }

    #[test]
    fn pagination_marks_neighbours() {
        let p = Pagination {
            current_page: 1,
            pages: 3,
            total: 41,
            per_page: Some(20),
            has_next: true,
            has_prev: false,
        };
        assert_eq!(pagination_line(&p), "第 1/3 页，共 41 条 | next");
    }

    #[test]
    fn ingredient_hint_prefers_matched_alias() {
        let ing = Ingredient {
            id: 3,
            name: "Aspirin".into(),
            fing_item_number: None,
            description: None,
            aliases: vec!["ASA".into(), "Acetylsalicylic acid".into()],
        };
        assert_eq!(
            ingredient_hint(&ing, "acetyl"),
            "Matched alias: Acetylsalicylic acid"
        );
        assert_eq!(ingredient_hint(&ing, ""), "2 aliases");
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(fmt_size(512), "512 B");
        assert_eq!(fmt_size(2048), "2.0 KB");
        assert_eq!(fmt_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn export_line_follows_flag() {
        let status = DatabaseStatus {
            has_data: false,
            status: None,
            counts: None,
        };
        let lines: Vec<String> = status_lines(&status, false).iter().map(text).collect();
        assert!(lines.last().unwrap().contains("不可用"));
    }

    #[test]
    fn formula_table_and_ingredient_table_render() {
        let (cmd_tx, _cmd_rx) = mpsc::unbounded_channel();
        let (_evt_tx, evt_rx) = mpsc::unbounded_channel();
        let mut app = App::new(vec!["started".into()], cmd_tx, evt_rx);

        app.on_event(AppEvent::Formulas {
            source: FormulaSource::List,
            page: FormulaPage {
                formulas: vec![formula()],
                pagination: Pagination::default(),
            },
            mode: ViewMode::List,
        });
        let shown = screen(&mut app);
        assert!(shown.contains("F-001"));
        assert!(shown.contains("Hand Cream"));
        assert!(!shown.contains("Ing0"));
        assert!(shown.contains("started"));

        app.on_event(AppEvent::Ingredients {
            page: IngredientPage {
                ingredients: vec![Ingredient {
                    id: 3,
                    name: "Aspirin".into(),
                    fing_item_number: Some("RM-9".into()),
                    description: None,
                    aliases: vec!["ASA".into()],
                }],
                pagination: Pagination::default(),
            },
            term: "asa".into(),
            selected: Some(3),
        });
        let shown = screen(&mut app);
        assert!(shown.contains("Aspirin"));
        assert!(shown.contains("RM-9"));
        assert!(shown.contains("Matched alias: ASA"));
    }
}
