use crate::commands::AppCommand;
use crate::search::paged_view::{PageNav, ViewMode};
use crate::session::dto::{
    AliasRecord, DatabaseStatus, FilterOptions, FormulaDetail, FormulaPage, ImportSummary,
    Ingredient, IngredientPage, ServerBackup,
};
use crossterm::event::KeyCode;
use ratatui::widgets::TableState;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::mpsc;

/// 配方列表来自哪个页面
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum FormulaSource {
    List,
    Search,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Pane {
    Formulas,
    Detail,
    Ingredients,
    Aliases,
    Backups,
    Database,
}

/// 左侧菜单，顺序即显示顺序
pub const MENU: [(&str, Pane); 6] = [
    ("配方列表", Pane::Formulas),
    ("配方详情", Pane::Detail),
    ("原料", Pane::Ingredients),
    ("别名", Pane::Aliases),
    ("服务端备份", Pane::Backups),
    ("数据库", Pane::Database),
];

#[derive(PartialEq, Debug, Clone)]
pub enum InputMode {
    Normal,
    Command,
}

#[derive(PartialEq, Debug, Clone)]
pub enum FocusArea {
    Menu,     // 焦点在左侧菜单
    MainView, // 焦点在主视图
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Log(String),
    Message(String),
    Error(String),
    /// 破坏性操作被拦下，附带警告文本
    Confirm(String),
    Formulas {
        source: FormulaSource,
        page: FormulaPage,
        mode: ViewMode,
    },
    Detail(FormulaDetail),
    Options(FilterOptions),
    Ingredients {
        page: IngredientPage,
        term: String,
        selected: Option<i64>,
    },
    Aliases {
        ingredient: Ingredient,
        aliases: Vec<AliasRecord>,
    },
    Backups(Vec<ServerBackup>),
    Status {
        status: DatabaseStatus,
        export_enabled: bool,
    },
    Summary(ImportSummary),
    Saved(PathBuf),
}

const COMMANDS: [&str; 16] = [
    "formulas",
    "formula",
    "pdf",
    "options",
    "search",
    "page",
    "next",
    "prev",
    "view",
    "ingredients",
    "alias",
    "backup",
    "db",
    "auth",
    "help",
    "quit",
];

const SUBCOMMANDS: [(&str, &[&str]); 6] = [
    ("search", &["reset", "export"]),
    ("ingredients", &["find", "search", "clear"]),
    (
        "alias",
        &[
            "select", "list", "add", "delete", "import", "export", "backup", "restore",
        ],
    ),
    ("backup", &["create", "list", "restore", "delete"]),
    ("db", &["status", "upload", "excel", "init", "export"]),
    ("auth", &["login", "logout", "status"]),
];

fn complete_word(candidates: &[&'static str], cur: &str) -> Option<&'static str> {
    candidates
        .iter()
        .find(|c| c.starts_with(cur) && **c != cur)
        .copied()
}

/// 前台界面状态：后台推来的最新数据 + 菜单/输入框状态
pub struct App {
    pub pane: Pane,
    pub input_mode: InputMode,
    pub focus_area: FocusArea,
    pub menu_selected_index: usize,
    pub formulas: Option<(FormulaSource, FormulaPage)>,
    pub view_mode: ViewMode,
    pub options: Option<FilterOptions>,
    pub detail: Option<FormulaDetail>,
    pub ingredients: Option<IngredientPage>,
    pub ingredient_term: String,
    pub selected_ingredient: Option<i64>,
    pub aliases: Option<(Ingredient, Vec<AliasRecord>)>,
    pub backups: Vec<ServerBackup>,
    pub db_status: Option<(DatabaseStatus, bool)>,
    pub summary: Option<ImportSummary>,
    pub selected_index: usize,
    pub table_state: TableState,
    pub scroll: u16,
    pub command_input: String,
    pub command_cursor: usize,
    pub command_history: Vec<String>,
    pub command_history_index: Option<usize>,
    pub log_messages: Vec<String>,
    pub cmd_tx: mpsc::UnboundedSender<AppCommand>,
    pub evt_rx: Option<mpsc::UnboundedReceiver<AppEvent>>,
}

impl App {
    pub fn new(
        session_info: Vec<String>,
        cmd_tx: mpsc::UnboundedSender<AppCommand>,
        evt_rx: mpsc::UnboundedReceiver<AppEvent>,
    ) -> App {
        let mut log_messages = vec!["应用已启动".to_string()];
        log_messages.extend(session_info);
        App {
            pane: Pane::Formulas,
            input_mode: InputMode::Normal,
            focus_area: FocusArea::Menu,
            menu_selected_index: 0,
            formulas: None,
            view_mode: ViewMode::List,
            options: None,
            detail: None,
            ingredients: None,
            ingredient_term: String::new(),
            selected_ingredient: None,
            aliases: None,
            backups: Vec::new(),
            db_status: None,
            summary: None,
            selected_index: 0,
            table_state: TableState::default(),
            scroll: 0,
            command_input: String::new(),
            command_cursor: 0,
            command_history: Vec::new(),
            command_history_index: None,
            log_messages,
            cmd_tx,
            evt_rx: Some(evt_rx),
        }
    }

    /// 输入框的补全建议（只返回待补上的后缀）
    pub fn completion_hint(&self) -> Option<String> {
        let input = self.command_input.as_str();
        if input.trim().is_empty() || input.ends_with(' ') {
            return None;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        let (candidates, cur): (&[&'static str], &str) = match parts.as_slice() {
            [first] => (&COMMANDS[..], *first),
            [cmd, sub] => {
                let subs = SUBCOMMANDS.iter().find(|(name, _)| name == cmd)?.1;
                (subs, *sub)
            }
            _ => return None,
        };
        complete_word(candidates, cur).map(|c| c[cur.len()..].to_string())
    }

    /// 处理一行命令；返回 true 表示退出
    pub fn submit_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        self.command_history.push(line.to_string());
        self.command_history_index = None;

        let cmd = AppCommand::from_str(line).unwrap_or_else(|_| AppCommand::Unknown(line.to_string()));
        let quit = cmd == AppCommand::Quit;
        let cmd = match cmd {
            AppCommand::Unknown(msg) if msg.starts_with("未知命令") => {
                let first = line.split_whitespace().next().unwrap_or("");
                match complete_word(&COMMANDS, first) {
                    Some(hint) => AppCommand::Unknown(format!("{}，是否想输入 {}?", msg, hint)),
                    None => AppCommand::Unknown(msg),
                }
            }
            other => other,
        };
        let _ = self.cmd_tx.send(cmd);
        quit
    }

    fn log(&mut self, line: String) {
        self.log_messages.push(line);
    }

    fn show(&mut self, pane: Pane) {
        if let Some(i) = MENU.iter().position(|(_, p)| *p == pane) {
            self.menu_selected_index = i;
        }
        if self.pane != pane {
            self.scroll = 0;
        }
        self.pane = pane;
    }

    fn reset_selection(&mut self) {
        self.selected_index = 0;
        self.table_state.select(Some(0));
    }

    /// 后台事件写入界面状态，并记一行日志
    pub fn on_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Log(msg) => {
                for line in msg.lines() {
                    self.log(line.to_string());
                }
            }
            AppEvent::Message(msg) => self.log(format!("✓ {}", msg)),
            AppEvent::Error(msg) => self.log(format!("✗ {}", msg)),
            AppEvent::Confirm(warning) => {
                self.log(format!("⚠ {} (在命令后加 --yes 确认)", warning))
            }
            AppEvent::Formulas { source, page, mode } => {
                self.log(format!(
                    "已加载{} 第 {}/{} 页，共 {} 条",
                    match source {
                        FormulaSource::List => "配方列表",
                        FormulaSource::Search => "搜索结果",
                    },
                    page.pagination.current_page,
                    page.pagination.pages.max(1),
                    page.pagination.total
                ));
                self.view_mode = mode;
                self.formulas = Some((source, page));
                self.reset_selection();
                self.show(Pane::Formulas);
            }
            AppEvent::Detail(detail) => {
                self.log(format!("已加载配方 {}", detail.object_number));
                self.detail = Some(detail);
                self.show(Pane::Detail);
                self.scroll = 0;
            }
            AppEvent::Options(options) => {
                self.log("已加载筛选项".to_string());
                self.options = Some(options);
                self.show(Pane::Formulas);
            }
            AppEvent::Ingredients {
                page,
                term,
                selected,
            } => {
                self.ingredients = Some(page);
                self.ingredient_term = term;
                self.selected_ingredient = selected;
                self.reset_selection();
                // 批量刷新时停留在别名页
                if self.pane != Pane::Aliases {
                    self.show(Pane::Ingredients);
                }
            }
            AppEvent::Aliases {
                ingredient,
                aliases,
            } => {
                self.selected_ingredient = Some(ingredient.id);
                self.aliases = Some((ingredient, aliases));
                self.reset_selection();
                self.show(Pane::Aliases);
            }
            AppEvent::Backups(list) => {
                self.log(format!("服务端备份 {} 个", list.len()));
                self.backups = list;
                self.reset_selection();
                self.show(Pane::Backups);
            }
            AppEvent::Status {
                status,
                export_enabled,
            } => {
                self.db_status = Some((status, export_enabled));
                self.show(Pane::Database);
            }
            AppEvent::Summary(summary) => {
                self.log(format!(
                    "✓ {}",
                    summary.message.as_deref().unwrap_or("Import completed")
                ));
                self.summary = Some(summary);
                self.show(Pane::Database);
            }
            AppEvent::Saved(path) => self.log(format!("✓ 已保存到 {}", path.display())),
        }
    }

    /// 当前页面的可选行数
    pub fn row_count(&self) -> usize {
        match self.pane {
            Pane::Formulas => self.formulas.as_ref().map_or(0, |(_, p)| p.formulas.len()),
            Pane::Ingredients => self.ingredients.as_ref().map_or(0, |p| p.ingredients.len()),
            Pane::Aliases => self.aliases.as_ref().map_or(0, |(_, a)| a.len()),
            Pane::Backups => self.backups.len(),
            Pane::Detail | Pane::Database => 0,
        }
    }

    fn send(&self, cmd: AppCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    /// 菜单确认：切换页面，页面还没数据时顺带请求
    fn open_menu_item(&mut self) {
        let Some((_, pane)) = MENU.get(self.menu_selected_index).copied() else {
            return;
        };
        match pane {
            Pane::Formulas if self.formulas.is_none() => {
                self.send(AppCommand::Formulas(Default::default()))
            }
            Pane::Ingredients if self.ingredients.is_none() => self.send(AppCommand::Ingredients),
            Pane::Backups => self.send(AppCommand::BackupList),
            Pane::Database => self.send(AppCommand::DbStatus),
            _ => {}
        }
        self.show(pane);
        self.focus_area = FocusArea::MainView;
    }

    /// 主视图里按 Enter：配方进详情，原料进别名
    fn open_selected(&mut self) {
        match self.pane {
            Pane::Formulas => {
                if let Some(f) = self
                    .formulas
                    .as_ref()
                    .and_then(|(_, p)| p.formulas.get(self.selected_index))
                {
                    self.send(AppCommand::Formula {
                        object_number: f.object_number.clone(),
                    });
                }
            }
            Pane::Ingredients => {
                if let Some(ing) = self
                    .ingredients
                    .as_ref()
                    .and_then(|p| p.ingredients.get(self.selected_index))
                {
                    self.send(AppCommand::AliasSelect {
                        ingredient_id: ing.id,
                    });
                }
            }
            _ => {}
        }
    }

    /// 光标按字符计，这里换算成字节下标
    fn byte_index(&self) -> usize {
        self.command_input
            .char_indices()
            .nth(self.command_cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.command_input.len())
    }

    fn input_len(&self) -> usize {
        self.command_input.chars().count()
    }

    fn leave_command_mode(&mut self) {
        self.command_input.clear();
        self.command_cursor = 0;
        self.input_mode = InputMode::Normal;
    }

    fn recall(&mut self, index: Option<usize>) {
        self.command_history_index = index;
        self.command_input = index
            .and_then(|i| self.command_history.get(i).cloned())
            .unwrap_or_default();
        self.command_cursor = self.input_len();
    }

    pub fn handle_key_event(&mut self, key: KeyCode) -> bool {
        if self.input_mode == InputMode::Command {
            match key {
                KeyCode::Enter => {
                    let line = self.command_input.trim().to_string();
                    self.leave_command_mode();
                    return self.submit_line(&line);
                }
                KeyCode::Esc => self.leave_command_mode(),
                KeyCode::Tab => {
                    if let Some(hint) = self.completion_hint() {
                        self.command_input.push_str(&hint);
                        self.command_input.push(' ');
                        self.command_cursor = self.input_len();
                    }
                }
                KeyCode::Up => {
                    if !self.command_history.is_empty() {
                        let next = match self.command_history_index {
                            None => self.command_history.len() - 1,
                            Some(i) => i.saturating_sub(1),
                        };
                        self.recall(Some(next));
                    }
                }
                KeyCode::Down => {
                    if let Some(i) = self.command_history_index {
                        let next = Some(i + 1).filter(|n| *n < self.command_history.len());
                        self.recall(next);
                    }
                }
                KeyCode::Backspace => {
                    if self.command_cursor > 0 {
                        self.command_cursor -= 1;
                        let idx = self.byte_index();
                        self.command_input.remove(idx);
                    }
                }
                KeyCode::Delete => {
                    if self.command_cursor < self.input_len() {
                        let idx = self.byte_index();
                        self.command_input.remove(idx);
                    }
                }
                KeyCode::Left => self.command_cursor = self.command_cursor.saturating_sub(1),
                KeyCode::Right => {
                    self.command_cursor = (self.command_cursor + 1).min(self.input_len())
                }
                KeyCode::Home => self.command_cursor = 0,
                KeyCode::End => self.command_cursor = self.input_len(),
                KeyCode::Char(c) => {
                    let idx = self.byte_index();
                    self.command_input.insert(idx, c);
                    self.command_cursor += 1;
                }
                _ => {}
            }
            return false;
        }

        // 正常模式
        match key {
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Command;
                self.command_input.clear();
                self.command_cursor = 0;
            }
            KeyCode::Char('q') => {
                self.send(AppCommand::Quit);
                return true;
            }
            KeyCode::Left => self.focus_area = FocusArea::Menu,
            KeyCode::Right => self.focus_area = FocusArea::MainView,
            KeyCode::Up => {
                if self.focus_area == FocusArea::Menu {
                    self.menu_selected_index = self.menu_selected_index.saturating_sub(1);
                } else if matches!(self.pane, Pane::Detail | Pane::Database)
                    || (self.pane == Pane::Formulas && self.view_mode == ViewMode::Card)
                {
                    self.scroll = self.scroll.saturating_sub(1);
                } else {
                    self.selected_index = self.selected_index.saturating_sub(1);
                }
            }
            KeyCode::Down => {
                if self.focus_area == FocusArea::Menu {
                    if self.menu_selected_index + 1 < MENU.len() {
                        self.menu_selected_index += 1;
                    }
                } else if matches!(self.pane, Pane::Detail | Pane::Database)
                    || (self.pane == Pane::Formulas && self.view_mode == ViewMode::Card)
                {
                    self.scroll = self.scroll.saturating_add(1);
                } else if self.selected_index + 1 < self.row_count() {
                    self.selected_index += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char('c') => {
                if self.focus_area == FocusArea::Menu {
                    self.open_menu_item();
                } else {
                    self.open_selected();
                }
            }
            KeyCode::Char('x') => {
                if self.pane == Pane::Detail {
                    self.show(Pane::Formulas);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('p') => {
                if matches!(self.pane, Pane::Formulas | Pane::Ingredients) {
                    let nav = if key == KeyCode::Char('n') {
                        PageNav::Next
                    } else {
                        PageNav::Prev
                    };
                    self.send(AppCommand::Page(nav));
                }
            }
            KeyCode::Char('v') => {
                let mode = match self.view_mode {
                    ViewMode::List => ViewMode::Card,
                    ViewMode::Card => ViewMode::List,
                };
                self.send(AppCommand::View(mode));
            }
            _ => {}
        }
        self.table_state.select(Some(self.selected_index));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::dto::{FormulaSummary, Pagination};

    fn app() -> (App, mpsc::UnboundedReceiver<AppCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_evt_tx, evt_rx) = mpsc::unbounded_channel();
        (App::new(Vec::new(), cmd_tx, evt_rx), cmd_rx)
    }

    fn type_line(app: &mut App, line: &str) -> bool {
        app.handle_key_event(KeyCode::Char('/'));
        for c in line.chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
        app.handle_key_event(KeyCode::Enter)
    }

    fn formula_page(numbers: &[&str]) -> FormulaPage {
        FormulaPage {
            formulas: numbers
                .iter()
                .enumerate()
                .map(|(i, n)| FormulaSummary {
                    id: i as i64,
                    object_number: n.to_string(),
                    formulation_name: format!("Formula {}", n),
                    lifecycle_phase: None,
                    formula_brand: None,
                    sbu_category: None,
                    ingredients: Vec::new(),
                })
                .collect(),
            pagination: Pagination::default(),
        }
    }

    #[test]
    fn typed_lines_become_commands() {
        let (mut app, mut rx) = app();
        assert!(!type_line(&mut app, "alias delete 7"));
        assert_eq!(
            rx.try_recv().unwrap(),
            AppCommand::AliasDelete {
                alias_id: 7,
                confirmed: false
            }
        );
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(!type_line(&mut app, "   "));
        assert!(rx.try_recv().is_err());
        assert!(type_line(&mut app, "quit"));
        assert_eq!(app.command_history, vec!["alias delete 7", "quit"]);
    }

    #[test]
    fn multibyte_input_is_edited_by_character() {
        let (mut app, mut rx) = app();
        app.handle_key_event(KeyCode::Char('/'));
        for c in "alias add 阿司匹林x".chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
        app.handle_key_event(KeyCode::Backspace);
        app.handle_key_event(KeyCode::Left);
        app.handle_key_event(KeyCode::Char('-'));
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(
            rx.try_recv().unwrap(),
            AppCommand::AliasAdd {
                text: "阿司匹-林".into()
            }
        );
    }

    #[test]
    fn tab_completes_commands_and_subcommands() {
        let (mut app, _rx) = app();
        app.handle_key_event(KeyCode::Char('/'));
        for c in "ingr".chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
        assert_eq!(app.completion_hint().as_deref(), Some("edients"));
        app.handle_key_event(KeyCode::Tab);
        assert_eq!(app.command_input, "ingredients ");
        app.handle_key_event(KeyCode::Char('c'));
        assert_eq!(app.completion_hint().as_deref(), Some("lear"));
    }

    #[test]
    fn history_is_recalled_with_arrows() {
        let (mut app, _rx) = app();
        type_line(&mut app, "backup list");
        type_line(&mut app, "db status");
        app.handle_key_event(KeyCode::Char('/'));
        app.handle_key_event(KeyCode::Up);
        assert_eq!(app.command_input, "db status");
        app.handle_key_event(KeyCode::Up);
        assert_eq!(app.command_input, "backup list");
        app.handle_key_event(KeyCode::Down);
        app.handle_key_event(KeyCode::Down);
        assert_eq!(app.command_input, "");
    }

    #[test]
    fn unknown_command_gets_hint() {
        let (mut app, mut rx) = app();
        app.submit_line("ali list");
        match rx.try_recv().unwrap() {
            AppCommand::Unknown(msg) => assert!(msg.contains("alias")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn menu_confirm_requests_missing_data() {
        let (mut app, mut rx) = app();
        for _ in 0..4 {
            app.handle_key_event(KeyCode::Down);
        }
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(app.pane, Pane::Backups);
        assert_eq!(app.focus_area, FocusArea::MainView);
        assert_eq!(rx.try_recv().unwrap(), AppCommand::BackupList);
    }

    #[test]
    fn enter_on_formula_row_opens_detail() {
        let (mut app, mut rx) = app();
        app.on_event(AppEvent::Formulas {
            source: FormulaSource::List,
            page: formula_page(&["F-1", "F-2"]),
            mode: ViewMode::List,
        });
        assert_eq!(app.pane, Pane::Formulas);
        app.handle_key_event(KeyCode::Right);
        app.handle_key_event(KeyCode::Down);
        app.handle_key_event(KeyCode::Down);
        assert_eq!(app.selected_index, 1);
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(
            rx.try_recv().unwrap(),
            AppCommand::Formula {
                object_number: "F-2".into()
            }
        );
        app.handle_key_event(KeyCode::Char('n'));
        assert_eq!(rx.try_recv().unwrap(), AppCommand::Page(PageNav::Next));
    }

    #[test]
    fn confirm_event_explains_flag() {
        let (mut app, _rx) = app();
        app.on_event(AppEvent::Confirm(
            "Are you sure you want to delete this alias?".into(),
        ));
        assert!(app.log_messages.last().unwrap().contains("--yes"));
    }

    #[test]
    fn quit_key_tells_the_service() {
        let (mut app, mut rx) = app();
        assert!(app.handle_key_event(KeyCode::Char('q')));
        assert_eq!(rx.try_recv().unwrap(), AppCommand::Quit);
    }
}
