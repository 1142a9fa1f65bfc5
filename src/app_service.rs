use crate::admin::DatabasePanel;
use crate::aliases::editor::SELECT_INGREDIENT;
use crate::aliases::{
    AliasEditor, BackupPanel, DebounceToken, Gate, IngredientBrowser, MessageId, TermChange,
    MESSAGE_TTL, SEARCH_DEBOUNCE,
};
use crate::app_state::{AppEvent, FormulaSource};
use crate::commands::{AppCommand, HELP};
use crate::error::ApiError;
use crate::search::{FilterState, FormulaListView, FormulaSearchView, PendingFetch, QueryBuilder, Ticket};
use crate::session::dto::{AliasRecord, FormulaPage, IngredientPage};
use crate::session::{AuthGate, Download, FormularySession, UploadFile};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

const MIME_CSV: &str = "text/csv";
const MIME_JSON: &str = "application/json";
const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// 当前所在页面；离开页面时放弃它的在途请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Formulas,
    Search,
    Ingredients,
    Backups,
    Database,
}

/// 哪个面板的提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Alias,
    Backup,
}

/// 后台任务（请求、定时器）完成后回到服务的消息
#[derive(Debug)]
pub enum Completion {
    Formulas(Ticket, Result<FormulaPage, ApiError>),
    Search(Ticket, Result<FormulaPage, ApiError>),
    Ingredients(Ticket, Result<IngredientPage, ApiError>),
    Aliases(Ticket, i64, Result<Vec<AliasRecord>, ApiError>),
    Debounce(DebounceToken),
    Expire(Notice, MessageId),
}

/// 后台服务：持有全部视图状态，是唯一的修改者
///
/// 会互相竞争的拉取（配方列表、搜索、原料、别名）放到独立任务里执行，
/// 结果经 `done` 通道回来，再由 [`AppService::on_completion`] 按序号决定是否采纳。
/// 其余操作都是一次请求一次响应，直接在命令处理里等待。
pub struct AppService {
    session: Arc<FormularySession>,
    gate: Option<Arc<AuthGate>>,
    download_dir: PathBuf,
    evt_tx: mpsc::UnboundedSender<AppEvent>,
    done_tx: mpsc::UnboundedSender<Completion>,
    screen: Screen,
    formulas: FormulaListView,
    search: FormulaSearchView,
    ingredients: IngredientBrowser,
    editor: AliasEditor,
    backups: BackupPanel,
    database: DatabasePanel,
}

impl AppService {
    pub fn new(
        session: Arc<FormularySession>,
        gate: Option<Arc<AuthGate>>,
        per_page: u32,
        download_dir: PathBuf,
        evt_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let builder = QueryBuilder::new(per_page);
        let service = Self {
            session,
            gate,
            download_dir,
            evt_tx,
            done_tx,
            screen: Screen::Formulas,
            formulas: FormulaListView::new(builder),
            search: FormulaSearchView::new(builder),
            ingredients: IngredientBrowser::new(builder),
            editor: AliasEditor::new(),
            backups: BackupPanel::new(),
            database: DatabasePanel::new(),
        };
        (service, done_rx)
    }

    /// 主循环：命令与完成消息交替处理，直到收到 quit 或前台关闭
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<AppCommand>,
        mut done_rx: mpsc::UnboundedReceiver<Completion>,
    ) {
        info!("{} 后台服务启动", self);
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(AppCommand::Quit) | None => {
                        self.send(AppEvent::Message("收到退出命令".to_string()));
                        break;
                    }
                    Some(cmd) => self.handle(cmd).await,
                },
                Some(done) = done_rx.recv() => self.on_completion(done),
            }
        }
        info!("{} 后台服务退出", self);
    }

    fn send(&self, event: AppEvent) {
        let _ = self.evt_tx.send(event);
    }

    fn fail(&self, err: &ApiError) {
        self.send(AppEvent::Error(err.user_message()));
    }

    fn enter(&mut self, screen: Screen) {
        if self.screen == screen {
            return;
        }
        match self.screen {
            Screen::Formulas => self.formulas.abandon(),
            Screen::Search => self.search.abandon(),
            Screen::Ingredients => self.ingredients.abandon(),
            _ => {}
        }
        debug!("{} 切换页面 {:?} -> {:?}", self, self.screen, screen);
        self.screen = screen;
    }

    pub async fn handle(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::Formulas(filters) => {
                self.enter(Screen::Formulas);
                match self.formulas.replace(filters) {
                    Ok(fetch) => self.spawn_formulas(FormulaSource::List, fetch),
                    Err(e) => self.fail(&e),
                }
            }
            // 详情叠在当前页面上，不放弃列表的在途请求
            AppCommand::Formula { object_number } => {
                match self.session.get_formula(&object_number).await {
                    Ok(detail) => self.send(AppEvent::Detail(detail)),
                    Err(e) => self.fail(&e),
                }
            }
            AppCommand::FormulaPdf { object_number } => {
                let result = self.session.formula_pdf(&object_number).await;
                self.deliver(result).await;
            }
            AppCommand::Options => match self.session.filter_options().await {
                Ok(options) => self.send(AppEvent::Options(options)),
                Err(e) => self.fail(&e),
            },
            AppCommand::Search(mut filters) => {
                self.enter(Screen::Search);
                self.resolve_exclusions(&mut filters);
                match self.search.replace(filters) {
                    Ok(fetch) => self.spawn_formulas(FormulaSource::Search, fetch),
                    Err(e) => self.fail(&e),
                }
            }
            AppCommand::SearchReset => {
                self.enter(Screen::Search);
                let fetch = self.search.reset();
                self.spawn_formulas(FormulaSource::Search, fetch);
            }
            AppCommand::SearchExport => {
                let target = self.search.builder().export(self.search.query());
                let result = self.session.export_formulas(target).await;
                self.deliver(result).await;
            }
            AppCommand::Page(nav) => {
                let fetch = match self.screen {
                    Screen::Formulas => self
                        .formulas
                        .navigate(nav)
                        .map(|f| (Some(FormulaSource::List), f)),
                    Screen::Search => self
                        .search
                        .navigate(nav)
                        .map(|f| (Some(FormulaSource::Search), f)),
                    Screen::Ingredients => self.ingredients.navigate(nav).map(|f| (None, f)),
                    _ => {
                        self.send(AppEvent::Error("当前页面没有分页".to_string()));
                        return;
                    }
                };
                match fetch {
                    Some((Some(source), f)) => self.spawn_formulas(source, f),
                    Some((None, f)) => self.spawn_ingredients(f),
                    None => self.send(AppEvent::Log("没有可跳转的页".to_string())),
                }
            }
            AppCommand::View(mode) => {
                self.formulas.set_mode(mode);
                self.search.set_mode(mode);
                match self.screen {
                    Screen::Formulas => self.emit_formulas(FormulaSource::List),
                    Screen::Search => self.emit_formulas(FormulaSource::Search),
                    _ => self.send(AppEvent::Log(format!("视图模式: {}", mode))),
                }
            }
            AppCommand::Ingredients => {
                self.enter(Screen::Ingredients);
                let fetch = self.ingredients.refresh();
                self.spawn_ingredients(fetch);
            }
            AppCommand::IngredientsType { term } => {
                self.enter(Screen::Ingredients);
                match self.ingredients.type_term(&term) {
                    TermChange::Fetch(fetch) => self.spawn_ingredients(fetch),
                    TermChange::Wait(token) => {
                        let done = self.done_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(SEARCH_DEBOUNCE).await;
                            let _ = done.send(Completion::Debounce(token));
                        });
                    }
                }
            }
            AppCommand::IngredientsSearch { term } => {
                self.enter(Screen::Ingredients);
                self.ingredients.type_term(&term);
                let fetch = self.ingredients.submit();
                self.spawn_ingredients(fetch);
            }
            AppCommand::IngredientsClear => {
                self.enter(Screen::Ingredients);
                let fetch = self.ingredients.clear();
                self.spawn_ingredients(fetch);
            }
            AppCommand::AliasSelect { ingredient_id } => {
                let Some(ingredient) = self.ingredients.find(ingredient_id).cloned() else {
                    self.send(AppEvent::Error(format!(
                        "原料 {} 不在当前列表中，请先用 ingredients 查找",
                        ingredient_id
                    )));
                    return;
                };
                self.enter(Screen::Ingredients);
                let ticket = self.editor.select(ingredient);
                self.spawn_aliases(ticket, ingredient_id);
            }
            AppCommand::AliasList => {
                if self.editor.selected().is_some() {
                    self.emit_aliases();
                } else {
                    self.send(AppEvent::Error(SELECT_INGREDIENT.to_string()));
                }
            }
            AppCommand::AliasAdd { text } => self.add_alias(&text).await,
            AppCommand::AliasDelete {
                alias_id,
                confirmed,
            } => self.delete_alias(alias_id, confirmed).await,
            AppCommand::AliasImport { file } => {
                let path = match self.editor.prepare_import(file.as_deref()) {
                    Ok(p) => p,
                    Err(e) => return self.fail(&e),
                };
                let Some(upload) = self.read_upload(&path, MIME_CSV).await else {
                    return;
                };
                match self.session.import_aliases(upload).await {
                    Ok(result) => {
                        self.editor.apply_import(result);
                        if let Some(r) = self.editor.import_result() {
                            self.send(AppEvent::Message(format!(
                                "{}: {} added, {} errors",
                                r.message.as_deref().unwrap_or("Import completed"),
                                r.aliases_added,
                                r.errors
                            )));
                        }
                        self.refresh_after_bulk();
                    }
                    Err(e) => {
                        self.editor.fail(&e);
                        self.fail(&e);
                    }
                }
            }
            AppCommand::AliasExport => {
                let result = self.session.export_aliases().await;
                self.deliver(result).await;
            }
            AppCommand::AliasBackup => {
                let result = self.session.backup_aliases().await;
                self.deliver(result).await;
            }
            AppCommand::AliasRestore { file } => {
                let path = match self.editor.prepare_restore(file.as_deref()) {
                    Ok(p) => p,
                    Err(e) => return self.fail(&e),
                };
                let Some(upload) = self.read_upload(&path, MIME_JSON).await else {
                    return;
                };
                match self.session.restore_aliases(upload).await {
                    Ok(result) => {
                        self.editor.apply_restore(result);
                        if let Some(r) = self.editor.restore_result() {
                            self.send(AppEvent::Message(format!(
                                "{}: {} restored, {} skipped",
                                r.message.as_deref().unwrap_or("Restore completed"),
                                r.aliases_restored,
                                r.aliases_skipped
                            )));
                        }
                        self.refresh_after_bulk();
                    }
                    Err(e) => {
                        self.editor.fail(&e);
                        self.fail(&e);
                    }
                }
            }
            AppCommand::BackupCreate => match self.session.create_server_backup().await {
                Ok(created) => {
                    let id = self.backups.apply_created(&created, Instant::now());
                    self.notify_backup(id);
                    self.load_backups().await;
                }
                Err(e) => {
                    self.backups.fail(&e);
                    self.fail(&e);
                }
            },
            AppCommand::BackupList => {
                self.enter(Screen::Backups);
                self.load_backups().await;
            }
            AppCommand::BackupRestore {
                id,
                clear_existing,
                confirmed,
            } => {
                let (id, clear) = match self.backups.prepare_restore(&id, clear_existing, confirmed) {
                    Gate::Proceed(args) => args,
                    Gate::NeedsConfirmation(warning) => return self.send(AppEvent::Confirm(warning)),
                };
                match self.session.restore_server_backup(&id, clear).await {
                    Ok(result) => {
                        let mid = self.backups.apply_restored(&result, Instant::now());
                        self.notify_backup(mid);
                        self.refresh_after_bulk();
                    }
                    Err(e) => {
                        self.backups.fail(&e);
                        self.fail(&e);
                    }
                }
            }
            AppCommand::BackupDelete { id, confirmed } => {
                let id = match self.backups.prepare_delete(&id, confirmed) {
                    Gate::Proceed(id) => id,
                    Gate::NeedsConfirmation(warning) => return self.send(AppEvent::Confirm(warning)),
                };
                match self.session.delete_server_backup(&id).await {
                    Ok(_) => {
                        let mid = self.backups.apply_deleted(&id, Instant::now());
                        self.notify_backup(mid);
                        self.send(AppEvent::Backups(self.backups.backups().to_vec()));
                    }
                    Err(e) => {
                        self.backups.fail(&e);
                        self.fail(&e);
                    }
                }
            }
            AppCommand::DbStatus => {
                self.enter(Screen::Database);
                if !self.mount_database().await {
                    let ticket = self.database.refresh_status();
                    let result = self.session.database_status().await;
                    self.database.complete_status(ticket, result);
                }
                self.emit_status();
            }
            AppCommand::DbUpload { file } => self.upload_database(file.as_deref(), false).await,
            AppCommand::DbUploadExcel { file } => self.upload_database(file.as_deref(), true).await,
            AppCommand::DbInit => {
                self.enter(Screen::Database);
                self.mount_database().await;
                match self.session.initialize_database().await {
                    Ok(summary) => {
                        self.database.apply_summary(summary);
                        self.emit_summary();
                        self.reload_status().await;
                    }
                    Err(e) => {
                        self.database.fail(&e);
                        self.fail(&e);
                    }
                }
            }
            AppCommand::DbExport => {
                self.enter(Screen::Database);
                self.mount_database().await;
                if let Err(e) = self.database.prepare_export() {
                    return self.fail(&e);
                }
                match self.session.export_database().await {
                    Ok(download) => {
                        if let Some(path) = self.save(&download).await {
                            self.database.apply_exported(path);
                            info!("{} 数据库已导出 {:?}", self, self.database.exported());
                        }
                    }
                    Err(e) => {
                        self.database.fail(&e);
                        self.fail(&e);
                    }
                }
            }
            AppCommand::AuthLogin => match &self.gate {
                Some(gate) => match gate.sign_in().await {
                    Ok(()) => self.send(AppEvent::Message("登录成功".to_string())),
                    Err(e) => self.send(AppEvent::Error(format!("登录失败: {}", e))),
                },
                None => self.send(AppEvent::Error("未启用登录 (FORMULARY_AUTH)".to_string())),
            },
            AppCommand::AuthLogout => match &self.gate {
                Some(gate) => {
                    gate.sign_out().await;
                    self.send(AppEvent::Message("已退出登录".to_string()));
                }
                None => self.send(AppEvent::Error("未启用登录 (FORMULARY_AUTH)".to_string())),
            },
            AppCommand::AuthStatus => {
                let text = match &self.gate {
                    Some(gate) => format!("登录状态: {:?}", gate.state().await),
                    None => "未启用登录".to_string(),
                };
                self.send(AppEvent::Log(text));
            }
            AppCommand::Help => self.send(AppEvent::Log(HELP.to_string())),
            AppCommand::Quit => self.send(AppEvent::Message("收到退出命令".to_string())),
            AppCommand::Unknown(msg) => {
                if !msg.is_empty() {
                    self.send(AppEvent::Error(msg));
                }
            }
        }
    }

    pub fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Formulas(ticket, result) => {
                if self.formulas.complete(ticket, result) {
                    self.emit_formulas(FormulaSource::List);
                }
            }
            Completion::Search(ticket, result) => {
                if self.search.complete(ticket, result) {
                    self.emit_formulas(FormulaSource::Search);
                }
            }
            Completion::Ingredients(ticket, result) => {
                if self.ingredients.complete(ticket, result) {
                    self.emit_ingredients();
                }
            }
            Completion::Aliases(ticket, ingredient_id, result) => {
                if self.editor.complete_list(ticket, result)
                    && self.editor.selected_id() == Some(ingredient_id)
                {
                    match self.editor.error() {
                        Some(e) => self.send(AppEvent::Error(e.to_string())),
                        None => self.emit_aliases(),
                    }
                }
            }
            Completion::Debounce(token) => {
                if let Some(fetch) = self.ingredients.debounce_elapsed(token) {
                    self.spawn_ingredients(fetch);
                }
            }
            Completion::Expire(notice, id) => {
                let cleared = match notice {
                    Notice::Alias => self.editor.expire(id),
                    Notice::Backup => self.backups.expire(id),
                };
                if cleared {
                    debug!("{} 提示已清除 {:?}", self, notice);
                }
            }
        }
    }

    async fn add_alias(&mut self, text: &str) {
        let (ingredient_id, alias) = match self.editor.prepare_add(text) {
            Ok(v) => v,
            Err(e) => return self.fail(&e),
        };
        match self.session.add_alias(ingredient_id, &alias).await {
            Ok(record) => {
                let added = record.alias.clone();
                if let Some(mid) = self.editor.apply_added(ingredient_id, record, Instant::now()) {
                    self.ingredients
                        .patch_aliases(ingredient_id, |aliases| aliases.push(added));
                    self.notify_alias(mid);
                    self.emit_aliases();
                }
            }
            Err(e) => {
                self.editor.fail(&e);
                self.fail(&e);
            }
        }
    }

    async fn delete_alias(&mut self, alias_id: i64, confirmed: bool) {
        let alias_id = match self.editor.prepare_delete(alias_id, confirmed) {
            Gate::Proceed(id) => id,
            Gate::NeedsConfirmation(warning) => return self.send(AppEvent::Confirm(warning)),
        };
        match self.session.delete_alias(alias_id).await {
            Ok(()) => {
                let (removed, mid) = self.editor.apply_deleted(alias_id, Instant::now());
                if let (Some(text), Some(id)) = (removed, self.editor.selected_id()) {
                    self.ingredients
                        .patch_aliases(id, |aliases| aliases.retain(|a| *a != text));
                }
                self.notify_alias(mid);
                self.emit_aliases();
            }
            Err(e) => {
                self.editor.fail(&e);
                self.fail(&e);
            }
        }
    }

    async fn upload_database(&mut self, file: Option<&Path>, excel: bool) {
        self.enter(Screen::Database);
        self.mount_database().await;
        let path = match self.database.prepare_upload(file) {
            Ok(p) => p,
            Err(e) => return self.fail(&e),
        };
        let mime = if excel { MIME_XLSX } else { MIME_JSON };
        let Some(upload) = self.read_upload(&path, mime).await else {
            return;
        };
        let result = if excel {
            self.session.upload_excel(upload).await
        } else {
            self.session.upload_database(upload).await
        };
        match result {
            Ok(summary) => {
                self.database.apply_summary(summary);
                self.emit_summary();
                self.reload_status().await;
            }
            Err(e) => {
                self.database.fail(&e);
                self.fail(&e);
            }
        }
    }

    /// 首次进入数据库页时拉一次状态；返回是否刚刚拉取
    async fn mount_database(&mut self) -> bool {
        let Some(ticket) = self.database.mount() else {
            return false;
        };
        let result = self.session.database_status().await;
        self.database.complete_status(ticket, result);
        true
    }

    async fn reload_status(&mut self) {
        let ticket = self.database.refresh_status();
        let result = self.session.database_status().await;
        self.database.complete_status(ticket, result);
        self.emit_status();
    }

    async fn load_backups(&mut self) {
        let ticket = self.backups.load();
        let result = self.session.list_server_backups().await;
        self.backups.complete_list(ticket, result);
        match self.backups.error() {
            Some(e) => self.send(AppEvent::Error(e.to_string())),
            None => self.send(AppEvent::Backups(self.backups.backups().to_vec())),
        }
    }

    /// 批量导入/恢复后刷新选中原料的别名和原料列表
    fn refresh_after_bulk(&mut self) {
        if let Some((ticket, id)) = self.editor.reload() {
            self.spawn_aliases(ticket, id);
        }
        let fetch = self.ingredients.refresh();
        self.spawn_ingredients(fetch);
    }

    fn resolve_exclusions(&self, filters: &mut FilterState) {
        for ex in filters.exclusions.iter_mut() {
            if ex.resolved_name().is_some() {
                continue;
            }
            match ex.id.and_then(|id| self.ingredients.find(id)) {
                Some(ing) => ex.name = ing.name.clone(),
                None => {
                    warn!("{} 无法解析排除原料 {:?}", self, ex.id);
                    self.send(AppEvent::Log(format!(
                        "排除条件 #{} 不在当前原料列表中，已忽略",
                        ex.id.unwrap_or_default()
                    )));
                }
            }
        }
    }

    async fn read_upload(&self, path: &Path, mime: &str) -> Option<UploadFile> {
        match UploadFile::from_path(path, mime).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("{} 读取上传文件失败 {}: {}", self, path.display(), e);
                self.send(AppEvent::Error(format!(
                    "无法读取文件 {}: {}",
                    path.display(),
                    e
                )));
                None
            }
        }
    }

    async fn save(&self, download: &Download) -> Option<PathBuf> {
        match download.save_to(&self.download_dir).await {
            Ok(path) => {
                info!("{} 已保存下载 {}", self, path.display());
                self.send(AppEvent::Saved(path.clone()));
                Some(path)
            }
            Err(e) => {
                warn!("{} 保存下载失败: {}", self, e);
                self.send(AppEvent::Error(format!(
                    "无法保存 {}: {}",
                    download.file_name, e
                )));
                None
            }
        }
    }

    async fn deliver(&self, result: Result<Download, ApiError>) {
        match result {
            Ok(download) => {
                self.save(&download).await;
            }
            Err(e) => self.fail(&e),
        }
    }

    fn notify_alias(&self, id: MessageId) {
        if let Some(text) = self.editor.success_at(Instant::now()) {
            self.send(AppEvent::Message(text.to_string()));
        }
        self.schedule_expire(Notice::Alias, id);
    }

    fn notify_backup(&self, id: MessageId) {
        if let Some(text) = self.backups.message_at(Instant::now()) {
            self.send(AppEvent::Message(text.to_string()));
        }
        self.schedule_expire(Notice::Backup, id);
    }

    fn schedule_expire(&self, notice: Notice, id: MessageId) {
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(MESSAGE_TTL).await;
            let _ = done.send(Completion::Expire(notice, id));
        });
    }

    fn spawn_formulas(&self, source: FormulaSource, fetch: PendingFetch) {
        let session = self.session.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let PendingFetch { ticket, request } = fetch;
            let msg = match source {
                FormulaSource::List => Completion::Formulas(ticket, session.list_formulas(request).await),
                FormulaSource::Search => {
                    Completion::Search(ticket, session.search_formulas(request).await)
                }
            };
            let _ = done.send(msg);
        });
    }

    fn spawn_ingredients(&self, fetch: PendingFetch) {
        let session = self.session.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = session.list_ingredients(fetch.request).await;
            let _ = done.send(Completion::Ingredients(fetch.ticket, result));
        });
    }

    fn spawn_aliases(&self, ticket: Ticket, ingredient_id: i64) {
        let session = self.session.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = session.list_aliases(ingredient_id).await;
            let _ = done.send(Completion::Aliases(ticket, ingredient_id, result));
        });
    }

    fn emit_formulas(&self, source: FormulaSource) {
        let (results, mode) = match source {
            FormulaSource::List => (self.formulas.results(), self.formulas.mode()),
            FormulaSource::Search => (self.search.results(), self.search.mode()),
        };
        if let Some(e) = results.error() {
            self.send(AppEvent::Error(e.to_string()));
        }
        if let Some(page) = results.data() {
            self.send(AppEvent::Formulas {
                source,
                page: page.clone(),
                mode,
            });
        }
    }

    fn emit_ingredients(&self) {
        let results = self.ingredients.view().results();
        if let Some(e) = results.error() {
            self.send(AppEvent::Error(format!("Failed to load ingredients: {}", e)));
        }
        if let Some(page) = results.data() {
            self.send(AppEvent::Ingredients {
                page: page.clone(),
                term: self.ingredients.term().to_string(),
                selected: self.editor.selected_id(),
            });
        }
    }

    fn emit_aliases(&self) {
        if let Some(ingredient) = self.editor.selected() {
            self.send(AppEvent::Aliases {
                ingredient: ingredient.clone(),
                aliases: self.editor.aliases().to_vec(),
            });
        }
    }

    fn emit_summary(&self) {
        if let Some(summary) = self.database.summary() {
            self.send(AppEvent::Summary(summary.clone()));
        }
    }

    /// 刷新失败时照样报错，旧状态保留显示
    fn emit_status(&self) {
        if let Some(e) = self.database.error() {
            self.send(AppEvent::Error(e.to_string()));
        }
        if let Some(status) = self.database.status() {
            self.send(AppEvent::Status {
                status: status.clone(),
                export_enabled: self.database.export_enabled(),
            });
        }
    }
}

impl std::fmt::Display for AppService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<AppService [{:?}]>", self.screen)
    }
}
