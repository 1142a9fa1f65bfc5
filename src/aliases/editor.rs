use super::confirm::Gate;
use super::message::{MessageId, TransientMessage};
use crate::error::ApiError;
use crate::search::result_view::{ResultView, Ticket};
use crate::session::dto::{AliasImportResult, AliasRecord, AliasRestoreResult, Ingredient};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const EMPTY_ALIAS: &str = "Alias cannot be empty";
pub const ALIAS_ADDED: &str = "Alias added successfully";
pub const ALIAS_DELETED: &str = "Alias deleted successfully";
pub const DELETE_ALIAS_WARNING: &str = "Are you sure you want to delete this alias?";
pub const SELECT_CSV: &str = "Please select a CSV file to import";
pub const SELECT_JSON: &str = "Please select a JSON file to restore";
pub const SELECT_INGREDIENT: &str = "Please select an ingredient first";

/// 别名编辑器
///
/// 只在服务端确认之后修改本地状态：新增追加到列表末尾，删除从列表移除，
/// 两种情况都同步选中原料的别名镜像。
#[derive(Debug, Default)]
pub struct AliasEditor {
    selected: Option<Ingredient>,
    aliases: ResultView<Vec<AliasRecord>>,
    error: Option<String>,
    success: TransientMessage,
    import_result: Option<AliasImportResult>,
    restore_result: Option<AliasRestoreResult>,
}

impl AliasEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 选中原料；清空错误和提示，开始加载其别名
    pub fn select(&mut self, ingredient: Ingredient) -> Ticket {
        self.selected = Some(ingredient);
        self.error = None;
        self.success.clear();
        self.aliases = ResultView::new();
        self.aliases.begin()
    }

    pub fn selected(&self) -> Option<&Ingredient> {
        self.selected.as_ref()
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.selected.as_ref().map(|i| i.id)
    }

    pub fn aliases(&self) -> &[AliasRecord] {
        self.aliases.data().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success_at(&self, now: Instant) -> Option<&str> {
        self.success.text_at(now)
    }

    pub fn import_result(&self) -> Option<&AliasImportResult> {
        self.import_result.as_ref()
    }

    pub fn restore_result(&self) -> Option<&AliasRestoreResult> {
        self.restore_result.as_ref()
    }

    /// 重新加载选中原料的别名（导入/恢复之后）
    pub fn reload(&mut self) -> Option<(Ticket, i64)> {
        let id = self.selected_id()?;
        Some((self.aliases.begin(), id))
    }

    pub fn complete_list(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<AliasRecord>, ApiError>,
    ) -> bool {
        let accepted = self.aliases.complete(ticket, result);
        if accepted {
            self.error = self.aliases.error().map(str::to_string);
        }
        accepted
    }

    /// 新增前的本地校验，返回 (原料 id, 别名)
    pub fn prepare_add(&mut self, text: &str) -> Result<(i64, String), ApiError> {
        let result = match self.selected_id() {
            None => Err(ApiError::validation(SELECT_INGREDIENT)),
            Some(_) if text.trim().is_empty() => Err(ApiError::validation(EMPTY_ALIAS)),
            Some(id) => Ok((id, text.to_string())),
        };
        match &result {
            Ok(_) => self.error = None,
            Err(e) => self.error = Some(e.user_message()),
        }
        result
    }

    pub fn apply_added(
        &mut self,
        ingredient_id: i64,
        record: AliasRecord,
        now: Instant,
    ) -> Option<MessageId> {
        // 响应回来前已切换原料时不改本地列表
        if self.selected_id() != Some(ingredient_id) {
            return None;
        }
        if let Some(ing) = self.selected.as_mut() {
            ing.aliases.push(record.alias.clone());
        }
        match self.aliases.data_mut() {
            Some(list) => list.push(record),
            None => {
                let t = self.aliases.begin();
                self.aliases.complete(t, Ok(vec![record]));
            }
        }
        Some(self.success.show(ALIAS_ADDED, now))
    }

    pub fn prepare_delete(&self, alias_id: i64, confirmed: bool) -> Gate<i64> {
        Gate::check(confirmed, DELETE_ALIAS_WARNING, alias_id)
    }

    /// 删除成功，返回被删别名的文本供其他列表同步
    pub fn apply_deleted(&mut self, alias_id: i64, now: Instant) -> (Option<String>, MessageId) {
        let removed = self.aliases.data_mut().and_then(|list| {
            let pos = list.iter().position(|a| a.id == alias_id)?;
            Some(list.remove(pos).alias)
        });
        if let (Some(text), Some(ing)) = (&removed, self.selected.as_mut()) {
            ing.aliases.retain(|a| a != text);
        }
        (removed, self.success.show(ALIAS_DELETED, now))
    }

    pub fn expire(&mut self, id: MessageId) -> bool {
        self.success.expire(id)
    }

    /// 服务端或网络失败：状态不变，只记录错误文本
    pub fn fail(&mut self, err: &ApiError) {
        self.error = Some(err.user_message());
    }

    pub fn prepare_import(&mut self, file: Option<&Path>) -> Result<PathBuf, ApiError> {
        let path = self.require_file(file, SELECT_CSV)?;
        self.import_result = None;
        Ok(path)
    }

    pub fn apply_import(&mut self, result: AliasImportResult) {
        self.import_result = Some(result);
    }

    pub fn prepare_restore(&mut self, file: Option<&Path>) -> Result<PathBuf, ApiError> {
        let path = self.require_file(file, SELECT_JSON)?;
        self.restore_result = None;
        Ok(path)
    }

    pub fn apply_restore(&mut self, result: AliasRestoreResult) {
        self.restore_result = Some(result);
    }

    fn require_file(&mut self, file: Option<&Path>, missing: &str) -> Result<PathBuf, ApiError> {
        match file.filter(|p| !p.as_os_str().is_empty()) {
            Some(p) => {
                self.error = None;
                Ok(p.to_path_buf())
            }
            None => {
                self.error = Some(missing.to_string());
                Err(ApiError::validation(missing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn aspirin(aliases: &[&str]) -> Ingredient {
        Ingredient {
            id: 3,
            name: "Aspirin".into(),
            fing_item_number: Some("100200".into()),
            description: None,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn editor_with(records: Vec<AliasRecord>) -> AliasEditor {
        let names: Vec<&str> = records.iter().map(|r| r.alias.as_str()).collect();
        let mut editor = AliasEditor::new();
        let t = editor.select(aspirin(&names));
        editor.complete_list(t, Ok(records.clone()));
        editor
    }

    #[test]
    fn add_appends_and_message_expires() {
        let mut editor = editor_with(Vec::new());
        let (id, text) = editor.prepare_add("ASA").unwrap();
        assert_eq!(id, 3);

        let t0 = Instant::now();
        editor
            .apply_added(id, AliasRecord { id: 7, alias: text }, t0)
            .unwrap();
        assert_eq!(
            editor.aliases(),
            &[AliasRecord {
                id: 7,
                alias: "ASA".into()
            }]
        );
        assert_eq!(editor.selected().unwrap().aliases, vec!["ASA"]);
        assert_eq!(editor.success_at(t0), Some(ALIAS_ADDED));
        assert_eq!(editor.success_at(t0 + Duration::from_millis(3000)), None);
    }

    #[test]
    fn reloaded_list_clears_earlier_error() {
        let mut editor = editor_with(Vec::new());
        editor.fail(&ApiError::Server {
            status: 409,
            message: "Alias already exists".into(),
        });
        assert_eq!(editor.error(), Some("Alias already exists"));

        let (t, id) = editor.reload().unwrap();
        assert_eq!(id, 3);
        assert!(editor.complete_list(
            t,
            Ok(vec![AliasRecord {
                id: 9,
                alias: "ASA".into()
            }])
        ));
        assert_eq!(editor.error(), None);
        assert_eq!(editor.aliases().len(), 1);
    }

    #[test]
    fn blank_alias_is_rejected_locally() {
        let mut editor = editor_with(Vec::new());
        let err = editor.prepare_add("   ").unwrap_err();
        assert_eq!(err, ApiError::Validation(EMPTY_ALIAS.into()));
        assert_eq!(editor.error(), Some(EMPTY_ALIAS));
        assert!(editor.aliases().is_empty());
    }

    #[test]
    fn delete_needs_confirmation() {
        let asa = AliasRecord {
            id: 7,
            alias: "ASA".into(),
        };
        let mut editor = editor_with(vec![asa.clone()]);

        assert_eq!(
            editor.prepare_delete(7, false),
            Gate::NeedsConfirmation(DELETE_ALIAS_WARNING.into())
        );
        assert_eq!(editor.aliases(), &[asa]);
        assert_eq!(editor.selected().unwrap().aliases, vec!["ASA"]);

        assert_eq!(editor.prepare_delete(7, true), Gate::Proceed(7));
        let (removed, _) = editor.apply_deleted(7, Instant::now());
        assert_eq!(removed.as_deref(), Some("ASA"));
        assert!(editor.aliases().is_empty());
        assert!(editor.selected().unwrap().aliases.is_empty());
    }

    #[test]
    fn failed_delete_keeps_state() {
        let mut editor = editor_with(vec![AliasRecord {
            id: 7,
            alias: "ASA".into(),
        }]);
        editor.fail(&ApiError::Server {
            status: 404,
            message: "Alias not found".into(),
        });
        assert_eq!(editor.error(), Some("Alias not found"));
        assert_eq!(editor.aliases().len(), 1);
    }

    #[test]
    fn switching_ingredient_ignores_late_add() {
        let mut editor = editor_with(Vec::new());
        let mut other = aspirin(&[]);
        other.id = 9;
        editor.select(other);
        assert!(editor
            .apply_added(
                3,
                AliasRecord {
                    id: 1,
                    alias: "ASA".into()
                },
                Instant::now()
            )
            .is_none());
        assert!(editor.selected().unwrap().aliases.is_empty());
    }

    #[test]
    fn import_and_restore_require_a_file() {
        let mut editor = AliasEditor::new();
        assert_eq!(
            editor.prepare_import(None).unwrap_err().user_message(),
            SELECT_CSV
        );
        assert_eq!(
            editor.prepare_restore(Some(Path::new(""))).unwrap_err().user_message(),
            SELECT_JSON
        );
        assert_eq!(editor.error(), Some(SELECT_JSON));
        assert!(editor.prepare_import(Some(Path::new("aliases.csv"))).is_ok());
        assert_eq!(editor.error(), None);
    }
}
