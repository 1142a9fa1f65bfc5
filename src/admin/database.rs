use crate::error::ApiError;
use crate::search::result_view::{ResultView, Ticket};
use crate::session::dto::{DatabaseStatus, ImportSummary};
use std::path::{Path, PathBuf};

pub const SELECT_UPLOAD: &str = "Please select a file to upload";
pub const NOTHING_TO_EXPORT: &str = "Database is empty, nothing to export";

/// 数据库管理面板
///
/// 状态只在首次挂载时拉取一次；导入/初始化成功后由调用方决定是否刷新。
#[derive(Debug, Default)]
pub struct DatabasePanel {
    status: ResultView<DatabaseStatus>,
    mounted: bool,
    summary: Option<ImportSummary>,
    exported: Option<PathBuf>,
    error: Option<String>,
}

impl DatabasePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 第一次挂载返回状态请求的序号，之后返回 None
    pub fn mount(&mut self) -> Option<Ticket> {
        if self.mounted {
            return None;
        }
        self.mounted = true;
        Some(self.status.begin())
    }

    pub fn refresh_status(&mut self) -> Ticket {
        self.mounted = true;
        self.status.begin()
    }

    pub fn complete_status(
        &mut self,
        ticket: Ticket,
        result: Result<DatabaseStatus, ApiError>,
    ) -> bool {
        let accepted = self.status.complete(ticket, result);
        if accepted {
            self.error = self.status.error().map(str::to_string);
        }
        accepted
    }

    pub fn status(&self) -> Option<&DatabaseStatus> {
        self.status.data()
    }

    /// 空库时禁用导出
    pub fn export_enabled(&self) -> bool {
        self.status().is_some_and(|s| s.has_data)
    }

    pub fn summary(&self) -> Option<&ImportSummary> {
        self.summary.as_ref()
    }

    pub fn exported(&self) -> Option<&Path> {
        self.exported.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn prepare_upload(&mut self, file: Option<&Path>) -> Result<PathBuf, ApiError> {
        self.summary = None;
        match file.filter(|p| !p.as_os_str().is_empty()) {
            Some(p) => {
                self.error = None;
                Ok(p.to_path_buf())
            }
            None => {
                self.error = Some(SELECT_UPLOAD.to_string());
                Err(ApiError::validation(SELECT_UPLOAD))
            }
        }
    }

    pub fn prepare_export(&mut self) -> Result<(), ApiError> {
        if self.export_enabled() {
            self.error = None;
            Ok(())
        } else {
            self.error = Some(NOTHING_TO_EXPORT.to_string());
            Err(ApiError::validation(NOTHING_TO_EXPORT))
        }
    }

    pub fn apply_summary(&mut self, summary: ImportSummary) {
        self.error = None;
        self.summary = Some(summary);
    }

    pub fn apply_exported(&mut self, path: PathBuf) {
        self.error = None;
        self.exported = Some(path);
    }

    /// 服务端错误原样展示
    pub fn fail(&mut self, err: &ApiError) {
        self.error = Some(err.user_message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::dto::DatabaseCounts;

    fn status(has_data: bool) -> DatabaseStatus {
        DatabaseStatus {
            has_data,
            status: None,
            counts: Some(DatabaseCounts {
                ingredients: if has_data { 12 } else { 0 },
                formulas: if has_data { 3 } else { 0 },
                formula_ingredients: if has_data { 30 } else { 0 },
            }),
        }
    }

    #[test]
    fn status_is_fetched_once_on_mount() {
        let mut panel = DatabasePanel::new();
        assert!(panel.mount().is_some());
        assert!(panel.mount().is_none());
    }

    #[test]
    fn export_follows_has_data() {
        let mut panel = DatabasePanel::new();
        assert!(!panel.export_enabled());

        let t = panel.mount().unwrap();
        panel.complete_status(t, Ok(status(false)));
        assert!(!panel.export_enabled());
        assert!(panel.prepare_export().unwrap_err().is_validation());

        let t = panel.refresh_status();
        panel.complete_status(t, Ok(status(true)));
        assert!(panel.export_enabled());
        assert!(panel.prepare_export().is_ok());
    }

    #[test]
    fn failed_refresh_keeps_status_and_reports_error() {
        let mut panel = DatabasePanel::new();
        let t = panel.mount().unwrap();
        panel.complete_status(t, Ok(status(true)));

        let t = panel.refresh_status();
        panel.complete_status(
            t,
            Err(ApiError::Server {
                status: 500,
                message: "database locked".into(),
            }),
        );
        assert_eq!(panel.error(), Some("database locked"));
        assert!(panel.export_enabled());

        let t = panel.refresh_status();
        panel.complete_status(t, Ok(status(false)));
        assert_eq!(panel.error(), None);
        assert!(!panel.export_enabled());
    }

    #[test]
    fn upload_requires_file_and_keeps_server_error_verbatim() {
        let mut panel = DatabasePanel::new();
        assert_eq!(
            panel.prepare_upload(None).unwrap_err().user_message(),
            SELECT_UPLOAD
        );
        assert_eq!(panel.error(), Some(SELECT_UPLOAD));

        panel.prepare_upload(Some(Path::new("db.json"))).unwrap();
        panel.fail(&ApiError::Server {
            status: 400,
            message: "Invalid JSON structure: missing 'formulas'".into(),
        });
        assert_eq!(panel.error(), Some("Invalid JSON structure: missing 'formulas'"));
    }
}
