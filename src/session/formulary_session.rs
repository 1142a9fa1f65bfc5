use super::download::Download;
use super::dto::*;
use super::transport::{ApiRequest, ApiResponse, ApiTransport, RequestDescriptor, UploadFile};
use super::urls::*;
use crate::error::ApiError;
use log::info;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// 配方库会话，封装所有 REST 接口
///
/// 每个方法对应一个接口，返回类型化结果；失败统一为 [`ApiError`]，
/// 服务端 `error` 字段原样透出，缺失时用各接口自己的兜底文本。
pub struct FormularySession {
    transport: Arc<dyn ApiTransport>,
    label: String,
}

impl FormularySession {
    pub fn new(transport: Arc<dyn ApiTransport>, label: impl Into<String>) -> Self {
        Self {
            transport,
            label: label.into(),
        }
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let fallback = request.fallback.clone();
        let resp = self.transport.execute(request).await?;
        resp.into_success(&fallback)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    // ---------- 配方 ----------

    /// 配方列表（`/formulas`），描述由调用方构造
    pub async fn list_formulas(&self, target: RequestDescriptor) -> Result<FormulaPage, ApiError> {
        let url = target.to_url_path();
        let page = self
            .send_json(ApiRequest::get(target, "Failed to fetch formulas"))
            .await?;
        info!("{} list_formulas(...) [{}]", self, url);
        Ok(page)
    }

    /// 多条件搜索（`/formulas/search`）
    pub async fn search_formulas(
        &self,
        target: RequestDescriptor,
    ) -> Result<FormulaPage, ApiError> {
        let url = target.to_url_path();
        let page = self
            .send_json(ApiRequest::get(target, "Failed to search formulas"))
            .await?;
        info!("{} search_formulas(...) [{}]", self, url);
        Ok(page)
    }

    pub async fn get_formula(&self, object_number: &str) -> Result<FormulaDetail, ApiError> {
        let url = url_formula(object_number);
        let detail = self
            .send_json(ApiRequest::get(
                RequestDescriptor::new(url.clone()),
                "Failed to fetch formula",
            ))
            .await?;
        info!("{} get_formula(...) [{}]", self, url);
        Ok(detail)
    }

    /// 导出搜索结果为表格文件
    pub async fn export_formulas(&self, target: RequestDescriptor) -> Result<Download, ApiError> {
        let url = target.to_url_path();
        let resp = self
            .send(ApiRequest::get(target, "Failed to export formulas"))
            .await?;
        info!("{} export_formulas(...) [{}]", self, url);
        Ok(Download::from_response(resp, "formulas_export.xlsx"))
    }

    pub async fn formula_pdf(&self, object_number: &str) -> Result<Download, ApiError> {
        let url = url_formula_pdf(object_number);
        let resp = self
            .send(ApiRequest::get(
                RequestDescriptor::new(url.clone()),
                "Failed to download PDF",
            ))
            .await?;
        info!("{} formula_pdf(...) [{}]", self, url);
        Ok(Download::from_response(
            resp,
            &format!("formula_{}.pdf", object_number),
        ))
    }

    pub async fn filter_options(&self) -> Result<FilterOptions, ApiError> {
        let opts = self
            .send_json(ApiRequest::get(
                RequestDescriptor::new(URL_FILTER_OPTIONS),
                "Failed to get filter options",
            ))
            .await?;
        info!("{} filter_options(...) [{}]", self, URL_FILTER_OPTIONS);
        Ok(opts)
    }

    // ---------- 原料与别名 ----------

    pub async fn list_ingredients(
        &self,
        target: RequestDescriptor,
    ) -> Result<IngredientPage, ApiError> {
        let url = target.to_url_path();
        let page = self
            .send_json(ApiRequest::get(target, "Failed to fetch ingredients"))
            .await?;
        info!("{} list_ingredients(...) [{}]", self, url);
        Ok(page)
    }

    pub async fn list_aliases(&self, ingredient_id: i64) -> Result<Vec<AliasRecord>, ApiError> {
        let url = url_ingredient_aliases(ingredient_id);
        let list: AliasList = self
            .send_json(ApiRequest::get(
                RequestDescriptor::new(url.clone()),
                "Failed to fetch aliases",
            ))
            .await?;
        info!("{} list_aliases(...) [{}]", self, url);
        Ok(list.aliases)
    }

    pub async fn add_alias(&self, ingredient_id: i64, alias: &str) -> Result<AliasRecord, ApiError> {
        let url = url_ingredient_aliases(ingredient_id);
        let body = serde_json::to_value(NewAlias { alias })
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        let record = self
            .send_json(
                ApiRequest::post(RequestDescriptor::new(url.clone()), "Failed to add alias")
                    .json(body),
            )
            .await?;
        info!("{} add_alias(...) [{}]", self, url);
        Ok(record)
    }

    pub async fn delete_alias(&self, alias_id: i64) -> Result<(), ApiError> {
        let url = url_alias(alias_id);
        self.send(ApiRequest::delete(
            RequestDescriptor::new(url.clone()),
            "Failed to delete alias",
        ))
        .await?;
        info!("{} delete_alias(...) [{}]", self, url);
        Ok(())
    }

    pub async fn import_aliases(&self, csv: UploadFile) -> Result<AliasImportResult, ApiError> {
        let result = self
            .send_json(
                ApiRequest::post(
                    RequestDescriptor::new(URL_ALIASES_IMPORT),
                    "Failed to import aliases",
                )
                .file(csv),
            )
            .await?;
        info!("{} import_aliases(...) [{}]", self, URL_ALIASES_IMPORT);
        Ok(result)
    }

    pub async fn export_aliases(&self) -> Result<Download, ApiError> {
        let resp = self
            .send(ApiRequest::get(
                RequestDescriptor::new(URL_ALIASES_EXPORT),
                "Failed to export aliases",
            ))
            .await?;
        info!("{} export_aliases(...) [{}]", self, URL_ALIASES_EXPORT);
        Ok(Download::from_response(resp, "ingredient_aliases.csv"))
    }

    pub async fn backup_aliases(&self) -> Result<Download, ApiError> {
        let resp = self
            .send(ApiRequest::get(
                RequestDescriptor::new(URL_ALIASES_BACKUP),
                "Failed to backup aliases",
            ))
            .await?;
        info!("{} backup_aliases(...) [{}]", self, URL_ALIASES_BACKUP);
        Ok(Download::from_response(resp, "aliases_backup.json"))
    }

    pub async fn restore_aliases(&self, json: UploadFile) -> Result<AliasRestoreResult, ApiError> {
        let result = self
            .send_json(
                ApiRequest::post(
                    RequestDescriptor::new(URL_ALIASES_RESTORE),
                    "Failed to restore aliases",
                )
                .file(json),
            )
            .await?;
        info!("{} restore_aliases(...) [{}]", self, URL_ALIASES_RESTORE);
        Ok(result)
    }

    // ---------- 服务端备份 ----------

    pub async fn create_server_backup(&self) -> Result<ServerBackupCreated, ApiError> {
        let created = self
            .send_json(ApiRequest::post(
                RequestDescriptor::new(URL_SERVER_BACKUP),
                "Failed to create server backup",
            ))
            .await?;
        info!("{} create_server_backup(...) [{}]", self, URL_SERVER_BACKUP);
        Ok(created)
    }

    pub async fn list_server_backups(&self) -> Result<Vec<ServerBackup>, ApiError> {
        let list: ServerBackupList = self
            .send_json(ApiRequest::get(
                RequestDescriptor::new(URL_SERVER_BACKUPS),
                "Failed to list server backups",
            ))
            .await?;
        info!("{} list_server_backups(...) [{}]", self, URL_SERVER_BACKUPS);
        Ok(list.backups)
    }

    pub async fn restore_server_backup(
        &self,
        backup_id: &str,
        clear_existing: bool,
    ) -> Result<ServerRestoreResult, ApiError> {
        let target =
            RequestDescriptor::new(url_server_restore(backup_id)).param("clear", clear_existing);
        let url = target.to_url_path();
        let result = self
            .send_json(ApiRequest::post(target, "Failed to restore server backup"))
            .await?;
        info!("{} restore_server_backup(...) [{}]", self, url);
        Ok(result)
    }

    pub async fn delete_server_backup(&self, backup_id: &str) -> Result<MessageResponse, ApiError> {
        let url = url_server_backup(backup_id);
        let resp = self
            .send(ApiRequest::delete(
                RequestDescriptor::new(url.clone()),
                "Failed to delete server backup",
            ))
            .await?;
        info!("{} delete_server_backup(...) [{}]", self, url);
        // 删除接口可能返回空响应体
        Ok(resp.json().unwrap_or_default())
    }

    // ---------- 数据库管理 ----------

    pub async fn upload_database(&self, file: UploadFile) -> Result<ImportSummary, ApiError> {
        let summary = self
            .send_json(
                ApiRequest::post(
                    RequestDescriptor::new(URL_UPLOAD_DATABASE),
                    "Failed to upload database",
                )
                .file(file),
            )
            .await?;
        info!("{} upload_database(...) [{}]", self, URL_UPLOAD_DATABASE);
        Ok(summary)
    }

    pub async fn upload_excel(&self, file: UploadFile) -> Result<ImportSummary, ApiError> {
        let summary = self
            .send_json(
                ApiRequest::post(
                    RequestDescriptor::new(URL_UPLOAD_EXCEL),
                    "Failed to upload Excel database",
                )
                .file(file),
            )
            .await?;
        info!("{} upload_excel(...) [{}]", self, URL_UPLOAD_EXCEL);
        Ok(summary)
    }

    pub async fn initialize_database(&self) -> Result<ImportSummary, ApiError> {
        let summary = self
            .send_json(ApiRequest::post(
                RequestDescriptor::new(URL_INITIALIZE_DATABASE),
                "Failed to initialize database",
            ))
            .await?;
        info!("{} initialize_database(...) [{}]", self, URL_INITIALIZE_DATABASE);
        Ok(summary)
    }

    /// 导出整个数据库（JSON）
    pub async fn export_database(&self) -> Result<Download, ApiError> {
        let resp = self
            .send(ApiRequest::get(
                RequestDescriptor::new(URL_EXPORT_DATABASE),
                "Failed to export database",
            ))
            .await?;
        info!("{} export_database(...) [{}]", self, URL_EXPORT_DATABASE);
        Ok(Download::from_response(resp, "formula_database.json"))
    }

    pub async fn database_status(&self) -> Result<DatabaseStatus, ApiError> {
        let status = self
            .send_json(ApiRequest::get(
                RequestDescriptor::new(URL_DATABASE_STATUS),
                "Failed to get database status",
            ))
            .await?;
        info!("{} database_status(...) [{}]", self, URL_DATABASE_STATUS);
        Ok(status)
    }
}

impl std::fmt::Display for FormularySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<FormularySession [{}]>", self.label)
    }
}

impl std::fmt::Debug for FormularySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<FormularySession [{}]>", self.label)
    }
}
