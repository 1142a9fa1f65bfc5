//! API 路径（相对于配置的 `/api` 基础地址）

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// RFC 3986 unreserved 以外的字符全部转义
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// 配方相关路径
pub const URL_FORMULAS: &str = "/formulas";
pub const URL_FORMULAS_SEARCH: &str = "/formulas/search";
pub const URL_FORMULAS_EXPORT: &str = "/formulas/export";
pub fn url_formula(object_number: &str) -> String {
    format!("{}/{}", URL_FORMULAS, segment(object_number))
}
pub fn url_formula_pdf(object_number: &str) -> String {
    format!("{}/{}/pdf", URL_FORMULAS, segment(object_number))
}

pub const URL_FILTER_OPTIONS: &str = "/filter-options";

/// 原料与别名
pub const URL_INGREDIENTS: &str = "/ingredients";
pub fn url_ingredient_aliases(ingredient_id: i64) -> String {
    format!("{}/{}/aliases", URL_INGREDIENTS, ingredient_id)
}
pub fn url_alias(alias_id: i64) -> String {
    format!("/aliases/{}", alias_id)
}
pub const URL_ALIASES_IMPORT: &str = "/aliases/import";
pub const URL_ALIASES_EXPORT: &str = "/aliases/export";
pub const URL_ALIASES_BACKUP: &str = "/aliases/backup";
pub const URL_ALIASES_RESTORE: &str = "/aliases/restore";

/// 服务端备份
pub const URL_SERVER_BACKUP: &str = "/aliases/server-backup";
pub const URL_SERVER_BACKUPS: &str = "/aliases/server-backups";
pub fn url_server_backup(backup_id: &str) -> String {
    format!("{}/{}", URL_SERVER_BACKUP, segment(backup_id))
}
pub fn url_server_restore(backup_id: &str) -> String {
    format!("/aliases/server-restore/{}", segment(backup_id))
}

/// 数据库管理
pub const URL_UPLOAD_DATABASE: &str = "/upload-database";
pub const URL_UPLOAD_EXCEL: &str = "/upload-excel";
pub const URL_INITIALIZE_DATABASE: &str = "/initialize-database";
pub const URL_EXPORT_DATABASE: &str = "/export-database";
pub const URL_DATABASE_STATUS: &str = "/database-status";

/// 转义路径段或查询参数值
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

fn segment(raw: &str) -> String {
    encode_component(raw)
}
