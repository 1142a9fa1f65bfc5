use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// 分页信息，服务端返回什么就镜像什么
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Pagination {
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

fn first_page() -> u32 {
    1
}

/// 还没收到响应时停在第 1 页
impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            current_page: first_page(),
            pages: 0,
            total: 0,
            per_page: None,
            has_next: false,
            has_prev: false,
        }
    }
}

/// 列表/搜索结果中的原料用量
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IngredientUsage {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fing_item_number: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_expanded: Option<String>,
}

impl IngredientUsage {
    /// 展示用描述：优先扩展描述
    pub fn display_description(&self) -> &str {
        self.description_expanded
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.description.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FormulaSummary {
    pub id: i64,
    #[serde(default)]
    pub object_number: String,
    #[serde(default)]
    pub formulation_name: String,
    #[serde(default)]
    pub lifecycle_phase: Option<String>,
    #[serde(default)]
    pub formula_brand: Option<String>,
    #[serde(default)]
    pub sbu_category: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientUsage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FormulaPage {
    #[serde(default)]
    pub formulas: Vec<FormulaSummary>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// 配方详情
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FormulaDetail {
    pub id: i64,
    #[serde(default)]
    pub object_number: String,
    #[serde(default)]
    pub formulation_name: String,
    #[serde(default)]
    pub lifecycle_phase: Option<String>,
    #[serde(default)]
    pub formula_brand: Option<String>,
    #[serde(default)]
    pub sbu_category: Option<String>,
    #[serde(default)]
    pub dossier_type: Option<String>,
    #[serde(default)]
    pub regulatory_comments: Option<String>,
    #[serde(default)]
    pub general_comments: Option<String>,
    #[serde(default)]
    pub production_sites: Option<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub predecessor_formulation_number: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub successor_formulation_number: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientUsage>,
}

/// "A, B,,C" -> ["A", "B", "C"]；null 视为空
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(split_ids(raw.as_deref().unwrap_or("")))
}

pub fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// 筛选项（兼容 camelCase 与 snake_case）
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, rename = "lifecyclePhases", alias = "lifecycle_phases")]
    pub lifecycle_phases: Vec<String>,
    #[serde(default, rename = "productionSites", alias = "production_sites")]
    pub production_sites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Ingredient {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fing_item_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Ingredient {
    /// 搜索词命中的第一个别名（不区分大小写）
    pub fn matching_alias(&self, term: &str) -> Option<&str> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return None;
        }
        self.aliases
            .iter()
            .find(|a| a.to_lowercase().contains(&term))
            .map(|a| a.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IngredientPage {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AliasRecord {
    pub id: i64,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AliasList {
    #[serde(default)]
    pub aliases: Vec<AliasRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAlias<'a> {
    pub alias: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AliasImportResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub aliases_added: u64,
    #[serde(default)]
    pub errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AliasRestoreResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub aliases_restored: u64,
    #[serde(default)]
    pub aliases_skipped: u64,
}

/// 服务端备份条目
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerBackup {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub aliases_count: u64,
    #[serde(default)]
    pub size: u64,
}

/// 备份 id 可能是字符串也可能是数字
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected backup id: {}",
            other
        ))),
    }
}

/// 接受 RFC 3339 或不带时区的 ISO 时间（按 UTC 处理）
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y%m%d_%H%M%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, fmt) {
            return Ok(Some(naive.and_utc()));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerBackupList {
    #[serde(default)]
    pub backups: Vec<ServerBackup>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerBackupCreated {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "backup_id")]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub aliases_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerRestoreResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub aliases_restored: u64,
}

/// 通用 `{message}` 响应
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// 导入（JSON / Excel）与初始化的结果摘要，字段名在不同接口间不一致
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportSummary {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "ingredients_count")]
    pub ingredients_created: Option<u64>,
    #[serde(default, alias = "formulas_count")]
    pub formulas_created: Option<u64>,
    #[serde(default)]
    pub formula_ingredients_created: Option<u64>,
    #[serde(default)]
    pub errors: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatabaseCounts {
    #[serde(default)]
    pub ingredients: u64,
    #[serde(default)]
    pub formulas: u64,
    #[serde(default)]
    pub formula_ingredients: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatabaseStatus {
    #[serde(default)]
    pub has_data: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub counts: Option<DatabaseCounts>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_pagination_starts_on_first_page() {
        let p = Pagination::default();
        assert_eq!(p.current_page, 1);
        assert_eq!(p.pages, 0);
        assert!(!p.has_next && !p.has_prev);

        let parsed: Pagination = serde_json::from_value(json!({"total": 5})).unwrap();
        assert_eq!(parsed, Pagination { total: 5, ..Pagination::default() });
    }

    #[test]
    fn formula_detail_splits_relations() {
        let v = json!({
            "id": 1,
            "object_number": "100200",
            "formulation_name": "Cream",
            "predecessor_formulation_number": "A1, A2,,",
            "successor_formulation_number": null,
            "ingredients": [
                {"id": 3, "name": "Water", "amount": 70.5, "unit": "%",
                 "description": "Aqua", "description_expanded": ""}
            ]
        });
        let detail: FormulaDetail = serde_json::from_value(v).unwrap();
        assert_eq!(detail.predecessor_formulation_number, vec!["A1", "A2"]);
        assert!(detail.successor_formulation_number.is_empty());
        assert_eq!(detail.ingredients[0].display_description(), "Aqua");
    }

    #[test]
    fn filter_options_accepts_both_casings() {
        let a: FilterOptions =
            serde_json::from_value(json!({"brands": ["Acme"], "lifecyclePhases": ["Active"]}))
                .unwrap();
        let b: FilterOptions =
            serde_json::from_value(json!({"lifecycle_phases": ["Active"], "production_sites": ["X"]}))
                .unwrap();
        assert_eq!(a.lifecycle_phases, vec!["Active"]);
        assert_eq!(b.lifecycle_phases, vec!["Active"]);
        assert_eq!(b.production_sites, vec!["X"]);
    }

    #[test]
    fn backup_timestamps_parse_with_or_without_zone() {
        let list: ServerBackupList = serde_json::from_value(json!({
            "backups": [
                {"id": "a", "created_at": "2024-03-01T10:00:00Z", "aliases_count": 5, "size": 100},
                {"id": "b", "created_at": "2024-03-01T10:00:00.123456"},
                {"id": 42, "created_at": "not a date"}
            ]
        }))
        .unwrap();
        assert!(list.backups[0].created_at.is_some());
        assert!(list.backups[1].created_at.is_some());
        assert!(list.backups[2].created_at.is_none());
        assert_eq!(list.backups[2].id, "42");
        assert_eq!(list.backups[1].aliases_count, 0);
    }

    #[test]
    fn matching_alias_is_case_insensitive() {
        let ing = Ingredient {
            id: 1,
            name: "Acetylsalicylic Acid".into(),
            fing_item_number: None,
            description: None,
            aliases: vec!["Aspirin".into(), "ASA".into()],
        };
        assert_eq!(ing.matching_alias("asa"), Some("ASA"));
        assert_eq!(ing.matching_alias("pir"), Some("Aspirin"));
        assert_eq!(ing.matching_alias(""), None);
    }

    #[test]
    fn import_summary_reads_either_naming() {
        let excel: ImportSummary = serde_json::from_value(json!({
            "message": "Excel file imported successfully",
            "ingredients_created": 10, "formulas_created": 2,
            "formula_ingredients_created": 30, "errors": 1
        }))
        .unwrap();
        let json_upload: ImportSummary =
            serde_json::from_value(json!({"ingredients_count": 4, "formulas_count": 1})).unwrap();
        assert_eq!(excel.formula_ingredients_created, Some(30));
        assert_eq!(json_upload.ingredients_created, Some(4));
        assert_eq!(json_upload.formulas_created, Some(1));
    }
}
