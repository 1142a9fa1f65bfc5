//! 查询构造：筛选状态 -> 请求描述

use crate::error::ApiError;
use crate::session::transport::RequestDescriptor;
use crate::session::urls::{URL_FORMULAS, URL_FORMULAS_EXPORT, URL_FORMULAS_SEARCH, URL_INGREDIENTS};

/// 一行原料条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientFilter {
    pub name: String,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl IngredientFilter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn between(name: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            name: name.into(),
            min_amount: min,
            max_amount: max,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

/// 排除的原料；按解析出的名称传给后端
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedIngredient {
    pub id: Option<i64>,
    pub name: String,
}

impl ExcludedIngredient {
    pub fn resolved_name(&self) -> Option<&str> {
        Some(self.name.trim()).filter(|n| !n.is_empty())
    }
}

/// 标量筛选项，空字符串表示未选择
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    pub brand: String,
    pub category: String,
    pub lifecycle_phase: String,
    pub formulation_name: String,
    pub production_site: String,
}

impl Facets {
    pub fn is_empty(&self) -> bool {
        [
            &self.brand,
            &self.category,
            &self.lifecycle_phase,
            &self.formulation_name,
            &self.production_site,
        ]
        .iter()
        .all(|v| v.trim().is_empty())
    }
}

/// 搜索页的完整筛选状态
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub ingredients: Vec<IngredientFilter>,
    pub exclusions: Vec<ExcludedIngredient>,
    pub facets: Facets,
}

impl Default for FilterState {
    fn default() -> Self {
        // 表单初始有一行空条件
        Self {
            ingredients: vec![IngredientFilter::default()],
            exclusions: Vec::new(),
            facets: Facets::default(),
        }
    }
}

impl FilterState {
    pub fn add_row(&mut self, row: IngredientFilter) {
        // 只有一行空行时直接替换
        if self.ingredients.len() == 1 && self.ingredients[0] == IngredientFilter::default() {
            self.ingredients[0] = row;
        } else {
            self.ingredients.push(row);
        }
    }

    /// 删除一行；至少保留一行空行
    pub fn remove_row(&mut self, index: usize) -> bool {
        if index >= self.ingredients.len() {
            return false;
        }
        self.ingredients.remove(index);
        if self.ingredients.is_empty() {
            self.ingredients.push(IngredientFilter::default());
        }
        true
    }

    pub fn exclude(&mut self, id: Option<i64>, name: impl Into<String>) {
        let name = name.into();
        let dup = self
            .exclusions
            .iter()
            .any(|e| (id.is_some() && e.id == id) || e.name.eq_ignore_ascii_case(name.trim()));
        if !dup {
            self.exclusions.push(ExcludedIngredient {
                id,
                name: name.trim().to_string(),
            });
        }
    }

    /// 名称非空的原料行，保持原顺序
    pub fn active_rows(&self) -> impl Iterator<Item = &IngredientFilter> {
        self.ingredients.iter().filter(|r| !r.is_blank())
    }

    pub fn is_empty(&self) -> bool {
        self.active_rows().next().is_none()
            && self.exclusions.iter().all(|e| e.resolved_name().is_none())
            && self.facets.is_empty()
    }

    /// 发请求前的客户端校验
    pub fn validate(&self) -> Result<(), ApiError> {
        for row in self.active_rows() {
            if let (Some(min), Some(max)) = (row.min_amount, row.max_amount) {
                if min > max {
                    return Err(ApiError::validation(format!(
                        "Minimum amount cannot exceed maximum amount for {}",
                        row.name.trim()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// 配方列表页的筛选（`/formulas` 只支持这三项）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilters {
    pub brand: String,
    pub category: String,
    pub lifecycle_phase: String,
}

/// 解析用户输入的用量；空串表示不限
pub fn parse_amount(raw: &str) -> Result<Option<f64>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| ApiError::validation(format!("Invalid amount: {}", raw)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryBuilder {
    pub per_page: u32,
}

impl QueryBuilder {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    /// `/formulas/search?page&per_page&ingredient{n}...`
    pub fn search(&self, filters: &FilterState, page: u32) -> RequestDescriptor {
        let mut d = RequestDescriptor::new(URL_FORMULAS_SEARCH)
            .param("page", page.max(1))
            .param("per_page", self.per_page);
        push_filters(&mut d, filters);
        d
    }

    /// 导出与搜索使用同一组筛选，但不分页
    pub fn export(&self, filters: &FilterState) -> RequestDescriptor {
        let mut d = RequestDescriptor::new(URL_FORMULAS_EXPORT);
        push_filters(&mut d, filters);
        d
    }

    pub fn list(&self, filters: &ListFilters, page: u32) -> RequestDescriptor {
        let mut d = RequestDescriptor::new(URL_FORMULAS)
            .param("page", page.max(1))
            .param("per_page", self.per_page);
        d.push_non_empty("brand", Some(&filters.brand));
        d.push_non_empty("category", Some(&filters.category));
        d.push_non_empty("lifecycle_phase", Some(&filters.lifecycle_phase));
        d
    }

    pub fn ingredients(&self, term: &str, page: u32) -> RequestDescriptor {
        let mut d = RequestDescriptor::new(URL_INGREDIENTS)
            .param("page", page.max(1))
            .param("per_page", self.per_page);
        d.push_non_empty("search", Some(term));
        d
    }
}

fn push_filters(d: &mut RequestDescriptor, filters: &FilterState) {
    // 序号按非空行重新编号，从 1 开始连续
    for (i, row) in filters.active_rows().enumerate() {
        let n = i + 1;
        d.push(format!("ingredient{}", n), row.name.trim());
        if let Some(min) = row.min_amount {
            d.push(format!("min_amount{}", n), min);
        }
        if let Some(max) = row.max_amount {
            d.push(format!("max_amount{}", n), max);
        }
    }
    for (i, name) in filters
        .exclusions
        .iter()
        .filter_map(|e| e.resolved_name())
        .enumerate()
    {
        d.push(format!("exclude_ingredient{}", i + 1), name);
    }
    let f = &filters.facets;
    d.push_non_empty("brand", Some(&f.brand));
    d.push_non_empty("category", Some(&f.category));
    d.push_non_empty("lifecycle_phase", Some(&f.lifecycle_phase));
    d.push_non_empty("formulation_name", Some(&f.formulation_name));
    d.push_non_empty("production_site", Some(&f.production_site));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rows: Vec<IngredientFilter>) -> FilterState {
        FilterState {
            ingredients: rows,
            ..Default::default()
        }
    }

    fn ingredient_keys(d: &RequestDescriptor) -> Vec<String> {
        d.params
            .iter()
            .map(|(k, _)| k.clone())
            .filter(|k| k.starts_with("ingredient"))
            .collect()
    }

    #[test]
    fn empty_rows_are_skipped_and_renumbered() {
        let filters = state(vec![
            IngredientFilter::default(),
            IngredientFilter::between("Water", Some(10.0), None),
            IngredientFilter::named("   "),
            IngredientFilter::between("Glycerin", Some(0.5), Some(5.0)),
            IngredientFilter::default(),
        ]);
        let d = QueryBuilder::new(20).search(&filters, 1);
        assert_eq!(ingredient_keys(&d), vec!["ingredient1", "ingredient2"]);
        assert_eq!(d.get("ingredient1"), Some("Water"));
        assert_eq!(d.get("min_amount1"), Some("10"));
        assert_eq!(d.get("max_amount1"), None);
        assert_eq!(d.get("ingredient2"), Some("Glycerin"));
        assert_eq!(d.get("min_amount2"), Some("0.5"));
        assert_eq!(d.get("max_amount2"), Some("5"));
    }

    #[test]
    fn k_non_empty_rows_give_k_contiguous_groups() {
        for k in 0..6usize {
            let mut rows = Vec::new();
            for i in 0..k {
                rows.push(IngredientFilter::default());
                rows.push(IngredientFilter::named(format!("Ing{}", i)));
            }
            let d = QueryBuilder::new(20).search(&state(rows), 1);
            let expected: Vec<String> = (1..=k).map(|n| format!("ingredient{}", n)).collect();
            assert_eq!(ingredient_keys(&d), expected);
        }
    }

    #[test]
    fn all_empty_still_builds_match_all_request() {
        let d = QueryBuilder::new(20).search(&FilterState::default(), 1);
        assert_eq!(d.to_url_path(), "/formulas/search?page=1&per_page=20");
    }

    #[test]
    fn identical_state_gives_identical_string() {
        let mut a = FilterState::default();
        a.add_row(IngredientFilter::between("Water", Some(1.0), Some(2.0)));
        a.exclude(Some(4), "Ethanol");
        a.facets.brand = "Acme".into();
        a.facets.production_site = "Plant 7".into();
        let b = a.clone();
        let qb = QueryBuilder::new(50);
        assert_eq!(qb.search(&a, 3).to_url_path(), qb.search(&b, 3).to_url_path());
        assert_eq!(
            qb.search(&a, 3).to_url_path(),
            "/formulas/search?page=3&per_page=50&ingredient1=Water&min_amount1=1&max_amount1=2\
             &exclude_ingredient1=Ethanol&brand=Acme&production_site=Plant%207"
        );
    }

    #[test]
    fn export_only_carries_non_empty_facets() {
        let mut filters = FilterState::default();
        filters.facets.brand = "Acme".into();
        filters.facets.category = "".into();
        let d = QueryBuilder::new(20).export(&filters);
        let qs = d.query_string();
        assert!(qs.contains("brand=Acme"));
        assert!(!qs.contains("category"));
        assert!(d.get("page").is_none());
        assert_eq!(d.path, "/formulas/export");
    }

    #[test]
    fn unresolved_exclusions_are_dropped() {
        let mut filters = FilterState::default();
        filters.exclusions.push(ExcludedIngredient {
            id: Some(1),
            name: "".into(),
        });
        filters.exclude(Some(2), "Parabens");
        filters.exclude(None, "parabens");
        let d = QueryBuilder::new(20).search(&filters, 1);
        assert_eq!(d.get("exclude_ingredient1"), Some("Parabens"));
        assert_eq!(d.get("exclude_ingredient2"), None);
    }

    #[test]
    fn list_and_ingredient_descriptors() {
        let qb = QueryBuilder::new(20);
        let list = qb.list(
            &ListFilters {
                brand: "Acme".into(),
                category: String::new(),
                lifecycle_phase: "Active".into(),
            },
            2,
        );
        assert_eq!(
            list.to_url_path(),
            "/formulas?page=2&per_page=20&brand=Acme&lifecycle_phase=Active"
        );
        assert_eq!(
            qb.ingredients("", 1).to_url_path(),
            "/ingredients?page=1&per_page=20"
        );
        assert_eq!(
            qb.ingredients("asa", 1).to_url_path(),
            "/ingredients?page=1&per_page=20&search=asa"
        );
    }

    #[test]
    fn validation_and_amount_parsing() {
        assert_eq!(parse_amount(""), Ok(None));
        assert_eq!(parse_amount(" 2.5 "), Ok(Some(2.5)));
        assert!(parse_amount("abc").unwrap_err().is_validation());

        let filters = state(vec![IngredientFilter::between("Water", Some(5.0), Some(1.0))]);
        assert!(filters.validate().unwrap_err().is_validation());
    }

    #[test]
    fn removing_last_row_keeps_one_blank() {
        let mut filters = FilterState::default();
        filters.add_row(IngredientFilter::named("Water"));
        assert_eq!(filters.ingredients.len(), 1);
        assert!(filters.remove_row(0));
        assert_eq!(filters.ingredients, vec![IngredientFilter::default()]);
        assert!(!filters.remove_row(3));
    }
}
