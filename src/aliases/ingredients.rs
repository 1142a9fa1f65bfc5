use crate::search::paged_view::{PageNav, PageQuery, PagedView, PendingFetch};
use crate::search::query::QueryBuilder;
use crate::search::result_view::Ticket;
use crate::error::ApiError;
use crate::session::dto::{Ingredient, IngredientPage};
use crate::session::transport::RequestDescriptor;
use std::time::Duration;

/// 边输入边搜索的防抖间隔
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientSearch {
    pub term: String,
}

impl PageQuery for IngredientSearch {
    fn descriptor(&self, builder: &QueryBuilder, page: u32) -> RequestDescriptor {
        builder.ingredients(&self.term, page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceToken(u64);

/// 输入变化后要做的事
#[derive(Debug, Clone, PartialEq)]
pub enum TermChange {
    /// 立即拉取（清空搜索词时）
    Fetch(PendingFetch),
    /// 等待防抖到期后调用 [`IngredientBrowser::debounce_elapsed`]
    Wait(DebounceToken),
}

/// 原料浏览器：分页原料列表 + 搜索词防抖
#[derive(Debug, Clone)]
pub struct IngredientBrowser {
    view: PagedView<IngredientSearch, IngredientPage>,
    typed: String,
    debounce_seq: u64,
}

impl IngredientBrowser {
    pub fn new(builder: QueryBuilder) -> Self {
        Self {
            view: PagedView::new(builder),
            typed: String::new(),
            debounce_seq: 0,
        }
    }

    pub fn view(&self) -> &PagedView<IngredientSearch, IngredientPage> {
        &self.view
    }

    /// 已生效的搜索词
    pub fn term(&self) -> &str {
        &self.view.query().term
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        self.view
            .results()
            .data()
            .map(|p| p.ingredients.as_slice())
            .unwrap_or(&[])
    }

    pub fn find(&self, id: i64) -> Option<&Ingredient> {
        self.ingredients().iter().find(|i| i.id == id)
    }

    pub fn type_term(&mut self, term: &str) -> TermChange {
        self.typed = term.to_string();
        self.debounce_seq += 1;
        if term.is_empty() {
            return TermChange::Fetch(self.view.apply(IngredientSearch::default()));
        }
        TermChange::Wait(DebounceToken(self.debounce_seq))
    }

    /// 防抖到期；期间又有输入则什么都不做
    pub fn debounce_elapsed(&mut self, token: DebounceToken) -> Option<PendingFetch> {
        if token.0 != self.debounce_seq || self.typed.is_empty() {
            return None;
        }
        Some(self.view.apply(IngredientSearch {
            term: self.typed.clone(),
        }))
    }

    /// 立即按当前输入搜索
    pub fn submit(&mut self) -> PendingFetch {
        self.debounce_seq += 1;
        self.view.apply(IngredientSearch {
            term: self.typed.clone(),
        })
    }

    pub fn clear(&mut self) -> PendingFetch {
        self.typed.clear();
        self.debounce_seq += 1;
        self.view.apply(IngredientSearch::default())
    }

    pub fn navigate(&mut self, nav: PageNav) -> Option<PendingFetch> {
        self.view.navigate(nav)
    }

    pub fn refresh(&mut self) -> PendingFetch {
        self.view.refresh()
    }

    pub fn complete(&mut self, ticket: Ticket, result: Result<IngredientPage, ApiError>) -> bool {
        self.view.complete(ticket, result)
    }

    /// 离开页面：在途结果和未到期的防抖都作废
    pub fn abandon(&mut self) {
        self.debounce_seq += 1;
        self.view.abandon();
    }

    /// 搜索命中的别名
    pub fn matched_alias<'a>(&self, ingredient: &'a Ingredient) -> Option<&'a str> {
        ingredient.matching_alias(self.term())
    }

    /// 同步列表中某个原料的别名镜像
    pub fn patch_aliases(&mut self, ingredient_id: i64, f: impl FnOnce(&mut Vec<String>)) {
        if let Some(ing) = self
            .view
            .data_mut()
            .and_then(|p| p.ingredients.iter_mut().find(|i| i.id == ingredient_id))
        {
            f(&mut ing.aliases);
        }
    }
}
