use super::query::{FilterState, ListFilters, QueryBuilder};
use super::result_view::{ResultView, Ticket};
use crate::error::ApiError;
use crate::session::dto::{FormulaPage, IngredientPage, Pagination};
use crate::session::transport::RequestDescriptor;
use std::str::FromStr;

/// 能按页构造请求的筛选状态
pub trait PageQuery: Clone + PartialEq + Default {
    fn descriptor(&self, builder: &QueryBuilder, page: u32) -> RequestDescriptor;

    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

impl PageQuery for FilterState {
    fn descriptor(&self, builder: &QueryBuilder, page: u32) -> RequestDescriptor {
        builder.search(self, page)
    }

    fn validate(&self) -> Result<(), ApiError> {
        FilterState::validate(self)
    }
}

impl PageQuery for ListFilters {
    fn descriptor(&self, builder: &QueryBuilder, page: u32) -> RequestDescriptor {
        builder.list(self, page)
    }
}

/// 带分页信息的响应
pub trait Paged {
    fn pagination(&self) -> &Pagination;
}

impl Paged for FormulaPage {
    fn pagination(&self) -> &Pagination {
        &self.pagination
    }
}

impl Paged for IngredientPage {
    fn pagination(&self) -> &Pagination {
        &self.pagination
    }
}

/// 需要由调用方发出的请求
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetch {
    pub ticket: Ticket,
    pub request: RequestDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Card,
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "list" | "table" => Ok(ViewMode::List),
            "card" | "cards" => Ok(ViewMode::Card),
            other => Err(format!("未知视图模式: {}", other)),
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ViewMode::List => "list",
            ViewMode::Card => "card",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Prev,
    Next,
    Last,
    To(u32),
}

impl FromStr for PageNav {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(PageNav::First),
            "prev" | "previous" => Ok(PageNav::Prev),
            "next" => Ok(PageNav::Next),
            "last" => Ok(PageNav::Last),
            n => n
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .map(PageNav::To)
                .ok_or_else(|| format!("无效页码: {}", s)),
        }
    }
}

/// 分页视图：筛选 + 页码 + 视图模式 + 结果
///
/// 修改筛选回到第 1 页，翻页保留筛选；两者都返回一个 [`PendingFetch`]，
/// 由拥有者发出请求后通过 [`PagedView::complete`] 回填。
#[derive(Debug, Clone)]
pub struct PagedView<Q, T> {
    query: Q,
    page: u32,
    mode: ViewMode,
    builder: QueryBuilder,
    results: ResultView<T>,
}

impl<Q: PageQuery, T: Paged> PagedView<Q, T> {
    pub fn new(builder: QueryBuilder) -> Self {
        Self {
            query: Q::default(),
            page: 1,
            mode: ViewMode::default(),
            builder,
            results: ResultView::new(),
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn results(&self) -> &ResultView<T> {
        &self.results
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.results.data().map(|d| d.pagination())
    }

    /// 只影响展示，不重新拉取
    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    /// 修改筛选；校验失败时状态不变
    pub fn update(&mut self, f: impl FnOnce(&mut Q)) -> Result<PendingFetch, ApiError> {
        let mut next = self.query.clone();
        f(&mut next);
        next.validate()?;
        Ok(self.apply(next))
    }

    /// 不做校验，直接换成新的筛选并回到第 1 页
    pub fn apply(&mut self, query: Q) -> PendingFetch {
        self.query = query;
        self.page = 1;
        self.fetch()
    }

    pub fn data_mut(&mut self) -> Option<&mut T> {
        self.results.data_mut()
    }

    pub fn replace(&mut self, query: Q) -> Result<PendingFetch, ApiError> {
        self.update(|q| *q = query)
    }

    pub fn reset(&mut self) -> PendingFetch {
        self.apply(Q::default())
    }

    /// 翻页；目标页不可达或就是当前页时返回 None
    pub fn navigate(&mut self, nav: PageNav) -> Option<PendingFetch> {
        let p = self.pagination().cloned().unwrap_or_default();
        let target = match nav {
            PageNav::First => 1,
            PageNav::Prev if p.has_prev || self.page > 1 => self.page.saturating_sub(1).max(1),
            PageNav::Prev => return None,
            PageNav::Next if p.has_next => self.page + 1,
            PageNav::Next => return None,
            PageNav::Last if p.pages > 0 => p.pages,
            PageNav::Last => return None,
            PageNav::To(n) if p.pages == 0 || n <= p.pages => n.max(1),
            PageNav::To(_) => return None,
        };
        if target == self.page && self.results.data().is_some() {
            return None;
        }
        self.page = target;
        Some(self.fetch())
    }

    /// 以当前筛选和页码重新拉取
    pub fn refresh(&mut self) -> PendingFetch {
        self.fetch()
    }

    pub fn complete(&mut self, ticket: Ticket, result: Result<T, ApiError>) -> bool {
        self.results.complete(ticket, result)
    }

    pub fn abandon(&mut self) {
        self.results.abandon();
    }

    fn fetch(&mut self) -> PendingFetch {
        PendingFetch {
            ticket: self.results.begin(),
            request: self.query.descriptor(&self.builder, self.page),
        }
    }
}

pub type FormulaSearchView = PagedView<FilterState, FormulaPage>;
pub type FormulaListView = PagedView<ListFilters, FormulaPage>;
