pub mod paged_view;
pub mod query;
pub mod result_view;

pub use paged_view::{
    FormulaListView, FormulaSearchView, PageNav, PageQuery, Paged, PagedView, PendingFetch,
    ViewMode,
};
pub use query::{FilterState, IngredientFilter, ListFilters, QueryBuilder};
pub use result_view::{Phase, ResultView, Ticket};
