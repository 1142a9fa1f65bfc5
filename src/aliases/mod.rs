pub mod backups;
pub mod confirm;
pub mod editor;
pub mod ingredients;
pub mod message;

pub use backups::BackupPanel;
pub use confirm::Gate;
pub use editor::AliasEditor;
pub use ingredients::{DebounceToken, IngredientBrowser, TermChange, SEARCH_DEBOUNCE};
pub use message::{MessageId, TransientMessage, MESSAGE_TTL};
