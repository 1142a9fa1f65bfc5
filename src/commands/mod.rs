pub mod app_command;

pub use app_command::{tokenize, AppCommand, HELP};
