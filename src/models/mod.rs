//! Model catalog and automatic model selection.

mod catalog;
mod selector;

pub use catalog::{ModelCatalog, ModelCategory, ModelInfo};
pub use selector::{ModelSelector, Orientation};
