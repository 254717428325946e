//! Merging locally authored records into a freshly retrieved workspace.

pub mod category;
pub mod collision;

pub use category::{merge_category, CategoryReport};
pub use collision::resolve_name;
