pub mod cache;
pub mod selection;

pub use cache::{CacheNode, FilterCase, FlatItem, ViewCache};
pub use selection::{Modifiers, Selection};
