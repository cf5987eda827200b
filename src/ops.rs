pub mod default_with;
pub mod flatten_latest;
pub mod map;
pub mod map_to_unit;
pub mod subscribe_safe;
pub mod with_index;
pub mod with_previous_value;

pub use with_index::{Indexed, Indexer};
pub use with_previous_value::PreviousValue;
