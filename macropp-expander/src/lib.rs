//! Harvests macro definitions (resolving `include` along the way) and expands macro calls found
//! in the resulting piece stream.

pub mod expander;
pub mod harvester;

pub use expander::{Expander, MAX_EXPAND_LEVEL};
pub use harvester::{Harvester, MacroTable, MAX_INCLUDE_LEVEL};
