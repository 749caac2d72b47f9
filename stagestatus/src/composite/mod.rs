//! Composite status resolution.
//!
//! - [`PriorityTable`]: the ordered rules that pick one status for a set
//! - [`CompositeResolver`]: applies a table to entries under a discipline

mod priority;
mod resolver;

pub use priority::{PriorityRule, PriorityTable, RuleMatch, StatusFacet, StatusSet};
pub use resolver::{CompositeResolver, CompositeStatus};
