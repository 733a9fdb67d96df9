//! Static helpers over the tree: graph topology, units and token splitting.
pub mod tokens;
pub mod topology;
pub mod units;
