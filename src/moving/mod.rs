//! Local optimisation routines for the CPM quality function.
//!
//! All three routines share the same move-gain expression: moving node `j`
//! into cluster `c` (with `j` already taken out of its own cluster) changes
//! the quality by the edge weight between `j` and `c` minus the resolution
//! times `j`'s node weight times the total node weight of `c`.

pub mod fast;
pub mod merging;
pub mod standard;
