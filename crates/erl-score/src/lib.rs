//! Expected run length (ERL) scoring of ground-truth skeletons.
//!
//! Every edge of a ground-truth [`erl_skel::SkeletonGraph`] is classified
//! against the segment ids its endpoints resolve to:
//! - **omitted** if either endpoint lies in a masked segment;
//! - **split** if the endpoints lie in different segments;
//! - **merged** if they share a segment that covers too many objects;
//! - **correct** otherwise.
//!
//! Correct edges form runs. A segmentation scores high when the runs are
//! long, since the ERL is the length-weighted expected length of the run a
//! randomly chosen point of the skeleton falls into.

mod classify;
mod erl;
mod report;

pub use classify::{EdgeClass, ScoreConfig, classify_edges, merged_segments};
pub use erl::{ErlScore, PathScore, score_erl};
pub use report::{ScoreComparison, ScoreReport};
