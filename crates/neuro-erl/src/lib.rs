//! Umbrella crate for the `neuro-erl` workspace.
//!
//! Re-exports the volume, lookup, skeleton and scoring crates and adds the
//! [`pipeline`] that chains them into one evaluation.

pub mod pipeline;

pub use erl_core::*;
pub use erl_io::*;
pub use erl_lut::*;
pub use erl_score::*;
pub use erl_skel::*;
pub use pipeline::{Evaluation, EvaluationConfig, PipelineError, Stage, StageStore};
