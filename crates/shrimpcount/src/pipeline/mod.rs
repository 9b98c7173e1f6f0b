//! End-to-end counting pipeline.
//!
//! Wires the stages together in order:
//! foreground key -> cleanup -> seeds -> region growing -> extraction -> overlays.
//!
//! Algorithmic primitives live in `crate::mask`, `crate::seeds`,
//! `crate::watershed` and `crate::extract`; this layer only handles stage
//! boundaries and data flow. Nothing survives between calls.

mod result;
mod run;


pub use result::{CountResult, CountSummary, PipelineStats, StageImages};
pub use run::{segment_and_count, segment_and_count_with_stages};

pub(crate) use run::run;
