//! Segment rendering and final assembly.

pub mod assemble;
pub mod command;
pub mod orchestrator;
pub mod state;

pub use assemble::{AssembleOptions, Assembler, AssemblyReport};
pub use command::SegmentCommands;
pub use orchestrator::{
    RenderOptions, RenderOrchestrator, RenderReport, RenderedSegment, SegmentFailure,
};
pub use state::{SegmentState, SegmentTracker};
