//! Per-segment render lifecycle.

use std::fmt;

use tracing::trace;

use crate::error::{MediaError, MediaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentState {
    Pending,
    Copying,
    EncodingHw,
    EncodingCpu,
    Done,
    Failed,
}

impl SegmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentState::Pending => "pending",
            SegmentState::Copying => "copying",
            SegmentState::EncodingHw => "encoding_hw",
            SegmentState::EncodingCpu => "encoding_cpu",
            SegmentState::Done => "done",
            SegmentState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentState::Done | SegmentState::Failed)
    }

    pub fn can_transition_to(&self, next: SegmentState) -> bool {
        use SegmentState::*;
        matches!(
            (self, next),
            (Pending, Copying | EncodingHw | EncodingCpu)
                | (Copying, Done | Failed)
                | (EncodingHw, EncodingCpu | Done | Failed)
                | (EncodingCpu, Done | Failed)
        )
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one segment through [`SegmentState`], rejecting illegal moves.
#[derive(Debug, Clone)]
pub struct SegmentTracker {
    index: usize,
    state: SegmentState,
    history: Vec<SegmentState>,
}

impl SegmentTracker {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: SegmentState::Pending,
            history: vec![SegmentState::Pending],
        }
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[SegmentState] {
        &self.history
    }

    pub fn advance(&mut self, next: SegmentState) -> MediaResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(MediaError::internal(format!(
                "segment {} cannot move from {} to {}",
                self.index, self.state, next
            )));
        }
        trace!(segment = self.index, from = %self.state, to = %next, "Segment state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}
