use std::fmt;

bitflags::bitflags! {
    /// Render option bits. Unknown bits are retained so embedders can pass
    /// flags through this crate without it rejecting future additions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderFlags: u32 {
        /// Include annotation-tagged primitives in the walk.
        const ANNOTATIONS = 1;
        /// Under a color scheme, paint filled paths as stroked outlines
        /// using the scheme's path stroke color.
        const CONVERT_FILL_TO_STROKE = 1 << 1;
    }
}

/// Lifecycle of a render session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Suspended,
    Complete,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::NotStarted => "not-started",
            SessionState::Suspended => "suspended",
            SessionState::Complete => "complete",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of one start/resume drive of the walk. Synchronous failures
/// surface as `Err(PlatenError)` instead of a third arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Suspended,
    Complete,
}
