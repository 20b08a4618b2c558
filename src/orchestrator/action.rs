//! Plain action messages consumed by the orchestrator.
//!
//! Presentation layers (window, tray, CLI) translate their own events into
//! these instead of calling into the state machine with toolkit callbacks.

use std::fmt;

/// A user-initiated mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Queue each URL for download.
    Enqueue(Vec<String>),
    Pause(String),
    Resume(String),
    /// Stop tracking locally; the daemon keeps the transfer.
    Remove(String),
    /// Stop the transfer on the daemon and stop tracking it.
    Cancel(String),
    PauseAll,
    /// Resume everything; local state follows on the next poll.
    ResumeAll,
    /// Pause all if anything is in flight, otherwise resume all.
    TogglePauseAll,
}

impl Action {
    /// Short label for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enqueue(_) => "enqueue",
            Self::Pause(_) => "pause",
            Self::Resume(_) => "resume",
            Self::Remove(_) => "remove",
            Self::Cancel(_) => "cancel",
            Self::PauseAll => "pause_all",
            Self::ResumeAll => "resume_all",
            Self::TogglePauseAll => "toggle_pause_all",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enqueue(urls) => write!(f, "enqueue ({} urls)", urls.len()),
            Self::Pause(id) | Self::Resume(id) | Self::Remove(id) | Self::Cancel(id) => {
                write!(f, "{} {id}", self.name())
            }
            Self::PauseAll | Self::ResumeAll | Self::TogglePauseAll => write!(f, "{}", self.name()),
        }
    }
}
