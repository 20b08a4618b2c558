//! Terminal-facing pieces of the binary: logging setup and the progress view.

pub(crate) mod progress;
pub(crate) mod terminal;
