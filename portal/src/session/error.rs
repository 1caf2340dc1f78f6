use std::fmt;

use snafu::Snafu;

use crate::cluster::{self, TunnelExit};

/// Which of the two deletes of a session failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CleanupPhase {
    /// Removal of leftovers before anything is created.
    Pre,
    /// Teardown of the relay this session created.
    Post,
}

impl fmt::Display for CleanupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pre => "pre",
            Self::Post => "post",
        })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to apply relay {name}, error: {source}"))]
    ApplyFailed { name: String, source: cluster::Error },

    #[snafu(display("Failed to wait for relay {name}, error: {source}"))]
    WaitFailed { name: String, source: cluster::Error },

    #[snafu(display("Relay {name} did not become ready in time, error: {source}"))]
    ReadinessTimeout { name: String, source: cluster::Error },

    #[snafu(display("Failed to start port-forward to relay {name}, error: {source}"))]
    ForwardStartFailed { name: String, source: cluster::Error },

    #[snafu(display("Failed to interrupt port-forward, error: {source}"))]
    ForwardInterruptFailed { source: cluster::Error },

    #[snafu(display("Failed to wait for port-forward, error: {source}"))]
    ForwardWaitFailed { source: cluster::Error },

    #[snafu(display("Port-forward {exit}"))]
    ForwardExited { exit: TunnelExit },

    #[snafu(display("Failed to clean up relay {name} ({phase}), error: {source}"))]
    CleanupFailed { name: String, phase: CleanupPhase, source: cluster::Error },

    #[snafu(display("{source}; cleanup also failed: {cleanup}"))]
    CleanupAfterFailure { source: Box<Error>, cleanup: Box<Error> },
}

impl Error {
    /// Combines the error that ended a session with the one raised while
    /// tearing it down.
    pub fn join(source: Self, cleanup: Self) -> Self {
        Self::CleanupAfterFailure { source: Box::new(source), cleanup: Box::new(cleanup) }
    }
}
