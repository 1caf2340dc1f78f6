use std::{path::PathBuf, process::ExitStatus};

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to run {}, error: {source}", program.display()))]
    SpawnClient { program: PathBuf, source: std::io::Error },

    #[snafu(display("Failed to collect the output of `{verb}`, error: {source}"))]
    CollectOutput { verb: &'static str, source: std::io::Error },

    #[snafu(display("Failed to pass manifests to `apply`, error: {source}"))]
    WriteManifests { source: std::io::Error },

    #[snafu(display("Failed to serialize manifests, error: {source}"))]
    SerializeManifests { source: serde_json::Error },

    #[snafu(display("`{verb}` {status}: {}", single_line(stderr)))]
    ClientExit { verb: &'static str, status: ExitStatus, stderr: String },

    #[snafu(display("Failed to wait for the port-forward process, error: {source}"))]
    WaitTunnel { source: std::io::Error },

    #[snafu(display("Failed to signal the port-forward process {pid}, error: {source}"))]
    SignalTunnel { pid: u32, source: nix::errno::Errno },

    #[snafu(display("Port-forward process has already been reaped"))]
    TunnelReaped,
}

impl Error {
    /// Whether the client gave up because its own timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ClientExit { stderr, .. } if stderr.contains("timed out"))
    }
}

/// Folds multi-line client output into one line.
fn single_line(stderr: &str) -> String {
    stderr.lines().map(str::trim).filter(|line| !line.is_empty()).collect::<Vec<_>>().join("; ")
}
