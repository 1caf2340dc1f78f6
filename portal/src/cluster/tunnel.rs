use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use snafu::{OptionExt, ResultExt};
use tokio::process::Child;

use crate::cluster::{Error, Tunnel, TunnelExit, error};

/// A `kubectl port-forward` child process.
///
/// The child is killed if the handle is dropped before it has been waited on,
/// which only happens when the session itself is torn down abnormally.
#[derive(Debug)]
pub struct TunnelProcess {
    child: Child,
}

impl TunnelProcess {
    pub const fn new(child: Child) -> Self { Self { child } }
}

impl Tunnel for TunnelProcess {
    fn interrupt(&mut self) -> Result<(), Error> {
        let pid = self.child.id().context(error::TunnelReapedSnafu)?;
        let raw = i32::try_from(pid).ok().context(error::TunnelReapedSnafu)?;

        tracing::debug!("Sending SIGINT to port-forward process {pid}");
        match signal::kill(Pid::from_raw(raw), Signal::SIGINT) {
            // Exited on its own in the meantime; `wait` reports how.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(source).context(error::SignalTunnelSnafu { pid }),
        }
    }

    async fn wait(&mut self) -> Result<TunnelExit, Error> {
        let status = self.child.wait().await.context(error::WaitTunnelSnafu)?;
        Ok(TunnelExit::from(status))
    }
}
