//! The boundary to the cluster.
//!
//! Every mutation goes through an external client; [`ControlPlane`] is the
//! seam between the session logic and that client, with [`Kubectl`] as the
//! real implementation.

mod error;
mod kubectl;
mod tunnel;

use std::{fmt, net::IpAddr, process::ExitStatus};

pub use self::{error::Error, kubectl::Kubectl, tunnel::TunnelProcess};
use crate::{identity::ResourceIdentity, manifest::ManifestSet};

/// Local and remote ends of a port forward.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ForwardSpec {
    pub local_address: IpAddr,
    pub local_port: u16,
    pub remote_port: u16,
}

impl fmt::Display for ForwardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.local_address, self.local_port, self.remote_port)
    }
}

/// Operations on the relay resources of one identity.
///
/// `namespace` is the requested namespace; `None` leaves the choice to the
/// client's current context.
pub trait ControlPlane {
    type Tunnel: Tunnel;

    /// Deletes the relay pod and config map, succeeding when they are absent.
    async fn delete_if_exists(
        &self,
        identity: &ResourceIdentity,
        namespace: Option<&str>,
    ) -> Result<(), Error>;

    /// Submits both documents in one call and returns the namespace the pod
    /// landed in.
    async fn apply(&self, manifests: &ManifestSet, namespace: Option<&str>)
    -> Result<String, Error>;

    async fn wait_for_ready(
        &self,
        identity: &ResourceIdentity,
        namespace: Option<&str>,
    ) -> Result<(), Error>;

    /// Starts forwarding without waiting for it to finish.
    fn stream_forward(
        &self,
        identity: &ResourceIdentity,
        namespace: Option<&str>,
        forward: ForwardSpec,
    ) -> Result<Self::Tunnel, Error>;

    /// Blocking, best-effort variant of [`ControlPlane::delete_if_exists`] for
    /// contexts where nothing can be awaited.
    fn delete_detached(&self, identity: &ResourceIdentity, namespace: Option<&str>);
}

/// A running port forward.
pub trait Tunnel {
    /// Asks the process to stop gracefully.
    fn interrupt(&mut self) -> Result<(), Error>;

    async fn wait(&mut self) -> Result<TunnelExit, Error>;
}

/// How a tunnel process ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TunnelExit {
    Exited { code: i32 },
    Signaled { signal: i32 },
}

impl TunnelExit {
    pub const fn success(self) -> bool { matches!(self, Self::Exited { code: 0 }) }

    /// Whether the process ended the way it should after an interrupt.
    pub fn is_graceful_stop(self) -> bool {
        self.success() || self == Self::Signaled { signal: nix::sys::signal::Signal::SIGINT as i32 }
    }
}

impl From<ExitStatus> for TunnelExit {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Exited { code },
            (None, Some(signal)) => Self::Signaled { signal },
            (None, None) => Self::Exited { code: -1 },
        }
    }
}

impl fmt::Display for TunnelExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exited with code {code}"),
            Self::Signaled { signal } => match nix::sys::signal::Signal::try_from(*signal) {
                Ok(name) => write!(f, "killed by {name}"),
                Err(_) => write!(f, "killed by signal {signal}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, os::unix::process::ExitStatusExt};

    use super::*;

    #[test]
    fn test_tunnel_exit_from_status() {
        assert_eq!(TunnelExit::from(ExitStatus::from_raw(0)), TunnelExit::Exited { code: 0 });
        assert_eq!(TunnelExit::from(ExitStatus::from_raw(1 << 8)), TunnelExit::Exited { code: 1 });
        assert_eq!(TunnelExit::from(ExitStatus::from_raw(2)), TunnelExit::Signaled { signal: 2 });
    }

    #[test]
    fn test_graceful_stop() {
        assert!(TunnelExit::Exited { code: 0 }.is_graceful_stop());
        assert!(TunnelExit::Signaled { signal: 2 }.is_graceful_stop());
        assert!(!TunnelExit::Signaled { signal: 9 }.is_graceful_stop());
        assert!(!TunnelExit::Exited { code: 1 }.is_graceful_stop());
        assert_eq!(TunnelExit::Signaled { signal: 9 }.to_string(), "killed by SIGKILL");
    }

    #[test]
    fn test_forward_spec_display() {
        let forward = ForwardSpec {
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 7070,
            remote_port: 80,
        };
        assert_eq!(forward.to_string(), "127.0.0.1:7070 -> 80");
    }
}
