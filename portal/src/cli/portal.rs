use std::net::IpAddr;

use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::{
    cli::{
        Error,
        internal::{PortalResolver, ResolvedPortal},
    },
    config::{Config, ImagePullPolicy},
    session::{Outcome, Session},
};

/// Options describing the relay to open, shared by every subcommand that
/// needs to know which relay it is talking about.
#[derive(Args, Clone, Debug, Default)]
pub struct PortalArgs {
    #[arg(
        short = 'n',
        long = "namespace",
        global = true,
        help = "Kubernetes namespace to run the relay in. Defaults to the namespace of the \
                current kubectl context."
    )]
    pub namespace: Option<String>,

    #[arg(
        long = "portal-relay",
        global = true,
        help = "Name of the relay preset to use, see `relays`. Defaults to `defaultRelay` of the \
                configuration."
    )]
    pub relay: Option<String>,

    #[arg(long = "portal-port", global = true, help = "Local port to listen on.")]
    pub port: Option<u16>,

    #[arg(long = "portal-address", global = true, help = "Local address to listen on.")]
    pub address: Option<IpAddr>,

    #[arg(long = "portal-image", global = true, help = "Container image of the relay.")]
    pub image: Option<String>,

    #[arg(
        long = "portal-pull-policy",
        global = true,
        help = "Image pull policy of the relay (IfNotPresent, Always, Never)."
    )]
    pub pull_policy: Option<ImagePullPolicy>,

    #[arg(
        long = "portal-name",
        global = true,
        help = "Name of the relay pod and config map. Defaults to a name derived from user and \
                host."
    )]
    pub name: Option<String>,

    #[arg(
        long = "portal-cluster-domain",
        global = true,
        help = "DNS suffix of the cluster, used by the relay to expand service names."
    )]
    pub cluster_domain: Option<String>,

    #[arg(
        long = "portal-timeout-seconds",
        global = true,
        help = "The maximum time in seconds to wait for the relay to become ready."
    )]
    pub timeout_secs: Option<u64>,

    #[arg(long = "portal-verbose", global = true, help = "Log every step in detail.")]
    pub verbose: bool,
}

impl PortalArgs {
    /// Opens the portal and keeps it open until the port-forward ends or the
    /// operator presses Ctrl+C.
    ///
    /// # Errors
    ///
    /// Fails if the relay cannot be resolved from the configuration, or if any
    /// step of the session fails.
    pub async fn run(self, config: Config) -> Result<(), Error> {
        let resolver = PortalResolver::from(&config);
        let ResolvedPortal { identity, relay } = resolver.resolve(&self)?;
        let kubectl = resolver.control_plane(&self);
        tracing::debug!("Using {} as control-plane client", kubectl.program().display());

        let interrupt = CancellationToken::new();
        let ctrl_c = tokio::spawn({
            let interrupt = interrupt.clone();
            async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Interrupt received, closing portal...");
                        interrupt.cancel();
                    }
                    Err(err) => tracing::warn!("Unable to listen for Ctrl+C, error: {err}"),
                }
            }
        });

        let result = Session::new(kubectl, identity, relay).run(interrupt).await;
        ctrl_c.abort();

        match result? {
            Outcome::Interrupted => tracing::info!("Portal closed"),
            Outcome::TunnelClosed => tracing::info!("Portal closed by port-forward"),
        }
        Ok(())
    }
}
