use clap::Args;
use snafu::ResultExt;

use crate::{
    cli::{Error, PortalArgs, error, internal::PortalResolver},
    cluster::ControlPlane,
    config::Config,
};

/// Removes the relay a crashed or killed session left behind.
#[derive(Args, Clone)]
pub struct CleanupCommand {}

impl CleanupCommand {
    /// # Errors
    ///
    /// Fails if the relay name cannot be derived or `kubectl delete` fails.
    pub async fn run(self, portal: &PortalArgs, config: Config) -> Result<(), Error> {
        let resolver = PortalResolver::from(&config);
        let identity = PortalResolver::resolve_identity(portal)?;
        let namespace = portal.namespace.as_deref().filter(|namespace| !namespace.is_empty());

        resolver
            .control_plane(portal)
            .delete_if_exists(&identity, namespace)
            .await
            .with_context(|_| error::ResourceDeleteFailedSnafu { name: identity.to_string() })?;

        tracing::info!("Relay {identity} removed");
        Ok(())
    }
}
