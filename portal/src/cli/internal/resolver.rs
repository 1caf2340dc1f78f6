use std::time::Duration;

use snafu::{OptionExt, ResultExt};

use crate::{
    cli::{Error, PortalArgs, error},
    cluster::Kubectl,
    config::Config,
    identity::ResourceIdentity,
    relay::RelayConfig,
};

/// Combines command line arguments with the configuration. Arguments win.
pub struct PortalResolver<'c> {
    config: &'c Config,
}

/// The relay to open and the name it goes by.
#[derive(Clone, Debug)]
pub struct ResolvedPortal {
    pub identity: ResourceIdentity,
    pub relay: RelayConfig,
}

impl<'c> From<&'c Config> for PortalResolver<'c> {
    fn from(config: &'c Config) -> Self { Self { config } }
}

impl PortalResolver<'_> {
    /// # Errors
    ///
    /// Fails if the relay cannot be resolved or, without `--portal-name`, if
    /// the operator's user or host name is unavailable.
    pub fn resolve(&self, args: &PortalArgs) -> Result<ResolvedPortal, Error> {
        let relay = self.resolve_relay(args)?;
        let identity = Self::resolve_identity(args)?;
        Ok(ResolvedPortal { identity, relay })
    }

    pub fn resolve_identity(args: &PortalArgs) -> Result<ResourceIdentity, Error> {
        match args.name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => Ok(ResourceIdentity::explicit(name)),
            None => ResourceIdentity::current().context(error::HostInfoUnavailableSnafu),
        }
    }

    pub fn resolve_relay(&self, args: &PortalArgs) -> Result<RelayConfig, Error> {
        let Self { config } = self;
        let name = args.relay.clone().unwrap_or_else(|| config.default_relay.clone());
        let spec = config
            .find_relay_by_name(&name)
            .with_context(|| error::RelayNotFoundSnafu { name: name.clone() })?;

        let image = args
            .image
            .clone()
            .or_else(|| spec.image().map(ToString::to_string))
            .with_context(|| error::MissingRelayImageSnafu { name: name.clone() })?;
        let container_port =
            spec.container_port().with_context(|| error::MissingRelayPortSnafu { name })?;

        Ok(RelayConfig {
            kind: spec.kind,
            namespace: args.namespace.clone().filter(|namespace| !namespace.is_empty()),
            image,
            image_pull_policy: args.pull_policy.unwrap_or(spec.image_pull_policy),
            container_port,
            local_address: args.address.unwrap_or(config.address),
            local_port: args.port.unwrap_or(config.local_port),
            cluster_domain: args
                .cluster_domain
                .clone()
                .unwrap_or_else(|| config.cluster_domain.clone()),
            command: spec.command(),
            args: spec.args(),
        })
    }

    pub fn control_plane(&self, args: &PortalArgs) -> Kubectl {
        let timeout = args.timeout_secs.unwrap_or(self.config.wait_timeout_seconds);
        Kubectl::new(self.config.kubectl_program.clone(), Duration::from_secs(timeout))
    }
}
