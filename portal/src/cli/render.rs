use clap::{Args, ValueEnum};
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::{
    cli::{
        Error, PortalArgs, error,
        internal::{PortalResolver, ResolvedPortal},
    },
    config::Config,
    manifest::ManifestSet,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    /// The exact payload passed to `kubectl apply`.
    Json,
}

#[derive(Args, Clone)]
pub struct RenderCommand {
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t = OutputFormat::Yaml,
        help = "Output format of the manifests."
    )]
    pub output: OutputFormat,
}

impl RenderCommand {
    /// Prints the manifests a portal would apply, without contacting the
    /// cluster.
    ///
    /// # Errors
    ///
    /// Fails if the relay cannot be resolved, the manifests cannot be
    /// serialized or standard output cannot be written.
    pub async fn run(self, portal: &PortalArgs, config: Config) -> Result<(), Error> {
        let ResolvedPortal { identity, relay } = PortalResolver::from(&config).resolve(portal)?;
        let manifests = ManifestSet::build(&identity, &relay);

        let rendered = match self.output {
            OutputFormat::Yaml => {
                manifests.to_yaml().context(error::RenderManifestSnafu)?.into_bytes()
            }
            OutputFormat::Json => {
                manifests.to_apply_payload().context(error::SerializeManifestSnafu)?
            }
        };

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&rendered).await.context(error::WriteStdoutSnafu)?;
        stdout.flush().await.context(error::WriteStdoutSnafu)
    }
}
