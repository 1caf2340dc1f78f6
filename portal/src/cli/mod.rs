//! Command line of `kubectl-portal`.
//!
//! Without a subcommand the tool opens a portal: a relay pod is started in
//! the cluster and a local port is forwarded to it until Ctrl+C.
//!
//! ```bash
//! # Open a portal with the default relay on 127.0.0.1:7070
//! kubectl portal
//!
//! # Use the Go relay in namespace `dev` on port 8080
//! kubectl portal -n dev --portal-relay goproxy --portal-port 8080
//!
//! # Show what would be applied
//! kubectl portal render -o yaml
//!
//! # Remove a relay left behind by a killed session
//! kubectl portal cleanup
//! ```

mod cleanup;
pub mod error;
mod internal;
mod portal;
mod relays;
mod render;

use std::{io::Write, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use portal_base::CLI_PROGRAM_NAME;
use snafu::ResultExt;
use tokio::runtime::Runtime;

pub use self::{error::Error, portal::PortalArgs};
use self::{cleanup::CleanupCommand, relays::RelaysCommand, render::RenderCommand};
use crate::{config::Config, shadow};

#[derive(Parser)]
#[command(
    name = CLI_PROGRAM_NAME,
    author,
    version,
    long_version = shadow::CLAP_LONG_VERSION,
    about = "Open a local port that tunnels into a Kubernetes cluster.",
    long_about = "kubectl-portal starts a short-lived relay pod in the cluster, forwards a local \
                  port to it and removes the relay again when the portal is closed. Nothing has \
                  to be installed in the cluster beforehand.",
    color = clap::ColorChoice::Always
)]
pub struct Cli {
    #[clap(subcommand)]
    commands: Option<Commands>,

    #[command(flatten)]
    portal: PortalArgs,

    #[clap(
        long = "config",
        short = 'c',
        env = "KUBECTL_PORTAL_CONFIG_FILE_PATH",
        global = true,
        help = "Specify a configuration file. Defaults to ~/.config/kubectl-portal/config.yaml or \
                KUBECTL_PORTAL_CONFIG_FILE_PATH env var."
    )]
    config_file: Option<PathBuf>,

    #[clap(
        long = "log-level",
        env = "KUBECTL_PORTAL_LOG_LEVEL",
        global = true,
        help = "Set the logging level (e.g., info, debug, trace)."
    )]
    log_level: Option<tracing::Level>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Display version information")]
    Version,

    #[command(about = "Generate shell completion script for the specified shell (bash, zsh, fish)")]
    Completions { shell: clap_complete::Shell },

    #[command(about = "Output the default configuration in YAML format")]
    DefaultConfig,

    #[command(alias = "l", about = "List the configured relay presets")]
    Relays(RelaysCommand),

    #[command(about = "Print the manifests of the relay without contacting the cluster")]
    Render(RenderCommand),

    #[command(about = "Delete the relay resources of this user and host")]
    Cleanup(CleanupCommand),
}

impl Default for Cli {
    fn default() -> Self { Self::parse() }
}

impl Cli {
    /// Loads the configuration file, then applies `--portal-verbose` and
    /// `--log-level`, the latter taking precedence.
    fn load_config(&self) -> Result<Config, Error> {
        let mut config = match &self.config_file {
            Some(path) => Config::load(path)?,
            None => Config::load_or_default()?,
        };

        if self.portal.verbose {
            config.log.level = tracing::Level::DEBUG;
        }
        if let Some(log_level) = self.log_level {
            config.log.level = log_level;
        }

        Ok(config)
    }

    /// Runs the selected command and returns the process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, the runtime
    /// cannot be created or the command fails.
    pub fn run(self) -> Result<i32, Error> {
        match self.commands {
            Some(Commands::Version) => {
                let client_version = Self::command().get_version().unwrap_or_default().to_string();
                let mut stdout = std::io::stdout();
                stdout
                    .write_all(Self::command().render_long_version().as_bytes())
                    .context(error::WriteStdoutSnafu)?;
                stdout
                    .write_all(format!("Client Version: {client_version}\n").as_bytes())
                    .context(error::WriteStdoutSnafu)?;
                return Ok(0);
            }
            Some(Commands::Completions { shell }) => {
                let mut app = Self::command();
                let bin_name = app.get_name().to_string();
                clap_complete::generate(shell, &mut app, bin_name, &mut std::io::stdout());
                return Ok(0);
            }
            Some(Commands::DefaultConfig) => {
                let template = Config::template_basic().context(error::SerializeConfigSnafu)?;
                std::io::stdout()
                    .write_all(template.as_bytes())
                    .context(error::WriteStdoutSnafu)?;
                return Ok(0);
            }
            _ => {}
        }

        let config = self.load_config()?;
        config.log.registry();

        let Self { commands, portal, .. } = self;
        let fut = async move {
            match commands {
                Some(Commands::Relays(cmd)) => cmd.run(config).await?,
                Some(Commands::Render(cmd)) => cmd.run(&portal, config).await?,
                Some(Commands::Cleanup(cmd)) => cmd.run(&portal, config).await?,
                Some(Commands::Version | Commands::Completions { .. } | Commands::DefaultConfig) => {
                }
                None => portal.run(config).await?,
            }

            Ok(0)
        };

        Runtime::new().context(error::InitializeTokioRuntimeSnafu)?.block_on(fut)
    }
}
