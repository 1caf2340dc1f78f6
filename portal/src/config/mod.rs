mod error;
mod image_pull_policy;
mod log;
mod relay_spec;

use std::{
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

use portal_base::consts::{
    DEFAULT_KUBECTL_PROGRAM,
    relay::{DEFAULT_CLUSTER_DOMAIN, DEFAULT_LOCAL_PORT, DEFAULT_RELAY, DEFAULT_WAIT_TIMEOUT_SECONDS},
};
use resolve_path::PathResolveExt;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

pub use self::{
    error::Error, image_pull_policy::ImagePullPolicy, log::LogConfig, relay_spec::RelaySpec,
};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Control-plane client used for every cluster operation.
    #[serde(default = "default_kubectl_program")]
    pub kubectl_program: PathBuf,

    #[serde(default = "default_relay")]
    pub default_relay: String,

    #[serde(default = "default_local_port")]
    pub local_port: u16,

    #[serde(default = "default_address")]
    pub address: IpAddr,

    #[serde(default = "default_cluster_domain")]
    pub cluster_domain: String,

    #[serde(default = "default_wait_timeout_seconds")]
    pub wait_timeout_seconds: u64,

    #[serde(default = "RelaySpec::builtin")]
    pub relays: Vec<RelaySpec>,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubectl_program: default_kubectl_program(),
            default_relay: default_relay(),
            local_port: default_local_port(),
            address: default_address(),
            cluster_domain: default_cluster_domain(),
            wait_timeout_seconds: default_wait_timeout_seconds(),
            relays: RelaySpec::builtin(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn search_config_file_path() -> PathBuf {
        let paths = vec![Self::default_path()]
            .into_iter()
            .chain(portal_base::fallback_project_config_directories().into_iter().map(|mut path| {
                path.push(portal_base::CLI_CONFIG_NAME);
                path
            }))
            .collect::<Vec<_>>();
        for path in paths {
            let Ok(exists) = path.try_exists() else {
                continue;
            };
            if exists {
                return path;
            }
        }
        Self::default_path()
    }

    #[inline]
    pub fn default_path() -> PathBuf {
        [portal_base::PROJECT_CONFIG_DIR.to_path_buf(), PathBuf::from(portal_base::CLI_CONFIG_NAME)]
            .into_iter()
            .collect()
    }

    /// Loads the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be resolved, read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut config: Self = {
            let path =
                path.as_ref().try_resolve().map(|path| path.to_path_buf()).with_context(|_| {
                    error::ResolveFilePathSnafu { file_path: path.as_ref().to_path_buf() }
                })?;
            let data =
                std::fs::read(&path).context(error::OpenConfigSnafu { filename: path.clone() })?;
            serde_yaml::from_slice(&data).context(error::ParseConfigSnafu { filename: path })?
        };

        config.log.file_path = match config.log.file_path.map(|path| {
            path.try_resolve()
                .map(|path| path.to_path_buf())
                .with_context(|_| error::ResolveFilePathSnafu { file_path: path.clone() })
        }) {
            Some(Ok(path)) => Some(path),
            Some(Err(err)) => return Err(err),
            None => None,
        };

        Ok(config)
    }

    /// Loads the first configuration file found on the search path, falling
    /// back to the defaults when there is none.
    ///
    /// # Errors
    ///
    /// Fails if a configuration file exists but cannot be read or parsed.
    pub fn load_or_default() -> Result<Self, Error> {
        let path = Self::search_config_file_path();
        if path.try_exists().unwrap_or(false) {
            Self::load(path)
        } else {
            tracing::debug!("No configuration file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn find_relay_by_name(&self, name: &str) -> Option<RelaySpec> {
        self.relays.iter().find(|spec| spec.name == name).cloned()
    }

    /// Default configuration rendered as YAML.
    ///
    /// # Errors
    ///
    /// Fails only if YAML serialization fails.
    pub fn template_basic() -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&Self::default())
    }
}

fn default_kubectl_program() -> PathBuf { PathBuf::from(DEFAULT_KUBECTL_PROGRAM) }

fn default_relay() -> String { DEFAULT_RELAY.to_string() }

const fn default_local_port() -> u16 { DEFAULT_LOCAL_PORT }

const fn default_address() -> IpAddr { IpAddr::V4(Ipv4Addr::LOCALHOST) }

fn default_cluster_domain() -> String { DEFAULT_CLUSTER_DOMAIN.to_string() }

const fn default_wait_timeout_seconds() -> u64 { DEFAULT_WAIT_TIMEOUT_SECONDS }
