use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{source}"))]
    Configuration { source: crate::config::Error },

    #[snafu(display("{source}"))]
    Session { source: crate::session::Error },

    #[snafu(display("Unable to derive the relay name, error: {source}"))]
    HostInfoUnavailable { source: crate::identity::Error },

    #[snafu(display("Relay '{name}' is not found in the configuration"))]
    RelayNotFound { name: String },

    #[snafu(display("Relay '{name}' has no image, set one with --portal-image"))]
    MissingRelayImage { name: String },

    #[snafu(display("Relay '{name}' has no container port configured"))]
    MissingRelayPort { name: String },

    #[snafu(display("Failed to delete relay {name}, error: {source}"))]
    ResourceDeleteFailed { name: String, source: crate::cluster::Error },

    #[snafu(display("Failed to serialize manifests, error: {source}"))]
    SerializeManifest { source: serde_json::Error },

    #[snafu(display("Failed to render manifests as YAML, error: {source}"))]
    RenderManifest { source: serde_yaml::Error },

    #[snafu(display("Failed to serialize the default configuration, error: {source}"))]
    SerializeConfig { source: serde_yaml::Error },

    #[snafu(display("Failed to write to stdout, error: {source}"))]
    WriteStdout { source: std::io::Error },

    #[snafu(display("Failed to create tokio runtime, error: {source}"))]
    InitializeTokioRuntime { source: std::io::Error },
}

impl From<crate::config::Error> for Error {
    fn from(source: crate::config::Error) -> Self { Self::Configuration { source } }
}

impl From<crate::session::Error> for Error {
    fn from(source: crate::session::Error) -> Self { Self::Session { source } }
}
