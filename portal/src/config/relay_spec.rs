use serde::{Deserialize, Serialize};

use crate::{config::ImagePullPolicy, relay::RelayKind};

/// A named relay preset from the configuration file.
///
/// Unset fields fall back to what the relay kind ships with.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySpec {
    pub name: String,

    pub kind: RelayKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default)]
    pub image_pull_policy: ImagePullPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl RelaySpec {
    /// One preset per built-in relay kind, named after the kind.
    pub fn builtin() -> Vec<Self> {
        RelayKind::ALL.into_iter().filter(|kind| *kind != RelayKind::Custom).map(Self::from).collect()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().or_else(|| self.kind.default_image())
    }

    pub fn container_port(&self) -> Option<u16> {
        self.container_port.or_else(|| self.kind.default_container_port())
    }

    pub fn command(&self) -> Vec<String> {
        if self.command.is_empty() { self.kind.default_command() } else { self.command.clone() }
    }

    pub fn args(&self) -> Vec<String> {
        if self.args.is_empty() { self.kind.default_args() } else { self.args.clone() }
    }
}

impl From<RelayKind> for RelaySpec {
    fn from(kind: RelayKind) -> Self {
        Self {
            name: kind.to_string(),
            kind,
            image: None,
            image_pull_policy: ImagePullPolicy::default(),
            container_port: None,
            command: Vec::new(),
            args: Vec::new(),
        }
    }
}
