//! Relay workloads that can back a portal.
//!
//! Each [`RelayKind`] knows its default image, the port it listens on inside
//! the pod, the files it needs mounted from the paired config map, and how it
//! is started. [`RelayConfig`] is the fully resolved, immutable description of
//! the relay for one invocation.

use std::{fmt, net::IpAddr};

use portal_base::consts::relay::CLUSTER_DOMAIN_ENV;
use serde::{Deserialize, Serialize};

use crate::{cluster::ForwardSpec, config::ImagePullPolicy};

/// Stands for the container port in relay files that cannot read it from the
/// environment.
const LISTEN_PORT_PLACEHOLDER: &str = "@LISTEN_PORT@";

/// A file the relay reads, shipped through the config map.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RelayFile {
    /// Key in the config map, also used as the mount's `subPath`.
    pub key: &'static str,
    /// Absolute path inside the relay container.
    pub mount_path: &'static str,
    pub contents: &'static str,
}

const OPENRESTY_FILES: &[RelayFile] = &[
    RelayFile {
        key: "nginx.conf",
        mount_path: "/usr/local/openresty/nginx/conf/nginx.conf",
        contents: include_str!("../../assets/openresty/nginx.conf"),
    },
    RelayFile {
        key: "default.conf",
        mount_path: "/etc/nginx/conf.d/default.conf",
        contents: include_str!("../../assets/openresty/default.conf"),
    },
    RelayFile {
        key: "access.lua",
        mount_path: "/app/access.lua",
        contents: include_str!("../../assets/openresty/access.lua"),
    },
];

const GOPROXY_FILES: &[RelayFile] = &[
    RelayFile {
        key: "go.mod",
        mount_path: "/app/go.mod",
        contents: include_str!("../../assets/goproxy/go.mod"),
    },
    RelayFile {
        key: "main.go",
        mount_path: "/app/main.go",
        contents: include_str!("../../assets/goproxy/main.go"),
    },
];

const HCPROXY_FILES: &[RelayFile] = &[RelayFile {
    key: "hcproxy.py",
    mount_path: "/app/hcproxy.py",
    contents: include_str!("../../assets/hcproxy/hcproxy.py"),
}];

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    /// HTTP proxy served by OpenResty, expanding short service names.
    #[default]
    Openresty,
    /// HTTP proxy compiled and run from source with the Go toolchain image.
    Goproxy,
    /// HTTP CONNECT proxy on the Python standard library.
    Hcproxy,
    /// A user supplied image; nothing is mounted.
    Custom,
}

impl RelayKind {
    pub const ALL: [Self; 4] = [Self::Openresty, Self::Goproxy, Self::Hcproxy, Self::Custom];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Openresty => "openresty",
            Self::Goproxy => "goproxy",
            Self::Hcproxy => "hcproxy",
            Self::Custom => "custom",
        }
    }

    pub const fn default_image(self) -> Option<&'static str> {
        match self {
            Self::Openresty => Some("openresty/openresty:1.21.4.1-0-jammy"),
            Self::Goproxy => Some("golang:1.22.1"),
            Self::Hcproxy => Some("python:3.12-alpine"),
            Self::Custom => None,
        }
    }

    /// Port the relay process listens on inside the pod.
    pub const fn default_container_port(self) -> Option<u16> {
        match self {
            Self::Openresty => Some(80),
            Self::Goproxy | Self::Hcproxy => Some(8080),
            Self::Custom => None,
        }
    }

    pub const fn files(self) -> &'static [RelayFile] {
        match self {
            Self::Openresty => OPENRESTY_FILES,
            Self::Goproxy => GOPROXY_FILES,
            Self::Hcproxy => HCPROXY_FILES,
            Self::Custom => &[],
        }
    }

    pub fn default_command(self) -> Vec<String> {
        match self {
            Self::Openresty | Self::Custom => Vec::new(),
            // The Go relay is tiny, so building it at start-up avoids maintaining
            // a dedicated image.
            Self::Goproxy => vec!["/bin/bash".to_string()],
            Self::Hcproxy => vec!["python3".to_string(), "/app/hcproxy.py".to_string()],
        }
    }

    pub fn default_args(self) -> Vec<String> {
        match self {
            Self::Goproxy => {
                vec!["-c".to_string(), "cd /app && go mod tidy && go run .".to_string()]
            }
            Self::Openresty | Self::Hcproxy | Self::Custom => Vec::new(),
        }
    }

    /// Environment variable through which the relay learns its listen port.
    const fn port_env(self) -> Option<&'static str> {
        match self {
            Self::Goproxy => Some("KUBECTL_PORTAL_PROXY_PORT"),
            Self::Hcproxy => Some("HCPROXY_PORT"),
            Self::Openresty | Self::Custom => None,
        }
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Everything needed to render and reach one relay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayConfig {
    pub kind: RelayKind,
    /// Requested namespace; `None` defers to the client's current context.
    pub namespace: Option<String>,
    pub image: String,
    pub image_pull_policy: ImagePullPolicy,
    pub container_port: u16,
    pub local_address: IpAddr,
    pub local_port: u16,
    pub cluster_domain: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
}

impl RelayConfig {
    /// Environment entries injected into the relay container.
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![(CLUSTER_DOMAIN_ENV.to_string(), self.cluster_domain.clone())];
        if let Some(name) = self.kind.port_env() {
            env.push((name.to_string(), self.container_port.to_string()));
        }
        env
    }

    /// Contents of `file` as stored in the config map, with the container port
    /// filled in.
    pub fn file_contents(&self, file: &RelayFile) -> String {
        file.contents.replace(LISTEN_PORT_PLACEHOLDER, &self.container_port.to_string())
    }

    pub const fn forward_spec(&self) -> ForwardSpec {
        ForwardSpec {
            local_address: self.local_address,
            local_port: self.local_port,
            remote_port: self.container_port,
        }
    }
}
