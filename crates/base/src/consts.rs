pub mod k8s {
    pub mod labels {
        pub const NAME: &str = "app.kubernetes.io/name";
        pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    }

    pub mod annotations {
        use std::sync::LazyLock;

        use crate::PROJECT_NAME;

        pub static VERSION: LazyLock<String> = LazyLock::new(|| format!("{PROJECT_NAME}.version"));
    }

    /// Resource kinds created for every relay, in the form accepted by
    /// `kubectl delete`.
    pub const RELAY_RESOURCE_KINDS: &str = "pod,configmap";

    pub const RELAY_CONTAINER_NAME: &str = "proxy";
    pub const RELAY_VOLUME_NAME: &str = "proxy-volume";
}

pub mod identity {
    /// Every derived relay name starts with this tag.
    pub const RESOURCE_NAME_PREFIX: &str = "kubectl-portal-proxy-";

    /// Number of hex characters of the digest kept in a derived name.
    pub const NAME_HASH_LENGTH: usize = 10;
}

pub mod relay {
    /// Environment variable carrying the cluster DNS suffix into the relay.
    pub const CLUSTER_DOMAIN_ENV: &str = "KUBECTL_PORTAL_CLUSTER_DOMAIN";

    pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";
    pub const DEFAULT_RELAY: &str = "openresty";
    pub const DEFAULT_LOCAL_PORT: u16 = 7070;
    pub const DEFAULT_WAIT_TIMEOUT_SECONDS: u64 = 60;
    pub const READINESS_PERIOD_SECONDS: i32 = 1;
}

pub const DEFAULT_KUBECTL_PROGRAM: &str = "kubectl";
