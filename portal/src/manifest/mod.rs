//! Kubernetes documents describing one relay.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{
        ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, Pod, PodSpec, Probe,
        TCPSocketAction, Volume, VolumeMount,
    },
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
use portal_base::consts::{
    k8s::{RELAY_CONTAINER_NAME, RELAY_VOLUME_NAME, annotations, labels},
    relay::READINESS_PERIOD_SECONDS,
};

use crate::{identity::ResourceIdentity, relay::RelayConfig};

/// The relay pod and the config map it mounts its files from.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestSet {
    pub workload: Pod,
    pub config_data: ConfigMap,
}

impl ManifestSet {
    /// Builds both documents for `identity`.
    ///
    /// Volume mounts and config map keys come from the same list of relay
    /// files, so every `subPath` always has a matching key.
    pub fn build(identity: &ResourceIdentity, config: &RelayConfig) -> Self {
        let files = config.kind.files();
        let port = i32::from(config.container_port);

        let data = files
            .iter()
            .map(|file| (file.key.to_string(), config.file_contents(file)))
            .collect::<BTreeMap<_, _>>();

        let volume_mounts = files
            .iter()
            .map(|file| VolumeMount {
                name: RELAY_VOLUME_NAME.to_string(),
                mount_path: file.mount_path.to_string(),
                sub_path: Some(file.key.to_string()),
                ..VolumeMount::default()
            })
            .collect::<Vec<_>>();

        let env = config
            .env()
            .into_iter()
            .map(|(name, value)| EnvVar { name, value: Some(value), ..EnvVar::default() })
            .collect::<Vec<_>>();

        let container = Container {
            name: RELAY_CONTAINER_NAME.to_string(),
            image: Some(config.image.clone()),
            image_pull_policy: Some(config.image_pull_policy.to_string()),
            command: (!config.command.is_empty()).then(|| config.command.clone()),
            args: (!config.args.is_empty()).then(|| config.args.clone()),
            ports: Some(vec![ContainerPort { container_port: port, ..ContainerPort::default() }]),
            env: Some(env),
            volume_mounts: (!volume_mounts.is_empty()).then_some(volume_mounts),
            readiness_probe: Some(Probe {
                tcp_socket: Some(TCPSocketAction {
                    port: IntOrString::Int(port),
                    ..TCPSocketAction::default()
                }),
                period_seconds: Some(READINESS_PERIOD_SECONDS),
                ..Probe::default()
            }),
            ..Container::default()
        };

        let volumes = (!files.is_empty()).then(|| {
            vec![Volume {
                name: RELAY_VOLUME_NAME.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: identity.to_string(),
                    ..ConfigMapVolumeSource::default()
                }),
                ..Volume::default()
            }]
        });

        let workload = Pod {
            metadata: ObjectMeta {
                annotations: Some(BTreeMap::from_iter([(
                    annotations::VERSION.to_string(),
                    portal_base::PROJECT_VERSION.to_string(),
                )])),
                ..object_meta(identity, config)
            },
            spec: Some(PodSpec { containers: vec![container], volumes, ..PodSpec::default() }),
            ..Pod::default()
        };

        let config_data = ConfigMap {
            metadata: object_meta(identity, config),
            data: Some(data),
            ..ConfigMap::default()
        };

        Self { workload, config_data }
    }

    /// Serializes the pod followed by the config map, one JSON document per
    /// line, the form `kubectl apply -f -` reads from standard input.
    ///
    /// # Errors
    ///
    /// Fails only if a document cannot be serialized.
    pub fn to_apply_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut payload = serde_json::to_vec(&self.workload)?;
        payload.push(b'\n');
        payload.extend(serde_json::to_vec(&self.config_data)?);
        payload.push(b'\n');
        Ok(payload)
    }

    /// Both documents as YAML, separated the way `kubectl` prints lists.
    ///
    /// # Errors
    ///
    /// Fails only if a document cannot be serialized.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        Ok(format!(
            "{}---\n{}",
            serde_yaml::to_string(&self.workload)?,
            serde_yaml::to_string(&self.config_data)?
        ))
    }
}

fn object_meta(identity: &ResourceIdentity, config: &RelayConfig) -> ObjectMeta {
    let labels = BTreeMap::from_iter([
        (labels::NAME.to_string(), identity.to_string()),
        (labels::MANAGED_BY.to_string(), portal_base::PROJECT_NAME.to_string()),
    ]);

    ObjectMeta {
        name: Some(identity.as_str().to_owned()),
        namespace: config.namespace.clone(),
        labels: Some(labels),
        ..ObjectMeta::default()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        net::{IpAddr, Ipv4Addr},
    };

    use portal_base::consts::relay::CLUSTER_DOMAIN_ENV;

    use super::*;
    use crate::{config::ImagePullPolicy, relay::RelayKind};

    fn relay_config(kind: RelayKind) -> RelayConfig {
        RelayConfig {
            kind,
            namespace: Some("dev".to_string()),
            image: kind.default_image().unwrap_or("ubuntu/squid:latest").to_string(),
            image_pull_policy: ImagePullPolicy::Always,
            container_port: kind.default_container_port().unwrap_or(3128),
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 7070,
            cluster_domain: "cluster.local".to_string(),
            command: kind.default_command(),
            args: kind.default_args(),
        }
    }

    fn container(manifests: &ManifestSet) -> &Container {
        &manifests.workload.spec.as_ref().unwrap().containers[0]
    }

    fn assert_mounts_match_config_data(manifests: &ManifestSet) {
        let keys = manifests
            .config_data
            .data
            .as_ref()
            .map(|data| data.keys().cloned().collect::<BTreeSet<_>>())
            .unwrap_or_default();

        for mount in container(manifests).volume_mounts.iter().flatten() {
            let sub_path = mount.sub_path.as_ref().unwrap();
            assert!(keys.contains(sub_path), "subPath {sub_path} has no config map key");
        }

        let volumes = manifests.workload.spec.as_ref().unwrap().volumes.clone().unwrap_or_default();
        for volume in &volumes {
            assert_eq!(
                Some(&volume.config_map.as_ref().unwrap().name),
                manifests.config_data.metadata.name.as_ref()
            );
        }
    }

    #[test]
    fn test_mounts_match_config_data_for_every_kind() {
        let identity = ResourceIdentity::derive("alice", "devbox");
        for kind in RelayKind::ALL {
            let config = relay_config(kind);
            let manifests = ManifestSet::build(&identity, &config);
            assert_mounts_match_config_data(&manifests);
            assert_eq!(
                container(&manifests).volume_mounts.iter().flatten().count(),
                kind.files().len()
            );
        }
    }

    #[test]
    fn test_mounts_match_config_data_with_overrides() {
        let identity = ResourceIdentity::explicit("my-proxy");
        for kind in RelayKind::ALL {
            let config = RelayConfig {
                namespace: None,
                container_port: 9999,
                image: "registry.example.com/relay:2".to_string(),
                command: vec!["/bin/sh".to_string()],
                args: Vec::new(),
                ..relay_config(kind)
            };
            let manifests = ManifestSet::build(&identity, &config);
            assert_mounts_match_config_data(&manifests);
            assert_eq!(manifests.workload.metadata.namespace, None);
            assert_eq!(manifests.config_data.metadata.namespace, None);
        }
    }

    #[test]
    fn test_documents_share_name_namespace_and_labels() {
        let identity = ResourceIdentity::derive("alice", "devbox");
        let manifests = ManifestSet::build(&identity, &relay_config(RelayKind::Openresty));

        let pod_meta = &manifests.workload.metadata;
        let config_meta = &manifests.config_data.metadata;
        assert_eq!(pod_meta.name.as_deref(), Some(identity.as_str()));
        assert_eq!(pod_meta.name, config_meta.name);
        assert_eq!(pod_meta.namespace.as_deref(), Some("dev"));
        assert_eq!(pod_meta.namespace, config_meta.namespace);
        assert_eq!(pod_meta.labels, config_meta.labels);
        assert_eq!(
            pod_meta.labels.as_ref().unwrap().get(labels::MANAGED_BY).map(String::as_str),
            Some(portal_base::PROJECT_NAME)
        );
        assert!(pod_meta.annotations.as_ref().unwrap().contains_key(annotations::VERSION.as_str()));
    }

    #[test]
    fn test_container_shape() {
        let identity = ResourceIdentity::derive("alice", "devbox");
        let manifests = ManifestSet::build(&identity, &relay_config(RelayKind::Goproxy));
        let container = container(&manifests);

        assert_eq!(container.image.as_deref(), Some("golang:1.22.1"));
        assert_eq!(container.image_pull_policy.as_deref(), Some("Always"));
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 8080);
        assert_eq!(container.command, Some(vec!["/bin/bash".to_string()]));
        assert_eq!(container.args.as_ref().unwrap()[0], "-c");

        let probe = container.readiness_probe.as_ref().unwrap();
        assert_eq!(probe.tcp_socket.as_ref().unwrap().port, IntOrString::Int(8080));
        assert_eq!(probe.period_seconds, Some(1));

        let env = container.env.as_ref().unwrap();
        assert!(env.iter().any(|var| var.name == CLUSTER_DOMAIN_ENV
            && var.value.as_deref() == Some("cluster.local")));
        assert!(env.iter().any(|var| var.name == "KUBECTL_PORTAL_PROXY_PORT"
            && var.value.as_deref() == Some("8080")));
    }

    #[test]
    fn test_openresty_port_override_reaches_listen_directive() {
        let identity = ResourceIdentity::derive("alice", "devbox");
        let config = RelayConfig { container_port: 8000, ..relay_config(RelayKind::Openresty) };
        let manifests = ManifestSet::build(&identity, &config);

        let probe = container(&manifests).readiness_probe.as_ref().unwrap();
        assert_eq!(probe.tcp_socket.as_ref().unwrap().port, IntOrString::Int(8000));
        assert_eq!(config.forward_spec().remote_port, 8000);

        let default_conf = &manifests.config_data.data.as_ref().unwrap()["default.conf"];
        assert!(default_conf.contains("listen 8000 default_server;"), "{default_conf}");
        assert!(!default_conf.contains("listen 80 "));
    }

    #[test]
    fn test_custom_relay_is_degenerate() {
        let identity = ResourceIdentity::derive("alice", "devbox");
        let manifests = ManifestSet::build(&identity, &relay_config(RelayKind::Custom));
        let container = container(&manifests);

        assert!(container.volume_mounts.is_none());
        assert!(container.command.is_none());
        assert!(container.args.is_none());
        assert!(manifests.workload.spec.as_ref().unwrap().volumes.is_none());
        assert_eq!(manifests.config_data.data, Some(BTreeMap::new()));
    }

    #[test]
    fn test_apply_payload_is_pod_then_config_map() {
        let identity = ResourceIdentity::derive("alice", "devbox");
        let manifests = ManifestSet::build(&identity, &relay_config(RelayKind::Hcproxy));
        let payload = manifests.to_apply_payload().unwrap();
        let text = String::from_utf8(payload).unwrap();

        let documents = text.lines().collect::<Vec<_>>();
        assert_eq!(documents.len(), 2);

        let pod: serde_json::Value = serde_json::from_str(documents[0]).unwrap();
        let config_map: serde_json::Value = serde_json::from_str(documents[1]).unwrap();
        assert_eq!(pod["kind"], "Pod");
        assert_eq!(pod["apiVersion"], "v1");
        assert_eq!(config_map["kind"], "ConfigMap");
        assert_eq!(
            pod["spec"]["containers"][0]["volumeMounts"][0]["subPath"],
            serde_json::Value::from("hcproxy.py")
        );
        assert!(config_map["data"]["hcproxy.py"].is_string());
    }

    #[test]
    fn test_yaml_rendering_contains_both_documents() {
        let identity = ResourceIdentity::derive("alice", "devbox");
        let manifests = ManifestSet::build(&identity, &relay_config(RelayKind::Openresty));
        let yaml = manifests.to_yaml().unwrap();
        assert!(yaml.contains("kind: Pod"));
        assert!(yaml.contains("kind: ConfigMap"));
        assert!(yaml.contains("\n---\n"));
    }
}
