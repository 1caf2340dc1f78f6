use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use portal_base::consts::k8s::RELAY_RESOURCE_KINDS;
use snafu::ResultExt;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{
    cluster::{ControlPlane, Error, ForwardSpec, TunnelProcess, error},
    identity::ResourceIdentity,
    manifest::ManifestSet,
};

/// [`ControlPlane`] backed by the `kubectl` command line client.
#[derive(Clone, Debug)]
pub struct Kubectl {
    program: PathBuf,
    wait_timeout: Duration,
}

impl Kubectl {
    pub fn new(program: impl Into<PathBuf>, wait_timeout: Duration) -> Self {
        Self { program: program.into(), wait_timeout }
    }

    pub fn program(&self) -> &Path { &self.program }

    fn delete_args(identity: &ResourceIdentity, namespace: Option<&str>) -> Vec<String> {
        scoped(namespace, [
            "delete".to_string(),
            RELAY_RESOURCE_KINDS.to_string(),
            identity.to_string(),
            "--ignore-not-found".to_string(),
        ])
    }

    fn apply_args(namespace: Option<&str>) -> Vec<String> {
        scoped(namespace, [
            "apply".to_string(),
            "-f".to_string(),
            "-".to_string(),
            "-o".to_string(),
            "jsonpath={.items[0].metadata.namespace}".to_string(),
        ])
    }

    fn wait_args(&self, identity: &ResourceIdentity, namespace: Option<&str>) -> Vec<String> {
        scoped(namespace, [
            "wait".to_string(),
            "--for=condition=Ready".to_string(),
            format!("pod/{identity}"),
            format!("--timeout={}s", self.wait_timeout.as_secs()),
        ])
    }

    fn port_forward_args(
        identity: &ResourceIdentity,
        namespace: Option<&str>,
        forward: ForwardSpec,
    ) -> Vec<String> {
        let ForwardSpec { local_address, local_port, remote_port } = forward;
        scoped(namespace, [
            "port-forward".to_string(),
            format!("pod/{identity}"),
            format!("{local_port}:{remote_port}"),
            "--address".to_string(),
            local_address.to_string(),
        ])
    }

    fn command(&self, args: &[String]) -> Command {
        tracing::debug!("Running: {}", self.command_line(args));

        let mut command = Command::new(&self.program);
        let _unused = command.args(args).kill_on_drop(true).process_group(0);
        command
    }

    fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.program.to_string_lossy())
            .chain(args.iter().map(|arg| Cow::Borrowed(arg.as_str())))
            .map(shell_escape::escape)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs one client invocation to completion and returns its trimmed
    /// standard output.
    async fn run(
        &self,
        verb: &'static str,
        args: &[String],
        input: Option<Vec<u8>>,
    ) -> Result<String, Error> {
        let mut command = self.command(args);
        let _unused = command
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|_| error::SpawnClientSnafu { program: self.program.clone() })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let (Some(mut stdin), Some(input)) = (stdin, input) {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.context(error::CollectOutputSnafu { verb })?;

        // An early exit closes the pipe, so the exit status explains more than
        // the write error does.
        if !output.status.success() {
            return error::ClientExitSnafu {
                verb,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .fail();
        }
        fed.context(error::WriteManifestsSnafu)?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ControlPlane for Kubectl {
    type Tunnel = TunnelProcess;

    async fn delete_if_exists(
        &self,
        identity: &ResourceIdentity,
        namespace: Option<&str>,
    ) -> Result<(), Error> {
        let _output = self.run("delete", &Self::delete_args(identity, namespace), None).await?;
        Ok(())
    }

    async fn apply(
        &self,
        manifests: &ManifestSet,
        namespace: Option<&str>,
    ) -> Result<String, Error> {
        let payload = manifests.to_apply_payload().context(error::SerializeManifestsSnafu)?;
        self.run("apply", &Self::apply_args(namespace), Some(payload)).await
    }

    async fn wait_for_ready(
        &self,
        identity: &ResourceIdentity,
        namespace: Option<&str>,
    ) -> Result<(), Error> {
        let _output = self.run("wait", &self.wait_args(identity, namespace), None).await?;
        Ok(())
    }

    fn stream_forward(
        &self,
        identity: &ResourceIdentity,
        namespace: Option<&str>,
        forward: ForwardSpec,
    ) -> Result<TunnelProcess, Error> {
        let mut command = self.command(&Self::port_forward_args(identity, namespace, forward));
        let _unused =
            command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::inherit());

        let child = command
            .spawn()
            .with_context(|_| error::SpawnClientSnafu { program: self.program.clone() })?;
        Ok(TunnelProcess::new(child))
    }

    fn delete_detached(&self, identity: &ResourceIdentity, namespace: Option<&str>) {
        let args = Self::delete_args(identity, namespace);
        tracing::debug!("Running: {}", self.command_line(&args));

        let result = std::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match result {
            Ok(output) if output.status.success() => {
                tracing::info!("Removed relay {identity}");
            }
            Ok(output) => tracing::warn!(
                "Failed to remove relay {identity}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(err) => tracing::warn!("Failed to remove relay {identity}, error: {err}"),
        }
    }
}

fn scoped<const N: usize>(namespace: Option<&str>, args: [String; N]) -> Vec<String> {
    namespace
        .into_iter()
        .flat_map(|namespace| ["--namespace".to_string(), namespace.to_string()])
        .chain(args)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        net::{IpAddr, Ipv4Addr},
        os::unix::fs::PermissionsExt,
    };

    use super::*;
    use crate::{
        cluster::{Tunnel, TunnelExit},
        config::ImagePullPolicy,
        relay::{RelayConfig, RelayKind},
    };

    /// A stand-in for `kubectl` that appends its arguments and standard input
    /// to files in `dir`, then behaves according to `body`.
    fn fake_kubectl(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("kubectl");
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{calls}'\n{body}\n",
            calls = dir.join("calls").display()
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("calls"))
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    fn identity() -> ResourceIdentity { ResourceIdentity::derive("alice", "devbox") }

    #[test]
    fn test_namespace_scoping() {
        let identity = identity();
        assert_eq!(Kubectl::delete_args(&identity, None), [
            "delete",
            "pod,configmap",
            identity.as_str(),
            "--ignore-not-found"
        ]);
        assert_eq!(&Kubectl::delete_args(&identity, Some("dev"))[..2], ["--namespace", "dev"]);
        assert_eq!(Kubectl::apply_args(None).last().map(String::as_str), Some(
            "jsonpath={.items[0].metadata.namespace}"
        ));
    }

    #[test]
    fn test_wait_and_forward_args() {
        let identity = identity();
        let kubectl = Kubectl::new("kubectl", Duration::from_secs(45));
        assert_eq!(kubectl.wait_args(&identity, Some("dev")), [
            "--namespace".to_string(),
            "dev".to_string(),
            "wait".to_string(),
            "--for=condition=Ready".to_string(),
            format!("pod/{identity}"),
            "--timeout=45s".to_string(),
        ]);

        let forward = ForwardSpec {
            local_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            local_port: 7070,
            remote_port: 80,
        };
        assert_eq!(Kubectl::port_forward_args(&identity, None, forward), [
            "port-forward".to_string(),
            format!("pod/{identity}"),
            "7070:80".to_string(),
            "--address".to_string(),
            "0.0.0.0".to_string(),
        ]);
    }

    #[test]
    fn test_command_line_is_shell_escaped() {
        let kubectl = Kubectl::new("kubectl", Duration::from_secs(60));
        let line = kubectl.command_line(&Kubectl::apply_args(Some("my ns")));
        assert_eq!(
            line,
            "kubectl --namespace 'my ns' apply -f - -o 'jsonpath={.items[0].metadata.namespace}'"
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = Kubectl::new(fake_kubectl(dir.path(), "exit 0"), Duration::from_secs(60));

        kubectl.delete_if_exists(&identity(), Some("dev")).await.unwrap();
        kubectl.delete_if_exists(&identity(), Some("dev")).await.unwrap();

        let calls = calls(dir.path());
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|call| call.ends_with("--ignore-not-found")));
    }

    #[tokio::test]
    async fn test_failed_delete_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = Kubectl::new(
            fake_kubectl(dir.path(), "echo 'forbidden: no access' >&2\nexit 1"),
            Duration::from_secs(60),
        );

        let err = kubectl.delete_if_exists(&identity(), None).await.unwrap_err();
        assert!(matches!(err, Error::ClientExit { verb: "delete", .. }));
        assert!(err.to_string().contains("forbidden: no access"));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_multi_line_stderr_is_reported_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = Kubectl::new(
            fake_kubectl(
                dir.path(),
                "cat > /dev/null\necho 'error: pods is forbidden' >&2\n\
                 echo '' >&2\necho 'error: configmaps is forbidden' >&2\nexit 1",
            ),
            Duration::from_secs(60),
        );
        let manifests = ManifestSet::build(&identity(), &RelayConfig {
            kind: RelayKind::Hcproxy,
            namespace: None,
            image: "python:3.12-alpine".to_string(),
            image_pull_policy: ImagePullPolicy::IfNotPresent,
            container_port: 8080,
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 7070,
            cluster_domain: "cluster.local".to_string(),
            command: Vec::new(),
            args: Vec::new(),
        });

        let err = kubectl.apply(&manifests, None).await.unwrap_err();
        let message = err.to_string();
        assert!(!message.contains('\n'), "{message}");
        assert!(
            message.ends_with("error: pods is forbidden; error: configmaps is forbidden"),
            "{message}"
        );
    }

    #[tokio::test]
    async fn test_apply_pipes_manifests_and_returns_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let stdin = dir.path().join("stdin");
        let kubectl = Kubectl::new(
            fake_kubectl(dir.path(), &format!("cat > '{}'\necho '  team-a  '", stdin.display())),
            Duration::from_secs(60),
        );

        let config = RelayConfig {
            kind: RelayKind::Openresty,
            namespace: None,
            image: "openresty/openresty:1.21.4.1-0-jammy".to_string(),
            image_pull_policy: ImagePullPolicy::IfNotPresent,
            container_port: 80,
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 7070,
            cluster_domain: "cluster.local".to_string(),
            command: Vec::new(),
            args: Vec::new(),
        };
        let manifests = ManifestSet::build(&identity(), &config);

        let namespace = kubectl.apply(&manifests, None).await.unwrap();
        assert_eq!(namespace, "team-a");
        assert_eq!(fs::read(&stdin).unwrap(), manifests.to_apply_payload().unwrap());
        assert_eq!(calls(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout_is_recognised() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = Kubectl::new(
            fake_kubectl(
                dir.path(),
                "echo 'error: timed out waiting for the condition on pods/x' >&2\nexit 1",
            ),
            Duration::from_secs(1),
        );

        let err = kubectl.wait_for_ready(&identity(), None).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = Kubectl::new(dir.path().join("missing"), Duration::from_secs(60));

        let err = kubectl.wait_for_ready(&identity(), None).await.unwrap_err();
        assert!(matches!(err, Error::SpawnClient { .. }));
    }

    #[tokio::test]
    async fn test_stream_forward_runs_until_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = Kubectl::new(
            fake_kubectl(dir.path(), "trap 'exit 0' INT\nwhile true; do sleep 0.1; done"),
            Duration::from_secs(60),
        );
        let forward = ForwardSpec {
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 7070,
            remote_port: 80,
        };

        let mut tunnel = kubectl.stream_forward(&identity(), Some("dev"), forward).unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(300)).await;
        tunnel.interrupt().unwrap();
        let exit = tunnel.wait().await.unwrap();

        assert!(exit.is_graceful_stop(), "unexpected exit: {exit}");
        assert_ne!(exit, TunnelExit::Signaled { signal: 9 });
        assert!(calls(dir.path())[0].starts_with("--namespace dev port-forward"));
    }

    #[test]
    fn test_delete_detached_runs_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = Kubectl::new(fake_kubectl(dir.path(), "exit 0"), Duration::from_secs(60));

        kubectl.delete_detached(&identity(), Some("dev"));
        assert_eq!(calls(dir.path()).len(), 1);
    }
}
