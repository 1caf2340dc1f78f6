//! One portal session, from the first delete to the last.
//!
//! ```text
//! cleanup(pre) -> apply -> wait ready -> forward -> running -> cleanup(post)
//! ```
//!
//! Once the apply has been attempted the relay is owned by a
//! [`ResourceGuard`], so the post cleanup runs on every path out of the
//! session, including failures and operator interrupts.

mod error;
mod guard;

use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

pub use self::{
    error::{CleanupPhase, Error},
    guard::ResourceGuard,
};
use crate::{
    cluster::{self, ControlPlane, Tunnel, TunnelExit},
    identity::ResourceIdentity,
    manifest::ManifestSet,
    relay::RelayConfig,
};

/// How a successful session ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The port-forward exited cleanly on its own.
    TunnelClosed,
    /// The operator interrupted the session.
    Interrupted,
}

enum Event {
    Interrupted,
    TunnelExited(Result<TunnelExit, cluster::Error>),
}

pub struct Session<C> {
    control_plane: C,
    identity: ResourceIdentity,
    relay: RelayConfig,
}

impl<C: ControlPlane> Session<C> {
    pub const fn new(control_plane: C, identity: ResourceIdentity, relay: RelayConfig) -> Self {
        Self { control_plane, identity, relay }
    }

    /// Runs the session until the tunnel ends or `interrupt` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the first step that failed. When the teardown fails as well,
    /// both are reported through [`Error::CleanupAfterFailure`].
    pub async fn run(self, interrupt: CancellationToken) -> Result<Outcome, Error> {
        let Self { control_plane, identity, relay } = self;
        let manifests = ManifestSet::build(&identity, &relay);

        tracing::info!("Removing leftovers of relay {identity}");
        control_plane.delete_if_exists(&identity, relay.namespace.as_deref()).await.context(
            error::CleanupFailedSnafu { name: identity.to_string(), phase: CleanupPhase::Pre },
        )?;

        if interrupt.is_cancelled() {
            tracing::info!("Interrupted before the relay was created");
            return Ok(Outcome::Interrupted);
        }

        let mut guard = ResourceGuard::arm(&control_plane, &identity, relay.namespace.clone());
        let result = provision_and_forward(
            &control_plane,
            &identity,
            &relay,
            &manifests,
            &mut guard,
            &interrupt,
        )
        .await;
        let cleanup = guard.release().await;

        match (result, cleanup) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup)) => Err(Error::join(err, cleanup)),
        }
    }
}

async fn provision_and_forward<C: ControlPlane>(
    control_plane: &C,
    identity: &ResourceIdentity,
    relay: &RelayConfig,
    manifests: &ManifestSet,
    guard: &mut ResourceGuard<'_, C>,
    interrupt: &CancellationToken,
) -> Result<Outcome, Error> {
    let name = identity.to_string();

    tracing::info!("Creating relay {identity} ({}, {})", relay.kind, relay.image);
    let applied = control_plane
        .apply(manifests, relay.namespace.as_deref())
        .await
        .context(error::ApplyFailedSnafu { name: name.clone() })?;
    if !applied.is_empty() {
        guard.retarget(Some(applied));
    }
    let namespace = guard.namespace().map(ToString::to_string);
    let namespace = namespace.as_deref();

    tracing::info!(
        "Waiting for relay {identity} to become ready in namespace {}",
        namespace.unwrap_or("(default)")
    );
    let ready = tokio::select! {
        () = interrupt.cancelled() => None,
        ready = control_plane.wait_for_ready(identity, namespace) => Some(ready),
    };
    match ready {
        Some(Ok(())) if !interrupt.is_cancelled() => {}
        Some(Ok(())) | None => {
            tracing::info!("Interrupted before the relay became ready");
            return Ok(Outcome::Interrupted);
        }
        Some(Err(source)) if source.is_timeout() => {
            return Err(source).context(error::ReadinessTimeoutSnafu { name });
        }
        Some(Err(source)) => return Err(source).context(error::WaitFailedSnafu { name }),
    }

    let forward = relay.forward_spec();
    let mut tunnel = control_plane
        .stream_forward(identity, namespace, forward)
        .context(error::ForwardStartFailedSnafu { name })?;
    tracing::info!("Forwarding {forward} through relay {identity}, use Ctrl+C to stop");

    let event = tokio::select! {
        () = interrupt.cancelled() => Event::Interrupted,
        exit = tunnel.wait() => Event::TunnelExited(exit),
    };

    match event {
        Event::Interrupted => {
            tracing::info!("Stopping port-forward");
            tunnel.interrupt().context(error::ForwardInterruptFailedSnafu)?;
            let exit = tunnel.wait().await.context(error::ForwardWaitFailedSnafu)?;
            if exit.is_graceful_stop() {
                Ok(Outcome::Interrupted)
            } else {
                error::ForwardExitedSnafu { exit }.fail()
            }
        }
        Event::TunnelExited(exit) => {
            let exit = exit.context(error::ForwardWaitFailedSnafu)?;
            if exit.success() {
                tracing::info!("Port-forward closed");
                Ok(Outcome::TunnelClosed)
            } else {
                error::ForwardExitedSnafu { exit }.fail()
            }
        }
    }
}
