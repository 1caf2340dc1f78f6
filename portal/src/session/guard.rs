use snafu::ResultExt;

use crate::{
    cluster::ControlPlane,
    identity::ResourceIdentity,
    session::{CleanupPhase, Error, error},
};

/// Stands for "the relay exists in the cluster" from just before it is
/// applied until it has been deleted again.
///
/// [`ResourceGuard::release`] deletes the resources. A guard dropped before
/// its release completed deletes them synchronously instead.
pub struct ResourceGuard<'a, C: ControlPlane> {
    control_plane: &'a C,
    identity: &'a ResourceIdentity,
    namespace: Option<String>,
    armed: bool,
}

impl<'a, C: ControlPlane> ResourceGuard<'a, C> {
    pub const fn arm(
        control_plane: &'a C,
        identity: &'a ResourceIdentity,
        namespace: Option<String>,
    ) -> Self {
        Self { control_plane, identity, namespace, armed: true }
    }
}

impl<C: ControlPlane> ResourceGuard<'_, C> {
    /// Points the guard at the namespace the relay actually landed in.
    pub fn retarget(&mut self, namespace: Option<String>) { self.namespace = namespace; }

    pub fn namespace(&self) -> Option<&str> { self.namespace.as_deref() }

    pub async fn release(mut self) -> Result<(), Error> {
        tracing::info!("Removing relay {}", self.identity);

        let result = self.control_plane.delete_if_exists(self.identity, self.namespace()).await;
        self.armed = false;

        result.context(error::CleanupFailedSnafu {
            name: self.identity.to_string(),
            phase: CleanupPhase::Post,
        })
    }
}

impl<C: ControlPlane> Drop for ResourceGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Relay {} was not released, removing it now", self.identity);
            self.control_plane.delete_detached(self.identity, self.namespace());
        }
    }
}
