//! Deterministic naming of the relay resources.
//!
//! The relay pod and its config map are named after the operator who opened
//! the portal, so every invocation from the same `user@host` replaces the
//! leftovers of an earlier one instead of piling up new objects.

mod error;

use std::fmt;

use nix::unistd::{self, Uid, User};
use portal_base::consts::identity::{NAME_HASH_LENGTH, RESOURCE_NAME_PREFIX};
use sha2::{Digest, Sha256};
use snafu::{OptionExt, ResultExt};

pub use self::error::Error;

/// Name shared by the relay workload and its config data.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    /// Derives the identity of `user@host`.
    ///
    /// The digest is SHA-256, hex encoded and cut to [`NAME_HASH_LENGTH`]
    /// characters, which keeps the result well inside the 63 character limit
    /// Kubernetes puts on object names.
    pub fn derive(user: &str, host: &str) -> Self {
        let digest = Sha256::digest(format!("{user}@{host}").as_bytes());
        let hash = hex::encode(digest);
        Self(format!("{RESOURCE_NAME_PREFIX}{}", &hash[..NAME_HASH_LENGTH]))
    }

    /// Derives the identity of the operator running this process.
    ///
    /// # Errors
    ///
    /// Returns an error if either the host name or the login name of the
    /// current user cannot be determined.
    pub fn current() -> Result<Self, Error> {
        let OperatorIdentity { user, host } = OperatorIdentity::current()?;
        let identity = Self::derive(&user, &host);
        tracing::debug!("Derived resource name {identity} for {user}@{host}");
        Ok(identity)
    }

    /// Uses `name` verbatim, bypassing derivation.
    pub fn explicit(name: impl Into<String>) -> Self { Self(name.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for ResourceIdentity {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Ambient facts about the local operator.
#[derive(Clone, Debug)]
struct OperatorIdentity {
    user: String,
    host: String,
}

impl OperatorIdentity {
    fn current() -> Result<Self, Error> {
        let host = unistd::gethostname()
            .context(error::HostnameSnafu)?
            .into_string()
            .ok()
            .context(error::HostnameEncodingSnafu)?;

        let uid = Uid::current();
        let user = User::from_uid(uid)
            .context(error::LookupUserSnafu)?
            .context(error::UnknownUserSnafu { uid: uid.as_raw() })?;

        Ok(Self { user: user.name, host })
    }
}
