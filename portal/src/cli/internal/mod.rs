//! Helpers shared by the CLI commands.

mod resolver;

pub use self::resolver::{PortalResolver, ResolvedPortal};
