//! Tabular rendering of configuration items.

mod relay_spec_ext;

pub use self::relay_spec_ext::RelaySpecExt;
