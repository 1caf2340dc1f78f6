use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Serialize, PartialEq)]
pub enum ImagePullPolicy {
    #[default]
    IfNotPresent,
    Always,
    Never,
}

impl ImagePullPolicy {
    /// The value Kubernetes expects in `imagePullPolicy`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IfNotPresent => "IfNotPresent",
            Self::Always => "Always",
            Self::Never => "Never",
        }
    }
}

impl fmt::Display for ImagePullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ImagePullPolicy {
    type Err = ParseImagePullPolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::IfNotPresent, Self::Always, Self::Never]
            .into_iter()
            .find(|policy| policy.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ParseImagePullPolicyError::Invalid { value: value.to_string() })
    }
}

#[derive(Debug, Snafu)]
pub enum ParseImagePullPolicyError {
    #[snafu(display("'{value}' is not a valid image pull policy (IfNotPresent, Always, Never)"))]
    Invalid { value: String },
}
