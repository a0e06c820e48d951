use std::fmt::Display;
use std::str::FromStr;

use rand::distr::Alphanumeric;
use rand::distr::SampleString;
use serde::Deserialize;
use serde::Serialize;

/// A unique identifier for a mining operation.
///
/// Opaque to callers.  Generated ids are 16 ascii alphanumeric chars, but any
/// non-empty string received from a caller is accepted for lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OperationId {
    /// generates a random OperationId
    pub fn random() -> Self {
        Self(Alphanumeric.sample_string(&mut rand::rng(), 16))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation id must not be empty")]
pub struct EmptyOperationId;

impl FromStr for OperationId {
    type Err = EmptyOperationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(EmptyOperationId),
            id => Ok(Self(id.to_owned())),
        }
    }
}
