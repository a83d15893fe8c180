//! Model checkpoint selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Which saved weights of an experiment the inference process loads.
///
/// Parsed from `"latest"`, `"e14"` / `"14"` (epoch) or `"i130000"`
/// (iteration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Checkpoint {
    #[default]
    Latest,
    Epoch(u32),
    Iteration(u64),
}

impl Checkpoint {
    /// Tag appended to experiment-scoped directory names.
    pub fn tag(&self) -> String {
        match self {
            Checkpoint::Latest => "_elatest".to_string(),
            Checkpoint::Epoch(epoch) => format!("_e{}", epoch),
            Checkpoint::Iteration(iter) => format!("_i{}", iter),
        }
    }

    /// Arguments selecting this checkpoint on the inference command line.
    pub fn inference_args(&self) -> [String; 2] {
        match self {
            Checkpoint::Latest => ["--epoch".to_string(), "latest".to_string()],
            Checkpoint::Epoch(epoch) => ["--epoch".to_string(), epoch.to_string()],
            Checkpoint::Iteration(iter) => ["--load_iter".to_string(), iter.to_string()],
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::Latest => write!(f, "latest"),
            Checkpoint::Epoch(epoch) => write!(f, "e{}", epoch),
            Checkpoint::Iteration(iter) => write!(f, "i{}", iter),
        }
    }
}

impl FromStr for Checkpoint {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ModelError::InvalidCheckpoint(s.to_string());

        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Checkpoint::Latest);
        }
        if let Some(iter) = trimmed.strip_prefix('i') {
            return iter.parse().map(Checkpoint::Iteration).map_err(|_| invalid());
        }
        let epoch = trimmed.strip_prefix('e').unwrap_or(trimmed);
        epoch.parse().map(Checkpoint::Epoch).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Checkpoint {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Checkpoint> for String {
    fn from(value: Checkpoint) -> Self {
        value.to_string()
    }
}
