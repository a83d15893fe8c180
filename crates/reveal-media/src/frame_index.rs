//! Frame id extraction from file names.
//!
//! A frame file belongs to a sequence when its name contains the sequence's
//! literal prefix immediately followed by one or more decimal digits. The
//! first such occurrence decides the frame id; digit runs elsewhere in the
//! name (including digits inside the prefix itself) are never considered.

use regex::Regex;

use crate::error::{MediaError, MediaResult};

/// Matches file names of one frame sequence and decodes their ids.
#[derive(Debug, Clone)]
pub struct FrameIndexer {
    prefix: String,
    regex: Regex,
}

impl FrameIndexer {
    /// Create an indexer for a literal name prefix such as `"frame-"`.
    pub fn new(prefix: impl Into<String>) -> MediaResult<Self> {
        let prefix = prefix.into();
        let regex = Regex::new(&format!(r"{}(\d+)", regex::escape(&prefix)))
            .map_err(|e| MediaError::invalid_parameter(format!("frame pattern '{}': {}", prefix, e)))?;
        Ok(Self { prefix, regex })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether a file name belongs to this sequence.
    pub fn matches(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    /// Frame id of a file name.
    ///
    /// Fails with [`MediaError::NoMatch`] when the prefix is absent, is not
    /// followed by digits, or the digits overflow a `u64`.
    pub fn frame_id(&self, file_name: &str) -> MediaResult<u64> {
        self.regex
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse::<u64>().ok())
            .ok_or_else(|| MediaError::no_match(file_name, &self.prefix))
    }
}

/// Extract the frame id following `prefix` in `file_name`.
pub fn extract_frame_id(file_name: &str, prefix: &str) -> MediaResult<u64> {
    FrameIndexer::new(prefix)?.frame_id(file_name)
}
