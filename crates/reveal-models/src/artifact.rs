//! Frame patterns inside a working directory and the videos derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named frame set inside a pipeline working directory.
///
/// Every frame file is `<prefix><frame id><ext>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePattern {
    /// Frames decoded from the source video
    Original,
    /// Frames written by the translation model
    Transformed,
    /// Crossfade of original and transformed frames
    Blended,
    /// Original frames with the classifier overlay
    ClassifiedOriginal,
    /// Transformed frames with the classifier overlay
    ClassifiedTransformed,
    /// Transformed frames with the classifier's second-label overlay
    ClassifiedTransformedSecond,
    /// Crossfade of the two classified frame sets
    ClassifiedBlended,
}

impl FramePattern {
    /// File name prefix that precedes the frame id.
    pub fn prefix(&self) -> &'static str {
        match self {
            FramePattern::Original => "frame-",
            FramePattern::Transformed => "frame-transfer_AtoB-",
            FramePattern::Blended => "frame-blended-",
            FramePattern::ClassifiedOriginal => "frame-cam-",
            FramePattern::ClassifiedTransformed => "frame-transfer_AtoB-cam-",
            FramePattern::ClassifiedTransformedSecond => "frame-transfer_AtoB-cam-second-",
            FramePattern::ClassifiedBlended => "frame-cam-blended-",
        }
    }

    /// Printf-style template understood by the frame extractor and encoder.
    pub fn template(&self, ext: &str) -> String {
        format!("{}%d.{}", self.prefix(), ext.trim_start_matches('.'))
    }

    /// Whether this pattern holds crossfaded frames.
    pub fn is_blended(&self) -> bool {
        matches!(self, FramePattern::Blended | FramePattern::ClassifiedBlended)
    }
}

impl fmt::Display for FramePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// A video file written to the output directory for one source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoArtifact {
    Transformed,
    Blended,
    HStack,
    VStack,
    ClassifiedOriginal,
    ClassifiedTransformed,
    ClassifiedBlended,
    ClassifiedHStack,
    ClassifiedVStack,
}

impl VideoArtifact {
    /// Artifacts produced for every video.
    pub const BASE: &'static [VideoArtifact] = &[
        VideoArtifact::Blended,
        VideoArtifact::Transformed,
        VideoArtifact::VStack,
        VideoArtifact::HStack,
    ];

    /// Additional artifacts produced when classification ran.
    pub const CLASSIFIED: &'static [VideoArtifact] = &[
        VideoArtifact::ClassifiedBlended,
        VideoArtifact::ClassifiedOriginal,
        VideoArtifact::ClassifiedTransformed,
        VideoArtifact::ClassifiedHStack,
        VideoArtifact::ClassifiedVStack,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            VideoArtifact::Transformed => "-transfer_AtoB",
            VideoArtifact::Blended => "-blended",
            VideoArtifact::HStack => "-hstack",
            VideoArtifact::VStack => "-vstack",
            VideoArtifact::ClassifiedOriginal => "-cam",
            VideoArtifact::ClassifiedTransformed => "-transfer_AtoB-cam",
            VideoArtifact::ClassifiedBlended => "-blended-cam",
            VideoArtifact::ClassifiedHStack => "-hstack-cam",
            VideoArtifact::ClassifiedVStack => "-vstack-cam",
        }
    }

    /// Output file name for a source video basename.
    pub fn file_name(&self, basename: &str) -> String {
        format!("{}{}.mp4", basename, self.suffix())
    }

    /// Frame pattern this artifact is encoded from, `None` for stacked videos.
    pub fn source_pattern(&self) -> Option<FramePattern> {
        match self {
            VideoArtifact::Transformed => Some(FramePattern::Transformed),
            VideoArtifact::Blended => Some(FramePattern::Blended),
            VideoArtifact::ClassifiedOriginal => Some(FramePattern::ClassifiedOriginal),
            VideoArtifact::ClassifiedTransformed => Some(FramePattern::ClassifiedTransformed),
            VideoArtifact::ClassifiedBlended => Some(FramePattern::ClassifiedBlended),
            VideoArtifact::HStack
            | VideoArtifact::VStack
            | VideoArtifact::ClassifiedHStack
            | VideoArtifact::ClassifiedVStack => None,
        }
    }
}
