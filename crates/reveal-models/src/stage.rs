//! Pipeline stages and the per-video run state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a per-video pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Decode the source video into numbered frames
    Split,
    /// Run the translation model over the frames
    Transform,
    /// Overlay classifier output on original and transformed frames
    Classify,
    /// Crossfade original and transformed frames
    Blend,
    /// Crossfade the classified frame sets
    BlendClassified,
    /// Encode frame sets and stack videos
    Mux,
    /// Remove the working directory
    Cleanup,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Split => "split",
            PipelineStage::Transform => "transform",
            PipelineStage::Classify => "classify",
            PipelineStage::Blend => "blend",
            PipelineStage::BlendClassified => "blend_classified",
            PipelineStage::Mux => "mux",
            PipelineStage::Cleanup => "cleanup",
        }
    }

    /// Stage following this one, `None` after cleanup.
    ///
    /// The classification stages are only visited when `classify` is set.
    pub fn next(&self, classify: bool) -> Option<PipelineStage> {
        match self {
            PipelineStage::Split => Some(PipelineStage::Transform),
            PipelineStage::Transform if classify => Some(PipelineStage::Classify),
            PipelineStage::Transform | PipelineStage::Classify => Some(PipelineStage::Blend),
            PipelineStage::Blend if classify => Some(PipelineStage::BlendClassified),
            PipelineStage::Blend | PipelineStage::BlendClassified => Some(PipelineStage::Mux),
            PipelineStage::Mux => Some(PipelineStage::Cleanup),
            PipelineStage::Cleanup => None,
        }
    }

    /// Full stage sequence for a run.
    pub fn sequence(classify: bool) -> Vec<PipelineStage> {
        let mut stages = vec![PipelineStage::Split];
        while let Some(next) = stages.last().and_then(|s| s.next(classify)) {
            stages.push(next);
        }
        stages
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Init,
    Running(PipelineStage),
    Done,
    /// Absorbing failure state, carrying the stage that failed
    Failed(PipelineStage),
}

impl RunState {
    pub fn is_done(&self) -> bool {
        matches!(self, RunState::Done)
    }

    /// Stage the run is in, or failed in.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            RunState::Running(stage) | RunState::Failed(stage) => Some(*stage),
            RunState::Init | RunState::Done => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Init => write!(f, "init"),
            RunState::Running(stage) => write!(f, "running({})", stage),
            RunState::Done => write!(f, "done"),
            RunState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_without_classify() {
        assert_eq!(
            PipelineStage::sequence(false),
            vec![
                PipelineStage::Split,
                PipelineStage::Transform,
                PipelineStage::Blend,
                PipelineStage::Mux,
                PipelineStage::Cleanup,
            ]
        );
    }

    #[test]
    fn test_sequence_with_classify() {
        assert_eq!(
            PipelineStage::sequence(true),
            vec![
                PipelineStage::Split,
                PipelineStage::Transform,
                PipelineStage::Classify,
                PipelineStage::Blend,
                PipelineStage::BlendClassified,
                PipelineStage::Mux,
                PipelineStage::Cleanup,
            ]
        );
    }

    #[test]
    fn test_run_state() {
        assert!(RunState::Done.is_done());
        assert!(!RunState::Failed(PipelineStage::Mux).is_done());
        assert_eq!(
            RunState::Failed(PipelineStage::Transform).stage(),
            Some(PipelineStage::Transform)
        );
        assert_eq!(
            RunState::Running(PipelineStage::Blend).to_string(),
            "running(blend)"
        );
    }
}
