//! Shared data models for the reveal pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Output naming styles of the image-translation tool
//! - Frame patterns and derived video artifacts
//! - Model checkpoint selection
//! - Pipeline stages and run states
//! - Encoding and frame-rate configuration

pub mod artifact;
pub mod checkpoint;
pub mod encoding;
pub mod error;
pub mod frame_rate;
pub mod stage;
pub mod style;

// Re-export common types
pub use artifact::{FramePattern, VideoArtifact};
pub use checkpoint::Checkpoint;
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use frame_rate::{FrameRateTable, SourceFrameRate};
pub use stage::{PipelineStage, RunState};
pub use style::{Direction, OutStyle, Visual};
