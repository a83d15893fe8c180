//! Comparison-video pipeline orchestrator.
//!
//! This crate provides:
//! - Layered pipeline configuration
//! - Source video discovery from a folder or a label file
//! - The per-video stage machine and the batch driver
//! - Wrappers around the external inference, classifier and FFmpeg tools

pub mod config;
pub mod error;
pub mod external;
pub mod logging;
pub mod pipeline;
pub mod sources;
pub mod toolchain;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use external::ExternalCommand;
pub use logging::{init_tracing, RunLogger};
pub use pipeline::{BatchReport, Orchestrator, PipelineRun, RunSummary};
pub use sources::VideoSource;
pub use toolchain::{ClassifierMode, ExternalToolchain, Toolchain};
