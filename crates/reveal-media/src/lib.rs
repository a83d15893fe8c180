#![deny(unreachable_patterns)]
//! Frame alignment, crossfade compositing and FFmpeg CLI wrappers.
//!
//! This crate provides:
//! - Frame id extraction and alignment of two frame sequences
//! - The triangular crossfade schedule and the soft-edged alpha compositor
//! - Horizontal/vertical frame concatenation
//! - Directory-level blending of aligned frame runs
//! - Type-safe FFmpeg command building, frame extraction, muxing and stacking

pub mod blender;
pub mod command;
pub mod composite;
pub mod crossfade;
pub mod error;
pub mod frame_index;
pub mod matcher;
pub mod mux;
pub mod probe;
pub mod progress;
pub mod resize;
pub mod split;

pub use blender::{blend_directory, BlendOptions, BlendReport};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use composite::{blend, concat_horizontal, concat_vertical};
pub use crossfade::CrossfadeSchedule;
pub use error::{MediaError, MediaResult};
pub use frame_index::{extract_frame_id, FrameIndexer};
pub use matcher::{match_frames, AlignedRun, FramePair, FrameSequence};
pub use mux::{encode_frames, stack_videos, StackOrientation};
pub use probe::{probe_frame_rate, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use resize::resize_for_aspect;
pub use split::split_video;
