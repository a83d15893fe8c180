//! Video encoding configuration.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 18;
/// Extension of frames written by the extractor
pub const DEFAULT_FRAME_EXTENSION: &str = "png";

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Image format of intermediate frames
    #[serde(default = "default_frame_extension")]
    pub frame_extension: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_frame_extension() -> String {
    DEFAULT_FRAME_EXTENSION.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            crf: DEFAULT_CRF,
            frame_extension: DEFAULT_FRAME_EXTENSION.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// FFmpeg output arguments for this encoding.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-vcodec".to_string(),
            self.codec.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert_eq!(args, vec!["-vcodec", "libx264", "-crf", "18"]);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EncodingConfig =
            serde_json::from_str(r#"{"crf": 23, "extra_args": ["-pix_fmt", "yuv420p"]}"#).unwrap();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 23);
        assert_eq!(config.frame_extension, "png");
        assert_eq!(config.to_ffmpeg_args().len(), 6);
    }
}
