//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress reported by FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of `total_frames` written.
    ///
    /// Frame sequences are encoded with a known frame count, which is a
    /// steadier measure than output time at an overridden input rate.
    pub fn frame_percentage(&self, total_frames: u64) -> f64 {
        if total_frames == 0 {
            return 0.0;
        }
        ((self.frame as f64 / total_frames as f64) * 100.0).min(100.0)
    }

    /// Feed one line of `-progress` output.
    ///
    /// Returns a snapshot at the end of every progress block.
    pub fn update(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_ms" | "out_time_us" => {
                // both keys carry microseconds in current FFmpeg builds
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "out_time" => self.out_time = value.to_string(),
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.fps = fps;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }
}

/// Whether a stderr line belongs to the `-progress` key/value stream.
pub(crate) fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_percentage() {
        let progress = FfmpegProgress {
            frame: 150,
            ..Default::default()
        };
        assert!((progress.frame_percentage(600) - 25.0).abs() < 0.01);
        assert!((progress.frame_percentage(100) - 100.0).abs() < 0.01);
        assert_eq!(progress.frame_percentage(0), 0.0);
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(progress.update("frame=42").is_none());
        assert_eq!(progress.frame, 42);

        progress.update("out_time_us=5000000");
        assert_eq!(progress.out_time_ms, 5000);

        progress.update("speed=1.5x");
        assert!((progress.speed - 1.5).abs() < 0.01);

        progress.update("speed=N/A");
        assert!((progress.speed - 1.5).abs() < 0.01);

        let snapshot = progress.update("progress=end").unwrap();
        assert!(snapshot.is_complete);
        assert_eq!(snapshot.frame, 42);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("frame=10"));
        assert!(is_progress_line("progress=continue"));
        assert!(!is_progress_line("[image2 @ 0x55] Could find no file with path 'frame-%d.png'"));
        assert!(!is_progress_line("frame-%d.png: No such file or directory"));
    }
}
