//! Directory-level blending of two aligned frame sequences.
//!
//! Output frames are written next to their inputs as
//! `<out_basename><kind>-<frame id><ext>`, where `kind` is `blended`,
//! `vertcat` or `horzcat` and `ext` is taken from the first-sequence frame.
//! Every output is named by its frame id, so pairs are processed in parallel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::composite::{blend, concat_horizontal, concat_vertical, DEFAULT_TRANSITION_FRACTION};
use crate::crossfade::CrossfadeSchedule;
use crate::error::{MediaError, MediaResult};
use crate::matcher::{match_frames, FramePair};
use crate::resize::resize_for_aspect;

/// Default period of the crossfade, in frames
pub const DEFAULT_FRAMES_PER_CYCLE: u64 = 300;

/// Options for blending one directory.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendOptions {
    /// Prefix of the frames shown on the left
    pub pattern1: String,
    /// Prefix of the frames revealed from the right
    pub pattern2: String,
    /// Prefix of written frames
    pub out_basename: String,
    pub frames_per_cycle: u64,
    pub transition_fraction: f64,
    /// Aspect ratio applied to written frames (1.0 keeps them as is)
    pub aspect_ratio: f64,
    pub blend: bool,
    pub vertcat: bool,
    pub horzcat: bool,
}

impl Default for BlendOptions {
    fn default() -> Self {
        Self {
            pattern1: "frame-".to_string(),
            pattern2: String::new(),
            out_basename: "frame-".to_string(),
            frames_per_cycle: DEFAULT_FRAMES_PER_CYCLE,
            transition_fraction: DEFAULT_TRANSITION_FRACTION,
            aspect_ratio: 1.0,
            blend: false,
            vertcat: false,
            horzcat: false,
        }
    }
}

impl BlendOptions {
    /// Crossfade-only options for a pattern pair.
    pub fn crossfade(
        pattern1: impl Into<String>,
        pattern2: impl Into<String>,
        out_basename: impl Into<String>,
        frames_per_cycle: u64,
    ) -> Self {
        Self {
            pattern1: pattern1.into(),
            pattern2: pattern2.into(),
            out_basename: out_basename.into(),
            frames_per_cycle,
            blend: true,
            ..Default::default()
        }
    }

    pub fn with_transition_fraction(mut self, fraction: f64) -> Self {
        self.transition_fraction = fraction;
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: f64) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    fn validate(&self) -> MediaResult<()> {
        if self.pattern2.is_empty() {
            return Err(MediaError::invalid_parameter("second frame pattern is required"));
        }
        if !(0.0..=1.0).contains(&self.transition_fraction) {
            return Err(MediaError::invalid_parameter(format!(
                "transition fraction {} outside [0, 1]",
                self.transition_fraction
            )));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(MediaError::invalid_parameter(format!(
                "aspect ratio {} must be positive",
                self.aspect_ratio
            )));
        }
        Ok(())
    }

    fn outputs_per_pair(&self) -> usize {
        [self.blend, self.vertcat, self.horzcat]
            .iter()
            .filter(|enabled| **enabled)
            .count()
    }
}

/// Outcome of blending one directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlendReport {
    /// Aligned frame pairs processed
    pub pairs: usize,
    /// Frames written
    pub written: usize,
}

/// Blend, and optionally concatenate, every aligned pair in `dir`.
///
/// Fails on the first pair that cannot be read, composited or written; the
/// error names the frame id and first-sequence path.
pub fn blend_directory(dir: &Path, options: &BlendOptions) -> MediaResult<BlendReport> {
    options.validate()?;
    let schedule = CrossfadeSchedule::new(options.frames_per_cycle)?;
    let run = match_frames(dir, &options.pattern1, &options.pattern2)?;

    let outputs = options.outputs_per_pair();
    if outputs == 0 {
        warn!(dir = %dir.display(), "No blend output selected, nothing to do");
        return Ok(BlendReport {
            pairs: run.len(),
            written: 0,
        });
    }

    let total = run.len();
    let processed = AtomicUsize::new(0);

    run.pairs()
        .par_iter()
        .enumerate()
        .try_for_each(|(position, pair)| {
            process_pair(dir, pair, schedule.weight(position), options)
                .map_err(|e| e.in_frame(pair.frame_id, &pair.first))?;

            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 100 == 0 {
                info!("Processed {} of {} frames", done, total);
            }
            Ok::<(), MediaError>(())
        })?;

    debug!(dir = %dir.display(), pairs = total, "Blend complete");

    Ok(BlendReport {
        pairs: total,
        written: total * outputs,
    })
}

fn process_pair(dir: &Path, pair: &FramePair, weight: f64, options: &BlendOptions) -> MediaResult<()> {
    let first = load_frame(&pair.first)?;
    let second = load_frame(&pair.second)?;
    let ext = pair
        .first
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let output_path = |kind: &str| -> PathBuf {
        dir.join(format!("{}{}-{}{}", options.out_basename, kind, pair.frame_id, ext))
    };

    if options.blend {
        let frame = blend(&first, &second, weight, options.transition_fraction)?;
        save_frame(frame, options.aspect_ratio, &output_path("blended"))?;
    }

    if options.vertcat || options.horzcat {
        let both = [first, second];
        if options.vertcat {
            let frame = concat_vertical(&both, 0.0, None)?;
            save_frame(frame, options.aspect_ratio, &output_path("vertcat"))?;
        }
        if options.horzcat {
            let frame = concat_horizontal(&both, 0.0, None)?;
            save_frame(frame, options.aspect_ratio, &output_path("horzcat"))?;
        }
    }

    Ok(())
}

fn load_frame(path: &Path) -> MediaResult<RgbImage> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    Ok(image::open(path)?.to_rgb8())
}

fn save_frame(frame: RgbImage, aspect_ratio: f64, path: &Path) -> MediaResult<()> {
    resize_for_aspect(frame, aspect_ratio).save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, width: u32, height: u32, value: u8) {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_blend_directory_writes_blended_frames() {
        let dir = TempDir::new().unwrap();
        for i in 0..4 {
            write_frame(dir.path(), &format!("frame-{}.png", i), 20, 4, 0);
            write_frame(dir.path(), &format!("frame-transfer_AtoB-{}.png", i), 20, 4, 200);
        }

        let options = BlendOptions::crossfade("frame-", "frame-transfer_AtoB-", "frame-", 4)
            .with_transition_fraction(0.0);
        let report = blend_directory(dir.path(), &options).unwrap();
        assert_eq!(report, BlendReport { pairs: 4, written: 4 });

        // position 0 has weight 0: all original
        let first = image::open(dir.path().join("frame-blended-0.png")).unwrap().to_rgb8();
        assert!(first.pixels().all(|p| *p == Rgb([0, 0, 0])));

        // position 2 has weight 1: all transformed
        let peak = image::open(dir.path().join("frame-blended-2.png")).unwrap().to_rgb8();
        assert!(peak.pixels().all(|p| *p == Rgb([200, 200, 200])));

        // position 1 has weight 0.5: right half transformed
        let half = image::open(dir.path().join("frame-blended-1.png")).unwrap().to_rgb8();
        assert_eq!(*half.get_pixel(9, 0), Rgb([0, 0, 0]));
        assert_eq!(*half.get_pixel(10, 0), Rgb([200, 200, 200]));
    }

    #[test]
    fn test_blend_directory_concat_outputs() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "frame-5.png", 6, 3, 10);
        write_frame(dir.path(), "frame-b-5.png", 6, 3, 90);

        let options = BlendOptions {
            pattern2: "frame-b-".to_string(),
            vertcat: true,
            horzcat: true,
            ..Default::default()
        };
        let report = blend_directory(dir.path(), &options).unwrap();
        assert_eq!(report.written, 2);

        let vert = image::open(dir.path().join("frame-vertcat-5.png")).unwrap();
        assert_eq!((vert.width(), vert.height()), (6, 6));
        let horz = image::open(dir.path().join("frame-horzcat-5.png")).unwrap();
        assert_eq!((horz.width(), horz.height()), (12, 3));
        assert!(!dir.path().join("frame-blended-5.png").exists());
    }

    #[test]
    fn test_blend_directory_size_mismatch_names_frame() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "frame-1.png", 8, 8, 0);
        write_frame(dir.path(), "frame-t-1.png", 4, 8, 0);

        let options = BlendOptions::crossfade("frame-", "frame-t-", "frame-", 10);
        let err = blend_directory(dir.path(), &options).unwrap_err();
        match err {
            MediaError::Frame { frame_id, source, .. } => {
                assert_eq!(frame_id, 1);
                assert!(matches!(*source, MediaError::SizeMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blend_directory_aspect_ratio() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "frame-0.png", 10, 10, 0);
        write_frame(dir.path(), "frame-t-0.png", 10, 10, 0);

        let options = BlendOptions::crossfade("frame-", "frame-t-", "frame-", 10).with_aspect_ratio(2.0);
        blend_directory(dir.path(), &options).unwrap();
        let out = image::open(dir.path().join("frame-blended-0.png")).unwrap();
        assert_eq!((out.width(), out.height()), (20, 10));
    }

    #[test]
    fn test_blend_directory_requires_second_pattern() {
        let dir = TempDir::new().unwrap();
        let err = blend_directory(dir.path(), &BlendOptions::default()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidParameter(_)));
    }
}
