//! Frame rates used when muxing frame sets back into videos.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::artifact::FramePattern;
use crate::error::ModelError;

/// Default rate for original/transformed output (slightly accelerated)
pub const DEFAULT_SOURCE_FPS: f64 = 30.0;
/// Default rate for blended output
pub const DEFAULT_BLENDED_FPS: f64 = 60.0;

/// Frame rate of non-blended output.
///
/// `Auto` probes the source video; `Fixed` uses the given rate regardless of
/// the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceFrameRate {
    Auto,
    Fixed(f64),
}

impl Default for SourceFrameRate {
    fn default() -> Self {
        SourceFrameRate::Fixed(DEFAULT_SOURCE_FPS)
    }
}

impl fmt::Display for SourceFrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFrameRate::Auto => write!(f, "auto"),
            SourceFrameRate::Fixed(fps) => write!(f, "{}", fps),
        }
    }
}

impl FromStr for SourceFrameRate {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(SourceFrameRate::Auto);
        }
        match s.parse::<f64>() {
            Ok(fps) if fps.is_finite() && fps > 0.0 => Ok(SourceFrameRate::Fixed(fps)),
            _ => Err(ModelError::InvalidFrameRate(s.to_string())),
        }
    }
}

impl Serialize for SourceFrameRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SourceFrameRate::Auto => serializer.serialize_str("auto"),
            SourceFrameRate::Fixed(fps) => serializer.serialize_f64(*fps),
        }
    }
}

impl<'de> Deserialize<'de> for SourceFrameRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(fps) => fps.to_string().parse(),
            Raw::Text(text) => text.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

/// Frame rate for each category of output video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRateTable {
    /// Original, transformed and classified videos
    #[serde(default)]
    pub source: SourceFrameRate,
    /// Blended videos, typically faster than the source
    #[serde(default = "default_blended")]
    pub blended: f64,
}

fn default_blended() -> f64 {
    DEFAULT_BLENDED_FPS
}

impl Default for FrameRateTable {
    fn default() -> Self {
        Self {
            source: SourceFrameRate::default(),
            blended: DEFAULT_BLENDED_FPS,
        }
    }
}

impl FrameRateTable {
    /// Rate for a frame pattern, given the resolved source rate.
    pub fn rate_for(&self, pattern: FramePattern, source_fps: f64) -> f64 {
        if pattern.is_blended() {
            self.blended
        } else {
            source_fps
        }
    }

    /// Resolve the source rate, falling back to the default when probing
    /// was requested but produced nothing.
    pub fn resolve_source(&self, probed: Option<f64>) -> f64 {
        match self.source {
            SourceFrameRate::Fixed(fps) => fps,
            SourceFrameRate::Auto => probed.unwrap_or(DEFAULT_SOURCE_FPS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_for_pattern() {
        let table = FrameRateTable::default();
        assert_eq!(table.rate_for(FramePattern::Blended, 30.0), 60.0);
        assert_eq!(table.rate_for(FramePattern::ClassifiedBlended, 25.0), 60.0);
        assert_eq!(table.rate_for(FramePattern::Transformed, 25.0), 25.0);
    }

    #[test]
    fn test_resolve_source() {
        let fixed = FrameRateTable::default();
        assert_eq!(fixed.resolve_source(Some(29.97)), 30.0);

        let auto = FrameRateTable {
            source: SourceFrameRate::Auto,
            ..Default::default()
        };
        assert_eq!(auto.resolve_source(Some(29.97)), 29.97);
        assert_eq!(auto.resolve_source(None), DEFAULT_SOURCE_FPS);
    }

    #[test]
    fn test_source_rate_serde() {
        let table: FrameRateTable =
            serde_json::from_str(r#"{"source": "auto", "blended": 120}"#).unwrap();
        assert_eq!(table.source, SourceFrameRate::Auto);
        assert_eq!(table.blended, 120.0);

        let table: FrameRateTable = serde_json::from_str(r#"{"source": 24}"#).unwrap();
        assert_eq!(table.source, SourceFrameRate::Fixed(24.0));
        assert_eq!(table.blended, DEFAULT_BLENDED_FPS);

        assert!("0".parse::<SourceFrameRate>().is_err());
    }
}
