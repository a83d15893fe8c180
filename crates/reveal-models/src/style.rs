//! Output naming styles of the image-translation tool.
//!
//! The inference process names every image it writes after the source frame
//! it was produced from. Which images are written, and how their names are
//! derived, depends on the [`OutStyle`] it runs with. The orchestrator uses
//! the same rules to predict the pattern of the transformed frames.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Output style of the inference tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutStyle {
    /// Real, recreated and translated images of both domains, suffixed names
    Basic,
    /// Same naming as `Basic`, domain A only
    BasicSingle,
    /// Recreated and translated images of both domains
    Conversion,
    /// Same naming as `Conversion`, domain A only
    ConversionSingle,
    /// Frame-numbered output for video creation
    #[default]
    Frames,
}

impl OutStyle {
    pub const ALL: &'static [OutStyle] = &[
        OutStyle::Basic,
        OutStyle::BasicSingle,
        OutStyle::Conversion,
        OutStyle::ConversionSingle,
        OutStyle::Frames,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutStyle::Basic => "basic",
            OutStyle::BasicSingle => "basic_single",
            OutStyle::Conversion => "conversion",
            OutStyle::ConversionSingle => "conversion_single",
            OutStyle::Frames => "frames",
        }
    }

    /// Build the output file name for one visual of one source image.
    ///
    /// `stem` and `ext` belong to the source image the visual was computed
    /// from (`ext` includes the leading dot). Returns `Ok(None)` when this
    /// style does not write the visual at all.
    ///
    /// The frames style inserts the visual's tag in front of the first digit
    /// run of the stem, so `frame-12` becomes `frame-transfer_AtoB-12`.
    pub fn output_name(
        &self,
        visual: Visual,
        stem: &str,
        suffix: &str,
        ext: &str,
    ) -> Result<Option<String>, ModelError> {
        let name = match self {
            OutStyle::Basic | OutStyle::BasicSingle => {
                Some(format!("{}_{}{}{}", stem, visual.basic_tag(), suffix, ext))
            }
            OutStyle::Conversion | OutStyle::ConversionSingle => match visual {
                Visual::RealA | Visual::RealB => None,
                _ => Some(format!("{}_{}{}{}", stem, visual.basic_tag(), suffix, ext)),
            },
            OutStyle::Frames => match visual.frame_tag() {
                Some(tag) => {
                    let digit_at = stem
                        .find(|c: char| c.is_ascii_digit())
                        .ok_or_else(|| ModelError::NoFrameNumber(stem.to_string()))?;
                    let (head, tail) = stem.split_at(digit_at);
                    Some(format!("{}{}{}{}{}", head, tag, tail, suffix, ext))
                }
                None => None,
            },
        };
        Ok(name)
    }
}

impl fmt::Display for OutStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutStyle {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(OutStyle::Basic),
            "basic_single" => Ok(OutStyle::BasicSingle),
            "conversion" => Ok(OutStyle::Conversion),
            "conversion_single" => Ok(OutStyle::ConversionSingle),
            "frames" => Ok(OutStyle::Frames),
            _ => Err(ModelError::UnknownStyle(s.to_string())),
        }
    }
}

/// Image produced by one forward pass of the translation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visual {
    RealA,
    FakeB,
    RecA,
    RealB,
    FakeA,
    RecB,
}

impl Visual {
    /// Match a model visual label such as `"fake_B"` or `"real_A_masked"`.
    ///
    /// Labels the pipeline does not write (identity mappings and the like)
    /// return `None`.
    pub fn from_label(label: &str) -> Option<Visual> {
        [
            ("real_A", Visual::RealA),
            ("fake_B", Visual::FakeB),
            ("rec_A", Visual::RecA),
            ("real_B", Visual::RealB),
            ("fake_A", Visual::FakeA),
            ("rec_B", Visual::RecB),
        ]
        .into_iter()
        .find(|(tag, _)| label.contains(tag))
        .map(|(_, visual)| visual)
    }

    fn basic_tag(&self) -> &'static str {
        match self {
            Visual::RealA => "real_A",
            Visual::FakeB => "transfer_AtoB",
            Visual::RecA => "rec_A",
            Visual::RealB => "real_B",
            Visual::FakeA => "transfer_BtoA",
            Visual::RecB => "rec_B",
        }
    }

    /// Tag the frames style inserts before the frame number.
    pub fn frame_tag(&self) -> Option<&'static str> {
        match self {
            Visual::FakeB => Some("transfer_AtoB-"),
            Visual::RecA => Some("rec_A-"),
            Visual::FakeA => Some("transfer_BtoA-"),
            Visual::RecB => Some("rec_B-"),
            Visual::RealA | Visual::RealB => None,
        }
    }
}

impl FromStr for Visual {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Visual::from_label(s).ok_or_else(|| ModelError::UnknownVisual(s.to_string()))
    }
}

/// Translation direction of the inference model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    AtoB,
    BtoA,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::AtoB => "AtoB",
            Direction::BtoA => "BtoA",
        }
    }

    /// The visual holding the translated image for this direction.
    pub fn translated_visual(&self) -> Visual {
        match self {
            Direction::AtoB => Visual::FakeB,
            Direction::BtoA => Visual::FakeA,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_style_inserts_tag_before_number() {
        let name = OutStyle::Frames
            .output_name(Visual::FakeB, "frame-12", "", ".png")
            .unwrap();
        assert_eq!(name.as_deref(), Some("frame-transfer_AtoB-12.png"));

        let name = OutStyle::Frames
            .output_name(Visual::RecB, "frame-3", "_v2", ".jpg")
            .unwrap();
        assert_eq!(name.as_deref(), Some("frame-rec_B-3_v2.jpg"));
    }

    #[test]
    fn test_frames_style_skips_real_images() {
        let name = OutStyle::Frames
            .output_name(Visual::RealA, "frame-1", "", ".png")
            .unwrap();
        assert!(name.is_none());
    }

    #[test]
    fn test_frames_style_requires_number() {
        let err = OutStyle::Frames
            .output_name(Visual::FakeB, "poster", "", ".png")
            .unwrap_err();
        assert_eq!(err, ModelError::NoFrameNumber("poster".to_string()));
    }

    #[test]
    fn test_basic_and_conversion_styles() {
        let basic = OutStyle::Basic
            .output_name(Visual::RealA, "img", "_x", ".png")
            .unwrap();
        assert_eq!(basic.as_deref(), Some("img_real_A_x.png"));

        let conversion = OutStyle::Conversion
            .output_name(Visual::RealB, "img", "", ".png")
            .unwrap();
        assert!(conversion.is_none());

        let conversion = OutStyle::ConversionSingle
            .output_name(Visual::FakeA, "img", "", ".png")
            .unwrap();
        assert_eq!(conversion.as_deref(), Some("img_transfer_BtoA.png"));
    }

    #[test]
    fn test_visual_from_label() {
        assert_eq!(Visual::from_label("fake_B"), Some(Visual::FakeB));
        assert_eq!(Visual::from_label("rec_A"), Some(Visual::RecA));
        assert_eq!(Visual::from_label("idt_A"), None);
    }

    #[test]
    fn test_style_round_trip_names() {
        for style in OutStyle::ALL {
            assert_eq!(style.as_str().parse::<OutStyle>().unwrap(), *style);
        }
        assert!("html".parse::<OutStyle>().is_err());
    }
}
