//! Alignment of two frame sequences by frame id.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::frame_index::FrameIndexer;

/// Frames of one naming pattern inside one directory, keyed by frame id.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: BTreeMap<u64, PathBuf>,
}

impl FrameSequence {
    /// Build a sequence from file names inside `dir`.
    ///
    /// Names that do not match the indexer are skipped. When two names carry
    /// the same frame id the lexicographically smaller one is kept.
    pub fn from_names<I, S>(dir: &Path, names: I, indexer: &FrameIndexer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| indexer.matches(n))
            .collect();
        names.sort();

        let mut frames: BTreeMap<u64, PathBuf> = BTreeMap::new();
        for name in names {
            let frame_id = match indexer.frame_id(&name) {
                Ok(id) => id,
                Err(e) => {
                    debug!("Skipping {}: {}", name, e);
                    continue;
                }
            };
            if let Some(existing) = frames.get(&frame_id) {
                warn!(
                    frame_id,
                    kept = %existing.display(),
                    "Duplicate frame id for pattern '{}', ignoring {}",
                    indexer.prefix(),
                    name
                );
                continue;
            }
            frames.insert(frame_id, dir.join(name));
        }

        Self { frames }
    }

    /// Scan `dir` for files belonging to the indexer's pattern.
    pub fn scan(dir: &Path, indexer: &FrameIndexer) -> MediaResult<Self> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(Self::from_names(dir, names, indexer))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame ids in ascending order.
    pub fn frame_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.frames.keys().copied()
    }

    /// First id missing between the lowest and highest frame id.
    pub fn first_gap(&self) -> Option<u64> {
        let mut expected = *self.frames.keys().next()?;
        for id in self.frames.keys().copied() {
            if id != expected {
                return Some(expected);
            }
            expected += 1;
        }
        None
    }

    pub fn get(&self, frame_id: u64) -> Option<&Path> {
        self.frames.get(&frame_id).map(PathBuf::as_path)
    }

    /// Pair every frame id present in both sequences, ascending by id.
    pub fn align(&self, other: &FrameSequence) -> AlignedRun {
        let pairs = self
            .frames
            .iter()
            .filter_map(|(id, first)| {
                other.frames.get(id).map(|second| FramePair {
                    frame_id: *id,
                    first: first.clone(),
                    second: second.clone(),
                })
            })
            .collect();
        AlignedRun { pairs }
    }
}

/// Two frames sharing a frame id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePair {
    pub frame_id: u64,
    /// Frame from the first sequence (shown on the left of a blend)
    pub first: PathBuf,
    /// Frame from the second sequence (revealed from the right)
    pub second: PathBuf,
}

/// Frame pairs strictly increasing by frame id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignedRun {
    pairs: Vec<FramePair>,
}

impl AlignedRun {
    pub fn pairs(&self) -> &[FramePair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn frame_ids(&self) -> Vec<u64> {
        self.pairs.iter().map(|p| p.frame_id).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FramePair> {
        self.pairs.iter()
    }
}

impl<'a> IntoIterator for &'a AlignedRun {
    type Item = &'a FramePair;
    type IntoIter = std::slice::Iter<'a, FramePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

/// Align the frames of `pattern1` and `pattern2` inside `dir`.
///
/// Fails with [`MediaError::EmptySequence`] when no file matches `pattern2`.
pub fn match_frames(dir: &Path, pattern1: &str, pattern2: &str) -> MediaResult<AlignedRun> {
    let first = FrameSequence::scan(dir, &FrameIndexer::new(pattern1)?)?;
    let second = FrameSequence::scan(dir, &FrameIndexer::new(pattern2)?)?;

    if second.is_empty() {
        return Err(MediaError::empty_sequence(pattern2, dir));
    }

    let run = first.align(&second);
    debug!(
        dir = %dir.display(),
        first = first.len(),
        second = second.len(),
        aligned = run.len(),
        "Aligned '{}' with '{}'",
        pattern1,
        pattern2
    );
    if run.is_empty() {
        warn!(
            dir = %dir.display(),
            "No common frame ids between '{}' and '{}'",
            pattern1,
            pattern2
        );
    }
    Ok(run)
}
