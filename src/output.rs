//! What a run left on disk.

use std::path::{Path, PathBuf};

/// Files written for one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameOutputs {
    index: usize,
    color: PathBuf,
    depth: Option<PathBuf>,
}

impl FrameOutputs {
    pub fn new(index: usize, color: PathBuf) -> Self {
        Self {
            index,
            color,
            depth: None,
        }
    }

    /// Attach the depth image path.
    pub fn with_depth(mut self, depth: PathBuf) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Zero-based frame index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The `frameNNNNNN.exr` color image.
    pub fn color_path(&self) -> &Path {
        &self.color
    }

    /// The `depthNNNNNN.png` image, absent when depth rendering is off.
    pub fn depth_path(&self) -> Option<&Path> {
        self.depth.as_deref()
    }

    /// Every file written for this frame, color first.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.color.as_path()).chain(self.depth.as_deref())
    }
}

/// Outputs of a completed run, in frame order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    frames: Vec<FrameOutputs>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, frame: FrameOutputs) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[FrameOutputs] {
        &self.frames
    }

    /// Number of frames written.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total number of files written.
    pub fn file_count(&self) -> usize {
        self.frames.iter().map(|f| f.paths().count()).sum()
    }
}
