//! Output file formats and frame file naming.

use std::path::{Path, PathBuf};

/// File formats the pipeline writes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// OpenEXR, used for linear color frames.
    Exr,
    /// PNG, used for quantized depth.
    Png,
}

impl OutputFormat {
    /// Detect format from magic bytes. Returns `None` if unrecognized.
    pub fn detect(data: &[u8]) -> Option<Self> {
        // OpenEXR: 76 2F 31 01
        if data.len() >= 4 && data[..4] == [0x76, 0x2F, 0x31, 0x01] {
            return Some(OutputFormat::Exr);
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.len() >= 8 && data[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
            return Some(OutputFormat::Png);
        }

        None
    }

    /// Detect format from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "exr" => Some(OutputFormat::Exr),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Exr => "exr",
            OutputFormat::Png => "png",
        }
    }

    /// File name prefix used for per-frame outputs of this format.
    pub fn frame_prefix(self) -> &'static str {
        match self {
            OutputFormat::Exr => "frame",
            OutputFormat::Png => "depth",
        }
    }
}

impl core::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            OutputFormat::Exr => "OpenEXR",
            OutputFormat::Png => "PNG",
        })
    }
}

/// File name for frame `index` in `format`: `frame000042.exr`, `depth000042.png`.
pub fn frame_file_name(format: OutputFormat, index: usize) -> String {
    format!("{}{:06}.{}", format.frame_prefix(), index, format.extension())
}

/// Full output path for frame `index` below `dir`.
pub fn frame_path(dir: &Path, format: OutputFormat, index: usize) -> PathBuf {
    dir.join(frame_file_name(format, index))
}
