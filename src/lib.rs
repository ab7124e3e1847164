//! Offline multi-pass rendering of camera trajectories.
//!
//! For every pose of a trajectory the crate renders a color pass, composites
//! planar mirror reflections, renders a depth pass, and writes:
//!
//! - `frameNNNNNN.exr`: linear-light RGB, 32-bit float per channel
//! - `depthNNNNNN.png`: depth as 16-bit grayscale, tagged with gAMA 34
//!
//! The main pieces:
//!
//! - [`FrameOrchestrator`] drives the passes and serialization per frame
//! - [`SceneRenderer`] / [`MirrorRenderer`] / [`ProgressObserver`] are the
//!   collaborator seams; [`MeshRenderer`], [`PlanarMirrorRenderer`] and
//!   [`ConsoleProgress`] implement them
//! - [`PixelFormat`] / [`ImageBuffer`] / [`ImageView`] describe pixel memory
//! - [`export_exr`] and [`DepthQuantizer`] are the serialization contracts
//! - [`RenderConfig`] collects run settings
//!
//! Rendering is single-threaded and synchronous. Any error ends the run;
//! frames written before it are left on disk.

#![forbid(unsafe_code)]

mod buffer;
mod camera;
mod config;
mod error;
mod exr_write;
mod format;
mod mesh;
mod mirror;
mod orientation;
mod output;
mod pipeline;
mod pixel;
mod png_write;
mod quantize;
mod scene;
mod target;
mod trajectory;
mod traits;

#[cfg(test)]
mod test_util;

pub use crate::buffer::{BufferError, ImageBuffer, ImageView, ImageViewMut, TypedView, TypedViewMut};
pub use crate::camera::{Camera, CameraPose, Intrinsics, reflection_matrix};
pub use crate::config::{DEFAULT_DEPTH_SCALE, DEFAULT_MAX_DIMENSION, RenderConfig};
pub use crate::error::{RenderError, RenderResult};
pub use crate::exr_write::{
    CHANNEL_NAMES, ChannelSlice, ExrChannels, channel_slices, export_exr, read_exr,
};
pub use crate::format::{OutputFormat, frame_file_name, frame_path};
pub use crate::mesh::{DEFAULT_VERTEX_COLOR, Mesh, MeshRenderer};
pub use crate::mirror::{
    MirrorSurface, PlanarMirror, PlanarMirrorRenderer, load_mirror_surfaces,
    parse_mirror_surfaces,
};
pub use crate::orientation::RowOrder;
pub use crate::output::{FrameOutputs, RunSummary};
pub use crate::pipeline::FrameOrchestrator;
pub use crate::pixel::{ChannelKind, ExrSampleType, MAX_CHANNELS, PixelFormat};
pub use crate::png_write::{DEPTH_PNG_GAMMA, write_gray16_png};
pub use crate::quantize::{DepthQuantizer, OverflowPolicy, QuantizeStats};
pub use crate::scene::SolidScene;
pub use crate::target::{
    CullMode, FrontFace, Pass, RenderTarget, TargetDescriptor, Viewport,
};
pub use crate::trajectory::{
    TokenError, TokenReader, TrajectoryReader, parse_intrinsics, read_intrinsics,
};
pub use crate::traits::{
    ConsoleProgress, MirrorRenderer, NoMirrors, ProgressObserver, SceneRenderer, SilentProgress,
};

// Re-exports for building and inspecting buffers.
pub use glam;
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb;
pub use rgb::{Gray, Rgb, Rgba};
