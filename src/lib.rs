//! ### English
//! `yuv_gl_player` crate root.
//!
//! Decodes a compressed video stream into planar YUV frames on a dedicated pipeline thread and
//! renders them through a GPU fragment shader that converts Y/U/V planes to RGB.
//!
//! The embedder supplies the decoding engine ([`DecodeEngine`]) and the render surface
//! ([`RenderSurfaceContext`], with a surfman-backed implementation provided), pushes
//! [`CompressedUnit`]s into a [`PacketQueue`] and steers playback through [`Player`].
//!
//! ### 中文
//! `yuv_gl_player` 的 crate 根。
//!
//! 在独立的管线线程上把压缩视频流解码为平面 YUV 帧，并通过把 Y/U/V 平面转换为 RGB 的
//! GPU 片元 shader 渲染出来。
//!
//! 嵌入方提供解码引擎（[`DecodeEngine`]）与渲染 surface（[`RenderSurfaceContext`]，
//! 已提供基于 surfman 的实现），向 [`PacketQueue`] push [`CompressedUnit`]，
//! 并通过 [`Player`] 控制播放。
mod engine;
mod error;

pub use engine::config::PipelineConfig;
pub use engine::control::PlaybackControl;
#[cfg(feature = "ffmpeg")]
pub use engine::decoder::FfmpegEngine;
pub use engine::decoder::{DecodeCounters, DecodeEngine, DecodeOutcome, DecoderAdapter};
pub use engine::frame::{PLANE_COUNT, PixelFormat, Plane, PlaneLayout, RawFrame};
pub use engine::pacing::{FrameLimiter, Pacing};
pub use engine::packet::CompressedUnit;
pub use engine::queue::{PacketQueue, PopWait};
pub use engine::rendering::{
    ATTRIBUTE_POSITION, ATTRIBUTE_TEXTURE_COORDINATES, GlowDevice, GlowQuad, GpuDevice,
    QUAD_VERTEX_COUNT, QUAD_VERTICES, RenderSettings, RenderSurfaceContext, SAMPLER_NAMES,
    ShaderDialect, ShaderPipeline, ShaderProgram, ShaderStage, SurfmanSurfaceContext, TextureFilter,
    TextureSet, VertexAttribute, YuvToRgb, fragment_shader_source, vertex_shader_source,
};
pub use engine::runtime::{DriverState, PipelineDriver, PipelineDriverInit, Player};
pub use engine::stats::{PlaybackStats, StatsSnapshot};
pub use error::PipelineError;

/// ### English
/// Re-exported so embedders can name frame and surface sizes without adding `dpi` themselves.
///
/// ### 中文
/// 重新导出，便于嵌入方无需自行引入 `dpi` 即可表示帧与 surface 尺寸。
pub use dpi::PhysicalSize;
