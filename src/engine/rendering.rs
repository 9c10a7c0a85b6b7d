//! ### English
//! Rendering module entry point.
//! Splits colorspace configuration, shader sources, the GPU device seam, the shader
//! pipeline and the presentable surface into submodules.
//!
//! ### 中文
//! 渲染模块入口。
//! 将色彩空间配置、shader 源码、GPU 设备抽象、shader 管线与可呈现 surface 拆分到子模块。

mod conversion;
mod device;
mod pipeline;
mod shader;
mod surface;

pub use conversion::YuvToRgb;
pub use device::{GlowDevice, GlowQuad, GpuDevice, TextureFilter, VertexAttribute};
pub use pipeline::{RenderSettings, ShaderPipeline, ShaderProgram, TextureSet};
pub use shader::{
    ATTRIBUTE_POSITION, ATTRIBUTE_TEXTURE_COORDINATES, QUAD_VERTEX_COUNT, QUAD_VERTICES,
    SAMPLER_NAMES, ShaderDialect, ShaderStage, fragment_shader_source, vertex_shader_source,
};
pub use surface::{RenderSurfaceContext, SurfmanSurfaceContext};
