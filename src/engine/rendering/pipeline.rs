//! ### English
//! GPU colorspace conversion pipeline: one linked program, three plane textures and the quad.
//!
//! ### 中文
//! GPU 色彩空间转换管线：一个已链接 program、三个平面纹理以及四边形顶点缓冲。

use std::rc::Rc;

use dpi::PhysicalSize;

use crate::engine::frame::{PLANE_COUNT, RawFrame};
use crate::error::PipelineError;

use super::conversion::YuvToRgb;
use super::device::{GpuDevice, TextureFilter, VertexAttribute};
use super::shader::{
    ATTRIBUTE_POSITION, ATTRIBUTE_TEXTURE_COORDINATES, QUAD_POSITION_COMPONENTS,
    QUAD_STRIDE_FLOATS, QUAD_TEXTURE_COORDINATE_COMPONENTS, QUAD_VERTEX_COUNT, QUAD_VERTICES,
    SAMPLER_NAMES, ShaderStage, fragment_shader_source, vertex_shader_source,
};

/// ### English
/// Attribute location bound to `a_Position` before linking.
///
/// ### 中文
/// 链接前绑定给 `a_Position` 的属性位置。
const POSITION_LOCATION: u32 = 0;

/// ### English
/// Fixed rendering parameters of the pipeline.
///
/// ### 中文
/// 管线的固定渲染参数。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub conversion: YuvToRgb,
    pub texture_filter: TextureFilter,
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            conversion: YuvToRgb::BT601_LIMITED,
            texture_filter: TextureFilter::Linear,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// ### English
/// Linked program plus resolved attribute locations and sampler uniforms.
///
/// A value of this type only exists for a successfully linked program.
///
/// ### 中文
/// 已链接的 program 以及解析好的属性位置和 sampler uniform。
///
/// 只有链接成功的 program 才会存在该类型的值。
pub struct ShaderProgram<G: GpuDevice> {
    handle: G::Program,
    position: u32,
    texture_coordinates: u32,
    samplers: [G::Uniform; PLANE_COUNT],
}

impl<G: GpuDevice> ShaderProgram<G> {
    /// ### English
    /// Compiles and links `vertex_source` + `fragment_source`.
    ///
    /// Every intermediate object is deleted on failure and no program is left current.
    ///
    /// ### 中文
    /// 编译并链接 `vertex_source` 与 `fragment_source`。
    ///
    /// 失败时删除所有中间对象，且不会留下 current program。
    pub fn build(
        device: &G,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, PipelineError> {
        let result = Self::build_inner(device, vertex_source, fragment_source);
        if result.is_err() {
            device.use_program(None);
        }
        result
    }

    fn build_inner(
        device: &G,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, PipelineError> {
        let vertex = compile(device, ShaderStage::Vertex, vertex_source)?;
        let fragment = match compile(device, ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                device.delete_shader(vertex);
                return Err(err);
            }
        };

        let linked = device.link_program(
            vertex,
            fragment,
            &[(POSITION_LOCATION, ATTRIBUTE_POSITION)],
        );
        device.delete_shader(vertex);
        device.delete_shader(fragment);
        let handle = linked.map_err(|log| PipelineError::ShaderLink {
            log: non_empty_log(log),
        })?;

        match Self::resolve(device, handle) {
            Ok(program) => Ok(program),
            Err(err) => {
                device.delete_program(handle);
                Err(err)
            }
        }
    }

    fn resolve(device: &G, handle: G::Program) -> Result<Self, PipelineError> {
        let attribute = |name: &str| {
            device.attribute_location(handle, name).ok_or_else(|| {
                PipelineError::ShaderLink {
                    log: format!("attribute `{name}` is not active"),
                }
            })
        };
        let position = attribute(ATTRIBUTE_POSITION)?;
        let texture_coordinates = attribute(ATTRIBUTE_TEXTURE_COORDINATES)?;

        let [y, u, v] = SAMPLER_NAMES.map(|name| {
            device
                .uniform_location(handle, name)
                .ok_or_else(|| PipelineError::ShaderLink {
                    log: format!("sampler `{name}` is not active"),
                })
        });

        Ok(Self {
            handle,
            position,
            texture_coordinates,
            samplers: [y?, u?, v?],
        })
    }

    pub fn handle(&self) -> G::Program {
        self.handle
    }

    fn vertex_attributes(&self) -> [VertexAttribute; 2] {
        [
            VertexAttribute {
                location: self.position,
                components: QUAD_POSITION_COMPONENTS,
                offset_floats: 0,
            },
            VertexAttribute {
                location: self.texture_coordinates,
                components: QUAD_TEXTURE_COORDINATE_COMPONENTS,
                offset_floats: QUAD_POSITION_COMPONENTS,
            },
        ]
    }
}

fn compile<G: GpuDevice>(
    device: &G,
    stage: ShaderStage,
    source: &str,
) -> Result<G::Shader, PipelineError> {
    device
        .compile_shader(stage, source)
        .map_err(|log| PipelineError::ShaderCompile {
            stage,
            log: non_empty_log(log),
        })
}

/// ### English
/// Drivers may return an empty info log; callers always get some diagnostic text.
///
/// ### 中文
/// 驱动可能返回空的 info log；保证调用方总能拿到诊断文本。
fn non_empty_log(log: String) -> String {
    let trimmed = log.trim();
    if trimmed.is_empty() {
        "driver returned no diagnostic log".to_string()
    } else {
        trimmed.to_string()
    }
}

/// ### English
/// Exactly three plane textures (Y, U, V) and their last uploaded sizes.
///
/// ### 中文
/// 恰好三个平面纹理（Y、U、V）及其最近一次上传的尺寸。
pub struct TextureSet<G: GpuDevice> {
    textures: [G::Texture; PLANE_COUNT],
    sizes: [Option<PhysicalSize<u32>>; PLANE_COUNT],
}

impl<G: GpuDevice> TextureSet<G> {
    fn create(device: &G, filter: TextureFilter) -> Result<Self, PipelineError> {
        let mut textures = Vec::with_capacity(PLANE_COUNT);
        for _ in 0..PLANE_COUNT {
            match device.create_plane_texture(filter) {
                Ok(texture) => textures.push(texture),
                Err(err) => {
                    for texture in textures {
                        device.delete_texture(texture);
                    }
                    return Err(PipelineError::Gpu(format!(
                        "failed to create plane texture: {err}"
                    )));
                }
            }
        }
        let textures: [G::Texture; PLANE_COUNT] = std::array::from_fn(|i| textures[i]);
        Ok(Self {
            textures,
            sizes: [None; PLANE_COUNT],
        })
    }

    pub fn textures(&self) -> &[G::Texture; PLANE_COUNT] {
        &self.textures
    }

    /// ### English
    /// Sizes of the most recent upload, per plane.
    ///
    /// ### 中文
    /// 每个平面最近一次上传的尺寸。
    pub fn sizes(&self) -> &[Option<PhysicalSize<u32>>; PLANE_COUNT] {
        &self.sizes
    }

    fn delete(&self, device: &G) {
        for texture in self.textures {
            device.delete_texture(texture);
        }
    }
}

/// ### English
/// Converts raw planar frames to RGB on the GPU.
///
/// Owned by the pipeline thread; every method must run where the device context is current.
/// Calls leave GPU binding state (program, active texture unit, bound textures) modified.
///
/// ### 中文
/// 在 GPU 上把原始平面帧转换为 RGB。
///
/// 由管线线程持有；所有方法都必须在设备上下文为 current 的线程上调用。
/// 调用会修改 GPU 绑定状态（program、活动纹理单元、已绑定纹理）。
pub struct ShaderPipeline<G: GpuDevice> {
    device: Rc<G>,
    program: ShaderProgram<G>,
    textures: TextureSet<G>,
    quad: G::Buffer,
    settings: RenderSettings,
    /// ### English
    /// Viewport of the last uploaded frame (luma stride × frame height).
    ///
    /// ### 中文
    /// 最近上传帧的视口（亮度 stride × 帧高度）。
    viewport: Option<PhysicalSize<u32>>,
    destroyed: bool,
}

impl<G: GpuDevice> ShaderPipeline<G> {
    /// ### English
    /// Builds the pipeline with sources generated for the device's shader dialect; the
    /// fragment shader embeds `settings.conversion`.
    ///
    /// ### 中文
    /// 使用按设备 shader 方言生成的源码构建管线；片元 shader 内嵌 `settings.conversion`。
    pub fn build(device: Rc<G>, settings: RenderSettings) -> Result<Self, PipelineError> {
        let dialect = device.shader_dialect();
        let vertex_source = vertex_shader_source(dialect);
        let fragment_source = fragment_shader_source(&settings.conversion, dialect);
        Self::build_with_sources(device, settings, &vertex_source, &fragment_source)
    }

    /// ### English
    /// Builds the pipeline from caller-supplied shader text. The fragment shader must keep
    /// the `tex_y`/`tex_u`/`tex_v` samplers and the attribute names of the default sources.
    ///
    /// #### Parameters
    /// - `device`: GPU device whose context is current.
    /// - `settings`: Texture filter and clear colour (the conversion is ignored here).
    /// - `vertex_source`: Vertex shader text.
    /// - `fragment_source`: Fragment shader text.
    ///
    /// ### 中文
    /// 使用调用方提供的 shader 文本构建管线。片元 shader 必须保留 `tex_y`/`tex_u`/`tex_v`
    /// sampler 以及默认源码中的属性名。
    ///
    /// #### 参数
    /// - `device`：上下文为 current 的 GPU 设备。
    /// - `settings`：纹理过滤方式与清屏颜色（此处忽略 conversion）。
    /// - `vertex_source`：顶点 shader 文本。
    /// - `fragment_source`：片元 shader 文本。
    pub fn build_with_sources(
        device: Rc<G>,
        settings: RenderSettings,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, PipelineError> {
        let program = ShaderProgram::build(&*device, vertex_source, fragment_source)?;

        let textures = match TextureSet::create(&*device, settings.texture_filter) {
            Ok(textures) => textures,
            Err(err) => {
                device.delete_program(program.handle);
                return Err(err);
            }
        };

        let quad = match device.create_vertex_buffer(&QUAD_VERTICES) {
            Ok(quad) => quad,
            Err(err) => {
                textures.delete(&*device);
                device.delete_program(program.handle);
                return Err(PipelineError::Gpu(format!(
                    "failed to create quad buffer: {err}"
                )));
            }
        };

        tracing::debug!(program = ?program.handle, "shader pipeline built");
        Ok(Self {
            device,
            program,
            textures,
            quad,
            settings,
            viewport: None,
            destroyed: false,
        })
    }

    /// ### English
    /// Uploads the three planes of `frame` into texture units 0/1/2.
    ///
    /// Each texture is re-specified at (stride × plane height), so a size change between
    /// frames never leaves a stale allocation bound.
    ///
    /// ### 中文
    /// 将 `frame` 的三个平面上传到纹理单元 0/1/2。
    ///
    /// 每个纹理都会按（stride × 平面高度）重新定义，因此帧间尺寸变化不会残留过期的分配。
    pub fn upload(&mut self, frame: &RawFrame) -> Result<(), PipelineError> {
        self.ensure_alive()?;

        self.device.use_program(Some(self.program.handle));
        for (unit, plane) in frame.planes().iter().enumerate() {
            let size = plane.texture_size();
            self.device.upload_plane(
                unit as u32,
                self.textures.textures[unit],
                size,
                plane.texture_bytes(),
            );
            self.device.set_sampler(&self.program.samplers[unit], unit as u32);
            self.textures.sizes[unit] = Some(size);
        }

        let viewport = frame.viewport_size();
        if self.viewport != Some(viewport) {
            tracing::debug!(
                width = viewport.width,
                height = viewport.height,
                "render viewport changed"
            );
        }
        self.viewport = Some(viewport);
        Ok(())
    }

    /// ### English
    /// Draws the last uploaded frame with one triangle-fan draw call.
    ///
    /// ### 中文
    /// 以一次 triangle-fan 绘制调用绘制最近上传的帧。
    pub fn draw(&mut self) -> Result<(), PipelineError> {
        self.ensure_alive()?;
        let viewport = self
            .viewport
            .ok_or_else(|| PipelineError::Gpu("draw called before any frame was uploaded".into()))?;

        self.device.use_program(Some(self.program.handle));
        self.device.set_viewport(viewport);
        self.device.clear(self.settings.clear_color);
        self.device.draw_triangle_fan(
            self.quad,
            &self.program.vertex_attributes(),
            QUAD_STRIDE_FLOATS,
            QUAD_VERTEX_COUNT,
        );
        Ok(())
    }

    /// ### English
    /// Uploads and draws `frame`.
    ///
    /// ### 中文
    /// 上传并绘制 `frame`。
    pub fn render(&mut self, frame: &RawFrame) -> Result<(), PipelineError> {
        self.upload(frame)?;
        self.draw()
    }

    pub fn viewport(&self) -> Option<PhysicalSize<u32>> {
        self.viewport
    }

    pub fn textures(&self) -> &TextureSet<G> {
        &self.textures
    }

    pub fn program(&self) -> &ShaderProgram<G> {
        &self.program
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// ### English
    /// Deletes the program, textures and quad buffer (idempotent).
    ///
    /// Must run while the device context is current.
    ///
    /// ### 中文
    /// 删除 program、纹理与四边形缓冲（幂等）。
    ///
    /// 必须在设备上下文为 current 时执行。
    pub fn destroy(&mut self) {
        if std::mem::replace(&mut self.destroyed, true) {
            return;
        }
        self.device.use_program(None);
        self.textures.delete(&*self.device);
        self.device.delete_vertex_buffer(self.quad);
        self.device.delete_program(self.program.handle);
        self.viewport = None;
        tracing::debug!("shader pipeline destroyed");
    }

    fn ensure_alive(&self) -> Result<(), PipelineError> {
        if self.destroyed {
            return Err(PipelineError::Gpu("shader pipeline was destroyed".into()));
        }
        Ok(())
    }
}

impl<G: GpuDevice> Drop for ShaderPipeline<G> {
    fn drop(&mut self) {
        self.destroy();
    }
}
