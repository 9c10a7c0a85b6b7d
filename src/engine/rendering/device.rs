//! ### English
//! GPU device seam used by the shader pipeline, plus its OpenGL implementation on `glow`.
//!
//! The pipeline only needs a handful of GL operations; keeping them behind [`GpuDevice`] lets
//! the pipeline logic (resource ownership, failure cleanup, per-frame sizing) run against a
//! recording device in tests.
//!
//! ### 中文
//! shader 管线使用的 GPU 设备抽象，以及基于 `glow` 的 OpenGL 实现。
//!
//! 管线只需要少量 GL 操作；把它们放在 [`GpuDevice`] 之后，可以让管线逻辑
//! （资源所有权、失败清理、逐帧尺寸）在测试中针对录制设备运行。

use std::fmt;

use dpi::PhysicalSize;
use glow::HasContext as _;

use super::shader::{ShaderDialect, ShaderStage};

/// ### English
/// `GL_LUMINANCE` (GLES 2 / compatibility profiles only).
///
/// ### 中文
/// `GL_LUMINANCE`（仅 GLES 2 / 兼容模式）。
const GL_LUMINANCE: u32 = 0x1909;

/// ### English
/// Sampling filter applied to the plane textures.
///
/// ### 中文
/// 平面纹理使用的采样过滤方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

/// ### English
/// One float vertex attribute inside an interleaved vertex buffer.
///
/// ### 中文
/// 交错顶点缓冲中的一个浮点顶点属性。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    /// ### English
    /// Offset from the start of the vertex, in floats.
    ///
    /// ### 中文
    /// 相对顶点起始位置的偏移（以 float 计）。
    pub offset_floats: u32,
}

/// ### English
/// Minimal GPU API required by [`super::ShaderPipeline`].
///
/// All calls must happen on the thread where the device's context is current.
///
/// ### 中文
/// [`super::ShaderPipeline`] 所需的最小 GPU API。
///
/// 所有调用都必须在设备上下文为 current 的线程上进行。
pub trait GpuDevice {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + fmt::Debug;
    type Texture: Copy + fmt::Debug;
    type Buffer: Copy + fmt::Debug;
    type Uniform: Clone + fmt::Debug;

    /// ### English
    /// GLSL dialect accepted by this device's context.
    ///
    /// ### 中文
    /// 本设备上下文接受的 GLSL 方言。
    fn shader_dialect(&self) -> ShaderDialect {
        ShaderDialect::Legacy
    }

    /// ### English
    /// Compiles one shader stage. On failure the shader object is deleted and the info log
    /// is returned.
    ///
    /// ### 中文
    /// 编译一个 shader 阶段。失败时删除 shader 对象并返回 info log。
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;

    fn delete_shader(&self, shader: Self::Shader);

    /// ### English
    /// Links `vertex` + `fragment`, binding each `(location, name)` attribute before linking.
    /// On failure the program object is deleted and the info log is returned.
    ///
    /// ### 中文
    /// 链接 `vertex` 与 `fragment`，链接前绑定每个 `(location, name)` 属性。
    /// 失败时删除 program 对象并返回 info log。
    fn link_program(
        &self,
        vertex: Self::Shader,
        fragment: Self::Shader,
        attributes: &[(u32, &str)],
    ) -> Result<Self::Program, String>;

    fn delete_program(&self, program: Self::Program);

    fn use_program(&self, program: Option<Self::Program>);

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::Uniform>;

    /// ### English
    /// Points a sampler uniform of the current program at texture unit `unit`.
    ///
    /// ### 中文
    /// 将当前 program 的 sampler uniform 指向纹理单元 `unit`。
    fn set_sampler(&self, uniform: &Self::Uniform, unit: u32);

    /// ### English
    /// Creates a single-channel 2D texture with clamp-to-edge wrapping.
    ///
    /// ### 中文
    /// 创建使用 clamp-to-edge 环绕方式的单通道 2D 纹理。
    fn create_plane_texture(&self, filter: TextureFilter) -> Result<Self::Texture, String>;

    /// ### English
    /// Re-specifies `texture` on texture unit `unit` with `size` and 8-bit `pixels`.
    ///
    /// ### 中文
    /// 在纹理单元 `unit` 上以 `size` 与 8 位 `pixels` 重新定义 `texture`。
    fn upload_plane(
        &self,
        unit: u32,
        texture: Self::Texture,
        size: PhysicalSize<u32>,
        pixels: &[u8],
    );

    fn delete_texture(&self, texture: Self::Texture);

    fn create_vertex_buffer(&self, vertices: &[f32]) -> Result<Self::Buffer, String>;

    fn delete_vertex_buffer(&self, buffer: Self::Buffer);

    fn set_viewport(&self, size: PhysicalSize<u32>);

    fn clear(&self, color: [f32; 4]);

    /// ### English
    /// Binds `attributes` from `buffer` (interleaved, `stride_floats` per vertex) and draws
    /// `vertex_count` vertices as a triangle fan.
    ///
    /// ### 中文
    /// 从 `buffer`（交错排列，每顶点 `stride_floats` 个 float）绑定 `attributes`，
    /// 并以 triangle fan 绘制 `vertex_count` 个顶点。
    fn draw_triangle_fan(
        &self,
        buffer: Self::Buffer,
        attributes: &[VertexAttribute],
        stride_floats: u32,
        vertex_count: u32,
    );
}

/// ### English
/// Vertex buffer (plus vertex array object on GL 3+/GLES 3) owned by [`GlowDevice`].
///
/// ### 中文
/// [`GlowDevice`] 持有的顶点缓冲（GL 3+/GLES 3 上附带 VAO）。
#[derive(Clone, Copy, Debug)]
pub struct GlowQuad {
    vertex_array: Option<glow::NativeVertexArray>,
    buffer: glow::NativeBuffer,
}

/// ### English
/// [`GpuDevice`] implemented on a `glow` OpenGL / GLES context.
///
/// ### 中文
/// 基于 `glow` OpenGL / GLES 上下文实现的 [`GpuDevice`]。
pub struct GlowDevice {
    gl: glow::Context,
    /// ### English
    /// `(internal_format, format)` used for single-channel plane uploads.
    /// `R8`/`RED` on GL 3+/GLES 3, `LUMINANCE` otherwise.
    ///
    /// ### 中文
    /// 单通道平面上传使用的 `(internal_format, format)`。
    /// GL 3+/GLES 3 使用 `R8`/`RED`，否则使用 `LUMINANCE`。
    plane_format: (i32, u32),
    /// ### English
    /// Whether vertex array objects are available (required by core profiles).
    ///
    /// ### 中文
    /// 是否可用 VAO（core profile 必需）。
    vertex_arrays: bool,
    dialect: ShaderDialect,
}

impl GlowDevice {
    /// ### English
    /// Wraps a loaded context. The context must be current on the calling thread.
    ///
    /// ### 中文
    /// 封装已加载的上下文。上下文必须在调用线程上为 current。
    pub fn new(gl: glow::Context) -> Self {
        let version = gl.version();
        let modern = version.major >= 3;
        tracing::debug!(
            major = version.major,
            minor = version.minor,
            embedded = version.is_embedded,
            "loaded GL context"
        );
        let plane_format = if modern {
            (glow::R8 as i32, glow::RED)
        } else {
            (GL_LUMINANCE as i32, GL_LUMINANCE)
        };
        let dialect = ShaderDialect::for_version(version.major, version.minor, version.is_embedded);
        Self {
            gl,
            plane_format,
            vertex_arrays: modern,
            dialect,
        }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// ### English
    /// Binds the draw target (`None` = default framebuffer).
    ///
    /// ### 中文
    /// 绑定绘制目标（`None` 表示默认 framebuffer）。
    pub fn bind_framebuffer(&self, framebuffer: Option<glow::NativeFramebuffer>) {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer);
        }
    }

    fn shader_type(stage: ShaderStage) -> u32 {
        match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    fn filter_param(filter: TextureFilter) -> i32 {
        match filter {
            TextureFilter::Linear => glow::LINEAR as i32,
            TextureFilter::Nearest => glow::NEAREST as i32,
        }
    }
}

impl GpuDevice for GlowDevice {
    type Shader = glow::NativeShader;
    type Program = glow::NativeProgram;
    type Texture = glow::NativeTexture;
    type Buffer = GlowQuad;
    type Uniform = glow::NativeUniformLocation;

    fn shader_dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String> {
        unsafe {
            let shader = self.gl.create_shader(Self::shader_type(stage))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                return Ok(shader);
            }
            let log = self.gl.get_shader_info_log(shader);
            self.gl.delete_shader(shader);
            Err(log)
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe {
            self.gl.delete_shader(shader);
        }
    }

    fn link_program(
        &self,
        vertex: Self::Shader,
        fragment: Self::Shader,
        attributes: &[(u32, &str)],
    ) -> Result<Self::Program, String> {
        unsafe {
            let program = self.gl.create_program()?;
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            for &(location, name) in attributes {
                self.gl.bind_attrib_location(program, location, name);
            }
            self.gl.link_program(program);

            if self.gl.get_program_link_status(program) {
                self.gl.detach_shader(program, vertex);
                self.gl.detach_shader(program, fragment);
                return Ok(program);
            }
            let log = self.gl.get_program_info_log(program);
            self.gl.delete_program(program);
            Err(log)
        }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe {
            self.gl.delete_program(program);
        }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe {
            self.gl.use_program(program);
        }
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::Uniform> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn set_sampler(&self, uniform: &Self::Uniform, unit: u32) {
        unsafe {
            self.gl.uniform_1_i32(Some(uniform), unit as i32);
        }
    }

    fn create_plane_texture(&self, filter: TextureFilter) -> Result<Self::Texture, String> {
        let filter = Self::filter_param(filter);
        unsafe {
            let texture = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(texture)
        }
    }

    fn upload_plane(
        &self,
        unit: u32,
        texture: Self::Texture,
        size: PhysicalSize<u32>,
        pixels: &[u8],
    ) {
        let (internal_format, format) = self.plane_format;
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            // Chroma strides are not guaranteed to be 4-byte aligned.
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format,
                size.width as i32,
                size.height as i32,
                0,
                format,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe {
            self.gl.delete_texture(texture);
        }
    }

    fn create_vertex_buffer(&self, vertices: &[f32]) -> Result<Self::Buffer, String> {
        unsafe {
            let vertex_array = if self.vertex_arrays {
                let vertex_array = self.gl.create_vertex_array()?;
                self.gl.bind_vertex_array(Some(vertex_array));
                Some(vertex_array)
            } else {
                None
            };

            let buffer = match self.gl.create_buffer() {
                Ok(buffer) => buffer,
                Err(err) => {
                    if let Some(vertex_array) = vertex_array {
                        self.gl.bind_vertex_array(None);
                        self.gl.delete_vertex_array(vertex_array);
                    }
                    return Err(err);
                }
            };
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            if vertex_array.is_some() {
                self.gl.bind_vertex_array(None);
            }

            Ok(GlowQuad {
                vertex_array,
                buffer,
            })
        }
    }

    fn delete_vertex_buffer(&self, buffer: Self::Buffer) {
        unsafe {
            self.gl.delete_buffer(buffer.buffer);
            if let Some(vertex_array) = buffer.vertex_array {
                self.gl.delete_vertex_array(vertex_array);
            }
        }
    }

    fn set_viewport(&self, size: PhysicalSize<u32>) {
        unsafe {
            self.gl
                .viewport(0, 0, size.width as i32, size.height as i32);
        }
    }

    fn clear(&self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn draw_triangle_fan(
        &self,
        buffer: Self::Buffer,
        attributes: &[VertexAttribute],
        stride_floats: u32,
        vertex_count: u32,
    ) {
        let float_size = std::mem::size_of::<f32>() as i32;
        unsafe {
            if let Some(vertex_array) = buffer.vertex_array {
                self.gl.bind_vertex_array(Some(vertex_array));
            }
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.buffer));
            for attribute in attributes {
                self.gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.components as i32,
                    glow::FLOAT,
                    false,
                    stride_floats as i32 * float_size,
                    attribute.offset_floats as i32 * float_size,
                );
                self.gl.enable_vertex_attrib_array(attribute.location);
            }
            self.gl
                .draw_arrays(glow::TRIANGLE_FAN, 0, vertex_count as i32);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            if buffer.vertex_array.is_some() {
                self.gl.bind_vertex_array(None);
            }
        }
    }
}
