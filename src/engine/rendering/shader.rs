//! ### English
//! Shader sources, symbolic attribute/uniform names and the fixed full-screen quad.
//!
//! Sources are generated per [`ShaderDialect`]: GLSL ES 1.00 / desktop GLSL 1.10 for GLES 2
//! and compatibility contexts, `#version 150` for desktop GL 3.2+ (core profiles reject the
//! unversioned dialect), `#version 300 es` for GLES 3.
//!
//! ### 中文
//! shader 源码、属性/uniform 名称以及固定的全屏四边形。
//!
//! 源码按 [`ShaderDialect`] 生成：GLES 2 与兼容模式上下文使用 GLSL ES 1.00 / 桌面 GLSL 1.10，
//! 桌面 GL 3.2+ 使用 `#version 150`（core profile 不接受无版本方言），GLES 3 使用 `#version 300 es`。

use std::fmt;

use super::conversion::YuvToRgb;

pub const ATTRIBUTE_POSITION: &str = "a_Position";
pub const ATTRIBUTE_TEXTURE_COORDINATES: &str = "a_TextureCoordinates";

/// ### English
/// Sampler uniforms for the Y, U and V planes, bound to texture units 0, 1, 2.
///
/// ### 中文
/// Y、U、V 平面的 sampler uniform，分别绑定到纹理单元 0、1、2。
pub const SAMPLER_NAMES: [&str; 3] = ["tex_y", "tex_u", "tex_v"];

/// ### English
/// GLSL dialect the shader sources are generated for.
///
/// ### 中文
/// 生成 shader 源码所针对的 GLSL 方言。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// ### English
    /// Unversioned GLSL 1.10 / GLSL ES 1.00 (`attribute`, `varying`, `texture2D`).
    ///
    /// ### 中文
    /// 无版本的 GLSL 1.10 / GLSL ES 1.00（`attribute`、`varying`、`texture2D`）。
    #[default]
    Legacy,
    /// ### English
    /// Desktop `#version 150`, accepted by 3.2+ core and compatibility profiles.
    ///
    /// ### 中文
    /// 桌面 `#version 150`，3.2+ 的 core 与兼容 profile 均接受。
    Glsl150,
    /// ### English
    /// `#version 300 es` for GLES 3 contexts.
    ///
    /// ### 中文
    /// 用于 GLES 3 上下文的 `#version 300 es`。
    Es300,
}

impl ShaderDialect {
    /// ### English
    /// Picks the dialect for a context version reported by the driver.
    ///
    /// #### Parameters
    /// - `major`/`minor`: Context version.
    /// - `embedded`: `true` for OpenGL ES.
    ///
    /// ### 中文
    /// 根据驱动报告的上下文版本选择方言。
    ///
    /// #### 参数
    /// - `major`/`minor`：上下文版本。
    /// - `embedded`：OpenGL ES 时为 `true`。
    pub fn for_version(major: u32, minor: u32, embedded: bool) -> Self {
        if embedded {
            if major >= 3 { Self::Es300 } else { Self::Legacy }
        } else if (major, minor) >= (3, 2) {
            Self::Glsl150
        } else {
            Self::Legacy
        }
    }

    fn version_line(self) -> &'static str {
        match self {
            Self::Legacy => "",
            Self::Glsl150 => "#version 150\n",
            Self::Es300 => "#version 300 es\n",
        }
    }

    fn precision_line(self) -> &'static str {
        match self {
            Self::Legacy => "#ifdef GL_ES\nprecision highp float;\n#endif\n",
            Self::Glsl150 => "",
            Self::Es300 => "precision highp float;\n",
        }
    }

    fn is_legacy(self) -> bool {
        self == Self::Legacy
    }
}

/// ### English
/// Fragment output variable used by the versioned dialects.
///
/// ### 中文
/// 带版本方言使用的片元输出变量。
const FRAGMENT_OUTPUT: &str = "o_FragColor";

/// ### English
/// Position + texture-coordinate pass-through vertex shader.
///
/// ### 中文
/// 透传位置与纹理坐标的顶点 shader。
pub fn vertex_shader_source(dialect: ShaderDialect) -> String {
    let (input, output) = if dialect.is_legacy() {
        ("attribute", "varying")
    } else {
        ("in", "out")
    };
    format!(
        "\
{version}{input} vec4 {ATTRIBUTE_POSITION};
{input} vec2 {ATTRIBUTE_TEXTURE_COORDINATES};
{output} vec2 v_TextureCoordinates;
void main()
{{
    v_TextureCoordinates = {ATTRIBUTE_TEXTURE_COORDINATES};
    gl_Position = {ATTRIBUTE_POSITION};
}}
",
        version = dialect.version_line(),
    )
}

/// ### English
/// Interleaved quad drawn as a triangle fan: `X, Y, S, T` per vertex.
/// The centre vertex comes first, then the four corners, closing on the first corner.
///
/// ### 中文
/// 以 triangle fan 绘制的交错四边形：每个顶点为 `X, Y, S, T`。
/// 先是中心点，然后四个角，最后回到第一个角闭合。
#[rustfmt::skip]
pub const QUAD_VERTICES: [f32; 24] = [
     0.0,  0.0, 0.5, 0.5,
    -1.0, -1.0, 0.0, 1.0,
     1.0, -1.0, 1.0, 1.0,
     1.0,  1.0, 1.0, 0.0,
    -1.0,  1.0, 0.0, 0.0,
    -1.0, -1.0, 0.0, 1.0,
];

pub const QUAD_VERTEX_COUNT: u32 = 6;
pub(crate) const QUAD_POSITION_COMPONENTS: u32 = 2;
pub(crate) const QUAD_TEXTURE_COORDINATE_COMPONENTS: u32 = 2;
pub(crate) const QUAD_STRIDE_FLOATS: u32 =
    QUAD_POSITION_COMPONENTS + QUAD_TEXTURE_COORDINATE_COMPONENTS;

/// ### English
/// Programmable pipeline stage.
///
/// ### 中文
/// 可编程管线阶段。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// ### English
/// Formats a float as a GLSL literal (always with a decimal point or exponent).
///
/// ### 中文
/// 将浮点数格式化为 GLSL 字面量（始终带小数点或指数）。
fn glsl_float(value: f32) -> String {
    format!("{value:?}")
}

/// ### English
/// Generates the planar YUV → RGB fragment shader for `conversion` in `dialect`.
///
/// ### 中文
/// 以 `dialect` 方言根据 `conversion` 生成平面 YUV → RGB 片元 shader。
pub fn fragment_shader_source(conversion: &YuvToRgb, dialect: ShaderDialect) -> String {
    let [u_r, u_g, u_b] = conversion.u_coeffs.map(glsl_float);
    let [v_r, v_g, v_b] = conversion.v_coeffs.map(glsl_float);
    let luma_offset = glsl_float(conversion.luma_offset);
    let luma_scale = glsl_float(conversion.luma_scale);
    let chroma_offset = glsl_float(conversion.chroma_offset);
    let [tex_y, tex_u, tex_v] = SAMPLER_NAMES;

    let (input, sample, output_decl, output) = if dialect.is_legacy() {
        ("varying", "texture2D", String::new(), "gl_FragColor")
    } else {
        (
            "in",
            "texture",
            format!("out vec4 {FRAGMENT_OUTPUT};\n"),
            FRAGMENT_OUTPUT,
        )
    };

    format!(
        "\
{version}{precision}{input} vec2 v_TextureCoordinates;
{output_decl}uniform sampler2D {tex_y};
uniform sampler2D {tex_u};
uniform sampler2D {tex_v};
void main()
{{
    vec4 c = vec4(({sample}({tex_y}, v_TextureCoordinates).r - {luma_offset}) * {luma_scale});
    vec4 U = vec4({sample}({tex_u}, v_TextureCoordinates).r - {chroma_offset});
    vec4 V = vec4({sample}({tex_v}, v_TextureCoordinates).r - {chroma_offset});
    c += V * vec4({v_r}, {v_g}, {v_b}, 0.0);
    c += U * vec4({u_r}, {u_g}, {u_b}, 0.0);
    c.a = 1.0;
    {output} = c;
}}
",
        version = dialect.version_line(),
        precision = dialect.precision_line(),
    )
}
