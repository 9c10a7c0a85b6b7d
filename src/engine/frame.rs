//! ### English
//! Raw planar frames produced by the decoder and consumed by the shader pipeline.
//!
//! ### 中文
//! 由解码器产生、供 shader 管线消费的原始平面帧。

use std::fmt;

use dpi::PhysicalSize;

use crate::error::PipelineError;

/// ### English
/// Fixed plane count of every supported format (Y, U, V).
///
/// ### 中文
/// 所有支持格式的固定平面数量（Y、U、V）。
pub const PLANE_COUNT: usize = 3;

/// ### English
/// Planar 8-bit YUV pixel formats accepted by the pipeline.
///
/// ### 中文
/// 管线接受的 8 位平面 YUV 像素格式。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// ### English
    /// 4:2:0, chroma halved in both dimensions.
    ///
    /// ### 中文
    /// 4:2:0，色度在两个方向上均为一半分辨率。
    Yuv420p,
    Yuv422p,
    Yuv444p,
}

/// ### English
/// Plane geometry of a pixel format: plane count and chroma subsampling shifts.
///
/// ### 中文
/// 像素格式的平面几何：平面数量与色度下采样位移。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    pub plane_count: usize,
    /// ### English
    /// `log2` of the horizontal chroma subsampling ratio.
    ///
    /// ### 中文
    /// 水平方向色度下采样比例的 `log2`。
    pub chroma_shift_x: u32,
    /// ### English
    /// `log2` of the vertical chroma subsampling ratio.
    ///
    /// ### 中文
    /// 垂直方向色度下采样比例的 `log2`。
    pub chroma_shift_y: u32,
}

impl PlaneLayout {
    /// ### English
    /// Logical size of plane `index` for a frame of `size` (chroma sizes round up).
    ///
    /// ### 中文
    /// 尺寸为 `size` 的帧中第 `index` 个平面的逻辑尺寸（色度尺寸向上取整）。
    pub fn plane_size(&self, index: usize, size: PhysicalSize<u32>) -> PhysicalSize<u32> {
        if index == 0 {
            return size;
        }
        PhysicalSize::new(
            size.width.div_ceil(1 << self.chroma_shift_x),
            size.height.div_ceil(1 << self.chroma_shift_y),
        )
    }
}

impl PixelFormat {
    pub fn layout(self) -> PlaneLayout {
        let (chroma_shift_x, chroma_shift_y) = match self {
            Self::Yuv420p => (1, 1),
            Self::Yuv422p => (1, 0),
            Self::Yuv444p => (0, 0),
        };
        PlaneLayout {
            plane_count: PLANE_COUNT,
            chroma_shift_x,
            chroma_shift_y,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
        };
        f.write_str(name)
    }
}

/// ### English
/// One single-channel sample grid.
///
/// `stride` is the number of bytes per row in `data` and may exceed `width` because of
/// alignment padding.
///
/// ### 中文
/// 单通道采样网格。
///
/// `stride` 为 `data` 中每行的字节数，可能因对齐填充而大于 `width`。
#[derive(Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl Plane {
    pub fn new(data: Vec<u8>, width: u32, height: u32, stride: u32) -> Self {
        Self {
            data,
            width,
            height,
            stride,
        }
    }

    /// ### English
    /// Texture size used to upload this plane: the full stride by the plane height.
    ///
    /// ### 中文
    /// 上传该平面使用的纹理尺寸：完整 stride × 平面高度。
    pub fn texture_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.stride, self.height)
    }

    /// ### English
    /// Bytes covered by the texture (`stride * height`).
    ///
    /// ### 中文
    /// 纹理覆盖的字节（`stride * height`）。
    pub fn texture_bytes(&self) -> &[u8] {
        let len = self.stride as usize * self.height as usize;
        &self.data[..len.min(self.data.len())]
    }
}

impl fmt::Debug for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plane")
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish()
    }
}

/// ### English
/// Decoded frame made of three planes (Y full resolution, U/V subsampled per format).
///
/// Dropping the frame releases its buffers; the type is single-owner so a frame being
/// rendered can never be mutated by the decoder.
///
/// ### 中文
/// 由三个平面组成的解码帧（Y 为全分辨率，U/V 按格式下采样）。
///
/// drop 帧即释放其缓冲区；该类型为单一所有者，渲染中的帧不可能被解码器修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    format: PixelFormat,
    size: PhysicalSize<u32>,
    planes: [Plane; PLANE_COUNT],
    timestamp: Option<i64>,
}

impl RawFrame {
    /// ### English
    /// Builds a frame after validating every plane against `format` and `size`.
    ///
    /// #### Parameters
    /// - `format`: Pixel format tag.
    /// - `size`: Logical luma size.
    /// - `planes`: Y, U, V planes in that order.
    /// - `timestamp`: Presentation timestamp carried through from the compressed unit.
    ///
    /// ### 中文
    /// 根据 `format` 与 `size` 校验每个平面后构建帧。
    ///
    /// #### 参数
    /// - `format`：像素格式标记。
    /// - `size`：亮度逻辑尺寸。
    /// - `planes`：依次为 Y、U、V 平面。
    /// - `timestamp`：从压缩单元透传的显示时间戳。
    pub fn new(
        format: PixelFormat,
        size: PhysicalSize<u32>,
        planes: [Plane; PLANE_COUNT],
        timestamp: Option<i64>,
    ) -> Result<Self, PipelineError> {
        if size.width == 0 || size.height == 0 {
            return Err(PipelineError::InvalidFrame(format!(
                "empty frame {}x{}",
                size.width, size.height
            )));
        }

        let layout = format.layout();
        for (index, plane) in planes.iter().enumerate() {
            let expected = layout.plane_size(index, size);
            if plane.width != expected.width || plane.height != expected.height {
                return Err(PipelineError::InvalidFrame(format!(
                    "{format} plane {index} is {}x{}, expected {}x{}",
                    plane.width, plane.height, expected.width, expected.height
                )));
            }
            if plane.stride < plane.width {
                return Err(PipelineError::InvalidFrame(format!(
                    "plane {index} stride {} is narrower than width {}",
                    plane.stride, plane.width
                )));
            }
            let required = plane.stride as usize * plane.height as usize;
            if plane.data.len() < required {
                return Err(PipelineError::InvalidFrame(format!(
                    "plane {index} holds {} bytes, needs {required}",
                    plane.data.len()
                )));
            }
        }

        Ok(Self {
            format,
            size,
            planes,
            timestamp,
        })
    }

    /// ### English
    /// Allocates a tightly packed frame filled with constant samples (handy for tests and
    /// placeholder output).
    ///
    /// ### 中文
    /// 分配一个紧密排列、以常量采样填充的帧（便于测试与占位输出）。
    pub fn filled(
        format: PixelFormat,
        size: PhysicalSize<u32>,
        yuv: [u8; 3],
    ) -> Result<Self, PipelineError> {
        let layout = format.layout();
        let planes = std::array::from_fn(|index| {
            let plane_size = layout.plane_size(index, size);
            let len = plane_size.width as usize * plane_size.height as usize;
            Plane::new(
                vec![yuv[index]; len],
                plane_size.width,
                plane_size.height,
                plane_size.width,
            )
        });
        Self::new(format, size, planes, None)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn planes(&self) -> &[Plane; PLANE_COUNT] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// ### English
    /// Render viewport: luma stride wide, frame height tall.
    ///
    /// ### 中文
    /// 渲染视口：宽为亮度 stride，高为帧高度。
    pub fn viewport_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.planes[0].stride, self.size.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chroma_planes_round_up_for_odd_sizes() {
        let layout = PixelFormat::Yuv420p.layout();
        let size = PhysicalSize::new(5, 3);
        assert_eq!(layout.plane_size(0, size), PhysicalSize::new(5, 3));
        assert_eq!(layout.plane_size(1, size), PhysicalSize::new(3, 2));
        assert_eq!(layout.plane_size(2, size), PhysicalSize::new(3, 2));
    }

    #[test]
    fn yuv422_only_halves_width() {
        let layout = PixelFormat::Yuv422p.layout();
        assert_eq!(
            layout.plane_size(1, PhysicalSize::new(640, 480)),
            PhysicalSize::new(320, 480)
        );
    }

    #[test]
    fn padded_strides_are_accepted_and_drive_the_viewport() {
        let size = PhysicalSize::new(6, 4);
        let planes = [
            Plane::new(vec![16; 8 * 4], 6, 4, 8),
            Plane::new(vec![128; 4 * 2], 3, 2, 4),
            Plane::new(vec![128; 4 * 2], 3, 2, 4),
        ];
        let frame = RawFrame::new(PixelFormat::Yuv420p, size, planes, Some(7)).unwrap();
        assert_eq!(frame.viewport_size(), PhysicalSize::new(8, 4));
        assert_eq!(frame.plane(1).texture_size(), PhysicalSize::new(4, 2));
        assert_eq!(frame.timestamp(), Some(7));
    }

    #[test]
    fn short_plane_buffer_is_rejected() {
        let size = PhysicalSize::new(4, 4);
        let planes = [
            Plane::new(vec![0; 15], 4, 4, 4),
            Plane::new(vec![0; 4], 2, 2, 2),
            Plane::new(vec![0; 4], 2, 2, 2),
        ];
        let err = RawFrame::new(PixelFormat::Yuv420p, size, planes, None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFrame(_)));
    }

    #[test]
    fn mismatched_chroma_geometry_is_rejected() {
        let size = PhysicalSize::new(4, 4);
        let planes = [
            Plane::new(vec![0; 16], 4, 4, 4),
            Plane::new(vec![0; 16], 4, 4, 4),
            Plane::new(vec![0; 16], 4, 4, 4),
        ];
        assert!(RawFrame::new(PixelFormat::Yuv420p, size, planes, None).is_err());
    }
}
