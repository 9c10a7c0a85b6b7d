//! ### English
//! YUV → RGB conversion parameters shared by the fragment shader generator and the CPU
//! reference implementation.
//!
//! ### 中文
//! YUV → RGB 转换参数，由片元 shader 生成器与 CPU 参考实现共用。

/// ### English
/// Affine YUV → RGB conversion:
///
/// ```text
/// y = (y_s - luma_offset) * luma_scale
/// u = u_s - chroma_offset
/// v = v_s - chroma_offset
/// rgb = y + u * u_coeffs + v * v_coeffs
/// ```
///
/// Samples are normalized 8-bit values in `[0, 1]`.
///
/// ### 中文
/// 仿射 YUV → RGB 转换（公式见上）。
///
/// 采样值为归一化到 `[0, 1]` 的 8 位数据。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YuvToRgb {
    pub luma_offset: f32,
    pub luma_scale: f32,
    pub chroma_offset: f32,
    /// ### English
    /// Contribution of `u` to (r, g, b).
    ///
    /// ### 中文
    /// `u` 对 (r, g, b) 的贡献系数。
    pub u_coeffs: [f32; 3],
    /// ### English
    /// Contribution of `v` to (r, g, b).
    ///
    /// ### 中文
    /// `v` 对 (r, g, b) 的贡献系数。
    pub v_coeffs: [f32; 3],
}

impl YuvToRgb {
    /// ### English
    /// BT.601 limited range (16..235 luma) expanded to full range. These coefficients are a
    /// fixed contract; changing them changes every rendered pixel.
    ///
    /// ### 中文
    /// BT.601 有限范围（亮度 16..235）扩展到全范围。该系数是固定约定，修改会改变所有渲染像素。
    pub const BT601_LIMITED: Self = Self {
        luma_offset: 16.0 / 255.0,
        luma_scale: 1.164,
        chroma_offset: 128.0 / 255.0,
        u_coeffs: [0.0, -0.392, 2.017],
        v_coeffs: [1.596, -0.813, 0.0],
    };

    /// ### English
    /// BT.601 full range (JPEG style) input.
    ///
    /// ### 中文
    /// BT.601 全范围（JPEG 风格）输入。
    pub const BT601_FULL: Self = Self {
        luma_offset: 0.0,
        luma_scale: 1.0,
        chroma_offset: 0.5,
        u_coeffs: [0.0, -0.344, 1.772],
        v_coeffs: [1.402, -0.714, 0.0],
    };

    /// ### English
    /// Converts one normalized sample triple to RGBA, exactly as the generated shader does
    /// (no clamping; the framebuffer clamps on write).
    ///
    /// ### 中文
    /// 将一组归一化采样转换为 RGBA，与生成的 shader 完全一致（不做 clamp，写入 framebuffer 时才会 clamp）。
    pub fn convert(&self, y_s: f32, u_s: f32, v_s: f32) -> [f32; 4] {
        let y = (y_s - self.luma_offset) * self.luma_scale;
        let u = u_s - self.chroma_offset;
        let v = v_s - self.chroma_offset;
        let channel = |i: usize| y + u * self.u_coeffs[i] + v * self.v_coeffs[i];
        [channel(0), channel(1), channel(2), 1.0]
    }

    /// ### English
    /// Convenience wrapper over [`Self::convert`] for raw 8-bit samples.
    ///
    /// ### 中文
    /// 针对原始 8 位采样的 [`Self::convert`] 便捷封装。
    pub fn convert_u8(&self, y: u8, u: u8, v: u8) -> [f32; 4] {
        let norm = |s: u8| s as f32 / 255.0;
        self.convert(norm(y), norm(u), norm(v))
    }
}

impl Default for YuvToRgb {
    fn default() -> Self {
        Self::BT601_LIMITED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn neutral_chroma_yields_gray() {
        let [r, g, b, a] = YuvToRgb::BT601_LIMITED.convert_u8(128, 128, 128);
        let expected = (128.0 - 16.0) / 255.0 * 1.164;
        assert_close(r, expected);
        assert_close(g, expected);
        assert_close(b, expected);
        assert_eq!(a, 1.0);
    }

    #[test]
    fn limited_range_black_and_white() {
        let black = YuvToRgb::BT601_LIMITED.convert_u8(16, 128, 128);
        for channel in &black[..3] {
            assert_close(*channel, 0.0);
        }
        let white = YuvToRgb::BT601_LIMITED.convert_u8(235, 128, 128);
        for channel in &white[..3] {
            assert!((channel - 1.0).abs() < 0.002);
        }
    }

    #[test]
    fn red_chroma_only_touches_red_and_green() {
        let conv = YuvToRgb::BT601_LIMITED;
        let neutral = conv.convert_u8(128, 128, 128);
        let reddish = conv.convert_u8(128, 128, 200);
        assert!(reddish[0] > neutral[0]);
        assert!(reddish[1] < neutral[1]);
        assert_close(reddish[2], neutral[2]);
    }
}
