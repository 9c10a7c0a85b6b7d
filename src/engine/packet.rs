//! ### English
//! Compressed units handed from the demuxing producer to the pipeline thread.
//!
//! ### 中文
//! 由解复用生产者交给管线线程的压缩单元。

use bytes::Bytes;

/// ### English
/// One compressed access unit of the video elementary stream.
///
/// The payload is opaque to the pipeline; only the decoding engine interprets it.
/// Cloning is cheap (`Bytes` is reference counted).
///
/// ### 中文
/// 视频基本流中的一个压缩访问单元。
///
/// 载荷对管线不透明，仅由解码引擎解释。克隆开销很低（`Bytes` 为引用计数）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedUnit {
    /// ### English
    /// Encoded bytes.
    ///
    /// ### 中文
    /// 编码后的字节。
    data: Bytes,
    /// ### English
    /// Stream timestamp in the stream's time base (`None` when the container has none).
    ///
    /// ### 中文
    /// 以流时间基表示的时间戳（容器未提供时为 `None`）。
    timestamp: Option<i64>,
    keyframe: bool,
}

impl CompressedUnit {
    pub fn new(data: impl Into<Bytes>, timestamp: Option<i64>) -> Self {
        Self {
            data: data.into(),
            timestamp,
            keyframe: false,
        }
    }

    /// ### English
    /// Marks this unit as a random access point.
    ///
    /// ### 中文
    /// 将该单元标记为随机访问点（关键帧）。
    pub fn with_keyframe(mut self, keyframe: bool) -> Self {
        self.keyframe = keyframe;
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }
}
