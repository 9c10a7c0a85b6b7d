//! ### English
//! Decoder adapter: wraps an external decoding engine and turns one compressed unit into
//! zero or one raw planar frame.
//!
//! ### 中文
//! 解码适配器：封装外部解码引擎，把一个压缩单元转换为零或一个原始平面帧。

#[cfg(feature = "ffmpeg")]
mod ffmpeg;
#[cfg(any(feature = "ffmpeg", test))]
mod submit;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegEngine;

use dpi::PhysicalSize;

use crate::error::PipelineError;

use super::frame::RawFrame;
use super::packet::CompressedUnit;

/// ### English
/// Result of feeding one unit to a decoding engine.
///
/// ### 中文
/// 向解码引擎送入一个单元后的结果。
#[derive(Debug)]
pub enum DecodeOutcome {
    Frame(RawFrame),
    /// ### English
    /// The engine buffered the unit internally (e.g. reordering) and has no output yet.
    ///
    /// ### 中文
    /// 引擎在内部缓存了该单元（例如重排序），暂时没有输出。
    Pending,
}

/// ### English
/// External decoding engine boundary.
///
/// Implementations own their bitstream state; the pipeline only relies on the plane layout
/// of the returned frames. Engines are built on the pipeline thread and never leave it.
///
/// ### 中文
/// 外部解码引擎边界。
///
/// 实现自行持有码流状态；管线只依赖返回帧的平面布局。引擎在管线线程上创建，且不会离开该线程。
pub trait DecodeEngine {
    /// ### English
    /// Decodes one unit. An `Err` carries the engine's diagnostic text.
    ///
    /// ### 中文
    /// 解码一个单元。`Err` 携带引擎的诊断文本。
    fn decode(&mut self, unit: &CompressedUnit) -> Result<DecodeOutcome, String>;

    /// ### English
    /// Signals end of input and returns every frame still buffered inside the engine.
    ///
    /// ### 中文
    /// 通知输入结束，并返回引擎内部仍缓存的所有帧。
    fn flush(&mut self) -> Result<Vec<RawFrame>, String> {
        Ok(Vec::new())
    }
}

impl<E: DecodeEngine + ?Sized> DecodeEngine for Box<E> {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<DecodeOutcome, String> {
        (**self).decode(unit)
    }

    fn flush(&mut self) -> Result<Vec<RawFrame>, String> {
        (**self).flush()
    }
}

/// ### English
/// Per-adapter decode counters.
///
/// ### 中文
/// 适配器级别的解码计数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeCounters {
    pub frames: u64,
    pub pending: u64,
    pub failures: u64,
}

/// ### English
/// Adapter between the pipeline driver and a [`DecodeEngine`].
///
/// ### 中文
/// 管线驱动与 [`DecodeEngine`] 之间的适配器。
pub struct DecoderAdapter<E> {
    engine: E,
    counters: DecodeCounters,
    /// ### English
    /// Size of the most recent frame (the decoder context dimensions).
    ///
    /// ### 中文
    /// 最近一帧的尺寸（即解码上下文尺寸）。
    frame_size: Option<PhysicalSize<u32>>,
}

impl<E: DecodeEngine> DecoderAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            counters: DecodeCounters::default(),
            frame_size: None,
        }
    }

    /// ### English
    /// Decodes `unit`, consuming it whatever the outcome.
    ///
    /// Returns `Ok(None)` when the engine buffered the unit, `Ok(Some(frame))` when a frame
    /// was produced and `Err(PipelineError::Decode)` when the engine rejected the unit.
    ///
    /// #### Parameters
    /// - `unit`: Compressed unit popped from the queue.
    ///
    /// ### 中文
    /// 解码 `unit`，无论结果如何都会消耗该单元。
    ///
    /// 引擎缓存单元时返回 `Ok(None)`，产生帧时返回 `Ok(Some(frame))`，
    /// 引擎拒绝该单元时返回 `Err(PipelineError::Decode)`。
    ///
    /// #### 参数
    /// - `unit`：从队列 pop 出的压缩单元。
    pub fn decode(&mut self, unit: CompressedUnit) -> Result<Option<RawFrame>, PipelineError> {
        match self.engine.decode(&unit) {
            Ok(DecodeOutcome::Frame(frame)) => {
                self.counters.frames += 1;
                let size = frame.size();
                if self.frame_size != Some(size) {
                    tracing::debug!(
                        width = size.width,
                        height = size.height,
                        format = %frame.format(),
                        "decoder output size changed"
                    );
                    self.frame_size = Some(size);
                }
                Ok(Some(frame))
            }
            Ok(DecodeOutcome::Pending) => {
                self.counters.pending += 1;
                tracing::trace!(bytes = unit.len(), "decoder buffered unit");
                Ok(None)
            }
            Err(err) => {
                self.counters.failures += 1;
                Err(PipelineError::Decode(err))
            }
        }
    }

    /// ### English
    /// Drains the engine's buffered frames at end of stream.
    ///
    /// ### 中文
    /// 在流结束时取出引擎缓存的帧。
    pub fn flush(&mut self) -> Result<Vec<RawFrame>, PipelineError> {
        match self.engine.flush() {
            Ok(frames) => {
                self.counters.frames += frames.len() as u64;
                tracing::debug!(frames = frames.len(), "decoder flushed");
                Ok(frames)
            }
            Err(err) => {
                self.counters.failures += 1;
                Err(PipelineError::Decode(err))
            }
        }
    }

    pub fn counters(&self) -> DecodeCounters {
        self.counters
    }

    pub fn frame_size(&self) -> Option<PhysicalSize<u32>> {
        self.frame_size
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::frame::PixelFormat;
    use crate::engine::test_support::ScriptedEngine;

    #[test]
    fn pending_and_errors_are_distinguished() {
        let frame = RawFrame::filled(PixelFormat::Yuv420p, PhysicalSize::new(4, 2), [16, 128, 128])
            .unwrap();
        let engine = ScriptedEngine::new(vec![
            Ok(DecodeOutcome::Pending),
            Err("corrupt slice".to_string()),
            Ok(DecodeOutcome::Frame(frame)),
        ]);
        let mut adapter = DecoderAdapter::new(engine);

        assert!(adapter.decode(CompressedUnit::new(vec![0u8], None)).unwrap().is_none());
        assert_eq!(
            adapter.decode(CompressedUnit::new(vec![1u8], None)),
            Err(PipelineError::Decode("corrupt slice".to_string()))
        );
        let decoded = adapter.decode(CompressedUnit::new(vec![2u8], None)).unwrap();
        assert_eq!(decoded.map(|f| f.size()), Some(PhysicalSize::new(4, 2)));

        assert_eq!(
            adapter.counters(),
            DecodeCounters {
                frames: 1,
                pending: 1,
                failures: 1,
            }
        );
        assert_eq!(adapter.frame_size(), Some(PhysicalSize::new(4, 2)));
        assert_eq!(adapter.engine_mut().seen(), &[vec![0u8], vec![1], vec![2]]);
    }

    #[test]
    fn flush_returns_buffered_frames() {
        let frame = RawFrame::filled(PixelFormat::Yuv444p, PhysicalSize::new(2, 2), [16, 128, 128])
            .unwrap();
        let mut adapter = DecoderAdapter::new(ScriptedEngine::new(Vec::new()).with_buffered(vec![frame]));

        let flushed = adapter.flush().unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(adapter.counters().frames, 1);
        assert!(adapter.flush().unwrap().is_empty());
    }
}
