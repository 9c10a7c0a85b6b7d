//! ### English
//! Playback counters readable from any thread.
//!
//! ### 中文
//! 可从任意线程读取的播放计数。

use std::sync::atomic::{AtomicU64, Ordering};

use dpi::PhysicalSize;

/// ### English
/// Counters updated by the pipeline thread.
///
/// ### 中文
/// 由管线线程更新的计数器。
#[derive(Debug, Default)]
pub struct PlaybackStats {
    units_popped: AtomicU64,
    frames_decoded: AtomicU64,
    frames_rendered: AtomicU64,
    pending_outputs: AtomicU64,
    decode_errors: AtomicU64,
    dropped_frames: AtomicU64,
    /// ### English
    /// Current video size packed as `width << 32 | height`; 0 means unknown.
    ///
    /// ### 中文
    /// 当前视频尺寸，打包为 `width << 32 | height`；0 表示未知。
    video_size: AtomicU64,
}

/// ### English
/// Point-in-time copy of [`PlaybackStats`].
///
/// ### 中文
/// [`PlaybackStats`] 的某一时刻快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub units_popped: u64,
    pub frames_decoded: u64,
    pub frames_rendered: u64,
    pub pending_outputs: u64,
    pub decode_errors: u64,
    pub dropped_frames: u64,
    pub video_size: Option<PhysicalSize<u32>>,
}

impl PlaybackStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_pop(&self) {
        self.units_popped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_pending(&self) {
        self.pending_outputs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self, frames: u64) {
        self.dropped_frames.fetch_add(frames, Ordering::Relaxed);
    }

    pub(crate) fn set_video_size(&self, size: PhysicalSize<u32>) {
        let packed = (u64::from(size.width) << 32) | u64::from(size.height);
        self.video_size.store(packed, Ordering::Release);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn video_size(&self) -> Option<PhysicalSize<u32>> {
        match self.video_size.load(Ordering::Acquire) {
            0 => None,
            packed => Some(PhysicalSize::new((packed >> 32) as u32, packed as u32)),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            units_popped: self.units_popped.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            pending_outputs: self.pending_outputs.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            video_size: self.video_size(),
        }
    }
}
