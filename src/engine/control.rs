//! ### English
//! Pause/quit signals shared between the embedder and the pipeline thread.
//!
//! ### 中文
//! 嵌入方与管线线程共享的暂停/退出信号。

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Sender};

/// ### English
/// Externally toggled playback flags plus a wake signal.
///
/// Flags are sampled by the pipeline thread once per iteration; toggling never interrupts a
/// decode/render cycle in progress. The wake signal lets a paused loop block instead of
/// spinning and react to `resume`/`request_quit` right away.
///
/// ### 中文
/// 由外部切换的播放标记以及唤醒信号。
///
/// 管线线程每次迭代读取一次标记；切换不会打断进行中的解码/渲染周期。
/// 唤醒信号让暂停中的循环可以阻塞等待而不是自旋，并能立即响应 `resume`/`request_quit`。
pub struct PlaybackControl {
    paused: AtomicBool,
    quit: AtomicBool,
    /// ### English
    /// Capacity-1 channel: repeated toggles coalesce into a single pending wake.
    ///
    /// ### 中文
    /// 容量为 1 的通道：多次切换会合并为一个待处理的唤醒。
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl PlaybackControl {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = channel::bounded(1);
        Self {
            paused: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            wake_tx,
            wake_rx,
        }
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            tracing::debug!("playback paused");
        }
        self.wake();
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            tracing::debug!("playback resumed");
        }
        self.wake();
    }

    /// ### English
    /// Asks the pipeline to stop after the current cycle. Irreversible.
    ///
    /// ### 中文
    /// 请求管线在当前周期结束后停止。不可撤销。
    pub fn request_quit(&self) {
        if !self.quit.swap(true, Ordering::AcqRel) {
            tracing::debug!("quit requested");
        }
        self.wake();
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// ### English
    /// Blocks until a flag changes or `timeout` elapses. Returns `true` when woken by a change.
    ///
    /// ### 中文
    /// 阻塞直到标记发生变化或 `timeout` 到期。因变化而唤醒时返回 `true`。
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        self.wake_rx.recv_timeout(timeout).is_ok()
    }

    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new()
    }
}
