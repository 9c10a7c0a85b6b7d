//! ### English
//! Thread-safe FIFO of compressed units between the external producer and the pipeline thread.
//!
//! Built on `crossbeam-channel`; cancellation is broadcast by disconnecting a dedicated
//! cancel channel so every blocked `push`/`pop` wakes at once.
//!
//! ### 中文
//! 外部生产者与管线线程之间的线程安全 FIFO 压缩单元队列。
//!
//! 基于 `crossbeam-channel` 实现；取消时断开专用的 cancel 通道进行广播，
//! 使所有阻塞中的 `push`/`pop` 同时被唤醒。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{self as channel, Receiver, Sender};

use crate::error::PipelineError;

use super::packet::CompressedUnit;

/// ### English
/// Spin budget before a wait on in-flight pushers starts yielding.
///
/// ### 中文
/// 等待进行中的生产者时，切换为 `yield` 之前的自旋次数。
const IN_FLIGHT_SPIN_LIMIT: u32 = 64;

fn backoff(spins: &mut u32) {
    if *spins < IN_FLIGHT_SPIN_LIMIT {
        std::hint::spin_loop();
    } else {
        thread::yield_now();
    }
    *spins = spins.wrapping_add(1);
}

/// ### English
/// How long `pop` may wait for a unit.
///
/// ### 中文
/// `pop` 等待单元的方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopWait {
    /// ### English
    /// Return immediately when empty.
    ///
    /// ### 中文
    /// 队列为空时立即返回。
    Immediate,
    /// ### English
    /// Block for at most the given duration.
    ///
    /// ### 中文
    /// 最多阻塞给定时长。
    Timeout(Duration),
    /// ### English
    /// Block until a unit arrives or the queue is cancelled.
    ///
    /// ### 中文
    /// 阻塞直到有单元到达或队列被取消。
    Forever,
}

/// ### English
/// Bounded or unbounded FIFO packet queue with cooperative cancellation.
///
/// Any number of producers may `push`; the pipeline thread is the single consumer.
///
/// ### 中文
/// 支持协作式取消的有界/无界 FIFO 包队列。
///
/// 允许任意数量的生产者 `push`；管线线程是唯一的消费者。
pub struct PacketQueue {
    tx: Sender<CompressedUnit>,
    rx: Receiver<CompressedUnit>,
    /// ### English
    /// Sender half of the cancel channel. Nothing is ever sent; dropping it disconnects the
    /// channel, which wakes every `select!` waiting on `cancel_rx`.
    ///
    /// ### 中文
    /// cancel 通道的发送端。从不发送数据；drop 后通道断开，
    /// 唤醒所有在 `cancel_rx` 上 `select!` 等待的线程。
    cancel_tx: Mutex<Option<Sender<()>>>,
    cancel_rx: Receiver<()>,
    /// ### English
    /// End-of-input channel, disconnected by `finish()` the same way as the cancel channel.
    ///
    /// ### 中文
    /// 输入结束通道；`finish()` 以与 cancel 通道相同的方式将其断开。
    finish_tx: Mutex<Option<Sender<()>>>,
    finish_rx: Receiver<()>,
    /// ### English
    /// Close flag used to reject new units during shutdown.
    ///
    /// ### 中文
    /// 关闭标记：shutdown 期间拒绝新的单元。
    closed: AtomicBool,
    /// ### English
    /// Set once the producer declared end of input; pending units stay poppable.
    ///
    /// ### 中文
    /// 生产者声明输入结束后置位；剩余单元仍可被 pop。
    finished: AtomicBool,
    /// ### English
    /// Number of producers currently inside `push`.
    ///
    /// ### 中文
    /// 当前位于 `push` 内部的生产者数量。
    in_flight: AtomicUsize,
    capacity: Option<usize>,
}

impl PacketQueue {
    /// ### English
    /// Creates an open queue. `capacity == None` means unbounded; a bound of 0 is raised to 1.
    ///
    /// ### 中文
    /// 创建处于 open 状态的队列。`capacity == None` 表示无界；容量 0 会被提升为 1。
    pub fn new(capacity: Option<usize>) -> Self {
        let capacity = capacity.map(|cap| cap.max(1));
        let (tx, rx) = match capacity {
            Some(cap) => channel::bounded(cap),
            None => channel::unbounded(),
        };
        let (cancel_tx, cancel_rx) = channel::bounded(0);
        let (finish_tx, finish_rx) = channel::bounded(0);

        Self {
            tx,
            rx,
            cancel_tx: Mutex::new(Some(cancel_tx)),
            cancel_rx,
            finish_tx: Mutex::new(Some(finish_tx)),
            finish_rx,
            closed: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            capacity,
        }
    }

    /// ### English
    /// Appends `unit` at the tail.
    ///
    /// Blocks while a bounded queue is full. Fails with `QueueClosed` if the queue was
    /// cancelled (or finished) before, or cancelled while waiting for space; the unit is
    /// dropped in that case.
    ///
    /// #### Parameters
    /// - `unit`: Compressed unit to enqueue.
    ///
    /// ### 中文
    /// 将 `unit` 追加到队尾。
    ///
    /// 有界队列已满时阻塞。若队列在调用前已被取消（或已结束输入），或在等待空间期间被取消，
    /// 返回 `QueueClosed`，该单元随之被丢弃。
    ///
    /// #### 参数
    /// - `unit`：要入队的压缩单元。
    pub fn push(&self, unit: CompressedUnit) -> Result<(), PipelineError> {
        if self.closed.load(Ordering::Acquire) || self.finished.load(Ordering::Acquire) {
            return Err(PipelineError::QueueClosed);
        }
        /*
        ### English
        Registered before the flags are read again, so `finish()`/`cancel()` either see this
        push in flight or this push sees their flag.

        ### 中文
        先登记再重新读取标记：`finish()`/`cancel()` 要么看到本次 push 正在进行，
        要么本次 push 看到它们设置的标记。
        */
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = if self.closed.load(Ordering::SeqCst) || self.finished.load(Ordering::SeqCst)
        {
            Err(PipelineError::QueueClosed)
        } else {
            channel::select! {
                send(self.tx, unit) -> res => res.map_err(|_| PipelineError::QueueClosed),
                recv(self.cancel_rx) -> _ => Err(PipelineError::QueueClosed),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// ### English
    /// Removes and returns the head unit.
    ///
    /// Returns `None` when the queue is empty and `wait` expired, or when the queue has been
    /// cancelled (before or during the wait). "No item" is not an error.
    ///
    /// #### Parameters
    /// - `wait`: Blocking policy for an empty queue.
    ///
    /// ### 中文
    /// 移除并返回队首单元。
    ///
    /// 队列为空且等待超时，或队列已被取消（调用前或等待期间）时返回 `None`。
    /// “没有数据”不是错误。
    ///
    /// #### 参数
    /// - `wait`：队列为空时的阻塞策略。
    pub fn pop(&self, wait: PopWait) -> Option<CompressedUnit> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        match wait {
            PopWait::Immediate => self.rx.try_recv().ok(),
            PopWait::Timeout(timeout) => {
                let deadline = Instant::now() + timeout;
                channel::select! {
                    recv(self.rx) -> unit => unit.ok(),
                    recv(self.cancel_rx) -> _ => None,
                    recv(self.finish_rx) -> _ => self.pop_finished(Some(deadline)),
                    default(timeout) => None,
                }
            }
            PopWait::Forever => channel::select! {
                recv(self.rx) -> unit => unit.ok(),
                recv(self.cancel_rx) -> _ => None,
                recv(self.finish_rx) -> _ => self.pop_finished(None),
            },
        }
    }

    /// ### English
    /// Pop after end of input: producers still inside `push` may yet deliver a unit, so an
    /// empty channel only means "no item" once none of them is left.
    ///
    /// ### 中文
    /// 输入结束后的 pop：仍在 `push` 内部的生产者可能还会交付单元，
    /// 因此只有在它们全部离开后，空通道才表示“没有数据”。
    fn pop_finished(&self, deadline: Option<Instant>) -> Option<CompressedUnit> {
        let mut spins = 0u32;
        loop {
            if let Ok(unit) = self.rx.try_recv() {
                return Some(unit);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return self.rx.try_recv().ok();
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return None;
            }
            backoff(&mut spins);
        }
    }

    /// ### English
    /// Cancels the queue (idempotent).
    ///
    /// Sets the closed flag, wakes every blocked waiter, waits for in-flight producers to
    /// leave `push`, then drains the remaining units.
    ///
    /// ### 中文
    /// 取消队列（幂等）。
    ///
    /// 设置关闭标记，唤醒所有阻塞的等待者，等待进行中的生产者离开 `push`，
    /// 然后清空剩余单元。
    pub fn cancel(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let mut spins = 0u32;
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            backoff(&mut spins);
        }

        let drained = self.rx.try_iter().count();
        if drained > 0 {
            tracing::debug!(drained, "packet queue cancelled with pending units");
        }
    }

    /// ### English
    /// Declares end of input (idempotent).
    ///
    /// Later pushes fail with `QueueClosed`. Units already queued, and units of pushes still
    /// in flight, are delivered in order; after that waiting pops return `None` right away.
    /// Never blocks, so a consumer may call it while a producer waits for space.
    ///
    /// ### 中文
    /// 声明输入结束（幂等）。
    ///
    /// 之后的 push 返回 `QueueClosed`。已在队列中的单元以及仍在进行中的 push 的单元
    /// 都会按顺序交付；之后等待中的 pop 会立即返回 `None`。
    /// 从不阻塞，因此消费者可以在生产者等待空间时调用。
    pub fn finish(&self) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            tracing::debug!(pending = self.len(), "packet queue finished");
        }
        self.finish_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// ### English
    /// `true` once input has ended, no push is in flight and every queued unit was popped.
    ///
    /// ### 中文
    /// 输入已结束、没有进行中的 push 且所有排队单元均已被 pop 时为 `true`。
    pub fn is_exhausted(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
            && self.in_flight.load(Ordering::SeqCst) == 0
            && self.rx.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// ### English
    /// Number of pending units.
    ///
    /// ### 中文
    /// 待处理单元数量。
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new(None)
    }
}
