//! ### English
//! Coarse rate limiting between rendered frames.
//!
//! ### 中文
//! 渲染帧之间的粗粒度限速。

use std::thread;
use std::time::{Duration, Instant};

/// ### English
/// Frame pacing policy applied after each present.
///
/// This is a rate limiter, not timestamp-based scheduling.
///
/// ### 中文
/// 每次呈现之后应用的帧节奏策略。
///
/// 这是限速器，不是基于时间戳的调度。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// ### English
    /// Render as fast as frames are decoded.
    ///
    /// ### 中文
    /// 解码多快就渲染多快。
    Unlimited,
    /// ### English
    /// Keep at least this much time between consecutive presents.
    ///
    /// ### 中文
    /// 相邻两次呈现之间至少间隔该时长。
    MinInterval(Duration),
}

impl Default for Pacing {
    fn default() -> Self {
        Self::MinInterval(Duration::from_millis(1))
    }
}

/// ### English
/// Applies a [`Pacing`] policy, sleeping only for the remainder of the interval.
///
/// ### 中文
/// 执行 [`Pacing`] 策略，只睡眠间隔中剩余的部分。
#[derive(Debug)]
pub struct FrameLimiter {
    pacing: Pacing,
    last_frame: Option<Instant>,
}

impl FrameLimiter {
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            last_frame: None,
        }
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// ### English
    /// Time left before the next frame may be presented, measured at `now`.
    ///
    /// ### 中文
    /// 以 `now` 计算，距离允许呈现下一帧还剩余的时间。
    pub fn remaining(&self, now: Instant) -> Duration {
        match (self.pacing, self.last_frame) {
            (Pacing::MinInterval(interval), Some(last)) => {
                interval.saturating_sub(now.saturating_duration_since(last))
            }
            _ => Duration::ZERO,
        }
    }

    /// ### English
    /// Marks a frame as presented and waits out the rest of the interval.
    ///
    /// ### 中文
    /// 记录一帧已呈现，并等待间隔剩余的时间。
    pub fn frame_presented(&mut self) {
        let now = Instant::now();
        let wait = self.remaining(now);
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.last_frame = Some(Instant::now());
    }
}
