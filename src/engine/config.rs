//! ### English
//! Pipeline configuration bundle.
//!
//! ### 中文
//! 管线配置集合。

use std::time::Duration;

use super::pacing::Pacing;
use super::queue::PacketQueue;
use super::rendering::RenderSettings;

/// ### English
/// Parameters for [`crate::Player::spawn`] and [`crate::PipelineDriver`].
///
/// ### 中文
/// [`crate::Player::spawn`] 与 [`crate::PipelineDriver`] 的参数。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    /// ### English
    /// Bound applied by [`PipelineConfig::build_queue`] (`None` = unbounded).
    ///
    /// ### 中文
    /// [`PipelineConfig::build_queue`] 使用的容量上限（`None` 表示无界）。
    pub queue_capacity: Option<usize>,
    /// ### English
    /// Longest time one `pop` blocks before the loop re-checks its control flags.
    ///
    /// ### 中文
    /// 单次 `pop` 在循环重新检查控制标记前最长的阻塞时间。
    pub poll_interval: Duration,
    /// ### English
    /// Longest time a paused loop sleeps before re-checking its flags.
    ///
    /// ### 中文
    /// 暂停中的循环在重新检查标记前最长的休眠时间。
    pub pause_idle: Duration,
    pub pacing: Pacing,
    pub render: RenderSettings,
    /// ### English
    /// How long `Player::spawn` waits for the pipeline thread to finish GPU setup.
    ///
    /// ### 中文
    /// `Player::spawn` 等待管线线程完成 GPU 初始化的时长。
    pub init_timeout: Duration,
}

impl PipelineConfig {
    /// ### English
    /// Creates a packet queue honouring `queue_capacity`.
    ///
    /// ### 中文
    /// 按 `queue_capacity` 创建包队列。
    pub fn build_queue(&self) -> PacketQueue {
        PacketQueue::new(self.queue_capacity)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            poll_interval: Duration::from_millis(10),
            pause_idle: Duration::from_millis(50),
            pacing: Pacing::default(),
            render: RenderSettings::default(),
            init_timeout: Duration::from_secs(30),
        }
    }
}
