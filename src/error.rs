//! ### English
//! Error taxonomy shared by every pipeline stage.
//!
//! ### 中文
//! 管线各阶段共享的错误类型。

use crate::engine::rendering::ShaderStage;

/// ### English
/// Errors produced by the decode/render pipeline.
///
/// Severity depends on the variant: `QueueClosed` is a cooperative shutdown signal,
/// `Decode`/`InvalidFrame` are per-unit and recoverable, shader/GPU/startup errors abort
/// pipeline construction, and `Surface` ends the current session.
///
/// ### 中文
/// 解码/渲染管线产生的错误。
///
/// 严重程度取决于变体：`QueueClosed` 是协作式退出信号；`Decode`/`InvalidFrame`
/// 仅影响单个单元、可恢复；shader/GPU/启动错误会中止管线构建；`Surface` 会结束当前会话。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("packet queue is closed")]
    QueueClosed,

    #[error("decode failed: {0}")]
    Decode(String),

    /// ### English
    /// A decoded frame whose plane geometry does not match its pixel format.
    ///
    /// ### 中文
    /// 平面几何与像素格式不一致的解码帧。
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("shader program failed to link: {log}")]
    ShaderLink { log: String },

    #[error("gpu resource error: {0}")]
    Gpu(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("pipeline thread failed to start: {0}")]
    Startup(String),
}

impl PipelineError {
    /// ### English
    /// Returns `true` for errors that only affect the current unit (the loop keeps going).
    ///
    /// ### 中文
    /// 仅影响当前单元的错误返回 `true`（循环继续运行）。
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::InvalidFrame(_))
    }
}
