//! ### English
//! Engine internal modules (packet queue, decoding, GPU rendering, pipeline runtime).
//!
//! ### 中文
//! 引擎内部模块（包队列、解码、GPU 渲染、管线运行时等）。
pub mod config;
pub mod control;
pub mod decoder;
pub mod frame;
pub mod pacing;
pub mod packet;
pub mod queue;
pub mod rendering;
pub mod runtime;
pub mod stats;
#[cfg(test)]
pub(crate) mod test_support;
