//! ### English
//! Pipeline runtime: the decode/render driver and the thread that runs it.
//!
//! ### 中文
//! 管线运行时：解码/渲染驱动以及运行它的线程。

mod driver;
mod player;

pub use driver::{DriverState, PipelineDriver, PipelineDriverInit};
pub use player::Player;
