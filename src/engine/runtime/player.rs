//! ### English
//! Player handle that spawns and owns the dedicated pipeline thread.
//!
//! ### 中文
//! 创建并持有独立管线线程的播放器句柄。

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{self as channel, RecvTimeoutError};

use crate::engine::config::PipelineConfig;
use crate::engine::control::PlaybackControl;
use crate::engine::decoder::DecodeEngine;
use crate::engine::queue::PacketQueue;
use crate::engine::rendering::RenderSurfaceContext;
use crate::engine::stats::PlaybackStats;
use crate::error::PipelineError;

use super::driver::{PipelineDriver, PipelineDriverInit};

/// ### English
/// Owns the pipeline thread and the handles shared with it.
///
/// Producers push into [`Player::queue`]; pause/quit go through [`Player::control`].
///
/// ### 中文
/// 持有管线线程以及与之共享的句柄。
///
/// 生产者向 [`Player::queue`] push；暂停/退出通过 [`Player::control`] 完成。
pub struct Player {
    queue: Arc<PacketQueue>,
    control: Arc<PlaybackControl>,
    stats: Arc<PlaybackStats>,
    /// ### English
    /// Join handle for the pipeline thread (owned by this player).
    ///
    /// ### 中文
    /// 管线线程的 join handle（由本播放器持有）。
    thread: Option<thread::JoinHandle<()>>,
}

impl Player {
    /// ### English
    /// Spawns the pipeline thread and blocks until it finished setup (or `init_timeout`).
    ///
    /// Both factories run on the pipeline thread, so the surface, the GL context and the
    /// decoder never cross threads. The surface factory runs first; its context is made
    /// current before the shader pipeline is built.
    ///
    /// #### Parameters
    /// - `config`: Loop timing, pacing and render settings.
    /// - `queue`: Packet queue shared with the producer.
    /// - `decoder_factory`: Builds the decoding engine.
    /// - `surface_factory`: Builds the render surface/context.
    ///
    /// ### 中文
    /// 创建管线线程，并阻塞等待其完成初始化（或 `init_timeout` 超时）。
    ///
    /// 两个工厂都在管线线程上执行，因此 surface、GL 上下文与解码器都不会跨线程。
    /// 先执行 surface 工厂；其上下文会在构建 shader 管线前被设为 current。
    ///
    /// #### 参数
    /// - `config`：循环时序、节奏与渲染设置。
    /// - `queue`：与生产者共享的包队列。
    /// - `decoder_factory`：构建解码引擎。
    /// - `surface_factory`：构建渲染 surface/上下文。
    pub fn spawn<E, S, DF, SF>(
        config: PipelineConfig,
        queue: Arc<PacketQueue>,
        decoder_factory: DF,
        surface_factory: SF,
    ) -> Result<Self, PipelineError>
    where
        E: DecodeEngine + 'static,
        S: RenderSurfaceContext + 'static,
        DF: FnOnce() -> Result<E, PipelineError> + Send + 'static,
        SF: FnOnce() -> Result<S, PipelineError> + Send + 'static,
    {
        let control = Arc::new(PlaybackControl::new());
        let stats = Arc::new(PlaybackStats::new());
        let (init_tx, init_rx) = channel::bounded::<Result<(), PipelineError>>(1);

        let thread = {
            let queue = queue.clone();
            let control = control.clone();
            let stats = stats.clone();
            thread::Builder::new()
                .name("yuv-pipeline".to_string())
                .spawn(move || {
                    let driver = surface_factory().and_then(|surface| {
                        let engine = decoder_factory()?;
                        PipelineDriver::new(PipelineDriverInit {
                            config,
                            queue,
                            control,
                            stats,
                            engine,
                            surface,
                        })
                    });

                    match driver {
                        Ok(mut driver) => {
                            if init_tx.send(Ok(())).is_ok() {
                                driver.run();
                            }
                        }
                        Err(err) => {
                            tracing::error!(%err, "pipeline setup failed");
                            let _ = init_tx.send(Err(err));
                        }
                    }
                })
                .map_err(|err| {
                    PipelineError::Startup(format!("Failed to spawn pipeline thread: {err}"))
                })?
        };

        match init_rx.recv_timeout(config.init_timeout) {
            Ok(Ok(())) => Ok(Self {
                queue,
                control,
                stats,
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => {
                /*
                ### English
                Setup is stuck inside a factory; the thread is detached and quits on its own
                once setup returns.

                ### 中文
                初始化卡在工厂内部；线程被分离，待初始化返回后会自行退出。
                */
                control.request_quit();
                queue.cancel();
                Err(PipelineError::Startup(
                    "Timed out initializing pipeline thread".to_string(),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join();
                Err(PipelineError::Startup(
                    "Pipeline thread exited during setup".to_string(),
                ))
            }
        }
    }

    pub fn queue(&self) -> &Arc<PacketQueue> {
        &self.queue
    }

    pub fn control(&self) -> &Arc<PlaybackControl> {
        &self.control
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.stats
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    /// ### English
    /// Requests a stop without waiting for the thread.
    ///
    /// ### 中文
    /// 请求停止，但不等待线程结束。
    pub fn quit(&self) {
        self.control.request_quit();
    }

    /// ### English
    /// `false` once the pipeline thread has exited (quit, surface failure or end of stream).
    ///
    /// ### 中文
    /// 管线线程退出后（退出请求、surface 失败或流结束）返回 `false`。
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// ### English
    /// Requests quit, wakes the pipeline thread and joins it.
    ///
    /// ### 中文
    /// 请求退出、唤醒管线线程并 join。
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.control.request_quit();
            self.queue.cancel();
            if thread.join().is_err() {
                tracing::error!("pipeline thread panicked");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}
