//! ### English
//! Decode/render loop executed on the pipeline thread.
//!
//! ### 中文
//! 在管线线程上执行的解码/渲染循环。

use std::sync::Arc;

use crate::engine::config::PipelineConfig;
use crate::engine::control::PlaybackControl;
use crate::engine::decoder::{DecodeEngine, DecoderAdapter};
use crate::engine::frame::RawFrame;
use crate::engine::pacing::FrameLimiter;
use crate::engine::queue::{PacketQueue, PopWait};
use crate::engine::rendering::{RenderSurfaceContext, ShaderPipeline};
use crate::engine::stats::PlaybackStats;
use crate::error::PipelineError;

/// ### English
/// Lifecycle of a [`PipelineDriver`].
///
/// ### 中文
/// [`PipelineDriver`] 的生命周期状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Running,
    Paused,
    /// ### English
    /// Quit was requested (or the input ended); resources are released on the next step.
    ///
    /// ### 中文
    /// 已请求退出（或输入已结束）；资源在下一步释放。
    Stopping,
    Stopped,
}

/// ### English
/// Shared handles a driver is built from.
///
/// ### 中文
/// 构建驱动所需的共享句柄。
pub struct PipelineDriverInit<E, S> {
    pub config: PipelineConfig,
    pub queue: Arc<PacketQueue>,
    pub control: Arc<PlaybackControl>,
    pub stats: Arc<PlaybackStats>,
    pub engine: E,
    pub surface: S,
}

/// ### English
/// Pulls units from the queue, decodes them and renders every produced frame.
///
/// Owns the surface, the decoder and the shader pipeline; lives on the thread where the
/// graphics context is current.
///
/// ### 中文
/// 从队列取出单元、解码，并渲染每个产出的帧。
///
/// 持有 surface、解码器与 shader 管线；驻留在图形上下文为 current 的线程上。
pub struct PipelineDriver<E: DecodeEngine, S: RenderSurfaceContext> {
    config: PipelineConfig,
    queue: Arc<PacketQueue>,
    control: Arc<PlaybackControl>,
    stats: Arc<PlaybackStats>,
    decoder: DecoderAdapter<E>,
    pipeline: Option<ShaderPipeline<S::Device>>,
    surface: S,
    limiter: FrameLimiter,
    state: DriverState,
}

impl<E: DecodeEngine, S: RenderSurfaceContext> PipelineDriver<E, S> {
    /// ### English
    /// Makes the surface current and builds the shader pipeline on it.
    ///
    /// ### 中文
    /// 使 surface 成为 current，并在其上构建 shader 管线。
    pub fn new(init: PipelineDriverInit<E, S>) -> Result<Self, PipelineError> {
        let PipelineDriverInit {
            config,
            queue,
            control,
            stats,
            engine,
            surface,
        } = init;

        surface.make_current()?;
        let pipeline = ShaderPipeline::build(surface.device(), config.render)?;

        Ok(Self {
            limiter: FrameLimiter::new(config.pacing),
            config,
            queue,
            control,
            stats,
            decoder: DecoderAdapter::new(engine),
            pipeline: Some(pipeline),
            surface,
            state: DriverState::Running,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn decoder(&self) -> &DecoderAdapter<E> {
        &self.decoder
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// ### English
    /// Steps until [`DriverState::Stopped`].
    ///
    /// ### 中文
    /// 持续 step 直到 [`DriverState::Stopped`]。
    pub fn run(&mut self) {
        tracing::info!("pipeline loop started");
        while self.step() != DriverState::Stopped {}
        tracing::info!(stats = ?self.stats.snapshot(), "pipeline loop stopped");
    }

    /// ### English
    /// Executes one loop iteration and returns the resulting state.
    ///
    /// Control flags are sampled once at the top of the iteration. A paused iteration never
    /// pops, but still stops once the queue was cancelled; a quit observed there skips the
    /// pop entirely.
    ///
    /// ### 中文
    /// 执行一次循环迭代并返回新的状态。
    ///
    /// 控制标记只在迭代开始时读取一次。暂停的迭代不会 pop，但队列被取消后仍会停止；
    /// 在此处观察到退出请求时完全跳过 pop。
    pub fn step(&mut self) -> DriverState {
        match self.state {
            DriverState::Stopped => {}
            DriverState::Stopping => self.stop(),
            DriverState::Running | DriverState::Paused => {
                if self.control.is_quit_requested() {
                    self.transition(DriverState::Stopping);
                } else if self.control.is_paused() {
                    if self.queue.is_closed() {
                        tracing::debug!("packet queue cancelled while paused");
                        self.transition(DriverState::Stopping);
                    } else {
                        self.transition(DriverState::Paused);
                        self.control.wait_for_change(self.config.pause_idle);
                    }
                } else {
                    self.transition(DriverState::Running);
                    self.cycle();
                }
            }
        }
        self.state
    }

    fn transition(&mut self, next: DriverState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "pipeline state changed");
            self.state = next;
        }
    }

    /// ### English
    /// One pop → decode → render cycle.
    ///
    /// ### 中文
    /// 一次 pop → 解码 → 渲染周期。
    fn cycle(&mut self) {
        let Some(unit) = self.queue.pop(PopWait::Timeout(self.config.poll_interval)) else {
            if self.queue.is_closed() {
                tracing::debug!("packet queue cancelled");
                self.transition(DriverState::Stopping);
            } else if self.queue.is_exhausted() {
                self.end_of_stream();
            }
            return;
        };
        self.stats.record_pop();

        match self.decoder.decode(unit) {
            Ok(Some(frame)) => {
                self.stats.record_decoded();
                self.show(&frame);
            }
            Ok(None) => self.stats.record_pending(),
            Err(err) => {
                self.stats.record_decode_error();
                tracing::warn!(%err, "dropping undecodable unit");
            }
        }
    }

    fn end_of_stream(&mut self) {
        tracing::info!("end of stream");
        match self.decoder.flush() {
            Ok(frames) => {
                let total = frames.len();
                for (index, frame) in frames.into_iter().enumerate() {
                    if self.state != DriverState::Running || self.control.is_quit_requested() {
                        let dropped = (total - index) as u64;
                        tracing::debug!(dropped, "stopping before the end of the flushed frames");
                        self.stats.record_dropped(dropped);
                        break;
                    }
                    self.stats.record_decoded();
                    self.show(&frame);
                }
            }
            Err(err) => {
                self.stats.record_decode_error();
                tracing::warn!(%err, "decoder flush failed");
            }
        }
        self.transition(DriverState::Stopping);
    }

    fn show(&mut self, frame: &RawFrame) {
        match self.render(frame) {
            Ok(()) => {
                self.stats.record_rendered();
                self.limiter.frame_presented();
            }
            Err(err) if err.is_recoverable() => {
                self.stats.record_dropped(1);
                tracing::warn!(%err, "dropping frame");
            }
            Err(err) => {
                tracing::error!(%err, "rendering failed, stopping pipeline");
                self.control.request_quit();
                self.transition(DriverState::Stopping);
            }
        }
    }

    fn render(&mut self, frame: &RawFrame) -> Result<(), PipelineError> {
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| PipelineError::Gpu("shader pipeline is not available".into()))?;

        self.surface.begin_frame()?;
        pipeline.upload(frame)?;
        pipeline.draw()?;
        self.surface.present()?;

        let size = frame.viewport_size();
        match self.stats.video_size() {
            None => tracing::info!(
                width = size.width,
                height = size.height,
                format = %frame.format(),
                "first frame rendered"
            ),
            Some(previous) if previous != size => tracing::debug!(
                width = size.width,
                height = size.height,
                "video size changed"
            ),
            Some(_) => {}
        }
        self.stats.set_video_size(size);
        tracing::trace!(timestamp = ?frame.timestamp(), "frame presented");
        Ok(())
    }

    /// ### English
    /// Releases GPU resources and cancels the queue. Idempotent.
    ///
    /// ### 中文
    /// 释放 GPU 资源并取消队列。幂等。
    fn stop(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            match self.surface.make_current() {
                Ok(()) => pipeline.destroy(),
                Err(err) => {
                    /*
                    ### English
                    Without a current context the GL objects cannot be deleted here; they go
                    away with the context itself.

                    ### 中文
                    没有 current 上下文时无法在此删除 GL 对象；它们会随上下文一起销毁。
                    */
                    tracing::warn!(%err, "leaking GPU resources to context teardown");
                    std::mem::forget(pipeline);
                }
            }
        }
        self.queue.cancel();
        self.transition(DriverState::Stopped);
    }
}

impl<E: DecodeEngine, S: RenderSurfaceContext> Drop for PipelineDriver<E, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use dpi::PhysicalSize;

    use super::*;
    use crate::engine::decoder::DecodeOutcome;
    use crate::engine::frame::PixelFormat;
    use crate::engine::packet::CompressedUnit;
    use crate::engine::pacing::Pacing;
    use crate::engine::test_support::{FakeSurface, ScriptedEngine, SurfaceProbe};

    struct Harness {
        queue: Arc<PacketQueue>,
        control: Arc<PlaybackControl>,
        stats: Arc<PlaybackStats>,
        probe: Arc<SurfaceProbe>,
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_millis(5),
            pause_idle: Duration::from_millis(5),
            pacing: Pacing::Unlimited,
            ..PipelineConfig::default()
        }
    }

    fn gray_frame() -> RawFrame {
        RawFrame::filled(PixelFormat::Yuv420p, PhysicalSize::new(8, 4), [128, 128, 128]).unwrap()
    }

    fn driver(engine: ScriptedEngine) -> (PipelineDriver<ScriptedEngine, FakeSurface>, Harness) {
        driver_with_control(engine, Arc::new(PlaybackControl::new()))
    }

    fn driver_with_control(
        engine: ScriptedEngine,
        control: Arc<PlaybackControl>,
    ) -> (PipelineDriver<ScriptedEngine, FakeSurface>, Harness) {
        let harness = Harness {
            queue: Arc::new(PacketQueue::new(Some(16))),
            control,
            stats: Arc::new(PlaybackStats::new()),
            probe: SurfaceProbe::new(),
        };
        let driver = PipelineDriver::new(PipelineDriverInit {
            config: config(),
            queue: harness.queue.clone(),
            control: harness.control.clone(),
            stats: harness.stats.clone(),
            engine,
            surface: FakeSurface::new(harness.probe.clone()),
        })
        .unwrap();
        (driver, harness)
    }

    fn push(queue: &PacketQueue, tag: u8) {
        queue.push(CompressedUnit::new(vec![tag], Some(tag as i64))).unwrap();
    }

    #[test]
    fn renders_each_decoded_frame_once() {
        let (mut driver, h) = driver(ScriptedEngine::new(Vec::new()).with_fallback(gray_frame()));
        push(&h.queue, 1);
        push(&h.queue, 2);

        assert_eq!(driver.step(), DriverState::Running);
        assert_eq!(driver.step(), DriverState::Running);

        assert_eq!(h.probe.presents(), 2);
        assert_eq!(driver.surface().device().draw_count(), 2);
        assert_eq!(h.stats.frames_rendered(), 2);
        assert_eq!(h.stats.video_size(), Some(PhysicalSize::new(8, 4)));
    }

    #[test]
    fn pause_neither_pops_nor_reorders() {
        let (mut driver, h) = driver(ScriptedEngine::new(Vec::new()).with_fallback(gray_frame()));
        for tag in 0..3 {
            push(&h.queue, tag);
        }

        h.control.pause();
        for _ in 0..3 {
            assert_eq!(driver.step(), DriverState::Paused);
        }
        assert_eq!(h.queue.len(), 3);
        assert_eq!(h.stats.snapshot().units_popped, 0);

        h.control.resume();
        for _ in 0..3 {
            assert_eq!(driver.step(), DriverState::Running);
        }
        assert_eq!(
            driver.decoder.engine_mut().seen(),
            &[vec![0u8], vec![1], vec![2]]
        );
    }

    #[test]
    fn quit_mid_cycle_completes_present_then_stops_popping() {
        let control = Arc::new(PlaybackControl::new());
        let engine = {
            let control = control.clone();
            ScriptedEngine::new(Vec::new())
                .with_fallback(gray_frame())
                .with_hook(move |_| control.request_quit())
        };
        let (mut driver, h) = driver_with_control(engine, control);
        push(&h.queue, 1);
        push(&h.queue, 2);

        assert_eq!(driver.step(), DriverState::Running);
        assert_eq!(h.probe.presents(), 1);
        assert_eq!(driver.step(), DriverState::Stopping);
        assert_eq!(driver.step(), DriverState::Stopped);

        assert_eq!(h.stats.snapshot().units_popped, 1);
        assert!(h.queue.is_closed());
        assert_eq!(h.queue.len(), 0);
        assert_eq!(driver.surface().device().live_objects(), 0);
    }

    #[test]
    fn decode_errors_are_counted_and_skipped() {
        let engine = ScriptedEngine::new(vec![
            Err("corrupt".to_string()),
            Ok(DecodeOutcome::Pending),
            Ok(DecodeOutcome::Frame(gray_frame())),
        ]);
        let (mut driver, h) = driver(engine);
        for tag in 0..3 {
            push(&h.queue, tag);
        }
        for _ in 0..3 {
            assert_eq!(driver.step(), DriverState::Running);
        }

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.units_popped, 3);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(snapshot.pending_outputs, 1);
        assert_eq!(snapshot.frames_rendered, 1);
    }

    #[test]
    fn surface_failure_requests_quit() {
        let (mut driver, h) = driver(ScriptedEngine::new(Vec::new()).with_fallback(gray_frame()));
        h.probe.fail_after.store(0, Ordering::SeqCst);
        push(&h.queue, 1);
        push(&h.queue, 2);

        assert_eq!(driver.step(), DriverState::Stopping);
        assert!(h.control.is_quit_requested());
        assert_eq!(driver.step(), DriverState::Stopped);
        assert_eq!(h.stats.frames_rendered(), 0);
        assert_eq!(h.stats.snapshot().units_popped, 1);
        assert!(h.queue.is_closed());
    }

    #[test]
    fn empty_queue_keeps_running() {
        let (mut driver, h) = driver(ScriptedEngine::new(Vec::new()));
        assert_eq!(driver.step(), DriverState::Running);
        assert_eq!(h.stats.snapshot().units_popped, 0);
    }

    #[test]
    fn cancelled_queue_stops_the_loop() {
        let (mut driver, h) = driver(ScriptedEngine::new(Vec::new()));
        h.queue.cancel();
        driver.run();
        assert_eq!(driver.state(), DriverState::Stopped);
        assert_eq!(driver.surface().device().live_objects(), 0);
    }

    /// Engine whose flush requests quit before handing back its buffered frames.
    struct QuitOnFlush {
        control: Arc<PlaybackControl>,
        frames: usize,
    }

    impl DecodeEngine for QuitOnFlush {
        fn decode(&mut self, _unit: &CompressedUnit) -> Result<DecodeOutcome, String> {
            Ok(DecodeOutcome::Pending)
        }

        fn flush(&mut self) -> Result<Vec<RawFrame>, String> {
            self.control.request_quit();
            Ok((0..self.frames).map(|_| gray_frame()).collect())
        }
    }

    #[test]
    fn quit_during_end_of_stream_skips_flushed_frames() {
        let control = Arc::new(PlaybackControl::new());
        let queue = Arc::new(PacketQueue::new(None));
        let stats = Arc::new(PlaybackStats::new());
        let probe = SurfaceProbe::new();
        let mut driver = PipelineDriver::new(PipelineDriverInit {
            config: config(),
            queue: queue.clone(),
            control: control.clone(),
            stats: stats.clone(),
            engine: QuitOnFlush {
                control: control.clone(),
                frames: 4,
            },
            surface: FakeSurface::new(probe.clone()),
        })
        .unwrap();
        queue.finish();

        driver.run();

        assert_eq!(probe.presents(), 0);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_rendered, 0);
        assert_eq!(snapshot.dropped_frames, 4);
        assert_eq!(driver.state(), DriverState::Stopped);
    }

    #[test]
    fn cancel_while_paused_stops_the_loop() {
        let (mut driver, h) = driver(ScriptedEngine::new(Vec::new()));
        h.control.pause();
        assert_eq!(driver.step(), DriverState::Paused);

        h.queue.cancel();
        assert_eq!(driver.step(), DriverState::Stopping);
        assert_eq!(driver.step(), DriverState::Stopped);
        assert_eq!(driver.surface().device().live_objects(), 0);
    }

    #[test]
    fn end_of_stream_renders_flushed_frames() {
        let engine = ScriptedEngine::new(vec![Ok(DecodeOutcome::Pending)])
            .with_buffered(vec![gray_frame(), gray_frame()]);
        let (mut driver, h) = driver(engine);
        push(&h.queue, 1);
        h.queue.finish();

        driver.run();

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.units_popped, 1);
        assert_eq!(snapshot.frames_rendered, 2);
        assert_eq!(h.probe.presents(), 2);
        assert_eq!(driver.state(), DriverState::Stopped);
    }
}
