//! ### English
//! Presentable render target bound to a graphics context.
//!
//! ### 中文
//! 绑定到图形上下文的可呈现渲染目标。

use std::rc::Rc;

use crate::error::PipelineError;

use super::device::{GlowDevice, GpuDevice};

/// ### English
/// Surface/context pair the pipeline draws into.
///
/// Implementations are created and used on the pipeline thread only.
///
/// ### 中文
/// 管线绘制所用的 surface/上下文组合。
///
/// 实现只在管线线程上创建与使用。
pub trait RenderSurfaceContext {
    type Device: GpuDevice;

    /// ### English
    /// GPU device loaded from this context.
    ///
    /// ### 中文
    /// 从该上下文加载的 GPU 设备。
    fn device(&self) -> Rc<Self::Device>;

    /// ### English
    /// Makes the context current on the calling thread.
    ///
    /// ### 中文
    /// 使上下文在调用线程上成为 current。
    fn make_current(&self) -> Result<(), PipelineError>;

    /// ### English
    /// Makes the context current and binds the surface as draw target.
    ///
    /// ### 中文
    /// 使上下文成为 current 并将 surface 绑定为绘制目标。
    fn begin_frame(&mut self) -> Result<(), PipelineError>;

    /// ### English
    /// Presents the image drawn since [`Self::begin_frame`].
    ///
    /// ### 中文
    /// 呈现自 [`Self::begin_frame`] 以来绘制的图像。
    fn present(&mut self) -> Result<(), PipelineError>;
}

/// ### English
/// [`RenderSurfaceContext`] over a surfman context with a surface already bound.
///
/// The embedder creates the surfman device, context and (widget or offscreen) surface, binds
/// the surface to the context and hands both over; from then on this type owns them and
/// destroys the context on drop.
///
/// ### 中文
/// 基于已绑定 surface 的 surfman 上下文实现的 [`RenderSurfaceContext`]。
///
/// 嵌入方负责创建 surfman 设备、上下文以及（窗口或离屏）surface，将 surface 绑定到上下文后移交；
/// 之后由该类型持有它们，并在 drop 时销毁上下文。
pub struct SurfmanSurfaceContext {
    device: surfman::Device,
    context: surfman::Context,
    gpu: Rc<GlowDevice>,
}

impl SurfmanSurfaceContext {
    /// ### English
    /// Takes ownership of `device` + `context`, makes the context current and loads GL.
    ///
    /// #### Parameters
    /// - `device`: surfman device the context was created on.
    /// - `context`: Context with a surface bound to it.
    ///
    /// ### 中文
    /// 接管 `device` 与 `context`，使上下文成为 current 并加载 GL。
    ///
    /// #### 参数
    /// - `device`：创建该上下文的 surfman 设备。
    /// - `context`：已绑定 surface 的上下文。
    pub fn new(device: surfman::Device, mut context: surfman::Context) -> Result<Self, PipelineError> {
        if let Err(err) = device.make_context_current(&context) {
            let _ = device.destroy_context(&mut context);
            return Err(PipelineError::Surface(format!(
                "Failed to make context current: {err:?}"
            )));
        }

        let gl = unsafe {
            glow::Context::from_loader_function(|symbol| device.get_proc_address(&context, symbol))
        };
        let this = Self {
            gpu: Rc::new(GlowDevice::new(gl)),
            device,
            context,
        };

        match this.device.context_surface_info(&this.context) {
            Ok(Some(info)) => {
                tracing::debug!(
                    width = info.size.width,
                    height = info.size.height,
                    "surfman surface bound"
                );
                Ok(this)
            }
            Ok(None) => Err(PipelineError::Surface(
                "no surface is bound to the context".to_string(),
            )),
            Err(err) => Err(PipelineError::Surface(format!(
                "Failed to query context surface: {err:?}"
            ))),
        }
    }

    pub fn surfman_device(&self) -> &surfman::Device {
        &self.device
    }
}

impl RenderSurfaceContext for SurfmanSurfaceContext {
    type Device = GlowDevice;

    fn device(&self) -> Rc<GlowDevice> {
        self.gpu.clone()
    }

    fn make_current(&self) -> Result<(), PipelineError> {
        self.device
            .make_context_current(&self.context)
            .map_err(|err| PipelineError::Surface(format!("make_context_current failed: {err:?}")))
    }

    fn begin_frame(&mut self) -> Result<(), PipelineError> {
        self.make_current()?;
        let info = self
            .device
            .context_surface_info(&self.context)
            .map_err(|err| PipelineError::Surface(format!("context_surface_info failed: {err:?}")))?
            .ok_or_else(|| PipelineError::Surface("surface was unbound from the context".into()))?;
        self.gpu.bind_framebuffer(info.framebuffer_object);
        Ok(())
    }

    fn present(&mut self) -> Result<(), PipelineError> {
        let mut surface = self
            .device
            .unbind_surface_from_context(&mut self.context)
            .map_err(|err| PipelineError::Surface(format!("unbind_surface_from_context failed: {err:?}")))?
            .ok_or_else(|| PipelineError::Surface("surface was unbound from the context".into()))?;

        let presented = self
            .device
            .present_surface(&self.context, &mut surface)
            .map_err(|err| PipelineError::Surface(format!("present_surface failed: {err:?}")));

        if let Err((err, mut surface)) = self.device.bind_surface_to_context(&mut self.context, surface) {
            let _ = self.device.destroy_surface(&mut self.context, &mut surface);
            return Err(PipelineError::Surface(format!(
                "bind_surface_to_context failed: {err:?}"
            )));
        }
        presented
    }
}

impl Drop for SurfmanSurfaceContext {
    fn drop(&mut self) {
        let _ = self.device.make_context_current(&self.context);
        if let Err(err) = self.device.destroy_context(&mut self.context) {
            tracing::warn!(?err, "failed to destroy surfman context");
        }
    }
}
