//! ### English
//! Test doubles: a recording GPU device, a scripted decoding engine and a fake surface.
//!
//! ### 中文
//! 测试替身：录制型 GPU 设备、脚本化解码引擎与伪造 surface。

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dpi::PhysicalSize;

use crate::engine::decoder::{DecodeEngine, DecodeOutcome};
use crate::engine::frame::RawFrame;
use crate::engine::packet::CompressedUnit;
use crate::engine::rendering::{
    ATTRIBUTE_POSITION, ATTRIBUTE_TEXTURE_COORDINATES, GpuDevice, RenderSurfaceContext,
    SAMPLER_NAMES, ShaderDialect, ShaderStage, TextureFilter, VertexAttribute,
};
use crate::error::PipelineError;

#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    CompileShader(ShaderStage),
    LinkProgram,
    UseProgram(Option<u32>),
    SetSampler { name: String, unit: u32 },
    UploadPlane {
        unit: u32,
        texture: u32,
        size: PhysicalSize<u32>,
    },
    SetViewport(PhysicalSize<u32>),
    Clear([f32; 4]),
    DrawTriangleFan {
        attributes: usize,
        stride_floats: u32,
        vertex_count: u32,
    },
}

#[derive(Default)]
struct DeviceState {
    next_id: u32,
    calls: Vec<GpuCall>,
    sources: Vec<String>,
    live: HashSet<u32>,
    current_program: Option<u32>,
    texture_sizes: HashMap<u32, PhysicalSize<u32>>,
}

impl DeviceState {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.live.insert(self.next_id);
        self.next_id
    }
}

/// ### English
/// `GpuDevice` that records every call and tracks live objects.
///
/// Shader sources without `void main` fail to compile. With a versioned dialect, sources
/// using the unversioned built-ins are rejected like a core profile would.
///
/// ### 中文
/// 记录所有调用并跟踪存活对象的 `GpuDevice`。
///
/// 不含 `void main` 的 shader 源码会编译失败。使用带版本方言时，
/// 会像 core profile 一样拒绝使用无版本内建语法的源码。
#[derive(Default)]
pub struct RecordingDevice {
    state: RefCell<DeviceState>,
    link_error: Option<String>,
    dialect: ShaderDialect,
}

impl RecordingDevice {
    pub fn with_dialect(mut self, dialect: ShaderDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn compiled_sources(&self) -> Vec<String> {
        self.state.borrow().sources.clone()
    }

    pub fn failing_link(mut self, log: &str) -> Self {
        self.link_error = Some(log.to_string());
        self
    }

    pub fn calls(&self) -> Vec<GpuCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| matches!(call, GpuCall::DrawTriangleFan { .. }))
            .count()
    }

    pub fn live_objects(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn current_program(&self) -> Option<u32> {
        self.state.borrow().current_program
    }

    pub fn texture_size(&self, texture: u32) -> Option<PhysicalSize<u32>> {
        self.state.borrow().texture_sizes.get(&texture).copied()
    }

    fn record(&self, call: GpuCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn release(&self, id: u32) {
        let mut state = self.state.borrow_mut();
        assert!(state.live.remove(&id), "object {id} deleted twice");
        if state.current_program == Some(id) {
            state.current_program = None;
        }
    }
}

impl GpuDevice for RecordingDevice {
    type Shader = u32;
    type Program = u32;
    type Texture = u32;
    type Buffer = u32;
    type Uniform = String;

    fn shader_dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<u32, String> {
        self.record(GpuCall::CompileShader(stage));
        self.state.borrow_mut().sources.push(source.to_string());
        if !source.contains("void main") {
            return Err(format!("0:1: {stage} shader: syntax error"));
        }
        let legacy_syntax = ["attribute ", "varying ", "texture2D", "gl_FragColor"]
            .iter()
            .any(|keyword| source.contains(keyword));
        if self.dialect != ShaderDialect::Legacy
            && (!source.starts_with("#version") || legacy_syntax)
        {
            return Err(format!(
                "0:1: {stage} shader: unversioned syntax is not supported"
            ));
        }
        Ok(self.state.borrow_mut().allocate())
    }

    fn delete_shader(&self, shader: u32) {
        self.release(shader);
    }

    fn link_program(
        &self,
        _vertex: u32,
        _fragment: u32,
        attributes: &[(u32, &str)],
    ) -> Result<u32, String> {
        self.record(GpuCall::LinkProgram);
        assert!(attributes.contains(&(0, ATTRIBUTE_POSITION)));
        match &self.link_error {
            Some(log) => Err(log.clone()),
            None => Ok(self.state.borrow_mut().allocate()),
        }
    }

    fn delete_program(&self, program: u32) {
        self.release(program);
    }

    fn use_program(&self, program: Option<u32>) {
        self.record(GpuCall::UseProgram(program));
        self.state.borrow_mut().current_program = program;
    }

    fn attribute_location(&self, _program: u32, name: &str) -> Option<u32> {
        match name {
            ATTRIBUTE_POSITION => Some(0),
            ATTRIBUTE_TEXTURE_COORDINATES => Some(1),
            _ => None,
        }
    }

    fn uniform_location(&self, _program: u32, name: &str) -> Option<String> {
        SAMPLER_NAMES.contains(&name).then(|| name.to_string())
    }

    fn set_sampler(&self, uniform: &String, unit: u32) {
        self.record(GpuCall::SetSampler {
            name: uniform.clone(),
            unit,
        });
    }

    fn create_plane_texture(&self, _filter: TextureFilter) -> Result<u32, String> {
        Ok(self.state.borrow_mut().allocate())
    }

    fn upload_plane(&self, unit: u32, texture: u32, size: PhysicalSize<u32>, pixels: &[u8]) {
        assert_eq!(
            pixels.len(),
            size.width as usize * size.height as usize,
            "upload size mismatch"
        );
        self.record(GpuCall::UploadPlane {
            unit,
            texture,
            size,
        });
        self.state.borrow_mut().texture_sizes.insert(texture, size);
    }

    fn delete_texture(&self, texture: u32) {
        self.release(texture);
        self.state.borrow_mut().texture_sizes.remove(&texture);
    }

    fn create_vertex_buffer(&self, _vertices: &[f32]) -> Result<u32, String> {
        Ok(self.state.borrow_mut().allocate())
    }

    fn delete_vertex_buffer(&self, buffer: u32) {
        self.release(buffer);
    }

    fn set_viewport(&self, size: PhysicalSize<u32>) {
        self.record(GpuCall::SetViewport(size));
    }

    fn clear(&self, color: [f32; 4]) {
        self.record(GpuCall::Clear(color));
    }

    fn draw_triangle_fan(
        &self,
        _buffer: u32,
        attributes: &[VertexAttribute],
        stride_floats: u32,
        vertex_count: u32,
    ) {
        self.record(GpuCall::DrawTriangleFan {
            attributes: attributes.len(),
            stride_floats,
            vertex_count,
        });
    }
}

type DecodeHook = Box<dyn FnMut(&CompressedUnit)>;

/// ### English
/// `DecodeEngine` replaying a fixed script, then repeating a fallback frame (or pending).
///
/// ### 中文
/// 按固定脚本回放的 `DecodeEngine`；脚本耗尽后重复返回备用帧（或 pending）。
pub struct ScriptedEngine {
    script: VecDeque<Result<DecodeOutcome, String>>,
    fallback: Option<RawFrame>,
    buffered: Vec<RawFrame>,
    seen: Vec<Vec<u8>>,
    hook: Option<DecodeHook>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Result<DecodeOutcome, String>>) -> Self {
        Self {
            script: script.into(),
            fallback: None,
            buffered: Vec::new(),
            seen: Vec::new(),
            hook: None,
        }
    }

    pub fn with_fallback(mut self, frame: RawFrame) -> Self {
        self.fallback = Some(frame);
        self
    }

    pub fn with_buffered(mut self, frames: Vec<RawFrame>) -> Self {
        self.buffered = frames;
        self
    }

    pub fn with_hook(mut self, hook: impl FnMut(&CompressedUnit) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn seen(&self) -> &[Vec<u8>] {
        &self.seen
    }
}

impl DecodeEngine for ScriptedEngine {
    fn decode(&mut self, unit: &CompressedUnit) -> Result<DecodeOutcome, String> {
        self.seen.push(unit.data().to_vec());
        if let Some(hook) = self.hook.as_mut() {
            hook(unit);
        }
        match self.script.pop_front() {
            Some(outcome) => outcome,
            None => Ok(self
                .fallback
                .clone()
                .map_or(DecodeOutcome::Pending, DecodeOutcome::Frame)),
        }
    }

    fn flush(&mut self) -> Result<Vec<RawFrame>, String> {
        Ok(std::mem::take(&mut self.buffered))
    }
}

/// ### English
/// Counters shared between a [`FakeSurface`] and the test thread.
///
/// ### 中文
/// [`FakeSurface`] 与测试线程共享的计数器。
#[derive(Debug, Default)]
pub struct SurfaceProbe {
    pub begin_frames: AtomicUsize,
    pub presents: AtomicUsize,
    /// ### English
    /// Fail every present once this many presents succeeded (`usize::MAX` = never).
    ///
    /// ### 中文
    /// 成功呈现达到该次数后，之后的每次呈现都失败（`usize::MAX` 表示永不失败）。
    pub fail_after: AtomicUsize,
}

impl SurfaceProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_after: AtomicUsize::new(usize::MAX),
            ..Self::default()
        })
    }

    pub fn presents(&self) -> usize {
        self.presents.load(Ordering::SeqCst)
    }
}

pub struct FakeSurface {
    device: Rc<RecordingDevice>,
    probe: Arc<SurfaceProbe>,
}

impl FakeSurface {
    pub fn new(probe: Arc<SurfaceProbe>) -> Self {
        Self {
            device: Rc::new(RecordingDevice::default()),
            probe,
        }
    }
}

impl RenderSurfaceContext for FakeSurface {
    type Device = RecordingDevice;

    fn device(&self) -> Rc<RecordingDevice> {
        self.device.clone()
    }

    fn make_current(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), PipelineError> {
        self.probe.begin_frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn present(&mut self) -> Result<(), PipelineError> {
        if self.probe.presents.load(Ordering::SeqCst) >= self.probe.fail_after.load(Ordering::SeqCst) {
            return Err(PipelineError::Surface("surface lost".to_string()));
        }
        self.probe.presents.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
