#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use virgl_core::pipe::{BindFlags, PrimType, ShaderType, TextureTarget};
use virgl_core::{RendererConfig, VirglFormat};
use virgl_gl::mock::MockGl;
use virgl_renderer::{
    DrawInfo, GlContextHandle, GlContextParams, Renderer, RendererCallbacks, ResourceCreateArgs, ShaderCreateArgs,
};

pub const PASSTHROUGH_VS: &str = "VERT
DCL IN[0]
DCL OUT[0], POSITION
  0: MOV OUT[0], IN[0]
  1: END
";

pub const PASSTHROUGH_FS: &str = "FRAG
DCL IN[0], GENERIC[0], PERSPECTIVE
DCL OUT[0], COLOR
  0: MOV OUT[0], IN[0]
  1: END
";

pub const CONSTANT_FS: &str = "FRAG
DCL OUT[0], COLOR
DCL CONST[0]
  0: MOV OUT[0], CONST[0]
  1: END
";

/// Callbacks that record fences and context churn.
#[derive(Default)]
pub struct TestCallbacks {
    next_ctx: AtomicU64,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    made_current: AtomicUsize,
    fences: Mutex<Vec<u32>>,
}

impl TestCallbacks {
    pub fn fences(&self) -> Vec<u32> {
        self.fences.lock().unwrap().clone()
    }

    pub fn live_contexts(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.destroyed.load(Ordering::SeqCst)
    }

    /// Calls into `make_current`, binds and releases alike.
    pub fn make_current_calls(&self) -> usize {
        self.made_current.load(Ordering::SeqCst)
    }
}

impl RendererCallbacks for TestCallbacks {
    fn write_fence(&self, fence_id: u32) {
        self.fences.lock().unwrap().push(fence_id);
    }

    fn create_gl_context(&self, _scanout: u32, _params: &GlContextParams) -> Option<GlContextHandle> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Some(GlContextHandle(self.next_ctx.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn destroy_gl_context(&self, _handle: GlContextHandle) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn make_current(&self, _scanout: u32, _handle: Option<GlContextHandle>) -> bool {
        self.made_current.fetch_add(1, Ordering::SeqCst);
        true
    }
}

pub struct Harness {
    pub renderer: Renderer,
    pub gl: Arc<MockGl>,
    pub callbacks: Arc<TestCallbacks>,
}

pub fn harness() -> Harness {
    harness_with(RendererConfig::default())
}

pub fn harness_with(config: RendererConfig) -> Harness {
    let gl = Arc::new(MockGl::new());
    let callbacks = Arc::new(TestCallbacks::default());
    let renderer = Renderer::new(gl.clone(), callbacks.clone(), config).unwrap();
    Harness {
        renderer,
        gl,
        callbacks,
    }
}

pub fn buffer_args(handle: u32, size: u32) -> ResourceCreateArgs {
    ResourceCreateArgs {
        handle,
        target: TextureTarget::Buffer as u32,
        format: VirglFormat::R8_UNORM as u32,
        bind: BindFlags::VERTEX_BUFFER.bits(),
        width: size,
        height: 1,
        depth: 1,
        array_size: 1,
        ..Default::default()
    }
}

pub fn rgba8_args(handle: u32, width: u32, height: u32) -> ResourceCreateArgs {
    ResourceCreateArgs {
        handle,
        target: TextureTarget::Texture2D as u32,
        format: VirglFormat::R8G8B8A8_UNORM as u32,
        bind: (BindFlags::SAMPLER_VIEW | BindFlags::RENDER_TARGET).bits(),
        width,
        height,
        depth: 1,
        array_size: 1,
        ..Default::default()
    }
}

pub fn create_shader(renderer: &mut Renderer, ctx_id: u32, handle: u32, ty: ShaderType, text: &str) {
    let args = ShaderCreateArgs {
        handle,
        ty: ty as u32,
        total_len: text.len() as u32,
        ..Default::default()
    };
    renderer.create_shader(ctx_id, &args, text).unwrap();
}

/// Create and bind a passthrough VS (handle 1) and FS (handle 2).
pub fn bind_passthrough(renderer: &mut Renderer, ctx_id: u32) {
    create_shader(renderer, ctx_id, 1, ShaderType::Vertex, PASSTHROUGH_VS);
    create_shader(renderer, ctx_id, 2, ShaderType::Fragment, PASSTHROUGH_FS);
    renderer.bind_shader(ctx_id, 1, ShaderType::Vertex as u32).unwrap();
    renderer.bind_shader(ctx_id, 2, ShaderType::Fragment as u32).unwrap();
}

pub fn triangles() -> DrawInfo {
    DrawInfo {
        mode: PrimType::Triangles as u32,
        count: 3,
        ..Default::default()
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}
