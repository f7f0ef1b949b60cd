//! Host-side virgl renderer.
//!
//! Executes decoded virgl commands from guest contexts against the host's
//! OpenGL or OpenGL ES implementation. The embedder decodes the command
//! stream and calls into [`Renderer`]; GL contexts and fence delivery go back
//! out through [`RendererCallbacks`].
//!
//! A [`Renderer`] is bound to the thread whose GL context it was created on.
//! Only the fence sync thread runs elsewhere.

mod arena;
mod blit;
mod callbacks;
mod caps;
mod context;
mod draw;
mod fence;
mod gl_objects;
mod host;
mod iov;
mod objects;
mod program;
mod query;
mod renderer;
mod resource;
mod shader;
mod state;
mod sub_context;
mod transfer;

pub use blit::{BlitInfo, BlitSide, BLIT_MASK_RGBA, BLIT_MASK_S, BLIT_MASK_Z};
pub use callbacks::{GlContextHandle, GlContextParams, RendererCallbacks};
pub use context::ImageViewArgs;
pub use draw::{DrawInfo, GridInfo};
pub use iov::Iov;
pub use objects::{SamplerViewArgs, StreamoutTargetArgs, SurfaceArgs};
pub use query::QueryCreateArgs;
pub use renderer::Renderer;
pub use resource::{ResourceCreateArgs, ResourceInfo};
pub use shader::ShaderCreateArgs;
pub use state::{
    BlendState, ClipState, DsaState, IndexBufferBinding, RasterizerState, RtBlendState, SamplerStateDesc,
    Scissor, StencilState, VertexBufferBinding, VertexElementDesc, Viewport,
};
pub use transfer::TransferRequest;

#[cfg(test)]
pub(crate) mod test_support {
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use virgl_core::RendererConfig;
    use virgl_gl::mock::MockGl;

    use crate::callbacks::{GlContextHandle, GlContextParams, RendererCallbacks};
    use crate::host::Host;

    static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

    /// Hands out fresh context handles and ignores fences.
    pub struct NullCallbacks;

    impl RendererCallbacks for NullCallbacks {
        fn write_fence(&self, _fence_id: u32) {}

        fn create_gl_context(&self, _scanout: u32, _params: &GlContextParams) -> Option<GlContextHandle> {
            Some(GlContextHandle(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed)))
        }

        fn destroy_gl_context(&self, _handle: GlContextHandle) {}

        fn make_current(&self, _scanout: u32, _handle: Option<GlContextHandle>) -> bool {
            true
        }
    }

    /// Records reported fences and destroyed contexts.
    #[derive(Default)]
    pub struct RecordingCallbacks {
        fences: Mutex<Vec<u32>>,
        destroyed: Mutex<usize>,
    }

    impl RecordingCallbacks {
        pub fn fences(&self) -> Vec<u32> {
            self.fences.lock().unwrap().clone()
        }

        pub fn destroyed_contexts(&self) -> usize {
            *self.destroyed.lock().unwrap()
        }
    }

    impl RendererCallbacks for RecordingCallbacks {
        fn write_fence(&self, fence_id: u32) {
            self.fences.lock().unwrap().push(fence_id);
        }

        fn create_gl_context(&self, scanout: u32, params: &GlContextParams) -> Option<GlContextHandle> {
            NullCallbacks.create_gl_context(scanout, params)
        }

        fn destroy_gl_context(&self, _handle: GlContextHandle) {
            *self.destroyed.lock().unwrap() += 1;
        }

        fn make_current(&self, _scanout: u32, _handle: Option<GlContextHandle>) -> bool {
            true
        }
    }

    pub fn mock_host() -> (Rc<Host>, Arc<MockGl>) {
        let gl = Arc::new(MockGl::new());
        let host = Host::new(gl.clone(), Arc::new(NullCallbacks), RendererConfig::default()).unwrap();
        (Rc::new(host), gl)
    }
}
