//! Hooks into the embedding process.
//!
//! The renderer never creates GL contexts or signals the guest on its own;
//! it goes through [`RendererCallbacks`] for both.

/// Opaque GL context handle handed out by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlContextHandle(pub u64);

/// Requested properties of a new GL context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlContextParams {
    /// Share objects with the context that is current at creation time.
    pub shared: bool,
    pub major_ver: u32,
    pub minor_ver: u32,
}

/// Services the embedder provides.
///
/// Implementations must be callable from the fence sync thread as well as
/// the render thread.
pub trait RendererCallbacks: Send + Sync {
    /// A fence with id `fence_id` (and every earlier one) has signalled.
    fn write_fence(&self, fence_id: u32);

    fn create_gl_context(&self, scanout: u32, params: &GlContextParams) -> Option<GlContextHandle>;

    fn destroy_gl_context(&self, handle: GlContextHandle);

    /// Make `handle` current on the calling thread; `None` releases the
    /// current context.
    fn make_current(&self, scanout: u32, handle: Option<GlContextHandle>) -> bool;
}
