//! The renderer: global resources, guest contexts and fences.
//!
//! All methods run on the render thread. Context-addressed methods that
//! reach GL make the addressed context's GL context current first; pure
//! state setters only record state. A context error either kind returns is
//! also recorded on the context.

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{debug, info, trace, warn};
use virgl_core::caps::{cap_set_info, CapsSet};
use virgl_core::error::RendererResult;
use virgl_core::limits::{MAX_CURSOR_SIZE, POLYGON_STIPPLE_ROWS};
use virgl_core::{Handle, PipeBox, RendererConfig, RendererError};
use virgl_gl::GlApi;

use crate::arena::HandleTable;
use crate::blit::BlitInfo;
use crate::callbacks::RendererCallbacks;
use crate::caps;
use crate::context::{Context, Env, ImageViewArgs};
use crate::draw::{DrawInfo, GridInfo};
use crate::fence::FenceManager;
use crate::host::Host;
use crate::iov::Iov;
use crate::objects::{SamplerViewArgs, StreamoutTargetArgs, SurfaceArgs};
use crate::query::{Query, QueryCreateArgs};
use crate::resource::{Resource, ResourceCreateArgs, ResourceInfo};
use crate::shader::ShaderCreateArgs;
use crate::state::{
    BlendState, ClipState, DsaState, RasterizerState, SamplerStateDesc, Scissor, VertexElementDesc, Viewport,
};
use crate::transfer::{self, TransferRequest};

struct WaitingQuery {
    ctx_id: u32,
    sub_id: u32,
    query: Weak<Query>,
}

/// A virgl command processor bound to one host GL implementation.
pub struct Renderer {
    host: Rc<Host>,
    resources: HandleTable<Rc<Resource>>,
    contexts: HashMap<u32, Context>,
    /// Context the next guest command addresses by default.
    current_ctx: u32,
    /// `current_ctx` changed and its GL context is not bound yet.
    ctx_switch_pending: bool,
    fences: FenceManager,
    waiting_queries: Vec<WaitingQuery>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("resources", &self.resources.len())
            .field("contexts", &self.contexts.keys().collect::<Vec<_>>())
            .field("fences", &self.fences)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Probe the GL context current on this thread and set up context 0.
    pub fn new(gl: Arc<dyn GlApi>, callbacks: Arc<dyn RendererCallbacks>, config: RendererConfig) -> Result<Self> {
        let threaded = config.use_thread_sync;
        let host = Rc::new(Host::new(Arc::clone(&gl), Arc::clone(&callbacks), config)?);
        let fences = FenceManager::new(gl, callbacks, threaded, host.version());
        let ctx0 = Context::new(&host, 0, "ctx0").context("creating context 0")?;
        info!(
            "renderer ready: {} {}.{}, fence thread {}",
            if host.is_gles() { "GLES" } else { "GL" },
            host.caps.version.major,
            host.caps.version.minor,
            if fences.is_threaded() { "on" } else { "off" }
        );
        Ok(Self {
            host,
            resources: HandleTable::default(),
            contexts: HashMap::from([(0, ctx0)]),
            current_ctx: 0,
            ctx_switch_pending: false,
            fences,
            waiting_queries: Vec::new(),
        })
    }

    /// GL work for context `ctx_id`. Dropped while a guest context is in
    /// error.
    fn ctx_op<T: Default>(
        &mut self,
        ctx_id: u32,
        op: impl FnOnce(&mut Context, &Env<'_>) -> RendererResult<T>,
    ) -> RendererResult<T> {
        if self.dropped(ctx_id) {
            return Ok(T::default());
        }
        self.run_on(ctx_id, true, op)
    }

    /// State-only command for context `ctx_id`; binds no GL context.
    /// Dropped while a guest context is in error.
    fn state_op<T: Default>(
        &mut self,
        ctx_id: u32,
        op: impl FnOnce(&mut Context, &Env<'_>) -> RendererResult<T>,
    ) -> RendererResult<T> {
        if self.dropped(ctx_id) {
            return Ok(T::default());
        }
        self.run_on(ctx_id, false, op)
    }

    /// Context 0 keeps working after an error; guest contexts do not.
    fn dropped(&self, ctx_id: u32) -> bool {
        let dropped = ctx_id != 0 && self.contexts.get(&ctx_id).is_some_and(|ctx| ctx.in_error);
        if dropped {
            trace!("context {ctx_id} is in error, dropping command");
        }
        dropped
    }

    fn run_on<T>(
        &mut self,
        ctx_id: u32,
        bind_gl: bool,
        op: impl FnOnce(&mut Context, &Env<'_>) -> RendererResult<T>,
    ) -> RendererResult<T> {
        if bind_gl && self.contexts.contains_key(&ctx_id) && !self.ensure_current(ctx_id) {
            return Err(RendererError::Inval);
        }
        let Some(ctx) = self.contexts.get_mut(&ctx_id) else {
            warn!("no context {ctx_id}");
            return Err(RendererError::Inval);
        };
        let env = Env {
            host: &self.host,
            resources: &self.resources,
        };
        let result = op(ctx, &env);
        self.record(ctx_id, result)
    }

    /// Record a context error returned by a command on `ctx_id`.
    fn record<T>(&mut self, ctx_id: u32, result: RendererResult<T>) -> RendererResult<T> {
        if let Err(RendererError::Context { kind, value, op }) = &result {
            if let Some(ctx) = self.contexts.get_mut(&ctx_id) {
                ctx.report_error(*kind, *value, op);
            }
        }
        result
    }

    /// Bind the GL context of `ctx_id`, completing a pending switch to it.
    fn ensure_current(&mut self, ctx_id: u32) -> bool {
        let Some(ctx) = self.contexts.get(&ctx_id) else {
            return false;
        };
        if !ctx.make_current(&self.host) {
            return false;
        }
        if ctx_id == self.current_ctx && self.ctx_switch_pending {
            trace!("completed switch to context {ctx_id}");
            self.ctx_switch_pending = false;
        }
        true
    }

    fn make_ctx0_current(&self) -> bool {
        self.contexts.get(&0).is_some_and(|ctx| ctx.make_current(&self.host))
    }

    // -----------------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------------

    pub fn create_context(&mut self, ctx_id: u32, name: &str) -> RendererResult<()> {
        if self.contexts.contains_key(&ctx_id) {
            warn!("context {ctx_id} already exists");
            return Err(RendererError::Inval);
        }
        let ctx = Context::new(&self.host, ctx_id, name)?;
        self.contexts.insert(ctx_id, ctx);
        Ok(())
    }

    pub fn destroy_context(&mut self, ctx_id: u32) {
        if ctx_id == 0 {
            warn!("context 0 cannot be destroyed");
            return;
        }
        let Some(ctx) = self.contexts.remove(&ctx_id) else {
            return;
        };
        self.waiting_queries.retain(|q| q.ctx_id != ctx_id);
        ctx.destroy(&self.host);
        if self.current_ctx == ctx_id {
            self.current_ctx = 0;
            self.ctx_switch_pending = false;
        }
        self.make_ctx0_current();
    }

    /// Switch the default context. A context in error refuses, except 0.
    ///
    /// Only records the switch; the GL context is bound by the next command
    /// for that context that reaches GL.
    pub fn hw_switch_context(&mut self, ctx_id: u32) -> bool {
        let Some(ctx) = self.contexts.get(&ctx_id) else {
            return false;
        };
        if ctx_id != 0 && ctx.in_error {
            warn!("context {ctx_id} is in error, refusing to switch");
            return false;
        }
        if ctx_id != self.current_ctx {
            trace!("switching to context {ctx_id}");
            self.current_ctx = ctx_id;
            self.ctx_switch_pending = true;
        }
        true
    }

    pub fn current_context(&self) -> u32 {
        self.current_ctx
    }

    /// Whether the last switch still waits for its GL context to be bound.
    pub fn switch_pending(&self) -> bool {
        self.ctx_switch_pending
    }

    /// Make context 0 current right away.
    pub fn force_ctx_0(&mut self) {
        self.current_ctx = 0;
        self.ctx_switch_pending = false;
        self.make_ctx0_current();
    }

    /// Sticky error of a context, if any.
    pub fn context_error(&self, ctx_id: u32) -> Option<virgl_core::ContextErrorKind> {
        self.contexts.get(&ctx_id).and_then(|ctx| ctx.last_error)
    }

    pub fn create_sub_ctx(&mut self, ctx_id: u32, sub_id: u32) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.create_sub_ctx(env.host, sub_id))
    }

    pub fn destroy_sub_ctx(&mut self, ctx_id: u32, sub_id: u32) -> RendererResult<()> {
        self.waiting_queries
            .retain(|q| !(q.ctx_id == ctx_id && q.sub_id == sub_id));
        self.run_on(ctx_id, true, |ctx, env| {
            ctx.destroy_sub_ctx(env.host, sub_id);
            Ok(())
        })
    }

    pub fn set_sub_ctx(&mut self, ctx_id: u32, sub_id: u32) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| {
            ctx.set_sub_ctx(sub_id);
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    pub fn resource_create(&mut self, args: &ResourceCreateArgs, iov: Option<Iov>) -> RendererResult<()> {
        if self.resources.contains(args.handle) {
            warn!("resource {} already exists", args.handle);
            return Err(RendererError::Inval);
        }
        self.make_ctx0_current();
        let res = Resource::create(&self.host, args, iov)?;
        debug!("created {res:?}");
        self.resources
            .insert(args.handle, Rc::new(res))
            .map(|_| ())
            .map_err(|_| RendererError::Inval)
    }

    /// Drop the global reference. GL storage goes once no context object
    /// holds the resource either.
    pub fn resource_unref(&mut self, handle: Handle) -> RendererResult<()> {
        self.make_ctx0_current();
        match self.resources.remove(handle) {
            Some(res) => {
                trace!("unref resource {handle} ({} strong)", Rc::strong_count(&res));
                Ok(())
            }
            None => Err(RendererError::Inval),
        }
    }

    fn global_resource(&self, handle: Handle) -> RendererResult<Rc<Resource>> {
        self.resources.get(handle).cloned().ok_or(RendererError::Inval)
    }

    pub fn resource_attach_iov(&mut self, handle: Handle, iov: Iov) -> RendererResult<()> {
        let res = self.global_resource(handle)?;
        let mut backing = res.iov.borrow_mut();
        if backing.is_some() {
            warn!("resource {handle} already has a backing");
            return Err(RendererError::Inval);
        }
        *backing = Some(iov);
        Ok(())
    }

    /// Detach and return the backing.
    pub fn resource_detach_iov(&mut self, handle: Handle) -> Option<Iov> {
        self.resources.get(handle)?.iov.borrow_mut().take()
    }

    pub fn resource_get_info(&self, handle: Handle) -> RendererResult<ResourceInfo> {
        self.global_resource(handle).map(|res| res.info())
    }

    /// Contexts holding a weak reference to the resource.
    pub fn resource_attach_count(&self, handle: Handle) -> usize {
        self.resources.get(handle).map_or(0, Rc::weak_count)
    }

    pub fn ctx_attach_resource(&mut self, ctx_id: u32, handle: Handle) -> RendererResult<()> {
        let res = self.global_resource(handle)?;
        let ctx = self.contexts.get_mut(&ctx_id).ok_or(RendererError::Inval)?;
        ctx.attach_resource(&res);
        Ok(())
    }

    pub fn ctx_detach_resource(&mut self, ctx_id: u32, handle: Handle) -> RendererResult<()> {
        let ctx = self.contexts.get_mut(&ctx_id).ok_or(RendererError::Inval)?;
        ctx.detach_resource(handle);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    fn transfer_resource(&mut self, req: &TransferRequest, op: &'static str) -> RendererResult<Rc<Resource>> {
        let handle = req.handle;
        self.run_on(req.ctx_id, true, |ctx, env| ctx.resource(env, handle, op))
    }

    /// Guest memory to resource; `iov` defaults to the attached backing.
    pub fn transfer_write(&mut self, req: &TransferRequest, iov: Option<&Iov>) -> RendererResult<()> {
        let res = self.transfer_resource(req, "transfer_write")?;
        let result = match iov {
            Some(iov) => transfer::write(&self.host, &res, req, iov),
            None => match res.iov.borrow().as_ref() {
                Some(iov) => transfer::write(&self.host, &res, req, iov),
                None => Err(RendererError::Inval),
            },
        };
        self.record(req.ctx_id, result)
    }

    /// Resource to guest memory; `iov` defaults to the attached backing.
    pub fn transfer_read(&mut self, req: &TransferRequest, iov: Option<&mut Iov>) -> RendererResult<()> {
        let res = self.transfer_resource(req, "transfer_read")?;
        let result = match iov {
            Some(iov) => transfer::read(&self.host, &res, req, iov),
            None => match res.iov.borrow_mut().as_mut() {
                Some(iov) => transfer::read(&self.host, &res, req, iov),
                None => Err(RendererError::Inval),
            },
        };
        self.record(req.ctx_id, result)
    }

    /// Write data carried inline in the command stream.
    pub fn transfer_inline_write(&mut self, req: &TransferRequest, data: &[u8]) -> RendererResult<()> {
        let iov = Iov::from(data.to_vec());
        let req = TransferRequest { offset: 0, ..*req };
        self.transfer_write(&req, Some(&iov))
    }

    /// Read a rectangle of level 0 into `iov` at `offset`, rows at the
    /// resource's packed stride.
    #[allow(clippy::too_many_arguments)]
    pub fn get_rect(
        &mut self,
        handle: Handle,
        iov: &mut Iov,
        offset: u64,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> RendererResult<()> {
        let res = self.global_resource(handle)?;
        self.make_ctx0_current();
        let req = TransferRequest {
            handle,
            ctx_id: 0,
            level: 0,
            stride: res.info().stride,
            layer_stride: 0,
            pbox: PipeBox::new(x, y, 0, width, height, 1),
            offset,
        };
        transfer::read(&self.host, &res, &req, iov)
    }

    /// Top-down RGBA rows of a cursor resource with its size.
    pub fn get_cursor_contents(&mut self, handle: Handle) -> RendererResult<(Vec<u8>, u32, u32)> {
        let res = self.global_resource(handle)?;
        if res.width > MAX_CURSOR_SIZE || res.height > MAX_CURSOR_SIZE {
            return Err(RendererError::Inval);
        }
        self.make_ctx0_current();
        let data = transfer::cursor_contents(&self.host, &res)?;
        Ok((data, res.width, res.height))
    }

    // -----------------------------------------------------------------------
    // Fences, queries, polling
    // -----------------------------------------------------------------------

    pub fn create_fence(&mut self, fence_id: u32, ctx_id: u32) -> RendererResult<()> {
        if let Some(ctx) = self.contexts.get(&ctx_id) {
            ctx.make_current(&self.host);
        }
        self.fences.create_fence(fence_id, ctx_id);
        Ok(())
    }

    pub fn check_fences(&mut self) {
        self.fences.check_fences();
    }

    /// Store the results of queries that became available.
    pub fn check_queries(&mut self) {
        let host = Rc::clone(&self.host);
        let contexts = &mut self.contexts;
        self.waiting_queries.retain(|waiting| {
            let Some(query) = waiting.query.upgrade() else {
                return false;
            };
            let Some(ctx) = contexts.get_mut(&waiting.ctx_id) else {
                return false;
            };
            if ctx.activate_sub(&host, waiting.sub_id).is_none() {
                return false;
            }
            !query.check(&host, false)
        });
    }

    pub fn poll(&mut self) {
        self.check_fences();
        self.check_queries();
    }

    /// Fd that becomes readable when fences signal, or -1 without the sync
    /// thread.
    pub fn get_poll_fd(&self) -> RawFd {
        self.fences.poll_fd()
    }

    // -----------------------------------------------------------------------
    // Capabilities
    // -----------------------------------------------------------------------

    /// `(max_version, size)` of a capability set.
    pub fn get_cap_set(&self, set: u32) -> (u32, u32) {
        cap_set_info(set)
    }

    pub fn fill_caps(&self, set: u32, _version: u32, caps: &mut CapsSet) {
        caps::fill_caps(&self.host, set, caps);
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Drop every context, resource and fence, leaving a fresh context 0.
    pub fn reset(&mut self) -> RendererResult<()> {
        info!("resetting renderer");
        self.waiting_queries.clear();
        let ids: Vec<u32> = self.contexts.keys().copied().filter(|&id| id != 0).collect();
        for id in ids {
            self.destroy_context(id);
        }
        self.make_ctx0_current();
        self.fences.reset();
        let dropped = self.resources.drain();
        debug!("dropping {} resources", dropped.len());
        drop(dropped);
        if let Some(ctx0) = self.contexts.remove(&0) {
            ctx0.destroy(&self.host);
        }
        self.current_ctx = 0;
        let ctx0 = Context::new(&self.host, 0, "ctx0")?;
        self.contexts.insert(0, ctx0);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Object creation
    // -----------------------------------------------------------------------

    pub fn create_surface(&mut self, ctx_id: u32, args: &SurfaceArgs) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.create_surface(env, args))
    }

    pub fn create_sampler_view(&mut self, ctx_id: u32, args: &SamplerViewArgs) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.create_sampler_view(env, args))
    }

    pub fn create_sampler_state(&mut self, ctx_id: u32, handle: Handle, desc: SamplerStateDesc) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.create_sampler_state(env, handle, desc))
    }

    /// Create a shader from TGSI text, or continue a long one.
    pub fn create_shader(&mut self, ctx_id: u32, args: &ShaderCreateArgs, text: &str) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.create_shader(env, args, text))
    }

    pub fn create_vertex_elements(
        &mut self,
        ctx_id: u32,
        handle: Handle,
        elements: &[VertexElementDesc],
    ) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.create_vertex_elements(handle, elements))
    }

    pub fn create_so_target(&mut self, ctx_id: u32, args: &StreamoutTargetArgs) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.create_so_target(env, args))
    }

    pub fn create_query(&mut self, ctx_id: u32, args: &QueryCreateArgs) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.create_query(env, args))
    }

    pub fn create_blend(&mut self, ctx_id: u32, handle: Handle, state: BlendState) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.create_blend(handle, state))
    }

    pub fn create_dsa(&mut self, ctx_id: u32, handle: Handle, state: DsaState) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.create_dsa(handle, state))
    }

    pub fn create_rasterizer(&mut self, ctx_id: u32, handle: Handle, state: RasterizerState) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.create_rasterizer(handle, state))
    }

    pub fn object_destroy(&mut self, ctx_id: u32, obj_type: u32, handle: Handle) -> RendererResult<()> {
        self.run_on(ctx_id, true, |ctx, _| ctx.object_destroy(obj_type, handle))
    }

    /// Bind a blend, DSA or rasterizer object; handle 0 unbinds.
    pub fn bind_object(&mut self, ctx_id: u32, obj_type: u32, handle: Handle) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.bind_object(obj_type, handle))
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn set_framebuffer_state(&mut self, ctx_id: u32, cbufs: &[Handle], zsurf: Handle) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_framebuffer_state(cbufs, zsurf))
    }

    pub fn set_framebuffer_state_no_attach(
        &mut self,
        ctx_id: u32,
        width: u32,
        height: u32,
        layers: u32,
        samples: u32,
    ) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| {
            ctx.set_framebuffer_state_no_attach(width, height, layers, samples)
        })
    }

    pub fn set_viewport_states(&mut self, ctx_id: u32, start: u32, viewports: &[Viewport]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_viewport_states(start, viewports))
    }

    pub fn set_scissor_state(&mut self, ctx_id: u32, start: u32, scissors: &[Scissor]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_scissor_state(start, scissors))
    }

    pub fn bind_sampler_states(&mut self, ctx_id: u32, shader: u32, start: u32, handles: &[Handle]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.bind_sampler_states(shader, start, handles))
    }

    pub fn set_sampler_views(&mut self, ctx_id: u32, shader: u32, start: u32, handles: &[Handle]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_sampler_views(shader, start, handles))
    }

    pub fn set_single_image_view(
        &mut self,
        ctx_id: u32,
        shader: u32,
        index: u32,
        args: &ImageViewArgs,
    ) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, env| ctx.set_single_image_view(env, shader, index, args))
    }

    pub fn set_single_ssbo(
        &mut self,
        ctx_id: u32,
        shader: u32,
        index: u32,
        offset: u32,
        size: u32,
        res_handle: Handle,
    ) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, env| {
            ctx.set_single_ssbo(env, shader, index, offset, size, res_handle)
        })
    }

    pub fn set_constants(&mut self, ctx_id: u32, shader: u32, data: &[u32]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_constants(shader, data))
    }

    pub fn set_uniform_buffer(
        &mut self,
        ctx_id: u32,
        shader: u32,
        index: u32,
        offset: u32,
        size: u32,
        res_handle: Handle,
    ) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, env| {
            ctx.set_uniform_buffer(env, shader, index, offset, size, res_handle)
        })
    }

    pub fn set_index_buffer(&mut self, ctx_id: u32, res_handle: Handle, index_size: u32, offset: u32) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, env| ctx.set_index_buffer(env, res_handle, index_size, offset))
    }

    pub fn set_single_vbo(
        &mut self,
        ctx_id: u32,
        index: u32,
        stride: u32,
        offset: u32,
        res_handle: Handle,
    ) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, env| ctx.set_single_vbo(env, index, stride, offset, res_handle))
    }

    pub fn set_num_vbo(&mut self, ctx_id: u32, num: u32) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_num_vbo(num))
    }

    pub fn bind_vertex_elements(&mut self, ctx_id: u32, handle: Handle) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.bind_vertex_elements(handle))
    }

    pub fn bind_shader(&mut self, ctx_id: u32, handle: Handle, shader: u32) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.bind_shader(handle, shader))
    }

    pub fn set_blend_color(&mut self, ctx_id: u32, color: [f32; 4]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_blend_color(color))
    }

    pub fn set_stencil_ref(&mut self, ctx_id: u32, refs: [u8; 2]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_stencil_ref(refs))
    }

    pub fn set_clip_state(&mut self, ctx_id: u32, clip: ClipState) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_clip_state(clip))
    }

    pub fn set_sample_mask(&mut self, ctx_id: u32, mask: u32) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_sample_mask(mask))
    }

    pub fn set_min_samples(&mut self, ctx_id: u32, samples: u32) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_min_samples(samples))
    }

    pub fn set_polygon_stipple(&mut self, ctx_id: u32, stipple: [u32; POLYGON_STIPPLE_ROWS]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_polygon_stipple(stipple))
    }

    pub fn set_tess_state(&mut self, ctx_id: u32, outer: [f32; 4], inner: [f32; 2]) -> RendererResult<()> {
        self.state_op(ctx_id, |ctx, _| ctx.set_tess_state(outer, inner))
    }

    pub fn set_streamout_targets(
        &mut self,
        ctx_id: u32,
        append_bitmask: u32,
        handles: &[Handle],
    ) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.set_streamout_targets(env, append_bitmask, handles))
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    pub fn draw_vbo(&mut self, ctx_id: u32, info: &DrawInfo) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.draw_vbo(env, info))
    }

    pub fn launch_grid(&mut self, ctx_id: u32, info: &GridInfo) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.launch_grid(env, info))
    }

    pub fn clear(&mut self, ctx_id: u32, buffers: u32, color: [u32; 4], depth: f64, stencil: u32) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.clear(env, buffers, color, depth, stencil))
    }

    pub fn memory_barrier(&mut self, ctx_id: u32, flags: u32) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| {
            ctx.memory_barrier(env, flags);
            Ok(())
        })
    }

    pub fn texture_barrier(&mut self, ctx_id: u32) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| {
            ctx.texture_barrier(env);
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn resource_copy_region(
        &mut self,
        ctx_id: u32,
        dst_handle: Handle,
        dst_level: u32,
        dst_pos: [u32; 3],
        src_handle: Handle,
        src_level: u32,
        src_box: &PipeBox,
    ) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| {
            ctx.resource_copy_region(env, dst_handle, dst_level, dst_pos, src_handle, src_level, src_box)
        })
    }

    pub fn blit(&mut self, ctx_id: u32, info: &BlitInfo) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.blit(env, info))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn begin_query(&mut self, ctx_id: u32, handle: Handle) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.begin_query(env, handle))
    }

    pub fn end_query(&mut self, ctx_id: u32, handle: Handle) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.end_query(env, handle))
    }

    /// Store the query result in its resource; without `wait`, an unfinished
    /// query is finished later by [`Renderer::poll`].
    pub fn get_query_result(&mut self, ctx_id: u32, handle: Handle, wait: bool) -> RendererResult<()> {
        let pending = self.ctx_op(ctx_id, |ctx, env| {
            let sub_id = ctx.current_sub_id();
            Ok(ctx.get_query_result(env, handle, wait)?.map(|q| (sub_id, q)))
        })?;
        if let Some((sub_id, query)) = pending {
            let already = self
                .waiting_queries
                .iter()
                .any(|w| w.query.upgrade().is_some_and(|q| Rc::ptr_eq(&q, &query)));
            if !already {
                self.waiting_queries.push(WaitingQuery {
                    ctx_id,
                    sub_id,
                    query: Rc::downgrade(&query),
                });
            }
        }
        Ok(())
    }

    pub fn render_condition(&mut self, ctx_id: u32, handle: Handle, condition: bool, mode: u32) -> RendererResult<()> {
        self.ctx_op(ctx_id, |ctx, env| ctx.render_condition(env, handle, condition, mode))
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.waiting_queries.clear();
        let ids: Vec<u32> = self.contexts.keys().copied().filter(|&id| id != 0).collect();
        for id in ids {
            self.destroy_context(id);
        }
        self.make_ctx0_current();
        self.fences.shutdown();
        drop(self.resources.drain());
        if let Some(ctx0) = self.contexts.remove(&0) {
            ctx0.destroy(&self.host);
        }
        debug!("renderer destroyed");
    }
}
