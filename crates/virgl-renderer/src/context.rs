//! Guest contexts.
//!
//! A context owns its sub-contexts (one host GL context each) and a table of
//! weakly attached resources. Context errors are sticky: once one is
//! reported, draws, clears and dispatches on the context become no-ops.

use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};
use virgl_core::error::RendererResult;
use virgl_core::limits::{
    MAX_COLOR_BUFS, MAX_CONST_BUFFERS, MAX_SHADER_BUFFERS, MAX_SHADER_IMAGES, MAX_SHADER_SAMPLER_VIEWS,
    MAX_SO_BUFFERS, MAX_VERTEX_BUFFERS, MAX_VIEWPORTS, POLYGON_STIPPLE_ROWS,
};
use virgl_core::pipe::{BarrierFlags, ClearFlags, ObjectType, RenderCondMode, ShaderType};
use virgl_core::{ContextErrorKind, Handle, RendererError};
use virgl_gl::Feature;

use crate::arena::HandleTable;
use crate::callbacks::GlContextParams;
use crate::draw::{DrawInfo, GridInfo};
use crate::gl_objects::GlTransformFeedback;
use crate::host::Host;
use crate::objects::{
    Object, SamplerState, SamplerView, SamplerViewArgs, StreamoutTarget, StreamoutTargetArgs, Surface, SurfaceArgs,
    VertexElements,
};
use crate::query::{render_condition_mode, Query, QueryCreateArgs};
use crate::resource::Resource;
use crate::shader::{ShaderCreateArgs, ShaderSelector};
use crate::state::{
    BlendState, ClipState, DsaState, IndexBufferBinding, RasterizerState, SamplerStateDesc, Scissor,
    VertexBufferBinding, VertexElementDesc, Viewport,
};
use crate::sub_context::{
    BufferBinding, DirtyFlags, ImageBinding, NoAttachState, RenderCondition, StreamoutState, SubContext,
};

/// What a context operation can see besides the context itself.
pub(crate) struct Env<'a> {
    pub host: &'a Rc<Host>,
    /// Global resource table; context 0 resolves handles here.
    pub resources: &'a HandleTable<Rc<Resource>>,
}

/// A shader image binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageViewArgs {
    pub res_handle: Handle,
    pub format: u32,
    pub access: u32,
    /// Layer range (`first | last << 16`) for textures, offset for buffers.
    pub u0: u32,
    /// Level for textures, size for buffers.
    pub u1: u32,
}

fn illegal_cmd(value: u32, op: &'static str) -> RendererError {
    RendererError::context(ContextErrorKind::IllegalCmdBuffer, value, op)
}

fn illegal_handle(handle: Handle, op: &'static str) -> RendererError {
    RendererError::context(ContextErrorKind::IllegalHandle, handle, op)
}

fn stage(value: u32, op: &'static str) -> RendererResult<ShaderType> {
    ShaderType::from_raw(value).ok_or_else(|| illegal_cmd(value, op))
}

/// `start..start + len` lies within `0..max`.
fn check_range(start: u32, len: usize, max: usize, op: &'static str) -> RendererResult<usize> {
    let start_idx = start as usize;
    if start_idx > max || len > max - start_idx {
        return Err(illegal_cmd(start, op));
    }
    Ok(start_idx)
}

pub(crate) struct Context {
    pub id: u32,
    pub name: String,
    pub in_error: bool,
    pub last_error: Option<ContextErrorKind>,
    attached: HashMap<Handle, Weak<Resource>>,
    sub_ctxs: BTreeMap<u32, SubContext>,
    current_sub: u32,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("in_error", &self.in_error)
            .field("sub_ctxs", &self.sub_ctxs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create the context with its sub-context 0.
    pub fn new(host: &Rc<Host>, id: u32, name: &str) -> RendererResult<Self> {
        let mut ctx = Self {
            id,
            name: name.to_owned(),
            in_error: false,
            last_error: None,
            attached: HashMap::new(),
            sub_ctxs: BTreeMap::new(),
            current_sub: 0,
        };
        ctx.create_sub_ctx(host, 0)?;
        debug!("created context {id} ({name})");
        Ok(ctx)
    }

    pub fn report_error(&mut self, kind: ContextErrorKind, value: u32, op: &str) {
        error!(
            "context {} ({}): {kind:?} ({value}) in {op}",
            self.id, self.name
        );
        self.in_error = true;
        self.last_error = Some(kind);
    }

    /// Tear down every sub-context, each with its own GL context current.
    pub fn destroy(mut self, host: &Rc<Host>) {
        debug!("destroying context {}", self.id);
        let subs = std::mem::take(&mut self.sub_ctxs);
        for (_, sub) in subs.into_iter().rev() {
            destroy_sub(host, sub);
        }
    }

    // -----------------------------------------------------------------------
    // Sub-contexts
    // -----------------------------------------------------------------------

    pub fn create_sub_ctx(&mut self, host: &Rc<Host>, sub_id: u32) -> RendererResult<()> {
        if self.sub_ctxs.contains_key(&sub_id) {
            trace!("context {}: sub-context {sub_id} already exists", self.id);
            return Ok(());
        }
        let (major_ver, minor_ver) = host.version();
        let params = GlContextParams {
            shared: true,
            major_ver,
            minor_ver,
        };
        let gl_ctx = host.callbacks.create_gl_context(0, &params).ok_or_else(|| {
            warn!("context {}: no GL context for sub-context {sub_id}", self.id);
            RendererError::NoMem
        })?;
        if !host.make_current(gl_ctx) {
            host.callbacks.destroy_gl_context(gl_ctx);
            return Err(RendererError::NoMem);
        }
        self.sub_ctxs.insert(sub_id, SubContext::new(host, sub_id, gl_ctx));
        Ok(())
    }

    pub fn destroy_sub_ctx(&mut self, host: &Rc<Host>, sub_id: u32) {
        if sub_id == 0 {
            warn!("context {}: refusing to destroy sub-context 0", self.id);
            return;
        }
        if self.current_sub == sub_id {
            self.current_sub = 0;
        }
        if let Some(sub) = self.sub_ctxs.remove(&sub_id) {
            destroy_sub(host, sub);
        }
        self.make_current(host);
    }

    /// Select the sub-context later commands address. Its GL context is
    /// bound by the next command that reaches GL.
    pub fn set_sub_ctx(&mut self, sub_id: u32) {
        if !self.sub_ctxs.contains_key(&sub_id) {
            warn!("context {}: no sub-context {sub_id}", self.id);
            return;
        }
        self.current_sub = sub_id;
    }

    pub fn current_sub_id(&self) -> u32 {
        self.current_sub
    }

    pub fn sub_ids(&self) -> Vec<u32> {
        self.sub_ctxs.keys().copied().collect()
    }

    /// Make the current sub-context's GL context current.
    pub fn make_current(&self, host: &Host) -> bool {
        self.sub_ctxs
            .get(&self.current_sub)
            .is_some_and(|sub| host.make_current(sub.gl_ctx))
    }

    /// Make sub-context `sub_id` current, returning it.
    pub(crate) fn activate_sub(&mut self, host: &Host, sub_id: u32) -> Option<&mut SubContext> {
        let sub = self.sub_ctxs.get_mut(&sub_id)?;
        host.make_current(sub.gl_ctx).then_some(sub)
    }

    pub(crate) fn sub(&mut self) -> RendererResult<&mut SubContext> {
        self.sub_ctxs.get_mut(&self.current_sub).ok_or(RendererError::Inval)
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    pub fn attach_resource(&mut self, res: &Rc<Resource>) {
        self.attached.insert(res.handle, Rc::downgrade(res));
    }

    pub fn detach_resource(&mut self, handle: Handle) {
        self.attached.remove(&handle);
    }

    pub fn resource(&self, env: &Env<'_>, handle: Handle, op: &'static str) -> RendererResult<Rc<Resource>> {
        let res = if self.id == 0 {
            env.resources.get(handle).cloned()
        } else {
            self.attached.get(&handle).and_then(Weak::upgrade)
        };
        res.ok_or_else(|| RendererError::context(ContextErrorKind::IllegalResource, handle, op))
    }

    // -----------------------------------------------------------------------
    // Object creation
    // -----------------------------------------------------------------------

    pub fn create_surface(&mut self, env: &Env<'_>, args: &SurfaceArgs) -> RendererResult<()> {
        let res = self.resource(env, args.res_handle, "create_surface")?;
        let surf = Surface::new(args, res)?;
        self.sub()?
            .objects
            .insert(args.handle, Object::Surface(Rc::new(surf)), "create_surface")
    }

    pub fn create_sampler_view(&mut self, env: &Env<'_>, args: &SamplerViewArgs) -> RendererResult<()> {
        let res = self.resource(env, args.res_handle, "create_sampler_view")?;
        let view = SamplerView::new(env.host, args, res)?;
        self.sub()?
            .objects
            .insert(args.handle, Object::SamplerView(Rc::new(view)), "create_sampler_view")
    }

    pub fn create_sampler_state(&mut self, env: &Env<'_>, handle: Handle, desc: SamplerStateDesc) -> RendererResult<()> {
        let state = SamplerState::new(env.host, desc);
        self.sub()?
            .objects
            .insert(handle, Object::SamplerState(Rc::new(state)), "create_sampler_state")
    }

    /// Create a shader, or append a continuation packet to one.
    pub fn create_shader(&mut self, env: &Env<'_>, args: &ShaderCreateArgs, text: &str) -> RendererResult<()> {
        let sub = self.sub()?;
        if args.continuation {
            let sel = sub
                .objects
                .shader(args.handle)
                .ok_or_else(|| illegal_handle(args.handle, "create_shader"))?;
            return sel.append(args.handle, args.offset, text);
        }
        let sel = ShaderSelector::new(env.host, args, text)?;
        sub.objects
            .insert(args.handle, Object::Shader(Rc::new(sel)), "create_shader")
    }

    pub fn create_vertex_elements(
        &mut self,
        handle: Handle,
        elements: &[VertexElementDesc],
    ) -> RendererResult<()> {
        let ve = VertexElements::new(elements)?;
        self.sub()?
            .objects
            .insert(handle, Object::VertexElements(Rc::new(ve)), "create_vertex_elements")
    }

    pub fn create_so_target(&mut self, env: &Env<'_>, args: &StreamoutTargetArgs) -> RendererResult<()> {
        let res = self.resource(env, args.res_handle, "create_so_target")?;
        let target = StreamoutTarget {
            res,
            buffer_offset: args.buffer_offset,
            buffer_size: args.buffer_size,
        };
        self.sub()?
            .objects
            .insert(args.handle, Object::StreamoutTarget(Rc::new(target)), "create_so_target")
    }

    pub fn create_query(&mut self, env: &Env<'_>, args: &QueryCreateArgs) -> RendererResult<()> {
        let res = self.resource(env, args.res_handle, "create_query")?;
        let query = Query::new(env.host, args, res)?;
        self.sub()?
            .objects
            .insert(args.handle, Object::Query(Rc::new(query)), "create_query")
    }

    pub fn create_blend(&mut self, handle: Handle, state: BlendState) -> RendererResult<()> {
        self.sub()?
            .objects
            .insert(handle, Object::Blend(Rc::new(state)), "create_blend")
    }

    pub fn create_dsa(&mut self, handle: Handle, state: DsaState) -> RendererResult<()> {
        self.sub()?
            .objects
            .insert(handle, Object::Dsa(Rc::new(state)), "create_dsa")
    }

    pub fn create_rasterizer(&mut self, handle: Handle, state: RasterizerState) -> RendererResult<()> {
        self.sub()?
            .objects
            .insert(handle, Object::Rasterizer(Rc::new(state)), "create_rasterizer")
    }

    pub fn object_destroy(&mut self, obj_type: u32, handle: Handle) -> RendererResult<()> {
        let ty = ObjectType::from_raw(obj_type).ok_or_else(|| illegal_cmd(obj_type, "object_destroy"))?;
        let sub = self.sub()?;
        let obj = sub
            .objects
            .remove(ty, handle)
            .ok_or_else(|| illegal_handle(handle, "object_destroy"))?;
        match obj {
            Object::Shader(sel) => {
                sub.unbind_shader(&sel);
                drop(sel);
                sub.purge_programs();
            }
            Object::Query(query) => {
                if sub
                    .render_condition
                    .as_ref()
                    .is_some_and(|rc| Rc::ptr_eq(&rc.query, &query))
                {
                    sub.render_condition = None;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Bind a blend, depth-stencil-alpha or rasterizer object; handle 0 unbinds.
    pub fn bind_object(&mut self, obj_type: u32, handle: Handle) -> RendererResult<()> {
        let ty = ObjectType::from_raw(obj_type).ok_or_else(|| illegal_cmd(obj_type, "bind_object"))?;
        let sub = self.sub()?;
        macro_rules! lookup {
            ($get:ident) => {
                match handle {
                    0 => None,
                    h => Some(sub.objects.$get(h).ok_or_else(|| illegal_handle(h, "bind_object"))?),
                }
            };
        }
        match ty {
            ObjectType::Blend => {
                let blend = lookup!(blend);
                sub.bind_blend(blend);
            }
            ObjectType::Dsa => {
                let dsa = lookup!(dsa);
                sub.bind_dsa(dsa);
            }
            ObjectType::Rasterizer => {
                let rs = lookup!(rasterizer);
                sub.bind_rasterizer(rs);
            }
            _ => return Err(illegal_cmd(obj_type, "bind_object")),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pipeline state
    // -----------------------------------------------------------------------

    pub fn set_framebuffer_state(&mut self, cbufs: &[Handle], zsurf: Handle) -> RendererResult<()> {
        if cbufs.len() > MAX_COLOR_BUFS {
            return Err(illegal_cmd(cbufs.len() as u32, "set_framebuffer_state"));
        }
        let sub = self.sub()?;
        let surface = |h: Handle| -> RendererResult<Option<Rc<Surface>>> {
            match h {
                0 => Ok(None),
                h => sub
                    .objects
                    .surface(h)
                    .map(Some)
                    .ok_or_else(|| RendererError::context(ContextErrorKind::IllegalSurface, h, "set_framebuffer_state")),
            }
        };
        let zsurf = surface(zsurf)?;
        let cbufs = cbufs.iter().map(|&h| surface(h)).collect::<RendererResult<Vec<_>>>()?;
        sub.set_framebuffer(cbufs, zsurf);
        Ok(())
    }

    pub fn set_framebuffer_state_no_attach(
        &mut self,
        width: u32,
        height: u32,
        layers: u32,
        samples: u32,
    ) -> RendererResult<()> {
        self.sub()?.set_framebuffer_no_attach(NoAttachState {
            width,
            height,
            layers,
            samples,
        });
        Ok(())
    }

    pub fn set_viewport_states(&mut self, start: u32, viewports: &[Viewport]) -> RendererResult<()> {
        let start = check_range(start, viewports.len(), MAX_VIEWPORTS, "set_viewport_states")?;
        self.sub()?.set_viewports(start, viewports);
        Ok(())
    }

    pub fn set_scissor_state(&mut self, start: u32, scissors: &[Scissor]) -> RendererResult<()> {
        let start = check_range(start, scissors.len(), MAX_VIEWPORTS, "set_scissor_state")?;
        self.sub()?.set_scissors(start, scissors);
        Ok(())
    }

    pub fn bind_sampler_states(&mut self, shader: u32, start: u32, handles: &[Handle]) -> RendererResult<()> {
        let ty = stage(shader, "bind_sampler_states")?;
        let start = check_range(start, handles.len(), MAX_SHADER_SAMPLER_VIEWS, "bind_sampler_states")?;
        let sub = self.sub()?;
        for (i, &h) in handles.iter().enumerate() {
            let state = match h {
                0 => None,
                h => Some(
                    sub.objects
                        .sampler_state(h)
                        .ok_or_else(|| illegal_handle(h, "bind_sampler_states"))?,
                ),
            };
            sub.sampler_states[ty.index()][start + i] = state;
        }
        sub.dirty |= DirtyFlags::SAMPLERS;
        Ok(())
    }

    pub fn set_sampler_views(&mut self, shader: u32, start: u32, handles: &[Handle]) -> RendererResult<()> {
        let ty = stage(shader, "set_sampler_views")?;
        let start = check_range(start, handles.len(), MAX_SHADER_SAMPLER_VIEWS, "set_sampler_views")?;
        let sub = self.sub()?;
        for (i, &h) in handles.iter().enumerate() {
            let view = match h {
                0 => None,
                h => Some(
                    sub.objects
                        .sampler_view(h)
                        .ok_or_else(|| illegal_handle(h, "set_sampler_views"))?,
                ),
            };
            sub.views[ty.index()][start + i] = view;
        }
        sub.dirty |= DirtyFlags::SAMPLERS;
        Ok(())
    }

    pub fn set_single_image_view(
        &mut self,
        env: &Env<'_>,
        shader: u32,
        index: u32,
        args: &ImageViewArgs,
    ) -> RendererResult<()> {
        let ty = stage(shader, "set_shader_images")?;
        let index = check_range(index, 1, MAX_SHADER_IMAGES, "set_shader_images")?;
        let binding = match args.res_handle {
            0 => None,
            h => Some(ImageBinding {
                res: self.resource(env, h, "set_shader_images")?,
                format: args.format,
                access: args.access,
                u0: args.u0,
                u1: args.u1,
            }),
        };
        let sub = self.sub()?;
        sub.images[ty.index()][index] = binding;
        sub.dirty |= DirtyFlags::IMAGES;
        Ok(())
    }

    pub fn set_single_ssbo(
        &mut self,
        env: &Env<'_>,
        shader: u32,
        index: u32,
        offset: u32,
        size: u32,
        res_handle: Handle,
    ) -> RendererResult<()> {
        let ty = stage(shader, "set_shader_buffers")?;
        let index = check_range(index, 1, MAX_SHADER_BUFFERS, "set_shader_buffers")?;
        let binding = self.buffer_binding(env, res_handle, offset, size, "set_shader_buffers")?;
        let sub = self.sub()?;
        sub.ssbos[ty.index()][index] = binding;
        sub.dirty |= DirtyFlags::SSBO;
        Ok(())
    }

    pub fn set_uniform_buffer(
        &mut self,
        env: &Env<'_>,
        shader: u32,
        index: u32,
        offset: u32,
        size: u32,
        res_handle: Handle,
    ) -> RendererResult<()> {
        let ty = stage(shader, "set_uniform_buffer")?;
        let index = check_range(index, 1, MAX_CONST_BUFFERS, "set_uniform_buffer")?;
        let binding = self.buffer_binding(env, res_handle, offset, size, "set_uniform_buffer")?;
        let sub = self.sub()?;
        sub.ubos[ty.index()][index] = binding;
        sub.dirty |= DirtyFlags::UBO;
        Ok(())
    }

    fn buffer_binding(
        &self,
        env: &Env<'_>,
        res_handle: Handle,
        offset: u32,
        size: u32,
        op: &'static str,
    ) -> RendererResult<Option<BufferBinding>> {
        match res_handle {
            0 => Ok(None),
            h => Ok(Some(BufferBinding {
                res: self.resource(env, h, op)?,
                offset,
                size,
            })),
        }
    }

    pub fn set_constants(&mut self, shader: u32, data: &[u32]) -> RendererResult<()> {
        let ty = stage(shader, "set_constant_buffer")?;
        self.sub()?.set_constants(ty, data);
        Ok(())
    }

    pub fn set_index_buffer(
        &mut self,
        env: &Env<'_>,
        res_handle: Handle,
        index_size: u32,
        offset: u32,
    ) -> RendererResult<()> {
        let binding = match res_handle {
            0 => None,
            h => {
                if !matches!(index_size, 1 | 2 | 4) {
                    return Err(illegal_cmd(index_size, "set_index_buffer"));
                }
                let res = self.resource(env, h, "set_index_buffer")?;
                Some((
                    IndexBufferBinding {
                        handle: h,
                        index_size,
                        offset,
                    },
                    res,
                ))
            }
        };
        self.sub()?.index_buffer = binding;
        Ok(())
    }

    pub fn set_single_vbo(
        &mut self,
        env: &Env<'_>,
        index: u32,
        stride: u32,
        offset: u32,
        res_handle: Handle,
    ) -> RendererResult<()> {
        let index = check_range(index, 1, MAX_VERTEX_BUFFERS, "set_vertex_buffers")?;
        let binding = match res_handle {
            0 => None,
            h => Some((
                VertexBufferBinding {
                    stride,
                    buffer_offset: offset,
                    handle: h,
                },
                self.resource(env, h, "set_vertex_buffers")?,
            )),
        };
        self.sub()?.set_vertex_buffer(index, binding);
        Ok(())
    }

    pub fn set_num_vbo(&mut self, num: u32) -> RendererResult<()> {
        check_range(0, num as usize, MAX_VERTEX_BUFFERS, "set_vertex_buffers")?;
        self.sub()?.set_num_vbos(num as usize);
        Ok(())
    }

    pub fn bind_vertex_elements(&mut self, handle: Handle) -> RendererResult<()> {
        let sub = self.sub()?;
        let ve = match handle {
            0 => None,
            h => Some(
                sub.objects
                    .vertex_elements(h)
                    .ok_or_else(|| illegal_handle(h, "bind_vertex_elements"))?,
            ),
        };
        sub.bind_vertex_elements(ve);
        Ok(())
    }

    pub fn bind_shader(&mut self, handle: Handle, shader: u32) -> RendererResult<()> {
        let ty = stage(shader, "bind_shader")?;
        let sub = self.sub()?;
        let sel = match handle {
            0 => None,
            h => {
                let sel = sub.objects.shader(h).ok_or_else(|| illegal_handle(h, "bind_shader"))?;
                if sel.ty != ty {
                    return Err(RendererError::context(ContextErrorKind::IllegalShader, h, "bind_shader"));
                }
                Some(sel)
            }
        };
        sub.bind_shader(ty, handle, sel);
        Ok(())
    }

    pub fn set_blend_color(&mut self, color: [f32; 4]) -> RendererResult<()> {
        self.sub()?.set_blend_color(color);
        Ok(())
    }

    pub fn set_stencil_ref(&mut self, refs: [u8; 2]) -> RendererResult<()> {
        self.sub()?.set_stencil_ref(refs);
        Ok(())
    }

    pub fn set_clip_state(&mut self, clip: ClipState) -> RendererResult<()> {
        self.sub()?.set_clip_state(clip);
        Ok(())
    }

    pub fn set_sample_mask(&mut self, mask: u32) -> RendererResult<()> {
        self.sub()?.set_sample_mask(mask);
        Ok(())
    }

    pub fn set_min_samples(&mut self, samples: u32) -> RendererResult<()> {
        self.sub()?.set_min_samples(samples);
        Ok(())
    }

    pub fn set_polygon_stipple(&mut self, stipple: [u32; POLYGON_STIPPLE_ROWS]) -> RendererResult<()> {
        self.sub()?.set_polygon_stipple(stipple);
        Ok(())
    }

    pub fn set_tess_state(&mut self, outer: [f32; 4], inner: [f32; 2]) -> RendererResult<()> {
        self.sub()?.set_tess_state(outer, inner);
        Ok(())
    }

    pub fn set_streamout_targets(&mut self, env: &Env<'_>, append_bitmask: u32, handles: &[Handle]) -> RendererResult<()> {
        if handles.len() > MAX_SO_BUFFERS {
            return Err(illegal_cmd(handles.len() as u32, "set_streamout_targets"));
        }
        let host = env.host;
        let sub = self.sub()?;
        let targets = handles
            .iter()
            .filter(|&&h| h != 0)
            .map(|&h| {
                sub.objects
                    .streamout_target(h)
                    .ok_or_else(|| illegal_handle(h, "set_streamout_targets"))
            })
            .collect::<RendererResult<Vec<_>>>()?;

        if let Some(old) = sub.streamout.take() {
            if old.active {
                if let Some(tfb) = &old.tfb {
                    host.gl.bind_transform_feedback(tfb.id());
                }
                host.gl.end_transform_feedback();
            }
            if old.tfb.is_some() {
                host.gl.bind_transform_feedback(0);
            }
        }
        trace!("streamout targets {handles:?} append 0x{append_bitmask:x}");
        if !targets.is_empty() {
            let tfb = host
                .has(Feature::TransformFeedback2)
                .then(|| GlTransformFeedback::new(&host.gl));
            sub.streamout = Some(StreamoutState {
                targets,
                tfb,
                active: false,
                paused: false,
            });
        }
        sub.dirty |= DirtyFlags::STREAMOUT;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    fn optional_resource(&self, env: &Env<'_>, handle: Handle, op: &'static str) -> RendererResult<Option<Rc<Resource>>> {
        match handle {
            0 => Ok(None),
            h => self.resource(env, h, op).map(Some),
        }
    }

    pub fn draw_vbo(&mut self, env: &Env<'_>, info: &DrawInfo) -> RendererResult<()> {
        if self.in_error {
            return Ok(());
        }
        let indirect = self.optional_resource(env, info.indirect_handle, "draw_vbo")?;
        self.sub()?.draw_vbo(env.host, info, indirect)
    }

    pub fn launch_grid(&mut self, env: &Env<'_>, info: &GridInfo) -> RendererResult<()> {
        if self.in_error {
            return Ok(());
        }
        let indirect = self.optional_resource(env, info.indirect_handle, "launch_grid")?;
        self.sub()?.launch_grid(env.host, info, indirect)
    }

    pub fn clear(
        &mut self,
        env: &Env<'_>,
        buffers: u32,
        color: [u32; 4],
        depth: f64,
        stencil: u32,
    ) -> RendererResult<()> {
        if self.in_error {
            return Ok(());
        }
        let buffers = ClearFlags::from_bits_truncate(buffers);
        self.sub()?.clear(env.host, buffers, color, depth, stencil)
    }

    pub fn memory_barrier(&mut self, env: &Env<'_>, flags: u32) {
        let host = env.host;
        if host.has(Feature::Images) || host.has(Feature::Ssbo) {
            host.gl.memory_barrier(BarrierFlags::from_bits_truncate(flags).to_gl());
        }
    }

    pub fn texture_barrier(&mut self, env: &Env<'_>) {
        if env.host.has(Feature::TextureBarrier) {
            env.host.gl.texture_barrier();
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn query(&mut self, handle: Handle, op: &'static str) -> RendererResult<Rc<Query>> {
        self.sub()?.objects.query(handle).ok_or_else(|| illegal_handle(handle, op))
    }

    pub fn begin_query(&mut self, env: &Env<'_>, handle: Handle) -> RendererResult<()> {
        self.query(handle, "begin_query")?.begin(env.host)
    }

    pub fn end_query(&mut self, env: &Env<'_>, handle: Handle) -> RendererResult<()> {
        self.query(handle, "end_query")?.end(env.host);
        Ok(())
    }

    /// Store the result if available (always when `wait`). An unfinished
    /// query is returned so the caller can poll it later.
    pub fn get_query_result(&mut self, env: &Env<'_>, handle: Handle, wait: bool) -> RendererResult<Option<Rc<Query>>> {
        let query = self.query(handle, "get_query_result")?;
        if query.check(env.host, wait) {
            return Ok(None);
        }
        query.mark_waiting(env.host);
        Ok(Some(query))
    }

    pub fn render_condition(&mut self, env: &Env<'_>, handle: Handle, condition: bool, mode: u32) -> RendererResult<()> {
        let host = env.host;
        if !host.has(Feature::GlConditionalRender) {
            warn!("conditional rendering is not supported by the host");
            return Ok(());
        }
        let query = match handle {
            0 => None,
            h => Some(self.query(h, "render_condition")?),
        };
        let sub = self.sub()?;
        if sub.render_condition.take().is_some() {
            host.gl.end_conditional_render();
        }
        let Some(query) = query else {
            return Ok(());
        };
        let mode_enum = RenderCondMode::from_raw(mode).ok_or_else(|| illegal_cmd(mode, "render_condition"))?;
        host.gl
            .begin_conditional_render(query.query.id(), render_condition_mode(host, mode_enum, condition));
        sub.render_condition = Some(RenderCondition {
            query,
            condition,
            mode,
        });
        Ok(())
    }
}

/// Drop a sub-context with its GL context current, then release the context.
fn destroy_sub(host: &Rc<Host>, mut sub: SubContext) {
    let gl_ctx = sub.gl_ctx;
    if !host.make_current(gl_ctx) {
        warn!("sub-context {}: destroying without its GL context current", sub.id);
    }
    if let Some(so) = &sub.streamout {
        if so.active {
            host.gl.end_transform_feedback();
        }
    }
    if sub.render_condition.take().is_some() {
        host.gl.end_conditional_render();
    }
    let objects = sub.objects.clear();
    trace!("sub-context {}: dropping {} objects", sub.id, objects.len());
    drop(objects);
    drop(sub);
    host.release_current(gl_ctx);
    host.callbacks.destroy_gl_context(gl_ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mock_host;
    use pretty_assertions::assert_eq;

    #[test]
    fn viewport_range_checked() {
        let (host, _gl) = mock_host();
        let mut ctx = Context::new(&host, 1, "test").unwrap();
        let vps = [Viewport::default(); 2];
        assert!(ctx.set_viewport_states(14, &vps).is_ok());
        let err = ctx.set_viewport_states(15, &vps).unwrap_err();
        assert_eq!(err.kind(), Some(ContextErrorKind::IllegalCmdBuffer));
        let err = ctx.set_viewport_states(17, &[]).unwrap_err();
        assert_eq!(err.kind(), Some(ContextErrorKind::IllegalCmdBuffer));
        ctx.destroy(&host);
    }

    #[test]
    fn sub_context_zero_survives() {
        let (host, _gl) = mock_host();
        let mut ctx = Context::new(&host, 1, "test").unwrap();
        ctx.create_sub_ctx(&host, 3).unwrap();
        ctx.set_sub_ctx(3);
        assert_eq!(ctx.current_sub_id(), 3);

        ctx.destroy_sub_ctx(&host, 3);
        assert_eq!(ctx.current_sub_id(), 0);
        ctx.destroy_sub_ctx(&host, 0);
        assert_eq!(ctx.sub_ids(), vec![0]);

        // Unknown sub-contexts are ignored.
        ctx.set_sub_ctx(9);
        assert_eq!(ctx.current_sub_id(), 0);
        ctx.destroy(&host);
    }

    #[test]
    fn bind_unknown_object_is_an_error() {
        let (host, _gl) = mock_host();
        let mut ctx = Context::new(&host, 1, "test").unwrap();
        let err = ctx.bind_object(ObjectType::Blend as u32, 42).unwrap_err();
        assert_eq!(err.kind(), Some(ContextErrorKind::IllegalHandle));
        ctx.create_blend(42, BlendState::default()).unwrap();
        ctx.bind_object(ObjectType::Blend as u32, 42).unwrap();
        ctx.bind_object(ObjectType::Blend as u32, 0).unwrap();
        assert!(ctx.object_destroy(ObjectType::Blend as u32, 42).is_ok());
        assert!(ctx.object_destroy(ObjectType::Blend as u32, 42).is_err());
        ctx.destroy(&host);
    }
}
