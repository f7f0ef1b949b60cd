//! One host GL context's worth of guest pipeline state.
//!
//! Setters only record state and raise dirty bits; [`crate::draw`] turns the
//! dirty groups into GL calls right before work is submitted.

use std::rc::Rc;

use bitflags::bitflags;
use tracing::debug;
use virgl_core::limits::{
    MAX_COLOR_BUFS, MAX_CONST_BUFFERS, MAX_SHADER_BUFFERS, MAX_SHADER_IMAGES, MAX_SHADER_SAMPLER_VIEWS,
    MAX_VERTEX_BUFFERS, MAX_VIEWPORTS, POLYGON_STIPPLE_ROWS,
};
use virgl_core::pipe::{ShaderType, SHADER_TYPES};

use crate::callbacks::GlContextHandle;
use crate::gl_objects::{GlFramebuffer, GlTexture, GlTransformFeedback, GlVertexArray};
use crate::host::Host;
use crate::objects::{ObjectTable, SamplerState, SamplerView, StreamoutTarget, Surface, VertexElements};
use crate::program::{LinkedProgram, ProgramCache};
use crate::query::Query;
use crate::resource::Resource;
use crate::shader::{ShaderSelector, ShaderVariant};
use crate::state::{
    BlendState, ClipState, DsaState, IndexBufferBinding, RasterizerState, Scissor, VertexBufferBinding, Viewport,
};

bitflags! {
    /// State groups that need re-emission before the next draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct DirtyFlags: u32 {
        const VIEWPORT = 1 << 0;
        const SCISSOR = 1 << 1;
        const SHADER = 1 << 2;
        const VERTEX_BUFFERS = 1 << 3;
        const SAMPLERS = 1 << 4;
        const CONSTANTS = 1 << 5;
        const UBO = 1 << 6;
        const SSBO = 1 << 7;
        const IMAGES = 1 << 8;
        const STENCIL_REF = 1 << 9;
        const BLEND = 1 << 10;
        const RASTERIZER = 1 << 11;
        const DSA = 1 << 12;
        const FRAMEBUFFER = 1 << 13;
        const FRONT_FACE = 1 << 14;
        const STREAMOUT = 1 << 15;
        const BLEND_COLOR = 1 << 16;
        const CLIP = 1 << 17;
        const SAMPLE_MASK = 1 << 18;
        const MIN_SAMPLES = 1 << 19;
        const POLY_STIPPLE = 1 << 20;
        const TESS = 1 << 21;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BufferBinding {
    pub res: Rc<Resource>,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct ImageBinding {
    pub res: Rc<Resource>,
    pub format: u32,
    /// `PIPE_IMAGE_ACCESS_*` bits: 1 read, 2 write.
    pub access: u32,
    /// Level and layer range for textures, offset and size for buffers.
    pub u0: u32,
    pub u1: u32,
}

#[derive(Debug)]
pub(crate) struct StreamoutState {
    pub targets: Vec<Rc<StreamoutTarget>>,
    pub tfb: Option<GlTransformFeedback>,
    pub active: bool,
    pub paused: bool,
}

/// Framebuffer-less rendering extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct NoAttachState {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub samples: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct RenderCondition {
    pub query: Rc<Query>,
    pub condition: bool,
    pub mode: u32,
}

type PerStage<T> = [T; SHADER_TYPES];

pub(crate) struct SubContext {
    pub id: u32,
    pub gl_ctx: GlContextHandle,
    pub objects: ObjectTable,
    pub dirty: DirtyFlags,

    pub viewports: [Viewport; MAX_VIEWPORTS],
    pub viewport_dirty: u32,
    pub scissors: [Scissor; MAX_VIEWPORTS],
    pub scissor_dirty: u32,

    pub fb: GlFramebuffer,
    pub blit_fbos: [GlFramebuffer; 2],
    pub vao: Option<GlVertexArray>,
    pub cbufs: [Option<Rc<Surface>>; MAX_COLOR_BUFS],
    pub nr_cbufs: usize,
    pub zsurf: Option<Rc<Surface>>,
    pub no_attach: Option<NoAttachState>,
    /// The bound framebuffer stores rows top-down.
    pub fb_y_0_top: bool,
    pub fb_height: u32,

    pub blend: Option<Rc<BlendState>>,
    pub dsa: Option<Rc<DsaState>>,
    pub rasterizer: Option<Rc<RasterizerState>>,
    pub blend_color: [f32; 4],
    pub stencil_ref: [u8; 2],
    pub sample_mask: u32,
    pub min_samples: u32,
    pub clip: ClipState,
    pub poly_stipple: [u32; POLYGON_STIPPLE_ROWS],
    /// 32x32 mask sampled by the stipple emulation in the fragment shader.
    pub pstipple_tex: Option<GlTexture>,
    pub tess_outer: [f32; 4],
    pub tess_inner: [f32; 2],

    pub shaders: PerStage<Option<Rc<ShaderSelector>>>,
    pub shader_handles: PerStage<u32>,
    pub variants: PerStage<Option<Rc<ShaderVariant>>>,
    pub program: Option<Rc<LinkedProgram>>,
    pub programs: ProgramCache,
    /// Primitive of the last draw; point sprites change the fragment key.
    pub last_prim_is_points: bool,

    pub views: PerStage<[Option<Rc<SamplerView>>; MAX_SHADER_SAMPLER_VIEWS]>,
    pub sampler_states: PerStage<[Option<Rc<SamplerState>>; MAX_SHADER_SAMPLER_VIEWS]>,
    pub consts: PerStage<Vec<u32>>,
    pub ubos: PerStage<[Option<BufferBinding>; MAX_CONST_BUFFERS]>,
    pub ssbos: PerStage<[Option<BufferBinding>; MAX_SHADER_BUFFERS]>,
    pub images: PerStage<[Option<ImageBinding>; MAX_SHADER_IMAGES]>,

    pub vertex_elements: Option<Rc<VertexElements>>,
    pub vbos: [Option<(VertexBufferBinding, Rc<Resource>)>; MAX_VERTEX_BUFFERS],
    pub num_vbos: usize,
    pub index_buffer: Option<(IndexBufferBinding, Rc<Resource>)>,
    pub enabled_attribs: u32,

    pub streamout: Option<StreamoutState>,
    pub render_condition: Option<RenderCondition>,
}

impl std::fmt::Debug for SubContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubContext")
            .field("id", &self.id)
            .field("gl_ctx", &self.gl_ctx)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl SubContext {
    /// Build the state for a sub-context whose GL context is current.
    pub fn new(host: &Host, id: u32, gl_ctx: GlContextHandle) -> Self {
        let vao = host.caps.core_profile.then(|| {
            let vao = GlVertexArray::new(&host.gl);
            host.gl.bind_vertex_array(vao.id());
            vao
        });
        debug!("sub-context {id} on {gl_ctx:?}");
        Self {
            id,
            gl_ctx,
            objects: ObjectTable::default(),
            dirty: DirtyFlags::all(),
            viewports: Default::default(),
            viewport_dirty: 0,
            scissors: Default::default(),
            scissor_dirty: 0,
            fb: GlFramebuffer::new(&host.gl),
            blit_fbos: [GlFramebuffer::new(&host.gl), GlFramebuffer::new(&host.gl)],
            vao,
            cbufs: Default::default(),
            nr_cbufs: 0,
            zsurf: None,
            no_attach: None,
            fb_y_0_top: false,
            fb_height: 0,
            blend: None,
            dsa: None,
            rasterizer: None,
            blend_color: [0.0; 4],
            stencil_ref: [0; 2],
            sample_mask: !0,
            min_samples: 1,
            clip: ClipState::default(),
            poly_stipple: [!0; POLYGON_STIPPLE_ROWS],
            pstipple_tex: None,
            tess_outer: [1.0; 4],
            tess_inner: [1.0; 2],
            shaders: Default::default(),
            shader_handles: [0; SHADER_TYPES],
            variants: Default::default(),
            program: None,
            programs: ProgramCache::default(),
            last_prim_is_points: false,
            views: Default::default(),
            sampler_states: Default::default(),
            consts: Default::default(),
            ubos: Default::default(),
            ssbos: Default::default(),
            images: Default::default(),
            vertex_elements: None,
            vbos: Default::default(),
            num_vbos: 0,
            index_buffer: None,
            enabled_attribs: 0,
            streamout: None,
            render_condition: None,
        }
    }

    // -- state setters ------------------------------------------------------

    pub fn set_viewports(&mut self, start: usize, viewports: &[Viewport]) {
        for (i, vp) in viewports.iter().enumerate() {
            let slot = start + i;
            if self.viewports[slot] != *vp {
                self.viewports[slot] = *vp;
                self.viewport_dirty |= 1 << slot;
            }
        }
        if self.viewport_dirty != 0 {
            self.dirty |= DirtyFlags::VIEWPORT;
        }
    }

    pub fn set_scissors(&mut self, start: usize, scissors: &[Scissor]) {
        for (i, sc) in scissors.iter().enumerate() {
            let slot = start + i;
            if self.scissors[slot] != *sc {
                self.scissors[slot] = *sc;
                self.scissor_dirty |= 1 << slot;
            }
        }
        if self.scissor_dirty != 0 {
            self.dirty |= DirtyFlags::SCISSOR;
        }
    }

    pub fn bind_blend(&mut self, blend: Option<Rc<BlendState>>) {
        self.blend = blend;
        // Dual-source blending is part of the program key.
        self.dirty |= DirtyFlags::BLEND | DirtyFlags::SHADER;
    }

    pub fn bind_dsa(&mut self, dsa: Option<Rc<DsaState>>) {
        self.dsa = dsa;
        // Alpha test is emulated in the fragment shader.
        self.dirty |= DirtyFlags::DSA | DirtyFlags::STENCIL_REF | DirtyFlags::SHADER;
    }

    pub fn bind_rasterizer(&mut self, rs: Option<Rc<RasterizerState>>) {
        self.rasterizer = rs;
        self.dirty |= DirtyFlags::RASTERIZER
            | DirtyFlags::FRONT_FACE
            | DirtyFlags::SCISSOR
            | DirtyFlags::SHADER
            | DirtyFlags::CLIP;
        self.scissor_dirty = (1 << MAX_VIEWPORTS) - 1;
    }

    pub fn set_blend_color(&mut self, color: [f32; 4]) {
        if self.blend_color != color {
            self.blend_color = color;
            self.dirty |= DirtyFlags::BLEND_COLOR;
        }
    }

    pub fn set_stencil_ref(&mut self, refs: [u8; 2]) {
        if self.stencil_ref != refs {
            self.stencil_ref = refs;
            self.dirty |= DirtyFlags::STENCIL_REF;
        }
    }

    pub fn set_clip_state(&mut self, clip: ClipState) {
        if self.clip != clip {
            self.clip = clip;
            self.dirty |= DirtyFlags::CLIP;
        }
    }

    pub fn set_sample_mask(&mut self, mask: u32) {
        if self.sample_mask != mask {
            self.sample_mask = mask;
            self.dirty |= DirtyFlags::SAMPLE_MASK;
        }
    }

    pub fn set_min_samples(&mut self, samples: u32) {
        if self.min_samples != samples {
            self.min_samples = samples;
            self.dirty |= DirtyFlags::MIN_SAMPLES;
        }
    }

    pub fn set_polygon_stipple(&mut self, stipple: [u32; POLYGON_STIPPLE_ROWS]) {
        self.poly_stipple = stipple;
        self.dirty |= DirtyFlags::POLY_STIPPLE;
    }

    pub fn set_tess_state(&mut self, outer: [f32; 4], inner: [f32; 2]) {
        self.tess_outer = outer;
        self.tess_inner = inner;
        self.dirty |= DirtyFlags::TESS;
    }

    pub fn set_constants(&mut self, stage: ShaderType, data: &[u32]) {
        let consts = &mut self.consts[stage.index()];
        if consts.as_slice() != data {
            consts.clear();
            consts.extend_from_slice(data);
            self.dirty |= DirtyFlags::CONSTANTS;
        }
    }

    pub fn bind_shader(&mut self, stage: ShaderType, handle: u32, sel: Option<Rc<ShaderSelector>>) {
        self.shader_handles[stage.index()] = handle;
        self.shaders[stage.index()] = sel;
        self.dirty |= DirtyFlags::SHADER;
    }

    pub fn bind_vertex_elements(&mut self, ve: Option<Rc<VertexElements>>) {
        self.vertex_elements = ve;
        self.dirty |= DirtyFlags::VERTEX_BUFFERS;
    }

    pub fn set_vertex_buffer(&mut self, index: usize, binding: Option<(VertexBufferBinding, Rc<Resource>)>) {
        self.vbos[index] = binding;
        self.num_vbos = self.num_vbos.max(index + 1);
        self.dirty |= DirtyFlags::VERTEX_BUFFERS;
    }

    pub fn set_num_vbos(&mut self, num: usize) {
        for slot in self.vbos.iter_mut().skip(num) {
            *slot = None;
        }
        self.num_vbos = num;
        self.dirty |= DirtyFlags::VERTEX_BUFFERS;
    }

    pub fn set_framebuffer(&mut self, cbufs: Vec<Option<Rc<Surface>>>, zsurf: Option<Rc<Surface>>) {
        self.nr_cbufs = cbufs.len();
        self.cbufs = Default::default();
        for (slot, surf) in self.cbufs.iter_mut().zip(cbufs) {
            *slot = surf;
        }
        self.zsurf = zsurf;
        self.no_attach = None;

        let first = self.cbufs.iter().flatten().next().or(self.zsurf.as_ref());
        let (y_0_top, height) = first.map_or((false, 0), |s| (s.res.y_0_top(), s.res.level_height(s.level)));
        if y_0_top != self.fb_y_0_top || height != self.fb_height {
            self.fb_y_0_top = y_0_top;
            self.fb_height = height;
            // Both depend on the origin of the render target.
            self.viewport_dirty = (1 << MAX_VIEWPORTS) - 1;
            self.scissor_dirty = (1 << MAX_VIEWPORTS) - 1;
            self.dirty |= DirtyFlags::VIEWPORT | DirtyFlags::SCISSOR | DirtyFlags::FRONT_FACE;
        }
        // Fragment keys depend on the colour buffer formats.
        self.dirty |= DirtyFlags::FRAMEBUFFER | DirtyFlags::SHADER | DirtyFlags::BLEND;
    }

    pub fn set_framebuffer_no_attach(&mut self, state: NoAttachState) {
        self.set_framebuffer(Vec::new(), None);
        self.no_attach = Some(state);
        self.fb_height = state.height;
    }

    /// Drop the bindings of a destroyed shader.
    pub fn unbind_shader(&mut self, sel: &Rc<ShaderSelector>) {
        for stage in 0..SHADER_TYPES {
            if self.shaders[stage].as_ref().is_some_and(|s| Rc::ptr_eq(s, sel)) {
                self.shaders[stage] = None;
                self.shader_handles[stage] = 0;
                self.variants[stage] = None;
                self.program = None;
                self.dirty |= DirtyFlags::SHADER;
            }
        }
    }

    pub fn purge_programs(&mut self) {
        let dropped = self.programs.purge();
        if dropped > 0 {
            debug!("sub-context {}: dropped {dropped} programs", self.id);
        }
    }
}
