//! Per-sub-context object tables and the auxiliary GL wrappers they hold.

use std::rc::Rc;

use gl::types::GLenum;
use tracing::debug;
use virgl_core::error::RendererResult;
use virgl_core::format::{self, FormatDesc, FormatFlags};
use virgl_core::pipe::{mag_filter_to_gl, min_filter_to_gl, ObjectType, Swizzle, TextureTarget};
use virgl_core::{ContextErrorKind, Handle, RendererError};
use virgl_gl::Feature;

use crate::arena::HandleTable;
use crate::gl_objects::GlSampler;
use crate::host::Host;
use crate::query::Query;
use crate::resource::{Resource, TexState, DECODE_EXT, SKIP_DECODE_EXT};
use crate::shader::ShaderSelector;
use crate::state::{BlendState, DsaState, RasterizerState, SamplerStateDesc, VertexElementDesc};

const TEXTURE_MAX_ANISOTROPY: GLenum = 0x84fe;

// ---------------------------------------------------------------------------
// Surfaces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceArgs {
    pub handle: Handle,
    pub res_handle: Handle,
    pub format: u32,
    /// Mip level for textures, first element for buffers.
    pub val0: u32,
    /// `first_layer | last_layer << 16` for textures, last element for buffers.
    pub val1: u32,
}

#[derive(Debug)]
pub(crate) struct Surface {
    pub res: Rc<Resource>,
    pub desc: &'static FormatDesc,
    pub level: u32,
    pub first_layer: u32,
    pub last_layer: u32,
}

impl Surface {
    pub fn new(args: &SurfaceArgs, res: Rc<Resource>) -> RendererResult<Self> {
        let desc = format::lookup(args.format).ok_or_else(|| {
            RendererError::context(ContextErrorKind::IllegalFormat, args.format, "create_surface")
        })?;
        Ok(Self {
            res,
            desc,
            level: args.val0,
            first_layer: args.val1 & 0xffff,
            last_layer: (args.val1 >> 16) & 0xffff,
        })
    }

    pub fn is_layered(&self) -> bool {
        self.first_layer != self.last_layer
    }
}

// ---------------------------------------------------------------------------
// Sampler views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerViewArgs {
    pub handle: Handle,
    pub res_handle: Handle,
    pub format: u32,
    /// Raw view target; must match the resource.
    pub target: u32,
    /// `first_layer | last_layer << 16`, or the first element of a buffer.
    pub val0: u32,
    /// `first_level | last_level << 8`, or the last element of a buffer.
    pub val1: u32,
    pub swizzle: [Swizzle; 4],
}

#[derive(Debug)]
pub(crate) struct SamplerView {
    pub res: Rc<Resource>,
    pub desc: &'static FormatDesc,
    pub gl_target: GLenum,
    pub first_level: u32,
    pub last_level: u32,
    pub first_element: u32,
    pub last_element: u32,
    pub tex_state: TexState,
}

impl SamplerView {
    pub fn new(host: &Host, args: &SamplerViewArgs, res: Rc<Resource>) -> RendererResult<Self> {
        let desc = format::lookup(args.format).ok_or_else(|| {
            RendererError::context(ContextErrorKind::IllegalFormat, args.format, "create_sampler_view")
        })?;
        let target = TextureTarget::from_raw(args.target).unwrap_or(res.target);
        if target != res.target && !(target.is_array() && res.target.is_array()) {
            return Err(RendererError::context(
                ContextErrorKind::IllegalSamplerViewTarget,
                args.target,
                "create_sampler_view",
            ));
        }

        let swizzle = args.swizzle.map(|s| view_swizzle(desc, s));
        let (first_level, last_level) = if res.is_buffer() {
            (0, 0)
        } else {
            (args.val1 & 0xff, (args.val1 >> 8) & 0xff)
        };
        let srgb_decode = if desc.is_srgb() || !res.desc.is_some_and(FormatDesc::is_srgb) {
            DECODE_EXT
        } else {
            // Linear view of sRGB storage.
            SKIP_DECODE_EXT
        };

        let view = Self {
            gl_target: res.gl_target,
            desc,
            first_level,
            last_level,
            first_element: if res.is_buffer() { args.val0 } else { 0 },
            last_element: if res.is_buffer() { args.val1 } else { 0 },
            tex_state: TexState {
                swizzle,
                base_level: first_level,
                max_level: last_level,
                srgb_decode,
            },
            res,
        };
        if view.res.is_buffer() {
            view.bind_buffer_range(host);
        }
        Ok(view)
    }

    fn bind_buffer_range(&self, host: &Host) {
        let (Some(tex), Some(buffer)) = (self.res.texture_id(), self.res.buffer_id()) else {
            return;
        };
        let gl = host.gl.as_ref();
        gl.bind_texture(gl::TEXTURE_BUFFER, tex);
        let elsize = self.desc.block_size.max(1) as usize;
        let first = self.first_element as usize * elsize;
        let size = (self.last_element.saturating_sub(self.first_element) as usize + 1) * elsize;
        if host.has(Feature::TextureBufferRange) && first + size <= self.res.width as usize {
            gl.tex_buffer_range(self.desc.internal_format, buffer, first, size);
        } else {
            gl.tex_buffer(self.desc.internal_format, buffer);
        }
    }

    /// Push this view's swizzle and level range into the texture object.
    pub fn apply(&self, host: &Host) {
        if !self.res.is_buffer() {
            self.res.update_tex_state(host.gl.as_ref(), self.tex_state);
        }
    }
}

fn view_swizzle(desc: &FormatDesc, swizzle: Swizzle) -> GLenum {
    let channel = match swizzle {
        Swizzle::Zero => return gl::ZERO,
        Swizzle::One => return gl::ONE,
        Swizzle::Red => 0,
        Swizzle::Green => 1,
        Swizzle::Blue => 2,
        Swizzle::Alpha => 3,
    };
    if desc.flags.contains(FormatFlags::NEED_SWIZZLE) {
        return desc.swizzle[channel];
    }
    if channel == 3 && !desc.has_alpha() && !desc.is_depth_stencil() && !desc.is_integer() {
        return gl::ONE;
    }
    swizzle.to_gl()
}

// ---------------------------------------------------------------------------
// Sampler states
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct SamplerState {
    pub desc: SamplerStateDesc,
    /// Sampler object when the host has them; otherwise the state is written
    /// to each texture at bind time.
    pub sampler: Option<GlSampler>,
}

impl SamplerState {
    pub fn new(host: &Host, desc: SamplerStateDesc) -> Self {
        let sampler = host.has(Feature::Samplers).then(|| {
            let sampler = GlSampler::new(&host.gl);
            Self::program(host, &desc, |pname, value| match value {
                Param::Int(v) => host.gl.sampler_parameter_i(sampler.id(), pname, v),
                Param::Float(v) => host.gl.sampler_parameter_f(sampler.id(), pname, v),
                Param::Color(v) => host.gl.sampler_parameter_fv(sampler.id(), pname, &v),
            });
            sampler
        });
        Self { desc, sampler }
    }

    /// Write the state onto the texture bound at `target`.
    pub fn apply_to_texture(&self, host: &Host, target: GLenum) {
        Self::program(host, &self.desc, |pname, value| match value {
            Param::Int(v) => host.gl.tex_parameter_i(target, pname, v),
            Param::Float(v) => host.gl.tex_parameter_f(target, pname, v),
            Param::Color(v) => host.gl.tex_parameter_fv(target, pname, &v),
        });
    }

    fn program(host: &Host, desc: &SamplerStateDesc, mut set: impl FnMut(GLenum, Param)) {
        set(gl::TEXTURE_WRAP_S, Param::Int(desc.wrap_s.to_gl() as i32));
        set(gl::TEXTURE_WRAP_T, Param::Int(desc.wrap_t.to_gl() as i32));
        set(gl::TEXTURE_WRAP_R, Param::Int(desc.wrap_r.to_gl() as i32));
        set(
            gl::TEXTURE_MIN_FILTER,
            Param::Int(min_filter_to_gl(desc.min_img_filter, desc.min_mip_filter) as i32),
        );
        set(gl::TEXTURE_MAG_FILTER, Param::Int(mag_filter_to_gl(desc.mag_img_filter) as i32));
        let compare = if desc.compare_mode {
            gl::COMPARE_REF_TO_TEXTURE
        } else {
            gl::NONE
        };
        set(gl::TEXTURE_COMPARE_MODE, Param::Int(compare as i32));
        set(gl::TEXTURE_COMPARE_FUNC, Param::Int(desc.compare_func.to_gl() as i32));
        if !host.is_gles() {
            set(gl::TEXTURE_LOD_BIAS, Param::Float(desc.lod_bias));
        }
        set(gl::TEXTURE_MIN_LOD, Param::Float(desc.min_lod));
        set(gl::TEXTURE_MAX_LOD, Param::Float(desc.max_lod));
        if desc.max_anisotropy > 0 {
            set(TEXTURE_MAX_ANISOTROPY, Param::Float(desc.max_anisotropy as f32));
        }
        if !host.is_gles() || host.caps.gles_ver() >= 32 {
            set(gl::TEXTURE_BORDER_COLOR, Param::Color(desc.border_color));
        }
    }
}

enum Param {
    Int(i32),
    Float(f32),
    Color([f32; 4]),
}

// ---------------------------------------------------------------------------
// Vertex elements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VertexElement {
    pub desc: VertexElementDesc,
    pub gl_type: GLenum,
    pub nr_chan: i32,
    pub normalized: bool,
    pub integer: bool,
}

#[derive(Debug)]
pub(crate) struct VertexElements {
    pub elements: Vec<VertexElement>,
}

impl VertexElements {
    pub fn new(elements: &[VertexElementDesc]) -> RendererResult<Self> {
        let elements = elements
            .iter()
            .map(|ve| {
                let desc = format::lookup(ve.src_format)
                    .filter(|d| d.flags.contains(FormatFlags::VERTEX))
                    .ok_or_else(|| {
                        debug!("vertex format {} not supported", ve.src_format);
                        RendererError::context(
                            ContextErrorKind::IllegalVertexFormat,
                            ve.src_format,
                            "create_vertex_elements",
                        )
                    })?;
                Ok(VertexElement {
                    desc: *ve,
                    gl_type: desc.gl_type,
                    nr_chan: desc.components as i32,
                    normalized: desc.flags.contains(FormatFlags::NORMALIZED),
                    integer: desc.is_integer(),
                })
            })
            .collect::<RendererResult<Vec<_>>>()?;
        Ok(Self { elements })
    }
}

// ---------------------------------------------------------------------------
// Stream-output targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamoutTargetArgs {
    pub handle: Handle,
    pub res_handle: Handle,
    pub buffer_offset: u32,
    pub buffer_size: u32,
}

#[derive(Debug)]
pub(crate) struct StreamoutTarget {
    pub res: Rc<Resource>,
    pub buffer_offset: u32,
    pub buffer_size: u32,
}

// ---------------------------------------------------------------------------
// Object table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) enum Object {
    Blend(Rc<BlendState>),
    Rasterizer(Rc<RasterizerState>),
    Dsa(Rc<DsaState>),
    Shader(Rc<ShaderSelector>),
    VertexElements(Rc<VertexElements>),
    SamplerView(Rc<SamplerView>),
    SamplerState(Rc<SamplerState>),
    Surface(Rc<Surface>),
    Query(Rc<Query>),
    StreamoutTarget(Rc<StreamoutTarget>),
}

impl Object {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Blend(_) => ObjectType::Blend,
            Object::Rasterizer(_) => ObjectType::Rasterizer,
            Object::Dsa(_) => ObjectType::Dsa,
            Object::Shader(_) => ObjectType::Shader,
            Object::VertexElements(_) => ObjectType::VertexElements,
            Object::SamplerView(_) => ObjectType::SamplerView,
            Object::SamplerState(_) => ObjectType::SamplerState,
            Object::Surface(_) => ObjectType::Surface,
            Object::Query(_) => ObjectType::Query,
            Object::StreamoutTarget(_) => ObjectType::StreamoutTarget,
        }
    }
}

const OBJECT_TYPES: usize = ObjectType::StreamoutTarget as usize + 1;

/// One handle namespace per object type.
#[derive(Debug, Default)]
pub(crate) struct ObjectTable {
    tables: [HandleTable<Object>; OBJECT_TYPES],
}

macro_rules! typed_lookup {
    ($fn:ident, $variant:ident, $ty:ty) => {
        pub fn $fn(&self, handle: Handle) -> Option<Rc<$ty>> {
            match self.get(ObjectType::$variant, handle)? {
                Object::$variant(obj) => Some(Rc::clone(obj)),
                _ => None,
            }
        }
    };
}

impl ObjectTable {
    pub fn insert(&mut self, handle: Handle, object: Object, op: &'static str) -> RendererResult<()> {
        let ty = object.object_type();
        self.tables[ty as usize]
            .insert(handle, object)
            .map(|_| ())
            .map_err(|_| RendererError::context(ContextErrorKind::IllegalHandle, handle, op))
    }

    pub fn get(&self, ty: ObjectType, handle: Handle) -> Option<&Object> {
        self.tables.get(ty as usize)?.get(handle)
    }

    pub fn remove(&mut self, ty: ObjectType, handle: Handle) -> Option<Object> {
        self.tables.get_mut(ty as usize)?.remove(handle)
    }

    pub fn len(&self) -> usize {
        self.tables.iter().map(HandleTable::len).sum()
    }

    /// Drop every object, queries last so their results stay reachable while
    /// the rest is torn down.
    pub fn clear(&mut self) -> Vec<Object> {
        let mut dropped = Vec::new();
        for table in self.tables.iter_mut() {
            dropped.extend(table.drain());
        }
        dropped.sort_by_key(|o| matches!(o, Object::Query(_)));
        dropped
    }

    typed_lookup!(blend, Blend, BlendState);
    typed_lookup!(rasterizer, Rasterizer, RasterizerState);
    typed_lookup!(dsa, Dsa, DsaState);
    typed_lookup!(shader, Shader, ShaderSelector);
    typed_lookup!(vertex_elements, VertexElements, VertexElements);
    typed_lookup!(sampler_view, SamplerView, SamplerView);
    typed_lookup!(sampler_state, SamplerState, SamplerState);
    typed_lookup!(surface, Surface, Surface);
    typed_lookup!(query, Query, Query);
    typed_lookup!(streamout_target, StreamoutTarget, StreamoutTarget);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use virgl_core::format::VirglFormat;

    #[test]
    fn namespaces_are_per_type() {
        let mut table = ObjectTable::default();
        table
            .insert(1, Object::Blend(Rc::new(BlendState::default())), "create_blend")
            .unwrap();
        table
            .insert(1, Object::Dsa(Rc::new(DsaState::default())), "create_dsa")
            .unwrap();
        let dup = table.insert(1, Object::Blend(Rc::new(BlendState::default())), "create_blend");
        assert_eq!(dup.unwrap_err().kind(), Some(ContextErrorKind::IllegalHandle));

        assert!(table.blend(1).is_some());
        assert!(table.rasterizer(1).is_none());
        assert_eq!(table.len(), 2);
        assert!(table.remove(ObjectType::Blend, 1).is_some());
        assert!(table.blend(1).is_none());
        assert!(table.dsa(1).is_some());
    }

    #[test]
    fn vertex_formats_checked() {
        let ok = VertexElementDesc {
            src_format: VirglFormat::R32G32B32A32_FLOAT as u32,
            ..Default::default()
        };
        let ve = VertexElements::new(&[ok]).unwrap();
        assert_eq!(ve.elements[0].nr_chan, 4);
        assert_eq!(ve.elements[0].gl_type, gl::FLOAT);
        assert!(!ve.elements[0].integer);

        let bad = VertexElementDesc {
            src_format: VirglFormat::DXT1_RGB as u32,
            ..Default::default()
        };
        let err = VertexElements::new(&[ok, bad]).unwrap_err();
        assert_eq!(err.kind(), Some(ContextErrorKind::IllegalVertexFormat));
    }

    #[test]
    fn alpha_swizzles() {
        let a8 = format::lookup(VirglFormat::A8_UNORM as u32).unwrap();
        let rgbx = format::lookup(VirglFormat::B8G8R8X8_UNORM as u32).unwrap();
        assert_eq!(view_swizzle(a8, Swizzle::Alpha), a8.swizzle[3]);
        assert_eq!(view_swizzle(rgbx, Swizzle::Alpha), gl::ONE);
        assert_eq!(view_swizzle(rgbx, Swizzle::Blue), gl::BLUE);
        assert_eq!(view_swizzle(rgbx, Swizzle::Zero), gl::ZERO);
    }
}
