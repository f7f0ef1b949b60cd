//! Dirty-state flush and work submission.
//!
//! The flush runs in a fixed order: framebuffer, front face, stencil,
//! scissor, viewport, blend, the remaining fixed-function groups, shader
//! selection and linking, shader resources, vertex input. Each step clears
//! only the bits it handles.

use std::rc::Rc;

use gl::types::GLenum;
use tracing::{debug, trace, warn};
use virgl_core::error::RendererResult;
use virgl_core::format::{self, FormatDesc, FormatFlags};
use virgl_core::limits::{MAX_COLOR_BUFS, MAX_VIEWPORTS};
use virgl_core::pipe::{BlendFactor, ClearFlags, CullFace, PrimType, ShaderType, TextureTarget, SHADER_TYPES};
use virgl_core::{ContextErrorKind, RendererError};
use virgl_gl::Feature;
use virgl_shader::ShaderKey;

use crate::gl_objects::GlTexture;
use crate::host::Host;
use crate::objects::Surface;
use crate::program::{clip_uniform, LinkedProgram, ProgramKey};
use crate::resource::Resource;
use crate::shader::ShaderVariant;
use crate::state::{RasterizerState, RtBlendState};
use crate::sub_context::{DirtyFlags, SubContext};

/// One `draw_vbo` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawInfo {
    pub start: u32,
    pub count: u32,
    pub mode: u32,
    pub start_instance: u32,
    pub instance_count: u32,
    pub index_bias: i32,
    pub min_index: u32,
    pub max_index: u32,
    pub indexed: bool,
    pub primitive_restart: bool,
    pub restart_index: u32,
    pub vertices_per_patch: u32,
    /// Resource holding indirect draw parameters, 0 for a direct draw.
    pub indirect_handle: u32,
    pub indirect_offset: u32,
}

/// One `launch_grid` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridInfo {
    pub block: [u32; 3],
    pub grid: [u32; 3],
    pub indirect_handle: u32,
    pub indirect_offset: u32,
}

fn illegal_cmd(value: u32, op: &'static str) -> RendererError {
    RendererError::context(ContextErrorKind::IllegalCmdBuffer, value, op)
}

// ---------------------------------------------------------------------------
// Framebuffer
// ---------------------------------------------------------------------------

/// Attach `surf` to `attachment` of the framebuffer bound at `target`.
pub(crate) fn attach_surface(host: &Host, target: GLenum, attachment: GLenum, surf: &Surface) {
    let gl = host.gl.as_ref();
    let res = &surf.res;
    let Some(tex) = res.texture_id() else {
        return;
    };
    let level = surf.level as i32;
    if surf.is_layered() {
        gl.framebuffer_texture(target, attachment, tex, level);
    } else if res.target == TextureTarget::Cube {
        let face = gl::TEXTURE_CUBE_MAP_POSITIVE_X + surf.first_layer;
        gl.framebuffer_texture_2d(target, attachment, face, tex, level);
    } else if matches!(
        res.target,
        TextureTarget::Texture3D
            | TextureTarget::Texture1DArray
            | TextureTarget::Texture2DArray
            | TextureTarget::CubeArray
    ) {
        gl.framebuffer_texture_layer(target, attachment, tex, level, surf.first_layer as i32);
    } else {
        gl.framebuffer_texture_2d(target, attachment, res.gl_target, tex, level);
    }
}

/// Blend factor rewrite for render targets whose format lacks a real alpha
/// channel.
fn patch_factor(factor: BlendFactor, desc: Option<&FormatDesc>, color: bool) -> BlendFactor {
    let Some(desc) = desc else {
        return factor;
    };
    if desc.is_alpha_only() && color {
        return match factor {
            BlendFactor::SrcAlpha => BlendFactor::SrcColor,
            BlendFactor::DstAlpha => BlendFactor::DstColor,
            BlendFactor::InvSrcAlpha => BlendFactor::InvSrcColor,
            BlendFactor::InvDstAlpha => BlendFactor::InvDstColor,
            other => other,
        };
    }
    if !desc.has_alpha() && !desc.is_alpha_only() {
        return match factor {
            BlendFactor::DstAlpha => BlendFactor::One,
            BlendFactor::InvDstAlpha => BlendFactor::Zero,
            other => other,
        };
    }
    factor
}

/// `rt` adjusted to the colour buffer it blends into.
pub(crate) fn patch_blend(rt: &RtBlendState, desc: Option<&FormatDesc>) -> RtBlendState {
    let mut out = *rt;
    if desc.is_some_and(FormatDesc::is_alpha_only) {
        // Alpha lives in the red channel.
        out.rgb_func = rt.alpha_func;
        out.rgb_src_factor = patch_factor(rt.alpha_src_factor, desc, true);
        out.rgb_dst_factor = patch_factor(rt.alpha_dst_factor, desc, true);
        out.colormask = if rt.colormask & 0x8 != 0 { 0x1 } else { 0 };
        return out;
    }
    out.rgb_src_factor = patch_factor(rt.rgb_src_factor, desc, true);
    out.rgb_dst_factor = patch_factor(rt.rgb_dst_factor, desc, true);
    out.alpha_src_factor = patch_factor(rt.alpha_src_factor, desc, false);
    out.alpha_dst_factor = patch_factor(rt.alpha_dst_factor, desc, false);
    out
}

fn enable(host: &Host, cap: GLenum, on: bool) {
    if on {
        host.gl.enable(cap);
    } else {
        host.gl.disable(cap);
    }
}

impl SubContext {
    fn cbuf_desc(&self, i: usize) -> Option<&'static FormatDesc> {
        self.cbufs.get(i)?.as_ref().map(|s| s.desc)
    }

    fn fb_samples(&self) -> u32 {
        self.cbufs
            .iter()
            .flatten()
            .chain(self.zsurf.as_ref())
            .next()
            .map_or_else(|| self.no_attach.map_or(0, |n| n.samples), |s| s.res.nr_samples)
    }

    fn emit_framebuffer(&mut self, host: &Host) {
        let gl = host.gl.as_ref();
        gl.bind_framebuffer(gl::FRAMEBUFFER, self.fb.id());

        let mut draw_buffers = Vec::with_capacity(self.nr_cbufs);
        let mut srgb = false;
        for i in 0..MAX_COLOR_BUFS {
            let attachment = gl::COLOR_ATTACHMENT0 + i as u32;
            match &self.cbufs[i] {
                Some(surf) => {
                    attach_surface(host, gl::FRAMEBUFFER, attachment, surf);
                    srgb |= surf.desc.is_srgb();
                    draw_buffers.push(attachment);
                }
                None => {
                    gl.framebuffer_texture_2d(gl::FRAMEBUFFER, attachment, gl::TEXTURE_2D, 0, 0);
                    if i < self.nr_cbufs {
                        draw_buffers.push(gl::NONE);
                    }
                }
            }
        }

        for attachment in [gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT] {
            gl.framebuffer_texture_2d(gl::FRAMEBUFFER, attachment, gl::TEXTURE_2D, 0, 0);
        }
        if let Some(zsurf) = &self.zsurf {
            attach_surface(host, gl::FRAMEBUFFER, zsurf.desc.attachment(), zsurf);
        }

        if let Some(na) = self.no_attach {
            if host.has(Feature::FbNoAttach) {
                gl.framebuffer_parameter_i(gl::FRAMEBUFFER, gl::FRAMEBUFFER_DEFAULT_WIDTH, na.width as i32);
                gl.framebuffer_parameter_i(gl::FRAMEBUFFER, gl::FRAMEBUFFER_DEFAULT_HEIGHT, na.height as i32);
                if !host.is_gles() || host.caps.gles_ver() >= 32 {
                    gl.framebuffer_parameter_i(gl::FRAMEBUFFER, gl::FRAMEBUFFER_DEFAULT_LAYERS, na.layers as i32);
                }
                gl.framebuffer_parameter_i(gl::FRAMEBUFFER, gl::FRAMEBUFFER_DEFAULT_SAMPLES, na.samples as i32);
            } else {
                warn!("framebuffer without attachments is not supported by the host");
            }
        }

        gl.draw_buffers(&draw_buffers);
        if !host.is_gles() {
            enable(host, gl::FRAMEBUFFER_SRGB, srgb);
        }
        let status = gl.check_framebuffer_status(gl::FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE && (self.nr_cbufs > 0 || self.zsurf.is_some()) {
            warn!("sub-context {}: framebuffer incomplete: 0x{status:04x}", self.id);
        }
    }

    // -----------------------------------------------------------------------
    // Fixed function
    // -----------------------------------------------------------------------

    fn rasterizer_state(&self) -> RasterizerState {
        self.rasterizer.as_deref().copied().unwrap_or_default()
    }

    fn emit_front_face(&self, host: &Host) {
        let ccw = self.rasterizer_state().front_ccw != self.fb_y_0_top;
        host.gl.front_face(if ccw { gl::CCW } else { gl::CW });
    }

    fn emit_stencil(&self, host: &Host) {
        let gl = host.gl.as_ref();
        let dsa = self.dsa.as_deref().copied().unwrap_or_default();
        let front = dsa.stencil[0];
        let back = if dsa.stencil[1].enabled { dsa.stencil[1] } else { front };
        enable(host, gl::STENCIL_TEST, front.enabled);
        for (face, st, reference) in [
            (gl::FRONT, front, self.stencil_ref[0]),
            (gl::BACK, back, if dsa.stencil[1].enabled { self.stencil_ref[1] } else { self.stencil_ref[0] }),
        ] {
            gl.stencil_func_separate(face, st.func.to_gl(), reference as i32, st.valuemask as u32);
        }
        if self.dirty.contains(DirtyFlags::DSA) {
            for (face, st) in [(gl::FRONT, front), (gl::BACK, back)] {
                gl.stencil_op_separate(face, st.fail_op.to_gl(), st.zfail_op.to_gl(), st.zpass_op.to_gl());
                gl.stencil_mask_separate(face, st.writemask as u32);
            }
            enable(host, gl::DEPTH_TEST, dsa.depth_enabled);
            gl.depth_func(dsa.depth_func.to_gl());
            gl.depth_mask(dsa.depth_writemask);
        }
    }

    fn emit_scissors(&mut self, host: &Host) {
        let gl = host.gl.as_ref();
        let indexed = host.has(Feature::ViewportArray);
        for slot in 0..MAX_VIEWPORTS {
            if self.scissor_dirty & (1 << slot) == 0 || (!indexed && slot > 0) {
                continue;
            }
            let sc = self.scissors[slot];
            let (width, height) = (sc.maxx.saturating_sub(sc.minx), sc.maxy.saturating_sub(sc.miny));
            let y = if self.fb_y_0_top {
                self.fb_height.saturating_sub(sc.maxy)
            } else {
                sc.miny
            };
            if indexed {
                gl.scissor_indexed(slot as u32, sc.minx as i32, y as i32, width as i32, height as i32);
            } else {
                gl.scissor(sc.minx as i32, y as i32, width as i32, height as i32);
            }
        }
        self.scissor_dirty = 0;
    }

    fn emit_viewports(&mut self, host: &Host) {
        let gl = host.gl.as_ref();
        let indexed = host.has(Feature::ViewportArray);
        for slot in 0..MAX_VIEWPORTS {
            if self.viewport_dirty & (1 << slot) == 0 || (!indexed && slot > 0) {
                continue;
            }
            let mut vp = self.viewports[slot].to_gl();
            if self.fb_y_0_top {
                vp.y = self.fb_height as f32 - vp.y - vp.height;
            }
            if indexed {
                gl.viewport_indexed(slot as u32, vp.x, vp.y, vp.width, vp.height);
                gl.depth_range_indexed(slot as u32, vp.near as f64, vp.far as f64);
            } else {
                gl.viewport(vp.x as i32, vp.y as i32, vp.width as i32, vp.height as i32);
                gl.depth_range(vp.near as f64, vp.far as f64);
            }
        }
        self.viewport_dirty = 0;
    }

    fn emit_blend(&self, host: &Host) {
        let gl = host.gl.as_ref();
        let blend = self.blend.as_deref().copied().unwrap_or_default();

        if blend.independent_blend_enable && host.has(Feature::IndepBlend) {
            for i in 0..MAX_COLOR_BUFS {
                let rt = patch_blend(&blend.rt[i], self.cbuf_desc(i));
                let buf = i as u32;
                if rt.blend_enable {
                    gl.enable_i(gl::BLEND, buf);
                    if host.has(Feature::IndepBlendFunc) {
                        gl.blend_func_separate_i(
                            buf,
                            rt.rgb_src_factor.to_gl(),
                            rt.rgb_dst_factor.to_gl(),
                            rt.alpha_src_factor.to_gl(),
                            rt.alpha_dst_factor.to_gl(),
                        );
                        gl.blend_equation_separate_i(buf, rt.rgb_func.to_gl(), rt.alpha_func.to_gl());
                    }
                } else {
                    gl.disable_i(gl::BLEND, buf);
                }
                gl.color_mask_i(buf, rt.colormask_bools());
            }
        } else {
            let rt = patch_blend(&blend.rt[0], self.cbuf_desc(0));
            enable(host, gl::BLEND, rt.blend_enable);
            if rt.blend_enable {
                gl.blend_func_separate(
                    rt.rgb_src_factor.to_gl(),
                    rt.rgb_dst_factor.to_gl(),
                    rt.alpha_src_factor.to_gl(),
                    rt.alpha_dst_factor.to_gl(),
                );
                gl.blend_equation_separate(rt.rgb_func.to_gl(), rt.alpha_func.to_gl());
            }
            gl.color_mask(rt.colormask_bools());
        }

        if !host.is_gles() {
            enable(host, gl::COLOR_LOGIC_OP, blend.logicop_enable);
            if blend.logicop_enable {
                gl.logic_op(virgl_core::pipe::logic_op_to_gl(blend.logicop_func));
            }
            enable(host, gl::SAMPLE_ALPHA_TO_ONE, blend.alpha_to_one);
        }
        enable(host, gl::DITHER, blend.dither);
        enable(host, gl::SAMPLE_ALPHA_TO_COVERAGE, blend.alpha_to_coverage);
    }

    fn emit_rasterizer(&self, host: &Host) {
        let gl = host.gl.as_ref();
        let rs = self.rasterizer_state();

        if !host.is_gles() {
            if rs.fill_front != rs.fill_back {
                debug!("separate front/back polygon modes collapse to the front mode");
            }
            gl.polygon_mode(gl::FRONT_AND_BACK, rs.fill_front.to_gl());
            enable(host, gl::DEPTH_CLAMP, !rs.depth_clip);
            enable(host, gl::PROGRAM_POINT_SIZE, rs.point_size_per_vertex);
            enable(host, gl::MULTISAMPLE, rs.multisample);
            enable(host, gl::LINE_SMOOTH, rs.line_smooth);
            enable(host, gl::POLYGON_SMOOTH, rs.poly_smooth);
            enable(host, gl::POLYGON_OFFSET_LINE, rs.offset_line);
            enable(host, gl::POLYGON_OFFSET_POINT, rs.offset_point);
            gl.provoking_vertex(if rs.flatshade_first {
                gl::FIRST_VERTEX_CONVENTION
            } else {
                gl::LAST_VERTEX_CONVENTION
            });
            gl.point_size(rs.point_size);
        }

        match rs.cull_face {
            CullFace::None => gl.disable(gl::CULL_FACE),
            face => {
                gl.enable(gl::CULL_FACE);
                gl.cull_face(match face {
                    CullFace::Front => gl::FRONT,
                    CullFace::Back => gl::BACK,
                    _ => gl::FRONT_AND_BACK,
                });
            }
        }

        gl.line_width(rs.line_width);
        enable(host, gl::POLYGON_OFFSET_FILL, rs.offset_tri);
        if rs.offset_tri || rs.offset_line || rs.offset_point {
            if rs.offset_clamp != 0.0 && host.has(Feature::PolygonOffsetClamp) {
                gl.polygon_offset_clamp(rs.offset_scale, rs.offset_units, rs.offset_clamp);
            } else {
                gl.polygon_offset(rs.offset_scale, rs.offset_units);
            }
        }
        enable(host, gl::SCISSOR_TEST, rs.scissor);
        enable(host, gl::RASTERIZER_DISCARD, rs.rasterizer_discard);
        if host.has(Feature::SampleShading) {
            enable(host, gl::SAMPLE_SHADING, rs.force_persample_interp || self.min_samples > 1);
        }
        for i in 0..8 {
            enable(host, gl::CLIP_DISTANCE0 + i, rs.clip_plane_enable & (1 << i) != 0);
        }
    }

    fn emit_poly_stipple(&mut self, host: &Rc<Host>) {
        let gl = host.gl.as_ref();
        let tex = self.pstipple_tex.get_or_insert_with(|| GlTexture::new(&host.gl));
        let mut texels = vec![0u8; 32 * 32];
        for (row, bits) in self.poly_stipple.iter().enumerate() {
            for col in 0..32 {
                // Cleared bits are discarded by the fragment shader.
                if bits & (1 << (31 - col)) == 0 {
                    texels[row * 32 + col] = 0xff;
                }
            }
        }
        gl.bind_texture(gl::TEXTURE_2D, tex.id());
        gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);
        gl.tex_image_2d(gl::TEXTURE_2D, 0, gl::R8, 32, 32, gl::RED, gl::UNSIGNED_BYTE, Some(&texels));
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::REPEAT as i32);
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::REPEAT as i32);
        gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 4);
    }

    fn emit_fixed_function(&mut self, host: &Rc<Host>) {
        let gl = host.gl.as_ref();
        if self.dirty.contains(DirtyFlags::BLEND_COLOR) {
            gl.blend_color(self.blend_color);
        }
        if self.dirty.contains(DirtyFlags::SAMPLE_MASK) && host.has(Feature::SampleMask) {
            enable(host, gl::SAMPLE_MASK, self.sample_mask != !0);
            gl.sample_mask_i(0, self.sample_mask);
        }
        if self.dirty.contains(DirtyFlags::MIN_SAMPLES) && host.has(Feature::SampleShading) {
            let samples = self.fb_samples().max(1);
            gl.min_sample_shading((self.min_samples as f32 / samples as f32).min(1.0));
        }
        if self.dirty.contains(DirtyFlags::TESS) && host.has(Feature::Tessellation) && !host.is_gles() {
            gl.patch_parameter_fv(gl::PATCH_DEFAULT_OUTER_LEVEL, &self.tess_outer);
            gl.patch_parameter_fv(gl::PATCH_DEFAULT_INNER_LEVEL, &self.tess_inner);
        }
        if self.dirty.contains(DirtyFlags::POLY_STIPPLE) {
            self.emit_poly_stipple(host);
        }
        self.dirty -= DirtyFlags::BLEND_COLOR
            | DirtyFlags::SAMPLE_MASK
            | DirtyFlags::MIN_SAMPLES
            | DirtyFlags::TESS
            | DirtyFlags::POLY_STIPPLE;
    }

    // -----------------------------------------------------------------------
    // Shaders
    // -----------------------------------------------------------------------

    fn shader_key(&self, stage: ShaderType) -> ShaderKey {
        let rs = self.rasterizer_state();
        let dsa = self.dsa.as_deref().copied().unwrap_or_default();
        let present = |ty: ShaderType| self.shaders[ty.index()].is_some();
        let mut key = ShaderKey {
            gs_present: present(ShaderType::Geometry),
            tcs_present: present(ShaderType::TessCtrl),
            tes_present: present(ShaderType::TessEval),
            color_two_side: rs.light_twoside,
            flatshade: rs.flatshade,
            ..Default::default()
        };

        let prev = match stage {
            ShaderType::TessCtrl => Some(ShaderType::Vertex),
            ShaderType::TessEval if present(ShaderType::TessCtrl) => Some(ShaderType::TessCtrl),
            ShaderType::TessEval => Some(ShaderType::Vertex),
            ShaderType::Geometry if present(ShaderType::TessEval) => Some(ShaderType::TessEval),
            ShaderType::Geometry => Some(ShaderType::Vertex),
            ShaderType::Fragment => [ShaderType::Geometry, ShaderType::TessEval, ShaderType::Vertex]
                .into_iter()
                .find(|ty| present(*ty)),
            _ => None,
        };
        if let Some(prev) = prev.and_then(|ty| self.variants[ty.index()].as_ref()) {
            key.prev_stage_pervertex_out = prev.info.has_pervertex_out;
            key.prev_stage_num_clip_out = prev.info.num_clip_out as u8;
            key.prev_stage_num_cull_out = prev.info.num_cull_out as u8;
            key.num_indirect_generic_inputs = prev.info.num_indirect_generic_outputs as u8;
            key.num_indirect_patch_inputs = prev.info.num_indirect_patch_outputs as u8;
        }

        let last_vertex_stage = [ShaderType::Geometry, ShaderType::TessEval, ShaderType::Vertex]
            .into_iter()
            .find(|ty| present(*ty));
        if Some(stage) == last_vertex_stage {
            key.clip_plane_enable = rs.clip_plane_enable != 0;
        }

        if stage == ShaderType::Fragment {
            key.invert_fs_origin = !self.fb_y_0_top;
            key.coord_replace = if rs.point_quad_rasterization {
                rs.sprite_coord_enable as u8
            } else {
                0
            };
            key.pstipple_tex = rs.poly_stipple_enable;
            key.add_alpha_test = dsa.alpha_enabled;
            key.alpha_test = dsa.alpha_func;
            key.alpha_ref_val = dsa.alpha_ref_value;
            key.fs_prim_is_points = self.last_prim_is_points;
            for (i, surf) in self.cbufs.iter().enumerate() {
                let Some(desc) = surf.as_ref().map(|s| s.desc) else {
                    continue;
                };
                if desc.is_alpha_only() {
                    key.cbufs_are_a8_bitmask |= 1 << i;
                }
                if desc.flags.contains(FormatFlags::SINT) {
                    key.cbufs_signed_int_bitmask |= 1 << i;
                }
                if desc.flags.contains(FormatFlags::UINT) {
                    key.cbufs_unsigned_int_bitmask |= 1 << i;
                }
            }
        }
        key
    }

    /// Select every bound stage's variant and make the matching program
    /// current. `Ok(false)` drops the draw.
    fn update_shaders(&mut self, host: &Rc<Host>, compute: bool) -> RendererResult<bool> {
        let stages: &[ShaderType] = if compute {
            &[ShaderType::Compute]
        } else {
            &[
                ShaderType::Vertex,
                ShaderType::TessCtrl,
                ShaderType::TessEval,
                ShaderType::Geometry,
                ShaderType::Fragment,
            ]
        };

        let mut selected: [Option<Rc<ShaderVariant>>; SHADER_TYPES] = Default::default();
        for &ty in stages {
            let Some(sel) = self.shaders[ty.index()].clone() else {
                self.variants[ty.index()] = None;
                continue;
            };
            let key = if compute { ShaderKey::default() } else { self.shader_key(ty) };
            let variant = sel.select(host, self.shader_handles[ty.index()], &key).map_err(|e| {
                self.variants[ty.index()] = None;
                e
            })?;
            self.variants[ty.index()] = Some(Rc::clone(&variant));
            selected[ty.index()] = Some(variant);
        }

        if compute {
            if selected[ShaderType::Compute.index()].is_none() {
                debug!("sub-context {}: dispatch without a compute shader", self.id);
                return Ok(false);
            }
        } else if selected[ShaderType::Vertex.index()].is_none() || selected[ShaderType::Fragment.index()].is_none() {
            debug!("sub-context {}: draw without vertex or fragment shader", self.id);
            return Ok(false);
        }
        if selected[ShaderType::TessEval.index()].is_some()
            && selected[ShaderType::TessCtrl.index()].is_none()
            && host.is_gles()
        {
            return Err(RendererError::context(ContextErrorKind::GlesHaveTesButMissTcs, 0, "draw_vbo"));
        }

        let dual_src = !compute && self.blend.as_ref().is_some_and(|b| b.uses_dual_source());
        let key = ProgramKey::new(&selected, dual_src);
        if self.program.as_ref().is_some_and(|p| p.key == key) {
            return Ok(true);
        }
        self.purge_programs();
        let program = match self.programs.lookup(&key) {
            Some(program) => program,
            None => {
                let flatshade = self.rasterizer_state().flatshade;
                let linked = LinkedProgram::link(host, &selected, dual_src, flatshade).ok_or_else(|| {
                    RendererError::context(ContextErrorKind::IllegalShader, self.shader_handles[0], "link_program")
                })?;
                self.programs.insert(linked)
            }
        };
        trace!("sub-context {}: using program {}", self.id, program.id());
        host.gl.use_program(program.id());
        self.program = Some(program);
        self.dirty |= DirtyFlags::SAMPLERS
            | DirtyFlags::CONSTANTS
            | DirtyFlags::UBO
            | DirtyFlags::SSBO
            | DirtyFlags::IMAGES
            | DirtyFlags::CLIP;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Shader resources
    // -----------------------------------------------------------------------

    fn emit_samplers(&self, host: &Host, program: &LinkedProgram) {
        let gl = host.gl.as_ref();
        let mut unit = 0;
        for ty in ShaderType::ALL {
            for s in &program.stages[ty.index()].samplers {
                let slot = s.slot as usize;
                gl.active_texture(unit);
                match self.views[ty.index()].get(slot).and_then(Option::as_ref) {
                    Some(view) => {
                        let Some(tex) = view.res.texture_id() else {
                            unit += 1;
                            continue;
                        };
                        gl.bind_texture(view.gl_target, tex);
                        view.apply(host);
                        match self.sampler_states[ty.index()].get(slot).and_then(Option::as_ref) {
                            Some(state) => match &state.sampler {
                                Some(sampler) => gl.bind_sampler(unit, sampler.id()),
                                None => state.apply_to_texture(host, view.gl_target),
                            },
                            None if host.has(Feature::Samplers) => gl.bind_sampler(unit, 0),
                            None => {}
                        }
                        if let Some((mask_loc, add_loc)) = s.shadow {
                            let (mask, add) = shadow_swizzle(view.tex_state.swizzle);
                            gl.uniform_4fv(mask_loc, &mask);
                            gl.uniform_4fv(add_loc, &add);
                        }
                    }
                    None => gl.bind_texture(gl::TEXTURE_2D, 0),
                }
                unit += 1;
            }
        }
        if let (Some(loc), Some(tex)) = (program.pstipple_loc, &self.pstipple_tex) {
            gl.active_texture(unit);
            gl.bind_texture(gl::TEXTURE_2D, tex.id());
            if host.has(Feature::Samplers) {
                gl.bind_sampler(unit, 0);
            }
            gl.uniform_1i(loc, unit as i32);
        }
        gl.active_texture(0);
    }

    fn emit_constants(&self, host: &Host, program: &LinkedProgram) {
        for ty in ShaderType::ALL {
            let Some(loc) = program.stages[ty.index()].const_loc else {
                continue;
            };
            let Some(variant) = &self.variants[ty.index()] else {
                continue;
            };
            let wanted = variant.info.num_consts as usize * 4;
            let consts = &self.consts[ty.index()];
            let n = consts.len().min(wanted) / 4 * 4;
            if n > 0 {
                host.gl.uniform_4uiv(loc, &consts[..n]);
            }
        }
    }

    fn emit_ubos(&self, host: &Host, program: &LinkedProgram) {
        for ty in ShaderType::ALL {
            for &(slot, binding) in &program.stages[ty.index()].ubos {
                let Some(ubo) = self.ubos[ty.index()].get(slot as usize).and_then(Option::as_ref) else {
                    continue;
                };
                if let Some(id) = ubo.res.buffer_id() {
                    host.gl.bind_buffer_range(gl::UNIFORM_BUFFER, binding, id, ubo.offset as usize, ubo.size as usize);
                }
            }
        }
    }

    fn emit_ssbos(&self, host: &Host, program: &LinkedProgram) {
        for ty in ShaderType::ALL {
            for &(slot, binding) in &program.stages[ty.index()].ssbos {
                let Some(ssbo) = self.ssbos[ty.index()].get(slot as usize).and_then(Option::as_ref) else {
                    continue;
                };
                if let Some(id) = ssbo.res.buffer_id() {
                    host.gl.bind_buffer_range(
                        gl::SHADER_STORAGE_BUFFER,
                        binding,
                        id,
                        ssbo.offset as usize,
                        ssbo.size as usize,
                    );
                }
            }
        }
    }

    fn emit_images(&self, host: &Host, program: &LinkedProgram) {
        if !host.has(Feature::Images) {
            return;
        }
        for ty in ShaderType::ALL {
            for &(slot, unit) in &program.stages[ty.index()].images {
                let Some(image) = self.images[ty.index()].get(slot as usize).and_then(Option::as_ref) else {
                    continue;
                };
                let (Some(tex), Some(desc)) = (image.res.texture_id(), format::lookup(image.format)) else {
                    continue;
                };
                let access = match image.access & 0x3 {
                    1 => gl::READ_ONLY,
                    2 => gl::WRITE_ONLY,
                    _ => gl::READ_WRITE,
                };
                let (level, layered, layer) = if image.res.is_buffer() {
                    (0, false, 0)
                } else {
                    let first = image.u0 & 0xffff;
                    let last = image.u0 >> 16;
                    let layered = image.res.target.is_array()
                        || image.res.target == TextureTarget::Texture3D
                        || image.res.target.is_cube();
                    (image.u1 as i32, layered && first != last, first as i32)
                };
                host.gl
                    .bind_image_texture(unit as u32, tex, level, layered, layer, access, desc.internal_format);
            }
        }
    }

    fn emit_uniforms(&self, host: &Host, program: &LinkedProgram) {
        if let Some(loc) = program.clip_loc {
            host.gl.uniform_4fv(loc, &clip_uniform(&self.clip.ucp));
        }
        if let Some(loc) = program.winsys_adjust_y_loc {
            host.gl.uniform_1f(loc, if self.fb_y_0_top { -1.0 } else { 1.0 });
        }
    }

    // -----------------------------------------------------------------------
    // Vertex input
    // -----------------------------------------------------------------------

    fn emit_vertex_buffers(&mut self, host: &Host) {
        let gl = host.gl.as_ref();
        if let Some(vao) = &self.vao {
            gl.bind_vertex_array(vao.id());
        }
        let mut enabled = 0u32;
        if let Some(ve) = self.vertex_elements.clone() {
            for (i, el) in ve.elements.iter().enumerate() {
                let index = i as u32;
                let Some((vb, res)) = self.vbos.get(el.desc.vertex_buffer_index as usize).and_then(Option::as_ref)
                else {
                    continue;
                };
                let Some(id) = res.buffer_id() else {
                    continue;
                };
                gl.bind_buffer(gl::ARRAY_BUFFER, id);
                let offset = (vb.buffer_offset + el.desc.src_offset) as usize;
                if el.integer {
                    gl.vertex_attrib_i_pointer(index, el.nr_chan, el.gl_type, vb.stride as i32, offset);
                } else {
                    gl.vertex_attrib_pointer(index, el.nr_chan, el.gl_type, el.normalized, vb.stride as i32, offset);
                }
                gl.vertex_attrib_divisor(index, el.desc.instance_divisor);
                gl.enable_vertex_attrib_array(index);
                enabled |= 1 << i;
            }
        }
        let stale = self.enabled_attribs & !enabled;
        for i in 0..32 {
            if stale & (1 << i) != 0 {
                gl.disable_vertex_attrib_array(i);
            }
        }
        self.enabled_attribs = enabled;
    }

    fn emit_streamout(&mut self, host: &Host) {
        let gl = host.gl.as_ref();
        let Some(so) = &self.streamout else {
            return;
        };
        if let Some(tfb) = &so.tfb {
            gl.bind_transform_feedback(tfb.id());
        }
        for (i, target) in so.targets.iter().enumerate() {
            if let Some(id) = target.res.buffer_id() {
                gl.bind_buffer_range(
                    gl::TRANSFORM_FEEDBACK_BUFFER,
                    i as u32,
                    id,
                    target.buffer_offset as usize,
                    target.buffer_size as usize,
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Flush
    // -----------------------------------------------------------------------

    /// Emit every dirty group. `Ok(false)` means the work must be skipped.
    pub(crate) fn flush_state(&mut self, host: &Rc<Host>, compute: bool) -> RendererResult<bool> {
        if !compute {
            if self.dirty.contains(DirtyFlags::FRAMEBUFFER) {
                self.emit_framebuffer(host);
                self.dirty -= DirtyFlags::FRAMEBUFFER;
            }
            if self.dirty.contains(DirtyFlags::FRONT_FACE) {
                self.emit_front_face(host);
                self.dirty -= DirtyFlags::FRONT_FACE;
            }
            if self.dirty.intersects(DirtyFlags::STENCIL_REF | DirtyFlags::DSA) {
                self.emit_stencil(host);
                self.dirty -= DirtyFlags::STENCIL_REF | DirtyFlags::DSA;
            }
            if self.dirty.contains(DirtyFlags::SCISSOR) {
                self.emit_scissors(host);
                self.dirty -= DirtyFlags::SCISSOR;
            }
            if self.dirty.contains(DirtyFlags::VIEWPORT) {
                self.emit_viewports(host);
                self.dirty -= DirtyFlags::VIEWPORT;
            }
            if self.dirty.contains(DirtyFlags::BLEND) {
                self.emit_blend(host);
                self.dirty -= DirtyFlags::BLEND;
            }
            if self.dirty.contains(DirtyFlags::RASTERIZER) {
                self.emit_rasterizer(host);
                self.dirty -= DirtyFlags::RASTERIZER;
            }
            self.emit_fixed_function(host);
        }

        if self.dirty.contains(DirtyFlags::SHADER) || self.program.is_none() || compute {
            let ok = self.update_shaders(host, compute)?;
            if !ok {
                return Ok(false);
            }
            // Graphics and compute share the program binding.
            if !compute {
                self.dirty -= DirtyFlags::SHADER;
            } else {
                self.dirty |= DirtyFlags::SHADER;
            }
        }
        let Some(program) = self.program.clone() else {
            return Ok(false);
        };

        if self.dirty.contains(DirtyFlags::SAMPLERS) {
            self.emit_samplers(host, &program);
        }
        if self.dirty.contains(DirtyFlags::CONSTANTS) {
            self.emit_constants(host, &program);
        }
        if self.dirty.contains(DirtyFlags::UBO) {
            self.emit_ubos(host, &program);
        }
        if self.dirty.contains(DirtyFlags::SSBO) {
            self.emit_ssbos(host, &program);
        }
        if self.dirty.contains(DirtyFlags::IMAGES) {
            self.emit_images(host, &program);
        }
        if self.dirty.contains(DirtyFlags::CLIP) {
            self.emit_uniforms(host, &program);
        }
        self.dirty -= DirtyFlags::SAMPLERS
            | DirtyFlags::CONSTANTS
            | DirtyFlags::UBO
            | DirtyFlags::SSBO
            | DirtyFlags::IMAGES
            | DirtyFlags::CLIP;

        if !compute {
            if self.dirty.contains(DirtyFlags::STREAMOUT) {
                self.emit_streamout(host);
                self.dirty -= DirtyFlags::STREAMOUT;
            }
            if self.dirty.contains(DirtyFlags::VERTEX_BUFFERS) {
                self.emit_vertex_buffers(host);
                self.dirty -= DirtyFlags::VERTEX_BUFFERS;
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    pub(crate) fn draw_vbo(
        &mut self,
        host: &Rc<Host>,
        info: &DrawInfo,
        indirect: Option<Rc<Resource>>,
    ) -> RendererResult<()> {
        let prim = PrimType::from_raw(info.mode).ok_or_else(|| illegal_cmd(info.mode, "draw_vbo"))?;
        if prim == PrimType::Quads && host.caps.core_profile {
            warn!("quads are not available on a core profile host");
        }
        // Rejections happen before any state or transform feedback is touched.
        if info.indexed && self.index_buffer.is_none() {
            debug!("sub-context {}: indexed draw without an index buffer", self.id);
            return Ok(());
        }
        if indirect.is_some() && !host.has(Feature::IndirectDraw) {
            return Err(illegal_cmd(info.indirect_handle, "draw_vbo"));
        }
        let points = prim == PrimType::Points;
        if points != self.last_prim_is_points {
            self.last_prim_is_points = points;
            self.dirty |= DirtyFlags::SHADER;
        }
        if !self.flush_state(host, false)? {
            return Ok(());
        }

        let gl = host.gl.as_ref();
        let mode = prim.to_gl();
        if prim == PrimType::Patches && info.vertices_per_patch > 0 {
            gl.patch_parameter_i(gl::PATCH_VERTICES, info.vertices_per_patch as i32);
        }

        if info.primitive_restart {
            if host.is_gles() {
                gl.enable(gl::PRIMITIVE_RESTART_FIXED_INDEX);
            } else {
                gl.enable(gl::PRIMITIVE_RESTART);
                gl.primitive_restart_index(info.restart_index);
            }
        } else if host.is_gles() {
            gl.disable(gl::PRIMITIVE_RESTART_FIXED_INDEX);
        } else {
            gl.disable(gl::PRIMITIVE_RESTART);
        }

        if let Some(so) = self.streamout.as_mut() {
            if !so.targets.is_empty() {
                if !so.active {
                    gl.begin_transform_feedback(match prim {
                        PrimType::Points => gl::POINTS,
                        PrimType::Lines | PrimType::LineLoop | PrimType::LineStrip => gl::LINES,
                        _ => gl::TRIANGLES,
                    });
                    so.active = true;
                } else if so.paused {
                    gl.resume_transform_feedback();
                    so.paused = false;
                }
            }
        }

        let index_type = match &self.index_buffer {
            Some((ib, res)) if info.indexed => {
                if let Some(id) = res.buffer_id() {
                    gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, id);
                }
                let ty = match ib.index_size {
                    1 => gl::UNSIGNED_BYTE,
                    2 => gl::UNSIGNED_SHORT,
                    _ => gl::UNSIGNED_INT,
                };
                Some((ty, ib.offset as usize + info.start as usize * ib.index_size as usize))
            }
            _ => None,
        };

        if let Some(indirect) = indirect {
            if let Some(id) = indirect.buffer_id() {
                gl.bind_buffer(gl::DRAW_INDIRECT_BUFFER, id);
            }
            let offset = info.indirect_offset as usize;
            match index_type {
                Some((ty, _)) => gl.draw_elements_indirect(mode, ty, offset),
                None => gl.draw_arrays_indirect(mode, offset),
            }
        } else {
            let count = info.count as i32;
            let instances = info.instance_count.max(1) as i32;
            match index_type {
                None if instances == 1 && info.start_instance == 0 => {
                    gl.draw_arrays(mode, info.start as i32, count);
                }
                None if info.start_instance > 0 && host.has(Feature::BaseInstance) => {
                    gl.draw_arrays_instanced_base_instance(
                        mode,
                        info.start as i32,
                        count,
                        instances,
                        info.start_instance,
                    );
                }
                None => gl.draw_arrays_instanced(mode, info.start as i32, count, instances),
                Some((ty, offset)) if instances > 1 => {
                    gl.draw_elements_instanced_base_vertex(mode, count, ty, offset, instances, info.index_bias);
                }
                Some((ty, offset)) if info.max_index > info.min_index => {
                    gl.draw_range_elements_base_vertex(
                        mode,
                        info.min_index,
                        info.max_index,
                        count,
                        ty,
                        offset,
                        info.index_bias,
                    );
                }
                Some((ty, offset)) => gl.draw_elements_base_vertex(mode, count, ty, offset, info.index_bias),
            }
        }

        if let Some(so) = self.streamout.as_mut() {
            if so.active && host.has(Feature::TransformFeedback2) {
                gl.pause_transform_feedback();
                so.paused = true;
            }
        }
        Ok(())
    }

    pub(crate) fn launch_grid(
        &mut self,
        host: &Rc<Host>,
        info: &GridInfo,
        indirect: Option<Rc<Resource>>,
    ) -> RendererResult<()> {
        if !host.has(Feature::ComputeShader) {
            return Err(illegal_cmd(0, "launch_grid"));
        }
        if !self.flush_state(host, true)? {
            return Ok(());
        }
        // The next draw has to rebind its graphics program.
        self.program = None;
        match indirect.and_then(|r| r.buffer_id()) {
            Some(id) => {
                host.gl.bind_buffer(gl::DISPATCH_INDIRECT_BUFFER, id);
                host.gl.dispatch_compute_indirect(info.indirect_offset as usize);
            }
            None => host.gl.dispatch_compute(info.grid[0], info.grid[1], info.grid[2]),
        }
        Ok(())
    }

    /// Clear the bound framebuffer. `color` carries the raw bits, read as
    /// floats or integers depending on each buffer's format.
    pub(crate) fn clear(
        &mut self,
        host: &Rc<Host>,
        buffers: ClearFlags,
        color: [u32; 4],
        depth: f64,
        stencil: u32,
    ) -> RendererResult<()> {
        if self.dirty.contains(DirtyFlags::FRAMEBUFFER) {
            self.emit_framebuffer(host);
            self.dirty -= DirtyFlags::FRAMEBUFFER;
        }
        if self.dirty.contains(DirtyFlags::SCISSOR) {
            self.emit_scissors(host);
            self.dirty -= DirtyFlags::SCISSOR;
        }
        if self.dirty.contains(DirtyFlags::VIEWPORT) {
            self.emit_viewports(host);
            self.dirty -= DirtyFlags::VIEWPORT;
        }

        let gl = host.gl.as_ref();
        let rs = self.rasterizer_state();
        if rs.rasterizer_discard {
            gl.disable(gl::RASTERIZER_DISCARD);
        }
        enable(host, gl::SCISSOR_TEST, rs.scissor);

        let mut mask = 0;
        if buffers.intersects(ClearFlags::COLOR) {
            let fcolor = color.map(f32::from_bits);
            let all_color = (0..self.nr_cbufs).all(|i| {
                buffers.bits() & (ClearFlags::COLOR0.bits() << i) != 0
                    && !self.cbuf_desc(i).is_some_and(FormatDesc::is_integer)
            });
            if all_color {
                gl.color_mask([true; 4]);
                gl.clear_color(fcolor);
                mask |= gl::COLOR_BUFFER_BIT;
            } else {
                for i in 0..self.nr_cbufs {
                    if buffers.bits() & (ClearFlags::COLOR0.bits() << i) == 0 {
                        continue;
                    }
                    let Some(desc) = self.cbuf_desc(i) else {
                        continue;
                    };
                    if host.has(Feature::IndepBlend) {
                        gl.color_mask_i(i as u32, [true; 4]);
                    } else {
                        gl.color_mask([true; 4]);
                    }
                    if desc.flags.contains(FormatFlags::SINT) {
                        gl.clear_buffer_iv(gl::COLOR, i as i32, &color.map(|c| c as i32));
                    } else if desc.flags.contains(FormatFlags::UINT) {
                        gl.clear_buffer_uiv(gl::COLOR, i as i32, &color);
                    } else {
                        gl.clear_buffer_fv(gl::COLOR, i as i32, &fcolor);
                    }
                }
            }
        }
        if buffers.contains(ClearFlags::DEPTH) {
            gl.depth_mask(true);
            gl.clear_depth(depth);
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if buffers.contains(ClearFlags::STENCIL) {
            gl.stencil_mask_separate(gl::FRONT_AND_BACK, !0);
            gl.clear_stencil(stencil as i32);
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        if mask != 0 {
            gl.clear(mask);
        }

        // Masks were overridden for the clear.
        self.dirty |= DirtyFlags::BLEND | DirtyFlags::DSA | DirtyFlags::RASTERIZER;
        Ok(())
    }
}

/// `shadmask` / `shadadd` for a depth-compare sampler: compared channels
/// pass through, constant channels come from the add term.
fn shadow_swizzle(swizzle: [GLenum; 4]) -> ([f32; 4], [f32; 4]) {
    let mut mask = [0.0; 4];
    let mut add = [0.0; 4];
    for (i, s) in swizzle.into_iter().enumerate() {
        match s {
            gl::ZERO => {}
            gl::ONE => add[i] = 1.0,
            _ => mask[i] = 1.0,
        }
    }
    (mask, add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use virgl_core::format::VirglFormat;

    fn desc(format: VirglFormat) -> Option<&'static FormatDesc> {
        format::lookup(format as u32)
    }

    #[test]
    fn rgbx_blend_drops_dst_alpha() {
        let rt = RtBlendState {
            blend_enable: true,
            rgb_src_factor: BlendFactor::DstAlpha,
            rgb_dst_factor: BlendFactor::InvDstAlpha,
            ..Default::default()
        };
        let patched = patch_blend(&rt, desc(VirglFormat::B8G8R8X8_UNORM));
        assert_eq!(patched.rgb_src_factor, BlendFactor::One);
        assert_eq!(patched.rgb_dst_factor, BlendFactor::Zero);

        let untouched = patch_blend(&rt, desc(VirglFormat::B8G8R8A8_UNORM));
        assert_eq!(untouched, rt);
    }

    #[test]
    fn a8_blend_moves_alpha_to_red() {
        let rt = RtBlendState {
            blend_enable: true,
            alpha_src_factor: BlendFactor::SrcAlpha,
            alpha_dst_factor: BlendFactor::InvDstAlpha,
            colormask: 0x8,
            ..Default::default()
        };
        let patched = patch_blend(&rt, desc(VirglFormat::A8_UNORM));
        assert_eq!(patched.rgb_src_factor, BlendFactor::SrcColor);
        assert_eq!(patched.rgb_dst_factor, BlendFactor::InvDstColor);
        assert_eq!(patched.colormask, 0x1);
    }

    #[test]
    fn shadow_terms_follow_swizzle() {
        let (mask, add) = shadow_swizzle([gl::RED, gl::RED, gl::ZERO, gl::ONE]);
        assert_eq!(mask, [1.0, 1.0, 0.0, 0.0]);
        assert_eq!(add, [0.0, 0.0, 0.0, 1.0]);
    }
}
