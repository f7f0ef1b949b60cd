//! Resource copies and blits.
//!
//! Copies try, in order: a buffer copy, `glCopyImageSubData`, a framebuffer
//! blit, and finally a round trip through host memory.

use std::rc::Rc;

use gl::types::GLenum;
use tracing::{debug, trace, warn};
use virgl_core::error::RendererResult;
use virgl_core::format::{self, FormatDesc};
use virgl_core::limits::MAX_VIEWPORTS;
use virgl_core::pipe::TextureTarget;
use virgl_core::{ContextErrorKind, Handle, PipeBox, RendererError};
use virgl_gl::{Feature, ImageRegion};

use crate::context::{Context, Env};
use crate::gl_objects::{GlFramebuffer, GlTexture};
use crate::host::Host;
use crate::iov::Iov;
use crate::resource::{Resource, Storage, DECODE_EXT, SKIP_DECODE_EXT};
use crate::state::Scissor;
use crate::sub_context::DirtyFlags;
use crate::transfer::{self, TransferRequest};

/// `PIPE_MASK_*` bits of a blit.
pub const BLIT_MASK_RGBA: u32 = 0xf;
pub const BLIT_MASK_Z: u32 = 1 << 4;
pub const BLIT_MASK_S: u32 = 1 << 5;

const FILTER_LINEAR: u32 = 1;

/// One side of a blit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlitSide {
    pub res_handle: Handle,
    pub level: u32,
    /// View format; 0 uses the resource's own.
    pub format: u32,
    pub pbox: PipeBox,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlitInfo {
    pub dst: BlitSide,
    pub src: BlitSide,
    pub mask: u32,
    pub filter: u32,
    pub scissor_enable: bool,
    pub scissor: Scissor,
    pub render_condition_enable: bool,
}

/// Rectangle in GL's bottom-up coordinates for one side of a blit.
fn gl_rect(res: &Resource, level: u32, b: &PipeBox) -> [i32; 4] {
    let (x0, x1) = (b.x, b.x + b.width);
    let (y0, y1) = (b.y, b.y + b.height);
    if res.y_0_top() {
        let h = res.level_height(level) as i32;
        [x0, h - y0, x1, h - y1]
    } else {
        [x0, y0, x1, y1]
    }
}

/// A texture level a blit reads from or writes to.
#[derive(Debug, Clone, Copy)]
struct LevelRef {
    target: TextureTarget,
    gl_target: GLenum,
    tex: u32,
    level: u32,
}

impl LevelRef {
    fn of(res: &Resource, tex: u32, level: u32) -> Self {
        Self {
            target: res.target,
            gl_target: res.gl_target,
            tex,
            level,
        }
    }
}

/// Attach one layer (or cube face) of a texture level.
fn attach_layer(host: &Host, fb_target: GLenum, attachment: GLenum, at: LevelRef, layer: u32) {
    let gl = host.gl.as_ref();
    let level = at.level as i32;
    match at.target {
        TextureTarget::Cube => {
            let face = gl::TEXTURE_CUBE_MAP_POSITIVE_X + layer;
            gl.framebuffer_texture_2d(fb_target, attachment, face, at.tex, level);
        }
        TextureTarget::Texture3D
        | TextureTarget::Texture1DArray
        | TextureTarget::Texture2DArray
        | TextureTarget::CubeArray => {
            gl.framebuffer_texture_layer(fb_target, attachment, at.tex, level, layer as i32);
        }
        _ => gl.framebuffer_texture_2d(fb_target, attachment, at.gl_target, at.tex, level),
    }
}

fn gl_mask(mask: u32, desc: &FormatDesc) -> u32 {
    let mut bits = 0;
    if mask & BLIT_MASK_RGBA != 0 && !desc.is_depth_stencil() {
        bits |= gl::COLOR_BUFFER_BIT;
    }
    if mask & BLIT_MASK_Z != 0 && desc.has_depth() {
        bits |= gl::DEPTH_BUFFER_BIT;
    }
    if mask & BLIT_MASK_S != 0 && desc.has_stencil() {
        bits |= gl::STENCIL_BUFFER_BIT;
    }
    bits
}

fn view_desc(res: &Resource, format: u32) -> Option<&'static FormatDesc> {
    match format {
        0 => res.desc,
        f => format::lookup(f).or(res.desc),
    }
}

fn renderable(res: &Resource) -> bool {
    !res.is_buffer() && res.texture_id().is_some() && res.desc.is_some_and(FormatDesc::is_renderable)
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

fn copy_buffer(host: &Host, dst: &Resource, dst_offset: u32, src: &Resource, b: &PipeBox) -> RendererResult<()> {
    let (src_off, dst_off, size) = (b.x as usize, dst_offset as usize, b.width as usize);
    if src_off + size > src.width as usize || dst_off + size > dst.width as usize {
        warn!("buffer copy {} -> {} out of bounds", src.handle, dst.handle);
        return Err(RendererError::Inval);
    }
    match (&src.storage, &dst.storage) {
        (Storage::Buffer { buffer: s, .. }, Storage::Buffer { buffer: d, .. }) => {
            let gl = host.gl.as_ref();
            gl.bind_buffer(gl::COPY_READ_BUFFER, s.id());
            gl.bind_buffer(gl::COPY_WRITE_BUFFER, d.id());
            gl.copy_buffer_sub_data(gl::COPY_READ_BUFFER, gl::COPY_WRITE_BUFFER, src_off, dst_off, size);
            gl.bind_buffer(gl::COPY_READ_BUFFER, 0);
            gl.bind_buffer(gl::COPY_WRITE_BUFFER, 0);
        }
        (Storage::System(s), Storage::System(d)) if !std::ptr::eq(src, dst) => {
            let s = s.borrow();
            d.borrow_mut()[dst_off..dst_off + size].copy_from_slice(&s[src_off..src_off + size]);
        }
        (Storage::System(s), Storage::System(_)) => {
            s.borrow_mut().copy_within(src_off..src_off + size, dst_off);
        }
        _ => {
            warn!("buffer copy between host memory and GL buffers");
            return Err(RendererError::Inval);
        }
    }
    Ok(())
}

fn can_copy_image(host: &Host, dst: &Resource, src: &Resource) -> bool {
    let (Some(dd), Some(sd)) = (dst.desc, src.desc) else {
        return false;
    };
    host.has(Feature::CopyImage)
        && dst.texture_id().is_some()
        && src.texture_id().is_some()
        && dst.nr_samples == src.nr_samples
        && format::copy_compatible(sd, dd)
}

fn copy_image(host: &Host, dst: &Resource, dst_level: u32, dst_pos: [i32; 3], src: &Resource, src_level: u32, b: &PipeBox) {
    let (Some(src_tex), Some(dst_tex)) = (src.texture_id(), dst.texture_id()) else {
        return;
    };
    let src_region = ImageRegion {
        name: src_tex,
        target: src.gl_target,
        level: src_level as i32,
        x: b.x,
        y: b.y,
        z: b.z,
    };
    let dst_region = ImageRegion {
        name: dst_tex,
        target: dst.gl_target,
        level: dst_level as i32,
        x: dst_pos[0],
        y: dst_pos[1],
        z: dst_pos[2],
    };
    host.gl
        .copy_image_sub_data(src_region, dst_region, b.width, b.height, b.depth.max(1));
}

/// Round trip through host memory for resources GL cannot render to.
fn copy_via_host(
    host: &Host,
    dst: &Resource,
    dst_level: u32,
    dst_pos: [i32; 3],
    src: &Resource,
    src_level: u32,
    b: &PipeBox,
) -> RendererResult<()> {
    let desc = src.desc.ok_or(RendererError::Inval)?;
    let depth = b.depth.max(1) as usize;
    let stride = desc.stride(b.width as u32);
    let layer_stride = stride * desc.nblocksy(b.height as u32);
    let mut staging = Iov::zeroed(layer_stride as usize * depth);
    // The staging copy is packed, so both sides carry explicit strides.
    let packed = |res: &Resource| if transfer::layered(res.target) { layer_stride } else { 0 };
    let read = TransferRequest {
        handle: src.handle,
        level: src_level,
        pbox: *b,
        stride,
        layer_stride: packed(src),
        ..Default::default()
    };
    transfer::read(host, src, &read, &mut staging)?;
    let write = TransferRequest {
        handle: dst.handle,
        level: dst_level,
        pbox: PipeBox {
            x: dst_pos[0],
            y: dst_pos[1],
            z: dst_pos[2],
            ..*b
        },
        stride,
        layer_stride: packed(dst),
        ..Default::default()
    };
    transfer::write(host, dst, &write, &staging)
}

/// Multisampled depth/stencil on GLES resolves into a plain texture first.
fn resolve_temp(host: &Host, src: &Resource, level: u32) -> Option<GlTexture> {
    let desc = src.desc?;
    let tex = GlTexture::new(&host.gl);
    let gl = host.gl.as_ref();
    gl.bind_texture(gl::TEXTURE_2D, tex.id());
    gl.tex_storage_2d(
        gl::TEXTURE_2D,
        1,
        desc.internal_format,
        src.level_width(level) as i32,
        src.level_height(level) as i32,
    );
    Some(tex)
}

struct BlitPass<'a> {
    host: &'a Host,
    fbos: &'a [GlFramebuffer; 2],
}

impl BlitPass<'_> {
    fn layer(
        &self,
        src: (LevelRef, u32),
        dst: (LevelRef, u32),
        attachment: (GLenum, GLenum),
        rects: ([i32; 4], [i32; 4]),
        mask: u32,
        filter: GLenum,
    ) {
        let gl = self.host.gl.as_ref();
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, self.fbos[0].id());
        attach_layer(self.host, gl::READ_FRAMEBUFFER, attachment.0, src.0, src.1);
        gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, self.fbos[1].id());
        attach_layer(self.host, gl::DRAW_FRAMEBUFFER, attachment.1, dst.0, dst.1);
        if attachment.1 == gl::COLOR_ATTACHMENT0 {
            gl.read_buffer(gl::COLOR_ATTACHMENT0);
            gl.draw_buffers(&[gl::COLOR_ATTACHMENT0]);
        }
        gl.blit_framebuffer(rects.0, rects.1, mask, filter);
        gl.framebuffer_texture(gl::READ_FRAMEBUFFER, attachment.0, 0, 0);
        gl.framebuffer_texture(gl::DRAW_FRAMEBUFFER, attachment.1, 0, 0);
    }
}

// ---------------------------------------------------------------------------
// Context entry points
// ---------------------------------------------------------------------------

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub fn resource_copy_region(
        &mut self,
        env: &Env<'_>,
        dst_handle: Handle,
        dst_level: u32,
        dst_pos: [u32; 3],
        src_handle: Handle,
        src_level: u32,
        src_box: &PipeBox,
    ) -> RendererResult<()> {
        let dst = self.resource(env, dst_handle, "resource_copy_region")?;
        let src = self.resource(env, src_handle, "resource_copy_region")?;
        let host = env.host;
        let pos = dst_pos.map(|v| v as i32);
        trace!(
            "copy {src_handle}@{src_level} {src_box:?} -> {dst_handle}@{dst_level} {pos:?}"
        );

        if src.is_buffer() && dst.is_buffer() {
            return copy_buffer(host, &dst, dst_pos[0], &src, src_box);
        }
        if src.is_buffer() || dst.is_buffer() {
            return Err(RendererError::context(
                ContextErrorKind::IllegalResource,
                if src.is_buffer() { dst_handle } else { src_handle },
                "resource_copy_region",
            ));
        }
        if can_copy_image(host, &dst, &src) {
            copy_image(host, &dst, dst_level, pos, &src, src_level, src_box);
            return Ok(());
        }
        if renderable(&src) && renderable(&dst) {
            let mask = src.desc.map_or(BLIT_MASK_RGBA, |d| {
                if d.is_depth_stencil() {
                    BLIT_MASK_Z | BLIT_MASK_S
                } else {
                    BLIT_MASK_RGBA
                }
            });
            let info = BlitInfo {
                src: BlitSide {
                    res_handle: src_handle,
                    level: src_level,
                    format: src.format,
                    pbox: *src_box,
                },
                dst: BlitSide {
                    res_handle: dst_handle,
                    level: dst_level,
                    format: dst.format,
                    pbox: PipeBox {
                        x: pos[0],
                        y: pos[1],
                        z: pos[2],
                        ..*src_box
                    },
                },
                mask,
                ..Default::default()
            };
            return self.blit_resources(host, &info, &dst, &src);
        }
        debug!("copy {src_handle} -> {dst_handle} through host memory");
        copy_via_host(host, &dst, dst_level, pos, &src, src_level, src_box)
    }

    pub fn blit(&mut self, env: &Env<'_>, info: &BlitInfo) -> RendererResult<()> {
        let dst = self.resource(env, info.dst.res_handle, "blit")?;
        let src = self.resource(env, info.src.res_handle, "blit")?;
        if !renderable(&src) || !renderable(&dst) {
            let same_size = info.src.pbox.width == info.dst.pbox.width
                && info.src.pbox.height == info.dst.pbox.height
                && info.src.pbox.depth == info.dst.pbox.depth;
            if !same_size || src.is_buffer() || dst.is_buffer() {
                warn!("cannot blit {} -> {}", src.handle, dst.handle);
                return Err(RendererError::Inval);
            }
            let d = info.dst.pbox;
            return copy_via_host(
                env.host,
                &dst,
                info.dst.level,
                [d.x, d.y, d.z],
                &src,
                info.src.level,
                &info.src.pbox,
            );
        }
        self.blit_resources(env.host, info, &dst, &src)
    }

    fn blit_resources(
        &mut self,
        host: &Rc<Host>,
        info: &BlitInfo,
        dst: &Rc<Resource>,
        src: &Rc<Resource>,
    ) -> RendererResult<()> {
        let (Some(src_desc), Some(dst_desc)) = (view_desc(src, info.src.format), view_desc(dst, info.dst.format))
        else {
            return Err(RendererError::Inval);
        };
        let (Some(src_tex), Some(dst_tex)) = (src.texture_id(), dst.texture_id()) else {
            return Err(RendererError::Inval);
        };
        let mask = gl_mask(info.mask, src_desc) & gl_mask(info.mask, dst_desc);
        if mask == 0 {
            trace!("blit {} -> {} has nothing to copy", src.handle, dst.handle);
            return Ok(());
        }
        let filter = if info.filter == FILTER_LINEAR && mask == gl::COLOR_BUFFER_BIT {
            gl::LINEAR
        } else {
            gl::NEAREST
        };
        let gl = host.gl.as_ref();
        let sub = self.sub()?;

        // Suspend the guest's render condition if the blit ignores it.
        let suspended = !info.render_condition_enable && sub.render_condition.is_some();
        if suspended {
            gl.end_conditional_render();
        }
        if info.scissor_enable {
            let s = info.scissor;
            gl.enable(gl::SCISSOR_TEST);
            gl.scissor(
                s.minx as i32,
                s.miny as i32,
                s.maxx.saturating_sub(s.minx) as i32,
                s.maxy.saturating_sub(s.miny) as i32,
            );
        } else {
            gl.disable(gl::SCISSOR_TEST);
        }

        let src_attachment = if mask == gl::COLOR_BUFFER_BIT {
            gl::COLOR_ATTACHMENT0
        } else {
            src_desc.attachment()
        };
        let dst_attachment = if mask == gl::COLOR_BUFFER_BIT {
            gl::COLOR_ATTACHMENT0
        } else {
            dst_desc.attachment()
        };

        // sRGB: decode on the source only when the view asks for it, encode
        // on the destination likewise.
        let old_state = src.tex_state.get();
        if host.has(Feature::TextureSrgbDecode) && src.desc.is_some_and(FormatDesc::is_srgb) {
            let mut state = old_state;
            state.srgb_decode = if src_desc.is_srgb() { DECODE_EXT } else { SKIP_DECODE_EXT };
            src.update_tex_state(gl, state);
        }
        if dst_desc.is_srgb() {
            gl.enable(gl::FRAMEBUFFER_SRGB);
        } else {
            gl.disable(gl::FRAMEBUFFER_SRGB);
        }

        let src_rect = gl_rect(src, info.src.level, &info.src.pbox);
        let dst_rect = gl_rect(dst, info.dst.level, &info.dst.pbox);
        let mut src_ref = LevelRef::of(src, src_tex, info.src.level);
        let dst_ref = LevelRef::of(dst, dst_tex, info.dst.level);
        let pass = BlitPass {
            host,
            fbos: &sub.blit_fbos,
        };

        // GLES cannot resolve multisampled depth/stencil into a region, so
        // resolve the whole level first.
        let resolved = if host.is_gles() && src.nr_samples > 0 && src_desc.is_depth_stencil() {
            resolve_temp(host, src, info.src.level)
        } else {
            None
        };
        if let Some(temp) = &resolved {
            let w = src.level_width(info.src.level) as i32;
            let h = src.level_height(info.src.level) as i32;
            let full = [0, 0, w, h];
            let temp_ref = LevelRef {
                target: TextureTarget::Texture2D,
                gl_target: gl::TEXTURE_2D,
                tex: temp.id(),
                level: 0,
            };
            gl.bind_framebuffer(gl::READ_FRAMEBUFFER, pass.fbos[0].id());
            attach_layer(host, gl::READ_FRAMEBUFFER, src_attachment, src_ref, 0);
            gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, pass.fbos[1].id());
            attach_layer(host, gl::DRAW_FRAMEBUFFER, src_attachment, temp_ref, 0);
            gl.blit_framebuffer(full, full, mask, gl::NEAREST);
            src_ref = temp_ref;
            debug!("resolved multisampled depth of {} through a temporary", src.handle);
        }

        let layers = info.src.pbox.depth.max(1) as u32;
        for i in 0..layers {
            let src_layer = if resolved.is_some() { 0 } else { info.src.pbox.z as u32 + i };
            pass.layer(
                (src_ref, src_layer),
                (dst_ref, info.dst.pbox.z as u32 + i),
                (src_attachment, dst_attachment),
                (src_rect, dst_rect),
                mask,
                filter,
            );
        }
        drop(resolved);

        gl.disable(gl::FRAMEBUFFER_SRGB);
        src.update_tex_state(gl, old_state);
        gl.bind_framebuffer(gl::FRAMEBUFFER, sub.fb.id());
        if suspended {
            if let Some(rc) = &sub.render_condition {
                let mode = virgl_core::pipe::RenderCondMode::from_raw(rc.mode)
                    .unwrap_or(virgl_core::pipe::RenderCondMode::Wait);
                gl.begin_conditional_render(
                    rc.query.query.id(),
                    crate::query::render_condition_mode(host, mode, rc.condition),
                );
            }
        }
        sub.dirty |= DirtyFlags::SCISSOR | DirtyFlags::FRAMEBUFFER;
        sub.scissor_dirty = (1 << MAX_VIEWPORTS) - 1;
        Ok(())
    }
}
