//! Copies between guest memory and resource storage.
//!
//! Every request is bounds-checked against the resource and the iov before
//! GL is touched. Textures go through a tightly packed temporary whenever GL
//! cannot read the guest layout directly (scattered iovs, compressed blocks,
//! flipped rows, depth rescaling).

use std::borrow::Cow;

use gl::types::GLenum;
use tracing::{trace, warn};
use virgl_core::error::RendererResult;
use virgl_core::format::{unpack_alignment, FormatDesc, VirglFormat};
use virgl_core::limits::MAX_CURSOR_SIZE;
use virgl_core::pipe::TextureTarget;
use virgl_core::{ContextErrorKind, Handle, PipeBox, RendererError};

use crate::gl_objects::GlFramebuffer;
use crate::host::Host;
use crate::iov::Iov;
use crate::resource::{Readback, Resource, Storage};

/// One transfer command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferRequest {
    pub handle: Handle,
    /// Context whose attach table resolves `handle`; 0 uses the global table.
    pub ctx_id: u32,
    pub level: u32,
    /// Row pitch in the iov, 0 for tightly packed.
    pub stride: u32,
    /// Layer pitch in the iov, 0 for tightly packed.
    pub layer_stride: u32,
    pub pbox: PipeBox,
    /// Byte offset of the box in the iov.
    pub offset: u64,
}

/// Box fits inside the given mip level of the resource.
pub(crate) fn check_transfer_bounds(res: &Resource, level: u32, b: &PipeBox) -> bool {
    if level > res.last_level {
        return false;
    }
    if b.x < 0 || b.y < 0 || b.z < 0 || b.width < 0 || b.height < 0 || b.depth < 0 {
        return false;
    }
    let fits = |start: i32, len: i32, size: u32| {
        let (start, len) = (start as u64, len as u64);
        len <= size as u64 && start <= size as u64 && start + len <= size as u64
    };
    if !fits(b.x, b.width, res.level_width(level)) {
        return false;
    }
    if !fits(b.y, b.height, res.level_height(level)) {
        return false;
    }
    fits(b.z, b.depth, res.level_depth(level))
}

pub(crate) fn layered(target: TextureTarget) -> bool {
    matches!(
        target,
        TextureTarget::Texture3D
            | TextureTarget::Cube
            | TextureTarget::Texture1DArray
            | TextureTarget::Texture2DArray
            | TextureTarget::CubeArray
    )
}

/// Box row pitch, tightly packed.
fn box_stride(res: &Resource, width: u32) -> u32 {
    match res.desc {
        Some(desc) if !res.is_buffer() => desc.stride(width),
        _ => width * res.elsize(),
    }
}

fn box_rows(res: &Resource, height: u32) -> u32 {
    match res.desc {
        Some(desc) if !res.is_buffer() => desc.nblocksy(height),
        _ => height,
    }
}

/// The iov holds the whole box at the requested strides.
pub(crate) fn check_iov_bounds(res: &Resource, req: &TransferRequest, iov_len: usize) -> bool {
    let b = &req.pbox;
    let (w, h, d) = (b.width as u32, b.height as u32, b.depth as u32);

    let mut stride = box_stride(res, w) as u64;
    if req.stride != 0 {
        if h > 1 && (req.stride as u64) < stride {
            return false;
        }
        stride = req.stride as u64;
    }

    let mut layer_stride = box_rows(res, h) as u64 * stride;
    if req.layer_stride != 0 {
        if !layered(res.target) {
            return false;
        }
        if d > 1 && (req.layer_stride as u64) < layer_stride {
            return false;
        }
        layer_stride = req.layer_stride as u64;
    }

    let send_size = layer_stride * d as u64;
    req.offset
        .checked_add(send_size)
        .is_some_and(|end| end <= iov_len as u64)
}

fn iov_bounds_error(op: &'static str, handle: Handle) -> RendererError {
    RendererError::context(ContextErrorKind::TransferIovBounds, handle, op)
}

// ---------------------------------------------------------------------------
// Layout helpers
// ---------------------------------------------------------------------------

/// Placement of a box in guest memory.
#[derive(Debug, Clone, Copy)]
struct Layout {
    offset: usize,
    stride: usize,
    layer_stride: usize,
    row_bytes: usize,
    rows: usize,
    layers: usize,
}

impl Layout {
    fn packed_len(&self) -> usize {
        self.row_bytes * self.rows * self.layers
    }

    fn row_offset(&self, layer: usize, row: usize) -> usize {
        self.offset + layer * self.layer_stride + row * self.stride
    }

    /// Bytes GL reads when pointed at the first row with these strides.
    fn span(&self) -> usize {
        if self.rows == 0 || self.layers == 0 {
            return 0;
        }
        (self.layers - 1) * self.layer_stride + (self.rows - 1) * self.stride + self.row_bytes
    }
}

/// Collect a box out of the iov into a packed buffer, optionally flipping rows.
fn gather(iov: &Iov, layout: &Layout, invert: bool) -> Vec<u8> {
    let mut out = vec![0; layout.packed_len()];
    if layout.row_bytes == 0 {
        return out;
    }
    for (i, row) in out.chunks_exact_mut(layout.row_bytes).enumerate() {
        let layer = i / layout.rows;
        let mut r = i % layout.rows;
        if invert {
            r = layout.rows - 1 - r;
        }
        iov.read_at(layout.row_offset(layer, r), row);
    }
    out
}

/// Spread a packed buffer into the iov, optionally flipping rows.
fn scatter(iov: &mut Iov, layout: &Layout, data: &[u8], invert: bool) {
    if layout.row_bytes == 0 {
        return;
    }
    for (i, row) in data.chunks_exact(layout.row_bytes).enumerate() {
        let layer = i / layout.rows;
        let mut r = i % layout.rows;
        if invert {
            r = layout.rows - 1 - r;
        }
        iov.write_at(layout.row_offset(layer, r), row);
    }
}

/// Rescale 24-bit depth values stored in 32-bit words.
fn scale_depth(data: &mut [u8], scale: f32) {
    const MAX: f32 = 0xff_ffff as f32;
    for word in data.chunks_exact_mut(4) {
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let d = ((value & 0xff_ffff) as f32 / MAX * scale).clamp(0.0, 1.0);
        let scaled = (d * MAX) as u32;
        word.copy_from_slice(&scaled.to_le_bytes());
    }
}

fn gl_format_type(desc: &FormatDesc) -> (GLenum, GLenum) {
    match desc.gl_format {
        0 => (gl::BGRA, gl::UNSIGNED_BYTE),
        format => (format, desc.gl_type),
    }
}

// ---------------------------------------------------------------------------
// Guest -> host
// ---------------------------------------------------------------------------

/// Copy the request's box from `iov` into the resource.
pub(crate) fn write(host: &Host, res: &Resource, req: &TransferRequest, iov: &Iov) -> RendererResult<()> {
    if !check_transfer_bounds(res, req.level, &req.pbox) {
        warn!("transfer write to resource {} out of bounds: {:?}", res.handle, req.pbox);
        return Err(RendererError::Inval);
    }
    if !check_iov_bounds(res, req, iov.len()) {
        return Err(iov_bounds_error("transfer_write", res.handle));
    }
    trace!("transfer write resource {} level {} {:?}", res.handle, req.level, req.pbox);

    let b = &req.pbox;
    let offset = req.offset as usize;
    match &res.storage {
        Storage::System(data) => {
            let mut data = data.borrow_mut();
            let dst = data
                .get_mut(b.x as usize..(b.x + b.width) as usize)
                .ok_or(RendererError::Inval)?;
            iov.read_at(offset, dst);
            Ok(())
        }
        Storage::Buffer { buffer, target, .. } => {
            let len = b.width as usize;
            let data: Cow<'_, [u8]> = match iov.contiguous_from(offset).and_then(|s| s.get(..len)) {
                Some(slice) => Cow::Borrowed(slice),
                None => {
                    let mut tmp = vec![0; len];
                    iov.read_at(offset, &mut tmp);
                    Cow::Owned(tmp)
                }
            };
            let gl = host.gl.as_ref();
            gl.bind_buffer(*target, buffer.id());
            if host.config.use_sub_data {
                gl.buffer_sub_data(*target, b.x as usize, &data);
            } else {
                let access = gl::MAP_INVALIDATE_RANGE_BIT | gl::MAP_UNSYNCHRONIZED_BIT | gl::MAP_WRITE_BIT;
                // SAFETY: the buffer is bound to `target` and the range lies
                // inside its storage (checked above).
                let ptr = unsafe { gl.map_buffer_range(*target, b.x as usize, len, access) };
                if ptr.is_null() {
                    warn!("failed to map buffer {} for write, using BufferSubData", res.handle);
                    gl.buffer_sub_data(*target, b.x as usize, &data);
                } else {
                    // SAFETY: the mapping is `len` bytes long and stays valid
                    // until the unmap below.
                    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, len) };
                    gl.unmap_buffer(*target);
                }
            }
            Ok(())
        }
        Storage::Texture(tex) => write_texture(host, res, tex.id(), req, iov),
    }
}

fn write_texture(host: &Host, res: &Resource, tex: u32, req: &TransferRequest, iov: &Iov) -> RendererResult<()> {
    let desc = res.desc.ok_or(RendererError::Inval)?;
    let gl = host.gl.as_ref();
    let b = req.pbox;
    let level = req.level;
    let elsize = desc.block_size.max(1);

    let stride = match req.stride {
        0 => desc.stride(res.level_width(level)),
        s => s,
    };
    let layer_stride = match req.layer_stride {
        0 => stride * desc.nblocksy(res.level_height(level)),
        s => s,
    };
    let layout = Layout {
        offset: req.offset as usize,
        stride: stride as usize,
        layer_stride: layer_stride as usize,
        row_bytes: desc.stride(b.width as u32) as usize,
        rows: desc.nblocksy(b.height as u32) as usize,
        layers: b.depth as usize,
    };

    let is_z24x8 = desc.format == VirglFormat::Z24X8_UNORM;
    let invert = res.y_0_top();
    let direct = if iov.num_segments() > 1 || desc.is_compressed() || invert || is_z24x8 {
        None
    } else {
        iov.contiguous_from(layout.offset)
            .filter(|s| s.len() >= layout.span())
    };

    let (data, layout) = match direct {
        Some(slice) => {
            gl.pixel_store_i(gl::UNPACK_ROW_LENGTH, (stride / elsize) as i32);
            if layered(res.target) && stride != 0 {
                gl.pixel_store_i(gl::UNPACK_IMAGE_HEIGHT, (layer_stride / stride) as i32);
            }
            (Cow::Borrowed(slice), layout)
        }
        None => {
            let mut packed = gather(iov, &layout, invert);
            if is_z24x8 {
                scale_depth(&mut packed, 256.0);
            }
            gl.pixel_store_i(gl::UNPACK_ROW_LENGTH, 0);
            let packed_layout = Layout {
                offset: 0,
                stride: layout.row_bytes,
                layer_stride: layout.row_bytes * layout.rows,
                ..layout
            };
            (Cow::Owned(packed), packed_layout)
        }
    };

    gl.pixel_store_i(gl::UNPACK_ALIGNMENT, unpack_alignment(elsize));
    gl.bind_texture(res.gl_target, tex);

    let (format, ty) = gl_format_type(desc);
    let y = if invert {
        res.level_height(level) as i32 - b.y - b.height
    } else {
        b.y
    };
    let lvl = level as i32;

    if desc.is_compressed() {
        let ifmt = desc.internal_format;
        match res.gl_target {
            gl::TEXTURE_CUBE_MAP => {
                for (i, face) in data.chunks(layout.layer_stride.max(1)).take(layout.layers).enumerate() {
                    let target = gl::TEXTURE_CUBE_MAP_POSITIVE_X + (b.z as u32) + i as u32;
                    gl.compressed_tex_sub_image_2d(target, lvl, b.x, y, b.width, b.height, ifmt, face);
                }
            }
            gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP_ARRAY => {
                gl.compressed_tex_sub_image_3d(
                    res.gl_target,
                    lvl,
                    b.x,
                    y,
                    b.z,
                    b.width,
                    b.height,
                    b.depth,
                    ifmt,
                    &data,
                );
            }
            target => gl.compressed_tex_sub_image_2d(target, lvl, b.x, y, b.width, b.height, ifmt, &data),
        }
    } else {
        match res.gl_target {
            gl::TEXTURE_CUBE_MAP => {
                for i in 0..layout.layers {
                    let start = i * layout.layer_stride;
                    let face = data.get(start..).unwrap_or(&[]);
                    let target = gl::TEXTURE_CUBE_MAP_POSITIVE_X + (b.z as u32) + i as u32;
                    gl.tex_sub_image_2d(target, lvl, b.x, y, b.width, b.height, format, ty, face);
                }
            }
            gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP_ARRAY => {
                gl.tex_sub_image_3d(
                    res.gl_target,
                    lvl,
                    b.x,
                    y,
                    b.z,
                    b.width,
                    b.height,
                    b.depth,
                    format,
                    ty,
                    &data,
                );
            }
            gl::TEXTURE_1D => gl.tex_sub_image_1d(gl::TEXTURE_1D, lvl, b.x, b.width, format, ty, &data),
            gl::TEXTURE_1D_ARRAY => {
                gl.tex_sub_image_2d(gl::TEXTURE_1D_ARRAY, lvl, b.x, b.z, b.width, b.depth, format, ty, &data)
            }
            target => gl.tex_sub_image_2d(target, lvl, b.x, y, b.width, b.height, format, ty, &data),
        }
    }

    gl.pixel_store_i(gl::UNPACK_ROW_LENGTH, 0);
    gl.pixel_store_i(gl::UNPACK_IMAGE_HEIGHT, 0);
    gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 4);
    Ok(())
}

// ---------------------------------------------------------------------------
// Host -> guest
// ---------------------------------------------------------------------------

/// Copy the request's box out of the resource into `iov`.
pub(crate) fn read(host: &Host, res: &Resource, req: &TransferRequest, iov: &mut Iov) -> RendererResult<()> {
    if !check_transfer_bounds(res, req.level, &req.pbox) {
        warn!("transfer read from resource {} out of bounds: {:?}", res.handle, req.pbox);
        return Err(RendererError::Inval);
    }
    if !check_iov_bounds(res, req, iov.len()) {
        return Err(iov_bounds_error("transfer_read", res.handle));
    }
    trace!("transfer read resource {} level {} {:?}", res.handle, req.level, req.pbox);

    let b = &req.pbox;
    let offset = req.offset as usize;
    match &res.storage {
        Storage::System(data) => {
            let data = data.borrow();
            let src = data
                .get(b.x as usize..(b.x + b.width) as usize)
                .ok_or(RendererError::Inval)?;
            iov.write_at(offset, src);
            Ok(())
        }
        Storage::Buffer { buffer, target, .. } => {
            let gl = host.gl.as_ref();
            let len = b.width as usize;
            let mut tmp = vec![0; len];
            gl.bind_buffer(*target, buffer.id());
            if host.is_gles() {
                // SAFETY: the buffer is bound and the range is inside it.
                let ptr = unsafe { gl.map_buffer_range(*target, b.x as usize, len, gl::MAP_READ_BIT) };
                if ptr.is_null() {
                    warn!("failed to map buffer {} for read", res.handle);
                    return Err(RendererError::Inval);
                }
                // SAFETY: the mapping covers `len` bytes until unmapped.
                unsafe { std::ptr::copy_nonoverlapping(ptr, tmp.as_mut_ptr(), len) };
                gl.unmap_buffer(*target);
            } else {
                gl.get_buffer_sub_data(*target, b.x as usize, &mut tmp);
            }
            iov.write_at(offset, &tmp);
            Ok(())
        }
        Storage::Texture(_) => {
            let desc = res.desc.ok_or(RendererError::Inval)?;
            let layout = read_layout(res, desc, req);
            if desc.is_renderable() && res.nr_samples == 0 {
                read_pixels(host, res, desc, req, &layout, iov)
            } else {
                read_tex_image(host, res, desc, req, &layout, iov)
            }
        }
    }
}

/// Guest placement of a texture read; default strides follow the level size
/// the same way writes do.
fn read_layout(res: &Resource, desc: &FormatDesc, req: &TransferRequest) -> Layout {
    let b = &req.pbox;
    let stride = match req.stride {
        0 => desc.stride(res.level_width(req.level)),
        s => s,
    };
    let layer_stride = match req.layer_stride {
        0 => stride * desc.nblocksy(res.level_height(req.level)),
        s => s,
    };
    Layout {
        offset: req.offset as usize,
        stride: stride as usize,
        layer_stride: layer_stride as usize,
        row_bytes: desc.stride(b.width as u32) as usize,
        rows: desc.nblocksy(b.height as u32) as usize,
        layers: b.depth as usize,
    }
}

/// Attach one layer of `res` to the cached readback framebuffer and bind it
/// for reading.
fn bind_readback(host: &Host, res: &Resource, tex: u32, desc: &FormatDesc, level: u32, layer: u32) {
    let gl = host.gl.as_ref();
    let mut cached = res.readback.borrow_mut();
    let fresh = match cached.as_ref() {
        Some(rb) => rb.level != level || rb.layer != layer,
        None => true,
    };
    let fbo = cached.get_or_insert_with(|| Readback {
        fbo: GlFramebuffer::new(&host.gl),
        level: u32::MAX,
        layer: u32::MAX,
    });
    gl.bind_framebuffer(gl::READ_FRAMEBUFFER, fbo.fbo.id());
    if !fresh {
        return;
    }
    let attachment = desc.attachment();
    let lvl = level as i32;
    match res.gl_target {
        gl::TEXTURE_CUBE_MAP => gl.framebuffer_texture_2d(
            gl::READ_FRAMEBUFFER,
            attachment,
            gl::TEXTURE_CUBE_MAP_POSITIVE_X + layer,
            tex,
            lvl,
        ),
        gl::TEXTURE_3D | gl::TEXTURE_1D_ARRAY | gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP_ARRAY => {
            gl.framebuffer_texture_layer(gl::READ_FRAMEBUFFER, attachment, tex, lvl, layer as i32)
        }
        target => gl.framebuffer_texture_2d(gl::READ_FRAMEBUFFER, attachment, target, tex, lvl),
    }
    fbo.level = level;
    fbo.layer = layer;
}

fn read_pixels(
    host: &Host,
    res: &Resource,
    desc: &FormatDesc,
    req: &TransferRequest,
    layout: &Layout,
    iov: &mut Iov,
) -> RendererResult<()> {
    let gl = host.gl.as_ref();
    let tex = res.texture_id().ok_or(RendererError::Inval)?;
    let b = req.pbox;
    let (format, ty) = gl_format_type(desc);
    let invert = res.y_0_top();
    let y = if invert {
        res.level_height(req.level) as i32 - b.y - b.height
    } else {
        b.y
    };
    let is_z24x8 = desc.format == VirglFormat::Z24X8_UNORM;

    let prev_fbo = gl.get_integer(gl::READ_FRAMEBUFFER_BINDING);
    gl.pixel_store_i(gl::PACK_ALIGNMENT, unpack_alignment(desc.block_size));
    for i in 0..layout.layers {
        bind_readback(host, res, tex, desc, req.level, b.z as u32 + i as u32);
        if !desc.is_depth_stencil() {
            gl.read_buffer(gl::COLOR_ATTACHMENT0);
        }
        let mut tmp = vec![0; layout.row_bytes * layout.rows];
        gl.read_pixels(b.x, y, b.width, b.height, format, ty, &mut tmp);
        if is_z24x8 {
            scale_depth(&mut tmp, 1.0 / 256.0);
        }
        let layer = Layout {
            offset: layout.offset + i * layout.layer_stride,
            layers: 1,
            ..*layout
        };
        scatter(iov, &layer, &tmp, invert);
    }
    gl.pixel_store_i(gl::PACK_ALIGNMENT, 4);
    gl.bind_framebuffer(gl::READ_FRAMEBUFFER, prev_fbo.max(0) as u32);
    Ok(())
}

fn read_tex_image(
    host: &Host,
    res: &Resource,
    desc: &FormatDesc,
    req: &TransferRequest,
    layout: &Layout,
    iov: &mut Iov,
) -> RendererResult<()> {
    if host.is_gles() {
        warn!("resource {}: GetTexImage is unavailable on GLES", res.handle);
        return Err(RendererError::Inval);
    }
    let gl = host.gl.as_ref();
    let tex = res.texture_id().ok_or(RendererError::Inval)?;
    let b = req.pbox;
    let level = req.level;
    let level_row = desc.stride(res.level_width(level)) as usize;
    let level_rows = desc.nblocksy(res.level_height(level)) as usize;
    let level_image = level_row * level_rows;
    let (format, ty) = gl_format_type(desc);
    let x_off = desc.stride(b.x as u32) as usize;
    let y_blocks = desc.nblocksy(b.y as u32) as usize;

    gl.bind_texture(res.gl_target, tex);
    gl.pixel_store_i(gl::PACK_ALIGNMENT, 1);

    let fetch = |target: GLenum, images: usize| {
        let mut level_data = vec![0; level_image * images];
        if desc.is_compressed() {
            gl.get_compressed_tex_image(target, level as i32, &mut level_data);
        } else {
            gl.get_tex_image(target, level as i32, format, ty, &mut level_data);
        }
        level_data
    };
    let is_cube = res.gl_target == gl::TEXTURE_CUBE_MAP;
    let whole = if is_cube {
        Vec::new()
    } else {
        fetch(res.gl_target, res.level_depth(level) as usize)
    };

    let mut packed = Vec::with_capacity(layout.packed_len());
    for i in 0..layout.layers {
        let z = b.z as usize + i;
        let face;
        let (image, base) = if is_cube {
            face = fetch(gl::TEXTURE_CUBE_MAP_POSITIVE_X + z as u32, 1);
            (&face, 0)
        } else {
            (&whole, z * level_image)
        };
        for r in 0..layout.rows {
            let start = base + (y_blocks + r) * level_row + x_off;
            match image.get(start..start + layout.row_bytes) {
                Some(row) => packed.extend_from_slice(row),
                None => packed.resize(packed.len() + layout.row_bytes, 0),
            }
        }
    }
    gl.pixel_store_i(gl::PACK_ALIGNMENT, 4);

    scatter(iov, layout, &packed, res.y_0_top());
    Ok(())
}

/// Level 0 of a cursor resource with rows flipped to top-down order.
pub(crate) fn cursor_contents(host: &Host, res: &Resource) -> RendererResult<Vec<u8>> {
    if res.target != TextureTarget::Texture2D {
        return Err(RendererError::Inval);
    }
    if res.width > MAX_CURSOR_SIZE || res.height > MAX_CURSOR_SIZE {
        return Err(RendererError::Inval);
    }
    let desc = res.desc.ok_or(RendererError::Inval)?;
    let tex = res.texture_id().ok_or(RendererError::Inval)?;
    let gl = host.gl.as_ref();
    let row = desc.stride(res.width) as usize;
    let mut data = vec![0; row * res.height as usize];

    gl.bind_texture(res.gl_target, tex);
    gl.pixel_store_i(gl::PACK_ALIGNMENT, 1);
    let (format, ty) = gl_format_type(desc);
    gl.get_tex_image(res.gl_target, 0, format, ty, &mut data);
    gl.pixel_store_i(gl::PACK_ALIGNMENT, 4);

    if row == 0 {
        return Ok(data);
    }
    let flipped = data.chunks_exact(row).rev().flatten().copied().collect();
    Ok(flipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn gather_flips_rows() {
        let iov = Iov::new(vec![vec![1, 2, 0, 0], vec![3, 4, 0, 0, 5, 6]]);
        let layout = Layout {
            offset: 0,
            stride: 4,
            layer_stride: 12,
            row_bytes: 2,
            rows: 3,
            layers: 1,
        };
        assert_eq!(gather(&iov, &layout, false), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(gather(&iov, &layout, true), vec![5, 6, 3, 4, 1, 2]);
        assert_eq!(layout.span(), 10);
    }

    #[test]
    fn scatter_respects_stride() {
        let mut iov = Iov::zeroed(8);
        let layout = Layout {
            offset: 1,
            stride: 4,
            layer_stride: 8,
            row_bytes: 2,
            rows: 2,
            layers: 1,
        };
        scatter(&mut iov, &layout, &[7, 8, 9, 10], true);
        assert_eq!(iov.to_vec(), vec![0, 9, 10, 0, 0, 7, 8, 0]);
    }

    #[test]
    fn depth_scaling_clamps() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x00ff_ffffu32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0x0000_0100u32.to_le_bytes());
        scale_depth(&mut data, 256.0);
        let words: Vec<u32> = data
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        assert_eq!(words[0], 0x00ff_ffff);
        assert_eq!(words[1], 0);
        assert!(words[2] > 0x100);
    }
}
