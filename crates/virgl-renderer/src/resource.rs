//! Guest resources: validation and host storage.
//!
//! A resource is either a buffer, a texture or a plain block of host memory
//! for bind flags GL never sees. Creation validates the guest arguments
//! against the probed host before any GL object is made.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gl::types::{GLenum, GLuint};
use tracing::{debug, warn};
use virgl_core::error::RendererResult;
use virgl_core::format::{self, FormatDesc, FormatFlags, VIRGL_FORMAT_MAX};
use virgl_core::pipe::{BindFlags, ResourceFlags, TextureTarget, MAX_TEXTURE_TYPES};
use virgl_core::{minify, Handle, RendererError};
use virgl_gl::Feature;

use crate::gl_objects::{GlBuffer, GlFramebuffer, GlTexture};
use crate::host::Host;
use crate::iov::Iov;

const BIND_STAGING: u32 = 1 << 19;
const BIND_SHARED: u32 = 1 << 20;
const BIND_LINEAR: u32 = 1 << 22;

const RESOURCE_FLAG_MAP_PERSISTENT: u32 = 1 << 1;
const RESOURCE_FLAG_MAP_COHERENT: u32 = 1 << 2;

// EXT_texture_sRGB_decode
pub(crate) const TEXTURE_SRGB_DECODE_EXT: GLenum = 0x8a48;
pub(crate) const DECODE_EXT: GLenum = 0x8a49;
pub(crate) const SKIP_DECODE_EXT: GLenum = 0x8a4a;

/// Arguments of a resource-create command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCreateArgs {
    pub handle: Handle,
    /// Raw `PIPE_TEXTURE_*` / `PIPE_BUFFER` value.
    pub target: u32,
    /// Raw virgl format value.
    pub format: u32,
    pub bind: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_size: u32,
    pub last_level: u32,
    pub nr_samples: u32,
    pub flags: u32,
}

/// What the embedder can learn about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceInfo {
    pub handle: Handle,
    /// GL texture or buffer name, 0 for host-memory resources.
    pub gl_id: GLuint,
    pub virgl_format: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Tightly packed row pitch of level 0.
    pub stride: u32,
    pub y_0_top: bool,
}

pub(crate) enum Storage {
    /// Host memory only; used for custom and staging binds.
    System(RefCell<Vec<u8>>),
    Buffer {
        buffer: GlBuffer,
        target: GLenum,
        /// Texture view of the buffer for `TEXTURE_BUFFER` sampling.
        tbo: Option<GlTexture>,
    },
    Texture(GlTexture),
}

/// Sampling state last programmed on the texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TexState {
    pub swizzle: [GLenum; 4],
    pub base_level: u32,
    pub max_level: u32,
    pub srgb_decode: GLenum,
}

impl Default for TexState {
    fn default() -> Self {
        Self {
            swizzle: [gl::RED, gl::GREEN, gl::BLUE, gl::ALPHA],
            base_level: 0,
            max_level: 1000,
            srgb_decode: DECODE_EXT,
        }
    }
}

pub(crate) struct Readback {
    pub fbo: GlFramebuffer,
    pub level: u32,
    pub layer: u32,
}

pub(crate) struct Resource {
    pub handle: Handle,
    pub target: TextureTarget,
    pub format: u32,
    pub desc: Option<&'static FormatDesc>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_size: u32,
    pub last_level: u32,
    pub nr_samples: u32,
    pub bind: BindFlags,
    pub flags: ResourceFlags,
    pub gl_target: GLenum,
    pub storage: Storage,
    pub iov: RefCell<Option<Iov>>,
    pub readback: RefCell<Option<Readback>>,
    pub tex_state: Cell<TexState>,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("handle", &self.handle)
            .field("target", &self.target)
            .field("format", &self.format)
            .field("size", &(self.width, self.height, self.depth))
            .finish_non_exhaustive()
    }
}

fn reject(args: &ResourceCreateArgs, why: &str) -> RendererError {
    warn!("resource {}: {why} ({args:?})", args.handle);
    RendererError::Inval
}

/// Check guest arguments against what the host can allocate.
pub(crate) fn check_resource_valid(host: &Host, args: &ResourceCreateArgs) -> RendererResult<()> {
    if args.handle == 0 {
        return Err(reject(args, "handle 0"));
    }
    if args.target >= MAX_TEXTURE_TYPES {
        return Err(reject(args, "bad target"));
    }
    let target = TextureTarget::from_raw(args.target).ok_or_else(|| reject(args, "bad target"))?;
    if args.format >= VIRGL_FORMAT_MAX {
        return Err(reject(args, "bad format"));
    }
    let desc = format::lookup(args.format);
    if target != TextureTarget::Buffer && desc.map_or(true, |d| d.internal_format == 0) {
        return Err(reject(args, "unsupported format"));
    }

    if args.nr_samples > 0 {
        if !host.has(Feature::Multisample) {
            return Err(reject(args, "no multisample support"));
        }
        if !matches!(target, TextureTarget::Texture2D | TextureTarget::Texture2DArray) {
            return Err(reject(args, "multisample on non-2D target"));
        }
        if args.last_level > 0 {
            return Err(reject(args, "multisample with mipmaps"));
        }
    }

    if args.last_level > 0 {
        if matches!(target, TextureTarget::Buffer | TextureTarget::Rect) {
            return Err(reject(args, "mipmaps on buffer or rect"));
        }
        let mut largest = args.width.max(args.height);
        if target == TextureTarget::Texture3D {
            largest = largest.max(args.depth);
        }
        let levels = u32::BITS - largest.leading_zeros();
        if args.last_level + 1 > levels + 1 {
            return Err(reject(args, "too many levels"));
        }
    }

    if args.flags != 0 {
        let valid = ResourceFlags::Y_0_TOP.bits() | RESOURCE_FLAG_MAP_PERSISTENT | RESOURCE_FLAG_MAP_COHERENT;
        if args.flags & !valid != 0 {
            return Err(reject(args, "unknown flags"));
        }
        if args.flags & ResourceFlags::Y_0_TOP.bits() != 0
            && !matches!(target, TextureTarget::Texture2D | TextureTarget::Rect)
        {
            return Err(reject(args, "y_0_top on non-2D target"));
        }
    }

    match target {
        TextureTarget::Cube if args.array_size != 6 => {
            return Err(reject(args, "cube without 6 faces"));
        }
        TextureTarget::CubeArray => {
            if !host.has(Feature::CubeMapArray) {
                return Err(reject(args, "no cube map array support"));
            }
            if args.array_size % 6 != 0 {
                return Err(reject(args, "cube array size not a multiple of 6"));
            }
        }
        TextureTarget::Texture1DArray | TextureTarget::Texture2DArray => {
            if !host.has(Feature::TextureArray) {
                return Err(reject(args, "no texture array support"));
            }
        }
        _ if args.array_size > 1 && target != TextureTarget::Cube => {
            return Err(reject(args, "array size on non-array target"));
        }
        _ => {}
    }

    let bind = args.bind;
    let buffer_only = BindFlags::CUSTOM.bits()
        | BIND_STAGING
        | BindFlags::INDEX_BUFFER.bits()
        | BindFlags::STREAM_OUTPUT.bits()
        | BindFlags::VERTEX_BUFFER.bits()
        | BindFlags::CONSTANT_BUFFER.bits()
        | BindFlags::QUERY_BUFFER.bits()
        | BindFlags::COMMAND_ARGS.bits()
        | BindFlags::SHADER_BUFFER.bits();
    if bind == 0 || (bind & buffer_only == bind) {
        if target != TextureTarget::Buffer {
            return Err(reject(args, "buffer bind on texture target"));
        }
        if args.height != 1 || args.depth != 1 {
            return Err(reject(args, "buffer with height or depth"));
        }
        let has_qbo = host.caps.gl_ver() >= 44 || host.caps.has_extension("GL_ARB_query_buffer_object");
        if bind == BindFlags::QUERY_BUFFER.bits() && !has_qbo {
            return Err(reject(args, "no query buffer support"));
        }
        if bind == BindFlags::COMMAND_ARGS.bits() && !host.has(Feature::IndirectDraw) {
            return Err(reject(args, "no indirect draw support"));
        }
        return Ok(());
    }

    let texture_binds = BindFlags::SAMPLER_VIEW.bits()
        | BindFlags::DEPTH_STENCIL.bits()
        | BindFlags::RENDER_TARGET.bits()
        | BindFlags::CURSOR.bits()
        | BIND_SHARED
        | BIND_LINEAR;
    if bind & texture_binds == 0 {
        return Err(reject(args, "no usable bind flag"));
    }

    let caps = &host.caps;
    match target {
        TextureTarget::Buffer => {
            if args.height != 1 || args.depth != 1 {
                return Err(reject(args, "buffer with height or depth"));
            }
            if bind & BindFlags::SAMPLER_VIEW.bits() != 0 && !host.has(Feature::TextureBuffer) {
                return Err(reject(args, "no texture buffer support"));
            }
        }
        TextureTarget::Texture2D
        | TextureTarget::Rect
        | TextureTarget::Texture2DArray
        | TextureTarget::Cube
        | TextureTarget::CubeArray => {
            if args.depth != 1 {
                return Err(reject(args, "2D target with depth"));
            }
            let max = if target.is_cube() {
                caps.max_texture_cube_size
            } else {
                caps.max_texture_2d_size
            };
            if args.width > max || args.height > max {
                return Err(reject(args, "texture too large"));
            }
            if target.is_cube() && args.width != args.height {
                return Err(reject(args, "cube faces not square"));
            }
        }
        TextureTarget::Texture1D | TextureTarget::Texture1DArray => {
            if args.height != 1 || args.depth != 1 {
                return Err(reject(args, "1D target with height or depth"));
            }
            if args.width > caps.max_texture_2d_size {
                return Err(reject(args, "texture too large"));
            }
        }
        TextureTarget::Texture3D => {
            let max = caps.max_texture_3d_size;
            if args.width > max || args.height > max || args.depth > max {
                return Err(reject(args, "texture too large"));
            }
        }
    }

    if let Some(desc) = desc {
        if bind & BindFlags::RENDER_TARGET.bits() != 0 && !desc.flags.contains(FormatFlags::RENDER) {
            return Err(reject(args, "format not renderable"));
        }
        if bind & BindFlags::DEPTH_STENCIL.bits() != 0
            && !desc.flags.contains(FormatFlags::DEPTH_STENCIL)
        {
            return Err(reject(args, "format not a depth/stencil format"));
        }
    }
    Ok(())
}

/// GL buffer target for a buffer resource's bind flags, `None` for host
/// memory storage.
fn buffer_gl_target(bind: BindFlags, raw: u32) -> RendererResult<Option<GLenum>> {
    if bind.contains(BindFlags::CUSTOM) || raw & BIND_STAGING != 0 {
        return Ok(None);
    }
    let target = if raw == 0 || bind.contains(BindFlags::VERTEX_BUFFER) {
        gl::ARRAY_BUFFER
    } else if bind.contains(BindFlags::INDEX_BUFFER) {
        gl::ELEMENT_ARRAY_BUFFER
    } else if bind.contains(BindFlags::STREAM_OUTPUT) {
        gl::TRANSFORM_FEEDBACK_BUFFER
    } else if bind.contains(BindFlags::CONSTANT_BUFFER) {
        gl::UNIFORM_BUFFER
    } else if bind.contains(BindFlags::QUERY_BUFFER) {
        gl::QUERY_BUFFER
    } else if bind.contains(BindFlags::COMMAND_ARGS) {
        gl::DRAW_INDIRECT_BUFFER
    } else if bind.contains(BindFlags::SHADER_BUFFER) {
        gl::ARRAY_BUFFER
    } else if bind.contains(BindFlags::SAMPLER_VIEW) {
        gl::TEXTURE_BUFFER
    } else {
        return Err(RendererError::Inval);
    };
    Ok(Some(target))
}

fn gl_texture_target(host: &Host, target: TextureTarget, nr_samples: u32) -> GLenum {
    let gl_target = target.to_gl(nr_samples);
    if !host.is_gles() {
        return gl_target;
    }
    match gl_target {
        gl::TEXTURE_RECTANGLE | gl::TEXTURE_1D => gl::TEXTURE_2D,
        gl::TEXTURE_1D_ARRAY => gl::TEXTURE_2D_ARRAY,
        other => other,
    }
}

fn check_out_of_memory(host: &Host) -> RendererResult<()> {
    if host.gl.get_error() == gl::OUT_OF_MEMORY {
        warn!("host out of memory allocating resource storage");
        return Err(RendererError::NoMem);
    }
    Ok(())
}

impl Resource {
    pub fn create(host: &Rc<Host>, args: &ResourceCreateArgs, iov: Option<Iov>) -> RendererResult<Self> {
        check_resource_valid(host, args)?;
        let target = TextureTarget::from_raw(args.target).ok_or(RendererError::Inval)?;
        let desc = format::lookup(args.format);
        let bind = BindFlags::from_bits_retain(args.bind);
        let flags = ResourceFlags::from_bits_retain(args.flags);

        let (storage, gl_target) = if target == TextureTarget::Buffer {
            match buffer_gl_target(bind, args.bind)? {
                None => (
                    Storage::System(RefCell::new(vec![0; args.width as usize])),
                    gl::NONE,
                ),
                Some(gl_target) => (Self::alloc_buffer(host, args, desc, gl_target)?, gl_target),
            }
        } else {
            let desc = desc.ok_or(RendererError::Inval)?;
            let gl_target = gl_texture_target(host, target, args.nr_samples);
            let tex = Self::alloc_texture(host, args, target, desc, gl_target)?;
            (Storage::Texture(tex), gl_target)
        };

        debug!(
            "created resource {} target {target:?} format {} {}x{}x{}",
            args.handle, args.format, args.width, args.height, args.depth
        );
        Ok(Self {
            handle: args.handle,
            target,
            format: args.format,
            desc,
            width: args.width,
            height: args.height,
            depth: args.depth,
            array_size: args.array_size.max(1),
            last_level: args.last_level,
            nr_samples: args.nr_samples,
            bind,
            flags,
            gl_target,
            storage,
            iov: RefCell::new(iov),
            readback: RefCell::new(None),
            tex_state: Cell::new(TexState::default()),
        })
    }

    fn alloc_buffer(
        host: &Rc<Host>,
        args: &ResourceCreateArgs,
        desc: Option<&'static FormatDesc>,
        target: GLenum,
    ) -> RendererResult<Storage> {
        let gl = &host.gl;
        let buffer = GlBuffer::new(gl);
        gl.bind_buffer(target, buffer.id());
        gl.buffer_data(target, args.width as usize, None, gl::STREAM_DRAW);
        check_out_of_memory(host)?;

        let tbo = if target == gl::TEXTURE_BUFFER {
            let tbo = GlTexture::new(gl);
            gl.bind_texture(gl::TEXTURE_BUFFER, tbo.id());
            let ifmt = desc.map_or(gl::R8, |d| d.internal_format);
            gl.tex_buffer(ifmt, buffer.id());
            Some(tbo)
        } else {
            None
        };
        Ok(Storage::Buffer { buffer, target, tbo })
    }

    fn alloc_texture(
        host: &Rc<Host>,
        args: &ResourceCreateArgs,
        target: TextureTarget,
        desc: &'static FormatDesc,
        gl_target: GLenum,
    ) -> RendererResult<GlTexture> {
        let ifmt = desc.internal_format;
        if args.width == 0 || ifmt == 0 {
            return Err(RendererError::Inval);
        }
        let gl = &host.gl;
        let tex = GlTexture::new(gl);
        gl.bind_texture(gl_target, tex.id());

        let (fmt, ty) = match desc.gl_format {
            0 => (gl::BGRA, gl::UNSIGNED_BYTE),
            f => (f, desc.gl_type),
        };
        let levels = args.last_level as i32 + 1;
        let width = args.width;
        let height = args.height.max(1);
        let use_storage =
            host.has(Feature::TextureStorage) && desc.flags.contains(FormatFlags::CAN_TEXTURE_STORAGE);
        let level_size = |value: u32, level: i32| minify(value, level as u32) as i32;

        match gl_target {
            gl::TEXTURE_2D_MULTISAMPLE | gl::TEXTURE_2D_MULTISAMPLE_ARRAY => {
                let samples = args.nr_samples as i32;
                let storage_ms = host.has(Feature::StorageMultisample);
                if gl_target == gl::TEXTURE_2D_MULTISAMPLE {
                    if storage_ms {
                        gl.tex_storage_2d_multisample(gl_target, samples, ifmt, width as i32, height as i32, true);
                    } else {
                        gl.tex_image_2d_multisample(gl_target, samples, ifmt, width as i32, height as i32, true);
                    }
                } else {
                    let layers = args.array_size.max(1) as i32;
                    if storage_ms {
                        gl.tex_storage_3d_multisample(gl_target, samples, ifmt, width as i32, height as i32, layers, true);
                    } else {
                        gl.tex_image_3d_multisample(gl_target, samples, ifmt, width as i32, height as i32, layers, true);
                    }
                }
            }
            gl::TEXTURE_CUBE_MAP => {
                if use_storage {
                    gl.tex_storage_2d(gl_target, levels, ifmt, width as i32, height as i32);
                } else {
                    for face in 0..6 {
                        for level in 0..levels {
                            gl.tex_image_2d(
                                gl::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                                level,
                                ifmt,
                                level_size(width, level),
                                level_size(height, level),
                                fmt,
                                ty,
                                None,
                            );
                        }
                    }
                }
            }
            gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP_ARRAY => {
                let is_3d = gl_target == gl::TEXTURE_3D;
                let depth = if is_3d { args.depth } else { args.array_size.max(1) };
                if use_storage {
                    gl.tex_storage_3d(gl_target, levels, ifmt, width as i32, height as i32, depth as i32);
                } else {
                    for level in 0..levels {
                        let d = if is_3d { level_size(depth, level) } else { depth as i32 };
                        gl.tex_image_3d(
                            gl_target,
                            level,
                            ifmt,
                            level_size(width, level),
                            level_size(height, level),
                            d,
                            fmt,
                            ty,
                            None,
                        );
                    }
                }
            }
            gl::TEXTURE_1D => {
                if use_storage {
                    gl.tex_storage_1d(gl_target, levels, ifmt, width as i32);
                } else {
                    for level in 0..levels {
                        gl.tex_image_1d(gl_target, level, ifmt, level_size(width, level), fmt, ty, None);
                    }
                }
            }
            _ => {
                let is_1d_array = target == TextureTarget::Texture1DArray;
                let rows = if is_1d_array { args.array_size.max(1) } else { height };
                if use_storage {
                    gl.tex_storage_2d(gl_target, levels, ifmt, width as i32, rows as i32);
                } else {
                    for level in 0..levels {
                        let h = if is_1d_array { rows as i32 } else { level_size(rows, level) };
                        gl.tex_image_2d(gl_target, level, ifmt, level_size(width, level), h, fmt, ty, None);
                    }
                }
            }
        }

        if !use_storage && args.nr_samples == 0 {
            gl.tex_parameter_i(gl_target, gl::TEXTURE_BASE_LEVEL, 0);
            gl.tex_parameter_i(gl_target, gl::TEXTURE_MAX_LEVEL, args.last_level as i32);
        }
        check_out_of_memory(host)?;
        Ok(tex)
    }

    pub fn is_buffer(&self) -> bool {
        self.target == TextureTarget::Buffer
    }

    pub fn y_0_top(&self) -> bool {
        self.flags.contains(ResourceFlags::Y_0_TOP)
    }

    /// GL name of the texture or buffer, 0 for host-memory storage.
    pub fn gl_id(&self) -> GLuint {
        match &self.storage {
            Storage::System(_) => 0,
            Storage::Buffer { buffer, .. } => buffer.id(),
            Storage::Texture(tex) => tex.id(),
        }
    }

    pub fn texture_id(&self) -> Option<GLuint> {
        match &self.storage {
            Storage::Texture(tex) => Some(tex.id()),
            Storage::Buffer { tbo: Some(tbo), .. } => Some(tbo.id()),
            _ => None,
        }
    }

    pub fn buffer_id(&self) -> Option<GLuint> {
        match &self.storage {
            Storage::Buffer { buffer, .. } => Some(buffer.id()),
            _ => None,
        }
    }

    /// Bytes per block; buffers without a table entry count bytes.
    pub fn elsize(&self) -> u32 {
        self.desc.map_or(1, |d| d.block_size.max(1))
    }

    pub fn level_width(&self, level: u32) -> u32 {
        minify(self.width, level)
    }

    pub fn level_height(&self, level: u32) -> u32 {
        minify(self.height, level)
    }

    pub fn level_depth(&self, level: u32) -> u32 {
        if self.target == TextureTarget::Texture3D {
            minify(self.depth, level)
        } else {
            self.array_size
        }
    }

    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            handle: self.handle,
            gl_id: self.gl_id(),
            virgl_format: self.format,
            width: self.width,
            height: self.height,
            depth: self.depth,
            stride: self.desc.map_or(self.width, |d| d.stride(self.width)),
            y_0_top: self.y_0_top(),
        }
    }

    /// Program texture swizzle and level clamps, skipping unchanged state.
    pub fn update_tex_state(&self, gl: &dyn virgl_gl::GlApi, state: TexState) {
        let Some(id) = self.texture_id() else {
            return;
        };
        let old = self.tex_state.get();
        if old == state {
            return;
        }
        gl.bind_texture(self.gl_target, id);
        if old.swizzle != state.swizzle {
            let pnames = [
                gl::TEXTURE_SWIZZLE_R,
                gl::TEXTURE_SWIZZLE_G,
                gl::TEXTURE_SWIZZLE_B,
                gl::TEXTURE_SWIZZLE_A,
            ];
            for (pname, value) in pnames.into_iter().zip(state.swizzle) {
                gl.tex_parameter_i(self.gl_target, pname, value as i32);
            }
        }
        if old.base_level != state.base_level {
            gl.tex_parameter_i(self.gl_target, gl::TEXTURE_BASE_LEVEL, state.base_level as i32);
        }
        if old.max_level != state.max_level {
            gl.tex_parameter_i(self.gl_target, gl::TEXTURE_MAX_LEVEL, state.max_level as i32);
        }
        if old.srgb_decode != state.srgb_decode {
            gl.tex_parameter_i(self.gl_target, TEXTURE_SRGB_DECODE_EXT, state.srgb_decode as i32);
        }
        self.tex_state.set(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use virgl_core::format::VirglFormat;
    use virgl_core::RendererConfig;
    use virgl_gl::mock::MockGl;
    use virgl_gl::GlApi;

    use crate::test_support::NullCallbacks;

    fn host(mock: &Arc<MockGl>) -> Rc<Host> {
        let gl: Arc<dyn GlApi> = mock.clone();
        Rc::new(Host::new(gl, Arc::new(NullCallbacks), RendererConfig::default()).unwrap())
    }

    fn tex2d(handle: Handle, w: u32, h: u32) -> ResourceCreateArgs {
        ResourceCreateArgs {
            handle,
            target: TextureTarget::Texture2D as u32,
            format: VirglFormat::R8G8B8A8_UNORM as u32,
            bind: BindFlags::SAMPLER_VIEW.bits() | BindFlags::RENDER_TARGET.bits(),
            width: w,
            height: h,
            depth: 1,
            array_size: 1,
            ..Default::default()
        }
    }

    fn buffer(handle: Handle, bind: u32, size: u32) -> ResourceCreateArgs {
        ResourceCreateArgs {
            handle,
            target: TextureTarget::Buffer as u32,
            format: VirglFormat::R8_UNORM as u32,
            bind,
            width: size,
            height: 1,
            depth: 1,
            array_size: 1,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_bad_arguments() {
        let mock = Arc::new(MockGl::new());
        let host = host(&mock);
        let check = |args: ResourceCreateArgs| check_resource_valid(&host, &args);

        assert_eq!(check(tex2d(0, 4, 4)), Err(RendererError::Inval));
        assert_eq!(check(ResourceCreateArgs { target: 9, ..tex2d(1, 4, 4) }), Err(RendererError::Inval));
        assert_eq!(check(ResourceCreateArgs { format: 400, ..tex2d(1, 4, 4) }), Err(RendererError::Inval));
        assert_eq!(check(ResourceCreateArgs { depth: 2, ..tex2d(1, 4, 4) }), Err(RendererError::Inval));
        assert_eq!(check(ResourceCreateArgs { last_level: 9, ..tex2d(1, 4, 4) }), Err(RendererError::Inval));
        assert!(check(ResourceCreateArgs { last_level: 2, ..tex2d(1, 4, 4) }).is_ok());

        // Vertex buffers must be 1-high buffers.
        let vb = BindFlags::VERTEX_BUFFER.bits();
        assert!(check(buffer(1, vb, 64)).is_ok());
        assert_eq!(check(ResourceCreateArgs { height: 2, ..buffer(1, vb, 64) }), Err(RendererError::Inval));
        assert_eq!(
            check(ResourceCreateArgs { bind: vb, ..tex2d(1, 4, 4) }),
            Err(RendererError::Inval)
        );
    }

    #[test]
    fn cube_and_flag_rules() {
        let mock = Arc::new(MockGl::new());
        let host = host(&mock);
        let cube = ResourceCreateArgs {
            target: TextureTarget::Cube as u32,
            array_size: 6,
            ..tex2d(3, 16, 16)
        };
        assert!(check_resource_valid(&host, &cube).is_ok());
        assert!(check_resource_valid(&host, &ResourceCreateArgs { array_size: 4, ..cube }).is_err());
        assert!(check_resource_valid(&host, &ResourceCreateArgs { height: 8, ..cube }).is_err());
        assert!(check_resource_valid(&host, &ResourceCreateArgs { flags: 1, ..cube }).is_err());
        assert!(check_resource_valid(&host, &ResourceCreateArgs { flags: 1, ..tex2d(3, 4, 4) }).is_ok());
        assert!(check_resource_valid(&host, &ResourceCreateArgs { flags: 1 << 5, ..tex2d(3, 4, 4) }).is_err());
    }

    #[test]
    fn depth_bind_needs_depth_format() {
        let mock = Arc::new(MockGl::new());
        let host = host(&mock);
        let args = ResourceCreateArgs {
            bind: BindFlags::DEPTH_STENCIL.bits(),
            ..tex2d(4, 8, 8)
        };
        assert!(check_resource_valid(&host, &args).is_err());
        let args = ResourceCreateArgs {
            format: VirglFormat::Z24_UNORM_S8_UINT as u32,
            ..args
        };
        assert!(check_resource_valid(&host, &args).is_ok());
    }

    #[test]
    fn storage_selection() {
        let mock = Arc::new(MockGl::new());
        let host = host(&mock);

        let custom = Resource::create(&host, &buffer(1, BindFlags::CUSTOM.bits(), 32), None).unwrap();
        assert!(matches!(custom.storage, Storage::System(_)));
        assert_eq!(custom.gl_id(), 0);

        let index = Resource::create(&host, &buffer(2, BindFlags::INDEX_BUFFER.bits(), 32), None).unwrap();
        assert!(matches!(
            index.storage,
            Storage::Buffer { target: gl::ELEMENT_ARRAY_BUFFER, .. }
        ));
        assert_eq!(mock.live_buffers(), 1);

        let tex = Resource::create(&host, &tex2d(3, 8, 8), None).unwrap();
        assert_eq!(tex.gl_target, gl::TEXTURE_2D);
        assert_eq!(mock.live_textures(), 1);
        drop(tex);
        drop(index);
        assert_eq!(mock.live_textures(), 0);
        assert_eq!(mock.live_buffers(), 0);
        assert_eq!(mock.bad_deletes(), 0);
    }
}
