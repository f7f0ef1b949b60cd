//! [`GlApi`] over the `gl` crate.
//!
//! Every call goes to the context current on the calling thread. Making the
//! right context current is the caller's job (see `RendererCallbacks`).

use std::ffi::{c_void, CStr, CString};
use std::sync::Once;

use gl::types::{GLboolean, GLchar, GLenum, GLint, GLsizei, GLuint};
use tracing::warn;

use crate::api::{GlApi, GlSync, ImageRegion, SyncStatus};

static GL_INIT_ONCE: Once = Once::new();

/// `glPolygonOffsetClamp`, which the generated bindings do not carry.
type PolygonOffsetClampFn = extern "system" fn(f32, f32, f32);

/// Native GL backend. Core function pointers are process-global.
#[derive(Debug)]
pub struct NativeGl {
    polygon_offset_clamp: Option<PolygonOffsetClampFn>,
}

impl NativeGl {
    /// Load GL function pointers (exactly once per process).
    ///
    /// A context must be current when this is first called.
    pub fn load() -> Self {
        GL_INIT_ONCE.call_once(|| {
            gl_loader::init_gl();
            gl::load_with(|s| gl_loader::get_proc_address(s).cast());
        });
        let polygon_offset_clamp = ["glPolygonOffsetClamp", "glPolygonOffsetClampEXT"]
            .into_iter()
            .find_map(|name| {
                let ptr = gl_loader::get_proc_address(name);
                // SAFETY: a non-null address for this name has the
                // `PolygonOffsetClamp` signature.
                (!ptr.is_null())
                    .then(|| unsafe { std::mem::transmute::<*const c_void, PolygonOffsetClampFn>(ptr.cast()) })
            });
        if polygon_offset_clamp.is_none() {
            warn!("glPolygonOffsetClamp not found, offset clamping is ignored");
        }
        Self { polygon_offset_clamp }
    }
}

fn gl_bool(value: bool) -> GLboolean {
    if value {
        gl::TRUE
    } else {
        gl::FALSE
    }
}

fn c_string(value: &str) -> CString {
    // Interior NULs cannot name a GL symbol; truncate at the first one.
    let bytes: Vec<u8> = value.bytes().take_while(|b| *b != 0).collect();
    CString::new(bytes).unwrap_or_default()
}

fn data_ptr(data: Option<&[u8]>) -> *const c_void {
    data.map_or(std::ptr::null(), |d| d.as_ptr().cast())
}

unsafe fn gl_str(ptr: *const u8) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr.cast()).to_string_lossy().into_owned())
}

unsafe fn info_log(id: GLuint, get_iv: unsafe fn(GLuint, GLenum, *mut GLint), get_log: unsafe fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar)) -> String {
    let mut len: GLint = 0;
    get_iv(id, gl::INFO_LOG_LENGTH, &mut len);
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u8; len as usize];
    let mut written: GLsizei = 0;
    get_log(id, len, &mut written, buf.as_mut_ptr().cast());
    buf.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buf).into_owned()
}

unsafe fn get_shader_iv(id: GLuint, pname: GLenum, out: *mut GLint) {
    gl::GetShaderiv(id, pname, out)
}

unsafe fn get_shader_log(id: GLuint, len: GLsizei, written: *mut GLsizei, buf: *mut GLchar) {
    gl::GetShaderInfoLog(id, len, written, buf)
}

unsafe fn get_program_iv(id: GLuint, pname: GLenum, out: *mut GLint) {
    gl::GetProgramiv(id, pname, out)
}

unsafe fn get_program_log(id: GLuint, len: GLsizei, written: *mut GLsizei, buf: *mut GLchar) {
    gl::GetProgramInfoLog(id, len, written, buf)
}

macro_rules! gen_one {
    ($f:path) => {{
        let mut id: GLuint = 0;
        unsafe { $f(1, &mut id) };
        id
    }};
}

macro_rules! delete_one {
    ($f:path, $id:expr) => {{
        let id: GLuint = $id;
        if id != 0 {
            unsafe { $f(1, &id) };
        }
    }};
}

impl GlApi for NativeGl {
    // ---------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------

    fn get_string(&self, name: GLenum) -> Option<String> {
        unsafe { gl_str(gl::GetString(name)) }
    }

    fn get_string_i(&self, name: GLenum, index: u32) -> Option<String> {
        unsafe { gl_str(gl::GetStringi(name, index)) }
    }

    fn get_integer_v(&self, pname: GLenum, out: &mut [i32]) {
        if out.is_empty() {
            return;
        }
        unsafe { gl::GetIntegerv(pname, out.as_mut_ptr()) }
    }

    fn get_float_v(&self, pname: GLenum, out: &mut [f32]) {
        if out.is_empty() {
            return;
        }
        unsafe { gl::GetFloatv(pname, out.as_mut_ptr()) }
    }

    fn get_error(&self) -> GLenum {
        unsafe { gl::GetError() }
    }

    // ---------------------------------------------------------------------------
    // Textures
    // ---------------------------------------------------------------------------

    fn gen_texture(&self) -> GLuint {
        gen_one!(gl::GenTextures)
    }

    fn delete_texture(&self, id: GLuint) {
        delete_one!(gl::DeleteTextures, id)
    }

    fn active_texture(&self, unit: u32) {
        unsafe { gl::ActiveTexture(gl::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: GLenum, id: GLuint) {
        unsafe { gl::BindTexture(target, id) }
    }

    fn tex_parameter_i(&self, target: GLenum, pname: GLenum, value: i32) {
        unsafe { gl::TexParameteri(target, pname, value) }
    }

    fn tex_parameter_f(&self, target: GLenum, pname: GLenum, value: f32) {
        unsafe { gl::TexParameterf(target, pname, value) }
    }

    fn tex_parameter_fv(&self, target: GLenum, pname: GLenum, value: &[f32; 4]) {
        unsafe { gl::TexParameterfv(target, pname, value.as_ptr()) }
    }

    fn tex_storage_1d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32) {
        unsafe { gl::TexStorage1D(target, levels, ifmt, width) }
    }

    fn tex_storage_2d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32, height: i32) {
        unsafe { gl::TexStorage2D(target, levels, ifmt, width, height) }
    }

    fn tex_storage_3d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32, height: i32, depth: i32) {
        unsafe { gl::TexStorage3D(target, levels, ifmt, width, height, depth) }
    }

    fn tex_storage_2d_multisample(&self, target: GLenum, samples: i32, ifmt: GLenum, width: i32, height: i32, fixed: bool) {
        unsafe { gl::TexStorage2DMultisample(target, samples, ifmt, width, height, gl_bool(fixed)) }
    }

    fn tex_storage_3d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        fixed: bool,
    ) {
        unsafe { gl::TexStorage3DMultisample(target, samples, ifmt, width, height, depth, gl_bool(fixed)) }
    }

    fn tex_image_2d_multisample(&self, target: GLenum, samples: i32, ifmt: GLenum, width: i32, height: i32, fixed: bool) {
        unsafe { gl::TexImage2DMultisample(target, samples, ifmt, width, height, gl_bool(fixed)) }
    }

    fn tex_image_3d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        fixed: bool,
    ) {
        unsafe { gl::TexImage3DMultisample(target, samples, ifmt, width, height, depth, gl_bool(fixed)) }
    }

    fn tex_image_1d(&self, target: GLenum, level: i32, ifmt: GLenum, width: i32, format: GLenum, ty: GLenum, data: Option<&[u8]>) {
        unsafe { gl::TexImage1D(target, level, ifmt as GLint, width, 0, format, ty, data_ptr(data)) }
    }

    fn tex_image_2d(
        &self,
        target: GLenum,
        level: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        format: GLenum,
        ty: GLenum,
        data: Option<&[u8]>,
    ) {
        unsafe { gl::TexImage2D(target, level, ifmt as GLint, width, height, 0, format, ty, data_ptr(data)) }
    }

    fn tex_image_3d(
        &self,
        target: GLenum,
        level: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        format: GLenum,
        ty: GLenum,
        data: Option<&[u8]>,
    ) {
        unsafe {
            gl::TexImage3D(target, level, ifmt as GLint, width, height, depth, 0, format, ty, data_ptr(data))
        }
    }

    fn tex_sub_image_1d(&self, target: GLenum, level: i32, x: i32, width: i32, format: GLenum, ty: GLenum, data: &[u8]) {
        unsafe { gl::TexSubImage1D(target, level, x, width, format, ty, data.as_ptr().cast()) }
    }

    fn tex_sub_image_2d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    ) {
        unsafe { gl::TexSubImage2D(target, level, x, y, width, height, format, ty, data.as_ptr().cast()) }
    }

    fn tex_sub_image_3d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    ) {
        unsafe {
            gl::TexSubImage3D(target, level, x, y, z, width, height, depth, format, ty, data.as_ptr().cast())
        }
    }

    fn compressed_tex_sub_image_2d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        ifmt: GLenum,
        data: &[u8],
    ) {
        unsafe {
            gl::CompressedTexSubImage2D(
                target,
                level,
                x,
                y,
                width,
                height,
                ifmt,
                data.len() as GLsizei,
                data.as_ptr().cast(),
            )
        }
    }

    fn compressed_tex_sub_image_3d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        ifmt: GLenum,
        data: &[u8],
    ) {
        unsafe {
            gl::CompressedTexSubImage3D(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                ifmt,
                data.len() as GLsizei,
                data.as_ptr().cast(),
            )
        }
    }

    fn get_tex_image(&self, target: GLenum, level: i32, format: GLenum, ty: GLenum, out: &mut [u8]) {
        unsafe { gl::GetTexImage(target, level, format, ty, out.as_mut_ptr().cast()) }
    }

    fn get_compressed_tex_image(&self, target: GLenum, level: i32, out: &mut [u8]) {
        unsafe { gl::GetCompressedTexImage(target, level, out.as_mut_ptr().cast()) }
    }

    fn tex_buffer(&self, ifmt: GLenum, buffer: GLuint) {
        unsafe { gl::TexBuffer(gl::TEXTURE_BUFFER, ifmt, buffer) }
    }

    fn tex_buffer_range(&self, ifmt: GLenum, buffer: GLuint, offset: usize, size: usize) {
        unsafe { gl::TexBufferRange(gl::TEXTURE_BUFFER, ifmt, buffer, offset as isize, size as isize) }
    }

    fn pixel_store_i(&self, pname: GLenum, value: i32) {
        unsafe { gl::PixelStorei(pname, value) }
    }

    // ---------------------------------------------------------------------------
    // Buffers
    // ---------------------------------------------------------------------------

    fn gen_buffer(&self) -> GLuint {
        gen_one!(gl::GenBuffers)
    }

    fn delete_buffer(&self, id: GLuint) {
        delete_one!(gl::DeleteBuffers, id)
    }

    fn bind_buffer(&self, target: GLenum, id: GLuint) {
        unsafe { gl::BindBuffer(target, id) }
    }

    fn buffer_data(&self, target: GLenum, size: usize, data: Option<&[u8]>, usage: GLenum) {
        unsafe { gl::BufferData(target, size as isize, data_ptr(data), usage) }
    }

    fn buffer_sub_data(&self, target: GLenum, offset: usize, data: &[u8]) {
        unsafe { gl::BufferSubData(target, offset as isize, data.len() as isize, data.as_ptr().cast()) }
    }

    fn get_buffer_sub_data(&self, target: GLenum, offset: usize, out: &mut [u8]) {
        unsafe { gl::GetBufferSubData(target, offset as isize, out.len() as isize, out.as_mut_ptr().cast()) }
    }

    unsafe fn map_buffer_range(&self, target: GLenum, offset: usize, len: usize, access: u32) -> *mut u8 {
        gl::MapBufferRange(target, offset as isize, len as isize, access).cast()
    }

    fn unmap_buffer(&self, target: GLenum) -> bool {
        unsafe { gl::UnmapBuffer(target) == gl::TRUE }
    }

    fn bind_buffer_base(&self, target: GLenum, index: u32, id: GLuint) {
        unsafe { gl::BindBufferBase(target, index, id) }
    }

    fn bind_buffer_range(&self, target: GLenum, index: u32, id: GLuint, offset: usize, size: usize) {
        unsafe { gl::BindBufferRange(target, index, id, offset as isize, size as isize) }
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: GLenum,
        write_target: GLenum,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        unsafe {
            gl::CopyBufferSubData(read_target, write_target, read_offset as isize, write_offset as isize, size as isize)
        }
    }

    // ---------------------------------------------------------------------------
    // Framebuffers
    // ---------------------------------------------------------------------------

    fn gen_framebuffer(&self) -> GLuint {
        gen_one!(gl::GenFramebuffers)
    }

    fn delete_framebuffer(&self, id: GLuint) {
        delete_one!(gl::DeleteFramebuffers, id)
    }

    fn bind_framebuffer(&self, target: GLenum, id: GLuint) {
        unsafe { gl::BindFramebuffer(target, id) }
    }

    fn framebuffer_texture(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: i32) {
        unsafe { gl::FramebufferTexture(target, attachment, texture, level) }
    }

    fn framebuffer_texture_2d(&self, target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: i32) {
        unsafe { gl::FramebufferTexture2D(target, attachment, textarget, texture, level) }
    }

    fn framebuffer_texture_layer(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: i32, layer: i32) {
        unsafe { gl::FramebufferTextureLayer(target, attachment, texture, level, layer) }
    }

    fn framebuffer_parameter_i(&self, target: GLenum, pname: GLenum, value: i32) {
        unsafe { gl::FramebufferParameteri(target, pname, value) }
    }

    fn check_framebuffer_status(&self, target: GLenum) -> GLenum {
        unsafe { gl::CheckFramebufferStatus(target) }
    }

    fn draw_buffers(&self, buffers: &[GLenum]) {
        unsafe { gl::DrawBuffers(buffers.len() as GLsizei, buffers.as_ptr()) }
    }

    fn read_buffer(&self, mode: GLenum) {
        unsafe { gl::ReadBuffer(mode) }
    }

    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: GLenum) {
        unsafe {
            gl::BlitFramebuffer(src[0], src[1], src[2], src[3], dst[0], dst[1], dst[2], dst[3], mask, filter)
        }
    }

    fn read_pixels(&self, x: i32, y: i32, width: i32, height: i32, format: GLenum, ty: GLenum, out: &mut [u8]) {
        unsafe { gl::ReadPixels(x, y, width, height, format, ty, out.as_mut_ptr().cast()) }
    }

    fn copy_image_sub_data(&self, src: ImageRegion, dst: ImageRegion, width: i32, height: i32, depth: i32) {
        unsafe {
            gl::CopyImageSubData(
                src.name, src.target, src.level, src.x, src.y, src.z, dst.name, dst.target, dst.level, dst.x,
                dst.y, dst.z, width, height, depth,
            )
        }
    }

    // ---------------------------------------------------------------------------
    // Shaders and programs
    // ---------------------------------------------------------------------------

    fn create_shader(&self, ty: GLenum) -> GLuint {
        unsafe { gl::CreateShader(ty) }
    }

    fn shader_source(&self, id: GLuint, source: &str) {
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(id, 1, &ptr, &len) }
    }

    fn compile_shader(&self, id: GLuint) -> bool {
        let mut status: GLint = 0;
        unsafe {
            gl::CompileShader(id);
            gl::GetShaderiv(id, gl::COMPILE_STATUS, &mut status);
        }
        status == gl::TRUE as GLint
    }

    fn shader_info_log(&self, id: GLuint) -> String {
        unsafe { info_log(id, get_shader_iv, get_shader_log) }
    }

    fn delete_shader(&self, id: GLuint) {
        unsafe { gl::DeleteShader(id) }
    }

    fn create_program(&self) -> GLuint {
        unsafe { gl::CreateProgram() }
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::AttachShader(program, shader) }
    }

    fn link_program(&self, program: GLuint) -> bool {
        let mut status: GLint = 0;
        unsafe {
            gl::LinkProgram(program);
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
        }
        status == gl::TRUE as GLint
    }

    fn program_info_log(&self, program: GLuint) -> String {
        unsafe { info_log(program, get_program_iv, get_program_log) }
    }

    fn delete_program(&self, program: GLuint) {
        unsafe { gl::DeleteProgram(program) }
    }

    fn use_program(&self, program: GLuint) {
        unsafe { gl::UseProgram(program) }
    }

    fn get_uniform_location(&self, program: GLuint, name: &str) -> i32 {
        let name = c_string(name);
        unsafe { gl::GetUniformLocation(program, name.as_ptr()) }
    }

    fn get_attrib_location(&self, program: GLuint, name: &str) -> i32 {
        let name = c_string(name);
        unsafe { gl::GetAttribLocation(program, name.as_ptr()) }
    }

    fn bind_attrib_location(&self, program: GLuint, index: u32, name: &str) {
        let name = c_string(name);
        unsafe { gl::BindAttribLocation(program, index, name.as_ptr()) }
    }

    fn get_uniform_block_index(&self, program: GLuint, name: &str) -> u32 {
        let name = c_string(name);
        unsafe { gl::GetUniformBlockIndex(program, name.as_ptr()) }
    }

    fn uniform_block_binding(&self, program: GLuint, index: u32, binding: u32) {
        unsafe { gl::UniformBlockBinding(program, index, binding) }
    }

    fn get_program_resource_index(&self, program: GLuint, interface: GLenum, name: &str) -> u32 {
        let name = c_string(name);
        unsafe { gl::GetProgramResourceIndex(program, interface, name.as_ptr()) }
    }

    fn shader_storage_block_binding(&self, program: GLuint, index: u32, binding: u32) {
        unsafe { gl::ShaderStorageBlockBinding(program, index, binding) }
    }

    fn transform_feedback_varyings(&self, program: GLuint, varyings: &[String], mode: GLenum) {
        let names: Vec<CString> = varyings.iter().map(|v| c_string(v)).collect();
        let ptrs: Vec<*const GLchar> = names.iter().map(|n| n.as_ptr()).collect();
        unsafe { gl::TransformFeedbackVaryings(program, ptrs.len() as GLsizei, ptrs.as_ptr(), mode) }
    }

    fn bind_frag_data_location_indexed(&self, program: GLuint, color: u32, index: u32, name: &str) {
        let name = c_string(name);
        unsafe { gl::BindFragDataLocationIndexed(program, color, index, name.as_ptr()) }
    }

    fn uniform_1i(&self, location: i32, value: i32) {
        unsafe { gl::Uniform1i(location, value) }
    }

    fn uniform_1f(&self, location: i32, value: f32) {
        unsafe { gl::Uniform1f(location, value) }
    }

    fn uniform_4fv(&self, location: i32, values: &[f32]) {
        let count = (values.len() / 4) as GLsizei;
        if count > 0 {
            unsafe { gl::Uniform4fv(location, count, values.as_ptr()) }
        }
    }

    fn uniform_4uiv(&self, location: i32, values: &[u32]) {
        let count = (values.len() / 4) as GLsizei;
        if count > 0 {
            unsafe { gl::Uniform4uiv(location, count, values.as_ptr()) }
        }
    }

    // ---------------------------------------------------------------------------
    // Fixed function
    // ---------------------------------------------------------------------------

    fn enable(&self, cap: GLenum) {
        unsafe { gl::Enable(cap) }
    }

    fn disable(&self, cap: GLenum) {
        unsafe { gl::Disable(cap) }
    }

    fn enable_i(&self, cap: GLenum, index: u32) {
        unsafe { gl::Enablei(cap, index) }
    }

    fn disable_i(&self, cap: GLenum, index: u32) {
        unsafe { gl::Disablei(cap, index) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { gl::Viewport(x, y, width, height) }
    }

    fn viewport_indexed(&self, index: u32, x: f32, y: f32, width: f32, height: f32) {
        unsafe { gl::ViewportIndexedf(index, x, y, width, height) }
    }

    fn depth_range(&self, near: f64, far: f64) {
        unsafe { gl::DepthRange(near, far) }
    }

    fn depth_range_indexed(&self, index: u32, near: f64, far: f64) {
        unsafe { gl::DepthRangeIndexed(index, near, far) }
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { gl::Scissor(x, y, width, height) }
    }

    fn scissor_indexed(&self, index: u32, x: i32, y: i32, width: i32, height: i32) {
        unsafe { gl::ScissorIndexed(index, x, y, width, height) }
    }

    fn front_face(&self, mode: GLenum) {
        unsafe { gl::FrontFace(mode) }
    }

    fn cull_face(&self, mode: GLenum) {
        unsafe { gl::CullFace(mode) }
    }

    fn polygon_mode(&self, face: GLenum, mode: GLenum) {
        unsafe { gl::PolygonMode(face, mode) }
    }

    fn line_width(&self, width: f32) {
        unsafe { gl::LineWidth(width) }
    }

    fn point_size(&self, size: f32) {
        unsafe { gl::PointSize(size) }
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        unsafe { gl::PolygonOffset(factor, units) }
    }

    fn polygon_offset_clamp(&self, factor: f32, units: f32, clamp: f32) {
        match self.polygon_offset_clamp {
            Some(clamped) => clamped(factor, units, clamp),
            None => unsafe { gl::PolygonOffset(factor, units) },
        }
    }

    fn stencil_func_separate(&self, face: GLenum, func: GLenum, reference: i32, mask: u32) {
        unsafe { gl::StencilFuncSeparate(face, func, reference, mask) }
    }

    fn stencil_op_separate(&self, face: GLenum, sfail: GLenum, dpfail: GLenum, dppass: GLenum) {
        unsafe { gl::StencilOpSeparate(face, sfail, dpfail, dppass) }
    }

    fn stencil_mask_separate(&self, face: GLenum, mask: u32) {
        unsafe { gl::StencilMaskSeparate(face, mask) }
    }

    fn depth_func(&self, func: GLenum) {
        unsafe { gl::DepthFunc(func) }
    }

    fn depth_mask(&self, enable: bool) {
        unsafe { gl::DepthMask(gl_bool(enable)) }
    }

    fn blend_func_separate(&self, src_rgb: GLenum, dst_rgb: GLenum, src_a: GLenum, dst_a: GLenum) {
        unsafe { gl::BlendFuncSeparate(src_rgb, dst_rgb, src_a, dst_a) }
    }

    fn blend_func_separate_i(&self, buf: u32, src_rgb: GLenum, dst_rgb: GLenum, src_a: GLenum, dst_a: GLenum) {
        unsafe { gl::BlendFuncSeparatei(buf, src_rgb, dst_rgb, src_a, dst_a) }
    }

    fn blend_equation_separate(&self, rgb: GLenum, alpha: GLenum) {
        unsafe { gl::BlendEquationSeparate(rgb, alpha) }
    }

    fn blend_equation_separate_i(&self, buf: u32, rgb: GLenum, alpha: GLenum) {
        unsafe { gl::BlendEquationSeparatei(buf, rgb, alpha) }
    }

    fn blend_color(&self, color: [f32; 4]) {
        unsafe { gl::BlendColor(color[0], color[1], color[2], color[3]) }
    }

    fn color_mask(&self, mask: [bool; 4]) {
        unsafe { gl::ColorMask(gl_bool(mask[0]), gl_bool(mask[1]), gl_bool(mask[2]), gl_bool(mask[3])) }
    }

    fn color_mask_i(&self, buf: u32, mask: [bool; 4]) {
        unsafe {
            gl::ColorMaski(buf, gl_bool(mask[0]), gl_bool(mask[1]), gl_bool(mask[2]), gl_bool(mask[3]))
        }
    }

    fn logic_op(&self, op: GLenum) {
        unsafe { gl::LogicOp(op) }
    }

    fn clear_color(&self, color: [f32; 4]) {
        unsafe { gl::ClearColor(color[0], color[1], color[2], color[3]) }
    }

    fn clear_depth(&self, depth: f64) {
        unsafe { gl::ClearDepth(depth) }
    }

    fn clear_stencil(&self, stencil: i32) {
        unsafe { gl::ClearStencil(stencil) }
    }

    fn clear(&self, mask: u32) {
        unsafe { gl::Clear(mask) }
    }

    fn clear_buffer_fv(&self, buffer: GLenum, draw_buffer: i32, value: &[f32; 4]) {
        unsafe { gl::ClearBufferfv(buffer, draw_buffer, value.as_ptr()) }
    }

    fn clear_buffer_iv(&self, buffer: GLenum, draw_buffer: i32, value: &[i32; 4]) {
        unsafe { gl::ClearBufferiv(buffer, draw_buffer, value.as_ptr()) }
    }

    fn clear_buffer_uiv(&self, buffer: GLenum, draw_buffer: i32, value: &[u32; 4]) {
        unsafe { gl::ClearBufferuiv(buffer, draw_buffer, value.as_ptr()) }
    }

    fn sample_mask_i(&self, index: u32, mask: u32) {
        unsafe { gl::SampleMaski(index, mask) }
    }

    fn min_sample_shading(&self, value: f32) {
        unsafe { gl::MinSampleShading(value) }
    }

    fn patch_parameter_i(&self, pname: GLenum, value: i32) {
        unsafe { gl::PatchParameteri(pname, value) }
    }

    fn patch_parameter_fv(&self, pname: GLenum, values: &[f32]) {
        unsafe { gl::PatchParameterfv(pname, values.as_ptr()) }
    }

    fn primitive_restart_index(&self, index: u32) {
        unsafe { gl::PrimitiveRestartIndex(index) }
    }

    fn provoking_vertex(&self, mode: GLenum) {
        unsafe { gl::ProvokingVertex(mode) }
    }

    // ---------------------------------------------------------------------------
    // Vertex arrays
    // ---------------------------------------------------------------------------

    fn gen_vertex_array(&self) -> GLuint {
        gen_one!(gl::GenVertexArrays)
    }

    fn delete_vertex_array(&self, id: GLuint) {
        delete_one!(gl::DeleteVertexArrays, id)
    }

    fn bind_vertex_array(&self, id: GLuint) {
        unsafe { gl::BindVertexArray(id) }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { gl::EnableVertexAttribArray(index) }
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        unsafe { gl::DisableVertexAttribArray(index) }
    }

    fn vertex_attrib_pointer(&self, index: u32, size: i32, ty: GLenum, normalized: bool, stride: i32, offset: usize) {
        unsafe { gl::VertexAttribPointer(index, size, ty, gl_bool(normalized), stride, offset as *const c_void) }
    }

    fn vertex_attrib_i_pointer(&self, index: u32, size: i32, ty: GLenum, stride: i32, offset: usize) {
        unsafe { gl::VertexAttribIPointer(index, size, ty, stride, offset as *const c_void) }
    }

    fn vertex_attrib_divisor(&self, index: u32, divisor: u32) {
        unsafe { gl::VertexAttribDivisor(index, divisor) }
    }

    // ---------------------------------------------------------------------------
    // Draws and compute
    // ---------------------------------------------------------------------------

    fn draw_arrays(&self, mode: GLenum, first: i32, count: i32) {
        unsafe { gl::DrawArrays(mode, first, count) }
    }

    fn draw_arrays_instanced(&self, mode: GLenum, first: i32, count: i32, instances: i32) {
        unsafe { gl::DrawArraysInstanced(mode, first, count, instances) }
    }

    fn draw_arrays_instanced_base_instance(&self, mode: GLenum, first: i32, count: i32, instances: i32, base_instance: u32) {
        unsafe { gl::DrawArraysInstancedBaseInstance(mode, first, count, instances, base_instance) }
    }

    fn draw_elements_base_vertex(&self, mode: GLenum, count: i32, ty: GLenum, offset: usize, base_vertex: i32) {
        unsafe { gl::DrawElementsBaseVertex(mode, count, ty, offset as *const c_void, base_vertex) }
    }

    fn draw_elements_instanced_base_vertex(
        &self,
        mode: GLenum,
        count: i32,
        ty: GLenum,
        offset: usize,
        instances: i32,
        base_vertex: i32,
    ) {
        unsafe {
            gl::DrawElementsInstancedBaseVertex(mode, count, ty, offset as *const c_void, instances, base_vertex)
        }
    }

    fn draw_range_elements_base_vertex(
        &self,
        mode: GLenum,
        start: u32,
        end: u32,
        count: i32,
        ty: GLenum,
        offset: usize,
        base_vertex: i32,
    ) {
        unsafe {
            gl::DrawRangeElementsBaseVertex(mode, start, end, count, ty, offset as *const c_void, base_vertex)
        }
    }

    fn draw_arrays_indirect(&self, mode: GLenum, offset: usize) {
        unsafe { gl::DrawArraysIndirect(mode, offset as *const c_void) }
    }

    fn draw_elements_indirect(&self, mode: GLenum, ty: GLenum, offset: usize) {
        unsafe { gl::DrawElementsIndirect(mode, ty, offset as *const c_void) }
    }

    fn dispatch_compute(&self, x: u32, y: u32, z: u32) {
        unsafe { gl::DispatchCompute(x, y, z) }
    }

    fn dispatch_compute_indirect(&self, offset: usize) {
        unsafe { gl::DispatchComputeIndirect(offset as isize) }
    }

    fn memory_barrier(&self, bits: u32) {
        unsafe { gl::MemoryBarrier(bits) }
    }

    fn texture_barrier(&self) {
        unsafe { gl::TextureBarrier() }
    }

    // ---------------------------------------------------------------------------
    // Samplers and images
    // ---------------------------------------------------------------------------

    fn gen_sampler(&self) -> GLuint {
        gen_one!(gl::GenSamplers)
    }

    fn delete_sampler(&self, id: GLuint) {
        delete_one!(gl::DeleteSamplers, id)
    }

    fn bind_sampler(&self, unit: u32, id: GLuint) {
        unsafe { gl::BindSampler(unit, id) }
    }

    fn sampler_parameter_i(&self, id: GLuint, pname: GLenum, value: i32) {
        unsafe { gl::SamplerParameteri(id, pname, value) }
    }

    fn sampler_parameter_f(&self, id: GLuint, pname: GLenum, value: f32) {
        unsafe { gl::SamplerParameterf(id, pname, value) }
    }

    fn sampler_parameter_fv(&self, id: GLuint, pname: GLenum, value: &[f32; 4]) {
        unsafe { gl::SamplerParameterfv(id, pname, value.as_ptr()) }
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        texture: GLuint,
        level: i32,
        layered: bool,
        layer: i32,
        access: GLenum,
        format: GLenum,
    ) {
        unsafe { gl::BindImageTexture(unit, texture, level, gl_bool(layered), layer, access, format) }
    }

    // ---------------------------------------------------------------------------
    // Transform feedback
    // ---------------------------------------------------------------------------

    fn gen_transform_feedback(&self) -> GLuint {
        gen_one!(gl::GenTransformFeedbacks)
    }

    fn delete_transform_feedback(&self, id: GLuint) {
        delete_one!(gl::DeleteTransformFeedbacks, id)
    }

    fn bind_transform_feedback(&self, id: GLuint) {
        unsafe { gl::BindTransformFeedback(gl::TRANSFORM_FEEDBACK, id) }
    }

    fn begin_transform_feedback(&self, mode: GLenum) {
        unsafe { gl::BeginTransformFeedback(mode) }
    }

    fn end_transform_feedback(&self) {
        unsafe { gl::EndTransformFeedback() }
    }

    fn pause_transform_feedback(&self) {
        unsafe { gl::PauseTransformFeedback() }
    }

    fn resume_transform_feedback(&self) {
        unsafe { gl::ResumeTransformFeedback() }
    }

    // ---------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------

    fn gen_query(&self) -> GLuint {
        gen_one!(gl::GenQueries)
    }

    fn delete_query(&self, id: GLuint) {
        delete_one!(gl::DeleteQueries, id)
    }

    fn begin_query(&self, target: GLenum, id: GLuint) {
        unsafe { gl::BeginQuery(target, id) }
    }

    fn end_query(&self, target: GLenum) {
        unsafe { gl::EndQuery(target) }
    }

    fn begin_query_indexed(&self, target: GLenum, index: u32, id: GLuint) {
        unsafe { gl::BeginQueryIndexed(target, index, id) }
    }

    fn end_query_indexed(&self, target: GLenum, index: u32) {
        unsafe { gl::EndQueryIndexed(target, index) }
    }

    fn query_counter(&self, id: GLuint, target: GLenum) {
        unsafe { gl::QueryCounter(id, target) }
    }

    fn get_query_object_u64(&self, id: GLuint, pname: GLenum) -> u64 {
        let mut value: u64 = 0;
        unsafe { gl::GetQueryObjectui64v(id, pname, &mut value) };
        value
    }

    fn begin_conditional_render(&self, id: GLuint, mode: GLenum) {
        unsafe { gl::BeginConditionalRender(id, mode) }
    }

    fn end_conditional_render(&self) {
        unsafe { gl::EndConditionalRender() }
    }

    // ---------------------------------------------------------------------------
    // Sync
    // ---------------------------------------------------------------------------

    fn fence_sync(&self) -> GlSync {
        let sync = unsafe { gl::FenceSync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0) };
        if sync.is_null() {
            warn!("glFenceSync returned null");
        }
        GlSync(sync as usize)
    }

    fn client_wait_sync(&self, sync: GlSync, flush: bool, timeout_ns: u64) -> SyncStatus {
        let flags = if flush { gl::SYNC_FLUSH_COMMANDS_BIT } else { 0 };
        let status = unsafe { gl::ClientWaitSync(sync.0 as gl::types::GLsync, flags, timeout_ns) };
        SyncStatus::from_gl(status)
    }

    fn delete_sync(&self, sync: GlSync) {
        if sync.0 != 0 {
            unsafe { gl::DeleteSync(sync.0 as gl::types::GLsync) }
        }
    }

    fn flush(&self) {
        unsafe { gl::Flush() }
    }

    fn finish(&self) {
        unsafe { gl::Finish() }
    }
}
