//! The GL entry points the renderer needs.
//!
//! Everything above this crate talks to GL through [`GlApi`]. The native
//! backend forwards to the `gl` crate against whatever context is current on
//! the calling thread; the mock backend keeps textures and buffers in memory
//! so the state machine can be exercised without a GPU.
//!
//! Texture units are passed as indices (`0..N`), never as `GL_TEXTUREi`.

use gl::types::{GLenum, GLuint};

/// Opaque fence handle returned by [`GlApi::fence_sync`].
///
/// Stored as an integer so fences can cross to the sync thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlSync(pub usize);

/// Outcome of [`GlApi::client_wait_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    AlreadySignaled,
    ConditionSatisfied,
    TimeoutExpired,
    WaitFailed,
}

impl SyncStatus {
    pub fn is_signalled(self) -> bool {
        matches!(self, SyncStatus::AlreadySignaled | SyncStatus::ConditionSatisfied)
    }

    pub fn from_gl(value: GLenum) -> Self {
        match value {
            gl::ALREADY_SIGNALED => SyncStatus::AlreadySignaled,
            gl::CONDITION_SATISFIED => SyncStatus::ConditionSatisfied,
            gl::TIMEOUT_EXPIRED => SyncStatus::TimeoutExpired,
            _ => SyncStatus::WaitFailed,
        }
    }
}

/// One side of a `glCopyImageSubData` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    pub name: GLuint,
    pub target: GLenum,
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

pub trait GlApi: Send + Sync {
    // -- queries ------------------------------------------------------------
    fn get_string(&self, name: GLenum) -> Option<String>;
    fn get_string_i(&self, name: GLenum, index: u32) -> Option<String>;
    fn get_integer_v(&self, pname: GLenum, out: &mut [i32]);
    fn get_float_v(&self, pname: GLenum, out: &mut [f32]);
    fn get_error(&self) -> GLenum;

    fn get_integer(&self, pname: GLenum) -> i32 {
        let mut value = [0];
        self.get_integer_v(pname, &mut value);
        value[0]
    }

    // -- textures -----------------------------------------------------------
    fn gen_texture(&self) -> GLuint;
    fn delete_texture(&self, id: GLuint);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: GLenum, id: GLuint);
    fn tex_parameter_i(&self, target: GLenum, pname: GLenum, value: i32);
    fn tex_parameter_f(&self, target: GLenum, pname: GLenum, value: f32);
    fn tex_parameter_fv(&self, target: GLenum, pname: GLenum, value: &[f32; 4]);
    fn tex_storage_1d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32);
    fn tex_storage_2d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32, height: i32);
    fn tex_storage_3d(
        &self,
        target: GLenum,
        levels: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
    );
    fn tex_storage_2d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        fixed: bool,
    );
    fn tex_storage_3d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        fixed: bool,
    );
    fn tex_image_2d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        fixed: bool,
    );
    fn tex_image_3d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        fixed: bool,
    );
    fn tex_image_1d(
        &self,
        target: GLenum,
        level: i32,
        ifmt: GLenum,
        width: i32,
        format: GLenum,
        ty: GLenum,
        data: Option<&[u8]>,
    );
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
    );
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
    );
    fn tex_sub_image_1d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        width: i32,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    );
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
    );
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
    );
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
    );
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
    );
    fn get_tex_image(&self, target: GLenum, level: i32, format: GLenum, ty: GLenum, out: &mut [u8]);
    fn get_compressed_tex_image(&self, target: GLenum, level: i32, out: &mut [u8]);
    fn tex_buffer(&self, ifmt: GLenum, buffer: GLuint);
    fn tex_buffer_range(&self, ifmt: GLenum, buffer: GLuint, offset: usize, size: usize);
    fn pixel_store_i(&self, pname: GLenum, value: i32);

    // -- buffers ------------------------------------------------------------
    fn gen_buffer(&self) -> GLuint;
    fn delete_buffer(&self, id: GLuint);
    fn bind_buffer(&self, target: GLenum, id: GLuint);
    fn buffer_data(&self, target: GLenum, size: usize, data: Option<&[u8]>, usage: GLenum);
    fn buffer_sub_data(&self, target: GLenum, offset: usize, data: &[u8]);
    fn get_buffer_sub_data(&self, target: GLenum, offset: usize, out: &mut [u8]);
    /// Map a range of the buffer bound to `target`.
    ///
    /// # Safety
    ///
    /// The returned pointer is valid for `len` bytes until [`GlApi::unmap_buffer`]
    /// is called for the same target. It is null on failure.
    unsafe fn map_buffer_range(&self, target: GLenum, offset: usize, len: usize, access: u32) -> *mut u8;
    fn unmap_buffer(&self, target: GLenum) -> bool;
    fn bind_buffer_base(&self, target: GLenum, index: u32, id: GLuint);
    fn bind_buffer_range(&self, target: GLenum, index: u32, id: GLuint, offset: usize, size: usize);
    fn copy_buffer_sub_data(
        &self,
        read_target: GLenum,
        write_target: GLenum,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    );

    // -- framebuffers -------------------------------------------------------
    fn gen_framebuffer(&self) -> GLuint;
    fn delete_framebuffer(&self, id: GLuint);
    fn bind_framebuffer(&self, target: GLenum, id: GLuint);
    fn framebuffer_texture(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: i32);
    fn framebuffer_texture_2d(
        &self,
        target: GLenum,
        attachment: GLenum,
        textarget: GLenum,
        texture: GLuint,
        level: i32,
    );
    fn framebuffer_texture_layer(
        &self,
        target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        level: i32,
        layer: i32,
    );
    fn framebuffer_parameter_i(&self, target: GLenum, pname: GLenum, value: i32);
    fn check_framebuffer_status(&self, target: GLenum) -> GLenum;
    fn draw_buffers(&self, buffers: &[GLenum]);
    fn read_buffer(&self, mode: GLenum);
    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: GLenum);
    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: GLenum,
        ty: GLenum,
        out: &mut [u8],
    );
    fn copy_image_sub_data(&self, src: ImageRegion, dst: ImageRegion, width: i32, height: i32, depth: i32);

    // -- shaders and programs -----------------------------------------------
    fn create_shader(&self, ty: GLenum) -> GLuint;
    fn shader_source(&self, id: GLuint, source: &str);
    /// Compile and report `COMPILE_STATUS`.
    fn compile_shader(&self, id: GLuint) -> bool;
    fn shader_info_log(&self, id: GLuint) -> String;
    fn delete_shader(&self, id: GLuint);
    fn create_program(&self) -> GLuint;
    fn attach_shader(&self, program: GLuint, shader: GLuint);
    /// Link and report `LINK_STATUS`.
    fn link_program(&self, program: GLuint) -> bool;
    fn program_info_log(&self, program: GLuint) -> String;
    fn delete_program(&self, program: GLuint);
    fn use_program(&self, program: GLuint);
    fn get_uniform_location(&self, program: GLuint, name: &str) -> i32;
    fn get_attrib_location(&self, program: GLuint, name: &str) -> i32;
    fn bind_attrib_location(&self, program: GLuint, index: u32, name: &str);
    fn get_uniform_block_index(&self, program: GLuint, name: &str) -> u32;
    fn uniform_block_binding(&self, program: GLuint, index: u32, binding: u32);
    fn get_program_resource_index(&self, program: GLuint, interface: GLenum, name: &str) -> u32;
    fn shader_storage_block_binding(&self, program: GLuint, index: u32, binding: u32);
    fn transform_feedback_varyings(&self, program: GLuint, varyings: &[String], mode: GLenum);
    fn bind_frag_data_location_indexed(&self, program: GLuint, color: u32, index: u32, name: &str);
    fn uniform_1i(&self, location: i32, value: i32);
    fn uniform_1f(&self, location: i32, value: f32);
    fn uniform_4fv(&self, location: i32, values: &[f32]);
    fn uniform_4uiv(&self, location: i32, values: &[u32]);

    // -- fixed function -----------------------------------------------------
    fn enable(&self, cap: GLenum);
    fn disable(&self, cap: GLenum);
    fn enable_i(&self, cap: GLenum, index: u32);
    fn disable_i(&self, cap: GLenum, index: u32);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn viewport_indexed(&self, index: u32, x: f32, y: f32, width: f32, height: f32);
    fn depth_range(&self, near: f64, far: f64);
    fn depth_range_indexed(&self, index: u32, near: f64, far: f64);
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    fn scissor_indexed(&self, index: u32, x: i32, y: i32, width: i32, height: i32);
    fn front_face(&self, mode: GLenum);
    fn cull_face(&self, mode: GLenum);
    fn polygon_mode(&self, face: GLenum, mode: GLenum);
    fn line_width(&self, width: f32);
    fn point_size(&self, size: f32);
    fn polygon_offset(&self, factor: f32, units: f32);
    fn polygon_offset_clamp(&self, factor: f32, units: f32, clamp: f32);
    fn stencil_func_separate(&self, face: GLenum, func: GLenum, reference: i32, mask: u32);
    fn stencil_op_separate(&self, face: GLenum, sfail: GLenum, dpfail: GLenum, dppass: GLenum);
    fn stencil_mask_separate(&self, face: GLenum, mask: u32);
    fn depth_func(&self, func: GLenum);
    fn depth_mask(&self, enable: bool);
    fn blend_func_separate(&self, src_rgb: GLenum, dst_rgb: GLenum, src_a: GLenum, dst_a: GLenum);
    fn blend_func_separate_i(
        &self,
        buf: u32,
        src_rgb: GLenum,
        dst_rgb: GLenum,
        src_a: GLenum,
        dst_a: GLenum,
    );
    fn blend_equation_separate(&self, rgb: GLenum, alpha: GLenum);
    fn blend_equation_separate_i(&self, buf: u32, rgb: GLenum, alpha: GLenum);
    fn blend_color(&self, color: [f32; 4]);
    fn color_mask(&self, mask: [bool; 4]);
    fn color_mask_i(&self, buf: u32, mask: [bool; 4]);
    fn logic_op(&self, op: GLenum);
    fn clear_color(&self, color: [f32; 4]);
    fn clear_depth(&self, depth: f64);
    fn clear_stencil(&self, stencil: i32);
    fn clear(&self, mask: u32);
    fn clear_buffer_fv(&self, buffer: GLenum, draw_buffer: i32, value: &[f32; 4]);
    fn clear_buffer_iv(&self, buffer: GLenum, draw_buffer: i32, value: &[i32; 4]);
    fn clear_buffer_uiv(&self, buffer: GLenum, draw_buffer: i32, value: &[u32; 4]);
    fn sample_mask_i(&self, index: u32, mask: u32);
    fn min_sample_shading(&self, value: f32);
    fn patch_parameter_i(&self, pname: GLenum, value: i32);
    fn patch_parameter_fv(&self, pname: GLenum, values: &[f32]);
    fn primitive_restart_index(&self, index: u32);
    fn provoking_vertex(&self, mode: GLenum);

    // -- vertex arrays ------------------------------------------------------
    fn gen_vertex_array(&self) -> GLuint;
    fn delete_vertex_array(&self, id: GLuint);
    fn bind_vertex_array(&self, id: GLuint);
    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);
    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        ty: GLenum,
        normalized: bool,
        stride: i32,
        offset: usize,
    );
    fn vertex_attrib_i_pointer(&self, index: u32, size: i32, ty: GLenum, stride: i32, offset: usize);
    fn vertex_attrib_divisor(&self, index: u32, divisor: u32);

    // -- draws and compute --------------------------------------------------
    fn draw_arrays(&self, mode: GLenum, first: i32, count: i32);
    fn draw_arrays_instanced(&self, mode: GLenum, first: i32, count: i32, instances: i32);
    fn draw_arrays_instanced_base_instance(
        &self,
        mode: GLenum,
        first: i32,
        count: i32,
        instances: i32,
        base_instance: u32,
    );
    fn draw_elements_base_vertex(&self, mode: GLenum, count: i32, ty: GLenum, offset: usize, base_vertex: i32);
    fn draw_elements_instanced_base_vertex(
        &self,
        mode: GLenum,
        count: i32,
        ty: GLenum,
        offset: usize,
        instances: i32,
        base_vertex: i32,
    );
    fn draw_range_elements_base_vertex(
        &self,
        mode: GLenum,
        start: u32,
        end: u32,
        count: i32,
        ty: GLenum,
        offset: usize,
        base_vertex: i32,
    );
    fn draw_arrays_indirect(&self, mode: GLenum, offset: usize);
    fn draw_elements_indirect(&self, mode: GLenum, ty: GLenum, offset: usize);
    fn dispatch_compute(&self, x: u32, y: u32, z: u32);
    fn dispatch_compute_indirect(&self, offset: usize);
    fn memory_barrier(&self, bits: u32);
    fn texture_barrier(&self);

    // -- samplers and images ------------------------------------------------
    fn gen_sampler(&self) -> GLuint;
    fn delete_sampler(&self, id: GLuint);
    fn bind_sampler(&self, unit: u32, id: GLuint);
    fn sampler_parameter_i(&self, id: GLuint, pname: GLenum, value: i32);
    fn sampler_parameter_f(&self, id: GLuint, pname: GLenum, value: f32);
    fn sampler_parameter_fv(&self, id: GLuint, pname: GLenum, value: &[f32; 4]);
    fn bind_image_texture(
        &self,
        unit: u32,
        texture: GLuint,
        level: i32,
        layered: bool,
        layer: i32,
        access: GLenum,
        format: GLenum,
    );

    // -- transform feedback -------------------------------------------------
    fn gen_transform_feedback(&self) -> GLuint;
    fn delete_transform_feedback(&self, id: GLuint);
    fn bind_transform_feedback(&self, id: GLuint);
    fn begin_transform_feedback(&self, mode: GLenum);
    fn end_transform_feedback(&self);
    fn pause_transform_feedback(&self);
    fn resume_transform_feedback(&self);

    // -- queries ------------------------------------------------------------
    fn gen_query(&self) -> GLuint;
    fn delete_query(&self, id: GLuint);
    fn begin_query(&self, target: GLenum, id: GLuint);
    fn end_query(&self, target: GLenum);
    fn begin_query_indexed(&self, target: GLenum, index: u32, id: GLuint);
    fn end_query_indexed(&self, target: GLenum, index: u32);
    fn query_counter(&self, id: GLuint, target: GLenum);
    fn get_query_object_u64(&self, id: GLuint, pname: GLenum) -> u64;
    fn begin_conditional_render(&self, id: GLuint, mode: GLenum);
    fn end_conditional_render(&self);

    // -- sync ---------------------------------------------------------------
    fn fence_sync(&self) -> GlSync;
    fn client_wait_sync(&self, sync: GlSync, flush: bool, timeout_ns: u64) -> SyncStatus;
    fn delete_sync(&self, sync: GlSync);
    fn flush(&self);
    fn finish(&self);
}

/// Drain `glGetError`, logging each error against `what`.
pub fn check_errors(gl: &dyn GlApi, what: &str) -> bool {
    let mut clean = true;
    // A lost context can report errors forever.
    for _ in 0..16 {
        let err = gl.get_error();
        if err == gl::NO_ERROR {
            break;
        }
        tracing::warn!("{what}: GL error 0x{err:04x}");
        clean = false;
    }
    clean
}
