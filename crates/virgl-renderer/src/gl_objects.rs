//! Owned GL object names.
//!
//! Each wrapper deletes its name on drop, so a GL object lives exactly as
//! long as the Rust value that owns it.

use std::fmt;
use std::sync::Arc;

use gl::types::{GLenum, GLuint};
use virgl_gl::GlApi;

macro_rules! gl_object {
    ($(#[$meta:meta])* $name:ident, $delete:ident) => {
        $(#[$meta])*
        pub(crate) struct $name {
            gl: Arc<dyn GlApi>,
            id: GLuint,
        }

        impl $name {
            pub(crate) fn id(&self) -> GLuint {
                self.id
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.gl.$delete(self.id);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.id).finish()
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, $gen:ident, $delete:ident) => {
        gl_object!($(#[$meta])* $name, $delete);

        impl $name {
            pub(crate) fn new(gl: &Arc<dyn GlApi>) -> Self {
                Self {
                    id: gl.$gen(),
                    gl: Arc::clone(gl),
                }
            }
        }
    };
}

gl_object!(GlTexture, gen_texture, delete_texture);
gl_object!(GlBuffer, gen_buffer, delete_buffer);
gl_object!(GlFramebuffer, gen_framebuffer, delete_framebuffer);
gl_object!(GlSampler, gen_sampler, delete_sampler);
gl_object!(GlVertexArray, gen_vertex_array, delete_vertex_array);
gl_object!(GlQuery, gen_query, delete_query);
gl_object!(GlTransformFeedback, gen_transform_feedback, delete_transform_feedback);
gl_object!(GlProgram, create_program, delete_program);
gl_object!(
    /// A shader object of one stage.
    GlShader,
    delete_shader
);

impl GlShader {
    pub(crate) fn new(gl: &Arc<dyn GlApi>, ty: GLenum) -> Self {
        Self {
            id: gl.create_shader(ty),
            gl: Arc::clone(gl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use virgl_gl::mock::MockGl;

    #[test]
    fn names_deleted_once_on_drop() {
        let mock = Arc::new(MockGl::new());
        let gl: Arc<dyn GlApi> = mock.clone();
        let tex = GlTexture::new(&gl);
        let buf = GlBuffer::new(&gl);
        assert_eq!(mock.live_textures(), 1);
        assert_eq!(mock.live_buffers(), 1);
        drop(tex);
        drop(buf);
        assert_eq!(mock.live_textures(), 0);
        assert_eq!(mock.live_buffers(), 0);
        assert_eq!(mock.bad_deletes(), 0);
    }

    #[test]
    fn shader_carries_stage() {
        let mock = Arc::new(MockGl::new());
        let gl: Arc<dyn GlApi> = mock.clone();
        let shader = GlShader::new(&gl, gl::FRAGMENT_SHADER);
        assert!(shader.id() != 0);
        assert_eq!(mock.live_shaders(), 1);
        drop(shader);
        assert_eq!(mock.live_shaders(), 0);
    }
}
