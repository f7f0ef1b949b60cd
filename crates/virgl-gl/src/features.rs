//! Host feature probe.
//!
//! Each [`Feature`] is available when the host's desktop GL version (or GLES
//! version) reaches the listed minimum, or when any of its extensions is
//! exposed. The table is evaluated once; the renderer only ever asks
//! [`FeatureTable::has`].

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use crate::api::GlApi;
use crate::version::GlVersion;

/// Never satisfied by a version number.
const UNAVAIL: u32 = u32::MAX;

macro_rules! features {
    ($($name:ident => ($gl:expr, $gles:expr, [$($ext:literal),* $(,)?]),)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Feature {
            $($name,)*
        }

        impl Feature {
            pub const ALL: &'static [Feature] = &[$(Feature::$name,)*];

            fn requirement(self) -> (u32, u32, &'static [&'static str]) {
                match self {
                    $(Feature::$name => ($gl, $gles, &[$($ext),*]),)*
                }
            }
        }
    };
}

features! {
    TextureBuffer => (31, UNAVAIL, ["GL_ARB_texture_buffer_object", "GL_EXT_texture_buffer"]),
    ArbRobustness => (UNAVAIL, UNAVAIL, ["GL_ARB_robustness"]),
    ArraysOfArrays => (43, 31, ["GL_ARB_arrays_of_arrays"]),
    BaseInstance => (42, UNAVAIL, ["GL_ARB_base_instance", "GL_EXT_base_instance"]),
    Barrier => (42, 31, []),
    BitEncoding => (33, UNAVAIL, ["GL_ARB_shader_bit_encoding"]),
    ComputeShader => (43, 31, ["GL_ARB_compute_shader"]),
    CopyImage => (43, 32, ["GL_ARB_copy_image", "GL_EXT_copy_image", "GL_OES_copy_image"]),
    ConditionalRenderInverted => (45, UNAVAIL, ["GL_ARB_conditional_render_inverted"]),
    CubeMapArray => (40, UNAVAIL, [
        "GL_ARB_texture_cube_map_array",
        "GL_EXT_texture_cube_map_array",
        "GL_OES_texture_cube_map_array",
    ]),
    DebugCallback => (UNAVAIL, UNAVAIL, ["GL_KHR_debug"]),
    DrawInstance => (31, 30, ["GL_ARB_draw_instanced"]),
    DualSrcBlend => (33, UNAVAIL, ["GL_ARB_blend_func_extended"]),
    Es31Compat => (45, UNAVAIL, ["GL_ARB_ES3_1_compatibility"]),
    ExplicitAttribLocation => (33, 30, ["GL_ARB_explicit_attrib_location"]),
    FbNoAttach => (43, 31, ["GL_ARB_framebuffer_no_attachments"]),
    FramebufferFetch => (UNAVAIL, UNAVAIL, ["GL_EXT_shader_framebuffer_fetch"]),
    GeometryShader => (32, 32, ["GL_EXT_geometry_shader", "GL_OES_geometry_shader"]),
    GlConditionalRender => (30, UNAVAIL, []),
    GlPrimRestart => (31, 30, []),
    GlesKhrRobustness => (UNAVAIL, UNAVAIL, ["GL_KHR_robustness"]),
    GpuShader5 => (40, 32, ["GL_ARB_gpu_shader5", "GL_EXT_gpu_shader5"]),
    Gles31VertexAttribBinding => (43, 31, ["GL_ARB_vertex_attrib_binding"]),
    Images => (42, 31, ["GL_ARB_shader_image_load_store"]),
    IndepBlend => (30, UNAVAIL, ["GL_EXT_draw_buffers2"]),
    IndepBlendFunc => (40, UNAVAIL, ["GL_ARB_draw_buffers_blend"]),
    IndirectDraw => (40, 31, ["GL_ARB_draw_indirect"]),
    MesaInvert => (UNAVAIL, UNAVAIL, ["GL_MESA_pack_invert"]),
    MsScaledBlit => (UNAVAIL, UNAVAIL, ["GL_EXT_framebuffer_multisample_blit_scaled"]),
    Multisample => (32, 30, ["GL_ARB_texture_multisample"]),
    NvConditionalRender => (UNAVAIL, UNAVAIL, ["GL_NV_conditional_render"]),
    NvPrimRestart => (UNAVAIL, UNAVAIL, ["GL_NV_primitive_restart"]),
    PolygonOffsetClamp => (46, UNAVAIL, ["GL_ARB_polygon_offset_clamp"]),
    RobustBufferAccess => (43, UNAVAIL, ["GL_ARB_robust_buffer_access_behaviour"]),
    SampleMask => (32, 31, ["GL_ARB_texture_multisample"]),
    SampleShading => (40, UNAVAIL, ["GL_ARB_sample_shading"]),
    Samplers => (33, 30, ["GL_ARB_sampler_objects"]),
    ShaderClock => (UNAVAIL, UNAVAIL, ["GL_ARB_shader_clock"]),
    Ssbo => (43, 31, ["GL_ARB_shader_storage_buffer_object"]),
    SsboBarrier => (43, 31, []),
    StencilTexturing => (43, 31, ["GL_ARB_stencil_texturing"]),
    StorageMultisample => (43, 31, ["GL_ARB_texture_storage_multisample"]),
    Tessellation => (40, UNAVAIL, ["GL_ARB_tessellation_shader"]),
    TextureArray => (30, 30, ["GL_EXT_texture_array"]),
    TextureBarrier => (45, UNAVAIL, ["GL_ARB_texture_barrier"]),
    TextureBufferRange => (43, UNAVAIL, ["GL_ARB_texture_buffer_range"]),
    TextureGather => (40, 31, ["GL_ARB_texture_gather"]),
    TextureMultisample => (32, 30, ["GL_ARB_texture_multisample"]),
    TextureSrgbDecode => (UNAVAIL, UNAVAIL, ["GL_EXT_texture_sRGB_decode"]),
    TextureStorage => (42, 30, ["GL_ARB_texture_storage"]),
    TextureView => (43, UNAVAIL, ["GL_ARB_texture_view"]),
    TransformFeedback => (30, 30, ["GL_EXT_transform_feedback"]),
    TransformFeedback2 => (40, 30, ["GL_ARB_transform_feedback2"]),
    TransformFeedback3 => (40, UNAVAIL, ["GL_ARB_transform_feedback3"]),
    TransformFeedbackOverflowQuery => (46, UNAVAIL, ["GL_ARB_transform_feedback_overflow_query"]),
    Txqs => (45, UNAVAIL, ["GL_ARB_shader_texture_image_samples"]),
    Ubo => (31, 30, ["GL_ARB_uniform_buffer_object"]),
    ViewportArray => (41, UNAVAIL, ["GL_ARB_viewport_array"]),
}

/// Bitset over [`Feature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureTable(u64);

impl FeatureTable {
    /// Evaluate every feature for a host. Pass `0` for the API the host is
    /// not, e.g. `(0, 32)` for GLES 3.2.
    pub fn evaluate(gl_ver: u32, gles_ver: u32, has_ext: impl Fn(&str) -> bool) -> Self {
        let mut table = Self::default();
        for &feature in Feature::ALL {
            let (min_gl, min_gles, exts) = feature.requirement();
            if gl_ver >= min_gl || gles_ver >= min_gles || exts.iter().any(|e| has_ext(e)) {
                table.set(feature);
            }
        }
        table
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.0 & (1 << feature as u8) != 0
    }

    pub fn set(&mut self, feature: Feature) {
        self.0 |= 1 << feature as u8;
    }

    pub fn clear(&mut self, feature: Feature) {
        self.0 &= !(1 << feature as u8);
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.iter().copied().filter(|f| self.has(*f))
    }
}

/// Everything learned about the host context at init.
#[derive(Debug, Clone)]
pub struct HostCaps {
    pub version: GlVersion,
    pub core_profile: bool,
    pub features: FeatureTable,
    pub extensions: HashSet<String>,
    pub glsl_level: u32,
    pub max_draw_buffers: u32,
    pub max_texture_2d_size: u32,
    pub max_texture_3d_size: u32,
    pub max_texture_cube_size: u32,
    pub max_samples: u32,
}

impl HostCaps {
    /// Probe the context current on this thread.
    pub fn probe(gl: &dyn GlApi) -> Result<Self> {
        let version_str = gl
            .get_string(gl::VERSION)
            .ok_or_else(|| anyhow!("GL_VERSION unavailable"))?;
        let version = GlVersion::parse(&version_str)
            .ok_or_else(|| anyhow!("unparsable GL_VERSION: {version_str}"))?;

        let extensions = query_extensions(gl);
        let ver = version.number();
        let core_profile = if version.is_gles {
            true
        } else {
            ver > 30 && !extensions.contains("GL_ARB_compatibility")
        };
        let (gl_ver, gles_ver) = if version.is_gles { (0, ver) } else { (ver, 0) };
        let features = FeatureTable::evaluate(gl_ver, gles_ver, |e| extensions.contains(e));

        if version.is_gles {
            info!("gl_version {ver} - es profile enabled");
        } else if core_profile {
            info!("gl_version {ver} - core profile enabled");
        } else {
            info!("gl_version {ver} - compat profile");
        }
        if !features.has(Feature::ArbRobustness) && !features.has(Feature::GlesKhrRobustness) {
            warn!("running without ARB/KHR robustness in place may crash");
        }

        let caps = Self {
            version,
            core_profile,
            features,
            glsl_level: version.glsl_level(),
            max_draw_buffers: gl.get_integer(gl::MAX_DRAW_BUFFERS).max(1) as u32,
            max_texture_2d_size: gl.get_integer(gl::MAX_TEXTURE_SIZE).max(0) as u32,
            max_texture_3d_size: gl.get_integer(gl::MAX_3D_TEXTURE_SIZE).max(0) as u32,
            max_texture_cube_size: gl.get_integer(gl::MAX_CUBE_MAP_TEXTURE_SIZE).max(0) as u32,
            max_samples: gl.get_integer(gl::MAX_SAMPLES).max(0) as u32,
            extensions,
        };
        debug!("host caps: {:?}", caps.features.iter().collect::<Vec<_>>());
        Ok(caps)
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.features.has(feature)
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    pub fn is_gles(&self) -> bool {
        self.version.is_gles
    }

    pub fn gl_ver(&self) -> u32 {
        if self.version.is_gles {
            0
        } else {
            self.version.number()
        }
    }

    pub fn gles_ver(&self) -> u32 {
        if self.version.is_gles {
            self.version.number()
        } else {
            0
        }
    }
}

fn query_extensions(gl: &dyn GlApi) -> HashSet<String> {
    let count = gl.get_integer(gl::NUM_EXTENSIONS).max(0) as u32;
    let mut extensions: HashSet<String> = (0..count)
        .filter_map(|i| gl.get_string_i(gl::EXTENSIONS, i))
        .collect();
    if extensions.is_empty() {
        // Legacy contexts only expose the space-separated string.
        if let Some(all) = gl.get_string(gl::EXTENSIONS) {
            extensions.extend(all.split_whitespace().map(str::to_owned));
        }
    }
    extensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_versions_unlock_features() {
        let table = FeatureTable::evaluate(43, 0, |_| false);
        assert!(table.has(Feature::CopyImage));
        assert!(table.has(Feature::TextureStorage));
        assert!(!table.has(Feature::TextureBarrier));
        assert!(!table.has(Feature::ArbRobustness));
    }

    #[test]
    fn gles_versions_unlock_features() {
        let table = FeatureTable::evaluate(0, 31, |_| false);
        assert!(table.has(Feature::ComputeShader));
        assert!(!table.has(Feature::CopyImage));
        assert!(!table.has(Feature::Tessellation));
    }

    #[test]
    fn extensions_unlock_features() {
        let table = FeatureTable::evaluate(33, 0, |e| e == "GL_ARB_copy_image");
        assert!(table.has(Feature::CopyImage));
        assert!(!table.has(Feature::Ssbo));
    }

    #[test]
    fn fits_in_table() {
        assert!(Feature::ALL.len() <= 64);
    }
}
