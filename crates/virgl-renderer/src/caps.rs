//! Capability sets reported to the guest.

use gl::types::GLenum;
use tracing::debug;
use virgl_core::caps::{BoolSet1, CapabilityBits, CapsSet};
use virgl_core::format::{self, FormatFlags};
use virgl_core::limits::{MAX_SHADER_BUFFERS, MAX_SHADER_IMAGES};
use virgl_core::pipe::PrimType;
use virgl_gl::Feature;

use crate::host::Host;

const ALIASED_POINT_SIZE_RANGE: GLenum = 0x846d;
const MAX_PROGRAM_TEXTURE_GATHER_COMPONENTS: GLenum = 0x8f9f;

const MAX_ATOMIC_COUNTERS: [GLenum; 6] = [
    gl::MAX_VERTEX_ATOMIC_COUNTERS,
    gl::MAX_TESS_CONTROL_ATOMIC_COUNTERS,
    gl::MAX_TESS_EVALUATION_ATOMIC_COUNTERS,
    gl::MAX_GEOMETRY_ATOMIC_COUNTERS,
    gl::MAX_FRAGMENT_ATOMIC_COUNTERS,
    gl::MAX_COMPUTE_ATOMIC_COUNTERS,
];

const MAX_ATOMIC_COUNTER_BUFFERS: [GLenum; 6] = [
    gl::MAX_VERTEX_ATOMIC_COUNTER_BUFFERS,
    gl::MAX_TESS_CONTROL_ATOMIC_COUNTER_BUFFERS,
    gl::MAX_TESS_EVALUATION_ATOMIC_COUNTER_BUFFERS,
    gl::MAX_GEOMETRY_ATOMIC_COUNTER_BUFFERS,
    gl::MAX_FRAGMENT_ATOMIC_COUNTER_BUFFERS,
    gl::MAX_COMPUTE_ATOMIC_COUNTER_BUFFERS,
];

fn int(host: &Host, pname: GLenum) -> u32 {
    host.gl.get_integer(pname).max(0) as u32
}

fn range(host: &Host, pname: GLenum) -> [f32; 2] {
    let mut out = [0.0; 2];
    host.gl.get_float_v(pname, &mut out);
    out
}

/// GLSL level the guest may target.
fn glsl_level(host: &Host) -> u32 {
    if host.is_gles() {
        match host.caps.gles_ver() {
            v if v >= 31 => 310,
            v if v >= 30 => 130,
            _ => 120,
        }
    } else {
        match host.caps.gl_ver() {
            v if v >= 43 => 430,
            42 => 420,
            41 => 410,
            40 => 400,
            33 => 330,
            32 => 150,
            31 => 140,
            _ => 130,
        }
    }
}

fn prim_bit(prim: PrimType) -> u32 {
    1 << prim as u32
}

fn fill_v1(host: &Host, caps: &mut CapsSet) {
    let gl_ver = host.caps.gl_ver();
    let has = |f| host.has(f);
    let v1 = caps.v1_mut();
    v1.glsl_level = glsl_level(host);

    let mut bset = BoolSet1::OCCLUSION_QUERY;
    v1.prim_mask = [
        PrimType::Points,
        PrimType::Lines,
        PrimType::LineStrip,
        PrimType::LineLoop,
        PrimType::Triangles,
        PrimType::TriangleStrip,
        PrimType::TriangleFan,
    ]
    .into_iter()
    .map(prim_bit)
    .fold(0, |m, b| m | b);

    if !host.is_gles() && !host.caps.core_profile {
        bset |= BoolSet1::POLY_STIPPLE | BoolSet1::COLOR_CLAMPING;
        v1.prim_mask |= prim_bit(PrimType::Quads) | prim_bit(PrimType::QuadStrip) | prim_bit(PrimType::Polygon);
    }
    if v1.glsl_level >= 150 {
        v1.prim_mask |= prim_bit(PrimType::LinesAdjacency)
            | prim_bit(PrimType::LineStripAdjacency)
            | prim_bit(PrimType::TrianglesAdjacency)
            | prim_bit(PrimType::TriangleStripAdjacency);
    }
    if v1.glsl_level >= 400 {
        v1.prim_mask |= prim_bit(PrimType::Patches);
    }

    let flags = [
        (has(Feature::GlConditionalRender) || has(Feature::NvConditionalRender), BoolSet1::CONDITIONAL_RENDER),
        (has(Feature::IndepBlend), BoolSet1::INDEP_BLEND_ENABLE),
        (has(Feature::IndepBlendFunc), BoolSet1::INDEP_BLEND_FUNC),
        (has(Feature::DrawInstance), BoolSet1::INSTANCEID),
        (has(Feature::Ubo), BoolSet1::UBO),
        (has(Feature::TextureMultisample), BoolSet1::TEXTURE_MULTISAMPLE),
        (has(Feature::Tessellation), BoolSet1::HAS_TESSELLATION_SHADERS),
        (has(Feature::SampleShading), BoolSet1::HAS_SAMPLE_SHADING),
        (has(Feature::IndirectDraw), BoolSet1::HAS_INDIRECT_DRAW),
        (has(Feature::CubeMapArray), BoolSet1::CUBE_MAP_ARRAY),
        (has(Feature::BaseInstance), BoolSet1::START_INSTANCE),
        (has(Feature::ConditionalRenderInverted), BoolSet1::CONDITIONAL_RENDER_INVERTED),
        (has(Feature::PolygonOffsetClamp), BoolSet1::POLYGON_OFFSET_CLAMP),
        (has(Feature::TextureBuffer), BoolSet1::TEXTURE_BUFFER_OBJECT),
        (has(Feature::GlPrimRestart) || has(Feature::NvPrimRestart), BoolSet1::PRIMITIVE_RESTART),
        (has(Feature::TransformFeedback2), BoolSet1::STREAMOUT_PAUSE_RESUME),
        (gl_ver >= 33 || host.caps.gles_ver() >= 30, BoolSet1::TIMER_QUERY),
        (gl_ver >= 32 || host.caps.has_extension("GL_ARB_fragment_coord_conventions"), BoolSet1::FRAGMENT_COORD_CONVENTIONS),
        (gl_ver >= 32, BoolSet1::DEPTH_CLIP_DISABLE),
        (gl_ver >= 32 || host.caps.has_extension("GL_ARB_seamless_cube_map"), BoolSet1::SEAMLESS_CUBE_MAP),
        (host.caps.has_extension("GL_AMD_seamless_cube_map_per_texture"), BoolSet1::SEAMLESS_CUBE_MAP_PER_TEXTURE),
        (gl_ver >= 40 || host.caps.has_extension("GL_ARB_texture_query_lod"), BoolSet1::TEXTURE_QUERY_LOD),
        (gl_ver >= 40, BoolSet1::HAS_FP64),
        (gl_ver >= 45 || host.caps.has_extension("GL_ARB_cull_distance"), BoolSet1::HAS_CULL),
        (gl_ver >= 45 || host.caps.has_extension("GL_ARB_derivative_control"), BoolSet1::DERIVATIVE_CONTROL),
        (host.caps.has_extension("GL_ARB_shader_stencil_export"), BoolSet1::SHADER_STENCIL_EXPORT),
        (
            host.caps.has_extension("GL_EXT_texture_mirror_clamp")
                || host.caps.has_extension("GL_ARB_texture_mirror_clamp_to_edge"),
            BoolSet1::MIRROR_CLAMP,
        ),
    ];
    for (on, flag) in flags {
        bset.set(flag, on);
    }
    v1.bset = bset.bits();

    if has(Feature::Ubo) {
        v1.max_uniform_blocks = int(host, gl::MAX_VERTEX_UNIFORM_BLOCKS) + 1;
    }
    if has(Feature::TextureArray) {
        v1.max_texture_array_layers = int(host, gl::MAX_ARRAY_TEXTURE_LAYERS);
    }
    if has(Feature::TransformFeedback) {
        v1.max_streamout_buffers = if has(Feature::TransformFeedback3) {
            int(host, gl::MAX_TRANSFORM_FEEDBACK_BUFFERS)
        } else {
            4
        };
    }
    if has(Feature::DualSrcBlend) {
        v1.max_dual_source_render_targets = int(host, gl::MAX_DUAL_SOURCE_DRAW_BUFFERS);
    }
    if has(Feature::TextureBuffer) {
        v1.max_tbo_size = int(host, gl::MAX_TEXTURE_BUFFER_SIZE);
    }
    if has(Feature::TextureGather) {
        v1.max_texture_gather_components = if host.is_gles() {
            4
        } else {
            int(host, MAX_PROGRAM_TEXTURE_GATHER_COMPONENTS)
        };
    }
    v1.max_viewports = if has(Feature::ViewportArray) {
        int(host, gl::MAX_VIEWPORTS)
    } else {
        1
    };
    v1.max_render_targets = host.caps.max_draw_buffers;
    v1.max_samples = host.caps.max_samples;

    for desc in format::all() {
        let f = desc.format as u32;
        if desc.flags.contains(FormatFlags::SAMPLER) {
            v1.sampler.set(f);
            if desc.flags.contains(FormatFlags::RENDER) {
                v1.render.set(f);
            }
        }
        if desc.flags.contains(FormatFlags::DEPTH_STENCIL) {
            v1.depthstencil.set(f);
        }
        if desc.flags.contains(FormatFlags::VERTEX) {
            v1.vertexbuffer.set(f);
        }
    }
}

fn fill_v2(host: &Host, caps: &mut CapsSet) {
    let gl_ver = host.caps.gl_ver();
    let gles_ver = host.caps.gles_ver();
    let has = |f| host.has(f);
    let v2 = &mut caps.v2;

    [v2.min_aliased_point_size, v2.max_aliased_point_size] = range(host, ALIASED_POINT_SIZE_RANGE);
    [v2.min_aliased_line_width, v2.max_aliased_line_width] = range(host, gl::ALIASED_LINE_WIDTH_RANGE);
    if !host.is_gles() {
        [v2.min_smooth_point_size, v2.max_smooth_point_size] = range(host, gl::POINT_SIZE_RANGE);
        [v2.min_smooth_line_width, v2.max_smooth_line_width] = range(host, gl::SMOOTH_LINE_WIDTH_RANGE);
    }
    let mut lod_bias = [0.0];
    host.gl.get_float_v(gl::MAX_TEXTURE_LOD_BIAS, &mut lod_bias);
    v2.max_texture_lod_bias = lod_bias[0];

    v2.max_vertex_attribs = int(host, gl::MAX_VERTEX_ATTRIBS);
    v2.max_vertex_outputs = int(host, gl::MAX_VERTEX_OUTPUT_COMPONENTS) / 4;
    v2.min_texel_offset = host.gl.get_integer(gl::MIN_PROGRAM_TEXEL_OFFSET);
    v2.max_texel_offset = host.gl.get_integer(gl::MAX_PROGRAM_TEXEL_OFFSET);
    v2.uniform_buffer_offset_alignment = int(host, gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT);
    v2.max_texture_2d_size = host.caps.max_texture_2d_size;
    v2.max_texture_3d_size = host.caps.max_texture_3d_size;
    v2.max_texture_cube_size = host.caps.max_texture_cube_size;

    if has(Feature::GeometryShader) {
        v2.max_geom_output_vertices = int(host, gl::MAX_GEOMETRY_OUTPUT_VERTICES);
        v2.max_geom_total_output_components = int(host, gl::MAX_GEOMETRY_TOTAL_OUTPUT_COMPONENTS);
    }
    if has(Feature::Tessellation) {
        v2.max_shader_patch_varyings = int(host, gl::MAX_TESS_PATCH_COMPONENTS) / 4;
    }
    if has(Feature::TextureGather) {
        v2.min_texture_gather_offset = host.gl.get_integer(gl::MIN_PROGRAM_TEXTURE_GATHER_OFFSET);
        v2.max_texture_gather_offset = host.gl.get_integer(gl::MAX_PROGRAM_TEXTURE_GATHER_OFFSET);
    }
    if gl_ver >= 43 {
        v2.texture_buffer_offset_alignment = int(host, gl::TEXTURE_BUFFER_OFFSET_ALIGNMENT);
    }
    if has(Feature::Ssbo) {
        v2.shader_buffer_offset_alignment = int(host, gl::SHADER_STORAGE_BUFFER_OFFSET_ALIGNMENT);
        v2.max_shader_buffer_other_stages =
            int(host, gl::MAX_VERTEX_SHADER_STORAGE_BLOCKS).min(MAX_SHADER_BUFFERS as u32);
        v2.max_shader_buffer_frag_compute =
            int(host, gl::MAX_FRAGMENT_SHADER_STORAGE_BLOCKS).min(MAX_SHADER_BUFFERS as u32);
        v2.max_combined_shader_buffers = int(host, gl::MAX_COMBINED_SHADER_STORAGE_BLOCKS);
    }
    if has(Feature::Images) {
        v2.max_shader_image_other_stages = int(host, gl::MAX_VERTEX_IMAGE_UNIFORMS).min(MAX_SHADER_IMAGES as u32);
        v2.max_shader_image_frag_compute =
            int(host, gl::MAX_FRAGMENT_IMAGE_UNIFORMS).min(MAX_SHADER_IMAGES as u32);
        v2.max_image_samples = int(host, gl::MAX_IMAGE_SAMPLES);
    }
    if gl_ver >= 42 || gles_ver >= 31 {
        for (i, (&counters, &buffers)) in MAX_ATOMIC_COUNTERS.iter().zip(&MAX_ATOMIC_COUNTER_BUFFERS).enumerate() {
            v2.max_atomic_counters[i] = int(host, counters);
            v2.max_atomic_counter_buffers[i] = int(host, buffers);
        }
        v2.max_combined_atomic_counters = int(host, gl::MAX_COMBINED_ATOMIC_COUNTERS);
        v2.max_combined_atomic_counter_buffers = int(host, gl::MAX_COMBINED_ATOMIC_COUNTER_BUFFERS);
    }
    if gl_ver >= 44 || gles_ver >= 31 {
        v2.max_vertex_attrib_stride = int(host, gl::MAX_VERTEX_ATTRIB_STRIDE);
    }

    let mut bits = CapabilityBits::TGSI_INVARIANT | CapabilityBits::SET_MIN_SAMPLES | CapabilityBits::TGSI_PRECISE;
    if has(Feature::ComputeShader) {
        v2.max_compute_work_group_invocations = int(host, gl::MAX_COMPUTE_WORK_GROUP_INVOCATIONS);
        v2.max_compute_shared_memory_size = int(host, gl::MAX_COMPUTE_SHARED_MEMORY_SIZE);
        v2.max_compute_grid_size = [int(host, gl::MAX_COMPUTE_WORK_GROUP_COUNT); 3];
        v2.max_compute_block_size = [int(host, gl::MAX_COMPUTE_WORK_GROUP_SIZE); 3];
        bits |= CapabilityBits::COMPUTE_SHADER;
    }
    let gated = [
        (Feature::FbNoAttach, CapabilityBits::FB_NO_ATTACH),
        (Feature::Txqs, CapabilityBits::TXQS),
        (Feature::Barrier, CapabilityBits::MEMORY_BARRIER),
        (Feature::CopyImage, CapabilityBits::COPY_IMAGE),
        (Feature::RobustBufferAccess, CapabilityBits::ROBUST_BUFFER_ACCESS),
        (Feature::FramebufferFetch, CapabilityBits::TGSI_FBFETCH),
        (Feature::ShaderClock, CapabilityBits::SHADER_CLOCK),
        (Feature::TextureBarrier, CapabilityBits::TEXTURE_BARRIER),
    ];
    for (feature, bit) in gated {
        if has(feature) {
            bits |= bit;
        }
    }
    if gl_ver >= 44 || host.caps.has_extension("GL_ARB_query_buffer_object") {
        bits |= CapabilityBits::QBO;
    }
    v2.capability_bits = bits.bits();
}

/// Fill `caps` for capability set `set`. Unknown sets only get
/// `max_version = 0`.
pub(crate) fn fill_caps(host: &Host, set: u32, caps: &mut CapsSet) {
    *caps = CapsSet::default();
    if !(1..=2).contains(&set) {
        return;
    }
    caps.v1_mut().max_version = set;
    fill_v1(host, caps);
    if set == 2 {
        fill_v2(host, caps);
    }
    debug!(
        "caps set {set}: glsl {} bset 0x{:08x} bits 0x{:08x}",
        caps.v1().glsl_level,
        caps.v1().bset,
        caps.v2.capability_bits
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mock_host;
    use pretty_assertions::assert_eq;
    use virgl_core::format::VirglFormat;

    #[test]
    fn unknown_set_is_empty() {
        let (host, _gl) = mock_host();
        let mut caps = CapsSet::default();
        caps.v1_mut().max_version = 7;
        fill_caps(&host, 3, &mut caps);
        assert_eq!(caps.v1().max_version, 0);
        assert_eq!(caps.v1().glsl_level, 0);
    }

    #[test]
    fn core_profile_v2() {
        let (host, _gl) = mock_host();
        let mut caps = CapsSet::default();
        fill_caps(&host, 2, &mut caps);
        let v1 = caps.v1();
        assert_eq!(v1.max_version, 2);
        assert_eq!(v1.glsl_level, 430);
        assert_eq!(v1.max_render_targets, 8);
        assert_eq!(v1.prim_mask & prim_bit(PrimType::Quads), 0);
        assert_ne!(v1.prim_mask & prim_bit(PrimType::Patches), 0);
        assert!(v1.sampler.contains(VirglFormat::R8G8B8A8_UNORM as u32));
        assert!(v1.render.contains(VirglFormat::R8G8B8A8_UNORM as u32));

        let bits = CapabilityBits::from_bits_truncate(caps.v2.capability_bits);
        assert!(bits.contains(CapabilityBits::TGSI_INVARIANT | CapabilityBits::SET_MIN_SAMPLES));
        assert!(bits.contains(CapabilityBits::COMPUTE_SHADER));
        assert_eq!(caps.v2.max_vertex_outputs, 32);
        assert_eq!(caps.v2.max_compute_grid_size, [65535; 3]);
    }

    #[test]
    fn v1_leaves_v2_fields_zero() {
        let (host, _gl) = mock_host();
        let mut caps = CapsSet::default();
        fill_caps(&host, 1, &mut caps);
        assert_eq!(caps.v1().max_version, 1);
        assert_eq!(caps.v2.capability_bits, 0);
        assert_eq!(caps.bytes_for(1).len(), virgl_core::caps::cap_set_info(1).1 as usize);
    }
}
