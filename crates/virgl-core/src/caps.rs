//! Versioned capability sets returned to the guest.
//!
//! The layouts are `#[repr(C)]` and made of 32-bit fields only, so they can
//! be copied into the guest's buffer through [`AsBytes`]. Version 2 embeds
//! version 1 as its prefix.

use bitflags::bitflags;

use crate::bytes::AsBytes;

/// One bit per guest format value.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatMask {
    pub bitmask: [u32; 16],
}

impl FormatMask {
    pub fn set(&mut self, format: u32) {
        if let Some(word) = self.bitmask.get_mut((format / 32) as usize) {
            *word |= 1 << (format % 32);
        }
    }

    pub fn contains(&self, format: u32) -> bool {
        self.bitmask
            .get((format / 32) as usize)
            .is_some_and(|word| word & (1 << (format % 32)) != 0)
    }
}

bitflags! {
    /// Boolean feature set of the v1 capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BoolSet1: u32 {
        const INDEP_BLEND_ENABLE = 1 << 0;
        const INDEP_BLEND_FUNC = 1 << 1;
        const CUBE_MAP_ARRAY = 1 << 2;
        const SHADER_STENCIL_EXPORT = 1 << 3;
        const CONDITIONAL_RENDER = 1 << 4;
        const START_INSTANCE = 1 << 5;
        const PRIMITIVE_RESTART = 1 << 6;
        const BLEND_EQ_SEP = 1 << 7;
        const INSTANCEID = 1 << 8;
        const VERTEX_ELEMENT_INSTANCE_DIVISOR = 1 << 9;
        const SEAMLESS_CUBE_MAP = 1 << 10;
        const OCCLUSION_QUERY = 1 << 11;
        const TIMER_QUERY = 1 << 12;
        const STREAMOUT_PAUSE_RESUME = 1 << 13;
        const TEXTURE_BUFFER_OBJECT = 1 << 14;
        const TEXTURE_MULTISAMPLE = 1 << 15;
        const FRAGMENT_COORD_CONVENTIONS = 1 << 16;
        const DEPTH_CLIP_DISABLE = 1 << 17;
        const SEAMLESS_CUBE_MAP_PER_TEXTURE = 1 << 18;
        const UBO = 1 << 19;
        const COLOR_CLAMPING = 1 << 20;
        const POLY_STIPPLE = 1 << 21;
        const MIRROR_CLAMP = 1 << 22;
        const TEXTURE_QUERY_LOD = 1 << 23;
        const HAS_FP64 = 1 << 24;
        const HAS_TESSELLATION_SHADERS = 1 << 25;
        const HAS_INDIRECT_DRAW = 1 << 26;
        const HAS_SAMPLE_SHADING = 1 << 27;
        const HAS_CULL = 1 << 28;
        const CONDITIONAL_RENDER_INVERTED = 1 << 29;
        const DERIVATIVE_CONTROL = 1 << 30;
        const POLYGON_OFFSET_CLAMP = 1 << 31;
    }
}

bitflags! {
    /// `capability_bits` of the v2 set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CapabilityBits: u32 {
        const TGSI_INVARIANT = 1 << 0;
        const TEXTURE_VIEW = 1 << 1;
        const SET_MIN_SAMPLES = 1 << 2;
        const COPY_IMAGE = 1 << 3;
        const TGSI_PRECISE = 1 << 4;
        const TXQS = 1 << 5;
        const MEMORY_BARRIER = 1 << 6;
        const COMPUTE_SHADER = 1 << 7;
        const FB_NO_ATTACH = 1 << 8;
        const ROBUST_BUFFER_ACCESS = 1 << 9;
        const TGSI_FBFETCH = 1 << 10;
        const SHADER_CLOCK = 1 << 11;
        const TEXTURE_BARRIER = 1 << 12;
        const TGSI_COMPONENTS = 1 << 13;
        const GUEST_MAY_INIT_LOG = 1 << 14;
        const SRGB_WRITE_CONTROL = 1 << 15;
        const QBO = 1 << 16;
        const TRANSFER = 1 << 17;
        const FBO_MIXED_COLOR_FORMATS = 1 << 18;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CapsV1 {
    pub max_version: u32,
    pub sampler: FormatMask,
    pub render: FormatMask,
    pub depthstencil: FormatMask,
    pub vertexbuffer: FormatMask,
    pub bset: u32,
    pub glsl_level: u32,
    pub max_texture_array_layers: u32,
    pub max_streamout_buffers: u32,
    pub max_dual_source_render_targets: u32,
    pub max_render_targets: u32,
    pub max_samples: u32,
    pub prim_mask: u32,
    pub max_tbo_size: u32,
    pub max_uniform_blocks: u32,
    pub max_viewports: u32,
    pub max_texture_gather_components: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CapsV2 {
    pub v1: CapsV1,
    pub min_aliased_point_size: f32,
    pub max_aliased_point_size: f32,
    pub min_smooth_point_size: f32,
    pub max_smooth_point_size: f32,
    pub min_aliased_line_width: f32,
    pub max_aliased_line_width: f32,
    pub min_smooth_line_width: f32,
    pub max_smooth_line_width: f32,
    pub max_texture_lod_bias: f32,
    pub max_geom_output_vertices: u32,
    pub max_geom_total_output_components: u32,
    pub max_vertex_outputs: u32,
    pub max_vertex_attribs: u32,
    pub max_shader_patch_varyings: u32,
    pub min_texel_offset: i32,
    pub max_texel_offset: i32,
    pub min_texture_gather_offset: i32,
    pub max_texture_gather_offset: i32,
    pub texture_buffer_offset_alignment: u32,
    pub uniform_buffer_offset_alignment: u32,
    pub shader_buffer_offset_alignment: u32,
    pub capability_bits: u32,
    pub sample_locations: [u32; 8],
    pub max_vertex_attrib_stride: u32,
    pub max_shader_buffer_frag_compute: u32,
    pub max_shader_buffer_other_stages: u32,
    pub max_shader_image_frag_compute: u32,
    pub max_shader_image_other_stages: u32,
    pub max_image_samples: u32,
    pub max_compute_work_group_invocations: u32,
    pub max_compute_shared_memory_size: u32,
    pub max_compute_grid_size: [u32; 3],
    pub max_compute_block_size: [u32; 3],
    pub max_texture_2d_size: u32,
    pub max_texture_3d_size: u32,
    pub max_texture_cube_size: u32,
    pub max_combined_shader_buffers: u32,
    pub max_atomic_counters: [u32; 6],
    pub max_atomic_counter_buffers: [u32; 6],
    pub max_combined_atomic_counters: u32,
    pub max_combined_atomic_counter_buffers: u32,
}

// SAFETY: both structs are repr(C) and consist solely of 4-byte scalars and
// arrays of them, so there is no padding.
unsafe impl AsBytes for CapsV1 {}
unsafe impl AsBytes for CapsV2 {}

/// Storage large enough for any capability set version.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CapsSet {
    pub v2: CapsV2,
}

impl CapsSet {
    pub fn v1(&self) -> &CapsV1 {
        &self.v2.v1
    }

    pub fn v1_mut(&mut self) -> &mut CapsV1 {
        &mut self.v2.v1
    }

    /// Bytes of the requested set version (1 or 2).
    pub fn bytes_for(&self, set: u32) -> &[u8] {
        match set {
            1 => self.v2.v1.as_bytes(),
            2 => self.v2.as_bytes(),
            _ => &[],
        }
    }
}

/// `(max_version, max_size)` for a capability set id.
pub fn cap_set_info(set: u32) -> (u32, u32) {
    match set {
        1 => (1, std::mem::size_of::<CapsV1>() as u32),
        2 => (2, std::mem::size_of::<CapsV2>() as u32),
        _ => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_sizes() {
        assert_eq!(cap_set_info(1), (1, 4 + 4 * 64 + 4 * 12));
        let (ver, size) = cap_set_info(2);
        assert_eq!(ver, 2);
        assert!(size > cap_set_info(1).1);
        assert_eq!(cap_set_info(3), (0, 0));
        assert_eq!(cap_set_info(0), (0, 0));
    }

    #[test]
    fn format_mask_bits() {
        let mut mask = FormatMask::default();
        mask.set(67);
        mask.set(600);
        assert!(mask.contains(67));
        assert!(!mask.contains(66));
        assert!(!mask.contains(600));
        assert_eq!(mask.bitmask[2], 1 << 3);
    }

    #[test]
    fn v1_is_prefix_of_v2() {
        let mut caps = CapsSet::default();
        caps.v1_mut().glsl_level = 330;
        let v1 = caps.bytes_for(1).to_vec();
        let v2 = caps.bytes_for(2);
        assert_eq!(&v2[..v1.len()], &v1[..]);
    }
}
