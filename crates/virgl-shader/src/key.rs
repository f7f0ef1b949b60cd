//! Render state baked into a shader variant.

use virgl_core::pipe::CompareFunc;

/// One stream-output binding as the guest describes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoOutput {
    /// Output register the value comes from.
    pub register_index: u32,
    pub start_component: u32,
    pub num_components: u32,
    pub output_buffer: u32,
    /// Offset in the buffer, in dwords.
    pub dst_offset: u32,
    pub stream: u32,
}

/// Stream-output layout of a shader.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoInfo {
    /// Buffer strides in dwords.
    pub stride: [u32; 4],
    pub outputs: Vec<SoOutput>,
}

impl SoInfo {
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}

/// Everything outside the TGSI program that changes the generated GLSL.
///
/// Two variants of a selector are interchangeable exactly when their keys
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderKey {
    /// Window-system framebuffer: flip `gl_FragCoord`.
    pub invert_fs_origin: bool,
    /// Generic inputs replaced by `gl_PointCoord`, one bit per index.
    pub coord_replace: u8,
    pub pstipple_tex: bool,
    pub add_alpha_test: bool,
    pub alpha_test: CompareFunc,
    pub alpha_ref_val: f32,
    pub color_two_side: bool,
    /// Emulate the eight user clip planes.
    pub clip_plane_enable: bool,
    pub flatshade: bool,
    pub gs_present: bool,
    pub tcs_present: bool,
    pub tes_present: bool,
    pub cbufs_are_a8_bitmask: u8,
    pub cbufs_signed_int_bitmask: u8,
    pub cbufs_unsigned_int_bitmask: u8,
    pub prev_stage_pervertex_out: bool,
    pub prev_stage_num_clip_out: u8,
    pub prev_stage_num_cull_out: u8,
    pub num_indirect_generic_inputs: u8,
    pub num_indirect_patch_inputs: u8,
    pub num_indirect_generic_outputs: u8,
    pub num_indirect_patch_outputs: u8,
    pub so_info: Option<SoInfo>,
    /// The fragment stage rasterizes points; point-coordinate replacement on
    /// GLES only applies then.
    pub fs_prim_is_points: bool,
    /// `winsys_adjust_y` is declared elsewhere in the same source.
    pub winsys_adjust_y_emitted: bool,
}

impl ShaderKey {
    pub fn has_so(&self) -> bool {
        self.so_info
            .as_ref()
            .is_some_and(|so| !so.outputs.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_by_value() {
        let mut a = ShaderKey::default();
        let mut b = ShaderKey::default();
        assert_eq!(a, b);
        a.alpha_ref_val = 0.5;
        assert_ne!(a, b);
        b.alpha_ref_val = 0.5;
        b.so_info = Some(SoInfo::default());
        assert_ne!(a, b);
        assert!(!b.has_so());
    }
}
