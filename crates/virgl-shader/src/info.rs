//! Translator inputs and outputs besides the GLSL text.

use crate::tgsi::{Interp, Location, Semantic};

/// Host GLSL capabilities the translator targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCfg {
    /// Highest GLSL version the host accepts (e.g. 140, 330, 310 for ES).
    pub glsl_version: u32,
    pub use_gles: bool,
    pub use_core_profile: bool,
    pub use_explicit_locations: bool,
    pub has_arrays_of_arrays: bool,
    pub has_gpu_shader5: bool,
    pub has_es31_compat: bool,
    pub max_draw_buffers: u32,
}

impl Default for ShaderCfg {
    fn default() -> Self {
        Self {
            glsl_version: 130,
            use_gles: false,
            use_core_profile: false,
            use_explicit_locations: false,
            has_arrays_of_arrays: false,
            has_gpu_shader5: false,
            has_es31_compat: false,
            max_draw_buffers: 8,
        }
    }
}

/// A contiguous range of samplers or images declared as one GLSL array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderArray {
    pub first: u32,
    pub array_size: u32,
}

impl ShaderArray {
    pub fn contains(&self, index: u32) -> bool {
        index >= self.first && index < self.first + self.array_size
    }
}

/// How the fragment stage interpolates one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpInfo {
    pub semantic: Semantic,
    pub semantic_index: u32,
    pub interpolate: Interp,
    pub location: Location,
}

/// Metadata the renderer needs to bind and link a translated shader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderInfo {
    pub samplers_used_mask: u32,
    pub images_used_mask: u32,
    pub num_consts: u32,
    pub num_ubos: u32,
    /// Guest constant-buffer slot of each declared UBO.
    pub ubo_idx: Vec<u32>,
    pub ubo_indirect: bool,
    pub ssbo_used_mask: u32,
    pub num_indirect_generic_inputs: u32,
    pub num_indirect_patch_inputs: u32,
    pub num_indirect_generic_outputs: u32,
    pub num_indirect_patch_outputs: u32,
    pub num_inputs: u32,
    pub num_interps: u32,
    pub num_outputs: u32,
    pub shadow_samp_mask: u32,
    pub num_clip_out: u32,
    pub num_cull_out: u32,
    pub num_ucp: u32,
    pub gs_out_prim: u32,
    pub tes_prim: u32,
    pub tes_point_mode: bool,
    /// GLSL names captured by transform feedback, in output order.
    pub so_names: Vec<String>,
    pub attrib_input_mask: u32,
    pub sampler_arrays: Vec<ShaderArray>,
    pub image_arrays: Vec<ShaderArray>,
    /// Fragment inputs subject to interpolant patching.
    pub interpinfo: Vec<InterpInfo>,
    pub has_pervertex_out: bool,
    pub has_sample_input: bool,
    pub glsl_ver: u32,
}

impl ShaderInfo {
    /// Array that sampler `index` lives in, if samplers were coalesced.
    pub fn lookup_sampler_array(&self, index: u32) -> Option<&ShaderArray> {
        self.sampler_arrays.iter().find(|a| a.contains(index))
    }

    pub fn lookup_image_array(&self, index: u32) -> Option<&ShaderArray> {
        self.image_arrays.iter().find(|a| a.contains(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_array_lookup() {
        let info = ShaderInfo {
            sampler_arrays: vec![
                ShaderArray {
                    first: 0,
                    array_size: 2,
                },
                ShaderArray {
                    first: 4,
                    array_size: 3,
                },
            ],
            ..Default::default()
        };
        assert_eq!(info.lookup_sampler_array(1).map(|a| a.first), Some(0));
        assert_eq!(info.lookup_sampler_array(6).map(|a| a.first), Some(4));
        assert!(info.lookup_sampler_array(3).is_none());
    }
}
