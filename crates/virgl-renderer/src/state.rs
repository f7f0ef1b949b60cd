//! Decoded guest pipeline state objects.
//!
//! These mirror the Gallium CSO structs the guest encodes. The renderer keeps
//! them as plain values; nothing here touches GL.

use virgl_core::limits::{MAX_CLIP_PLANES, MAX_COLOR_BUFS};
use virgl_core::pipe::{
    BlendFactor, BlendFunc, CompareFunc, CullFace, PolygonMode, StencilOp, TexFilter,
    TexMipFilter, TexWrap,
};

// ---------------------------------------------------------------------------
// Blend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtBlendState {
    pub blend_enable: bool,
    pub rgb_func: BlendFunc,
    pub rgb_src_factor: BlendFactor,
    pub rgb_dst_factor: BlendFactor,
    pub alpha_func: BlendFunc,
    pub alpha_src_factor: BlendFactor,
    pub alpha_dst_factor: BlendFactor,
    /// RGBA write mask, bit 0 is red.
    pub colormask: u8,
}

impl Default for RtBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            rgb_func: BlendFunc::Add,
            rgb_src_factor: BlendFactor::One,
            rgb_dst_factor: BlendFactor::Zero,
            alpha_func: BlendFunc::Add,
            alpha_src_factor: BlendFactor::One,
            alpha_dst_factor: BlendFactor::Zero,
            colormask: 0xf,
        }
    }
}

impl RtBlendState {
    pub fn colormask_bools(&self) -> [bool; 4] {
        [0, 1, 2, 3].map(|bit| self.colormask & (1 << bit) != 0)
    }

    pub fn uses_dual_source(&self) -> bool {
        self.blend_enable
            && [
                self.rgb_src_factor,
                self.rgb_dst_factor,
                self.alpha_src_factor,
                self.alpha_dst_factor,
            ]
            .into_iter()
            .any(BlendFactor::is_dual_source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendState {
    pub independent_blend_enable: bool,
    pub logicop_enable: bool,
    /// Raw `PIPE_LOGICOP_*`.
    pub logicop_func: u32,
    pub dither: bool,
    pub alpha_to_coverage: bool,
    pub alpha_to_one: bool,
    pub rt: [RtBlendState; MAX_COLOR_BUFS],
}

impl BlendState {
    pub fn uses_dual_source(&self) -> bool {
        self.rt[0].uses_dual_source()
    }
}

// ---------------------------------------------------------------------------
// Depth / stencil / alpha
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StencilState {
    pub enabled: bool,
    pub func: CompareFunc,
    pub fail_op: StencilOp,
    pub zpass_op: StencilOp,
    pub zfail_op: StencilOp,
    pub valuemask: u8,
    pub writemask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DsaState {
    pub depth_enabled: bool,
    pub depth_writemask: bool,
    pub depth_func: CompareFunc,
    /// Front and back faces.
    pub stencil: [StencilState; 2],
    pub alpha_enabled: bool,
    pub alpha_func: CompareFunc,
    pub alpha_ref_value: f32,
}

// ---------------------------------------------------------------------------
// Rasterizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub flatshade: bool,
    pub depth_clip: bool,
    pub clip_halfz: bool,
    pub rasterizer_discard: bool,
    pub flatshade_first: bool,
    pub light_twoside: bool,
    /// Sprite coordinates have their origin at the upper left.
    pub sprite_coord_mode_upper_left: bool,
    pub point_quad_rasterization: bool,
    pub cull_face: CullFace,
    pub fill_front: PolygonMode,
    pub fill_back: PolygonMode,
    pub scissor: bool,
    pub front_ccw: bool,
    pub clamp_vertex_color: bool,
    pub clamp_fragment_color: bool,
    pub offset_line: bool,
    pub offset_point: bool,
    pub offset_tri: bool,
    pub poly_smooth: bool,
    pub poly_stipple_enable: bool,
    pub point_smooth: bool,
    pub point_size_per_vertex: bool,
    pub multisample: bool,
    pub line_smooth: bool,
    pub line_stipple_enable: bool,
    pub line_last_pixel: bool,
    pub half_pixel_center: bool,
    pub bottom_edge_rule: bool,
    pub force_persample_interp: bool,
    pub point_size: f32,
    pub sprite_coord_enable: u32,
    pub line_width: f32,
    pub offset_units: f32,
    pub offset_scale: f32,
    pub offset_clamp: f32,
    pub line_stipple_factor: u32,
    pub line_stipple_pattern: u32,
    pub clip_plane_enable: u32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            flatshade: false,
            depth_clip: true,
            clip_halfz: false,
            rasterizer_discard: false,
            flatshade_first: false,
            light_twoside: false,
            sprite_coord_mode_upper_left: false,
            point_quad_rasterization: false,
            cull_face: CullFace::None,
            fill_front: PolygonMode::Fill,
            fill_back: PolygonMode::Fill,
            scissor: false,
            front_ccw: true,
            clamp_vertex_color: false,
            clamp_fragment_color: false,
            offset_line: false,
            offset_point: false,
            offset_tri: false,
            poly_smooth: false,
            poly_stipple_enable: false,
            point_smooth: false,
            point_size_per_vertex: false,
            multisample: false,
            line_smooth: false,
            line_stipple_enable: false,
            line_last_pixel: false,
            half_pixel_center: true,
            bottom_edge_rule: false,
            force_persample_interp: false,
            point_size: 1.0,
            sprite_coord_enable: 0,
            line_width: 1.0,
            offset_units: 0.0,
            offset_scale: 0.0,
            offset_clamp: 0.0,
            line_stipple_factor: 0,
            line_stipple_pattern: 0,
            clip_plane_enable: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerStateDesc {
    pub wrap_s: TexWrap,
    pub wrap_t: TexWrap,
    pub wrap_r: TexWrap,
    pub min_img_filter: TexFilter,
    pub min_mip_filter: TexMipFilter,
    pub mag_img_filter: TexFilter,
    pub compare_mode: bool,
    pub compare_func: CompareFunc,
    pub seamless_cube_map: bool,
    pub max_anisotropy: u32,
    pub lod_bias: f32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: [f32; 4],
}

impl Default for SamplerStateDesc {
    fn default() -> Self {
        Self {
            wrap_s: TexWrap::Repeat,
            wrap_t: TexWrap::Repeat,
            wrap_r: TexWrap::Repeat,
            min_img_filter: TexFilter::Nearest,
            min_mip_filter: TexMipFilter::None,
            mag_img_filter: TexFilter::Nearest,
            compare_mode: false,
            compare_func: CompareFunc::Never,
            seamless_cube_map: false,
            max_anisotropy: 0,
            lod_bias: 0.0,
            min_lod: 0.0,
            max_lod: 1000.0,
            border_color: [0.0; 4],
        }
    }
}

// ---------------------------------------------------------------------------
// Vertex input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexElementDesc {
    pub src_offset: u32,
    pub instance_divisor: u32,
    pub vertex_buffer_index: u32,
    /// Raw virgl format value.
    pub src_format: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexBufferBinding {
    pub stride: u32,
    pub buffer_offset: u32,
    pub handle: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexBufferBinding {
    pub handle: u32,
    /// Bytes per index: 1, 2 or 4.
    pub index_size: u32,
    pub offset: u32,
}

// ---------------------------------------------------------------------------
// Viewport / scissor / clip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub scale: [f32; 3],
    pub translate: [f32; 3],
}

/// A viewport in GL terms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

impl Viewport {
    pub fn to_gl(&self) -> GlViewport {
        let near = self.translate[2] - self.scale[2];
        GlViewport {
            x: self.translate[0] - self.scale[0],
            y: self.translate[1] - self.scale[1],
            width: 2.0 * self.scale[0],
            height: 2.0 * self.scale[1].abs(),
            near,
            far: near + 2.0 * self.scale[2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scissor {
    pub minx: u32,
    pub miny: u32,
    pub maxx: u32,
    pub maxy: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipState {
    pub ucp: [[f32; 4]; MAX_CLIP_PLANES],
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn viewport_from_scale_translate() {
        let vp = Viewport {
            scale: [32.0, -16.0, 0.5],
            translate: [32.0, 16.0, 0.5],
        };
        assert_eq!(
            vp.to_gl(),
            GlViewport {
                x: 0.0,
                y: 32.0,
                width: 64.0,
                height: 32.0,
                near: 0.0,
                far: 1.0,
            }
        );
    }

    #[test]
    fn dual_source_needs_blending() {
        let mut rt = RtBlendState {
            rgb_dst_factor: BlendFactor::Src1Color,
            ..Default::default()
        };
        assert!(!rt.uses_dual_source());
        rt.blend_enable = true;
        assert!(rt.uses_dual_source());
        assert_eq!(rt.colormask_bools(), [true; 4]);
    }
}
