//! The `#version` header and every global declaration.
//!
//! Runs after the instruction pass, so all requirement bits, temporaries and
//! resource masks are final here.

use virgl_core::pipe::{PrimType, ShaderType};
use virgl_core::VirglFormat;

use super::{ImageDecl, SamplerDecl, Translator};
use crate::error::{Result, TranslateError};
use crate::glsl::{GlslBuilder, ShaderReq, REQ_EXTENSIONS};
use crate::tgsi::{File, Interp, Location, ReturnType, Semantic, TexTarget};

const MAX_SO_OUTPUTS: usize = 64;

/// Interpolation qualifier for a varying, `None` when the default applies.
pub(crate) fn interp_qualifier(use_gles: bool, interp: Interp, flatshade: bool) -> Option<&'static str> {
    match interp {
        Interp::Linear if use_gles => Some(""),
        Interp::Linear => Some("noperspective "),
        Interp::Perspective => Some("smooth "),
        Interp::Constant => Some("flat "),
        Interp::Color if flatshade => Some("flat "),
        Interp::Color => None,
    }
}

pub(crate) fn location_qualifier(location: Location) -> &'static str {
    match location {
        Location::Center => "",
        Location::Centroid => "centroid ",
        Location::Sample => "sample ",
    }
}

fn prim_name(prim: u32) -> &'static str {
    match PrimType::from_raw(prim) {
        Some(PrimType::Points) => "points",
        Some(PrimType::Lines) => "lines",
        Some(PrimType::LineStrip) => "line_strip",
        Some(PrimType::LinesAdjacency) => "lines_adjacency",
        Some(PrimType::Triangles) => "triangles",
        Some(PrimType::TriangleStrip) => "triangle_strip",
        Some(PrimType::TrianglesAdjacency) => "triangles_adjacency",
        Some(PrimType::Quads) => "quads",
        _ => "UNKNOWN",
    }
}

fn tes_prim_name(prim: u32) -> &'static str {
    match PrimType::from_raw(prim) {
        Some(PrimType::Quads) => "quads",
        Some(PrimType::Triangles) => "triangles",
        Some(PrimType::Lines) => "isolines",
        _ => "UNKNOWN",
    }
}

fn spacing_name(spacing: u32) -> &'static str {
    match spacing {
        0 => "fractional_odd_spacing",
        1 => "fractional_even_spacing",
        _ => "equal_spacing",
    }
}

fn gs_input_size(prim: u32) -> u32 {
    match PrimType::from_raw(prim) {
        Some(PrimType::Points) => 1,
        Some(PrimType::Lines) => 2,
        Some(PrimType::LinesAdjacency) => 4,
        Some(PrimType::TrianglesAdjacency) => 6,
        _ => 3,
    }
}

/// Sampler type suffix (`2D`, `CubeArrayShadow`, ...).
fn sampler_type_name(target: TexTarget) -> &'static str {
    match target {
        TexTarget::Buffer => "Buffer",
        TexTarget::Tex1D => "1D",
        TexTarget::Tex2D => "2D",
        TexTarget::Tex3D => "3D",
        TexTarget::Cube => "Cube",
        TexTarget::Rect => "2DRect",
        TexTarget::Shadow1D => "1DShadow",
        TexTarget::Shadow2D => "2DShadow",
        TexTarget::ShadowRect => "2DRectShadow",
        TexTarget::Tex1DArray => "1DArray",
        TexTarget::Tex2DArray => "2DArray",
        TexTarget::Shadow1DArray => "1DArrayShadow",
        TexTarget::Shadow2DArray => "2DArrayShadow",
        TexTarget::ShadowCube => "CubeShadow",
        TexTarget::CubeArray => "CubeArray",
        TexTarget::ShadowCubeArray => "CubeArrayShadow",
        TexTarget::Tex2DMsaa => "2DMS",
        TexTarget::Tex2DArrayMsaa => "2DMSArray",
    }
}

fn return_prefix(ty: ReturnType) -> &'static str {
    match ty {
        ReturnType::Sint => "i",
        ReturnType::Uint => "u",
        _ => "",
    }
}

/// GLSL image layout qualifier for a storage format.
fn image_layout(format: VirglFormat) -> Option<&'static str> {
    use VirglFormat as F;
    Some(match format {
        F::R11G11B10_FLOAT => "r11f_g11f_b10f",
        F::R10G10B10A2_UNORM => "rgb10_a2",
        F::R8_UNORM => "r8",
        F::R8_SNORM => "r8_snorm",
        F::R8_UINT => "r8ui",
        F::R8_SINT => "r8i",
        F::R8G8_UNORM => "rg8",
        F::R8G8_SNORM => "rg8_snorm",
        F::R8G8_UINT => "rg8ui",
        F::R8G8_SINT => "rg8i",
        F::R8G8B8A8_UNORM => "rgba8",
        F::R8G8B8A8_SNORM => "rgba8_snorm",
        F::R8G8B8A8_UINT => "rgba8ui",
        F::R8G8B8A8_SINT => "rgba8i",
        F::R16_UNORM => "r16",
        F::R16_SNORM => "r16_snorm",
        F::R16_UINT => "r16ui",
        F::R16_SINT => "r16i",
        F::R16_FLOAT => "r16f",
        F::R16G16_UNORM => "rg16",
        F::R16G16_SNORM => "rg16_snorm",
        F::R16G16_UINT => "rg16ui",
        F::R16G16_SINT => "rg16i",
        F::R16G16_FLOAT => "rg16f",
        F::R16G16B16A16_UNORM => "rgba16",
        F::R16G16B16A16_SNORM => "rgba16_snorm",
        F::R16G16B16A16_FLOAT => "rgba16f",
        F::R16G16B16A16_UINT => "rgba16ui",
        F::R16G16B16A16_SINT => "rgba16i",
        F::R32_FLOAT => "r32f",
        F::R32_UINT => "r32ui",
        F::R32_SINT => "r32i",
        F::R32G32_FLOAT => "rg32f",
        F::R32G32_UINT => "rg32ui",
        F::R32G32_SINT => "rg32i",
        F::R32G32B32A32_FLOAT => "rgba32f",
        F::R32G32B32A32_UINT => "rgba32ui",
        F::R32G32B32A32_SINT => "rgba32i",
        _ => return None,
    })
}

/// Split a bit mask into `(start, count)` runs of consecutive set bits.
fn consecutive_ranges(mut mask: u32) -> Vec<(u32, u32)> {
    let mut ranges = Vec::new();
    while mask != 0 {
        let start = mask.trailing_zeros();
        let count = (mask >> start).trailing_ones();
        ranges.push((start, count));
        mask &= !((((1u64 << count) - 1) as u32) << start);
    }
    ranges
}

impl Translator<'_> {
    /// GLSL version the header declares.
    pub(crate) fn glsl_version_emitted(&self) -> u32 {
        if self.cfg.use_gles {
            return self.cfg.glsl_version;
        }
        match self.stage {
            ShaderType::Compute => 330,
            _ if self.glsl_ver_required > 150 => self.glsl_ver_required,
            ShaderType::Geometry | ShaderType::TessCtrl | ShaderType::TessEval => 150,
            _ if self.glsl_ver_required == 150 => 150,
            _ if self.glsl_ver_required == 140 => 140,
            _ => 130,
        }
    }

    fn fs_emit_layout(&self) -> bool {
        self.props.fs_pixel_center != 0
            || (self.props.fs_coord_origin != 0) == self.key.invert_fs_origin
    }

    pub(super) fn emit_header(&self, out: &mut GlslBuilder) {
        let stage = self.stage;
        let version = self.glsl_version_emitted();
        if self.cfg.use_gles {
            out.line(&format!("#version {version} es"));
            if self.reqs.contains(ShaderReq::SAMPLER_MS) {
                out.line("#extension GL_OES_texture_storage_multisample_2d_array : require");
            }
            if stage == ShaderType::Geometry {
                out.line("#extension GL_EXT_geometry_shader : require");
                if self.reqs.contains(ShaderReq::PSIZE) {
                    out.line("#extension GL_OES_geometry_point_size : enable");
                }
            }
            if matches!(stage, ShaderType::TessCtrl | ShaderType::TessEval) {
                if version < 320 {
                    out.line("#extension GL_OES_tessellation_shader : require");
                }
                out.line("#extension GL_OES_tessellation_point_size : enable");
            }
            if self.reqs.contains(ShaderReq::GPU_SHADER5) && version < 320 {
                out.line("#extension GL_EXT_gpu_shader5 : require");
            }
            out.line("precision highp float;");
            out.line("precision highp int;");
            return;
        }

        out.line(&format!("#version {version}"));
        if stage == ShaderType::Compute {
            out.line("#extension GL_ARB_compute_shader : require");
        }
        if matches!(stage, ShaderType::TessCtrl | ShaderType::TessEval) {
            out.line("#extension GL_ARB_tessellation_shader : require");
        }
        if stage == ShaderType::Vertex && self.cfg.use_explicit_locations {
            out.line("#extension GL_ARB_explicit_attrib_location : require");
        }
        if stage == ShaderType::Fragment && self.fs_emit_layout() {
            out.line("#extension GL_ARB_fragment_coord_conventions : require");
        }
        if !self.ubo_idx.is_empty() {
            out.line("#extension GL_ARB_uniform_buffer_object : require");
        }
        if self.props.num_cull_dist_prop > 0 || self.key.prev_stage_num_cull_out > 0 {
            out.line("#extension GL_ARB_cull_distance : require");
        }
        if self.ssbo_used_mask != 0 {
            out.line("#extension GL_ARB_shader_storage_buffer_object : require");
        }
        for (bit, ext) in REQ_EXTENSIONS {
            if bit == ShaderReq::SAMPLER_RECT && self.glsl_ver_required >= 140 {
                continue;
            }
            if self.reqs.contains(bit) {
                out.line(&format!("#extension {ext} : require"));
            }
        }
    }

    pub(super) fn emit_ios(&mut self, out: &mut GlslBuilder) -> Result<()> {
        if self
            .key
            .so_info
            .as_ref()
            .is_some_and(|so| so.outputs.len() >= MAX_SO_OUTPUTS)
        {
            return Err(TranslateError::Overflow {
                what: "stream outputs",
                max: MAX_SO_OUTPUTS,
            });
        }
        self.num_interps = 0;

        self.emit_stage_layouts(out);
        self.emit_inputs(out);
        self.emit_outputs(out);
        self.emit_clip_cull(out);
        self.emit_so_outputs(out);
        self.emit_temporaries(out);
        self.emit_constants(out);
        self.emit_samplers(out);
        self.emit_images(out);
        self.emit_buffers(out);

        if self.is_fs() && self.key.pstipple_tex {
            out.line("uniform sampler2D pstipple_sampler;");
            out.line("float stip_temp;");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Layouts and varyings
    // -----------------------------------------------------------------------

    fn emit_stage_layouts(&self, out: &mut GlslBuilder) {
        let p = &self.props;
        match self.stage {
            ShaderType::Fragment => {
                if self.fs_emit_layout() {
                    let upper_left = (p.fs_coord_origin != 0) == self.key.invert_fs_origin;
                    let pixel_center = p.fs_pixel_center != 0;
                    let mut quals = Vec::new();
                    if upper_left {
                        quals.push("origin_upper_left");
                    }
                    if pixel_center {
                        quals.push("pixel_center_integer");
                    }
                    out.line(&format!("layout({}) in vec4 gl_FragCoord;", quals.join(",")));
                }
                if p.early_depth_stencil {
                    out.line("layout(early_fragment_tests) in;");
                }
            }
            ShaderType::Compute => {
                let [x, y, z] = p.local_cs_block_size;
                out.line(&format!(
                    "layout (local_size_x = {x}, local_size_y = {y}, local_size_z = {z}) in;"
                ));
                if self.req_local_mem > 0 {
                    let ty = if self.integer_memory { "int" } else { "uint" };
                    out.line(&format!("shared {ty} values[{}];", self.req_local_mem / 4));
                }
            }
            ShaderType::Geometry => {
                let invocations = if p.gs_num_invocations > 1 {
                    format!(", invocations = {}", p.gs_num_invocations)
                } else {
                    String::new()
                };
                out.line(&format!("layout({}{invocations}) in;", prim_name(p.gs_in_prim)));
                out.line(&format!(
                    "layout({}, max_vertices = {}) out;",
                    prim_name(p.gs_out_prim),
                    p.gs_max_out_verts
                ));
            }
            _ => {}
        }
    }

    fn emit_inputs(&mut self, out: &mut GlslBuilder) {
        let stage = self.stage;
        let key = self.key;
        let in_prefix = super::decl::input_prefix(stage, key.gs_present, key.tcs_present, key.tes_present);

        if self.indirect_files & File::Input.bit() != 0 {
            let patch = self.patch_input_range;
            if stage == ShaderType::TessEval && patch.used {
                let size = patch.size().max(u32::from(key.num_indirect_patch_inputs));
                out.line(&format!("patch in vec4 {in_prefix}p{}[{size}];", patch.first));
            }
            let generic = self.generic_input_range;
            if matches!(stage, ShaderType::TessCtrl | ShaderType::TessEval) && generic.used {
                let size = generic
                    .size()
                    .max(u32::from(key.num_indirect_generic_inputs));
                out.line(&format!(
                    "in block {{ vec4 {in_prefix}{}[{size}]; }} blk[];",
                    generic.first
                ));
            }
        }

        let mut num_interps = 0;
        for io in &self.inputs {
            if io.predefined_no_emit {
                continue;
            }
            let mut line = String::new();
            if stage == ShaderType::Vertex && self.cfg.use_explicit_locations {
                line.push_str(&format!("layout(location={}) ", io.first));
            }
            if stage == ShaderType::TessEval && io.semantic == Semantic::Patch {
                line.push_str("patch ");
            } else if stage == ShaderType::Fragment
                && matches!(io.semantic, Semantic::Generic | Semantic::Color)
            {
                line.push_str(
                    interp_qualifier(self.cfg.use_gles, io.interpolate, key.flatshade)
                        .unwrap_or(""),
                );
                line.push_str(location_qualifier(io.location));
                num_interps += 1;
            }
            let postfix = match stage {
                ShaderType::Geometry => format!("[{}]", gs_input_size(self.props.gs_in_prim)),
                ShaderType::TessCtrl => "[]".to_string(),
                ShaderType::TessEval if io.semantic != Semantic::Patch => "[]".to_string(),
                _ => String::new(),
            };
            line.push_str(&format!("in vec4 {}{postfix};", io.name));
            out.line(&line);
        }
        self.num_interps += num_interps;

        if stage == ShaderType::Fragment
            && self.uses_winsys_adjust_y
            && !key.winsys_adjust_y_emitted
        {
            out.line("uniform float winsys_adjust_y;");
        }
        if stage == ShaderType::TessCtrl {
            out.line(&format!("layout(vertices = {}) out;", self.props.tcs_vertices_out));
        }
        if stage == ShaderType::TessEval {
            let p = &self.props;
            out.line(&format!(
                "layout({}, {}, {}{}) in;",
                tes_prim_name(p.tes_prim_mode),
                spacing_name(p.tes_spacing),
                if p.tes_vertex_order_cw { "cw" } else { "ccw" },
                if p.tes_point_mode { ", point_mode" } else { "" }
            ));
        }
    }

    fn emit_outputs(&mut self, out: &mut GlslBuilder) {
        let stage = self.stage;
        let key = self.key;
        let out_prefix = super::decl::output_prefix(stage);

        if self.indirect_files & File::Output.bit() != 0 {
            let generic = self.generic_output_range;
            let patch = self.patch_output_range;
            match stage {
                ShaderType::Vertex if generic.used => out.line(&format!(
                    "out block {{ vec4 {out_prefix}{}[{}]; }} oblk;",
                    generic.first,
                    generic.size()
                )),
                ShaderType::TessCtrl => {
                    if generic.used {
                        out.line(&format!(
                            "out block {{ vec4 {out_prefix}{}[{}]; }} oblk[];",
                            generic.first,
                            generic.size()
                        ));
                    }
                    if patch.used {
                        out.line(&format!(
                            "patch out vec4 {out_prefix}p{}[{}];",
                            patch.first,
                            patch.size()
                        ));
                    }
                }
                _ => {}
            }
        }

        let mut fcolor = [false; 2];
        let mut bcolor = [false; 2];
        let mut num_interps = 0;
        if self.write_all_cbufs {
            for i in 0..self.cfg.max_draw_buffers {
                if self.cfg.use_gles {
                    out.line(&format!("layout (location={i}) out vec4 fsout_c{i};"));
                } else {
                    out.line(&format!("out vec4 fsout_c{i};"));
                }
            }
        } else {
            for io in &self.outputs {
                if stage == ShaderType::Vertex && key.color_two_side && io.sid < 2 {
                    match io.semantic {
                        Semantic::Color => fcolor[io.sid as usize] = true,
                        Semantic::BColor => bcolor[io.sid as usize] = true,
                        _ => {}
                    }
                }
                let precise = if io.precise { "precise " } else { "" };
                let invariant = if io.invariant { "invariant " } else { "" };
                if io.predefined_no_emit {
                    if io.precise || io.invariant {
                        out.line(&format!("{precise}{invariant}{};", io.name));
                    }
                    continue;
                }
                if matches!(
                    stage,
                    ShaderType::Vertex | ShaderType::Geometry | ShaderType::TessEval
                ) && matches!(
                    io.semantic,
                    Semantic::Generic | Semantic::Color | Semantic::BColor
                ) {
                    num_interps += 1;
                }
                let line = if stage == ShaderType::TessCtrl {
                    if io.semantic == Semantic::Patch {
                        format!("patch out vec4 {};", io.name)
                    } else {
                        format!("out vec4 {}[];", io.name)
                    }
                } else if stage == ShaderType::Geometry && io.stream != 0 {
                    format!(
                        "layout (stream = {}) {precise}{invariant}out vec4 {};",
                        io.stream, io.name
                    )
                } else {
                    let dir = if io.fbfetch_used { "inout" } else { "out" };
                    format!("{precise}{invariant}{dir} vec4 {};", io.name)
                };
                out.line(&line);
            }
        }
        self.num_interps += num_interps;

        if stage == ShaderType::Vertex && key.color_two_side {
            for i in 0..2 {
                if fcolor[i] && !bcolor[i] {
                    out.line(&format!("out vec4 ex_bc{i};"));
                }
                if bcolor[i] && !fcolor[i] {
                    out.line(&format!("out vec4 ex_c{i};"));
                }
            }
        }

        if matches!(
            stage,
            ShaderType::Vertex | ShaderType::Geometry | ShaderType::TessEval
        ) && !key.winsys_adjust_y_emitted
        {
            out.line("uniform float winsys_adjust_y;");
        }
    }

    fn clip_cull_decls(&self, dir: &str) -> String {
        let p = &self.props;
        let mut decls = String::new();
        if p.num_clip_dist_prop + p.num_cull_dist_prop > 0 {
            if p.num_clip_dist_prop > 0 {
                decls.push_str(&format!("{dir}float gl_ClipDistance[{}];\n", p.num_clip_dist_prop));
            }
            if p.num_cull_dist_prop > 0 {
                decls.push_str(&format!("{dir}float gl_CullDistance[{}];\n", p.num_cull_dist_prop));
            }
        } else {
            let n = if self.num_clip_dist > 0 { self.num_clip_dist } else { 8 };
            decls.push_str(&format!("{dir}float gl_ClipDistance[{n}];\n"));
        }
        decls
    }

    fn input_pervertex_block(&self) -> String {
        let key = self.key;
        let clip = if key.prev_stage_num_clip_out > 0 {
            u32::from(key.prev_stage_num_clip_out)
        } else {
            self.num_in_clip_dist
        };
        let cull = u32::from(key.prev_stage_num_cull_out);
        let mut block = String::from("in gl_PerVertex {\n vec4 gl_Position;\n float gl_PointSize;\n");
        if clip > 0 {
            block.push_str(&format!(" float gl_ClipDistance[{clip}];\n"));
        }
        if cull > 0 {
            block.push_str(&format!(" float gl_CullDistance[{cull}];\n"));
        }
        block.push_str("} gl_in[];");
        block
    }

    fn emit_clip_cull(&mut self, out: &mut GlslBuilder) {
        let key = self.key;
        match self.stage {
            ShaderType::Vertex => {
                if self.has_clipvertex {
                    let dir = if self.has_clipvertex_so { "out " } else { "" };
                    out.line(&format!("{dir}vec4 clipv_tmp;"));
                }
                if self.num_clip_dist > 0 || key.clip_plane_enable {
                    if key.clip_plane_enable {
                        out.line("uniform vec4 clipp[8];");
                    }
                    if key.gs_present || key.tes_present {
                        self.has_pervertex = true;
                        let members = self.clip_cull_decls(" ");
                        out.raw(&format!(
                            "out gl_PerVertex {{\n vec4 gl_Position;\n float gl_PointSize;\n{members}}};\n"
                        ));
                    } else {
                        out.raw(&self.clip_cull_decls("out "));
                    }
                    out.line("vec4 clip_dist_temp[2];");
                }
            }
            ShaderType::Geometry => {
                if self.num_in_clip_dist > 0 || key.clip_plane_enable || key.prev_stage_pervertex_out {
                    out.line(&self.input_pervertex_block());
                }
                if self.num_clip_dist > 0 {
                    out.raw(&self.clip_cull_decls("out "));
                    out.line("vec4 clip_dist_temp[2];");
                }
            }
            ShaderType::Fragment if self.num_in_clip_dist > 0 => {
                if key.prev_stage_num_clip_out > 0 {
                    out.line(&format!("in float gl_ClipDistance[{}];", key.prev_stage_num_clip_out));
                }
                if key.prev_stage_num_cull_out > 0 {
                    out.line(&format!("in float gl_CullDistance[{}];", key.prev_stage_num_cull_out));
                }
            }
            ShaderType::TessCtrl | ShaderType::TessEval => {
                if self.num_in_clip_dist > 0 || key.prev_stage_pervertex_out {
                    out.line(&self.input_pervertex_block());
                }
                if self.num_clip_dist > 0 {
                    out.raw(&format!(
                        "out gl_PerVertex {{\n vec4 gl_Position;\n float gl_PointSize;\n float gl_ClipDistance[{}];\n}} gl_out[];\n",
                        self.num_clip_dist
                    ));
                    out.line("vec4 clip_dist_temp[2];");
                }
            }
            _ => {}
        }
    }

    fn emit_so_outputs(&self, out: &mut GlslBuilder) {
        let Some(so) = self.key.so_info.as_ref() else {
            return;
        };
        for (i, o) in so.outputs.iter().enumerate() {
            if !self.so_need_temp.get(i).copied().unwrap_or(false) {
                continue;
            }
            let ty = match o.num_components {
                1 => "float".to_string(),
                n => format!("vec{n}"),
            };
            if self.stage == ShaderType::TessCtrl {
                out.line(&format!("out {ty} tfout{i}[];"));
            } else if self.stage == ShaderType::Geometry && o.stream != 0 {
                out.line(&format!("layout (stream={}) out {ty} tfout{i};", o.stream));
            } else {
                out.line(&format!("out {ty} tfout{i};"));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Globals
    // -----------------------------------------------------------------------

    fn emit_temporaries(&self, out: &mut GlslBuilder) {
        for range in &self.temp_ranges {
            out.line(&format!(
                "vec4 temp{}[{}];",
                range.first,
                range.last - range.first + 1
            ));
        }
        if self.write_mul_utemp {
            out.line("uvec4 mul_utemp;");
            out.line("uvec4 umul_temp;");
        }
        if self.write_mul_itemp {
            out.line("ivec4 mul_itemp;");
            out.line("ivec4 imul_temp;");
        }
        if self.ssbo_used_mask != 0 || self.use_ssbo_addr_temp {
            out.line("uint ssbo_addr_temp;");
        }
        if self.reqs.contains(ShaderReq::FP64) || self.use_fp64_temps {
            out.line("dvec2 fp64_dst[3];");
            out.line("dvec2 fp64_src[4];");
        }
        for i in 0..self.num_address {
            out.line(&format!("int addr{i};"));
        }
        if self.key.color_two_side {
            for i in 0..2 {
                if self.color_in_mask & (1 << i) != 0 {
                    out.line(&format!("vec4 realcolor{i};"));
                }
            }
        }
    }

    fn emit_constants(&self, out: &mut GlslBuilder) {
        let cname = self.prefix();
        if self.num_consts > 0 {
            out.line(&format!("uniform uvec4 {cname}const0[{}];", self.num_consts));
        }
        if self.ubo_idx.is_empty() {
            return;
        }
        if self.dim_indirect_files & File::Constant.bit() != 0 {
            let size = self.ubo_sizes.first().copied().unwrap_or(1);
            out.line(&format!(
                "uniform {cname}ubo {{ vec4 ubocontents[{size}]; }} {cname}uboarr[{}];",
                self.ubo_idx.len()
            ));
        } else {
            for (idx, size) in self.ubo_idx.iter().zip(&self.ubo_sizes) {
                out.line(&format!(
                    "uniform {cname}ubo{idx} {{ vec4 {cname}ubo{idx}contents[{size}]; }};"
                ));
            }
        }
    }

    fn emit_sampler_decl(&mut self, out: &mut GlslBuilder, index: u32, range: u32, sampler: SamplerDecl) {
        let sname = self.prefix();
        let precision = if self.cfg.use_gles { "highp " } else { "" };
        let ptc = return_prefix(sampler.return_type);
        let stc = sampler_type_name(sampler.target);

        if self.cfg.use_gles && sampler.target == TexTarget::Tex1D {
            out.line(&format!("uniform highp {ptc}sampler2D {sname}samp{index};"));
        } else if range > 0 {
            out.line(&format!("uniform {precision}{ptc}sampler{stc} {sname}samp{index}[{range}];"));
        } else {
            out.line(&format!("uniform {precision}{ptc}sampler{stc} {sname}samp{index};"));
        }
        if sampler.target.is_shadow() {
            out.line(&format!("uniform {precision}vec4 {sname}shadmask{index};"));
            out.line(&format!("uniform {precision}vec4 {sname}shadadd{index};"));
            self.shadow_samp_mask |= 1 << index;
        }
    }

    fn emit_samplers(&mut self, out: &mut GlslBuilder) {
        let default = SamplerDecl {
            target: TexTarget::Tex2D,
            return_type: ReturnType::Float,
        };
        if self.indirect_files & File::Sampler.bit() != 0 {
            for array in self.sampler_arrays.clone() {
                let sampler = self.samplers[array.first as usize].unwrap_or(default);
                self.emit_sampler_decl(out, array.first, array.array_size, sampler);
            }
        } else {
            for i in 0..super::MAX_SAMPLERS {
                if self.samplers_used & (1 << i) == 0 {
                    continue;
                }
                let sampler = self.samplers[i as usize].unwrap_or(default);
                self.emit_sampler_decl(out, i, 0, sampler);
            }
        }
    }

    fn emit_image_decl(&self, out: &mut GlslBuilder, index: u32, range: u32, image: &ImageDecl) {
        let sname = self.prefix();
        let layout = image.format.and_then(image_layout);
        let ptc = return_prefix(image.return_type());
        let stc = sampler_type_name(image.target);
        let precision = if self.cfg.use_gles { "highp " } else { "" };
        let access = if !image.writable {
            "readonly "
        } else if layout.is_none() {
            "writeonly "
        } else {
            ""
        };

        let mut line = String::new();
        if self.cfg.use_gles {
            match layout {
                Some(fmt) => line.push_str(&format!("layout(binding={index}, {fmt}) ")),
                None => line.push_str(&format!("layout(binding={index}) ")),
            }
        } else if let Some(fmt) = layout {
            line.push_str(&format!("layout({fmt}) "));
        }
        let array = if range > 0 {
            format!("[{range}]")
        } else {
            String::new()
        };
        line.push_str(&format!(
            "{access}uniform {precision}{ptc}image{stc} {sname}img{index}{array};"
        ));
        out.line(&line);
    }

    fn emit_images(&self, out: &mut GlslBuilder) {
        if self.indirect_files & File::Image.bit() != 0 {
            for array in &self.image_arrays {
                if let Some(image) = &self.images[array.first as usize] {
                    self.emit_image_decl(out, array.first, array.array_size, image);
                }
            }
        } else {
            for i in 0..super::MAX_IMAGES {
                if self.images_used_mask & (1 << i) == 0 {
                    continue;
                }
                if let Some(image) = &self.images[i as usize] {
                    self.emit_image_decl(out, i, 0, image);
                }
            }
        }
    }

    fn emit_buffers(&self, out: &mut GlslBuilder) {
        let sname = self.prefix();
        if self.indirect_files & File::Buffer.bit() != 0 {
            for (start, count) in consecutive_ranges(self.ssbo_used_mask) {
                let atomic = if self.ssbo_atomic_mask & (1 << start) != 0 {
                    "atomic"
                } else {
                    ""
                };
                out.line(&format!(
                    "layout (binding = {start}, std430) buffer {sname}ssbo{start} {{ uint {sname}ssbocontents{start}[]; }} {sname}ssboarr{atomic}[{count}];"
                ));
            }
        } else {
            for id in 0..super::MAX_SSBOS {
                if self.ssbo_used_mask & (1 << id) == 0 {
                    continue;
                }
                let ty = if self.ssbo_integer_mask & (1 << id) != 0 {
                    "int"
                } else {
                    "uint"
                };
                out.line(&format!(
                    "layout (binding = {id}, std430) buffer {sname}ssbo{id} {{ {ty} {sname}ssbocontents{id}[]; }};"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_runs() {
        assert!(consecutive_ranges(0).is_empty());
        assert_eq!(consecutive_ranges(0b1110_0110), vec![(1, 2), (5, 3)]);
        assert_eq!(consecutive_ranges(u32::MAX), vec![(0, 32)]);
    }

    #[test]
    fn interpolation_qualifiers() {
        assert_eq!(interp_qualifier(false, Interp::Linear, false), Some("noperspective "));
        assert_eq!(interp_qualifier(true, Interp::Linear, false), Some(""));
        assert_eq!(interp_qualifier(false, Interp::Color, false), None);
        assert_eq!(interp_qualifier(false, Interp::Color, true), Some("flat "));
        assert_eq!(location_qualifier(Location::Sample), "sample ");
    }

    #[test]
    fn image_formats() {
        assert_eq!(image_layout(VirglFormat::R32_UINT), Some("r32ui"));
        assert_eq!(image_layout(VirglFormat::B8G8R8A8_UNORM), None);
    }
}
