//! TGSI to GLSL translation.
//!
//! One [`Translator`] walks a parsed [`Program`] in four passes: analysis of
//! instruction operands, properties and immediates, declarations, and the
//! instruction stream itself which fills `main()`. Declarations only record
//! what they need; the header and global declarations are rendered at the
//! end once every requirement is known.
//!
//! The submodules each extend [`Translator`]:
//!
//! - [`decl`]: declaration handling and the GLSL names bound to registers
//! - [`operand`]: source and destination operand strings
//! - [`inst`]: the per-opcode templates
//! - [`tex`]: texture, image and buffer access
//! - [`epilogue`]: stage exits (alpha test, clip distances, stream output)
//! - [`emit`]: the `#version` header and global declarations

mod decl;
mod emit;
mod epilogue;
mod inst;
mod operand;
mod tex;

pub(crate) use emit::{interp_qualifier, location_qualifier};

use tracing::{debug, warn};
use virgl_core::pipe::ShaderType;
use virgl_core::VirglFormat;

use crate::error::{Result, TranslateError};
use crate::glsl::{GlslBuilder, ShaderReq};
use crate::info::{InterpInfo, ShaderArray, ShaderCfg, ShaderInfo};
use crate::key::ShaderKey;
use crate::tgsi::{
    File, ImmType, Immediate, Interp, Location, Opcode, Program, PropertyName, ReturnType,
    Semantic, TexTarget,
};

pub(crate) const MAX_INPUTS: usize = 64;
pub(crate) const MAX_OUTPUTS: usize = 64;
pub(crate) const MAX_SYSTEM_VALUES: usize = 32;
pub(crate) const MAX_IMMEDIATES: usize = 1024;
pub(crate) const MAX_SAMPLERS: u32 = 32;
pub(crate) const MAX_IMAGES: u32 = 32;
pub(crate) const MAX_UBOS: usize = 32;
pub(crate) const MAX_SSBOS: u32 = 32;

/// A shader input, output or system value and the GLSL name bound to it.
#[derive(Debug, Clone)]
pub(crate) struct IoDecl {
    pub semantic: Semantic,
    pub sid: u32,
    pub first: u32,
    pub last: u32,
    pub array_id: u32,
    pub interpolate: Interp,
    pub location: Location,
    pub invariant: bool,
    pub precise: bool,
    /// Built-in variable; never declared by us.
    pub predefined_no_emit: bool,
    /// Read or written without a per-register index suffix.
    pub no_index: bool,
    /// Member of the `gl_in`/`gl_out` blocks.
    pub gl_block: bool,
    pub override_no_wm: bool,
    pub is_int: bool,
    pub fbfetch_used: bool,
    pub stream: u32,
    pub name: String,
}

impl IoDecl {
    fn new(semantic: Semantic, sid: u32, first: u32, last: u32) -> Self {
        Self {
            semantic,
            sid,
            first,
            last,
            array_id: 0,
            interpolate: Interp::Constant,
            location: Location::Center,
            invariant: false,
            precise: false,
            predefined_no_emit: false,
            no_index: false,
            gl_block: false,
            override_no_wm: false,
            is_int: false,
            fbfetch_used: false,
            stream: 0,
            name: String::new(),
        }
    }

    pub fn contains(&self, index: i32) -> bool {
        index >= self.first as i32 && index <= self.last as i32
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TempRange {
    pub first: u32,
    pub last: u32,
    pub array_id: u32,
}

/// Contiguous range of indirectly addressed generic or patch varyings.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IoRange {
    pub first: u32,
    pub last: u32,
    pub array_id: u32,
    pub used: bool,
}

impl IoRange {
    fn size(&self) -> u32 {
        self.last - self.first + 1
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SamplerDecl {
    pub target: TexTarget,
    pub return_type: ReturnType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ImageDecl {
    pub target: TexTarget,
    pub format: Option<VirglFormat>,
    pub writable: bool,
    pub raw: bool,
}

impl ImageDecl {
    /// Component type the image format stores.
    pub fn return_type(&self) -> ReturnType {
        match self.format.and_then(|f| f.desc()) {
            Some(desc) if desc.flags.contains(virgl_core::format::FormatFlags::UINT) => {
                ReturnType::Uint
            }
            Some(desc) if desc.flags.contains(virgl_core::format::FormatFlags::SINT) => {
                ReturnType::Sint
            }
            _ => ReturnType::Float,
        }
    }
}

/// Values taken from `PROPERTY` lines.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Props {
    pub fs_coord_origin: u32,
    pub fs_pixel_center: u32,
    pub early_depth_stencil: bool,
    pub gs_in_prim: u32,
    pub gs_out_prim: u32,
    pub gs_max_out_verts: u32,
    pub gs_num_invocations: u32,
    pub num_clip_dist_prop: u32,
    pub num_cull_dist_prop: u32,
    pub tcs_vertices_out: u32,
    pub tes_prim_mode: u32,
    pub tes_spacing: u32,
    pub tes_vertex_order_cw: bool,
    pub tes_point_mode: bool,
    pub local_cs_block_size: [u32; 3],
}

/// Translation state for one program.
pub(crate) struct Translator<'a> {
    cfg: &'a ShaderCfg,
    key: &'a ShaderKey,
    prog: &'a Program,
    stage: ShaderType,
    req_local_mem: u32,

    main: GlslBuilder,
    reqs: ShaderReq,
    glsl_ver_required: u32,

    inputs: Vec<IoDecl>,
    outputs: Vec<IoDecl>,
    system_values: Vec<IoDecl>,
    num_interps: u32,
    attrib_input_mask: u32,
    color_in_mask: u32,
    front_face_emitted: bool,
    has_sample_input: bool,

    generic_input_range: IoRange,
    patch_input_range: IoRange,
    generic_output_range: IoRange,
    patch_output_range: IoRange,

    temp_ranges: Vec<TempRange>,
    samplers: [Option<SamplerDecl>; MAX_SAMPLERS as usize],
    samplers_used: u32,
    uses_sampler_buf: bool,
    sampler_arrays: Vec<ShaderArray>,
    shadow_samp_mask: u32,

    images: [Option<ImageDecl>; MAX_IMAGES as usize],
    images_used_mask: u32,
    image_arrays: Vec<ShaderArray>,

    ssbo_used_mask: u32,
    ssbo_atomic_mask: u32,
    ssbo_array_base: u32,
    ssbo_atomic_array_base: u32,
    ssbo_integer_mask: u32,
    integer_memory: bool,

    num_consts: u32,
    ubo_idx: Vec<u32>,
    ubo_sizes: Vec<u32>,
    ubo_base: u32,
    num_address: u32,

    props: Props,
    indirect_files: u32,
    dim_indirect_files: u32,

    num_clip_dist: u32,
    num_in_clip_dist: u32,
    has_clipvertex: bool,
    has_clipvertex_so: bool,
    has_pervertex: bool,
    write_all_cbufs: bool,
    uses_winsys_adjust_y: bool,

    write_mul_utemp: bool,
    write_mul_itemp: bool,
    use_ssbo_addr_temp: bool,
    use_fp64_temps: bool,

    so_need_temp: Vec<bool>,
    so_names: Vec<String>,
}

impl<'a> Translator<'a> {
    pub(crate) fn new(
        cfg: &'a ShaderCfg,
        key: &'a ShaderKey,
        prog: &'a Program,
        req_local_mem: u32,
    ) -> Self {
        Self {
            cfg,
            key,
            prog,
            stage: prog.processor,
            req_local_mem,
            main: GlslBuilder::new(),
            reqs: ShaderReq::empty(),
            glsl_ver_required: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            system_values: Vec::new(),
            num_interps: 0,
            attrib_input_mask: 0,
            color_in_mask: 0,
            front_face_emitted: false,
            has_sample_input: false,
            generic_input_range: IoRange::default(),
            patch_input_range: IoRange::default(),
            generic_output_range: IoRange::default(),
            patch_output_range: IoRange::default(),
            temp_ranges: Vec::new(),
            samplers: [None; MAX_SAMPLERS as usize],
            samplers_used: 0,
            uses_sampler_buf: false,
            sampler_arrays: Vec::new(),
            shadow_samp_mask: 0,
            images: [None; MAX_IMAGES as usize],
            images_used_mask: 0,
            image_arrays: Vec::new(),
            ssbo_used_mask: 0,
            ssbo_atomic_mask: 0,
            ssbo_array_base: u32::MAX,
            ssbo_atomic_array_base: u32::MAX,
            ssbo_integer_mask: 0,
            integer_memory: false,
            num_consts: 0,
            ubo_idx: Vec::new(),
            ubo_sizes: Vec::new(),
            ubo_base: 0,
            num_address: 0,
            props: Props::default(),
            indirect_files: prog.indirect_files(),
            dim_indirect_files: prog.dimension_indirect_files(),
            num_clip_dist: 0,
            num_in_clip_dist: 0,
            has_clipvertex: false,
            has_clipvertex_so: false,
            has_pervertex: false,
            write_all_cbufs: false,
            uses_winsys_adjust_y: false,
            write_mul_utemp: false,
            write_mul_itemp: false,
            use_ssbo_addr_temp: false,
            use_fp64_temps: false,
            so_need_temp: Vec::new(),
            so_names: Vec::new(),
        }
    }

    /// Run every pass and return the GLSL source plus its metadata.
    pub(crate) fn run(mut self) -> Result<(String, ShaderInfo)> {
        let prog = self.prog;
        self.analyze();
        if self.cfg.use_core_profile && self.cfg.glsl_version >= 140 {
            self.require_glsl_ver(140);
        }
        self.properties();
        self.check_immediates()?;
        for decl in &prog.declarations {
            self.declaration(decl)?;
        }

        let mut saw_end = false;
        self.begin_main();
        for inst in &prog.instructions {
            if inst.opcode == Opcode::END {
                saw_end = true;
            }
            self.instruction(inst)?;
        }
        if !saw_end {
            return Err(TranslateError::MissingEnd);
        }

        let mut glsl = GlslBuilder::new();
        self.emit_header(&mut glsl);
        self.emit_ios(&mut glsl)?;
        let main = std::mem::take(&mut self.main);
        glsl.raw(main.as_str());

        let info = self.build_info();
        debug!(
            "translated {:?} shader: {} bytes, reqs {:?}",
            self.stage,
            glsl.len(),
            self.reqs
        );
        Ok((glsl.into_string(), info))
    }

    pub(crate) fn require_glsl_ver(&mut self, ver: u32) {
        self.glsl_ver_required = self.glsl_ver_required.max(ver);
    }

    fn prefix(&self) -> &'static str {
        self.stage.prefix()
    }

    fn is_fs(&self) -> bool {
        self.stage == ShaderType::Fragment
    }

    // -----------------------------------------------------------------------
    // Pre-passes
    // -----------------------------------------------------------------------

    /// Find buffers and shared memory touched by signed atomics; those are
    /// declared with `int` storage.
    fn analyze(&mut self) {
        for inst in &self.prog.instructions {
            if !matches!(inst.opcode, Opcode::ATOMIMIN | Opcode::ATOMIMAX) {
                continue;
            }
            let Some(src) = inst.src.first() else {
                continue;
            };
            match src.file {
                File::Buffer => self.ssbo_integer_mask |= 1 << src.index,
                File::Memory => self.integer_memory = true,
                _ => {}
            }
        }

        if self.dim_indirect_files & File::Constant.bit() != 0 {
            self.require_glsl_ver(150);
        }
        if self.indirect_files & (File::Buffer.bit() | File::Image.bit()) != 0 {
            self.require_glsl_ver(150);
            self.reqs |= ShaderReq::GPU_SHADER5;
        }
        if self.indirect_files & File::Sampler.bit() != 0 {
            self.reqs |= ShaderReq::GPU_SHADER5;
        }
    }

    fn properties(&mut self) {
        for prop in &self.prog.properties {
            let v = prop.value;
            let p = &mut self.props;
            match prop.name {
                PropertyName::FsCoordOrigin => p.fs_coord_origin = v,
                PropertyName::FsCoordPixelCenter => p.fs_pixel_center = v,
                PropertyName::FsColor0WritesAllCbufs => self.write_all_cbufs = v != 0,
                PropertyName::FsEarlyDepthStencil => {
                    p.early_depth_stencil = v > 0;
                    if p.early_depth_stencil {
                        self.glsl_ver_required = self.glsl_ver_required.max(150);
                        self.reqs |= ShaderReq::IMAGE_LOAD_STORE;
                    }
                }
                PropertyName::GsInputPrim => p.gs_in_prim = v,
                PropertyName::GsOutputPrim => p.gs_out_prim = v,
                PropertyName::GsMaxOutputVertices => p.gs_max_out_verts = v,
                PropertyName::GsInvocations => p.gs_num_invocations = v,
                PropertyName::NumClipDistEnabled => p.num_clip_dist_prop = v,
                PropertyName::NumCullDistEnabled => p.num_cull_dist_prop = v,
                PropertyName::TcsVerticesOut => p.tcs_vertices_out = v,
                PropertyName::TesPrimMode => p.tes_prim_mode = v,
                PropertyName::TesSpacing => p.tes_spacing = v,
                PropertyName::TesVertexOrderCw => p.tes_vertex_order_cw = v != 0,
                PropertyName::TesPointMode => p.tes_point_mode = v != 0,
                PropertyName::CsFixedBlockWidth => p.local_cs_block_size[0] = v,
                PropertyName::CsFixedBlockHeight => p.local_cs_block_size[1] = v,
                PropertyName::CsFixedBlockDepth => p.local_cs_block_size[2] = v,
            }
        }
    }

    fn check_immediates(&mut self) -> Result<()> {
        if self.prog.immediates.len() > MAX_IMMEDIATES {
            return Err(TranslateError::Overflow {
                what: "immediates",
                max: MAX_IMMEDIATES,
            });
        }
        if self
            .prog
            .immediates
            .iter()
            .any(|imm| matches!(imm.ty, ImmType::Uint32 | ImmType::Int32))
        {
            self.reqs |= ShaderReq::INTS;
        }
        Ok(())
    }

    pub(crate) fn immediate(&self, index: i32) -> Result<Immediate> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.prog.immediates.get(i).copied())
            .ok_or_else(|| TranslateError::Undeclared(format!("IMM[{index}]")))
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    fn build_info(&self) -> ShaderInfo {
        let key = self.key;
        let num_clip_out = if self.props.num_clip_dist_prop > 0 {
            self.props.num_clip_dist_prop
        } else if self.num_clip_dist > 0 {
            self.num_clip_dist
        } else if key.clip_plane_enable {
            8
        } else {
            0
        };

        ShaderInfo {
            samplers_used_mask: self.samplers_used,
            images_used_mask: self.images_used_mask,
            num_consts: self.num_consts,
            num_ubos: self.ubo_idx.len() as u32,
            ubo_idx: self.ubo_idx.clone(),
            ubo_indirect: self.dim_indirect_files & File::Constant.bit() != 0,
            ssbo_used_mask: self.ssbo_used_mask,
            num_indirect_generic_inputs: range_len(&self.generic_input_range),
            num_indirect_patch_inputs: range_len(&self.patch_input_range),
            num_indirect_generic_outputs: range_len(&self.generic_output_range),
            num_indirect_patch_outputs: range_len(&self.patch_output_range),
            num_inputs: self.inputs.len() as u32,
            num_interps: self.num_interps,
            num_outputs: self.outputs.len() as u32,
            shadow_samp_mask: self.shadow_samp_mask,
            num_clip_out,
            num_cull_out: self.props.num_cull_dist_prop,
            num_ucp: if key.clip_plane_enable { 8 } else { 0 },
            gs_out_prim: self.props.gs_out_prim,
            tes_prim: self.props.tes_prim_mode,
            tes_point_mode: self.props.tes_point_mode,
            so_names: self.so_names.clone(),
            attrib_input_mask: self.attrib_input_mask,
            sampler_arrays: self.sampler_arrays.clone(),
            image_arrays: self.image_arrays.clone(),
            interpinfo: self.fragment_interpolants(),
            has_pervertex_out: self.has_pervertex,
            has_sample_input: self.has_sample_input,
            glsl_ver: self.glsl_version_emitted(),
        }
    }

    /// Generic and colour inputs whose interpolation the upstream stage has
    /// to match.
    fn fragment_interpolants(&self) -> Vec<InterpInfo> {
        if !self.is_fs() {
            return Vec::new();
        }
        self.inputs
            .iter()
            .filter(|io| {
                matches!(io.semantic, Semantic::Generic | Semantic::Color)
                    && !io.predefined_no_emit
            })
            .map(|io| InterpInfo {
                semantic: io.semantic,
                semantic_index: io.sid,
                interpolate: io.interpolate,
                location: io.location,
            })
            .collect()
    }

    pub(crate) fn warn_unsupported(&self, what: &str) {
        warn!("{:?} shader: unsupported {what}", self.stage);
    }
}

fn range_len(range: &IoRange) -> u32 {
    if range.used {
        range.size()
    } else {
        0
    }
}
