//! Declarations: bind every declared register to a GLSL name and record
//! what the header will have to declare.

use virgl_core::pipe::ShaderType;

use super::{
    ImageDecl, IoDecl, IoRange, SamplerDecl, TempRange, Translator, MAX_IMAGES, MAX_INPUTS,
    MAX_OUTPUTS, MAX_SAMPLERS, MAX_SSBOS, MAX_SYSTEM_VALUES, MAX_UBOS,
};
use crate::error::{Result, TranslateError};
use crate::glsl::ShaderReq;
use crate::info::ShaderArray;
use crate::tgsi::{Declaration, File, Interp, Location, ReturnType, Semantic, TexTarget};

/// Name prefix of varyings written by the stage feeding `stage`.
pub(crate) fn input_prefix(stage: ShaderType, gs: bool, tcs: bool, tes: bool) -> &'static str {
    match stage {
        ShaderType::Fragment if gs => "gso",
        ShaderType::Fragment if tes => "teo",
        ShaderType::Fragment => "vso",
        ShaderType::Geometry if tes => "teo",
        ShaderType::Geometry => "vso",
        ShaderType::TessEval if tcs => "tco",
        ShaderType::TessEval => "vso",
        ShaderType::TessCtrl => "vso",
        ShaderType::Vertex | ShaderType::Compute => "in",
    }
}

/// Name prefix of varyings written by `stage`.
pub(crate) fn output_prefix(stage: ShaderType) -> &'static str {
    match stage {
        ShaderType::Fragment => "fsout",
        ShaderType::Geometry => "gso",
        ShaderType::Vertex => "vso",
        ShaderType::TessCtrl => "tco",
        ShaderType::TessEval => "teo",
        ShaderType::Compute => "out",
    }
}

fn extend_range(range: &mut IoRange, sid: u32, array_id: u32) {
    if !range.used || sid < range.first {
        range.first = sid;
        range.array_id = array_id;
        if !range.used {
            range.last = sid;
        }
        range.used = true;
    }
    if sid > range.last {
        range.last = sid;
    }
}

impl Translator<'_> {
    pub(super) fn declaration(&mut self, decl: &Declaration) -> Result<()> {
        match decl.file {
            File::Input => {
                // ranges become one entry per register
                for (n, reg) in (decl.first..=decl.last).enumerate() {
                    self.declare_input(decl, reg, n as u32)?;
                }
            }
            File::Output => {
                for (n, reg) in (decl.first..=decl.last).enumerate() {
                    self.declare_output(decl, reg, n as u32)?;
                }
            }
            File::Temporary => self.temp_ranges.push(TempRange {
                first: decl.first,
                last: decl.last,
                array_id: decl.array_id,
            }),
            File::Sampler => {
                if decl.last >= MAX_SAMPLERS {
                    return Err(overflow("samplers", MAX_SAMPLERS as usize));
                }
                for i in decl.first..=decl.last {
                    self.samplers_used |= 1 << i;
                }
            }
            File::SamplerView => {
                if decl.last >= MAX_SAMPLERS {
                    return Err(overflow("sampler views", MAX_SAMPLERS as usize));
                }
                let target = decl
                    .target
                    .ok_or_else(|| TranslateError::Unsupported("sampler view without target".into()))?;
                self.add_samplers(decl.first, decl.last, target, decl.return_type);
            }
            File::Image => {
                self.reqs |= ShaderReq::IMAGE_LOAD_STORE;
                if decl.last >= MAX_IMAGES {
                    return Err(overflow("images", MAX_IMAGES as usize));
                }
                let image = ImageDecl {
                    target: decl
                        .target
                        .ok_or_else(|| TranslateError::Unsupported("image without target".into()))?,
                    format: decl.image_format,
                    writable: decl.writable,
                    raw: false,
                };
                self.add_images(decl.first, decl.last, image);
            }
            File::Buffer => {
                if decl.first >= MAX_SSBOS {
                    return Err(overflow("buffers", MAX_SSBOS as usize));
                }
                self.ssbo_used_mask |= 1 << decl.first;
                if decl.atomic {
                    self.ssbo_atomic_array_base = self.ssbo_atomic_array_base.min(decl.first);
                    self.ssbo_atomic_mask |= 1 << decl.first;
                } else {
                    self.ssbo_array_base = self.ssbo_array_base.min(decl.first);
                }
            }
            File::Constant => match decl.dimension {
                Some(dim) if dim != 0 => {
                    if self.ubo_idx.len() >= MAX_UBOS {
                        return Err(overflow("uniform buffers", MAX_UBOS));
                    }
                    self.ubo_idx.push(dim);
                    self.ubo_sizes.push(decl.last + 1);
                }
                _ => {
                    // plain constants occupy UBO binding 0
                    self.ubo_base = 1;
                    self.num_consts = self.num_consts.max(decl.last + 1);
                }
            },
            File::Address => self.num_address = decl.last + 1,
            File::SystemValue => {
                for reg in decl.first..=decl.last {
                    self.declare_system_value(decl, reg)?;
                }
            }
            File::Memory | File::Immediate => {}
        }
        Ok(())
    }

    fn push_input(&mut self, io: IoDecl) -> Result<()> {
        if self.inputs.len() >= MAX_INPUTS {
            return Err(overflow("inputs", MAX_INPUTS));
        }
        self.inputs.push(io);
        Ok(())
    }

    fn indirect_inputs(&self) -> bool {
        self.indirect_files & File::Input.bit() != 0
            || self.key.num_indirect_generic_inputs > 0
            || self.key.num_indirect_patch_inputs > 0
    }

    fn indirect_outputs(&self) -> bool {
        self.indirect_files & File::Output.bit() != 0
            || self.key.num_indirect_generic_outputs > 0
            || self.key.num_indirect_patch_outputs > 0
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    fn declare_input(&mut self, decl: &Declaration, reg: u32, offset: u32) -> Result<()> {
        let stage = self.stage;
        let (semantic, base_sid) = decl.semantic.unwrap_or((Semantic::Generic, 0));
        let mut io = IoDecl::new(semantic, base_sid + offset, reg, reg);
        io.interpolate = decl.interp;
        io.location = decl.location;
        io.array_id = decl.array_id;

        if stage == ShaderType::Vertex {
            // vertex attributes are addressed by slot, not by semantic
            self.attrib_input_mask |= 1 << reg;
            io.name = format!("in_{reg}");
            return self.push_input(io);
        }

        if stage == ShaderType::Fragment && decl.location == Location::Sample {
            self.reqs |= ShaderReq::GPU_SHADER5;
            self.has_sample_input = true;
        }

        let indirect = self.indirect_inputs();
        let is_fs = stage == ShaderType::Fragment;
        let is_gs = stage == ShaderType::Geometry;
        let in_block_stage = matches!(
            stage,
            ShaderType::Geometry | ShaderType::TessCtrl | ShaderType::TessEval
        );
        let mut two_side = false;

        let builtin: Option<&'static str> = match semantic {
            Semantic::Color if is_fs => {
                if self.glsl_ver_required < 140 {
                    io.no_index = true;
                    match io.sid {
                        0 => Some("gl_Color"),
                        1 => Some("gl_SecondaryColor"),
                        sid => {
                            return Err(TranslateError::Unsupported(format!(
                                "color input index {sid}"
                            )))
                        }
                    }
                } else {
                    two_side = self.key.color_two_side;
                    None
                }
            }
            Semantic::PrimId if is_gs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                self.reqs |= ShaderReq::INTS;
                Some("gl_PrimitiveIDIn")
            }
            Semantic::PrimId if is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                self.require_glsl_ver(150);
                Some("gl_PrimitiveID")
            }
            Semantic::ViewportIndex if is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.is_int = true;
                io.override_no_wm = true;
                if self.glsl_ver_required >= 140 {
                    self.reqs |= ShaderReq::LAYER;
                }
                Some("gl_ViewportIndex")
            }
            Semantic::Layer if is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.is_int = true;
                io.override_no_wm = true;
                self.reqs |= ShaderReq::LAYER;
                Some("gl_Layer")
            }
            Semantic::PSize if in_block_stage => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                io.gl_block = true;
                self.reqs |= ShaderReq::PSIZE;
                Some("gl_PointSize")
            }
            Semantic::ClipDist if in_block_stage || is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.gl_block = in_block_stage;
                self.num_in_clip_dist += 4;
                Some("gl_ClipDistance")
            }
            Semantic::Position if in_block_stage => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.gl_block = true;
                Some("gl_Position")
            }
            Semantic::Position if is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                Some("gl_FragCoord")
            }
            Semantic::Face if is_fs => {
                if self.front_face_emitted {
                    return Ok(());
                }
                io.predefined_no_emit = true;
                io.no_index = true;
                self.front_face_emitted = true;
                Some("gl_FrontFacing")
            }
            Semantic::Generic
                if is_fs
                    && io.sid < 8
                    && self.key.coord_replace & (1 << io.sid) != 0
                    && (!self.cfg.use_gles || self.key.fs_prim_is_points) =>
            {
                io.predefined_no_emit = true;
                io.no_index = true;
                if self.cfg.use_gles {
                    self.uses_winsys_adjust_y = true;
                    Some("vec4(gl_PointCoord.x, mix(1.0 - gl_PointCoord.y, gl_PointCoord.y, clamp(winsys_adjust_y, 0.0, 1.0)), 0.0, 1.0)")
                } else {
                    Some("vec4(gl_PointCoord, 0.0, 1.0)")
                }
            }
            _ => None,
        };

        if indirect {
            match semantic {
                Semantic::Patch => {
                    io.predefined_no_emit = true;
                    extend_range(&mut self.patch_input_range, io.sid, decl.array_id);
                }
                Semantic::Generic if builtin.is_none() => {
                    io.predefined_no_emit = true;
                    extend_range(&mut self.generic_input_range, io.sid, decl.array_id);
                }
                _ => {}
            }
        }

        let prefix = match builtin {
            Some(name) => name,
            None if semantic == Semantic::Color && is_fs => "ex",
            None => input_prefix(
                stage,
                self.key.gs_present,
                self.key.tcs_present,
                self.key.tes_present,
            ),
        };
        io.name = if io.no_index {
            prefix.to_string()
        } else {
            match semantic {
                Semantic::Fog => format!("{prefix}_f{}", io.sid),
                Semantic::Color => format!("{prefix}_c{}", io.sid),
                Semantic::Generic => format!("{prefix}_g{}", io.sid),
                Semantic::Patch => format!("{prefix}_p{}", io.sid),
                _ => format!("{prefix}_{}", io.first),
            }
        };

        let sid = io.sid;
        let interpolate = io.interpolate;
        let location = io.location;
        let first = io.first;
        self.push_input(io)?;

        if two_side {
            let mut back = IoDecl::new(Semantic::BColor, sid, first, first);
            back.interpolate = interpolate;
            back.location = location;
            back.name = format!("ex_bc{sid}");
            self.color_in_mask |= 1 << sid;
            self.push_input(back)?;

            if !self.front_face_emitted {
                let mut face = IoDecl::new(Semantic::Face, 0, 0, 0);
                face.interpolate = Interp::Constant;
                face.predefined_no_emit = true;
                face.no_index = true;
                face.name = "gl_FrontFacing".into();
                self.front_face_emitted = true;
                self.push_input(face)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Outputs
    // -----------------------------------------------------------------------

    fn declare_output(&mut self, decl: &Declaration, reg: u32, offset: u32) -> Result<()> {
        if self.outputs.len() >= MAX_OUTPUTS {
            return Err(overflow("outputs", MAX_OUTPUTS));
        }
        let stage = self.stage;
        let (semantic, base_sid) = decl.semantic.unwrap_or((Semantic::Generic, 0));
        let mut io = IoDecl::new(semantic, base_sid + offset, reg, reg);
        io.interpolate = decl.interp;
        io.invariant = decl.invariant;
        io.array_id = decl.array_id;

        let indirect = self.indirect_outputs();
        let is_fs = stage == ShaderType::Fragment;
        let is_vs = stage == ShaderType::Vertex;
        let is_gs = stage == ShaderType::Geometry;
        let is_tcs = stage == ShaderType::TessCtrl;
        let mut color_offset: i64 = 0;

        let builtin: Option<&'static str> = match semantic {
            Semantic::Position if is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                Some("gl_FragDepth")
            }
            Semantic::Position => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.gl_block = is_tcs;
                Some("gl_Position")
            }
            Semantic::Stencil if is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                io.is_int = true;
                self.reqs |= ShaderReq::INTS | ShaderReq::STENCIL_EXPORT;
                Some("gl_FragStencilRefARB")
            }
            Semantic::ClipDist => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.gl_block = is_tcs;
                self.num_clip_dist += 4;
                if is_vs && (self.key.gs_present || self.key.tcs_present) {
                    self.require_glsl_ver(150);
                }
                Some("gl_ClipDistance")
            }
            Semantic::ClipVertex => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                if self.glsl_ver_required >= 140 {
                    self.has_clipvertex = true;
                }
                Some("gl_ClipVertex")
            }
            Semantic::SampleMask if is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                io.is_int = true;
                self.reqs |= ShaderReq::INTS | ShaderReq::SAMPLE_SHADING;
                Some("gl_SampleMask")
            }
            Semantic::Color | Semantic::BColor if is_vs => {
                if self.glsl_ver_required < 140 {
                    io.no_index = true;
                    let back = semantic == Semantic::BColor;
                    match (back, io.sid) {
                        (false, 0) => Some("gl_FrontColor"),
                        (false, 1) => Some("gl_FrontSecondaryColor"),
                        (true, 0) => Some("gl_BackColor"),
                        (true, 1) => Some("gl_BackSecondaryColor"),
                        _ => {
                            return Err(TranslateError::Unsupported(format!(
                                "color output index {}",
                                io.sid
                            )))
                        }
                    }
                } else {
                    Some("ex")
                }
            }
            Semantic::PSize if !is_fs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                io.gl_block = is_tcs;
                self.reqs |= ShaderReq::PSIZE;
                Some("gl_PointSize")
            }
            Semantic::Layer if is_gs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                io.is_int = true;
                Some("gl_Layer")
            }
            Semantic::PrimId if is_gs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                io.is_int = true;
                Some("gl_PrimitiveID")
            }
            Semantic::ViewportIndex if is_gs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                io.is_int = true;
                if self.glsl_ver_required >= 140 {
                    self.reqs |= ShaderReq::VIEWPORT_IDX;
                }
                Some("gl_ViewportIndex")
            }
            Semantic::TessOuter if is_tcs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                Some("gl_TessLevelOuter")
            }
            Semantic::TessInner if is_tcs => {
                io.predefined_no_emit = true;
                io.no_index = true;
                io.override_no_wm = true;
                Some("gl_TessLevelInner")
            }
            _ => None,
        };

        if builtin.is_none() {
            if is_vs && semantic == Semantic::Generic {
                color_offset = -1;
            }
            if indirect && semantic == Semantic::Generic {
                io.predefined_no_emit = true;
                self.require_glsl_ver(150);
                extend_range(&mut self.generic_output_range, io.sid, decl.array_id);
            }
            if indirect && semantic == Semantic::Patch {
                io.predefined_no_emit = true;
                self.require_glsl_ver(150);
                extend_range(&mut self.patch_output_range, io.sid, decl.array_id);
            }
        }

        let prefix = builtin.unwrap_or_else(|| output_prefix(stage));
        io.name = if io.no_index {
            prefix.to_string()
        } else {
            match semantic {
                Semantic::Fog => format!("{prefix}_f{}", io.sid),
                Semantic::Color => format!("{prefix}_c{}", io.sid),
                Semantic::BColor => format!("{prefix}_bc{}", io.sid),
                Semantic::Patch => format!("{prefix}_p{}", io.sid),
                Semantic::Generic => format!("{prefix}_g{}", io.sid),
                _ => format!("{prefix}_{}", io.first as i64 + color_offset),
            }
        };
        self.outputs.push(io);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // System values
    // -----------------------------------------------------------------------

    fn declare_system_value(&mut self, decl: &Declaration, reg: u32) -> Result<()> {
        if self.system_values.len() >= MAX_SYSTEM_VALUES {
            return Err(overflow("system values", MAX_SYSTEM_VALUES));
        }
        let (semantic, sid) = decl
            .semantic
            .ok_or_else(|| TranslateError::Unsupported(format!("system value {reg} without semantic")))?;
        let mut io = IoDecl::new(semantic, sid, reg, reg);
        io.predefined_no_emit = true;
        io.no_index = true;
        io.override_no_wm = true;

        let name = match semantic {
            Semantic::InstanceId => {
                self.reqs |= ShaderReq::INSTANCE_ID | ShaderReq::INTS;
                "gl_InstanceID"
            }
            Semantic::VertexId => {
                self.reqs |= ShaderReq::INTS;
                "gl_VertexID"
            }
            Semantic::HelperInvocation => {
                self.reqs |= ShaderReq::ES31_COMPAT;
                "gl_HelperInvocation"
            }
            Semantic::SampleId => {
                self.reqs |= ShaderReq::SAMPLE_SHADING | ShaderReq::INTS;
                "gl_SampleID"
            }
            Semantic::SamplePos => {
                self.reqs |= ShaderReq::SAMPLE_SHADING;
                "gl_SamplePosition"
            }
            Semantic::InvocationId => {
                self.reqs |= ShaderReq::INTS | ShaderReq::GPU_SHADER5;
                "gl_InvocationID"
            }
            Semantic::SampleMask => {
                self.reqs |= ShaderReq::INTS | ShaderReq::GPU_SHADER5;
                "gl_SampleMaskIn[0]"
            }
            Semantic::PrimId => {
                self.reqs |= ShaderReq::INTS | ShaderReq::GPU_SHADER5;
                "gl_PrimitiveID"
            }
            Semantic::TessCoord => {
                io.override_no_wm = false;
                "gl_TessCoord"
            }
            Semantic::VerticesIn => {
                self.reqs |= ShaderReq::INTS;
                "gl_PatchVerticesIn"
            }
            Semantic::TessOuter => "gl_TessLevelOuter",
            Semantic::TessInner => "gl_TessLevelInner",
            Semantic::ThreadId => {
                io.override_no_wm = false;
                "gl_LocalInvocationID"
            }
            Semantic::BlockId => {
                io.override_no_wm = false;
                "gl_WorkGroupID"
            }
            Semantic::GridSize => {
                io.override_no_wm = false;
                "gl_NumWorkGroups"
            }
            other => {
                return Err(TranslateError::Unsupported(format!(
                    "system value {other:?}"
                )))
            }
        };
        io.name = name.to_string();
        self.system_values.push(io);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Samplers and images
    // -----------------------------------------------------------------------

    fn add_samplers(&mut self, first: u32, last: u32, target: TexTarget, ret: ReturnType) {
        if matches!(ret, ReturnType::Sint | ReturnType::Uint) {
            self.reqs |= ShaderReq::INTS;
        }
        let sampler = SamplerDecl {
            target,
            return_type: ret,
        };
        for i in first..=last {
            self.samplers[i as usize] = Some(sampler);
        }

        if self.indirect_files & File::Sampler.bit() == 0 {
            return;
        }
        if let Some(prev) = self.sampler_arrays.last_mut() {
            let compatible = self.samplers[prev.first as usize]
                .is_some_and(|s| s.target == target && s.return_type == ret);
            if prev.first + prev.array_size == first && compatible {
                prev.array_size += last - first + 1;
                return;
            }
        }
        self.sampler_arrays.push(ShaderArray {
            first,
            array_size: last - first + 1,
        });
    }

    fn add_images(&mut self, first: u32, last: u32, image: ImageDecl) {
        for i in first..=last {
            self.images[i as usize] = Some(image);
            self.images_used_mask |= 1 << i;
        }
        match image.target {
            TexTarget::CubeArray => self.reqs |= ShaderReq::CUBE_ARRAY,
            TexTarget::Tex2DMsaa | TexTarget::Tex2DArrayMsaa => self.reqs |= ShaderReq::SAMPLER_MS,
            TexTarget::Rect => self.reqs |= ShaderReq::SAMPLER_RECT,
            _ => {}
        }

        if self.indirect_files & File::Image.bit() == 0 {
            return;
        }
        if let Some(prev) = self.image_arrays.last_mut() {
            let compatible = self.images[prev.first as usize] == Some(image);
            if prev.first + prev.array_size == first && compatible {
                prev.array_size += last - first + 1;
                return;
            }
        }
        self.image_arrays.push(ShaderArray {
            first,
            array_size: last - first + 1,
        });
    }

    pub(crate) fn lookup_sampler_array(&self, index: u32) -> Option<u32> {
        self.sampler_arrays
            .iter()
            .find(|a| a.contains(index))
            .map(|a| a.first)
    }

    pub(crate) fn lookup_image_array(&self, index: u32) -> Option<u32> {
        self.image_arrays
            .iter()
            .find(|a| a.contains(index))
            .map(|a| a.first)
    }

    pub(crate) fn find_temp_range(&self, index: i32) -> Option<&TempRange> {
        self.temp_ranges
            .iter()
            .find(|r| index >= r.first as i32 && index <= r.last as i32)
    }
}

fn overflow(what: &'static str, max: usize) -> TranslateError {
    TranslateError::Overflow { what, max }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_prefixes() {
        assert_eq!(input_prefix(ShaderType::Fragment, false, false, false), "vso");
        assert_eq!(input_prefix(ShaderType::Fragment, true, false, true), "gso");
        assert_eq!(input_prefix(ShaderType::TessEval, false, true, true), "tco");
        assert_eq!(output_prefix(ShaderType::Fragment), "fsout");
    }

    #[test]
    fn io_ranges_grow_both_ways() {
        let mut range = IoRange::default();
        extend_range(&mut range, 3, 1);
        extend_range(&mut range, 5, 1);
        extend_range(&mut range, 1, 2);
        assert_eq!((range.first, range.last, range.array_id), (1, 5, 2));
    }
}
