//! Operand strings.
//!
//! Every instruction first resolves its destinations and sources into GLSL
//! expressions plus the conversions the opcode's operand types call for.
//! TGSI registers are untyped `vec4`s, so integer and double opcodes wrap
//! their operands in bit casts.

use super::Translator;
use crate::error::{Result, TranslateError};
use crate::glsl::{ShaderReq, TypeQual};
use crate::tgsi::{
    DstRegister, File, ImmType, Instruction, OpType, Opcode, Semantic, SrcRegister, WRITEMASK_XYZW,
};
use virgl_core::pipe::ShaderType;

pub(crate) fn swizzle_char(s: u8) -> char {
    ['x', 'y', 'z', 'w'][(s & 3) as usize]
}

/// Resolved operands of one instruction.
#[derive(Debug, Default)]
pub(super) struct Operands {
    pub dsts: Vec<String>,
    /// Real destinations of double opcodes; `dsts` then name scratch slots.
    pub fp64_dsts: Vec<String>,
    pub writemask: String,
    pub dtypeprefix: TypeQual,
    pub dstconv: TypeQual,
    pub udstconv: TypeQual,
    pub idstconv: TypeQual,
    pub dst_override_no_wm: Vec<bool>,

    pub srcs: Vec<String>,
    pub svec4: TypeQual,
    pub override_no_wm: Vec<bool>,
    pub override_no_cast: Vec<bool>,
    /// Register index of the last sampler, image or buffer source.
    pub sreg_index: u32,
    pub tg4_has_component: bool,
    pub src_swizzle0: String,
}

impl Operands {
    pub fn src(&self, i: usize, opcode: Opcode) -> Result<&str> {
        self.srcs
            .get(i)
            .map(String::as_str)
            .ok_or(TranslateError::MissingOperand {
                opcode: opcode.name(),
                expected: i + 1,
            })
    }

    pub fn dst(&self, opcode: Opcode) -> Result<&str> {
        self.dsts
            .first()
            .map(String::as_str)
            .ok_or(TranslateError::MissingOperand {
                opcode: opcode.name(),
                expected: 1,
            })
    }
}

fn mask_string(mask: u8) -> String {
    let mut s = String::from(".");
    for (bit, c) in ['x', 'y', 'z', 'w'].into_iter().enumerate() {
        if mask & (1 << bit) != 0 {
            s.push(c);
        }
    }
    s
}

impl Translator<'_> {
    pub(super) fn operands(&mut self, inst: &Instruction) -> Result<Operands> {
        let mut ops = Operands {
            svec4: TypeQual::Vec4,
            ..Default::default()
        };
        self.destinations(inst, &mut ops)?;
        self.sources(inst, &mut ops)?;
        Ok(ops)
    }

    fn indirect_in(&self) -> bool {
        self.indirect_files & File::Input.bit() != 0
            || self.key.num_indirect_generic_inputs > 0
            || self.key.num_indirect_patch_inputs > 0
    }

    fn indirect_out(&self) -> bool {
        self.indirect_files & File::Output.bit() != 0
            || self.key.num_indirect_generic_outputs > 0
            || self.key.num_indirect_patch_outputs > 0
    }

    fn temp_name(&self, index: i32, addr: Option<u32>) -> Result<String> {
        let range = self
            .find_temp_range(index)
            .ok_or_else(|| TranslateError::Undeclared(format!("TEMP[{index}]")))?;
        let off = index - range.first as i32;
        Ok(match addr {
            Some(a) => format!("temp{}[addr{a} + {off}]", range.first),
            None => format!("temp{}[{off}]", range.first),
        })
    }

    fn image_name(&self, index: i32, addr: Option<u32>) -> String {
        let cname = self.prefix();
        if self.indirect_files & File::Image.bit() != 0 {
            let base = self.lookup_image_array(index as u32).unwrap_or(index as u32) as i32;
            match addr {
                Some(a) => format!("{cname}img{base}[addr{a} + {}]", index - base),
                None => format!("{cname}img{base}[{}]", index - base),
            }
        } else {
            format!("{cname}img{index}")
        }
    }

    fn buffer_name(&self, index: i32, addr: Option<u32>) -> String {
        let cname = self.prefix();
        if self.indirect_files & File::Buffer.bit() == 0 {
            return format!("{cname}ssbocontents{index}");
        }
        let atomic = self.ssbo_atomic_mask & (1 << index) != 0;
        let (tag, base) = if atomic {
            ("atomic", self.ssbo_atomic_array_base as i32)
        } else {
            ("", self.ssbo_array_base as i32)
        };
        match addr {
            Some(a) => format!(
                "{cname}ssboarr{tag}[addr{a}+{}].{cname}ssbocontents{base}",
                index - base
            ),
            None => format!(
                "{cname}ssboarr{tag}[{}].{cname}ssbocontents{base}",
                index - base
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Destinations
    // -----------------------------------------------------------------------

    fn destinations(&mut self, inst: &Instruction, ops: &mut Operands) -> Result<()> {
        let dtype = inst.opcode.dst_type();
        match dtype {
            OpType::Signed | OpType::Unsigned => self.reqs |= ShaderReq::INTS,
            OpType::Double => self.reqs |= ShaderReq::INTS | ShaderReq::FP64,
            _ => {}
        }
        ops.dtypeprefix = match (inst.opcode, dtype) {
            (Opcode::TXQ, _) => TypeQual::IntBitsToFloat,
            (_, OpType::Unsigned) => TypeQual::UintBitsToFloat,
            (_, OpType::Signed) => TypeQual::IntBitsToFloat,
            _ => TypeQual::None,
        };

        for (i, dst) in inst.dst.iter().enumerate() {
            let mut fp64_mask = String::new();
            if dst.writemask != WRITEMASK_XYZW {
                ops.writemask = mask_string(dst.writemask);
                let n = ops.writemask.len() as u32 - 1;
                if dtype == OpType::Double {
                    fp64_mask.push('.');
                    if dst.writemask & 0x3 != 0 {
                        fp64_mask.push('x');
                    }
                    if dst.writemask & 0xc != 0 {
                        fp64_mask.push('y');
                    }
                    ops.dstconv = if fp64_mask.len() == 2 {
                        TypeQual::Double
                    } else {
                        TypeQual::DVec2
                    };
                } else {
                    ops.dstconv = TypeQual::float_n(n);
                    ops.udstconv = TypeQual::uint_n(n);
                    ops.idstconv = TypeQual::int_n(n);
                }
            } else {
                ops.writemask.clear();
                ops.dstconv = if dtype == OpType::Double {
                    TypeQual::DVec2
                } else {
                    TypeQual::Vec4
                };
                ops.udstconv = TypeQual::UVec4;
                ops.idstconv = TypeQual::IVec4;
            }

            let mut no_wm = false;
            let name = match dst.file {
                File::Output => self.output_dst(inst, dst, ops, &mut no_wm)?,
                File::Temporary => {
                    let base = self.temp_name(dst.index, dst.indirect.map(|_| 0))?;
                    format!("{base}{}", ops.writemask)
                }
                File::Image => {
                    self.image_name(dst.index, dst.indirect.map(|ind| ind.index))
                }
                File::Buffer => {
                    self.buffer_name(dst.index, dst.indirect.map(|ind| ind.index))
                }
                File::Memory => "values".to_string(),
                File::Address => format!("addr{}", dst.index),
                other => {
                    return Err(TranslateError::Unsupported(format!(
                        "destination file {other:?}"
                    )))
                }
            };
            ops.dst_override_no_wm.push(no_wm);

            if dtype == OpType::Double {
                ops.fp64_dsts.push(name);
                ops.dsts.push(format!("fp64_dst[{i}]{fp64_mask}"));
                ops.writemask.clear();
                self.use_fp64_temps = true;
            } else {
                ops.dsts.push(name);
            }
        }
        Ok(())
    }

    fn output_dst(
        &mut self,
        inst: &Instruction,
        dst: &DstRegister,
        ops: &mut Operands,
        no_wm: &mut bool,
    ) -> Result<String> {
        let j = self
            .outputs
            .iter()
            .position(|o| o.first as i32 == dst.index)
            .ok_or_else(|| TranslateError::Undeclared(format!("OUT[{}]", dst.index)))?;
        if inst.precise {
            self.outputs[j].precise = true;
            self.reqs |= ShaderReq::GPU_SHADER5;
        }

        let indirect = self.indirect_out();
        let out = &self.outputs[j];
        let wm = if out.override_no_wm {
            ""
        } else {
            ops.writemask.as_str()
        };
        let addr = |base: u32| match dst.indirect {
            Some(ind) => format!("[addr{} + {}]", ind.index, dst.index - base as i32),
            None => format!("[{}]", dst.index - base as i32),
        };
        let oprefix = super::decl::output_prefix(self.stage);

        let name = if self.glsl_ver_required >= 140 && out.semantic == Semantic::ClipVertex {
            "clipv_tmp".to_string()
        } else if out.semantic == Semantic::ClipDist {
            format!("clip_dist_temp[{}]", out.sid)
        } else if matches!(
            out.semantic,
            Semantic::TessOuter | Semantic::TessInner | Semantic::SampleMask
        ) {
            let idx = match dst.writemask {
                0x2 => 1,
                0x4 => 2,
                0x8 => 3,
                _ => 0,
            };
            if out.is_int {
                ops.dtypeprefix = TypeQual::FloatBitsToInt;
                ops.dstconv = TypeQual::Int;
            }
            format!("{}[{idx}]", out.name)
        } else {
            let name = if out.gl_block {
                let vtx = if self.stage == ShaderType::TessCtrl {
                    "gl_InvocationID"
                } else {
                    "0"
                };
                format!("gl_out[{vtx}].{}{wm}", out.name)
            } else if self.stage == ShaderType::TessCtrl && out.semantic != Semantic::Patch {
                if indirect {
                    let r = self.generic_output_range;
                    format!(
                        "oblk[gl_InvocationID].{oprefix}{}{}{wm}",
                        r.first,
                        addr(r.array_id)
                    )
                } else {
                    format!("{}[gl_InvocationID]{wm}", out.name)
                }
            } else if indirect && out.semantic == Semantic::Generic {
                *no_wm = out.override_no_wm;
                let r = self.generic_output_range;
                format!("oblk.{oprefix}{}{}{wm}", r.first, addr(r.array_id))
            } else if indirect && out.semantic == Semantic::Patch {
                *no_wm = out.override_no_wm;
                let r = self.patch_output_range;
                format!("{oprefix}p{}{}{wm}", r.first, addr(r.array_id))
            } else {
                *no_wm = out.override_no_wm;
                format!("{}{wm}", out.name)
            };
            if out.is_int {
                if ops.dtypeprefix == TypeQual::None {
                    ops.dtypeprefix = TypeQual::FloatBitsToInt;
                }
                ops.dstconv = TypeQual::Int;
            }
            if out.semantic == Semantic::PSize {
                ops.dstconv = TypeQual::Float;
            }
            name
        };
        Ok(name)
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    fn sources(&mut self, inst: &Instruction, ops: &mut Operands) -> Result<()> {
        let mut stype = inst.opcode.src_type();
        let mut stprefix = false;
        let mut stypeprefix = TypeQual::None;
        match stype {
            OpType::Double => {
                self.reqs |= ShaderReq::INTS | ShaderReq::FP64;
                stypeprefix = TypeQual::FloatBitsToUint;
                ops.svec4 = TypeQual::DVec2;
                stprefix = true;
            }
            OpType::Unsigned => {
                self.reqs |= ShaderReq::INTS;
                stypeprefix = TypeQual::FloatBitsToUint;
                ops.svec4 = TypeQual::UVec4;
                stprefix = true;
            }
            OpType::Signed => {
                self.reqs |= ShaderReq::INTS;
                stypeprefix = TypeQual::FloatBitsToInt;
                ops.svec4 = TypeQual::IVec4;
                stprefix = true;
            }
            _ => {}
        }

        for (i, src) in inst.src.iter().enumerate() {
            let float_abs = src.absolute && stype != OpType::Double;
            let mut swizzle = String::new();
            if float_abs {
                swizzle.push(')');
            }
            let mut prefix = String::new();
            if src.negate {
                prefix.push('-');
            }
            if float_abs {
                prefix.push_str("abs(");
            }
            let arrayname = match src.dimension {
                Some(dim) => match dim.indirect {
                    Some(ind) => format!("[addr{}]", ind.index),
                    None => format!("[{}]", dim.index),
                },
                None => String::new(),
            };
            if !src.is_identity_swizzle() {
                swizzle.push('.');
                swizzle.extend(src.swizzle.iter().map(|&s| swizzle_char(s)));
            }

            let mut no_wm = false;
            let mut no_cast = false;
            let st = stypeprefix.as_str();
            let interp_sample_idx = inst.opcode == Opcode::INTERP_SAMPLE && i == 1;

            let expr = match src.file {
                File::Input => {
                    let (expr, nwm) = self.input_src(
                        inst, i, src, ops, stype, stypeprefix, &prefix, &arrayname, &swizzle,
                    )?;
                    no_wm = nwm;
                    expr
                }
                File::Output => {
                    self.output_src(inst, src, stype, stypeprefix, &prefix, &arrayname, &swizzle)?
                }
                File::Temporary => {
                    let (tp, wrap) = if interp_sample_idx {
                        (TypeQual::FloatBitsToInt, true)
                    } else {
                        (stypeprefix, stprefix)
                    };
                    let base = self.temp_name(src.index, src.indirect.map(|ind| ind.index))?;
                    if wrap {
                        format!("{tp}({prefix}{base}{swizzle})")
                    } else {
                        format!("{prefix}{base}{swizzle}")
                    }
                }
                File::Constant => self.const_src(src, stype, interp_sample_idx, st, &prefix, &swizzle),
                File::Sampler => {
                    ops.sreg_index = src.index as u32;
                    let cname = self.prefix();
                    if self.indirect_files & File::Sampler.bit() != 0 {
                        let base =
                            self.lookup_sampler_array(src.index as u32).unwrap_or(src.index as u32) as i32;
                        match src.indirect {
                            Some(ind) => format!(
                                "{cname}samp{base}[addr{}+{}]{swizzle}",
                                ind.index,
                                src.index - base
                            ),
                            None => format!("{cname}samp{base}[{}]{swizzle}", src.index - base),
                        }
                    } else {
                        format!("{cname}samp{}{swizzle}", src.index)
                    }
                }
                File::Image => {
                    ops.sreg_index = src.index as u32;
                    let name = self.image_name(src.index, src.indirect.map(|ind| ind.index));
                    if self.indirect_files & File::Image.bit() != 0 {
                        name
                    } else {
                        format!("{name}{swizzle}")
                    }
                }
                File::Buffer => {
                    ops.sreg_index = src.index as u32;
                    format!(
                        "{}{swizzle}",
                        self.buffer_name(src.index, src.indirect.map(|ind| ind.index))
                    )
                }
                File::Memory => {
                    ops.sreg_index = src.index as u32;
                    "values".to_string()
                }
                File::Immediate => {
                    if (inst.opcode == Opcode::TG4 && i == 1) || interp_sample_idx {
                        stype = OpType::Signed;
                    }
                    self.immediate_src(inst, i, src, ops, stype, stypeprefix, &prefix, float_abs)?
                }
                File::SystemValue => {
                    let (expr, nwm, ncast) =
                        self.system_value_src(src, interp_sample_idx, st, &prefix)?;
                    no_wm = nwm;
                    no_cast = ncast;
                    expr
                }
                File::Address => format!("{prefix}vec4(addr{}){swizzle}", src.index),
                File::SamplerView => {
                    ops.sreg_index = src.index as u32;
                    format!("{}samp{}", self.prefix(), src.index)
                }
            };

            let expr = if stype == OpType::Double {
                let slot = format!("fp64_src[{i}]");
                let (open, close) = if src.absolute { ("abs(", ")") } else { ("", "") };
                self.main.line(&format!(
                    "{slot}.x = {open}packDouble2x32(uvec2({expr}{swizzle})){close};"
                ));
                self.use_fp64_temps = true;
                slot
            } else {
                expr
            };
            ops.srcs.push(expr);
            ops.override_no_wm.push(no_wm);
            ops.override_no_cast.push(no_cast);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn input_src(
        &self,
        inst: &Instruction,
        i: usize,
        src: &SrcRegister,
        ops: &mut Operands,
        stype: OpType,
        stypeprefix: TypeQual,
        prefix: &str,
        arrayname: &str,
        swizzle: &str,
    ) -> Result<(String, bool)> {
        let input = self
            .inputs
            .iter()
            .find(|io| io.first as i32 == src.index)
            .ok_or_else(|| TranslateError::Undeclared(format!("IN[{}]", src.index)))?;
        let st = stypeprefix.as_str();
        let name = &input.name;

        let expr = if self.key.color_two_side && input.semantic == Semantic::Color {
            format!("{st}({prefix}realcolor{}{arrayname}{swizzle})", input.sid)
        } else if input.gl_block {
            if input.semantic == Semantic::ClipDist {
                self.swizzled_clipdist(src, input.sid, name, true, st, prefix, arrayname)
            } else {
                format!("{st}(vec4({prefix}gl_in{arrayname}.{name}){swizzle})")
            }
        } else if input.semantic == Semantic::PrimId {
            format!("{st}(vec4(intBitsToFloat({name})))")
        } else if input.semantic == Semantic::Face {
            format!("{st}({name} ? 1.0 : -1.0)")
        } else if input.semantic == Semantic::ClipDist {
            self.swizzled_clipdist(src, input.sid, name, false, st, prefix, arrayname)
        } else {
            let tp = if matches!(stype, OpType::Unsigned | OpType::Signed) && input.is_int {
                ""
            } else {
                st
            };
            let sw = if input.is_int { "" } else { swizzle };
            let indirect = self.indirect_in();
            let addr = |base: u32| match src.indirect {
                Some(ind) => format!("[addr{} + {}]", ind.index, src.index - base as i32),
                None => format!("[{}]", src.index - base as i32),
            };
            let iprefix = super::decl::input_prefix(
                self.stage,
                self.key.gs_present,
                self.key.tcs_present,
                self.key.tes_present,
            );
            if inst.opcode == Opcode::INTERP_SAMPLE && i == 1 {
                format!("floatBitsToInt({prefix}{name}{arrayname}{swizzle})")
            } else if input.semantic == Semantic::Generic && indirect {
                let r = self.generic_input_range;
                let blk = self.block_array(src);
                format!("{tp}({prefix}blk{blk}.{iprefix}{}{}{sw})", r.first, addr(r.array_id))
            } else if input.semantic == Semantic::Patch && indirect {
                let r = self.patch_input_range;
                format!("{tp}({prefix}{iprefix}p{}{}{sw})", r.first, addr(r.array_id))
            } else {
                format!("{tp}({prefix}{name}{arrayname}{sw})")
            }
        };

        let expr = if matches!(
            inst.opcode,
            Opcode::INTERP_SAMPLE | Opcode::INTERP_OFFSET | Opcode::INTERP_CENTROID
        ) && i == 0
        {
            ops.src_swizzle0 = swizzle.to_string();
            name.clone()
        } else {
            expr
        };
        Ok((expr, input.override_no_wm))
    }

    fn block_array(&self, src: &SrcRegister) -> String {
        if self.stage == ShaderType::TessCtrl {
            return "[gl_InvocationID]".to_string();
        }
        match src.dimension {
            Some(dim) => match dim.indirect {
                Some(ind) => format!("[addr{} + {}]", ind.index, dim.index),
                None => format!("[{}]", dim.index),
            },
            None => "[0]".to_string(),
        }
    }

    /// Clip distances arrive as a float array; gather the four swizzled
    /// components, spilling past the clip count into cull distances.
    #[allow(clippy::too_many_arguments)]
    fn swizzled_clipdist(
        &self,
        src: &SrcRegister,
        sid: u32,
        name: &str,
        gl_in: bool,
        st: &str,
        prefix: &str,
        arrayname: &str,
    ) -> String {
        let prev_clip = u32::from(self.key.prev_stage_num_clip_out);
        let prev_cull = u32::from(self.key.prev_stage_num_cull_out);
        let has_prev = prev_clip + prev_cull > 0;
        let num_culls = if has_prev { prev_cull } else { 0 };
        let num_clips = if has_prev {
            prev_clip
        } else {
            self.num_in_clip_dist
        };

        let comps: Vec<String> = src
            .swizzle
            .iter()
            .map(|&s| {
                let mut idx = sid * 4 + u32::from(s);
                let mut cc_name = name;
                if num_culls > 0 {
                    if idx >= num_clips {
                        idx -= num_clips;
                        cc_name = "gl_CullDistance";
                    }
                    if prev_cull > 0 && idx >= prev_cull {
                        idx = 0;
                    }
                } else if prev_clip > 0 && idx >= prev_clip {
                    idx = 0;
                }
                if gl_in {
                    format!("{prefix}gl_in{arrayname}.{cc_name}[{idx}]")
                } else {
                    format!("{prefix}{arrayname}{cc_name}[{idx}]")
                }
            })
            .collect();
        format!("{st}(vec4({}))", comps.join(","))
    }

    #[allow(clippy::too_many_arguments)]
    fn output_src(
        &mut self,
        inst: &Instruction,
        src: &SrcRegister,
        stype: OpType,
        stypeprefix: TypeQual,
        prefix: &str,
        arrayname: &str,
        swizzle: &str,
    ) -> Result<String> {
        let j = self
            .outputs
            .iter()
            .position(|o| o.first as i32 == src.index)
            .ok_or_else(|| TranslateError::Undeclared(format!("OUT[{}]", src.index)))?;
        if inst.opcode == Opcode::FBFETCH {
            self.outputs[j].fbfetch_used = true;
            self.reqs |= ShaderReq::FBFETCH;
        }
        let out = &self.outputs[j];
        let tp = if stype == OpType::Unsigned && out.is_int {
            ""
        } else {
            stypeprefix.as_str()
        };
        let sw = if out.is_int { "" } else { swizzle };
        let indirect = self.indirect_out();
        let oprefix = super::decl::output_prefix(self.stage);
        let addr = |base: u32| match src.indirect {
            Some(ind) => format!("[addr{} + {}]", ind.index, src.index - base as i32),
            None => format!("[{}]", src.index - base as i32),
        };

        Ok(if out.gl_block || out.semantic == Semantic::ClipDist {
            format!("clip_dist_temp[{}]", out.sid)
        } else if out.semantic == Semantic::Generic && indirect {
            let r = self.generic_output_range;
            let blk = self.block_array(src);
            format!("{tp}({prefix}oblk{blk}.{oprefix}{}{}{sw})", r.first, addr(r.array_id))
        } else if out.semantic == Semantic::Patch && indirect {
            let r = self.patch_output_range;
            format!("{tp}({prefix}{oprefix}p{}{}{sw})", r.first, addr(r.array_id))
        } else {
            format!("{tp}({prefix}{}{arrayname}{sw})", out.name)
        })
    }

    fn const_src(
        &mut self,
        src: &SrcRegister,
        stype: OpType,
        interp_sample_idx: bool,
        st: &str,
        prefix: &str,
        swizzle: &str,
    ) -> String {
        let cname = self.prefix();
        let dim = src.dimension.filter(|d| d.index != 0);
        match dim {
            Some(d) => {
                let reg = match src.indirect {
                    Some(ind) => format!("addr{} + {}", ind.index, src.index),
                    None => src.index.to_string(),
                };
                if let Some(dind) = d.indirect {
                    self.reqs |= ShaderReq::GPU_SHADER5;
                    format!(
                        "{st}({prefix}{cname}uboarr[addr{}].ubocontents[{reg}]{swizzle})",
                        dind.index
                    )
                } else if self.dim_indirect_files & File::Constant.bit() != 0 {
                    format!(
                        "{st}({prefix}{cname}uboarr[{}].ubocontents[{reg}]{swizzle})",
                        d.index - self.ubo_base as i32
                    )
                } else {
                    let reg = match src.indirect {
                        Some(_) => format!("addr0 + {}", src.index),
                        None => src.index.to_string(),
                    };
                    format!(
                        "{st}({prefix}{cname}ubo{}contents[{reg}]{swizzle})",
                        d.index
                    )
                }
            }
            None => {
                self.reqs |= ShaderReq::INTS;
                let csp = if interp_sample_idx {
                    TypeQual::IVec4
                } else {
                    match stype {
                        OpType::Float | OpType::Untyped => TypeQual::UintBitsToFloat,
                        OpType::Signed => TypeQual::IVec4,
                        _ => TypeQual::None,
                    }
                };
                let reg = match src.indirect {
                    Some(_) => format!("addr0 + {}", src.index),
                    None => src.index.to_string(),
                };
                format!("{prefix}{csp}({cname}const0[{reg}]{swizzle})")
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn immediate_src(
        &mut self,
        inst: &Instruction,
        i: usize,
        src: &SrcRegister,
        ops: &mut Operands,
        stype: OpType,
        stypeprefix: TypeQual,
        prefix: &str,
        float_abs: bool,
    ) -> Result<String> {
        let imm = self.immediate(src.index)?;
        let (vtype, tp) = match imm.ty {
            ImmType::Uint32 | ImmType::Int32 => {
                let vtype = if imm.ty == ImmType::Uint32 {
                    TypeQual::UVec4
                } else {
                    TypeQual::IVec4
                };
                let tp = match (stype, imm.ty) {
                    (OpType::Unsigned, ImmType::Int32) => TypeQual::UVec4,
                    (OpType::Signed, ImmType::Uint32) => TypeQual::IVec4,
                    (OpType::Float | OpType::Untyped, ImmType::Int32) => TypeQual::IntBitsToFloat,
                    (OpType::Float | OpType::Untyped, _) => TypeQual::UintBitsToFloat,
                    (OpType::Unsigned | OpType::Signed, _) => TypeQual::None,
                    _ => stypeprefix,
                };
                (vtype, tp)
            }
            ImmType::Float64 => {
                let tp = if stype == OpType::Double {
                    TypeQual::None
                } else {
                    TypeQual::UintBitsToFloat
                };
                (TypeQual::UVec4, tp)
            }
            ImmType::Float32 => (TypeQual::Vec4, stypeprefix),
        };

        let mut comps = Vec::with_capacity(4);
        for (j, &s) in src.swizzle.iter().enumerate() {
            let chan = usize::from(s);
            if inst.opcode == Opcode::TG4 && i == 1 && j == 0 && imm.uint(chan) > 0 {
                ops.tg4_has_component = true;
                self.reqs |= ShaderReq::GPU_SHADER5;
            }
            comps.push(match imm.ty {
                ImmType::Float32 => {
                    let f = imm.float(chan);
                    if f.is_finite() {
                        format_float(f)
                    } else {
                        self.reqs |= ShaderReq::INTS;
                        format!("uintBitsToFloat({}U)", imm.uint(chan))
                    }
                }
                ImmType::Uint32 | ImmType::Float64 => format!("{}U", imm.uint(chan)),
                ImmType::Int32 => imm.int(chan).to_string(),
            });
        }
        let close = if float_abs { ")" } else { "" };
        Ok(format!("{tp}({prefix}{vtype}({})){close}", comps.join(",")))
    }

    fn system_value_src(
        &self,
        src: &SrcRegister,
        interp_sample_idx: bool,
        st: &str,
        prefix: &str,
    ) -> Result<(String, bool, bool)> {
        let sv = self
            .system_values
            .iter()
            .find(|sv| sv.first as i32 == src.index)
            .ok_or_else(|| TranslateError::Undeclared(format!("SV[{}]", src.index)))?;
        let n = &sv.name;
        let [x, y, z, w] = src.swizzle;
        let mut no_cast = false;
        let expr = match sv.semantic {
            Semantic::VertexId
            | Semantic::InstanceId
            | Semantic::PrimId
            | Semantic::VerticesIn
            | Semantic::InvocationId
            | Semantic::SampleId => {
                if interp_sample_idx {
                    format!("ivec4({n})")
                } else {
                    format!("{st}(vec4(intBitsToFloat({n})))")
                }
            }
            Semantic::HelperInvocation => format!("uvec4({n})"),
            Semantic::TessInner | Semantic::TessOuter => {
                format!("{prefix}(vec4({n}[{x}], {n}[{y}], {n}[{z}], {n}[{w}]))")
            }
            Semantic::SamplePos | Semantic::TessCoord => {
                let [x, y, z, w] = src.swizzle.map(swizzle_char);
                format!("{prefix}(vec4({n}.{x}, {n}.{y}, {n}.{z}, {n}.{w}))")
            }
            Semantic::GridSize | Semantic::ThreadId | Semantic::BlockId => {
                no_cast = true;
                let [x, y, z, w] = src.swizzle.map(swizzle_char);
                format!("uvec4({n}.{x}, {n}.{y}, {n}.{z}, {n}.{w})")
            }
            Semantic::SampleMask => {
                let pick = |s: u8| if s == 0 { n.as_str() } else { "0" };
                format!("ivec4({}, {}, {}, {})", pick(x), pick(y), pick(z), pick(w))
            }
            _ => format!("{prefix}{n}"),
        };
        Ok((expr, sv.override_no_wm, no_cast))
    }
}

/// Float literal with up to eight significant digits, always parseable as
/// a GLSL float.
pub(crate) fn format_float(f: f32) -> String {
    let s = format!("{f}");
    if s.contains(['.', 'e', 'E']) {
        s
    } else {
        format!("{s}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_masks() {
        assert_eq!(mask_string(0x1), ".x");
        assert_eq!(mask_string(0xa), ".yw");
        assert_eq!(mask_string(0x7), ".xyz");
    }

    #[test]
    fn float_literals() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-3.0), "-3.0");
    }
}
