//! Per-opcode GLSL templates for the body of `main()`.

use virgl_core::pipe::ShaderType;

use super::operand::Operands;
use super::Translator;
use crate::error::Result;
use crate::glsl::ShaderReq;
use crate::tgsi::{Instruction, OpType, Opcode};

const MEMBAR_SHADER_BUFFER: u32 = 1 << 0;
const MEMBAR_ATOMIC_BUFFER: u32 = 1 << 1;
const MEMBAR_SHADER_IMAGE: u32 = 1 << 2;
const MEMBAR_SHARED: u32 = 1 << 3;
const MEMBAR_THREAD_GROUP: u32 = 1 << 4;

impl Translator<'_> {
    pub(super) fn begin_main(&mut self) {
        self.main.line("void main(void)");
        self.main.line("{");
        if self.is_fs() {
            self.emit_color_select();
        }
        if self.key.has_so() {
            self.prepare_so_movs();
        }
    }

    /// Stream index an `EMIT`/`ENDPRIM` names through its immediate operand.
    fn stream_operand(&self, inst: &Instruction) -> Result<u32> {
        match inst.src.first() {
            Some(src) => Ok(self.immediate(src.index)?.uint(usize::from(src.swizzle[0]))),
            None => Ok(0),
        }
    }

    pub(super) fn instruction(&mut self, inst: &Instruction) -> Result<()> {
        let op = inst.opcode;
        let ops = self.operands(inst)?;
        let wm = ops.writemask.clone();
        let conv = ops.dstconv;
        let tp = ops.dtypeprefix;

        // shorthand for the common operand shapes
        let d = |ops: &Operands| ops.dst(op).map(str::to_string);
        let s = |ops: &Operands, i: usize| ops.src(i, op).map(str::to_string);
        let op1 = |ops: &Operands, f: &str| -> Result<String> {
            Ok(format!("{} = {conv}({tp}({f}({})){wm});", d(ops)?, s(ops, 0)?))
        };
        let arit2 = |ops: &Operands, o: &str| -> Result<String> {
            Ok(format!(
                "{} = {conv}({tp}(({} {o} {})){wm});",
                d(ops)?,
                s(ops, 0)?,
                s(ops, 1)?
            ))
        };
        let compare = |ops: &Operands, f: &str| -> Result<String> {
            let v = ops.svec4;
            Ok(format!(
                "{} = {conv}({tp}(({f}({v}({}), {v}({}))))){wm});",
                d(ops)?,
                s(ops, 0)?,
                s(ops, 1)?
            ))
        };
        let ucompare = |ops: &Operands, f: &str, wm: &str| -> Result<String> {
            let v = ops.svec4;
            let u = ops.udstconv;
            Ok(format!(
                "{} = {conv}(uintBitsToFloat({u}({f}({v}({}), {v}({})){wm}) * {u}(0xffffffff)));",
                d(ops)?,
                s(ops, 0)?,
                s(ops, 1)?
            ))
        };
        let dbl_wm = |o: Opcode| if matches!(o, Opcode::DSEQ | Opcode::DSNE | Opcode::DSLT | Opcode::DSGE) {
            ".x".to_string()
        } else {
            wm.clone()
        };

        let line: Option<String> = match op {
            Opcode::SQRT | Opcode::DSQRT => {
                Some(format!("{} = sqrt(vec4({})){wm};", d(&ops)?, s(&ops, 0)?))
            }
            Opcode::LRP => Some(format!(
                "{} = mix(vec4({}), vec4({}), vec4({})){wm};",
                d(&ops)?,
                s(&ops, 2)?,
                s(&ops, 1)?,
                s(&ops, 0)?
            )),
            Opcode::DP2 | Opcode::DP3 | Opcode::DP4 => {
                let v = match op {
                    Opcode::DP2 => "vec2",
                    Opcode::DP3 => "vec3",
                    _ => "vec4",
                };
                Some(format!(
                    "{} = {conv}(dot({v}({}), {v}({})));",
                    d(&ops)?,
                    s(&ops, 0)?,
                    s(&ops, 1)?
                ))
            }
            Opcode::DPH => Some(format!(
                "{} = {conv}(dot(vec4(vec3({}), 1.0), vec4({})));",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?
            )),
            Opcode::MAX | Opcode::DMAX | Opcode::IMAX | Opcode::UMAX => Some(format!(
                "{} = {conv}({tp}(max({}, {})));",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?
            )),
            Opcode::MIN | Opcode::DMIN | Opcode::IMIN | Opcode::UMIN => Some(format!(
                "{} = {conv}({tp}(min({}, {})));",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?
            )),
            Opcode::ABS | Opcode::IABS | Opcode::DABS => Some(op1(&ops, "abs")?),
            Opcode::KILL_IF => {
                self.main
                    .line(&format!("if (any(lessThan({}, vec4(0.0))))", s(&ops, 0)?));
                self.main.indent();
                self.main.line("discard;");
                self.main.outdent();
                None
            }
            Opcode::IF | Opcode::UIF => {
                self.main.line(&format!("if (any(bvec4({}))) {{", s(&ops, 0)?));
                self.main.indent();
                None
            }
            Opcode::ELSE => {
                self.main.outdent();
                self.main.line("} else {");
                self.main.indent();
                None
            }
            Opcode::ENDIF => {
                self.main.outdent();
                self.main.line("}");
                None
            }
            Opcode::KILL => Some("discard;".to_string()),
            Opcode::DST => {
                let (s0, s1) = (s(&ops, 0)?, s(&ops, 1)?);
                Some(format!(
                    "{} = vec4(1.0, {s0}.y * {s1}.y, {s0}.z, {s1}.w);",
                    d(&ops)?
                ))
            }
            Opcode::LIT => {
                let s0 = s(&ops, 0)?;
                Some(format!(
                    "{} = {conv}(vec4(1.0, max({s0}.x, 0.0), step(0.0, {s0}.x) * pow(max(0.0, {s0}.y), clamp({s0}.w, -128.0, 128.0)), 1.0){wm});",
                    d(&ops)?
                ))
            }
            Opcode::EX2 => Some(op1(&ops, "exp2")?),
            Opcode::LG2 => Some(op1(&ops, "log2")?),
            Opcode::EXP => {
                let s0 = s(&ops, 0)?;
                Some(format!(
                    "{} = {conv}(vec4(pow(2.0, floor({s0}.x)), {s0}.x - floor({s0}.x), exp2({s0}.x), 1.0){wm});",
                    d(&ops)?
                ))
            }
            Opcode::LOG => {
                let s0 = s(&ops, 0)?;
                Some(format!(
                    "{} = {conv}(vec4(floor(log2({s0}.x)), {s0}.x / pow(2.0, floor(log2({s0}.x))), log2({s0}.x), 1.0){wm});",
                    d(&ops)?
                ))
            }
            Opcode::COS => Some(op1(&ops, "cos")?),
            Opcode::SIN => Some(op1(&ops, "sin")?),
            Opcode::SCS => {
                let s0 = s(&ops, 0)?;
                Some(format!(
                    "{} = {conv}(vec4(cos({s0}.x), sin({s0}.x), 0, 1){wm});",
                    d(&ops)?
                ))
            }
            Opcode::DDX => Some(op1(&ops, "dFdx")?),
            Opcode::DDY => Some(op1(&ops, "dFdy")?),
            Opcode::DDX_FINE => {
                self.reqs |= ShaderReq::DERIVATIVE_CONTROL;
                Some(op1(&ops, "dFdxFine")?)
            }
            Opcode::DDY_FINE => {
                self.reqs |= ShaderReq::DERIVATIVE_CONTROL;
                Some(op1(&ops, "dFdyFine")?)
            }
            Opcode::RCP => Some(format!("{} = {conv}(1.0/({}));", d(&ops)?, s(&ops, 0)?)),
            Opcode::DRCP => Some(format!("{} = {conv}(1.0LF/({}));", d(&ops)?, s(&ops, 0)?)),
            Opcode::FLR => Some(op1(&ops, "floor")?),
            Opcode::ROUND => Some(op1(&ops, "round")?),
            Opcode::ISSG | Opcode::SSG => Some(op1(&ops, "sign")?),
            Opcode::CEIL => Some(op1(&ops, "ceil")?),
            Opcode::FRC | Opcode::DFRAC => Some(op1(&ops, "fract")?),
            Opcode::TRUNC => Some(op1(&ops, "trunc")?),
            Opcode::RSQ | Opcode::DRSQ => Some(format!(
                "{} = {conv}(inversesqrt({}.x));",
                d(&ops)?,
                s(&ops, 0)?
            )),
            Opcode::FBFETCH | Opcode::MOV => {
                let no_wm = ops.override_no_wm.first().copied().unwrap_or(false);
                let mask = if no_wm { "" } else { wm.as_str() };
                Some(format!(
                    "{} = {conv}({tp}({}{mask}));",
                    d(&ops)?,
                    s(&ops, 0)?
                ))
            }
            Opcode::ADD | Opcode::DADD => Some(arit2(&ops, "+")?),
            Opcode::UADD => Some(format!(
                "{} = {conv}({tp}(ivec4((uvec4({}) + uvec4({})))){wm});",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?
            )),
            Opcode::SUB => Some(arit2(&ops, "-")?),
            Opcode::MUL | Opcode::DMUL => Some(arit2(&ops, "*")?),
            Opcode::DIV | Opcode::DDIV => Some(arit2(&ops, "/")?),
            Opcode::UMUL | Opcode::UMOD | Opcode::UDIV | Opcode::IDIV => {
                let (v, o) = match op {
                    Opcode::UMUL => ("uvec4", "*"),
                    Opcode::UMOD => ("uvec4", "%"),
                    Opcode::UDIV => ("uvec4", "/"),
                    _ => ("ivec4", "/"),
                };
                Some(format!(
                    "{} = {conv}({tp}(({v}({}) {o} {v}({}))){wm});",
                    d(&ops)?,
                    s(&ops, 0)?,
                    s(&ops, 1)?
                ))
            }
            Opcode::ISHR | Opcode::USHR => Some(arit2(&ops, ">>")?),
            Opcode::SHL => Some(arit2(&ops, "<<")?),
            Opcode::MAD => Some(format!(
                "{} = {conv}(({} * {} + {}){wm});",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?,
                s(&ops, 2)?
            )),
            Opcode::UMAD | Opcode::DMAD => Some(format!(
                "{} = {conv}({tp}(({} * {} + {}){wm}));",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?,
                s(&ops, 2)?
            )),
            Opcode::OR => Some(arit2(&ops, "|")?),
            Opcode::AND => Some(arit2(&ops, "&")?),
            Opcode::XOR => Some(arit2(&ops, "^")?),
            Opcode::MOD => Some(arit2(&ops, "%")?),
            Opcode::TEX
            | Opcode::TEX2
            | Opcode::TXB
            | Opcode::TXL
            | Opcode::TXB2
            | Opcode::TXL2
            | Opcode::TXD
            | Opcode::TXF
            | Opcode::TG4
            | Opcode::TXP
            | Opcode::LODQ => {
                self.translate_tex(inst, &ops)?;
                None
            }
            Opcode::TXQ => {
                self.emit_txq(inst, &ops)?;
                None
            }
            Opcode::TXQS => {
                self.emit_txqs(inst, &ops)?;
                None
            }
            Opcode::I2F => Some(format!("{} = {conv}(ivec4({}){wm});", d(&ops)?, s(&ops, 0)?)),
            Opcode::U2F => Some(format!("{} = {conv}(uvec4({}){wm});", d(&ops)?, s(&ops, 0)?)),
            Opcode::I2D => Some(format!("{} = {conv}(ivec4({}));", d(&ops)?, s(&ops, 0)?)),
            Opcode::U2D => Some(format!("{} = {conv}(uvec4({}));", d(&ops)?, s(&ops, 0)?)),
            Opcode::D2F => Some(format!("{} = {conv}({});", d(&ops)?, s(&ops, 0)?)),
            Opcode::F2I => Some(format!(
                "{} = {conv}({tp}(ivec4({})){wm});",
                d(&ops)?,
                s(&ops, 0)?
            )),
            Opcode::F2U => Some(format!(
                "{} = {conv}({tp}(uvec4({})){wm});",
                d(&ops)?,
                s(&ops, 0)?
            )),
            Opcode::D2I => Some(format!(
                "{} = {conv}({tp}({}({})));",
                d(&ops)?,
                ops.idstconv,
                s(&ops, 0)?
            )),
            Opcode::D2U => Some(format!(
                "{} = {conv}({tp}({}({})));",
                d(&ops)?,
                ops.udstconv,
                s(&ops, 0)?
            )),
            Opcode::F2D => Some(format!("{} = {conv}({tp}({}));", d(&ops)?, s(&ops, 0)?)),
            Opcode::NOT => Some(format!(
                "{} = {conv}(uintBitsToFloat(~(uvec4({}))));",
                d(&ops)?,
                s(&ops, 0)?
            )),
            Opcode::INEG => Some(format!(
                "{} = {conv}(intBitsToFloat(-(ivec4({}))));",
                d(&ops)?,
                s(&ops, 0)?
            )),
            Opcode::DNEG => Some(format!("{} = {conv}(-{});", d(&ops)?, s(&ops, 0)?)),
            Opcode::SEQ => Some(compare(&ops, "equal")?),
            Opcode::SLT => Some(compare(&ops, "lessThan")?),
            Opcode::SNE => Some(compare(&ops, "notEqual")?),
            Opcode::SGE => Some(compare(&ops, "greaterThanEqual")?),
            Opcode::USEQ | Opcode::FSEQ | Opcode::DSEQ => {
                Some(ucompare(&ops, "equal", &dbl_wm(op))?)
            }
            Opcode::ISLT | Opcode::USLT | Opcode::FSLT | Opcode::DSLT => {
                Some(ucompare(&ops, "lessThan", &dbl_wm(op))?)
            }
            Opcode::USNE | Opcode::FSNE | Opcode::DSNE => {
                Some(ucompare(&ops, "notEqual", &dbl_wm(op))?)
            }
            Opcode::ISGE | Opcode::USGE | Opcode::FSGE | Opcode::DSGE => {
                Some(ucompare(&ops, "greaterThanEqual", &dbl_wm(op))?)
            }
            Opcode::POW => Some(format!(
                "{} = {conv}(pow({}, {}));",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?
            )),
            Opcode::CMP => Some(format!(
                "{} = mix({}, {}, greaterThanEqual({}, vec4(0.0))){wm};",
                d(&ops)?,
                s(&ops, 1)?,
                s(&ops, 2)?,
                s(&ops, 0)?
            )),
            Opcode::UCMP => Some(format!(
                "{} = mix({}, {}, notEqual(floatBitsToUint({}), uvec4(0.0))){wm};",
                d(&ops)?,
                s(&ops, 2)?,
                s(&ops, 1)?,
                s(&ops, 0)?
            )),
            Opcode::END => {
                self.stage_exit(true)?;
                self.main.line("}");
                None
            }
            Opcode::RET => {
                self.stage_exit(false)?;
                Some("return;".to_string())
            }
            Opcode::ARL => Some(format!("{} = int(floor({}){wm});", d(&ops)?, s(&ops, 0)?)),
            Opcode::UARL => Some(format!("{} = int({});", d(&ops)?, s(&ops, 0)?)),
            Opcode::XPD => Some(format!(
                "{} = {conv}(cross(vec3({}), vec3({})));",
                d(&ops)?,
                s(&ops, 0)?,
                s(&ops, 1)?
            )),
            Opcode::BGNLOOP => {
                self.main.line("do {");
                self.main.indent();
                None
            }
            Opcode::ENDLOOP => {
                self.main.outdent();
                self.main.line("} while(true);");
                None
            }
            Opcode::BRK => Some("break;".to_string()),
            Opcode::CONT => Some("continue;".to_string()),
            Opcode::EMIT => {
                if self.key.has_so() && self.key.gs_present {
                    self.emit_so_movs()?;
                }
                self.emit_clip_dist_movs();
                self.emit_prescale();
                let stream = self.stream_operand(inst)?;
                if stream > 0 {
                    self.reqs |= ShaderReq::GPU_SHADER5;
                    Some(format!("EmitStreamVertex({stream});"))
                } else {
                    Some("EmitVertex();".to_string())
                }
            }
            Opcode::ENDPRIM => {
                let stream = self.stream_operand(inst)?;
                if stream > 0 {
                    self.reqs |= ShaderReq::GPU_SHADER5;
                    Some(format!("EndStreamPrimitive({stream});"))
                } else {
                    Some("EndPrimitive();".to_string())
                }
            }
            Opcode::INTERP_CENTROID | Opcode::INTERP_SAMPLE | Opcode::INTERP_OFFSET => {
                self.reqs |= ShaderReq::GPU_SHADER5;
                let call = match op {
                    Opcode::INTERP_CENTROID => format!("interpolateAtCentroid({})", s(&ops, 0)?),
                    Opcode::INTERP_SAMPLE => {
                        format!("interpolateAtSample({}, {}.x)", s(&ops, 0)?, s(&ops, 1)?)
                    }
                    _ => format!("interpolateAtOffset({}, {}.xy)", s(&ops, 0)?, s(&ops, 1)?),
                };
                Some(format!(
                    "{} = {conv}({tp}(vec4({call}){}));",
                    d(&ops)?,
                    ops.src_swizzle0
                ))
            }
            Opcode::UMUL_HI | Opcode::IMUL_HI => {
                self.reqs |= ShaderReq::GPU_SHADER5;
                let (f, hi, lo) = if op == Opcode::UMUL_HI {
                    self.write_mul_utemp = true;
                    ("umulExtended", "umul_temp", "mul_utemp")
                } else {
                    self.write_mul_itemp = true;
                    ("imulExtended", "imul_temp", "mul_itemp")
                };
                self.main
                    .line(&format!("{f}({}, {}, {hi}, {lo});", s(&ops, 0)?, s(&ops, 1)?));
                Some(format!("{} = {conv}({tp}({hi}));", d(&ops)?))
            }
            Opcode::IBFE | Opcode::UBFE => {
                self.reqs |= ShaderReq::GPU_SHADER5;
                Some(format!(
                    "{} = {conv}({tp}(bitfieldExtract({}, int({}.x), int({}.x))));",
                    d(&ops)?,
                    s(&ops, 0)?,
                    s(&ops, 1)?,
                    s(&ops, 2)?
                ))
            }
            Opcode::BFI => {
                self.reqs |= ShaderReq::GPU_SHADER5;
                Some(format!(
                    "{} = {conv}(uintBitsToFloat(bitfieldInsert({}, {}, int({}), int({}))));",
                    d(&ops)?,
                    s(&ops, 0)?,
                    s(&ops, 1)?,
                    s(&ops, 2)?,
                    s(&ops, 3)?
                ))
            }
            Opcode::BREV | Opcode::POPC | Opcode::LSB | Opcode::IMSB | Opcode::UMSB => {
                self.reqs |= ShaderReq::GPU_SHADER5;
                let f = match op {
                    Opcode::BREV => "bitfieldReverse",
                    Opcode::POPC => "bitCount",
                    Opcode::LSB => "findLSB",
                    _ => "findMSB",
                };
                Some(format!("{} = {conv}({tp}({f}({})));", d(&ops)?, s(&ops, 0)?))
            }
            Opcode::BARRIER => Some("barrier();".to_string()),
            Opcode::MEMBAR => {
                let val = self.stream_operand(inst)?;
                let all = MEMBAR_SHADER_BUFFER
                    | MEMBAR_ATOMIC_BUFFER
                    | MEMBAR_SHADER_IMAGE
                    | MEMBAR_SHARED;
                if val & MEMBAR_THREAD_GROUP != 0 {
                    self.main.line("groupMemoryBarrier();");
                } else if val & all == all {
                    self.main.line("memoryBarrier();");
                } else {
                    for (bit, call) in [
                        (MEMBAR_SHADER_BUFFER, "memoryBarrierBuffer();"),
                        (MEMBAR_ATOMIC_BUFFER, "memoryBarrierAtomic();"),
                        (MEMBAR_SHADER_IMAGE, "memoryBarrierImage();"),
                        (MEMBAR_SHARED, "memoryBarrierShared();"),
                    ] {
                        if val & bit != 0 {
                            self.main.line(call);
                        }
                    }
                }
                None
            }
            Opcode::STORE => {
                self.translate_store(inst, &ops)?;
                None
            }
            Opcode::LOAD => {
                self.translate_load(inst, &ops)?;
                None
            }
            Opcode::ATOMUADD
            | Opcode::ATOMXCHG
            | Opcode::ATOMCAS
            | Opcode::ATOMAND
            | Opcode::ATOMOR
            | Opcode::ATOMXOR
            | Opcode::ATOMUMIN
            | Opcode::ATOMUMAX
            | Opcode::ATOMIMIN
            | Opcode::ATOMIMAX => {
                self.translate_atomic(inst, &ops)?;
                None
            }
            Opcode::RESQ => {
                self.translate_resq(inst, &ops)?;
                None
            }
            Opcode::CLOCK => {
                self.reqs |= ShaderReq::SHADER_CLOCK;
                Some(format!("{} = uintBitsToFloat(clock2x32ARB());", d(&ops)?))
            }
            Opcode::NOP => None,
        };
        if let Some(line) = line {
            self.main.line(&line);
        }

        if op.dst_type() == OpType::Double {
            if let (Some(real), Some(tmp)) = (ops.fp64_dsts.first(), ops.dsts.first()) {
                self.main.line(&format!(
                    "{real} = uintBitsToFloat(unpackDouble2x32({tmp}));"
                ));
            }
        }
        if inst.saturate {
            let dst = d(&ops)?;
            self.main.line(&format!("{dst} = clamp({dst}, 0.0, 1.0);"));
        }
        Ok(())
    }

    /// Work every stage does before leaving `main()`. `at_end` is false for
    /// an early `RET`.
    fn stage_exit(&mut self, at_end: bool) -> Result<()> {
        let key = self.key;
        match self.stage {
            ShaderType::Vertex => {
                if key.has_so() && !key.gs_present && !key.tes_present {
                    self.emit_so_movs()?;
                }
                self.emit_clip_dist_movs();
                if !key.gs_present && !key.tes_present {
                    self.emit_prescale();
                }
            }
            ShaderType::Fragment => self.fragment_exit(),
            ShaderType::TessCtrl if at_end => self.emit_clip_dist_movs(),
            ShaderType::TessEval if at_end => {
                if key.has_so() && !key.gs_present {
                    self.emit_so_movs()?;
                }
                self.emit_clip_dist_movs();
                if !key.gs_present {
                    self.emit_prescale();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
