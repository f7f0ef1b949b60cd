//! Texture sampling, size queries, image and buffer access, atomics.

use super::operand::{swizzle_char, Operands};
use super::{SamplerDecl, Translator};
use crate::error::{Result, TranslateError};
use crate::glsl::{ShaderReq, TypeQual};
use crate::tgsi::{File, Instruction, Opcode, ReturnType, TexTarget};

fn wm(mask: u8) -> &'static str {
    match mask {
        0x1 => ".x",
        0x3 => ".xy",
        0x7 => ".xyz",
        0x8 => ".w",
        _ => "",
    }
}

/// Integer coordinate type for image and texel-fetch addressing.
fn coord_type(target: TexTarget) -> (TypeQual, bool) {
    match target {
        TexTarget::Tex1D | TexTarget::Buffer => (TypeQual::Int, false),
        TexTarget::Tex2D | TexTarget::Rect | TexTarget::Tex1DArray => (TypeQual::IVec2, false),
        TexTarget::Tex3D | TexTarget::Cube | TexTarget::Tex2DArray | TexTarget::CubeArray => {
            (TypeQual::IVec3, false)
        }
        TexTarget::Tex2DMsaa => (TypeQual::IVec2, true),
        TexTarget::Tex2DArrayMsaa => (TypeQual::IVec3, true),
        _ => (TypeQual::None, false),
    }
}

fn is_1d(t: TexTarget) -> bool {
    matches!(
        t,
        TexTarget::Tex1D | TexTarget::Tex1DArray | TexTarget::Shadow1D | TexTarget::Shadow1DArray
    )
}

fn is_2d(t: TexTarget) -> bool {
    matches!(
        t,
        TexTarget::Rect
            | TexTarget::ShadowRect
            | TexTarget::Tex2D
            | TexTarget::Tex2DArray
            | TexTarget::Shadow2D
            | TexTarget::Shadow2DArray
    )
}

impl Translator<'_> {
    fn texture_target(inst: &Instruction) -> Result<TexTarget> {
        inst.texture.ok_or_else(|| {
            TranslateError::Unsupported(format!("{} without texture target", inst.opcode.name()))
        })
    }

    /// Record the target the sampler is used with and the requirements it
    /// implies. Returns whether the target is a shadow target.
    fn texture_reqs(&mut self, target: TexTarget, sreg_index: u32) -> Result<bool> {
        let slot = self
            .samplers
            .get_mut(sreg_index as usize)
            .ok_or(TranslateError::Overflow {
                what: "sampler views",
                max: super::MAX_SAMPLERS as usize,
            })?;
        let return_type = slot.map(|s| s.return_type).unwrap_or_default();
        *slot = Some(SamplerDecl {
            target,
            return_type,
        });

        match target {
            TexTarget::CubeArray | TexTarget::ShadowCubeArray => {
                self.reqs |= ShaderReq::CUBE_ARRAY
            }
            TexTarget::Tex2DMsaa | TexTarget::Tex2DArrayMsaa => {
                self.reqs |= ShaderReq::SAMPLER_MS
            }
            TexTarget::Buffer => self.uses_sampler_buf = true,
            TexTarget::Rect | TexTarget::ShadowRect => self.reqs |= ShaderReq::SAMPLER_RECT,
            _ => {}
        }
        if self.cfg.glsl_version >= 140
            && (self.reqs.contains(ShaderReq::SAMPLER_RECT) || self.uses_sampler_buf)
        {
            self.require_glsl_ver(140);
        }
        Ok(target.is_shadow())
    }

    // -----------------------------------------------------------------------
    // Sampling
    // -----------------------------------------------------------------------

    pub(super) fn translate_tex(&mut self, inst: &Instruction, ops: &Operands) -> Result<()> {
        let op = inst.opcode;
        let target = Self::texture_target(inst)?;
        let is_shad = self.texture_reqs(target, ops.sreg_index)?;
        let dst = ops.dst(op)?;

        let ret = self.samplers[ops.sreg_index as usize]
            .map(|s| s.return_type)
            .unwrap_or_default();
        let dtypeprefix = match ret {
            ReturnType::Sint if ops.dstconv != TypeQual::Int => TypeQual::IntBitsToFloat,
            ReturnType::Uint if ops.dstconv != TypeQual::Int => TypeQual::UintBitsToFloat,
            _ => TypeQual::None,
        };
        if op == Opcode::LODQ {
            self.reqs |= ShaderReq::LODQ;
        }

        let txp = op == Opcode::TXP;
        let (twm, txfi) = match target {
            TexTarget::Tex1D | TexTarget::Buffer => (if txp { 0 } else { 0x1 }, TypeQual::Int),
            TexTarget::Tex1DArray => (0x3, TypeQual::IVec2),
            TexTarget::Tex2D | TexTarget::Rect => (if txp { 0 } else { 0x3 }, TypeQual::IVec2),
            TexTarget::Shadow1D
            | TexTarget::Shadow2D
            | TexTarget::Shadow1DArray
            | TexTarget::ShadowRect
            | TexTarget::Tex3D => {
                let twm = if txp {
                    0
                } else if op == Opcode::TG4 {
                    0x3
                } else {
                    0x7
                };
                (twm, TypeQual::IVec3)
            }
            TexTarget::Cube | TexTarget::Tex2DArray => (0x7, TypeQual::IVec3),
            TexTarget::Tex2DMsaa => (0x3, TypeQual::IVec2),
            TexTarget::Tex2DArrayMsaa => (0x7, TypeQual::IVec3),
            TexTarget::ShadowCube
            | TexTarget::Shadow2DArray
            | TexTarget::ShadowCubeArray
            | TexTarget::CubeArray => {
                let twm = if op == Opcode::TG4
                    && !matches!(target, TexTarget::CubeArray | TexTarget::ShadowCubeArray)
                {
                    0x7
                } else {
                    0
                };
                (twm, TypeQual::None)
            }
        };

        let gwm = if op == Opcode::TXD {
            match target {
                t if is_1d(t) => 0x1,
                TexTarget::Tex2D
                | TexTarget::Shadow2D
                | TexTarget::Tex2DArray
                | TexTarget::Shadow2DArray
                | TexTarget::Rect
                | TexTarget::ShadowRect => 0x3,
                TexTarget::Tex3D | TexTarget::Cube | TexTarget::ShadowCube | TexTarget::CubeArray => {
                    0x7
                }
                _ => 0,
            }
        } else {
            0
        };

        let src0 = ops.src(0, op)?;
        let mut sampler_index = 1;
        let mut bias = String::new();
        let num_offsets = inst.tex_offsets.len();
        match op {
            Opcode::TXB2 | Opcode::TXL2 | Opcode::TEX2 => {
                sampler_index = 2;
                let src1 = ops.src(1, op)?;
                if op != Opcode::TEX2 {
                    bias = format!(", {src1}.x");
                } else if target == TexTarget::ShadowCubeArray {
                    bias = format!(", float({src1})");
                }
            }
            Opcode::TXB | Opcode::TXL => bias = format!(", {src0}.w"),
            Opcode::TXF => {
                if matches!(
                    target,
                    TexTarget::Tex1D
                        | TexTarget::Tex2D
                        | TexTarget::Tex2DMsaa
                        | TexTarget::Tex2DArrayMsaa
                        | TexTarget::Tex3D
                        | TexTarget::Tex1DArray
                        | TexTarget::Tex2DArray
                ) {
                    bias = format!(", int({src0}.w)");
                }
            }
            Opcode::TXD => {
                sampler_index = 3;
                bias = format!(
                    ", {}{}, {}{}",
                    ops.src(1, op)?,
                    wm(gwm),
                    ops.src(2, op)?,
                    wm(gwm)
                );
            }
            Opcode::TG4 => {
                sampler_index = 2;
                self.reqs |= ShaderReq::TG4;
                if num_offsets > 1 || is_shad || self.reqs.contains(ShaderReq::SAMPLER_RECT) {
                    self.reqs |= ShaderReq::GPU_SHADER5;
                }
                if num_offsets == 1 && inst.tex_offsets[0].file != File::Immediate {
                    self.reqs |= ShaderReq::GPU_SHADER5;
                }
                let src1 = ops.src(1, op)?;
                if is_shad {
                    bias = match target {
                        TexTarget::ShadowCube | TexTarget::Shadow2DArray => format!(", {src0}.w"),
                        TexTarget::ShadowCubeArray => format!(", {src1}.x"),
                        _ => format!(", {src0}.z"),
                    };
                } else if ops.tg4_has_component {
                    let takes_comp = if num_offsets == 0 {
                        matches!(
                            target,
                            TexTarget::Tex2D
                                | TexTarget::Rect
                                | TexTarget::Cube
                                | TexTarget::Tex2DArray
                                | TexTarget::CubeArray
                        )
                    } else {
                        matches!(target, TexTarget::Tex2D | TexTarget::Rect | TexTarget::Tex2DArray)
                    };
                    if takes_comp {
                        bias = format!(", int({src1})");
                    }
                }
            }
            _ => {}
        }

        let tex_ext = match op {
            Opcode::LODQ => "QueryLOD",
            Opcode::TXP => {
                if matches!(target, TexTarget::Cube | TexTarget::Tex2DArray | TexTarget::Tex1DArray) {
                    ""
                } else if num_offsets == 1 {
                    "ProjOffset"
                } else {
                    "Proj"
                }
            }
            Opcode::TXL | Opcode::TXL2 => {
                if num_offsets == 1 {
                    "LodOffset"
                } else {
                    "Lod"
                }
            }
            Opcode::TXD => {
                if num_offsets == 1 {
                    "GradOffset"
                } else {
                    "Grad"
                }
            }
            Opcode::TG4 => match num_offsets {
                4 => "GatherOffsets",
                1 => "GatherOffset",
                _ => "Gather",
            },
            _ => {
                if num_offsets == 1 {
                    "Offset"
                } else {
                    ""
                }
            }
        };

        let mut offbuf = String::new();
        if num_offsets == 1 {
            offbuf = self.offset_string(inst, target)?;
            if matches!(op, Opcode::TXL | Opcode::TXL2 | Opcode::TXD) || (op == Opcode::TG4 && is_shad)
            {
                std::mem::swap(&mut offbuf, &mut bias);
            }
        }

        let sampler = ops.src(sampler_index, op)?;
        let dwm = if ops.dst_override_no_wm.first().copied().unwrap_or(false) {
            ""
        } else {
            ops.writemask.as_str()
        };
        let conv = ops.dstconv;
        let twm = wm(twm);

        let line = if op == Opcode::TXF {
            format!(
                "{dst} = {conv}({dtypeprefix}(texelFetch{tex_ext}({sampler}, {txfi}({src0}{twm}){bias}{offbuf}){dwm}));"
            )
        } else if self.cfg.glsl_version < 140 && self.reqs.contains(ShaderReq::SAMPLER_RECT)
            && matches!(target, TexTarget::Rect | TexTarget::ShadowRect)
        {
            if target == TexTarget::Rect {
                format!("{dst} = texture2DRect({sampler}, {src0}.xy){};", ops.writemask)
            } else {
                format!("{dst} = shadow2DRect({sampler}, {src0}.xyz){};", ops.writemask)
            }
        } else if is_shad && op != Opcode::TG4 {
            // shadow lookups return 1.0 in alpha
            let cname = self.prefix();
            let idx = inst.src.get(sampler_index).map_or(0, |s| s.index);
            format!(
                "{dst} = {conv}({dtypeprefix}(vec4(vec4(texture{tex_ext}({sampler}, {src0}{twm}{offbuf}{bias})) * {cname}shadmask{idx} + {cname}shadadd{idx}){}));",
                ops.writemask
            )
        } else if self.cfg.use_gles && target == TexTarget::Tex1D {
            // no 1D textures on GLES; sample a one-texel-high 2D texture
            format!(
                "{dst} = {conv}({dtypeprefix}(texture2D({sampler}, vec2({src0}{twm}{offbuf}{bias}, 0.5)){dwm}));"
            )
        } else {
            format!(
                "{dst} = {conv}({dtypeprefix}(texture{tex_ext}({sampler}, {src0}{twm}{offbuf}{bias}){dwm}));"
            )
        };
        self.main.line(&line);
        Ok(())
    }

    fn offset_string(&self, inst: &Instruction, target: TexTarget) -> Result<String> {
        let off = inst.tex_offsets[0];
        let [x, y, z] = off.swizzle;
        let comps: Vec<String> = match off.file {
            File::Immediate => {
                let imm = self.immediate(off.index)?;
                [x, y, z]
                    .iter()
                    .map(|&s| imm.int(usize::from(s)).to_string())
                    .collect()
            }
            File::Temporary => {
                let range = self
                    .find_temp_range(off.index)
                    .ok_or_else(|| TranslateError::Undeclared(format!("TEMP[{}]", off.index)))?;
                let idx = off.index - range.first as i32;
                [x, y, z]
                    .iter()
                    .map(|&s| {
                        format!("floatBitsToInt(temp{}[{idx}].{})", range.first, swizzle_char(s))
                    })
                    .collect()
            }
            File::Input => {
                let input = self
                    .inputs
                    .iter()
                    .find(|io| io.first as i32 == off.index)
                    .ok_or_else(|| TranslateError::Undeclared(format!("IN[{}]", off.index)))?;
                [x, y, z]
                    .iter()
                    .map(|&s| format!("floatBitsToInt({}.{})", input.name, swizzle_char(s)))
                    .collect()
            }
            other => {
                return Err(TranslateError::Unsupported(format!(
                    "texture offset in {other:?}"
                )))
            }
        };
        Ok(match target {
            t if is_1d(t) => format!(", int({})", comps[0]),
            t if is_2d(t) => format!(", ivec2({}, {})", comps[0], comps[1]),
            TexTarget::Tex3D => format!(", ivec3({}, {}, {})", comps[0], comps[1], comps[2]),
            other => {
                return Err(TranslateError::Unsupported(format!(
                    "texture offset on {other:?}"
                )))
            }
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub(super) fn emit_txq(&mut self, inst: &Instruction, ops: &Operands) -> Result<()> {
        let op = inst.opcode;
        let target = Self::texture_target(inst)?;
        self.texture_reqs(target, ops.sreg_index)?;
        let dst = ops.dst(op)?;
        let src0 = ops.src(0, op)?;
        let sampler = ops.src(1, op)?;
        let mask = inst.dst.first().map_or(0xf, |d| d.writemask);
        let dtypeprefix = TypeQual::IntBitsToFloat;

        let bias = if matches!(
            target,
            TexTarget::Rect
                | TexTarget::ShadowRect
                | TexTarget::Buffer
                | TexTarget::Tex2DMsaa
                | TexTarget::Tex2DArrayMsaa
        ) {
            String::new()
        } else {
            format!(", int({src0}.w)")
        };

        let mut twm = 0;
        if mask & 0x8 != 0 {
            if !matches!(
                target,
                TexTarget::Buffer | TexTarget::Rect | TexTarget::Tex2DMsaa | TexTarget::Tex2DArrayMsaa
            ) {
                self.reqs |= ShaderReq::TXQ_LEVELS;
                let lwm = if mask & 0x7 != 0 { 0x8 } else { 0 };
                self.main.line(&format!(
                    "{dst}{} = {dtypeprefix}(textureQueryLevels({sampler}));",
                    wm(lwm)
                ));
            }
            if mask & 0x7 != 0 {
                twm = match target {
                    TexTarget::Tex1D | TexTarget::Buffer | TexTarget::Shadow1D => 0x1,
                    TexTarget::Tex1DArray
                    | TexTarget::Shadow1DArray
                    | TexTarget::Tex2D
                    | TexTarget::Shadow2D
                    | TexTarget::Rect
                    | TexTarget::ShadowRect
                    | TexTarget::Cube
                    | TexTarget::ShadowCube
                    | TexTarget::Tex2DMsaa => 0x3,
                    _ => 0x7,
                };
            }
        }

        if mask & 0x7 != 0 {
            let tail = if mask.count_ones() > 1 {
                ops.writemask.as_str()
            } else {
                ""
            };
            self.main.line(&format!(
                "{dst}{} = {dtypeprefix}(textureSize({sampler}{bias})){tail};",
                wm(twm)
            ));
        }
        Ok(())
    }

    pub(super) fn emit_txqs(&mut self, inst: &Instruction, ops: &Operands) -> Result<()> {
        let target = Self::texture_target(inst)?;
        self.reqs |= ShaderReq::TXQS;
        self.texture_reqs(target, ops.sreg_index)?;
        if !matches!(target, TexTarget::Tex2DMsaa | TexTarget::Tex2DArrayMsaa) {
            return Err(TranslateError::Unsupported(format!(
                "TXQS on {target:?}"
            )));
        }
        let dst = ops.dst(inst.opcode)?;
        let sampler = ops.src(0, inst.opcode)?;
        self.main
            .line(&format!("{dst} = intBitsToFloat(textureSamples({sampler}));"));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Images and buffers
    // -----------------------------------------------------------------------

    fn integer_memory_at(&self, file: File, index: i32) -> bool {
        match file {
            File::Buffer => self.ssbo_integer_mask & (1 << index) != 0,
            File::Memory => self.integer_memory,
            _ => false,
        }
    }

    fn image_at(&self, index: u32) -> Result<super::ImageDecl> {
        self.images
            .get(index as usize)
            .copied()
            .flatten()
            .ok_or_else(|| TranslateError::Undeclared(format!("IMAGE[{index}]")))
    }

    pub(super) fn translate_store(&mut self, inst: &Instruction, ops: &Operands) -> Result<()> {
        let op = inst.opcode;
        let dst_reg = inst.dst.first().ok_or(TranslateError::MissingOperand {
            opcode: op.name(),
            expected: 1,
        })?;
        let dst = ops.dst(op)?;
        let src0 = ops.src(0, op)?;
        let src1 = ops.src(1, op)?;

        match dst_reg.file {
            File::Image => {
                let image = self.image_at(dst_reg.index as u32)?;
                let (coord, is_ms) = coord_type(image.target);
                let conversion = if ops.override_no_cast.first().copied().unwrap_or(false) {
                    ""
                } else {
                    "floatBitsToInt"
                };
                let ms = if is_ms {
                    format!("int({src0}.w),")
                } else {
                    String::new()
                };
                let fmt = super::ImageDecl {
                    format: inst.memory_format,
                    ..image
                };
                let tp = match fmt.return_type() {
                    ReturnType::Uint => TypeQual::FloatBitsToUint,
                    ReturnType::Sint => TypeQual::FloatBitsToInt,
                    _ => TypeQual::None,
                };
                self.main.line(&format!(
                    "imageStore({dst},{coord}({conversion}({src0})),{ms}{tp}({src1}));"
                ));
            }
            File::Buffer | File::Memory => {
                let tp = if self.integer_memory_at(dst_reg.file, dst_reg.index) {
                    "floatBitsToInt"
                } else {
                    "floatBitsToUint"
                };
                let conversion = if ops.override_no_cast.get(1).copied().unwrap_or(false) {
                    ""
                } else {
                    tp
                };
                for (c, ch) in ['x', 'y', 'z', 'w'].into_iter().enumerate() {
                    if dst_reg.writemask & (1 << c) == 0 {
                        continue;
                    }
                    let index = if c == 0 {
                        format!("uint(floatBitsToUint({src0}))>>2")
                    } else {
                        format!("(uint(floatBitsToUint({src0}))>>2)+{c}u")
                    };
                    self.main
                        .line(&format!("{dst}[{index}] = {conversion}({src1}).{ch};"));
                }
            }
            other => {
                return Err(TranslateError::Unsupported(format!("STORE to {other:?}")))
            }
        }
        Ok(())
    }

    pub(super) fn translate_load(&mut self, inst: &Instruction, ops: &Operands) -> Result<()> {
        let op = inst.opcode;
        let src_reg = inst.src.first().ok_or(TranslateError::MissingOperand {
            opcode: op.name(),
            expected: 2,
        })?;
        let dst = ops.dst(op)?;
        let src0 = ops.src(0, op)?;
        let src1 = ops.src(1, op)?;

        match src_reg.file {
            File::Image => {
                let image = self.image_at(ops.sreg_index)?;
                let (coord, is_ms) = coord_type(image.target);
                let conversion = if ops.override_no_cast.get(1).copied().unwrap_or(false) {
                    ""
                } else {
                    "floatBitsToInt"
                };
                let ms = if is_ms {
                    format!(", int({src1}.w)")
                } else {
                    String::new()
                };
                let dwm = if ops.dst_override_no_wm.first().copied().unwrap_or(false) {
                    ""
                } else {
                    ops.writemask.as_str()
                };
                let tp = match image.return_type() {
                    ReturnType::Uint => TypeQual::UintBitsToFloat,
                    ReturnType::Sint => TypeQual::IntBitsToFloat,
                    _ => TypeQual::None,
                };
                self.main.line(&format!(
                    "{dst} = {tp}(imageLoad({src0}, {coord}({conversion}({src1})){ms}){dwm});"
                ));
            }
            File::Buffer | File::Memory => {
                let base = dst.split('.').next().unwrap_or(dst);
                self.use_ssbo_addr_temp = true;
                self.main.line(&format!(
                    "ssbo_addr_temp = uint(floatBitsToUint({src1})) >> 2;"
                ));
                // atomic counters are read through a no-op atomicOr
                let (atomic_op, atomic_src) = if src_reg.file == File::Buffer
                    && self.ssbo_atomic_mask & (1 << src_reg.index) != 0
                {
                    ("atomicOr", ", uint(0)")
                } else {
                    ("", "")
                };
                let tp = if self.integer_memory_at(src_reg.file, src_reg.index) {
                    "intBitsToFloat"
                } else {
                    "uintBitsToFloat"
                };
                let mask = inst.dst.first().map_or(0xf, |d| d.writemask);
                for (c, ch) in ['x', 'y', 'z', 'w'].into_iter().enumerate() {
                    if mask & (1 << c) == 0 {
                        continue;
                    }
                    let addr = if c == 0 {
                        "ssbo_addr_temp".to_string()
                    } else {
                        format!("ssbo_addr_temp + {c}u")
                    };
                    self.main.line(&format!(
                        "{base}.{ch} = ({tp}({atomic_op}({src0}[{addr}]{atomic_src})));"
                    ));
                }
            }
            other => {
                return Err(TranslateError::Unsupported(format!("LOAD from {other:?}")))
            }
        }
        Ok(())
    }

    pub(super) fn translate_resq(&mut self, inst: &Instruction, ops: &Operands) -> Result<()> {
        let op = inst.opcode;
        let dst = ops.dst(op)?;
        let src0 = ops.src(0, op)?;
        let mask = inst.dst.first().map_or(0xf, |d| d.writemask);
        match inst.src.first().map(|s| s.file) {
            Some(File::Image) => {
                if mask & 0x8 != 0 {
                    self.reqs |= ShaderReq::TXQS | ShaderReq::INTS;
                    self.main
                        .line(&format!("{dst} = intBitsToFloat(imageSamples({src0}));"));
                }
                if mask & 0x7 != 0 {
                    self.reqs |= ShaderReq::IMAGE_SIZE | ShaderReq::INTS;
                    self.main
                        .line(&format!("{dst} = intBitsToFloat(imageSize({src0}));"));
                }
            }
            Some(File::Buffer) => {
                self.main
                    .line(&format!("{dst} = intBitsToFloat(int({src0}.length()) << 2);"));
            }
            _ => self.warn_unsupported("RESQ operand"),
        }
        Ok(())
    }

    pub(super) fn translate_atomic(&mut self, inst: &Instruction, ops: &Operands) -> Result<()> {
        let op = inst.opcode;
        let src_reg = inst.src.first().ok_or(TranslateError::MissingOperand {
            opcode: op.name(),
            expected: 3,
        })?;
        let (opname, is_cas) = match op {
            Opcode::ATOMUADD => ("Add", false),
            Opcode::ATOMXCHG => ("Exchange", false),
            Opcode::ATOMCAS => ("CompSwap", true),
            Opcode::ATOMAND => ("And", false),
            Opcode::ATOMOR => ("Or", false),
            Opcode::ATOMXOR => ("Xor", false),
            Opcode::ATOMUMIN | Opcode::ATOMIMIN => ("Min", false),
            Opcode::ATOMUMAX | Opcode::ATOMIMAX => ("Max", false),
            other => {
                return Err(TranslateError::Unsupported(format!(
                    "atomic {}",
                    other.name()
                )))
            }
        };
        let dst = ops.dst(op)?;
        let src0 = ops.src(0, op)?;
        let src1 = ops.src(1, op)?;
        let src2 = ops.src(2, op)?;

        match src_reg.file {
            File::Image => {
                let image = self.image_at(ops.sreg_index)?;
                let (stp, dtp, cast) = match image.return_type() {
                    ReturnType::Sint => ("floatBitsToInt", "intBitsToFloat", "int"),
                    _ => ("floatBitsToUint", "uintBitsToFloat", "uint"),
                };
                let cas = if is_cas {
                    format!(", {cast}({stp}({}))", ops.src(3, op)?)
                } else {
                    String::new()
                };
                let (coord, is_ms) = coord_type(image.target);
                let conversion = if ops.override_no_cast.get(1).copied().unwrap_or(false) {
                    ""
                } else {
                    "floatBitsToInt"
                };
                let ms = if is_ms {
                    format!(", int({src1}.w)")
                } else {
                    String::new()
                };
                self.main.line(&format!(
                    "{dst} = {dtp}(imageAtomic{opname}({src0}, {coord}({conversion}({src1})){ms}, {cast}({stp}({src2})){cas}));"
                ));
            }
            File::Buffer | File::Memory => {
                let (ty, stp, dtp) = if self.integer_memory_at(src_reg.file, src_reg.index) {
                    ("int", "floatBitsToInt", "intBitsToFloat")
                } else {
                    ("uint", "floatBitsToUint", "uintBitsToFloat")
                };
                let cas = if is_cas {
                    format!(", {ty}({stp}({}).x)", ops.src(3, op)?)
                } else {
                    String::new()
                };
                self.main.line(&format!(
                    "{dst} = {dtp}(atomic{opname}({src0}[int(floatBitsToInt({src1})) >> 2], {ty}({stp}({src2}).x){cas}));"
                ));
            }
            other => {
                return Err(TranslateError::Unsupported(format!("atomic on {other:?}")))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_coordinates() {
        assert_eq!(coord_type(TexTarget::Buffer), (TypeQual::Int, false));
        assert_eq!(coord_type(TexTarget::Tex2DArrayMsaa), (TypeQual::IVec3, true));
        assert_eq!(coord_type(TexTarget::Shadow2D).0, TypeQual::None);
    }

    #[test]
    fn query_masks() {
        assert_eq!(wm(0x7), ".xyz");
        assert_eq!(wm(0x8), ".w");
        assert_eq!(wm(0), "");
    }
}
