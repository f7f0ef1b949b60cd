//! TGSI text parser.
//!
//! Accepts the textual dump format the guest driver emits:
//!
//! ```text
//! FRAG
//! PROPERTY FS_COLOR0_WRITES_ALL_CBUFS 1
//! DCL IN[0], GENERIC[0], PERSPECTIVE
//! DCL OUT[0], COLOR
//! IMM[0] FLT32 {    1.0000,     0.0000,     0.0000,     1.0000}
//!   0: MOV OUT[0], IN[0]
//!   1: END
//! ```

use tracing::trace;
use virgl_core::pipe::{PrimType, ShaderType};
use virgl_core::VirglFormat;

use super::{
    Declaration, Dimension, DstRegister, File, ImmType, Immediate, Indirect, Instruction, Interp,
    Location, Opcode, Program, Property, PropertyName, ReturnType, Semantic, SrcRegister,
    TexOffset, TexTarget, WRITEMASK_XYZW,
};
use crate::error::{Result, TranslateError};

/// Parse a TGSI text program.
pub fn parse(text: &str) -> Result<Program> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(n, l)| (n + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with(';'));

    let (line, header) = lines
        .next()
        .ok_or_else(|| TranslateError::parse(1, "empty program"))?;
    let processor = match header {
        "VERT" => ShaderType::Vertex,
        "FRAG" => ShaderType::Fragment,
        "GEOM" => ShaderType::Geometry,
        "TESS_CTRL" => ShaderType::TessCtrl,
        "TESS_EVAL" => ShaderType::TessEval,
        "COMP" => ShaderType::Compute,
        other => return Err(TranslateError::parse(line, format!("bad processor {other}"))),
    };

    let mut program = Program {
        processor,
        properties: Vec::new(),
        declarations: Vec::new(),
        immediates: Vec::new(),
        instructions: Vec::new(),
    };

    for (line, text) in lines {
        if let Some(rest) = text.strip_prefix("PROPERTY ") {
            program.properties.push(parse_property(line, rest)?);
        } else if let Some(rest) = text.strip_prefix("DCL ") {
            program.declarations.push(parse_declaration(line, rest)?);
        } else if text.starts_with("IMM[") {
            program.immediates.push(parse_immediate(line, text)?);
        } else {
            program.instructions.push(parse_instruction(line, text)?);
        }
    }

    trace!(
        "parsed {:?}: {} decls, {} imms, {} insts",
        program.processor,
        program.declarations.len(),
        program.immediates.len(),
        program.instructions.len()
    );
    Ok(program)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn parse_property(line: usize, text: &str) -> Result<Property> {
    let mut parts = text.split_whitespace();
    let name_str = parts
        .next()
        .ok_or_else(|| TranslateError::parse(line, "missing property name"))?;
    let name = PropertyName::from_name(name_str)
        .ok_or_else(|| TranslateError::parse(line, format!("unknown property {name_str}")))?;
    let value_str = parts
        .next()
        .ok_or_else(|| TranslateError::parse(line, "missing property value"))?;
    let value = match value_str.parse::<u32>() {
        Ok(v) => v,
        Err(_) => symbolic_property_value(value_str)
            .ok_or_else(|| TranslateError::parse(line, format!("bad value {value_str}")))?,
    };
    Ok(Property { name, value })
}

fn symbolic_property_value(value: &str) -> Option<u32> {
    let prim = match value {
        "POINTS" => Some(PrimType::Points),
        "LINES" => Some(PrimType::Lines),
        "LINE_STRIP" => Some(PrimType::LineStrip),
        "TRIANGLES" => Some(PrimType::Triangles),
        "TRIANGLE_STRIP" => Some(PrimType::TriangleStrip),
        "QUADS" => Some(PrimType::Quads),
        "LINES_ADJACENCY" => Some(PrimType::LinesAdjacency),
        "TRIANGLES_ADJACENCY" => Some(PrimType::TrianglesAdjacency),
        _ => None,
    };
    if let Some(prim) = prim {
        return Some(prim as u32);
    }
    Some(match value {
        "FRACTIONAL_ODD" => 0,
        "FRACTIONAL_EVEN" => 1,
        "EQUAL" => 2,
        "UPPER_LEFT" => 0,
        "LOWER_LEFT" => 1,
        "HALF_INTEGER" => 0,
        "INTEGER" => 1,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

fn parse_declaration(line: usize, text: &str) -> Result<Declaration> {
    let mut parts = text.split(',').map(str::trim);
    let reg = parts
        .next()
        .ok_or_else(|| TranslateError::parse(line, "empty declaration"))?;
    let (file, groups, _) = split_register(line, reg)?;

    let (dimension, range) = match groups.as_slice() {
        [range] => (None, *range),
        [dim, range] => {
            let dim = if dim.is_empty() {
                None
            } else {
                Some(parse_u32(line, dim)?)
            };
            (dim, *range)
        }
        _ => return Err(TranslateError::parse(line, "bad declaration range")),
    };
    let (first, last) = match range.split_once("..") {
        Some((a, b)) => (parse_u32(line, a)?, parse_u32(line, b)?),
        None => {
            let v = parse_u32(line, range)?;
            (v, v)
        }
    };
    if last < first {
        return Err(TranslateError::parse(line, "declaration range is reversed"));
    }

    let mut decl = Declaration::new(file, first, last);
    decl.dimension = dimension;
    let mut return_types = 0;

    for token in parts {
        if token.is_empty() {
            continue;
        }
        if let Some(array) = token
            .strip_prefix("ARRAY(")
            .and_then(|t| t.strip_suffix(')'))
        {
            decl.array_id = parse_u32(line, array)?;
            continue;
        }
        if let Some(format) = token.strip_prefix("PIPE_FORMAT_") {
            decl.image_format = Some(
                image_format(format)
                    .ok_or_else(|| TranslateError::parse(line, format!("bad format {token}")))?,
            );
            continue;
        }
        match token {
            "LOCAL" => continue,
            "INVARIANT" => {
                decl.invariant = true;
                continue;
            }
            "WR" => {
                decl.writable = true;
                continue;
            }
            "ATOMIC" => {
                decl.atomic = true;
                continue;
            }
            "SHARED" => {
                decl.shared = true;
                continue;
            }
            "CENTROID" => {
                decl.location = Location::Centroid;
                continue;
            }
            "SAMPLE" => {
                decl.location = Location::Sample;
                continue;
            }
            _ => {}
        }

        if matches!(file, File::SamplerView | File::Image) && decl.target.is_none() {
            if let Some(target) = TexTarget::from_name(token) {
                decl.target = Some(target);
                continue;
            }
        }
        if file == File::SamplerView {
            if let Some(ret) = ReturnType::from_name(token) {
                // one return type per channel, or one for all four
                if return_types == 0 {
                    decl.return_type = ret;
                }
                return_types += 1;
                continue;
            }
        }

        // COLOR is both a semantic and an interpolation mode; the
        // semantic always comes first
        if decl.semantic.is_none() {
            let (name, index) = match token.split_once('[') {
                Some((name, rest)) => {
                    let idx = rest
                        .strip_suffix(']')
                        .ok_or_else(|| TranslateError::parse(line, "bad semantic index"))?;
                    (name, parse_u32(line, idx)?)
                }
                None => (token, 0),
            };
            if let Some(sem) = Semantic::from_name(name) {
                decl.semantic = Some((sem, index));
                continue;
            }
        }
        decl.interp = match token {
            "CONSTANT" => Interp::Constant,
            "LINEAR" => Interp::Linear,
            "PERSPECTIVE" => Interp::Perspective,
            "COLOR" => Interp::Color,
            _ => {
                return Err(TranslateError::parse(
                    line,
                    format!("unexpected declaration token {token}"),
                ))
            }
        };
    }
    Ok(decl)
}

/// Formats image declarations and memory instructions may name.
fn image_format(name: &str) -> Option<VirglFormat> {
    use VirglFormat as V;
    Some(match name {
        "R11G11B10_FLOAT" => V::R11G11B10_FLOAT,
        "R10G10B10A2_UNORM" => V::R10G10B10A2_UNORM,
        "R8_UNORM" => V::R8_UNORM,
        "R8_SNORM" => V::R8_SNORM,
        "R8_UINT" => V::R8_UINT,
        "R8_SINT" => V::R8_SINT,
        "R8G8_UNORM" => V::R8G8_UNORM,
        "R8G8_SNORM" => V::R8G8_SNORM,
        "R8G8_UINT" => V::R8G8_UINT,
        "R8G8_SINT" => V::R8G8_SINT,
        "R8G8B8A8_UNORM" => V::R8G8B8A8_UNORM,
        "R8G8B8A8_SNORM" => V::R8G8B8A8_SNORM,
        "R8G8B8A8_UINT" => V::R8G8B8A8_UINT,
        "R8G8B8A8_SINT" => V::R8G8B8A8_SINT,
        "R16_UNORM" => V::R16_UNORM,
        "R16_SNORM" => V::R16_SNORM,
        "R16_UINT" => V::R16_UINT,
        "R16_SINT" => V::R16_SINT,
        "R16_FLOAT" => V::R16_FLOAT,
        "R16G16_UNORM" => V::R16G16_UNORM,
        "R16G16_SNORM" => V::R16G16_SNORM,
        "R16G16_UINT" => V::R16G16_UINT,
        "R16G16_SINT" => V::R16G16_SINT,
        "R16G16_FLOAT" => V::R16G16_FLOAT,
        "R16G16B16A16_UNORM" => V::R16G16B16A16_UNORM,
        "R16G16B16A16_SNORM" => V::R16G16B16A16_SNORM,
        "R16G16B16A16_UINT" => V::R16G16B16A16_UINT,
        "R16G16B16A16_SINT" => V::R16G16B16A16_SINT,
        "R16G16B16A16_FLOAT" => V::R16G16B16A16_FLOAT,
        "R32_FLOAT" => V::R32_FLOAT,
        "R32_UINT" => V::R32_UINT,
        "R32_SINT" => V::R32_SINT,
        "R32G32_FLOAT" => V::R32G32_FLOAT,
        "R32G32_UINT" => V::R32G32_UINT,
        "R32G32_SINT" => V::R32G32_SINT,
        "R32G32B32A32_FLOAT" => V::R32G32B32A32_FLOAT,
        "R32G32B32A32_UINT" => V::R32G32B32A32_UINT,
        "R32G32B32A32_SINT" => V::R32G32B32A32_SINT,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Immediates
// ---------------------------------------------------------------------------

fn parse_immediate(line: usize, text: &str) -> Result<Immediate> {
    let close = text
        .find(']')
        .ok_or_else(|| TranslateError::parse(line, "bad immediate"))?;
    let rest = text[close + 1..].trim();
    let (ty_str, values) = rest
        .split_once('{')
        .ok_or_else(|| TranslateError::parse(line, "missing immediate values"))?;
    let values = values
        .trim()
        .strip_suffix('}')
        .ok_or_else(|| TranslateError::parse(line, "unterminated immediate"))?;
    let values: Vec<&str> = values.split(',').map(str::trim).collect();

    let ty = match ty_str.trim() {
        "FLT32" => ImmType::Float32,
        "UINT32" => ImmType::Uint32,
        "INT32" => ImmType::Int32,
        "FLT64" => ImmType::Float64,
        other => return Err(TranslateError::parse(line, format!("bad immediate type {other}"))),
    };

    let mut bits = [0u32; 4];
    match ty {
        ImmType::Float64 => {
            if values.len() > 2 {
                return Err(TranslateError::parse(line, "too many double values"));
            }
            for (i, v) in values.iter().enumerate() {
                let d: f64 = v
                    .parse()
                    .map_err(|_| TranslateError::parse(line, format!("bad double {v}")))?;
                let raw = d.to_bits();
                bits[i * 2] = raw as u32;
                bits[i * 2 + 1] = (raw >> 32) as u32;
            }
        }
        _ => {
            if values.len() > 4 {
                return Err(TranslateError::parse(line, "too many immediate values"));
            }
            for (i, v) in values.iter().enumerate() {
                bits[i] = match ty {
                    ImmType::Float32 => match parse_hex(v) {
                        Some(raw) => raw,
                        None => v
                            .parse::<f32>()
                            .map_err(|_| TranslateError::parse(line, format!("bad float {v}")))?
                            .to_bits(),
                    },
                    ImmType::Uint32 => match parse_hex(v) {
                        Some(raw) => raw,
                        None => parse_u32(line, v)?,
                    },
                    _ => v
                        .parse::<i32>()
                        .map_err(|_| TranslateError::parse(line, format!("bad int {v}")))?
                        as u32,
                };
            }
        }
    }
    Ok(Immediate { ty, bits })
}

fn parse_hex(value: &str) -> Option<u32> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

fn parse_instruction(line: usize, text: &str) -> Result<Instruction> {
    // strip the "N:" instruction counter
    let body = match text.split_once(':') {
        Some((num, rest)) if num.trim().chars().all(|c| c.is_ascii_digit()) => rest.trim(),
        _ => text,
    };

    // trailing branch label
    let (body, label) = match body.rsplit_once(" :") {
        Some((head, lbl)) if lbl.trim().chars().all(|c| c.is_ascii_digit()) => {
            (head.trim(), Some(parse_u32(line, lbl.trim())?))
        }
        _ => (body, None),
    };

    let (name, operands) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    let mut saturate = false;
    let mut precise = false;
    let mut base = name;
    let opcode = loop {
        if let Some(op) = Opcode::from_name(base) {
            break op;
        }
        if let Some(stripped) = base.strip_suffix("_SAT") {
            saturate = true;
            base = stripped;
        } else if let Some(stripped) = base.strip_suffix("_PRECISE") {
            precise = true;
            base = stripped;
        } else {
            return Err(TranslateError::parse(line, format!("unknown opcode {name}")));
        }
    };

    let mut inst = Instruction::new(opcode);
    inst.saturate = saturate;
    inst.precise = precise;
    inst.label = label;

    if operands.is_empty() {
        return Ok(inst);
    }

    let num_dst = opcode.num_dst();
    let mut seen_target = false;
    for token in operands.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        if let Some(format) = token.strip_prefix("PIPE_FORMAT_") {
            inst.memory_format = Some(
                image_format(format)
                    .ok_or_else(|| TranslateError::parse(line, format!("bad format {token}")))?,
            );
            continue;
        }
        if let Some(target) = TexTarget::from_name(token) {
            inst.texture = Some(target);
            seen_target = true;
            continue;
        }
        if matches!(token, "COHERENT" | "RESTRICT" | "VOLATILE") {
            continue;
        }
        if seen_target {
            inst.tex_offsets.push(parse_tex_offset(line, token)?);
        } else if inst.dst.len() < num_dst {
            inst.dst.push(parse_dst(line, token)?);
        } else {
            inst.src.push(parse_src(line, token)?);
        }
    }
    Ok(inst)
}

fn parse_dst(line: usize, text: &str) -> Result<DstRegister> {
    let (file, groups, suffix) = split_register(line, text)?;
    let (dimension, index, indirect) = resolve_groups(line, &groups)?;
    let writemask = match suffix.strip_prefix('.') {
        Some(mask) => parse_writemask(line, mask)?,
        None => WRITEMASK_XYZW,
    };
    Ok(DstRegister {
        file,
        index,
        indirect,
        dimension,
        writemask,
    })
}

fn parse_src(line: usize, text: &str) -> Result<SrcRegister> {
    let (negate, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, text),
    };
    let (absolute, text) = match text.strip_prefix('|').and_then(|t| t.strip_suffix('|')) {
        Some(inner) => (true, inner.trim()),
        None => (false, text),
    };
    let (file, groups, suffix) = split_register(line, text)?;
    let (dimension, index, indirect) = resolve_groups(line, &groups)?;
    let mut reg = SrcRegister::new(file, index);
    reg.dimension = dimension;
    reg.indirect = indirect;
    reg.negate = negate;
    reg.absolute = absolute;
    if let Some(swz) = suffix.strip_prefix('.') {
        reg.swizzle = parse_swizzle(line, swz)?;
    }
    Ok(reg)
}

fn parse_tex_offset(line: usize, text: &str) -> Result<TexOffset> {
    let src = parse_src(line, text)?;
    Ok(TexOffset {
        file: src.file,
        index: src.index,
        swizzle: [src.swizzle[0], src.swizzle[1], src.swizzle[2]],
    })
}

/// Split `FILE[a][b].suffix` into its file, bracket contents and suffix.
fn split_register(line: usize, text: &str) -> Result<(File, Vec<&str>, &str)> {
    let open = text
        .find('[')
        .ok_or_else(|| TranslateError::parse(line, format!("bad register {text}")))?;
    let file = File::from_name(text[..open].trim())
        .ok_or_else(|| TranslateError::parse(line, format!("bad register file {text}")))?;

    let bytes = text.as_bytes();
    let mut groups = Vec::new();
    let mut pos = open;
    while pos < bytes.len() && bytes[pos] == b'[' {
        let mut depth = 0;
        let mut end = None;
        for (i, &b) in bytes.iter().enumerate().skip(pos) {
            match b {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| TranslateError::parse(line, "unbalanced brackets"))?;
        groups.push(text[pos + 1..end].trim());
        pos = end + 1;
    }
    Ok((file, groups, text[pos..].trim()))
}

type Addressing = (Option<Dimension>, i32, Option<Indirect>);

fn resolve_groups(line: usize, groups: &[&str]) -> Result<Addressing> {
    match groups {
        [index] => {
            let (index, indirect) = parse_index(line, index)?;
            Ok((None, index, indirect))
        }
        [dim, index] => {
            let (dim_index, dim_indirect) = parse_index(line, dim)?;
            let (index, indirect) = parse_index(line, index)?;
            Ok((
                Some(Dimension {
                    index: dim_index,
                    indirect: dim_indirect,
                }),
                index,
                indirect,
            ))
        }
        _ => Err(TranslateError::parse(line, "bad register addressing")),
    }
}

/// `N`, `ADDR[0].x`, `ADDR[0].x+3` or `ADDR[0].x-1`.
fn parse_index(line: usize, text: &str) -> Result<(i32, Option<Indirect>)> {
    if let Ok(v) = text.parse::<i32>() {
        return Ok((v, None));
    }
    let close = text
        .rfind(']')
        .ok_or_else(|| TranslateError::parse(line, format!("bad index {text}")))?;
    let (reg, offset) = match text[close..].find(['+', '-']) {
        Some(rel) => {
            let at = close + rel;
            let offset = text[at..]
                .replace(' ', "")
                .trim_start_matches('+')
                .parse::<i32>()
                .map_err(|_| TranslateError::parse(line, format!("bad offset {text}")))?;
            (&text[..at], offset)
        }
        None => (text, 0),
    };
    let (file, groups, suffix) = split_register(line, reg.trim())?;
    let index = match groups.as_slice() {
        [i] => parse_u32(line, i)?,
        _ => return Err(TranslateError::parse(line, "bad indirect register")),
    };
    let swizzle = match suffix.strip_prefix('.') {
        Some(s) => parse_swizzle(line, s)?[0],
        None => 0,
    };
    Ok((
        offset,
        Some(Indirect {
            file,
            index,
            swizzle,
        }),
    ))
}

fn component(line: usize, c: char) -> Result<u8> {
    match c {
        'x' => Ok(0),
        'y' => Ok(1),
        'z' => Ok(2),
        'w' => Ok(3),
        _ => Err(TranslateError::parse(line, format!("bad component {c}"))),
    }
}

fn parse_swizzle(line: usize, text: &str) -> Result<[u8; 4]> {
    let comps = text
        .chars()
        .map(|c| component(line, c))
        .collect::<Result<Vec<_>>>()?;
    let last = *comps
        .last()
        .ok_or_else(|| TranslateError::parse(line, "empty swizzle"))?;
    if comps.len() > 4 {
        return Err(TranslateError::parse(line, "swizzle too long"));
    }
    let mut swz = [last; 4];
    swz[..comps.len()].copy_from_slice(&comps);
    Ok(swz)
}

fn parse_writemask(line: usize, text: &str) -> Result<u8> {
    text.chars()
        .try_fold(0u8, |mask, c| Ok(mask | 1 << component(line, c)?))
}

fn parse_u32(line: usize, text: &str) -> Result<u32> {
    text.trim()
        .parse()
        .map_err(|_| TranslateError::parse(line, format!("bad number {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_fragment_shader() {
        let prog = parse(
            "FRAG\n\
             DCL IN[0], GENERIC[0], PERSPECTIVE\n\
             DCL OUT[0], COLOR\n\
             0: MOV OUT[0], IN[0]\n\
             1: END\n",
        )
        .unwrap();
        assert_eq!(prog.processor, ShaderType::Fragment);
        assert_eq!(prog.declarations.len(), 2);
        assert_eq!(
            prog.declarations[0].semantic,
            Some((Semantic::Generic, 0))
        );
        assert_eq!(prog.declarations[0].interp, Interp::Perspective);
        assert_eq!(prog.declarations[1].semantic, Some((Semantic::Color, 0)));
        assert_eq!(prog.instructions.len(), 2);
        assert_eq!(prog.instructions[0].opcode, Opcode::MOV);
        assert_eq!(prog.instructions[0].dst[0].file, File::Output);
        assert_eq!(prog.instructions[0].src[0].file, File::Input);
        assert_eq!(prog.instructions[1].opcode, Opcode::END);
    }

    #[test]
    fn color_semantic_and_interp() {
        let decl = parse_declaration(1, "IN[1], COLOR, COLOR, CENTROID").unwrap();
        assert_eq!(decl.semantic, Some((Semantic::Color, 0)));
        assert_eq!(decl.interp, Interp::Color);
        assert_eq!(decl.location, Location::Centroid);
    }

    #[test]
    fn dimensioned_declarations() {
        let decl = parse_declaration(1, "CONST[1][0..3]").unwrap();
        assert_eq!(decl.dimension, Some(1));
        assert_eq!((decl.first, decl.last), (0, 3));

        let decl = parse_declaration(1, "IN[][0], POSITION").unwrap();
        assert_eq!(decl.dimension, None);
        assert_eq!(decl.semantic, Some((Semantic::Position, 0)));
    }

    #[test]
    fn sampler_views_and_images() {
        let decl = parse_declaration(1, "SVIEW[0], 2D_ARRAY, UINT, UINT, UINT, UINT").unwrap();
        assert_eq!(decl.target, Some(TexTarget::Tex2DArray));
        assert_eq!(decl.return_type, ReturnType::Uint);

        let decl =
            parse_declaration(1, "IMAGE[2], 2D, PIPE_FORMAT_R32G32B32A32_FLOAT, WR").unwrap();
        assert_eq!(decl.target, Some(TexTarget::Tex2D));
        assert_eq!(decl.image_format, Some(VirglFormat::R32G32B32A32_FLOAT));
        assert!(decl.writable);
    }

    #[test]
    fn operands() {
        let inst = parse_instruction(
            1,
            "3: ADD_SAT TEMP[1].xy, -|CONST[1][ADDR[0].x+3].wzyx|, IMM[0].xxxx",
        )
        .unwrap();
        assert!(inst.saturate);
        assert_eq!(inst.dst[0].writemask, 0b0011);
        let src = inst.src[0];
        assert!(src.negate && src.absolute);
        assert_eq!(src.file, File::Constant);
        assert_eq!(src.index, 3);
        assert_eq!(src.dimension.map(|d| d.index), Some(1));
        assert_eq!(
            src.indirect,
            Some(Indirect {
                file: File::Address,
                index: 0,
                swizzle: 0
            })
        );
        assert_eq!(src.swizzle, [3, 2, 1, 0]);
    }

    #[test]
    fn texture_and_labels() {
        let inst =
            parse_instruction(1, "TEX TEMP[0], IN[0].xyyy, SAMP[0], SHADOW2D, IMM[1].xyzz")
                .unwrap();
        assert_eq!(inst.texture, Some(TexTarget::Shadow2D));
        assert_eq!(inst.src.len(), 2);
        assert_eq!(inst.tex_offsets.len(), 1);

        let inst = parse_instruction(1, "7: IF TEMP[0].xxxx :9").unwrap();
        assert_eq!(inst.label, Some(9));
        assert!(inst.dst.is_empty());
        assert_eq!(inst.src[0].swizzle, [0, 0, 0, 0]);
    }

    #[test]
    fn immediates() {
        let imm = parse_immediate(1, "IMM[0] FLT32 {    1.0000,     0.5000,  0x7f800000, 2}")
            .unwrap();
        assert_eq!(imm.ty, ImmType::Float32);
        assert_eq!(imm.float(0), 1.0);
        assert_eq!(imm.float(1), 0.5);
        assert!(imm.float(2).is_infinite());

        let imm = parse_immediate(1, "IMM[1] INT32 {-1, 2, 3, 4}").unwrap();
        assert_eq!(imm.int(0), -1);

        let imm = parse_immediate(1, "IMM[2] FLT64 {1.5, 0}").unwrap();
        assert_eq!(imm.bits[1], (1.5f64.to_bits() >> 32) as u32);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse("FRAG\n0: FROB TEMP[0], IN[0]\n"),
            Err(TranslateError::Parse { line: 2, .. })
        ));
        assert!(parse("BOGUS\n").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn symbolic_properties() {
        let prop = parse_property(1, "GS_OUTPUT_PRIMITIVE TRIANGLE_STRIP").unwrap();
        assert_eq!(prop.name, PropertyName::GsOutputPrim);
        assert_eq!(prop.value, PrimType::TriangleStrip as u32);
    }
}
