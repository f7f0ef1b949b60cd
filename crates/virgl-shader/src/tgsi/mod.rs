//! In-memory form of a TGSI program.
//!
//! The guest ships shaders as TGSI text; [`parse`] turns that into a
//! [`Program`] which the translator walks. Everything here is plain data.

mod opcode;
mod parse;

pub use opcode::{OpType, Opcode};
pub use parse::parse;

use virgl_core::pipe::ShaderType;
use virgl_core::VirglFormat;

/// Register files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum File {
    Constant,
    Input,
    Output,
    Temporary,
    Sampler,
    SamplerView,
    Address,
    Immediate,
    SystemValue,
    Image,
    Buffer,
    Memory,
}

impl File {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "CONST" => File::Constant,
            "IN" => File::Input,
            "OUT" => File::Output,
            "TEMP" => File::Temporary,
            "SAMP" => File::Sampler,
            "SVIEW" => File::SamplerView,
            "ADDR" => File::Address,
            "IMM" => File::Immediate,
            "SV" => File::SystemValue,
            "IMAGE" => File::Image,
            "BUFFER" => File::Buffer,
            "MEMORY" => File::Memory,
            _ => return None,
        })
    }

    /// Bit used in the indirect-access masks.
    pub fn bit(self) -> u32 {
        1 << self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Color,
    BColor,
    Fog,
    PSize,
    Generic,
    Normal,
    Face,
    EdgeFlag,
    PrimId,
    InstanceId,
    VertexId,
    Stencil,
    ClipDist,
    ClipVertex,
    GridSize,
    BlockId,
    ThreadId,
    TexCoord,
    PCoord,
    ViewportIndex,
    Layer,
    SampleId,
    SamplePos,
    SampleMask,
    InvocationId,
    Patch,
    TessCoord,
    TessOuter,
    TessInner,
    VerticesIn,
    HelperInvocation,
}

impl Semantic {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "POSITION" => Semantic::Position,
            "COLOR" => Semantic::Color,
            "BCOLOR" => Semantic::BColor,
            "FOG" => Semantic::Fog,
            "PSIZE" => Semantic::PSize,
            "GENERIC" => Semantic::Generic,
            "NORMAL" => Semantic::Normal,
            "FACE" => Semantic::Face,
            "EDGEFLAG" => Semantic::EdgeFlag,
            "PRIMID" => Semantic::PrimId,
            "INSTANCEID" => Semantic::InstanceId,
            "VERTEXID" => Semantic::VertexId,
            "STENCIL" => Semantic::Stencil,
            "CLIPDIST" => Semantic::ClipDist,
            "CLIPVERTEX" => Semantic::ClipVertex,
            "GRID_SIZE" => Semantic::GridSize,
            "BLOCK_ID" => Semantic::BlockId,
            "THREAD_ID" => Semantic::ThreadId,
            "TEXCOORD" => Semantic::TexCoord,
            "PCOORD" => Semantic::PCoord,
            "VIEWPORT_INDEX" => Semantic::ViewportIndex,
            "LAYER" => Semantic::Layer,
            "SAMPLEID" => Semantic::SampleId,
            "SAMPLEPOS" => Semantic::SamplePos,
            "SAMPLEMASK" => Semantic::SampleMask,
            "INVOCATIONID" => Semantic::InvocationId,
            "PATCH" => Semantic::Patch,
            "TESSCOORD" => Semantic::TessCoord,
            "TESSOUTER" => Semantic::TessOuter,
            "TESSINNER" => Semantic::TessInner,
            "VERTICESIN" => Semantic::VerticesIn,
            "HELPER_INVOCATION" => Semantic::HelperInvocation,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interp {
    #[default]
    Constant,
    Linear,
    Perspective,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Location {
    #[default]
    Center,
    Centroid,
    Sample,
}

/// TGSI texture targets, used by sampler views, images and texture opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexTarget {
    Buffer,
    Tex1D,
    Tex2D,
    Tex3D,
    Cube,
    Rect,
    Shadow1D,
    Shadow2D,
    ShadowRect,
    Tex1DArray,
    Tex2DArray,
    Shadow1DArray,
    Shadow2DArray,
    ShadowCube,
    Tex2DMsaa,
    Tex2DArrayMsaa,
    CubeArray,
    ShadowCubeArray,
}

impl TexTarget {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "BUFFER" => TexTarget::Buffer,
            "1D" => TexTarget::Tex1D,
            "2D" => TexTarget::Tex2D,
            "3D" => TexTarget::Tex3D,
            "CUBE" => TexTarget::Cube,
            "RECT" => TexTarget::Rect,
            "SHADOW1D" => TexTarget::Shadow1D,
            "SHADOW2D" => TexTarget::Shadow2D,
            "SHADOWRECT" => TexTarget::ShadowRect,
            "1D_ARRAY" => TexTarget::Tex1DArray,
            "2D_ARRAY" => TexTarget::Tex2DArray,
            "SHADOW1D_ARRAY" => TexTarget::Shadow1DArray,
            "SHADOW2D_ARRAY" => TexTarget::Shadow2DArray,
            "SHADOWCUBE" => TexTarget::ShadowCube,
            "2D_MSAA" => TexTarget::Tex2DMsaa,
            "2D_ARRAY_MSAA" => TexTarget::Tex2DArrayMsaa,
            "CUBE_ARRAY" => TexTarget::CubeArray,
            "SHADOWCUBE_ARRAY" => TexTarget::ShadowCubeArray,
            _ => return None,
        })
    }

    pub fn is_shadow(self) -> bool {
        matches!(
            self,
            TexTarget::Shadow1D
                | TexTarget::Shadow2D
                | TexTarget::ShadowRect
                | TexTarget::Shadow1DArray
                | TexTarget::Shadow2DArray
                | TexTarget::ShadowCube
                | TexTarget::ShadowCubeArray
        )
    }
}

/// Component type a sampler view returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnType {
    Unorm,
    Snorm,
    Sint,
    Uint,
    #[default]
    Float,
}

impl ReturnType {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "UNORM" => ReturnType::Unorm,
            "SNORM" => ReturnType::Snorm,
            "SINT" => ReturnType::Sint,
            "UINT" => ReturnType::Uint,
            "FLOAT" => ReturnType::Float,
            _ => return None,
        })
    }
}

/// Immediate data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmType {
    Float32,
    Uint32,
    Int32,
    Float64,
}

/// Four raw 32-bit words; interpretation follows `ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Immediate {
    pub ty: ImmType,
    pub bits: [u32; 4],
}

impl Immediate {
    pub fn float(self, chan: usize) -> f32 {
        f32::from_bits(self.bits[chan & 3])
    }

    pub fn uint(self, chan: usize) -> u32 {
        self.bits[chan & 3]
    }

    pub fn int(self, chan: usize) -> i32 {
        self.bits[chan & 3] as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyName {
    FsCoordOrigin,
    FsCoordPixelCenter,
    FsColor0WritesAllCbufs,
    FsEarlyDepthStencil,
    GsInputPrim,
    GsOutputPrim,
    GsMaxOutputVertices,
    GsInvocations,
    NumClipDistEnabled,
    NumCullDistEnabled,
    TcsVerticesOut,
    TesPrimMode,
    TesSpacing,
    TesVertexOrderCw,
    TesPointMode,
    CsFixedBlockWidth,
    CsFixedBlockHeight,
    CsFixedBlockDepth,
}

impl PropertyName {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "FS_COORD_ORIGIN" => PropertyName::FsCoordOrigin,
            "FS_COORD_PIXEL_CENTER" => PropertyName::FsCoordPixelCenter,
            "FS_COLOR0_WRITES_ALL_CBUFS" => PropertyName::FsColor0WritesAllCbufs,
            "FS_EARLY_DEPTH_STENCIL" => PropertyName::FsEarlyDepthStencil,
            "GS_INPUT_PRIMITIVE" => PropertyName::GsInputPrim,
            "GS_OUTPUT_PRIMITIVE" => PropertyName::GsOutputPrim,
            "GS_MAX_OUTPUT_VERTICES" => PropertyName::GsMaxOutputVertices,
            "GS_INVOCATIONS" => PropertyName::GsInvocations,
            "NUM_CLIPDIST_ENABLED" => PropertyName::NumClipDistEnabled,
            "NUM_CULLDIST_ENABLED" => PropertyName::NumCullDistEnabled,
            "TCS_VERTICES_OUT" => PropertyName::TcsVerticesOut,
            "TES_PRIM_MODE" => PropertyName::TesPrimMode,
            "TES_SPACING" => PropertyName::TesSpacing,
            "TES_VERTEX_ORDER_CW" => PropertyName::TesVertexOrderCw,
            "TES_POINT_MODE" => PropertyName::TesPointMode,
            "CS_FIXED_BLOCK_WIDTH" => PropertyName::CsFixedBlockWidth,
            "CS_FIXED_BLOCK_HEIGHT" => PropertyName::CsFixedBlockHeight,
            "CS_FIXED_BLOCK_DEPTH" => PropertyName::CsFixedBlockDepth,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    pub name: PropertyName,
    pub value: u32,
}

/// `DCL FILE[first..last]` plus whatever qualifiers follow.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub file: File,
    pub first: u32,
    pub last: u32,
    /// Second-dimension index (`CONST[1][0..3]`), 0 when absent.
    pub dimension: Option<u32>,
    pub semantic: Option<(Semantic, u32)>,
    pub interp: Interp,
    pub location: Location,
    pub array_id: u32,
    pub invariant: bool,
    /// Sampler-view or image target.
    pub target: Option<TexTarget>,
    pub return_type: ReturnType,
    pub image_format: Option<VirglFormat>,
    pub writable: bool,
    pub atomic: bool,
    pub shared: bool,
}

impl Declaration {
    pub fn new(file: File, first: u32, last: u32) -> Self {
        Self {
            file,
            first,
            last,
            dimension: None,
            semantic: None,
            interp: Interp::Constant,
            location: Location::Center,
            array_id: 0,
            invariant: false,
            target: None,
            return_type: ReturnType::Float,
            image_format: None,
            writable: false,
            atomic: false,
            shared: false,
        }
    }
}

/// `ADDR[n].c` used as an indirect index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indirect {
    pub file: File,
    pub index: u32,
    pub swizzle: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub index: i32,
    pub indirect: Option<Indirect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcRegister {
    pub file: File,
    pub index: i32,
    pub indirect: Option<Indirect>,
    pub dimension: Option<Dimension>,
    pub swizzle: [u8; 4],
    pub negate: bool,
    pub absolute: bool,
}

impl SrcRegister {
    pub fn new(file: File, index: i32) -> Self {
        Self {
            file,
            index,
            indirect: None,
            dimension: None,
            swizzle: [0, 1, 2, 3],
            negate: false,
            absolute: false,
        }
    }

    pub fn is_identity_swizzle(&self) -> bool {
        self.swizzle == [0, 1, 2, 3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstRegister {
    pub file: File,
    pub index: i32,
    pub indirect: Option<Indirect>,
    pub dimension: Option<Dimension>,
    pub writemask: u8,
}

pub const WRITEMASK_XYZW: u8 = 0xf;

/// One texture offset operand; only the first three swizzles matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexOffset {
    pub file: File,
    pub index: i32,
    pub swizzle: [u8; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub saturate: bool,
    pub precise: bool,
    pub dst: Vec<DstRegister>,
    pub src: Vec<SrcRegister>,
    pub texture: Option<TexTarget>,
    pub tex_offsets: Vec<TexOffset>,
    /// Format named by image LOAD/STORE/atomics.
    pub memory_format: Option<VirglFormat>,
    pub label: Option<u32>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            saturate: false,
            precise: false,
            dst: Vec::new(),
            src: Vec::new(),
            texture: None,
            tex_offsets: Vec::new(),
            memory_format: None,
            label: None,
        }
    }
}

/// A whole parsed shader.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub processor: ShaderType,
    pub properties: Vec<Property>,
    pub declarations: Vec<Declaration>,
    pub immediates: Vec<Immediate>,
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Files accessed with an indirect register index.
    pub fn indirect_files(&self) -> u32 {
        let mut mask = 0;
        for inst in &self.instructions {
            for src in &inst.src {
                if src.indirect.is_some() {
                    mask |= src.file.bit();
                }
            }
            for dst in &inst.dst {
                if dst.indirect.is_some() {
                    mask |= dst.file.bit();
                }
            }
        }
        mask
    }

    /// Files accessed with an indirect second dimension.
    pub fn dimension_indirect_files(&self) -> u32 {
        let mut mask = 0;
        for inst in &self.instructions {
            for src in &inst.src {
                if src.dimension.is_some_and(|d| d.indirect.is_some()) {
                    mask |= src.file.bit();
                }
            }
            for dst in &inst.dst {
                if dst.dimension.is_some_and(|d| d.indirect.is_some()) {
                    mask |= dst.file.bit();
                }
            }
        }
        mask
    }
}
