//! Gallium pipe enums and bit sets as the guest encodes them.
//!
//! Raw values arrive as `u32` from the decoder; use the `from_raw` helpers to
//! turn them into typed values. Out-of-range values return `None` and the
//! caller reports the matching context error.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

macro_rules! from_raw {
    ($ty:ty) => {
        impl $ty {
            /// Decode a guest value, `None` when out of range.
            pub fn from_raw(value: u32) -> Option<Self> {
                <Self as FromPrimitive>::from_u32(value)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum TextureTarget {
    Buffer = 0,
    Texture1D = 1,
    Texture2D = 2,
    Texture3D = 3,
    Cube = 4,
    Rect = 5,
    Texture1DArray = 6,
    Texture2DArray = 7,
    CubeArray = 8,
}
from_raw!(TextureTarget);

/// Number of texture targets; anything at or above is invalid.
pub const MAX_TEXTURE_TYPES: u32 = 9;

impl TextureTarget {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::Texture1DArray | Self::Texture2DArray | Self::CubeArray
        )
    }

    pub fn is_cube(self) -> bool {
        matches!(self, Self::Cube | Self::CubeArray)
    }

    /// GL texture target for this pipe target. Multisampled 2D targets map to
    /// the multisample variants.
    pub fn to_gl(self, nr_samples: u32) -> u32 {
        match self {
            Self::Buffer => gl::TEXTURE_BUFFER,
            Self::Texture1D => gl::TEXTURE_1D,
            Self::Texture2D if nr_samples > 0 => gl::TEXTURE_2D_MULTISAMPLE,
            Self::Texture2D => gl::TEXTURE_2D,
            Self::Texture3D => gl::TEXTURE_3D,
            Self::Cube => gl::TEXTURE_CUBE_MAP,
            Self::Rect => gl::TEXTURE_RECTANGLE,
            Self::Texture1DArray => gl::TEXTURE_1D_ARRAY,
            Self::Texture2DArray if nr_samples > 0 => gl::TEXTURE_2D_MULTISAMPLE_ARRAY,
            Self::Texture2DArray => gl::TEXTURE_2D_ARRAY,
            Self::CubeArray => gl::TEXTURE_CUBE_MAP_ARRAY,
        }
    }
}

bitflags! {
    /// `VIRGL_BIND_*` usage flags of a resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BindFlags: u32 {
        const DEPTH_STENCIL = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const SAMPLER_VIEW = 1 << 3;
        const VERTEX_BUFFER = 1 << 4;
        const INDEX_BUFFER = 1 << 5;
        const CONSTANT_BUFFER = 1 << 6;
        const DISPLAY_TARGET = 1 << 7;
        const COMMAND_ARGS = 1 << 8;
        const STREAM_OUTPUT = 1 << 11;
        const SHADER_BUFFER = 1 << 14;
        const QUERY_BUFFER = 1 << 15;
        const CURSOR = 1 << 16;
        const CUSTOM = 1 << 17;
        const SCANOUT = 1 << 18;
    }
}

bitflags! {
    /// Resource creation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        /// Row 0 is the top of the image (window-system orientation).
        const Y_0_TOP = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum TransferDirection {
    ToHost = 0,
    FromHost = 1,
}
from_raw!(TransferDirection);

// ---------------------------------------------------------------------------
// Shaders & primitives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
#[repr(u32)]
pub enum ShaderType {
    Vertex = 0,
    Fragment = 1,
    Geometry = 2,
    TessCtrl = 3,
    TessEval = 4,
    Compute = 5,
}
from_raw!(ShaderType);

/// Number of shader stages.
pub const SHADER_TYPES: usize = 6;
/// Number of graphics stages (everything but compute).
pub const GRAPHICS_SHADER_TYPES: usize = 5;

impl ShaderType {
    pub const ALL: [ShaderType; SHADER_TYPES] = [
        Self::Vertex,
        Self::Fragment,
        Self::Geometry,
        Self::TessCtrl,
        Self::TessEval,
        Self::Compute,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn gl_shader_type(self) -> u32 {
        match self {
            Self::Vertex => gl::VERTEX_SHADER,
            Self::Fragment => gl::FRAGMENT_SHADER,
            Self::Geometry => gl::GEOMETRY_SHADER,
            Self::TessCtrl => gl::TESS_CONTROL_SHADER,
            Self::TessEval => gl::TESS_EVALUATION_SHADER,
            Self::Compute => gl::COMPUTE_SHADER,
        }
    }

    /// Uniform-name prefix used by the generated GLSL for this stage.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Vertex => "vs",
            Self::Fragment => "fs",
            Self::Geometry => "gs",
            Self::TessCtrl => "tc",
            Self::TessEval => "te",
            Self::Compute => "cs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum PrimType {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
    Quads = 7,
    QuadStrip = 8,
    Polygon = 9,
    LinesAdjacency = 10,
    LineStripAdjacency = 11,
    TrianglesAdjacency = 12,
    TriangleStripAdjacency = 13,
    Patches = 14,
}
from_raw!(PrimType);

impl PrimType {
    pub fn to_gl(self) -> u32 {
        match self {
            Self::Points => gl::POINTS,
            Self::Lines => gl::LINES,
            Self::LineLoop => gl::LINE_LOOP,
            Self::LineStrip => gl::LINE_STRIP,
            Self::Triangles => gl::TRIANGLES,
            Self::TriangleStrip => gl::TRIANGLE_STRIP,
            Self::TriangleFan => gl::TRIANGLE_FAN,
            // compatibility-only primitives keep their legacy enum values
            Self::Quads => 0x0007,
            Self::QuadStrip => 0x0008,
            Self::Polygon => 0x0009,
            Self::LinesAdjacency => gl::LINES_ADJACENCY,
            Self::LineStripAdjacency => gl::LINE_STRIP_ADJACENCY,
            Self::TrianglesAdjacency => gl::TRIANGLES_ADJACENCY,
            Self::TriangleStripAdjacency => gl::TRIANGLE_STRIP_ADJACENCY,
            Self::Patches => gl::PATCHES,
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed-function state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum BlendFactor {
    One = 0x01,
    SrcColor = 0x02,
    SrcAlpha = 0x03,
    DstAlpha = 0x04,
    DstColor = 0x05,
    SrcAlphaSaturate = 0x06,
    ConstColor = 0x07,
    ConstAlpha = 0x08,
    Src1Color = 0x09,
    Src1Alpha = 0x0a,
    Zero = 0x11,
    InvSrcColor = 0x12,
    InvSrcAlpha = 0x13,
    InvDstAlpha = 0x14,
    InvDstColor = 0x15,
    InvConstColor = 0x17,
    InvConstAlpha = 0x18,
    InvSrc1Color = 0x19,
    InvSrc1Alpha = 0x1a,
}
from_raw!(BlendFactor);

impl BlendFactor {
    pub fn to_gl(self) -> u32 {
        match self {
            Self::One => gl::ONE,
            Self::SrcColor => gl::SRC_COLOR,
            Self::SrcAlpha => gl::SRC_ALPHA,
            Self::DstAlpha => gl::DST_ALPHA,
            Self::DstColor => gl::DST_COLOR,
            Self::SrcAlphaSaturate => gl::SRC_ALPHA_SATURATE,
            Self::ConstColor => gl::CONSTANT_COLOR,
            Self::ConstAlpha => gl::CONSTANT_ALPHA,
            Self::Src1Color => gl::SRC1_COLOR,
            Self::Src1Alpha => gl::SRC1_ALPHA,
            Self::Zero => gl::ZERO,
            Self::InvSrcColor => gl::ONE_MINUS_SRC_COLOR,
            Self::InvSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
            Self::InvDstAlpha => gl::ONE_MINUS_DST_ALPHA,
            Self::InvDstColor => gl::ONE_MINUS_DST_COLOR,
            Self::InvConstColor => gl::ONE_MINUS_CONSTANT_COLOR,
            Self::InvConstAlpha => gl::ONE_MINUS_CONSTANT_ALPHA,
            Self::InvSrc1Color => gl::ONE_MINUS_SRC1_COLOR,
            Self::InvSrc1Alpha => gl::ONE_MINUS_SRC1_ALPHA,
        }
    }

    /// True for the factors that read the second fragment output.
    pub fn is_dual_source(self) -> bool {
        matches!(
            self,
            Self::Src1Color | Self::Src1Alpha | Self::InvSrc1Color | Self::InvSrc1Alpha
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum BlendFunc {
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
}
from_raw!(BlendFunc);

impl BlendFunc {
    pub fn to_gl(self) -> u32 {
        match self {
            Self::Add => gl::FUNC_ADD,
            Self::Subtract => gl::FUNC_SUBTRACT,
            Self::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
            Self::Min => gl::MIN,
            Self::Max => gl::MAX,
        }
    }
}

/// Depth, stencil, alpha and sampler comparison functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum CompareFunc {
    Never = 0,
    Less = 1,
    Equal = 2,
    Lequal = 3,
    Greater = 4,
    Notequal = 5,
    Gequal = 6,
    #[default]
    Always = 7,
}
from_raw!(CompareFunc);

impl CompareFunc {
    pub fn to_gl(self) -> u32 {
        gl::NEVER + self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum StencilOp {
    #[default]
    Keep = 0,
    Zero = 1,
    Replace = 2,
    Incr = 3,
    Decr = 4,
    IncrWrap = 5,
    DecrWrap = 6,
    Invert = 7,
}
from_raw!(StencilOp);

impl StencilOp {
    pub fn to_gl(self) -> u32 {
        match self {
            Self::Keep => gl::KEEP,
            Self::Zero => gl::ZERO,
            Self::Replace => gl::REPLACE,
            Self::Incr => gl::INCR,
            Self::Decr => gl::DECR,
            Self::IncrWrap => gl::INCR_WRAP,
            Self::DecrWrap => gl::DECR_WRAP,
            Self::Invert => gl::INVERT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum TexWrap {
    #[default]
    Repeat = 0,
    Clamp = 1,
    ClampToEdge = 2,
    ClampToBorder = 3,
    MirrorRepeat = 4,
    MirrorClamp = 5,
    MirrorClampToEdge = 6,
    MirrorClampToBorder = 7,
}
from_raw!(TexWrap);

impl TexWrap {
    pub fn to_gl(self) -> u32 {
        match self {
            Self::Repeat => gl::REPEAT,
            Self::Clamp | Self::ClampToEdge => gl::CLAMP_TO_EDGE,
            Self::ClampToBorder => gl::CLAMP_TO_BORDER,
            Self::MirrorRepeat => gl::MIRRORED_REPEAT,
            // GL_MIRROR_CLAMP_TO_EDGE
            Self::MirrorClamp | Self::MirrorClampToEdge | Self::MirrorClampToBorder => 0x8743,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum TexFilter {
    #[default]
    Nearest = 0,
    Linear = 1,
}
from_raw!(TexFilter);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum TexMipFilter {
    Nearest = 0,
    Linear = 1,
    #[default]
    None = 2,
}
from_raw!(TexMipFilter);

/// GL minification filter for an image filter + mip filter pair.
pub fn min_filter_to_gl(filter: TexFilter, mip: TexMipFilter) -> u32 {
    match (filter, mip) {
        (TexFilter::Nearest, TexMipFilter::None) => gl::NEAREST,
        (TexFilter::Linear, TexMipFilter::None) => gl::LINEAR,
        (TexFilter::Nearest, TexMipFilter::Nearest) => gl::NEAREST_MIPMAP_NEAREST,
        (TexFilter::Linear, TexMipFilter::Nearest) => gl::LINEAR_MIPMAP_NEAREST,
        (TexFilter::Nearest, TexMipFilter::Linear) => gl::NEAREST_MIPMAP_LINEAR,
        (TexFilter::Linear, TexMipFilter::Linear) => gl::LINEAR_MIPMAP_LINEAR,
    }
}

pub fn mag_filter_to_gl(filter: TexFilter) -> u32 {
    match filter {
        TexFilter::Nearest => gl::NEAREST,
        TexFilter::Linear => gl::LINEAR,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum PolygonMode {
    #[default]
    Fill = 0,
    Line = 1,
    Point = 2,
}
from_raw!(PolygonMode);

impl PolygonMode {
    pub fn to_gl(self) -> u32 {
        match self {
            Self::Fill => gl::FILL,
            Self::Line => gl::LINE,
            Self::Point => gl::POINT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum CullFace {
    #[default]
    None = 0,
    Front = 1,
    Back = 2,
    FrontAndBack = 3,
}
from_raw!(CullFace);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum Swizzle {
    #[default]
    Red = 0,
    Green = 1,
    Blue = 2,
    Alpha = 3,
    Zero = 4,
    One = 5,
}
from_raw!(Swizzle);

impl Swizzle {
    pub fn to_gl(self) -> u32 {
        match self {
            Self::Red => gl::RED,
            Self::Green => gl::GREEN,
            Self::Blue => gl::BLUE,
            Self::Alpha => gl::ALPHA,
            Self::Zero => gl::ZERO,
            Self::One => gl::ONE,
        }
    }
}

/// Logic op; GL values are `GL_CLEAR + op`.
pub fn logic_op_to_gl(op: u32) -> u32 {
    gl::CLEAR + (op & 0xf)
}

bitflags! {
    /// `PIPE_CLEAR_*` buffers for clears.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        const DEPTH = 1 << 0;
        const STENCIL = 1 << 1;
        const COLOR0 = 1 << 2;
        const COLOR1 = 1 << 3;
        const COLOR2 = 1 << 4;
        const COLOR3 = 1 << 5;
        const COLOR4 = 1 << 6;
        const COLOR5 = 1 << 7;
        const COLOR6 = 1 << 8;
        const COLOR7 = 1 << 9;
        const COLOR = 0xff << 2;
        const DEPTHSTENCIL = Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

bitflags! {
    /// `PIPE_BARRIER_*` memory barrier bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BarrierFlags: u32 {
        const MAPPED_BUFFER = 1 << 0;
        const SHADER_BUFFER = 1 << 1;
        const QUERY_BUFFER = 1 << 2;
        const VERTEX_BUFFER = 1 << 3;
        const INDEX_BUFFER = 1 << 4;
        const CONSTANT_BUFFER = 1 << 5;
        const INDIRECT_BUFFER = 1 << 6;
        const TEXTURE = 1 << 7;
        const IMAGE = 1 << 8;
        const FRAMEBUFFER = 1 << 9;
        const STREAMOUT_BUFFER = 1 << 10;
        const GLOBAL_BUFFER = 1 << 11;
        const ALL = (1 << 12) - 1;
    }
}

impl BarrierFlags {
    /// GL `glMemoryBarrier` bits matching these pipe barriers.
    pub fn to_gl(self) -> u32 {
        if self.contains(Self::ALL) {
            return gl::ALL_BARRIER_BITS;
        }
        let map = [
            (Self::VERTEX_BUFFER, gl::VERTEX_ATTRIB_ARRAY_BARRIER_BIT),
            (Self::INDEX_BUFFER, gl::ELEMENT_ARRAY_BARRIER_BIT),
            (Self::CONSTANT_BUFFER, gl::UNIFORM_BARRIER_BIT),
            (Self::TEXTURE, gl::TEXTURE_FETCH_BARRIER_BIT | gl::PIXEL_BUFFER_BARRIER_BIT),
            (Self::IMAGE, gl::SHADER_IMAGE_ACCESS_BARRIER_BIT),
            (Self::INDIRECT_BUFFER, gl::COMMAND_BARRIER_BIT),
            (Self::MAPPED_BUFFER, gl::BUFFER_UPDATE_BARRIER_BIT),
            (Self::FRAMEBUFFER, gl::FRAMEBUFFER_BARRIER_BIT),
            (Self::STREAMOUT_BUFFER, gl::TRANSFORM_FEEDBACK_BARRIER_BIT),
            (Self::SHADER_BUFFER, gl::SHADER_STORAGE_BARRIER_BIT),
            (Self::QUERY_BUFFER, gl::QUERY_BUFFER_BARRIER_BIT),
        ];
        map.iter()
            .filter(|(pipe, _)| self.intersects(*pipe))
            .fold(0, |acc, (_, bits)| acc | bits)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum QueryType {
    OcclusionCounter = 0,
    OcclusionPredicate = 1,
    Timestamp = 2,
    TimestampDisjoint = 3,
    TimeElapsed = 4,
    PrimitivesGenerated = 5,
    PrimitivesEmitted = 6,
    SoStatistics = 7,
    SoOverflowPredicate = 8,
    SoOverflowAnyPredicate = 9,
    GpuFinished = 10,
    PipelineStatistics = 11,
    OcclusionPredicateConservative = 12,
}
from_raw!(QueryType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum RenderCondMode {
    Wait = 0,
    NoWait = 1,
    ByRegionWait = 2,
    ByRegionNoWait = 3,
}
from_raw!(RenderCondMode);

// ---------------------------------------------------------------------------
// Object namespaces
// ---------------------------------------------------------------------------

/// `VIRGL_OBJECT_*` namespaces; handles are unique within one namespace of a
/// context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum ObjectType {
    Null = 0,
    Blend = 1,
    Rasterizer = 2,
    Dsa = 3,
    Shader = 4,
    VertexElements = 5,
    SamplerView = 6,
    SamplerState = 7,
    Surface = 8,
    Query = 9,
    StreamoutTarget = 10,
}
from_raw!(ObjectType);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_round_into_enums() {
        assert_eq!(TextureTarget::from_raw(7), Some(TextureTarget::Texture2DArray));
        assert_eq!(TextureTarget::from_raw(MAX_TEXTURE_TYPES), None);
        assert_eq!(BlendFactor::from_raw(0x14), Some(BlendFactor::InvDstAlpha));
        assert_eq!(BlendFactor::from_raw(0x16), None);
        assert_eq!(ShaderType::from_raw(5), Some(ShaderType::Compute));
    }

    #[test]
    fn compare_funcs_follow_gl_order() {
        assert_eq!(CompareFunc::Never.to_gl(), gl::NEVER);
        assert_eq!(CompareFunc::Gequal.to_gl(), gl::GEQUAL);
        assert_eq!(CompareFunc::Always.to_gl(), gl::ALWAYS);
    }

    #[test]
    fn multisample_targets() {
        assert_eq!(TextureTarget::Texture2D.to_gl(4), gl::TEXTURE_2D_MULTISAMPLE);
        assert_eq!(TextureTarget::Texture2D.to_gl(0), gl::TEXTURE_2D);
    }

    #[test]
    fn barrier_bits() {
        let bits = (BarrierFlags::IMAGE | BarrierFlags::SHADER_BUFFER).to_gl();
        assert_eq!(
            bits,
            gl::SHADER_IMAGE_ACCESS_BARRIER_BIT | gl::SHADER_STORAGE_BARRIER_BIT
        );
        assert_eq!(BarrierFlags::ALL.to_gl(), gl::ALL_BARRIER_BITS);
    }
}
