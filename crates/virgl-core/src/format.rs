//! Virgl format table.
//!
//! Each guest format maps to a GL internal format / format / type triple, a
//! block layout and a set of capability bits. The table is built once; the
//! renderer narrows the bits further after probing the host (see
//! `virgl-renderer`'s format checks).

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use once_cell::sync::Lazy;

/// Exclusive upper bound on guest format values.
pub const VIRGL_FORMAT_MAX: u32 = 312;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum VirglFormat {
    None = 0,
    B8G8R8A8_UNORM = 1,
    B8G8R8X8_UNORM = 2,
    A8R8G8B8_UNORM = 3,
    X8R8G8B8_UNORM = 4,
    B5G5R5A1_UNORM = 5,
    B4G4R4A4_UNORM = 6,
    B5G6R5_UNORM = 7,
    R10G10B10A2_UNORM = 8,
    L8_UNORM = 9,
    A8_UNORM = 10,
    L8A8_UNORM = 12,
    L16_UNORM = 13,
    Z16_UNORM = 16,
    Z32_UNORM = 17,
    Z32_FLOAT = 18,
    Z24_UNORM_S8_UINT = 19,
    S8_UINT_Z24_UNORM = 20,
    Z24X8_UNORM = 21,
    S8_UINT = 23,
    R32_FLOAT = 28,
    R32G32_FLOAT = 29,
    R32G32B32_FLOAT = 30,
    R32G32B32A32_FLOAT = 31,
    R16_UNORM = 48,
    R16G16_UNORM = 49,
    R16G16B16A16_UNORM = 51,
    R16_SNORM = 56,
    R16G16_SNORM = 57,
    R16G16B16A16_SNORM = 59,
    R8_UNORM = 64,
    R8G8_UNORM = 65,
    R8G8B8_UNORM = 66,
    R8G8B8A8_UNORM = 67,
    R8_SNORM = 74,
    R8G8_SNORM = 75,
    R8G8B8A8_SNORM = 77,
    R16_FLOAT = 91,
    R16G16_FLOAT = 92,
    R16G16B16_FLOAT = 93,
    R16G16B16A16_FLOAT = 94,
    B8G8R8A8_SRGB = 100,
    B8G8R8X8_SRGB = 101,
    R8G8B8A8_SRGB = 104,
    DXT1_RGB = 105,
    DXT1_RGBA = 106,
    DXT3_RGBA = 107,
    DXT5_RGBA = 108,
    RGTC1_UNORM = 113,
    RGTC1_SNORM = 114,
    RGTC2_UNORM = 115,
    RGTC2_SNORM = 116,
    A8B8G8R8_UNORM = 121,
    R11G11B10_FLOAT = 124,
    R9G9B9E5_FLOAT = 125,
    Z32_FLOAT_S8X24_UINT = 126,
    B10G10R10A2_UNORM = 131,
    R8G8B8X8_UNORM = 134,
    R8_UINT = 177,
    R8G8_UINT = 178,
    R8G8B8A8_UINT = 180,
    R8_SINT = 181,
    R8G8_SINT = 182,
    R8G8B8A8_SINT = 184,
    R16_UINT = 185,
    R16G16_UINT = 186,
    R16G16B16A16_UINT = 188,
    R16_SINT = 189,
    R16G16_SINT = 190,
    R16G16B16A16_SINT = 192,
    R32_UINT = 193,
    R32G32_UINT = 194,
    R32G32B32_UINT = 195,
    R32G32B32A32_UINT = 196,
    R32_SINT = 197,
    R32G32_SINT = 198,
    R32G32B32_SINT = 199,
    R32G32B32A32_SINT = 200,
}

impl VirglFormat {
    pub fn from_raw(value: u32) -> Option<Self> {
        <Self as FromPrimitive>::from_u32(value)
    }

    /// Table entry, `None` for formats the host cannot represent.
    pub fn desc(self) -> Option<&'static FormatDesc> {
        FORMAT_INDEX
            .get(self as usize)
            .and_then(|entry| entry.as_ref())
    }
}

bitflags! {
    /// What a format can be used for on the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormatFlags: u32 {
        const SAMPLER = 1 << 0;
        const RENDER = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        const VERTEX = 1 << 3;
        const COMPRESSED = 1 << 4;
        const CAN_TEXTURE_STORAGE = 1 << 5;
        /// Emulated through a swizzled red/rg texture (luminance, alpha).
        const NEED_SWIZZLE = 1 << 6;
        const SRGB = 1 << 7;
        const UINT = 1 << 8;
        const SINT = 1 << 9;
        const HAS_ALPHA = 1 << 10;
        const NORMALIZED = 1 << 11;
    }
}

/// One row of the format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDesc {
    pub format: VirglFormat,
    pub internal_format: u32,
    pub gl_format: u32,
    pub gl_type: u32,
    /// Bytes per block (per texel for uncompressed formats).
    pub block_size: u32,
    pub block_width: u32,
    pub block_height: u32,
    pub components: u32,
    pub flags: FormatFlags,
    /// Texture swizzle applied at sampler-view creation when `NEED_SWIZZLE`.
    pub swizzle: [u32; 4],
}

const NO_SWIZZLE: [u32; 4] = [gl::RED, gl::GREEN, gl::BLUE, gl::ALPHA];

// S3TC enums are extension-only and not part of the core bindings.
const COMPRESSED_RGB_S3TC_DXT1: u32 = 0x83f0;
const COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83f1;
const COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83f2;
const COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83f3;

const COLOR: FormatFlags = FormatFlags::SAMPLER
    .union(FormatFlags::RENDER)
    .union(FormatFlags::CAN_TEXTURE_STORAGE);
const COLOR_A: FormatFlags = COLOR.union(FormatFlags::HAS_ALPHA);
const DEPTH: FormatFlags = FormatFlags::SAMPLER
    .union(FormatFlags::DEPTH_STENCIL)
    .union(FormatFlags::CAN_TEXTURE_STORAGE);
const VTX: FormatFlags = FormatFlags::VERTEX;
const NORM: FormatFlags = FormatFlags::NORMALIZED;

const fn plain(
    format: VirglFormat,
    internal_format: u32,
    gl_format: u32,
    gl_type: u32,
    block_size: u32,
    components: u32,
    flags: FormatFlags,
) -> FormatDesc {
    FormatDesc {
        format,
        internal_format,
        gl_format,
        gl_type,
        block_size,
        block_width: 1,
        block_height: 1,
        components,
        flags,
        swizzle: NO_SWIZZLE,
    }
}

const fn swizzled(
    format: VirglFormat,
    internal_format: u32,
    gl_format: u32,
    block_size: u32,
    flags: FormatFlags,
    swizzle: [u32; 4],
) -> FormatDesc {
    FormatDesc {
        format,
        internal_format,
        gl_format,
        gl_type: gl::UNSIGNED_BYTE,
        block_size,
        block_width: 1,
        block_height: 1,
        components: 1,
        flags: flags.union(FormatFlags::NEED_SWIZZLE),
        swizzle,
    }
}

const fn compressed(format: VirglFormat, internal_format: u32, block_size: u32) -> FormatDesc {
    FormatDesc {
        format,
        internal_format,
        gl_format: gl::RGBA,
        gl_type: gl::UNSIGNED_BYTE,
        block_size,
        block_width: 4,
        block_height: 4,
        components: 4,
        flags: FormatFlags::SAMPLER
            .union(FormatFlags::COMPRESSED)
            .union(FormatFlags::CAN_TEXTURE_STORAGE),
        swizzle: NO_SWIZZLE,
    }
}

use VirglFormat as F;

#[rustfmt::skip]
const FORMATS: &[FormatDesc] = &[
    plain(F::B8G8R8A8_UNORM, gl::RGBA8, gl::BGRA, gl::UNSIGNED_BYTE, 4, 4, COLOR_A.union(NORM)),
    plain(F::B8G8R8X8_UNORM, gl::RGBA8, gl::BGRA, gl::UNSIGNED_BYTE, 4, 4, COLOR.union(NORM)),
    plain(F::A8R8G8B8_UNORM, gl::RGBA8, gl::BGRA, gl::UNSIGNED_INT_8_8_8_8, 4, 4, COLOR_A.union(NORM)),
    plain(F::X8R8G8B8_UNORM, gl::RGBA8, gl::BGRA, gl::UNSIGNED_INT_8_8_8_8, 4, 4, COLOR.union(NORM)),
    plain(F::B5G5R5A1_UNORM, gl::RGB5_A1, gl::BGRA, gl::UNSIGNED_SHORT_1_5_5_5_REV, 2, 4, COLOR_A.union(NORM)),
    plain(F::B4G4R4A4_UNORM, gl::RGBA4, gl::BGRA, gl::UNSIGNED_SHORT_4_4_4_4_REV, 2, 4, COLOR_A.union(NORM)),
    plain(F::B5G6R5_UNORM, gl::RGB565, gl::RGB, gl::UNSIGNED_SHORT_5_6_5, 2, 3, COLOR.union(NORM)),
    plain(F::R10G10B10A2_UNORM, gl::RGB10_A2, gl::RGBA, gl::UNSIGNED_INT_2_10_10_10_REV, 4, 4, COLOR_A.union(VTX).union(NORM)),
    plain(F::B10G10R10A2_UNORM, gl::RGB10_A2, gl::BGRA, gl::UNSIGNED_INT_2_10_10_10_REV, 4, 4, COLOR_A.union(NORM)),
    swizzled(F::L8_UNORM, gl::R8, gl::RED, 1, COLOR, [gl::RED, gl::RED, gl::RED, gl::ONE]),
    swizzled(F::A8_UNORM, gl::R8, gl::RED, 1, COLOR_A, [gl::ZERO, gl::ZERO, gl::ZERO, gl::RED]),
    swizzled(F::L8A8_UNORM, gl::RG8, gl::RG, 2, COLOR_A, [gl::RED, gl::RED, gl::RED, gl::GREEN]),
    swizzled(F::L16_UNORM, gl::R16, gl::RED, 2, COLOR, [gl::RED, gl::RED, gl::RED, gl::ONE]),
    plain(F::Z16_UNORM, gl::DEPTH_COMPONENT16, gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT, 2, 1, DEPTH),
    plain(F::Z32_UNORM, gl::DEPTH_COMPONENT32, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT, 4, 1, DEPTH),
    plain(F::Z32_FLOAT, gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, gl::FLOAT, 4, 1, DEPTH),
    plain(F::Z24_UNORM_S8_UINT, gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8, 4, 2, DEPTH),
    plain(F::S8_UINT_Z24_UNORM, gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8, 4, 2, DEPTH),
    plain(F::Z24X8_UNORM, gl::DEPTH_COMPONENT24, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT, 4, 1, DEPTH),
    plain(F::Z32_FLOAT_S8X24_UINT, gl::DEPTH32F_STENCIL8, gl::DEPTH_STENCIL, gl::FLOAT_32_UNSIGNED_INT_24_8_REV, 8, 2, DEPTH),
    plain(F::S8_UINT, gl::STENCIL_INDEX8, gl::STENCIL_INDEX, gl::UNSIGNED_BYTE, 1, 1, FormatFlags::DEPTH_STENCIL),
    plain(F::R32_FLOAT, gl::R32F, gl::RED, gl::FLOAT, 4, 1, COLOR.union(VTX)),
    plain(F::R32G32_FLOAT, gl::RG32F, gl::RG, gl::FLOAT, 8, 2, COLOR.union(VTX)),
    plain(F::R32G32B32_FLOAT, gl::RGB32F, gl::RGB, gl::FLOAT, 12, 3, FormatFlags::SAMPLER.union(VTX)),
    plain(F::R32G32B32A32_FLOAT, gl::RGBA32F, gl::RGBA, gl::FLOAT, 16, 4, COLOR_A.union(VTX)),
    plain(F::R16_UNORM, gl::R16, gl::RED, gl::UNSIGNED_SHORT, 2, 1, COLOR.union(VTX).union(NORM)),
    plain(F::R16G16_UNORM, gl::RG16, gl::RG, gl::UNSIGNED_SHORT, 4, 2, COLOR.union(VTX).union(NORM)),
    plain(F::R16G16B16A16_UNORM, gl::RGBA16, gl::RGBA, gl::UNSIGNED_SHORT, 8, 4, COLOR_A.union(VTX).union(NORM)),
    plain(F::R16_SNORM, gl::R16_SNORM, gl::RED, gl::SHORT, 2, 1, COLOR.union(VTX).union(NORM)),
    plain(F::R16G16_SNORM, gl::RG16_SNORM, gl::RG, gl::SHORT, 4, 2, COLOR.union(VTX).union(NORM)),
    plain(F::R16G16B16A16_SNORM, gl::RGBA16_SNORM, gl::RGBA, gl::SHORT, 8, 4, COLOR_A.union(VTX).union(NORM)),
    plain(F::R8_UNORM, gl::R8, gl::RED, gl::UNSIGNED_BYTE, 1, 1, COLOR.union(VTX).union(NORM)),
    plain(F::R8G8_UNORM, gl::RG8, gl::RG, gl::UNSIGNED_BYTE, 2, 2, COLOR.union(VTX).union(NORM)),
    plain(F::R8G8B8_UNORM, gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE, 3, 3, FormatFlags::SAMPLER.union(VTX).union(NORM)),
    plain(F::R8G8B8A8_UNORM, gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, COLOR_A.union(VTX).union(NORM)),
    plain(F::R8G8B8X8_UNORM, gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, COLOR.union(NORM)),
    plain(F::A8B8G8R8_UNORM, gl::RGBA8, gl::RGBA, gl::UNSIGNED_INT_8_8_8_8, 4, 4, COLOR_A.union(NORM)),
    plain(F::R8_SNORM, gl::R8_SNORM, gl::RED, gl::BYTE, 1, 1, COLOR.union(VTX).union(NORM)),
    plain(F::R8G8_SNORM, gl::RG8_SNORM, gl::RG, gl::BYTE, 2, 2, COLOR.union(VTX).union(NORM)),
    plain(F::R8G8B8A8_SNORM, gl::RGBA8_SNORM, gl::RGBA, gl::BYTE, 4, 4, COLOR_A.union(VTX).union(NORM)),
    plain(F::R16_FLOAT, gl::R16F, gl::RED, gl::HALF_FLOAT, 2, 1, COLOR.union(VTX)),
    plain(F::R16G16_FLOAT, gl::RG16F, gl::RG, gl::HALF_FLOAT, 4, 2, COLOR.union(VTX)),
    plain(F::R16G16B16_FLOAT, gl::RGB16F, gl::RGB, gl::HALF_FLOAT, 6, 3, FormatFlags::SAMPLER.union(VTX)),
    plain(F::R16G16B16A16_FLOAT, gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT, 8, 4, COLOR_A.union(VTX)),
    plain(F::R11G11B10_FLOAT, gl::R11F_G11F_B10F, gl::RGB, gl::UNSIGNED_INT_10F_11F_11F_REV, 4, 3, COLOR),
    plain(F::R9G9B9E5_FLOAT, gl::RGB9_E5, gl::RGB, gl::UNSIGNED_INT_5_9_9_9_REV, 4, 3, FormatFlags::SAMPLER.union(FormatFlags::CAN_TEXTURE_STORAGE)),
    plain(F::B8G8R8A8_SRGB, gl::SRGB8_ALPHA8, gl::BGRA, gl::UNSIGNED_BYTE, 4, 4, COLOR_A.union(FormatFlags::SRGB).union(NORM)),
    plain(F::B8G8R8X8_SRGB, gl::SRGB8_ALPHA8, gl::BGRA, gl::UNSIGNED_BYTE, 4, 4, COLOR.union(FormatFlags::SRGB).union(NORM)),
    plain(F::R8G8B8A8_SRGB, gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, COLOR_A.union(FormatFlags::SRGB).union(NORM)),
    compressed(F::DXT1_RGB, COMPRESSED_RGB_S3TC_DXT1, 8),
    compressed(F::DXT1_RGBA, COMPRESSED_RGBA_S3TC_DXT1, 8),
    compressed(F::DXT3_RGBA, COMPRESSED_RGBA_S3TC_DXT3, 16),
    compressed(F::DXT5_RGBA, COMPRESSED_RGBA_S3TC_DXT5, 16),
    compressed(F::RGTC1_UNORM, gl::COMPRESSED_RED_RGTC1, 8),
    compressed(F::RGTC1_SNORM, gl::COMPRESSED_SIGNED_RED_RGTC1, 8),
    compressed(F::RGTC2_UNORM, gl::COMPRESSED_RG_RGTC2, 16),
    compressed(F::RGTC2_SNORM, gl::COMPRESSED_SIGNED_RG_RGTC2, 16),
    plain(F::R8_UINT, gl::R8UI, gl::RED_INTEGER, gl::UNSIGNED_BYTE, 1, 1, COLOR.union(VTX).union(FormatFlags::UINT)),
    plain(F::R8G8_UINT, gl::RG8UI, gl::RG_INTEGER, gl::UNSIGNED_BYTE, 2, 2, COLOR.union(VTX).union(FormatFlags::UINT)),
    plain(F::R8G8B8A8_UINT, gl::RGBA8UI, gl::RGBA_INTEGER, gl::UNSIGNED_BYTE, 4, 4, COLOR_A.union(VTX).union(FormatFlags::UINT)),
    plain(F::R8_SINT, gl::R8I, gl::RED_INTEGER, gl::BYTE, 1, 1, COLOR.union(VTX).union(FormatFlags::SINT)),
    plain(F::R8G8_SINT, gl::RG8I, gl::RG_INTEGER, gl::BYTE, 2, 2, COLOR.union(VTX).union(FormatFlags::SINT)),
    plain(F::R8G8B8A8_SINT, gl::RGBA8I, gl::RGBA_INTEGER, gl::BYTE, 4, 4, COLOR_A.union(VTX).union(FormatFlags::SINT)),
    plain(F::R16_UINT, gl::R16UI, gl::RED_INTEGER, gl::UNSIGNED_SHORT, 2, 1, COLOR.union(VTX).union(FormatFlags::UINT)),
    plain(F::R16G16_UINT, gl::RG16UI, gl::RG_INTEGER, gl::UNSIGNED_SHORT, 4, 2, COLOR.union(VTX).union(FormatFlags::UINT)),
    plain(F::R16G16B16A16_UINT, gl::RGBA16UI, gl::RGBA_INTEGER, gl::UNSIGNED_SHORT, 8, 4, COLOR_A.union(VTX).union(FormatFlags::UINT)),
    plain(F::R16_SINT, gl::R16I, gl::RED_INTEGER, gl::SHORT, 2, 1, COLOR.union(VTX).union(FormatFlags::SINT)),
    plain(F::R16G16_SINT, gl::RG16I, gl::RG_INTEGER, gl::SHORT, 4, 2, COLOR.union(VTX).union(FormatFlags::SINT)),
    plain(F::R16G16B16A16_SINT, gl::RGBA16I, gl::RGBA_INTEGER, gl::SHORT, 8, 4, COLOR_A.union(VTX).union(FormatFlags::SINT)),
    plain(F::R32_UINT, gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT, 4, 1, COLOR.union(VTX).union(FormatFlags::UINT)),
    plain(F::R32G32_UINT, gl::RG32UI, gl::RG_INTEGER, gl::UNSIGNED_INT, 8, 2, COLOR.union(VTX).union(FormatFlags::UINT)),
    plain(F::R32G32B32_UINT, gl::RGB32UI, gl::RGB_INTEGER, gl::UNSIGNED_INT, 12, 3, FormatFlags::SAMPLER.union(VTX).union(FormatFlags::UINT)),
    plain(F::R32G32B32A32_UINT, gl::RGBA32UI, gl::RGBA_INTEGER, gl::UNSIGNED_INT, 16, 4, COLOR_A.union(VTX).union(FormatFlags::UINT)),
    plain(F::R32_SINT, gl::R32I, gl::RED_INTEGER, gl::INT, 4, 1, COLOR.union(VTX).union(FormatFlags::SINT)),
    plain(F::R32G32_SINT, gl::RG32I, gl::RG_INTEGER, gl::INT, 8, 2, COLOR.union(VTX).union(FormatFlags::SINT)),
    plain(F::R32G32B32_SINT, gl::RGB32I, gl::RGB_INTEGER, gl::INT, 12, 3, FormatFlags::SAMPLER.union(VTX).union(FormatFlags::SINT)),
    plain(F::R32G32B32A32_SINT, gl::RGBA32I, gl::RGBA_INTEGER, gl::INT, 16, 4, COLOR_A.union(VTX).union(FormatFlags::SINT)),
];

static FORMAT_INDEX: Lazy<Vec<Option<FormatDesc>>> = Lazy::new(|| {
    let mut index = vec![None; VIRGL_FORMAT_MAX as usize];
    for desc in FORMATS {
        index[desc.format as usize] = Some(*desc);
    }
    index
});

/// Look up a raw guest format value.
pub fn lookup(format: u32) -> Option<&'static FormatDesc> {
    FORMAT_INDEX.get(format as usize).and_then(|e| e.as_ref())
}

/// Iterate every format the table knows about.
pub fn all() -> impl Iterator<Item = &'static FormatDesc> {
    FORMATS.iter()
}

impl FormatDesc {
    pub fn is_depth_stencil(&self) -> bool {
        self.flags.contains(FormatFlags::DEPTH_STENCIL)
    }

    pub fn is_renderable(&self) -> bool {
        self.flags
            .intersects(FormatFlags::RENDER | FormatFlags::DEPTH_STENCIL)
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.contains(FormatFlags::COMPRESSED)
    }

    pub fn has_alpha(&self) -> bool {
        self.flags.contains(FormatFlags::HAS_ALPHA)
    }

    pub fn is_integer(&self) -> bool {
        self.flags.intersects(FormatFlags::UINT | FormatFlags::SINT)
    }

    pub fn is_srgb(&self) -> bool {
        self.flags.contains(FormatFlags::SRGB)
    }

    /// Alpha-only formats emulated through a red texture.
    pub fn is_alpha_only(&self) -> bool {
        self.format == VirglFormat::A8_UNORM
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self.gl_format, gl::DEPTH_STENCIL | gl::STENCIL_INDEX)
    }

    pub fn has_depth(&self) -> bool {
        matches!(self.gl_format, gl::DEPTH_STENCIL | gl::DEPTH_COMPONENT)
    }

    pub fn nblocksx(&self, width: u32) -> u32 {
        num::integer::div_ceil(width, self.block_width)
    }

    pub fn nblocksy(&self, height: u32) -> u32 {
        num::integer::div_ceil(height, self.block_height)
    }

    /// Tightly packed row pitch for `width` texels.
    pub fn stride(&self, width: u32) -> u32 {
        self.nblocksx(width) * self.block_size
    }

    /// GL attachment point when bound to a framebuffer.
    pub fn attachment(&self) -> u32 {
        match self.gl_format {
            gl::DEPTH_STENCIL => gl::DEPTH_STENCIL_ATTACHMENT,
            gl::DEPTH_COMPONENT => gl::DEPTH_ATTACHMENT,
            gl::STENCIL_INDEX => gl::STENCIL_ATTACHMENT,
            _ => gl::COLOR_ATTACHMENT0,
        }
    }
}

/// Whether `glCopyImageSubData` may copy between two formats.
///
/// Depth/stencil formats have to match exactly; otherwise the texel (or
/// compressed block) sizes have to agree.
pub fn copy_compatible(src: &FormatDesc, dst: &FormatDesc) -> bool {
    if src.format == dst.format {
        return true;
    }
    if src.is_depth_stencil() || dst.is_depth_stencil() {
        return false;
    }
    if src.is_compressed() && dst.is_compressed() {
        return src.block_size == dst.block_size
            && src.block_width == dst.block_width
            && src.block_height == dst.block_height;
    }
    src.block_size == dst.block_size && !src.is_srgb() && !dst.is_srgb()
}

/// Unpack alignment for a given texel size.
pub fn unpack_alignment(elsize: u32) -> i32 {
    match elsize {
        1 | 3 => 1,
        2 | 6 => 2,
        8 => 8,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup() {
        let desc = lookup(VirglFormat::R8G8B8A8_UNORM as u32).expect("rgba8");
        assert_eq!(desc.internal_format, gl::RGBA8);
        assert_eq!(desc.block_size, 4);
        assert!(desc.is_renderable());
        assert!(lookup(11).is_none());
        assert!(lookup(VIRGL_FORMAT_MAX + 10).is_none());
    }

    #[test]
    fn compressed_blocks() {
        let dxt1 = VirglFormat::DXT1_RGB.desc().expect("dxt1");
        assert!(dxt1.is_compressed());
        assert_eq!(dxt1.nblocksx(10), 3);
        assert_eq!(dxt1.stride(16), 32);
    }

    #[test]
    fn copy_compatibility() {
        let rgba8 = VirglFormat::R8G8B8A8_UNORM.desc().unwrap();
        let r32f = VirglFormat::R32_FLOAT.desc().unwrap();
        let z24 = VirglFormat::Z24X8_UNORM.desc().unwrap();
        let srgb = VirglFormat::R8G8B8A8_SRGB.desc().unwrap();
        assert!(copy_compatible(rgba8, r32f));
        assert!(!copy_compatible(rgba8, z24));
        assert!(!copy_compatible(rgba8, srgb));
    }

    #[test]
    fn alignments() {
        assert_eq!(unpack_alignment(1), 1);
        assert_eq!(unpack_alignment(3), 1);
        assert_eq!(unpack_alignment(6), 2);
        assert_eq!(unpack_alignment(8), 8);
        assert_eq!(unpack_alignment(16), 4);
    }
}
