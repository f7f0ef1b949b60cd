//! GLSL text builder and extension requirements.

use bitflags::bitflags;

bitflags! {
    /// Extensions (and the GLSL versions implied by them) a translated
    /// shader needs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderReq: u32 {
        const SAMPLER_RECT = 1 << 0;
        const CUBE_ARRAY = 1 << 1;
        const INTS = 1 << 2;
        const SAMPLER_MS = 1 << 3;
        const INSTANCE_ID = 1 << 4;
        const LODQ = 1 << 5;
        const TXQ_LEVELS = 1 << 6;
        const TG4 = 1 << 7;
        const VIEWPORT_IDX = 1 << 8;
        const STENCIL_EXPORT = 1 << 9;
        const LAYER = 1 << 10;
        const SAMPLE_SHADING = 1 << 11;
        const GPU_SHADER5 = 1 << 12;
        const DERIVATIVE_CONTROL = 1 << 13;
        const FP64 = 1 << 14;
        const IMAGE_LOAD_STORE = 1 << 15;
        const ES31_COMPAT = 1 << 16;
        const IMAGE_SIZE = 1 << 17;
        const TXQS = 1 << 18;
        const FBFETCH = 1 << 19;
        const SHADER_CLOCK = 1 << 20;
        /// GLES only: point size output from geometry/tessellation stages.
        const PSIZE = 1 << 21;
    }
}

/// Desktop `#extension` line for each requirement bit, in bit order.
pub(crate) const REQ_EXTENSIONS: [(ShaderReq, &str); 21] = [
    (ShaderReq::SAMPLER_RECT, "GL_ARB_texture_rectangle"),
    (ShaderReq::CUBE_ARRAY, "GL_ARB_texture_cube_map_array"),
    (ShaderReq::INTS, "GL_ARB_shader_bit_encoding"),
    (ShaderReq::SAMPLER_MS, "GL_ARB_texture_multisample"),
    (ShaderReq::INSTANCE_ID, "GL_ARB_draw_instanced"),
    (ShaderReq::LODQ, "GL_ARB_texture_query_lod"),
    (ShaderReq::TXQ_LEVELS, "GL_ARB_texture_query_levels"),
    (ShaderReq::TG4, "GL_ARB_texture_gather"),
    (ShaderReq::VIEWPORT_IDX, "GL_ARB_viewport_array"),
    (ShaderReq::STENCIL_EXPORT, "GL_ARB_shader_stencil_export"),
    (ShaderReq::LAYER, "GL_ARB_fragment_layer_viewport"),
    (ShaderReq::SAMPLE_SHADING, "GL_ARB_sample_shading"),
    (ShaderReq::GPU_SHADER5, "GL_ARB_gpu_shader5"),
    (ShaderReq::DERIVATIVE_CONTROL, "GL_ARB_derivative_control"),
    (ShaderReq::FP64, "GL_ARB_gpu_shader_fp64"),
    (ShaderReq::IMAGE_LOAD_STORE, "GL_ARB_shader_image_load_store"),
    (ShaderReq::ES31_COMPAT, "GL_ARB_ES3_1_compatibility"),
    (ShaderReq::IMAGE_SIZE, "GL_ARB_shader_image_size"),
    (ShaderReq::TXQS, "GL_ARB_shader_texture_image_samples"),
    (ShaderReq::FBFETCH, "GL_EXT_shader_framebuffer_fetch"),
    (ShaderReq::SHADER_CLOCK, "GL_ARB_shader_clock"),
];

/// Type constructors and bit casts the translator wraps expressions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) enum TypeQual {
    #[default]
    None,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Uint,
    UVec2,
    UVec3,
    UVec4,
    FloatBitsToUint,
    UintBitsToFloat,
    FloatBitsToInt,
    IntBitsToFloat,
    Double,
    DVec2,
}

impl TypeQual {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeQual::None => "",
            TypeQual::Float => "float",
            TypeQual::Vec2 => "vec2",
            TypeQual::Vec3 => "vec3",
            TypeQual::Vec4 => "vec4",
            TypeQual::Int => "int",
            TypeQual::IVec2 => "ivec2",
            TypeQual::IVec3 => "ivec3",
            TypeQual::IVec4 => "ivec4",
            TypeQual::Uint => "uint",
            TypeQual::UVec2 => "uvec2",
            TypeQual::UVec3 => "uvec3",
            TypeQual::UVec4 => "uvec4",
            TypeQual::FloatBitsToUint => "floatBitsToUint",
            TypeQual::UintBitsToFloat => "uintBitsToFloat",
            TypeQual::FloatBitsToInt => "floatBitsToInt",
            TypeQual::IntBitsToFloat => "intBitsToFloat",
            TypeQual::Double => "double",
            TypeQual::DVec2 => "dvec2",
        }
    }

    /// Float vector type holding `n` components.
    pub fn float_n(n: u32) -> Self {
        match n {
            1 => TypeQual::Float,
            2 => TypeQual::Vec2,
            3 => TypeQual::Vec3,
            _ => TypeQual::Vec4,
        }
    }

    pub fn int_n(n: u32) -> Self {
        match n {
            1 => TypeQual::Int,
            2 => TypeQual::IVec2,
            3 => TypeQual::IVec3,
            _ => TypeQual::IVec4,
        }
    }

    pub fn uint_n(n: u32) -> Self {
        match n {
            1 => TypeQual::Uint,
            2 => TypeQual::UVec2,
            3 => TypeQual::UVec3,
            _ => TypeQual::UVec4,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            TypeQual::Int | TypeQual::IVec2 | TypeQual::IVec3 | TypeQual::IVec4
        )
    }
}

impl std::fmt::Display for TypeQual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Growable GLSL source with tab indentation.
#[derive(Debug, Default, Clone)]
pub struct GlslBuilder {
    buf: String,
    indent: usize,
}

impl GlslBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one statement at the current indentation. `line` may carry its
    /// own trailing newline.
    pub fn line(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.buf.push('\t');
        }
        self.buf.push_str(line);
        if !line.ends_with('\n') {
            self.buf.push('\n');
        }
    }

    /// Append text verbatim.
    pub fn raw(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn outdent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indentation() {
        let mut b = GlslBuilder::new();
        b.line("if (x) {");
        b.indent();
        b.line("discard;");
        b.outdent();
        b.line("}");
        b.outdent();
        b.raw("// end\n");
        assert_eq!(b.as_str(), "if (x) {\n\tdiscard;\n}\n// end\n");
    }

    #[test]
    fn extension_table_is_in_bit_order() {
        for (i, (bit, _)) in REQ_EXTENSIONS.iter().enumerate() {
            assert_eq!(bit.bits(), 1 << i);
        }
    }

    #[test]
    fn vector_types() {
        assert_eq!(TypeQual::float_n(3).as_str(), "vec3");
        assert_eq!(TypeQual::uint_n(1).as_str(), "uint");
        assert!(TypeQual::int_n(4).is_int());
    }
}
