//! TGSI to GLSL translation for the virgl renderer.
//!
//! The guest sends shaders as TGSI text. [`tgsi::parse`] reads that into a
//! [`tgsi::Program`], and [`convert_shader`] turns the program plus a
//! [`ShaderKey`] into GLSL the host compiles, together with the
//! [`ShaderInfo`] the renderer needs to bind and link it.
//! [`patch_vertex_shader_interpolants`] adjusts an upstream stage to the
//! fragment shader it ends up linked with.

pub mod error;
pub mod glsl;
pub mod info;
pub mod key;
pub mod patch;
pub mod tgsi;
mod translate;

pub use error::{Result, TranslateError};
pub use glsl::ShaderReq;
pub use info::{InterpInfo, ShaderArray, ShaderCfg, ShaderInfo};
pub use key::{ShaderKey, SoInfo, SoOutput};
pub use patch::patch_vertex_shader_interpolants;

/// Translate `program` for the render state in `key`.
///
/// `req_local_mem` is the compute shared-memory size in bytes. Any malformed
/// or over-limit declaration fails the whole translation.
pub fn convert_shader(
    cfg: &ShaderCfg,
    program: &tgsi::Program,
    key: &ShaderKey,
    req_local_mem: u32,
) -> Result<(String, ShaderInfo)> {
    translate::Translator::new(cfg, key, program, req_local_mem).run()
}
