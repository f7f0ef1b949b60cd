//! Rewrite an upstream stage's varying declarations so their interpolation
//! matches what the fragment shader it is linked with expects.

use std::collections::HashMap;

use tracing::debug;

use crate::info::{ShaderCfg, ShaderInfo};
use crate::tgsi::Semantic;
use crate::translate::{interp_qualifier, location_qualifier};

const STORAGE: &str = "out vec4 ";

/// Qualifiers keyed by the GLSL name of the upstream output.
fn qualifiers(
    cfg: &ShaderCfg,
    fs_info: &ShaderInfo,
    oprefix: &str,
    flatshade: bool,
) -> HashMap<String, String> {
    let mut quals = HashMap::new();
    for interp in &fs_info.interpinfo {
        let Some(qual) = interp_qualifier(cfg.use_gles, interp.interpolate, flatshade) else {
            continue;
        };
        let qual = format!("{qual}{}", location_qualifier(interp.location));
        let sid = interp.semantic_index;
        let names = match interp.semantic {
            Semantic::Color if fs_info.glsl_ver < 140 => {
                if sid == 1 {
                    vec![
                        "gl_FrontSecondaryColor".to_string(),
                        "gl_BackSecondaryColor".to_string(),
                    ]
                } else {
                    vec!["gl_FrontColor".to_string(), "gl_BackColor".to_string()]
                }
            }
            Semantic::Color => vec![format!("ex_c{sid}"), format!("ex_bc{sid}")],
            Semantic::Generic => vec![format!("{oprefix}_g{sid}")],
            other => {
                debug!("interpolant for {other:?} left alone");
                continue;
            }
        };
        for name in names {
            quals.insert(name, qual.clone());
        }
    }
    quals
}

/// Name declared by an `out vec4 NAME;` or `out vec4 NAME[];` line.
fn declared_output(line: &str) -> Option<(usize, &str)> {
    let at = line.find(STORAGE)?;
    let name = line[at + STORAGE.len()..]
        .trim_end()
        .strip_suffix(';')?
        .trim_end_matches("[]");
    Some((at, name))
}

/// Return `program` with interpolation qualifiers inserted in front of the
/// outputs `fs_info` reads, plus the gpu_shader5 extension when the fragment
/// stage interpolates at sample locations. `oprefix` is the upstream stage's
/// output name prefix (`vso`, `gso`, `teo`).
pub fn patch_vertex_shader_interpolants(
    cfg: &ShaderCfg,
    program: &str,
    fs_info: &ShaderInfo,
    oprefix: &str,
    flatshade: bool,
) -> String {
    let quals = qualifiers(cfg, fs_info, oprefix, flatshade);
    let ext = if cfg.use_gles {
        "GL_EXT_gpu_shader5"
    } else {
        "GL_ARB_gpu_shader5"
    };
    let add_gpu5 = fs_info.has_sample_input && !program.contains(ext);

    let mut patched = String::with_capacity(program.len() + 64 * quals.len());
    for (n, line) in program.lines().enumerate() {
        match declared_output(line).and_then(|(at, name)| quals.get(name).map(|q| (at, q))) {
            Some((at, qual)) => {
                patched.push_str(&line[..at]);
                patched.push_str(qual);
                patched.push_str(&line[at..]);
            }
            None => patched.push_str(line),
        }
        patched.push('\n');
        // The first line is `#version`; extensions must follow it directly.
        if n == 0 && add_gpu5 {
            patched.push_str(&format!("#extension {ext} : require\n"));
        }
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::InterpInfo;
    use crate::tgsi::{Interp, Location};
    use pretty_assertions::assert_eq;

    fn fs_info(interps: Vec<InterpInfo>) -> ShaderInfo {
        ShaderInfo {
            interpinfo: interps,
            glsl_ver: 140,
            ..Default::default()
        }
    }

    #[test]
    fn generic_and_color_outputs() {
        let vs = "#version 140\nout vec4 vso_g0;\ninvariant out vec4 vso_g1;\nout vec4 ex_c0;\nvoid main(void)\n{\n}\n";
        let info = fs_info(vec![
            InterpInfo {
                semantic: Semantic::Generic,
                semantic_index: 1,
                interpolate: Interp::Constant,
                location: Location::Center,
            },
            InterpInfo {
                semantic: Semantic::Color,
                semantic_index: 0,
                interpolate: Interp::Linear,
                location: Location::Centroid,
            },
        ]);
        let out = patch_vertex_shader_interpolants(&ShaderCfg::default(), vs, &info, "vso", false);
        assert_eq!(
            out,
            "#version 140\nout vec4 vso_g0;\ninvariant flat out vec4 vso_g1;\nnoperspective centroid out vec4 ex_c0;\nvoid main(void)\n{\n}\n"
        );
    }

    #[test]
    fn color_default_interp_untouched() {
        let vs = "#version 130\nout vec4 gl_FrontColor;\n";
        let mut info = fs_info(vec![InterpInfo {
            semantic: Semantic::Color,
            semantic_index: 0,
            interpolate: Interp::Color,
            location: Location::Center,
        }]);
        info.glsl_ver = 130;
        let cfg = ShaderCfg::default();
        assert_eq!(patch_vertex_shader_interpolants(&cfg, vs, &info, "vso", false), vs);
        assert_eq!(
            patch_vertex_shader_interpolants(&cfg, vs, &info, "vso", true),
            "#version 130\nflat out vec4 gl_FrontColor;\n"
        );
    }

    #[test]
    fn sample_input_adds_gpu_shader5_once() {
        let vs = "#version 150\nout vec4 vso_g0;\n";
        let mut info = fs_info(Vec::new());
        info.has_sample_input = true;
        let cfg = ShaderCfg::default();
        let out = patch_vertex_shader_interpolants(&cfg, vs, &info, "vso", false);
        assert_eq!(
            out,
            "#version 150\n#extension GL_ARB_gpu_shader5 : require\nout vec4 vso_g0;\n"
        );
        assert_eq!(patch_vertex_shader_interpolants(&cfg, &out, &info, "vso", false), out);
    }
}
