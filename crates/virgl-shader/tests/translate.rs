use pretty_assertions::assert_eq;
use virgl_core::pipe::CompareFunc;
use virgl_shader::tgsi::{self, Interp, Semantic};
use virgl_shader::{convert_shader, ShaderCfg, ShaderKey, TranslateError};

const PASSTHROUGH_FS: &str = "FRAG
DCL IN[0], GENERIC[0], PERSPECTIVE
DCL OUT[0], COLOR
  0: MOV OUT[0], IN[0]
  1: END
";

fn translate(text: &str, cfg: &ShaderCfg, key: &ShaderKey) -> (String, virgl_shader::ShaderInfo) {
    let prog = tgsi::parse(text).unwrap();
    convert_shader(cfg, &prog, key, 0).unwrap()
}

fn core_cfg() -> ShaderCfg {
    ShaderCfg {
        glsl_version: 140,
        use_core_profile: true,
        ..Default::default()
    }
}

#[test]
fn passthrough_fragment_shader() {
    let (glsl, info) = translate(PASSTHROUGH_FS, &ShaderCfg::default(), &ShaderKey::default());

    assert!(glsl.starts_with("#version 130\n"), "{glsl}");
    assert!(glsl.contains("#extension GL_ARB_fragment_coord_conventions : require\n"));
    assert!(glsl.contains("layout(origin_upper_left) in vec4 gl_FragCoord;\n"));
    assert!(glsl.contains("smooth in vec4 vso_g0;\n"));
    assert!(glsl.contains("out vec4 fsout_c0;\n"));
    assert!(glsl.contains("void main(void)\n{\n"));
    assert!(glsl.ends_with("}\n"));

    assert_eq!(info.num_inputs, 1);
    assert_eq!(info.num_outputs, 1);
    assert_eq!(info.num_interps, 1);
    assert_eq!(info.interpinfo.len(), 1);
    assert_eq!(info.interpinfo[0].semantic, Semantic::Generic);
    assert_eq!(info.interpinfo[0].interpolate, Interp::Perspective);
    assert_eq!(info.glsl_ver, 130);
}

#[test]
fn inverted_origin_drops_layout() {
    let key = ShaderKey {
        invert_fs_origin: true,
        ..Default::default()
    };
    let (glsl, _) = translate(PASSTHROUGH_FS, &ShaderCfg::default(), &key);
    assert!(!glsl.contains("gl_FragCoord"));
}

#[test]
fn alpha_test_discards() {
    let key = ShaderKey {
        add_alpha_test: true,
        alpha_test: CompareFunc::Less,
        alpha_ref_val: 0.5,
        ..Default::default()
    };
    let (glsl, _) = translate(PASSTHROUGH_FS, &ShaderCfg::default(), &key);
    assert!(glsl.contains("if (!(fsout_c0.w < 0.500000)) {\n\tdiscard;\n}\n"), "{glsl}");

    let key = ShaderKey {
        add_alpha_test: true,
        alpha_test: CompareFunc::Never,
        ..Default::default()
    };
    let (glsl, _) = translate(PASSTHROUGH_FS, &ShaderCfg::default(), &key);
    assert!(glsl.contains("if (!(false)) {\n"));
}

#[test]
fn a8_colorbuffer_swizzle() {
    let key = ShaderKey {
        cbufs_are_a8_bitmask: 1,
        ..Default::default()
    };
    let (glsl, _) = translate(PASSTHROUGH_FS, &ShaderCfg::default(), &key);
    assert!(glsl.contains("fsout_c0.x = fsout_c0.w;\n"));
}

#[test]
fn two_sided_color_selects_by_facing() {
    let text = "FRAG
DCL IN[0], COLOR, COLOR
DCL OUT[0], COLOR
  0: MOV OUT[0], IN[0]
  1: END
";
    let key = ShaderKey {
        color_two_side: true,
        ..Default::default()
    };
    let (glsl, info) = translate(text, &core_cfg(), &key);
    assert!(glsl.starts_with("#version 140\n"));
    assert!(glsl.contains("in vec4 ex_c0;\n"), "{glsl}");
    assert!(glsl.contains("in vec4 ex_bc0;\n"));
    assert!(glsl.contains("vec4 realcolor0;\n"));
    assert!(glsl.contains("realcolor0 = gl_FrontFacing ? ex_c0 : ex_bc0;\n"));
    assert!(glsl.contains("realcolor0"));
    // the back colour is not subject to interpolant patching
    assert_eq!(info.interpinfo.len(), 1);
}

#[test]
fn user_clip_planes() {
    let text = "VERT
DCL IN[0]
DCL OUT[0], POSITION
  0: MOV OUT[0], IN[0]
  1: END
";
    let key = ShaderKey {
        clip_plane_enable: true,
        ..Default::default()
    };
    let (glsl, info) = translate(text, &ShaderCfg::default(), &key);
    assert!(glsl.contains("in vec4 in_0;\n"));
    assert!(glsl.contains("uniform vec4 clipp[8];\n"));
    assert!(glsl.contains("out float gl_ClipDistance[8];\n"));
    assert!(glsl.contains("gl_ClipDistance[7] = dot(gl_Position, clipp[7]);\n"));
    assert!(glsl.contains("uniform float winsys_adjust_y;\n"));
    assert!(glsl.contains("gl_Position.y = gl_Position.y * winsys_adjust_y;\n"));
    assert_eq!(info.num_ucp, 8);
    assert_eq!(info.attrib_input_mask, 1);
}

#[test]
fn no_prescale_before_geometry_stage() {
    let text = "VERT
DCL IN[0]
DCL OUT[0], POSITION
  0: MOV OUT[0], IN[0]
  1: END
";
    let key = ShaderKey {
        gs_present: true,
        ..Default::default()
    };
    let (glsl, _) = translate(text, &ShaderCfg::default(), &key);
    assert!(!glsl.contains("gl_Position.y = gl_Position.y * winsys_adjust_y;"));
}

#[test]
fn texture_sample() {
    let text = "FRAG
DCL IN[0], GENERIC[0], PERSPECTIVE
DCL OUT[0], COLOR
DCL SAMP[0]
DCL SVIEW[0], 2D, FLOAT
  0: TEX OUT[0], IN[0], SAMP[0], 2D
  1: END
";
    let (glsl, info) = translate(text, &ShaderCfg::default(), &ShaderKey::default());
    assert!(glsl.contains("uniform sampler2D fssamp0;\n"), "{glsl}");
    assert!(glsl.contains("texture(fssamp0, "));
    assert_eq!(info.samplers_used_mask, 1);
    assert_eq!(info.shadow_samp_mask, 0);
}

#[test]
fn shadow_sampler_uniforms() {
    let text = "FRAG
DCL IN[0], GENERIC[0], PERSPECTIVE
DCL OUT[0], COLOR
DCL SAMP[1]
DCL SVIEW[1], SHADOW2D, FLOAT
  0: TEX OUT[0], IN[0], SAMP[1], SHADOW2D
  1: END
";
    let (glsl, info) = translate(text, &ShaderCfg::default(), &ShaderKey::default());
    assert!(glsl.contains("uniform sampler2DShadow fssamp1;\n"), "{glsl}");
    assert!(glsl.contains("uniform vec4 fsshadmask1;\n"));
    assert!(glsl.contains("uniform vec4 fsshadadd1;\n"));
    assert_eq!(info.shadow_samp_mask, 1 << 1);
}

#[test]
fn control_flow_is_indented() {
    let text = "FRAG
DCL IN[0], GENERIC[0], PERSPECTIVE
DCL OUT[0], COLOR
DCL TEMP[0]
  0: MOV TEMP[0], IN[0]
  1: IF TEMP[0].xxxx :3
  2:   KILL
  3: ENDIF
  4: MOV OUT[0], TEMP[0]
  5: END
";
    let (glsl, _) = translate(text, &ShaderCfg::default(), &ShaderKey::default());
    assert!(glsl.contains("vec4 temp0[1];\n"));
    assert!(glsl.contains("\tdiscard;\n"), "{glsl}");
    assert!(glsl.contains("if (any(bvec4("));
}

#[test]
fn sample_location_input_needs_gpu_shader5() {
    let text = "FRAG
DCL IN[0], GENERIC[0], PERSPECTIVE, SAMPLE
DCL OUT[0], COLOR
  0: MOV OUT[0], IN[0]
  1: END
";
    let (glsl, info) = translate(text, &ShaderCfg::default(), &ShaderKey::default());
    assert!(info.has_sample_input);
    assert!(glsl.contains("#extension GL_ARB_gpu_shader5 : require\n"));
    assert!(glsl.contains("smooth sample in vec4 vso_g0;\n"));
}

#[test]
fn too_many_sampler_views() {
    let text = "FRAG
DCL SVIEW[32], 2D, FLOAT
  0: END
";
    let prog = tgsi::parse(text).unwrap();
    let err = convert_shader(&ShaderCfg::default(), &prog, &ShaderKey::default(), 0).unwrap_err();
    assert!(matches!(err, TranslateError::Overflow { what: "sampler views", .. }));
}

#[test]
fn missing_end() {
    let text = "FRAG
DCL OUT[0], COLOR
  0: MOV OUT[0], IMM[0]
IMM[0] FLT32 { 1.0, 0.0, 0.0, 1.0 }
";
    let prog = tgsi::parse(text).unwrap();
    let err = convert_shader(&ShaderCfg::default(), &prog, &ShaderKey::default(), 0).unwrap_err();
    assert_eq!(err, TranslateError::MissingEnd);
}

#[test]
fn undeclared_immediate() {
    let text = "FRAG
DCL OUT[0], COLOR
  0: MOV OUT[0], IMM[3]
  1: END
";
    let prog = tgsi::parse(text).unwrap();
    let err = convert_shader(&ShaderCfg::default(), &prog, &ShaderKey::default(), 0).unwrap_err();
    assert!(matches!(err, TranslateError::Undeclared(_)));
}

#[test]
fn gles_header() {
    let cfg = ShaderCfg {
        glsl_version: 300,
        use_gles: true,
        ..Default::default()
    };
    let (glsl, _) = translate(PASSTHROUGH_FS, &cfg, &ShaderKey::default());
    assert!(glsl.starts_with("#version 300 es\n"));
    assert!(glsl.contains("precision highp float;\nprecision highp int;\n"));
}

#[test]
fn compute_shared_memory() {
    let text = "COMP
PROPERTY CS_FIXED_BLOCK_WIDTH 8
PROPERTY CS_FIXED_BLOCK_HEIGHT 4
PROPERTY CS_FIXED_BLOCK_DEPTH 1
  0: BARRIER
  1: END
";
    let prog = tgsi::parse(text).unwrap();
    let (glsl, _) = convert_shader(&ShaderCfg::default(), &prog, &ShaderKey::default(), 64).unwrap();
    assert!(glsl.starts_with("#version 330\n#extension GL_ARB_compute_shader : require\n"));
    assert!(glsl.contains("layout (local_size_x = 8, local_size_y = 4, local_size_z = 1) in;\n"));
    assert!(glsl.contains("shared uint values[16];\n"));
    assert!(glsl.contains("barrier();\n"));
}
