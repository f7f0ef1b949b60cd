mod common;

use common::*;
use pretty_assertions::assert_eq;
use virgl_core::pipe::{BindFlags, CompareFunc, ObjectType, ShaderType};
use virgl_core::{ContextErrorKind, RendererConfig};
use virgl_renderer::{DrawInfo, DsaState, RasterizerState, ResourceCreateArgs, StreamoutTargetArgs, Viewport};

fn viewport(width: f32, height: f32) -> Viewport {
    Viewport {
        scale: [width / 2.0, height / 2.0, 0.5],
        translate: [width / 2.0, height / 2.0, 0.5],
    }
}

fn viewport_calls(h: &Harness) -> usize {
    h.gl.count("Viewport") + h.gl.count("ViewportIndexedf")
}

#[test]
fn identical_state_reuses_variants() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    let compiled = h.gl.count("CompileShader");
    assert!(compiled >= 2, "{compiled}");

    // Rebinding marks the shaders dirty but selects the same key.
    h.renderer.bind_shader(0, 1, ShaderType::Vertex as u32).unwrap();
    h.renderer.bind_shader(0, 2, ShaderType::Fragment as u32).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("CompileShader"), compiled);
    assert_eq!(h.gl.count("DrawArrays"), 3);
}

#[test]
fn repeated_state_is_emitted_once() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    h.gl.clear_calls();

    h.renderer.set_viewport_states(0, 0, &[viewport(64.0, 64.0)]).unwrap();
    h.renderer.set_viewport_states(0, 0, &[viewport(32.0, 32.0)]).unwrap();
    h.renderer.set_blend_color(0, [0.0, 0.5, 1.0, 1.0]).unwrap();
    h.renderer.set_blend_color(0, [1.0, 0.5, 0.0, 1.0]).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(viewport_calls(&h), 1);
    assert_eq!(h.gl.count("BlendColor"), 1);

    h.gl.clear_calls();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(viewport_calls(&h), 0);
    assert_eq!(h.gl.count("BlendColor"), 0);
    assert_eq!(h.gl.count("DrawArrays"), 1);
}

#[test]
fn unchanged_viewport_is_not_dirty() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    h.renderer.set_viewport_states(0, 0, &[viewport(64.0, 64.0)]).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    h.gl.clear_calls();

    h.renderer.set_viewport_states(0, 0, &[viewport(64.0, 64.0)]).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(viewport_calls(&h), 0);
}

#[test]
fn cached_program_is_not_relinked() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    create_shader(&mut h.renderer, 0, 3, ShaderType::Fragment, CONSTANT_FS);

    h.renderer.draw_vbo(0, &triangles()).unwrap();
    h.renderer.bind_shader(0, 3, ShaderType::Fragment as u32).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("LinkProgram"), 2);
    h.gl.clear_calls();

    h.renderer.bind_shader(0, 2, ShaderType::Fragment as u32).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    h.renderer.bind_shader(0, 3, ShaderType::Fragment as u32).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("LinkProgram"), 0);
    assert_eq!(h.gl.count("UseProgram"), 2);
}

#[test]
fn destroying_a_shader_drops_its_programs() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.live_programs(), 1);

    h.renderer.object_destroy(0, 4, 2).unwrap();
    assert_eq!(h.gl.live_programs(), 0);

    // Without a fragment shader the draw is dropped.
    h.gl.clear_calls();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("DrawArrays"), 0);
    assert_eq!(h.gl.bad_deletes(), 0);
}

#[test]
fn minimal_fragment_shader_glsl() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    h.renderer.draw_vbo(0, &triangles()).unwrap();

    let sources = h.gl.shader_sources(gl::FRAGMENT_SHADER);
    assert_eq!(sources.len(), 1);
    let fs = &sources[0];
    assert!(fs.contains("void main(void)"), "{fs}");
    assert!(fs.contains("in vec4 vso_g0;"), "{fs}");
    assert!(fs.contains("out vec4 fsout_c0;"), "{fs}");
    assert!(!fs.contains("GL_ARB_gpu_shader5"), "{fs}");
}

#[test]
fn compile_failure_marks_the_context() {
    let mut h = harness();
    h.renderer.create_context(1, "guest").unwrap();
    h.gl.fail_compile_containing("fsout_c0");
    bind_passthrough(&mut h.renderer, 1);

    let err = h.renderer.draw_vbo(1, &triangles()).unwrap_err();
    assert_eq!(err.kind(), Some(ContextErrorKind::IllegalShader));
    assert_eq!(h.renderer.context_error(1), Some(ContextErrorKind::IllegalShader));
    assert!(!h.renderer.hw_switch_context(1));

    // Later work is skipped but other contexts are unaffected.
    h.renderer.draw_vbo(1, &triangles()).unwrap();
    assert_eq!(h.gl.count("DrawArrays"), 0);
    assert_eq!(h.renderer.context_error(0), None);
}

#[test]
fn shader_bound_to_the_wrong_stage_is_rejected() {
    let mut h = harness();
    create_shader(&mut h.renderer, 0, 1, ShaderType::Vertex, PASSTHROUGH_VS);
    let err = h
        .renderer
        .bind_shader(0, 1, ShaderType::Fragment as u32)
        .unwrap_err();
    assert_eq!(err.kind(), Some(ContextErrorKind::IllegalShader));
}

#[test]
fn sub_contexts_keep_separate_state() {
    let mut h = harness();
    h.renderer.create_context(1, "guest").unwrap();
    bind_passthrough(&mut h.renderer, 1);
    h.renderer.create_sub_ctx(1, 1).unwrap();
    h.renderer.set_sub_ctx(1, 1).unwrap();

    // The new sub-context has no shaders bound.
    h.renderer.draw_vbo(1, &triangles()).unwrap();
    assert_eq!(h.gl.count("DrawArrays"), 0);

    h.renderer.set_sub_ctx(1, 0).unwrap();
    h.renderer.draw_vbo(1, &triangles()).unwrap();
    assert_eq!(h.gl.count("DrawArrays"), 1);

    h.renderer.destroy_sub_ctx(1, 1).unwrap();
    h.renderer.destroy_context(1);
    assert_eq!(h.gl.live_programs(), 0);
}

fn alpha_test(func: CompareFunc) -> DsaState {
    DsaState {
        alpha_enabled: true,
        alpha_func: func,
        alpha_ref_value: 0.5,
        ..Default::default()
    }
}

#[test]
fn evicted_variants_are_rebuilt() {
    let mut h = harness_with(RendererConfig {
        max_variants_hint: 2,
        ..Default::default()
    });
    bind_passthrough(&mut h.renderer, 0);
    for (handle, func) in [(10, CompareFunc::Less), (11, CompareFunc::Greater), (12, CompareFunc::Equal)] {
        h.renderer.create_dsa(0, handle, alpha_test(func)).unwrap();
        h.renderer.bind_object(0, ObjectType::Dsa as u32, handle).unwrap();
        h.renderer.draw_vbo(0, &triangles()).unwrap();
    }
    // One vertex variant and three fragment variants, the oldest evicted.
    assert_eq!(h.gl.count("CompileShader"), 4);
    assert_eq!(h.gl.live_programs(), 2);

    h.gl.clear_calls();
    h.renderer.bind_object(0, ObjectType::Dsa as u32, 11).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("CompileShader"), 0);
    assert_eq!(h.gl.count("LinkProgram"), 0);

    h.renderer.bind_object(0, ObjectType::Dsa as u32, 10).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("CompileShader"), 1);
    assert_eq!(h.gl.count("LinkProgram"), 1);
    assert_eq!(h.gl.count("DrawArrays"), 2);
    assert_eq!(h.gl.live_programs(), 2);
    assert_eq!(h.gl.bad_deletes(), 0);
}

#[test]
fn front_face_and_stencil_are_emitted_once() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    let cw = RasterizerState {
        front_ccw: false,
        ..Default::default()
    };
    h.renderer.create_rasterizer(0, 20, cw).unwrap();
    h.renderer.create_rasterizer(0, 21, RasterizerState::default()).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    h.gl.clear_calls();

    h.renderer.bind_object(0, ObjectType::Rasterizer as u32, 20).unwrap();
    h.renderer.bind_object(0, ObjectType::Rasterizer as u32, 21).unwrap();
    h.renderer.set_stencil_ref(0, [1, 1]).unwrap();
    h.renderer.set_stencil_ref(0, [2, 3]).unwrap();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("FrontFace"), 1);
    // Front and back.
    assert_eq!(h.gl.count("StencilFuncSeparate"), 2);

    h.gl.clear_calls();
    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("FrontFace"), 0);
    assert_eq!(h.gl.count("StencilFuncSeparate"), 0);
}

#[test]
fn indexed_draw_without_index_buffer_leaves_streamout_idle() {
    let mut h = harness();
    bind_passthrough(&mut h.renderer, 0);
    let so_buffer = ResourceCreateArgs {
        bind: BindFlags::STREAM_OUTPUT.bits(),
        ..buffer_args(10, 256)
    };
    h.renderer.resource_create(&so_buffer, None).unwrap();
    let target = StreamoutTargetArgs {
        handle: 5,
        res_handle: 10,
        buffer_offset: 0,
        buffer_size: 256,
    };
    h.renderer.create_so_target(0, &target).unwrap();
    h.renderer.set_streamout_targets(0, 0, &[5]).unwrap();
    h.gl.clear_calls();

    let indexed = DrawInfo {
        indexed: true,
        ..triangles()
    };
    h.renderer.draw_vbo(0, &indexed).unwrap();
    assert_eq!(h.gl.count("BeginTransformFeedback"), 0);
    assert_eq!(h.gl.count("DrawElementsBaseVertex"), 0);

    h.renderer.draw_vbo(0, &triangles()).unwrap();
    assert_eq!(h.gl.count("BeginTransformFeedback"), 1);
    assert_eq!(h.gl.count("DrawArrays"), 1);
}

#[test]
fn state_setters_do_not_switch_gl_contexts() {
    let mut h = harness();
    h.renderer.create_context(1, "a").unwrap();
    h.renderer.create_context(2, "b").unwrap();
    h.renderer.force_ctx_0();
    let bound = h.callbacks.make_current_calls();

    for i in 0..4u8 {
        let color = [f32::from(i) / 4.0; 4];
        h.renderer.set_blend_color(1, color).unwrap();
        h.renderer.set_blend_color(2, color).unwrap();
        h.renderer.set_stencil_ref(1, [i, i]).unwrap();
        h.renderer.set_stencil_ref(2, [i, i]).unwrap();
    }
    assert_eq!(h.callbacks.make_current_calls(), bound);

    assert!(h.renderer.hw_switch_context(1));
    assert!(h.renderer.switch_pending());
    assert_eq!(h.callbacks.make_current_calls(), bound);

    // The first command that reaches GL binds the context, once.
    h.renderer.draw_vbo(1, &triangles()).unwrap();
    h.renderer.draw_vbo(1, &triangles()).unwrap();
    assert!(!h.renderer.switch_pending());
    assert_eq!(h.callbacks.make_current_calls(), bound + 1);

    h.renderer.draw_vbo(2, &triangles()).unwrap();
    assert_eq!(h.callbacks.make_current_calls(), bound + 2);
}

#[test]
fn context_in_error_drops_later_commands() {
    let mut h = harness();
    h.renderer.create_context(1, "guest").unwrap();
    h.renderer.resource_create(&rgba8_args(1, 4, 4), None).unwrap();
    h.renderer.resource_create(&rgba8_args(2, 4, 4), None).unwrap();
    h.renderer.ctx_attach_resource(1, 1).unwrap();
    h.renderer.ctx_attach_resource(1, 2).unwrap();

    create_shader(&mut h.renderer, 1, 1, ShaderType::Vertex, PASSTHROUGH_VS);
    let err = h
        .renderer
        .bind_shader(1, 1, ShaderType::Fragment as u32)
        .unwrap_err();
    assert_eq!(err.kind(), Some(ContextErrorKind::IllegalShader));
    h.gl.clear_calls();

    // Neither a malformed command nor a valid one reaches GL.
    h.renderer.set_viewport_states(1, 17, &[]).unwrap();
    h.renderer.texture_barrier(1).unwrap();
    let full = virgl_core::PipeBox::new(0, 0, 0, 4, 4, 1);
    h.renderer.resource_copy_region(1, 2, 0, [0, 0, 0], 1, 0, &full).unwrap();
    assert!(h.gl.calls().is_empty());
    assert_eq!(h.renderer.context_error(1), Some(ContextErrorKind::IllegalShader));

    // Context 0 keeps working.
    h.renderer.texture_barrier(0).unwrap();
    assert_eq!(h.gl.count("TextureBarrier"), 1);
}
