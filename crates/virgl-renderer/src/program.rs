//! Linked GL programs, cached per sub-context by stage variant ids.

use std::rc::{Rc, Weak};

use gl::types::GLuint;
use tracing::{debug, error, warn};
use virgl_core::limits::MAX_CLIP_PLANES;
use virgl_core::pipe::{ShaderType, SHADER_TYPES};
use virgl_gl::Feature;
use virgl_shader::{patch_vertex_shader_interpolants, SoInfo};

use crate::gl_objects::{GlProgram, GlShader};
use crate::host::Host;
use crate::shader::{compile_glsl, ShaderVariant};

/// Identity of a program: one variant id per stage (0 when absent) and the
/// dual-source blend flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct ProgramKey {
    pub ids: [u64; SHADER_TYPES],
    pub dual_src: bool,
}

impl ProgramKey {
    pub fn new(stages: &[Option<Rc<ShaderVariant>>; SHADER_TYPES], dual_src: bool) -> Self {
        Self {
            ids: stages.each_ref().map(|v| v.as_ref().map_or(0, |v| v.id)),
            dual_src,
        }
    }
}

/// A sampler uniform and the guest sampler slot it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SamplerLoc {
    pub slot: u32,
    pub loc: i32,
    /// `shadmask` / `shadadd` uniforms of depth-compare samplers.
    pub shadow: Option<(i32, i32)>,
}

/// Locations resolved for one stage after linking.
#[derive(Debug, Clone, Default)]
pub(crate) struct StageLocations {
    pub samplers: Vec<SamplerLoc>,
    pub const_loc: Option<i32>,
    /// Guest constant-buffer slot and the block binding it was given.
    pub ubos: Vec<(u32, u32)>,
    /// Guest shader-buffer slot and block binding.
    pub ssbos: Vec<(u32, u32)>,
    /// Guest image slot and uniform location.
    pub images: Vec<(u32, i32)>,
}

pub(crate) struct LinkedProgram {
    pub key: ProgramKey,
    pub program: GlProgram,
    variants: [Option<Weak<ShaderVariant>>; SHADER_TYPES],
    pub stages: [StageLocations; SHADER_TYPES],
    pub clip_loc: Option<i32>,
    pub winsys_adjust_y_loc: Option<i32>,
    pub pstipple_loc: Option<i32>,
    /// Number of texture units the program's samplers occupy.
    pub num_sampler_units: u32,
    /// Upstream stage recompiled to match the fragment interpolants.
    _patched: Option<GlShader>,
}

impl std::fmt::Debug for LinkedProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedProgram")
            .field("id", &self.program.id())
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn output_prefix(ty: ShaderType) -> &'static str {
    match ty {
        ShaderType::Geometry => "gso",
        ShaderType::TessEval => "teo",
        _ => "vso",
    }
}

/// Varying list for `glTransformFeedbackVaryings`, padded with skip and
/// next-buffer markers so the captured layout matches the guest's.
pub(crate) fn so_varyings(so: &SoInfo, names: &[String]) -> Vec<String> {
    let mut varyings = Vec::new();
    let mut buffer = None;
    let mut next_offset = 0;
    for (output, name) in so.outputs.iter().zip(names) {
        if buffer != Some(output.output_buffer) {
            if buffer.is_some() {
                varyings.push("gl_NextBuffer".to_owned());
            }
            buffer = Some(output.output_buffer);
            next_offset = 0;
        }
        let mut skip = output.dst_offset.saturating_sub(next_offset);
        while skip > 0 {
            let n = skip.min(4);
            varyings.push(format!("gl_SkipComponents{n}"));
            skip -= n;
        }
        varyings.push(name.clone());
        next_offset = output.dst_offset + output.num_components;
    }
    varyings
}

impl LinkedProgram {
    pub fn is_alive(&self) -> bool {
        self.variants
            .iter()
            .all(|v| v.as_ref().map_or(true, |w| w.strong_count() > 0))
    }

    /// Link the given stages. Failures are logged with every stage's source.
    pub fn link(
        host: &Rc<Host>,
        stages: &[Option<Rc<ShaderVariant>>; SHADER_TYPES],
        dual_src: bool,
        flatshade: bool,
    ) -> Option<Self> {
        let gl = host.gl.as_ref();
        let program = GlProgram::new(&host.gl);
        let pid = program.id();

        let fs = stages[ShaderType::Fragment.index()].as_ref();
        let last_vertex = [ShaderType::Geometry, ShaderType::TessEval, ShaderType::Vertex]
            .into_iter()
            .find(|ty| stages[ty.index()].is_some());

        // The stage feeding the fragment shader must match its interpolants.
        let mut patched = None;
        if let (Some(fs), Some(ty)) = (fs, last_vertex) {
            let upstream = stages[ty.index()].as_ref()?;
            if !fs.info.interpinfo.is_empty() {
                let source = patch_vertex_shader_interpolants(
                    &host.shader_cfg,
                    &upstream.glsl,
                    &fs.info,
                    output_prefix(ty),
                    flatshade,
                );
                if source != upstream.glsl {
                    patched = Some(compile_glsl(host, ty, &source).ok()?);
                }
            }
        }

        for ty in ShaderType::ALL {
            let Some(variant) = &stages[ty.index()] else {
                continue;
            };
            let id = match (&patched, last_vertex) {
                (Some(shader), Some(last)) if last == ty => shader.id(),
                _ => variant.shader.id(),
            };
            gl.attach_shader(pid, id);
        }

        if let Some(last) = last_vertex.and_then(|ty| stages[ty.index()].as_ref()) {
            if let Some(so) = last.key.so_info.as_ref().filter(|so| !so.outputs.is_empty()) {
                let varyings = so_varyings(so, &last.info.so_names);
                if varyings.iter().any(|v| v == "gl_NextBuffer") && !host.has(Feature::TransformFeedback3) {
                    warn!("transform feedback over several buffers without ARB_transform_feedback3");
                }
                gl.transform_feedback_varyings(pid, &varyings, gl::INTERLEAVED_ATTRIBS);
            }
        }

        if let Some(vs) = &stages[ShaderType::Vertex.index()] {
            for i in 0..32 {
                if vs.info.attrib_input_mask & (1 << i) != 0 {
                    gl.bind_attrib_location(pid, i, &format!("in_{i}"));
                }
            }
        }
        if fs.is_some() && !host.is_gles() && !host.shader_cfg.use_explicit_locations {
            if dual_src {
                gl.bind_frag_data_location_indexed(pid, 0, 0, "fsout_c0");
                gl.bind_frag_data_location_indexed(pid, 0, 1, "fsout_c1");
            } else {
                for i in 0..host.caps.max_draw_buffers {
                    gl.bind_frag_data_location_indexed(pid, i, 0, &format!("fsout_c{i}"));
                }
            }
        }

        if !gl.link_program(pid) {
            let log = gl.program_info_log(pid);
            error!("failed to link program {pid}: {log}");
            for variant in stages.iter().flatten() {
                error!("{:?} shader:\n{}", variant.ty, variant.glsl);
            }
            return None;
        }
        debug!("linked program {pid} for {:?}", ProgramKey::new(stages, dual_src));

        let mut linked = Self {
            key: ProgramKey::new(stages, dual_src),
            program,
            variants: stages.each_ref().map(|v| v.as_ref().map(Rc::downgrade)),
            stages: Default::default(),
            clip_loc: None,
            winsys_adjust_y_loc: None,
            pstipple_loc: None,
            num_sampler_units: 0,
            _patched: patched,
        };
        linked.resolve_locations(host, stages);
        Some(linked)
    }

    fn resolve_locations(&mut self, host: &Host, stages: &[Option<Rc<ShaderVariant>>; SHADER_TYPES]) {
        let gl = host.gl.as_ref();
        let pid = self.program.id();
        let loc = |name: &str| Some(gl.get_uniform_location(pid, name)).filter(|l| *l >= 0);

        gl.use_program(pid);
        let mut unit = 0;
        let mut ubo_binding = 0;
        let mut ssbo_binding = 0;
        let mut image_unit = 0;
        for ty in ShaderType::ALL {
            let Some(variant) = &stages[ty.index()] else {
                continue;
            };
            let info = &variant.info;
            let p = ty.prefix();
            let locs = &mut self.stages[ty.index()];

            for slot in 0..32u32 {
                if info.samplers_used_mask & (1 << slot) == 0 {
                    continue;
                }
                let name = match info.lookup_sampler_array(slot) {
                    Some(array) => format!("{p}samp{}[{}]", array.first, slot - array.first),
                    None => format!("{p}samp{slot}"),
                };
                let Some(sloc) = loc(&name) else {
                    continue;
                };
                gl.uniform_1i(sloc, unit);
                unit += 1;
                let shadow = (info.shadow_samp_mask & (1 << slot) != 0)
                    .then(|| {
                        let base = info.lookup_sampler_array(slot).map_or(slot, |a| a.first);
                        Some((loc(&format!("{p}shadmask{base}"))?, loc(&format!("{p}shadadd{base}"))?))
                    })
                    .flatten();
                locs.samplers.push(SamplerLoc { slot, loc: sloc, shadow });
            }

            if info.num_consts > 0 {
                locs.const_loc = loc(&format!("{p}const0"));
            }

            let indirect_ubo = info.ubo_indirect;
            for (i, &slot) in info.ubo_idx.iter().enumerate() {
                let name = if indirect_ubo {
                    format!("{p}ubo[{i}]")
                } else {
                    format!("{p}ubo{slot}")
                };
                let index = gl.get_uniform_block_index(pid, &name);
                if index == gl::INVALID_INDEX {
                    continue;
                }
                gl.uniform_block_binding(pid, index, ubo_binding);
                locs.ubos.push((slot, ubo_binding));
                ubo_binding += 1;
            }

            if host.has(Feature::Ssbo) {
                for slot in 0..32u32 {
                    if info.ssbo_used_mask & (1 << slot) == 0 {
                        continue;
                    }
                    let index = gl.get_program_resource_index(pid, gl::SHADER_STORAGE_BLOCK, &format!("{p}ssbo{slot}"));
                    if index == gl::INVALID_INDEX {
                        continue;
                    }
                    if !host.is_gles() {
                        gl.shader_storage_block_binding(pid, index, ssbo_binding);
                        locs.ssbos.push((slot, ssbo_binding));
                        ssbo_binding += 1;
                    } else {
                        locs.ssbos.push((slot, slot));
                    }
                }
            }

            for slot in 0..32u32 {
                if info.images_used_mask & (1 << slot) == 0 {
                    continue;
                }
                let name = match info.lookup_image_array(slot) {
                    Some(array) => format!("{p}img{}[{}]", array.first, slot - array.first),
                    None => format!("{p}img{slot}"),
                };
                if host.is_gles() {
                    // GLES images carry their binding in the layout.
                    locs.images.push((slot, slot as i32));
                } else if let Some(iloc) = loc(&name) {
                    gl.uniform_1i(iloc, image_unit);
                    locs.images.push((slot, image_unit));
                    image_unit += 1;
                }
            }
        }
        self.num_sampler_units = unit as u32;
        self.clip_loc = loc("clipp");
        self.winsys_adjust_y_loc = loc("winsys_adjust_y");
        self.pstipple_loc = loc("pstipple_sampler");
    }

    pub fn id(&self) -> GLuint {
        self.program.id()
    }
}

/// All programs linked in one sub-context.
#[derive(Debug, Default)]
pub(crate) struct ProgramCache {
    programs: Vec<Rc<LinkedProgram>>,
}

impl ProgramCache {
    pub fn lookup(&self, key: &ProgramKey) -> Option<Rc<LinkedProgram>> {
        self.programs.iter().find(|p| p.key == *key).cloned()
    }

    pub fn insert(&mut self, program: LinkedProgram) -> Rc<LinkedProgram> {
        let program = Rc::new(program);
        self.programs.push(Rc::clone(&program));
        program
    }

    /// Drop programs that reference a destroyed variant.
    pub fn purge(&mut self) -> usize {
        let before = self.programs.len();
        self.programs.retain(|p| p.is_alive());
        before - self.programs.len()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }
}

/// Clip planes as the `clipp` uniform array wants them.
pub(crate) fn clip_uniform(ucp: &[[f32; 4]; MAX_CLIP_PLANES]) -> Vec<f32> {
    ucp.iter().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use virgl_shader::SoOutput;

    #[test]
    fn varyings_pad_gaps_and_buffers() {
        let so = SoInfo {
            stride: [8, 4, 0, 0],
            outputs: vec![
                SoOutput {
                    num_components: 4,
                    ..Default::default()
                },
                SoOutput {
                    register_index: 1,
                    num_components: 2,
                    dst_offset: 6,
                    ..Default::default()
                },
                SoOutput {
                    register_index: 2,
                    num_components: 4,
                    output_buffer: 1,
                    ..Default::default()
                },
            ],
        };
        let names = ["a", "b", "c"].map(String::from);
        assert_eq!(
            so_varyings(&so, &names),
            vec!["a", "gl_SkipComponents2", "b", "gl_NextBuffer", "c"]
        );
    }

    #[test]
    fn key_uses_zero_for_missing_stages() {
        let stages: [Option<Rc<ShaderVariant>>; SHADER_TYPES] = Default::default();
        let key = ProgramKey::new(&stages, true);
        assert_eq!(key.ids, [0; SHADER_TYPES]);
        assert!(key.dual_src);
    }
}
