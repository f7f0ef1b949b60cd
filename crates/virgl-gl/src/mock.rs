//! Recording in-memory [`GlApi`] backend.
//!
//! Textures, buffers and framebuffer attachments are backed by byte vectors
//! so uploads, read-backs, blits and image copies round-trip real data.
//! Every call is appended to a log that tests can count. Nothing is
//! rasterized: draws, state setters and queries are only recorded.
//!
//! Fences are signalled immediately unless [`MockGl::set_auto_signal`] turns
//! that off, in which case [`MockGl::signal_all`] releases them.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use gl::types::{GLenum, GLuint};
use parking_lot::{Condvar, Mutex};

use crate::api::{GlApi, GlSync, ImageRegion, SyncStatus};

/// Texel (or compressed block) geometry for an internal format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TexelInfo {
    bytes: usize,
    block_w: usize,
    block_h: usize,
}

impl TexelInfo {
    fn of(ifmt: GLenum) -> Self {
        virgl_core::format::all()
            .find(|d| d.internal_format == ifmt)
            .map(|d| Self {
                bytes: d.block_size as usize,
                block_w: d.block_width as usize,
                block_h: d.block_height as usize,
            })
            .unwrap_or(Self {
                bytes: 4,
                block_w: 1,
                block_h: 1,
            })
    }

    fn compressed(&self) -> bool {
        self.block_w > 1 || self.block_h > 1
    }
}

#[derive(Debug, Clone)]
struct MockLevel {
    width: usize,
    height: usize,
    depth: usize,
    texel: TexelInfo,
    data: Vec<u8>,
}

impl MockLevel {
    fn new(width: usize, height: usize, depth: usize, texel: TexelInfo) -> Self {
        let mut level = Self {
            width: width.max(1),
            height: height.max(1),
            depth: depth.max(1),
            texel,
            data: Vec::new(),
        };
        level.data = vec![0; level.pitch() * level.rows() * level.depth];
        level
    }

    fn cols(&self) -> usize {
        self.width.div_ceil(self.texel.block_w)
    }

    fn rows(&self) -> usize {
        self.height.div_ceil(self.texel.block_h)
    }

    fn pitch(&self) -> usize {
        self.cols() * self.texel.bytes
    }

    fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.rows() + y) * self.pitch() + x * self.texel.bytes
    }
}

#[derive(Debug, Clone, Default)]
struct MockTexture {
    target: GLenum,
    levels: BTreeMap<i32, MockLevel>,
    buffer: Option<GLuint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attachment {
    texture: GLuint,
    level: i32,
    layer: usize,
}

#[derive(Debug, Clone, Default)]
struct MockFbo {
    attachments: HashMap<GLenum, Attachment>,
    draw_buffers: Vec<GLenum>,
    read_buffer: Option<GLenum>,
}

#[derive(Debug, Clone, Default)]
struct MockShader {
    ty: GLenum,
    source: String,
    compiled: bool,
}

#[derive(Debug, Clone, Default)]
struct MockProgram {
    shaders: Vec<GLuint>,
    locations: HashMap<String, i32>,
    varyings: Vec<String>,
}

/// Pixel store state for one direction.
#[derive(Debug, Clone, Copy)]
struct PixelStore {
    row_length: usize,
    image_height: usize,
    alignment: usize,
}

/// Row copy produced by [`region_rows`]: (level offset, client offset, length).
type RowCopy = (usize, usize, usize);

#[derive(Debug)]
struct MockState {
    version: String,
    glsl_version: String,
    extensions: Vec<String>,
    integers: HashMap<GLenum, i32>,
    floats: HashMap<GLenum, Vec<f32>>,
    next_id: GLuint,
    calls: Vec<String>,
    errors: VecDeque<GLenum>,

    textures: HashMap<GLuint, MockTexture>,
    active_unit: u32,
    tex_bindings: HashMap<(u32, GLenum), GLuint>,
    pixel_store: HashMap<GLenum, i32>,

    buffers: HashMap<GLuint, Vec<u8>>,
    buffer_bindings: HashMap<GLenum, GLuint>,

    framebuffers: HashMap<GLuint, MockFbo>,
    draw_fbo: GLuint,
    read_fbo: GLuint,

    shaders: HashMap<GLuint, MockShader>,
    programs: HashMap<GLuint, MockProgram>,
    fail_compile_marker: Option<String>,
    fail_link: bool,
    fail_map: bool,

    samplers: HashSet<GLuint>,
    vertex_arrays: HashSet<GLuint>,
    queries: HashSet<GLuint>,
    transform_feedbacks: HashSet<GLuint>,
    query_result: u64,
    query_available: bool,

    syncs: HashMap<usize, bool>,
    auto_signal: bool,

    bad_deletes: usize,
}

impl MockState {
    fn new(version: &str) -> Self {
        let integers = [
            (gl::MAX_DRAW_BUFFERS, 8),
            (gl::MAX_COLOR_ATTACHMENTS, 8),
            (gl::MAX_TEXTURE_SIZE, 16384),
            (gl::MAX_3D_TEXTURE_SIZE, 2048),
            (gl::MAX_CUBE_MAP_TEXTURE_SIZE, 16384),
            (gl::MAX_ARRAY_TEXTURE_LAYERS, 2048),
            (gl::MAX_SAMPLES, 4),
            (gl::MAX_COLOR_TEXTURE_SAMPLES, 4),
            (gl::MAX_DEPTH_TEXTURE_SAMPLES, 4),
            (gl::MAX_INTEGER_SAMPLES, 4),
            (gl::MAX_TRANSFORM_FEEDBACK_BUFFERS, 4),
            (gl::MAX_DUAL_SOURCE_DRAW_BUFFERS, 1),
            (gl::MAX_VERTEX_ATTRIBS, 16),
            (gl::MAX_VERTEX_UNIFORM_BLOCKS, 14),
            (gl::MAX_TEXTURE_BUFFER_SIZE, 1 << 27),
            (gl::MAX_VIEWPORTS, 16),
            (gl::MAX_GEOMETRY_OUTPUT_VERTICES, 256),
            (gl::MAX_GEOMETRY_TOTAL_OUTPUT_COMPONENTS, 1024),
            (gl::MAX_VERTEX_OUTPUT_COMPONENTS, 128),
            (gl::MIN_PROGRAM_TEXEL_OFFSET, -8),
            (gl::MAX_PROGRAM_TEXEL_OFFSET, 7),
            (gl::MIN_PROGRAM_TEXTURE_GATHER_OFFSET, -32),
            (gl::MAX_PROGRAM_TEXTURE_GATHER_OFFSET, 31),
            (0x8f9f, 4),
            (gl::TEXTURE_BUFFER_OFFSET_ALIGNMENT, 16),
            (gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT, 256),
            (gl::SHADER_STORAGE_BUFFER_OFFSET_ALIGNMENT, 16),
            (gl::MAX_PATCH_VERTICES, 32),
            (gl::MAX_FRAGMENT_SHADER_STORAGE_BLOCKS, 16),
            (gl::MAX_VERTEX_SHADER_STORAGE_BLOCKS, 16),
            (gl::MAX_COMBINED_SHADER_STORAGE_BLOCKS, 96),
            (gl::MAX_FRAGMENT_IMAGE_UNIFORMS, 16),
            (gl::MAX_VERTEX_IMAGE_UNIFORMS, 16),
            (gl::MAX_IMAGE_SAMPLES, 4),
            (gl::MAX_COMPUTE_WORK_GROUP_INVOCATIONS, 1024),
            (gl::MAX_COMPUTE_SHARED_MEMORY_SIZE, 32768),
            (gl::MAX_VERTEX_ATTRIB_STRIDE, 2048),
            (gl::MAX_VERTEX_ATOMIC_COUNTERS, 0),
            (gl::MAX_FRAGMENT_ATOMIC_COUNTERS, 1024),
            (gl::MAX_COMBINED_ATOMIC_COUNTERS, 1024),
            (gl::MAX_FRAGMENT_ATOMIC_COUNTER_BUFFERS, 8),
            (gl::MAX_COMBINED_ATOMIC_COUNTER_BUFFERS, 8),
            (gl::MAX_TESS_PATCH_COMPONENTS, 120),
        ]
        .into_iter()
        .collect();
        let floats = [
            (gl::ALIASED_LINE_WIDTH_RANGE, vec![1.0, 1.0]),
            (gl::SMOOTH_LINE_WIDTH_RANGE, vec![1.0, 8.0]),
            (gl::POINT_SIZE_RANGE, vec![1.0, 255.0]),
            (gl::MAX_TEXTURE_LOD_BIAS, vec![16.0]),
        ]
        .into_iter()
        .collect();
        Self {
            version: version.to_owned(),
            glsl_version: "4.50".to_owned(),
            extensions: Vec::new(),
            integers,
            floats,
            next_id: 1,
            calls: Vec::new(),
            errors: VecDeque::new(),
            textures: HashMap::new(),
            active_unit: 0,
            tex_bindings: HashMap::new(),
            pixel_store: HashMap::new(),
            buffers: HashMap::new(),
            buffer_bindings: HashMap::new(),
            framebuffers: HashMap::new(),
            draw_fbo: 0,
            read_fbo: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            fail_compile_marker: None,
            fail_link: false,
            fail_map: false,
            samplers: HashSet::new(),
            vertex_arrays: HashSet::new(),
            queries: HashSet::new(),
            transform_feedbacks: HashSet::new(),
            query_result: 0,
            query_available: true,
            syncs: HashMap::new(),
            auto_signal: true,
            bad_deletes: 0,
        }
    }

    fn alloc_id(&mut self) -> GLuint {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn store(&self, row_length: GLenum, image_height: GLenum, alignment: GLenum) -> PixelStore {
        let get = |pname| self.pixel_store.get(&pname).copied().unwrap_or(0).max(0) as usize;
        PixelStore {
            row_length: get(row_length),
            image_height: get(image_height),
            alignment: self.pixel_store.get(&alignment).copied().unwrap_or(4).max(1) as usize,
        }
    }

    fn unpack(&self) -> PixelStore {
        self.store(gl::UNPACK_ROW_LENGTH, gl::UNPACK_IMAGE_HEIGHT, gl::UNPACK_ALIGNMENT)
    }

    fn pack(&self) -> PixelStore {
        self.store(gl::PACK_ROW_LENGTH, gl::PACK_IMAGE_HEIGHT, gl::PACK_ALIGNMENT)
    }

    fn bound_texture(&self, target: GLenum) -> Option<GLuint> {
        self.tex_bindings
            .get(&(self.active_unit, binding_target(target)))
            .copied()
            .filter(|id| *id != 0)
    }

    fn bound_texture_mut(&mut self, target: GLenum) -> Option<&mut MockTexture> {
        let id = self.bound_texture(target)?;
        self.textures.get_mut(&id)
    }

    fn bound_buffer_mut(&mut self, target: GLenum) -> Option<&mut Vec<u8>> {
        let id = *self.buffer_bindings.get(&target)?;
        self.buffers.get_mut(&id)
    }

    fn fbo_id(&self, target: GLenum) -> GLuint {
        if target == gl::READ_FRAMEBUFFER {
            self.read_fbo
        } else {
            self.draw_fbo
        }
    }

    fn attach(&mut self, target: GLenum, attachment: GLenum, texture: GLuint, level: i32, layer: usize) {
        let id = self.fbo_id(target);
        let Some(fbo) = self.framebuffers.get_mut(&id) else {
            return;
        };
        if texture == 0 {
            fbo.attachments.remove(&attachment);
        } else {
            fbo.attachments.insert(
                attachment,
                Attachment {
                    texture,
                    level,
                    layer,
                },
            );
        }
    }

    fn read_attachment(&self, format: GLenum) -> Option<Attachment> {
        let fbo = self.framebuffers.get(&self.read_fbo)?;
        let keys: &[GLenum] = match format {
            gl::DEPTH_COMPONENT => &[gl::DEPTH_ATTACHMENT, gl::DEPTH_STENCIL_ATTACHMENT],
            gl::DEPTH_STENCIL => &[gl::DEPTH_STENCIL_ATTACHMENT],
            gl::STENCIL_INDEX => &[gl::STENCIL_ATTACHMENT, gl::DEPTH_STENCIL_ATTACHMENT],
            _ => return fbo
                .attachments
                .get(&fbo.read_buffer.unwrap_or(gl::COLOR_ATTACHMENT0))
                .copied(),
        };
        keys.iter().find_map(|k| fbo.attachments.get(k).copied())
    }

    fn level(&self, att: Attachment) -> Option<&MockLevel> {
        self.textures.get(&att.texture)?.levels.get(&att.level)
    }

    /// Reserve a level for `tex_image_*`, keeping cube faces together.
    fn define_level(&mut self, target: GLenum, level: i32, ifmt: GLenum, w: i32, h: i32, d: i32) -> Option<&mut MockLevel> {
        let texel = TexelInfo::of(ifmt);
        let tex = self.bound_texture_mut(target)?;
        let depth = if cube_face(target).is_some() { 6 } else { d as usize };
        let needs_new = tex
            .levels
            .get(&level)
            .map_or(true, |l| l.width != w as usize || l.height != h as usize || l.depth != depth);
        if needs_new {
            tex.levels
                .insert(level, MockLevel::new(w as usize, h as usize, depth, texel));
        }
        tex.levels.get_mut(&level)
    }

    fn allocate_storage(&mut self, target: GLenum, levels: i32, ifmt: GLenum, w: i32, h: i32, d: i32) {
        let texel = TexelInfo::of(ifmt);
        let Some(tex) = self.bound_texture_mut(target) else {
            return;
        };
        tex.levels.clear();
        for level in 0..levels.max(1) {
            let mw = minify(w, level);
            let (lh, ld) = match target {
                gl::TEXTURE_1D => (1, 1),
                gl::TEXTURE_1D_ARRAY => (h, 1),
                gl::TEXTURE_CUBE_MAP => (minify(h, level), 6),
                gl::TEXTURE_3D => (minify(h, level), minify(d, level)),
                gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP_ARRAY | gl::TEXTURE_2D_MULTISAMPLE_ARRAY => {
                    (minify(h, level), d)
                }
                _ => (minify(h, level), 1),
            };
            tex.levels
                .insert(level, MockLevel::new(mw as usize, lh as usize, ld as usize, texel));
        }
    }

    fn write_texture(&mut self, target: GLenum, level: i32, region: [i32; 6], data: &[u8]) {
        let store = self.unpack();
        let face = cube_face(target);
        let Some(tex) = self.bound_texture_mut(target) else {
            return;
        };
        let Some(lvl) = tex.levels.get_mut(&level) else {
            return;
        };
        let mut region = region;
        if let Some(face) = face {
            region[2] = face as i32;
            region[5] = 1;
        }
        for (dst, src, len) in region_rows(lvl, region, store) {
            if let (Some(d), Some(s)) = (lvl.data.get_mut(dst..dst + len), data.get(src..src + len)) {
                d.copy_from_slice(s);
            }
        }
    }

    fn read_level(&self, lvl: &MockLevel, region: [i32; 6], out: &mut [u8]) {
        let store = self.pack();
        for (src, dst, len) in region_rows(lvl, region, store) {
            if let (Some(s), Some(d)) = (lvl.data.get(src..src + len), out.get_mut(dst..dst + len)) {
                d.copy_from_slice(s);
            }
        }
    }
}

fn minify(value: i32, level: i32) -> i32 {
    (value >> level).max(1)
}

fn cube_face(target: GLenum) -> Option<u32> {
    (gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z)
        .contains(&target)
        .then(|| target - gl::TEXTURE_CUBE_MAP_POSITIVE_X)
}

fn binding_target(target: GLenum) -> GLenum {
    if cube_face(target).is_some() {
        gl::TEXTURE_CUBE_MAP
    } else {
        target
    }
}

fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Row copies between a level and client memory for `[x, y, z, w, h, d]`.
/// Rows that fall outside the level are skipped.
fn region_rows(lvl: &MockLevel, region: [i32; 6], store: PixelStore) -> Vec<RowCopy> {
    let [x, y, z, w, h, d] = region.map(|v| v.max(0) as usize);
    let t = lvl.texel;
    let (x0, y0, cols, rows, row_stride) = if t.compressed() {
        let cols = w.div_ceil(t.block_w);
        (x / t.block_w, y / t.block_h, cols, h.div_ceil(t.block_h), cols * t.bytes)
    } else {
        let row_len = if store.row_length > 0 { store.row_length } else { w };
        (x, y, w, h, align(row_len * t.bytes, store.alignment))
    };
    let image_rows = if !t.compressed() && store.image_height > 0 {
        store.image_height
    } else {
        rows
    };
    let layer_stride = row_stride * image_rows;

    let mut out = Vec::new();
    for layer in 0..d {
        if z + layer >= lvl.depth {
            break;
        }
        for row in 0..rows {
            if y0 + row >= lvl.rows() || x0 >= lvl.cols() {
                continue;
            }
            let len = cols.min(lvl.cols() - x0) * t.bytes;
            out.push((
                lvl.offset(x0, y0 + row, z + layer),
                layer * layer_stride + row * row_stride,
                len,
            ));
        }
    }
    out
}

/// Recording GL backend with in-memory storage.
#[derive(Debug)]
pub struct MockGl {
    state: Mutex<MockState>,
    fence_cv: Condvar,
}

impl Default for MockGl {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGl {
    /// Desktop GL 4.5 core profile with no extensions.
    pub fn new() -> Self {
        Self::with_version("4.5.0 Mock")
    }

    pub fn with_version(version: &str) -> Self {
        Self {
            state: Mutex::new(MockState::new(version)),
            fence_cv: Condvar::new(),
        }
    }

    pub fn add_extension(&self, name: &str) {
        self.state.lock().extensions.push(name.to_owned());
    }

    pub fn set_integer(&self, pname: GLenum, value: i32) {
        self.state.lock().integers.insert(pname, value);
    }

    /// Fail every compile whose source contains `marker`.
    pub fn fail_compile_containing(&self, marker: &str) {
        self.state.lock().fail_compile_marker = Some(marker.to_owned());
    }

    pub fn set_fail_link(&self, fail: bool) {
        self.state.lock().fail_link = fail;
    }

    pub fn set_fail_map(&self, fail: bool) {
        self.state.lock().fail_map = fail;
    }

    pub fn push_error(&self, error: GLenum) {
        self.state.lock().errors.push_back(error);
    }

    pub fn set_query_result(&self, value: u64, available: bool) {
        let mut st = self.state.lock();
        st.query_result = value;
        st.query_available = available;
    }

    pub fn set_auto_signal(&self, auto: bool) {
        self.state.lock().auto_signal = auto;
    }

    /// Signal every outstanding fence and wake waiters.
    pub fn signal_all(&self) {
        let mut st = self.state.lock();
        for signalled in st.syncs.values_mut() {
            *signalled = true;
        }
        drop(st);
        self.fence_cv.notify_all();
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of logged calls to the GL entry point `name` (e.g. `"LinkProgram"`).
    pub fn count(&self, name: &str) -> usize {
        let prefix = format!("{name}(");
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.lock().shaders.len()
    }

    /// Deletes of names that were never generated or already deleted.
    pub fn bad_deletes(&self) -> usize {
        self.state.lock().bad_deletes
    }

    pub fn texture_data(&self, texture: GLuint, level: i32) -> Option<Vec<u8>> {
        let st = self.state.lock();
        st.textures
            .get(&texture)?
            .levels
            .get(&level)
            .map(|l| l.data.clone())
    }

    pub fn buffer_contents(&self, buffer: GLuint) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).cloned()
    }

    /// Sources of every live shader of GL type `ty`, in creation order.
    pub fn shader_sources(&self, ty: GLenum) -> Vec<String> {
        let st = self.state.lock();
        let mut shaders: Vec<_> = st.shaders.iter().filter(|(_, s)| s.ty == ty).collect();
        shaders.sort_by_key(|(id, _)| **id);
        shaders.into_iter().map(|(_, s)| s.source.clone()).collect()
    }

    pub fn transform_feedback_varyings_of(&self, program: GLuint) -> Vec<String> {
        self.state
            .lock()
            .programs
            .get(&program)
            .map(|p| p.varyings.clone())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, cap: GLenum) -> bool {
        let st = self.state.lock();
        let enable = format!("Enable(0x{cap:04x})");
        let disable = format!("Disable(0x{cap:04x})");
        st.calls
            .iter()
            .rev()
            .find(|c| **c == enable || **c == disable)
            .is_some_and(|c| *c == enable)
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }

    fn gen(&self, name: &str, set: impl FnOnce(&mut MockState, GLuint)) -> GLuint {
        let mut st = self.state.lock();
        let id = st.alloc_id();
        set(&mut st, id);
        st.calls.push(format!("{name}({id})"));
        id
    }

    fn delete(&self, name: &str, id: GLuint, remove: impl FnOnce(&mut MockState, GLuint) -> bool) {
        if id == 0 {
            return;
        }
        let mut st = self.state.lock();
        if !remove(&mut st, id) {
            st.bad_deletes += 1;
        }
        st.calls.push(format!("{name}({id})"));
    }
}

impl GlApi for MockGl {
    fn get_string(&self, name: GLenum) -> Option<String> {
        let st = self.state.lock();
        match name {
            gl::VERSION => Some(st.version.clone()),
            gl::SHADING_LANGUAGE_VERSION => Some(st.glsl_version.clone()),
            gl::VENDOR => Some("virgl-mock".to_owned()),
            gl::RENDERER => Some("virgl-mock renderer".to_owned()),
            gl::EXTENSIONS => Some(st.extensions.join(" ")),
            _ => None,
        }
    }

    fn get_string_i(&self, name: GLenum, index: u32) -> Option<String> {
        let st = self.state.lock();
        (name == gl::EXTENSIONS)
            .then(|| st.extensions.get(index as usize).cloned())
            .flatten()
    }

    fn get_integer_v(&self, pname: GLenum, out: &mut [i32]) {
        let st = self.state.lock();
        let value = match pname {
            gl::NUM_EXTENSIONS => st.extensions.len() as i32,
            gl::MAX_COMPUTE_WORK_GROUP_COUNT => 65535,
            gl::MAX_COMPUTE_WORK_GROUP_SIZE => 1024,
            _ => st.integers.get(&pname).copied().unwrap_or(0),
        };
        out.fill(value);
    }

    fn get_float_v(&self, pname: GLenum, out: &mut [f32]) {
        let st = self.state.lock();
        match st.floats.get(&pname) {
            Some(values) => {
                for (o, v) in out.iter_mut().zip(values.iter()) {
                    *o = *v;
                }
            }
            None => out.fill(0.0),
        }
    }

    fn get_error(&self) -> GLenum {
        self.state.lock().errors.pop_front().unwrap_or(gl::NO_ERROR)
    }

    // ---------------------------------------------------------------------------
    // Textures
    // ---------------------------------------------------------------------------

    fn gen_texture(&self) -> GLuint {
        self.gen("GenTextures", |st, id| {
            st.textures.insert(id, MockTexture::default());
        })
    }

    fn delete_texture(&self, id: GLuint) {
        self.delete("DeleteTextures", id, |st, id| {
            st.tex_bindings.retain(|_, bound| *bound != id);
            st.textures.remove(&id).is_some()
        })
    }

    fn active_texture(&self, unit: u32) {
        let mut st = self.state.lock();
        st.active_unit = unit;
        st.calls.push(format!("ActiveTexture({unit})"));
    }

    fn bind_texture(&self, target: GLenum, id: GLuint) {
        let mut st = self.state.lock();
        let unit = st.active_unit;
        st.tex_bindings.insert((unit, target), id);
        if let Some(tex) = st.textures.get_mut(&id) {
            if tex.target == 0 {
                tex.target = target;
            }
        }
        st.calls.push(format!("BindTexture(0x{target:04x}, {id})"));
    }

    fn tex_parameter_i(&self, target: GLenum, pname: GLenum, value: i32) {
        self.record(format!("TexParameteri(0x{target:04x}, 0x{pname:04x}, {value})"));
    }

    fn tex_parameter_f(&self, target: GLenum, pname: GLenum, value: f32) {
        self.record(format!("TexParameterf(0x{target:04x}, 0x{pname:04x}, {value})"));
    }

    fn tex_parameter_fv(&self, target: GLenum, pname: GLenum, value: &[f32; 4]) {
        self.record(format!("TexParameterfv(0x{target:04x}, 0x{pname:04x}, {value:?})"));
    }

    fn tex_storage_1d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32) {
        let mut st = self.state.lock();
        st.allocate_storage(target, levels, ifmt, width, 1, 1);
        st.calls.push(format!("TexStorage1D(0x{target:04x}, {levels}, 0x{ifmt:04x}, {width})"));
    }

    fn tex_storage_2d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32, height: i32) {
        let mut st = self.state.lock();
        st.allocate_storage(target, levels, ifmt, width, height, 1);
        st.calls
            .push(format!("TexStorage2D(0x{target:04x}, {levels}, 0x{ifmt:04x}, {width}, {height})"));
    }

    fn tex_storage_3d(&self, target: GLenum, levels: i32, ifmt: GLenum, width: i32, height: i32, depth: i32) {
        let mut st = self.state.lock();
        st.allocate_storage(target, levels, ifmt, width, height, depth);
        st.calls.push(format!(
            "TexStorage3D(0x{target:04x}, {levels}, 0x{ifmt:04x}, {width}, {height}, {depth})"
        ));
    }

    fn tex_storage_2d_multisample(&self, target: GLenum, samples: i32, ifmt: GLenum, width: i32, height: i32, _fixed: bool) {
        let mut st = self.state.lock();
        st.allocate_storage(target, 1, ifmt, width, height, 1);
        st.calls.push(format!(
            "TexStorage2DMultisample(0x{target:04x}, {samples}, 0x{ifmt:04x}, {width}, {height})"
        ));
    }

    fn tex_storage_3d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        _fixed: bool,
    ) {
        let mut st = self.state.lock();
        st.allocate_storage(target, 1, ifmt, width, height, depth);
        st.calls.push(format!(
            "TexStorage3DMultisample(0x{target:04x}, {samples}, 0x{ifmt:04x}, {width}, {height}, {depth})"
        ));
    }

    fn tex_image_2d_multisample(&self, target: GLenum, samples: i32, ifmt: GLenum, width: i32, height: i32, _fixed: bool) {
        let mut st = self.state.lock();
        st.allocate_storage(target, 1, ifmt, width, height, 1);
        st.calls.push(format!(
            "TexImage2DMultisample(0x{target:04x}, {samples}, 0x{ifmt:04x}, {width}, {height})"
        ));
    }

    fn tex_image_3d_multisample(
        &self,
        target: GLenum,
        samples: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        _fixed: bool,
    ) {
        let mut st = self.state.lock();
        st.allocate_storage(target, 1, ifmt, width, height, depth);
        st.calls.push(format!(
            "TexImage3DMultisample(0x{target:04x}, {samples}, 0x{ifmt:04x}, {width}, {height}, {depth})"
        ));
    }

    fn tex_image_1d(&self, target: GLenum, level: i32, ifmt: GLenum, width: i32, _format: GLenum, _ty: GLenum, data: Option<&[u8]>) {
        let mut st = self.state.lock();
        st.define_level(target, level, ifmt, width, 1, 1);
        if let Some(data) = data {
            st.write_texture(target, level, [0, 0, 0, width, 1, 1], data);
        }
        st.calls.push(format!("TexImage1D(0x{target:04x}, {level}, 0x{ifmt:04x}, {width})"));
    }

    fn tex_image_2d(
        &self,
        target: GLenum,
        level: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        _format: GLenum,
        _ty: GLenum,
        data: Option<&[u8]>,
    ) {
        let mut st = self.state.lock();
        st.define_level(target, level, ifmt, width, height, 1);
        if let Some(data) = data {
            st.write_texture(target, level, [0, 0, 0, width, height, 1], data);
        }
        st.calls.push(format!(
            "TexImage2D(0x{target:04x}, {level}, 0x{ifmt:04x}, {width}, {height})"
        ));
    }

    fn tex_image_3d(
        &self,
        target: GLenum,
        level: i32,
        ifmt: GLenum,
        width: i32,
        height: i32,
        depth: i32,
        _format: GLenum,
        _ty: GLenum,
        data: Option<&[u8]>,
    ) {
        let mut st = self.state.lock();
        st.define_level(target, level, ifmt, width, height, depth);
        if let Some(data) = data {
            st.write_texture(target, level, [0, 0, 0, width, height, depth], data);
        }
        st.calls.push(format!(
            "TexImage3D(0x{target:04x}, {level}, 0x{ifmt:04x}, {width}, {height}, {depth})"
        ));
    }

    fn tex_sub_image_1d(&self, target: GLenum, level: i32, x: i32, width: i32, _format: GLenum, _ty: GLenum, data: &[u8]) {
        let mut st = self.state.lock();
        st.write_texture(target, level, [x, 0, 0, width, 1, 1], data);
        st.calls.push(format!("TexSubImage1D(0x{target:04x}, {level}, {x}, {width})"));
    }

    fn tex_sub_image_2d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        _format: GLenum,
        _ty: GLenum,
        data: &[u8],
    ) {
        let mut st = self.state.lock();
        st.write_texture(target, level, [x, y, 0, width, height, 1], data);
        st.calls.push(format!(
            "TexSubImage2D(0x{target:04x}, {level}, {x}, {y}, {width}, {height})"
        ));
    }

    fn tex_sub_image_3d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        _format: GLenum,
        _ty: GLenum,
        data: &[u8],
    ) {
        let mut st = self.state.lock();
        st.write_texture(target, level, [x, y, z, width, height, depth], data);
        st.calls.push(format!(
            "TexSubImage3D(0x{target:04x}, {level}, {x}, {y}, {z}, {width}, {height}, {depth})"
        ));
    }

    fn compressed_tex_sub_image_2d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        _ifmt: GLenum,
        data: &[u8],
    ) {
        let mut st = self.state.lock();
        st.write_texture(target, level, [x, y, 0, width, height, 1], data);
        st.calls.push(format!(
            "CompressedTexSubImage2D(0x{target:04x}, {level}, {x}, {y}, {width}, {height})"
        ));
    }

    fn compressed_tex_sub_image_3d(
        &self,
        target: GLenum,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        _ifmt: GLenum,
        data: &[u8],
    ) {
        let mut st = self.state.lock();
        st.write_texture(target, level, [x, y, z, width, height, depth], data);
        st.calls.push(format!(
            "CompressedTexSubImage3D(0x{target:04x}, {level}, {x}, {y}, {z}, {width}, {height}, {depth})"
        ));
    }

    fn get_tex_image(&self, target: GLenum, level: i32, _format: GLenum, _ty: GLenum, out: &mut [u8]) {
        let mut st = self.state.lock();
        st.calls.push(format!("GetTexImage(0x{target:04x}, {level})"));
        let face = cube_face(target);
        let Some(lvl) = st
            .bound_texture(target)
            .and_then(|id| st.textures.get(&id))
            .and_then(|t| t.levels.get(&level))
        else {
            return;
        };
        let region = match face {
            Some(face) => [0, 0, face as i32, lvl.width as i32, lvl.height as i32, 1],
            None => [0, 0, 0, lvl.width as i32, lvl.height as i32, lvl.depth as i32],
        };
        st.read_level(lvl, region, out);
    }

    fn get_compressed_tex_image(&self, target: GLenum, level: i32, out: &mut [u8]) {
        let mut st = self.state.lock();
        st.calls.push(format!("GetCompressedTexImage(0x{target:04x}, {level})"));
        let data = st
            .bound_texture(target)
            .and_then(|id| st.textures.get(&id))
            .and_then(|t| t.levels.get(&level))
            .map(|l| l.data.as_slice())
            .unwrap_or(&[]);
        let len = data.len().min(out.len());
        out[..len].copy_from_slice(&data[..len]);
    }

    fn tex_buffer(&self, ifmt: GLenum, buffer: GLuint) {
        let mut st = self.state.lock();
        if let Some(tex) = st.bound_texture_mut(gl::TEXTURE_BUFFER) {
            tex.buffer = Some(buffer);
        }
        st.calls.push(format!("TexBuffer(0x{ifmt:04x}, {buffer})"));
    }

    fn tex_buffer_range(&self, ifmt: GLenum, buffer: GLuint, offset: usize, size: usize) {
        let mut st = self.state.lock();
        if let Some(tex) = st.bound_texture_mut(gl::TEXTURE_BUFFER) {
            tex.buffer = Some(buffer);
        }
        st.calls
            .push(format!("TexBufferRange(0x{ifmt:04x}, {buffer}, {offset}, {size})"));
    }

    fn pixel_store_i(&self, pname: GLenum, value: i32) {
        let mut st = self.state.lock();
        st.pixel_store.insert(pname, value);
        st.calls.push(format!("PixelStorei(0x{pname:04x}, {value})"));
    }

    // ---------------------------------------------------------------------------
    // Buffers
    // ---------------------------------------------------------------------------

    fn gen_buffer(&self) -> GLuint {
        self.gen("GenBuffers", |st, id| {
            st.buffers.insert(id, Vec::new());
        })
    }

    fn delete_buffer(&self, id: GLuint) {
        self.delete("DeleteBuffers", id, |st, id| {
            st.buffer_bindings.retain(|_, bound| *bound != id);
            st.buffers.remove(&id).is_some()
        })
    }

    fn bind_buffer(&self, target: GLenum, id: GLuint) {
        let mut st = self.state.lock();
        st.buffer_bindings.insert(target, id);
        st.calls.push(format!("BindBuffer(0x{target:04x}, {id})"));
    }

    fn buffer_data(&self, target: GLenum, size: usize, data: Option<&[u8]>, usage: GLenum) {
        let mut st = self.state.lock();
        if let Some(buf) = st.bound_buffer_mut(target) {
            *buf = vec![0; size];
            if let Some(data) = data {
                let len = data.len().min(size);
                buf[..len].copy_from_slice(&data[..len]);
            }
        }
        st.calls
            .push(format!("BufferData(0x{target:04x}, {size}, 0x{usage:04x})"));
    }

    fn buffer_sub_data(&self, target: GLenum, offset: usize, data: &[u8]) {
        let mut st = self.state.lock();
        if let Some(dst) = st
            .bound_buffer_mut(target)
            .and_then(|buf| buf.get_mut(offset..offset + data.len()))
        {
            dst.copy_from_slice(data);
        }
        st.calls
            .push(format!("BufferSubData(0x{target:04x}, {offset}, {})", data.len()));
    }

    fn get_buffer_sub_data(&self, target: GLenum, offset: usize, out: &mut [u8]) {
        let mut st = self.state.lock();
        let len = out.len();
        if let Some(src) = st
            .bound_buffer_mut(target)
            .and_then(|buf| buf.get(offset..offset + len))
        {
            out.copy_from_slice(src);
        }
        st.calls
            .push(format!("GetBufferSubData(0x{target:04x}, {offset}, {len})"));
    }

    unsafe fn map_buffer_range(&self, target: GLenum, offset: usize, len: usize, access: u32) -> *mut u8 {
        let mut st = self.state.lock();
        st.calls.push(format!(
            "MapBufferRange(0x{target:04x}, {offset}, {len}, 0x{access:x})"
        ));
        if st.fail_map {
            return std::ptr::null_mut();
        }
        match st
            .bound_buffer_mut(target)
            .and_then(|buf| buf.get_mut(offset..offset + len))
        {
            Some(range) => range.as_mut_ptr(),
            None => std::ptr::null_mut(),
        }
    }

    fn unmap_buffer(&self, target: GLenum) -> bool {
        self.record(format!("UnmapBuffer(0x{target:04x})"));
        true
    }

    fn bind_buffer_base(&self, target: GLenum, index: u32, id: GLuint) {
        let mut st = self.state.lock();
        st.buffer_bindings.insert(target, id);
        st.calls
            .push(format!("BindBufferBase(0x{target:04x}, {index}, {id})"));
    }

    fn bind_buffer_range(&self, target: GLenum, index: u32, id: GLuint, offset: usize, size: usize) {
        let mut st = self.state.lock();
        st.buffer_bindings.insert(target, id);
        st.calls.push(format!(
            "BindBufferRange(0x{target:04x}, {index}, {id}, {offset}, {size})"
        ));
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: GLenum,
        write_target: GLenum,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        let mut st = self.state.lock();
        let chunk = st
            .bound_buffer_mut(read_target)
            .and_then(|buf| buf.get(read_offset..read_offset + size))
            .map(<[u8]>::to_vec);
        if let Some(chunk) = chunk {
            if let Some(dst) = st
                .bound_buffer_mut(write_target)
                .and_then(|buf| buf.get_mut(write_offset..write_offset + size))
            {
                dst.copy_from_slice(&chunk);
            }
        }
        st.calls.push(format!(
            "CopyBufferSubData(0x{read_target:04x}, 0x{write_target:04x}, {read_offset}, {write_offset}, {size})"
        ));
    }

    // ---------------------------------------------------------------------------
    // Framebuffers
    // ---------------------------------------------------------------------------

    fn gen_framebuffer(&self) -> GLuint {
        self.gen("GenFramebuffers", |st, id| {
            st.framebuffers.insert(id, MockFbo::default());
        })
    }

    fn delete_framebuffer(&self, id: GLuint) {
        self.delete("DeleteFramebuffers", id, |st, id| {
            if st.draw_fbo == id {
                st.draw_fbo = 0;
            }
            if st.read_fbo == id {
                st.read_fbo = 0;
            }
            st.framebuffers.remove(&id).is_some()
        })
    }

    fn bind_framebuffer(&self, target: GLenum, id: GLuint) {
        let mut st = self.state.lock();
        match target {
            gl::READ_FRAMEBUFFER => st.read_fbo = id,
            gl::DRAW_FRAMEBUFFER => st.draw_fbo = id,
            _ => {
                st.read_fbo = id;
                st.draw_fbo = id;
            }
        }
        st.calls
            .push(format!("BindFramebuffer(0x{target:04x}, {id})"));
    }

    fn framebuffer_texture(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: i32) {
        let mut st = self.state.lock();
        st.attach(target, attachment, texture, level, 0);
        st.calls.push(format!(
            "FramebufferTexture(0x{target:04x}, 0x{attachment:04x}, {texture}, {level})"
        ));
    }

    fn framebuffer_texture_2d(&self, target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: i32) {
        let mut st = self.state.lock();
        let layer = cube_face(textarget).unwrap_or(0) as usize;
        st.attach(target, attachment, texture, level, layer);
        st.calls.push(format!(
            "FramebufferTexture2D(0x{target:04x}, 0x{attachment:04x}, 0x{textarget:04x}, {texture}, {level})"
        ));
    }

    fn framebuffer_texture_layer(&self, target: GLenum, attachment: GLenum, texture: GLuint, level: i32, layer: i32) {
        let mut st = self.state.lock();
        st.attach(target, attachment, texture, level, layer.max(0) as usize);
        st.calls.push(format!(
            "FramebufferTextureLayer(0x{target:04x}, 0x{attachment:04x}, {texture}, {level}, {layer})"
        ));
    }

    fn framebuffer_parameter_i(&self, target: GLenum, pname: GLenum, value: i32) {
        self.record(format!(
            "FramebufferParameteri(0x{target:04x}, 0x{pname:04x}, {value})"
        ));
    }

    fn check_framebuffer_status(&self, target: GLenum) -> GLenum {
        self.record(format!("CheckFramebufferStatus(0x{target:04x})"));
        gl::FRAMEBUFFER_COMPLETE
    }

    fn draw_buffers(&self, buffers: &[GLenum]) {
        let mut st = self.state.lock();
        let id = st.draw_fbo;
        if let Some(fbo) = st.framebuffers.get_mut(&id) {
            fbo.draw_buffers = buffers.to_vec();
        }
        st.calls.push(format!("DrawBuffers({buffers:?})"));
    }

    fn read_buffer(&self, mode: GLenum) {
        let mut st = self.state.lock();
        let id = st.read_fbo;
        if let Some(fbo) = st.framebuffers.get_mut(&id) {
            fbo.read_buffer = Some(mode);
        }
        st.calls.push(format!("ReadBuffer(0x{mode:04x})"));
    }

    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: GLenum) {
        let mut st = self.state.lock();
        st.calls.push(format!(
            "BlitFramebuffer({src:?}, {dst:?}, 0x{mask:x}, 0x{filter:04x})"
        ));

        let mut pairs = Vec::new();
        if mask & gl::COLOR_BUFFER_BIT != 0 {
            let dst_keys = st
                .framebuffers
                .get(&st.draw_fbo)
                .map(|f| {
                    if f.draw_buffers.is_empty() {
                        vec![gl::COLOR_ATTACHMENT0]
                    } else {
                        f.draw_buffers.iter().copied().filter(|b| *b != gl::NONE).collect()
                    }
                })
                .unwrap_or_default();
            if let Some(src_att) = st.read_attachment(gl::RGBA) {
                for key in dst_keys {
                    if let Some(dst_att) = st.framebuffers.get(&st.draw_fbo).and_then(|f| f.attachments.get(&key)) {
                        pairs.push((src_att, *dst_att));
                    }
                }
            }
        }
        if mask & (gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT) != 0 {
            let src_att = st.read_attachment(gl::DEPTH_COMPONENT);
            let dst_att = st.framebuffers.get(&st.draw_fbo).and_then(|f| {
                f.attachments
                    .get(&gl::DEPTH_STENCIL_ATTACHMENT)
                    .or_else(|| f.attachments.get(&gl::DEPTH_ATTACHMENT))
                    .copied()
            });
            if let (Some(s), Some(d)) = (src_att, dst_att) {
                pairs.push((s, d));
            }
        }

        for (src_att, dst_att) in pairs {
            let Some(src_level) = st.level(src_att).cloned() else {
                continue;
            };
            let Some(dst_level) = st
                .textures
                .get_mut(&dst_att.texture)
                .and_then(|t| t.levels.get_mut(&dst_att.level))
            else {
                continue;
            };
            blit_nearest(&src_level, src_att.layer, src, dst_level, dst_att.layer, dst);
        }
    }

    fn read_pixels(&self, x: i32, y: i32, width: i32, height: i32, format: GLenum, ty: GLenum, out: &mut [u8]) {
        let mut st = self.state.lock();
        st.calls.push(format!(
            "ReadPixels({x}, {y}, {width}, {height}, 0x{format:04x}, 0x{ty:04x})"
        ));
        let Some(att) = st.read_attachment(format) else {
            return;
        };
        let Some(lvl) = st.level(att) else {
            return;
        };
        st.read_level(lvl, [x, y, att.layer as i32, width, height, 1], out);
    }

    fn copy_image_sub_data(&self, src: ImageRegion, dst: ImageRegion, width: i32, height: i32, depth: i32) {
        let mut st = self.state.lock();
        st.calls.push(format!(
            "CopyImageSubData({}, {}, {}, {width}, {height}, {depth})",
            src.name, dst.name, src.level
        ));
        let Some(src_level) = st
            .textures
            .get(&src.name)
            .and_then(|t| t.levels.get(&src.level))
            .cloned()
        else {
            return;
        };
        let Some(dst_level) = st
            .textures
            .get_mut(&dst.name)
            .and_then(|t| t.levels.get_mut(&dst.level))
        else {
            return;
        };
        let tight = PixelStore {
            row_length: 0,
            image_height: 0,
            alignment: 1,
        };
        let mut staging = vec![0u8; src_level.data.len()];
        let src_rows = region_rows(&src_level, [src.x, src.y, src.z, width, height, depth], tight);
        for (from, to, len) in &src_rows {
            if let (Some(s), Some(d)) = (src_level.data.get(*from..from + len), staging.get_mut(*to..to + len)) {
                d.copy_from_slice(s);
            }
        }
        for (to, from, len) in region_rows(dst_level, [dst.x, dst.y, dst.z, width, height, depth], tight) {
            if let (Some(s), Some(d)) = (staging.get(from..from + len), dst_level.data.get_mut(to..to + len)) {
                d.copy_from_slice(s);
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Shaders and programs
    // ---------------------------------------------------------------------------

    fn create_shader(&self, ty: GLenum) -> GLuint {
        self.gen("CreateShader", |st, id| {
            st.shaders.insert(
                id,
                MockShader {
                    ty,
                    ..Default::default()
                },
            );
        })
    }

    fn shader_source(&self, id: GLuint, source: &str) {
        let mut st = self.state.lock();
        if let Some(shader) = st.shaders.get_mut(&id) {
            shader.source = source.to_owned();
        }
        st.calls.push(format!("ShaderSource({id})"));
    }

    fn compile_shader(&self, id: GLuint) -> bool {
        let mut st = self.state.lock();
        st.calls.push(format!("CompileShader({id})"));
        let marker = st.fail_compile_marker.clone();
        match st.shaders.get_mut(&id) {
            Some(shader) => {
                shader.compiled = marker.map_or(true, |m| !shader.source.contains(&m));
                shader.compiled
            }
            None => false,
        }
    }

    fn shader_info_log(&self, id: GLuint) -> String {
        let st = self.state.lock();
        match st.shaders.get(&id) {
            Some(shader) if !shader.compiled => "0:1(1): error: mock compile failure".to_owned(),
            _ => String::new(),
        }
    }

    fn delete_shader(&self, id: GLuint) {
        self.delete("DeleteShader", id, |st, id| st.shaders.remove(&id).is_some())
    }

    fn create_program(&self) -> GLuint {
        self.gen("CreateProgram", |st, id| {
            st.programs.insert(id, MockProgram::default());
        })
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        let mut st = self.state.lock();
        if let Some(p) = st.programs.get_mut(&program) {
            p.shaders.push(shader);
        }
        st.calls.push(format!("AttachShader({program}, {shader})"));
    }

    fn link_program(&self, program: GLuint) -> bool {
        let mut st = self.state.lock();
        st.calls.push(format!("LinkProgram({program})"));
        if st.fail_link {
            return false;
        }
        st.programs.get(&program).is_some_and(|p| {
            p.shaders
                .iter()
                .all(|s| st.shaders.get(s).is_some_and(|s| s.compiled))
        })
    }

    fn program_info_log(&self, program: GLuint) -> String {
        if self.state.lock().fail_link {
            format!("error: mock link failure for program {program}")
        } else {
            String::new()
        }
    }

    fn delete_program(&self, program: GLuint) {
        self.delete("DeleteProgram", program, |st, id| st.programs.remove(&id).is_some())
    }

    fn use_program(&self, program: GLuint) {
        self.record(format!("UseProgram({program})"));
    }

    fn get_uniform_location(&self, program: GLuint, name: &str) -> i32 {
        let mut st = self.state.lock();
        let Some(p) = st.programs.get_mut(&program) else {
            return -1;
        };
        let next = p.locations.len() as i32;
        *p.locations.entry(name.to_owned()).or_insert(next)
    }

    fn get_attrib_location(&self, program: GLuint, name: &str) -> i32 {
        self.get_uniform_location(program, name)
    }

    fn bind_attrib_location(&self, program: GLuint, index: u32, name: &str) {
        self.record(format!("BindAttribLocation({program}, {index}, {name})"));
    }

    fn get_uniform_block_index(&self, program: GLuint, name: &str) -> u32 {
        self.get_uniform_location(program, name).max(0) as u32
    }

    fn uniform_block_binding(&self, program: GLuint, index: u32, binding: u32) {
        self.record(format!("UniformBlockBinding({program}, {index}, {binding})"));
    }

    fn get_program_resource_index(&self, program: GLuint, _interface: GLenum, name: &str) -> u32 {
        self.get_uniform_location(program, name).max(0) as u32
    }

    fn shader_storage_block_binding(&self, program: GLuint, index: u32, binding: u32) {
        self.record(format!("ShaderStorageBlockBinding({program}, {index}, {binding})"));
    }

    fn transform_feedback_varyings(&self, program: GLuint, varyings: &[String], mode: GLenum) {
        let mut st = self.state.lock();
        if let Some(p) = st.programs.get_mut(&program) {
            p.varyings = varyings.to_vec();
        }
        st.calls.push(format!(
            "TransformFeedbackVaryings({program}, {varyings:?}, 0x{mode:04x})"
        ));
    }

    fn bind_frag_data_location_indexed(&self, program: GLuint, color: u32, index: u32, name: &str) {
        self.record(format!(
            "BindFragDataLocationIndexed({program}, {color}, {index}, {name})"
        ));
    }

    fn uniform_1i(&self, location: i32, value: i32) {
        self.record(format!("Uniform1i({location}, {value})"));
    }

    fn uniform_1f(&self, location: i32, value: f32) {
        self.record(format!("Uniform1f({location}, {value})"));
    }

    fn uniform_4fv(&self, location: i32, values: &[f32]) {
        self.record(format!("Uniform4fv({location}, {})", values.len() / 4));
    }

    fn uniform_4uiv(&self, location: i32, values: &[u32]) {
        self.record(format!("Uniform4uiv({location}, {})", values.len() / 4));
    }

    // ---------------------------------------------------------------------------
    // Fixed function
    // ---------------------------------------------------------------------------

    fn enable(&self, cap: GLenum) {
        self.record(format!("Enable(0x{cap:04x})"));
    }

    fn disable(&self, cap: GLenum) {
        self.record(format!("Disable(0x{cap:04x})"));
    }

    fn enable_i(&self, cap: GLenum, index: u32) {
        self.record(format!("Enablei(0x{cap:04x}, {index})"));
    }

    fn disable_i(&self, cap: GLenum, index: u32) {
        self.record(format!("Disablei(0x{cap:04x}, {index})"));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("Viewport({x}, {y}, {width}, {height})"));
    }

    fn viewport_indexed(&self, index: u32, x: f32, y: f32, width: f32, height: f32) {
        self.record(format!("ViewportIndexedf({index}, {x}, {y}, {width}, {height})"));
    }

    fn depth_range(&self, near: f64, far: f64) {
        self.record(format!("DepthRange({near}, {far})"));
    }

    fn depth_range_indexed(&self, index: u32, near: f64, far: f64) {
        self.record(format!("DepthRangeIndexed({index}, {near}, {far})"));
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("Scissor({x}, {y}, {width}, {height})"));
    }

    fn scissor_indexed(&self, index: u32, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("ScissorIndexed({index}, {x}, {y}, {width}, {height})"));
    }

    fn front_face(&self, mode: GLenum) {
        self.record(format!("FrontFace(0x{mode:04x})"));
    }

    fn cull_face(&self, mode: GLenum) {
        self.record(format!("CullFace(0x{mode:04x})"));
    }

    fn polygon_mode(&self, face: GLenum, mode: GLenum) {
        self.record(format!("PolygonMode(0x{face:04x}, 0x{mode:04x})"));
    }

    fn line_width(&self, width: f32) {
        self.record(format!("LineWidth({width})"));
    }

    fn point_size(&self, size: f32) {
        self.record(format!("PointSize({size})"));
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        self.record(format!("PolygonOffset({factor}, {units})"));
    }

    fn polygon_offset_clamp(&self, factor: f32, units: f32, clamp: f32) {
        self.record(format!("PolygonOffsetClamp({factor}, {units}, {clamp})"));
    }

    fn stencil_func_separate(&self, face: GLenum, func: GLenum, reference: i32, mask: u32) {
        self.record(format!(
            "StencilFuncSeparate(0x{face:04x}, 0x{func:04x}, {reference}, 0x{mask:x})"
        ));
    }

    fn stencil_op_separate(&self, face: GLenum, sfail: GLenum, dpfail: GLenum, dppass: GLenum) {
        self.record(format!(
            "StencilOpSeparate(0x{face:04x}, 0x{sfail:04x}, 0x{dpfail:04x}, 0x{dppass:04x})"
        ));
    }

    fn stencil_mask_separate(&self, face: GLenum, mask: u32) {
        self.record(format!("StencilMaskSeparate(0x{face:04x}, 0x{mask:x})"));
    }

    fn depth_func(&self, func: GLenum) {
        self.record(format!("DepthFunc(0x{func:04x})"));
    }

    fn depth_mask(&self, enable: bool) {
        self.record(format!("DepthMask({enable})"));
    }

    fn blend_func_separate(&self, src_rgb: GLenum, dst_rgb: GLenum, src_a: GLenum, dst_a: GLenum) {
        self.record(format!(
            "BlendFuncSeparate(0x{src_rgb:04x}, 0x{dst_rgb:04x}, 0x{src_a:04x}, 0x{dst_a:04x})"
        ));
    }

    fn blend_func_separate_i(&self, buf: u32, src_rgb: GLenum, dst_rgb: GLenum, src_a: GLenum, dst_a: GLenum) {
        self.record(format!(
            "BlendFuncSeparatei({buf}, 0x{src_rgb:04x}, 0x{dst_rgb:04x}, 0x{src_a:04x}, 0x{dst_a:04x})"
        ));
    }

    fn blend_equation_separate(&self, rgb: GLenum, alpha: GLenum) {
        self.record(format!("BlendEquationSeparate(0x{rgb:04x}, 0x{alpha:04x})"));
    }

    fn blend_equation_separate_i(&self, buf: u32, rgb: GLenum, alpha: GLenum) {
        self.record(format!("BlendEquationSeparatei({buf}, 0x{rgb:04x}, 0x{alpha:04x})"));
    }

    fn blend_color(&self, color: [f32; 4]) {
        self.record(format!("BlendColor({color:?})"));
    }

    fn color_mask(&self, mask: [bool; 4]) {
        self.record(format!("ColorMask({mask:?})"));
    }

    fn color_mask_i(&self, buf: u32, mask: [bool; 4]) {
        self.record(format!("ColorMaski({buf}, {mask:?})"));
    }

    fn logic_op(&self, op: GLenum) {
        self.record(format!("LogicOp(0x{op:04x})"));
    }

    fn clear_color(&self, color: [f32; 4]) {
        self.record(format!("ClearColor({color:?})"));
    }

    fn clear_depth(&self, depth: f64) {
        self.record(format!("ClearDepth({depth})"));
    }

    fn clear_stencil(&self, stencil: i32) {
        self.record(format!("ClearStencil({stencil})"));
    }

    fn clear(&self, mask: u32) {
        self.record(format!("Clear(0x{mask:x})"));
    }

    fn clear_buffer_fv(&self, buffer: GLenum, draw_buffer: i32, value: &[f32; 4]) {
        self.record(format!("ClearBufferfv(0x{buffer:04x}, {draw_buffer}, {value:?})"));
    }

    fn clear_buffer_iv(&self, buffer: GLenum, draw_buffer: i32, value: &[i32; 4]) {
        self.record(format!("ClearBufferiv(0x{buffer:04x}, {draw_buffer}, {value:?})"));
    }

    fn clear_buffer_uiv(&self, buffer: GLenum, draw_buffer: i32, value: &[u32; 4]) {
        self.record(format!("ClearBufferuiv(0x{buffer:04x}, {draw_buffer}, {value:?})"));
    }

    fn sample_mask_i(&self, index: u32, mask: u32) {
        self.record(format!("SampleMaski({index}, 0x{mask:x})"));
    }

    fn min_sample_shading(&self, value: f32) {
        self.record(format!("MinSampleShading({value})"));
    }

    fn patch_parameter_i(&self, pname: GLenum, value: i32) {
        self.record(format!("PatchParameteri(0x{pname:04x}, {value})"));
    }

    fn patch_parameter_fv(&self, pname: GLenum, values: &[f32]) {
        self.record(format!("PatchParameterfv(0x{pname:04x}, {values:?})"));
    }

    fn primitive_restart_index(&self, index: u32) {
        self.record(format!("PrimitiveRestartIndex({index})"));
    }

    fn provoking_vertex(&self, mode: GLenum) {
        self.record(format!("ProvokingVertex(0x{mode:04x})"));
    }

    // ---------------------------------------------------------------------------
    // Vertex arrays
    // ---------------------------------------------------------------------------

    fn gen_vertex_array(&self) -> GLuint {
        self.gen("GenVertexArrays", |st, id| {
            st.vertex_arrays.insert(id);
        })
    }

    fn delete_vertex_array(&self, id: GLuint) {
        self.delete("DeleteVertexArrays", id, |st, id| st.vertex_arrays.remove(&id))
    }

    fn bind_vertex_array(&self, id: GLuint) {
        self.record(format!("BindVertexArray({id})"));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(format!("EnableVertexAttribArray({index})"));
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        self.record(format!("DisableVertexAttribArray({index})"));
    }

    fn vertex_attrib_pointer(&self, index: u32, size: i32, ty: GLenum, normalized: bool, stride: i32, offset: usize) {
        self.record(format!(
            "VertexAttribPointer({index}, {size}, 0x{ty:04x}, {normalized}, {stride}, {offset})"
        ));
    }

    fn vertex_attrib_i_pointer(&self, index: u32, size: i32, ty: GLenum, stride: i32, offset: usize) {
        self.record(format!(
            "VertexAttribIPointer({index}, {size}, 0x{ty:04x}, {stride}, {offset})"
        ));
    }

    fn vertex_attrib_divisor(&self, index: u32, divisor: u32) {
        self.record(format!("VertexAttribDivisor({index}, {divisor})"));
    }

    // ---------------------------------------------------------------------------
    // Draws and compute
    // ---------------------------------------------------------------------------

    fn draw_arrays(&self, mode: GLenum, first: i32, count: i32) {
        self.record(format!("DrawArrays(0x{mode:04x}, {first}, {count})"));
    }

    fn draw_arrays_instanced(&self, mode: GLenum, first: i32, count: i32, instances: i32) {
        self.record(format!(
            "DrawArraysInstanced(0x{mode:04x}, {first}, {count}, {instances})"
        ));
    }

    fn draw_arrays_instanced_base_instance(&self, mode: GLenum, first: i32, count: i32, instances: i32, base_instance: u32) {
        self.record(format!(
            "DrawArraysInstancedBaseInstance(0x{mode:04x}, {first}, {count}, {instances}, {base_instance})"
        ));
    }

    fn draw_elements_base_vertex(&self, mode: GLenum, count: i32, ty: GLenum, offset: usize, base_vertex: i32) {
        self.record(format!(
            "DrawElementsBaseVertex(0x{mode:04x}, {count}, 0x{ty:04x}, {offset}, {base_vertex})"
        ));
    }

    fn draw_elements_instanced_base_vertex(
        &self,
        mode: GLenum,
        count: i32,
        ty: GLenum,
        offset: usize,
        instances: i32,
        base_vertex: i32,
    ) {
        self.record(format!(
            "DrawElementsInstancedBaseVertex(0x{mode:04x}, {count}, 0x{ty:04x}, {offset}, {instances}, {base_vertex})"
        ));
    }

    fn draw_range_elements_base_vertex(
        &self,
        mode: GLenum,
        start: u32,
        end: u32,
        count: i32,
        ty: GLenum,
        offset: usize,
        base_vertex: i32,
    ) {
        self.record(format!(
            "DrawRangeElementsBaseVertex(0x{mode:04x}, {start}, {end}, {count}, 0x{ty:04x}, {offset}, {base_vertex})"
        ));
    }

    fn draw_arrays_indirect(&self, mode: GLenum, offset: usize) {
        self.record(format!("DrawArraysIndirect(0x{mode:04x}, {offset})"));
    }

    fn draw_elements_indirect(&self, mode: GLenum, ty: GLenum, offset: usize) {
        self.record(format!("DrawElementsIndirect(0x{mode:04x}, 0x{ty:04x}, {offset})"));
    }

    fn dispatch_compute(&self, x: u32, y: u32, z: u32) {
        self.record(format!("DispatchCompute({x}, {y}, {z})"));
    }

    fn dispatch_compute_indirect(&self, offset: usize) {
        self.record(format!("DispatchComputeIndirect({offset})"));
    }

    fn memory_barrier(&self, bits: u32) {
        self.record(format!("MemoryBarrier(0x{bits:x})"));
    }

    fn texture_barrier(&self) {
        self.record("TextureBarrier()".to_owned());
    }

    // ---------------------------------------------------------------------------
    // Samplers and images
    // ---------------------------------------------------------------------------

    fn gen_sampler(&self) -> GLuint {
        self.gen("GenSamplers", |st, id| {
            st.samplers.insert(id);
        })
    }

    fn delete_sampler(&self, id: GLuint) {
        self.delete("DeleteSamplers", id, |st, id| st.samplers.remove(&id))
    }

    fn bind_sampler(&self, unit: u32, id: GLuint) {
        self.record(format!("BindSampler({unit}, {id})"));
    }

    fn sampler_parameter_i(&self, id: GLuint, pname: GLenum, value: i32) {
        self.record(format!("SamplerParameteri({id}, 0x{pname:04x}, {value})"));
    }

    fn sampler_parameter_f(&self, id: GLuint, pname: GLenum, value: f32) {
        self.record(format!("SamplerParameterf({id}, 0x{pname:04x}, {value})"));
    }

    fn sampler_parameter_fv(&self, id: GLuint, pname: GLenum, value: &[f32; 4]) {
        self.record(format!("SamplerParameterfv({id}, 0x{pname:04x}, {value:?})"));
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        texture: GLuint,
        level: i32,
        layered: bool,
        layer: i32,
        access: GLenum,
        format: GLenum,
    ) {
        self.record(format!(
            "BindImageTexture({unit}, {texture}, {level}, {layered}, {layer}, 0x{access:04x}, 0x{format:04x})"
        ));
    }

    // ---------------------------------------------------------------------------
    // Transform feedback
    // ---------------------------------------------------------------------------

    fn gen_transform_feedback(&self) -> GLuint {
        self.gen("GenTransformFeedbacks", |st, id| {
            st.transform_feedbacks.insert(id);
        })
    }

    fn delete_transform_feedback(&self, id: GLuint) {
        self.delete("DeleteTransformFeedbacks", id, |st, id| {
            st.transform_feedbacks.remove(&id)
        })
    }

    fn bind_transform_feedback(&self, id: GLuint) {
        self.record(format!("BindTransformFeedback({id})"));
    }

    fn begin_transform_feedback(&self, mode: GLenum) {
        self.record(format!("BeginTransformFeedback(0x{mode:04x})"));
    }

    fn end_transform_feedback(&self) {
        self.record("EndTransformFeedback()".to_owned());
    }

    fn pause_transform_feedback(&self) {
        self.record("PauseTransformFeedback()".to_owned());
    }

    fn resume_transform_feedback(&self) {
        self.record("ResumeTransformFeedback()".to_owned());
    }

    // ---------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------

    fn gen_query(&self) -> GLuint {
        self.gen("GenQueries", |st, id| {
            st.queries.insert(id);
        })
    }

    fn delete_query(&self, id: GLuint) {
        self.delete("DeleteQueries", id, |st, id| st.queries.remove(&id))
    }

    fn begin_query(&self, target: GLenum, id: GLuint) {
        self.record(format!("BeginQuery(0x{target:04x}, {id})"));
    }

    fn end_query(&self, target: GLenum) {
        self.record(format!("EndQuery(0x{target:04x})"));
    }

    fn begin_query_indexed(&self, target: GLenum, index: u32, id: GLuint) {
        self.record(format!("BeginQueryIndexed(0x{target:04x}, {index}, {id})"));
    }

    fn end_query_indexed(&self, target: GLenum, index: u32) {
        self.record(format!("EndQueryIndexed(0x{target:04x}, {index})"));
    }

    fn query_counter(&self, id: GLuint, target: GLenum) {
        self.record(format!("QueryCounter({id}, 0x{target:04x})"));
    }

    fn get_query_object_u64(&self, id: GLuint, pname: GLenum) -> u64 {
        let mut st = self.state.lock();
        st.calls
            .push(format!("GetQueryObjectui64v({id}, 0x{pname:04x})"));
        match pname {
            gl::QUERY_RESULT_AVAILABLE => st.query_available as u64,
            _ => st.query_result,
        }
    }

    fn begin_conditional_render(&self, id: GLuint, mode: GLenum) {
        self.record(format!("BeginConditionalRender({id}, 0x{mode:04x})"));
    }

    fn end_conditional_render(&self) {
        self.record("EndConditionalRender()".to_owned());
    }

    // ---------------------------------------------------------------------------
    // Sync
    // ---------------------------------------------------------------------------

    fn fence_sync(&self) -> GlSync {
        let mut st = self.state.lock();
        let id = st.alloc_id() as usize;
        let signalled = st.auto_signal;
        st.syncs.insert(id, signalled);
        st.calls.push(format!("FenceSync({id})"));
        GlSync(id)
    }

    fn client_wait_sync(&self, sync: GlSync, _flush: bool, timeout_ns: u64) -> SyncStatus {
        let mut st = self.state.lock();
        match st.syncs.get(&sync.0) {
            None => return SyncStatus::WaitFailed,
            Some(true) => return SyncStatus::AlreadySignaled,
            Some(false) if timeout_ns == 0 => return SyncStatus::TimeoutExpired,
            Some(false) => {}
        }
        let wait = Duration::from_nanos(timeout_ns).min(Duration::from_millis(20));
        self.fence_cv.wait_for(&mut st, wait);
        match st.syncs.get(&sync.0) {
            Some(true) => SyncStatus::ConditionSatisfied,
            Some(false) => SyncStatus::TimeoutExpired,
            None => SyncStatus::WaitFailed,
        }
    }

    fn delete_sync(&self, sync: GlSync) {
        self.delete("DeleteSync", sync.0 as GLuint, |st, _| st.syncs.remove(&sync.0).is_some())
    }

    fn flush(&self) {
        self.record("Flush()".to_owned());
    }

    fn finish(&self) {
        self.record("Finish()".to_owned());
    }
}

/// Nearest-neighbour copy between two levels; flipped rectangles mirror.
fn blit_nearest(src: &MockLevel, src_layer: usize, s: [i32; 4], dst: &mut MockLevel, dst_layer: usize, d: [i32; 4]) {
    let bpp = src.texel.bytes.min(dst.texel.bytes);
    let (dx_lo, dx_hi) = (d[0].min(d[2]), d[0].max(d[2]));
    let (dy_lo, dy_hi) = (d[1].min(d[3]), d[1].max(d[3]));
    let dw = (d[2] - d[0]) as f32;
    let dh = (d[3] - d[1]) as f32;
    if dw == 0.0 || dh == 0.0 {
        return;
    }
    for y in dy_lo.max(0)..dy_hi.min(dst.height as i32) {
        let v = (y as f32 + 0.5 - d[1] as f32) / dh;
        let sy = (s[1] as f32 + v * (s[3] - s[1]) as f32).floor() as i32;
        if sy < 0 || sy >= src.height as i32 {
            continue;
        }
        for x in dx_lo.max(0)..dx_hi.min(dst.width as i32) {
            let u = (x as f32 + 0.5 - d[0] as f32) / dw;
            let sx = (s[0] as f32 + u * (s[2] - s[0]) as f32).floor() as i32;
            if sx < 0 || sx >= src.width as i32 {
                continue;
            }
            let from = src.offset(sx as usize, sy as usize, src_layer);
            let to = dst.offset(x as usize, y as usize, dst_layer);
            if let (Some(sp), true) = (src.data.get(from..from + bpp), to + bpp <= dst.data.len()) {
                let texel = sp.to_vec();
                dst.data[to..to + bpp].copy_from_slice(&texel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn upload_rgba8(gl: &MockGl, w: i32, h: i32, data: &[u8]) -> GLuint {
        let tex = gl.gen_texture();
        gl.bind_texture(gl::TEXTURE_2D, tex);
        gl.tex_storage_2d(gl::TEXTURE_2D, 1, gl::RGBA8, w, h);
        gl.tex_sub_image_2d(gl::TEXTURE_2D, 0, 0, 0, w, h, gl::RGBA, gl::UNSIGNED_BYTE, data);
        tex
    }

    #[test]
    fn texture_upload_and_readback() {
        let gl = MockGl::new();
        let data: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
        let tex = upload_rgba8(&gl, 4, 4, &data);

        let mut out = vec![0u8; data.len()];
        gl.get_tex_image(gl::TEXTURE_2D, 0, gl::RGBA, gl::UNSIGNED_BYTE, &mut out);
        assert_eq!(out, data);

        let fbo = gl.gen_framebuffer();
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, fbo);
        gl.framebuffer_texture_2d(gl::READ_FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, tex, 0);
        let mut row = vec![0u8; 8];
        gl.read_pixels(1, 2, 2, 1, gl::RGBA, gl::UNSIGNED_BYTE, &mut row);
        assert_eq!(row, data[(2 * 4 + 1) * 4..(2 * 4 + 3) * 4].to_vec());
    }

    #[test]
    fn row_length_is_honoured() {
        let gl = MockGl::new();
        let tex = gl.gen_texture();
        gl.bind_texture(gl::TEXTURE_2D, tex);
        gl.tex_storage_2d(gl::TEXTURE_2D, 1, gl::R8, 2, 2);
        gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);
        gl.pixel_store_i(gl::UNPACK_ROW_LENGTH, 4);
        gl.tex_sub_image_2d(gl::TEXTURE_2D, 0, 0, 0, 2, 2, gl::RED, gl::UNSIGNED_BYTE, &[1, 2, 9, 9, 3, 4, 9, 9]);
        assert_eq!(gl.texture_data(tex, 0), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn blit_flips_rows() {
        let gl = MockGl::new();
        let src = upload_rgba8(&gl, 1, 2, &[1, 1, 1, 1, 2, 2, 2, 2]);
        let dst = upload_rgba8(&gl, 1, 2, &[0; 8]);
        let read = gl.gen_framebuffer();
        let draw = gl.gen_framebuffer();
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, read);
        gl.framebuffer_texture_2d(gl::READ_FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, src, 0);
        gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, draw);
        gl.framebuffer_texture_2d(gl::DRAW_FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, dst, 0);
        gl.blit_framebuffer([0, 0, 1, 2], [0, 2, 1, 0], gl::COLOR_BUFFER_BIT, gl::NEAREST);
        assert_eq!(gl.texture_data(dst, 0), Some(vec![2, 2, 2, 2, 1, 1, 1, 1]));
    }

    #[test]
    fn buffers_map_and_copy() {
        let gl = MockGl::new();
        let a = gl.gen_buffer();
        let b = gl.gen_buffer();
        gl.bind_buffer(gl::COPY_READ_BUFFER, a);
        gl.buffer_data(gl::COPY_READ_BUFFER, 8, None, gl::STREAM_DRAW);
        unsafe {
            let ptr = gl.map_buffer_range(gl::COPY_READ_BUFFER, 2, 2, gl::MAP_WRITE_BIT);
            assert!(!ptr.is_null());
            std::ptr::copy_nonoverlapping([7u8, 8].as_ptr(), ptr, 2);
        }
        assert!(gl.unmap_buffer(gl::COPY_READ_BUFFER));
        gl.bind_buffer(gl::COPY_WRITE_BUFFER, b);
        gl.buffer_data(gl::COPY_WRITE_BUFFER, 4, None, gl::STREAM_DRAW);
        gl.copy_buffer_sub_data(gl::COPY_READ_BUFFER, gl::COPY_WRITE_BUFFER, 2, 0, 2);
        assert_eq!(gl.buffer_contents(b), Some(vec![7, 8, 0, 0]));
    }

    #[test]
    fn double_delete_is_counted() {
        let gl = MockGl::new();
        let tex = gl.gen_texture();
        gl.delete_texture(tex);
        gl.delete_texture(tex);
        assert_eq!(gl.bad_deletes(), 1);
        assert_eq!(gl.count("DeleteTextures"), 2);
    }

    #[test]
    fn manual_fence_signalling() {
        let gl = MockGl::new();
        gl.set_auto_signal(false);
        let sync = gl.fence_sync();
        assert_eq!(gl.client_wait_sync(sync, false, 0), SyncStatus::TimeoutExpired);
        gl.signal_all();
        assert!(gl.client_wait_sync(sync, false, 0).is_signalled());
    }

    #[test]
    fn compile_failure_marker() {
        let gl = MockGl::new();
        gl.fail_compile_containing("BROKEN");
        let ok = gl.create_shader(gl::VERTEX_SHADER);
        gl.shader_source(ok, "void main() {}");
        assert!(gl.compile_shader(ok));
        let bad = gl.create_shader(gl::VERTEX_SHADER);
        gl.shader_source(bad, "BROKEN");
        assert!(!gl.compile_shader(bad));
        assert!(!gl.shader_info_log(bad).is_empty());
    }
}
