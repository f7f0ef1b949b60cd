//! Shader selectors and their compiled variants.
//!
//! A selector is one guest shader. Each distinct [`ShaderKey`] it is drawn
//! with yields one variant: the translated GLSL compiled into a GL shader.
//! The variant in use sits at the front of the list so the common case, an
//! unchanged key, is a single comparison.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use tracing::{debug, error, trace};
use virgl_core::error::RendererResult;
use virgl_core::pipe::ShaderType;
use virgl_core::{ContextErrorKind, Handle, RendererError};
use virgl_shader::{convert_shader, tgsi, ShaderInfo, ShaderKey, SoInfo};

use crate::gl_objects::GlShader;
use crate::host::Host;

/// Guest description of a shader; the text may arrive in several packets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderCreateArgs {
    pub handle: Handle,
    pub ty: u32,
    /// Length in bytes of the complete TGSI text.
    pub total_len: u32,
    /// Byte offset of this packet's text; only continuations use it.
    pub offset: u32,
    /// This packet continues a shader created earlier with the same handle.
    pub continuation: bool,
    pub so_info: Option<SoInfo>,
    /// Compute shared memory in bytes.
    pub req_local_mem: u32,
}

/// One compiled translation of a selector.
#[derive(Debug)]
pub(crate) struct ShaderVariant {
    /// Unique for the renderer's lifetime.
    pub id: u64,
    pub ty: ShaderType,
    pub key: ShaderKey,
    pub info: ShaderInfo,
    pub glsl: String,
    pub shader: GlShader,
}

#[derive(Debug)]
pub(crate) struct ShaderSelector {
    pub ty: ShaderType,
    pub so_info: Option<SoInfo>,
    pub req_local_mem: u32,
    total_len: usize,
    source: RefCell<String>,
    program: RefCell<Option<tgsi::Program>>,
    variants: RefCell<Vec<Rc<ShaderVariant>>>,
    max_variants: usize,
}

fn illegal_shader(handle: Handle, op: &'static str) -> RendererError {
    RendererError::context(ContextErrorKind::IllegalShader, handle, op)
}

impl ShaderSelector {
    /// Start a selector from its first packet. The TGSI is parsed once the
    /// whole text is present.
    pub fn new(host: &Host, args: &ShaderCreateArgs, text: &str) -> RendererResult<Self> {
        let ty = ShaderType::from_raw(args.ty).ok_or_else(|| illegal_shader(args.handle, "create_shader"))?;
        if ty == ShaderType::Compute && !host.has(virgl_gl::Feature::ComputeShader) {
            return Err(illegal_shader(args.handle, "create_shader"));
        }
        if matches!(ty, ShaderType::TessCtrl | ShaderType::TessEval)
            && !host.has(virgl_gl::Feature::Tessellation)
        {
            return Err(illegal_shader(args.handle, "create_shader"));
        }
        let total_len = args.total_len.max(text.len() as u32) as usize;
        let sel = Self {
            ty,
            so_info: args.so_info.clone(),
            req_local_mem: args.req_local_mem,
            total_len,
            source: RefCell::new(String::with_capacity(total_len)),
            program: RefCell::new(None),
            variants: RefCell::new(Vec::new()),
            max_variants: host.config.max_variants_hint.max(1),
        };
        sel.append(args.handle, 0, text)?;
        Ok(sel)
    }

    /// Append a continuation packet at `offset`.
    pub fn append(&self, handle: Handle, offset: u32, text: &str) -> RendererResult<()> {
        if self.is_complete() {
            return Err(illegal_shader(handle, "create_shader"));
        }
        {
            let mut source = self.source.borrow_mut();
            if offset as usize != source.len() || source.len() + text.len() > self.total_len {
                error!(
                    "shader {handle}: continuation at {offset} does not follow {} of {} bytes",
                    source.len(),
                    self.total_len
                );
                return Err(illegal_shader(handle, "create_shader"));
            }
            source.push_str(text);
            if source.len() < self.total_len {
                trace!("shader {handle}: {} of {} bytes", source.len(), self.total_len);
                return Ok(());
            }
        }

        let source = self.source.borrow();
        let program = tgsi::parse(source.trim_end_matches('\0')).map_err(|e| {
            error!("shader {handle}: {e}");
            illegal_shader(handle, "create_shader")
        })?;
        if program.processor != self.ty {
            error!("shader {handle}: declared {:?} but TGSI is {:?}", self.ty, program.processor);
            return Err(illegal_shader(handle, "create_shader"));
        }
        *self.program.borrow_mut() = Some(program);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.program.borrow().is_some()
    }

    pub fn current(&self) -> Option<Rc<ShaderVariant>> {
        self.variants.borrow().first().cloned()
    }

    pub fn variants(&self) -> Ref<'_, Vec<Rc<ShaderVariant>>> {
        self.variants.borrow()
    }

    /// Make the variant for `key` current, translating and compiling it on a
    /// miss.
    pub fn select(&self, host: &Rc<Host>, handle: Handle, key: &ShaderKey) -> RendererResult<Rc<ShaderVariant>> {
        let mut key = key.clone();
        if self.ty != ShaderType::Fragment && self.ty != ShaderType::Compute {
            key.so_info = self.so_info.clone();
        }
        {
            let mut variants = self.variants.borrow_mut();
            if let Some(pos) = variants.iter().position(|v| v.key == key) {
                if pos != 0 {
                    let hit = variants.remove(pos);
                    variants.insert(0, hit);
                }
                return Ok(Rc::clone(&variants[0]));
            }
        }

        let variant = Rc::new(self.compile(host, handle, key)?);
        let mut variants = self.variants.borrow_mut();
        variants.insert(0, Rc::clone(&variant));
        if variants.len() > self.max_variants {
            // Programs hold variants weakly and drop out on their own.
            let evicted = variants.pop();
            trace!("shader {handle}: evicted variant {:?}", evicted.map(|v| v.id));
        }
        Ok(variant)
    }

    fn compile(&self, host: &Rc<Host>, handle: Handle, key: ShaderKey) -> RendererResult<ShaderVariant> {
        let program = self.program.borrow();
        let program = program.as_ref().ok_or_else(|| illegal_shader(handle, "select_shader"))?;
        let (glsl, info) = convert_shader(&host.shader_cfg, program, &key, self.req_local_mem).map_err(|e| {
            error!("shader {handle}: translation failed: {e}");
            illegal_shader(handle, "select_shader")
        })?;
        if host.config.dump_shaders {
            debug!("shader {handle} ({:?}):\n{glsl}", self.ty);
        }

        let shader = compile_glsl(host, self.ty, &glsl).map_err(|_| illegal_shader(handle, "select_shader"))?;
        Ok(ShaderVariant {
            id: host.next_variant_id(),
            ty: self.ty,
            key,
            info,
            glsl,
            shader,
        })
    }
}

/// Compile `glsl` into a new GL shader, dumping source and log on failure.
pub(crate) fn compile_glsl(host: &Rc<Host>, ty: ShaderType, glsl: &str) -> Result<GlShader, String> {
    let shader = GlShader::new(&host.gl, ty.gl_shader_type());
    host.gl.shader_source(shader.id(), glsl);
    if !host.gl.compile_shader(shader.id()) {
        let log = host.gl.shader_info_log(shader.id());
        error!("failed to compile {ty:?} shader: {log}\n{glsl}");
        return Err(log);
    }
    Ok(shader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mock_host;
    use pretty_assertions::assert_eq;

    const FS: &str = "FRAG\nDCL IN[0], GENERIC[0], PERSPECTIVE\nDCL OUT[0], COLOR\n  0: MOV OUT[0], IN[0]\n  1: END\n";

    fn args(len: usize) -> ShaderCreateArgs {
        ShaderCreateArgs {
            handle: 5,
            ty: ShaderType::Fragment as u32,
            total_len: len as u32,
            ..Default::default()
        }
    }

    #[test]
    fn same_key_reuses_variant() {
        let (host, gl) = mock_host();
        let sel = ShaderSelector::new(&host, &args(FS.len()), FS).unwrap();
        let key = ShaderKey::default();
        let a = sel.select(&host, 5, &key).unwrap();
        let b = sel.select(&host, 5, &key).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(gl.count("CompileShader"), 1);

        let flipped = ShaderKey {
            invert_fs_origin: true,
            ..Default::default()
        };
        let c = sel.select(&host, 5, &flipped).unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        let d = sel.select(&host, 5, &key).unwrap();
        assert!(Rc::ptr_eq(&a, &d));
        assert_eq!(sel.variants().len(), 2);
        assert_eq!(gl.count("CompileShader"), 2);
    }

    #[test]
    fn long_shader_continuation() {
        let (host, _gl) = mock_host();
        let (head, tail) = FS.split_at(20);
        let sel = ShaderSelector::new(&host, &args(FS.len()), head).unwrap();
        assert!(!sel.is_complete());
        let err = sel.append(5, 3, tail).unwrap_err();
        assert_eq!(err.kind(), Some(ContextErrorKind::IllegalShader));
        sel.append(5, head.len() as u32, tail).unwrap();
        assert!(sel.is_complete());
        assert!(sel.append(5, FS.len() as u32, "x").is_err());
    }

    #[test]
    fn compile_failure_leaves_no_variant() {
        let (host, gl) = mock_host();
        gl.fail_compile_containing("void main");
        let sel = ShaderSelector::new(&host, &args(FS.len()), FS).unwrap();
        let err = sel.select(&host, 5, &ShaderKey::default()).unwrap_err();
        assert_eq!(err.kind(), Some(ContextErrorKind::IllegalShader));
        assert!(sel.current().is_none());
    }

    #[test]
    fn stage_mismatch_is_rejected() {
        let (host, _gl) = mock_host();
        let mut vs_args = args(FS.len());
        vs_args.ty = ShaderType::Vertex as u32;
        assert!(ShaderSelector::new(&host, &vs_args, FS).is_err());
    }
}
