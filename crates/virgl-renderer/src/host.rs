//! Probed host state shared by every context.

use std::cell::Cell;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};
use virgl_core::RendererConfig;
use virgl_gl::{Feature, GlApi, HostCaps};
use virgl_shader::ShaderCfg;

use crate::callbacks::{GlContextHandle, RendererCallbacks};

/// GL entry points, probed capabilities and configuration.
///
/// Held behind an `Rc` by the renderer and by every object that has to issue
/// GL calls on its own (resources, variants, programs).
pub(crate) struct Host {
    pub gl: Arc<dyn GlApi>,
    pub caps: HostCaps,
    pub shader_cfg: ShaderCfg,
    pub config: RendererConfig,
    pub callbacks: Arc<dyn RendererCallbacks>,
    next_variant_id: Cell<u64>,
    /// GL context last made current on the render thread.
    current: Cell<Option<GlContextHandle>>,
}

impl Host {
    pub fn new(
        gl: Arc<dyn GlApi>,
        callbacks: Arc<dyn RendererCallbacks>,
        mut config: RendererConfig,
    ) -> Result<Self> {
        let caps = HostCaps::probe(gl.as_ref())?;
        if caps.is_gles() != config.use_gles {
            warn!(
                "configured use_gles={} but host context reports gles={}",
                config.use_gles,
                caps.is_gles()
            );
            config.use_gles = caps.is_gles();
        }
        if caps.is_gles() && !caps.has(Feature::TextureStorage) {
            warn!("GLES host without texture storage, falling back to TexImage");
        }

        let shader_cfg = ShaderCfg {
            glsl_version: caps.glsl_level,
            use_gles: caps.is_gles(),
            use_core_profile: caps.core_profile,
            use_explicit_locations: caps.has(Feature::ExplicitAttribLocation),
            has_arrays_of_arrays: caps.has(Feature::ArraysOfArrays),
            has_gpu_shader5: caps.has(Feature::GpuShader5),
            has_es31_compat: caps.has(Feature::Es31Compat),
            max_draw_buffers: caps.max_draw_buffers,
        };
        debug!("shader config: {shader_cfg:?}");

        Ok(Self {
            gl,
            caps,
            shader_cfg,
            config,
            callbacks,
            next_variant_id: Cell::new(1),
            current: Cell::new(None),
        })
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.caps.has(feature)
    }

    pub fn is_gles(&self) -> bool {
        self.caps.is_gles()
    }

    /// Variant ids are unique for the lifetime of the renderer, so a program
    /// keyed on them can never match a variant that replaced a dead one.
    pub fn next_variant_id(&self) -> u64 {
        let id = self.next_variant_id.get();
        self.next_variant_id.set(id + 1);
        id
    }

    /// Make `handle` current unless it already is.
    pub fn make_current(&self, handle: GlContextHandle) -> bool {
        if self.current.get() == Some(handle) {
            return true;
        }
        if !self.callbacks.make_current(0, Some(handle)) {
            warn!("failed to make GL context {handle:?} current");
            self.current.set(None);
            return false;
        }
        self.current.set(Some(handle));
        true
    }

    /// Forget the current context, e.g. after destroying it.
    pub fn release_current(&self, handle: GlContextHandle) {
        if self.current.get() == Some(handle) {
            self.callbacks.make_current(0, None);
            self.current.set(None);
        }
    }

    pub fn version(&self) -> (u32, u32) {
        (self.caps.version.major, self.caps.version.minor)
    }
}
