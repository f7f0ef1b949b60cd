//! Renderer configuration and its environment overrides.

use once_cell::sync::Lazy;

/// Environment overrides, read once per process.
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    disable_mt: bool,
    use_sub_data: Option<bool>,
    dump_shaders: bool,
}

static ENV_OVERRIDES: Lazy<EnvOverrides> = Lazy::new(|| EnvOverrides {
    disable_mt: std::env::var_os("VIRGL_DISABLE_MT").is_some(),
    use_sub_data: std::env::var("VIRGL_USE_SUB_DATA")
        .ok()
        .and_then(|v| parse_bool(&v)),
    dump_shaders: std::env::var_os("VIRGL_DUMP_SHADERS").is_some(),
});

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Wait on fences from a background thread with its own shared context.
    pub use_thread_sync: bool,
    /// Upload buffers with `glBufferSubData` instead of mapping them.
    pub use_sub_data: bool,
    /// The host context is OpenGL ES.
    pub use_gles: bool,
    /// Log every translated shader at debug level.
    pub dump_shaders: bool,
    /// Compiled variants kept per shader; the least recently used go first.
    pub max_variants_hint: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            use_thread_sync: false,
            use_sub_data: false,
            use_gles: false,
            dump_shaders: false,
            max_variants_hint: 16,
        }
    }
}

impl RendererConfig {
    /// Defaults with the process environment applied.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply the process environment on top of `self`.
    pub fn with_env(mut self) -> Self {
        let env = &*ENV_OVERRIDES;
        if env.disable_mt {
            self.use_thread_sync = false;
        }
        if let Some(sub_data) = env.use_sub_data {
            self.use_sub_data = sub_data;
        }
        self.dump_shaders |= env.dump_shaders;
        tracing::debug!("renderer config: {self:?}");
        self
    }

    pub fn thread_sync(mut self, enable: bool) -> Self {
        self.use_thread_sync = enable;
        self
    }

    pub fn gles(mut self, enable: bool) -> Self {
        self.use_gles = enable;
        self
    }

    pub fn sub_data(mut self, enable: bool) -> Self {
        self.use_sub_data = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn builder_setters() {
        let cfg = RendererConfig::default().thread_sync(true).gles(true).sub_data(true);
        assert!(cfg.use_thread_sync);
        assert!(cfg.use_gles);
        assert!(cfg.use_sub_data);
        assert_eq!(cfg.max_variants_hint, 16);
    }
}
