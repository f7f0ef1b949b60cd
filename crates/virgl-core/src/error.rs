//! Error vocabulary shared by the renderer crates.

use thiserror::Error;

pub const EINVAL: i32 = 22;
pub const ENOMEM: i32 = 12;

/// Sticky per-context error kinds, numbered as the guest protocol reports
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u32)]
pub enum ContextErrorKind {
    #[error("None")]
    None = 0,
    #[error("Unknown")]
    Unknown = 1,
    #[error("Illegal shader")]
    IllegalShader = 2,
    #[error("Illegal handle")]
    IllegalHandle = 3,
    #[error("Illegal resource")]
    IllegalResource = 4,
    #[error("Illegal surface")]
    IllegalSurface = 5,
    #[error("Illegal vertex format")]
    IllegalVertexFormat = 6,
    #[error("Illegal command buffer")]
    IllegalCmdBuffer = 7,
    #[error("GLES has tessellation evaluation but no control shader")]
    GlesHaveTesButMissTcs = 8,
    #[error("ANY_SAMPLES_PASSED not supported")]
    GlAnySamplesPassed = 9,
    #[error("Illegal format")]
    IllegalFormat = 10,
    #[error("Illegal sampler view target")]
    IllegalSamplerViewTarget = 11,
    #[error("IOV data out of bounds")]
    TransferIovBounds = 12,
}

impl ContextErrorKind {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Error returned from public renderer entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    #[error("invalid argument")]
    Inval,
    #[error("out of memory")]
    NoMem,
    /// A context error; the context is now flagged.
    #[error("{op}: {kind} ({value})")]
    Context {
        kind: ContextErrorKind,
        value: u32,
        op: &'static str,
    },
}

impl RendererError {
    /// POSIX errno as surfaced to the transport.
    pub fn errno(&self) -> i32 {
        match self {
            RendererError::NoMem => ENOMEM,
            RendererError::Inval | RendererError::Context { .. } => EINVAL,
        }
    }

    pub fn context(kind: ContextErrorKind, value: u32, op: &'static str) -> Self {
        RendererError::Context { kind, value, op }
    }

    pub fn kind(&self) -> Option<ContextErrorKind> {
        match self {
            RendererError::Context { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type RendererResult<T> = Result<T, RendererError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_strings() {
        assert_eq!(ContextErrorKind::IllegalCmdBuffer.to_string(), "Illegal command buffer");
        assert_eq!(ContextErrorKind::IllegalShader.code(), 2);
    }

    #[test]
    fn errno_values() {
        assert_eq!(RendererError::Inval.errno(), 22);
        assert_eq!(RendererError::NoMem.errno(), 12);
        let err = RendererError::context(ContextErrorKind::IllegalHandle, 5, "bind_shader");
        assert_eq!(err.errno(), 22);
        assert_eq!(err.to_string(), "bind_shader: Illegal handle (5)");
    }
}
