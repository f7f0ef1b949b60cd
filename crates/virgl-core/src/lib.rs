//! Shared vocabulary for the virgl command processor.
//!
//! Everything the decoder-facing API, the shader translator and the renderer
//! have to agree on lives here:
//!
//! - [`pipe`]: Gallium enums and bit sets (texture targets, bind flags,
//!   blend factors, query types, ...).
//! - [`format`]: the virgl format table with GL mappings and block sizes.
//! - [`error`]: context errors and the errno-style renderer error.
//! - [`config`]: renderer configuration with environment overrides.
//! - [`caps`]: the versioned capability sets exported to the guest.
//! - [`logging`]: `tracing` subscriber bootstrap.

pub mod bytes;
pub mod caps;
pub mod config;
pub mod error;
pub mod format;
pub mod limits;
pub mod logging;
pub mod pipe;

pub use bytes::AsBytes;
pub use config::RendererConfig;
pub use error::{ContextErrorKind, RendererError};
pub use format::VirglFormat;

/// Guest-chosen object handle. `0` means "unbind" and is never a valid object.
pub type Handle = u32;

/// 3D box addressed by a transfer or copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeBox {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub width: i32,
    pub height: i32,
    pub depth: i32,
}

impl PipeBox {
    pub const fn new(x: i32, y: i32, z: i32, width: i32, height: i32, depth: i32) -> Self {
        Self {
            x,
            y,
            z,
            width,
            height,
            depth,
        }
    }
}

/// Size of mip `level` for a base dimension, never below 1.
pub fn minify(value: u32, level: u32) -> u32 {
    if level >= 32 {
        return 1;
    }
    (value >> level).max(1)
}
