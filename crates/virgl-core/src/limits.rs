//! Fixed limits of the guest-visible pipeline.

/// Maximum number of colour buffers in a framebuffer state.
pub const MAX_COLOR_BUFS: usize = 8;
pub const MAX_VIEWPORTS: usize = 16;
pub const MAX_VERTEX_BUFFERS: usize = 32;
pub const MAX_VERTEX_ATTRIBS: usize = 32;
/// Sampler views / sampler states per shader stage.
pub const MAX_SHADER_SAMPLER_VIEWS: usize = 32;
pub const MAX_CONST_BUFFERS: usize = 16;
pub const MAX_SHADER_BUFFERS: usize = 16;
pub const MAX_SHADER_IMAGES: usize = 16;
pub const MAX_SO_BUFFERS: usize = 4;
pub const MAX_SO_OUTPUTS: usize = 64;
pub const MAX_CLIP_PLANES: usize = 8;
pub const POLYGON_STIPPLE_ROWS: usize = 32;

/// Largest cursor resource served by `get_cursor_contents`.
pub const MAX_CURSOR_SIZE: u32 = 128;

/// Sync-thread wait slice in nanoseconds.
pub const FENCE_WAIT_TIMEOUT_NS: u64 = 1_000_000_000;
