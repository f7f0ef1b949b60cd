//! GL access layer for the virgl renderer.
//!
//! - [`api`]: the [`GlApi`] trait every GL call goes through.
//! - [`native`]: the `gl`-crate backend used against a real host context.
//! - [`mock`] (feature `mock`): an in-memory backend for tests.
//! - [`version`] / [`features`]: host version parsing and the feature probe.

#![allow(clippy::too_many_arguments)]

pub mod api;
pub mod features;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod native;
pub mod version;

pub use api::{GlApi, GlSync, ImageRegion, SyncStatus};
pub use features::{Feature, FeatureTable, HostCaps};
pub use native::NativeGl;
pub use version::GlVersion;
