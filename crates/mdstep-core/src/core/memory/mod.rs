//! Host/accelerator memory management.
//!
//! Every per-particle array lives in a [`mirrored::MirroredArray`], which keeps a host copy
//! and an accelerator copy and tracks which one holds the current data. Components acquire
//! scoped handles for a location and an access mode; transfers happen only when the
//! requested location is stale. [`execution::ExecutionConfig`] reports whether an
//! accelerator context exists at all.

pub mod execution;
pub mod mirrored;

pub use execution::{AcceleratorDevice, ExecutionConfig, ExecutionError};
pub use mirrored::{AccessLocation, AccessMode, BufferError, MirroredArray, ReadHandle, WriteHandle};
